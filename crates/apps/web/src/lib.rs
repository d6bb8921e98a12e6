use console_error_panic_hook::set_once;
use foundation::math::FlatCoord;
use viewsync::{MapView, Notice, RenderTarget, ViewEvent, ViewerConfig};
use wasm_bindgen::prelude::*;
use web_sys::Element;

mod geolocation;
mod ol;

use geolocation::BrowserGeolocation;
use ol::OlBackend;

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    set_once();
    Ok(())
}

fn to_js(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// DOM elements updated from view events.
struct DomSink {
    zoom: Option<Element>,
    toggle: Option<Element>,
}

impl DomSink {
    fn new(zoom_id: Option<&str>, toggle_id: Option<&str>) -> Self {
        let document = web_sys::window().and_then(|w| w.document());
        let find = |id: Option<&str>| {
            let id = id?;
            document.as_ref()?.get_element_by_id(id)
        };
        Self {
            zoom: find(zoom_id),
            toggle: find(toggle_id),
        }
    }

    fn apply(&self, event: &ViewEvent) {
        match event {
            ViewEvent::ZoomReadout(text) => {
                if let Some(el) = &self.zoom {
                    el.set_text_content(Some(text));
                }
            }
            ViewEvent::ModeChanged { button, .. } => {
                if let Some(el) = &self.toggle {
                    el.set_text_content(Some(button.text));
                    ol::report("set toggle title", el.set_attribute("title", button.title));
                }
            }
            ViewEvent::Notice(notice) => alert(*notice),
            ViewEvent::MarkerMoved { .. } | ViewEvent::MarkerCleared => {}
        }
    }
}

fn alert(notice: Notice) {
    if let Some(window) = web_sys::window() {
        if window.alert_with_message(notice.message()).is_err() {
            web_sys::console::warn_1(&JsValue::from_str(notice.message()));
        }
    }
}

/// A dual 2D/3D map mounted on a page element.
#[wasm_bindgen]
pub struct WebMapView {
    // Dropped first: the map must be gone before the pointer formatter.
    inner: MapView<OlBackend, BrowserGeolocation>,
    _pointer_format: Option<Closure<dyn FnMut(f64, f64) -> String>>,
}

#[wasm_bindgen]
impl WebMapView {
    /// Mounts on the element `target_id`.
    ///
    /// `config_json` may be empty. The optional ids name elements that show
    /// the zoom readout, the mode toggle label, and the pointer position.
    #[wasm_bindgen(constructor)]
    pub fn new(
        target_id: &str,
        config_json: &str,
        zoom_id: Option<String>,
        toggle_id: Option<String>,
        pointer_id: Option<String>,
    ) -> Result<WebMapView, JsValue> {
        let config = if config_json.trim().is_empty() {
            ViewerConfig::default()
        } else {
            ViewerConfig::from_json_str(config_json).map_err(to_js)?
        };

        let mut backend = OlBackend::default();
        let inner = MapView::mount(
            &mut backend,
            BrowserGeolocation,
            &config,
            &RenderTarget::new(target_id),
        )
        .map_err(to_js)?;

        let pointer_format = match (pointer_id.as_deref(), backend.flat_handle()) {
            (Some(id), Some(handle)) => Some(ol::add_mouse_position(handle, id)?),
            _ => None,
        };

        let sink = DomSink::new(zoom_id.as_deref(), toggle_id.as_deref());
        for event in inner.drain_events() {
            sink.apply(&event.payload);
        }
        inner.observe(move |event| sink.apply(&event.payload));

        Ok(WebMapView {
            inner,
            _pointer_format: pointer_format,
        })
    }

    /// Locate-me: fly both views to the device position.
    pub fn locate_user(&mut self) {
        self.inner.locate_user();
    }

    /// Switches 2D/3D and returns the new mode ("flat" or "globe").
    pub fn toggle(&mut self) -> Result<String, JsValue> {
        let mode = self.inner.toggle().map_err(to_js)?;
        serde_json::to_value(mode)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .ok_or_else(|| JsValue::from_str("unserializable mode"))
    }

    pub fn clear_location(&mut self) -> Result<bool, JsValue> {
        self.inner.clear_location().map_err(to_js)
    }

    pub fn reset_view(&mut self) -> Result<(), JsValue> {
        self.inner.reset_view().map_err(to_js)
    }

    /// "Lon: … , Lat: …" for a flat-view (EPSG:3857) coordinate.
    pub fn pointer_readout(&self, x: f64, y: f64) -> String {
        self.inner.pointer_readout(FlatCoord::new(x, y))
    }

    /// Current state as JSON.
    pub fn snapshot(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.inner.snapshot()).map_err(to_js)
    }

    /// Unmounts. Returns the number of engine faults caught during teardown.
    pub fn destroy(&mut self) -> usize {
        let report = self.inner.destroy();
        for fault in &report.faults {
            web_sys::console::warn_1(&JsValue::from_str(&fault.to_string()));
        }
        report.faults.len()
    }
}
