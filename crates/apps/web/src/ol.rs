//! Engine adapters over the OpenLayers and OL-Cesium globals (`ol`, `olcs`,
//! `Cesium`) loaded by the host page.

use std::collections::HashMap;

use foundation::math::FlatCoord;
use viewsync::{
    EngineBackend, EngineFault, FlatAnimation, FlatEngine, FlatMarker, FlatView, GlobeEngine,
    GlobeFlight, HeightReference, ListenerKey, PointMarker, RenderTarget, ResolutionListener,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

#[wasm_bindgen(inline_js = "
function __vs_global(name) {
    const v = globalThis[name];
    if (!v) throw new Error(name + ' is not loaded');
    return v;
}

export function vs_create_flat(target, x, y, zoom) {
    const ol = __vs_global('ol');
    const source = new ol.source.Vector();
    const view = new ol.View({ center: [x, y], zoom });
    // Older full builds expose the defaults function directly.
    const defaults = typeof ol.control.defaults === 'function'
        ? ol.control.defaults
        : ol.control.defaults.defaults;
    const map = new ol.Map({
        target,
        layers: [
            new ol.layer.Tile({ source: new ol.source.OSM() }),
            new ol.layer.Vector({ source }),
        ],
        view,
        controls: defaults({ zoom: true }).extend([
            new ol.control.ScaleLine({
                units: 'metric',
                bar: true,
                steps: 4,
                text: true,
                minWidth: 140,
            }),
        ]),
    });
    return { map, view, source };
}

export function vs_flat_center(h) {
    return Float64Array.from(h.view.getCenter() ?? [NaN, NaN]);
}

export function vs_flat_zoom(h) {
    return h.view.getZoom() ?? NaN;
}

export function vs_set_center(h, x, y) { h.view.setCenter([x, y]); }
export function vs_set_zoom(h, z) { h.view.setZoom(z); }

export function vs_animate(h, x, y, zoom, duration) {
    h.view.animate({ center: [x, y], zoom, duration });
}

export function vs_on_resolution(h, cb) {
    return h.view.on('change:resolution', () => {
        const z = h.view.getZoom();
        if (z !== undefined) cb(z);
    });
}

export function vs_unlisten(key) {
    __vs_global('ol').Observable.unByKey(key);
}

export function vs_set_location_feature(h, x, y, radius, fill, stroke, strokeWidth) {
    const ol = __vs_global('ol');
    const feature = new ol.Feature(new ol.geom.Point([x, y]));
    feature.setStyle(new ol.style.Style({
        image: new ol.style.Circle({
            radius,
            fill: new ol.style.Fill({ color: fill }),
            stroke: new ol.style.Stroke({ color: stroke, width: strokeWidth }),
        }),
    }));
    h.source.clear();
    h.source.addFeature(feature);
}

export function vs_clear_location_feature(h) { h.source.clear(); }

export function vs_add_mouse_position(h, elementId, format) {
    const ol = __vs_global('ol');
    const target = document.getElementById(elementId) ?? undefined;
    h.map.addControl(new ol.control.MousePosition({
        coordinateFormat: (c) => (c ? format(c[0], c[1]) : ''),
        target,
    }));
}

export function vs_detach(h) { h.map.setTarget(undefined); }

export function vs_create_globe(h) {
    const olcs = __vs_global('olcs');
    const ol3d = new olcs.OLCesium({ map: h.map });
    ol3d.setEnabled(false);
    return { ol3d, points: null };
}

export function vs_globe_enabled(g) { return g.ol3d.getEnabled(); }
export function vs_globe_set_enabled(g, on) { g.ol3d.setEnabled(on); }

export function vs_globe_fly_to(g, x, y, z, duration) {
    const Cesium = __vs_global('Cesium');
    g.ol3d.getCesiumScene().camera.flyTo({
        destination: new Cesium.Cartesian3(x, y, z),
        duration,
    });
}

export function vs_globe_set_point(g, x, y, z, size, color, outline, outlineWidth, clamp, depthDistance) {
    const Cesium = __vs_global('Cesium');
    if (!g.points) {
        g.points = g.ol3d.getCesiumScene().primitives.add(new Cesium.PointPrimitiveCollection());
    }
    g.points.removeAll();
    g.points.add({
        position: new Cesium.Cartesian3(x, y, z),
        pixelSize: size,
        color: Cesium.Color.fromCssColorString(color),
        outlineColor: Cesium.Color.fromCssColorString(outline),
        outlineWidth,
        heightReference: clamp ? Cesium.HeightReference.CLAMP_TO_GROUND : Cesium.HeightReference.NONE,
        disableDepthTestDistance: depthDistance,
    });
}

export function vs_globe_clear_point(g) {
    if (g.points) g.points.removeAll();
}

export function vs_globe_destroy(g) {
    if (g.points) {
        g.ol3d.getCesiumScene().primitives.remove(g.points);
        g.points = null;
    }
    if (typeof g.ol3d.destroy === 'function') g.ol3d.destroy();
}
")]
extern "C" {
    #[wasm_bindgen(catch)]
    fn vs_create_flat(target: &str, x: f64, y: f64, zoom: f64) -> Result<JsValue, JsValue>;
    fn vs_flat_center(handle: &JsValue) -> Vec<f64>;
    fn vs_flat_zoom(handle: &JsValue) -> f64;
    #[wasm_bindgen(catch)]
    fn vs_set_center(handle: &JsValue, x: f64, y: f64) -> Result<(), JsValue>;
    #[wasm_bindgen(catch)]
    fn vs_set_zoom(handle: &JsValue, zoom: f64) -> Result<(), JsValue>;
    #[wasm_bindgen(catch)]
    fn vs_animate(handle: &JsValue, x: f64, y: f64, zoom: f64, duration: u32)
    -> Result<(), JsValue>;
    #[wasm_bindgen(catch)]
    fn vs_on_resolution(handle: &JsValue, cb: &Closure<dyn FnMut(f64)>) -> Result<JsValue, JsValue>;
    #[wasm_bindgen(catch)]
    fn vs_unlisten(key: &JsValue) -> Result<(), JsValue>;
    #[wasm_bindgen(catch)]
    fn vs_set_location_feature(
        handle: &JsValue,
        x: f64,
        y: f64,
        radius: f64,
        fill: &str,
        stroke: &str,
        stroke_width: f64,
    ) -> Result<(), JsValue>;
    #[wasm_bindgen(catch)]
    fn vs_clear_location_feature(handle: &JsValue) -> Result<(), JsValue>;
    #[wasm_bindgen(catch)]
    fn vs_add_mouse_position(
        handle: &JsValue,
        element_id: &str,
        format: &Closure<dyn FnMut(f64, f64) -> String>,
    ) -> Result<(), JsValue>;
    #[wasm_bindgen(catch)]
    fn vs_detach(handle: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    fn vs_create_globe(flat: &JsValue) -> Result<JsValue, JsValue>;
    fn vs_globe_enabled(globe: &JsValue) -> bool;
    #[wasm_bindgen(catch)]
    fn vs_globe_set_enabled(globe: &JsValue, on: bool) -> Result<(), JsValue>;
    #[wasm_bindgen(catch)]
    fn vs_globe_fly_to(globe: &JsValue, x: f64, y: f64, z: f64, duration: f64)
    -> Result<(), JsValue>;
    #[wasm_bindgen(catch)]
    fn vs_globe_set_point(
        globe: &JsValue,
        x: f64,
        y: f64,
        z: f64,
        size: f64,
        color: &str,
        outline: &str,
        outline_width: f64,
        clamp: bool,
        depth_distance: f64,
    ) -> Result<(), JsValue>;
    #[wasm_bindgen(catch)]
    fn vs_globe_clear_point(globe: &JsValue) -> Result<(), JsValue>;
    #[wasm_bindgen(catch)]
    fn vs_globe_destroy(globe: &JsValue) -> Result<(), JsValue>;
}

pub(crate) fn js_message(err: &JsValue) -> String {
    if let Some(e) = err.dyn_ref::<js_sys::Error>() {
        return String::from(e.message());
    }
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}

fn fault(err: JsValue) -> EngineFault {
    EngineFault::new(js_message(&err))
}

/// Logs a failure of a JS call that has no error channel.
pub(crate) fn report(call: &str, result: Result<(), JsValue>) {
    if let Err(err) = result {
        web_sys::console::error_1(&JsValue::from_str(&failure_text(call, &js_message(&err))));
    }
}

fn failure_text(call: &str, message: &str) -> String {
    format!("{call} failed: {message}")
}

#[derive(Default)]
pub struct OlBackend {
    flat_handle: Option<JsValue>,
}

impl OlBackend {
    /// Handle of the most recently created map, for attaching host controls.
    pub fn flat_handle(&self) -> Option<&JsValue> {
        self.flat_handle.as_ref()
    }
}

impl EngineBackend for OlBackend {
    type Flat = OlFlat;
    type Globe = OlGlobe;

    fn create_flat(
        &mut self,
        target: &RenderTarget,
        view: FlatView,
    ) -> Result<Self::Flat, EngineFault> {
        let handle = vs_create_flat(&target.0, view.center.x_m, view.center.y_m, view.zoom)
            .map_err(fault)?;
        self.flat_handle = Some(handle.clone());
        Ok(OlFlat {
            handle,
            listeners: HashMap::new(),
            next_key: 0,
        })
    }

    fn create_globe(&mut self, flat: &Self::Flat) -> Result<Self::Globe, EngineFault> {
        let handle = vs_create_globe(&flat.handle).map_err(fault)?;
        Ok(OlGlobe { handle })
    }
}

pub struct OlFlat {
    handle: JsValue,
    listeners: HashMap<ListenerKey, (JsValue, Closure<dyn FnMut(f64)>)>,
    next_key: u64,
}

impl FlatEngine for OlFlat {
    fn center(&self) -> FlatCoord {
        match vs_flat_center(&self.handle).as_slice() {
            [x, y] => FlatCoord::new(*x, *y),
            _ => FlatCoord::new(f64::NAN, f64::NAN),
        }
    }

    fn zoom(&self) -> f64 {
        vs_flat_zoom(&self.handle)
    }

    fn set_center(&mut self, center: FlatCoord) {
        report("setCenter", vs_set_center(&self.handle, center.x_m, center.y_m));
    }

    fn set_zoom(&mut self, zoom: f64) {
        report("setZoom", vs_set_zoom(&self.handle, zoom));
    }

    fn animate(&mut self, animation: FlatAnimation) {
        report(
            "animate",
            vs_animate(
                &self.handle,
                animation.center.x_m,
                animation.center.y_m,
                animation.zoom,
                animation.duration_ms,
            ),
        );
    }

    fn on_resolution_change(&mut self, listener: ResolutionListener) -> ListenerKey {
        let key = ListenerKey(self.next_key);
        self.next_key += 1;
        let closure = Closure::wrap(listener);
        match vs_on_resolution(&self.handle, &closure) {
            Ok(js_key) => {
                self.listeners.insert(key, (js_key, closure));
            }
            Err(err) => report("on change:resolution", Err(err)),
        }
        key
    }

    fn remove_listener(&mut self, key: ListenerKey) -> bool {
        let Some((js_key, _closure)) = self.listeners.remove(&key) else {
            return false;
        };
        report("unByKey", vs_unlisten(&js_key));
        true
    }

    fn set_location_feature(&mut self, marker: Option<FlatMarker>) {
        let result = match marker {
            Some(m) => vs_set_location_feature(
                &self.handle,
                m.position.x_m,
                m.position.y_m,
                m.style.radius_px,
                &m.style.fill.to_css_hex(),
                &m.style.stroke.to_css_hex(),
                m.style.stroke_width_px,
            ),
            None => vs_clear_location_feature(&self.handle),
        };
        report("location layer update", result);
    }

    fn detach_target(&mut self) -> Result<(), EngineFault> {
        vs_detach(&self.handle).map_err(fault)
    }
}

pub struct OlGlobe {
    handle: JsValue,
}

impl GlobeEngine for OlGlobe {
    fn enabled(&self) -> bool {
        vs_globe_enabled(&self.handle)
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), EngineFault> {
        vs_globe_set_enabled(&self.handle, enabled).map_err(fault)
    }

    fn fly_to(&mut self, flight: GlobeFlight) {
        let d = flight.destination;
        report(
            "camera.flyTo",
            vs_globe_fly_to(&self.handle, d.x, d.y, d.z, flight.duration_s),
        );
    }

    fn set_point_marker(&mut self, marker: Option<PointMarker>) {
        let result = match marker {
            Some(m) => vs_globe_set_point(
                &self.handle,
                m.position.x,
                m.position.y,
                m.position.z,
                m.style.pixel_size,
                &m.style.color.to_css_hex(),
                &m.style.outline_color.to_css_hex(),
                m.style.outline_width_px,
                m.style.height == HeightReference::ClampToGround,
                m.style.disable_depth_test_distance,
            ),
            None => vs_globe_clear_point(&self.handle),
        };
        report("point primitive update", result);
    }

    fn destroy(&mut self) -> Result<(), EngineFault> {
        vs_globe_destroy(&self.handle).map_err(fault)
    }
}

/// Installs an OpenLayers mouse-position control rendering into `element_id`.
/// The returned closure must outlive the map.
pub fn add_mouse_position(
    handle: &JsValue,
    element_id: &str,
) -> Result<Closure<dyn FnMut(f64, f64) -> String>, JsValue> {
    let format = Closure::wrap(Box::new(|x: f64, y: f64| {
        viewsync::format_pointer(FlatCoord::new(x, y))
    }) as Box<dyn FnMut(f64, f64) -> String>);
    vs_add_mouse_position(handle, element_id, &format)?;
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::failure_text;

    #[test]
    fn failure_text_names_the_call() {
        assert_eq!(
            failure_text("set toggle title", "InvalidCharacterError"),
            "set toggle title failed: InvalidCharacterError"
        );
    }
}
