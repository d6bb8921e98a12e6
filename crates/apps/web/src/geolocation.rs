use std::cell::RefCell;
use std::rc::Rc;

use viewsync::{Fix, FixCallback, GeolocationProvider, PositionError, PositionErrorKind};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::ol::js_message;

/// `navigator.geolocation`.
#[derive(Debug, Default)]
pub struct BrowserGeolocation;

impl GeolocationProvider for BrowserGeolocation {
    fn is_available(&self) -> bool {
        web_sys::window()
            .map(|w| w.navigator())
            .is_some_and(|nav| js_sys::Reflect::has(&nav, &JsValue::from_str("geolocation")).unwrap_or(false))
    }

    fn current_position(&mut self, on_complete: FixCallback) {
        // Exactly one of the two browser callbacks fires; whichever runs first
        // takes the completion.
        let slot: Rc<RefCell<Option<FixCallback>>> = Rc::new(RefCell::new(Some(on_complete)));

        let on_success = Rc::clone(&slot);
        let success = Closure::once_into_js(move |position: JsValue| {
            let callback = on_success.borrow_mut().take();
            if let Some(callback) = callback {
                callback(parse_position(&position));
            }
        });

        let on_error = Rc::clone(&slot);
        let error = Closure::once_into_js(move |err: JsValue| {
            let callback = on_error.borrow_mut().take();
            if let Some(callback) = callback {
                callback(Err(parse_error(&err)));
            }
        });

        let requested = web_sys::window()
            .ok_or_else(|| JsValue::from_str("no window"))
            .and_then(|w| w.navigator().geolocation())
            .and_then(|geo| {
                geo.get_current_position_with_error_callback(
                    success.unchecked_ref(),
                    Some(error.unchecked_ref()),
                )
            });

        if let Err(err) = requested {
            let callback = slot.borrow_mut().take();
            if let Some(callback) = callback {
                callback(Err(PositionError::new(
                    PositionErrorKind::PositionUnavailable,
                    js_message(&err),
                )));
            }
        }
    }
}

fn number(obj: &JsValue, key: &str) -> Option<f64> {
    js_sys::Reflect::get(obj, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_f64())
}

fn parse_position(position: &JsValue) -> Result<Fix, PositionError> {
    let coords = js_sys::Reflect::get(position, &JsValue::from_str("coords"))
        .ok()
        .filter(|c| c.is_object());
    let malformed = || PositionError::new(PositionErrorKind::PositionUnavailable, "malformed position");
    let coords = coords.ok_or_else(malformed)?;

    Ok(Fix {
        lon_deg: number(&coords, "longitude").ok_or_else(malformed)?,
        lat_deg: number(&coords, "latitude").ok_or_else(malformed)?,
        altitude_m: number(&coords, "altitude"),
        accuracy_m: number(&coords, "accuracy"),
    })
}

fn parse_error(err: &JsValue) -> PositionError {
    let code = number(err, "code").unwrap_or(2.0) as u16;
    let message = js_sys::Reflect::get(err, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_default();
    PositionError::new(PositionErrorKind::from_code(code), message)
}
