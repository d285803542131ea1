//! One-shot device location requests.
//!
//! A request is only ever made when the user asks for it. A denial ends that
//! request; the caller logs it and carries on without a location.

use async_trait::async_trait;

use crate::core::geo::GeoPoint;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeolocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("position unavailable: {0}")]
    Unavailable(String),

    #[error("location request timed out")]
    Timeout,
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<GeoPoint, GeolocationError>;
}

/// Always answers with the same outcome
#[derive(Debug, Clone, PartialEq)]
pub struct FixedLocation(Result<GeoPoint, GeolocationError>);

impl FixedLocation {
    pub fn at(point: GeoPoint) -> Self {
        Self(Ok(point))
    }

    pub fn denied() -> Self {
        Self(Err(GeolocationError::PermissionDenied))
    }

    pub fn failing(error: GeolocationError) -> Self {
        Self(Err(error))
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl LocationProvider for FixedLocation {
    async fn current_position(&self) -> Result<GeoPoint, GeolocationError> {
        self.0.clone()
    }
}

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub use browser::BrowserGeolocation;

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
mod browser {
    use std::cell::RefCell;
    use std::rc::Rc;

    use async_trait::async_trait;
    use futures::channel::oneshot;
    use wasm_bindgen::{closure::Closure, JsCast, JsValue};

    use super::{GeolocationError, LocationProvider};
    use crate::core::geo::GeoPoint;

    // GeolocationPositionError codes
    const PERMISSION_DENIED: u16 = 1;
    const TIMEOUT: u16 = 3;

    /// `navigator.geolocation.getCurrentPosition`
    #[derive(Debug, Default, Clone, Copy)]
    pub struct BrowserGeolocation;

    fn number(value: &JsValue, key: &str) -> Option<f64> {
        js_sys::Reflect::get(value, &JsValue::from_str(key))
            .ok()
            .and_then(|field| field.as_f64())
    }

    fn read_position(position: &JsValue) -> Result<GeoPoint, GeolocationError> {
        let coords = js_sys::Reflect::get(position, &JsValue::from_str("coords"))
            .map_err(|_| GeolocationError::Unavailable("position has no coords".into()))?;
        match (number(&coords, "latitude"), number(&coords, "longitude")) {
            (Some(latitude), Some(longitude)) => Ok(GeoPoint::new(latitude, longitude)),
            _ => Err(GeolocationError::Unavailable("malformed coords".into())),
        }
    }

    fn read_error(error: &JsValue) -> GeolocationError {
        match number(error, "code").map(|code| code as u16) {
            Some(PERMISSION_DENIED) => GeolocationError::PermissionDenied,
            Some(TIMEOUT) => GeolocationError::Timeout,
            _ => {
                let message = js_sys::Reflect::get(error, &JsValue::from_str("message"))
                    .ok()
                    .and_then(|message| message.as_string())
                    .unwrap_or_default();
                GeolocationError::Unavailable(message)
            }
        }
    }

    #[async_trait(?Send)]
    impl LocationProvider for BrowserGeolocation {
        async fn current_position(&self) -> Result<GeoPoint, GeolocationError> {
            let geolocation = web_sys::window()
                .ok_or_else(|| GeolocationError::Unavailable("no window".into()))?
                .navigator()
                .geolocation()
                .map_err(|_| GeolocationError::Unavailable("geolocation unsupported".into()))?;

            let (tx, rx) = oneshot::channel::<Result<GeoPoint, GeolocationError>>();
            let tx = Rc::new(RefCell::new(Some(tx)));

            let on_success = {
                let tx = tx.clone();
                Closure::<dyn FnMut(JsValue)>::new(move |position: JsValue| {
                    if let Some(tx) = tx.borrow_mut().take() {
                        let _ = tx.send(read_position(&position));
                    }
                })
            };
            let on_error = {
                let tx = tx.clone();
                Closure::<dyn FnMut(JsValue)>::new(move |error: JsValue| {
                    if let Some(tx) = tx.borrow_mut().take() {
                        let _ = tx.send(Err(read_error(&error)));
                    }
                })
            };

            geolocation
                .get_current_position_with_error_callback(
                    on_success.as_ref().unchecked_ref(),
                    Some(on_error.as_ref().unchecked_ref()),
                )
                .map_err(|_| GeolocationError::Unavailable("request rejected".into()))?;

            // The closures must outlive the callback
            let outcome = rx
                .await
                .unwrap_or_else(|_| Err(GeolocationError::Unavailable("request dropped".into())));
            drop(on_success);
            drop(on_error);
            outcome
        }
    }
}
