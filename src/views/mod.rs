//! View adapters that drive a [`MapCanvasController`] from application state.
//!
//! Views are cheap `Clone` handles. Their state lives behind a mutex that is
//! never held across an `.await`, and consumer callbacks run after it is
//! released, so a callback may call back into the view.

pub mod browse;
pub mod geolocation;
pub mod picker;

pub use browse::{BrowseSnapshot, DomainItem, MapView};
#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub use geolocation::BrowserGeolocation;
pub use geolocation::{FixedLocation, GeolocationError, LocationProvider};
pub use picker::{LocationPickerView, LookupOutcome, PickerSnapshot};

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::assets::{loader::AssetLoader, host::AssetLoadError};
use crate::canvas::{CanvasBackend, MapCanvasController, MarkerIcon};
use crate::core::config::MapLayerConfig;
use crate::tiles::source::TemplateTileSource;

/// What a view is currently showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ViewMode {
    /// Waiting for the map assets
    Pending,
    /// Interactive canvas
    Live,
    /// Plain text input, no canvas. Permanent for the view.
    Fallback,
    /// Unmounted; the canvas has been released
    Closed,
}

pub(crate) fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn controller_for(
    config: &MapLayerConfig,
    backend: Box<dyn CanvasBackend>,
) -> MapCanvasController {
    MapCanvasController::new(
        backend,
        Arc::new(TemplateTileSource::new(&config.tiles)),
        MarkerIcon::from(&config.marker_icon),
    )
}

/// Mount the canvas once the asset load has settled. Any failure on the way
/// leaves the view in [`ViewMode::Fallback`] with nothing mounted.
pub(crate) fn bring_up(
    controller: &mut MapCanvasController,
    container: &str,
    loader: &AssetLoader,
    assets: Result<(), AssetLoadError>,
    config: &MapLayerConfig,
) -> ViewMode {
    if let Err(e) = assets {
        log::warn!("map unavailable, falling back to text input: {}", e);
        return ViewMode::Fallback;
    }

    if let Err(e) = controller.initialize(container, loader) {
        log::error!("{}", e);
        return ViewMode::Fallback;
    }
    if !controller.is_initialized() {
        log::warn!("map canvas could not be mounted on {}", container);
        return ViewMode::Fallback;
    }

    if let Err(e) = controller.set_view(config.view.default_center, config.view.default_zoom) {
        log::error!("{}", e);
    }
    ViewMode::Live
}
