//! # donation-map
//!
//! Map integration layer for the food-donation marketplace client.
//!
//! The layer lazily loads the map library and its routing plugin in
//! dependency order, owns the live map canvas, geocodes place names and
//! coordinates, and drives two views: a read-only browsing map and a
//! location picker. Every loading or network failure degrades to a usable
//! plain-text mode instead of crashing the page.

pub mod assets;
pub mod canvas;
pub mod core;
pub mod geocode;
pub mod prelude;
pub mod tiles;
pub mod views;
pub use crate::core::constants;

// Re-export public API
pub use assets::{AssetHost, AssetKind, AssetLoadError, AssetLoader, LoadState};

pub use canvas::{
    CanvasBackend, CanvasEvent, CanvasState, InvalidStateError, LayerCanvas, MapCanvasController,
    MapEvent, MarkerHandle, MarkerIcon,
};

pub use crate::core::{config::MapLayerConfig, geo::GeoPoint};

pub use geocode::{Address, Geocoder, NetworkError, NominatimGeocoder};

pub use tiles::{TemplateTileSource, TileSource};

pub use views::{DomainItem, LocationPickerView, LookupOutcome, MapView, ViewMode};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// Unrecoverable for the session
    #[error("Asset load error: {0}")]
    AssetLoad(#[from] AssetLoadError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// An operation was invoked before the assets were ready or after dispose
    #[error("Invalid state: {0}")]
    InvalidState(#[from] InvalidStateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Route `log` output to stderr, honoring `RUST_LOG`. Safe to call more than once.
#[cfg(feature = "debug")]
pub fn init_debug_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .is_test(cfg!(test))
        .try_init();
}
