//! Prelude module for common donation-map types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use donation_map::prelude::*;`

pub use crate::core::{
    config::{AssetConfig, GeocoderConfig, MapLayerConfig, MarkerIconConfig, TileConfig, ViewConfig},
    geo::{GeoPoint, TileCoord},
};

pub use crate::assets::{
    host::{AssetHost, AssetKind, AssetLoadError, HttpAssetHost, PreloadedAssetHost},
    loader::{AssetLoader, LoadState},
};

pub use crate::geocode::{
    nominatim::NominatimGeocoder,
    sequence::{RequestSequencer, Ticket},
    service::{bounded, Address, Geocoder, NetworkError},
};

pub use crate::canvas::{
    backend::{CanvasBackend, CanvasError, CanvasEvent, CanvasEventKind, LayerId},
    controller::{CanvasState, InvalidStateError, MapCanvasController, MapEvent},
    marker::{MarkerHandle, MarkerIcon},
    scene::LayerCanvas,
};

pub use crate::tiles::source::{TemplateTileSource, TileSource};

pub use crate::views::{
    browse::{BrowseSnapshot, DomainItem, MapView},
    geolocation::{FixedLocation, GeolocationError, LocationProvider},
    picker::{LocationPickerView, LookupOutcome, PickerSnapshot},
    ViewMode,
};

pub use crate::{MapError, Result};

pub use std::{sync::Arc, time::Duration};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet, FxHasher};
