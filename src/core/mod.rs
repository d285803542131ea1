pub mod config;
pub mod constants;
pub mod geo;

pub use config::{
    AssetConfig, GeocoderConfig, MapLayerConfig, MarkerIconConfig, TileConfig, ViewConfig,
};
pub use geo::{GeoPoint, TileCoord};
