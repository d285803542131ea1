//! Configuration for the map integration layer
//!
//! Every section has working defaults pointing at the public Leaflet CDN,
//! OpenStreetMap tiles and the public Nominatim instance. Partial JSON
//! documents are accepted; missing fields fall back to the defaults.

use crate::core::{
    constants::{
        DEFAULT_CENTER, DEFAULT_ZOOM, FALLBACK_AFTER_FAILURES, GEOCODE_TIMEOUT_MS,
        LEAFLET_CSS_URL, LEAFLET_JS_URL, LOCATE_ZOOM, MARKER_ICON_ANCHOR, MARKER_ICON_SIZE,
        MARKER_ICON_URL, MAX_TILE_ZOOM, NOMINATIM_URL, OSM_ATTRIBUTION, OSM_TILE_TEMPLATE,
        ROUTING_PLUGIN_URL, SEARCH_ZOOM,
    },
    geo::GeoPoint,
};
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MapLayerConfig {
    pub assets: AssetConfig,
    pub geocoder: GeocoderConfig,
    pub tiles: TileConfig,
    pub view: ViewConfig,
    pub marker_icon: MarkerIconConfig,
}

impl MapLayerConfig {
    /// Loopback endpoints and short timeouts, for tests and offline demos
    pub fn offline() -> Self {
        Self {
            assets: AssetConfig {
                stylesheet_url: "http://127.0.0.1:9/leaflet.css".to_string(),
                library_url: "http://127.0.0.1:9/leaflet.js".to_string(),
                plugin_url: "http://127.0.0.1:9/leaflet-routing-machine.js".to_string(),
            },
            geocoder: GeocoderConfig {
                base_url: "http://127.0.0.1:9".to_string(),
                timeout_ms: 500,
                ..GeocoderConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let urls = [
            ("assets.stylesheet_url", &self.assets.stylesheet_url),
            ("assets.library_url", &self.assets.library_url),
            ("assets.plugin_url", &self.assets.plugin_url),
            ("geocoder.base_url", &self.geocoder.base_url),
            ("tiles.url_template", &self.tiles.url_template),
            ("marker_icon.url", &self.marker_icon.url),
        ];
        for (field, value) in urls {
            if value.trim().is_empty() {
                return Err(MapError::Config(format!("{} must not be empty", field)));
            }
        }

        if self.geocoder.timeout_ms == 0 {
            return Err(MapError::Config("geocoder.timeout_ms must be positive".into()));
        }

        let (width, height) = self.marker_icon.size;
        let (anchor_x, anchor_y) = self.marker_icon.anchor;
        if anchor_x > width || anchor_y > height {
            return Err(MapError::Config(format!(
                "marker anchor {:?} lies outside a {}x{} icon",
                self.marker_icon.anchor, width, height
            )));
        }

        if !self.view.default_center.is_valid() {
            return Err(MapError::Config(format!(
                "view.default_center {} is not a valid coordinate",
                self.view.default_center
            )));
        }

        let max_zoom = self.tiles.max_zoom as f64;
        for (field, zoom) in [
            ("view.default_zoom", self.view.default_zoom),
            ("view.search_zoom", self.view.search_zoom),
            ("view.locate_zoom", self.view.locate_zoom),
        ] {
            if !(0.0..=max_zoom).contains(&zoom) {
                return Err(MapError::Config(format!(
                    "{} = {} is outside 0..={}",
                    field, zoom, max_zoom
                )));
            }
        }

        Ok(())
    }
}

/// The three browser assets, loaded in this order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub stylesheet_url: String,
    pub library_url: String,
    /// Extends the library namespace; must only load after `library_url`
    pub plugin_url: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            stylesheet_url: LEAFLET_CSS_URL.to_string(),
            library_url: LEAFLET_JS_URL.to_string(),
            plugin_url: ROUTING_PLUGIN_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub forward_cache_size: usize,
    /// Optional ISO 3166-1 alpha-2 codes restricting forward search
    pub country_codes: Vec<String>,
}

impl GeocoderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: NOMINATIM_URL.to_string(),
            user_agent: concat!("donation-map/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_ms: GEOCODE_TIMEOUT_MS,
            forward_cache_size: 64,
            country_codes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    pub url_template: String,
    pub subdomains: Vec<String>,
    pub attribution: String,
    pub max_zoom: u8,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            url_template: OSM_TILE_TEMPLATE.to_string(),
            subdomains: vec!["a".into(), "b".into(), "c".into()],
            attribution: OSM_ATTRIBUTION.to_string(),
            max_zoom: MAX_TILE_ZOOM,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub default_center: GeoPoint,
    pub default_zoom: f64,
    pub search_zoom: f64,
    pub locate_zoom: f64,
    pub fallback_after_failures: u32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            default_center: GeoPoint::new(DEFAULT_CENTER.0, DEFAULT_CENTER.1),
            default_zoom: DEFAULT_ZOOM,
            search_zoom: SEARCH_ZOOM,
            locate_zoom: LOCATE_ZOOM,
            fallback_after_failures: FALLBACK_AFTER_FAILURES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerIconConfig {
    pub url: String,
    pub size: (u32, u32),
    pub anchor: (u32, u32),
}

impl Default for MarkerIconConfig {
    fn default() -> Self {
        Self {
            url: MARKER_ICON_URL.to_string(),
            size: MARKER_ICON_SIZE,
            anchor: MARKER_ICON_ANCHOR,
        }
    }
}
