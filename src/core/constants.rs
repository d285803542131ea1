//! Engine-wide magic numbers and reserved identifiers, kept in one place.

/// Marker id reserved for the location picker's single draggable marker.
pub const PICKER_MARKER_ID: &str = "picker";

/// Marker id reserved for the device location in the browsing map.
pub const USER_MARKER_ID: &str = "you";

/// Marker icon size in pixels.
pub const MARKER_ICON_SIZE: (u32, u32) = (32, 32);

/// Anchor inside the icon (hot-spot) in pixel coords: bottom-center.
pub const MARKER_ICON_ANCHOR: (u32, u32) = (16, 32);

/// Default marker icon image.
pub const MARKER_ICON_URL: &str = "https://cdn-icons-png.flaticon.com/512/684/684908.png";

/// Zoom used when a forward search recenters the picker.
pub const SEARCH_ZOOM: f64 = 15.0;

/// Zoom used when centering on the device location.
pub const LOCATE_ZOOM: f64 = 14.0;

/// Initial view when nothing better is known.
pub const DEFAULT_CENTER: (f64, f64) = (19.0760, 72.8777);
pub const DEFAULT_ZOOM: f64 = 12.0;

/// Highest zoom offered by the default tile provider.
pub const MAX_TILE_ZOOM: u8 = 19;

/// Default tile provider.
pub const OSM_TILE_TEMPLATE: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const OSM_ATTRIBUTION: &str = "© OpenStreetMap contributors";

/// Map library and routing plugin.
pub const LEAFLET_CSS_URL: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";
pub const LEAFLET_JS_URL: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";
pub const ROUTING_PLUGIN_URL: &str =
    "https://unpkg.com/leaflet-routing-machine@3.2.12/dist/leaflet-routing-machine.js";

/// Public Nominatim instance.
pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

/// Bound on a single geocode round trip.
pub const GEOCODE_TIMEOUT_MS: u64 = 10_000;

/// Consecutive network failures before the picker gives up on the live canvas.
pub const FALLBACK_AFTER_FAILURES: u32 = 3;
