//! Nominatim-compatible geocoding client.
//!
//! Forward: `GET {base}/search?q=..&format=json&limit=1`, an array of candidates.
//! Reverse: `GET {base}/reverse?lat=..&lon=..&format=json`, one object with
//! `display_name`, or `{"error": ..}` when nothing is there.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use reqwest::Url;
use serde_json::Value;

use super::service::{Address, Geocoder, NetworkError};
use crate::core::{config::GeocoderConfig, geo::GeoPoint};
use crate::{MapError, Result};

pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    country_codes: Vec<String>,
    /// Successful forward lookups only
    forward_cache: Option<Mutex<LruCache<String, GeoPoint>>>,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let builder = reqwest::Client::builder().user_agent(config.user_agent.as_str());
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(config.timeout());
        let client = builder
            .build()
            .map_err(|e| MapError::Config(format!("cannot build HTTP client: {}", e)))?;

        Self::with_client(client, config)
    }

    pub fn with_client(client: reqwest::Client, config: &GeocoderConfig) -> Result<Self> {
        // Without a trailing slash `join` would replace the last path segment
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| MapError::Config(format!("invalid geocoder base_url {:?}: {}", base, e)))?;

        let forward_cache = NonZeroUsize::new(config.forward_cache_size)
            .map(|capacity| Mutex::new(LruCache::new(capacity)));

        Ok(Self {
            client,
            base_url,
            timeout: config.timeout(),
            country_codes: config.country_codes.clone(),
            forward_cache,
        })
    }

    pub fn forward_url(&self, place: &str) -> Url {
        let mut url = self.endpoint("search");
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("q", place)
                .append_pair("format", "json")
                .append_pair("limit", "1");
            if !self.country_codes.is_empty() {
                query.append_pair("countrycodes", &self.country_codes.join(","));
            }
        }
        url
    }

    pub fn reverse_url(&self, point: GeoPoint) -> Url {
        let mut url = self.endpoint("reverse");
        url.query_pairs_mut()
            .append_pair("lat", &point.latitude.to_string())
            .append_pair("lon", &point.longitude.to_string())
            .append_pair("format", "json");
        url
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(path);
        }
        url
    }

    async fn get_json(&self, url: Url) -> std::result::Result<Value, NetworkError> {
        log::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_str(&body).map_err(|e| NetworkError::InvalidJson(e.to_string()))
    }

    fn transport_error(&self, error: reqwest::Error) -> NetworkError {
        if error.is_timeout() {
            NetworkError::Timeout(self.timeout)
        } else {
            NetworkError::Transport(error.to_string())
        }
    }

    fn cached(&self, key: &str) -> Option<GeoPoint> {
        let cache = self.forward_cache.as_ref()?;
        let mut cache = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.get(key).copied()
    }

    fn remember(&self, key: String, point: GeoPoint) {
        if let Some(cache) = &self.forward_cache {
            cache
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .put(key, point);
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Geocoder for NominatimGeocoder {
    async fn forward(&self, place: &str) -> std::result::Result<Option<GeoPoint>, NetworkError> {
        let place = place.trim();
        if place.is_empty() {
            return Ok(None);
        }

        let key = place.to_lowercase();
        if let Some(point) = self.cached(&key) {
            log::debug!("forward cache hit for {:?}", place);
            return Ok(Some(point));
        }

        let body = self.get_json(self.forward_url(place)).await?;
        let found = parse_forward(&body)?;
        if let Some(point) = found {
            self.remember(key, point);
        }
        Ok(found)
    }

    async fn reverse(&self, point: GeoPoint) -> std::result::Result<Option<Address>, NetworkError> {
        let body = self.get_json(self.reverse_url(point)).await?;
        parse_reverse(&body)
    }
}

/// First candidate of a forward search; an empty array is `None`
pub fn parse_forward(body: &Value) -> std::result::Result<Option<GeoPoint>, NetworkError> {
    let candidates = body
        .as_array()
        .ok_or_else(|| NetworkError::InvalidJson("expected an array of candidates".into()))?;

    let Some(first) = candidates.first() else {
        return Ok(None);
    };

    let point = GeoPoint::new(coordinate(first, "lat")?, coordinate(first, "lon")?);
    if !point.is_valid() {
        return Err(NetworkError::InvalidJson(format!(
            "candidate {} is out of range",
            point
        )));
    }
    Ok(Some(point))
}

/// Display address of a reverse lookup; an `error` object is `None`
pub fn parse_reverse(body: &Value) -> std::result::Result<Option<Address>, NetworkError> {
    let object = body
        .as_object()
        .ok_or_else(|| NetworkError::InvalidJson("expected an object".into()))?;

    if object.contains_key("error") {
        return Ok(None);
    }

    match object.get("display_name").and_then(Value::as_str) {
        Some(name) if !name.trim().is_empty() => Ok(Some(Address::new(name))),
        _ => Err(NetworkError::MissingField("display_name")),
    }
}

/// Nominatim sends coordinates as strings; accept numbers too
fn coordinate(candidate: &Value, field: &'static str) -> std::result::Result<f64, NetworkError> {
    match candidate.get(field) {
        Some(Value::String(text)) => text
            .trim()
            .parse()
            .map_err(|_| NetworkError::MissingField(field)),
        Some(Value::Number(number)) => number.as_f64().ok_or(NetworkError::MissingField(field)),
        _ => Err(NetworkError::MissingField(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn geocoder() -> NominatimGeocoder {
        NominatimGeocoder::new(&GeocoderConfig::default()).unwrap()
    }

    #[test]
    fn test_forward_url_encodes_input() {
        let url = geocoder().forward_url("Bandra West & Co, Mumbai");
        assert_eq!(url.path(), "/search");
        let query = url.query().unwrap();
        assert!(query.contains("q=Bandra+West+%26+Co%2C+Mumbai"));
        assert!(query.contains("format=json"));
        assert!(query.contains("limit=1"));
    }

    #[test]
    fn test_reverse_url_carries_coordinates() {
        let url = geocoder().reverse_url(GeoPoint::new(19.076, 72.8777));
        assert_eq!(url.path(), "/reverse");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("lat".into(), "19.076".into())));
        assert!(pairs.contains(&("lon".into(), "72.8777".into())));
    }

    #[test]
    fn test_base_url_with_path_prefix() {
        let config = GeocoderConfig {
            base_url: "http://geo.local/nominatim".into(),
            country_codes: vec!["in".into()],
            ..GeocoderConfig::default()
        };
        let geocoder = NominatimGeocoder::new(&config).unwrap();
        let url = geocoder.forward_url("Pune");
        assert_eq!(url.path(), "/nominatim/search");
        assert!(url.query().unwrap().contains("countrycodes=in"));
    }

    #[test]
    fn test_invalid_base_url_is_a_config_error() {
        let config = GeocoderConfig {
            base_url: "not a url".into(),
            ..GeocoderConfig::default()
        };
        assert!(matches!(
            NominatimGeocoder::new(&config),
            Err(MapError::Config(_))
        ));
    }

    #[test]
    fn test_parse_forward_first_candidate() {
        let body = json!([
            { "lat": "19.0760", "lon": "72.8777", "display_name": "Mumbai" },
            { "lat": "0", "lon": "0" }
        ]);
        assert_eq!(
            parse_forward(&body).unwrap(),
            Some(GeoPoint::new(19.0760, 72.8777))
        );

        let numeric = json!([{ "lat": 18.52, "lon": 73.8567 }]);
        assert_eq!(
            parse_forward(&numeric).unwrap(),
            Some(GeoPoint::new(18.52, 73.8567))
        );
    }

    #[test]
    fn test_parse_forward_empty_is_not_found() {
        assert_eq!(parse_forward(&json!([])).unwrap(), None);
    }

    #[test]
    fn test_parse_forward_malformed() {
        assert_eq!(
            parse_forward(&json!([{ "lat": "19.07" }])),
            Err(NetworkError::MissingField("lon"))
        );
        assert_eq!(
            parse_forward(&json!([{ "lat": "north", "lon": "72.8" }])),
            Err(NetworkError::MissingField("lat"))
        );
        assert!(matches!(
            parse_forward(&json!({ "lat": "1" })),
            Err(NetworkError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_forward(&json!([{ "lat": "123", "lon": "0" }])),
            Err(NetworkError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_parse_reverse() {
        let body = json!({ "display_name": "Mumbai, Maharashtra, India", "lat": "19.07" });
        assert_eq!(
            parse_reverse(&body).unwrap(),
            Some(Address::from("Mumbai, Maharashtra, India"))
        );
        assert_eq!(
            parse_reverse(&json!({ "error": "Unable to geocode" })).unwrap(),
            None
        );
        assert_eq!(
            parse_reverse(&json!({ "lat": "19.07" })),
            Err(NetworkError::MissingField("display_name"))
        );
        assert!(matches!(
            parse_reverse(&json!([])),
            Err(NetworkError::InvalidJson(_))
        ));
    }

    #[tokio::test]
    async fn test_blank_search_skips_the_network() {
        let config = GeocoderConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..GeocoderConfig::default()
        };
        let geocoder = NominatimGeocoder::new(&config).unwrap();
        assert_eq!(geocoder.forward("   ").await, Ok(None));
    }
}
