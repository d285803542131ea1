//! The geocoding contract shared by every backend, and the call timeout.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::geo::GeoPoint;

/// Recoverable, per-call failure. The caller keeps whatever it had before.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    InvalidJson(String),

    #[error("response is missing `{0}`")]
    MissingField(&'static str),

    #[error("no response within {0:?}")]
    Timeout(Duration),
}

/// Display address bound to a point by the last successful reverse lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Address {
    fn from(text: String) -> Self {
        Self(text)
    }
}

/// Forward and reverse lookups against a remote geocoding service.
///
/// `Ok(None)` means the service answered but found nothing; that is an
/// expected outcome, not an error. Each call is a single attempt.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait Geocoder: Send + Sync {
    /// Place name to coordinate; the first candidate wins
    async fn forward(&self, place: &str) -> Result<Option<GeoPoint>, NetworkError>;

    /// Coordinate to display address
    async fn reverse(&self, point: GeoPoint) -> Result<Option<Address>, NetworkError>;
}

/// Bound a geocode call; expiry becomes [`NetworkError::Timeout`]
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, NetworkError>
where
    F: Future<Output = Result<T, NetworkError>>,
{
    #[cfg(feature = "tokio-runtime")]
    {
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(NetworkError::Timeout(limit)),
        }
    }

    #[cfg(not(feature = "tokio-runtime"))]
    {
        // No timer available; the transport's own timeout applies
        let _ = limit;
        call.await
    }
}
