//! Where assets actually get loaded.
//!
//! In a browser the host injects `<link>`/`<script>` tags into the document
//! (see [`super::document`]). Natively, [`HttpAssetHost`] fetches the same
//! resources and keeps their bytes for an embedding web view.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Mutex;

use crate::prelude::HashMap;

/// The three assets the map layer depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AssetKind {
    Stylesheet,
    Library,
    /// Routing/geocoding plugin; augments the library namespace
    Plugin,
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetKind::Stylesheet => write!(f, "stylesheet"),
            AssetKind::Library => write!(f, "library"),
            AssetKind::Plugin => write!(f, "plugin"),
        }
    }
}

/// Unrecoverable for the session: the map falls back to a plain text input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to load {asset} from {url}: {reason}")]
pub struct AssetLoadError {
    pub asset: AssetKind,
    pub url: String,
    pub reason: String,
}

impl AssetLoadError {
    pub fn new(asset: AssetKind, url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            asset,
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Loads one asset and resolves once it is usable
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait AssetHost: Send + Sync {
    async fn load(&self, asset: AssetKind, url: &str) -> Result<(), AssetLoadError>;
}

/// For pages that already include the assets (bundled or static tags):
/// every load resolves immediately
#[derive(Debug, Default, Clone, Copy)]
pub struct PreloadedAssetHost;

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl AssetHost for PreloadedAssetHost {
    async fn load(&self, asset: AssetKind, url: &str) -> Result<(), AssetLoadError> {
        log::debug!("{} {} is preloaded", asset, url);
        Ok(())
    }
}

/// Fetches assets over HTTP and keeps the bodies in memory
pub struct HttpAssetHost {
    client: reqwest::Client,
    fetched: Mutex<HashMap<String, Vec<u8>>>,
}

impl HttpAssetHost {
    pub fn new(user_agent: &str) -> Result<Self, AssetLoadError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| AssetLoadError::new(AssetKind::Library, "", e.to_string()))?;

        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            fetched: Mutex::new(HashMap::default()),
        }
    }

    /// Body of a previously loaded asset
    pub fn asset(&self, url: &str) -> Option<Vec<u8>> {
        self.fetched
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(url)
            .cloned()
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl AssetHost for HttpAssetHost {
    async fn load(&self, asset: AssetKind, url: &str) -> Result<(), AssetLoadError> {
        let fail = |reason: String| AssetLoadError::new(asset, url, reason);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fail(format!("HTTP {}", response.status())));
        }

        let body = response.bytes().await.map_err(|e| fail(e.to_string()))?;
        if body.is_empty() {
            return Err(fail("empty body".to_string()));
        }

        log::debug!("fetched {} {} ({} bytes)", asset, url, body.len());
        self.fetched
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(url.to_string(), body.to_vec());
        Ok(())
    }
}
