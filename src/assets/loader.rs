//! One-per-page loading of the map library, its stylesheet and the routing plugin.
//!
//! The plugin augments the library's namespace, so it is only requested after
//! the library has finished loading. Every caller of [`AssetLoader::ensure_ready`]
//! shares the single in-flight load, and the outcome is kept for the lifetime
//! of the loader: a failure is never retried automatically.

use std::sync::{Arc, Mutex, OnceLock};

use serde::Serialize;
use tokio::sync::OnceCell;

use super::host::{AssetHost, AssetKind, AssetLoadError};
use crate::core::config::AssetConfig;

/// Lifecycle of the asset load. Transitions only move forward;
/// `Ready` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LoadState {
    NotStarted,
    LoadingLibrary,
    LoadingPlugin,
    Ready,
    Failed,
}

impl LoadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadState::Ready | LoadState::Failed)
    }

    fn can_advance_to(self, next: LoadState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            LoadState::Failed => true,
            // Re-entering the current stage happens when an abandoned load is resumed
            _ => next >= self,
        }
    }
}

static GLOBAL_LOADER: OnceLock<Arc<AssetLoader>> = OnceLock::new();

pub struct AssetLoader {
    host: Arc<dyn AssetHost>,
    assets: AssetConfig,
    state: Mutex<LoadState>,
    outcome: OnceCell<Result<(), AssetLoadError>>,
}

impl AssetLoader {
    pub fn new(host: Arc<dyn AssetHost>, assets: AssetConfig) -> Self {
        Self {
            host,
            assets,
            state: Mutex::new(LoadState::NotStarted),
            outcome: OnceCell::new(),
        }
    }

    /// Register the page-wide loader. Returns the rejected loader if one is already installed.
    pub fn install_global(loader: Arc<AssetLoader>) -> Result<(), Arc<AssetLoader>> {
        GLOBAL_LOADER.set(loader)
    }

    pub fn global() -> Option<Arc<AssetLoader>> {
        GLOBAL_LOADER.get().cloned()
    }

    pub fn state(&self) -> LoadState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LoadState::Ready
    }

    /// The stored failure, once the load has failed
    pub fn failure(&self) -> Option<AssetLoadError> {
        self.outcome.get().and_then(|outcome| outcome.clone().err())
    }

    /// Resolves when the library and plugin are usable. Concurrent callers
    /// wait on the same load; later callers get the stored outcome.
    pub async fn ensure_ready(&self) -> Result<(), AssetLoadError> {
        self.outcome
            .get_or_init(|| self.load_in_order())
            .await
            .clone()
    }

    async fn load_in_order(&self) -> Result<(), AssetLoadError> {
        self.advance(LoadState::LoadingLibrary);

        let (stylesheet, library) = futures::join!(
            self.host
                .load(AssetKind::Stylesheet, &self.assets.stylesheet_url),
            self.host.load(AssetKind::Library, &self.assets.library_url),
        );

        // An unstyled map still works
        if let Err(e) = stylesheet {
            log::warn!("{}", e);
        }
        if let Err(e) = library {
            return Err(self.fail(e));
        }

        self.advance(LoadState::LoadingPlugin);
        if let Err(e) = self
            .host
            .load(AssetKind::Plugin, &self.assets.plugin_url)
            .await
        {
            return Err(self.fail(e));
        }

        self.advance(LoadState::Ready);
        log::info!("map assets ready");
        Ok(())
    }

    fn fail(&self, error: AssetLoadError) -> AssetLoadError {
        log::error!("map assets unavailable: {}", error);
        self.advance(LoadState::Failed);
        error
    }

    fn advance(&self, next: LoadState) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.can_advance_to(next) {
            log::debug!("asset load {:?} -> {:?}", *state, next);
            *state = next;
        } else {
            log::warn!("ignoring asset load transition {:?} -> {:?}", *state, next);
        }
    }
}

impl std::fmt::Debug for AssetLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetLoader")
            .field("assets", &self.assets)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Host that records load order and fails a chosen asset
    #[derive(Default)]
    struct ScriptedHost {
        calls: Mutex<Vec<AssetKind>>,
        fail: Option<AssetKind>,
    }

    #[async_trait]
    impl AssetHost for ScriptedHost {
        async fn load(&self, asset: AssetKind, url: &str) -> Result<(), AssetLoadError> {
            self.calls.lock().unwrap().push(asset);
            if self.fail == Some(asset) {
                return Err(AssetLoadError::new(asset, url, "script error"));
            }
            Ok(())
        }
    }

    fn loader_with(host: Arc<ScriptedHost>) -> AssetLoader {
        AssetLoader::new(host, AssetConfig::default())
    }

    #[test]
    fn test_load_state_transitions() {
        assert!(LoadState::NotStarted.can_advance_to(LoadState::LoadingLibrary));
        assert!(LoadState::LoadingLibrary.can_advance_to(LoadState::LoadingPlugin));
        assert!(LoadState::LoadingPlugin.can_advance_to(LoadState::Failed));
        assert!(!LoadState::LoadingPlugin.can_advance_to(LoadState::LoadingLibrary));
        assert!(!LoadState::Ready.can_advance_to(LoadState::Failed));
        assert!(!LoadState::Failed.can_advance_to(LoadState::Ready));
    }

    #[tokio::test]
    async fn test_successful_load_reaches_ready() {
        let host = Arc::new(ScriptedHost::default());
        let loader = loader_with(host.clone());
        assert_eq!(loader.state(), LoadState::NotStarted);

        loader.ensure_ready().await.unwrap();

        assert_eq!(loader.state(), LoadState::Ready);
        let calls = host.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls.last(), Some(&AssetKind::Plugin));
    }

    #[tokio::test]
    async fn test_plugin_failure_is_terminal() {
        let host = Arc::new(ScriptedHost {
            fail: Some(AssetKind::Plugin),
            ..Default::default()
        });
        let loader = loader_with(host.clone());

        let err = loader.ensure_ready().await.unwrap_err();
        assert_eq!(err.asset, AssetKind::Plugin);
        assert_eq!(loader.state(), LoadState::Failed);

        // No automatic retry
        assert!(loader.ensure_ready().await.is_err());
        assert_eq!(host.calls.lock().unwrap().len(), 3);
        assert_eq!(loader.failure(), Some(err));
    }

    #[tokio::test]
    async fn test_library_failure_skips_plugin() {
        let host = Arc::new(ScriptedHost {
            fail: Some(AssetKind::Library),
            ..Default::default()
        });
        let loader = loader_with(host.clone());

        assert!(loader.ensure_ready().await.is_err());
        assert!(!host.calls.lock().unwrap().contains(&AssetKind::Plugin));
        assert_eq!(loader.state(), LoadState::Failed);
    }

    #[tokio::test]
    async fn test_stylesheet_failure_is_tolerated() {
        let host = Arc::new(ScriptedHost {
            fail: Some(AssetKind::Stylesheet),
            ..Default::default()
        });
        let loader = loader_with(host);

        assert!(loader.ensure_ready().await.is_ok());
        assert!(loader.is_ready());
    }
}
