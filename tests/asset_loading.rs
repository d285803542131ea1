mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use donation_map::assets::{AssetHost, AssetKind, AssetLoadError, AssetLoader, LoadState};
use donation_map::canvas::LayerCanvas;
use donation_map::core::config::{AssetConfig, MapLayerConfig};
use donation_map::views::{LocationPickerView, MapView, ViewMode};
use donation_map::NominatimGeocoder;

/// Records the start and end of every load, with a short delay in between
struct RecordingHost {
    events: Mutex<Vec<String>>,
    failing: Option<AssetKind>,
    delay: Duration,
}

impl RecordingHost {
    fn new(failing: Option<AssetKind>) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            failing,
            delay: Duration::from_millis(20),
        })
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn position(&self, event: &str) -> usize {
        self.events()
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("{} never happened", event))
    }

    fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }
}

#[async_trait]
impl AssetHost for RecordingHost {
    async fn load(&self, asset: AssetKind, url: &str) -> Result<(), AssetLoadError> {
        self.events.lock().unwrap().push(format!("start {}", asset));
        tokio::time::sleep(self.delay).await;
        self.events.lock().unwrap().push(format!("end {}", asset));

        if self.failing == Some(asset) {
            return Err(AssetLoadError::new(asset, url, "HTTP 404"));
        }
        Ok(())
    }
}

/// Loading order and exactly-once semantics of the asset loader
#[cfg(test)]
mod asset_loading {
    use super::*;

    /// The plugin extends the library namespace, so it must wait for it
    #[tokio::test]
    async fn test_library_loads_before_plugin() {
        let host = RecordingHost::new(None);
        let loader = AssetLoader::new(host.clone(), AssetConfig::default());

        loader.ensure_ready().await.unwrap();

        assert_eq!(loader.state(), LoadState::Ready);
        assert!(host.position("end library") < host.position("start plugin"));
        assert!(host.position("end stylesheet") < host.position("start plugin"));
    }

    /// Concurrent callers share a single in-flight load
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_load() {
        let host = RecordingHost::new(None);
        let loader = Arc::new(AssetLoader::new(host.clone(), AssetConfig::default()));

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let loader = loader.clone();
                tokio::spawn(async move { loader.ensure_ready().await })
            })
            .collect();
        for waiter in waiters {
            assert!(waiter.await.unwrap().is_ok());
        }
        loader.ensure_ready().await.unwrap();

        for asset in ["stylesheet", "library", "plugin"] {
            assert_eq!(host.count(&format!("start {}", asset)), 1, "{}", asset);
        }
    }

    /// Both views degrade to text input and never mount a canvas
    #[tokio::test]
    async fn test_plugin_failure_renders_fallback_views() {
        let config = MapLayerConfig::offline();
        let loader = Arc::new(AssetLoader::new(
            RecordingHost::new(Some(AssetKind::Plugin)),
            config.assets.clone(),
        ));
        let (changes, on_change) = common::recorder();
        let picker = LocationPickerView::new(
            &config,
            loader.clone(),
            Arc::new(NominatimGeocoder::new(&config.geocoder).unwrap()),
            Box::new(LayerCanvas::new()),
            on_change,
        );
        let browse = MapView::new(&config, loader.clone(), Box::new(LayerCanvas::new()), |_| {});

        assert_eq!(picker.mount("picker-map").await, ViewMode::Fallback);
        assert_eq!(browse.mount("browse-map").await, ViewMode::Fallback);

        assert_eq!(loader.state(), LoadState::Failed);
        for mounted in [
            picker.with_canvas(|c| common::layer_canvas(c).is_mounted()),
            browse.with_canvas(|c| common::layer_canvas(c).is_mounted()),
        ] {
            assert!(!mounted);
        }
        assert!(picker.snapshot().message.is_some());

        // The field still works as a plain address input
        picker.set_text("Andheri East, Mumbai");
        assert_eq!(*changes.lock().unwrap(), vec!["Andheri East, Mumbai"]);
    }

    #[tokio::test]
    async fn test_global_loader_is_installed_once() {
        let first = Arc::new(AssetLoader::new(
            RecordingHost::new(None),
            AssetConfig::default(),
        ));
        let second = Arc::new(AssetLoader::new(
            RecordingHost::new(None),
            AssetConfig::default(),
        ));

        assert!(AssetLoader::install_global(first.clone()).is_ok());
        assert!(AssetLoader::install_global(second).is_err());
        assert!(Arc::ptr_eq(&AssetLoader::global().unwrap(), &first));
    }
}
