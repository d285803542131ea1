//! Lazy, ordered, exactly-once loading of the external map assets.

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub mod document;
pub mod host;
pub mod loader;

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub use document::DocumentAssetHost;
pub use host::{AssetHost, AssetKind, AssetLoadError, HttpAssetHost, PreloadedAssetHost};
pub use loader::{AssetLoader, LoadState};
