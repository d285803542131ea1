//! The live map canvas and the controller that owns it.

pub mod backend;
pub mod controller;
pub mod marker;
pub mod scene;

pub use backend::{CanvasBackend, CanvasError, CanvasEvent, CanvasEventKind, LayerId};
pub use controller::{CanvasState, InvalidStateError, ListenerId, MapCanvasController, MapEvent};
pub use marker::{MarkerHandle, MarkerIcon};
pub use scene::{LayerCanvas, SceneLayer, SceneOp};
