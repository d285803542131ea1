use std::any::Any;

use crate::canvas::marker::MarkerIcon;
use crate::core::geo::GeoPoint;

/// Rendering-library handle for one marker or route layer
pub type LayerId = u64;

/// A failure inside the rendering library. Never propagated past the controller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} failed: {reason}")]
pub struct CanvasError {
    pub operation: &'static str,
    pub reason: String,
}

impl CanvasError {
    pub fn new(operation: &'static str, reason: impl Into<String>) -> Self {
        Self {
            operation,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanvasEventKind {
    Click,
    MarkerClick,
    MarkerDragEnd,
}

impl CanvasEventKind {
    pub const ALL: [CanvasEventKind; 3] = [
        CanvasEventKind::Click,
        CanvasEventKind::MarkerClick,
        CanvasEventKind::MarkerDragEnd,
    ];
}

/// Raw events reported by the rendering library
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    Click { point: GeoPoint },
    MarkerClick { layer: LayerId },
    MarkerDragEnd { layer: LayerId, point: GeoPoint },
}

impl CanvasEvent {
    pub fn kind(&self) -> CanvasEventKind {
        match self {
            CanvasEvent::Click { .. } => CanvasEventKind::Click,
            CanvasEvent::MarkerClick { .. } => CanvasEventKind::MarkerClick,
            CanvasEvent::MarkerDragEnd { .. } => CanvasEventKind::MarkerDragEnd,
        }
    }
}

/// The imperative map library, bound to one container.
///
/// Only [`super::MapCanvasController`] calls into a backend; it enforces the
/// lifecycle, so implementations may assume `mount` happens once and first.
pub trait CanvasBackend: Send {
    fn mount(&mut self, container: &str) -> Result<(), CanvasError>;

    fn set_view(&mut self, center: GeoPoint, zoom: f64) -> Result<(), CanvasError>;

    fn add_marker(
        &mut self,
        point: GeoPoint,
        icon: &MarkerIcon,
        draggable: bool,
    ) -> Result<LayerId, CanvasError>;

    fn move_marker(&mut self, layer: LayerId, point: GeoPoint) -> Result<(), CanvasError>;

    fn add_route(&mut self, from: GeoPoint, to: GeoPoint) -> Result<LayerId, CanvasError>;

    fn remove_layer(&mut self, layer: LayerId) -> Result<(), CanvasError>;

    fn listen(&mut self, kind: CanvasEventKind) -> Result<(), CanvasError>;

    fn unlisten(&mut self, kind: CanvasEventKind);

    /// Destroy the map instance and release the container
    fn unmount(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
