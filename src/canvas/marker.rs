use crossbeam_channel::{Receiver, TryIter, TryRecvError};
use serde::{Deserialize, Serialize};

use crate::core::{config::MarkerIconConfig, geo::GeoPoint};

/// Static marker image, anchored at its bottom-center by default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerIcon {
    pub url: String,
    pub size: (u32, u32),
    pub anchor: (u32, u32),
}

impl From<&MarkerIconConfig> for MarkerIcon {
    fn from(config: &MarkerIconConfig) -> Self {
        Self {
            url: config.url.clone(),
            size: config.size,
            anchor: config.anchor,
        }
    }
}

impl Default for MarkerIcon {
    fn default() -> Self {
        Self::from(&MarkerIconConfig::default())
    }
}

/// Observer for one marker. Every handle returned for the same id shares one
/// drag-end stream, which closes when the marker is removed or the canvas disposed.
#[derive(Debug, Clone)]
pub struct MarkerHandle {
    id: String,
    drag_end: Receiver<GeoPoint>,
}

impl MarkerHandle {
    pub(crate) fn new(id: String, drag_end: Receiver<GeoPoint>) -> Self {
        Self { id, drag_end }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Next unobserved drag-end position, if any
    pub fn try_next_drag(&self) -> Option<GeoPoint> {
        self.drag_end.try_recv().ok()
    }

    pub fn drags(&self) -> TryIter<'_, GeoPoint> {
        self.drag_end.try_iter()
    }

    /// True once the marker no longer exists on the canvas
    pub fn is_detached(&self) -> bool {
        self.drag_end.is_empty()
            && matches!(self.drag_end.try_recv(), Err(TryRecvError::Disconnected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_icon_is_bottom_center_anchored() {
        let icon = MarkerIcon::default();
        assert_eq!(icon.size, (32, 32));
        assert_eq!(icon.anchor, (icon.size.0 / 2, icon.size.1));
    }

    #[test]
    fn test_handle_detaches_when_sender_drops() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = MarkerHandle::new("picker".into(), rx);
        tx.send(GeoPoint::new(1.0, 2.0)).unwrap();

        assert_eq!(handle.try_next_drag(), Some(GeoPoint::new(1.0, 2.0)));
        assert!(!handle.is_detached());

        drop(tx);
        assert!(handle.is_detached());
    }
}
