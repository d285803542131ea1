//! Headless canvas backend.
//!
//! Keeps the map as an ordered set of layers in memory, the way a rendering
//! library would, without drawing anything. Used natively (server-side
//! rendering of map state, CLI) and as the observable canvas in tests.

use std::any::Any;
use std::collections::BTreeMap;

use crate::canvas::{
    backend::{CanvasBackend, CanvasError, CanvasEventKind, LayerId},
    marker::MarkerIcon,
};
use crate::core::geo::GeoPoint;
use crate::prelude::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub enum SceneLayer {
    Marker {
        point: GeoPoint,
        icon_url: String,
        draggable: bool,
    },
    Route {
        waypoints: Vec<GeoPoint>,
    },
}

impl SceneLayer {
    pub fn is_route(&self) -> bool {
        matches!(self, SceneLayer::Route { .. })
    }
}

/// Mutations applied to the scene, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneOp {
    Mount,
    AddMarker(LayerId),
    MoveMarker(LayerId),
    AddRoute(LayerId),
    Remove(LayerId),
    Unmount,
}

#[derive(Debug, Default)]
pub struct LayerCanvas {
    container: Option<String>,
    /// Layers in insertion (render) order
    layers: BTreeMap<LayerId, SceneLayer>,
    next_layer: LayerId,
    view: Option<(GeoPoint, f64)>,
    listeners: HashSet<CanvasEventKind>,
    history: Vec<SceneOp>,
    peak_routes: usize,
    failing: HashSet<&'static str>,
}

impl LayerCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future call of `operation` fail, to exercise error paths
    pub fn inject_failure(&mut self, operation: &'static str) {
        self.failing.insert(operation);
    }

    pub fn clear_failures(&mut self) {
        self.failing.clear();
    }

    pub fn container(&self) -> Option<&str> {
        self.container.as_deref()
    }

    pub fn is_mounted(&self) -> bool {
        self.container.is_some()
    }

    pub fn view(&self) -> Option<(GeoPoint, f64)> {
        self.view
    }

    pub fn layer(&self, layer: LayerId) -> Option<&SceneLayer> {
        self.layers.get(&layer)
    }

    pub fn layers(&self) -> impl Iterator<Item = (&LayerId, &SceneLayer)> {
        self.layers.iter()
    }

    pub fn marker_count(&self) -> usize {
        self.layers.values().filter(|layer| !layer.is_route()).count()
    }

    pub fn route_count(&self) -> usize {
        self.layers.values().filter(|layer| layer.is_route()).count()
    }

    /// Highest number of routes that were ever on the scene at once
    pub fn peak_route_count(&self) -> usize {
        self.peak_routes
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn history(&self) -> &[SceneOp] {
        &self.history
    }

    fn check(&self, operation: &'static str) -> Result<(), CanvasError> {
        if self.failing.contains(operation) {
            return Err(CanvasError::new(operation, "injected failure"));
        }
        if operation != "mount" && self.container.is_none() {
            return Err(CanvasError::new(operation, "map is not mounted"));
        }
        Ok(())
    }

    fn insert(&mut self, layer: SceneLayer) -> LayerId {
        self.next_layer += 1;
        let id = self.next_layer;
        self.layers.insert(id, layer);
        self.peak_routes = self.peak_routes.max(self.route_count());
        id
    }
}

impl CanvasBackend for LayerCanvas {
    fn mount(&mut self, container: &str) -> Result<(), CanvasError> {
        self.check("mount")?;
        if let Some(existing) = &self.container {
            return Err(CanvasError::new(
                "mount",
                format!("map container {:?} is already initialized", existing),
            ));
        }
        self.container = Some(container.to_string());
        self.history.push(SceneOp::Mount);
        Ok(())
    }

    fn set_view(&mut self, center: GeoPoint, zoom: f64) -> Result<(), CanvasError> {
        self.check("set_view")?;
        self.view = Some((center, zoom));
        Ok(())
    }

    fn add_marker(
        &mut self,
        point: GeoPoint,
        icon: &MarkerIcon,
        draggable: bool,
    ) -> Result<LayerId, CanvasError> {
        self.check("add_marker")?;
        let id = self.insert(SceneLayer::Marker {
            point,
            icon_url: icon.url.clone(),
            draggable,
        });
        self.history.push(SceneOp::AddMarker(id));
        Ok(id)
    }

    fn move_marker(&mut self, layer: LayerId, point: GeoPoint) -> Result<(), CanvasError> {
        self.check("move_marker")?;
        match self.layers.get_mut(&layer) {
            Some(SceneLayer::Marker { point: current, .. }) => {
                *current = point;
                self.history.push(SceneOp::MoveMarker(layer));
                Ok(())
            }
            _ => Err(CanvasError::new(
                "move_marker",
                format!("no marker layer {}", layer),
            )),
        }
    }

    fn add_route(&mut self, from: GeoPoint, to: GeoPoint) -> Result<LayerId, CanvasError> {
        self.check("add_route")?;
        let id = self.insert(SceneLayer::Route {
            waypoints: vec![from, to],
        });
        self.history.push(SceneOp::AddRoute(id));
        Ok(id)
    }

    fn remove_layer(&mut self, layer: LayerId) -> Result<(), CanvasError> {
        self.check("remove_layer")?;
        self.layers
            .remove(&layer)
            .ok_or_else(|| CanvasError::new("remove_layer", format!("no layer {}", layer)))?;
        self.history.push(SceneOp::Remove(layer));
        Ok(())
    }

    fn listen(&mut self, kind: CanvasEventKind) -> Result<(), CanvasError> {
        self.check("listen")?;
        self.listeners.insert(kind);
        Ok(())
    }

    fn unlisten(&mut self, kind: CanvasEventKind) {
        self.listeners.remove(&kind);
    }

    fn unmount(&mut self) {
        self.layers.clear();
        self.listeners.clear();
        self.view = None;
        if self.container.take().is_some() {
            self.history.push(SceneOp::Unmount);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
