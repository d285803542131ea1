//! Single owner of a live map canvas.
//!
//! All mutation of the canvas goes through [`MapCanvasController`]. It enforces
//! the `Uninitialized -> Initialized -> Disposed` lifecycle, keeps at most one
//! marker per id and one route, and turns rendering-library failures into an
//! observable error flag so one bad marker cannot take the whole view down.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;

use crate::assets::loader::{AssetLoader, LoadState};
use crate::canvas::{
    backend::{CanvasBackend, CanvasError, CanvasEvent, CanvasEventKind, LayerId},
    marker::{MarkerHandle, MarkerIcon},
};
use crate::core::geo::{GeoPoint, TileCoord};
use crate::prelude::HashMap;
use crate::tiles::source::TileSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CanvasState {
    Uninitialized,
    Initialized,
    Disposed,
}

/// An operation was invoked out of order. Indicates an integration defect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidStateError {
    #[error("`{operation}` is not allowed while the canvas is {state:?}")]
    Canvas {
        operation: &'static str,
        state: CanvasState,
    },

    #[error("`{operation}` requires map assets to be ready, but they are {state:?}")]
    Assets {
        operation: &'static str,
        state: LoadState,
    },
}

/// Events the controller reports to the views, in domain terms
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    Clicked(GeoPoint),
    MarkerClicked(String),
    MarkerMoved { id: String, point: GeoPoint },
}

pub type ListenerId = u64;

type Listener = Box<dyn FnMut(&MapEvent) + Send>;

struct MarkerRef {
    layer: LayerId,
    point: GeoPoint,
    draggable: bool,
    drag_tx: Sender<GeoPoint>,
    drag_rx: Receiver<GeoPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RouteRef {
    layer: LayerId,
    from: GeoPoint,
    to: GeoPoint,
}

pub struct MapCanvasController {
    backend: Box<dyn CanvasBackend>,
    tiles: Arc<dyn TileSource>,
    icon: MarkerIcon,
    state: CanvasState,
    view: Option<(GeoPoint, f64)>,
    markers: HashMap<String, MarkerRef>,
    marker_by_layer: HashMap<LayerId, String>,
    route: Option<RouteRef>,
    bound_events: Vec<CanvasEventKind>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: ListenerId,
    last_error: Option<CanvasError>,
}

impl MapCanvasController {
    pub fn new(backend: Box<dyn CanvasBackend>, tiles: Arc<dyn TileSource>, icon: MarkerIcon) -> Self {
        Self {
            backend,
            tiles,
            icon,
            state: CanvasState::Uninitialized,
            view: None,
            markers: HashMap::default(),
            marker_by_layer: HashMap::default(),
            route: None,
            bound_events: Vec::new(),
            listeners: Vec::new(),
            next_listener: 0,
            last_error: None,
        }
    }

    pub fn state(&self) -> CanvasState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == CanvasState::Initialized
    }

    /// Set when the rendering library rejected an operation
    pub fn last_error(&self) -> Option<&CanvasError> {
        self.last_error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<CanvasError> {
        self.last_error.take()
    }

    pub fn backend(&self) -> &dyn CanvasBackend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn CanvasBackend {
        self.backend.as_mut()
    }

    /// Bind the canvas to `container`. A second call on an initialized
    /// controller is a no-op, so a container never gets two canvases.
    ///
    /// If the library refuses to mount, the controller stays uninitialized
    /// and the failure is available from [`Self::last_error`].
    pub fn initialize(
        &mut self,
        container: &str,
        assets: &AssetLoader,
    ) -> Result<(), InvalidStateError> {
        match self.state {
            CanvasState::Initialized => {
                log::debug!("canvas already initialized; ignoring initialize({})", container);
                return Ok(());
            }
            CanvasState::Disposed => {
                return Err(InvalidStateError::Canvas {
                    operation: "initialize",
                    state: self.state,
                });
            }
            CanvasState::Uninitialized => {}
        }

        let load_state = assets.state();
        if load_state != LoadState::Ready {
            return Err(InvalidStateError::Assets {
                operation: "initialize",
                state: load_state,
            });
        }

        let mounted = self.backend.mount(container);
        if self.absorb(mounted).is_none() {
            return Ok(());
        }

        for kind in CanvasEventKind::ALL {
            let bound = self.backend.listen(kind);
            if self.absorb(bound).is_some() {
                self.bound_events.push(kind);
            }
        }

        self.state = CanvasState::Initialized;
        log::info!("map canvas mounted on {}", container);
        Ok(())
    }

    pub fn set_view(&mut self, center: GeoPoint, zoom: f64) -> Result<(), InvalidStateError> {
        self.require("set_view")?;
        let result = self.backend.set_view(center, zoom);
        if self.absorb(result).is_some() {
            self.view = Some((center, zoom));
        }
        Ok(())
    }

    /// Create the marker for `id`, or reposition it if it already exists.
    ///
    /// Returns `None` when the rendering library rejected the change.
    pub fn upsert_marker(
        &mut self,
        id: &str,
        point: GeoPoint,
        draggable: bool,
    ) -> Result<Option<MarkerHandle>, InvalidStateError> {
        self.require("upsert_marker")?;

        let existing = self.markers.get(id).map(|marker| (marker.layer, marker.draggable));
        if let Some((layer, was_draggable)) = existing {
            if was_draggable == draggable {
                let moved = self.backend.move_marker(layer, point);
                if self.absorb(moved).is_none() {
                    return Ok(None);
                }
                let Some(marker) = self.markers.get_mut(id) else {
                    return Ok(None);
                };
                marker.point = point;
                return Ok(Some(MarkerHandle::new(id.to_string(), marker.drag_rx.clone())));
            }
            // Draggability is fixed at creation; rebuild the marker
            if !self.remove_marker(id)? {
                return Ok(None);
            }
        }

        let added = self.backend.add_marker(point, &self.icon, draggable);
        let Some(layer) = self.absorb(added) else {
            return Ok(None);
        };

        let (drag_tx, drag_rx) = unbounded();
        let handle = MarkerHandle::new(id.to_string(), drag_rx.clone());
        self.markers.insert(
            id.to_string(),
            MarkerRef {
                layer,
                point,
                draggable,
                drag_tx,
                drag_rx,
            },
        );
        self.marker_by_layer.insert(layer, id.to_string());
        Ok(Some(handle))
    }

    /// Returns whether a marker with `id` was taken off the canvas.
    ///
    /// If the library refuses the removal the marker stays registered, so the
    /// id still maps to the one rendering that is actually on screen.
    pub fn remove_marker(&mut self, id: &str) -> Result<bool, InvalidStateError> {
        self.require("remove_marker")?;
        let Some(layer) = self.markers.get(id).map(|marker| marker.layer) else {
            return Ok(false);
        };
        let removed = self.backend.remove_layer(layer);
        if self.absorb(removed).is_none() {
            return Ok(false);
        }
        self.markers.remove(id);
        self.marker_by_layer.remove(&layer);
        Ok(true)
    }

    /// Replace the route. The previous rendering is removed before the new
    /// one is added, so two routes are never visible together.
    ///
    /// If the old route cannot be removed it stays, and nothing is added.
    pub fn draw_route(&mut self, from: GeoPoint, to: GeoPoint) -> Result<(), InvalidStateError> {
        self.require("draw_route")?;
        if !self.drop_route() {
            return Ok(());
        }

        let added = self.backend.add_route(from, to);
        if let Some(layer) = self.absorb(added) {
            self.route = Some(RouteRef { layer, from, to });
        }
        Ok(())
    }

    pub fn clear_route(&mut self) -> Result<(), InvalidStateError> {
        self.require("clear_route")?;
        self.drop_route();
        Ok(())
    }

    /// Returns true once no route is on the canvas
    fn drop_route(&mut self) -> bool {
        let Some(route) = self.route else {
            return true;
        };
        let removed = self.backend.remove_layer(route.layer);
        if self.absorb(removed).is_none() {
            return false;
        }
        self.route = None;
        true
    }

    pub fn add_listener<F>(&mut self, listener: F) -> Result<ListenerId, InvalidStateError>
    where
        F: FnMut(&MapEvent) + Send + 'static,
    {
        self.require("add_listener")?;
        self.next_listener += 1;
        self.listeners.push((self.next_listener, Box::new(listener)));
        Ok(self.next_listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> Result<bool, InvalidStateError> {
        self.require("remove_listener")?;
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        Ok(self.listeners.len() != before)
    }

    /// Feed a raw library event through the controller. Drag ends update the
    /// stored position and are forwarded to the marker's handles; listeners
    /// see the translated event. Events for unknown layers are dropped.
    pub fn dispatch(&mut self, event: CanvasEvent) -> Result<Option<MapEvent>, InvalidStateError> {
        self.require("dispatch")?;

        if !self.bound_events.contains(&event.kind()) {
            return Ok(None);
        }

        let translated = match event {
            CanvasEvent::Click { point } => Some(MapEvent::Clicked(point)),
            CanvasEvent::MarkerClick { layer } => self
                .marker_by_layer
                .get(&layer)
                .map(|id| MapEvent::MarkerClicked(id.clone())),
            CanvasEvent::MarkerDragEnd { layer, point } => {
                match self.marker_by_layer.get(&layer) {
                    Some(id) => {
                        let id = id.clone();
                        if let Some(marker) = self.markers.get_mut(&id) {
                            marker.point = point;
                            let _ = marker.drag_tx.send(point);
                        }
                        Some(MapEvent::MarkerMoved { id, point })
                    }
                    None => None,
                }
            }
        };

        if let Some(event) = &translated {
            for (_, listener) in self.listeners.iter_mut() {
                listener(event);
            }
        }
        Ok(translated)
    }

    /// Tear down markers, route, listeners and the canvas itself.
    /// Every later operation fails with [`InvalidStateError`].
    pub fn dispose(&mut self) -> Result<(), InvalidStateError> {
        if self.state == CanvasState::Disposed {
            return Err(InvalidStateError::Canvas {
                operation: "dispose",
                state: self.state,
            });
        }
        if self.state == CanvasState::Initialized {
            self.release();
        }
        self.state = CanvasState::Disposed;
        Ok(())
    }

    fn release(&mut self) {
        if let Some(route) = self.route.take() {
            let removed = self.backend.remove_layer(route.layer);
            self.absorb(removed);
        }
        for (_, marker) in self.markers.drain() {
            let removed = self.backend.remove_layer(marker.layer);
            if let Err(e) = removed {
                log::warn!("canvas: {}", e);
            }
        }
        self.marker_by_layer.clear();
        for kind in self.bound_events.drain(..) {
            self.backend.unlisten(kind);
        }
        self.listeners.clear();
        self.backend.unmount();
        self.view = None;
        log::debug!("map canvas disposed");
    }

    pub fn view(&self) -> Option<(GeoPoint, f64)> {
        self.view
    }

    pub fn marker_position(&self, id: &str) -> Option<GeoPoint> {
        self.markers.get(id).map(|marker| marker.point)
    }

    pub fn marker_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.markers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn route(&self) -> Option<(GeoPoint, GeoPoint)> {
        self.route.map(|route| (route.from, route.to))
    }

    /// Attribution that must be displayed alongside the tiles
    pub fn attribution(&self) -> &str {
        self.tiles.attribution()
    }

    /// Tile URLs around the current view center
    pub fn visible_tiles(&self) -> Vec<String> {
        let Some((center, zoom)) = self.view else {
            return Vec::new();
        };
        let zoom = zoom.round().clamp(0.0, self.tiles.max_zoom() as f64) as u8;
        TileCoord::containing(&center, zoom)
            .neighborhood(1)
            .into_iter()
            .map(|coord| self.tiles.url(coord))
            .collect()
    }

    fn require(&self, operation: &'static str) -> Result<(), InvalidStateError> {
        if self.state == CanvasState::Initialized {
            Ok(())
        } else {
            Err(InvalidStateError::Canvas {
                operation,
                state: self.state,
            })
        }
    }

    /// Record a library failure instead of propagating it
    fn absorb<T>(&mut self, result: Result<T, CanvasError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("canvas: {}", e);
                self.last_error = Some(e);
                None
            }
        }
    }
}

impl Drop for MapCanvasController {
    fn drop(&mut self) {
        if self.state == CanvasState::Initialized {
            self.release();
        }
    }
}

impl std::fmt::Debug for MapCanvasController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapCanvasController")
            .field("state", &self.state)
            .field("view", &self.view)
            .field("markers", &self.marker_ids())
            .field("route", &self.route)
            .field("listeners", &self.listeners.len())
            .field("last_error", &self.last_error)
            .finish()
    }
}
