//! Read-only browsing map: one marker per listed item, clicks reported upward.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::{bring_up, controller_for, geolocation::LocationProvider, lock, ViewMode};
use crate::assets::loader::AssetLoader;
use crate::canvas::{CanvasBackend, CanvasEvent, MapCanvasController, MapEvent};
use crate::core::{config::MapLayerConfig, constants::USER_MARKER_ID, geo::GeoPoint};
use crate::prelude::HashSet;

/// An item with a location, supplied by the application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainItem {
    pub id: String,
    pub coordinate: GeoPoint,
}

impl DomainItem {
    pub fn new(id: impl Into<String>, coordinate: GeoPoint) -> Self {
        Self {
            id: id.into(),
            coordinate,
        }
    }
}

/// Plain-data view of the browsing map for the host UI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrowseSnapshot {
    pub mode: ViewMode,
    pub markers: Vec<(String, GeoPoint)>,
    pub route: Option<(GeoPoint, GeoPoint)>,
    pub user_location: Option<GeoPoint>,
    pub message: Option<String>,
    pub canvas_error: Option<String>,
    pub attribution: String,
}

type SelectCallback = Arc<dyn Fn(&str) + Send + Sync>;

struct BrowseState {
    mode: ViewMode,
    controller: MapCanvasController,
    items: Vec<DomainItem>,
    user_location: Option<GeoPoint>,
    route_target: Option<String>,
    message: Option<String>,
}

impl BrowseState {
    fn item(&self, id: &str) -> Option<GeoPoint> {
        self.items
            .iter()
            .find(|item| item.id == id)
            .map(|item| item.coordinate)
    }

    /// Bring the canvas markers in line with `items`
    fn sync_markers(&mut self) -> Result<(), crate::canvas::InvalidStateError> {
        let wanted: HashSet<&str> = self.items.iter().map(|item| item.id.as_str()).collect();
        for id in self.controller.marker_ids() {
            if id != USER_MARKER_ID && !wanted.contains(id.as_str()) {
                self.controller.remove_marker(&id)?;
            }
        }

        for item in &self.items {
            self.controller.upsert_marker(&item.id, item.coordinate, false)?;
        }

        self.sync_route()
    }

    fn sync_route(&mut self) -> Result<(), crate::canvas::InvalidStateError> {
        let Some(target) = self.route_target.clone() else {
            return Ok(());
        };
        match (self.user_location, self.item(&target)) {
            (Some(from), Some(to)) => {
                if self.controller.route() != Some((from, to)) {
                    self.controller.draw_route(from, to)?;
                }
            }
            _ => {
                log::debug!("route target {} is gone", target);
                self.route_target = None;
                self.controller.clear_route()?;
            }
        }
        Ok(())
    }
}

/// Browsing map handle. Clones share the same canvas.
#[derive(Clone)]
pub struct MapView {
    state: Arc<Mutex<BrowseState>>,
    loader: Arc<AssetLoader>,
    config: Arc<MapLayerConfig>,
    on_select: SelectCallback,
}

impl MapView {
    pub fn new<F>(
        config: &MapLayerConfig,
        loader: Arc<AssetLoader>,
        backend: Box<dyn CanvasBackend>,
        on_select: F,
    ) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self {
            state: Arc::new(Mutex::new(BrowseState {
                mode: ViewMode::Pending,
                controller: controller_for(config, backend),
                items: Vec::new(),
                user_location: None,
                route_target: None,
                message: None,
            })),
            loader,
            config: Arc::new(config.clone()),
            on_select: Arc::new(on_select),
        }
    }

    pub fn mode(&self) -> ViewMode {
        lock(&self.state).mode
    }

    /// Wait for the map assets and mount the canvas. Mounting again is a no-op.
    pub async fn mount(&self, container: &str) -> ViewMode {
        let assets = self.loader.ensure_ready().await;

        let mut state = lock(&self.state);
        if state.mode != ViewMode::Pending {
            return state.mode;
        }

        let mode = bring_up(
            &mut state.controller,
            container,
            &self.loader,
            assets,
            &self.config,
        );
        state.mode = mode;
        match mode {
            ViewMode::Live => {
                if let Err(e) = state.sync_markers() {
                    log::error!("{}", e);
                }
            }
            _ => state.message = Some("Map unavailable".to_string()),
        }
        mode
    }

    /// Replace the item list. Markers for items that disappeared are removed.
    pub fn set_items(&self, items: Vec<DomainItem>) {
        let mut state = lock(&self.state);
        state.items = items
            .into_iter()
            .filter(|item| {
                let reserved = item.id == USER_MARKER_ID;
                if reserved {
                    log::warn!("item id {:?} is reserved; skipping", USER_MARKER_ID);
                }
                !reserved
            })
            .collect();

        if state.mode == ViewMode::Live {
            if let Err(e) = state.sync_markers() {
                log::error!("{}", e);
            }
        }
    }

    /// Feed a raw canvas event. A click on an item marker reaches `on_select`.
    pub fn handle_event(&self, event: CanvasEvent) {
        let selected = {
            let mut state = lock(&self.state);
            if state.mode != ViewMode::Live {
                return;
            }
            match state.controller.dispatch(event) {
                Ok(Some(MapEvent::MarkerClicked(id))) if id != USER_MARKER_ID => Some(id),
                Ok(_) => None,
                Err(e) => {
                    log::error!("{}", e);
                    None
                }
            }
        };

        if let Some(id) = selected {
            (self.on_select)(&id);
        }
    }

    /// Ask for the device location. Only called on user request; a denial is
    /// logged and not retried.
    pub async fn locate_user(&self, provider: &dyn LocationProvider) -> Option<GeoPoint> {
        let position = provider.current_position().await;

        let mut state = lock(&self.state);
        let point = match position {
            Ok(point) => point,
            Err(e) => {
                log::warn!("device location unavailable: {}", e);
                return None;
            }
        };

        state.user_location = Some(point);
        if state.mode == ViewMode::Live {
            let zoom = self.config.view.locate_zoom;
            let placed = state
                .controller
                .upsert_marker(USER_MARKER_ID, point, false)
                .and_then(|_| state.controller.set_view(point, zoom))
                .and_then(|_| state.sync_route());
            if let Err(e) = placed {
                log::error!("{}", e);
            }
        }
        Some(point)
    }

    /// Draw the route from the user's location to `item_id`, replacing any
    /// previous route. Returns whether a route is now shown.
    pub fn route_to(&self, item_id: &str) -> bool {
        let mut state = lock(&self.state);
        if state.mode != ViewMode::Live {
            return false;
        }

        let Some(to) = state.item(item_id) else {
            log::warn!("cannot route to unknown item {}", item_id);
            return false;
        };
        let Some(from) = state.user_location else {
            state.message = Some("Share your location to get directions".to_string());
            return false;
        };

        state.route_target = Some(item_id.to_string());
        state.message = None;
        match state.controller.draw_route(from, to) {
            Ok(()) => state.controller.route().is_some(),
            Err(e) => {
                log::error!("{}", e);
                false
            }
        }
    }

    pub fn clear_route(&self) {
        let mut state = lock(&self.state);
        state.route_target = None;
        if state.mode == ViewMode::Live {
            if let Err(e) = state.controller.clear_route() {
                log::error!("{}", e);
            }
        }
    }

    /// Release the canvas. The view cannot be mounted again.
    pub fn unmount(&self) {
        let mut state = lock(&self.state);
        if state.mode == ViewMode::Live {
            if let Err(e) = state.controller.dispose() {
                log::error!("{}", e);
            }
        }
        state.mode = ViewMode::Closed;
    }

    pub fn snapshot(&self) -> BrowseSnapshot {
        let state = lock(&self.state);
        let controller = &state.controller;
        BrowseSnapshot {
            mode: state.mode,
            markers: controller
                .marker_ids()
                .into_iter()
                .filter_map(|id| controller.marker_position(&id).map(|point| (id, point)))
                .collect(),
            route: controller.route(),
            user_location: state.user_location,
            message: state.message.clone(),
            canvas_error: controller.last_error().map(|e| e.to_string()),
            attribution: controller.attribution().to_string(),
        }
    }

    /// Inspect the controller without mutating it
    pub fn with_canvas<R>(&self, f: impl FnOnce(&MapCanvasController) -> R) -> R {
        f(&lock(&self.state).controller)
    }
}

impl std::fmt::Debug for MapView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapView")
            .field("mode", &self.mode())
            .finish()
    }
}
