//! Location picker: a canvas with one draggable marker plus an address field.
//!
//! The point can be set by clicking the map, dragging the marker or
//! searching for a place by name. Every lookup for the marker is tagged by a
//! [`RequestSequencer`]; a response that is no longer the latest is dropped,
//! so a slow lookup can never overwrite a newer position.
//!
//! Failed lookups keep the last confirmed point and address. After
//! `fallback_after_failures` network errors in a row, the canvas is released
//! and the picker degrades to a plain text field.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

use super::{bring_up, controller_for, lock, ViewMode};
use crate::assets::loader::AssetLoader;
use crate::canvas::{CanvasBackend, CanvasEvent, MapCanvasController, MapEvent, MarkerHandle};
use crate::core::{config::MapLayerConfig, constants::PICKER_MARKER_ID, geo::GeoPoint};
use crate::geocode::{
    sequence::{RequestSequencer, Ticket},
    service::{bounded, Address, Geocoder, NetworkError},
};

/// How a single lookup ended, from the picker's point of view
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// The result was applied and reported through `on_change`
    Applied(Address),
    NotFound,
    Failed(NetworkError),
    /// A newer lookup was issued before this one resolved
    Stale,
    /// Nothing to do in the current mode
    Ignored,
}

/// Plain-data view of the picker for the host UI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickerSnapshot {
    pub mode: ViewMode,
    pub text: String,
    pub message: Option<String>,
    pub marker: Option<GeoPoint>,
    pub confirmed: Option<GeoPoint>,
    pub pending: bool,
    pub canvas_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gesture {
    Click,
    Drag,
    Search,
}

type ChangeCallback = Arc<dyn Fn(&str) + Send + Sync>;

struct PickerState {
    mode: ViewMode,
    controller: MapCanvasController,
    marker: Option<MarkerHandle>,
    sequencer: RequestSequencer,
    text: String,
    confirmed: Option<GeoPoint>,
    message: Option<String>,
    pending: bool,
    failures: u32,
}

impl PickerState {
    fn place_marker(&mut self, point: GeoPoint) {
        match self.controller.upsert_marker(PICKER_MARKER_ID, point, true) {
            Ok(Some(handle)) => self.marker = Some(handle),
            Ok(None) => {}
            Err(e) => log::error!("{}", e),
        }
    }

    /// Put the marker back where the last confirmed lookup left it
    fn snap_back(&mut self) {
        match self.confirmed {
            Some(point) => self.place_marker(point),
            None => {
                if let Err(e) = self.controller.remove_marker(PICKER_MARKER_ID) {
                    log::error!("{}", e);
                }
                self.marker = None;
            }
        }
    }

    fn record_failure(&mut self, error: &NetworkError, threshold: u32) {
        self.failures += 1;
        log::warn!("address lookup failed ({} in a row): {}", self.failures, error);
        if threshold > 0 && self.failures >= threshold {
            self.fall_back();
        } else {
            self.message = Some("Could not look up the address. Please try again.".to_string());
        }
    }

    fn fall_back(&mut self) {
        log::warn!("switching the location picker to text input");
        if self.controller.is_initialized() {
            if let Err(e) = self.controller.dispose() {
                log::error!("{}", e);
            }
        }
        self.sequencer.clear();
        self.marker = None;
        self.pending = false;
        self.mode = ViewMode::Fallback;
        self.message = Some("Map unavailable. Type the address instead.".to_string());
    }

    /// Apply a finished lookup if it is still the latest one for the marker.
    /// Returns the address to report through `on_change`.
    fn settle<T>(
        &mut self,
        ticket: &Ticket,
        gesture: Gesture,
        result: Result<Option<T>, NetworkError>,
        threshold: u32,
        apply: impl FnOnce(&mut Self, T) -> Address,
    ) -> LookupOutcome {
        if self.mode != ViewMode::Live || !self.sequencer.is_latest(ticket) {
            log::debug!(
                "discarding stale {:?} lookup #{} for {}",
                gesture,
                ticket.sequence(),
                ticket.key()
            );
            return LookupOutcome::Stale;
        }
        self.pending = false;

        match result {
            Ok(Some(found)) => {
                self.failures = 0;
                self.message = None;
                LookupOutcome::Applied(apply(self, found))
            }
            Ok(None) => {
                self.failures = 0;
                self.message = Some(match gesture {
                    Gesture::Search => format!("No results for \"{}\"", self.text.trim()),
                    _ => "No address found at this spot".to_string(),
                });
                if gesture == Gesture::Drag {
                    self.snap_back();
                }
                LookupOutcome::NotFound
            }
            Err(e) => {
                self.record_failure(&e, threshold);
                if gesture == Gesture::Drag && self.mode == ViewMode::Live {
                    self.snap_back();
                }
                LookupOutcome::Failed(e)
            }
        }
    }
}

/// Location picker handle. Clones share the same canvas and field.
#[derive(Clone)]
pub struct LocationPickerView {
    state: Arc<Mutex<PickerState>>,
    loader: Arc<AssetLoader>,
    geocoder: Arc<dyn Geocoder>,
    config: Arc<MapLayerConfig>,
    on_change: ChangeCallback,
}

impl LocationPickerView {
    pub fn new<F>(
        config: &MapLayerConfig,
        loader: Arc<AssetLoader>,
        geocoder: Arc<dyn Geocoder>,
        backend: Box<dyn CanvasBackend>,
        on_change: F,
    ) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self {
            state: Arc::new(Mutex::new(PickerState {
                mode: ViewMode::Pending,
                controller: controller_for(config, backend),
                marker: None,
                sequencer: RequestSequencer::new(),
                text: String::new(),
                confirmed: None,
                message: None,
                pending: false,
                failures: 0,
            })),
            loader,
            geocoder,
            config: Arc::new(config.clone()),
            on_change: Arc::new(on_change),
        }
    }

    pub fn mode(&self) -> ViewMode {
        lock(&self.state).mode
    }

    pub fn text(&self) -> String {
        lock(&self.state).text.clone()
    }

    fn timeout(&self) -> Duration {
        self.config.geocoder.timeout()
    }

    fn threshold(&self) -> u32 {
        self.config.view.fallback_after_failures
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
        let confirmed = state.confirmed;
        if mode == ViewMode::Fallback {
            state.message = Some("Map unavailable. Type the address instead.".to_string());
        } else if let Some(point) = confirmed {
            state.place_marker(point);
        }
        mode
    }

    /// The user typed into the field. Without a map the text is the address,
    /// so it is reported right away.
    pub fn set_text(&self, text: &str) {
        let emit = {
            let mut state = lock(&self.state);
            state.text = text.to_string();
            state.message = None;
            state.mode == ViewMode::Fallback
        };
        if emit {
            (self.on_change)(text);
        }
    }

    /// The owning form changed the address. Returns whether the field changed.
    pub fn set_external_address(&self, address: &str) -> bool {
        let mut state = lock(&self.state);
        if state.text == address {
            return false;
        }
        state.text = address.to_string();
        true
    }

    /// Click on the map: look up the address under `point`
    pub async fn pick(&self, point: GeoPoint) -> LookupOutcome {
        self.reverse_at(point, Gesture::Click).await
    }

    /// Feed a raw canvas event. Clicks and drag ends of the picker marker
    /// start a reverse lookup.
    pub async fn handle_event(&self, event: CanvasEvent) -> LookupOutcome {
        let next = {
            let mut state = lock(&self.state);
            if state.mode != ViewMode::Live {
                return LookupOutcome::Ignored;
            }
            match state.controller.dispatch(event) {
                Ok(Some(MapEvent::Clicked(point))) => Some((point, Gesture::Click)),
                Ok(Some(MapEvent::MarkerMoved { .. })) => state
                    .marker
                    .as_ref()
                    .and_then(|handle| handle.drags().last())
                    .map(|point| (point, Gesture::Drag)),
                Ok(_) => None,
                Err(e) => {
                    log::error!("{}", e);
                    None
                }
            }
        };

        match next {
            Some((point, gesture)) => self.reverse_at(point, gesture).await,
            None => LookupOutcome::Ignored,
        }
    }

    async fn reverse_at(&self, point: GeoPoint, gesture: Gesture) -> LookupOutcome {
        let ticket = {
            let mut state = lock(&self.state);
            if state.mode != ViewMode::Live {
                return LookupOutcome::Ignored;
            }
            state.pending = true;
            state.sequencer.issue(PICKER_MARKER_ID)
        };

        let result = bounded(self.timeout(), self.geocoder.reverse(point)).await;

        let outcome = lock(&self.state).settle(
            &ticket,
            gesture,
            result,
            self.threshold(),
            |state, address| {
                state.place_marker(point);
                state.confirmed = Some(point);
                state.text = address.to_string();
                address
            },
        );
        self.report(outcome)
    }

    /// Submit the field: look the text up and move the map there
    pub async fn search(&self) -> LookupOutcome {
        let (ticket, query) = {
            let mut state = lock(&self.state);
            if state.mode != ViewMode::Live {
                return LookupOutcome::Ignored;
            }
            let query = state.text.trim().to_string();
            if query.is_empty() {
                state.message = Some("Enter a place to search for".to_string());
                return LookupOutcome::NotFound;
            }
            state.pending = true;
            (state.sequencer.issue(PICKER_MARKER_ID), query)
        };

        let result = bounded(self.timeout(), self.geocoder.forward(&query)).await;

        let zoom = self.config.view.search_zoom;
        let outcome = lock(&self.state).settle(
            &ticket,
            Gesture::Search,
            result,
            self.threshold(),
            |state, point| {
                if let Err(e) = state.controller.set_view(point, zoom) {
                    log::error!("{}", e);
                }
                state.place_marker(point);
                state.confirmed = Some(point);
                Address::new(query)
            },
        );
        self.report(outcome)
    }

    fn report(&self, outcome: LookupOutcome) -> LookupOutcome {
        if let LookupOutcome::Applied(address) = &outcome {
            (self.on_change)(address.as_str());
        }
        outcome
    }

    /// Release the canvas and drop any lookup still in flight
    pub fn unmount(&self) {
        let mut state = lock(&self.state);
        if state.controller.is_initialized() {
            if let Err(e) = state.controller.dispose() {
                log::error!("{}", e);
            }
        }
        state.sequencer.clear();
        state.marker = None;
        state.pending = false;
        state.mode = ViewMode::Closed;
    }

    pub fn snapshot(&self) -> PickerSnapshot {
        let state = lock(&self.state);
        PickerSnapshot {
            mode: state.mode,
            text: state.text.clone(),
            message: state.message.clone(),
            marker: state.controller.marker_position(PICKER_MARKER_ID),
            confirmed: state.confirmed,
            pending: state.pending,
            canvas_error: state.controller.last_error().map(|e| e.to_string()),
        }
    }

    /// Inspect the controller without mutating it
    pub fn with_canvas<R>(&self, f: impl FnOnce(&MapCanvasController) -> R) -> R {
        f(&lock(&self.state).controller)
    }
}

impl std::fmt::Debug for LocationPickerView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationPickerView")
            .field("mode", &self.mode())
            .field("text", &self.text())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::host::PreloadedAssetHost;
    use crate::canvas::scene::LayerCanvas;
    use async_trait::async_trait;

    /// Answers every lookup with the same canned result
    struct Canned {
        forward: Result<Option<GeoPoint>, NetworkError>,
        reverse: Result<Option<Address>, NetworkError>,
    }

    #[async_trait]
    impl Geocoder for Canned {
        async fn forward(&self, _place: &str) -> Result<Option<GeoPoint>, NetworkError> {
            self.forward.clone()
        }

        async fn reverse(&self, _point: GeoPoint) -> Result<Option<Address>, NetworkError> {
            self.reverse.clone()
        }
    }

    async fn picker(geocoder: Canned) -> (LocationPickerView, Arc<Mutex<Vec<String>>>) {
        let config = MapLayerConfig::default();
        let loader = Arc::new(AssetLoader::new(
            Arc::new(PreloadedAssetHost),
            config.assets.clone(),
        ));
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = changes.clone();
        let view = LocationPickerView::new(
            &config,
            loader,
            Arc::new(geocoder),
            Box::new(LayerCanvas::new()),
            move |address| sink.lock().unwrap().push(address.to_string()),
        );
        assert_eq!(view.mount("picker-map").await, ViewMode::Live);
        (view, changes)
    }

    fn found(address: &str) -> Canned {
        Canned {
            forward: Ok(Some(GeoPoint::new(19.076, 72.8777))),
            reverse: Ok(Some(Address::from(address))),
        }
    }

    fn offline() -> Canned {
        Canned {
            forward: Err(NetworkError::Status(503)),
            reverse: Err(NetworkError::Status(503)),
        }
    }

    #[tokio::test]
    async fn test_click_places_marker_and_reports_address() {
        let (view, changes) = picker(found("Mumbai, Maharashtra, India")).await;
        let point = GeoPoint::new(19.076, 72.8777);

        let outcome = view.pick(point).await;

        assert_eq!(
            outcome,
            LookupOutcome::Applied(Address::from("Mumbai, Maharashtra, India"))
        );
        let snapshot = view.snapshot();
        assert_eq!(snapshot.text, "Mumbai, Maharashtra, India");
        assert_eq!(snapshot.marker, Some(point));
        assert!(!snapshot.pending);
        assert_eq!(*changes.lock().unwrap(), vec!["Mumbai, Maharashtra, India"]);
    }

    #[tokio::test]
    async fn test_drag_end_triggers_lookup() {
        let (view, changes) = picker(found("Bandra, Mumbai")).await;
        view.pick(GeoPoint::new(19.0, 72.8)).await;
        let layer = view.with_canvas(|controller| {
            *controller
                .backend()
                .as_any()
                .downcast_ref::<LayerCanvas>()
                .unwrap()
                .layers()
                .next()
                .unwrap()
                .0
        });

        let dropped = GeoPoint::new(19.05, 72.83);
        let outcome = view
            .handle_event(CanvasEvent::MarkerDragEnd {
                layer,
                point: dropped,
            })
            .await;

        assert!(matches!(outcome, LookupOutcome::Applied(_)));
        assert_eq!(view.snapshot().confirmed, Some(dropped));
        assert_eq!(changes.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_drag_snaps_back() {
        let (view, _) = picker(found("Colaba, Mumbai")).await;
        let confirmed = GeoPoint::new(18.91, 72.81);
        view.pick(confirmed).await;
        view.with_canvas(|controller| assert_eq!(controller.marker_count(), 1));

        // Same picker, now with the service down
        let degraded = LocationPickerView {
            geocoder: Arc::new(offline()),
            ..view.clone()
        };
        let layer = degraded.with_canvas(|controller| {
            *controller
                .backend()
                .as_any()
                .downcast_ref::<LayerCanvas>()
                .unwrap()
                .layers()
                .next()
                .unwrap()
                .0
        });
        let outcome = degraded
            .handle_event(CanvasEvent::MarkerDragEnd {
                layer,
                point: GeoPoint::new(19.2, 72.9),
            })
            .await;

        assert_eq!(outcome, LookupOutcome::Failed(NetworkError::Status(503)));
        let snapshot = view.snapshot();
        assert_eq!(snapshot.marker, Some(confirmed));
        assert_eq!(snapshot.text, "Colaba, Mumbai");
        assert!(snapshot.message.is_some());
    }

    #[tokio::test]
    async fn test_click_without_address_keeps_state() {
        let (view, changes) = picker(Canned {
            forward: Ok(None),
            reverse: Ok(None),
        })
        .await;
        view.set_external_address("Dadar, Mumbai");

        let outcome = view.pick(GeoPoint::new(0.0, -30.0)).await;

        assert_eq!(outcome, LookupOutcome::NotFound);
        let snapshot = view.snapshot();
        assert_eq!(snapshot.text, "Dadar, Mumbai");
        assert_eq!(snapshot.marker, None);
        assert!(snapshot.message.is_some());
        assert!(changes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_network_failures_fall_back() {
        let (view, changes) = picker(offline()).await;

        for _ in 0..2 {
            assert!(matches!(
                view.pick(GeoPoint::new(19.0, 72.8)).await,
                LookupOutcome::Failed(_)
            ));
            assert_eq!(view.mode(), ViewMode::Live);
        }
        view.pick(GeoPoint::new(19.0, 72.8)).await;

        assert_eq!(view.mode(), ViewMode::Fallback);
        view.with_canvas(|controller| assert!(!controller.is_initialized()));
        assert_eq!(view.pick(GeoPoint::new(19.0, 72.8)).await, LookupOutcome::Ignored);

        view.set_text("12 Hill Road, Bandra");
        assert_eq!(*changes.lock().unwrap(), vec!["12 Hill Road, Bandra"]);
    }

    #[tokio::test]
    async fn test_blank_search_does_not_query() {
        let (view, _) = picker(offline()).await;
        view.set_text("   ");

        assert_eq!(view.search().await, LookupOutcome::NotFound);
        assert_eq!(view.snapshot().mode, ViewMode::Live);
    }

    #[tokio::test]
    async fn test_external_address_only_applies_changes() {
        let (view, changes) = picker(found("unused")).await;
        assert!(view.set_external_address("Juhu Beach"));
        assert!(!view.set_external_address("Juhu Beach"));
        assert_eq!(view.text(), "Juhu Beach");
        assert!(changes.lock().unwrap().is_empty());
    }
}
