//! Viewport controller: loading, last-request-wins, and presentation changes.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use place_map::{
    Coordinate, LoadRequest, LoadState, MapEngineConfig, MapEvent, PlaceMapError,
    PlaceVisitRecord, Result, RouteRecord, ViewportCommand, ViewportController, ViewportEffect,
    VisitDataProvider, VisualizationMode,
};

/// Provider serving fixed visits and routes, or failing on demand.
struct MemoryProvider {
    visits: Mutex<Vec<PlaceVisitRecord>>,
    routes: Vec<RouteRecord>,
    fail: Mutex<bool>,
}

impl MemoryProvider {
    fn new(visits: Vec<PlaceVisitRecord>) -> Self {
        Self {
            visits: Mutex::new(visits),
            routes: Vec::new(),
            fail: Mutex::new(false),
        }
    }

    fn with_routes(mut self, routes: Vec<RouteRecord>) -> Self {
        self.routes = routes;
        self
    }

    fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

impl VisitDataProvider for MemoryProvider {
    fn get_visits(
        &self,
        _user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PlaceVisitRecord>> {
        if *self.fail.lock().unwrap() {
            return Err(PlaceMapError::provider("offline"));
        }
        Ok(self
            .visits
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.start_time >= start && v.start_time < end)
            .cloned()
            .collect())
    }

    fn get_routes_in_range(
        &self,
        _user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RouteRecord>> {
        Ok(self
            .routes
            .iter()
            .filter(|r| r.start_time >= start && r.start_time < end)
            .cloned()
            .collect())
    }
}

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, d, 0, 0, 0).unwrap()
}

fn visits() -> Vec<PlaceVisitRecord> {
    (0..6)
        .map(|i| {
            let start = day(1 + i) + Duration::hours(12);
            PlaceVisitRecord::new(
                format!("v{}", i),
                Coordinate::new(41.38 + i as f64 * 0.0002, 2.17),
                start,
                start + Duration::hours(1),
            )
        })
        .collect()
}

/// A short walk on the second day.
fn walk() -> RouteRecord {
    let start = day(2) + Duration::hours(9);
    RouteRecord {
        id: "r1".to_string(),
        coordinates: vec![Coordinate::new(41.38, 2.16), Coordinate::new(41.381, 2.17)],
        start_time: start,
        end_time: start + Duration::minutes(20),
        distance_meters: None,
    }
}

fn request(from: u32, to: u32) -> LoadRequest {
    LoadRequest::new("user-1", day(from), day(to))
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_load_moves_camera_and_clusters() {
    init_logging();
    let provider = MemoryProvider::new(visits());
    let mut controller = ViewportController::default();
    assert_eq!(controller.load_state(), &LoadState::Idle);

    let effects = controller.load_blocking(&provider, &request(1, 30));
    assert!(matches!(effects[0], ViewportEffect::LoadStarted { generation: 1 }));
    assert!(matches!(effects.last(), Some(ViewportEffect::MoveCamera(_))));

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.mode, VisualizationMode::Clusters);
    assert_eq!(snapshot.clusters.len(), 1);
    assert_eq!(snapshot.clusters[0].count, 6);
    assert!(snapshot.markers.is_empty());
}

#[test]
fn test_empty_load_does_not_move_camera() {
    init_logging();
    let provider = MemoryProvider::new(visits());
    let mut controller = ViewportController::default();
    let effects = controller.load_blocking(&provider, &request(20, 25));
    assert_eq!(effects, vec![ViewportEffect::LoadStarted { generation: 1 }]);
    assert!(controller.snapshot().region.is_none());
}

#[test]
fn test_last_request_wins() {
    init_logging();
    let provider: Arc<MemoryProvider> = Arc::new(MemoryProvider::new(visits()));
    let mut controller = ViewportController::default();

    let first = controller.start_load(provider.clone(), request(1, 3));
    let second = controller.start_load(provider, request(1, 30));
    assert_eq!(second.generation(), first.generation() + 1);

    let newer = second.recv();
    let older = first.recv();

    controller.dispatch(ViewportCommand::LoadFinished(newer));
    assert_eq!(controller.data().markers.len(), 6);

    let effects = controller.dispatch(ViewportCommand::LoadFinished(older));
    assert_eq!(effects, vec![ViewportEffect::DiscardedStale { generation: 1 }]);
    assert_eq!(controller.data().markers.len(), 6);
}

#[test]
fn test_provider_failure_keeps_stale_data() {
    init_logging();
    let provider = Arc::new(MemoryProvider::new(visits()));
    let mut controller = ViewportController::default();
    controller.load_blocking(provider.as_ref(), &request(1, 30));

    provider.set_failing(true);
    let handle = controller.start_load(provider.clone(), request(1, 30));
    controller.dispatch(ViewportCommand::LoadFinished(handle.recv()));

    assert_eq!(controller.data().markers.len(), 6);
    match controller.load_state() {
        LoadState::Ready { error: Some(PlaceMapError::Provider { message }) } => {
            assert_eq!(message, "offline")
        }
        other => panic!("unexpected state {:?}", other),
    }
}

#[test]
fn test_mode_changes_preserve_markers() {
    init_logging();
    let provider = MemoryProvider::new(visits());
    let mut controller = ViewportController::default();
    controller.load_blocking(&provider, &request(1, 30));

    for mode in [
        VisualizationMode::Markers,
        VisualizationMode::Heatmap,
        VisualizationMode::Hybrid,
        VisualizationMode::Clusters,
    ] {
        controller.dispatch(ViewportCommand::SetMode(mode));
        let snapshot = controller.snapshot();
        let shown: usize =
            snapshot.markers.len() + snapshot.clusters.iter().map(|c| c.count).sum::<usize>();
        assert_eq!(shown, 6, "{:?}", mode);
        assert_eq!(snapshot.heatmap.is_some(), mode == VisualizationMode::Heatmap);
    }
}

#[test]
fn test_density_strategy_ignores_zoom() {
    init_logging();
    let config = MapEngineConfig::from_json(r#"{"strategy": "density"}"#).unwrap();
    let provider = MemoryProvider::new(visits());
    let mut controller = ViewportController::new(config);
    controller.load_blocking(&provider, &request(1, 30));
    let before = controller.snapshot().clusters;

    controller.dispatch(ViewportCommand::MapEvent(MapEvent::CameraMoved {
        center: Coordinate::new(41.38, 2.17),
        zoom: 19.0,
    }));
    assert_eq!(controller.snapshot().clusters, before);
    assert_eq!(controller.zoom(), 19.0);
}

#[test]
fn test_route_and_map_taps() {
    init_logging();
    let provider = MemoryProvider::new(visits());
    let mut controller = ViewportController::default();
    controller.load_blocking(&provider, &request(1, 30));

    // No routes loaded: tap is ignored
    controller.dispatch(ViewportCommand::MapEvent(MapEvent::RouteTapped("r1".into())));
    assert!(controller.selection().is_empty());

    controller.dispatch(ViewportCommand::MapEvent(MapEvent::MarkerTapped("v2".into())));
    assert_eq!(controller.selection().marker.as_deref(), Some("v2"));

    let effects = controller.dispatch(ViewportCommand::MapEvent(MapEvent::MapReady));
    assert!(controller.is_map_ready());
    assert!(matches!(effects.as_slice(), [ViewportEffect::MoveCamera(_)]));

    controller.dispatch(ViewportCommand::MapEvent(MapEvent::MapTapped));
    assert!(controller.selection().is_empty());
}

#[test]
fn test_route_selection_replaces_marker() {
    init_logging();
    let provider = MemoryProvider::new(visits()).with_routes(vec![walk()]);
    let mut controller = ViewportController::default();
    controller.load_blocking(&provider, &request(1, 30));
    assert_eq!(controller.data().routes.len(), 1);

    controller.dispatch(ViewportCommand::MapEvent(MapEvent::MarkerTapped("v2".into())));
    controller.dispatch(ViewportCommand::MapEvent(MapEvent::RouteTapped("r1".into())));
    assert_eq!(controller.selection().route.as_deref(), Some("r1"));
    assert!(controller.selection().marker.is_none());

    controller.dispatch(ViewportCommand::MapEvent(MapEvent::RouteTapped("r2".into())));
    assert_eq!(controller.selection().route.as_deref(), Some("r1"));

    controller.dispatch(ViewportCommand::MapEvent(MapEvent::MarkerTapped("v3".into())));
    assert_eq!(controller.selection().marker.as_deref(), Some("v3"));
    assert!(controller.selection().route.is_none());

    // The route is outside the next window, so its selection goes with it
    controller.dispatch(ViewportCommand::MapEvent(MapEvent::RouteTapped("r1".into())));
    controller.load_blocking(&provider, &request(3, 30));
    assert!(controller.data().routes.is_empty());
    assert!(controller.selection().route.is_none());
}
