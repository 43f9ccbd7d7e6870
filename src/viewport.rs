//! Viewport session state.
//!
//! [`ViewportController`] owns everything the map screen needs between
//! frames: loaded data, the current clustering pass, the heatmap field, zoom,
//! visualization mode and selection. All changes go through
//! [`ViewportController::dispatch`], so there is exactly one writer.
//!
//! Loads run on a worker thread (see [`ViewportController::start_load`]).
//! Every load gets a generation number; an outcome whose generation is no
//! longer current is discarded, so the last request always wins.

use std::mem;
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::assembler::{MapData, MapDataAssembler};
use crate::clustering::{Clusterer, ClusteringResult};
use crate::config::MapEngineConfig;
use crate::error::{PlaceMapError, Result};
use crate::heatmap::{HeatmapField, HeatmapGenerator};
use crate::{Cluster, Coordinate, MapRegion, MapRoute, Marker, PlaceVisitRecord, RouteRecord};

// ============================================================================
// Data Provider
// ============================================================================

/// Upstream store of visits and routes.
///
/// Implementations are called from a worker thread and may block.
pub trait VisitDataProvider: Send + Sync {
    fn get_visits(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PlaceVisitRecord>>;

    fn get_routes_in_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RouteRecord>>;
}

/// What to load: one user's records within a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRequest {
    pub user_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl LoadRequest {
    pub fn new(user_id: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            start,
            end,
        }
    }
}

/// Result of one load, tagged with the generation that requested it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub generation: u64,
    pub result: Result<MapData>,
}

/// Handle to a background load.
pub struct LoadHandle {
    generation: u64,
    receiver: mpsc::Receiver<LoadOutcome>,
}

impl LoadHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Check if the load is complete (non-blocking).
    ///
    /// A worker that exits without sending yields a `LoadAborted` outcome.
    pub fn try_recv(&self) -> Option<LoadOutcome> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.aborted()),
        }
    }

    /// Wait for the load to complete (blocking).
    pub fn recv(self) -> LoadOutcome {
        match self.receiver.recv() {
            Ok(outcome) => outcome,
            Err(_) => self.aborted(),
        }
    }

    fn aborted(&self) -> LoadOutcome {
        LoadOutcome {
            generation: self.generation,
            result: Err(PlaceMapError::LoadAborted {
                generation: self.generation,
            }),
        }
    }
}

/// Query the provider and assemble the records into map data.
pub fn fetch_map_data(
    provider: &dyn VisitDataProvider,
    assembler: &MapDataAssembler,
    request: &LoadRequest,
) -> Result<MapData> {
    let visits = provider.get_visits(&request.user_id, request.start, request.end)?;
    let routes = provider.get_routes_in_range(&request.user_id, request.start, request.end)?;
    Ok(assembler.assemble(&visits, &routes))
}

// ============================================================================
// State Types
// ============================================================================

/// Load lifecycle: Idle -> Loading -> Ready -> Loading -> ...
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading {
        generation: u64,
    },
    /// The last load finished. On error the previous data is still shown.
    Ready {
        error: Option<PlaceMapError>,
    },
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading { .. })
    }

    pub fn error(&self) -> Option<&PlaceMapError> {
        match self {
            LoadState::Ready { error } => error.as_ref(),
            _ => None,
        }
    }
}

/// How markers are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationMode {
    Markers,
    #[default]
    Clusters,
    Heatmap,
    Hybrid,
}

impl VisualizationMode {
    pub fn clustering_enabled(&self) -> bool {
        matches!(self, VisualizationMode::Clusters | VisualizationMode::Hybrid)
    }

    pub fn heatmap_enabled(&self) -> bool {
        matches!(self, VisualizationMode::Heatmap)
    }
}

/// Selected map object. At most one field is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub marker: Option<String>,
    pub cluster: Option<String>,
    pub route: Option<String>,
}

impl Selection {
    pub fn marker(id: impl Into<String>) -> Self {
        Self {
            marker: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn cluster(id: impl Into<String>) -> Self {
        Self {
            cluster: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn route(id: impl Into<String>) -> Self {
        Self {
            route: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.marker.is_none() && self.cluster.is_none() && self.route.is_none()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Interaction events from the rendering surface.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    MarkerTapped(String),
    ClusterTapped(String),
    RouteTapped(String),
    /// Tap on empty map space
    MapTapped,
    CameraMoved { center: Coordinate, zoom: f64 },
    MapReady,
}

/// Everything that can change controller state.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewportCommand {
    /// Start a new load generation. Supersedes any load in flight.
    BeginLoad,
    LoadFinished(LoadOutcome),
    SetMode(VisualizationMode),
    SetClusteringEnabled(bool),
    SetHeatmapEnabled(bool),
    MapEvent(MapEvent),
}

/// Side effects the caller must carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewportEffect {
    MoveCamera(MapRegion),
    LoadStarted { generation: u64 },
    DiscardedStale { generation: u64 },
}

/// Immutable view of the controller for the rendering surface.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSnapshot {
    /// Markers drawn individually (everything not inside a visible cluster)
    pub markers: Vec<Marker>,
    pub clusters: Vec<Cluster>,
    pub routes: Vec<MapRoute>,
    pub heatmap: Option<HeatmapField>,
    pub region: Option<MapRegion>,
    pub selection: Selection,
    pub zoom: f64,
    pub mode: VisualizationMode,
    pub clustering_enabled: bool,
    pub heatmap_enabled: bool,
    pub load_state: LoadState,
}

// ============================================================================
// Controller
// ============================================================================

/// Single-writer owner of map session state.
pub struct ViewportController {
    config: MapEngineConfig,
    assembler: MapDataAssembler,
    clusterer: Box<dyn Clusterer>,
    heatmap_generator: HeatmapGenerator,

    load_state: LoadState,
    generation: u64,
    data: MapData,

    /// Current presentation of `data.markers`. With clustering off every
    /// marker is a singleton.
    visible: ClusteringResult,
    heatmap: Option<HeatmapField>,

    mode: VisualizationMode,
    clustering_enabled: bool,
    heatmap_enabled: bool,
    zoom: f64,
    camera_center: Option<Coordinate>,
    map_ready: bool,
    selection: Selection,
}

impl ViewportController {
    pub fn new(config: MapEngineConfig) -> Self {
        let clusterer = config.strategy.build(&config.grid, &config.density);
        let mode = VisualizationMode::default();
        let zoom = config.zoom.clamp(config.zoom.initial_zoom);
        Self {
            assembler: MapDataAssembler::from_config(&config),
            heatmap_generator: HeatmapGenerator::new(config.heatmap.clone()),
            clusterer,
            load_state: LoadState::Idle,
            generation: 0,
            data: MapData::default(),
            visible: ClusteringResult::default(),
            heatmap: None,
            clustering_enabled: mode.clustering_enabled(),
            heatmap_enabled: mode.heatmap_enabled(),
            mode,
            zoom,
            camera_center: None,
            map_ready: false,
            selection: Selection::default(),
            config,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &MapEngineConfig {
        &self.config
    }

    pub fn assembler(&self) -> &MapDataAssembler {
        &self.assembler
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    /// Generation of the most recent load request (0 before any).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn data(&self) -> &MapData {
        &self.data
    }

    pub fn visible_markers(&self) -> &[Marker] {
        &self.visible.singletons
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.visible.clusters
    }

    pub fn heatmap(&self) -> Option<&HeatmapField> {
        self.heatmap.as_ref()
    }

    pub fn mode(&self) -> VisualizationMode {
        self.mode
    }

    pub fn is_clustering_enabled(&self) -> bool {
        self.clustering_enabled
    }

    pub fn is_heatmap_enabled(&self) -> bool {
        self.heatmap_enabled
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn camera_center(&self) -> Option<Coordinate> {
        self.camera_center
    }

    pub fn is_map_ready(&self) -> bool {
        self.map_ready
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn snapshot(&self) -> MapSnapshot {
        MapSnapshot {
            markers: self.visible.singletons.clone(),
            clusters: self.visible.clusters.clone(),
            routes: self.data.routes.clone(),
            heatmap: self.heatmap.clone(),
            region: self.data.region,
            selection: self.selection.clone(),
            zoom: self.zoom,
            mode: self.mode,
            clustering_enabled: self.clustering_enabled,
            heatmap_enabled: self.heatmap_enabled,
            load_state: self.load_state.clone(),
        }
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Begin a new load and run it on a worker thread.
    ///
    /// Feed the outcome back with `dispatch(ViewportCommand::LoadFinished(..))`.
    pub fn start_load(
        &mut self,
        provider: Arc<dyn VisitDataProvider>,
        request: LoadRequest,
    ) -> LoadHandle {
        self.dispatch(ViewportCommand::BeginLoad);
        let generation = self.generation;
        let assembler = self.assembler.clone();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = fetch_map_data(provider.as_ref(), &assembler, &request);
            // Receiver may be gone if the caller dropped the handle
            tx.send(LoadOutcome { generation, result }).ok();
        });

        LoadHandle {
            generation,
            receiver: rx,
        }
    }

    /// Load on the calling thread. Returns the effects of both begin and finish.
    pub fn load_blocking(
        &mut self,
        provider: &dyn VisitDataProvider,
        request: &LoadRequest,
    ) -> Vec<ViewportEffect> {
        let mut effects = self.dispatch(ViewportCommand::BeginLoad);
        let outcome = LoadOutcome {
            generation: self.generation,
            result: fetch_map_data(provider, &self.assembler, request),
        };
        effects.extend(self.dispatch(ViewportCommand::LoadFinished(outcome)));
        effects
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Apply one command and return the effects the caller must perform.
    pub fn dispatch(&mut self, command: ViewportCommand) -> Vec<ViewportEffect> {
        match command {
            ViewportCommand::BeginLoad => self.begin_load(),
            ViewportCommand::LoadFinished(outcome) => self.finish_load(outcome),
            ViewportCommand::SetMode(mode) => {
                self.mode = mode;
                self.set_clustering(mode.clustering_enabled());
                self.set_heatmap(mode.heatmap_enabled());
                Vec::new()
            }
            ViewportCommand::SetClusteringEnabled(enabled) => {
                self.set_clustering(enabled);
                Vec::new()
            }
            ViewportCommand::SetHeatmapEnabled(enabled) => {
                self.set_heatmap(enabled);
                Vec::new()
            }
            ViewportCommand::MapEvent(event) => self.handle_event(event),
        }
    }

    fn begin_load(&mut self) -> Vec<ViewportEffect> {
        self.generation += 1;
        self.load_state = LoadState::Loading {
            generation: self.generation,
        };
        debug!("[Viewport] Load {} started", self.generation);
        vec![ViewportEffect::LoadStarted {
            generation: self.generation,
        }]
    }

    fn finish_load(&mut self, outcome: LoadOutcome) -> Vec<ViewportEffect> {
        let current = matches!(
            self.load_state,
            LoadState::Loading { generation } if generation == outcome.generation
        );
        if !current {
            debug!(
                "[Viewport] Discarding stale load {} (current {})",
                outcome.generation, self.generation
            );
            return vec![ViewportEffect::DiscardedStale {
                generation: outcome.generation,
            }];
        }

        match outcome.result {
            Err(error) => {
                warn!(
                    "[Viewport] Load {} failed, keeping previous data: {}",
                    outcome.generation, error
                );
                self.load_state = LoadState::Ready { error: Some(error) };
                Vec::new()
            }
            Ok(data) => {
                info!(
                    "[Viewport] Load {} ready: {} markers, {} routes",
                    outcome.generation,
                    data.markers.len(),
                    data.routes.len()
                );
                self.data = data;
                self.load_state = LoadState::Ready { error: None };
                self.recompute();
                self.prune_selection();
                self.data
                    .region
                    .map(ViewportEffect::MoveCamera)
                    .into_iter()
                    .collect()
            }
        }
    }

    fn handle_event(&mut self, event: MapEvent) -> Vec<ViewportEffect> {
        match event {
            MapEvent::MarkerTapped(id) => {
                if self.data.markers.iter().any(|m| m.id == id) {
                    self.selection = Selection::marker(id);
                }
                Vec::new()
            }
            MapEvent::ClusterTapped(id) => {
                let region = match self.visible.clusters.iter().find(|c| c.id == id) {
                    Some(cluster) => {
                        let points: Vec<Coordinate> =
                            cluster.members.iter().map(|m| m.coordinate).collect();
                        self.assembler.region_for(&points)
                    }
                    None => return Vec::new(),
                };
                self.selection = Selection::cluster(id);
                region.map(ViewportEffect::MoveCamera).into_iter().collect()
            }
            MapEvent::RouteTapped(id) => {
                if self.data.routes.iter().any(|r| r.id == id) {
                    self.selection = Selection::route(id);
                }
                Vec::new()
            }
            MapEvent::MapTapped => {
                self.selection.clear();
                Vec::new()
            }
            MapEvent::CameraMoved { center, zoom } => {
                self.camera_center = Some(center);
                let zoom = self.config.zoom.clamp(zoom);
                if zoom != self.zoom {
                    self.zoom = zoom;
                    if self.clustering_enabled {
                        self.recluster();
                        self.prune_selection();
                    }
                }
                Vec::new()
            }
            MapEvent::MapReady => {
                self.map_ready = true;
                self.data
                    .region
                    .map(ViewportEffect::MoveCamera)
                    .into_iter()
                    .collect()
            }
        }
    }

    // ========================================================================
    // Presentation
    // ========================================================================

    fn set_clustering(&mut self, enabled: bool) {
        if enabled == self.clustering_enabled {
            return;
        }
        self.clustering_enabled = enabled;
        if enabled {
            self.recluster();
        } else {
            // Members go back as they are; nothing is reclustered
            let flattened = mem::take(&mut self.visible).flatten();
            self.visible.singletons = flattened;
            self.selection.cluster = None;
        }
        debug!(
            "[Viewport] Clustering {} ({} clusters visible)",
            if enabled { "on" } else { "off" },
            self.visible.clusters.len()
        );
    }

    fn set_heatmap(&mut self, enabled: bool) {
        self.heatmap_enabled = enabled;
        self.regenerate_heatmap();
    }

    fn recompute(&mut self) {
        self.recluster();
        self.regenerate_heatmap();
    }

    fn recluster(&mut self) {
        self.visible = if self.clustering_enabled {
            self.clusterer.cluster(&self.data.markers, self.zoom)
        } else {
            ClusteringResult {
                clusters: Vec::new(),
                singletons: self.data.markers.clone(),
            }
        };
    }

    fn regenerate_heatmap(&mut self) {
        self.heatmap = self
            .heatmap_enabled
            .then(|| self.heatmap_generator.generate_default(&self.data.markers));
    }

    /// Drop selected ids that no longer exist.
    fn prune_selection(&mut self) {
        let Selection {
            marker,
            cluster,
            route,
        } = &mut self.selection;
        if marker
            .as_ref()
            .is_some_and(|id| !self.data.markers.iter().any(|m| &m.id == id))
        {
            *marker = None;
        }
        if cluster
            .as_ref()
            .is_some_and(|id| !self.visible.clusters.iter().any(|c| &c.id == id))
        {
            *cluster = None;
        }
        if route
            .as_ref()
            .is_some_and(|id| !self.data.routes.iter().any(|r| &r.id == id))
        {
            *route = None;
        }
    }
}

impl Default for ViewportController {
    fn default() -> Self {
        Self::new(MapEngineConfig::default())
    }
}
