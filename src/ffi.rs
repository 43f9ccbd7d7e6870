//! FFI bindings for mobile platforms (iOS/Android).
//!
//! This module provides the UniFFI bindings that expose Rust functionality
//! to Kotlin and Swift. Records cross the boundary as JSON strings; failures
//! come back as `{"error": "..."}`. All FFI functions are prefixed with
//! `ffi_` to avoid naming conflicts with the internal API.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::error::{PlaceMapError, Result};
use crate::{
    determine_significance, init_logging, ClusteringResult, HeatmapGenerator, IntensityMode,
    MapDataAssembler, MapEngineConfig, Marker, PlaceClassifier, PlaceVisitRecord, RouteRecord,
};

// ============================================================================
// JSON Helpers
// ============================================================================

fn to_json<T: Serialize>(value: &T) -> String {
    match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => error_json(&PlaceMapError::from(e)),
    }
}

fn error_json(error: &PlaceMapError) -> String {
    warn!("[PlaceMapRust] FFI call failed: {}", error);
    serde_json::json!({ "error": error.to_string() }).to_string()
}

fn respond<T: Serialize>(result: Result<T>) -> String {
    match result {
        Ok(value) => to_json(&value),
        Err(e) => error_json(&e),
    }
}

/// Empty or missing config JSON means defaults.
fn load_config(config_json: Option<String>) -> Result<MapEngineConfig> {
    match config_json.as_deref().map(str::trim) {
        None | Some("") => Ok(MapEngineConfig::default()),
        Some(json) => MapEngineConfig::from_json(json),
    }
}

fn timestamp(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| PlaceMapError::Internal {
        message: format!("timestamp {} out of range", millis),
    })
}

// ============================================================================
// Setup
// ============================================================================

/// Install the platform logger. Safe to call more than once.
#[uniffi::export]
pub fn ffi_init() {
    init_logging();
    info!("[PlaceMapRust] Initialized");
}

/// Default engine configuration as JSON.
#[uniffi::export]
pub fn ffi_default_config() -> String {
    to_json(&MapEngineConfig::default())
}

// ============================================================================
// Assembly and Clustering
// ============================================================================

/// Build markers, routes and camera region from visit and route records.
#[uniffi::export]
pub fn ffi_assemble_map_data(
    visits_json: String,
    routes_json: String,
    config_json: Option<String>,
) -> String {
    init_logging();
    respond((|| -> Result<_> {
        let config = load_config(config_json)?;
        let visits: Vec<PlaceVisitRecord> = serde_json::from_str(&visits_json)?;
        let routes: Vec<RouteRecord> = serde_json::from_str(&routes_json)?;
        info!(
            "[PlaceMapRust] assemble_map_data: {} visits, {} routes",
            visits.len(),
            routes.len()
        );
        Ok(MapDataAssembler::from_config(&config).assemble(&visits, &routes))
    })())
}

/// Cluster markers at a zoom level with the configured strategy.
#[uniffi::export]
pub fn ffi_cluster_markers(markers_json: String, zoom: f64, config_json: Option<String>) -> String {
    init_logging();
    respond((|| -> Result<ClusteringResult> {
        let config = load_config(config_json)?;
        let markers: Vec<Marker> = serde_json::from_str(&markers_json)?;
        let clusterer = config.strategy.build(&config.grid, &config.density);
        let zoom = config.zoom.clamp(zoom);

        let start = std::time::Instant::now();
        let result = clusterer.cluster(&markers, zoom);
        debug!(
            "[PlaceMapRust] {} clustering of {} markers in {:?}",
            clusterer.name(),
            markers.len(),
            start.elapsed()
        );
        Ok(result)
    })())
}

// ============================================================================
// Classification
// ============================================================================

#[derive(Serialize)]
struct ClassificationJson {
    category: crate::PlaceCategory,
    confidence: crate::CategoryConfidence,
}

/// Classify one visit against its place history.
#[uniffi::export]
pub fn ffi_classify_place(
    visit_json: String,
    history_json: String,
    config_json: Option<String>,
) -> String {
    init_logging();
    respond((|| -> Result<_> {
        let config = load_config(config_json)?;
        let visit: PlaceVisitRecord = serde_json::from_str(&visit_json)?;
        let history: Vec<PlaceVisitRecord> = serde_json::from_str(&history_json)?;
        let (category, confidence) = PlaceClassifier::new(config.classifier).classify(&visit, &history);
        Ok(ClassificationJson {
            category,
            confidence,
        })
    })())
}

/// Significance tier of a place. Timestamps are Unix milliseconds.
#[uniffi::export]
pub fn ffi_determine_significance(
    visit_count: u32,
    total_duration_seconds: i64,
    last_visit_millis: i64,
    now_millis: i64,
) -> String {
    respond((|| -> Result<_> {
        Ok(determine_significance(
            visit_count,
            Duration::seconds(total_duration_seconds.max(0)),
            timestamp(last_visit_millis)?,
            timestamp(now_millis)?,
        ))
    })())
}

// ============================================================================
// Heatmap
// ============================================================================

/// Heatmap field for markers. `intensity_mode` is `"visit_count"` or `"uniform"`.
#[uniffi::export]
pub fn ffi_generate_heatmap(markers_json: String, intensity_mode: String) -> String {
    init_logging();
    respond((|| -> Result<_> {
        let markers: Vec<Marker> = serde_json::from_str(&markers_json)?;
        let mode: IntensityMode = serde_json::from_value(serde_json::Value::String(intensity_mode))?;
        let generator = HeatmapGenerator::default();

        #[cfg(feature = "parallel")]
        let field = generator.generate_parallel(&markers, mode);
        #[cfg(not(feature = "parallel"))]
        let field = generator.generate(&markers, mode);

        info!("[PlaceMapRust] Heatmap: {} points", field.len());
        Ok(field)
    })())
}
