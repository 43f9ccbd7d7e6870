//! Engine configuration.
//!
//! Each component keeps its own config struct next to its code; this module
//! aggregates them into [`MapEngineConfig`], which can be loaded from JSON.
//! Missing keys fall back to defaults, so a front-end only needs to send the
//! values it wants to change.

use serde::{Deserialize, Serialize};

use crate::classifier::ClassifierConfig;
use crate::clustering::{ClusterStrategy, DensityClusterConfig, GridClusterConfig};
use crate::error::{PlaceMapError, Result};
use crate::heatmap::HeatmapConfig;

/// Camera region computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Multiplier applied to the data extent.
    /// Default: 1.2 (20% padding)
    pub padding_factor: f64,

    /// Smallest latitude/longitude delta in degrees, so coincident points
    /// never produce a zero-size region.
    /// Default: 0.01
    pub min_delta: f64,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            padding_factor: 1.2,
            min_delta: 0.01,
        }
    }
}

/// Zoom range accepted by the viewport controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Zoom used until the map reports a camera position
    pub initial_zoom: f64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            min_zoom: 1.0,
            max_zoom: 20.0,
            initial_zoom: 10.0,
        }
    }
}

impl ZoomConfig {
    /// Clamp a zoom level into the configured range. NaN maps to the initial zoom.
    pub fn clamp(&self, zoom: f64) -> f64 {
        let zoom = if zoom.is_nan() { self.initial_zoom } else { zoom };
        // Never panics, even on an inverted range
        zoom.max(self.min_zoom).min(self.max_zoom)
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MapEngineConfig {
    /// Which clusterer the viewport controller uses
    pub strategy: ClusterStrategy,
    pub grid: GridClusterConfig,
    pub density: DensityClusterConfig,
    pub heatmap: HeatmapConfig,
    pub classifier: ClassifierConfig,
    pub region: RegionConfig,
    pub zoom: ZoomConfig,
}

impl MapEngineConfig {
    /// Parse a configuration from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values that would make the computations meaningless.
    pub fn validate(&self) -> Result<()> {
        let grid = &self.grid;
        if !(grid.grid_size > 0.0 && grid.grid_size.is_finite()) {
            return Err(PlaceMapError::config("grid.grid_size must be positive"));
        }
        if !(grid.tile_scale > 0.0 && grid.tile_scale.is_finite()) {
            return Err(PlaceMapError::config("grid.tile_scale must be positive"));
        }
        if !grid.max_zoom.is_finite() {
            return Err(PlaceMapError::config("grid.max_zoom must be finite"));
        }
        if grid.min_cluster_size < 1 {
            return Err(PlaceMapError::config("grid.min_cluster_size must be at least 1"));
        }
        if !(self.density.radius_meters > 0.0 && self.density.radius_meters.is_finite()) {
            return Err(PlaceMapError::config("density.radius_meters must be positive"));
        }
        if self.density.min_cluster_size < 1 {
            return Err(PlaceMapError::config("density.min_cluster_size must be at least 1"));
        }
        if !(self.region.padding_factor >= 1.0) {
            return Err(PlaceMapError::config("region.padding_factor must be >= 1.0"));
        }
        if !(self.region.min_delta > 0.0) {
            return Err(PlaceMapError::config("region.min_delta must be positive"));
        }
        let zoom = &self.zoom;
        if !(zoom.min_zoom <= zoom.max_zoom) {
            return Err(PlaceMapError::config(format!(
                "zoom range is inverted ({} > {})",
                zoom.min_zoom, zoom.max_zoom
            )));
        }
        self.classifier.validate()?;
        Ok(())
    }
}
