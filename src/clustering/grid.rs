//! Zoom-dependent grid clustering.
//!
//! The plane is cut into square cells of `cell_size(zoom)` degrees. Markers
//! are bucketed by `(floor(lng / cell), floor(lat / cell))`; a bucket holding
//! at least `min_cluster_size` markers becomes one cluster.
//!
//! Two markers either side of a cell edge are never merged, however close
//! they are. That is the price of the single O(n) pass.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use super::{Clusterer, ClusteringResult};
use crate::{Cluster, Coordinate, Marker};

/// Configuration for grid clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridClusterConfig {
    /// Cell edge in screen pixels.
    /// Default: 60.0
    pub grid_size: f64,

    /// Zoom level at which `grid_size` pixels are converted with `tile_scale`.
    /// Default: 20.0
    pub max_zoom: f64,

    /// Pixels per degree at `max_zoom` (a 256px tile spans 360/2^zoom degrees).
    /// Default: 256 * 2^20 / 360
    pub tile_scale: f64,

    /// Minimum markers in a cell to form a cluster.
    /// Default: 2
    pub min_cluster_size: usize,
}

impl Default for GridClusterConfig {
    fn default() -> Self {
        Self {
            grid_size: 60.0,
            max_zoom: 20.0,
            tile_scale: 256.0 * 1_048_576.0 / 360.0,
            min_cluster_size: 2,
        }
    }
}

/// Grid-based clusterer (the default strategy).
#[derive(Debug, Clone, Default)]
pub struct GridClusterer {
    config: GridClusterConfig,
}

impl GridClusterer {
    pub fn new(config: GridClusterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GridClusterConfig {
        &self.config
    }

    /// Cell edge length in degrees at `zoom`. Halves with every zoom step.
    ///
    /// Zoom is not validated; extreme values give extreme cells. A cell size
    /// that is not a positive finite number, or one so small that a cell index
    /// leaves the `i64` range, puts nothing in a cell and every marker comes
    /// back as a singleton.
    pub fn cell_size(&self, zoom: f64) -> f64 {
        self.config.grid_size * 2f64.powf(self.config.max_zoom - zoom) / self.config.tile_scale
    }

    /// Grid cell containing `coordinate` for the given cell size, or `None`
    /// when the coordinate is invalid or the index is not representable.
    pub fn cell_key(coordinate: &Coordinate, cell_size: f64) -> Option<(i64, i64)> {
        if !coordinate.is_valid() || !cell_size.is_finite() || cell_size <= 0.0 {
            return None;
        }
        Some((
            cell_index(coordinate.longitude / cell_size)?,
            cell_index(coordinate.latitude / cell_size)?,
        ))
    }
}

fn cell_index(quotient: f64) -> Option<i64> {
    let index = quotient.floor();
    // i64::MAX as f64 rounds up to 2^63, so the bound is exclusive
    if index.is_finite() && index.abs() < i64::MAX as f64 {
        Some(index as i64)
    } else {
        None
    }
}

impl Clusterer for GridClusterer {
    fn cluster(&self, markers: &[Marker], zoom: f64) -> ClusteringResult {
        if markers.is_empty() {
            return ClusteringResult::default();
        }

        let cell_size = self.cell_size(zoom);

        // BTreeMap keeps cluster output in a stable cell order
        let mut cells: BTreeMap<(i64, i64), Vec<usize>> = BTreeMap::new();
        for (i, marker) in markers.iter().enumerate() {
            // Unbucketed markers fall through as singletons
            if let Some(key) = Self::cell_key(&marker.coordinate, cell_size) {
                cells.entry(key).or_default().push(i);
            }
        }

        let min_size = self.config.min_cluster_size.max(1);
        let mut clustered = vec![false; markers.len()];
        let mut clusters = Vec::new();

        for ((x, y), indices) in &cells {
            if indices.len() < min_size {
                continue;
            }
            let members: Vec<Marker> = indices
                .iter()
                .map(|&i| {
                    clustered[i] = true;
                    markers[i].clone()
                })
                .collect();
            clusters.push(Cluster::from_members(format!("grid:{}:{}", x, y), members));
        }

        let singletons: Vec<Marker> = markers
            .iter()
            .zip(&clustered)
            .filter(|(_, in_cluster)| !**in_cluster)
            .map(|(m, _)| m.clone())
            .collect();

        debug!(
            "[Cluster] grid zoom={:.2} cell={:.6}deg: {} markers -> {} clusters + {} singletons",
            zoom,
            cell_size,
            markers.len(),
            clusters.len(),
            singletons.len()
        );

        ClusteringResult {
            clusters,
            singletons,
        }
    }

    fn name(&self) -> &'static str {
        "grid"
    }
}
