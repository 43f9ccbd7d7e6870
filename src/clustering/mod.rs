//! Marker clustering.
//!
//! Two interchangeable strategies implement the [`Clusterer`] trait:
//!
//! - [`GridClusterer`] buckets markers into zoom-dependent square cells. O(n),
//!   deterministic, and the default.
//! - [`DensityClusterer`] collapses markers within a fixed haversine radius.
//!   Zoom is ignored.
//!
//! Both guarantee that every input marker ends up exactly once, either as a
//! cluster member or as a singleton.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Cluster, Marker};

mod density;
mod grid;

pub use density::{DensityClusterConfig, DensityClusterer};
pub use grid::{GridClusterConfig, GridClusterer};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A clustering strategy.
///
/// Implementations are pure: the same markers and zoom always give the same
/// result, and no state is carried between calls.
pub trait Clusterer: Send + Sync {
    /// Partition `markers` into clusters and singleton markers.
    fn cluster(&self, markers: &[Marker], zoom: f64) -> ClusteringResult;

    /// Short name for logging.
    fn name(&self) -> &'static str;
}

/// Output of one clustering pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusteringResult {
    pub clusters: Vec<Cluster>,
    /// Markers that did not join any cluster, unchanged
    pub singletons: Vec<Marker>,
}

impl ClusteringResult {
    /// Number of markers across clusters and singletons.
    pub fn marker_count(&self) -> usize {
        self.clusters.iter().map(|c| c.members.len()).sum::<usize>() + self.singletons.len()
    }

    /// Every marker back as a flat list: cluster members in cluster order,
    /// then the singletons.
    pub fn flatten(self) -> Vec<Marker> {
        let mut markers = Vec::with_capacity(self.marker_count());
        for cluster in self.clusters {
            markers.extend(cluster.members);
        }
        markers.extend(self.singletons);
        markers
    }

    /// True when the result holds exactly the markers of `input` (compared by
    /// id, as a multiset): nothing dropped, nothing duplicated.
    pub fn is_partition_of(&self, input: &[Marker]) -> bool {
        if self.marker_count() != input.len() {
            return false;
        }
        let mut counts: HashMap<&str, i64> = HashMap::with_capacity(input.len());
        for m in input {
            *counts.entry(m.id.as_str()).or_insert(0) += 1;
        }
        let produced = self
            .clusters
            .iter()
            .flat_map(|c| c.members.iter())
            .chain(self.singletons.iter());
        for m in produced {
            match counts.get_mut(m.id.as_str()) {
                Some(n) if *n > 0 => *n -= 1,
                _ => return false,
            }
        }
        counts.values().all(|&n| n == 0)
    }
}

/// Which clusterer to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterStrategy {
    #[default]
    Grid,
    Density,
}

impl ClusterStrategy {
    /// Instantiate the selected clusterer.
    pub fn build(
        &self,
        grid: &GridClusterConfig,
        density: &DensityClusterConfig,
    ) -> Box<dyn Clusterer> {
        match self {
            ClusterStrategy::Grid => Box::new(GridClusterer::new(grid.clone())),
            ClusterStrategy::Density => Box::new(DensityClusterer::new(density.clone())),
        }
    }
}

/// Cluster many independent marker snapshots in parallel.
///
/// Each snapshot is clustered on its own; results are returned in input order.
#[cfg(feature = "parallel")]
pub fn cluster_snapshots_parallel(
    clusterer: &dyn Clusterer,
    snapshots: &[Vec<Marker>],
    zoom: f64,
) -> Vec<ClusteringResult> {
    snapshots
        .par_iter()
        .map(|markers| clusterer.cluster(markers, zoom))
        .collect()
}
