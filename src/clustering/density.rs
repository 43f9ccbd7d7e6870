//! Fixed-radius density clustering.
//!
//! A single "traverse once, mark visited" pass: for each unvisited marker,
//! gather every unvisited marker within `radius_meters` (haversine). If the
//! group reaches `min_cluster_size` it becomes a cluster and all of it is
//! marked visited; otherwise only the current marker is emitted, as a
//! singleton.
//!
//! There is no transitive border-point merging, so the result depends on
//! traversal order. Markers are therefore always visited in a canonical
//! order (latitude, then longitude, then id) instead of input order, and
//! shuffling the input does not change the output.

use log::debug;
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use super::{Clusterer, ClusteringResult};
use crate::geo_utils::{haversine_distance, meters_to_degrees};
use crate::{Cluster, Coordinate, Marker};

/// Configuration for density clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityClusterConfig {
    /// Neighbor radius in meters (haversine).
    /// Default: 100.0
    pub radius_meters: f64,

    /// Minimum neighborhood size (including the marker itself) to form a cluster.
    /// Default: 2
    pub min_cluster_size: usize,
}

impl Default for DensityClusterConfig {
    fn default() -> Self {
        Self {
            radius_meters: 100.0,
            min_cluster_size: 2,
        }
    }
}

/// Candidate boxes are padded past the radius; the haversine check decides.
const ENVELOPE_SLACK: f64 = 1.05;

/// Marker position for R-tree lookups, in [lng, lat] order.
#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    index: usize,
    position: [f64; 2],
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

/// Candidate boxes around `center`. A box crossing the antimeridian gets a
/// second box on the far side of it.
fn search_envelopes(center: &Coordinate, dlat: f64, dlng: f64) -> Vec<AABB<[f64; 2]>> {
    let (lat_lo, lat_hi) = (center.latitude - dlat, center.latitude + dlat);
    let (lng_lo, lng_hi) = (center.longitude - dlng, center.longitude + dlng);

    let mut envelopes = vec![AABB::from_corners([lng_lo, lat_lo], [lng_hi, lat_hi])];
    if lng_lo < -180.0 {
        envelopes.push(AABB::from_corners([lng_lo + 360.0, lat_lo], [180.0, lat_hi]));
    }
    if lng_hi > 180.0 {
        envelopes.push(AABB::from_corners([-180.0, lat_lo], [lng_hi - 360.0, lat_hi]));
    }
    envelopes
}

/// Density-based clusterer. Ignores zoom.
#[derive(Debug, Clone, Default)]
pub struct DensityClusterer {
    config: DensityClusterConfig,
}

impl DensityClusterer {
    pub fn new(config: DensityClusterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DensityClusterConfig {
        &self.config
    }

    /// Indices of `markers` in traversal order.
    pub fn canonical_order(markers: &[Marker]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..markers.len()).collect();
        order.sort_by(|&a, &b| {
            let (ma, mb) = (&markers[a], &markers[b]);
            ma.coordinate
                .latitude
                .total_cmp(&mb.coordinate.latitude)
                .then_with(|| ma.coordinate.longitude.total_cmp(&mb.coordinate.longitude))
                .then_with(|| ma.id.cmp(&mb.id))
                .then(a.cmp(&b))
        });
        order
    }
}

impl Clusterer for DensityClusterer {
    fn cluster(&self, markers: &[Marker], _zoom: f64) -> ClusteringResult {
        if markers.is_empty() {
            return ClusteringResult::default();
        }

        let radius = self.config.radius_meters;
        let min_size = self.config.min_cluster_size.max(1);

        let order = Self::canonical_order(markers);
        let mut rank = vec![0usize; markers.len()];
        for (position, &index) in order.iter().enumerate() {
            rank[index] = position;
        }

        // Unusable coordinates stay out of the index and always end up alone
        let tree = RTree::bulk_load(
            markers
                .iter()
                .enumerate()
                .filter(|(_, m)| m.coordinate.is_valid())
                .map(|(index, m)| IndexedPoint {
                    index,
                    position: [m.coordinate.longitude, m.coordinate.latitude],
                })
                .collect(),
        );

        let mut visited = vec![false; markers.len()];
        let mut clusters = Vec::new();
        let mut singletons = Vec::new();

        for &i in &order {
            if visited[i] {
                continue;
            }
            let center = markers[i].coordinate;

            let mut neighbors = vec![i];
            if center.is_valid() {
                let (dlat, dlng) = meters_to_degrees(radius * ENVELOPE_SLACK, center.latitude);
                let mut found: Vec<usize> = search_envelopes(&center, dlat, dlng)
                    .iter()
                    .flat_map(|envelope| tree.locate_in_envelope_intersecting(envelope))
                    .map(|p| p.index)
                    .filter(|&j| {
                        j != i
                            && !visited[j]
                            && haversine_distance(&center, &markers[j].coordinate) <= radius
                    })
                    .collect();
                // Wrapped boxes can overlap near the poles
                found.sort_unstable();
                found.dedup();
                neighbors.extend(found);
            }

            if neighbors.len() >= min_size {
                neighbors.sort_by_key(|&j| rank[j]);
                let members: Vec<Marker> = neighbors
                    .iter()
                    .map(|&j| {
                        visited[j] = true;
                        markers[j].clone()
                    })
                    .collect();
                clusters.push(Cluster::from_members(
                    format!("density:{}", clusters.len()),
                    members,
                ));
            } else {
                visited[i] = true;
                singletons.push(markers[i].clone());
            }
        }

        debug!(
            "[Cluster] density radius={}m: {} markers -> {} clusters + {} singletons",
            radius,
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
        "density"
    }
}
