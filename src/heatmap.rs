//! Heatmap intensity fields.
//!
//! Produces the raw weighted-point set a heatmap layer renders. Blur radius,
//! gradients and opacity belong to the rendering surface, not here.

use log::debug;
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::clustering::ClusteringResult;
use crate::{Coordinate, Marker};

/// How a marker's weight is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityMode {
    /// Weight = the marker's visit count
    #[default]
    VisitCount,
    /// Every marker weighs 1
    Uniform,
}

impl IntensityMode {
    /// Weight of a single marker under this mode.
    pub fn weight(&self, marker: &Marker) -> f64 {
        match self {
            IntensityMode::VisitCount => marker.visit_count as f64,
            IntensityMode::Uniform => 1.0,
        }
    }
}

/// Configuration for heatmap generation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    pub intensity_mode: IntensityMode,
}

/// One weighted point. Weight is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatmapPoint {
    pub coordinate: Coordinate,
    pub weight: f64,
}

/// A set of weighted coordinates describing visit density.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeatmapField {
    pub points: Vec<HeatmapPoint>,
}

impl HeatmapField {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Largest weight in the field, 0 when empty.
    pub fn max_weight(&self) -> f64 {
        self.points.iter().map(|p| p.weight).fold(0.0, f64::max)
    }

    /// Sum of all weights.
    pub fn total_weight(&self) -> f64 {
        self.points.iter().map(|p| p.weight).sum()
    }

    /// Copy of the field with weights scaled into 0.0..=1.0.
    ///
    /// A field whose weights are all zero is returned unchanged.
    pub fn normalized(&self) -> HeatmapField {
        let max = self.max_weight();
        if max <= 0.0 {
            return self.clone();
        }
        HeatmapField {
            points: self
                .points
                .iter()
                .map(|p| HeatmapPoint {
                    coordinate: p.coordinate,
                    weight: p.weight / max,
                })
                .collect(),
        }
    }
}

/// Builds heatmap fields from markers or clustering results.
#[derive(Debug, Clone, Default)]
pub struct HeatmapGenerator {
    config: HeatmapConfig,
}

impl HeatmapGenerator {
    pub fn new(config: HeatmapConfig) -> Self {
        Self { config }
    }

    /// Field using the configured intensity mode.
    pub fn generate_default(&self, markers: &[Marker]) -> HeatmapField {
        self.generate(markers, self.config.intensity_mode)
    }

    /// One point per marker, weighted by `mode`.
    pub fn generate(&self, markers: &[Marker], mode: IntensityMode) -> HeatmapField {
        let points: Vec<HeatmapPoint> = markers.iter().map(|m| point_for(m, mode)).collect();
        debug!("[Heatmap] {} points ({:?})", points.len(), mode);
        HeatmapField { points }
    }

    /// Parallel variant of [`generate`](Self::generate) for very large marker sets.
    #[cfg(feature = "parallel")]
    pub fn generate_parallel(&self, markers: &[Marker], mode: IntensityMode) -> HeatmapField {
        let points: Vec<HeatmapPoint> = markers.par_iter().map(|m| point_for(m, mode)).collect();
        HeatmapField { points }
    }

    /// Field from a clustering pass: each singleton keeps its own point and
    /// each cluster contributes one point at its centroid, weighted by the sum
    /// of its members' weights. Total weight equals that of the flat markers.
    pub fn generate_from_clusters(
        &self,
        result: &ClusteringResult,
        mode: IntensityMode,
    ) -> HeatmapField {
        let mut points = Vec::with_capacity(result.clusters.len() + result.singletons.len());
        for cluster in &result.clusters {
            points.push(HeatmapPoint {
                coordinate: cluster.centroid,
                weight: cluster.members.iter().map(|m| mode.weight(m)).sum(),
            });
        }
        points.extend(result.singletons.iter().map(|m| point_for(m, mode)));
        debug!(
            "[Heatmap] {} points from {} clusters + {} singletons",
            points.len(),
            result.clusters.len(),
            result.singletons.len()
        );
        HeatmapField { points }
    }
}

fn point_for(marker: &Marker, mode: IntensityMode) -> HeatmapPoint {
    HeatmapPoint {
        coordinate: marker.coordinate,
        weight: mode.weight(marker),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::test_support::marker;
    use crate::Cluster;

    fn visited(id: &str, lat: f64, lng: f64, visits: u32) -> Marker {
        Marker {
            visit_count: visits,
            ..marker(id, lat, lng)
        }
    }

    #[test]
    fn test_visit_count_weights() {
        let markers = vec![visited("a", 1.0, 1.0, 4), visited("b", 2.0, 2.0, 0)];
        let field = HeatmapGenerator::default().generate(&markers, IntensityMode::VisitCount);
        assert_eq!(field.len(), 2);
        assert_eq!(field.points[0].weight, 4.0);
        // Zero-visit markers stay in the field with weight 0
        assert_eq!(field.points[1].weight, 0.0);
        assert_eq!(field.points[1].coordinate, Coordinate::new(2.0, 2.0));
    }

    #[test]
    fn test_uniform_weights() {
        let markers = vec![visited("a", 1.0, 1.0, 4), visited("b", 2.0, 2.0, 9)];
        let field = HeatmapGenerator::default().generate(&markers, IntensityMode::Uniform);
        assert!(field.points.iter().all(|p| p.weight == 1.0));
    }

    #[test]
    fn test_normalized() {
        let markers = vec![visited("a", 1.0, 1.0, 5), visited("b", 2.0, 2.0, 10)];
        let field = HeatmapGenerator::default()
            .generate(&markers, IntensityMode::VisitCount)
            .normalized();
        assert_eq!(field.points[0].weight, 0.5);
        assert_eq!(field.points[1].weight, 1.0);

        let empty = HeatmapField::default();
        assert_eq!(empty.normalized(), empty);
        assert_eq!(empty.max_weight(), 0.0);
    }

    #[test]
    fn test_from_clusters_preserves_total_weight() {
        let result = ClusteringResult {
            clusters: vec![Cluster::from_members(
                "c",
                vec![visited("a", 0.0, 0.0, 3), visited("b", 0.0, 0.002, 4)],
            )],
            singletons: vec![visited("s", 5.0, 5.0, 2)],
        };
        let generator = HeatmapGenerator::default();
        let field = generator.generate_from_clusters(&result, IntensityMode::VisitCount);
        assert_eq!(field.len(), 2);
        assert_eq!(field.points[0].weight, 7.0);
        assert_eq!(field.points[0].coordinate, Coordinate::new(0.0, 0.001));

        let flat = generator.generate(&result.clone().flatten(), IntensityMode::VisitCount);
        assert_eq!(field.total_weight(), flat.total_weight());
    }
}
