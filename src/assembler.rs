//! Map data assembly.
//!
//! Converts visit and route records from the data provider into markers,
//! map routes, and a camera region that frames all of them.

use std::collections::HashMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::classifier::PlaceClassifier;
use crate::config::{MapEngineConfig, RegionConfig};
use crate::error::{PlaceMapError, Result};
use crate::geo_utils::polyline_length;
use crate::{
    Bounds, CategoryConfidence, Coordinate, MapRegion, MapRoute, Marker, PlaceVisitRecord,
    RouteRecord,
};

/// Title used when a visit has neither a city nor a POI name.
pub const UNKNOWN_LOCATION_TITLE: &str = "Unknown location";

/// Everything the map needs for one data load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapData {
    pub markers: Vec<Marker>,
    pub routes: Vec<MapRoute>,
    /// `None` when there is nothing to show; the camera should stay put.
    pub region: Option<MapRegion>,
}

impl MapData {
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty() && self.routes.is_empty()
    }
}

/// Builds [`MapData`] from raw records.
#[derive(Debug, Clone, Default)]
pub struct MapDataAssembler {
    classifier: PlaceClassifier,
    region: RegionConfig,
}

impl MapDataAssembler {
    pub fn new(classifier: PlaceClassifier, region: RegionConfig) -> Self {
        Self { classifier, region }
    }

    pub fn from_config(config: &MapEngineConfig) -> Self {
        Self::new(
            PlaceClassifier::new(config.classifier.clone()),
            config.region.clone(),
        )
    }

    /// One marker per visit with a valid center, valid routes, and the
    /// padded region around all of them.
    pub fn assemble(&self, visits: &[PlaceVisitRecord], routes: &[RouteRecord]) -> MapData {
        // Visits sharing a place id form that place's history
        let mut histories: HashMap<&str, Vec<PlaceVisitRecord>> = HashMap::new();
        for visit in visits {
            histories
                .entry(visit.place_id.as_str())
                .or_default()
                .push(visit.clone());
        }

        let markers: Vec<Marker> = visits
            .iter()
            .filter(|v| match check_center(v) {
                Ok(()) => true,
                Err(e) => {
                    warn!("[Assembler] Skipping visit: {}", e);
                    false
                }
            })
            .map(|v| {
                let history = histories
                    .get(v.place_id.as_str())
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                self.marker_for(v, history)
            })
            .collect();

        let map_routes: Vec<MapRoute> = routes.iter().filter_map(map_route).collect();
        let region = self.compute_region(&markers, &map_routes);

        debug!(
            "[Assembler] {} visits, {} routes -> {} markers, {} map routes, region={}",
            visits.len(),
            routes.len(),
            markers.len(),
            map_routes.len(),
            region.is_some()
        );

        MapData {
            markers,
            routes: map_routes,
            region,
        }
    }

    /// Marker for one visit. A stored category is kept; otherwise the visit
    /// is classified against `history`.
    pub fn marker_for(&self, visit: &PlaceVisitRecord, history: &[PlaceVisitRecord]) -> Marker {
        let (category, confidence) = match visit.category {
            // Stored without confidence means the user picked it
            Some(category) => (category, visit.confidence.unwrap_or(CategoryConfidence::High)),
            None => self.classifier.classify(visit, history),
        };

        Marker {
            id: visit.id.clone(),
            coordinate: visit.center,
            title: marker_title(visit),
            snippet: marker_snippet(visit),
            category,
            confidence,
            is_favorite: visit.is_favorite,
            visit_count: visit.visit_count,
        }
    }

    /// Region around every marker and route point, or `None` if there are none.
    pub fn compute_region(&self, markers: &[Marker], routes: &[MapRoute]) -> Option<MapRegion> {
        let points = markers
            .iter()
            .map(|m| m.coordinate)
            .chain(routes.iter().flat_map(|r| r.coordinates.iter().copied()));
        let bounds = Bounds::from_coords(points)?;
        Some(MapRegion::from_bounds(
            &bounds,
            self.region.padding_factor,
            self.region.min_delta,
        ))
    }

    /// Region framing an arbitrary set of coordinates with this assembler's padding.
    pub fn region_for(&self, points: &[Coordinate]) -> Option<MapRegion> {
        let bounds = Bounds::from_points(points)?;
        Some(MapRegion::from_bounds(
            &bounds,
            self.region.padding_factor,
            self.region.min_delta,
        ))
    }
}

/// City, else POI name, else [`UNKNOWN_LOCATION_TITLE`]. Blank strings count as missing.
pub fn marker_title(visit: &PlaceVisitRecord) -> String {
    non_blank(&visit.city)
        .or_else(|| non_blank(&visit.poi_name))
        .unwrap_or(UNKNOWN_LOCATION_TITLE)
        .to_string()
}

/// Address, else "city, country" from whichever parts exist.
pub fn marker_snippet(visit: &PlaceVisitRecord) -> Option<String> {
    if let Some(address) = non_blank(&visit.address) {
        return Some(address.to_string());
    }
    let parts: Vec<&str> = [non_blank(&visit.city), non_blank(&visit.country)]
        .into_iter()
        .flatten()
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

fn check_center(visit: &PlaceVisitRecord) -> Result<()> {
    if visit.center.is_valid() {
        return Ok(());
    }
    Err(PlaceMapError::InvalidCoordinates {
        id: visit.id.clone(),
        message: format!("({}, {})", visit.center.latitude, visit.center.longitude),
    })
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Keep valid points only; fewer than two leaves nothing to draw.
fn map_route(route: &RouteRecord) -> Option<MapRoute> {
    let coordinates: Vec<Coordinate> = route
        .coordinates
        .iter()
        .copied()
        .filter(Coordinate::is_valid)
        .collect();

    if coordinates.len() < 2 {
        warn!(
            "[Assembler] Dropping route '{}': {} valid points",
            route.id,
            coordinates.len()
        );
        return None;
    }

    let distance_meters = route
        .distance_meters
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or_else(|| polyline_length(&coordinates));

    Some(MapRoute {
        id: route.id.clone(),
        coordinates,
        start_time: route.start_time,
        end_time: route.end_time,
        distance_meters,
    })
}
