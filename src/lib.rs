//! # Place Map
//!
//! Geospatial aggregation and place classification for travel-log maps.
//!
//! This library turns raw place-visit records into map-displayable data:
//! - Markers, routes and a camera region ([`MapDataAssembler`])
//! - Zoom-dependent grid clustering ([`GridClusterer`]) or fixed-radius
//!   density clustering ([`DensityClusterer`]) behind one [`Clusterer`] trait
//! - Weighted heatmap intensity fields ([`HeatmapGenerator`])
//! - Heuristic place categories and significance tiers ([`PlaceClassifier`])
//! - A single-writer viewport state machine ([`ViewportController`])
//!
//! Rendering, persistence and network sync are owned by the caller.
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel processing with rayon
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use place_map::{Clusterer, Coordinate, GridClusterer, Marker, PlaceCategory, CategoryConfidence};
//!
//! let markers: Vec<Marker> = (0..3)
//!     .map(|i| Marker {
//!         id: format!("visit-{}", i),
//!         coordinate: Coordinate::new(0.01 + i as f64 * 0.01, 0.01),
//!         title: "Somewhere".to_string(),
//!         snippet: None,
//!         category: PlaceCategory::Other,
//!         confidence: CategoryConfidence::Low,
//!         is_favorite: false,
//!         visit_count: 1,
//!     })
//!     .collect();
//!
//! let result = GridClusterer::default().cluster(&markers, 10.0);
//! assert_eq!(result.clusters.len(), 1);
//! assert_eq!(result.clusters[0].count, 3);
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{PlaceMapError, Result};

// Engine configuration (serde-loadable, validated)
pub mod config;
pub use config::{MapEngineConfig, RegionConfig, ZoomConfig};

// Geographic utilities (distance, bounds, center calculations)
pub mod geo_utils;

// Marker clustering strategies
pub mod clustering;
pub use clustering::{
    ClusterStrategy, Clusterer, ClusteringResult, DensityClusterConfig, DensityClusterer,
    GridClusterConfig, GridClusterer,
};
#[cfg(feature = "parallel")]
pub use clustering::cluster_snapshots_parallel;

// Heatmap intensity fields
pub mod heatmap;
pub use heatmap::{HeatmapConfig, HeatmapField, HeatmapGenerator, HeatmapPoint, IntensityMode};

// Place category / significance heuristics
pub mod classifier;
pub use classifier::{determine_significance, ClassifierConfig, PatternThresholds, PlaceClassifier};

// Visit/route records -> markers, routes, region
pub mod assembler;
pub use assembler::{MapData, MapDataAssembler};

// Session state machine over the computations above
pub mod viewport;
pub use viewport::{
    LoadHandle, LoadOutcome, LoadRequest, LoadState, MapEvent, MapSnapshot, Selection,
    ViewportCommand, ViewportController, ViewportEffect, VisitDataProvider, VisualizationMode,
};

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("PlaceMapRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A WGS84 coordinate in degrees.
///
/// # Example
/// ```
/// use place_map::Coordinate;
/// let point = Coordinate::new(51.5074, -0.1278); // London
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Create a new coordinate.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the coordinate is finite and within WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

impl From<Coordinate> for geo::Point<f64> {
    fn from(c: Coordinate) -> Self {
        geo::Point::new(c.longitude, c.latitude)
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from coordinates. Returns `None` for an empty slice.
    pub fn from_points(points: &[Coordinate]) -> Option<Self> {
        Self::from_coords(points.iter().copied())
    }

    /// Create bounds from any coordinate iterator.
    pub fn from_coords<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Coordinate>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self {
            min_lat: first.latitude,
            max_lat: first.latitude,
            min_lng: first.longitude,
            max_lng: first.longitude,
        };
        for p in iter {
            bounds.extend(p);
        }
        Some(bounds)
    }

    /// Grow the bounds to include `point`.
    pub fn extend(&mut self, point: Coordinate) {
        self.min_lat = self.min_lat.min(point.latitude);
        self.max_lat = self.max_lat.max(point.latitude);
        self.min_lng = self.min_lng.min(point.longitude);
        self.max_lng = self.max_lng.max(point.longitude);
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// Semantic category of a visited place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaceCategory {
    Home,
    Work,
    Food,
    Shopping,
    Fitness,
    Entertainment,
    Travel,
    Healthcare,
    Education,
    Religious,
    Social,
    Outdoor,
    Service,
    Other,
}

impl PlaceCategory {
    /// Every category, in declaration order.
    pub const ALL: [PlaceCategory; 14] = [
        PlaceCategory::Home,
        PlaceCategory::Work,
        PlaceCategory::Food,
        PlaceCategory::Shopping,
        PlaceCategory::Fitness,
        PlaceCategory::Entertainment,
        PlaceCategory::Travel,
        PlaceCategory::Healthcare,
        PlaceCategory::Education,
        PlaceCategory::Religious,
        PlaceCategory::Social,
        PlaceCategory::Outdoor,
        PlaceCategory::Service,
        PlaceCategory::Other,
    ];

    /// Stable identifier, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceCategory::Home => "HOME",
            PlaceCategory::Work => "WORK",
            PlaceCategory::Food => "FOOD",
            PlaceCategory::Shopping => "SHOPPING",
            PlaceCategory::Fitness => "FITNESS",
            PlaceCategory::Entertainment => "ENTERTAINMENT",
            PlaceCategory::Travel => "TRAVEL",
            PlaceCategory::Healthcare => "HEALTHCARE",
            PlaceCategory::Education => "EDUCATION",
            PlaceCategory::Religious => "RELIGIOUS",
            PlaceCategory::Social => "SOCIAL",
            PlaceCategory::Outdoor => "OUTDOOR",
            PlaceCategory::Service => "SERVICE",
            PlaceCategory::Other => "OTHER",
        }
    }

    /// Human-readable label.
    pub fn display_name(&self) -> &'static str {
        match self {
            PlaceCategory::Home => "Home",
            PlaceCategory::Work => "Work",
            PlaceCategory::Food => "Food & Drink",
            PlaceCategory::Shopping => "Shopping",
            PlaceCategory::Fitness => "Fitness",
            PlaceCategory::Entertainment => "Entertainment",
            PlaceCategory::Travel => "Travel",
            PlaceCategory::Healthcare => "Healthcare",
            PlaceCategory::Education => "Education",
            PlaceCategory::Religious => "Religious",
            PlaceCategory::Social => "Social",
            PlaceCategory::Outdoor => "Outdoors",
            PlaceCategory::Service => "Services",
            PlaceCategory::Other => "Other",
        }
    }
}

/// How sure the classifier is about a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoryConfidence {
    High,
    Medium,
    Low,
}

/// Importance tier of a place, from visit frequency and recency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaceSignificance {
    Primary,
    Frequent,
    Occasional,
    Rare,
}

/// One visit to a place, with aggregates over that place's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceVisitRecord {
    /// Unique identifier for the visit
    pub id: String,
    /// Identifier shared by every visit to the same place
    pub place_id: String,
    /// Visit center
    pub center: Coordinate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Point-of-interest name from reverse geocoding
    #[serde(default)]
    pub poi_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// Visits to this place so far
    pub visit_count: u32,
    /// Cumulative time spent at this place, in seconds
    pub total_duration_seconds: i64,
    /// Stored classification, if the upstream store already has one
    #[serde(default)]
    pub category: Option<PlaceCategory>,
    #[serde(default)]
    pub confidence: Option<CategoryConfidence>,
    #[serde(default)]
    pub is_favorite: bool,
}

impl PlaceVisitRecord {
    /// Create a single visit with no descriptive fields.
    ///
    /// The place id defaults to the visit id, and the place aggregates to
    /// this one visit.
    pub fn new(
        id: impl Into<String>,
        center: Coordinate,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let id = id.into();
        let total_duration_seconds = (end_time - start_time).num_seconds().max(0);
        Self {
            place_id: id.clone(),
            id,
            center,
            start_time,
            end_time,
            poi_name: None,
            address: None,
            city: None,
            country: None,
            visit_count: 1,
            total_duration_seconds,
            category: None,
            confidence: None,
            is_favorite: false,
        }
    }

    pub fn with_place_id(mut self, place_id: impl Into<String>) -> Self {
        self.place_id = place_id.into();
        self
    }

    pub fn with_poi_name(mut self, name: impl Into<String>) -> Self {
        self.poi_name = Some(name.into());
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    /// Length of this visit. Inverted time ranges count as zero.
    pub fn duration(&self) -> Duration {
        let d = self.end_time - self.start_time;
        if d < Duration::zero() {
            Duration::zero()
        } else {
            d
        }
    }

    /// Cumulative time at this place.
    pub fn total_duration(&self) -> Duration {
        Duration::seconds(self.total_duration_seconds.max(0))
    }
}

/// A recorded movement between places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub id: String,
    pub coordinates: Vec<Coordinate>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Distance in meters, if the upstream store measured it
    #[serde(default)]
    pub distance_meters: Option<f64>,
}

/// A single displayable point representing one place visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: String,
    pub coordinate: Coordinate,
    pub title: String,
    pub snippet: Option<String>,
    pub category: PlaceCategory,
    pub confidence: CategoryConfidence,
    pub is_favorite: bool,
    pub visit_count: u32,
}

/// A route ready for the map: valid points only, with a known length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapRoute {
    pub id: String,
    pub coordinates: Vec<Coordinate>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Distance in meters
    pub distance_meters: f64,
}

/// An aggregate of nearby markers collapsed into one point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    /// Arithmetic mean of member coordinates
    pub centroid: Coordinate,
    /// Member markers, in input order
    pub members: Vec<Marker>,
    /// Always equal to `members.len()`
    pub count: usize,
}

impl Cluster {
    /// Build a cluster from its members, computing the centroid.
    pub fn from_members(id: impl Into<String>, members: Vec<Marker>) -> Self {
        let centroid = geo_utils::compute_center(members.iter().map(|m| m.coordinate));
        Self {
            id: id.into(),
            centroid,
            count: members.len(),
            members,
        }
    }

    /// Bounding box of the member coordinates.
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_coords(self.members.iter().map(|m| m.coordinate))
    }

    /// Sum of member visit counts.
    pub fn total_visits(&self) -> u64 {
        self.members.iter().map(|m| m.visit_count as u64).sum()
    }
}

/// Camera region: a center plus latitude/longitude spans.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapRegion {
    pub center: Coordinate,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl MapRegion {
    /// Region covering `bounds`, padded by `padding` and floored at `min_delta`.
    pub fn from_bounds(bounds: &Bounds, padding: f64, min_delta: f64) -> Self {
        Self {
            center: bounds.center(),
            latitude_delta: ((bounds.max_lat - bounds.min_lat) * padding).max(min_delta),
            longitude_delta: ((bounds.max_lng - bounds.min_lng) * padding).max(min_delta),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
