//! Map data assembly from provider records.

use chrono::{Duration, TimeZone, Utc};
use place_map::{
    Coordinate, MapDataAssembler, PlaceCategory, PlaceVisitRecord, RegionConfig, RouteRecord,
};

fn visit(id: &str, lat: f64, lng: f64) -> PlaceVisitRecord {
    let start = Utc.with_ymd_and_hms(2024, 8, 12, 9, 0, 0).unwrap();
    PlaceVisitRecord::new(id, Coordinate::new(lat, lng), start, start + Duration::minutes(40))
}

#[test]
fn test_coincident_markers_get_minimum_region() {
    let data = MapDataAssembler::default().assemble(&[visit("a", 0.0, 0.0), visit("b", 0.0, 0.0)], &[]);
    assert_eq!(data.markers.len(), 2);
    let region = data.region.expect("region for non-empty input");
    assert_eq!(region.center, Coordinate::new(0.0, 0.0));
    assert_eq!(region.latitude_delta, 0.01);
    assert_eq!(region.longitude_delta, 0.01);
}

#[test]
fn test_one_marker_per_visit_with_titles() {
    let visits = vec![
        visit("1", 48.85, 2.35).with_city("Paris").with_poi_name("Le Procope"),
        visit("2", 48.86, 2.34).with_poi_name("Louvre Museum"),
        visit("3", 48.87, 2.33),
    ];
    let data = MapDataAssembler::default().assemble(&visits, &[]);
    let titles: Vec<&str> = data.markers.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles, vec!["Paris", "Louvre Museum", "Unknown location"]);
    assert_eq!(data.markers[1].category, PlaceCategory::Entertainment);
}

#[test]
fn test_region_padding_is_configurable() {
    let assembler = MapDataAssembler::new(
        Default::default(),
        RegionConfig {
            padding_factor: 2.0,
            min_delta: 0.5,
        },
    );
    let data = assembler.assemble(&[visit("a", 0.0, 0.0), visit("b", 1.0, 0.1)], &[]);
    let region = data.region.unwrap();
    assert!((region.latitude_delta - 2.0).abs() < 1e-9);
    // 0.1 * 2.0 is below the floor
    assert_eq!(region.longitude_delta, 0.5);
}

#[test]
fn test_routes_only_still_frame_camera() {
    let start = Utc.with_ymd_and_hms(2024, 8, 12, 8, 0, 0).unwrap();
    let route = RouteRecord {
        id: "commute".to_string(),
        coordinates: vec![Coordinate::new(10.0, 10.0), Coordinate::new(10.5, 11.0)],
        start_time: start,
        end_time: start + Duration::minutes(25),
        distance_meters: Some(12_345.0),
    };
    let data = MapDataAssembler::default().assemble(&[], &[route]);
    assert!(data.markers.is_empty());
    assert_eq!(data.routes[0].distance_meters, 12_345.0);
    let region = data.region.unwrap();
    assert!((region.center.latitude - 10.25).abs() < 1e-9);
    assert!((region.longitude_delta - 1.2).abs() < 1e-9);
}

#[test]
fn test_records_from_json() {
    let json = r#"[{
        "id": "v1",
        "place_id": "p1",
        "center": {"latitude": 35.6762, "longitude": 139.6503},
        "start_time": "2024-08-12T09:00:00Z",
        "end_time": "2024-08-12T10:30:00Z",
        "poi_name": "Ichiran Ramen",
        "visit_count": 4,
        "total_duration_seconds": 14400
    }]"#;
    let visits: Vec<PlaceVisitRecord> = serde_json::from_str(json).unwrap();
    let data = MapDataAssembler::default().assemble(&visits, &[]);
    let marker = &data.markers[0];
    assert_eq!(marker.title, "Ichiran Ramen");
    assert_eq!(marker.category, PlaceCategory::Food);
    assert_eq!(marker.visit_count, 4);
    assert!(!marker.is_favorite);
}
