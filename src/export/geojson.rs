use serde_json::{json, Value};
use std::io::Write;

use super::{json::write_json, ExportError};
use crate::course::Course;
use crate::models::Waypoint;

fn waypoint_feature(waypoint: &Waypoint) -> Value {
    let coordinates = match waypoint.elevation_meters {
        Some(elevation) => json!([waypoint.lng, waypoint.lat, elevation]),
        None => json!([waypoint.lng, waypoint.lat]),
    };
    json!({
        "type": "Feature",
        "geometry": { "type": "Point", "coordinates": coordinates },
        "properties": {
            "id": waypoint.id,
            "name": waypoint.name,
            "order": waypoint.order,
            "distance_meters": waypoint.distance_meters,
            "tags": waypoint.tags,
            "icon": waypoint.icon,
            "description": waypoint.description,
        },
    })
}

/// FeatureCollection of the profile line followed by one Point per waypoint
pub fn course_feature_collection(course: &Course, waypoints: &[Waypoint]) -> Value {
    let features: Vec<Value> = std::iter::once(course.geo_profile())
        .chain(waypoints.iter().map(waypoint_feature))
        .collect();
    json!({ "type": "FeatureCollection", "features": features })
}

pub fn write_course<W: Write>(course: &Course, waypoints: &[Waypoint], writer: W) -> Result<(), ExportError> {
    write_json(&course_feature_collection(course, waypoints), writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::{CourseAnalyzer, CourseInput};
    use crate::import::geojson::GeoJsonImporter;
    use crate::import::ImportFormat;
    use crate::models::TrackSample;

    #[test]
    fn test_collection_reimports() {
        let samples: Vec<TrackSample> = (0..50)
            .map(|i| TrackSample::new(i, 45.0 + i as f64 * 0.0001, 6.0, Some(100.0 + i as f64)))
            .collect();
        let (course, waypoints) = CourseAnalyzer::default()
            .analyze(&CourseInput::new("c", "Line", "", samples))
            .unwrap();

        let mut buffer = Vec::new();
        write_course(&course, waypoints.waypoints(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["features"].as_array().unwrap().len(), 1 + waypoints.len());

        // The export reads back as a track with the waypoints as markers
        let import = GeoJsonImporter::new().parse(&text).unwrap();
        assert_eq!(import.samples.len(), course.profile().len());
        assert_eq!(import.markers.len(), waypoints.len());
        assert_eq!(import.name.as_deref(), Some("Line"));
        assert!(import.markers[0].tags.contains("start"));
    }
}
