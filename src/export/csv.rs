use serde::Serialize;
use std::io::Write;

use super::{waypoint_name, ExportError};
use crate::models::{PacingSchedule, SmoothedPoint, Waypoint};

#[derive(Serialize)]
struct ScheduleRow<'a> {
    from: &'a str,
    to: &'a str,
    distance_meters: f64,
    elapsed_seconds: f64,
    stoppage_seconds: f64,
    cumulative_elapsed_seconds: f64,
    average_pace_seconds_per_unit: f64,
    average_grade: f64,
    elevation_gain_meters: Option<f64>,
    elevation_loss_meters: Option<f64>,
    arrival_time: Option<String>,
}

#[derive(Serialize)]
struct ProfileRow {
    distance_meters: f64,
    lat: f64,
    lng: f64,
    elevation_meters: Option<f64>,
    smoothed_elevation_meters: Option<f64>,
    grade: f64,
}

/// One row per segment, in schedule order
pub fn write_schedule<W: Write>(
    schedule: &PacingSchedule,
    waypoints: &[Waypoint],
    writer: W,
) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    // arrivals[0] is the start, so the destination of segment i is arrivals[i + 1]
    for (i, segment) in schedule.segments.iter().enumerate() {
        let arrival_time = schedule
            .arrivals
            .get(i + 1)
            .and_then(|a| a.arrival_time)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string());

        csv_writer.serialize(ScheduleRow {
            from: waypoint_name(waypoints, &segment.from_waypoint_id),
            to: waypoint_name(waypoints, &segment.to_waypoint_id),
            distance_meters: segment.distance_meters,
            elapsed_seconds: segment.elapsed_seconds,
            stoppage_seconds: segment.stoppage_seconds,
            cumulative_elapsed_seconds: segment.cumulative_elapsed_seconds,
            average_pace_seconds_per_unit: segment.average_pace_seconds_per_unit,
            average_grade: segment.average_grade,
            elevation_gain_meters: segment.elevation_gain_meters,
            elevation_loss_meters: segment.elevation_loss_meters,
            arrival_time,
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Distance-indexed profile for spreadsheet plotting
pub fn write_profile<W: Write>(profile: &[SmoothedPoint], writer: W) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    for point in profile {
        csv_writer.serialize(ProfileRow {
            distance_meters: point.point.distance_meters,
            lat: point.point.lat,
            lng: point.point.lng,
            elevation_meters: point.point.elevation_meters,
            smoothed_elevation_meters: point.smoothed_elevation_meters,
            grade: point.grade,
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DistanceUnit, NormalizedPoint, PacingSegment};

    #[test]
    fn test_schedule_rows_use_waypoint_names() {
        let waypoint = |id: &str, name: &str| Waypoint {
            id: id.to_string(),
            course_id: "c".to_string(),
            name: name.to_string(),
            distance_meters: 0.0,
            elevation_meters: None,
            lat: 45.0,
            lng: 6.0,
            tags: Default::default(),
            order: 0,
            icon: None,
            description: None,
        };
        let schedule = PacingSchedule {
            plan_id: "p".to_string(),
            distance_unit: DistanceUnit::Kilometers,
            base_pace_seconds_per_unit: 300.0,
            segments: vec![PacingSegment {
                from_waypoint_id: "w0".to_string(),
                to_waypoint_id: "w1".to_string(),
                distance_meters: 1000.0,
                elapsed_seconds: 300.0,
                stoppage_seconds: 60.0,
                cumulative_elapsed_seconds: 360.0,
                average_pace_seconds_per_unit: 300.0,
                average_grade: 0.0,
                elevation_gain_meters: None,
                elevation_loss_meters: None,
            }],
            arrivals: Vec::new(),
            total_moving_seconds: 300.0,
            total_stoppage_seconds: 60.0,
            total_elapsed_seconds: 360.0,
        };

        let mut buffer = Vec::new();
        write_schedule(&schedule, &[waypoint("w0", "Start"), waypoint("w1", "Aid")], &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();

        assert!(lines.next().unwrap().starts_with("from,to,distance_meters"));
        assert!(lines.next().unwrap().starts_with("Start,Aid,1000.0,300.0,60.0,360.0"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_profile_rows() {
        let profile = vec![SmoothedPoint {
            point: NormalizedPoint {
                distance_meters: 0.0,
                lat: 45.0,
                lng: 6.0,
                elevation_meters: None,
            },
            smoothed_elevation_meters: None,
            grade: 0.0,
        }];

        let mut buffer = Vec::new();
        write_profile(&profile, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().nth(1), Some("0.0,45.0,6.0,,,0.0"));
    }
}
