use std::io::Write;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::{format_duration, format_pace, waypoint_name, ExportError};
use crate::course::Course;
use crate::models::{DistanceUnit, PacingSchedule, Waypoint};

#[derive(Tabled)]
struct SegmentRow {
    #[tabled(rename = "Segment")]
    segment: String,
    #[tabled(rename = "Distance")]
    distance: String,
    #[tabled(rename = "Pace")]
    pace: String,
    #[tabled(rename = "Grade")]
    grade: String,
    #[tabled(rename = "Gain/Loss")]
    elevation: String,
    #[tabled(rename = "Moving")]
    moving: String,
    #[tabled(rename = "Stop")]
    stoppage: String,
    #[tabled(rename = "Elapsed")]
    elapsed: String,
    #[tabled(rename = "Arrival")]
    arrival: String,
}

#[derive(Tabled)]
struct WaypointRow {
    #[tabled(rename = "#")]
    order: u32,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Distance")]
    distance: String,
    #[tabled(rename = "Elevation")]
    elevation: String,
    #[tabled(rename = "Tags")]
    tags: String,
}

fn format_distance(meters: f64, unit: DistanceUnit) -> String {
    format!("{:.2} {}", meters / unit.meters_per_unit(), unit.abbreviation())
}

fn format_elevation(meters: Option<f64>) -> String {
    meters.map_or_else(|| "-".to_string(), |m| format!("{:.0} m", m))
}

/// Segment table followed by totals
pub fn write_schedule<W: Write>(
    schedule: &PacingSchedule,
    waypoints: &[Waypoint],
    mut writer: W,
) -> Result<(), ExportError> {
    let unit = schedule.distance_unit;
    let rows: Vec<SegmentRow> = schedule
        .segments
        .iter()
        .enumerate()
        .map(|(i, segment)| SegmentRow {
            segment: format!(
                "{} -> {}",
                waypoint_name(waypoints, &segment.from_waypoint_id),
                waypoint_name(waypoints, &segment.to_waypoint_id)
            ),
            distance: format_distance(segment.distance_meters, unit),
            pace: format!("{}/{}", format_pace(segment.average_pace_seconds_per_unit), unit.abbreviation()),
            grade: format!("{:+.1}%", segment.average_grade * 100.0),
            elevation: match (segment.elevation_gain_meters, segment.elevation_loss_meters) {
                (Some(gain), Some(loss)) => format!("+{:.0}/-{:.0} m", gain, loss),
                _ => "-".to_string(),
            },
            moving: format_duration(segment.elapsed_seconds),
            stoppage: format_duration(segment.stoppage_seconds),
            elapsed: format_duration(segment.cumulative_elapsed_seconds),
            arrival: schedule
                .arrivals
                .get(i + 1)
                .and_then(|a| a.arrival_time)
                .map_or_else(|| "-".to_string(), |t| t.format("%H:%M:%S").to_string()),
        })
        .collect();

    writeln!(writer, "{}", Table::new(rows).with(Style::rounded()))?;
    writeln!(writer)?;
    writeln!(
        writer,
        "Base pace: {}/{}",
        format_pace(schedule.base_pace_seconds_per_unit),
        unit.abbreviation()
    )?;
    writeln!(writer, "Moving time: {}", format_duration(schedule.total_moving_seconds))?;
    writeln!(writer, "Stoppages: {}", format_duration(schedule.total_stoppage_seconds))?;
    writeln!(writer, "Total time: {}", format_duration(schedule.total_elapsed_seconds))?;
    writer.flush()?;
    Ok(())
}

/// Course metrics followed by the waypoint table
pub fn write_course_summary<W: Write>(
    course: &Course,
    waypoints: &[Waypoint],
    mut writer: W,
) -> Result<(), ExportError> {
    let unit = DistanceUnit::Kilometers;
    let metrics = course.metrics();

    writeln!(writer, "{}", course.name)?;
    writeln!(writer, "Distance: {}", format_distance(metrics.total_distance_meters, unit))?;
    match (metrics.elevation_gain_meters, metrics.elevation_loss_meters) {
        (Some(gain), Some(loss)) => writeln!(writer, "Elevation: +{:.0} m / -{:.0} m", gain, loss)?,
        _ => writeln!(writer, "Elevation: no data")?,
    }
    if let (Some(min), Some(max)) = (metrics.min_elevation_meters, metrics.max_elevation_meters) {
        writeln!(writer, "Range: {:.0} m - {:.0} m", min, max)?;
    }
    writeln!(writer)?;

    let rows: Vec<WaypointRow> = waypoints
        .iter()
        .map(|w| WaypointRow {
            order: w.order,
            name: w.name.clone(),
            distance: format_distance(w.distance_meters, unit),
            elevation: format_elevation(w.elevation_meters),
            tags: w.tags.iter().cloned().collect::<Vec<_>>().join(", "),
        })
        .collect();
    writeln!(writer, "{}", Table::new(rows).with(Style::rounded()))?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PacingSegment;

    #[test]
    fn test_schedule_table() {
        let schedule = PacingSchedule {
            plan_id: "p".to_string(),
            distance_unit: DistanceUnit::Kilometers,
            base_pace_seconds_per_unit: 330.0,
            segments: vec![PacingSegment {
                from_waypoint_id: "start".to_string(),
                to_waypoint_id: "finish".to_string(),
                distance_meters: 10_000.0,
                elapsed_seconds: 3300.0,
                stoppage_seconds: 0.0,
                cumulative_elapsed_seconds: 3300.0,
                average_pace_seconds_per_unit: 330.0,
                average_grade: 0.012,
                elevation_gain_meters: Some(120.0),
                elevation_loss_meters: Some(0.0),
            }],
            arrivals: Vec::new(),
            total_moving_seconds: 3300.0,
            total_stoppage_seconds: 0.0,
            total_elapsed_seconds: 3300.0,
        };

        let mut buffer = Vec::new();
        write_schedule(&schedule, &[], &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("start -> finish"));
        assert!(text.contains("10.00 km"));
        assert!(text.contains("5:30/km"));
        assert!(text.contains("+1.2%"));
        assert!(text.contains("+120/-0 m"));
        assert!(text.contains("Total time: 0:55:00"));
    }
}
