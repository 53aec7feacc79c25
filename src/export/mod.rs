//! Writing profiles, waypoints and schedules for other tools
//!
//! Every exporter writes to any [`Write`] so the CLI can target stdout or a
//! file; `*_to_path` helpers create the file.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use crate::course::Course;
use crate::models::{PacingSchedule, Waypoint};

pub mod csv;
pub mod geojson;
pub mod json;
pub mod text;

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
    Text,
    GeoJson,
}

impl std::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "text" | "txt" | "table" => Ok(ExportFormat::Text),
            "geojson" => Ok(ExportFormat::GeoJson),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),
}

/// Write a pacing schedule in `format`.
pub fn export_schedule<W: Write>(
    schedule: &PacingSchedule,
    waypoints: &[Waypoint],
    format: ExportFormat,
    writer: W,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Csv => csv::write_schedule(schedule, waypoints, writer),
        ExportFormat::Json => json::write_json(schedule, writer),
        ExportFormat::Text => text::write_schedule(schedule, waypoints, writer),
        ExportFormat::GeoJson => Err(ExportError::UnsupportedFormat(
            "geojson is available for courses, not schedules".to_string(),
        )),
    }
}

/// Write a course with its waypoints in `format`.
pub fn export_course<W: Write>(
    course: &Course,
    waypoints: &[Waypoint],
    format: ExportFormat,
    writer: W,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::GeoJson => geojson::write_course(course, waypoints, writer),
        ExportFormat::Json => json::write_json(&CourseExport { course, waypoints }, writer),
        ExportFormat::Csv => csv::write_profile(course.profile(), writer),
        ExportFormat::Text => text::write_course_summary(course, waypoints, writer),
    }
}

/// [`export_course`] into a new file at `output_path`.
pub fn export_course_to_path<P: AsRef<Path>>(
    course: &Course,
    waypoints: &[Waypoint],
    format: ExportFormat,
    output_path: P,
) -> Result<(), ExportError> {
    let file = File::create(output_path)?;
    export_course(course, waypoints, format, BufWriter::new(file))
}

/// [`export_schedule`] into a new file at `output_path`.
pub fn export_schedule_to_path<P: AsRef<Path>>(
    schedule: &PacingSchedule,
    waypoints: &[Waypoint],
    format: ExportFormat,
    output_path: P,
) -> Result<(), ExportError> {
    let file = File::create(output_path)?;
    export_schedule(schedule, waypoints, format, BufWriter::new(file))
}

#[derive(Serialize)]
struct CourseExport<'a> {
    course: &'a Course,
    waypoints: &'a [Waypoint],
}

/// `h:mm:ss`
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// `m:ss`
pub fn format_pace(seconds_per_unit: f64) -> String {
    if !seconds_per_unit.is_finite() {
        return "-".to_string();
    }
    let total = seconds_per_unit.max(0.0).round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Waypoint name by id, falling back to the id
pub(crate) fn waypoint_name<'a>(waypoints: &'a [Waypoint], id: &'a str) -> &'a str {
    waypoints
        .iter()
        .find(|w| w.id == id)
        .map(|w| w.name.as_str())
        .unwrap_or(id)
}
