//! Unified error hierarchy for coursepace
//!
//! Every failure path in the engine returns a distinguishable variant with
//! enough structured detail for the calling layer to build a user-facing
//! message. Nothing is retried or swallowed internally.

use thiserror::Error;

/// Top-level error type for all coursepace operations
#[derive(Debug, Error)]
pub enum CoursePaceError {
    /// Fewer usable track points than the pipeline needs
    #[error("Insufficient track data: {point_count} usable points, at least {minimum_required} required")]
    InsufficientData {
        point_count: usize,
        minimum_required: usize,
    },

    /// Aggregation was given a profile too short to measure
    #[error("Empty profile: {point_count} points, at least 2 required")]
    EmptyProfile { point_count: usize },

    /// A waypoint target lies outside the course distance range
    #[error("Waypoint out of bounds: {distance_meters:.1}m is outside [0, {total_distance_meters:.1}]m")]
    WaypointOutOfBounds {
        distance_meters: f64,
        total_distance_meters: f64,
    },

    /// Plan fields that cannot produce a schedule
    #[error("Invalid plan configuration: {reason}")]
    InvalidPlanConfiguration { reason: String },

    /// Latitude/longitude that is non-finite or outside WGS84 range
    #[error("Invalid coordinates: lat={lat}, lng={lng}")]
    InvalidCoordinates { lat: f64, lng: f64 },

    /// Waypoint id not present in the course
    #[error("Waypoint not found: {id}")]
    WaypointNotFound { id: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Track file could not be imported
    #[error("Import/Export error: {0}")]
    ImportExport(#[from] ImportExportError),

    /// Writing an export failed
    #[error("Export error: {0}")]
    Export(#[from] crate::export::ExportError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reading track files
#[derive(Debug, Error)]
pub enum ImportExportError {
    /// Unsupported format
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// Format-specific parsing error
    #[error("Parse error in {format}: {reason}")]
    ParseError { format: String, reason: String },

    /// Missing required data
    #[error("Missing required data: {field}")]
    MissingData { field: String },
}

/// Result type alias for coursepace operations
pub type Result<T> = std::result::Result<T, CoursePaceError>;

impl CoursePaceError {
    /// Check if error is retryable
    ///
    /// The engine has no network or storage surface, so only raw I/O from the
    /// loaders can succeed on a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoursePaceError::Io(_))
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CoursePaceError::InsufficientData { .. } => ErrorSeverity::Warning,
            CoursePaceError::EmptyProfile { .. } => ErrorSeverity::Warning,
            CoursePaceError::WaypointOutOfBounds { .. } => ErrorSeverity::Warning,
            CoursePaceError::InvalidPlanConfiguration { .. } => ErrorSeverity::Warning,
            CoursePaceError::InvalidCoordinates { .. } => ErrorSeverity::Warning,
            CoursePaceError::WaypointNotFound { .. } => ErrorSeverity::Warning,
            CoursePaceError::Configuration(_) => ErrorSeverity::Error,
            CoursePaceError::ImportExport(_) => ErrorSeverity::Error,
            CoursePaceError::Export(_) => ErrorSeverity::Error,
            CoursePaceError::Io(_) => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            CoursePaceError::InsufficientData { point_count, .. } => format!(
                "The track only has {} usable point(s). Upload a track with at least two distinct positions.",
                point_count
            ),
            CoursePaceError::EmptyProfile { .. } => {
                "The course profile is empty, so distance and elevation cannot be measured.".to_string()
            }
            CoursePaceError::WaypointOutOfBounds {
                distance_meters,
                total_distance_meters,
            } => format!(
                "Waypoints must lie on the course: {:.2} km is outside 0 - {:.2} km.",
                distance_meters / 1000.0,
                total_distance_meters / 1000.0
            ),
            CoursePaceError::InvalidPlanConfiguration { reason } => {
                format!("The pacing plan cannot be computed: {}", reason)
            }
            CoursePaceError::InvalidCoordinates { .. } => {
                "The selected position is not a valid map coordinate.".to_string()
            }
            CoursePaceError::WaypointNotFound { .. } => {
                "That waypoint no longer exists on this course.".to_string()
            }
            _ => self.to_string(),
        }
    }

    pub(crate) fn invalid_plan(reason: impl Into<String>) -> Self {
        CoursePaceError::InvalidPlanConfiguration {
            reason: reason.into(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
        }
    }
}
