// Library interface for coursepace modules
// This allows integration tests and benches to access the core functionality

pub mod config;
pub mod course;
pub mod error;
pub mod export;
pub mod grade_model;
pub mod import;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod pacing;
pub mod smoothing;
pub mod waypoints;

// Re-export commonly used types for convenience
pub use models::*;
pub use config::{AppConfig, SmoothingConfig, SmoothingOverride};
pub use course::{Course, CourseAnalyzer, CourseInput};
pub use error::{CoursePaceError, ErrorSeverity, ImportExportError, Result};
pub use export::{ExportError, ExportFormat};
pub use grade_model::{GradeAdjustmentModel, NoGradeAdjustment, PolynomialGradeModel};
pub use import::{ImportManager, TrackImport};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use metrics::{CourseMetricsAggregator, RangeMetrics};
pub use normalize::TrackNormalizer;
pub use pacing::PacingEngine;
pub use smoothing::ElevationSmoother;
pub use waypoints::{PlacementTarget, WaypointDetails, WaypointLocator, WaypointSet};
