use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CoursePaceError;
use crate::grade_model::{validate_range, GradeAdjustmentModel, NoGradeAdjustment, PolynomialGradeModel};
use crate::logging::LogConfig;
use crate::models::DistanceUnit;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application metadata
    pub metadata: ConfigMetadata,

    /// Global smoothing defaults
    pub smoothing: SmoothingConfig,

    /// Sparse per-course smoothing overrides keyed by course id
    #[serde(default)]
    pub course_overrides: HashMap<String, SmoothingOverride>,

    /// Track normalization settings
    #[serde(default)]
    pub track: TrackSettings,

    /// Course metric settings
    #[serde(default)]
    pub metrics: MetricsSettings,

    /// Grade-adjusted pace model
    #[serde(default)]
    pub grade_model: GradeModelSettings,

    /// Presentation preferences
    #[serde(default)]
    pub display: DisplaySettings,

    /// Logging setup
    #[serde(default)]
    pub logging: LogConfig,
}

/// Configuration metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Spatial windows used to smooth a course profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothingConfig {
    /// Width of the elevation averaging window in meters (Wg)
    pub grade_window_meters: f64,

    /// Span used for the grade finite difference in meters (Δ)
    pub sample_step_meters: f64,

    /// Width of the pace chart averaging window in meters (Wp)
    pub pace_smoothing_meters: f64,
}

/// Partial smoothing patch; absent fields fall back to the default
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SmoothingOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_window_meters: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_step_meters: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pace_smoothing_meters: Option<f64>,
}

impl SmoothingOverride {
    pub fn is_empty(&self) -> bool {
        self.grade_window_meters.is_none()
            && self.sample_step_meters.is_none()
            && self.pace_smoothing_meters.is_none()
    }
}

/// Track normalization settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackSettings {
    /// Points closer than this to the previous kept point are merged into it
    pub min_point_spacing_meters: f64,
}

/// Course metric settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// Elevation changes below this are ignored for gain/loss
    pub elevation_noise_floor_meters: f64,
}

/// Available grade adjustment curves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeModelKind {
    /// Minetti et al. (2002) energy cost of running on slopes
    Minetti,
    /// Factor of 1 for every grade
    None,
}

/// Grade-adjusted pace model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeModelSettings {
    pub model: GradeModelKind,

    /// Polynomial coefficients, highest power first (replaces the Minetti set)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coefficients: Option<Vec<f64>>,

    /// Grades below this are evaluated at this value
    pub min_grade: f64,

    /// Grades above this are evaluated at this value
    pub max_grade: f64,
}

/// Presentation preferences
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DisplaySettings {
    /// Unit used when the CLI prints distances and paces
    pub distance_unit: DistanceUnit,
}

impl Default for AppConfig {
    fn default() -> Self {
        let now = Utc::now();

        AppConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            smoothing: SmoothingConfig::default(),
            course_overrides: HashMap::new(),
            track: TrackSettings::default(),
            metrics: MetricsSettings::default(),
            grade_model: GradeModelSettings::default(),
            display: DisplaySettings::default(),
            logging: LogConfig::default(),
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        SmoothingConfig {
            grade_window_meters: 100.0,
            sample_step_meters: 25.0,
            pace_smoothing_meters: 500.0,
        }
    }
}

impl Default for TrackSettings {
    fn default() -> Self {
        TrackSettings {
            min_point_spacing_meters: 0.5,
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        MetricsSettings {
            elevation_noise_floor_meters: 1.0,
        }
    }
}

impl Default for GradeModelSettings {
    fn default() -> Self {
        GradeModelSettings {
            model: GradeModelKind::Minetti,
            coefficients: None,
            min_grade: -0.45,
            max_grade: 0.45,
        }
    }
}

impl SmoothingConfig {
    /// Apply a partial override field by field.
    pub fn merge(&self, patch: &SmoothingOverride) -> SmoothingConfig {
        SmoothingConfig {
            grade_window_meters: patch.grade_window_meters.unwrap_or(self.grade_window_meters),
            sample_step_meters: patch.sample_step_meters.unwrap_or(self.sample_step_meters),
            pace_smoothing_meters: patch
                .pace_smoothing_meters
                .unwrap_or(self.pace_smoothing_meters),
        }
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        let fields = [
            ("grade_window_meters", self.grade_window_meters),
            ("sample_step_meters", self.sample_step_meters),
            ("pace_smoothing_meters", self.pace_smoothing_meters),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(CoursePaceError::Configuration(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if self.sample_step_meters <= 0.0 {
            return Err(CoursePaceError::Configuration(
                "sample_step_meters must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl GradeModelSettings {
    /// Build the configured grade adjustment model.
    pub fn build(&self) -> crate::error::Result<Box<dyn GradeAdjustmentModel>> {
        validate_range(self.min_grade, self.max_grade)?;

        match self.model {
            GradeModelKind::None => Ok(Box::new(NoGradeAdjustment)),
            GradeModelKind::Minetti => {
                let model = match &self.coefficients {
                    Some(coefficients) => {
                        PolynomialGradeModel::new(coefficients.clone(), self.min_grade, self.max_grade)?
                    }
                    None => PolynomialGradeModel::minetti().with_range(self.min_grade, self.max_grade)?,
                };
                Ok(Box::new(model))
            }
        }
    }
}

/// Configuration management implementation
impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".coursepace")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %config_path.display(), error = %e, "Using default configuration");
                Self::default()
            }
        }
    }

    /// Check every section for values the engine cannot work with
    pub fn validate(&self) -> crate::error::Result<()> {
        self.smoothing.validate()?;
        for (course_id, patch) in &self.course_overrides {
            self.smoothing.merge(patch).validate().map_err(|e| {
                CoursePaceError::Configuration(format!("override for course {}: {}", course_id, e))
            })?;
        }
        if !self.track.min_point_spacing_meters.is_finite() || self.track.min_point_spacing_meters < 0.0 {
            return Err(CoursePaceError::Configuration(
                "min_point_spacing_meters must be a non-negative number".to_string(),
            ));
        }
        if !self.metrics.elevation_noise_floor_meters.is_finite()
            || self.metrics.elevation_noise_floor_meters < 0.0
        {
            return Err(CoursePaceError::Configuration(
                "elevation_noise_floor_meters must be a non-negative number".to_string(),
            ));
        }
        self.grade_model.build().map(|_| ())
    }

    /// Smoothing parameters for a course: the default merged with its override.
    pub fn smoothing_for_course(&self, course_id: &str) -> SmoothingConfig {
        match self.course_overrides.get(course_id) {
            Some(patch) => self.smoothing.merge(patch),
            None => self.smoothing,
        }
    }

    /// Store an override for a course; an empty patch removes it.
    pub fn set_course_override(&mut self, course_id: &str, patch: SmoothingOverride) -> crate::error::Result<()> {
        if patch.is_empty() {
            self.course_overrides.remove(course_id);
        } else {
            self.smoothing.merge(&patch).validate()?;
            self.course_overrides.insert(course_id.to_string(), patch);
        }
        self.metadata.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.metadata.version, deserialized.metadata.version);
        assert_eq!(config.smoothing, deserialized.smoothing);
        assert_eq!(config.grade_model, deserialized.grade_model);
    }

    #[test]
    fn test_merge_falls_back_per_field() {
        let defaults = SmoothingConfig::default();
        let patch = SmoothingOverride {
            grade_window_meters: Some(40.0),
            ..Default::default()
        };

        let merged = defaults.merge(&patch);
        assert_eq!(merged.grade_window_meters, 40.0);
        assert_eq!(merged.sample_step_meters, defaults.sample_step_meters);
        assert_eq!(merged.pace_smoothing_meters, defaults.pace_smoothing_meters);
    }

    #[test]
    fn test_course_override_resolution() {
        let mut config = AppConfig::default();
        config
            .set_course_override(
                "course-a",
                SmoothingOverride {
                    sample_step_meters: Some(10.0),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(config.smoothing_for_course("course-a").sample_step_meters, 10.0);
        assert_eq!(config.smoothing_for_course("course-b"), config.smoothing);

        config
            .set_course_override("course-a", SmoothingOverride::default())
            .unwrap();
        assert!(config.course_overrides.is_empty());
    }

    #[test]
    fn test_invalid_override_rejected() {
        let mut config = AppConfig::default();
        let result = config.set_course_override(
            "course-a",
            SmoothingOverride {
                sample_step_meters: Some(0.0),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(CoursePaceError::Configuration(_))));
    }

    #[test]
    fn test_grade_model_range_validation() {
        let settings = GradeModelSettings {
            min_grade: 0.2,
            max_grade: -0.2,
            ..Default::default()
        };
        assert!(settings.build().is_err());
    }

    #[test]
    fn test_config_file_io() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original_config = AppConfig::default();
        original_config.display.distance_unit = DistanceUnit::Miles;
        original_config
            .set_course_override(
                "course-a",
                SmoothingOverride {
                    grade_window_meters: Some(60.0),
                    ..Default::default()
                },
            )
            .unwrap();

        original_config.save_to_file(&config_path).unwrap();
        let loaded_config = AppConfig::load_from_file(&config_path).unwrap();

        assert_eq!(loaded_config.display.distance_unit, DistanceUnit::Miles);
        assert_eq!(loaded_config.smoothing_for_course("course-a").grade_window_meters, 60.0);
    }

    #[test]
    fn test_partial_file_uses_section_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
            [metadata]
            version = "1.0"
            created_at = "2024-01-01T00:00:00Z"
            updated_at = "2024-01-01T00:00:00Z"

            [smoothing]
            grade_window_meters = 80.0
            sample_step_meters = 20.0
            pace_smoothing_meters = 300.0
            "#,
        )
        .unwrap();

        let config = AppConfig::load_from_file(&config_path).unwrap();
        assert_eq!(config.smoothing.grade_window_meters, 80.0);
        assert_eq!(config.track, TrackSettings::default());
        assert_eq!(config.grade_model.model, GradeModelKind::Minetti);
    }
}
