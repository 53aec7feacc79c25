//! End-to-end course analysis
//!
//! [`CourseAnalyzer`] runs normalize -> smooth -> metrics -> waypoint
//! extraction. A [`Course`] holds only the original track, its normalized
//! points and everything derived from them; derived state is always
//! recomputed in full, never patched.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::{AppConfig, GradeModelSettings, SmoothingConfig, SmoothingOverride};
use crate::error::Result;
use crate::metrics::CourseMetricsAggregator;
use crate::models::{CourseMetrics, NormalizedPoint, SmoothedPoint, TrackMarker, TrackSample};
use crate::normalize::TrackNormalizer;
use crate::pacing::PacingEngine;
use crate::smoothing::ElevationSmoother;
use crate::waypoints::{extract_waypoints, WaypointLocator, WaypointSet};

/// Everything needed to create a course
#[derive(Debug, Clone, Default)]
pub struct CourseInput {
    pub course_id: String,
    pub name: String,
    /// Uploaded file content, stored untouched on the course
    pub original_track_content: String,
    pub samples: Vec<TrackSample>,
    pub markers: Vec<TrackMarker>,
    /// Per-course smoothing fields taking precedence over configuration
    pub smoothing_override: Option<SmoothingOverride>,
}

impl CourseInput {
    pub fn new(
        course_id: impl Into<String>,
        name: impl Into<String>,
        original_track_content: impl Into<String>,
        samples: Vec<TrackSample>,
    ) -> Self {
        Self {
            course_id: course_id.into(),
            name: name.into(),
            original_track_content: original_track_content.into(),
            samples,
            ..Self::default()
        }
    }

    pub fn with_markers(mut self, markers: Vec<TrackMarker>) -> Self {
        self.markers = markers;
        self
    }
}

/// An analyzed course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    original_track_content: String,
    normalized: Vec<NormalizedPoint>,
    profile: Vec<SmoothedPoint>,
    smoothing: SmoothingConfig,
    metrics: CourseMetrics,
    pub created_at: DateTime<Utc>,
}

impl Course {
    pub fn original_track_content(&self) -> &str {
        &self.original_track_content
    }

    pub fn normalized_points(&self) -> &[NormalizedPoint] {
        &self.normalized
    }

    pub fn profile(&self) -> &[SmoothedPoint] {
        &self.profile
    }

    pub fn smoothing(&self) -> &SmoothingConfig {
        &self.smoothing
    }

    pub fn metrics(&self) -> &CourseMetrics {
        &self.metrics
    }

    pub fn total_distance_meters(&self) -> f64 {
        self.metrics.total_distance_meters
    }

    /// Locator for manual waypoint placement on this course
    pub fn locator(&self) -> Result<WaypointLocator<'_, SmoothedPoint>> {
        WaypointLocator::new(&self.profile)
    }

    /// The smoothed profile as a GeoJSON LineString feature.
    ///
    /// Coordinates are `[lng, lat, smoothed elevation]`; per-point distances
    /// and grades are carried in the properties.
    pub fn geo_profile(&self) -> Value {
        let coordinates: Vec<Value> = self
            .profile
            .iter()
            .map(|p| match p.smoothed_elevation_meters {
                Some(elevation) => json!([p.point.lng, p.point.lat, elevation]),
                None => json!([p.point.lng, p.point.lat]),
            })
            .collect();
        let distances: Vec<f64> = self.profile.iter().map(|p| p.point.distance_meters).collect();
        let grades: Vec<f64> = self.profile.iter().map(|p| p.grade).collect();

        json!({
            "type": "Feature",
            "geometry": {
                "type": "LineString",
                "coordinates": coordinates,
            },
            "properties": {
                "course_id": self.id,
                "name": self.name,
                "distances_meters": distances,
                "grades": grades,
                "smoothing": self.smoothing,
                "metrics": self.metrics,
            },
        })
    }
}

/// Pipeline façade wiring normalizer, smoother, aggregator and locator
#[derive(Debug, Clone, Default)]
pub struct CourseAnalyzer {
    normalizer: TrackNormalizer,
    aggregator: CourseMetricsAggregator,
    smoothing: SmoothingConfig,
    course_overrides: HashMap<String, SmoothingOverride>,
    grade_model: GradeModelSettings,
}

impl CourseAnalyzer {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            normalizer: TrackNormalizer::new(&config.track),
            aggregator: CourseMetricsAggregator::new(&config.metrics),
            smoothing: config.smoothing,
            course_overrides: config.course_overrides.clone(),
            grade_model: config.grade_model.clone(),
        }
    }

    /// Smoothing for a course: defaults, then configured override, then the input's own override
    pub fn smoothing_for(&self, input: &CourseInput) -> SmoothingConfig {
        let configured = match self.course_overrides.get(&input.course_id) {
            Some(patch) => self.smoothing.merge(patch),
            None => self.smoothing,
        };
        match &input.smoothing_override {
            Some(patch) => configured.merge(patch),
            None => configured,
        }
    }

    /// Pacing engine using the configured grade model
    pub fn pacing_engine(&self) -> Result<PacingEngine> {
        Ok(PacingEngine::new(self.grade_model.build()?).with_aggregator(self.aggregator.clone()))
    }

    /// Analyze one course and extract its initial waypoints.
    pub fn analyze(&self, input: &CourseInput) -> Result<(Course, WaypointSet)> {
        let smoothing = self.smoothing_for(input);
        let smoother = ElevationSmoother::new(smoothing)?;

        let normalized = self.normalizer.normalize(&input.samples)?;
        let profile = smoother.smooth(&normalized);
        let metrics = self.aggregator.aggregate(&profile)?;

        let waypoints = {
            let locator = WaypointLocator::new(&profile)?;
            extract_waypoints(&input.course_id, &locator, &input.markers)?
        };

        info!(
            course = %input.course_id,
            points = normalized.len(),
            total_distance_meters = metrics.total_distance_meters,
            gain = ?metrics.elevation_gain_meters,
            waypoints = waypoints.len(),
            "Analyzed course"
        );

        let course = Course {
            id: input.course_id.clone(),
            name: input.name.clone(),
            original_track_content: input.original_track_content.clone(),
            normalized,
            profile,
            smoothing,
            metrics,
            created_at: Utc::now(),
        };
        Ok((course, waypoints))
    }

    /// Recompute the profile and metrics of `course` with new smoothing.
    ///
    /// Waypoints are unaffected: their distances come from normalized points,
    /// which do not change.
    pub fn resmooth(&self, course: &mut Course, smoothing: SmoothingConfig) -> Result<()> {
        let smoother = ElevationSmoother::new(smoothing)?;
        let profile = smoother.smooth(&course.normalized);
        let metrics = self.aggregator.aggregate(&profile)?;

        course.profile = profile;
        course.metrics = metrics;
        course.smoothing = smoothing;
        Ok(())
    }

    /// Analyze independent courses in parallel.
    ///
    /// Results keep the input order; one failure does not affect the others.
    pub fn analyze_batch(&self, inputs: &[CourseInput]) -> Vec<Result<(Course, WaypointSet)>> {
        let results: Vec<Result<(Course, WaypointSet)>> = inputs.par_iter().map(|input| self.analyze(input)).collect();

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            warn!(failed, total = inputs.len(), "Some courses failed analysis");
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoursePaceError;
    use crate::models::Plan;
    use crate::waypoints::{PlacementTarget, WaypointDetails};

    /// A 2 km course heading north: flat first half, 100 m climb in the second
    fn hill_samples() -> Vec<TrackSample> {
        (0..=200)
            .map(|i| {
                let lat = 45.0 + i as f64 * 0.00009;
                let elevation = match i {
                    0..=99 => 500.0,
                    _ => 500.0 + (i - 100) as f64,
                };
                TrackSample::new(i as u64, lat, 6.0, Some(elevation))
            })
            .collect()
    }

    #[test]
    fn test_analyze_pipeline() {
        let analyzer = CourseAnalyzer::default();
        let input = CourseInput::new("hill", "Hill", "<gpx/>", hill_samples());

        let (course, waypoints) = analyzer.analyze(&input).unwrap();

        assert_eq!(course.original_track_content(), "<gpx/>");
        assert_eq!(course.profile().len(), course.normalized_points().len());
        assert!((course.total_distance_meters() - 2001.0).abs() < 5.0);
        let gain = course.metrics().elevation_gain_meters.unwrap();
        assert!((gain - 100.0).abs() < 2.0, "gain {}", gain);
        assert_eq!(waypoints.len(), 2);
        assert_eq!(waypoints.waypoints()[1].distance_meters, course.total_distance_meters());
    }

    #[test]
    fn test_insufficient_track_fails() {
        let input = CourseInput::new("short", "Short", "", hill_samples()[..1].to_vec());
        let result = CourseAnalyzer::default().analyze(&input);
        assert!(matches!(result, Err(CoursePaceError::InsufficientData { .. })));
    }

    #[test]
    fn test_override_precedence() {
        let mut config = AppConfig::default();
        config
            .set_course_override(
                "hill",
                SmoothingOverride {
                    grade_window_meters: Some(40.0),
                    sample_step_meters: Some(10.0),
                    pace_smoothing_meters: None,
                },
            )
            .unwrap();
        let analyzer = CourseAnalyzer::from_config(&config);

        let mut input = CourseInput::new("hill", "Hill", "", hill_samples());
        input.smoothing_override = Some(SmoothingOverride {
            sample_step_meters: Some(30.0),
            ..SmoothingOverride::default()
        });

        let smoothing = analyzer.smoothing_for(&input);
        assert_eq!(smoothing.grade_window_meters, 40.0);
        assert_eq!(smoothing.sample_step_meters, 30.0);
        assert_eq!(smoothing.pace_smoothing_meters, SmoothingConfig::default().pace_smoothing_meters);
    }

    #[test]
    fn test_resmooth_recomputes_but_keeps_track() {
        let analyzer = CourseAnalyzer::default();
        let (mut course, _) = analyzer.analyze(&CourseInput::new("hill", "Hill", "", hill_samples())).unwrap();
        let normalized_before = course.normalized_points().to_vec();

        let wide = SmoothingConfig {
            grade_window_meters: 400.0,
            ..SmoothingConfig::default()
        };
        analyzer.resmooth(&mut course, wide).unwrap();
        assert_eq!(course.smoothing().grade_window_meters, 400.0);
        assert_eq!(course.normalized_points(), normalized_before.as_slice());

        // Idempotent
        let once = course.clone();
        analyzer.resmooth(&mut course, wide).unwrap();
        assert_eq!(course.profile(), once.profile());
        assert_eq!(course.metrics(), once.metrics());
    }

    #[test]
    fn test_batch_keeps_order_and_isolates_failures() {
        let analyzer = CourseAnalyzer::default();
        let inputs = vec![
            CourseInput::new("a", "A", "", hill_samples()),
            CourseInput::new("b", "B", "", Vec::new()),
            CourseInput::new("c", "C", "", hill_samples()),
        ];

        let results = analyzer.analyze_batch(&inputs);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().0.id, "a");
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().0.id, "c");
    }

    #[test]
    fn test_geo_profile_shape() {
        let (course, _) = CourseAnalyzer::default()
            .analyze(&CourseInput::new("hill", "Hill", "", hill_samples()))
            .unwrap();
        let feature = course.geo_profile();

        assert_eq!(feature["type"], "Feature");
        assert_eq!(feature["geometry"]["type"], "LineString");
        let coordinates = feature["geometry"]["coordinates"].as_array().unwrap();
        assert_eq!(coordinates.len(), course.profile().len());
        assert_eq!(coordinates[0][0], 6.0);
        assert_eq!(coordinates[0].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_manual_waypoint_then_plan() {
        let analyzer = CourseAnalyzer::default();
        let (course, mut waypoints) = analyzer.analyze(&CourseInput::new("hill", "Hill", "", hill_samples())).unwrap();

        let locator = course.locator().unwrap();
        waypoints
            .insert(&locator, PlacementTarget::Distance(1000.0), WaypointDetails::named("Aid"))
            .unwrap();
        assert_eq!(waypoints.waypoints()[1].name, "Aid");

        let mut plan = Plan::with_pace("hill", 360.0);
        plan.use_grade_adjustment = true;
        let schedule = analyzer
            .pacing_engine()
            .unwrap()
            .schedule(&plan, waypoints.waypoints(), course.profile())
            .unwrap();
        assert_eq!(schedule.segments.len(), 2);
        // The second half holds the climb
        assert!(schedule.segments[1].elapsed_seconds > schedule.segments[0].elapsed_seconds);
    }
}
