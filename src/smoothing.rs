//! Distance-windowed smoothing of elevation, grade and pace series
//!
//! Windows are measured in meters along the route, never in sample counts,
//! so the same configuration behaves identically on sparse and dense tracks.

use tracing::debug;

use crate::config::SmoothingConfig;
use crate::error::Result;
use crate::models::{NormalizedPoint, SmoothedPoint};

/// Produces [`SmoothedPoint`]s from a normalized profile
#[derive(Debug, Clone)]
pub struct ElevationSmoother {
    config: SmoothingConfig,
}

impl ElevationSmoother {
    /// Create a smoother, rejecting negative or non-finite windows.
    pub fn new(config: SmoothingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SmoothingConfig {
        &self.config
    }

    /// Smooth elevation and derive grade.
    ///
    /// The output has exactly the input's cardinality and distances.
    pub fn smooth(&self, points: &[NormalizedPoint]) -> Vec<SmoothedPoint> {
        let distances: Vec<f64> = points.iter().map(|p| p.distance_meters).collect();

        let smoothed: Vec<Option<f64>> = match points
            .iter()
            .map(|p| p.elevation_meters)
            .collect::<Option<Vec<f64>>>()
        {
            Some(elevations) => {
                moving_average(&distances, &elevations, self.config.grade_window_meters)
                    .into_iter()
                    .map(Some)
                    .collect()
            }
            // Normalization fills every gap, so a hole means no elevation at all
            None => vec![None; points.len()],
        };

        let grades = match smoothed.iter().copied().collect::<Option<Vec<f64>>>() {
            Some(values) => finite_difference_grades(&distances, &values, self.config.sample_step_meters),
            None => vec![0.0; points.len()],
        };

        debug!(
            points = points.len(),
            window_meters = self.config.grade_window_meters,
            step_meters = self.config.sample_step_meters,
            "Smoothed profile"
        );

        points
            .iter()
            .zip(smoothed)
            .zip(grades)
            .map(|((point, smoothed_elevation_meters), grade)| SmoothedPoint {
                point: point.clone(),
                smoothed_elevation_meters,
                grade,
            })
            .collect()
    }

    /// Smooth a derived pace series with the pace window (Wp).
    ///
    /// Kept separate from elevation smoothing: different signal, different window.
    pub fn smooth_pace(&self, distances: &[f64], paces: &[f64]) -> Vec<f64> {
        moving_average(distances, paces, self.config.pace_smoothing_meters)
    }
}

/// Centered moving average over a window measured in distance.
///
/// Each output value is the mean of all values whose distance lies within
/// `window_meters / 2` of the point. The window is truncated at both ends of
/// the sequence. `distances` must be non-decreasing and the same length as
/// `values`.
pub fn moving_average(distances: &[f64], values: &[f64], window_meters: f64) -> Vec<f64> {
    debug_assert_eq!(distances.len(), values.len());
    if window_meters <= 0.0 || values.len() < 2 {
        return values.to_vec();
    }

    let half = window_meters / 2.0;
    let mut prefix = Vec::with_capacity(values.len() + 1);
    prefix.push(0.0);
    for value in values {
        prefix.push(prefix[prefix.len() - 1] + value);
    }

    let mut lo = 0;
    let mut hi = 0;
    let mut out = Vec::with_capacity(values.len());
    for &center in distances {
        while distances[lo] < center - half {
            lo += 1;
        }
        if hi < lo {
            hi = lo;
        }
        while hi + 1 < distances.len() && distances[hi + 1] <= center + half {
            hi += 1;
        }
        let count = (hi - lo + 1) as f64;
        out.push((prefix[hi + 1] - prefix[lo]) / count);
    }
    out
}

/// Grade as the finite difference of `elevations` over at least `step_meters`.
///
/// Uses the nearest point at or before `d - step/2` and the nearest point at
/// or after `d + step/2`. Points closer than `step_meters` to either end of
/// the profile have grade 0.
pub fn finite_difference_grades(distances: &[f64], elevations: &[f64], step_meters: f64) -> Vec<f64> {
    let (Some(&start), Some(&end)) = (distances.first(), distances.last()) else {
        return Vec::new();
    };
    let half = step_meters / 2.0;

    distances
        .iter()
        .map(|&d| {
            if d - start < step_meters || end - d < step_meters {
                return 0.0;
            }
            // Index of the last point at or before d - half
            let lower = distances.partition_point(|&x| x <= d - half).saturating_sub(1);
            // Index of the first point at or after d + half
            let upper = distances.partition_point(|&x| x < d + half).min(distances.len() - 1);
            let run = distances[upper] - distances[lower];
            if run <= 0.0 {
                0.0
            } else {
                (elevations[upper] - elevations[lower]) / run
            }
        })
        .collect()
}
