//! Course-level aggregates over a smoothed profile

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MetricsSettings;
use crate::error::{CoursePaceError, Result};
use crate::models::{CourseMetrics, SmoothedPoint};

/// Gain, loss and grade between two distances along a profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeMetrics {
    pub distance_meters: f64,
    pub elevation_gain_meters: Option<f64>,
    pub elevation_loss_meters: Option<f64>,
    /// Net rise over run for the range
    pub average_grade: f64,
}

/// Computes [`CourseMetrics`] with noise-floor filtered gain and loss
#[derive(Debug, Clone)]
pub struct CourseMetricsAggregator {
    noise_floor_meters: f64,
}

impl Default for CourseMetricsAggregator {
    fn default() -> Self {
        Self::new(&MetricsSettings::default())
    }
}

impl CourseMetricsAggregator {
    pub fn new(settings: &MetricsSettings) -> Self {
        Self {
            noise_floor_meters: settings.elevation_noise_floor_meters.max(0.0),
        }
    }

    pub fn noise_floor_meters(&self) -> f64 {
        self.noise_floor_meters
    }

    /// Aggregate a whole profile.
    ///
    /// Fails with [`CoursePaceError::EmptyProfile`] for fewer than two points.
    pub fn aggregate(&self, profile: &[SmoothedPoint]) -> Result<CourseMetrics> {
        let Some(last) = profile.last().filter(|_| profile.len() >= 2) else {
            return Err(CoursePaceError::EmptyProfile {
                point_count: profile.len(),
            });
        };

        let elevations: Option<Vec<f64>> = profile.iter().map(|p| p.smoothed_elevation_meters).collect();

        let metrics = match elevations {
            Some(elevations) => {
                let (gain, loss) = gain_and_loss(elevations.iter().copied(), self.noise_floor_meters);
                let min = elevations.iter().copied().fold(f64::INFINITY, f64::min);
                let max = elevations.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                CourseMetrics {
                    total_distance_meters: last.point.distance_meters,
                    elevation_gain_meters: Some(gain),
                    elevation_loss_meters: Some(loss),
                    min_elevation_meters: Some(min),
                    max_elevation_meters: Some(max),
                }
            }
            None => CourseMetrics {
                total_distance_meters: last.point.distance_meters,
                ..CourseMetrics::default()
            },
        };

        debug!(
            total_distance_meters = metrics.total_distance_meters,
            gain = ?metrics.elevation_gain_meters,
            loss = ?metrics.elevation_loss_meters,
            "Aggregated course metrics"
        );

        Ok(metrics)
    }

    /// Aggregate the part of `profile` between `from_meters` and `to_meters`.
    ///
    /// Range ends falling between profile points use linearly interpolated
    /// elevation. Bounds are clamped to the profile.
    pub fn aggregate_range(&self, profile: &[SmoothedPoint], from_meters: f64, to_meters: f64) -> Result<RangeMetrics> {
        let (Some(first), Some(last)) = (profile.first(), profile.last()) else {
            return Err(CoursePaceError::EmptyProfile { point_count: 0 });
        };
        if profile.len() < 2 {
            return Err(CoursePaceError::EmptyProfile { point_count: 1 });
        }

        let start = from_meters.min(to_meters).max(first.point.distance_meters);
        let end = from_meters.max(to_meters).min(last.point.distance_meters);
        let distance_meters = (end - start).max(0.0);

        let (Some(start_elevation), Some(end_elevation)) =
            (elevation_at(profile, start), elevation_at(profile, end))
        else {
            return Ok(RangeMetrics {
                distance_meters,
                ..RangeMetrics::default()
            });
        };

        let inner = profile
            .iter()
            .filter(|p| p.point.distance_meters > start && p.point.distance_meters < end)
            .filter_map(|p| p.smoothed_elevation_meters);
        let series = std::iter::once(start_elevation)
            .chain(inner)
            .chain(std::iter::once(end_elevation));
        let (gain, loss) = gain_and_loss(series, self.noise_floor_meters);

        let average_grade = if distance_meters > 0.0 {
            (end_elevation - start_elevation) / distance_meters
        } else {
            0.0
        };

        Ok(RangeMetrics {
            distance_meters,
            elevation_gain_meters: Some(gain),
            elevation_loss_meters: Some(loss),
            average_grade,
        })
    }
}

/// Total gain and loss of an elevation series with a hysteresis noise floor.
///
/// A change is counted once the series has moved at least `floor` away from
/// the last committed elevation, which then becomes the new reference.
pub fn gain_and_loss(elevations: impl IntoIterator<Item = f64>, floor: f64) -> (f64, f64) {
    let mut iter = elevations.into_iter();
    let Some(mut reference) = iter.next() else {
        return (0.0, 0.0);
    };

    let mut gain = 0.0;
    let mut loss = 0.0;
    for elevation in iter {
        let delta = elevation - reference;
        if delta >= floor {
            gain += delta;
            reference = elevation;
        } else if -delta >= floor {
            loss -= delta;
            reference = elevation;
        }
    }
    (gain, loss)
}

/// Smoothed elevation at `distance`, interpolated between profile points
pub fn elevation_at(profile: &[SmoothedPoint], distance: f64) -> Option<f64> {
    let upper = profile.partition_point(|p| p.point.distance_meters < distance);
    if upper == 0 {
        return profile.first()?.smoothed_elevation_meters;
    }
    if upper >= profile.len() {
        return profile.last()?.smoothed_elevation_meters;
    }

    let lo = &profile[upper - 1];
    let hi = &profile[upper];
    let (lo_elevation, hi_elevation) = (lo.smoothed_elevation_meters?, hi.smoothed_elevation_meters?);
    let span = hi.point.distance_meters - lo.point.distance_meters;
    if span <= 0.0 {
        return Some(hi_elevation);
    }
    let ratio = (distance - lo.point.distance_meters) / span;
    Some(lo_elevation + ratio * (hi_elevation - lo_elevation))
}
