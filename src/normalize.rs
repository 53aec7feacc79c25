//! Track normalization: raw samples to a distance-indexed profile
//!
//! Distances are great-circle (haversine) distances on a sphere with the
//! WGS84 mean radius, accumulated along the sample sequence. Samples that
//! land within the minimum spacing of the previously kept point are merged
//! into it so later grade computations never divide by a zero-length run.

use geo::{Distance, Haversine, Point};
use tracing::{debug, warn};

use crate::config::TrackSettings;
use crate::error::{CoursePaceError, Result};
use crate::models::{NormalizedPoint, TrackSample};

/// Minimum number of distinct points a course needs
pub const MIN_TRACK_POINTS: usize = 2;

/// Converts raw track samples into [`NormalizedPoint`]s
#[derive(Debug, Clone)]
pub struct TrackNormalizer {
    min_point_spacing_meters: f64,
}

impl Default for TrackNormalizer {
    fn default() -> Self {
        Self::new(&TrackSettings::default())
    }
}

/// Point being built while merging jittered samples
struct PendingPoint {
    distance_meters: f64,
    lat: f64,
    lng: f64,
    elevation_sum: f64,
    elevation_count: u32,
}

impl PendingPoint {
    fn from_sample(sample: &TrackSample, distance_meters: f64) -> Self {
        let mut point = Self {
            distance_meters,
            lat: sample.lat,
            lng: sample.lng,
            elevation_sum: 0.0,
            elevation_count: 0,
        };
        point.absorb_elevation(sample.elevation_meters);
        point
    }

    fn absorb_elevation(&mut self, elevation: Option<f64>) {
        if let Some(value) = elevation.filter(|v| v.is_finite()) {
            self.elevation_sum += value;
            self.elevation_count += 1;
        }
    }

    fn finish(self) -> NormalizedPoint {
        NormalizedPoint {
            distance_meters: self.distance_meters,
            lat: self.lat,
            lng: self.lng,
            elevation_meters: (self.elevation_count > 0)
                .then(|| self.elevation_sum / self.elevation_count as f64),
        }
    }
}

impl TrackNormalizer {
    pub fn new(settings: &TrackSettings) -> Self {
        Self {
            min_point_spacing_meters: settings.min_point_spacing_meters.max(0.0),
        }
    }

    /// Normalize a raw sample sequence.
    ///
    /// Fails with [`CoursePaceError::InsufficientData`] when fewer than two
    /// distinct, valid positions remain.
    pub fn normalize(&self, samples: &[TrackSample]) -> Result<Vec<NormalizedPoint>> {
        if samples.len() < MIN_TRACK_POINTS {
            return Err(CoursePaceError::InsufficientData {
                point_count: samples.len(),
                minimum_required: MIN_TRACK_POINTS,
            });
        }

        let mut ordered: Vec<&TrackSample> = samples.iter().filter(|s| s.has_valid_position()).collect();
        let dropped = samples.len() - ordered.len();
        if dropped > 0 {
            warn!(dropped, "Dropped samples with invalid coordinates");
        }
        // Stable, so duplicate indices keep their input order
        ordered.sort_by_key(|s| s.sequence_index);

        let mut points: Vec<PendingPoint> = Vec::with_capacity(ordered.len());
        let mut merged = 0usize;
        for sample in ordered {
            match points.last_mut() {
                None => points.push(PendingPoint::from_sample(sample, 0.0)),
                Some(previous) => {
                    let delta = haversine_meters(previous.lat, previous.lng, sample.lat, sample.lng);
                    if delta < self.min_point_spacing_meters {
                        previous.absorb_elevation(sample.elevation_meters);
                        merged += 1;
                    } else {
                        let distance = previous.distance_meters + delta;
                        points.push(PendingPoint::from_sample(sample, distance));
                    }
                }
            }
        }

        if points.len() < MIN_TRACK_POINTS {
            return Err(CoursePaceError::InsufficientData {
                point_count: points.len(),
                minimum_required: MIN_TRACK_POINTS,
            });
        }

        let mut normalized: Vec<NormalizedPoint> = points.into_iter().map(PendingPoint::finish).collect();
        interpolate_missing_elevation(&mut normalized);

        debug!(
            input = samples.len(),
            output = normalized.len(),
            merged,
            total_distance_meters = normalized.last().map(|p| p.distance_meters).unwrap_or(0.0),
            "Normalized track"
        );

        Ok(normalized)
    }
}

/// Great-circle distance between two WGS84 positions in meters.
pub fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    Haversine::distance(Point::new(lng1, lat1), Point::new(lng2, lat2))
}

/// Fill elevation gaps by linear interpolation over distance.
///
/// Gaps before the first or after the last known value take that value. A
/// profile with no known elevation at all is left untouched (all `None`).
fn interpolate_missing_elevation(points: &mut [NormalizedPoint]) {
    let known: Vec<usize> = points
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.elevation_meters.map(|_| i))
        .collect();

    let (Some(&first), Some(&last)) = (known.first(), known.last()) else {
        return;
    };

    let first_value = points[first].elevation_meters;
    let last_value = points[last].elevation_meters;
    for point in &mut points[..first] {
        point.elevation_meters = first_value;
    }
    for point in &mut points[last + 1..] {
        point.elevation_meters = last_value;
    }

    for pair in known.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if hi - lo < 2 {
            continue;
        }
        let (Some(lo_elevation), Some(hi_elevation)) = (points[lo].elevation_meters, points[hi].elevation_meters)
        else {
            continue;
        };
        let lo_distance = points[lo].distance_meters;
        let span = points[hi].distance_meters - lo_distance;
        for point in &mut points[lo + 1..hi] {
            let ratio = if span > 0.0 {
                (point.distance_meters - lo_distance) / span
            } else {
                0.5
            };
            point.elevation_meters = Some(lo_elevation + ratio * (hi_elevation - lo_elevation));
        }
    }
}
