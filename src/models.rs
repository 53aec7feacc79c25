use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Raw position sample as extracted from an uploaded track file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSample {
    /// Position of the sample in the source track (the only defined order)
    pub sequence_index: u64,

    /// Latitude in degrees (WGS84)
    pub lat: f64,

    /// Longitude in degrees (WGS84)
    pub lng: f64,

    /// Elevation in meters above sea level, if the source recorded one
    pub elevation_meters: Option<f64>,
}

impl TrackSample {
    pub fn new(sequence_index: u64, lat: f64, lng: f64, elevation_meters: Option<f64>) -> Self {
        Self {
            sequence_index,
            lat,
            lng,
            elevation_meters,
        }
    }

    /// Check if the sample has usable WGS84 coordinates.
    pub fn has_valid_position(&self) -> bool {
        is_valid_coordinate(self.lat, self.lng)
    }
}

pub(crate) fn is_valid_coordinate(lat: f64, lng: f64) -> bool {
    lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng)
}

/// Explicitly tagged point in the source track (aid station, summit, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMarker {
    pub name: String,

    pub lat: f64,

    pub lng: f64,

    /// Distance along the route, when the source already knows it
    #[serde(default)]
    pub distance_meters: Option<f64>,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(default)]
    pub icon: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

/// Common read access to distance-indexed profile points
pub trait ProfilePoint {
    fn distance_meters(&self) -> f64;
    fn lat(&self) -> f64;
    fn lng(&self) -> f64;
    fn elevation_meters(&self) -> Option<f64>;
}

/// Track point with cumulative distance along the route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    /// Cumulative distance from the first point in meters (non-decreasing)
    pub distance_meters: f64,

    /// Latitude in degrees
    pub lat: f64,

    /// Longitude in degrees
    pub lng: f64,

    /// Elevation in meters, `None` only when the course has no elevation data
    pub elevation_meters: Option<f64>,
}

impl ProfilePoint for NormalizedPoint {
    fn distance_meters(&self) -> f64 {
        self.distance_meters
    }

    fn lat(&self) -> f64 {
        self.lat
    }

    fn lng(&self) -> f64 {
        self.lng
    }

    fn elevation_meters(&self) -> Option<f64> {
        self.elevation_meters
    }
}

/// Normalized point enriched with smoothed elevation and grade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothedPoint {
    #[serde(flatten)]
    pub point: NormalizedPoint,

    /// Distance-windowed average elevation in meters
    pub smoothed_elevation_meters: Option<f64>,

    /// Signed rise over run of the smoothed elevation (0.05 = 5% uphill)
    pub grade: f64,
}

impl ProfilePoint for SmoothedPoint {
    fn distance_meters(&self) -> f64 {
        self.point.distance_meters
    }

    fn lat(&self) -> f64 {
        self.point.lat
    }

    fn lng(&self) -> f64 {
        self.point.lng
    }

    fn elevation_meters(&self) -> Option<f64> {
        self.point.elevation_meters
    }
}

/// Aggregate metrics derived from the smoothed profile
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CourseMetrics {
    /// Distance of the final profile point in meters
    pub total_distance_meters: f64,

    /// Cumulative climbing in meters (`None` when the course has no elevation)
    pub elevation_gain_meters: Option<f64>,

    /// Cumulative descent in meters (`None` when the course has no elevation)
    pub elevation_loss_meters: Option<f64>,

    /// Lowest smoothed elevation
    pub min_elevation_meters: Option<f64>,

    /// Highest smoothed elevation
    pub max_elevation_meters: Option<f64>,
}

/// Named point of interest placed on a course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: String,

    pub course_id: String,

    pub name: String,

    /// Distance along the route, always taken from a profile point
    pub distance_meters: f64,

    pub elevation_meters: Option<f64>,

    pub lat: f64,

    pub lng: f64,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Dense 0-based rank by ascending distance
    pub order: u32,

    #[serde(default)]
    pub icon: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

/// Distance unit that pace values are expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    #[default]
    Kilometers,
    Miles,
}

impl DistanceUnit {
    pub fn meters_per_unit(&self) -> f64 {
        match self {
            DistanceUnit::Kilometers => 1000.0,
            DistanceUnit::Miles => 1609.344,
        }
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            DistanceUnit::Kilometers => "km",
            DistanceUnit::Miles => "mi",
        }
    }
}

impl std::str::FromStr for DistanceUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "km" | "kilometers" | "kilometres" | "metric" => Ok(DistanceUnit::Kilometers),
            "mi" | "miles" | "imperial" => Ok(DistanceUnit::Miles),
            _ => Err(format!("Invalid distance unit: {}", s)),
        }
    }
}

/// How the base pace of a plan is determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaceMode {
    /// Fixed seconds per distance unit
    #[default]
    Pace,
    /// Finish at the target time under flat pacing
    Time,
    /// Finish at the target time with grade-adjusted effort
    Normalized,
}

/// How pace varies with distance, independent of grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacingStrategy {
    #[default]
    Flat,
    Linear,
}

/// Pacing plan for one course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub course_id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub pace_mode: PaceMode,

    /// Base pace in seconds per `distance_unit` (pace mode)
    #[serde(default)]
    pub pace_seconds_per_unit: Option<f64>,

    /// Goal finish time in seconds including stoppages (time/normalized modes)
    #[serde(default)]
    pub target_time_seconds: Option<f64>,

    #[serde(default)]
    pub distance_unit: DistanceUnit,

    #[serde(default)]
    pub pacing_strategy: PacingStrategy,

    /// Split steepness for the linear strategy, in [-50, 50]
    #[serde(default)]
    pub pacing_linear_percent: i32,

    #[serde(default)]
    pub use_grade_adjustment: bool,

    /// Stoppage applied at every waypoint after the first
    #[serde(default)]
    pub default_stoppage_seconds: f64,

    /// Per-waypoint stoppage, keyed by waypoint id
    #[serde(default)]
    pub stoppage_overrides: HashMap<String, f64>,

    /// Wall-clock start, used to report arrival times of day
    #[serde(default)]
    pub start_time: Option<NaiveDateTime>,
}

impl Plan {
    /// Create a plan with a fixed pace in seconds per kilometer.
    pub fn with_pace(course_id: impl Into<String>, pace_seconds_per_km: f64) -> Self {
        Self {
            course_id: course_id.into(),
            pace_mode: PaceMode::Pace,
            pace_seconds_per_unit: Some(pace_seconds_per_km),
            ..Self::blank()
        }
    }

    /// Create a plan that targets a finish time.
    pub fn with_target_time(course_id: impl Into<String>, target_time_seconds: f64, mode: PaceMode) -> Self {
        Self {
            course_id: course_id.into(),
            pace_mode: mode,
            target_time_seconds: Some(target_time_seconds),
            ..Self::blank()
        }
    }

    fn blank() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            course_id: String::new(),
            name: String::new(),
            pace_mode: PaceMode::Pace,
            pace_seconds_per_unit: None,
            target_time_seconds: None,
            distance_unit: DistanceUnit::Kilometers,
            pacing_strategy: PacingStrategy::Flat,
            pacing_linear_percent: 0,
            use_grade_adjustment: false,
            default_stoppage_seconds: 0.0,
            stoppage_overrides: HashMap::new(),
            start_time: None,
        }
    }

    /// Stoppage at a waypoint: the override if present, else the default.
    pub fn stoppage_for(&self, waypoint_id: &str) -> f64 {
        self.stoppage_overrides
            .get(waypoint_id)
            .copied()
            .unwrap_or(self.default_stoppage_seconds)
    }
}

/// Schedule entry between two consecutive waypoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingSegment {
    pub from_waypoint_id: String,

    pub to_waypoint_id: String,

    pub distance_meters: f64,

    /// Moving time for the segment
    pub elapsed_seconds: f64,

    /// Stoppage spent at the destination waypoint
    pub stoppage_seconds: f64,

    /// Time since the start on leaving the destination waypoint
    pub cumulative_elapsed_seconds: f64,

    pub average_pace_seconds_per_unit: f64,

    /// Distance-weighted mean grade over the segment
    pub average_grade: f64,

    pub elevation_gain_meters: Option<f64>,

    pub elevation_loss_meters: Option<f64>,
}

/// Timing at a single waypoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointArrival {
    pub waypoint_id: String,

    pub name: String,

    pub distance_meters: f64,

    /// Time since the start on reaching the waypoint
    pub arrival_seconds: f64,

    pub stoppage_seconds: f64,

    /// Time since the start on leaving the waypoint
    pub cumulative_elapsed_seconds: f64,

    /// Time of day on reaching the waypoint, when the plan has a start time
    pub arrival_time: Option<NaiveDateTime>,
}

/// Complete pacing output for a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingSchedule {
    pub plan_id: String,

    pub distance_unit: DistanceUnit,

    /// Resolved base pace before strategy and grade shaping
    pub base_pace_seconds_per_unit: f64,

    pub segments: Vec<PacingSegment>,

    pub arrivals: Vec<WaypointArrival>,

    pub total_moving_seconds: f64,

    pub total_stoppage_seconds: f64,

    pub total_elapsed_seconds: f64,
}

/// Distance-indexed pace sample for chart consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacePoint {
    pub distance_meters: f64,

    pub pace_seconds_per_unit: f64,

    /// Pace averaged over the pace smoothing window
    pub smoothed_pace_seconds_per_unit: f64,
}
