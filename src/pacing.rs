//! Pace planning between waypoints
//!
//! Pace at distance `x` is `base * strategy(x) * grade_factor(x)`, where the
//! base pace comes from the plan's mode, the strategy is flat or linear over
//! the course span (first to last waypoint), and the grade factor comes from
//! a [`GradeAdjustmentModel`] when grade adjustment is enabled. Elapsed time
//! for a segment is the integral of pace over its distance, evaluated per
//! sub-interval between profile points. Stoppage at each waypoint after the
//! first is added to cumulative time but never changes pace.

use chrono::Duration;
use tracing::{debug, info};

use crate::error::{CoursePaceError, Result};
use crate::grade_model::{GradeAdjustmentModel, PolynomialGradeModel};
use crate::metrics::CourseMetricsAggregator;
use crate::models::{
    PaceMode, PacePoint, PacingSchedule, PacingSegment, PacingStrategy, Plan, SmoothedPoint, Waypoint,
    WaypointArrival,
};
use crate::smoothing::ElevationSmoother;

/// Bound on `|pacing_linear_percent|`
pub const MAX_LINEAR_PERCENT: i32 = 50;

/// Computes [`PacingSchedule`]s for plans over a course profile
#[derive(Debug)]
pub struct PacingEngine {
    model: Box<dyn GradeAdjustmentModel>,
    aggregator: CourseMetricsAggregator,
}

impl Default for PacingEngine {
    fn default() -> Self {
        Self::new(Box::new(PolynomialGradeModel::minetti()))
    }
}

impl PacingEngine {
    pub fn new(model: Box<dyn GradeAdjustmentModel>) -> Self {
        Self {
            model,
            aggregator: CourseMetricsAggregator::default(),
        }
    }

    /// Use a specific aggregator for per-segment gain and loss.
    pub fn with_aggregator(mut self, aggregator: CourseMetricsAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Build the schedule for `plan` over `waypoints` (in any order).
    pub fn schedule(&self, plan: &Plan, waypoints: &[Waypoint], profile: &[SmoothedPoint]) -> Result<PacingSchedule> {
        let ordered = ordered_waypoints(waypoints);
        let curve = self.resolve(plan, &ordered, profile)?;
        let meters_per_unit = plan.distance_unit.meters_per_unit();

        let mut segments = Vec::with_capacity(ordered.len() - 1);
        let mut arrivals = Vec::with_capacity(ordered.len());
        let mut cumulative = 0.0;

        arrivals.push(curve.arrival(plan, ordered[0], 0.0, 0.0));

        for pair in ordered.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let distance = to.distance_meters - from.distance_meters;
            let weight = curve.weighted_length(from.distance_meters, to.distance_meters);
            let elapsed = curve.base_seconds_per_meter * weight;
            let stoppage = plan.stoppage_for(&to.id);
            let range = self
                .aggregator
                .aggregate_range(profile, from.distance_meters, to.distance_meters)?;

            let arrival = cumulative + elapsed;
            cumulative = arrival + stoppage;

            segments.push(PacingSegment {
                from_waypoint_id: from.id.clone(),
                to_waypoint_id: to.id.clone(),
                distance_meters: distance,
                elapsed_seconds: elapsed,
                stoppage_seconds: stoppage,
                cumulative_elapsed_seconds: cumulative,
                average_pace_seconds_per_unit: elapsed / distance * meters_per_unit,
                average_grade: range.average_grade,
                elevation_gain_meters: range.elevation_gain_meters,
                elevation_loss_meters: range.elevation_loss_meters,
            });
            arrivals.push(curve.arrival(plan, to, arrival, stoppage));
        }

        let total_moving_seconds: f64 = segments.iter().map(|s| s.elapsed_seconds).sum();
        let total_stoppage_seconds: f64 = segments.iter().map(|s| s.stoppage_seconds).sum();

        let schedule = PacingSchedule {
            plan_id: plan.id.clone(),
            distance_unit: plan.distance_unit,
            base_pace_seconds_per_unit: curve.base_seconds_per_meter * meters_per_unit,
            segments,
            arrivals,
            total_moving_seconds,
            total_stoppage_seconds,
            total_elapsed_seconds: cumulative,
        };

        info!(
            plan = %plan.id,
            mode = ?plan.pace_mode,
            segments = schedule.segments.len(),
            total_elapsed_seconds = schedule.total_elapsed_seconds,
            "Computed pacing schedule"
        );

        Ok(schedule)
    }

    /// Raw and smoothed pace at every profile point within the course span.
    pub fn pace_series(
        &self,
        plan: &Plan,
        waypoints: &[Waypoint],
        profile: &[SmoothedPoint],
        smoother: &ElevationSmoother,
    ) -> Result<Vec<PacePoint>> {
        let ordered = ordered_waypoints(waypoints);
        let curve = self.resolve(plan, &ordered, profile)?;
        let meters_per_unit = plan.distance_unit.meters_per_unit();
        let end = curve.start + curve.length;

        let (distances, paces): (Vec<f64>, Vec<f64>) = profile
            .iter()
            .map(|p| p.point.distance_meters)
            .filter(|d| (curve.start..=end).contains(d))
            .map(|d| (d, curve.pace_seconds_per_meter(d) * meters_per_unit))
            .unzip();
        let smoothed = smoother.smooth_pace(&distances, &paces);

        Ok(distances
            .into_iter()
            .zip(paces)
            .zip(smoothed)
            .map(|((distance_meters, pace_seconds_per_unit), smoothed_pace_seconds_per_unit)| PacePoint {
                distance_meters,
                pace_seconds_per_unit,
                smoothed_pace_seconds_per_unit,
            })
            .collect())
    }

    /// Validate the plan and derive the base pace.
    fn resolve<'a>(
        &'a self,
        plan: &Plan,
        ordered: &[&Waypoint],
        profile: &'a [SmoothedPoint],
    ) -> Result<PaceCurve<'a>> {
        validate_plan(plan, ordered)?;
        if profile.len() < 2 {
            return Err(CoursePaceError::EmptyProfile {
                point_count: profile.len(),
            });
        }

        let (Some(first), Some(last)) = (ordered.first(), ordered.last()) else {
            return Err(CoursePaceError::invalid_plan("a plan needs at least 2 waypoints"));
        };

        let percent = match plan.pacing_strategy {
            PacingStrategy::Flat => 0.0,
            PacingStrategy::Linear => plan.pacing_linear_percent as f64,
        };
        let mut curve = PaceCurve {
            profile,
            model: plan.use_grade_adjustment.then_some(self.model.as_ref()),
            start: first.distance_meters,
            length: last.distance_meters - first.distance_meters,
            percent,
            base_seconds_per_meter: 0.0,
        };

        let total_stoppage: f64 = ordered[1..].iter().map(|w| plan.stoppage_for(&w.id)).sum();
        let meters_per_unit = plan.distance_unit.meters_per_unit();

        curve.base_seconds_per_meter = match plan.pace_mode {
            PaceMode::Pace => required_positive(plan.pace_seconds_per_unit, "pace_seconds_per_unit")? / meters_per_unit,
            PaceMode::Time => {
                let running = running_seconds(plan, total_stoppage)?;
                running / curve.length
            }
            PaceMode::Normalized => {
                let running = running_seconds(plan, total_stoppage)?;
                // Sum per segment so the finish reproduces the target exactly
                let weighted: f64 = ordered
                    .windows(2)
                    .map(|pair| curve.weighted_length(pair[0].distance_meters, pair[1].distance_meters))
                    .sum();
                if weighted.is_nan() || weighted <= 0.0 {
                    return Err(CoursePaceError::invalid_plan("course has no positive weighted length"));
                }
                running / weighted
            }
        };

        debug!(
            base_seconds_per_meter = curve.base_seconds_per_meter,
            span_meters = curve.length,
            grade_model = curve.model.map(|m| m.name()).unwrap_or("none"),
            "Resolved base pace"
        );

        Ok(curve)
    }
}

/// Pace as a function of distance for one resolved plan
struct PaceCurve<'a> {
    profile: &'a [SmoothedPoint],
    model: Option<&'a dyn GradeAdjustmentModel>,
    start: f64,
    length: f64,
    percent: f64,
    base_seconds_per_meter: f64,
}

impl PaceCurve<'_> {
    /// Linear split factor; its average over the span is exactly 1
    fn strategy_factor(&self, distance: f64) -> f64 {
        if self.percent == 0.0 || self.length <= 0.0 {
            return 1.0;
        }
        let fraction = ((distance - self.start) / self.length).clamp(0.0, 1.0);
        1.0 + self.percent / 200.0 - self.percent / 100.0 * fraction
    }

    fn grade_factor(&self, distance: f64) -> f64 {
        match self.model {
            Some(model) => model.factor(grade_at(self.profile, distance)),
            None => 1.0,
        }
    }

    fn pace_seconds_per_meter(&self, distance: f64) -> f64 {
        self.base_seconds_per_meter * self.strategy_factor(distance) * self.grade_factor(distance)
    }

    /// Integral of `strategy * grade_factor` over `[from, to]`.
    ///
    /// Sub-intervals run between profile points. The strategy factor is linear
    /// so its midpoint value integrates it exactly; the grade factor is the
    /// mean of the two endpoint factors.
    fn weighted_length(&self, from: f64, to: f64) -> f64 {
        let lo = self.profile.partition_point(|p| p.point.distance_meters <= from);
        let hi = self.profile.partition_point(|p| p.point.distance_meters < to);
        let inner = self.profile[lo..hi.max(lo)].iter().map(|p| p.point.distance_meters);

        let mut knots = Vec::with_capacity(hi.saturating_sub(lo) + 2);
        knots.push(from);
        knots.extend(inner);
        knots.push(to);

        knots
            .windows(2)
            .map(|pair| {
                let (x0, x1) = (pair[0], pair[1]);
                let length = x1 - x0;
                if length <= 0.0 {
                    return 0.0;
                }
                let grade = (self.grade_factor(x0) + self.grade_factor(x1)) / 2.0;
                self.strategy_factor((x0 + x1) / 2.0) * grade * length
            })
            .sum()
    }

    fn arrival(
        &self,
        plan: &Plan,
        waypoint: &Waypoint,
        arrival_seconds: f64,
        stoppage_seconds: f64,
    ) -> WaypointArrival {
        WaypointArrival {
            waypoint_id: waypoint.id.clone(),
            name: waypoint.name.clone(),
            distance_meters: waypoint.distance_meters,
            arrival_seconds,
            stoppage_seconds,
            cumulative_elapsed_seconds: arrival_seconds + stoppage_seconds,
            arrival_time: plan
                .start_time
                .map(|start| start + Duration::milliseconds((arrival_seconds * 1000.0).round() as i64)),
        }
    }
}

fn ordered_waypoints(waypoints: &[Waypoint]) -> Vec<&Waypoint> {
    let mut ordered: Vec<&Waypoint> = waypoints.iter().collect();
    ordered.sort_by_key(|w| w.order);
    ordered
}

/// Grade at `distance`, interpolated between profile points
fn grade_at(profile: &[SmoothedPoint], distance: f64) -> f64 {
    let upper = profile.partition_point(|p| p.point.distance_meters < distance);
    if upper == 0 {
        return profile.first().map(|p| p.grade).unwrap_or(0.0);
    }
    if upper >= profile.len() {
        return profile.last().map(|p| p.grade).unwrap_or(0.0);
    }
    let (lo, hi) = (&profile[upper - 1], &profile[upper]);
    let span = hi.point.distance_meters - lo.point.distance_meters;
    if span <= 0.0 {
        return hi.grade;
    }
    let ratio = (distance - lo.point.distance_meters) / span;
    lo.grade + ratio * (hi.grade - lo.grade)
}

fn required_positive(value: Option<f64>, field: &str) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        Some(v) => Err(CoursePaceError::invalid_plan(format!(
            "{} must be a positive number, got {}",
            field, v
        ))),
        None => Err(CoursePaceError::invalid_plan(format!("{} is required for this pace mode", field))),
    }
}

/// Target time minus stoppages
fn running_seconds(plan: &Plan, total_stoppage: f64) -> Result<f64> {
    let target = required_positive(plan.target_time_seconds, "target_time_seconds")?;
    if total_stoppage >= target {
        return Err(CoursePaceError::invalid_plan(format!(
            "total stoppage {:.0}s leaves no running time within target {:.0}s",
            total_stoppage, target
        )));
    }
    Ok(target - total_stoppage)
}

fn validate_plan(plan: &Plan, ordered: &[&Waypoint]) -> Result<()> {
    if ordered.len() < 2 {
        return Err(CoursePaceError::invalid_plan(format!(
            "a plan needs at least 2 waypoints, got {}",
            ordered.len()
        )));
    }

    if let Some(pair) = ordered
        .windows(2)
        .find(|pair| pair[1].distance_meters.partial_cmp(&pair[0].distance_meters) != Some(std::cmp::Ordering::Greater))
    {
        return Err(CoursePaceError::invalid_plan(format!(
            "waypoints '{}' and '{}' are not in strictly increasing distance order",
            pair[0].name, pair[1].name
        )));
    }

    if plan.pacing_linear_percent.abs() > MAX_LINEAR_PERCENT {
        return Err(CoursePaceError::invalid_plan(format!(
            "pacing_linear_percent must be within [-{0}, {0}], got {1}",
            MAX_LINEAR_PERCENT, plan.pacing_linear_percent
        )));
    }

    let stoppages = std::iter::once(plan.default_stoppage_seconds).chain(plan.stoppage_overrides.values().copied());
    for stoppage in stoppages {
        if !stoppage.is_finite() || stoppage < 0.0 {
            return Err(CoursePaceError::invalid_plan(format!(
                "stoppage must be a non-negative number of seconds, got {}",
                stoppage
            )));
        }
    }

    Ok(())
}
