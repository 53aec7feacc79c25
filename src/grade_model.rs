//! Grade adjustment curves for pace planning
//!
//! A grade model maps a signed grade (rise/run) to a multiplicative pace
//! factor relative to flat ground: 1.0 on the flat, above 1.0 where the
//! terrain costs more time per unit distance.
//!
//! The default curve is the polynomial fit of the metabolic cost of running
//! on slopes published by Minetti et al. (2002), "Energy cost of walking and
//! running at extreme uphill and downhill slopes", J Appl Physiol 93:1039-1046:
//!
//! ```text
//! C(i) = 155.4 i^5 - 30.4 i^4 - 43.3 i^3 + 46.3 i^2 + 19.5 i + 3.6   [J/(kg m)]
//! ```
//!
//! The factor is `C(i) / C(0)`. It rises steeply uphill, bottoms out around
//! -18% (about half the flat cost) and climbs again on steeper descents,
//! where braking dominates. The fit was measured between -45% and +45%, so
//! grades are clamped to that range by default.

use crate::error::{CoursePaceError, Result};

/// Minetti et al. (2002) coefficients, highest power first.
pub const MINETTI_COEFFICIENTS: [f64; 6] = [155.4, -30.4, -43.3, 46.3, 19.5, 3.6];

/// Pace multiplier as a function of grade
pub trait GradeAdjustmentModel: Send + Sync + std::fmt::Debug {
    /// Pace factor at `grade` (rise/run); 1.0 means flat-ground pace.
    fn factor(&self, grade: f64) -> f64;

    /// Short identifier for logs and exports
    fn name(&self) -> &'static str;
}

/// Identity model used when grade adjustment is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGradeAdjustment;

impl GradeAdjustmentModel for NoGradeAdjustment {
    fn factor(&self, _grade: f64) -> f64 {
        1.0
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Cost polynomial normalized by its value on flat ground
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialGradeModel {
    name: &'static str,
    /// Highest power first
    coefficients: Vec<f64>,
    min_grade: f64,
    max_grade: f64,
    flat_cost: f64,
}

impl PolynomialGradeModel {
    /// Build a model from cost coefficients (highest power first).
    ///
    /// The polynomial must be positive on flat ground and across the whole
    /// clamping range, otherwise pace factors would be meaningless.
    pub fn new(coefficients: Vec<f64>, min_grade: f64, max_grade: f64) -> Result<Self> {
        validate_range(min_grade, max_grade)?;
        if coefficients.is_empty() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(CoursePaceError::Configuration(
                "grade model needs at least one finite coefficient".to_string(),
            ));
        }

        let model = Self {
            name: "polynomial",
            flat_cost: horner(&coefficients, 0.0),
            coefficients,
            min_grade,
            max_grade,
        };

        if model.flat_cost <= 0.0 {
            return Err(CoursePaceError::Configuration(
                "grade model cost on flat ground must be positive".to_string(),
            ));
        }

        // Sample the range at 1% steps; a non-positive cost anywhere is a bad fit.
        let steps = ((max_grade - min_grade) / 0.01).ceil().max(1.0) as usize;
        for step in 0..=steps {
            let grade = (min_grade + step as f64 * 0.01).min(max_grade);
            if horner(&model.coefficients, grade) <= 0.0 {
                return Err(CoursePaceError::Configuration(format!(
                    "grade model cost is not positive at grade {:.2}",
                    grade
                )));
            }
        }

        Ok(model)
    }

    /// The published Minetti curve clamped to its measured range.
    pub fn minetti() -> Self {
        Self {
            name: "minetti",
            coefficients: MINETTI_COEFFICIENTS.to_vec(),
            min_grade: -0.45,
            max_grade: 0.45,
            flat_cost: MINETTI_COEFFICIENTS[5],
        }
    }

    /// Narrow or widen the clamping range.
    pub fn with_range(mut self, min_grade: f64, max_grade: f64) -> Result<Self> {
        validate_range(min_grade, max_grade)?;
        self.min_grade = min_grade;
        self.max_grade = max_grade;
        Ok(self)
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }
}

impl Default for PolynomialGradeModel {
    fn default() -> Self {
        Self::minetti()
    }
}

impl GradeAdjustmentModel for PolynomialGradeModel {
    fn factor(&self, grade: f64) -> f64 {
        if !grade.is_finite() {
            return 1.0;
        }
        let clamped = grade.clamp(self.min_grade, self.max_grade);
        horner(&self.coefficients, clamped) / self.flat_cost
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Clamping bounds must be finite with `min < max`
pub(crate) fn validate_range(min_grade: f64, max_grade: f64) -> Result<()> {
    if min_grade.is_finite() && max_grade.is_finite() && min_grade < max_grade {
        return Ok(());
    }
    Err(CoursePaceError::Configuration(format!(
        "grade model range [{}, {}] is empty",
        min_grade, max_grade
    )))
}

fn horner(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().fold(0.0, |acc, c| acc * x + c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_is_neutral() {
        let model = PolynomialGradeModel::minetti();
        assert!((model.factor(0.0) - 1.0).abs() < 1e-12);
        assert_eq!(NoGradeAdjustment.factor(0.3), 1.0);
    }

    #[test]
    fn test_uphill_monotonic() {
        let model = PolynomialGradeModel::minetti();
        let mut previous = model.factor(0.0);
        for step in 1..=45 {
            let factor = model.factor(step as f64 / 100.0);
            assert!(factor > previous, "factor should grow at {}%", step);
            previous = factor;
        }
    }

    #[test]
    fn test_downhill_reverses_past_steep_descent() {
        let model = PolynomialGradeModel::minetti();

        // Moderate descents are faster than flat
        assert!(model.factor(-0.05) < 1.0);
        assert!(model.factor(-0.10) < model.factor(-0.05));

        // Past the minimum the curve climbs back above flat cost
        assert!(model.factor(-0.30) > model.factor(-0.18));
        assert!(model.factor(-0.45) > 1.0);
    }

    #[test]
    fn test_grades_clamped_to_range() {
        let model = PolynomialGradeModel::minetti();
        assert_eq!(model.factor(0.9), model.factor(0.45));
        assert_eq!(model.factor(-0.9), model.factor(-0.45));
        assert_eq!(model.factor(f64::NAN), 1.0);
    }

    #[test]
    fn test_custom_coefficients() {
        // Linear cost: +10% per 1% grade
        let model = PolynomialGradeModel::new(vec![10.0, 1.0], -0.05, 0.05).unwrap();
        assert!((model.factor(0.02) - 1.2).abs() < 1e-9);
        assert!((model.factor(0.5) - 1.5).abs() < 1e-9);
        assert_eq!(model.name(), "polynomial");
        assert_eq!(PolynomialGradeModel::minetti().name(), "minetti");
    }

    #[test]
    fn test_range_must_be_ordered_and_finite() {
        assert!(PolynomialGradeModel::minetti().with_range(0.2, -0.2).is_err());
        assert!(PolynomialGradeModel::minetti().with_range(f64::NAN, 0.2).is_err());
        assert!(PolynomialGradeModel::new(vec![1.0], 0.1, 0.1).is_err());

        let narrow = PolynomialGradeModel::minetti().with_range(-0.1, 0.1).unwrap();
        assert_eq!(narrow.factor(0.3), narrow.factor(0.1));
        assert!((narrow.factor(0.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_non_positive_cost() {
        assert!(PolynomialGradeModel::new(vec![0.0], -0.1, 0.1).is_err());
        // Crosses zero at -10%
        assert!(PolynomialGradeModel::new(vec![10.0, 1.0], -0.2, 0.2).is_err());
        assert!(PolynomialGradeModel::new(vec![], -0.2, 0.2).is_err());
    }
}
