//! Wolfe conditions for accepting a line search step
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::consts::{WOLFE_C1, WOLFE_C2};
use crate::result::{OptimizeError, Result};
use crate::status::{Converger, Status};

/// Which curvature condition to enforce
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum Curvature {
    /// `|φ'(α)| ≤ c2 |φ'(0)|`
    Strong,
    /// `φ'(α) ≥ c2 φ'(0)`
    Weak,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct WolfeParams {
    /// Sufficient decrease parameter
    pub c1: f64,
    /// Curvature parameter
    pub c2: f64,
    pub curvature: Curvature,
}

impl Default for WolfeParams {
    fn default() -> Self {
        Self {
            c1: WOLFE_C1,
            c2: WOLFE_C2,
            curvature: Curvature::Strong,
        }
    }
}

impl WolfeParams {
    pub fn with_c1(self, c1: f64) -> Self {
        Self { c1, ..self }
    }

    pub fn with_c2(self, c2: f64) -> Self {
        Self { c2, ..self }
    }

    pub fn with_curvature(self, curvature: Curvature) -> Self {
        Self { curvature, ..self }
    }

    /// Require `0 < c1 < c2 < 1`
    pub fn validate(&self) -> Result<()> {
        if !(self.c1 > 0.0 && self.c1 < 1.0) {
            Err(OptimizeError::InvalidParameter {
                name: "c1",
                value: self.c1,
            })
        } else if !(self.c2 > self.c1 && self.c2 < 1.0) {
            Err(OptimizeError::InvalidParameter {
                name: "c2",
                value: self.c2,
            })
        } else {
            Ok(())
        }
    }
}

/// Tracks the line function at the start of a search and at the latest
/// trial step, and signals [`Status::WolfeConditionsMet`] once both Wolfe
/// conditions hold.
///
/// # Example
///
/// ```
/// use funopt::status::{Converger, Status};
/// use funopt::wolfe::WolfeCondition;
///
/// // φ(α) = (α - 1)²
/// let mut wolfe = WolfeCondition::default();
/// wolfe.set_initial_state(1.0, -2.0).unwrap();
///
/// wolfe.set_current_state(2.0, 1.0, 2.0);
/// assert_eq!(wolfe.status(), None);
///
/// wolfe.set_current_state(0.9, 0.01, -0.2);
/// assert_eq!(wolfe.status(), Some(Status::WolfeConditionsMet));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct WolfeCondition {
    params: WolfeParams,
    initial_objective: f64,
    initial_derivative: f64,
    step: f64,
    objective: f64,
    derivative: f64,
}

impl Default for WolfeCondition {
    fn default() -> Self {
        Self::new(WolfeParams::default())
    }
}

impl WolfeCondition {
    pub fn new(params: WolfeParams) -> Self {
        WolfeCondition {
            params,
            initial_objective: f64::NAN,
            initial_derivative: f64::NAN,
            step: f64::NAN,
            objective: f64::NAN,
            derivative: f64::NAN,
        }
    }

    #[inline]
    pub fn params(&self) -> &WolfeParams {
        &self.params
    }

    /// Record `φ(0)` and `φ'(0)`. The derivative must be negative.
    pub fn set_initial_state(
        &mut self,
        objective: f64,
        derivative: f64,
    ) -> Result<()> {
        self.params.validate()?;
        if !(derivative < 0.0) {
            return Err(OptimizeError::NonDescentDirection {
                directional_derivative: derivative,
            });
        }
        self.initial_objective = objective;
        self.initial_derivative = derivative;
        self.step = f64::NAN;
        self.objective = f64::NAN;
        self.derivative = f64::NAN;
        Ok(())
    }

    /// Record `α`, `φ(α)`, and `φ'(α)` for the latest trial step
    pub fn set_current_state(
        &mut self,
        step: f64,
        objective: f64,
        derivative: f64,
    ) {
        self.step = step;
        self.objective = objective;
        self.derivative = derivative;
    }

    /// `φ(α) ≤ φ(0) + c1 α φ'(0)`
    pub fn sufficient_decrease(&self) -> bool {
        self.objective
            <= self.initial_objective
                + self.params.c1 * self.step * self.initial_derivative
    }

    pub fn curvature(&self) -> bool {
        let c2 = self.params.c2;
        match self.params.curvature {
            Curvature::Strong => {
                self.derivative.abs() <= c2 * self.initial_derivative.abs()
            }
            Curvature::Weak => self.derivative >= c2 * self.initial_derivative,
        }
    }

    /// Both conditions hold at the latest trial step. `false` before any
    /// trial has been recorded.
    pub fn is_satisfied(&self) -> bool {
        self.sufficient_decrease() && self.curvature()
    }
}

impl Converger for WolfeCondition {
    fn status(&self) -> Option<Status> {
        if self.is_satisfied() {
            Some(Status::WolfeConditionsMet)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rejects_ascent_direction() {
        let mut wolfe = WolfeCondition::default();
        assert_eq!(
            wolfe.set_initial_state(1.0, 0.5),
            Err(OptimizeError::NonDescentDirection {
                directional_derivative: 0.5
            })
        );
        assert!(wolfe.set_initial_state(1.0, 0.0).is_err());
        assert!(wolfe.set_initial_state(1.0, f64::NAN).is_err());
    }

    #[test]
    fn rejects_misordered_constants() {
        let params = WolfeParams::default().with_c1(0.5).with_c2(0.4);
        let mut wolfe = WolfeCondition::new(params);
        assert!(matches!(
            wolfe.set_initial_state(1.0, -1.0),
            Err(OptimizeError::InvalidParameter { name: "c2", .. })
        ));

        let params = WolfeParams::default().with_c1(0.0);
        assert!(params.validate().is_err());
    }

    #[test]
    fn unset_trial_is_not_satisfied() {
        let mut wolfe = WolfeCondition::default();
        wolfe.set_initial_state(1.0, -1.0).unwrap();
        assert!(!wolfe.is_satisfied());
        assert_eq!(wolfe.status(), None);
    }

    #[test]
    fn armijo_fails_on_insufficient_decrease() {
        let mut wolfe = WolfeCondition::default();
        wolfe.set_initial_state(1.0, -1.0).unwrap();
        // Flat enough, but the value went up
        wolfe.set_current_state(1.0, 1.1, 0.0);
        assert!(!wolfe.sufficient_decrease());
        assert!(wolfe.curvature());
        assert!(!wolfe.is_satisfied());
    }

    #[test]
    fn weak_curvature_allows_steep_positive_slope() {
        let strong = WolfeParams::default();
        let weak = strong.with_curvature(Curvature::Weak);

        let mut wolfe = WolfeCondition::new(strong);
        wolfe.set_initial_state(1.0, -1.0).unwrap();
        wolfe.set_current_state(0.5, 0.0, 5.0);
        assert!(!wolfe.is_satisfied());

        let mut wolfe = WolfeCondition::new(weak);
        wolfe.set_initial_state(1.0, -1.0).unwrap();
        wolfe.set_current_state(0.5, 0.0, 5.0);
        assert!(wolfe.is_satisfied());
    }

    proptest! {
        #[test]
        fn larger_c2_accepts_more(
            c2_lo in 0.01..0.98_f64,
            delta in 0.0..0.01_f64,
            d0 in -1E3..-1E-3_f64,
            d in -1E3..1E3_f64,
        ) {
            let lo = WolfeParams::default().with_c1(1E-3).with_c2(c2_lo);
            let hi = lo.with_c2((c2_lo + delta).min(0.99));

            let mut strict = WolfeCondition::new(lo);
            strict.set_initial_state(1.0, d0).unwrap();
            strict.set_current_state(1E-3, 0.0, d);

            let mut loose = WolfeCondition::new(hi);
            loose.set_initial_state(1.0, d0).unwrap();
            loose.set_current_state(1E-3, 0.0, d);

            if strict.is_satisfied() {
                prop_assert!(loose.is_satisfied());
            }
        }
    }
}
