//! A step length held inside a bracket
use crate::consts::DEFAULT_STEP_ABS_TOL;
use crate::result::{OptimizeError, Result};
use crate::status::{Converger, Status};

/// Step length from a base point together with the bracket `[lower, upper]`
/// known to contain an acceptable step.
///
/// Converges with [`Status::StepAbsoluteTolerance`] once the bracket is
/// narrower than the absolute tolerance.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundedStep {
    initial: f64,
    current: f64,
    lower: f64,
    upper: f64,
    abs_tol: f64,
}

impl Default for BoundedStep {
    fn default() -> Self {
        BoundedStep::new(1.0, DEFAULT_STEP_ABS_TOL)
    }
}

impl BoundedStep {
    pub fn new(initial: f64, abs_tol: f64) -> Self {
        BoundedStep {
            initial,
            current: initial,
            lower: 0.0,
            upper: f64::INFINITY,
            abs_tol,
        }
    }

    #[inline]
    pub fn current(&self) -> f64 {
        self.current
    }

    #[inline]
    pub fn initial(&self) -> f64 {
        self.initial
    }

    #[inline]
    pub fn lower(&self) -> f64 {
        self.lower
    }

    #[inline]
    pub fn upper(&self) -> f64 {
        self.upper
    }

    #[inline]
    pub fn gap(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn set_initial(&mut self, step: f64) {
        self.initial = step;
    }

    pub fn set_current(&mut self, step: f64) {
        self.current = step;
    }

    pub fn set_lower(&mut self, lower: f64) {
        self.lower = lower;
    }

    pub fn set_upper(&mut self, upper: f64) {
        self.upper = upper;
    }

    pub fn set_abs_tol(&mut self, abs_tol: f64) {
        self.abs_tol = abs_tol;
    }

    /// Reset the bracket to `[0, ∞)` and the step to its initial value
    pub fn initialize(&mut self) -> Result<()> {
        self.lower = 0.0;
        self.upper = f64::INFINITY;
        self.current = self.initial;
        self.validate()
    }

    /// Check the bracket is ordered and the step is positive and inside it
    pub fn validate(&self) -> Result<()> {
        let ok = self.lower < self.upper
            && self.current > 0.0
            && self.current.is_finite()
            && self.contains(self.current);
        if ok {
            Ok(())
        } else {
            Err(OptimizeError::InvalidBounds {
                lower: self.lower,
                upper: self.upper,
                step: self.current,
            })
        }
    }

    #[inline]
    pub fn midpoint(&self) -> f64 {
        0.5 * (self.lower + self.upper)
    }

    #[inline]
    pub fn contains(&self, step: f64) -> bool {
        self.lower <= step && step <= self.upper
    }

    /// Return `candidate` if it lies in the bracket. Otherwise bisect the
    /// bracket, or double the largest known step if it has no upper end.
    pub fn safeguard(&self, candidate: f64) -> f64 {
        if candidate.is_finite() && self.contains(candidate) {
            candidate
        } else if self.upper.is_finite() {
            self.midpoint()
        } else {
            2.0 * self.lower.max(self.current)
        }
    }
}

impl Converger for BoundedStep {
    fn status(&self) -> Option<Status> {
        if self.gap() < self.abs_tol {
            Some(Status::StepAbsoluteTolerance)
        } else {
            None
        }
    }
}
