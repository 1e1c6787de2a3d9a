//! Values tracked over the course of an optimization run
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_GRADIENT_ABS_TOL;
use crate::status::{Converger, Status};
use crate::traits::Point;

/// Absolute and relative tolerance on the magnitude of a tracked value,
/// together with the signals they raise.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct Tolerance {
    /// Stop once `|current| < absolute`
    pub absolute: f64,
    /// Stop once `|current| / |initial| < relative`
    pub relative: f64,
    pub absolute_status: Status,
    pub relative_status: Status,
}

impl Tolerance {
    fn check(&self, current: f64, initial: f64) -> Option<Status> {
        if current < self.absolute {
            Some(self.absolute_status)
        } else if self.relative > 0.0
            && initial > 0.0
            && current / initial < self.relative
        {
            Some(self.relative_status)
        } else {
            None
        }
    }
}

/// A scalar or vector quantity with an initial, current, and optimal value.
///
/// The optimal value is only available after [`TrackedValue::finalize`].
///
/// # Example
///
/// ```
/// use funopt::status::{Converger, Status};
/// use funopt::tracked::TrackedValue;
///
/// let mut grad = TrackedValue::gradient(4.0_f64).with_tolerances(1E-3, 0.5);
/// grad.initialize();
/// assert_eq!(grad.status(), None);
///
/// grad.set_current(1.0);
/// assert_eq!(grad.status(), Some(Status::GradientRelativeTolerance));
///
/// grad.set_current(1E-4);
/// assert_eq!(grad.status(), Some(Status::GradientAbsoluteTolerance));
///
/// assert!(grad.optimal().is_none());
/// grad.finalize();
/// assert_eq!(grad.optimal(), Some(&1E-4));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedValue<X> {
    initial: X,
    current: X,
    optimal: Option<X>,
    initial_magnitude: f64,
    current_magnitude: f64,
    tolerance: Option<Tolerance>,
    record_history: bool,
    history: Vec<X>,
}

impl<X: Point> TrackedValue<X> {
    /// A value with no tolerance checks
    pub fn new(initial: X) -> Self {
        let magnitude = initial.magnitude();
        TrackedValue {
            current: initial.clone(),
            initial,
            optimal: None,
            initial_magnitude: magnitude,
            current_magnitude: magnitude,
            tolerance: None,
            record_history: false,
            history: Vec::new(),
        }
    }

    /// A location. Locations never signal convergence.
    pub fn location(initial: X) -> Self {
        Self::new(initial)
    }

    /// A gradient. Defaults to an absolute tolerance of 1e-6 on the norm
    /// and no relative tolerance.
    pub fn gradient(initial: X) -> Self {
        Self::new(initial).with_tolerance(Tolerance {
            absolute: DEFAULT_GRADIENT_ABS_TOL,
            relative: 0.0,
            absolute_status: Status::GradientAbsoluteTolerance,
            relative_status: Status::GradientRelativeTolerance,
        })
    }

    /// Set a tolerance, replacing any existing one
    #[must_use]
    pub fn with_tolerance(self, tolerance: Tolerance) -> Self {
        Self {
            tolerance: Some(tolerance),
            ..self
        }
    }

    /// Change the tolerance values while keeping the signals. Has no effect
    /// on a value created without a tolerance.
    #[must_use]
    pub fn with_tolerances(mut self, absolute: f64, relative: f64) -> Self {
        if let Some(tol) = self.tolerance.as_mut() {
            tol.absolute = absolute;
            tol.relative = relative;
        }
        self
    }

    /// Record every value passed to [`TrackedValue::set_current`]
    #[must_use]
    pub fn with_history(self, record_history: bool) -> Self {
        Self {
            record_history,
            ..self
        }
    }

    #[inline]
    pub fn initial(&self) -> &X {
        &self.initial
    }

    #[inline]
    pub fn current(&self) -> &X {
        &self.current
    }

    /// Value at the end of the run, `None` until finalized
    #[inline]
    pub fn optimal(&self) -> Option<&X> {
        self.optimal.as_ref()
    }

    #[inline]
    pub fn magnitude(&self) -> f64 {
        self.current_magnitude
    }

    #[inline]
    pub fn tolerance(&self) -> Option<&Tolerance> {
        self.tolerance.as_ref()
    }

    #[inline]
    pub fn history(&self) -> &[X] {
        &self.history
    }

    pub fn set_initial(&mut self, value: X) {
        self.initial_magnitude = value.magnitude();
        self.initial = value;
    }

    pub fn set_current(&mut self, value: X) {
        self.current_magnitude = value.magnitude();
        if self.record_history {
            self.history.push(value.clone());
        }
        self.current = value;
    }

    /// Start a run: current takes the initial value, history is cleared,
    /// and the optimal value is forgotten.
    pub fn initialize(&mut self) {
        self.current = self.initial.clone();
        self.current_magnitude = self.initial_magnitude;
        self.optimal = None;
        self.history.clear();
    }

    /// End a run: the current value becomes the optimal value
    pub fn finalize(&mut self) {
        self.optimal = Some(self.current.clone());
    }
}

impl TrackedValue<f64> {
    /// An objective value. Both tolerances default to off.
    pub fn objective(initial: f64) -> Self {
        Self::new(initial).with_tolerance(Tolerance {
            absolute: 0.0,
            relative: 0.0,
            absolute_status: Status::ObjectiveAbsoluteTolerance,
            relative_status: Status::ObjectiveRelativeTolerance,
        })
    }
}

impl<X: Point> Converger for TrackedValue<X> {
    fn status(&self) -> Option<Status> {
        self.tolerance.as_ref().and_then(|tol| {
            tol.check(self.current_magnitude, self.initial_magnitude)
        })
    }
}
