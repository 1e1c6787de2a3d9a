//! Convergence and failure signals
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use std::fmt;

/// Why an optimizer (or one of its sub-problems) stopped.
///
/// The first group are convergence signals, the second budget signals, and
/// the last failures. None of them is a "keep going" value; sources with
/// nothing to report return `None` from [`Converger::status`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum Status {
    GradientAbsoluteTolerance,
    GradientRelativeTolerance,
    ObjectiveAbsoluteTolerance,
    ObjectiveRelativeTolerance,
    StepAbsoluteTolerance,
    WolfeConditionsMet,
    MaximumIterations,
    MaximumFunctionEvaluations,
    MaximumRuntime,
    UserFunctionError,
    LinesearchFailure,
    InvalidBounds,
    OptimizerError,
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::GradientAbsoluteTolerance => "gradient absolute tolerance",
            Status::GradientRelativeTolerance => "gradient relative tolerance",
            Status::ObjectiveAbsoluteTolerance => {
                "objective absolute tolerance"
            }
            Status::ObjectiveRelativeTolerance => {
                "objective relative tolerance"
            }
            Status::StepAbsoluteTolerance => "step absolute tolerance",
            Status::WolfeConditionsMet => "wolfe conditions met",
            Status::MaximumIterations => "maximum iterations",
            Status::MaximumFunctionEvaluations => {
                "maximum function evaluations"
            }
            Status::MaximumRuntime => "maximum runtime",
            Status::UserFunctionError => "user function error",
            Status::LinesearchFailure => "line search failure",
            Status::InvalidBounds => "invalid bounds",
            Status::OptimizerError => "optimizer error",
        }
    }

    /// A tolerance was reached
    pub fn is_convergence(&self) -> bool {
        matches!(
            self,
            Status::GradientAbsoluteTolerance
                | Status::GradientRelativeTolerance
                | Status::ObjectiveAbsoluteTolerance
                | Status::ObjectiveRelativeTolerance
                | Status::StepAbsoluteTolerance
                | Status::WolfeConditionsMet
        )
    }

    /// A budget ran out. This is an intentional stop, not an error.
    pub fn is_budget(&self) -> bool {
        matches!(
            self,
            Status::MaximumIterations
                | Status::MaximumFunctionEvaluations
                | Status::MaximumRuntime
        )
    }

    /// The run was aborted by an error
    pub fn is_failure(&self) -> bool {
        !(self.is_convergence() || self.is_budget())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Something that can tell an optimization loop to stop
pub trait Converger {
    /// `Some` once this source wants the loop to stop
    fn status(&self) -> Option<Status>;
}

/// Evaluate `sources` in order and return the first signal.
///
/// The order only decides which signal gets reported when several fire in
/// the same check; the loop stops either way.
///
/// # Example
///
/// ```
/// use funopt::status::{check_all, Converger, Status};
///
/// struct Never;
/// impl Converger for Never {
///     fn status(&self) -> Option<Status> {
///         None
///     }
/// }
///
/// struct Always(Status);
/// impl Converger for Always {
///     fn status(&self) -> Option<Status> {
///         Some(self.0)
///     }
/// }
///
/// let first = Always(Status::MaximumIterations);
/// let second = Always(Status::MaximumRuntime);
/// assert_eq!(
///     check_all(&[&Never, &first, &second]),
///     Some(Status::MaximumIterations)
/// );
/// assert_eq!(check_all(&[&Never]), None);
/// ```
pub fn check_all(sources: &[&dyn Converger]) -> Option<Status> {
    sources.iter().find_map(|source| source.status())
}
