//! Errors raised while optimizing
use std::fmt;
use std::result;

use crate::status::Status;

pub type Result<T> = result::Result<T, OptimizeError>;

/// Everything that can stop an optimization run short of convergence.
///
/// Budget exhaustion (iterations, evaluations, runtime) is *not* an error;
/// it is reported through [`Status`].
#[derive(Clone, Debug, PartialEq)]
pub enum OptimizeError {
    /// The user supplied objective function returned an error
    UserFunction(String),
    /// The step search stopped without the Wolfe conditions being met
    LinesearchFailure {
        /// Why the inner step search stopped
        status: Status,
    },
    /// Step bounds or initial step are malformed
    InvalidBounds { lower: f64, upper: f64, step: f64 },
    /// A line search was asked to move along a direction that does not
    /// decrease the objective
    NonDescentDirection { directional_derivative: f64 },
    /// A location and gradient do not have the same length
    DimensionMismatch { expected: usize, found: usize },
    /// Only one of the initial objective and initial gradient was supplied
    InitialValueMismatch,
    /// A tuning parameter is out of its valid range
    InvalidParameter { name: &'static str, value: f64 },
}

impl OptimizeError {
    /// The terminal status a run reports when it ends with this error
    pub fn status(&self) -> Status {
        match self {
            Self::UserFunction(_) => Status::UserFunctionError,
            Self::LinesearchFailure { .. } => Status::LinesearchFailure,
            Self::InvalidBounds { .. } => Status::InvalidBounds,
            _ => Status::OptimizerError,
        }
    }
}

impl std::error::Error for OptimizeError {}

impl fmt::Display for OptimizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserFunction(msg) => {
                write!(f, "user defined function error: {msg}")
            }
            Self::LinesearchFailure { status } => write!(
                f,
                "line search stopped without meeting the Wolfe conditions \
                 ({status})"
            ),
            Self::InvalidBounds { lower, upper, step } => write!(
                f,
                "invalid step bounds: lower ({lower}) must be less than \
                 upper ({upper}) and step ({step}) must be positive"
            ),
            Self::NonDescentDirection {
                directional_derivative,
            } => write!(
                f,
                "search direction is not a descent direction (directional \
                 derivative = {directional_derivative})"
            ),
            Self::DimensionMismatch { expected, found } => write!(
                f,
                "dimension mismatch: expected length {expected}, found \
                 {found}"
            ),
            Self::InitialValueMismatch => write!(
                f,
                "initial objective and initial gradient must either both be \
                 set or neither set"
            ),
            Self::InvalidParameter { name, value } => {
                write!(f, "invalid value for {name}: {value}")
            }
        }
    }
}
