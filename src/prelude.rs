//! Re-imports for convenience
#[doc(no_inline)]
pub use crate::cubic::{Cubic, CubicParams};
#[doc(no_inline)]
pub use crate::lbfgs::{Lbfgs, LbfgsParams};
#[doc(no_inline)]
pub use crate::line_search::LineSearchParams;
#[doc(no_inline)]
pub use crate::optimize::{
    optimize, Driver, Failure, OptimizeResult, Optimizer, Phase, Settings,
};
#[doc(no_inline)]
pub use crate::result::OptimizeError;
#[doc(no_inline)]
pub use crate::status::{Converger, Status};
#[doc(no_inline)]
pub use crate::traits::{Evaluator, Point};
#[doc(no_inline)]
pub use crate::wolfe::{Curvature, WolfeParams};
