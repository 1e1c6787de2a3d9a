//! Default tolerances and tuning constants

/// Default absolute tolerance on the gradient norm
pub const DEFAULT_GRADIENT_ABS_TOL: f64 = 1E-6;
/// Default absolute tolerance on the width of a step bracket. Any smaller
/// and the bracket ends are separated by only a handful of ulps.
pub const DEFAULT_STEP_ABS_TOL: f64 = 1E-15;
/// Relative size below which a change in objective value is treated as
/// floating point noise
pub const DEFAULT_FLOAT_REL_TOL: f64 = 1E-15;

/// Smallest multiplier used when the cubic says to shrink the step
pub const STEP_DECREASE_MIN: f64 = 1E-4;
/// Largest multiplier used when the cubic says to shrink the step
pub const STEP_DECREASE_MAX: f64 = 0.9;
/// Smallest multiplier used when the cubic says to grow the step
pub const STEP_INCREASE_MIN: f64 = 1.25;
/// Largest multiplier used when the cubic says to grow the step
pub const STEP_INCREASE_MAX: f64 = 1E3;
/// Multiplier bounds used when the trial point neither decreased the value
/// nor crossed the minimum
pub const STEP_INTERIOR_MIN: f64 = 0.25;
/// See [`STEP_INTERIOR_MIN`]
pub const STEP_INTERIOR_MAX: f64 = 0.75;

/// Armijo (sufficient decrease) constant
pub const WOLFE_C1: f64 = 1E-4;
/// Curvature constant
pub const WOLFE_C2: f64 = 0.9;

/// Function evaluations allowed inside a single line search
pub const LINE_SEARCH_MAX_EVALUATIONS: usize = 100;
/// Number of (s, y) pairs kept by L-BFGS
pub const LBFGS_STORE: usize = 30;
