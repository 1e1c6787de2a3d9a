//! Gradient based unconstrained minimization.
//!
//! [`Lbfgs`](lbfgs::Lbfgs) minimizes functions of a vector with limited
//! memory BFGS, taking steps found by an inexact line search that enforces
//! the Wolfe conditions. The line search is itself solved by a bracketing
//! step search built on successive cubic interpolation, which is also
//! available as the one dimensional optimizer [`Cubic`](cubic::Cubic).
//!
//! # Example
//!
//! ```
//! use funopt::prelude::*;
//! use nalgebra::DVector;
//!
//! // Rosenbrock in two dimensions
//! let fun = Evaluator::infallible(|x: &DVector<f64>| {
//!     let (a, b) = (x[0], x[1]);
//!     let f = (1.0 - a).powi(2) + 100.0 * (b - a * a).powi(2);
//!     let g = DVector::from_column_slice(&[
//!         -2.0 * (1.0 - a) - 400.0 * a * (b - a * a),
//!         200.0 * (b - a * a),
//!     ]);
//!     (f, g)
//! });
//!
//! let x0 = DVector::from_column_slice(&[-1.2, 1.0]);
//! let settings = Settings::default().with_max_function_evaluations(1000);
//! let res = optimize(fun, x0, &settings, Lbfgs::default()).unwrap();
//!
//! assert_eq!(res.status, Status::GradientAbsoluteTolerance);
//! assert!((res.location[0] - 1.0).abs() < 1E-4);
//! assert!((res.location[1] - 1.0).abs() < 1E-4);
//! ```
pub mod consts;
pub mod counter;
pub mod cubic;
pub mod lbfgs;
pub mod line_search;
pub mod optimize;
pub mod prelude;
pub mod result;
pub mod status;
pub mod step;
pub mod tracked;
pub mod traits;
pub mod wolfe;
