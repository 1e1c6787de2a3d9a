//! Traits shared by the optimizers
use nalgebra::DVector;
use std::fmt;

use crate::result::{OptimizeError, Result};

/// A location or gradient the optimizers can work with.
///
/// Scalars use their absolute value as magnitude, vectors their Euclidean
/// norm.
pub trait Point: Clone + fmt::Debug {
    /// Size of the value used by tolerance checks
    fn magnitude(&self) -> f64;

    /// Number of coordinates
    fn dimension(&self) -> usize;
}

impl Point for f64 {
    #[inline]
    fn magnitude(&self) -> f64 {
        self.abs()
    }

    #[inline]
    fn dimension(&self) -> usize {
        1
    }
}

impl Point for DVector<f64> {
    #[inline]
    fn magnitude(&self) -> f64 {
        self.norm()
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.len()
    }
}

type ObjGrad<'f, X> =
    dyn FnMut(&X) -> std::result::Result<(f64, X), String> + 'f;

/// The user supplied objective + gradient function, with an evaluation
/// count.
///
/// Every call goes through [`Evaluator::eval`], which counts it, checks the
/// gradient has the same dimension as the location, and turns user errors
/// into [`OptimizeError::UserFunction`].
///
/// # Example
///
/// ```
/// use funopt::traits::Evaluator;
///
/// let mut fun = Evaluator::infallible(|x: &f64| (x * x, 2.0 * x));
/// let (f, g) = fun.eval(&3.0).unwrap();
///
/// assert_eq!(f, 9.0);
/// assert_eq!(g, 6.0);
/// assert_eq!(fun.evaluations(), 1);
/// ```
pub struct Evaluator<'f, X> {
    fun: Box<ObjGrad<'f, X>>,
    evaluations: usize,
}

impl<'f, X: Point> Evaluator<'f, X> {
    /// Wrap a fallible objective function
    pub fn new<F, E>(mut fun: F) -> Self
    where
        F: FnMut(&X) -> std::result::Result<(f64, X), E> + 'f,
        E: fmt::Display,
    {
        Evaluator {
            fun: Box::new(move |x: &X| fun(x).map_err(|err| err.to_string())),
            evaluations: 0,
        }
    }

    /// Wrap an objective function that cannot fail
    pub fn infallible<F>(mut fun: F) -> Self
    where
        F: FnMut(&X) -> (f64, X) + 'f,
    {
        Evaluator {
            fun: Box::new(move |x: &X| Ok(fun(x))),
            evaluations: 0,
        }
    }

    /// Evaluate the objective and gradient at `x`
    pub fn eval(&mut self, x: &X) -> Result<(f64, X)> {
        self.evaluations += 1;
        let (obj, grad) = (self.fun)(x).map_err(OptimizeError::UserFunction)?;
        if grad.dimension() != x.dimension() {
            return Err(OptimizeError::DimensionMismatch {
                expected: x.dimension(),
                found: grad.dimension(),
            });
        }
        Ok((obj, grad))
    }

    /// Number of calls to [`Evaluator::eval`] so far
    #[inline]
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Set the evaluation count back to zero
    pub fn reset(&mut self) {
        self.evaluations = 0;
    }
}

impl<'f, X> fmt::Debug for Evaluator<'f, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("evaluations", &self.evaluations)
            .finish_non_exhaustive()
    }
}
