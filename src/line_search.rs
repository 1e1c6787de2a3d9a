//! Inexact line search along a descent direction
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use log::debug;
use nalgebra::DVector;

use crate::consts::LINE_SEARCH_MAX_EVALUATIONS;
use crate::counter::Counter;
use crate::cubic::{CubicParams, CubicStepSearch};
use crate::result::{OptimizeError, Result};
use crate::status::{check_all, Status};
use crate::traits::Evaluator;
use crate::wolfe::{WolfeCondition, WolfeParams};

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct LineSearchParams {
    /// Evaluation budget of a single search
    pub max_function_evaluations: usize,
    pub cubic: CubicParams,
    pub wolfe: WolfeParams,
}

impl Default for LineSearchParams {
    fn default() -> Self {
        Self {
            max_function_evaluations: LINE_SEARCH_MAX_EVALUATIONS,
            cubic: CubicParams::default(),
            wolfe: WolfeParams::default(),
        }
    }
}

impl LineSearchParams {
    pub fn with_max_function_evaluations(self, max: usize) -> Self {
        Self {
            max_function_evaluations: max,
            ..self
        }
    }

    pub fn with_cubic(self, cubic: CubicParams) -> Self {
        Self { cubic, ..self }
    }

    pub fn with_wolfe(self, wolfe: WolfeParams) -> Self {
        Self { wolfe, ..self }
    }
}

/// The point a line search settled on
#[derive(Clone, Debug, PartialEq)]
pub struct LineSearchResult {
    pub location: DVector<f64>,
    pub objective: f64,
    pub gradient: DVector<f64>,
    /// Accepted step in units of the (un-normalized) search direction, so
    /// that `location = origin + step * direction`
    pub step: f64,
    /// Function evaluations used by the search
    pub evaluations: usize,
}

/// Finds a step along a direction that satisfies the Wolfe conditions.
///
/// The search runs on the unit direction; the step reported back is scaled
/// into the units of the direction passed in.
///
/// # Example
///
/// ```
/// use funopt::line_search::LineSearch;
/// use funopt::traits::Evaluator;
/// use nalgebra::DVector;
///
/// let mut fun = Evaluator::infallible(|x: &DVector<f64>| {
///     (x.norm_squared(), x * 2.0)
/// });
///
/// let x0 = DVector::from_column_slice(&[1.0, 1.0]);
/// let (f0, g0) = fun.eval(&x0).unwrap();
/// let direction = -&g0;
///
/// let mut search = LineSearch::default();
/// let res = search.search(&mut fun, &x0, f0, &g0, &direction, None).unwrap();
///
/// assert!(res.objective < f0);
/// assert!(res.step > 0.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct LineSearch {
    params: LineSearchParams,
    cubic: CubicStepSearch,
    wolfe: WolfeCondition,
    evaluations: Counter,
}

impl Default for LineSearch {
    fn default() -> Self {
        Self::new(LineSearchParams::default())
    }
}

impl LineSearch {
    pub fn new(params: LineSearchParams) -> Self {
        LineSearch {
            cubic: CubicStepSearch::new(params.cubic),
            wolfe: WolfeCondition::new(params.wolfe),
            evaluations: Counter::function_evaluations(
                params.max_function_evaluations,
            ),
            params,
        }
    }

    #[inline]
    pub fn params(&self) -> &LineSearchParams {
        &self.params
    }

    /// Search from `origin` along `direction`.
    ///
    /// `objective` and `gradient` are the values at `origin`. The first trial
    /// step is `initial_step` (measured along the unit direction) if given,
    /// otherwise the length of `direction`, i.e. a full step.
    ///
    /// # Errors
    ///
    /// - [`OptimizeError::NonDescentDirection`] if the gradient does not
    ///   point against `direction`
    /// - [`OptimizeError::LinesearchFailure`] if the step search stops
    ///   before the Wolfe conditions are met
    /// - any error raised by the objective function
    pub fn search(
        &mut self,
        fun: &mut Evaluator<'_, DVector<f64>>,
        origin: &DVector<f64>,
        objective: f64,
        gradient: &DVector<f64>,
        direction: &DVector<f64>,
        initial_step: Option<f64>,
    ) -> Result<LineSearchResult> {
        if direction.len() != origin.len() {
            return Err(OptimizeError::DimensionMismatch {
                expected: origin.len(),
                found: direction.len(),
            });
        }

        let norm = direction.norm();
        let derivative = gradient.dot(direction) / norm;
        if !(norm > 0.0 && norm.is_finite()) {
            return Err(OptimizeError::NonDescentDirection {
                directional_derivative: derivative,
            });
        }
        let unit = direction / norm;

        self.wolfe.set_initial_state(objective, derivative)?;
        self.cubic.initialize(
            initial_step.unwrap_or(norm),
            objective,
            derivative,
        )?;
        self.evaluations.initialize();

        loop {
            let step = self.cubic.step().current();
            let location = origin + &unit * step;
            let (trial_obj, trial_grad) = fun.eval(&location)?;
            self.evaluations.add(1);

            let trial_derivative = trial_grad.dot(&unit);
            self.wolfe.set_current_state(step, trial_obj, trial_derivative);
            self.cubic.iterate(trial_obj, trial_derivative);

            debug!(
                "line search: step = {}, f = {}, df = {}, f0 = {}, df0 = {}",
                step, trial_obj, trial_derivative, objective, derivative
            );

            let signal =
                check_all(&[&self.wolfe, &self.cubic, &self.evaluations]);
            match signal {
                None => continue,
                Some(Status::WolfeConditionsMet) => (),
                Some(status) => {
                    // The trial that used up the budget may still be
                    // acceptable
                    if !self.wolfe.is_satisfied() {
                        debug!("line search failed: {}", status);
                        return Err(OptimizeError::LinesearchFailure {
                            status,
                        });
                    }
                }
            }

            return Ok(LineSearchResult {
                location,
                objective: trial_obj,
                gradient: trial_grad,
                step: step / norm,
                evaluations: self.evaluations.current(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1E-10;

    fn quadratic(x: &DVector<f64>) -> (f64, DVector<f64>) {
        // f(x) = x₀² + 10 x₁²
        let f = x[0] * x[0] + 10.0 * x[1] * x[1];
        let g = DVector::from_column_slice(&[2.0 * x[0], 20.0 * x[1]]);
        (f, g)
    }

    #[test]
    fn steepest_descent_step_satisfies_wolfe() {
        let mut fun = Evaluator::infallible(quadratic);
        let x0 = DVector::from_column_slice(&[1.0, 1.0]);
        let (f0, g0) = fun.eval(&x0).unwrap();
        let direction = -&g0;

        let mut search = LineSearch::default();
        let res = search
            .search(&mut fun, &x0, f0, &g0, &direction, None)
            .unwrap();

        let d0 = g0.dot(&direction);
        let d = res.gradient.dot(&direction);
        assert!(res.objective <= f0 + 1E-4 * res.step * d0);
        assert!(d.abs() <= 0.9 * d0.abs());

        let expected = &x0 + &direction * res.step;
        assert::close(res.location[0], expected[0], TOL);
        assert::close(res.location[1], expected[1], TOL);
        assert_eq!(res.evaluations + 1, fun.evaluations());
    }

    #[test]
    fn exact_minimum_along_line_accepted_first() {
        // Along the x₀ axis the full Newton step is exact
        let mut fun = Evaluator::infallible(quadratic);
        let x0 = DVector::from_column_slice(&[3.0, 0.0]);
        let (f0, g0) = fun.eval(&x0).unwrap();
        let direction = DVector::from_column_slice(&[-3.0, 0.0]);

        let mut search = LineSearch::default();
        let res = search
            .search(&mut fun, &x0, f0, &g0, &direction, None)
            .unwrap();
        assert_eq!(res.evaluations, 1);
        assert::close(res.step, 1.0, TOL);
        assert::close(res.objective, 0.0, TOL);
    }

    #[test]
    fn initial_step_overrides_direction_length() {
        let mut fun = Evaluator::infallible(quadratic);
        let x0 = DVector::from_column_slice(&[3.0, 0.0]);
        let (f0, g0) = fun.eval(&x0).unwrap();
        let direction = DVector::from_column_slice(&[-1.0, 0.0]);

        let mut search = LineSearch::default();
        let res = search
            .search(&mut fun, &x0, f0, &g0, &direction, Some(3.0))
            .unwrap();
        assert_eq!(res.evaluations, 1);
        assert::close(res.step, 3.0, TOL);
    }

    #[test]
    fn ascent_direction_is_rejected() {
        let mut fun = Evaluator::infallible(quadratic);
        let x0 = DVector::from_column_slice(&[1.0, 1.0]);
        let (f0, g0) = fun.eval(&x0).unwrap();

        let mut search = LineSearch::default();
        let res = search.search(&mut fun, &x0, f0, &g0, &g0, None);
        assert!(matches!(
            res,
            Err(OptimizeError::NonDescentDirection { .. })
        ));

        let zero = DVector::zeros(2);
        let res = search.search(&mut fun, &x0, f0, &g0, &zero, None);
        assert!(matches!(
            res,
            Err(OptimizeError::NonDescentDirection { .. })
        ));
        assert_eq!(fun.evaluations(), 1);
    }

    #[test]
    fn budget_exhaustion_is_a_failure() {
        // The gradient claims descent but the value only ever goes up
        let mut fun = Evaluator::infallible(|x: &DVector<f64>| {
            (1.0 + x[0].abs(), DVector::from_column_slice(&[-1.0]))
        });
        let x0 = DVector::from_column_slice(&[0.0]);
        let g0 = DVector::from_column_slice(&[-1.0]);
        let direction = DVector::from_column_slice(&[1.0]);

        let params =
            LineSearchParams::default().with_max_function_evaluations(5);
        let mut search = LineSearch::new(params);
        let res = search.search(&mut fun, &x0, 1.0, &g0, &direction, None);
        match res {
            Err(OptimizeError::LinesearchFailure { status }) => {
                assert!(
                    status == Status::MaximumFunctionEvaluations
                        || status == Status::StepAbsoluteTolerance
                );
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(fun.evaluations() <= 6);
    }

    #[test]
    fn user_error_propagates() {
        let mut fun = Evaluator::new(|x: &DVector<f64>| {
            if x[0] > 0.5 {
                Err("out of domain")
            } else {
                Ok((x[0] * x[0], x * 2.0))
            }
        });
        let x0 = DVector::from_column_slice(&[-1.0]);
        let g0 = DVector::from_column_slice(&[-2.0]);
        let direction = DVector::from_column_slice(&[2.0]);

        let mut search = LineSearch::default();
        let res = search.search(&mut fun, &x0, 1.0, &g0, &direction, None);
        assert_eq!(
            res.unwrap_err(),
            OptimizeError::UserFunction(String::from("out of domain"))
        );
    }
}
