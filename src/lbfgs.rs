//! Limited memory BFGS
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use log::debug;
use nalgebra::DVector;

use crate::consts::LBFGS_STORE;
use crate::line_search::{LineSearch, LineSearchParams};
use crate::optimize::{Optimizer, State};
use crate::result::{OptimizeError, Result};
use crate::status::{Converger, Status};
use crate::tracked::TrackedValue;
use crate::traits::Evaluator;

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct LbfgsParams {
    /// Number of (s, y) pairs kept to approximate the inverse Hessian
    pub store: usize,
    pub line_search: LineSearchParams,
    /// Keep every accepted step length in [`Lbfgs::step`]'s history
    #[cfg_attr(feature = "serde1", serde(default))]
    pub record_step_history: bool,
}

impl Default for LbfgsParams {
    fn default() -> Self {
        Self {
            store: LBFGS_STORE,
            line_search: LineSearchParams::default(),
            record_step_history: false,
        }
    }
}

impl LbfgsParams {
    pub fn with_store(self, store: usize) -> Self {
        Self { store, ..self }
    }

    pub fn with_line_search(self, line_search: LineSearchParams) -> Self {
        Self {
            line_search,
            ..self
        }
    }

    pub fn with_step_history(self, record_step_history: bool) -> Self {
        Self {
            record_step_history,
            ..self
        }
    }
}

/// Fixed capacity ring of displacement / gradient change pairs
#[derive(Clone, Debug, PartialEq)]
pub struct History {
    capacity: usize,
    s: Vec<DVector<f64>>,
    y: Vec<DVector<f64>>,
    rho: Vec<f64>,
    /// Slot the next pair is written to
    cursor: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        History {
            capacity,
            s: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            rho: Vec::with_capacity(capacity),
            cursor: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored pairs, `min(pushed, capacity)`
    #[inline]
    pub fn len(&self) -> usize {
        self.s.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.s.is_empty()
    }

    pub fn clear(&mut self) {
        self.s.clear();
        self.y.clear();
        self.rho.clear();
        self.cursor = 0;
    }

    /// Store a pair, overwriting the oldest once full. The caller guarantees
    /// `s·y > 0`.
    pub fn push(&mut self, s: DVector<f64>, y: DVector<f64>) {
        if self.capacity == 0 {
            return;
        }
        let rho = 1.0 / s.dot(&y);
        if self.s.len() < self.capacity {
            self.s.push(s);
            self.y.push(y);
            self.rho.push(rho);
        } else {
            self.s[self.cursor] = s;
            self.y[self.cursor] = y;
            self.rho[self.cursor] = rho;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
    }

    /// Slot indices from the most recently written to the oldest
    fn newest_first(
        &self,
    ) -> impl DoubleEndedIterator<Item = usize> + ExactSizeIterator + '_ {
        let n = self.capacity;
        (0..self.len()).map(move |k| (self.cursor + n - 1 - k) % n)
    }

    /// Two-loop recursion: the product of the inverse Hessian estimate
    /// (seeded with `gamma * I`) and `grad`.
    pub fn apply(&self, grad: &DVector<f64>, gamma: f64) -> DVector<f64> {
        let mut q = grad.clone();
        let mut alpha = vec![0.0; self.len()];

        for (k, i) in self.newest_first().enumerate() {
            let a = self.rho[i] * self.s[i].dot(&q);
            q.axpy(-a, &self.y[i], 1.0);
            alpha[k] = a;
        }

        let mut z = q * gamma;

        for (k, i) in self.newest_first().enumerate().rev() {
            let b = self.rho[i] * self.y[i].dot(&z);
            z.axpy(alpha[k] - b, &self.s[i], 1.0);
        }

        z
    }
}

/// Limited memory BFGS with a cubic Wolfe line search.
///
/// # Example
///
/// ```
/// use funopt::prelude::*;
/// use nalgebra::DVector;
///
/// // f(x) = Σ (xᵢ - i)²
/// let fun = Evaluator::infallible(|x: &DVector<f64>| {
///     let shift = DVector::from_fn(x.len(), |i, _| i as f64);
///     let r = x - shift;
///     (r.norm_squared(), r * 2.0)
/// });
///
/// let x0 = DVector::zeros(4);
/// let res =
///     optimize(fun, x0, &Settings::default(), Lbfgs::default()).unwrap();
///
/// assert_eq!(res.status, Status::GradientAbsoluteTolerance);
/// assert!((res.location[3] - 3.0).abs() < 1E-6);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Lbfgs {
    params: LbfgsParams,
    history: History,
    gamma: f64,
    line_search: LineSearch,
    step: TrackedValue<f64>,
}

impl Default for Lbfgs {
    fn default() -> Self {
        Self::new(LbfgsParams::default())
    }
}

impl Lbfgs {
    pub fn new(params: LbfgsParams) -> Self {
        Lbfgs {
            history: History::new(params.store),
            gamma: 1.0,
            line_search: LineSearch::new(params.line_search),
            step: TrackedValue::new(0.0)
                .with_history(params.record_step_history),
            params,
        }
    }

    #[inline]
    pub fn params(&self) -> &LbfgsParams {
        &self.params
    }

    #[inline]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Current scale of the initial inverse Hessian estimate
    #[inline]
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Length of the last accepted step, `α‖p‖`. Earlier lengths are kept
    /// only with [`LbfgsParams::with_step_history`].
    #[inline]
    pub fn step(&self) -> &TrackedValue<f64> {
        &self.step
    }

    /// Search direction from the current gradient
    pub fn direction(&self, grad: &DVector<f64>) -> DVector<f64> {
        -self.history.apply(grad, self.gamma)
    }
}

impl Converger for Lbfgs {
    fn status(&self) -> Option<Status> {
        None
    }
}

impl Optimizer<DVector<f64>> for Lbfgs {
    fn initialize(&mut self, _state: &State<DVector<f64>>) -> Result<()> {
        if self.params.store == 0 {
            return Err(OptimizeError::InvalidParameter {
                name: "store",
                value: 0.0,
            });
        }
        self.history = History::new(self.params.store);
        self.gamma = 1.0;
        self.step.initialize();
        Ok(())
    }

    fn iterate(
        &mut self,
        state: &mut State<DVector<f64>>,
        fun: &mut Evaluator<'_, DVector<f64>>,
    ) -> Result<()> {
        let location = state.location.current();
        let objective = *state.objective.current();
        let gradient = state.gradient.current();

        let direction = self.direction(gradient);
        let res = self.line_search.search(
            fun, location, objective, gradient, &direction, None,
        )?;

        let s = &direction * res.step;
        let y = &res.gradient - gradient;
        let sy = s.dot(&y);
        let yy = y.dot(&y);
        let step_length = res.step * direction.norm();

        debug!(
            "lbfgs: f = {}, step = {}, |g| = {}, evaluations = {}",
            res.objective,
            step_length,
            res.gradient.norm(),
            res.evaluations
        );

        if sy > 0.0 && yy > 0.0 {
            self.history.push(s, y);
            self.gamma = sy / yy;
        } else {
            debug!(
                "lbfgs: skipping curvature pair with s·y = {}, y·y = {}",
                sy, yy
            );
        }

        self.step.set_current(step_length);
        state.location.set_current(res.location);
        state.objective.set_current(res.objective);
        state.gradient.set_current(res.gradient);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1E-10;

    fn vec(xs: &[f64]) -> DVector<f64> {
        DVector::from_column_slice(xs)
    }

    #[test]
    fn empty_history_scales_gradient() {
        let history = History::new(5);
        let g = vec(&[1.0, -2.0]);
        let z = history.apply(&g, 0.5);
        assert::close(z[0], 0.5, TOL);
        assert::close(z[1], -1.0, TOL);
    }

    #[test]
    fn single_pair_satisfies_secant_equation() {
        // H y = s for the BFGS update built from one pair
        let mut history = History::new(5);
        let s = vec(&[1.0, 0.5]);
        let y = vec(&[2.0, 3.0]);
        history.push(s.clone(), y.clone());
        let gamma = s.dot(&y) / y.dot(&y);
        let hy = history.apply(&y, gamma);
        assert::close(hy[0], s[0], TOL);
        assert::close(hy[1], s[1], TOL);
    }

    #[test]
    fn ring_overwrites_oldest() {
        let mut history = History::new(2);
        history.push(vec(&[1.0]), vec(&[1.0]));
        history.push(vec(&[2.0]), vec(&[1.0]));
        history.push(vec(&[3.0]), vec(&[1.0]));
        assert_eq!(history.len(), 2);
        assert_eq!(history.capacity(), 2);

        let order: Vec<f64> =
            history.newest_first().map(|i| history.s[i][0]).collect();
        assert_eq!(order, vec![3.0, 2.0]);

        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn recovers_inverse_hessian_of_quadratic() {
        // With pairs spanning the space, H ≈ A⁻¹ for A = diag(2, 8)
        let mut history = History::new(5);
        history.push(vec(&[1.0, 0.0]), vec(&[2.0, 0.0]));
        history.push(vec(&[0.0, 1.0]), vec(&[0.0, 8.0]));
        let z = history.apply(&vec(&[2.0, 8.0]), 0.125);
        assert::close(z[0], 1.0, TOL);
        assert::close(z[1], 1.0, TOL);
    }

    fn run_quadratic(lbfgs: &mut Lbfgs) -> State<DVector<f64>> {
        let mut fun = Evaluator::infallible(|x: &DVector<f64>| {
            let f = x[0] * x[0] + 10.0 * x[1] * x[1];
            (f, vec(&[2.0 * x[0], 20.0 * x[1]]))
        });
        let x0 = vec(&[1.0, 1.0]);
        let (f0, g0) = fun.eval(&x0).unwrap();
        let mut state = State::new(x0, f0, g0);

        lbfgs.initialize(&state).unwrap();
        for _ in 0..20 {
            if state.gradient.magnitude() < 1E-10 {
                break;
            }
            lbfgs.iterate(&mut state, &mut fun).unwrap();
        }
        state
    }

    #[test]
    fn quadratic_converges_and_tracks_steps() {
        let params = LbfgsParams::default().with_step_history(true);
        let mut lbfgs = Lbfgs::new(params);
        let state = run_quadratic(&mut lbfgs);
        assert!(state.gradient.magnitude() < 1E-10);
        assert!(!lbfgs.step().history().is_empty());
        assert!(lbfgs.step().history().iter().all(|s| *s > 0.0));
        assert!(lbfgs.history().len() <= 30);
    }

    #[test]
    fn step_history_is_off_by_default() {
        let mut lbfgs = Lbfgs::default();
        let state = run_quadratic(&mut lbfgs);
        assert!(state.gradient.magnitude() < 1E-10);
        assert!(*lbfgs.step().current() > 0.0);
        assert!(lbfgs.step().history().is_empty());
    }

    #[test]
    fn zero_store_is_invalid() {
        let x0 = vec(&[1.0]);
        let state = State::new(x0.clone(), 1.0, x0);
        let mut lbfgs = Lbfgs::new(LbfgsParams::default().with_store(0));
        assert!(matches!(
            lbfgs.initialize(&state),
            Err(OptimizeError::InvalidParameter { name: "store", .. })
        ));
    }
}
