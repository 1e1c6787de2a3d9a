//! One dimensional step search by successive cubic interpolation
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use log::trace;

use crate::consts::{
    DEFAULT_FLOAT_REL_TOL, DEFAULT_STEP_ABS_TOL, STEP_DECREASE_MAX,
    STEP_DECREASE_MIN, STEP_INCREASE_MAX, STEP_INCREASE_MIN,
    STEP_INTERIOR_MAX, STEP_INTERIOR_MIN,
};
use crate::optimize::{Optimizer, State};
use crate::result::{OptimizeError, Result};
use crate::status::{Converger, Status};
use crate::step::BoundedStep;
use crate::traits::Evaluator;

/// Tuning parameters of the cubic step search
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct CubicParams {
    /// Smallest shrink multiplier when the minimum has been stepped over
    pub decrease_min: f64,
    /// Largest shrink multiplier when the minimum has been stepped over
    pub decrease_max: f64,
    /// Smallest growth multiplier when the minimum is further along
    pub increase_min: f64,
    /// Largest growth multiplier when the minimum is further along
    pub increase_max: f64,
    /// Changes in objective smaller than this (relative to the objective)
    /// are treated as round-off
    pub float_rel_tol: f64,
    /// Stop once the bracket is narrower than this
    pub step_abs_tol: f64,
    /// First trial step when used as a standalone optimizer
    pub initial_step: f64,
}

impl Default for CubicParams {
    fn default() -> Self {
        Self {
            decrease_min: STEP_DECREASE_MIN,
            decrease_max: STEP_DECREASE_MAX,
            increase_min: STEP_INCREASE_MIN,
            increase_max: STEP_INCREASE_MAX,
            float_rel_tol: DEFAULT_FLOAT_REL_TOL,
            step_abs_tol: DEFAULT_STEP_ABS_TOL,
            initial_step: 1.0,
        }
    }
}

impl CubicParams {
    pub fn with_step_abs_tol(self, step_abs_tol: f64) -> Self {
        Self {
            step_abs_tol,
            ..self
        }
    }

    pub fn with_initial_step(self, initial_step: f64) -> Self {
        Self {
            initial_step,
            ..self
        }
    }

    pub fn with_float_rel_tol(self, float_rel_tol: f64) -> Self {
        Self {
            float_rel_tol,
            ..self
        }
    }

    pub fn with_decrease_range(self, min: f64, max: f64) -> Self {
        Self {
            decrease_min: min,
            decrease_max: max,
            ..self
        }
    }

    pub fn with_increase_range(self, min: f64, max: f64) -> Self {
        Self {
            increase_min: min,
            increase_max: max,
            ..self
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |name, value| {
            Err(OptimizeError::InvalidParameter { name, value })
        };
        if !(self.decrease_min > 0.0 && self.decrease_min < 1.0) {
            invalid("decrease_min", self.decrease_min)
        } else if !(self.decrease_max >= self.decrease_min
            && self.decrease_max < 1.0)
        {
            invalid("decrease_max", self.decrease_max)
        } else if !(self.increase_min > 1.0) {
            invalid("increase_min", self.increase_min)
        } else if !(self.increase_max >= self.increase_min) {
            invalid("increase_max", self.increase_max)
        } else if !(self.float_rel_tol >= 0.0) {
            invalid("float_rel_tol", self.float_rel_tol)
        } else if !(self.step_abs_tol >= 0.0) {
            invalid("step_abs_tol", self.step_abs_tol)
        } else {
            Ok(())
        }
    }
}

/// Outcome of one [`CubicStepSearch::iterate`] call
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepUpdate {
    /// Next step to evaluate
    pub step: f64,
    /// Whether the point just evaluated became the new base point
    pub accepted: bool,
}

/// Local minimizer in `u` of the cubic with `p(0) = 0`, `p(1) = delta_f`,
/// `p'(0) = g0`, `p'(1) = g1`. The minimizer may lie outside `[0, 1]`; callers
/// clamp it. `None` when the fit has no local minimum or is not finite.
fn cubic_minimizer(delta_f: f64, g0: f64, g1: f64) -> Option<f64> {
    let a = g1 + g0 - 2.0 * delta_f;
    let b = 3.0 * delta_f - 2.0 * g0 - g1;
    let c = g0;

    let u = if a == 0.0 {
        // Exact quadratic; only a minimum when it opens upward
        if b > 0.0 {
            -c / (2.0 * b)
        } else {
            return None;
        }
    } else {
        let det = b * b - 3.0 * a * c;
        if det < 0.0 {
            return None;
        }
        let root = det.sqrt();
        // Same root as (-b + root) / 3a, without cancellation when b > 0
        if b > 0.0 {
            -c / (b + root)
        } else {
            (root - b) / (3.0 * a)
        }
    };

    if u.is_finite() {
        Some(u)
    } else {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    /// The bound behind the trial point, in the direction of travel
    Near,
    /// The bound beyond the trial point, in the direction of travel
    Far,
}

/// Bounded one dimensional search for an acceptable step.
///
/// Works in step coordinates: the base point (the last accepted point) sits
/// at `base_offset`, derivatives are with respect to the step, and the
/// search starts at offset `0` with a negative derivative. Each call to
/// [`CubicStepSearch::iterate`] consumes the objective and derivative at
/// the current trial step, narrows the bracket, and proposes the next trial
/// step.
///
/// # Example
///
/// ```
/// use funopt::cubic::CubicStepSearch;
///
/// // φ(s) = (s - 3)², starting from s = 0 with a first trial at s = 1
/// let phi = |s: f64| ((s - 3.0).powi(2), 2.0 * (s - 3.0));
///
/// let mut search = CubicStepSearch::default();
/// let (f0, g0) = phi(0.0);
/// search.initialize(1.0, f0, g0).unwrap();
///
/// for _ in 0..10 {
///     let (f, g) = phi(search.step().current());
///     search.iterate(f, g);
/// }
/// assert!((search.base_offset() - 3.0).abs() < 1E-8);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct CubicStepSearch {
    params: CubicParams,
    step: BoundedStep,
    base_offset: f64,
    base_objective: f64,
    base_derivative: f64,
    direction_positive: bool,
}

impl Default for CubicStepSearch {
    fn default() -> Self {
        Self::new(CubicParams::default())
    }
}

impl CubicStepSearch {
    pub fn new(params: CubicParams) -> Self {
        CubicStepSearch {
            step: BoundedStep::new(params.initial_step, params.step_abs_tol),
            params,
            base_offset: 0.0,
            base_objective: f64::NAN,
            base_derivative: f64::NAN,
            direction_positive: true,
        }
    }

    #[inline]
    pub fn params(&self) -> &CubicParams {
        &self.params
    }

    #[inline]
    pub fn step(&self) -> &BoundedStep {
        &self.step
    }

    /// Offset of the last accepted point from the search origin
    #[inline]
    pub fn base_offset(&self) -> f64 {
        self.base_offset
    }

    #[inline]
    pub fn base_objective(&self) -> f64 {
        self.base_objective
    }

    #[inline]
    pub fn base_derivative(&self) -> f64 {
        self.base_derivative
    }

    /// `true` while trial steps move away from the origin
    #[inline]
    pub fn direction_positive(&self) -> bool {
        self.direction_positive
    }

    /// Start a new search from the origin with objective `objective` and
    /// derivative `derivative`, first trying `initial_step`.
    pub fn initialize(
        &mut self,
        initial_step: f64,
        objective: f64,
        derivative: f64,
    ) -> Result<()> {
        self.params.validate()?;
        self.step.set_abs_tol(self.params.step_abs_tol);
        self.step.set_initial(initial_step);
        self.step.initialize()?;
        self.base_offset = 0.0;
        self.base_objective = objective;
        self.base_derivative = derivative;
        self.direction_positive = true;
        Ok(())
    }

    /// Consume the objective and derivative at the current trial step and
    /// propose the next one.
    pub fn iterate(
        &mut self,
        trial_objective: f64,
        trial_derivative: f64,
    ) -> StepUpdate {
        let trial = self.step.current();
        let (f0, g0) = (self.base_objective, self.base_derivative);
        let (f1, g1) = (trial_objective, trial_derivative);

        let delta_f = f1 - f0;
        let scale = f0.abs().max(f1.abs());
        let trusted =
            scale == 0.0 || delta_f.abs() > scale * self.params.float_rel_tol;

        let decrease = delta_f <= 0.0 || !trusted;
        let sign_change = (g0 > 0.0 && g1 < 0.0) || (g0 < 0.0 && g1 > 0.0);
        let flatter = g1.abs() < g0.abs();

        // Normalized coordinate: u = 0 at the base point, u = 1 at the trial
        let span = trial - self.base_offset;
        let (g0n, g1n) = (g0 * span, g1 * span);
        // An untrusted change in value is replaced by the one implied by the
        // derivatives, which reduces the fit to the derivative secant
        let fit_delta = if trusted { delta_f } else { 0.5 * (g0n + g1n) };
        let minimizer = cubic_minimizer(fit_delta, g0n, g1n);

        trace!(
            "cubic: trial = {}, base = {}, f0 = {}, f1 = {}, g0 = {}, g1 = {}, \
             trusted = {}, minimizer = {:?}",
            trial,
            self.base_offset,
            f0,
            f1,
            g0,
            g1,
            trusted,
            minimizer
        );

        let mut accepted = false;
        let mut reverse = false;
        let multiplier = match minimizer {
            None if decrease && !sign_change => {
                self.tighten(Side::Near);
                accepted = flatter;
                self.extrapolate(span)
            }
            None => {
                // Only non-finite data gets here: a real cubic rising from
                // the base, or crossing zero slope, always has a minimizer
                self.tighten(Side::Far);
                0.5
            }
            Some(u) if sign_change => {
                // Stepped over the minimum
                self.tighten(Side::Far);
                if decrease && flatter {
                    accepted = true;
                    reverse = true;
                }
                u.clamp(self.params.decrease_min, self.params.decrease_max)
            }
            Some(u) if decrease => {
                // Minimum is further along
                self.tighten(Side::Near);
                accepted = true;
                if flatter {
                    let guess = if u < self.params.increase_min {
                        // Assume the derivative decreases linearly
                        g0.abs() / (g0.abs() - g1.abs())
                    } else {
                        u
                    };
                    guess.clamp(
                        self.params.increase_min,
                        self.params.increase_max,
                    )
                } else {
                    self.extrapolate(span)
                }
            }
            Some(u) => {
                // Value went up without crossing the minimum
                self.tighten(Side::Far);
                u.clamp(STEP_INTERIOR_MIN, STEP_INTERIOR_MAX)
            }
        };

        let next = self.step.safeguard(self.base_offset + multiplier * span);

        if accepted {
            self.base_offset = trial;
            self.base_objective = f1;
            self.base_derivative = g1;
            if reverse {
                self.direction_positive = !self.direction_positive;
            }
        }
        self.step.set_current(next);

        trace!(
            "cubic: multiplier = {}, next = {}, bracket = [{}, {}], \
             accepted = {}",
            multiplier,
            next,
            self.step.lower(),
            self.step.upper(),
            accepted
        );

        StepUpdate {
            step: next,
            accepted,
        }
    }

    fn tighten(&mut self, side: Side) {
        let trial = self.step.current();
        match (side, self.direction_positive) {
            (Side::Near, true) | (Side::Far, false) => {
                self.step.set_lower(trial)
            }
            (Side::Near, false) | (Side::Far, true) => {
                self.step.set_upper(trial)
            }
        }
    }

    /// Multiplier for a step further along when the fit gives no usable
    /// estimate: double the step while the bracket is open, otherwise aim at
    /// the middle of the bracket.
    fn extrapolate(&self, span: f64) -> f64 {
        let trial = self.step.current();
        let open = self.step.upper().is_infinite();
        let target = if self.direction_positive && open {
            2.0 * trial
        } else {
            self.step.midpoint()
        };
        (target - self.base_offset) / span
    }
}

impl Converger for CubicStepSearch {
    fn status(&self) -> Option<Status> {
        self.step.status()
    }
}

/// Standalone one dimensional minimizer built on [`CubicStepSearch`].
///
/// Moves downhill from the initial location, one function evaluation per
/// iteration.
///
/// # Example
///
/// ```
/// use funopt::prelude::*;
///
/// let fun = Evaluator::infallible(|x: &f64| {
///     ((x - 2.0).powi(2), 2.0 * (x - 2.0))
/// });
/// let settings = Settings::default().with_gradient_abs_tol(1E-10);
/// let res = optimize(fun, 10.0, &settings, Cubic::default()).unwrap();
///
/// assert_eq!(res.status, Status::GradientAbsoluteTolerance);
/// assert!((res.location - 2.0).abs() < 1E-9);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Cubic {
    search: CubicStepSearch,
    origin: f64,
    sign: f64,
}

impl Default for Cubic {
    fn default() -> Self {
        Self::new(CubicParams::default())
    }
}

impl Cubic {
    pub fn new(params: CubicParams) -> Self {
        Cubic {
            search: CubicStepSearch::new(params),
            origin: 0.0,
            sign: 1.0,
        }
    }

    #[inline]
    pub fn search(&self) -> &CubicStepSearch {
        &self.search
    }
}

impl Converger for Cubic {
    fn status(&self) -> Option<Status> {
        self.search.status()
    }
}

impl Optimizer<f64> for Cubic {
    fn initialize(&mut self, state: &State<f64>) -> Result<()> {
        let grad = *state.gradient.current();
        self.sign = if grad > 0.0 { -1.0 } else { 1.0 };
        self.origin = *state.location.current();
        let initial_step = self.search.params().initial_step;
        self.search.initialize(
            initial_step,
            *state.objective.current(),
            self.sign * grad,
        )
    }

    fn iterate(
        &mut self,
        state: &mut State<f64>,
        fun: &mut Evaluator<'_, f64>,
    ) -> Result<()> {
        let x = self.origin + self.sign * self.search.step().current();
        let (obj, grad) = fun.eval(&x)?;
        let update = self.search.iterate(obj, self.sign * grad);
        if update.accepted {
            state.location.set_current(x);
            state.objective.set_current(obj);
            state.gradient.set_current(grad);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TOL: f64 = 1E-12;

    fn run<F>(search: &mut CubicStepSearch, phi: F, n: usize)
    where
        F: Fn(f64) -> (f64, f64),
    {
        for _ in 0..n {
            if search.status().is_some() {
                break;
            }
            let (f, g) = phi(search.step().current());
            search.iterate(f, g);
        }
    }

    #[test]
    fn quadratic_fit_is_exact() {
        // (s - 0.3)²: the first fit through s = 0 and s = 1 hits the minimum
        let phi = |s: f64| ((s - 0.3).powi(2), 2.0 * (s - 0.3));
        let mut search = CubicStepSearch::default();
        let (f0, g0) = phi(0.0);
        search.initialize(1.0, f0, g0).unwrap();

        let (f, g) = phi(1.0);
        let update = search.iterate(f, g);
        assert!(!update.accepted);
        assert::close(update.step, 0.3, TOL);
        assert_eq!(search.step().upper(), 1.0);
        assert_eq!(search.step().lower(), 0.0);
    }

    #[test]
    fn grows_step_when_minimum_is_far() {
        let phi = |s: f64| ((s - 50.0).powi(2), 2.0 * (s - 50.0));
        let mut search = CubicStepSearch::default();
        let (f0, g0) = phi(0.0);
        search.initialize(1.0, f0, g0).unwrap();

        let (f, g) = phi(1.0);
        let update = search.iterate(f, g);
        assert!(update.accepted);
        assert!(update.step > 1.0);
        assert_eq!(search.step().lower(), 1.0);
        assert_eq!(search.base_offset(), 1.0);
    }

    #[test]
    fn overshoot_with_decrease_reverses_direction() {
        // Minimum at 0.6; trial at 1 has lower value and flatter slope
        let phi = |s: f64| {
            let y = (s - 0.6).powi(2) * (1.0 + (s - 0.6).powi(2));
            let dy = 2.0 * (s - 0.6) + 4.0 * (s - 0.6).powi(3);
            (y, dy)
        };
        let mut search = CubicStepSearch::default();
        let (f0, g0) = phi(0.0);
        search.initialize(1.0, f0, g0).unwrap();

        let (f, g) = phi(1.0);
        assert!(f < f0 && g > 0.0 && g.abs() < g0.abs());
        let update = search.iterate(f, g);
        assert!(update.accepted);
        assert!(!search.direction_positive());
        assert_eq!(search.step().upper(), 1.0);
        assert!(update.step < 1.0 && update.step > 0.0);
    }

    #[test]
    fn converges_on_shifted_quartic() {
        let phi = |s: f64| {
            let y = (s - 7.0).powi(4) + (s - 7.0).powi(2);
            let dy = 4.0 * (s - 7.0).powi(3) + 2.0 * (s - 7.0);
            (y, dy)
        };
        let mut search = CubicStepSearch::default();
        let (f0, g0) = phi(0.0);
        search.initialize(1.0, f0, g0).unwrap();
        run(&mut search, phi, 60);
        assert::close(search.base_offset(), 7.0, 1E-6);
    }

    #[test]
    fn untrusted_delta_f_falls_back_to_secant() {
        // Objective is constant to round-off, derivative is linear with a
        // root at 0.25
        let phi = |s: f64| (1E20, s - 0.25);
        let mut search = CubicStepSearch::default();
        let (f0, g0) = phi(0.0);
        search.initialize(1.0, f0, g0).unwrap();

        let (f, g) = phi(1.0);
        let update = search.iterate(f, g);
        assert::close(update.step, 0.25, TOL);
    }

    #[test]
    fn increase_without_crossing_stays_interior() {
        // Value rises while the slope stays negative: the fit minimum sits
        // right next to the base, so the step is clamped into the interior
        let mut search = CubicStepSearch::default();
        search.initialize(2.0, 0.0, -1.0).unwrap();
        let update = search.iterate(100.0, -50.0);
        assert!(!update.accepted);
        assert_eq!(search.step().upper(), 2.0);
        assert::close(update.step, 0.5, TOL);
    }

    #[test]
    fn no_fit_with_decrease_doubles_step() {
        // (s - 7)⁴ + (s - 7)² between s = 0 and s = 1 has no real cubic fit
        let mut search = CubicStepSearch::default();
        search.initialize(1.0, 2450.0, -1386.0).unwrap();
        let update = search.iterate(1332.0, -876.0);
        assert!(update.accepted);
        assert_eq!(search.step().lower(), 1.0);
        assert_eq!(search.base_offset(), 1.0);
        assert::close(update.step, 2.0, TOL);
    }

    #[test]
    fn invalid_initial_step_is_rejected() {
        let mut search = CubicStepSearch::default();
        assert!(matches!(
            search.initialize(0.0, 1.0, -1.0),
            Err(OptimizeError::InvalidBounds { .. })
        ));
        assert!(matches!(
            search.initialize(f64::NAN, 1.0, -1.0),
            Err(OptimizeError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn invalid_params_are_rejected() {
        let params = CubicParams::default().with_increase_range(0.5, 2.0);
        let mut search = CubicStepSearch::new(params);
        assert!(matches!(
            search.initialize(1.0, 1.0, -1.0),
            Err(OptimizeError::InvalidParameter {
                name: "increase_min",
                ..
            })
        ));
    }

    #[test]
    fn collapsed_bracket_converges() {
        let params = CubicParams::default().with_step_abs_tol(1E-3);
        let phi = |s: f64| ((s - 0.5).powi(2), 2.0 * (s - 0.5));
        let mut search = CubicStepSearch::new(params);
        let (f0, g0) = phi(0.0);
        search.initialize(1.0, f0, g0).unwrap();
        let mut stopped = false;
        for _ in 0..200 {
            if search.status().is_some() {
                stopped = true;
                break;
            }
            let (f, g) = phi(search.step().current());
            search.iterate(f, g);
        }
        assert!(stopped);
        assert_eq!(search.status(), Some(Status::StepAbsoluteTolerance));
    }

    #[test]
    fn cubic_minimizer_of_pure_cubic() {
        // p(u) = u³ - 3u: p(1) = -2, p'(0) = -3, p'(1) = 0, minimum at 1
        let u = cubic_minimizer(-2.0, -3.0, 0.0).unwrap();
        assert::close(u, 1.0, TOL);
        // p(u) = -u³ + u: local minimum at -1/√3, behind the base
        let u = cubic_minimizer(0.0, 1.0, -2.0).unwrap();
        assert::close(u, -1.0 / 3.0_f64.sqrt(), TOL);
    }

    #[test]
    fn cubic_minimizer_without_minimum() {
        // p(u) = -u³ + 1.5u² - u: p' = -3u² + 3u - 1 has no real root
        assert_eq!(cubic_minimizer(-0.5, -1.0, -1.0), None);
        // a = 0 and the quadratic opens downward
        assert_eq!(cubic_minimizer(-1.5, -1.0, -2.0), None);
        // Overflowed derivative
        assert_eq!(cubic_minimizer(2.0, -1.0, f64::INFINITY), None);
    }

    #[test]
    fn unusable_fit_past_minimum_bisects() {
        let mut search = CubicStepSearch::default();
        search.initialize(1.0, 0.0, -1.0).unwrap();
        let update = search.iterate(2.0, f64::INFINITY);
        assert!(!update.accepted);
        assert_eq!(search.step().lower(), 0.0);
        assert_eq!(search.step().upper(), 1.0);
        assert_eq!(search.base_offset(), 0.0);
        assert::close(update.step, 0.5, TOL);
    }

    #[test]
    fn unusable_fit_on_increase_bisects() {
        let mut search = CubicStepSearch::default();
        search.initialize(4.0, 0.0, -1.0).unwrap();
        let update = search.iterate(3.0, f64::NAN);
        assert!(!update.accepted);
        assert_eq!(search.step().upper(), 4.0);
        assert_eq!(search.base_offset(), 0.0);
        assert::close(update.step, 2.0, TOL);
    }

    proptest! {
        #[test]
        fn steps_stay_inside_bracket(
            center in 1E-2..1E2_f64,
            curvature in 1E-2..1E2_f64,
            quartic in 0.0..10.0_f64,
            initial_step in 1E-3..1E3_f64,
        ) {
            let phi = |s: f64| {
                let d = s - center;
                (
                    curvature * d * d + quartic * d.powi(4),
                    2.0 * curvature * d + 4.0 * quartic * d.powi(3),
                )
            };
            let mut search = CubicStepSearch::default();
            let (f0, g0) = phi(0.0);
            search.initialize(initial_step, f0, g0).unwrap();

            for _ in 0..50 {
                if search.status().is_some() {
                    break;
                }
                let trial = search.step().current();
                let (f, g) = phi(trial);
                let update = search.iterate(f, g);
                let step = search.step();
                prop_assert!(step.lower() <= step.upper());
                prop_assert!(step.contains(update.step));
                if update.accepted {
                    prop_assert!(step.contains(trial));
                }
            }
        }
    }
}
