//! The outer optimization loop
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use log::{debug, warn};
use std::fmt;
use std::time::Duration;

use crate::consts::DEFAULT_GRADIENT_ABS_TOL;
use crate::counter::{Counter, Runtime};
use crate::result::{OptimizeError, Result};
use crate::status::{check_all, Converger, Status};
use crate::tracked::TrackedValue;
use crate::traits::{Evaluator, Point};

/// Location, objective, and gradient of a run
#[derive(Clone, Debug, PartialEq)]
pub struct State<X> {
    pub location: TrackedValue<X>,
    pub objective: TrackedValue<f64>,
    pub gradient: TrackedValue<X>,
}

impl<X: Point> State<X> {
    /// State with the default tolerances for each role
    pub fn new(location: X, objective: f64, gradient: X) -> Self {
        State {
            location: TrackedValue::location(location),
            objective: TrackedValue::objective(objective),
            gradient: TrackedValue::gradient(gradient),
        }
    }

    pub fn initialize(&mut self) {
        self.location.initialize();
        self.objective.initialize();
        self.gradient.initialize();
    }

    pub fn finalize(&mut self) {
        self.location.finalize();
        self.objective.finalize();
        self.gradient.finalize();
    }
}

/// An iterative minimizer driven by [`Driver`].
///
/// The optimizer may raise its own stop signal through [`Converger`].
pub trait Optimizer<X: Point>: Converger {
    /// Prepare for a run starting from `state`
    fn initialize(&mut self, state: &State<X>) -> Result<()>;

    /// Take one step, updating the current values in `state`
    fn iterate(
        &mut self,
        state: &mut State<X>,
        fun: &mut Evaluator<'_, X>,
    ) -> Result<()>;
}

/// Budgets, tolerances, and initial values of a run
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct Settings<X> {
    pub max_iterations: usize,
    pub max_function_evaluations: usize,
    pub max_runtime: Duration,
    pub gradient_abs_tol: f64,
    pub gradient_rel_tol: f64,
    pub objective_abs_tol: f64,
    pub objective_rel_tol: f64,
    /// Objective at the initial location, if already known. Must be given
    /// together with `initial_gradient`.
    pub initial_objective: Option<f64>,
    pub initial_gradient: Option<X>,
    pub record_location_history: bool,
    pub record_objective_history: bool,
    pub record_gradient_history: bool,
}

impl<X> Default for Settings<X> {
    fn default() -> Self {
        Settings {
            max_iterations: usize::MAX,
            max_function_evaluations: usize::MAX,
            max_runtime: Duration::MAX,
            gradient_abs_tol: DEFAULT_GRADIENT_ABS_TOL,
            gradient_rel_tol: 0.0,
            objective_abs_tol: 0.0,
            objective_rel_tol: 0.0,
            initial_objective: None,
            initial_gradient: None,
            record_location_history: false,
            record_objective_history: false,
            record_gradient_history: false,
        }
    }
}

impl<X> Settings<X> {
    pub fn with_max_iterations(self, max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..self
        }
    }

    pub fn with_max_function_evaluations(self, max: usize) -> Self {
        Self {
            max_function_evaluations: max,
            ..self
        }
    }

    pub fn with_max_runtime(self, max_runtime: Duration) -> Self {
        Self {
            max_runtime,
            ..self
        }
    }

    pub fn with_gradient_abs_tol(self, gradient_abs_tol: f64) -> Self {
        Self {
            gradient_abs_tol,
            ..self
        }
    }

    pub fn with_gradient_rel_tol(self, gradient_rel_tol: f64) -> Self {
        Self {
            gradient_rel_tol,
            ..self
        }
    }

    pub fn with_objective_abs_tol(self, objective_abs_tol: f64) -> Self {
        Self {
            objective_abs_tol,
            ..self
        }
    }

    pub fn with_objective_rel_tol(self, objective_rel_tol: f64) -> Self {
        Self {
            objective_rel_tol,
            ..self
        }
    }

    pub fn with_initial_objective(self, objective: f64) -> Self {
        Self {
            initial_objective: Some(objective),
            ..self
        }
    }

    pub fn with_initial_gradient(self, gradient: X) -> Self {
        Self {
            initial_gradient: Some(gradient),
            ..self
        }
    }

    /// Record the history of every tracked value
    pub fn with_history(self, record: bool) -> Self {
        Self {
            record_location_history: record,
            record_objective_history: record,
            record_gradient_history: record,
            ..self
        }
    }
}

/// Snapshot of a finished run
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct OptimizeResult<X> {
    pub location: X,
    pub objective: f64,
    pub gradient: X,
    pub iterations: usize,
    pub function_evaluations: usize,
    pub runtime: Duration,
    pub status: Status,
    /// Empty unless recording was enabled in [`Settings`]
    pub location_history: Vec<X>,
    pub objective_history: Vec<f64>,
    pub gradient_history: Vec<X>,
}

/// A run that ended in an error.
///
/// `result` holds the progress made before the error, and is `None` only if
/// the run failed before the initial point was evaluated.
#[derive(Clone, Debug, PartialEq)]
pub struct Failure<X> {
    pub error: OptimizeError,
    pub result: Option<OptimizeResult<X>>,
}

impl<X> fmt::Display for Failure<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "optimization failed: {}", self.error)
    }
}

impl<X: fmt::Debug> std::error::Error for Failure<X> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Uninitialized,
    Running,
    /// Stopped by a convergence or budget signal
    Converged,
    /// Stopped by an error
    Failed,
}

/// Runs an [`Optimizer`] against an objective function.
///
/// Checks every stop signal before each iteration: objective tolerance,
/// gradient tolerance, the optimizer's own signal, then the iteration,
/// evaluation, and runtime budgets.
#[derive(Debug)]
pub struct Driver<'f, X, O> {
    fun: Evaluator<'f, X>,
    optimizer: O,
    settings: Settings<X>,
    initial_location: X,
    state: State<X>,
    /// Whether `state` holds an evaluated initial point
    seeded: bool,
    iterations: Counter,
    evaluations: Counter,
    runtime: Runtime,
    phase: Phase,
    status: Option<Status>,
}

impl<'f, X: Point, O: Optimizer<X>> Driver<'f, X, O> {
    pub fn new(
        fun: Evaluator<'f, X>,
        initial_location: X,
        settings: Settings<X>,
        optimizer: O,
    ) -> Self {
        Driver {
            fun,
            optimizer,
            iterations: Counter::iterations(settings.max_iterations),
            evaluations: Counter::function_evaluations(
                settings.max_function_evaluations,
            ),
            runtime: Runtime::new(settings.max_runtime),
            settings,
            // Placeholder until the initial point is evaluated
            state: State::new(
                initial_location.clone(),
                f64::NAN,
                initial_location.clone(),
            ),
            seeded: false,
            initial_location,
            phase: Phase::Uninitialized,
            status: None,
        }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Why the run stopped, `None` while it is still going
    #[inline]
    pub fn status(&self) -> Option<Status> {
        self.status
    }

    /// `None` until [`Driver::initialize`] has evaluated the initial point
    #[inline]
    pub fn state(&self) -> Option<&State<X>> {
        self.seeded.then_some(&self.state)
    }

    #[inline]
    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    #[inline]
    pub fn iterations(&self) -> &Counter {
        &self.iterations
    }

    #[inline]
    pub fn function_evaluations(&self) -> &Counter {
        &self.evaluations
    }

    #[inline]
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Reset the counters and clock, evaluate the initial point unless its
    /// values were supplied, and prepare the optimizer.
    pub fn initialize(&mut self) -> Result<()> {
        self.status = None;
        self.iterations.initialize();
        self.evaluations.initialize();
        self.fun.reset();
        self.runtime.initialize();

        let res = self
            .seed()
            .and_then(|()| self.optimizer.initialize(&self.state));
        match res {
            Ok(()) => {
                self.phase = Phase::Running;
                Ok(())
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    fn seed(&mut self) -> Result<()> {
        self.seeded = false;
        let x0 = self.initial_location.clone();
        let (obj, grad) = match (
            self.settings.initial_objective,
            &self.settings.initial_gradient,
        ) {
            (Some(obj), Some(grad)) => {
                if grad.dimension() != x0.dimension() {
                    return Err(OptimizeError::DimensionMismatch {
                        expected: x0.dimension(),
                        found: grad.dimension(),
                    });
                }
                (obj, grad.clone())
            }
            (None, None) => {
                let outcome = self.fun.eval(&x0);
                self.evaluations.add(1);
                outcome?
            }
            _ => return Err(OptimizeError::InitialValueMismatch),
        };

        let settings = &self.settings;
        let mut state = State {
            location: TrackedValue::location(x0)
                .with_history(settings.record_location_history),
            objective: TrackedValue::objective(obj)
                .with_tolerances(
                    settings.objective_abs_tol,
                    settings.objective_rel_tol,
                )
                .with_history(settings.record_objective_history),
            gradient: TrackedValue::gradient(grad)
                .with_tolerances(
                    settings.gradient_abs_tol,
                    settings.gradient_rel_tol,
                )
                .with_history(settings.record_gradient_history),
        };
        state.initialize();
        self.state = state;
        self.seeded = true;
        Ok(())
    }

    /// First stop signal, if any
    pub fn check(&self) -> Option<Status> {
        check_all(&[
            &self.state.objective,
            &self.state.gradient,
            &self.optimizer,
            &self.iterations,
            &self.evaluations,
            &self.runtime,
        ])
    }

    /// Check the stop signals and, if none fired, run one iteration.
    ///
    /// Returns the terminal status once the run has stopped. Initializes
    /// the run first if needed.
    pub fn iterate(&mut self) -> Result<Option<Status>> {
        match self.phase {
            Phase::Uninitialized => self.initialize()?,
            Phase::Converged | Phase::Failed => return Ok(self.status),
            Phase::Running => (),
        }

        if let Some(status) = self.check() {
            debug!(
                "stopping after {} iterations: {}",
                self.iterations.current(),
                status
            );
            self.phase = Phase::Converged;
            self.status = Some(status);
            return Ok(Some(status));
        }

        let before = self.fun.evaluations();
        let outcome =
            self.optimizer.iterate(&mut self.state, &mut self.fun);
        self.evaluations
            .add(self.fun.evaluations().saturating_sub(before));

        match outcome {
            Ok(()) => {
                self.iterations.add(1);
                Ok(None)
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    fn fail(&mut self, err: &OptimizeError) {
        warn!(
            "optimization failed after {} iterations: {}",
            self.iterations.current(),
            err
        );
        self.phase = Phase::Failed;
        self.status = Some(err.status());
    }

    /// Snapshot the run. Calling this while the run is still going stops it
    /// with [`Status::MaximumIterations`].
    pub fn finalize(&mut self) -> OptimizeResult<X> {
        self.iterations.finalize();
        self.evaluations.finalize();
        self.runtime.finalize();

        if self.phase == Phase::Running {
            self.phase = Phase::Converged;
            self.status = Some(Status::MaximumIterations);
        }

        let state = &mut self.state;
        state.finalize();

        OptimizeResult {
            location: state.location.current().clone(),
            objective: *state.objective.current(),
            gradient: state.gradient.current().clone(),
            iterations: self.iterations.total(),
            function_evaluations: self.evaluations.total(),
            runtime: self.runtime.total(),
            status: self.status.unwrap_or(Status::OptimizerError),
            location_history: state.location.history().to_vec(),
            objective_history: state.objective.history().to_vec(),
            gradient_history: state.gradient.history().to_vec(),
        }
    }

    fn run_loop(&mut self) -> Result<Status> {
        self.initialize()?;
        loop {
            if let Some(status) = self.iterate()? {
                return Ok(status);
            }
        }
    }

    /// Initialize, iterate until a stop signal or error, and finalize
    pub fn run(
        &mut self,
    ) -> std::result::Result<OptimizeResult<X>, Failure<X>> {
        let outcome = self.run_loop();
        let result = self.finalize();
        match outcome {
            Ok(_) => Ok(result),
            Err(error) => Err(Failure {
                error,
                result: self.seeded.then_some(result),
            }),
        }
    }
}

/// Minimize `fun` from `x0` with `optimizer`.
///
/// # Example
///
/// ```
/// use funopt::prelude::*;
///
/// let fun = Evaluator::infallible(|x: &f64| (x.cosh(), x.sinh()));
/// let res =
///     optimize(fun, 1.5, &Settings::default(), Cubic::default()).unwrap();
///
/// assert_eq!(res.status, Status::GradientAbsoluteTolerance);
/// assert!(res.location.abs() < 1E-6);
/// ```
pub fn optimize<'f, X, O>(
    fun: Evaluator<'f, X>,
    x0: X,
    settings: &Settings<X>,
    optimizer: O,
) -> std::result::Result<OptimizeResult<X>, Failure<X>>
where
    X: Point,
    O: Optimizer<X>,
{
    Driver::new(fun, x0, settings.clone(), optimizer).run()
}
