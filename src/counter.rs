//! Budget guards: iteration / evaluation counters and a runtime clock
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use std::time::{Duration, Instant};

use crate::status::{Converger, Status};

/// A monotonically increasing count with a maximum.
///
/// Signals once the count is strictly greater than the maximum, so the
/// iteration that lands exactly on the maximum still runs.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct Counter {
    current: usize,
    max: usize,
    total: usize,
    signal: Status,
}

impl Counter {
    pub fn new(max: usize, signal: Status) -> Self {
        Counter {
            current: 0,
            max,
            total: 0,
            signal,
        }
    }

    /// Counter over outer iterations
    pub fn iterations(max: usize) -> Self {
        Self::new(max, Status::MaximumIterations)
    }

    /// Counter over objective function evaluations
    pub fn function_evaluations(max: usize) -> Self {
        Self::new(max, Status::MaximumFunctionEvaluations)
    }

    #[inline]
    pub fn add(&mut self, delta: usize) {
        self.current = self.current.saturating_add(delta);
    }

    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    #[inline]
    pub fn max(&self) -> usize {
        self.max
    }

    /// Count recorded by the last [`Counter::finalize`]
    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn initialize(&mut self) {
        self.current = 0;
    }

    pub fn finalize(&mut self) {
        self.total = self.current;
    }
}

impl Converger for Counter {
    fn status(&self) -> Option<Status> {
        if self.current > self.max {
            Some(self.signal)
        } else {
            None
        }
    }
}

/// Wall clock budget measured from [`Runtime::initialize`]
#[derive(Clone, Debug)]
pub struct Runtime {
    start: Option<Instant>,
    max: Duration,
    total: Duration,
}

impl Runtime {
    pub fn new(max: Duration) -> Self {
        Runtime {
            start: None,
            max,
            total: Duration::ZERO,
        }
    }

    /// Time since the run started, zero before it has
    pub fn elapsed(&self) -> Duration {
        self.start.map_or(Duration::ZERO, |start| start.elapsed())
    }

    #[inline]
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Elapsed time recorded by the last [`Runtime::finalize`]
    #[inline]
    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn initialize(&mut self) {
        self.start = Some(Instant::now());
    }

    pub fn finalize(&mut self) {
        self.total = self.elapsed();
    }
}

impl Converger for Runtime {
    fn status(&self) -> Option<Status> {
        if self.elapsed() > self.max {
            Some(Status::MaximumRuntime)
        } else {
            None
        }
    }
}
