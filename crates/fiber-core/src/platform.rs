//! Platform abstraction traits for the fiber scheduler.
//!
//! The engine never blocks the host: it performs work in slices and relies on
//! the platform to hand it idle time. [`IdleScheduler`] is how the engine asks
//! for the next slice and [`Deadline`] is how a slice learns when to stop.

use std::time::Duration;

/// Requests idle time from the host.
///
/// Implementations only record the request; the host answers it later by
/// calling [`FiberRoot::run_slice`](crate::FiberRoot::run_slice) with a fresh
/// [`Deadline`]. They must be safe to use from multiple threads so a host
/// event loop can be woken from elsewhere.
pub trait IdleScheduler: Send + Sync {
    fn request_idle_slice(&self);
}

/// Scheduler that ignores requests; callers drive slices themselves.
#[derive(Debug, Default)]
pub struct ManualScheduler;

impl IdleScheduler for ManualScheduler {
    fn request_idle_slice(&self) {}
}

/// Remaining budget of the current slice.
pub trait Deadline {
    fn time_remaining(&mut self) -> Duration;
}

impl<F: FnMut() -> Duration> Deadline for F {
    fn time_remaining(&mut self) -> Duration {
        self()
    }
}

/// A deadline that never asks the scheduler to yield.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unbounded;

impl Deadline for Unbounded {
    fn time_remaining(&mut self) -> Duration {
        Duration::MAX
    }
}

/// A deterministic deadline that allows a fixed number of units of work.
///
/// A slice always performs at least one unit, so budgets of `0` and `1`
/// behave the same.
#[derive(Clone, Copy, Debug)]
pub struct StepBudget {
    remaining: usize,
}

impl StepBudget {
    pub fn new(units: usize) -> Self {
        Self { remaining: units }
    }
}

impl Deadline for StepBudget {
    fn time_remaining(&mut self) -> Duration {
        if self.remaining > 1 {
            self.remaining -= 1;
            Duration::MAX
        } else {
            self.remaining = 0;
            Duration::ZERO
        }
    }
}
