//! Standard runtime services backed by Rust's `std` library.
//!
//! This crate provides concrete implementations of the platform traits
//! defined in `fiber-core`: an idle scheduler that records slice requests and
//! optionally wakes an event loop, and a wall-clock [`Deadline`]. A
//! [`StdRuntime`] bundles both and can pump a [`FiberRoot`] until it has no
//! work left.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use fiber_core::{CommitReport, Deadline, FiberError, FiberRoot, Host, IdleScheduler};

/// Budget of one idle slice when none is configured: one 60 Hz frame.
pub const DEFAULT_SLICE_BUDGET: Duration = Duration::from_millis(16);

type SliceWaker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Counts slice requests from any thread and forwards each one to an
/// optional waker, typically an event-loop proxy.
#[derive(Default)]
pub struct StdIdleScheduler {
    requests: AtomicUsize,
    waker: Mutex<Option<SliceWaker>>,
}

impl StdIdleScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests made since the last [`take_slice_request`](Self::take_slice_request).
    pub fn pending_requests(&self) -> usize {
        self.requests.load(Ordering::Acquire)
    }

    /// Consumes every outstanding request; true if there was at least one.
    pub fn take_slice_request(&self) -> bool {
        self.requests.swap(0, Ordering::AcqRel) > 0
    }

    /// Installs `waker`, returning whether one was already registered.
    pub fn set_slice_waker(&self, waker: impl Fn() + Send + Sync + 'static) -> bool {
        self.waker_slot().replace(Arc::new(waker)).is_some()
    }

    pub fn clear_slice_waker(&self) {
        self.waker_slot().take();
    }

    fn waker_slot(&self) -> MutexGuard<'_, Option<SliceWaker>> {
        self.waker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for StdIdleScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdIdleScheduler")
            .field("pending_requests", &self.pending_requests())
            .field("has_waker", &self.waker_slot().is_some())
            .finish()
    }
}

impl IdleScheduler for StdIdleScheduler {
    fn request_idle_slice(&self) {
        let pending = self.requests.fetch_add(1, Ordering::AcqRel) + 1;
        log::trace!("idle slice requested ({pending} pending)");
        // Called without the lock held so the waker may re-enter.
        let waker = self.waker_slot().clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

/// Deadline measured against [`Instant::now`].
#[derive(Clone, Copy, Debug)]
pub struct InstantDeadline {
    deadline: Instant,
}

impl InstantDeadline {
    /// A deadline `budget` from now.
    pub fn new(budget: Duration) -> Self {
        Self::at(Instant::now() + budget)
    }

    pub fn at(deadline: Instant) -> Self {
        Self { deadline }
    }
}

impl Deadline for InstantDeadline {
    fn time_remaining(&mut self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Convenience container bundling the standard scheduler with a slice budget.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdIdleScheduler>,
    slice_budget: Duration,
}

impl StdRuntime {
    pub fn new() -> Self {
        Self::with_slice_budget(DEFAULT_SLICE_BUDGET)
    }

    pub fn with_slice_budget(slice_budget: Duration) -> Self {
        Self {
            scheduler: Arc::new(StdIdleScheduler::default()),
            slice_budget,
        }
    }

    /// Creates a root whose slice requests land on this runtime's scheduler.
    pub fn root<H: Host>(&self, host: H) -> FiberRoot<H> {
        FiberRoot::with_scheduler(host, self.scheduler.clone())
    }

    /// Returns the scheduler implementation.
    pub fn scheduler(&self) -> Arc<StdIdleScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn slice_budget(&self) -> Duration {
        self.slice_budget
    }

    /// Returns whether a slice was requested since the last poll.
    pub fn take_slice_request(&self) -> bool {
        self.scheduler.take_slice_request()
    }

    /// Registers a waker to be called when a root requests a slice.
    pub fn set_slice_waker(&self, waker: impl Fn() + Send + Sync + 'static) -> bool {
        self.scheduler.set_slice_waker(waker)
    }

    /// Clears any previously registered slice waker.
    pub fn clear_slice_waker(&self) {
        self.scheduler.clear_slice_waker();
    }

    /// Answer one pending slice request, if any, with a fresh deadline.
    pub fn run_requested_slice<H: Host>(
        &self,
        root: &mut FiberRoot<H>,
    ) -> Result<Option<Vec<CommitReport>>, FiberError> {
        if !self.take_slice_request() {
            return Ok(None);
        }
        let outcome = root.run_slice(&mut InstantDeadline::new(self.slice_budget))?;
        if outcome.yielded {
            log::trace!("slice yielded after {:?}", self.slice_budget);
        }
        Ok(Some(outcome.commits))
    }

    /// Answer slice requests until the root stops asking for more.
    pub fn drive<H: Host>(&self, root: &mut FiberRoot<H>) -> Result<Vec<CommitReport>, FiberError> {
        let mut commits = Vec::new();
        let mut slices = 0usize;
        while let Some(committed) = self.run_requested_slice(root)? {
            commits.extend(committed);
            slices += 1;
        }
        log::debug!("drove {slices} slices, {} commits", commits.len());
        Ok(commits)
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("slice_budget", &self.slice_budget)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}
