use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use fiber_core::{
    CommitReport, Element, FiberConfig, FiberError, FiberRoot, HostHandle, HostOp, IdleScheduler,
    MemoryHost, SliceOutcome, StepBudget,
};

/// Idle scheduler that only counts requests.
#[derive(Debug, Default)]
pub struct CountingScheduler {
    requests: AtomicUsize,
}

impl CountingScheduler {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl IdleScheduler for CountingScheduler {
    fn request_idle_slice(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Headless harness for exercising a [`FiberRoot`] in tests.
///
/// `FiberTestRule` owns an in-memory host with a single container and
/// exposes helpers for rendering content, pumping slices deterministically
/// and inspecting the resulting host tree without a real platform.
pub struct FiberTestRule {
    root: FiberRoot<MemoryHost>,
    container: HostHandle,
    scheduler: Arc<CountingScheduler>,
    content: Option<Element>,
}

impl FiberTestRule {
    /// Create a new test rule backed by the in-memory host.
    pub fn new() -> Self {
        Self::with_config(FiberConfig::default())
    }

    pub fn with_config(config: FiberConfig) -> Self {
        let scheduler = Arc::new(CountingScheduler::default());
        let mut host = MemoryHost::new();
        let container = host.create_container("root");
        let root = FiberRoot::with_scheduler(host, scheduler.clone()).with_config(config);
        Self {
            root,
            container,
            scheduler,
            content: None,
        }
    }

    /// Install `content` and render it to completion.
    pub fn set_content(&mut self, content: Element) -> Result<Vec<CommitReport>, FiberError> {
        self.render(content);
        self.pump_until_idle()
    }

    /// Queue `content` without performing any work.
    pub fn render(&mut self, content: Element) {
        self.content = Some(content.clone());
        self.root.render(content, self.container);
    }

    /// Re-render the installed content and process the result.
    pub fn recompose(&mut self) -> Result<Vec<CommitReport>, FiberError> {
        self.root.update();
        self.pump_until_idle()
    }

    /// Drive the root until no request or pass is left.
    pub fn pump_until_idle(&mut self) -> Result<Vec<CommitReport>, FiberError> {
        self.root.run_until_idle()
    }

    /// Run one slice that performs at most `units` units of work.
    pub fn pump_slice(&mut self, units: usize) -> Result<SliceOutcome, FiberError> {
        self.root.run_slice(&mut StepBudget::new(units))
    }

    /// Returns whether content has been installed in this rule.
    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    pub fn content(&self) -> Option<&Element> {
        self.content.as_ref()
    }

    pub fn container(&self) -> HostHandle {
        self.container
    }

    /// Number of idle slices the root has asked for so far.
    pub fn slice_requests(&self) -> usize {
        self.scheduler.requests()
    }

    pub fn host(&self) -> &MemoryHost {
        self.root.host()
    }

    pub fn host_mut(&mut self) -> &mut MemoryHost {
        self.root.host_mut()
    }

    /// Drain the host calls recorded so far.
    pub fn take_ops(&mut self) -> Vec<HostOp> {
        self.root.host_mut().take_ops()
    }

    /// Host calls that changed the attached tree since the last drain.
    pub fn take_mutations(&mut self) -> Vec<HostOp> {
        self.take_ops()
            .into_iter()
            .filter(HostOp::is_mutation)
            .collect()
    }

    /// Indented dump of the container's subtree.
    pub fn dump(&self) -> String {
        self.host().dump_tree(self.container)
    }

    pub fn text_content(&self) -> String {
        self.host().text_content(self.container)
    }

    pub fn find_by_attribute(&self, key: &str, value: &str) -> Option<HostHandle> {
        self.host().find_by_attribute(self.container, key, value)
    }

    /// Dispatch `event` to the first node whose attribute `key` displays as
    /// `value`, then process whatever it scheduled. Returns the number of
    /// listeners invoked.
    pub fn dispatch(&mut self, key: &str, value: &str, event: &str) -> Result<usize, FiberError> {
        let Some(handle) = self.find_by_attribute(key, value) else {
            return Ok(0);
        };
        let invoked = self.host().dispatch(handle, event);
        self.pump_until_idle()?;
        Ok(invoked)
    }

    /// Gain mutable access to the raw root for advanced scenarios.
    pub fn root(&mut self) -> &mut FiberRoot<MemoryHost> {
        &mut self.root
    }
}

impl Default for FiberTestRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `FiberTestRule`.
pub fn run_test_root<R>(f: impl FnOnce(&mut FiberTestRule) -> R) -> R {
    let mut rule = FiberTestRule::new();
    f(&mut rule)
}
