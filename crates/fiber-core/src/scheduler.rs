//! The cooperative work loop.
//!
//! A [`FiberRoot`] owns the work trees and the host. Render requests are
//! queued on its [`Runtime`]; each call to [`FiberRoot::run_slice`] advances
//! the in-progress pass one unit at a time until the [`Deadline`] runs low,
//! and commits the pass in one step once no unit is left.

use std::rc::Rc;
use std::sync::Arc;

use crate::commit::CommitReport;
use crate::config::FiberConfig;
use crate::element::{Element, Props};
use crate::error::FiberError;
use crate::hooks::{ComponentHooks, Instance};
use crate::host::{Host, HostHandle};
use crate::platform::{Deadline, IdleScheduler, ManualScheduler, Unbounded};
use crate::runtime::{RenderRequest, Runtime, RuntimeHandle};
use crate::work::{MutationTag, WorkId, WorkKind, WorkNode, WorkTree};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PassScope {
    /// Re-render everything under the container.
    Root { container: HostHandle },
    /// Re-render one component; the new node replaces `replaces` on commit.
    Component { replaces: WorkId },
}

pub(crate) struct Pass {
    pub(crate) root: WorkId,
    pub(crate) scope: PassScope,
    request: RenderRequest,
}

/// A committed node scheduled for removal by the in-progress pass.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Deletion {
    pub(crate) node: WorkId,
    restore: MutationTag,
}

/// What one call to [`FiberRoot::run_slice`] did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SliceOutcome {
    /// One report per pass committed during the slice.
    pub commits: Vec<CommitReport>,
    /// The deadline ran low with units left; another slice was requested.
    pub yielded: bool,
}

impl SliceOutcome {
    pub fn committed(&self) -> bool {
        !self.commits.is_empty()
    }
}

pub struct FiberRoot<H: Host> {
    pub(crate) host: H,
    pub(crate) tree: WorkTree,
    pub(crate) runtime: Runtime,
    pub(crate) config: FiberConfig,
    container: Option<HostHandle>,
    element: Option<Element>,
    pub(crate) current: Option<WorkId>,
    pub(crate) pass: Option<Pass>,
    next_unit: Option<WorkId>,
    pub(crate) deletions: Vec<Deletion>,
}

impl<H: Host> FiberRoot<H> {
    /// A root whose slices are driven by the caller.
    pub fn new(host: H) -> Self {
        Self::with_scheduler(host, Arc::new(ManualScheduler))
    }

    pub fn with_scheduler(host: H, scheduler: Arc<dyn IdleScheduler>) -> Self {
        Self {
            host,
            tree: WorkTree::new(),
            runtime: Runtime::new(scheduler),
            config: FiberConfig::default(),
            container: None,
            element: None,
            current: None,
            pass: None,
            next_unit: None,
            deletions: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: FiberConfig) -> Self {
        self.config = config;
        self
    }

    /// Queue a pass that renders `element` into `container` and ask the
    /// platform for an idle slice. Nothing is rendered until a slice runs.
    pub fn render(&mut self, element: Element, container: HostHandle) {
        self.element = Some(element);
        self.container = Some(container);
        self.runtime.request_root();
    }

    /// Queue a full re-render of the last rendered element.
    pub fn update(&mut self) {
        if self.element.is_some() {
            self.runtime.request_root();
        } else {
            log::debug!("update() called before render(); nothing to re-render");
        }
    }

    /// Perform units of work until the pass is done or `deadline` runs low.
    ///
    /// A pass with no units left is committed before returning, even when the
    /// deadline is exhausted; commit never yields. Errors discard the pass
    /// that raised them and leave the committed tree as it was.
    pub fn run_slice(&mut self, deadline: &mut impl Deadline) -> Result<SliceOutcome, FiberError> {
        self.runtime.set_in_slice(true);
        let result = self.work_loop(deadline);
        self.runtime.set_in_slice(false);
        if result.is_err() {
            if let Some(pass) = self.abandon_pass() {
                log::debug!("discarded pass rooted at {} after an error", pass.root);
            }
        }
        result
    }

    /// Run slices with an unbounded deadline until no request is left.
    pub fn run_until_idle(&mut self) -> Result<Vec<CommitReport>, FiberError> {
        let mut commits = Vec::new();
        while !self.is_idle() {
            commits.extend(self.run_slice(&mut Unbounded)?.commits);
        }
        Ok(commits)
    }

    /// No pass in progress and no request queued.
    pub fn is_idle(&self) -> bool {
        self.pass.is_none() && !self.runtime.has_requests()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn tree(&self) -> &WorkTree {
        &self.tree
    }

    pub fn config(&self) -> &FiberConfig {
        &self.config
    }

    pub fn container(&self) -> Option<HostHandle> {
        self.container
    }

    /// Root of the committed tree.
    pub fn current_root(&self) -> Option<WorkId> {
        self.current
    }

    /// Root of the pass being built, if one is in progress.
    pub fn in_progress_root(&self) -> Option<WorkId> {
        self.pass.as_ref().map(|pass| pass.root)
    }

    /// The unit the next slice will perform.
    pub fn next_unit(&self) -> Option<WorkId> {
        self.next_unit
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    fn work_loop(&mut self, deadline: &mut impl Deadline) -> Result<SliceOutcome, FiberError> {
        let mut outcome = SliceOutcome::default();
        if self.runtime.take_superseding() {
            if let Some(pass) = self.abandon_pass() {
                log::debug!("abandoned pass rooted at {} for a newer request", pass.root);
                self.runtime.requeue(pass.request);
            }
        }
        if self.pass.is_none() {
            self.seed_next_pass();
        }

        let mut should_yield = false;
        loop {
            match self.next_unit {
                Some(unit) if !should_yield => {
                    let boundary = self.pass_root();
                    self.next_unit = self.perform_unit(unit, boundary)?;
                    should_yield = deadline.time_remaining() < self.config.yield_threshold;
                }
                Some(_) => {
                    outcome.yielded = true;
                    self.runtime.request_idle_slice();
                    break;
                }
                None if self.pass.is_some() => {
                    outcome.commits.push(self.commit()?);
                    self.seed_next_pass();
                }
                None => break,
            }
        }
        Ok(outcome)
    }

    fn pass_root(&self) -> WorkId {
        self.pass
            .as_ref()
            .map(|pass| pass.root)
            .expect("a unit is pending without a pass")
    }

    /// Start a pass for the oldest request that still has something to
    /// render. Returns whether a pass was seeded.
    fn seed_next_pass(&mut self) -> bool {
        while let Some(request) = self.runtime.take_next() {
            let seeded = match &request {
                RenderRequest::Root => self.seed_root(),
                RenderRequest::Component { instance, .. } => match instance.upgrade() {
                    Some(instance) => self.seed_component(&instance),
                    None => {
                        log::warn!("dropping update for a component that no longer exists");
                        None
                    }
                },
            };
            if let Some((root, scope)) = seeded {
                log::debug!("seeded {scope:?} pass at {root}");
                self.pass = Some(Pass {
                    root,
                    scope,
                    request,
                });
                self.next_unit = Some(root);
                return true;
            }
        }
        false
    }

    fn seed_root(&mut self) -> Option<(WorkId, PassScope)> {
        let (Some(container), Some(element)) = (self.container, self.element.clone()) else {
            return None;
        };
        let props = Rc::new(Props::from_children(vec![Some(element)]));
        let mut root = WorkNode::new(WorkKind::Root, props, None);
        root.host = Some(container);
        root.previous = match self.current {
            Some(current) if self.tree.node(current).host == Some(container) => Some(current),
            Some(current) => {
                // Rendering into another container: clear out the old one.
                let stale: Vec<WorkId> = self.tree.children(current).collect();
                for node in stale {
                    self.mark_deleted(node);
                }
                None
            }
            None => None,
        };
        let root = self.tree.alloc(root);
        Some((root, PassScope::Root { container }))
    }

    fn seed_component(&mut self, instance: &Instance) -> Option<(WorkId, PassScope)> {
        let Some(committed) = instance.committed() else {
            log::warn!(
                "dropping update for unmounted component `{}`",
                instance.component()
            );
            return None;
        };
        let node = self.tree.node(committed);
        if !node
            .hooks
            .as_ref()
            .is_some_and(ComponentHooks::has_unconsumed_updates)
        {
            log::debug!(
                "skipping `{}`: its updates were applied by an earlier pass",
                instance.component()
            );
            return None;
        }
        let mut fresh = WorkNode::new(node.kind.clone(), Rc::clone(&node.props), node.parent);
        fresh.next_sibling = node.next_sibling;
        fresh.previous = Some(committed);
        let root = self.tree.alloc(fresh);
        Some((root, PassScope::Component { replaces: committed }))
    }

    pub(crate) fn mark_deleted(&mut self, node: WorkId) {
        let work = self.tree.node_mut(node);
        let restore = std::mem::replace(&mut work.tag, MutationTag::Delete);
        self.deletions.push(Deletion { node, restore });
    }

    /// Drop the in-progress pass: free its nodes and undo the deletion tags it
    /// set on committed nodes. The host tree is not touched.
    fn abandon_pass(&mut self) -> Option<Pass> {
        let pass = self.pass.take()?;
        self.next_unit = None;
        self.tree.release_subtree(pass.root);
        for deletion in self.deletions.drain(..) {
            if let Some(node) = self.tree.get_mut(deletion.node) {
                node.tag = deletion.restore;
            }
        }
        Some(pass)
    }

    pub(crate) fn finish_pass(&mut self) -> Option<Pass> {
        self.next_unit = None;
        self.pass.take()
    }
}

impl<H: Host + std::fmt::Debug> std::fmt::Debug for FiberRoot<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FiberRoot")
            .field("host", &self.host)
            .field("tree", &self.tree)
            .field("current", &self.current)
            .field("in_progress", &self.in_progress_root())
            .field("next_unit", &self.next_unit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "tests/scheduler_tests.rs"]
mod tests;
