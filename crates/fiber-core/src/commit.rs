//! Applying a finished pass to the host tree.
//!
//! Commit runs in one uninterrupted call: deletions first, then placements
//! and prop updates in depth-first order, then effects. Afterwards the
//! in-progress nodes become the committed tree.

use crate::config::FiberConfig;
use crate::element::Props;
use crate::error::{FiberError, HostError};
use crate::host::{Host, HostHandle};
use crate::scheduler::{FiberRoot, PassScope};
use crate::work::{MutationTag, WorkId};

/// Summary of one committed pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Host nodes appended to the tree.
    pub placed: usize,
    /// Reused host nodes whose props changed.
    pub updated: usize,
    /// Work nodes removed together with their subtrees.
    pub deleted: usize,
    pub effects_run: usize,
    pub cleanups_run: usize,
}

/// Bring `handle`'s attributes and listeners from `previous` to `next`.
///
/// Removed or changed listeners are unbound before new ones are bound; the
/// event name comes from [`FiberConfig::event_name`]. Returns the number of
/// host calls issued.
pub(crate) fn diff_props<H: Host + ?Sized>(
    host: &mut H,
    handle: HostHandle,
    previous: Option<&Props>,
    next: &Props,
    config: &FiberConfig,
) -> Result<usize, HostError> {
    let mut calls = 0;
    if let Some(previous) = previous {
        for (key, old) in previous.attributes() {
            let current = next.get(key);
            if current == Some(old) {
                continue;
            }
            match old.as_listener() {
                Some(listener) => {
                    host.remove_event_listener(handle, &config.event_name(key), listener)?;
                }
                // A plain attribute replaced by another plain value is overwritten below.
                None if current.is_some_and(|value| value.as_listener().is_none()) => continue,
                None => host.remove_attribute(handle, key)?,
            }
            calls += 1;
        }
    }
    for (key, value) in next.attributes() {
        if previous.and_then(|previous| previous.get(key)) == Some(value) {
            continue;
        }
        match value.as_listener() {
            Some(listener) => host.add_event_listener(handle, &config.event_name(key), listener)?,
            None => host.set_attribute(handle, key, value)?,
        }
        calls += 1;
    }
    Ok(calls)
}

impl<H: Host> FiberRoot<H> {
    pub(crate) fn commit(&mut self) -> Result<CommitReport, FiberError> {
        let (root, scope) = {
            let pass = self.pass.as_ref().expect("commit without a pass");
            (pass.root, pass.scope)
        };
        let mut report = CommitReport::default();

        self.commit_deletions(&mut report)?;

        let nodes: Vec<WorkId> = self.tree.subtree(root).collect();
        for &id in &nodes {
            self.commit_work(id, &mut report)?;
        }

        self.commit_effects(&nodes, &mut report);

        for &id in &nodes {
            if let Some(hooks) = self.tree.node_mut(id).hooks.as_mut() {
                hooks.drain_consumed_updates();
            }
        }

        self.swap_trees(root, scope, &nodes);
        self.finish_pass();
        log::debug!("committed {scope:?} pass: {report:?}");
        Ok(report)
    }

    fn commit_deletions(&mut self, report: &mut CommitReport) -> Result<(), FiberError> {
        let deletions = std::mem::take(&mut self.deletions);
        for (index, deletion) in deletions.iter().enumerate() {
            let removed = self.remove_host_nodes(deletion.node);
            if let Err(error) = removed {
                // Leave the untouched rest for the pass to restore.
                self.deletions = deletions[index..].to_vec();
                return Err(error.into());
            }
            let subtree: Vec<WorkId> = self.tree.subtree(deletion.node).collect();
            for id in subtree {
                if let Some(hooks) = self.tree.node_mut(id).hooks.as_mut() {
                    report.cleanups_run += hooks.unmount();
                }
            }
            report.deleted += 1;
        }
        Ok(())
    }

    fn remove_host_nodes(&mut self, node: WorkId) -> Result<(), HostError> {
        let Some(parent) = self.tree.host_parent(node) else {
            log::warn!("deleted node {node} has no host ancestor");
            return Ok(());
        };
        for child in self.tree.host_roots(node) {
            self.host.remove_child(parent, child)?;
        }
        Ok(())
    }

    fn commit_work(&mut self, id: WorkId, report: &mut CommitReport) -> Result<(), FiberError> {
        let node = self.tree.node(id);
        let Some(handle) = node.host else {
            return Ok(());
        };
        match node.tag {
            MutationTag::Place => {
                let parent = self
                    .tree
                    .host_parent(id)
                    .expect("placed node has a host ancestor");
                self.host.append_child(parent, handle)?;
                report.placed += 1;
            }
            MutationTag::Update => {
                let previous = node.previous.map(|previous| &self.tree.node(previous).props);
                let next = &node.props;
                let unchanged =
                    previous.is_some_and(|previous| std::rc::Rc::ptr_eq(previous, next));
                if !unchanged {
                    let calls = diff_props(
                        &mut self.host,
                        handle,
                        previous.map(|props| &**props),
                        next,
                        &self.config,
                    )?;
                    if calls > 0 {
                        report.updated += 1;
                    }
                }
            }
            MutationTag::None | MutationTag::Delete => {}
        }
        Ok(())
    }

    /// Old-tree cleanups of effects keyed on a non-empty list run first, in
    /// tree order, then every pending effect of the new tree. Other cleanups
    /// move to the new record and wait for unmount.
    fn commit_effects(&mut self, nodes: &[WorkId], report: &mut CommitReport) {
        for &id in nodes {
            let Some(previous) = self.tree.node(id).previous else {
                continue;
            };
            let Some(mut old) = self.tree.node_mut(previous).hooks.take() else {
                continue;
            };
            let Some(hooks) = self.tree.node_mut(id).hooks.as_mut() else {
                continue;
            };
            for (slot, old_effect) in old.effects.iter_mut().enumerate() {
                let Some(cleanup) = old_effect.take_cleanup() else {
                    continue;
                };
                if old_effect.cleans_up_on_update() {
                    if cleanup.run() {
                        report.cleanups_run += 1;
                    }
                    continue;
                }
                match hooks.effects.get_mut(slot) {
                    Some(effect) if !effect.is_pending() => effect.adopt_cleanup(Some(cleanup)),
                    // A re-run replaces the stored cleanup without invoking it.
                    _ => log::trace!("dropping superseded cleanup of effect slot {slot}"),
                }
            }
        }

        for &id in nodes {
            let Some(hooks) = self.tree.node_mut(id).hooks.as_mut() else {
                continue;
            };
            for effect in &mut hooks.effects {
                if effect.run() {
                    report.effects_run += 1;
                }
            }
        }
    }

    fn swap_trees(&mut self, root: WorkId, scope: PassScope, nodes: &[WorkId]) {
        let replaced = match scope {
            PassScope::Root { .. } => self.current.replace(root),
            PassScope::Component { replaces } => {
                self.splice(replaces, root);
                Some(replaces)
            }
        };
        if let Some(replaced) = replaced {
            let freed = self.tree.release_subtree(replaced);
            log::trace!("freed {freed} nodes of the replaced tree");
        }

        for &id in nodes {
            let node = self.tree.node_mut(id);
            node.previous = None;
            node.tag = MutationTag::None;
            if let Some(hooks) = node.hooks.as_ref() {
                hooks.instance.set_committed(Some(id));
            }
        }
    }

    /// Put `fresh` where `old` sits in its parent's child list.
    fn splice(&mut self, old: WorkId, fresh: WorkId) {
        let (parent, next_sibling) = {
            let node = self.tree.node(old);
            (node.parent, node.next_sibling)
        };
        self.tree.node_mut(fresh).next_sibling = next_sibling;
        let Some(parent) = parent else {
            return;
        };
        if self.tree.node(parent).first_child == Some(old) {
            self.tree.node_mut(parent).first_child = Some(fresh);
            return;
        }
        let mut cursor = self.tree.node(parent).first_child;
        while let Some(sibling) = cursor {
            let node = self.tree.node_mut(sibling);
            if node.next_sibling == Some(old) {
                node.next_sibling = Some(fresh);
                return;
            }
            cursor = node.next_sibling;
        }
    }
}

#[cfg(test)]
#[path = "tests/commit_tests.rs"]
mod tests;
