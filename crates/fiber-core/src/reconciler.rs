//! Units of work and child diffing.

use std::rc::Rc;

use crate::commit::diff_props;
use crate::element::Element;
use crate::error::FiberError;
use crate::hooks::render_component;
use crate::host::Host;
use crate::scheduler::FiberRoot;
use crate::work::{MutationTag, WorkId, WorkKind, WorkNode};

impl<H: Host> FiberRoot<H> {
    /// Process one work node and return the next one to process, or `None`
    /// once the walk leaves `boundary`.
    pub(crate) fn perform_unit(
        &mut self,
        unit: WorkId,
        boundary: WorkId,
    ) -> Result<Option<WorkId>, FiberError> {
        let node = self.tree.node(unit);
        log::trace!("perform {unit} {:?}", node.kind);
        let props = Rc::clone(&node.props);

        match node.kind.clone() {
            WorkKind::Root => self.reconcile_children(unit, props.children()),
            WorkKind::Component(component) => {
                let previous = node.previous.and_then(|id| self.tree.node(id).hooks.as_ref());
                let (element, hooks) =
                    render_component(component, &props, self.runtime.handle(), previous)?;
                self.tree.node_mut(unit).hooks = Some(hooks);
                self.reconcile_children(unit, &[Some(element)]);
            }
            kind @ (WorkKind::Host(_) | WorkKind::Text) => {
                if node.host.is_none() {
                    let host_kind = kind.host_kind().expect("host and text nodes have a host kind");
                    let handle = self.host.create_node(host_kind)?;
                    diff_props(&mut self.host, handle, None, &props, &self.config)?;
                    self.tree.node_mut(unit).host = Some(handle);
                }
                self.reconcile_children(unit, props.children());
            }
        }

        Ok(self.next_unit_after(unit, boundary))
    }

    /// Match `children` against the committed children of `parent`'s previous
    /// node, position by position.
    fn reconcile_children(&mut self, parent: WorkId, children: &[Option<Element>]) {
        let mut old = self
            .tree
            .node(parent)
            .previous
            .and_then(|previous| self.tree.node(previous).first_child);
        let mut last: Option<WorkId> = None;

        for child in children {
            let matched = old;
            old = old.and_then(|id| self.tree.node(id).next_sibling);

            let Some(element) = child else {
                if let Some(stale) = matched {
                    self.mark_deleted(stale);
                }
                continue;
            };

            let mut fresh = WorkNode::new(
                WorkKind::from(element.kind()),
                element.shared_props(),
                Some(parent),
            );
            match matched {
                Some(id) if self.tree.node(id).kind.matches(element.kind()) => {
                    fresh.host = self.tree.node(id).host;
                    fresh.previous = Some(id);
                    fresh.tag = MutationTag::Update;
                }
                stale => {
                    fresh.tag = MutationTag::Place;
                    if let Some(id) = stale {
                        self.mark_deleted(id);
                    }
                }
            }

            let id = self.tree.alloc(fresh);
            match last {
                Some(previous_sibling) => {
                    self.tree.node_mut(previous_sibling).next_sibling = Some(id);
                }
                None => self.tree.node_mut(parent).first_child = Some(id),
            }
            last = Some(id);
        }

        while let Some(stale) = old {
            old = self.tree.node(stale).next_sibling;
            self.mark_deleted(stale);
        }
    }

    /// Depth-first pre-order successor of `unit` that stays inside `boundary`.
    pub(crate) fn next_unit_after(&self, unit: WorkId, boundary: WorkId) -> Option<WorkId> {
        let node = self.tree.node(unit);
        if let Some(child) = node.first_child {
            return Some(child);
        }
        let mut cursor = unit;
        loop {
            if cursor == boundary {
                return None;
            }
            let node = self.tree.node(cursor);
            if let Some(sibling) = node.next_sibling {
                return Some(sibling);
            }
            cursor = node.parent?;
        }
    }
}

#[cfg(test)]
#[path = "tests/reconciler_tests.rs"]
mod tests;
