//! Arena-backed work trees.
//!
//! Both the committed tree and the in-progress tree live in one [`WorkTree`]
//! arena and reference each other through [`WorkId`]s. Every node built by a
//! pass is a fresh allocation; `previous` links point back at the matching
//! committed node and are cleared once the pass commits.

use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use crate::element::{ComponentFn, ElementKind, Props};
use crate::hooks::ComponentHooks;
use crate::host::{HostHandle, HostKind};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkId(usize);

impl WorkId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MutationTag {
    #[default]
    None,
    Place,
    Update,
    Delete,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkKind {
    /// The container a root pass renders into.
    Root,
    Host(Cow<'static, str>),
    Text,
    Component(ComponentFn),
}

impl WorkKind {
    pub fn is_component(&self) -> bool {
        matches!(self, WorkKind::Component(_))
    }

    pub(crate) fn host_kind(&self) -> Option<HostKind<'_>> {
        match self {
            WorkKind::Host(tag) => Some(HostKind::Element(tag)),
            WorkKind::Text => Some(HostKind::Text),
            WorkKind::Root | WorkKind::Component(_) => None,
        }
    }

    /// Structural type equality between a committed node and a new element.
    pub(crate) fn matches(&self, kind: &ElementKind) -> bool {
        match (self, kind) {
            (WorkKind::Host(old), ElementKind::Host(new)) => old == new,
            (WorkKind::Text, ElementKind::Text) => true,
            (WorkKind::Component(old), ElementKind::Component(new)) => old == new,
            _ => false,
        }
    }
}

impl From<&ElementKind> for WorkKind {
    fn from(kind: &ElementKind) -> Self {
        match kind {
            ElementKind::Host(tag) => WorkKind::Host(tag.clone()),
            ElementKind::Text => WorkKind::Text,
            ElementKind::Component(component) => WorkKind::Component(*component),
        }
    }
}

pub struct WorkNode {
    pub(crate) kind: WorkKind,
    pub(crate) props: Rc<Props>,
    pub(crate) parent: Option<WorkId>,
    pub(crate) first_child: Option<WorkId>,
    pub(crate) next_sibling: Option<WorkId>,
    pub(crate) host: Option<HostHandle>,
    pub(crate) tag: MutationTag,
    pub(crate) previous: Option<WorkId>,
    pub(crate) hooks: Option<ComponentHooks>,
}

impl WorkNode {
    pub(crate) fn new(kind: WorkKind, props: Rc<Props>, parent: Option<WorkId>) -> Self {
        Self {
            kind,
            props,
            parent,
            first_child: None,
            next_sibling: None,
            host: None,
            tag: MutationTag::None,
            previous: None,
            hooks: None,
        }
    }

    pub fn kind(&self) -> &WorkKind {
        &self.kind
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn parent(&self) -> Option<WorkId> {
        self.parent
    }

    pub fn first_child(&self) -> Option<WorkId> {
        self.first_child
    }

    pub fn next_sibling(&self) -> Option<WorkId> {
        self.next_sibling
    }

    pub fn host(&self) -> Option<HostHandle> {
        self.host
    }

    pub fn tag(&self) -> MutationTag {
        self.tag
    }

    pub fn previous(&self) -> Option<WorkId> {
        self.previous
    }

    pub fn state_count(&self) -> usize {
        self.hooks.as_ref().map_or(0, |hooks| hooks.states.len())
    }

    pub fn effect_count(&self) -> usize {
        self.hooks.as_ref().map_or(0, |hooks| hooks.effects.len())
    }
}

impl fmt::Debug for WorkNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkNode")
            .field("kind", &self.kind)
            .field("tag", &self.tag)
            .field("host", &self.host)
            .field("parent", &self.parent)
            .field("first_child", &self.first_child)
            .field("next_sibling", &self.next_sibling)
            .field("previous", &self.previous)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct WorkTree {
    nodes: Vec<Option<WorkNode>>,
    free: Vec<usize>,
}

impl WorkTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn alloc(&mut self, node: WorkNode) -> WorkId {
        if let Some(index) = self.free.pop() {
            self.nodes[index] = Some(node);
            WorkId(index)
        } else {
            self.nodes.push(Some(node));
            WorkId(self.nodes.len() - 1)
        }
    }

    pub(crate) fn release(&mut self, id: WorkId) -> Option<WorkNode> {
        let node = self.nodes.get_mut(id.0)?.take()?;
        self.free.push(id.0);
        Some(node)
    }

    /// Free `id` and everything below it. Siblings of `id` are untouched.
    pub(crate) fn release_subtree(&mut self, id: WorkId) -> usize {
        let subtree: Vec<WorkId> = self.subtree(id).collect();
        subtree
            .into_iter()
            .filter(|&node| self.release(node).is_some())
            .count()
    }

    pub fn get(&self, id: WorkId) -> Option<&WorkNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: WorkId) -> Option<&mut WorkNode> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Panics on a freed id; holding one is an engine bug, not a user error.
    pub(crate) fn node(&self, id: WorkId) -> &WorkNode {
        self.get(id)
            .unwrap_or_else(|| panic!("work node {id} was released"))
    }

    pub(crate) fn node_mut(&mut self, id: WorkId) -> &mut WorkNode {
        self.get_mut(id)
            .unwrap_or_else(|| panic!("work node {id} was released"))
    }

    /// Number of live nodes across both trees.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn children(&self, id: WorkId) -> Children<'_> {
        Children {
            tree: self,
            next: self.get(id).and_then(|node| node.first_child),
        }
    }

    /// Depth-first pre-order walk of `root` and its descendants.
    pub fn subtree(&self, root: WorkId) -> Subtree<'_> {
        Subtree {
            tree: self,
            stack: vec![root],
        }
    }

    /// Nearest strict ancestor of `id` that owns a host handle.
    pub(crate) fn host_parent(&self, id: WorkId) -> Option<HostHandle> {
        let mut cursor = self.node(id).parent;
        while let Some(current) = cursor {
            let node = self.node(current);
            if node.host.is_some() {
                return node.host;
            }
            cursor = node.parent;
        }
        None
    }

    /// Topmost host handles at or below `id`: `id`'s own handle if it has one,
    /// otherwise the handles of the nearest host-owning descendants.
    pub(crate) fn host_roots(&self, id: WorkId) -> Vec<HostHandle> {
        let mut handles = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node(current);
            if let Some(handle) = node.host {
                handles.push(handle);
                continue;
            }
            let mut children: Vec<WorkId> = self.children(current).collect();
            children.reverse();
            stack.extend(children);
        }
        handles
    }

    pub fn dump(&self, root: WorkId) -> String {
        let mut output = String::new();
        self.dump_node(&mut output, root, 0);
        output
    }

    fn dump_node(&self, output: &mut String, id: WorkId, depth: usize) {
        use std::fmt::Write as _;
        let indent = "  ".repeat(depth);
        let Some(node) = self.get(id) else {
            let _ = writeln!(output, "{indent}{id} (released)");
            return;
        };
        let label = match &node.kind {
            WorkKind::Root => "root".to_owned(),
            WorkKind::Host(tag) => tag.to_string(),
            WorkKind::Text => "#text".to_owned(),
            WorkKind::Component(component) => format!("<{}>", component.name()),
        };
        let _ = writeln!(output, "{indent}{id} {label} {:?}", node.tag);
        for child in self.children(id) {
            self.dump_node(output, child, depth + 1);
        }
    }
}

impl fmt::Debug for WorkTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkTree")
            .field("live", &self.len())
            .field("capacity", &self.nodes.len())
            .finish()
    }
}

pub struct Children<'a> {
    tree: &'a WorkTree,
    next: Option<WorkId>,
}

impl Iterator for Children<'_> {
    type Item = WorkId;

    fn next(&mut self) -> Option<WorkId> {
        let current = self.next?;
        self.next = self.tree.get(current).and_then(|node| node.next_sibling);
        Some(current)
    }
}

pub struct Subtree<'a> {
    tree: &'a WorkTree,
    stack: Vec<WorkId>,
}

impl Iterator for Subtree<'_> {
    type Item = WorkId;

    fn next(&mut self) -> Option<WorkId> {
        let current = self.stack.pop()?;
        let start = self.stack.len();
        self.stack.extend(self.tree.children(current));
        self.stack[start..].reverse();
        Some(current)
    }
}

#[cfg(test)]
#[path = "tests/work_tests.rs"]
mod tests;
