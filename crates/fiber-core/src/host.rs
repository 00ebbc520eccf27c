//! The host tree the engine renders into.
//!
//! The engine never touches a concrete tree; it drives a [`Host`] through
//! opaque [`HostHandle`]s. [`MemoryHost`] is the in-memory implementation used
//! by tests, benchmarks and headless tooling. It records every call the engine
//! makes as a [`HostOp`].

use std::fmt::Write as _;

use indexmap::IndexMap;

use crate::collections::HashMap;
use crate::element::{AttrValue, Listener, TEXT_VALUE};
use crate::error::HostError;

pub type HostHandle = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostKind<'a> {
    Element(&'a str),
    Text,
}

/// Mutation interface of the host tree.
///
/// Errors propagate out of the slice that issued the call and abort the
/// current commit. The engine does not retry or roll back.
pub trait Host {
    /// Allocate a detached node for a host element or a text element.
    fn create_node(&mut self, kind: HostKind<'_>) -> Result<HostHandle, HostError>;
    fn append_child(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError>;
    fn remove_child(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError>;
    fn set_attribute(
        &mut self,
        handle: HostHandle,
        key: &str,
        value: &AttrValue,
    ) -> Result<(), HostError>;
    fn remove_attribute(&mut self, handle: HostHandle, key: &str) -> Result<(), HostError>;
    fn add_event_listener(
        &mut self,
        handle: HostHandle,
        event: &str,
        listener: &Listener,
    ) -> Result<(), HostError>;
    fn remove_event_listener(
        &mut self,
        handle: HostHandle,
        event: &str,
        listener: &Listener,
    ) -> Result<(), HostError>;
}

/// One recorded host call.
#[derive(Clone, Debug, PartialEq)]
pub enum HostOp {
    Create { handle: HostHandle, kind: String },
    Append { parent: HostHandle, child: HostHandle },
    Remove { parent: HostHandle, child: HostHandle },
    SetAttribute { handle: HostHandle, key: String, value: AttrValue },
    RemoveAttribute { handle: HostHandle, key: String },
    AddListener { handle: HostHandle, event: String },
    RemoveListener { handle: HostHandle, event: String },
}

impl HostOp {
    /// Whether the op changes the attached tree shape or a node's contents.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, HostOp::Create { .. })
    }
}

#[derive(Debug)]
pub struct MemoryNode {
    kind: String,
    is_text: bool,
    attributes: IndexMap<String, AttrValue>,
    listeners: HashMap<String, Vec<Listener>>,
    children: Vec<HostHandle>,
    parent: Option<HostHandle>,
}

impl MemoryNode {
    fn new(kind: String, is_text: bool) -> Self {
        Self {
            kind,
            is_text,
            attributes: IndexMap::new(),
            listeners: HashMap::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn is_text(&self) -> bool {
        self.is_text
    }

    pub fn attribute(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.attributes.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn children(&self) -> &[HostHandle] {
        &self.children
    }

    pub fn parent(&self) -> Option<HostHandle> {
        self.parent
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, Vec::len)
    }
}

#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: Vec<MemoryNode>,
    ops: Vec<HostOp>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node to render into. Not recorded as an engine op.
    pub fn create_container(&mut self, tag: &str) -> HostHandle {
        let handle = self.nodes.len();
        self.nodes.push(MemoryNode::new(tag.to_owned(), false));
        handle
    }

    pub fn node(&self, handle: HostHandle) -> Option<&MemoryNode> {
        self.nodes.get(handle)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn children(&self, handle: HostHandle) -> &[HostHandle] {
        self.nodes
            .get(handle)
            .map_or(&[][..], |node| node.children.as_slice())
    }

    /// Concatenated text of every text node under `handle`, in document order.
    pub fn text_content(&self, handle: HostHandle) -> String {
        let mut output = String::new();
        self.collect_text(handle, &mut output);
        output
    }

    fn collect_text(&self, handle: HostHandle, output: &mut String) {
        let Some(node) = self.nodes.get(handle) else {
            return;
        };
        if node.is_text {
            if let Some(value) = node.attributes.get(TEXT_VALUE) {
                let _ = write!(output, "{value}");
            }
        }
        for &child in &node.children {
            self.collect_text(child, output);
        }
    }

    /// First node under `root` (inclusive, depth-first) whose attribute `key`
    /// displays as `value`.
    pub fn find_by_attribute(
        &self,
        root: HostHandle,
        key: &str,
        value: &str,
    ) -> Option<HostHandle> {
        let node = self.nodes.get(root)?;
        if node
            .attributes
            .get(key)
            .is_some_and(|found| found.to_string() == value)
        {
            return Some(root);
        }
        node.children
            .iter()
            .find_map(|&child| self.find_by_attribute(child, key, value))
    }

    /// Invoke every listener bound to `event` on `handle`; returns how many ran.
    pub fn dispatch(&self, handle: HostHandle, event: &str) -> usize {
        let listeners: Vec<Listener> = self
            .nodes
            .get(handle)
            .and_then(|node| node.listeners.get(event))
            .cloned()
            .unwrap_or_default();
        for listener in &listeners {
            listener.call();
        }
        listeners.len()
    }

    pub fn dump_tree(&self, root: HostHandle) -> String {
        let mut output = String::new();
        self.dump_node(&mut output, root, 0);
        output
    }

    fn dump_node(&self, output: &mut String, handle: HostHandle, depth: usize) {
        let indent = "  ".repeat(depth);
        let Some(node) = self.nodes.get(handle) else {
            let _ = writeln!(output, "{indent}[{handle}] (missing)");
            return;
        };
        if node.is_text {
            let value = node
                .attributes
                .get(TEXT_VALUE)
                .map(ToString::to_string)
                .unwrap_or_default();
            let _ = writeln!(output, "{indent}{value:?}");
            return;
        }
        let _ = write!(output, "{indent}<{}", node.kind);
        for (key, value) in &node.attributes {
            if value.as_listener().is_none() {
                let _ = write!(output, " {key}={value:?}");
            }
        }
        let _ = writeln!(output, ">");
        for &child in &node.children {
            self.dump_node(output, child, depth + 1);
        }
    }

    fn node_mut(&mut self, handle: HostHandle) -> Result<&mut MemoryNode, HostError> {
        self.nodes
            .get_mut(handle)
            .ok_or(HostError::Missing { handle })
    }

    fn detach(&mut self, child: HostHandle) {
        let Some(parent) = self.nodes.get(child).and_then(|node| node.parent) else {
            return;
        };
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.retain(|&handle| handle != child);
        }
        if let Some(child_node) = self.nodes.get_mut(child) {
            child_node.parent = None;
        }
    }
}

impl Host for MemoryHost {
    fn create_node(&mut self, kind: HostKind<'_>) -> Result<HostHandle, HostError> {
        let handle = self.nodes.len();
        let node = match kind {
            HostKind::Element(tag) => MemoryNode::new(tag.to_owned(), false),
            HostKind::Text => MemoryNode::new("#text".to_owned(), true),
        };
        self.ops.push(HostOp::Create {
            handle,
            kind: node.kind.clone(),
        });
        self.nodes.push(node);
        Ok(handle)
    }

    fn append_child(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError> {
        self.node_mut(parent)?;
        self.node_mut(child)?;
        // Appending an attached node moves it, as a document tree would.
        self.detach(child);
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        self.ops.push(HostOp::Append { parent, child });
        Ok(())
    }

    fn remove_child(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError> {
        let parent_node = self.node_mut(parent)?;
        let Some(position) = parent_node.children.iter().position(|&h| h == child) else {
            return Err(HostError::NotAChild { parent, child });
        };
        parent_node.children.remove(position);
        self.node_mut(child)?.parent = None;
        self.ops.push(HostOp::Remove { parent, child });
        Ok(())
    }

    fn set_attribute(
        &mut self,
        handle: HostHandle,
        key: &str,
        value: &AttrValue,
    ) -> Result<(), HostError> {
        self.node_mut(handle)?
            .attributes
            .insert(key.to_owned(), value.clone());
        self.ops.push(HostOp::SetAttribute {
            handle,
            key: key.to_owned(),
            value: value.clone(),
        });
        Ok(())
    }

    fn remove_attribute(&mut self, handle: HostHandle, key: &str) -> Result<(), HostError> {
        self.node_mut(handle)?.attributes.shift_remove(key);
        self.ops.push(HostOp::RemoveAttribute {
            handle,
            key: key.to_owned(),
        });
        Ok(())
    }

    fn add_event_listener(
        &mut self,
        handle: HostHandle,
        event: &str,
        listener: &Listener,
    ) -> Result<(), HostError> {
        self.node_mut(handle)?
            .listeners
            .entry(event.to_owned())
            .or_default()
            .push(listener.clone());
        self.ops.push(HostOp::AddListener {
            handle,
            event: event.to_owned(),
        });
        Ok(())
    }

    fn remove_event_listener(
        &mut self,
        handle: HostHandle,
        event: &str,
        listener: &Listener,
    ) -> Result<(), HostError> {
        if let Some(bound) = self.node_mut(handle)?.listeners.get_mut(event) {
            bound.retain(|existing| existing != listener);
        }
        self.ops.push(HostOp::RemoveListener {
            handle,
            event: event.to_owned(),
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/host_tests.rs"]
mod tests;
