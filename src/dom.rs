//! Retained node tree used as the mount point of components.
//!
//! The tree keeps the subset of the DOM that rendering needs:
//! parent and child links, text, attributes, properties, event listeners,
//! and the locals stamped on the root nodes of repeated fragments.

use std::{
    cell::{Cell, RefCell},
    fmt::{self, Debug},
    rc::{Rc, Weak},
};

use indexmap::IndexMap;
use slabmap::SlabMap;

use crate::{Callback, Locals, Subscription, Value};


#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Fragment,
    Element(Rc<str>),
    Text,
    Comment,
}

/// Event passed to listeners by [`Node::dispatch`].
#[derive(Debug, Clone)]
pub struct Event {
    pub name: Rc<str>,
    pub target: Node,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct ListenerId(usize);

/// Shared handle to a node.
///
/// Equality is identity.
#[derive(Clone)]
pub struct Node(Rc<RawNode>);

struct RawNode {
    kind: NodeKind,
    parent: RefCell<Weak<RawNode>>,
    children: RefCell<Vec<Node>>,
    data: RefCell<String>,
    attributes: RefCell<IndexMap<Rc<str>, Rc<str>>>,
    properties: RefCell<IndexMap<Rc<str>, Value>>,
    listeners: RefCell<SlabMap<(Rc<str>, Callback)>>,
    locals: RefCell<Locals>,
    child_list_version: Cell<u64>,
}

impl Node {
    fn new(kind: NodeKind, data: &str) -> Self {
        Self(Rc::new(RawNode {
            kind,
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            data: RefCell::new(data.to_string()),
            attributes: RefCell::new(IndexMap::new()),
            properties: RefCell::new(IndexMap::new()),
            listeners: RefCell::new(SlabMap::new()),
            locals: RefCell::new(Locals::new()),
            child_list_version: Cell::new(0),
        }))
    }
    pub fn document() -> Self {
        Self::new(NodeKind::Document, "")
    }
    pub fn fragment() -> Self {
        Self::new(NodeKind::Fragment, "")
    }
    pub fn element(tag: &str) -> Self {
        Self::new(NodeKind::Element(tag.into()), "")
    }
    pub fn text(data: &str) -> Self {
        Self::new(NodeKind::Text, data)
    }
    pub fn comment(data: &str) -> Self {
        Self::new(NodeKind::Comment, data)
    }

    pub fn with_attribute(self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }
    pub fn with_child(self, child: Node) -> Self {
        self.append_child(&child);
        self
    }
    pub fn with_text(self, text: &str) -> Self {
        self.append_child(&Node::text(text));
        self
    }

    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }
    pub fn tag(&self) -> Option<&str> {
        match &self.0.kind {
            NodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }
    pub fn is_element(&self) -> bool {
        matches!(self.0.kind, NodeKind::Element(_))
    }
    pub fn is_comment(&self) -> bool {
        self.0.kind == NodeKind::Comment
    }
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn parent(&self) -> Option<Node> {
        self.0.parent.borrow().upgrade().map(Node)
    }
    pub fn children(&self) -> Vec<Node> {
        self.0.children.borrow().clone()
    }
    pub fn child(&self, index: usize) -> Option<Node> {
        self.0.children.borrow().get(index).cloned()
    }
    pub fn child_count(&self) -> usize {
        self.0.children.borrow().len()
    }
    /// Element children only.
    pub fn element_children(&self) -> Vec<Node> {
        self.0
            .children
            .borrow()
            .iter()
            .filter(|child| child.is_element())
            .cloned()
            .collect()
    }
    pub fn next_sibling(&self) -> Option<Node> {
        let parent = self.parent()?;
        let index = parent.index_of(self)?;
        parent.child(index + 1)
    }
    fn index_of(&self, child: &Node) -> Option<usize> {
        self.0
            .children
            .borrow()
            .iter()
            .position(|c| c.ptr_eq(child))
    }

    /// Number of changes made to the child list of this node.
    pub fn child_list_version(&self) -> u64 {
        self.0.child_list_version.get()
    }
    fn bump_version(&self) {
        self.0
            .child_list_version
            .set(self.0.child_list_version.get() + 1);
    }

    pub fn root(&self) -> Node {
        let mut node = self.clone();
        while let Some(parent) = node.parent() {
            node = parent;
        }
        node
    }
    /// Returns `true` if the node is attached to a document.
    pub fn is_connected(&self) -> bool {
        self.root().0.kind == NodeKind::Document
    }

    /// Appends `child`, detaching it from its current parent.
    ///
    /// Appending a fragment moves the fragment's children.
    pub fn append_child(&self, child: &Node) {
        self.insert_before(child, None);
    }

    /// Inserts `child` before `reference`, or at the end if `reference` is `None`.
    ///
    /// Panics if `reference` is not a child of this node.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) {
        if child.0.kind == NodeKind::Fragment {
            for c in child.children() {
                self.insert_before(&c, reference);
            }
            return;
        }
        if reference.is_some_and(|r| r.ptr_eq(child)) {
            return;
        }
        child.remove();
        let index = match reference {
            Some(reference) => self
                .index_of(reference)
                .expect("reference node is not a child of this node"),
            None => self.child_count(),
        };
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        self.0.children.borrow_mut().insert(index, child.clone());
        self.bump_version();
    }

    /// Inserts `nodes` right after this node, in order.
    ///
    /// Does nothing if this node has no parent.
    pub fn after(&self, nodes: &[Node]) {
        let Some(parent) = self.parent() else {
            return;
        };
        let next = self.next_sibling_excluding(nodes);
        for node in nodes {
            parent.insert_before(node, next.as_ref());
        }
    }
    fn next_sibling_excluding(&self, nodes: &[Node]) -> Option<Node> {
        let mut next = self.next_sibling();
        while let Some(n) = &next {
            if !nodes.iter().any(|node| node.ptr_eq(n)) {
                break;
            }
            next = n.next_sibling();
        }
        next
    }

    /// Detaches this node from its parent.
    pub fn remove(&self) {
        let Some(parent) = self.parent() else {
            return;
        };
        if let Some(index) = parent.index_of(self) {
            parent.0.children.borrow_mut().remove(index);
            parent.bump_version();
        }
        *self.0.parent.borrow_mut() = Weak::new();
    }

    /// Concatenated text of this node and its descendants.
    ///
    /// Comments contribute only when asked for directly.
    pub fn text_content(&self) -> String {
        match self.0.kind {
            NodeKind::Text | NodeKind::Comment => self.0.data.borrow().clone(),
            _ => {
                let mut s = String::new();
                self.collect_text(&mut s);
                s
            }
        }
    }
    fn collect_text(&self, s: &mut String) {
        for child in self.0.children.borrow().iter() {
            match child.0.kind {
                NodeKind::Text => s.push_str(&child.0.data.borrow()),
                NodeKind::Comment => {}
                _ => child.collect_text(s),
            }
        }
    }
    /// Replaces the data of a text node, or the children of any other node with one text node.
    pub fn set_text_content(&self, text: &str) {
        match self.0.kind {
            NodeKind::Text | NodeKind::Comment => *self.0.data.borrow_mut() = text.to_string(),
            _ => {
                for child in self.children() {
                    child.remove();
                }
                if !text.is_empty() {
                    self.append_child(&Node::text(text));
                }
            }
        }
    }

    pub fn attribute(&self, name: &str) -> Option<Rc<str>> {
        self.0.attributes.borrow().get(name).cloned()
    }
    pub fn has_attribute(&self, name: &str) -> bool {
        self.0.attributes.borrow().contains_key(name)
    }
    pub fn set_attribute(&self, name: &str, value: &str) {
        self.0
            .attributes
            .borrow_mut()
            .insert(name.into(), value.into());
    }
    pub fn remove_attribute(&self, name: &str) {
        self.0.attributes.borrow_mut().shift_remove(name);
    }
    pub fn attributes(&self) -> Vec<(Rc<str>, Rc<str>)> {
        self.0
            .attributes
            .borrow()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub fn property(&self, name: &str) -> Option<Value> {
        self.0.properties.borrow().get(name).cloned()
    }
    pub fn set_property(&self, name: &str, value: Value) {
        self.0.properties.borrow_mut().insert(name.into(), value);
    }

    pub fn add_listener(&self, name: &str, callback: Callback) -> ListenerId {
        ListenerId(self.0.listeners.borrow_mut().insert((name.into(), callback)))
    }
    pub fn remove_listener(&self, id: ListenerId) {
        self.0.listeners.borrow_mut().remove(id.0);
    }
    /// Adds a listener that is removed when the returned subscription is dropped.
    pub fn subscribe(&self, name: &str, callback: Callback) -> Subscription {
        let id = self.add_listener(name, callback);
        let node = Rc::downgrade(&self.0);
        Subscription::from_fn(move || {
            if let Some(node) = node.upgrade() {
                Node(node).remove_listener(id);
            }
        })
    }
    pub fn listener_count(&self) -> usize {
        self.0.listeners.borrow().len()
    }
    /// Calls the listeners registered for `name` and returns how many were called.
    pub fn dispatch(&self, name: &str) -> usize {
        let callbacks: Vec<Callback> = self
            .0
            .listeners
            .borrow()
            .values()
            .filter(|(n, _)| &**n == name)
            .map(|(_, callback)| callback.clone())
            .collect();
        let event = Event {
            name: name.into(),
            target: self.clone(),
        };
        for callback in &callbacks {
            callback.call(&event);
        }
        callbacks.len()
    }

    /// Locals stamped on this node by the fragment that owns it.
    pub fn locals(&self) -> Locals {
        self.0.locals.borrow().clone()
    }
    pub(crate) fn set_locals(&self, locals: Locals) {
        *self.0.locals.borrow_mut() = locals;
    }

    /// Copies structure, text and attributes.
    ///
    /// Properties, listeners and locals are not copied.
    pub fn deep_clone(&self) -> Node {
        let node = Node::new(self.0.kind.clone(), &self.0.data.borrow());
        *node.0.attributes.borrow_mut() = self.0.attributes.borrow().clone();
        for child in self.0.children.borrow().iter() {
            node.append_child(&child.deep_clone());
        }
        node
    }

    /// Descendants in document order, excluding this node.
    pub fn descendants(&self) -> Vec<Node> {
        let mut nodes = Vec::new();
        self.collect_descendants(&mut nodes);
        nodes
    }
    fn collect_descendants(&self, nodes: &mut Vec<Node>) {
        for child in self.0.children.borrow().iter() {
            nodes.push(child.clone());
            child.collect_descendants(nodes);
        }
    }
    pub fn query_all(&self, f: impl Fn(&Node) -> bool) -> Vec<Node> {
        self.descendants().into_iter().filter(|n| f(n)).collect()
    }
}
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}
impl Eq for Node {}

impl Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            NodeKind::Document => write!(f, "#document")?,
            NodeKind::Fragment => write!(f, "#fragment")?,
            NodeKind::Element(tag) => {
                write!(f, "<{tag}")?;
                for (name, value) in self.0.attributes.borrow().iter() {
                    write!(f, " {name}=\"{value}\"")?;
                }
                write!(f, ">")?;
            }
            NodeKind::Text => return write!(f, "{:?}", self.0.data.borrow()),
            NodeKind::Comment => return write!(f, "<!--{}-->", self.0.data.borrow()),
        }
        let children = self.0.children.borrow();
        if !children.is_empty() {
            f.debug_list().entries(children.iter()).finish()?;
        }
        Ok(())
    }
}
