use std::{
    collections::BTreeSet,
    fmt::{self, Debug},
    rc::Rc,
};

use crate::Value;


/// Names of the locals defined for each repeated item.
pub mod names {
    pub const ITEM: &str = "item";
    pub const INDEX: &str = "index";
    pub const LENGTH: &str = "length";
    pub const FIRST: &str = "first";
    pub const LAST: &str = "last";
    pub const ODD: &str = "odd";
    pub const EVEN: &str = "even";
    pub const NUMBER: &str = "number";
    pub const KEY: &str = "key";
}

/// Immutable layered mapping from names to values.
///
/// A layer shadows the names of its parents and inherits the rest.
/// Pushing a layer never changes the parent, so a context handed to a binding stays consistent.
#[derive(Clone, Default)]
pub struct Locals(Option<Rc<Layer>>);

struct Layer {
    parent: Locals,
    entries: Vec<(Rc<str>, Value)>,
}

impl Locals {
    pub fn new() -> Self {
        Self(None)
    }
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        Self::new().push(entries)
    }

    /// Returns a new context with `entries` layered over this one.
    pub fn push<K, V>(&self, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        Self(Some(Rc::new(Layer {
            parent: self.clone(),
            entries: entries
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        })))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        let mut locals = self;
        while let Some(layer) = &locals.0 {
            if let Some(value) = layer.get(name) {
                return Some(value);
            }
            locals = &layer.parent;
        }
        None
    }
    /// Looks up `name` in the top layer only.
    pub fn get_own(&self, name: &str) -> Option<&Value> {
        self.0.as_ref()?.get(name)
    }
    pub fn parent(&self) -> Option<&Locals> {
        Some(&self.0.as_ref()?.parent)
    }
    /// Entries of the top layer.
    pub fn own(&self) -> &[(Rc<str>, Value)] {
        match &self.0 {
            Some(layer) => &layer.entries,
            None => &[],
        }
    }
    /// Visible names, nearest layer first.
    pub fn names(&self) -> Vec<Rc<str>> {
        let mut names: Vec<Rc<str>> = Vec::new();
        let mut locals = self;
        while let Some(layer) = &locals.0 {
            for (name, _) in &layer.entries {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            locals = &layer.parent;
        }
        names
    }
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Names of the top layer whose value differs from the top layer of `old`.
    pub fn changed_own(&self, old: &Locals) -> Changed {
        let mut changed = Changed::none();
        for (name, value) in self.own() {
            if old.get_own(name) != Some(value) {
                changed.insert(name.clone());
            }
        }
        for (name, _) in old.own() {
            if self.get_own(name).is_none() {
                changed.insert(name.clone());
            }
        }
        changed
    }
}
impl Layer {
    fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| &**n == name)
            .map(|(_, value)| value)
    }
}
impl Debug for Locals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_map();
        for name in self.names() {
            d.entry(&name, &self.get(&name));
        }
        d.finish()
    }
}

/// Locals of one repeated item.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemLocals {
    pub item: Value,
    pub index: usize,
    pub length: usize,
    pub key: Rc<str>,
}

impl ItemLocals {
    /// Entries of the item layer, with the item exposed as `item_name`.
    pub fn entries(&self, item_name: &Rc<str>) -> Vec<(Rc<str>, Value)> {
        let number = self.index + 1;
        vec![
            (item_name.clone(), self.item.clone()),
            (names::INDEX.into(), self.index.into()),
            (names::LENGTH.into(), self.length.into()),
            (names::FIRST.into(), (self.index == 0).into()),
            (names::LAST.into(), (number == self.length).into()),
            (names::ODD.into(), (number % 2 == 1).into()),
            (names::EVEN.into(), (number % 2 == 0).into()),
            (names::NUMBER.into(), number.into()),
            (names::KEY.into(), Value::Str(self.key.clone())),
        ]
    }
}

/// Names whose value changed since the previous pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Changed {
    /// Everything is new, as on the first pass of an instance.
    All,
    Names(BTreeSet<Rc<str>>),
}

impl Changed {
    pub fn none() -> Self {
        Changed::Names(BTreeSet::new())
    }
    pub fn is_empty(&self) -> bool {
        match self {
            Changed::All => false,
            Changed::Names(names) => names.is_empty(),
        }
    }
    pub fn contains(&self, name: &str) -> bool {
        match self {
            Changed::All => true,
            Changed::Names(names) => names.contains(name),
        }
    }
    /// Returns `true` if any of `reads` changed.
    pub fn affects(&self, reads: &[Rc<str>]) -> bool {
        reads.iter().any(|name| self.contains(name))
    }
    pub fn insert(&mut self, name: Rc<str>) {
        if let Changed::Names(names) = self {
            names.insert(name);
        }
    }
    pub fn extend(&mut self, other: Changed) {
        match other {
            Changed::All => *self = Changed::All,
            Changed::Names(other) => {
                for name in other {
                    self.insert(name);
                }
            }
        }
    }
    /// Removes the names redefined by the top layer of `locals`.
    pub fn shadowed_by(&self, locals: &Locals) -> Changed {
        match self {
            Changed::All => Changed::All,
            Changed::Names(names) => Changed::Names(
                names
                    .iter()
                    .filter(|name| locals.get_own(name).is_none())
                    .cloned()
                    .collect(),
            ),
        }
    }
}
