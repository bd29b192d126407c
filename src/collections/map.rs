use std::{
    cell::{Ref, RefCell, RefMut},
    mem::ManuallyDrop,
    fmt::{self, Debug},
    rc::{Rc, Weak},
};

use derive_ex::Ex;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{core::NotifyContext, ActionContext, Value};

use super::{notify_sinks, BindKey, CollectionSink, SinkBindings};

#[cfg(test)]
mod tests;

/// Keyed mapping from string keys to values, iterated in insertion order, whose mutations are observed.
#[derive(Ex)]
#[derive_ex(Clone, Default)]
#[default(Self::new())]
pub struct StateMap(Rc<RawStateMap>);

impl StateMap {
    pub fn new() -> Self {
        Self::from_entries(Vec::new())
    }
    pub fn from_entries(entries: impl IntoIterator<Item = (Rc<str>, Value)>) -> Self {
        Self(Rc::new(RawStateMap {
            entries: RefCell::new(entries.into_iter().collect()),
            sinks: RefCell::new(SinkBindings::new()),
        }))
    }

    pub fn len(&self) -> usize {
        self.0.entries.borrow().len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.entries.borrow().get(key).cloned()
    }
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.entries.borrow().contains_key(key)
    }
    pub fn keys(&self) -> Vec<Rc<str>> {
        self.0.entries.borrow().keys().cloned().collect()
    }
    pub fn entries(&self) -> Vec<(Rc<str>, Value)> {
        self.0
            .entries
            .borrow()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Borrows the entries.
    pub fn borrow(&self) -> Ref<'_, IndexMap<Rc<str>, Value>> {
        self.0.entries.borrow()
    }

    /// Mutably borrows the entries.
    ///
    /// When the borrow ends after at least one mutation, bound repeat regions are notified.
    pub fn borrow_mut<'a>(&'a self, ac: &'a mut ActionContext) -> EntriesMut<'a> {
        EntriesMut {
            entries: ManuallyDrop::new(self.0.entries.borrow_mut()),
            node: &self.0,
            nc: ac.nc(),
            is_dirty: false,
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
    pub(crate) fn as_ptr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }

    /// Number of repeat regions currently bound to this map.
    pub fn listener_count(&self) -> usize {
        self.0.sinks.borrow().len()
    }
    pub(crate) fn bind(&self, sink: Weak<dyn CollectionSink>) -> BindKey {
        self.0.sinks.borrow_mut().bind(sink)
    }
    pub(crate) fn unbind(&self, key: BindKey) {
        self.0.sinks.borrow_mut().unbind(key)
    }
    pub(crate) fn take_dirty(&self, key: BindKey) -> bool {
        self.0.sinks.borrow_mut().take_dirty(key)
    }
}
impl Debug for StateMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.entries.try_borrow() {
            Ok(entries) => f.debug_map().entries(entries.iter()).finish(),
            Err(_) => write!(f, "<borrowed>"),
        }
    }
}
impl<K: Into<Rc<str>>, V: Into<Value>> FromIterator<(K, V)> for StateMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_entries(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        )
    }
}
impl Serialize for StateMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_map(
            self.0
                .entries
                .borrow()
                .iter()
                .map(|(key, value)| (&**key, value)),
        )
    }
}
impl<'de> Deserialize<'de> for StateMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Map(map) => Ok(map),
            value => Err(serde::de::Error::custom(format_args!(
                "expected map, found {}",
                value.type_name()
            ))),
        }
    }
}

struct RawStateMap {
    entries: RefCell<IndexMap<Rc<str>, Value>>,
    sinks: RefCell<SinkBindings>,
}

/// Mutable view of a [`StateMap`].
pub struct EntriesMut<'a> {
    entries: ManuallyDrop<RefMut<'a, IndexMap<Rc<str>, Value>>>,
    node: &'a RawStateMap,
    nc: &'a mut NotifyContext,
    is_dirty: bool,
}

impl EntriesMut<'_> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Inserts or overwrites an entry.
    ///
    /// Overwriting keeps the entry at its position. New keys are appended.
    pub fn insert(&mut self, key: impl Into<Rc<str>>, value: impl Into<Value>) -> Option<Value> {
        self.is_dirty = true;
        self.entries.insert(key.into(), value.into())
    }
    /// Removes an entry, keeping the order of the others.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let value = self.entries.shift_remove(key);
        self.is_dirty |= value.is_some();
        value
    }
    pub fn retain(&mut self, mut f: impl FnMut(&str, &Value) -> bool) {
        let len = self.len();
        self.entries.retain(|key, value| f(key, value));
        self.is_dirty |= self.len() != len;
    }
    pub fn clear(&mut self) {
        self.is_dirty |= !self.entries.is_empty();
        self.entries.clear();
    }
}
impl Drop for EntriesMut<'_> {
    fn drop(&mut self) {
        // SAFETY: `entries` is not used after this point.
        unsafe { ManuallyDrop::drop(&mut self.entries) };
        if self.is_dirty {
            notify_sinks(&self.node.sinks, self.nc);
        }
    }
}
impl Debug for EntriesMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}
