use std::{
    cell::{Ref, RefCell, RefMut},
    mem::ManuallyDrop,
    cmp::Ordering,
    fmt::{self, Debug},
    ops::{Index, RangeBounds},
    rc::{Rc, Weak},
};

use derive_ex::Ex;
use serde::{Deserialize, Serialize};

use crate::{
    core::NotifyContext,
    utils::to_range,
    ActionContext, Value,
};

use super::{notify_sinks, BindKey, CollectionSink, SinkBindings};


/// Ordered sequence of values whose mutations are observed.
///
/// Reads have no side effects.
/// Mutations go through [`borrow_mut`](Self::borrow_mut), and notify bound repeat regions once when the borrow ends.
#[derive(Ex)]
#[derive_ex(Clone, Default)]
#[default(Self::new())]
pub struct StateVec(Rc<RawStateVec>);

impl StateVec {
    pub fn new() -> Self {
        Self::from_values(Vec::new())
    }
    pub fn from_values(items: Vec<Value>) -> Self {
        Self(Rc::new(RawStateVec {
            items: RefCell::new(items),
            sinks: RefCell::new(SinkBindings::new()),
        }))
    }

    pub fn len(&self) -> usize {
        self.0.items.borrow().len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.items.borrow().get(index).cloned()
    }
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.items.borrow().clone()
    }

    /// Borrows the items.
    pub fn borrow(&self) -> Ref<'_, [Value]> {
        Ref::map(self.0.items.borrow(), |items| items.as_slice())
    }

    /// Mutably borrows the items.
    ///
    /// When the borrow ends after at least one mutation, bound repeat regions are notified.
    pub fn borrow_mut<'a>(&'a self, ac: &'a mut ActionContext) -> ItemsMut<'a> {
        ItemsMut {
            items: ManuallyDrop::new(self.0.items.borrow_mut()),
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

    /// Number of repeat regions currently bound to this sequence.
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
impl Debug for StateVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.items.try_borrow() {
            Ok(items) => f.debug_list().entries(items.iter()).finish(),
            Err(_) => write!(f, "<borrowed>"),
        }
    }
}
impl<T: Into<Value>> FromIterator<T> for StateVec {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_values(iter.into_iter().map(Into::into).collect())
    }
}
impl Serialize for StateVec {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.0.items.borrow().iter())
    }
}
impl<'de> Deserialize<'de> for StateVec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Vec::<Value>::deserialize(deserializer).map(Self::from_values)
    }
}

struct RawStateVec {
    items: RefCell<Vec<Value>>,
    sinks: RefCell<SinkBindings>,
}

/// Mutable view of a [`StateVec`].
pub struct ItemsMut<'a> {
    items: ManuallyDrop<RefMut<'a, Vec<Value>>>,
    node: &'a RawStateVec,
    nc: &'a mut NotifyContext,
    is_dirty: bool,
}

impl ItemsMut<'_> {
    pub fn len(&self) -> usize {
        self.items.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.items.push(value.into());
        self.is_dirty = true;
    }
    pub fn pop(&mut self) -> Option<Value> {
        let value = self.items.pop();
        self.is_dirty |= value.is_some();
        value
    }
    /// Removes the first item.
    pub fn shift(&mut self) -> Option<Value> {
        if self.items.is_empty() {
            return None;
        }
        Some(self.remove(0))
    }
    /// Inserts an item at the front.
    pub fn unshift(&mut self, value: impl Into<Value>) {
        self.insert(0, value);
    }
    pub fn insert(&mut self, index: usize, value: impl Into<Value>) {
        self.items.insert(index, value.into());
        self.is_dirty = true;
    }
    pub fn remove(&mut self, index: usize) -> Value {
        let value = self.items.remove(index);
        self.is_dirty = true;
        value
    }
    pub fn set(&mut self, index: usize, value: impl Into<Value>) -> Value {
        let value = std::mem::replace(&mut self.items[index], value.into());
        self.is_dirty = true;
        value
    }
    pub fn swap(&mut self, index0: usize, index1: usize) {
        if index0 == index1 {
            return;
        }
        self.items.swap(index0, index1);
        self.is_dirty = true;
    }

    /// Removes the items in `range` and inserts `values` in their place.
    ///
    /// Returns the removed items.
    pub fn splice(
        &mut self,
        range: impl RangeBounds<usize>,
        values: impl IntoIterator<Item = Value>,
    ) -> Vec<Value> {
        let range = to_range(range, self.len());
        let removed: Vec<_> = self.items.splice(range, values).collect();
        self.is_dirty = true;
        removed
    }
    pub fn extend(&mut self, values: impl IntoIterator<Item = impl Into<Value>>) {
        let len = self.len();
        self.items.extend(values.into_iter().map(Into::into));
        self.is_dirty |= self.len() != len;
    }

    /// Sorts the items with [`Value::total_cmp`].
    pub fn sort(&mut self) {
        self.sort_by(Value::total_cmp)
    }
    pub fn sort_by(&mut self, mut compare: impl FnMut(&Value, &Value) -> Ordering) {
        if self.items.is_sorted_by(|a, b| compare(a, b) != Ordering::Greater) {
            return;
        }
        self.items.sort_by(compare);
        self.is_dirty = true;
    }
    pub fn sort_by_key<K: Ord>(&mut self, mut key: impl FnMut(&Value) -> K) {
        self.sort_by(|a, b| key(a).cmp(&key(b)))
    }
    pub fn reverse(&mut self) {
        if self.len() < 2 {
            return;
        }
        self.items.reverse();
        self.is_dirty = true;
    }

    pub fn truncate(&mut self, len: usize) {
        if len < self.len() {
            self.items.truncate(len);
            self.is_dirty = true;
        }
    }
    /// Changes the length, padding with [`Value::Null`] when growing.
    pub fn set_len(&mut self, len: usize) {
        if len != self.len() {
            self.items.resize(len, Value::Null);
            self.is_dirty = true;
        }
    }
    pub fn clear(&mut self) {
        self.truncate(0);
    }
}
impl Drop for ItemsMut<'_> {
    fn drop(&mut self) {
        // SAFETY: `items` is not used after this point.
        unsafe { ManuallyDrop::drop(&mut self.items) };
        if self.is_dirty {
            notify_sinks(&self.node.sinks, self.nc);
        }
    }
}
impl Index<usize> for ItemsMut<'_> {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        &self.items[index]
    }
}
impl<'a> IntoIterator for &'a ItemsMut<'_> {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
impl Debug for ItemsMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
