use std::{
    cell::RefCell,
    mem::take,
    rc::{Rc, Weak},
};

use parse_display::Display;
use slabmap::SlabMap;

use crate::{core::NotifyContext, Error, Subscription, Value};

mod map;
mod vec;

pub use map::*;
pub use vec::*;

/// Receiver of change notifications from an observed collection.
pub(crate) trait CollectionSink: 'static {
    fn notify(self: Rc<Self>, nc: &mut NotifyContext);
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub(crate) struct BindKey(usize);

struct SinkBinding {
    sink: Weak<dyn CollectionSink>,
    is_dirty: bool,
}

/// Listener list of an observed collection.
///
/// A mutation marks each binding dirty and wakes its sink.
/// A binding becomes clean again when its owner reads the collection.
#[derive(Default)]
pub(crate) struct SinkBindings(SlabMap<SinkBinding>);

impl SinkBindings {
    pub fn new() -> Self {
        Self(SlabMap::new())
    }
    pub fn bind(&mut self, sink: Weak<dyn CollectionSink>) -> BindKey {
        BindKey(self.0.insert(SinkBinding {
            sink,
            is_dirty: false,
        }))
    }
    pub fn unbind(&mut self, key: BindKey) {
        self.0.remove(key.0);
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn take_dirty(&mut self, key: BindKey) -> bool {
        self.0
            .get_mut(key.0)
            .is_some_and(|binding| take(&mut binding.is_dirty))
    }
    /// Marks every binding dirty and returns the live sinks.
    ///
    /// Sinks that are already dirty are returned too. Requests are deduplicated by the render queue.
    fn mark_dirty(&mut self) -> Vec<Rc<dyn CollectionSink>> {
        self.0.optimize();
        self.0
            .values_mut()
            .filter_map(|binding| {
                binding.is_dirty = true;
                binding.sink.upgrade()
            })
            .collect()
    }
}

/// Notifies the sinks of `bindings`.
///
/// No borrow of the collection is held while the sinks run.
pub(crate) fn notify_sinks(bindings: &RefCell<SinkBindings>, nc: &mut NotifyContext) {
    let sinks = bindings.borrow_mut().mark_dirty();
    for sink in sinks {
        sink.notify(nc);
    }
}

/// Shape of a collection, decided once when a binding is established.
#[derive(Debug, Display, Clone, Copy, Eq, PartialEq, Hash)]
pub enum CollectionKind {
    Sequence,
    KeyedMap,
}

/// A collection source bound to a repeat region.
#[derive(Clone, Debug)]
pub enum Collection {
    Vec(StateVec),
    Map(StateMap),
}

impl Collection {
    /// Checks the shape of `value`.
    pub fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Vec(vec) => Ok(Collection::Vec(vec.clone())),
            Value::Map(map) => Ok(Collection::Map(map.clone())),
            value => Err(Error::UnsupportedCollection(value.type_name())),
        }
    }
    pub fn kind(&self) -> CollectionKind {
        match self {
            Collection::Vec(_) => CollectionKind::Sequence,
            Collection::Map(_) => CollectionKind::KeyedMap,
        }
    }
    pub fn len(&self) -> usize {
        match self {
            Collection::Vec(vec) => vec.len(),
            Collection::Map(map) => map.len(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Collection::Vec(a), Collection::Vec(b)) => a.ptr_eq(b),
            (Collection::Map(a), Collection::Map(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub(crate) fn bind(&self, sink: Weak<dyn CollectionSink>) -> CollectionBinding {
        let key = match self {
            Collection::Vec(vec) => vec.bind(sink),
            Collection::Map(map) => map.bind(sink),
        };
        let this = self.clone();
        CollectionBinding {
            collection: self.clone(),
            key,
            _unbind: Subscription::from_fn(move || match this {
                Collection::Vec(vec) => vec.unbind(key),
                Collection::Map(map) => map.unbind(key),
            }),
        }
    }
}

/// Registration of one sink in a collection's listener list.
///
/// Dropping it unregisters the sink.
pub(crate) struct CollectionBinding {
    collection: Collection,
    key: BindKey,
    _unbind: Subscription,
}

impl CollectionBinding {
    pub fn collection(&self) -> &Collection {
        &self.collection
    }
    pub fn take_dirty(&self) -> bool {
        match &self.collection {
            Collection::Vec(vec) => vec.take_dirty(self.key),
            Collection::Map(map) => map.take_dirty(self.key),
        }
    }

    /// Marks this binding clean and returns the current contents.
    pub fn read(&self) -> Snapshot {
        self.take_dirty();
        match &self.collection {
            Collection::Vec(vec) => Snapshot::Sequence(vec.to_vec()),
            Collection::Map(map) => Snapshot::KeyedMap(map.entries()),
        }
    }
}

/// Contents of a collection at the time a region reads it.
#[derive(Clone, Debug)]
pub(crate) enum Snapshot {
    Sequence(Vec<Value>),
    KeyedMap(Vec<(Rc<str>, Value)>),
}

impl Snapshot {
    pub fn kind(&self) -> CollectionKind {
        match self {
            Snapshot::Sequence(_) => CollectionKind::Sequence,
            Snapshot::KeyedMap(_) => CollectionKind::KeyedMap,
        }
    }
    pub fn len(&self) -> usize {
        match self {
            Snapshot::Sequence(values) => values.len(),
            Snapshot::KeyedMap(entries) => entries.len(),
        }
    }
}
