use std::{
    cmp::Ordering,
    fmt::{self, Debug, Display},
    marker::PhantomData,
    rc::Rc,
};

use derive_ex::derive_ex;
use serde::{
    de::{MapAccess, SeqAccess, Visitor},
    Deserialize, Serialize,
};

use crate::{dom::Event, StateMap, StateVec};


/// Dynamic value held by component properties, collections and locals.
///
/// Primitives compare by value. Collections and callbacks compare by reference.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Vec(StateVec),
    Map(StateMap),
    Callback(Callback),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }
    pub fn as_vec(&self) -> Option<&StateVec> {
        match self {
            Value::Vec(value) => Some(value),
            _ => None,
        }
    }
    pub fn as_map(&self) -> Option<&StateMap> {
        match self {
            Value::Map(value) => Some(value),
            _ => None,
        }
    }
    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            Value::Callback(value) => Some(value),
            _ => None,
        }
    }

    /// Name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Vec(_) => "sequence",
            Value::Map(_) => "map",
            Value::Callback(_) => "callback",
        }
    }

    /// Identity of this value, consistent with `PartialEq` except that `NaN` matches itself.
    pub fn key(&self) -> ValueKey {
        match self {
            Value::Null => ValueKey::Null,
            Value::Bool(value) => ValueKey::Bool(*value),
            Value::Int(value) => ValueKey::Int(*value),
            Value::Float(value) => {
                let value = if *value == 0.0 { 0.0 } else { *value };
                ValueKey::Float(value.to_bits())
            }
            Value::Str(value) => ValueKey::Str(value.clone()),
            Value::Vec(value) => ValueKey::Ptr(value.as_ptr()),
            Value::Map(value) => ValueKey::Ptr(value.as_ptr()),
            Value::Callback(value) => ValueKey::Ptr(value.as_ptr()),
        }
    }

    /// Ordering used by [`ItemsMut::sort`](crate::ItemsMut::sort).
    ///
    /// Values of different kinds are ordered by kind, numbers compare numerically
    /// and strings compare lexicographically.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        fn rank(value: &Value) -> u8 {
            match value {
                Value::Null => 0,
                Value::Bool(_) => 1,
                Value::Int(_) | Value::Float(_) => 2,
                Value::Str(_) => 3,
                Value::Vec(_) => 4,
                Value::Map(_) => 5,
                Value::Callback(_) => 6,
            }
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => rank(a).cmp(&rank(b)),
            },
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Vec(a), Value::Vec(b)) => a.ptr_eq(b),
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b),
            (Value::Callback(a), Value::Callback(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(value) => Display::fmt(value, f),
            Value::Int(value) => Display::fmt(value, f),
            Value::Float(value) => Display::fmt(value, f),
            Value::Str(value) => Display::fmt(value, f),
            Value::Vec(value) => {
                for (index, item) in value.borrow().iter().enumerate() {
                    if index != 0 {
                        write!(f, ",")?;
                    }
                    Display::fmt(item, f)?;
                }
                Ok(())
            }
            Value::Map(_) => write!(f, "[object]"),
            Value::Callback(_) => write!(f, "[callback]"),
        }
    }
}
impl Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(value) => Debug::fmt(value, f),
            Value::Int(value) => Debug::fmt(value, f),
            Value::Float(value) => Debug::fmt(value, f),
            Value::Str(value) => Debug::fmt(value, f),
            Value::Vec(value) => Debug::fmt(value, f),
            Value::Map(value) => Debug::fmt(value, f),
            Value::Callback(value) => Debug::fmt(value, f),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}
impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}
impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}
impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Int(value as i64)
    }
}
impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}
impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.into())
    }
}
impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value.into())
    }
}
impl From<Rc<str>> for Value {
    fn from(value: Rc<str>) -> Self {
        Value::Str(value)
    }
}
impl From<StateVec> for Value {
    fn from(value: StateVec) -> Self {
        Value::Vec(value)
    }
}
impl From<StateMap> for Value {
    fn from(value: StateMap) -> Self {
        Value::Map(value)
    }
}
impl From<Callback> for Value {
    fn from(value: Callback) -> Self {
        Value::Callback(value)
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(value) => serializer.serialize_bool(*value),
            Value::Int(value) => serializer.serialize_i64(*value),
            Value::Float(value) => serializer.serialize_f64(*value),
            Value::Str(value) => serializer.serialize_str(value),
            Value::Vec(value) => value.serialize(serializer),
            Value::Map(value) => value.serialize(serializer),
            Value::Callback(_) => Err(serde::ser::Error::custom("callback")),
        }
    }
}
impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor(PhantomData))
    }
}

struct ValueVisitor<'de>(PhantomData<&'de ()>);

impl<'de> Visitor<'de> for ValueVisitor<'de> {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("any value")
    }
    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }
    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }
    fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Value::deserialize(deserializer)
    }
    fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }
    fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }
    fn visit_u64<E>(self, v: u64) -> Result<Value, E> {
        Ok(i64::try_from(v).map_or(Value::Float(v as f64), Value::Int))
    }
    fn visit_f64<E>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }
    fn visit_str<E>(self, v: &str) -> Result<Value, E> {
        Ok(Value::from(v))
    }
    fn visit_string<E>(self, v: String) -> Result<Value, E> {
        Ok(Value::from(v))
    }
    fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::new();
        while let Some(value) = seq.next_element()? {
            items.push(value);
        }
        Ok(Value::Vec(StateVec::from_values(items)))
    }
    fn visit_map<A>(self, mut map: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Vec::new();
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            entries.push((Rc::<str>::from(key), value));
        }
        Ok(Value::Map(StateMap::from_entries(entries)))
    }
}

/// Hashable identity of a [`Value`].
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ValueKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(Rc<str>),
    Ptr(*const ()),
}

/// Event handler stored in a [`Value`] and attached by event bindings.
#[derive_ex(Clone)]
pub struct Callback(Rc<dyn Fn(&Event)>);

impl Callback {
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(f))
    }
    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
    fn as_ptr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }
}
impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}
impl Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", self.as_ptr())
    }
}
