//! The host's view of values that flow into and out of instances.
//!
//! Imports are supplied as [`HostValue`]s and the linker decides, per
//! declared import kind, whether a value is acceptable. Numbers follow the
//! usual embedding conventions: `i64` travels as a big integer while every
//! other numeric type travels as a double.

use crate::{Func, Global, Memory, Table, Tag};
use indexmap::IndexMap;
use std::rc::Rc;

/// A value owned by the embedder.
#[derive(Clone, Debug, Default)]
pub enum HostValue {
    /// The absence of a value, for example a missing property.
    #[default]
    Undefined,
    /// The null value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A double-precision number.
    Number(f64),
    /// An arbitrary-precision integer, as far as `i128` reaches.
    BigInt(i128),
    /// A string.
    String(Rc<str>),
    /// A property bag, used as an import namespace.
    Object(HostObject),
    /// A callable: either a host function or a module function.
    Function(Func),
    /// A global object.
    Global(Global),
    /// A table object.
    Table(Table),
    /// A memory object.
    Memory(Memory),
    /// A tag object.
    Tag(Tag),
}

impl HostValue {
    /// Whether calling this value is meaningful.
    pub fn is_callable(&self) -> bool {
        matches!(self, HostValue::Function(_))
    }

    /// Whether this value is a property bag.
    pub fn is_object(&self) -> bool {
        !matches!(
            self,
            HostValue::Undefined
                | HostValue::Null
                | HostValue::Bool(_)
                | HostValue::Number(_)
                | HostValue::BigInt(_)
                | HostValue::String(_)
        )
    }

    /// Whether this is the null value.
    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    /// Returns the properties of this value if it is a property bag.
    pub fn as_object(&self) -> Option<&HostObject> {
        match self {
            HostValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Returns the function, if this is one.
    pub fn as_func(&self) -> Option<Func> {
        match self {
            HostValue::Function(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the global, if this is one.
    pub fn as_global(&self) -> Option<Global> {
        match self {
            HostValue::Global(g) => Some(*g),
            _ => None,
        }
    }

    /// Returns the table, if this is one.
    pub fn as_table(&self) -> Option<Table> {
        match self {
            HostValue::Table(t) => Some(*t),
            _ => None,
        }
    }

    /// Returns the memory, if this is one.
    pub fn as_memory(&self) -> Option<Memory> {
        match self {
            HostValue::Memory(m) => Some(*m),
            _ => None,
        }
    }

    /// Returns the tag, if this is one.
    pub fn as_tag(&self) -> Option<Tag> {
        match self {
            HostValue::Tag(t) => Some(*t),
            _ => None,
        }
    }

    /// Returns the number, if this is one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            HostValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the big integer, if this is one.
    pub fn as_big_int(&self) -> Option<i128> {
        match self {
            HostValue::BigInt(n) => Some(*n),
            _ => None,
        }
    }
}

/// Converts a number to a 32-bit integer: NaN and infinities become zero,
/// everything else is truncated toward zero and wrapped modulo 2^32.
pub fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    let wrapped = n.trunc().rem_euclid(4_294_967_296.0);
    wrapped as u32 as i32
}

/// Converts a big integer to 64 bits, wrapping modulo 2^64.
pub fn to_big_int64(n: i128) -> i64 {
    n as i64
}

/// Converts a number to single precision, rounding to nearest.
pub fn to_f32(n: f64) -> f32 {
    n as f32
}

impl From<f64> for HostValue {
    fn from(n: f64) -> HostValue {
        HostValue::Number(n)
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> HostValue {
        HostValue::Bool(b)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> HostValue {
        HostValue::String(s.into())
    }
}

impl From<HostObject> for HostValue {
    fn from(o: HostObject) -> HostValue {
        HostValue::Object(o)
    }
}

impl From<Func> for HostValue {
    fn from(f: Func) -> HostValue {
        HostValue::Function(f)
    }
}

impl From<Global> for HostValue {
    fn from(g: Global) -> HostValue {
        HostValue::Global(g)
    }
}

impl From<Table> for HostValue {
    fn from(t: Table) -> HostValue {
        HostValue::Table(t)
    }
}

impl From<Memory> for HostValue {
    fn from(m: Memory) -> HostValue {
        HostValue::Memory(m)
    }
}

impl From<Tag> for HostValue {
    fn from(t: Tag) -> HostValue {
        HostValue::Tag(t)
    }
}

/// An ordered bag of named host values.
#[derive(Clone, Debug, Default)]
pub struct HostObject {
    properties: Rc<IndexMap<String, HostValue>>,
}

impl HostObject {
    /// Creates an object with no properties.
    pub fn new() -> HostObject {
        HostObject::default()
    }

    /// Sets the property `name`, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<HostValue>) -> &mut Self {
        Rc::make_mut(&mut self.properties).insert(name.into(), value.into());
        self
    }

    /// Builder-style variant of [`HostObject::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<HostValue>) -> HostObject {
        self.insert(name, value);
        self
    }

    /// Returns the property `name`, if present.
    pub fn get(&self, name: &str) -> Option<&HostValue> {
        self.properties.get(name)
    }

    /// Iterates over the properties in insertion order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &HostValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The number of properties.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether there are no properties.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}
