//! Dynamic value representation for object graphs and node payloads.
//!
//! [`Value`] is what flows through the serializer: primitives, strings,
//! dates, big integers, type references, and [`Instance`] handles pointing at
//! live objects owned by the host.
//!
//! ## Identity
//!
//! Only [`Value::Object`] has identity. Two `Instance` handles are equal when
//! they point at the same allocation, no matter what the objects contain, so
//! the reference table can never collapse two distinct graph nodes that happen
//! to compare equal.
//!
//! ```rust
//! use xaml_stream::{Instance, Value};
//!
//! let a = Instance::new(String::from("same"));
//! let b = Instance::new(String::from("same"));
//! assert_ne!(a, b);
//! assert_eq!(a, a.clone());
//!
//! let value = Value::Object(a.clone());
//! assert_eq!(value.identity(), Some(a.id()));
//! assert_eq!(Value::from(1).identity(), None);
//! ```

use crate::schema::XamlTypeName;
use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use serde::{Serialize, Serializer};
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Stable identity of a live object for the duration of one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

impl ObjectId {
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

/// A shared, type-erased handle to a host object.
///
/// Equality is pointer identity.
#[derive(Clone)]
pub struct Instance(Rc<dyn Any>);

impl Instance {
    pub fn new<T: Any>(object: T) -> Self {
        Instance(Rc::new(object))
    }

    pub fn from_rc(object: Rc<dyn Any>) -> Self {
        Instance(object)
    }

    #[must_use]
    pub fn id(&self) -> ObjectId {
        ObjectId(Rc::as_ptr(&self.0) as *const () as usize)
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        self.id() == other.id()
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Instance {}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({:#x})", self.id().0)
    }
}

/// Any value that can appear in an object graph or a node payload.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Char(char),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
    DateTime(DateTime<Utc>),
    BigInt(BigInt),
    /// A reference to a type, rendered as `x:Type`.
    Type(XamlTypeName),
    Object(Instance),
}

impl Value {
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    #[must_use]
    pub const fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(i) => Some(i64::from(*i)),
            Value::Int64(i) => Some(*i),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Object(instance) => Some(instance),
            _ => None,
        }
    }

    /// Identity used by the reference table; `None` for values without one.
    #[inline]
    #[must_use]
    pub fn identity(&self) -> Option<ObjectId> {
        self.as_instance().map(Instance::id)
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::DateTime(_) => "datetime",
            Value::BigInt(_) => "bigint",
            Value::Type(_) => "type",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Char(c) => write!(f, "{}", c),
            Value::Int32(i) => write!(f, "{}", i),
            Value::Int64(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::BigInt(bi) => write!(f, "{}", bi),
            Value::Type(name) => write!(f, "{}", name),
            Value::Object(instance) => write!(f, "{:?}", instance),
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Char(c) => serializer.serialize_char(*c),
            Value::Int32(i) => serializer.serialize_i32(*i),
            Value::Int64(i) => serializer.serialize_i64(*i),
            Value::Double(d) => serializer.serialize_f64(*d),
            Value::String(s) => serializer.serialize_str(s),
            Value::DateTime(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            Value::BigInt(bi) => serializer.serialize_str(&bi.to_string()),
            Value::Type(name) => serializer.serialize_str(&name.to_string()),
            // Addresses differ between runs; dumps must stay comparable.
            Value::Object(_) => serializer.serialize_str("<instance>"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<char> for Value {
    fn from(value: char) -> Self {
        Value::Char(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value)
    }
}

impl From<BigInt> for Value {
    fn from(value: BigInt) -> Self {
        Value::BigInt(value)
    }
}

impl From<XamlTypeName> for Value {
    fn from(value: XamlTypeName) -> Self {
        Value::Type(value)
    }
}

impl From<Instance> for Value {
    fn from(value: Instance) -> Self {
        Value::Object(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_identity_ignores_contents() {
        let a = Instance::new(5_i32);
        let b = Instance::new(5_i32);
        assert_ne!(Value::Object(a.clone()), Value::Object(b));
        assert_eq!(Value::Object(a.clone()), Value::Object(a));
    }

    #[test]
    fn test_downcast() {
        let inst = Instance::new(String::from("hello"));
        assert_eq!(inst.downcast_ref::<String>().map(String::as_str), Some("hello"));
        assert!(inst.downcast_ref::<i32>().is_none());
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::String("a".to_string()));
    }

    #[test]
    fn test_serialize_hides_addresses() {
        let json = serde_json::to_string(&Value::Object(Instance::new(1_u8))).unwrap();
        assert_eq!(json, "\"<instance>\"");
        assert_eq!(serde_json::to_string(&Value::from(7)).unwrap(), "7");
    }
}
