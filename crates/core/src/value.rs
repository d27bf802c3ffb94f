//! Value type definitions for Tessel.
//!
//! This module defines the `Value` enum which represents any value that can be
//! stored in a tuple field, carried by a signal, or used as a predicate literal.

use crate::types::DataType;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use core::any::Any;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};

/// An opaque host object.
///
/// Equality, ordering and hashing are by identity of the shared allocation,
/// so two handles compare equal only when they point at the same object.
#[derive(Clone)]
pub struct OpaqueValue(Rc<dyn Any>);

impl OpaqueValue {
    /// Wraps a value in a new shared allocation.
    pub fn new<T: Any>(value: T) -> Self {
        Self(Rc::new(value))
    }

    /// Wraps an existing shared allocation.
    pub fn from_rc(value: Rc<dyn Any>) -> Self {
        Self(value)
    }

    /// Returns the wrapped object if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        let any: &dyn Any = &*self.0;
        any.downcast_ref::<T>()
    }

    /// Returns true if both handles point at the same object.
    #[inline]
    pub fn same(&self, other: &OpaqueValue) -> bool {
        self.addr() == other.addr()
    }

    #[inline]
    fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueValue({:#x})", self.addr())
    }
}

impl PartialEq for OpaqueValue {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for OpaqueValue {}

impl Hash for OpaqueValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

/// A value that can be stored in a tuple field.
#[derive(Clone, Debug)]
pub enum Value {
    /// Null value
    Null,
    /// 64-bit signed integer
    Integer(i64),
    /// Boolean value
    Boolean(bool),
    /// UTF-8 string
    String(String),
    /// Enum-like token
    Symbol(String),
    /// DateTime stored as UTC Unix timestamp in seconds
    DateTime(i64),
    /// Opaque host object
    Object(OpaqueValue),
}

impl Value {
    /// Returns the data type of this value, or None if it's Null.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Integer(_) => Some(DataType::Integer),
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::String(_) => Some(DataType::String),
            Value::Symbol(_) => Some(DataType::Symbol),
            Value::DateTime(_) => Some(DataType::DateTime),
            Value::Object(_) => Some(DataType::Object),
        }
    }

    /// Returns true if this value is Null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the integer if this is an Integer, None otherwise.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the boolean value if this is a Boolean, None otherwise.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text of a String or Symbol, None otherwise.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) | Value::Symbol(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Returns the timestamp in seconds if this is a DateTime, None otherwise.
    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            Value::DateTime(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the datetime as a `chrono` UTC datetime.
    pub fn as_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.as_timestamp()
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
    }

    /// Returns the opaque object if this is an Object, None otherwise.
    pub fn as_object(&self) -> Option<&OpaqueValue> {
        match self {
            Value::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Creates a symbol value.
    pub fn symbol(token: impl Into<String>) -> Self {
        Value::Symbol(token.into())
    }

    /// Creates an opaque object value.
    pub fn object<T: Any>(value: T) -> Self {
        Value::Object(OpaqueValue::new(value))
    }

    /// Returns a type ordering value for comparing different types.
    fn type_order(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) => 2,
            Value::DateTime(_) => 3,
            Value::String(_) => 4,
            Value::Symbol(_) => 5,
            Value::Object(_) => 6,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Symbol(a), Value::Symbol(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Object(a), Value::Object(b)) => a.addr().cmp(&b.addr()),
            // Different types (Null first): order by type discriminant
            _ => self.type_order().cmp(&other.type_order()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Integer(i) => i.hash(state),
            Value::Boolean(b) => b.hash(state),
            Value::String(s) | Value::Symbol(s) => s.hash(state),
            Value::DateTime(d) => d.hash(state),
            Value::Object(o) => o.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{:?}", v),
            Value::Symbol(v) => write!(f, ":{}", v),
            Value::DateTime(v) => match self.as_datetime() {
                Some(dt) => f.write_str(&dt.to_rfc3339()),
                None => write!(f, "@{}", v),
            },
            Value::Object(o) => write!(f, "{:?}", o),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Value {
    fn from(v: chrono::DateTime<chrono::Utc>) -> Self {
        Value::DateTime(v.timestamp())
    }
}

impl From<OpaqueValue> for Value {
    fn from(v: OpaqueValue) -> Self {
        Value::Object(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_check() {
        assert_eq!(Value::Integer(42).data_type(), Some(DataType::Integer));
        assert_eq!(Value::symbol("open").data_type(), Some(DataType::Symbol));
    }

    #[test]
    fn test_value_null() {
        let v = Value::Null;
        assert_eq!(v.data_type(), None);
        assert!(v.is_null());
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Boolean(true).as_bool(), Some(true));
        assert_eq!(Value::Integer(100).as_i64(), Some(100));
        assert_eq!(Value::String("hello".into()).as_str(), Some("hello"));
        assert_eq!(Value::symbol("draft").as_str(), Some("draft"));
        assert_eq!(Value::DateTime(1234567890).as_timestamp(), Some(1234567890));
        assert_eq!(
            Value::DateTime(0).as_datetime().map(|dt| dt.timestamp()),
            Some(0)
        );
    }

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::Integer(42), Value::Integer(42));
        assert_ne!(Value::String("a".into()), Value::symbol("a"));
        assert_eq!(Value::Null, Value::Null);
    }

    #[test]
    fn test_value_ordering() {
        assert!(Value::Integer(1) < Value::Integer(2));
        assert!(Value::String("a".into()) < Value::String("b".into()));
        assert!(Value::Null < Value::Integer(0));
        assert!(Value::DateTime(10) < Value::DateTime(11));
    }

    #[test]
    fn test_object_identity() {
        let a = OpaqueValue::new(7u8);
        let b = OpaqueValue::new(7u8);
        assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
        assert_ne!(Value::Object(a.clone()), Value::Object(b));
        assert_eq!(a.downcast_ref::<u8>(), Some(&7));
        assert_eq!(a.downcast_ref::<u16>(), None);
    }

    #[test]
    fn test_value_from_impls() {
        let v: Value = 42i32.into();
        assert_eq!(v.as_i64(), Some(42));

        let v: Value = "hello".into();
        assert_eq!(v.as_str(), Some("hello"));

        let v: Value = Some(100i64).into();
        assert_eq!(v.as_i64(), Some(100));

        let v: Value = None::<i64>.into();
        assert!(v.is_null());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Integer(3).to_string(), "3");
        assert_eq!(Value::symbol("open").to_string(), ":open");
        assert_eq!(Value::DateTime(0).to_string(), "1970-01-01T00:00:00+00:00");
    }
}
