//! Attribute definitions.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use core::fmt;
use core::hash::{Hash, Hasher};
use tessel_core::{coerce, DataType, Error, Result, Value};
use tessel_reactive::KeeperId;

/// Read-time transform applied to a stored value.
pub type Transform = Rc<dyn Fn(&Value) -> Value>;

/// Default applied when a tuple is built without a value for an attribute.
#[derive(Clone)]
pub enum AttributeDefault {
    /// A fixed value, already converted to the attribute's type.
    Literal(Value),
    /// A generator called once per built tuple.
    Generator(Rc<dyn Fn() -> Value>),
}

impl AttributeDefault {
    /// Produces the raw default value.
    pub fn produce(&self) -> Value {
        match self {
            AttributeDefault::Literal(v) => v.clone(),
            AttributeDefault::Generator(g) => g(),
        }
    }
}

impl fmt::Debug for AttributeDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeDefault::Literal(v) => write!(f, "Literal({})", v),
            AttributeDefault::Generator(_) => f.write_str("Generator"),
        }
    }
}

struct AttributeDef {
    owner: KeeperId,
    set_name: String,
    name: String,
    data_type: DataType,
    index: usize,
    identity: bool,
    default: Option<AttributeDefault>,
    transform: Option<Transform>,
}

/// A named, typed column of a set.
///
/// Attributes are shared handles; two handles are equal when they name the
/// same column of the same set.
#[derive(Clone)]
pub struct Attribute(Rc<AttributeDef>);

impl Attribute {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        owner: KeeperId,
        set_name: impl Into<String>,
        name: impl Into<String>,
        data_type: DataType,
        index: usize,
        identity: bool,
        default: Option<AttributeDefault>,
        transform: Option<Transform>,
    ) -> Self {
        Attribute(Rc::new(AttributeDef {
            owner,
            set_name: set_name.into(),
            name: name.into(),
            data_type,
            index,
            identity,
            default,
            transform,
        }))
    }

    /// Returns the attribute name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Returns the name of the declaring set.
    #[inline]
    pub fn set_name(&self) -> &str {
        &self.0.set_name
    }

    /// Returns `set.attribute`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.0.set_name, self.0.name)
    }

    /// Returns the declared type.
    #[inline]
    pub fn data_type(&self) -> DataType {
        self.0.data_type
    }

    /// Returns the column position within the declaring set.
    #[inline]
    pub fn index(&self) -> usize {
        self.0.index
    }

    /// Returns the id of the declaring set.
    #[inline]
    pub fn owner(&self) -> KeeperId {
        self.0.owner
    }

    /// Returns true for the identity attribute of a set.
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.0.identity
    }

    /// Returns true if the attribute has a read-time transform.
    #[inline]
    pub fn has_transform(&self) -> bool {
        self.0.transform.is_some()
    }

    /// Converts a raw value to the declared type.
    pub fn convert(&self, raw: Value) -> Result<Value> {
        coerce(self.0.data_type, raw.clone())
            .ok_or_else(|| Error::conversion(self.qualified_name(), self.0.data_type, raw))
    }

    /// Produces the converted default for a new tuple.
    pub fn default_value(&self) -> Result<Value> {
        match &self.0.default {
            Some(default) => self.convert(default.produce()),
            None => Ok(Value::Null),
        }
    }

    /// Applies the read-time transform to a stored value.
    pub fn read(&self, stored: &Value) -> Value {
        match &self.0.transform {
            Some(transform) => transform(stored),
            None => stored.clone(),
        }
    }
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
            || (self.0.owner == other.0.owner && self.0.name == other.0.name)
    }
}

impl Eq for Attribute {}

impl Hash for Attribute {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.owner.hash(state);
        self.0.name.hash(state);
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.0.set_name, self.0.name, self.0.data_type)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0.set_name, self.0.name)
    }
}
