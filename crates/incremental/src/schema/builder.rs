//! Builder for set definitions.

use super::attribute::{Attribute, AttributeDefault, Transform};
use super::layout::Schema;
use crate::relation::Set;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use tessel_core::{coerce, next_identity, DataType, Error, Result, Value};
use tessel_reactive::KeeperId;

/// Name of the identity attribute every set declares.
pub const IDENTITY: &str = "id";

struct AttributeSpec {
    name: String,
    data_type: DataType,
    default: Option<AttributeDefault>,
    transform: Option<Transform>,
}

/// Builder for creating sets.
///
/// Every set starts with the identity attribute `id: Integer`, whose default
/// draws from the process-wide identity generator. The schema is fixed once
/// [`SetBuilder::build`] returns.
pub struct SetBuilder {
    name: String,
    attributes: Vec<AttributeSpec>,
}

impl SetBuilder {
    /// Creates a new set builder.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::check_naming_rules(&name)?;
        Ok(Self {
            name,
            attributes: vec![AttributeSpec {
                name: IDENTITY.to_string(),
                data_type: DataType::Integer,
                default: Some(AttributeDefault::Generator(Rc::new(|| {
                    Value::Integer(next_identity())
                }))),
                transform: None,
            }],
        })
    }

    /// Validates a name follows naming rules.
    fn check_naming_rules(name: &str) -> Result<()> {
        let first = match name.chars().next() {
            Some(c) => c,
            None => return Err(Error::invalid_name(name)),
        };
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(Error::invalid_name(name));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::invalid_name(name));
        }
        Ok(())
    }

    /// Replaces the generator behind the identity default.
    pub fn identity_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> Value + 'static,
    {
        self.attributes[0].default = Some(AttributeDefault::Generator(Rc::new(generator)));
        self
    }

    /// Declares an attribute.
    ///
    /// Redeclaring a name with the same type is a no-op; with a different
    /// type it is a schema error.
    pub fn attribute(mut self, name: impl Into<String>, data_type: DataType) -> Result<Self> {
        let name = name.into();
        if let Some(existing) = self.attributes.iter().find(|a| a.name == name) {
            if existing.data_type == data_type {
                return Ok(self);
            }
            return Err(Error::attribute_redefined(
                format!("{}.{}", self.name, name),
                existing.data_type,
                data_type,
            ));
        }
        Self::check_naming_rules(&name)?;
        self.attributes.push(AttributeSpec {
            name,
            data_type,
            default: None,
            transform: None,
        });
        Ok(self)
    }

    /// Sets a literal default for a declared attribute.
    pub fn default_value(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        let set_name = self.name.clone();
        let spec = self.spec_mut(name)?;
        let raw = value.into();
        let converted = coerce(spec.data_type, raw.clone()).ok_or_else(|| {
            Error::conversion(format!("{}.{}", set_name, name), spec.data_type, raw)
        })?;
        spec.default = Some(AttributeDefault::Literal(converted));
        Ok(self)
    }

    /// Sets a generated default for a declared attribute.
    pub fn default_with<F>(mut self, name: &str, generator: F) -> Result<Self>
    where
        F: Fn() -> Value + 'static,
    {
        self.spec_mut(name)?.default = Some(AttributeDefault::Generator(Rc::new(generator)));
        Ok(self)
    }

    /// Sets a read-time transform for a declared attribute.
    pub fn transform<F>(mut self, name: &str, transform: F) -> Result<Self>
    where
        F: Fn(&Value) -> Value + 'static,
    {
        self.spec_mut(name)?.transform = Some(Rc::new(transform));
        Ok(self)
    }

    fn spec_mut(&mut self, name: &str) -> Result<&mut AttributeSpec> {
        let set_name = &self.name;
        self.attributes
            .iter_mut()
            .find(|a| a.name == name)
            .ok_or_else(|| Error::unknown_attribute(set_name.as_str(), name))
    }

    /// Builds the set.
    pub fn build(self) -> Set {
        let id = KeeperId::next();
        let set_name = self.name;
        let attributes = self
            .attributes
            .into_iter()
            .enumerate()
            .map(|(index, spec)| {
                Attribute::new(
                    id,
                    set_name.as_str(),
                    spec.name,
                    spec.data_type,
                    index,
                    index == 0,
                    spec.default,
                    spec.transform,
                )
            })
            .collect();
        Set::from_schema(id, Schema::new(set_name, attributes))
    }
}
