//! Attribute resolution tables.

use super::attribute::Attribute;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use hashbrown::HashMap;
use tessel_core::{Error, Result};

/// A reference to an attribute, either by handle or by name.
#[derive(Clone, Copy, Debug)]
pub enum AttributeRef<'a> {
    Attribute(&'a Attribute),
    Name(&'a str),
}

impl<'a> From<&'a Attribute> for AttributeRef<'a> {
    fn from(attribute: &'a Attribute) -> Self {
        AttributeRef::Attribute(attribute)
    }
}

impl<'a> From<&'a str> for AttributeRef<'a> {
    fn from(name: &'a str) -> Self {
        AttributeRef::Name(name)
    }
}

impl<'a> From<&'a String> for AttributeRef<'a> {
    fn from(name: &'a String) -> Self {
        AttributeRef::Name(name.as_str())
    }
}

impl AttributeRef<'_> {
    fn describe(&self) -> String {
        match self {
            AttributeRef::Attribute(a) => a.qualified_name(),
            AttributeRef::Name(n) => n.to_string(),
        }
    }
}

/// The ordered attribute list of a relation.
///
/// Built once when the relation is composed. A name that occurs more than
/// once (e.g. `id` on both sides of a join) resolves to its first occurrence.
#[derive(Debug)]
pub struct Schema {
    name: String,
    attributes: Vec<Attribute>,
    by_attribute: HashMap<Attribute, usize>,
    by_name: HashMap<String, usize>,
}

impl Schema {
    /// Creates a schema over `attributes`, in order.
    pub fn new(name: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        let mut by_attribute = HashMap::with_capacity(attributes.len());
        let mut by_name = HashMap::with_capacity(attributes.len());
        for (pos, attribute) in attributes.iter().enumerate() {
            by_attribute.entry(attribute.clone()).or_insert(pos);
            by_name.entry(attribute.name().to_string()).or_insert(pos);
        }
        Self {
            name: name.into(),
            attributes,
            by_attribute,
            by_name,
        }
    }

    /// Concatenates two schemas, left first.
    pub fn join(left: &Schema, right: &Schema) -> Self {
        let attributes = left
            .attributes
            .iter()
            .chain(right.attributes.iter())
            .cloned()
            .collect();
        Self::new(format!("({} * {})", left.name, right.name), attributes)
    }

    /// Returns the relation name used in error messages.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the attributes in order.
    #[inline]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Returns the number of attributes.
    #[inline]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns true if there are no attributes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Returns the position of an attribute handle.
    pub fn position(&self, attribute: &Attribute) -> Option<usize> {
        self.by_attribute.get(attribute).copied()
    }

    /// Returns the position of the first attribute named `name`.
    pub fn position_by_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Returns true if the schema resolves `attribute`.
    pub fn contains(&self, attribute: &Attribute) -> bool {
        self.by_attribute.contains_key(attribute)
    }

    /// Resolves an attribute reference to its position.
    pub fn locate(&self, attribute: AttributeRef<'_>) -> Result<usize> {
        let pos = match attribute {
            AttributeRef::Attribute(a) => self.position(a),
            AttributeRef::Name(n) => self.position_by_name(n),
        };
        pos.ok_or_else(|| Error::unknown_attribute(self.name.as_str(), attribute.describe()))
    }

    /// Resolves an attribute reference to its handle.
    pub fn resolve(&self, attribute: AttributeRef<'_>) -> Result<Attribute> {
        self.locate(attribute).map(|pos| self.attributes[pos].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_core::{DataType, ErrorKind};
    use tessel_reactive::KeeperId;

    fn attrs(set: &str, names: &[&str]) -> Vec<Attribute> {
        let owner = KeeperId::next();
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Attribute::new(owner, set, *n, DataType::Integer, i, i == 0, None, None))
            .collect()
    }

    #[test]
    fn test_resolve_by_name_and_handle() {
        let schema = Schema::new("answers", attrs("answers", &["id", "question_id"]));
        assert_eq!(schema.locate("question_id".into()).unwrap(), 1);
        let handle = schema.attributes()[1].clone();
        assert_eq!(schema.locate((&handle).into()).unwrap(), 1);

        let err = schema.locate("body".into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_join_first_occurrence_wins() {
        let left = Schema::new("questions", attrs("questions", &["id", "title"]));
        let right = Schema::new("answers", attrs("answers", &["id", "question_id"]));
        let joined = Schema::join(&left, &right);

        assert_eq!(joined.len(), 4);
        assert_eq!(joined.position_by_name("id"), Some(0));
        // Right-side id still resolves by handle.
        let right_id = right.attributes()[0].clone();
        assert_eq!(joined.position(&right_id), Some(2));
    }

    #[test]
    fn test_foreign_attribute_is_unknown() {
        let schema = Schema::new("a", attrs("a", &["id"]));
        let other = attrs("b", &["id"]);
        assert!(!schema.contains(&other[0]));
        assert!(schema.resolve((&other[0]).into()).is_err());
    }
}
