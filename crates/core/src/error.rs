//! Error types for Tessel.

use crate::types::DataType;
use crate::value::Value;
use alloc::string::String;
use core::fmt;

/// Result type alias for Tessel operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
///
/// Errors are synchronous and never retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown or conflicting schema element.
    Schema,
    /// A raw value cannot be coerced to an attribute's type.
    Conversion,
    /// The engine's usage protocol was violated.
    Usage,
    /// The persistence collaborator failed.
    Repository,
}

/// Error types for Tessel operations.
#[derive(Debug)]
pub enum Error {
    /// Attribute not declared by the relation's schema.
    UnknownAttribute {
        relation: String,
        attribute: String,
    },
    /// Attribute redeclared with a different type.
    AttributeRedefined {
        attribute: String,
        existing: DataType,
        requested: DataType,
    },
    /// Set or attribute name breaks the naming rules.
    InvalidName {
        name: String,
    },
    /// Raw value cannot be coerced to the attribute's type.
    Conversion {
        attribute: String,
        expected: DataType,
        value: Value,
    },
    /// The keeper already retains this object.
    AlreadyRetained {
        keeper: u64,
    },
    /// The keeper does not retain this object.
    NotRetained {
        keeper: u64,
    },
    /// Subscription or materialized read on a dormant object.
    Dormant {
        operation: &'static str,
    },
    /// Composite predicate built without children.
    EmptyComposite {
        operator: &'static str,
    },
    /// Identity value already present in the set.
    DuplicateIdentity {
        set: String,
        identity: Value,
    },
    /// Tuple is not a member of the set.
    NotAMember {
        set: String,
    },
    /// Tuple belongs to a different set.
    ForeignTuple {
        expected: String,
        actual: String,
    },
    /// Invalid operation.
    InvalidOperation {
        message: String,
    },
    /// Failure reported by the persistence collaborator.
    Repository {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownAttribute { relation, attribute } => {
                write!(f, "Attribute {} not found in {}", attribute, relation)
            }
            Error::AttributeRedefined { attribute, existing, requested } => {
                write!(
                    f,
                    "Attribute {} already declared as {}, cannot redeclare as {}",
                    attribute, existing, requested
                )
            }
            Error::InvalidName { name } => {
                write!(f, "Invalid name: {:?}", name)
            }
            Error::Conversion { attribute, expected, value } => {
                write!(f, "Cannot convert {} to {} for {}", value, expected, attribute)
            }
            Error::AlreadyRetained { keeper } => {
                write!(f, "Keeper {} already retains this object", keeper)
            }
            Error::NotRetained { keeper } => {
                write!(f, "Keeper {} does not retain this object", keeper)
            }
            Error::Dormant { operation } => {
                write!(f, "Cannot {} on an object that is not retained", operation)
            }
            Error::EmptyComposite { operator } => {
                write!(f, "{} requires at least one operand", operator)
            }
            Error::DuplicateIdentity { set, identity } => {
                write!(f, "Set {} already contains identity {}", set, identity)
            }
            Error::NotAMember { set } => {
                write!(f, "Tuple is not a member of set {}", set)
            }
            Error::ForeignTuple { expected, actual } => {
                write!(f, "Tuple of set {} cannot be used with set {}", actual, expected)
            }
            Error::InvalidOperation { message } => {
                write!(f, "Invalid operation: {}", message)
            }
            Error::Repository { message } => {
                write!(f, "Repository error: {}", message)
            }
        }
    }
}

impl Error {
    /// Returns the taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownAttribute { .. }
            | Error::AttributeRedefined { .. }
            | Error::InvalidName { .. } => ErrorKind::Schema,
            Error::Conversion { .. } => ErrorKind::Conversion,
            Error::Repository { .. } => ErrorKind::Repository,
            Error::AlreadyRetained { .. }
            | Error::NotRetained { .. }
            | Error::Dormant { .. }
            | Error::EmptyComposite { .. }
            | Error::DuplicateIdentity { .. }
            | Error::NotAMember { .. }
            | Error::ForeignTuple { .. }
            | Error::InvalidOperation { .. } => ErrorKind::Usage,
        }
    }

    /// Creates an unknown attribute error.
    pub fn unknown_attribute(relation: impl Into<String>, attribute: impl Into<String>) -> Self {
        Error::UnknownAttribute {
            relation: relation.into(),
            attribute: attribute.into(),
        }
    }

    /// Creates an attribute redefinition error.
    pub fn attribute_redefined(
        attribute: impl Into<String>,
        existing: DataType,
        requested: DataType,
    ) -> Self {
        Error::AttributeRedefined {
            attribute: attribute.into(),
            existing,
            requested,
        }
    }

    /// Creates an invalid name error.
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Error::InvalidName { name: name.into() }
    }

    /// Creates a conversion error.
    pub fn conversion(attribute: impl Into<String>, expected: DataType, value: Value) -> Self {
        Error::Conversion {
            attribute: attribute.into(),
            expected,
            value,
        }
    }

    /// Creates a dormant-object error.
    pub fn dormant(operation: &'static str) -> Self {
        Error::Dormant { operation }
    }

    /// Creates a duplicate identity error.
    pub fn duplicate_identity(set: impl Into<String>, identity: Value) -> Self {
        Error::DuplicateIdentity {
            set: set.into(),
            identity,
        }
    }

    /// Creates a membership error.
    pub fn not_a_member(set: impl Into<String>) -> Self {
        Error::NotAMember { set: set.into() }
    }

    /// Creates a foreign tuple error.
    pub fn foreign_tuple(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Error::ForeignTuple {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a repository error.
    pub fn repository(message: impl Into<String>) -> Self {
        Error::Repository {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_error_display() {
        let err = Error::unknown_attribute("answers", "body");
        assert!(err.to_string().contains("body"));

        let err = Error::conversion("answers.question_id", DataType::Integer, "x".into());
        assert!(err.to_string().contains("answers.question_id"));

        let err = Error::dormant("subscribe");
        assert!(err.to_string().contains("not retained"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::unknown_attribute("a", "b").kind(), ErrorKind::Schema);
        assert_eq!(
            Error::attribute_redefined("a", DataType::Integer, DataType::String).kind(),
            ErrorKind::Schema
        );
        assert_eq!(
            Error::conversion("a.b", DataType::Boolean, Value::Integer(3)).kind(),
            ErrorKind::Conversion
        );
        assert_eq!(Error::AlreadyRetained { keeper: 1 }.kind(), ErrorKind::Usage);
        assert_eq!(Error::EmptyComposite { operator: "And" }.kind(), ErrorKind::Usage);
        assert_eq!(Error::repository("offline").kind(), ErrorKind::Repository);
    }

    #[test]
    fn test_error_constructors() {
        let err = Error::duplicate_identity("answers", Value::Integer(1));
        match err {
            Error::DuplicateIdentity { set, identity } => {
                assert_eq!(set, "answers");
                assert_eq!(identity, Value::Integer(1));
            }
            _ => panic!("Wrong error type"),
        }
    }
}
