//! Data type definitions for Tessel.
//!
//! This module defines the types an attribute can declare.

use core::fmt;

/// Supported attribute types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 64-bit signed integer
    Integer,
    /// Boolean type (true/false)
    Boolean,
    /// UTF-8 string
    String,
    /// Enum-like token, compared as text but kept distinct from strings
    Symbol,
    /// UTC date and time with second precision
    DateTime,
    /// Opaque host object, compared by identity
    Object,
}

impl DataType {
    /// Returns the name used in error messages and schema dumps.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Integer => "integer",
            DataType::Boolean => "boolean",
            DataType::String => "string",
            DataType::Symbol => "symbol",
            DataType::DateTime => "datetime",
            DataType::Object => "object",
        }
    }

    /// Returns whether values of this type have a meaningful natural ordering.
    pub fn is_ordered(&self) -> bool {
        !matches!(self, DataType::Object)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
