//! Tessel Core - Core types for the Tessel incremental relation engine.
//!
//! This crate provides the foundational types shared by every layer:
//!
//! - `DataType`: Attribute types (Integer, Boolean, String, Symbol, DateTime, Object)
//! - `Value`: Runtime values stored in tuple fields and carried by signals
//! - `coerce`: Conversion of raw values into a declared type
//! - `Error`: Error types, classified by `ErrorKind`
//! - `next_identity`: Process-wide identity generator
//!
//! # Example
//!
//! ```rust
//! use tessel_core::{coerce, DataType, Value};
//!
//! assert_eq!(coerce(DataType::Boolean, "true".into()), Some(Value::Boolean(true)));
//! assert_eq!(coerce(DataType::Integer, "12".into()), Some(Value::Integer(12)));
//! assert_eq!(coerce(DataType::Integer, "twelve".into()), None);
//! ```

#![no_std]

extern crate alloc;

mod convert;
mod error;
mod identity;
mod types;
mod value;

pub use convert::coerce;
pub use error::{Error, ErrorKind, Result};
pub use identity::{next_identity, observe_identity};
pub use types::DataType;
pub use value::{OpaqueValue, Value};
