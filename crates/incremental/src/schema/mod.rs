//! Set schemas: attributes, resolution tables and the set builder.

mod attribute;
mod builder;
mod layout;

pub use attribute::{Attribute, AttributeDefault, Transform};
pub use builder::{SetBuilder, IDENTITY};
pub use layout::{AttributeRef, Schema};
