//! Tuples: the rows flowing through relations.
//!
//! - [`PrimitiveTuple`]: built by a set, one field per attribute.
//! - [`CompoundTuple`]: a (left, right) pair emitted by a join.
//! - [`ProjectedTuple`]: value copies emitted by a row-level projection.

mod compound;
mod primitive;
mod projected;

pub use compound::CompoundTuple;
pub use primitive::{PrimitiveTuple, WeakPrimitiveTuple};
pub use projected::ProjectedTuple;

use crate::field::FieldChange;
use crate::schema::{Attribute, AttributeRef, Schema};
use crate::signal::Signal;
use alloc::rc::Rc;
use core::fmt;
use tessel_core::{Error, Result, Value};
use tessel_reactive::KeeperId;

/// Any tuple a relation can contain.
#[derive(Clone)]
pub enum Tuple {
    Primitive(PrimitiveTuple),
    Compound(CompoundTuple),
    Projected(ProjectedTuple),
}

impl Tuple {
    /// Returns the schema the tuple resolves attributes against.
    pub fn schema(&self) -> Rc<Schema> {
        match self {
            Tuple::Primitive(t) => t.schema().clone(),
            Tuple::Compound(t) => t.schema().clone(),
            Tuple::Projected(t) => t.schema().clone(),
        }
    }

    /// Reads an attribute, applying its transform.
    pub fn get<'a>(&self, attribute: impl Into<AttributeRef<'a>>) -> Result<Value> {
        match self {
            Tuple::Primitive(t) => t.get(attribute),
            Tuple::Compound(t) => t.get(attribute),
            Tuple::Projected(t) => t.get(attribute),
        }
    }

    /// Reads the stored value of an attribute, without transform.
    pub fn raw<'a>(&self, attribute: impl Into<AttributeRef<'a>>) -> Result<Value> {
        match self {
            Tuple::Primitive(t) => t.raw(attribute),
            Tuple::Compound(t) => t.raw(attribute.into()),
            Tuple::Projected(t) => t.raw(attribute.into()),
        }
    }

    /// Writes an attribute.
    ///
    /// A join result forwards the write to the primitive tuple declaring the
    /// attribute. Projected tuples are read-only.
    pub fn set<'a>(
        &self,
        attribute: impl Into<AttributeRef<'a>>,
        value: impl Into<Value>,
    ) -> Result<Value> {
        let (tuple, attribute) = self.declaring(attribute.into())?;
        tuple.set(&attribute, value)
    }

    /// Returns a signal tracking one attribute of the declaring primitive tuple.
    pub fn signal<'a>(&self, attribute: impl Into<AttributeRef<'a>>) -> Result<Signal> {
        let (tuple, attribute) = self.declaring(attribute.into())?;
        Signal::attribute(&tuple, &attribute)
    }

    /// Finds the primitive tuple that declares `attribute`.
    pub(crate) fn declaring(&self, attribute: AttributeRef<'_>) -> Result<(PrimitiveTuple, Attribute)> {
        match self {
            Tuple::Primitive(t) => {
                let attribute = t.schema().resolve(attribute)?;
                Ok((t.clone(), attribute))
            }
            Tuple::Compound(t) => t.declaring(attribute),
            Tuple::Projected(_) => Err(Error::invalid_operation(
                "projected tuples are copies and cannot be written or tracked",
            )),
        }
    }

    /// Returns the first primitive tuple, left to right, built by set `set`.
    pub fn component(&self, set: KeeperId) -> Option<PrimitiveTuple> {
        match self {
            Tuple::Primitive(t) if t.set_id() == set => Some(t.clone()),
            Tuple::Primitive(_) | Tuple::Projected(_) => None,
            Tuple::Compound(t) => t.component(set),
        }
    }

    pub fn as_primitive(&self) -> Option<&PrimitiveTuple> {
        match self {
            Tuple::Primitive(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&CompoundTuple> {
        match self {
            Tuple::Compound(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_projected(&self) -> Option<&ProjectedTuple> {
        match self {
            Tuple::Projected(t) => Some(t),
            _ => None,
        }
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Tuple::Primitive(a), Tuple::Primitive(b)) => a == b,
            (Tuple::Compound(a), Tuple::Compound(b)) => a == b,
            (Tuple::Projected(a), Tuple::Projected(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq<PrimitiveTuple> for Tuple {
    fn eq(&self, other: &PrimitiveTuple) -> bool {
        matches!(self, Tuple::Primitive(t) if t == other)
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tuple::Primitive(t) => fmt::Debug::fmt(t, f),
            Tuple::Compound(t) => fmt::Debug::fmt(t, f),
            Tuple::Projected(t) => fmt::Debug::fmt(t, f),
        }
    }
}

impl From<PrimitiveTuple> for Tuple {
    fn from(t: PrimitiveTuple) -> Self {
        Tuple::Primitive(t)
    }
}

impl From<CompoundTuple> for Tuple {
    fn from(t: CompoundTuple) -> Self {
        Tuple::Compound(t)
    }
}

impl From<ProjectedTuple> for Tuple {
    fn from(t: ProjectedTuple) -> Self {
        Tuple::Projected(t)
    }
}

/// An update event: which tuple changed, and how.
#[derive(Clone, Debug)]
pub struct TupleUpdate {
    pub tuple: Tuple,
    pub change: FieldChange,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SetBuilder;
    use alloc::vec;
    use alloc::vec::Vec;
    use tessel_core::{DataType, ErrorKind};

    fn people() -> crate::relation::Set {
        SetBuilder::new("people")
            .unwrap()
            .attribute("name", DataType::String)
            .unwrap()
            .transform("name", |v| match v.as_str() {
                Some(s) => Value::String(s.to_uppercase()),
                None => v.clone(),
            })
            .unwrap()
            .build()
    }

    #[test]
    fn test_get_applies_transform() {
        let set = people();
        let t = set.build([("name", Value::from("nathan"))]).unwrap();
        let t = Tuple::from(t);
        assert_eq!(t.get("name").unwrap(), Value::String("NATHAN".into()));
        assert_eq!(t.raw("name").unwrap(), Value::String("nathan".into()));
        assert_eq!(t.get("missing").unwrap_err().kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_compound_routes_to_declaring_side() {
        let left = people();
        let right = people();
        let a = left.build([("name", Value::from("a"))]).unwrap();
        let b = right.build([("name", Value::from("b"))]).unwrap();
        let schema = Rc::new(Schema::join(&left.schema(), &right.schema()));
        let split = left.schema().len();
        let pair = Tuple::from(CompoundTuple::new(schema, split, a.clone().into(), b.clone().into()));

        // First occurrence wins for names.
        assert_eq!(pair.get("name").unwrap(), Value::String("A".into()));
        let right_name = right.attribute("name").unwrap();
        assert_eq!(pair.get(&right_name).unwrap(), Value::String("B".into()));

        pair.set(&right_name, "bee").unwrap();
        assert_eq!(b.raw("name").unwrap(), Value::String("bee".into()));
        assert_eq!(pair.component(right.id()), Some(b));
    }

    #[test]
    fn test_compound_equality_is_structural() {
        let set = people();
        let a = Tuple::from(set.build([("name", Value::from("a"))]).unwrap());
        let b = Tuple::from(set.build([("name", Value::from("b"))]).unwrap());
        let schema = Rc::new(Schema::join(&set.schema(), &set.schema()));
        let split = set.schema().len();
        let ab1 = CompoundTuple::new(schema.clone(), split, a.clone(), b.clone());
        let ab2 = CompoundTuple::new(schema.clone(), split, a.clone(), b.clone());
        let ba = CompoundTuple::new(schema, split, b, a);
        assert_eq!(ab1, ab2);
        assert_ne!(ab1, ba);
    }

    #[test]
    fn test_projected_is_read_only() {
        let set = people();
        let name = set.attribute("name").unwrap();
        let schema = Rc::new(Schema::new("people", vec![name]));
        let p = Tuple::from(ProjectedTuple::new(schema.clone(), vec!["x".into()]));
        assert_eq!(p.get("name").unwrap(), Value::String("X".into()));
        assert_eq!(p.set("name", "y").unwrap_err().kind(), ErrorKind::Usage);
        assert!(p.signal("name").is_err());

        let q = Tuple::from(ProjectedTuple::new(schema, vec!["x".into()]));
        assert_eq!(p, q);
    }

    #[test]
    fn test_update_channel_reports_changes() {
        let set = people();
        let t = set.build([("name", Value::from("a"))]).unwrap();
        let seen = Rc::new(core::cell::RefCell::new(Vec::new()));
        let seen_in = seen.clone();
        t.on_update(move |change| seen_in.borrow_mut().push((change.old.clone(), change.new.clone())));

        t.set("name", "b").unwrap();
        t.set("name", "b").unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![(Value::String("a".into()), Value::String("b".into()))]
        );
    }
}
