//! Join results.

use super::{PrimitiveTuple, Tuple};
use crate::schema::{Attribute, AttributeRef, Schema};
use alloc::rc::Rc;
use core::fmt;
use tessel_core::{Result, Value};
use tessel_reactive::KeeperId;

struct CompoundNode {
    schema: Rc<Schema>,
    split: usize,
    left: Tuple,
    right: Tuple,
}

/// A pair of tuples produced by a join.
///
/// Attribute access goes through the join schema: the first `split`
/// attributes are read from `left`, the rest from `right`.
#[derive(Clone)]
pub struct CompoundTuple(Rc<CompoundNode>);

impl CompoundTuple {
    pub(crate) fn new(schema: Rc<Schema>, split: usize, left: Tuple, right: Tuple) -> Self {
        CompoundTuple(Rc::new(CompoundNode {
            schema,
            split,
            left,
            right,
        }))
    }

    #[inline]
    pub fn left(&self) -> &Tuple {
        &self.0.left
    }

    #[inline]
    pub fn right(&self) -> &Tuple {
        &self.0.right
    }

    #[inline]
    pub fn schema(&self) -> &Rc<Schema> {
        &self.0.schema
    }

    fn route(&self, attribute: AttributeRef<'_>) -> Result<(&Tuple, Attribute)> {
        let pos = self.0.schema.locate(attribute)?;
        let attribute = self.0.schema.attributes()[pos].clone();
        let side = if pos < self.0.split {
            &self.0.left
        } else {
            &self.0.right
        };
        Ok((side, attribute))
    }

    /// Reads an attribute from the side that declares it.
    pub fn get<'a>(&self, attribute: impl Into<AttributeRef<'a>>) -> Result<Value> {
        let (side, attribute) = self.route(attribute.into())?;
        side.get(&attribute)
    }

    pub(crate) fn raw(&self, attribute: AttributeRef<'_>) -> Result<Value> {
        let (side, attribute) = self.route(attribute)?;
        side.raw(&attribute)
    }

    pub(crate) fn declaring(&self, attribute: AttributeRef<'_>) -> Result<(PrimitiveTuple, Attribute)> {
        let (side, attribute) = self.route(attribute)?;
        side.declaring((&attribute).into())
    }

    pub(crate) fn component(&self, set: KeeperId) -> Option<PrimitiveTuple> {
        self.0
            .left
            .component(set)
            .or_else(|| self.0.right.component(set))
    }

    /// Returns true if `tuple` is one of the two sides.
    pub fn contains(&self, tuple: &Tuple) -> bool {
        self.0.left == *tuple || self.0.right == *tuple
    }
}

impl PartialEq for CompoundTuple {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
            || (self.0.left == other.0.left && self.0.right == other.0.right)
    }
}

impl fmt::Debug for CompoundTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Compound")
            .field(&self.0.left)
            .field(&self.0.right)
            .finish()
    }
}
