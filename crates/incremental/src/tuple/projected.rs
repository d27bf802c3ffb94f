//! Value copies produced by row-level projection.

use crate::schema::{AttributeRef, Schema};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use tessel_core::{Result, Value};

struct ProjectedNode {
    schema: Rc<Schema>,
    values: RefCell<Vec<Value>>,
}

/// A tuple holding copies of a subset of another tuple's values.
///
/// Two projected tuples over the same attributes are equal when their values
/// are equal.
#[derive(Clone)]
pub struct ProjectedTuple(Rc<ProjectedNode>);

impl ProjectedTuple {
    pub(crate) fn new(schema: Rc<Schema>, values: Vec<Value>) -> Self {
        ProjectedTuple(Rc::new(ProjectedNode {
            schema,
            values: RefCell::new(values),
        }))
    }

    #[inline]
    pub fn schema(&self) -> &Rc<Schema> {
        &self.0.schema
    }

    pub fn get<'a>(&self, attribute: impl Into<AttributeRef<'a>>) -> Result<Value> {
        let pos = self.0.schema.locate(attribute.into())?;
        Ok(self.0.schema.attributes()[pos].read(&self.0.values.borrow()[pos]))
    }

    pub(crate) fn raw(&self, attribute: AttributeRef<'_>) -> Result<Value> {
        let pos = self.0.schema.locate(attribute)?;
        Ok(self.0.values.borrow()[pos].clone())
    }

    /// Returns the stored values in schema order.
    pub fn values(&self) -> Vec<Value> {
        self.0.values.borrow().clone()
    }

    pub(crate) fn has_values(&self, values: &[Value]) -> bool {
        self.0.values.borrow().as_slice() == values
    }

    pub(crate) fn replace(&self, values: Vec<Value>) {
        *self.0.values.borrow_mut() = values;
    }
}

impl PartialEq for ProjectedTuple {
    fn eq(&self, other: &Self) -> bool {
        if Rc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        self.0.schema.attributes() == other.0.schema.attributes()
            && *self.0.values.borrow() == *other.0.values.borrow()
    }
}

impl fmt::Debug for ProjectedTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self.0.values.borrow();
        let mut map = f.debug_map();
        for (attribute, value) in self.0.schema.attributes().iter().zip(values.iter()) {
            map.entry(&attribute.name(), value);
        }
        map.finish()
    }
}
