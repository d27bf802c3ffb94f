//! Tuples owned by a set.

use crate::field::{Field, FieldChange};
use crate::relation::set::SetNode;
use crate::relation::Set;
use crate::repository::Record;
use crate::schema::{Attribute, AttributeRef, Schema};
use crate::signal::Signal;
use alloc::rc::{Rc, Weak};
use alloc::string::ToString;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use tessel_core::{Error, Result, Value};
use tessel_reactive::{Channel, KeeperId, SubscriptionHandle};

pub(crate) struct PrimitiveNode {
    set: Weak<SetNode>,
    set_id: KeeperId,
    schema: Rc<Schema>,
    fields: RefCell<Vec<Field>>,
    updates: Channel<FieldChange>,
    membership: RefCell<Option<SubscriptionHandle>>,
}

/// A tuple built by a set, with one field per attribute of the set.
///
/// Handles are shared: cloning a `PrimitiveTuple` yields another reference to
/// the same fields, and equality is identity.
#[derive(Clone)]
pub struct PrimitiveTuple(Rc<PrimitiveNode>);

/// A non-owning reference to a [`PrimitiveTuple`].
#[derive(Clone)]
pub struct WeakPrimitiveTuple(Weak<PrimitiveNode>);

impl WeakPrimitiveTuple {
    /// Returns the tuple if it is still alive.
    pub fn upgrade(&self) -> Option<PrimitiveTuple> {
        self.0.upgrade().map(PrimitiveTuple)
    }
}

impl PrimitiveTuple {
    pub(crate) fn new(
        set: Weak<SetNode>,
        set_id: KeeperId,
        schema: Rc<Schema>,
        fields: Vec<Field>,
    ) -> Self {
        PrimitiveTuple(Rc::new(PrimitiveNode {
            set,
            set_id,
            schema,
            fields: RefCell::new(fields),
            updates: Channel::new(),
            membership: RefCell::new(None),
        }))
    }

    /// Returns the set that built this tuple, if it still exists.
    pub fn owner(&self) -> Option<Set> {
        self.0.set.upgrade().map(Set::from_node)
    }

    /// Returns the id of the set that built this tuple.
    #[inline]
    pub fn set_id(&self) -> KeeperId {
        self.0.set_id
    }

    /// Returns the schema of the owning set.
    #[inline]
    pub fn schema(&self) -> &Rc<Schema> {
        &self.0.schema
    }

    /// Returns the stored identity value.
    pub fn identity(&self) -> Value {
        self.0.fields.borrow()[0].value().clone()
    }

    /// Reads an attribute, applying its transform.
    pub fn get<'a>(&self, attribute: impl Into<AttributeRef<'a>>) -> Result<Value> {
        let pos = self.0.schema.locate(attribute.into())?;
        Ok(self.0.fields.borrow()[pos].read())
    }

    /// Reads the stored value of an attribute, without transform.
    pub fn raw<'a>(&self, attribute: impl Into<AttributeRef<'a>>) -> Result<Value> {
        let pos = self.0.schema.locate(attribute.into())?;
        Ok(self.0.fields.borrow()[pos].value().clone())
    }

    /// Converts and stores a value, publishing an update if it changed.
    ///
    /// Returns the converted value. Fails without storing anything when the
    /// value cannot be converted, or when it would duplicate the identity of
    /// another member of the owning set.
    pub fn set<'a>(
        &self,
        attribute: impl Into<AttributeRef<'a>>,
        value: impl Into<Value>,
    ) -> Result<Value> {
        let pos = self.0.schema.locate(attribute.into())?;
        let attribute = self.0.schema.attributes()[pos].clone();
        let value = attribute.convert(value.into())?;

        if attribute.is_identity() && self.is_member() {
            self.check_identity(&value)?;
        }

        let change = self.0.fields.borrow_mut()[pos].assign(value.clone());
        if let Some(change) = change {
            self.0.updates.publish(&change);
        }
        Ok(value)
    }

    fn check_identity(&self, value: &Value) -> Result<()> {
        let set = match self.owner() {
            Some(set) => set,
            None => return Ok(()),
        };
        if value.is_null() {
            return Err(Error::invalid_operation("identity of a member cannot be null"));
        }
        if *value != self.identity() && set.has_identity(value) {
            return Err(Error::duplicate_identity(set.name(), value.clone()));
        }
        Ok(())
    }

    /// Subscribes to field changes of this tuple.
    pub fn on_update<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&FieldChange) + 'static,
    {
        self.0.updates.subscribe(callback)
    }

    /// Returns a signal following one attribute of this tuple.
    pub fn signal<'a>(&self, attribute: impl Into<AttributeRef<'a>>) -> Result<Signal> {
        let pos = self.0.schema.locate(attribute.into())?;
        Signal::attribute(self, &self.0.schema.attributes()[pos])
    }

    /// Returns true while the tuple belongs to its set.
    pub fn is_member(&self) -> bool {
        self.0.membership.borrow().is_some()
    }

    pub(crate) fn attach(&self, handle: SubscriptionHandle) {
        *self.0.membership.borrow_mut() = Some(handle);
    }

    pub(crate) fn detach(&self) {
        if let Some(handle) = self.0.membership.borrow_mut().take() {
            handle.cancel();
        }
    }

    /// Returns true if any field differs from its persisted value.
    pub fn is_dirty(&self) -> bool {
        self.0.fields.borrow().iter().any(Field::is_dirty)
    }

    /// Returns the attributes whose fields are dirty.
    pub fn dirty_fields(&self) -> Vec<Attribute> {
        self.0
            .fields
            .borrow()
            .iter()
            .filter(|f| f.is_dirty())
            .map(|f| f.attribute().clone())
            .collect()
    }

    /// Records every field as persisted.
    pub fn mark_pushed(&self) {
        for field in self.0.fields.borrow_mut().iter_mut() {
            field.mark_pushed();
        }
    }

    /// Returns the stored values keyed by attribute name.
    pub fn to_record(&self) -> Record {
        self.0
            .fields
            .borrow()
            .iter()
            .map(|f| (f.attribute().name().to_string(), f.value().clone()))
            .collect()
    }

    /// Returns a non-owning reference.
    pub fn downgrade(&self) -> WeakPrimitiveTuple {
        WeakPrimitiveTuple(Rc::downgrade(&self.0))
    }

    /// Returns true if both handles refer to the same tuple.
    #[inline]
    pub fn ptr_eq(&self, other: &PrimitiveTuple) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for PrimitiveTuple {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for PrimitiveTuple {}

impl fmt::Debug for PrimitiveTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for field in self.0.fields.borrow().iter() {
            map.entry(&field.attribute().name(), field.value());
        }
        map.finish()
    }
}
