//! Base relations.

use super::materialized::RelationEvents;
use super::{JoinBuilder, Relation, SingletonRelation};
use crate::field::{Field, FieldChange};
use crate::predicate::Predicate;
use crate::schema::{Attribute, Schema, SetBuilder};
use crate::tuple::{PrimitiveTuple, Tuple, TupleUpdate};
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use hashbrown::HashSet;
use tessel_core::{Error, Result, Value};
use tessel_reactive::{KeeperId, Keepers, Retainable};

pub(crate) struct SetNode {
    id: KeeperId,
    schema: Rc<Schema>,
    keepers: Keepers,
    events: RelationEvents,
    tuples: RefCell<Vec<PrimitiveTuple>>,
    identities: RefCell<HashSet<Value>>,
}

/// A base relation whose members are inserted and deleted explicitly.
///
/// Identity values are unique among members. Every member's field updates
/// are republished as updates of the set.
#[derive(Clone)]
pub struct Set(Rc<SetNode>);

impl Set {
    /// Starts a set definition.
    pub fn builder(name: impl Into<String>) -> Result<SetBuilder> {
        SetBuilder::new(name)
    }

    pub(crate) fn from_schema(id: KeeperId, schema: Schema) -> Self {
        Set(Rc::new(SetNode {
            id,
            schema: Rc::new(schema),
            keepers: Keepers::new(),
            events: RelationEvents::default(),
            tuples: RefCell::new(Vec::new()),
            identities: RefCell::new(HashSet::new()),
        }))
    }

    pub(crate) fn from_node(node: Rc<SetNode>) -> Self {
        Set(node)
    }

    #[inline]
    pub fn id(&self) -> KeeperId {
        self.0.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.0.schema.name()
    }

    #[inline]
    pub fn schema(&self) -> Rc<Schema> {
        self.0.schema.clone()
    }

    /// Looks up a declared attribute by name.
    pub fn attribute(&self, name: &str) -> Result<Attribute> {
        self.0.schema.resolve(name.into())
    }

    /// Returns the identity attribute.
    pub fn identity_attribute(&self) -> Attribute {
        self.0.schema.attributes()[0].clone()
    }

    /// Builds a tuple without inserting it.
    ///
    /// Unnamed attributes take their defaults. Fails on unknown names and on
    /// values that cannot be converted.
    pub fn build<'a, I, V>(&self, values: I) -> Result<PrimitiveTuple>
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Into<Value>,
    {
        let mut provided: Vec<Option<Value>> = Vec::new();
        provided.resize(self.0.schema.len(), None);
        for (name, raw) in values {
            let pos = self.0.schema.locate(name.into())?;
            provided[pos] = Some(self.0.schema.attributes()[pos].convert(raw.into())?);
        }
        self.assemble(provided)
    }

    /// Builds a tuple from values that are already converted, by position.
    pub(crate) fn assemble(&self, provided: Vec<Option<Value>>) -> Result<PrimitiveTuple> {
        let mut fields = Vec::with_capacity(self.0.schema.len());
        for (attribute, value) in self.0.schema.attributes().iter().zip(provided) {
            let value = match value {
                Some(v) => v,
                None => attribute.default_value()?,
            };
            fields.push(Field::new(attribute.clone(), value));
        }
        Ok(PrimitiveTuple::new(
            Rc::downgrade(&self.0),
            self.0.id,
            self.0.schema.clone(),
            fields,
        ))
    }

    /// Builds a tuple and inserts it.
    pub fn create<'a, I, V>(&self, values: I) -> Result<PrimitiveTuple>
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Into<Value>,
    {
        let tuple = self.build(values)?;
        self.insert(&tuple)?;
        Ok(tuple)
    }

    /// Adds a tuple built by this set and publishes the insert.
    pub fn insert(&self, tuple: &PrimitiveTuple) -> Result<()> {
        if tuple.set_id() != self.0.id {
            return Err(Error::foreign_tuple(self.name(), tuple.schema().name()));
        }
        if tuple.is_member() {
            return Err(Error::invalid_operation(format!(
                "tuple is already a member of {}",
                self.name()
            )));
        }
        let identity = tuple.identity();
        if identity.is_null() {
            return Err(Error::invalid_operation(format!(
                "cannot insert a tuple without identity into {}",
                self.name()
            )));
        }
        if !self.0.identities.borrow_mut().insert(identity.clone()) {
            return Err(Error::duplicate_identity(self.name(), identity));
        }

        self.0.tuples.borrow_mut().push(tuple.clone());
        let set = Rc::downgrade(&self.0);
        let member = tuple.downgrade();
        tuple.attach(tuple.on_update(move |change| {
            if let (Some(set), Some(member)) = (set.upgrade(), member.upgrade()) {
                Set(set).on_member_update(member, change);
            }
        }));

        self.0.events.insert.publish(&Tuple::Primitive(tuple.clone()));
        Ok(())
    }

    /// Removes a member and publishes the delete.
    pub fn delete(&self, tuple: &PrimitiveTuple) -> Result<()> {
        let pos = self
            .0
            .tuples
            .borrow()
            .iter()
            .position(|t| t == tuple)
            .ok_or_else(|| Error::not_a_member(self.name()))?;
        let removed = self.0.tuples.borrow_mut().remove(pos);
        self.0.identities.borrow_mut().remove(&removed.identity());
        removed.detach();

        self.0.events.delete.publish(&Tuple::Primitive(removed));
        Ok(())
    }

    fn on_member_update(&self, tuple: PrimitiveTuple, change: &FieldChange) {
        if change.attribute.is_identity() {
            let mut identities = self.0.identities.borrow_mut();
            identities.remove(&change.old);
            identities.insert(change.new.clone());
        }
        self.0.events.update.publish(&TupleUpdate {
            tuple: Tuple::Primitive(tuple),
            change: change.clone(),
        });
    }

    /// Finds the member with the given identity.
    pub fn find(&self, identity: impl Into<Value>) -> Option<PrimitiveTuple> {
        let identity = self.identity_attribute().convert(identity.into()).ok()?;
        if !self.has_identity(&identity) {
            return None;
        }
        self.0
            .tuples
            .borrow()
            .iter()
            .find(|t| t.identity() == identity)
            .cloned()
    }

    /// Returns true if a member has this identity.
    pub fn has_identity(&self, identity: &Value) -> bool {
        self.0.identities.borrow().contains(identity)
    }

    /// Returns true if `tuple` is a member.
    pub fn contains(&self, tuple: &PrimitiveTuple) -> bool {
        tuple.set_id() == self.0.id && tuple.is_member()
    }

    /// Returns the members in insertion order.
    pub fn tuples(&self) -> Vec<PrimitiveTuple> {
        self.0.tuples.borrow().clone()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.tuples.borrow().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.tuples.borrow().is_empty()
    }

    pub(crate) fn read(&self) -> Vec<Tuple> {
        self.0
            .tuples
            .borrow()
            .iter()
            .cloned()
            .map(Tuple::Primitive)
            .collect()
    }

    pub(crate) fn events(&self) -> &RelationEvents {
        &self.0.events
    }

    /// Returns this set as a relation.
    pub fn relation(&self) -> Relation {
        Relation::Set(self.clone())
    }

    pub fn filter(&self, predicate: Predicate) -> Result<Relation> {
        self.relation().filter(predicate)
    }

    pub fn project(&self, attributes: &[Attribute]) -> Result<Relation> {
        self.relation().project(attributes)
    }

    pub fn join(&self, other: impl Into<Relation>) -> JoinBuilder {
        self.relation().join(other)
    }

    pub fn order_by(&self, attribute: &Attribute) -> Result<Relation> {
        self.relation().order_by(attribute)
    }

    pub fn singleton(&self) -> SingletonRelation {
        self.relation().singleton()
    }
}

impl Retainable for Set {
    fn keeper_id(&self) -> KeeperId {
        self.0.id
    }

    fn keepers(&self) -> &Keepers {
        &self.0.keepers
    }
}

impl PartialEq for Set {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Set({}, {} tuples)", self.name(), self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use core::cell::Cell;
    use tessel_core::{DataType, ErrorKind};

    fn answers() -> Set {
        Set::builder("answers")
            .unwrap()
            .attribute("question_id", DataType::Integer)
            .unwrap()
            .attribute("body", DataType::String)
            .unwrap()
            .build()
    }

    #[test]
    fn test_build_applies_defaults_and_identity() {
        let set = answers();
        let a = set.build([("body", "hello")]).unwrap();
        let b = set.build([("body", "world")]).unwrap();
        assert!(a.identity().as_i64().is_some());
        assert_ne!(a.identity(), b.identity());
        assert_eq!(a.get("question_id").unwrap(), Value::Null);
        assert!(!a.is_member());
    }

    #[test]
    fn test_build_rejects_unknown_and_unconvertible() {
        let set = answers();
        let err = set.build([("score", Value::Integer(1))]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        let err = set.build([("question_id", "one")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conversion);
    }

    #[test]
    fn test_insert_and_delete() {
        let set = answers();
        let t = set.create([("id", Value::Integer(1))]).unwrap();
        assert!(set.contains(&t));
        assert_eq!(set.find(1), Some(t.clone()));
        assert_eq!(set.find("1"), Some(t.clone()));

        set.delete(&t).unwrap();
        assert!(!set.contains(&t));
        assert!(set.find(1).is_none());
        assert!(matches!(set.delete(&t), Err(Error::NotAMember { .. })));
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let set = answers();
        set.create([("id", 7)]).unwrap();
        let dup = set.build([("id", 7)]).unwrap();
        let err = set.insert(&dup).unwrap_err();
        assert!(matches!(err, Error::DuplicateIdentity { .. }));
        assert_eq!(set.len(), 1);

        let other = set.create([("id", 8)]).unwrap();
        assert!(other.set("id", 7).is_err());
        assert_eq!(other.identity(), Value::Integer(8));
        other.set("id", 9).unwrap();
        assert!(set.find(9).is_some());
        assert!(set.find(8).is_none());
    }

    #[test]
    fn test_foreign_tuple_rejected() {
        let a = answers();
        let b = answers();
        let t = a.build([("id", 1)]).unwrap();
        assert!(matches!(b.insert(&t), Err(Error::ForeignTuple { .. })));
        a.insert(&t).unwrap();
        assert!(a.insert(&t).is_err());
    }

    #[test]
    fn test_member_updates_republished() {
        let set = answers();
        let keeper = KeeperId::next();
        set.retain(keeper).unwrap();

        let count = Rc::new(Cell::new(0));
        let seen = count.clone();
        set.relation()
            .on_update(move |update| {
                assert_eq!(update.change.attribute.name(), "body");
                seen.set(seen.get() + 1);
            })
            .unwrap();

        let t = set.create([("body", "a")]).unwrap();
        t.set("body", "b").unwrap();
        set.delete(&t).unwrap();
        t.set("body", "c").unwrap();
        assert_eq!(count.get(), 1);
        assert_eq!(set.tuples(), vec![]);
    }

    #[test]
    fn test_subscribing_to_dormant_set_fails() {
        let set = answers();
        let err = set.relation().on_insert(|_| {}).unwrap_err();
        assert!(matches!(err, Error::Dormant { .. }));
    }
}
