//! Live ordering.

use super::materialized::{forward, Materialized, RelationEvents};
use super::Relation;
use crate::schema::{Attribute, Schema};
use crate::tuple::{Tuple, TupleUpdate};
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Ordering;
use tessel_core::{Error, Result, Value};
use tessel_reactive::{KeeperId, Keepers, Retainable};

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

pub(crate) struct OrderNode {
    core: Materialized,
    operand: Relation,
    attribute: Attribute,
    order: Order,
}

/// The operand's tuples sorted by one attribute.
///
/// The sort is stable: tuples with equal keys keep their arrival order.
#[derive(Clone)]
pub struct OrderBy(Rc<OrderNode>);

impl OrderBy {
    pub(crate) fn new(operand: Relation, attribute: &Attribute, order: Order) -> Result<Self> {
        let schema = operand.schema();
        if !schema.contains(attribute) {
            return Err(Error::unknown_attribute(schema.name(), attribute.qualified_name()));
        }
        Ok(OrderBy(Rc::new(OrderNode {
            core: Materialized::new(),
            operand,
            attribute: attribute.clone(),
            order,
        })))
    }

    pub fn operand(&self) -> &Relation {
        &self.0.operand
    }

    pub fn attribute(&self) -> &Attribute {
        &self.0.attribute
    }

    pub fn order(&self) -> Order {
        self.0.order
    }

    pub fn schema(&self) -> Rc<Schema> {
        self.0.operand.schema()
    }

    pub(crate) fn events(&self) -> &RelationEvents {
        self.0.core.events()
    }

    pub(crate) fn read(&self) -> Result<Vec<Tuple>> {
        if self.is_retained() {
            Ok(self.0.core.snapshot())
        } else {
            self.0.initial_read()
        }
    }
}

impl OrderNode {
    fn key(&self, tuple: &Tuple) -> Value {
        tuple.get(&self.attribute).unwrap_or(Value::Null)
    }

    fn compare(&self, a: &Tuple, b: &Tuple) -> Ordering {
        let ordering = self.key(a).cmp(&self.key(b));
        match self.order {
            Order::Asc => ordering,
            Order::Desc => ordering.reverse(),
        }
    }

    fn sort(&self, tuples: &mut [Tuple]) {
        tuples.sort_by(|a, b| self.compare(a, b));
    }

    fn initial_read(&self) -> Result<Vec<Tuple>> {
        let mut tuples = self.operand.read()?;
        self.sort(&mut tuples);
        Ok(tuples)
    }

    fn on_insert(&self, tuple: &Tuple) {
        {
            let mut tuples = self.core.tuples_mut();
            tuples.push(tuple.clone());
            self.sort(&mut tuples);
        }
        self.core.events().insert.publish(tuple);
    }

    fn on_delete(&self, tuple: &Tuple) {
        self.core.remove(tuple);
    }

    fn on_update(&self, update: &TupleUpdate) {
        if !self.core.contains(&update.tuple) {
            return;
        }
        if update.change.attribute == self.attribute {
            self.sort(&mut self.core.tuples_mut());
        }
        self.core.emit_update(update);
    }
}

impl Retainable for OrderBy {
    fn keeper_id(&self) -> KeeperId {
        self.0.core.id()
    }

    fn keepers(&self) -> &Keepers {
        self.0.core.keepers()
    }

    fn dependencies(&self) -> Vec<&dyn Retainable> {
        vec![&self.0.operand as &dyn Retainable]
    }

    fn activate(&self) -> Result<()> {
        let node = &self.0;
        node.core.seed(node.initial_read()?);

        let events = node.operand.events();
        let core = &node.core;
        core.hold(events.insert.subscribe(forward(node, |n: &OrderNode, t: &Tuple| {
            n.on_insert(t)
        })));
        core.hold(events.delete.subscribe(forward(node, |n: &OrderNode, t: &Tuple| {
            n.on_delete(t)
        })));
        core.hold(events.update.subscribe(forward(node, |n: &OrderNode, u: &TupleUpdate| {
            n.on_update(u)
        })));
        Ok(())
    }

    fn deactivate(&self) {
        self.0.core.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::Set;
    use tessel_core::DataType;

    fn scores() -> Set {
        Set::builder("scores")
            .unwrap()
            .attribute("points", DataType::Integer)
            .unwrap()
            .build()
    }

    fn points(relation: &Relation) -> Vec<Value> {
        relation
            .read()
            .unwrap()
            .iter()
            .map(|t| t.get("points").unwrap())
            .collect()
    }

    #[test]
    fn test_order_is_maintained() {
        let set = scores();
        let a = set.create([("points", 5)]).unwrap();
        set.create([("points", 1)]).unwrap();
        let points_attr = set.attribute("points").unwrap();
        let ordered = set.order_by(&points_attr).unwrap();
        assert_eq!(points(&ordered), vec![Value::Integer(1), Value::Integer(5)]);

        ordered.retain(KeeperId::next()).unwrap();
        set.create([("points", 3)]).unwrap();
        assert_eq!(
            points(&ordered),
            vec![Value::Integer(1), Value::Integer(3), Value::Integer(5)]
        );

        a.set("points", 0).unwrap();
        assert_eq!(
            points(&ordered),
            vec![Value::Integer(0), Value::Integer(1), Value::Integer(3)]
        );
    }

    #[test]
    fn test_descending_and_stable() {
        let set = scores();
        let first = set.create([("points", 2)]).unwrap();
        let second = set.create([("points", 2)]).unwrap();
        set.create([("points", 7)]).unwrap();
        let points_attr = set.attribute("points").unwrap();
        let ordered = set.relation().order_by_desc(&points_attr).unwrap();
        ordered.retain(KeeperId::next()).unwrap();

        let tuples = ordered.materialized().unwrap();
        assert_eq!(tuples[0].get("points").unwrap(), Value::Integer(7));
        assert_eq!(tuples[1], Tuple::from(first));
        assert_eq!(tuples[2], Tuple::from(second));
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let set = scores();
        let other = scores();
        let foreign = other.attribute("points").unwrap();
        assert!(set.order_by(&foreign).is_err());
    }
}
