//! Live row-level projection.

use super::materialized::{forward, Materialized, RelationEvents, UpdateGuard};
use super::Relation;
use crate::schema::{Attribute, Schema};
use crate::tuple::{ProjectedTuple, Tuple, TupleUpdate};
use alloc::format;
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;
use tessel_core::{Error, Result, Value};
use tessel_reactive::{KeeperId, Keepers, Retainable};

type Key = Vec<Value>;

pub(crate) struct ProjectionNode {
    core: Materialized,
    operand: Relation,
    schema: Rc<Schema>,
    /// Each operand tuple with the key it currently contributes.
    lineage: RefCell<Vec<(Tuple, Key)>>,
    guard: UpdateGuard,
}

/// Copies of a subset of the operand's attributes, one per distinct value
/// combination.
#[derive(Clone)]
pub struct Projection(Rc<ProjectionNode>);

impl Projection {
    pub(crate) fn new(operand: Relation, attributes: &[Attribute]) -> Result<Self> {
        let source = operand.schema();
        if attributes.is_empty() {
            return Err(Error::invalid_operation("projection needs at least one attribute"));
        }
        for attribute in attributes {
            if !source.contains(attribute) {
                return Err(Error::unknown_attribute(source.name(), attribute.qualified_name()));
            }
        }
        let schema = Schema::new(format!("project({})", source.name()), attributes.to_vec());
        Ok(Projection(Rc::new(ProjectionNode {
            core: Materialized::new(),
            operand,
            schema: Rc::new(schema),
            lineage: RefCell::new(Vec::new()),
            guard: UpdateGuard::default(),
        })))
    }

    pub fn operand(&self) -> &Relation {
        &self.0.operand
    }

    pub fn schema(&self) -> Rc<Schema> {
        self.0.schema.clone()
    }

    pub(crate) fn events(&self) -> &RelationEvents {
        self.0.core.events()
    }

    pub(crate) fn read(&self) -> Result<Vec<Tuple>> {
        if self.is_retained() {
            Ok(self.0.core.snapshot())
        } else {
            self.0.compute().map(|(_, tuples)| tuples)
        }
    }
}

impl ProjectionNode {
    fn key(&self, tuple: &Tuple) -> Key {
        self.schema
            .attributes()
            .iter()
            .map(|a| tuple.raw(a).unwrap_or(Value::Null))
            .collect()
    }

    fn compute(&self) -> Result<(Vec<(Tuple, Key)>, Vec<Tuple>)> {
        let mut lineage = Vec::new();
        let mut keys: Vec<Key> = Vec::new();
        for tuple in self.operand.read()? {
            let key = self.key(&tuple);
            if !keys.contains(&key) {
                keys.push(key.clone());
            }
            lineage.push((tuple, key));
        }
        let tuples = keys
            .into_iter()
            .map(|key| ProjectedTuple::new(self.schema.clone(), key).into())
            .collect();
        Ok((lineage, tuples))
    }

    fn find(&self, key: &[Value]) -> Option<Tuple> {
        self.core
            .find_by(|t| t.as_projected().is_some_and(|p| p.has_values(key)))
    }

    fn admit(&self, key: Key) {
        self.core
            .admit(ProjectedTuple::new(self.schema.clone(), key).into());
    }

    fn on_insert(&self, tuple: &Tuple) {
        let key = self.key(tuple);
        self.lineage.borrow_mut().push((tuple.clone(), key.clone()));
        if self.find(&key).is_none() {
            self.admit(key);
        }
    }

    fn on_delete(&self, tuple: &Tuple) {
        let key = {
            let mut lineage = self.lineage.borrow_mut();
            match lineage.iter().position(|(t, _)| t == tuple) {
                Some(pos) => lineage.remove(pos).1,
                None => return,
            }
        };
        let shared = self.lineage.borrow().iter().any(|(_, k)| *k == key);
        if !shared {
            if let Some(projected) = self.find(&key) {
                self.core.remove(&projected);
            }
        }
    }

    fn on_update(&self, update: &TupleUpdate) {
        if !self.schema.contains(&update.change.attribute) {
            return;
        }
        let new_key = self.key(&update.tuple);
        let old_key = {
            let mut lineage = self.lineage.borrow_mut();
            let entry = match lineage.iter_mut().find(|(t, _)| *t == update.tuple) {
                Some(entry) => entry,
                None => return,
            };
            if entry.1 == new_key {
                return;
            }
            core::mem::replace(&mut entry.1, new_key.clone())
        };

        // Another source still projecting to the old key keeps it alive.
        // Entries reached by the same change later in this dispatch still
        // carry the old key, so their current values decide.
        let still_old = self
            .lineage
            .borrow()
            .iter()
            .any(|(t, k)| *k == old_key && self.key(t) == old_key);

        match (self.find(&old_key), self.find(&new_key)) {
            (Some(_), None) if still_old => self.admit(new_key),
            (Some(_), Some(_)) if still_old => {}
            (Some(old), Some(_)) => {
                self.core.remove(&old);
            }
            (Some(old), None) => {
                if let Some(projected) = old.as_projected() {
                    projected.replace(new_key);
                }
                if self.guard.first_delivery(&old, update.change.sequence) {
                    self.core.emit_update(&TupleUpdate {
                        tuple: old,
                        change: update.change.clone(),
                    });
                }
            }
            (None, None) => self.admit(new_key),
            // Already moved by an earlier delivery of this change.
            (None, Some(_)) => {}
        }
    }
}

impl Retainable for Projection {
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
        let (lineage, tuples) = node.compute()?;
        *node.lineage.borrow_mut() = lineage;
        node.core.seed(tuples);

        let events = node.operand.events();
        let core = &node.core;
        core.hold(events.insert.subscribe(forward(node, |n: &ProjectionNode, t: &Tuple| {
            n.on_insert(t)
        })));
        core.hold(events.delete.subscribe(forward(node, |n: &ProjectionNode, t: &Tuple| {
            n.on_delete(t)
        })));
        core.hold(events.update.subscribe(forward(node, |n: &ProjectionNode, u: &TupleUpdate| {
            n.on_update(u)
        })));
        Ok(())
    }

    fn deactivate(&self) {
        self.0.core.teardown();
        self.0.lineage.borrow_mut().clear();
        self.0.guard.reset();
    }
}
