//! Live set-level projection.

use super::materialized::{forward, Materialized, RelationEvents, UpdateGuard};
use super::{Relation, Set};
use crate::schema::Schema;
use crate::tuple::{PrimitiveTuple, Tuple, TupleUpdate};
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;
use tessel_core::{Error, Result};
use tessel_reactive::{KeeperId, Keepers, Retainable};

pub(crate) struct SetProjectionNode {
    core: Materialized,
    operand: Relation,
    target: Set,
    lineage: RefCell<Vec<(Tuple, PrimitiveTuple)>>,
    guard: UpdateGuard,
}

/// The distinct members of one set found inside the operand's tuples.
///
/// Yields the actual member tuples, so writes and persistence go straight to
/// the target set.
#[derive(Clone)]
pub struct SetProjection(Rc<SetProjectionNode>);

impl SetProjection {
    pub(crate) fn new(operand: Relation, target: Set) -> Result<Self> {
        let schema = operand.schema();
        if !schema.contains(&target.identity_attribute()) {
            return Err(Error::unknown_attribute(schema.name(), target.name()));
        }
        Ok(SetProjection(Rc::new(SetProjectionNode {
            core: Materialized::new(),
            operand,
            target,
            lineage: RefCell::new(Vec::new()),
            guard: UpdateGuard::default(),
        })))
    }

    pub fn operand(&self) -> &Relation {
        &self.0.operand
    }

    /// Returns the projected set.
    pub fn target(&self) -> &Set {
        &self.0.target
    }

    pub fn schema(&self) -> Rc<Schema> {
        self.0.target.schema()
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

impl SetProjectionNode {
    fn component(&self, tuple: &Tuple) -> Option<PrimitiveTuple> {
        tuple.component(self.target.id())
    }

    fn compute(&self) -> Result<(Vec<(Tuple, PrimitiveTuple)>, Vec<Tuple>)> {
        let mut lineage = Vec::new();
        let mut tuples: Vec<Tuple> = Vec::new();
        for tuple in self.operand.read()? {
            if let Some(member) = self.component(&tuple) {
                let projected = Tuple::Primitive(member.clone());
                if !tuples.contains(&projected) {
                    tuples.push(projected);
                }
                lineage.push((tuple, member));
            }
        }
        Ok((lineage, tuples))
    }

    fn on_insert(&self, tuple: &Tuple) {
        let member = match self.component(tuple) {
            Some(member) => member,
            None => return,
        };
        self.lineage.borrow_mut().push((tuple.clone(), member.clone()));
        let projected = Tuple::Primitive(member);
        if !self.core.contains(&projected) {
            self.core.admit(projected);
        }
    }

    fn on_delete(&self, tuple: &Tuple) {
        let member = {
            let mut lineage = self.lineage.borrow_mut();
            match lineage.iter().position(|(t, _)| t == tuple) {
                Some(pos) => lineage.remove(pos).1,
                None => return,
            }
        };
        let shared = self.lineage.borrow().iter().any(|(_, m)| *m == member);
        if !shared {
            self.core.remove(&Tuple::Primitive(member));
        }
    }

    fn on_update(&self, update: &TupleUpdate) {
        if update.change.attribute.owner() != self.target.id() {
            return;
        }
        let member = match self.component(&update.tuple) {
            Some(member) => Tuple::Primitive(member),
            None => return,
        };
        if self.core.contains(&member) && self.guard.first_delivery(&member, update.change.sequence)
        {
            self.core.emit_update(&TupleUpdate {
                tuple: member,
                change: update.change.clone(),
            });
        }
    }
}

impl Retainable for SetProjection {
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
        core.hold(events.insert.subscribe(forward(node, |n: &SetProjectionNode, t: &Tuple| {
            n.on_insert(t)
        })));
        core.hold(events.delete.subscribe(forward(node, |n: &SetProjectionNode, t: &Tuple| {
            n.on_delete(t)
        })));
        core.hold(events.update.subscribe(forward(
            node,
            |n: &SetProjectionNode, u: &TupleUpdate| n.on_update(u),
        )));
        Ok(())
    }

    fn deactivate(&self) {
        self.0.core.teardown();
        self.0.lineage.borrow_mut().clear();
        self.0.guard.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use core::cell::Cell;
    use tessel_core::{DataType, Value};

    fn sets() -> (Set, Set) {
        let questions = Set::builder("questions")
            .unwrap()
            .attribute("title", DataType::String)
            .unwrap()
            .build();
        let answers = Set::builder("answers")
            .unwrap()
            .attribute("question_id", DataType::Integer)
            .unwrap()
            .build();
        (questions, answers)
    }

    #[test]
    fn test_projects_distinct_members() {
        let (questions, answers) = sets();
        let q = questions.create([("id", 1)]).unwrap();
        answers.create([("question_id", 1)]).unwrap();
        answers.create([("question_id", 1)]).unwrap();

        let qid = answers.attribute("question_id").unwrap();
        let join = questions.join(&answers).on(qid.eq(questions.identity_attribute())).unwrap();
        let projected = join.project_set(&questions).unwrap();

        assert_eq!(projected.read().unwrap(), vec![Tuple::from(q)]);
        assert_eq!(projected.base_set(), Some(questions));
    }

    #[test]
    fn test_fan_in_update_delivered_once() {
        let (questions, answers) = sets();
        let q = questions
            .create([("id", Value::from(1)), ("title", Value::from("old"))])
            .unwrap();
        let a1 = answers.create([("question_id", 1)]).unwrap();
        answers.create([("question_id", 1)]).unwrap();

        let qid = answers.attribute("question_id").unwrap();
        let join = questions.join(&answers).on(qid.eq(questions.identity_attribute())).unwrap();
        let projected = join.project_set(&questions).unwrap();
        projected.retain(KeeperId::next()).unwrap();

        let updates = Rc::new(Cell::new(0));
        let seen = updates.clone();
        projected.on_update(move |_| seen.set(seen.get() + 1)).unwrap();

        q.set("title", "new").unwrap();
        assert_eq!(updates.get(), 1);

        // Answer-side changes are not changes of the projected set.
        a1.set("question_id", 1).unwrap();
        answers.delete(&a1).unwrap();
        assert_eq!(projected.materialized().unwrap().len(), 1);
        assert_eq!(updates.get(), 1);
    }

    #[test]
    fn test_target_must_be_reachable() {
        let (questions, answers) = sets();
        assert!(answers.relation().project_set(&questions).is_err());
    }
}
