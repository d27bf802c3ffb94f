//! Live filter.

use super::materialized::{forward, Materialized, RelationEvents};
use super::Relation;
use crate::delta::{diff, DeltaBatchExt};
use crate::predicate::Predicate;
use crate::schema::Schema;
use crate::tuple::{Tuple, TupleUpdate};
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use tessel_core::Result;
use tessel_reactive::{KeeperId, Keepers, Retainable};

pub(crate) struct SelectionNode {
    core: Materialized,
    operand: Relation,
    predicate: Predicate,
}

/// The operand tuples that satisfy a predicate.
///
/// Tuples keep the order in which they were admitted.
#[derive(Clone)]
pub struct Selection(Rc<SelectionNode>);

impl Selection {
    pub(crate) fn new(operand: Relation, predicate: Predicate) -> Result<Self> {
        predicate.validate(&operand.schema())?;
        Ok(Selection(Rc::new(SelectionNode {
            core: Materialized::new(),
            operand,
            predicate,
        })))
    }

    pub fn operand(&self) -> &Relation {
        &self.0.operand
    }

    pub fn predicate(&self) -> &Predicate {
        &self.0.predicate
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

impl SelectionNode {
    fn initial_read(&self) -> Result<Vec<Tuple>> {
        let mut selected = Vec::new();
        for tuple in self.operand.read()? {
            if self.predicate.evaluate(&tuple)? {
                selected.push(tuple);
            }
        }
        Ok(selected)
    }

    fn matches(&self, tuple: &Tuple) -> bool {
        self.predicate.evaluate(tuple).unwrap_or_else(|err| {
            tracing::error!(
                relation = self.core.id().get(),
                error = %err,
                "predicate failed; treating tuple as non-matching"
            );
            false
        })
    }

    fn on_insert(&self, tuple: &Tuple) {
        if self.matches(tuple) {
            self.core.admit(tuple.clone());
        }
    }

    fn on_delete(&self, tuple: &Tuple) {
        self.core.remove(tuple);
    }

    fn on_update(&self, update: &TupleUpdate) {
        match (self.core.contains(&update.tuple), self.matches(&update.tuple)) {
            (true, true) => self.core.emit_update(update),
            (true, false) => {
                self.core.remove(&update.tuple);
            }
            (false, true) => self.core.admit(update.tuple.clone()),
            (false, false) => {}
        }
    }

    fn on_predicate_changed(&self) {
        let fresh = match self.initial_read() {
            Ok(tuples) => tuples,
            Err(err) => {
                tracing::error!(
                    relation = self.core.id().get(),
                    error = %err,
                    "recompute after predicate change failed"
                );
                return;
            }
        };
        let deltas = diff(&self.core.snapshot(), &fresh);
        let (added, removed) = deltas.counts();
        tracing::debug!(
            relation = self.core.id().get(),
            added,
            removed,
            "predicate changed; membership recomputed"
        );

        for delta in deltas {
            if delta.is_delete() {
                self.core.remove(&delta.data);
            } else {
                self.core.admit(delta.data);
            }
        }
        self.core.seed(fresh);
    }
}

impl Retainable for Selection {
    fn keeper_id(&self) -> KeeperId {
        self.0.core.id()
    }

    fn keepers(&self) -> &Keepers {
        self.0.core.keepers()
    }

    fn dependencies(&self) -> Vec<&dyn Retainable> {
        vec![&self.0.operand as &dyn Retainable, &self.0.predicate]
    }

    fn activate(&self) -> Result<()> {
        let node = &self.0;
        node.core.seed(node.initial_read()?);

        let events = node.operand.events();
        let core = &node.core;
        core.hold(events.insert.subscribe(forward(node, |n: &SelectionNode, t: &Tuple| {
            n.on_insert(t)
        })));
        core.hold(events.delete.subscribe(forward(node, |n: &SelectionNode, t: &Tuple| {
            n.on_delete(t)
        })));
        core.hold(events.update.subscribe(forward(node, |n: &SelectionNode, u: &TupleUpdate| {
            n.on_update(u)
        })));
        core.hold(node.predicate.changed().subscribe(forward(node, |n: &SelectionNode, _: &()| {
            n.on_predicate_changed()
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
    use alloc::rc::Rc;
    use core::cell::RefCell;
    use tessel_core::{DataType, Value};

    fn answers() -> Set {
        Set::builder("answers")
            .unwrap()
            .attribute("question_id", DataType::Integer)
            .unwrap()
            .build()
    }

    #[test]
    fn test_dormant_read_computes() {
        let set = answers();
        set.create([("question_id", 1)]).unwrap();
        set.create([("question_id", 2)]).unwrap();
        let qid = set.attribute("question_id").unwrap();
        let selection = set.filter(qid.eq(1)).unwrap();

        assert!(!selection.is_retained());
        assert_eq!(selection.read().unwrap().len(), 1);
        assert!(selection.materialized().is_err());
    }

    #[test]
    fn test_update_moves_tuples_in_and_out() {
        let set = answers();
        let a = set.create([("question_id", 1)]).unwrap();
        let b = set.create([("question_id", 2)]).unwrap();
        let qid = set.attribute("question_id").unwrap();
        let selection = set.filter(qid.eq(1)).unwrap();
        selection.retain(KeeperId::next()).unwrap();

        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        selection.on_insert(move |t| l.borrow_mut().push(("insert", t.clone()))).unwrap();
        let l = log.clone();
        selection.on_delete(move |t| l.borrow_mut().push(("delete", t.clone()))).unwrap();
        let l = log.clone();
        selection
            .on_update(move |u| l.borrow_mut().push(("update", u.tuple.clone())))
            .unwrap();

        b.set("question_id", 1).unwrap();
        a.set("question_id", 3).unwrap();
        b.set("question_id", Value::Integer(1)).unwrap();

        let log = log.borrow();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0], ("insert", Tuple::from(b.clone())));
        assert_eq!(log[1], ("delete", Tuple::from(a.clone())));
        assert_eq!(selection.materialized().unwrap(), vec![Tuple::from(b)]);
    }

    #[test]
    fn test_release_stops_maintenance() {
        let set = answers();
        let qid = set.attribute("question_id").unwrap();
        let selection = set.filter(qid.eq(1)).unwrap();
        let keeper = KeeperId::next();
        selection.retain(keeper).unwrap();
        assert!(set.is_retained());

        selection.release(keeper).unwrap();
        assert!(!set.is_retained());
        assert!(set.relation().events().insert.is_empty());
        set.create([("question_id", 1)]).unwrap();
        assert_eq!(selection.read().unwrap().len(), 1);
    }
}
