//! Live inner join.

use super::materialized::{forward, Materialized, RelationEvents, UpdateGuard};
use super::Relation;
use crate::delta::{diff, DeltaBatchExt};
use crate::predicate::Predicate;
use crate::schema::Schema;
use crate::tuple::{CompoundTuple, Tuple, TupleUpdate};
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use tessel_core::Result;
use tessel_reactive::{KeeperId, Keepers, Retainable};

/// Second half of `left.join(right).on(predicate)`.
pub struct JoinBuilder {
    left: Relation,
    right: Relation,
}

impl JoinBuilder {
    pub(crate) fn new(left: Relation, right: Relation) -> Self {
        Self { left, right }
    }

    /// Completes the join with its predicate.
    ///
    /// The predicate is validated against the combined schema, left
    /// attributes first.
    pub fn on(self, predicate: Predicate) -> Result<Relation> {
        InnerJoin::new(self.left, self.right, predicate).map(Relation::Join)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

pub(crate) struct JoinNode {
    core: Materialized,
    left: Relation,
    right: Relation,
    predicate: Predicate,
    schema: Rc<Schema>,
    split: usize,
    guard: UpdateGuard,
}

/// Every (left, right) pair satisfying a predicate, as compound tuples.
///
/// Pairs are unique, so joining a relation with itself yields each pair once.
#[derive(Clone)]
pub struct InnerJoin(Rc<JoinNode>);

impl InnerJoin {
    pub(crate) fn new(left: Relation, right: Relation, predicate: Predicate) -> Result<Self> {
        let left_schema = left.schema();
        let schema = Rc::new(Schema::join(&left_schema, &right.schema()));
        predicate.validate(&schema)?;
        Ok(InnerJoin(Rc::new(JoinNode {
            core: Materialized::new(),
            left,
            right,
            predicate,
            schema,
            split: left_schema.len(),
            guard: UpdateGuard::default(),
        })))
    }

    pub fn left(&self) -> &Relation {
        &self.0.left
    }

    pub fn right(&self) -> &Relation {
        &self.0.right
    }

    pub fn predicate(&self) -> &Predicate {
        &self.0.predicate
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
            self.0.initial_read()
        }
    }
}

impl JoinNode {
    fn pair(&self, side: Side, tuple: &Tuple, other: &Tuple) -> Tuple {
        let (left, right) = match side {
            Side::Left => (tuple, other),
            Side::Right => (other, tuple),
        };
        CompoundTuple::new(self.schema.clone(), self.split, left.clone(), right.clone()).into()
    }

    fn opposite(&self, side: Side) -> &Relation {
        match side {
            Side::Left => &self.right,
            Side::Right => &self.left,
        }
    }

    fn initial_read(&self) -> Result<Vec<Tuple>> {
        let right = self.right.read()?;
        let mut pairs = Vec::new();
        for left in self.left.read()? {
            for other in &right {
                let pair = self.pair(Side::Left, &left, other);
                if self.predicate.evaluate(&pair)? && !pairs.contains(&pair) {
                    pairs.push(pair);
                }
            }
        }
        Ok(pairs)
    }

    fn matches(&self, pair: &Tuple) -> bool {
        self.predicate.evaluate(pair).unwrap_or_else(|err| {
            tracing::error!(
                relation = self.core.id().get(),
                error = %err,
                "join predicate failed; treating pair as non-matching"
            );
            false
        })
    }

    fn partners(&self, side: Side) -> Vec<Tuple> {
        self.opposite(side).read().unwrap_or_else(|err| {
            tracing::error!(relation = self.core.id().get(), error = %err, "join operand read failed");
            Vec::new()
        })
    }

    fn on_insert(&self, side: Side, tuple: &Tuple) {
        for other in self.partners(side) {
            let pair = self.pair(side, tuple, &other);
            if !self.core.contains(&pair) && self.matches(&pair) {
                self.core.admit(pair);
            }
        }
    }

    fn on_delete(&self, side: Side, tuple: &Tuple) {
        let doomed: Vec<Tuple> = self
            .core
            .snapshot()
            .into_iter()
            .filter(|pair| {
                pair.as_compound().is_some_and(|c| match side {
                    Side::Left => c.left() == tuple,
                    Side::Right => c.right() == tuple,
                })
            })
            .collect();
        for pair in doomed {
            self.core.remove(&pair);
        }
    }

    fn on_update(&self, side: Side, update: &TupleUpdate) {
        let sequence = update.change.sequence;
        for other in self.partners(side) {
            let pair = self.pair(side, &update.tuple, &other);
            // A self-join sees the change once per side.
            if !self.guard.first_delivery(&pair, sequence) {
                continue;
            }
            match (self.core.find(&pair), self.matches(&pair)) {
                (Some(existing), true) => self.core.emit_update(&TupleUpdate {
                    tuple: existing,
                    change: update.change.clone(),
                }),
                (Some(existing), false) => {
                    self.core.remove(&existing);
                }
                (None, true) => self.core.admit(pair),
                (None, false) => {}
            }
        }
    }

    fn on_predicate_changed(&self) {
        let fresh = match self.initial_read() {
            Ok(pairs) => pairs,
            Err(err) => {
                tracing::error!(
                    relation = self.core.id().get(),
                    error = %err,
                    "join recompute after predicate change failed"
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
            "join predicate changed; pairs recomputed"
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

impl Retainable for InnerJoin {
    fn keeper_id(&self) -> KeeperId {
        self.0.core.id()
    }

    fn keepers(&self) -> &Keepers {
        self.0.core.keepers()
    }

    fn dependencies(&self) -> Vec<&dyn Retainable> {
        vec![
            &self.0.left as &dyn Retainable,
            &self.0.right,
            &self.0.predicate,
        ]
    }

    fn activate(&self) -> Result<()> {
        let node = &self.0;
        node.core.seed(node.initial_read()?);

        for side in [Side::Left, Side::Right] {
            let events = match side {
                Side::Left => node.left.events(),
                Side::Right => node.right.events(),
            };
            let core = &node.core;
            core.hold(events.insert.subscribe(forward(node, move |n: &JoinNode, t: &Tuple| {
                n.on_insert(side, t)
            })));
            core.hold(events.delete.subscribe(forward(node, move |n: &JoinNode, t: &Tuple| {
                n.on_delete(side, t)
            })));
            core.hold(events.update.subscribe(forward(node, move |n: &JoinNode, u: &TupleUpdate| {
                n.on_update(side, u)
            })));
        }
        node.core.hold(node.predicate.changed().subscribe(forward(node, |n: &JoinNode, _: &()| {
            n.on_predicate_changed()
        })));
        Ok(())
    }

    fn deactivate(&self) {
        self.0.core.teardown();
        self.0.guard.reset();
    }
}
