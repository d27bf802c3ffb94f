//! First-tuple tracking.

use super::materialized::{forward, Materialized, RelationEvents};
use super::Relation;
use crate::schema::{Attribute, AttributeRef, Schema};
use crate::signal::Signal;
use crate::tuple::{Tuple, TupleUpdate};
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use tessel_core::{Error, Result, Value};
use tessel_reactive::{Channel, KeeperId, Keepers, Retainable, SubscriptionHandle};

/// The wrapped tuple changed, appeared or disappeared.
#[derive(Clone, Debug)]
pub struct SingletonChange {
    pub previous: Option<Tuple>,
    pub current: Option<Tuple>,
}

pub(crate) struct SingletonNode {
    core: Materialized,
    operand: Relation,
    changed: Channel<SingletonChange>,
}

/// At most one tuple: the first tuple of the operand.
#[derive(Clone)]
pub struct SingletonRelation(Rc<SingletonNode>);

impl SingletonRelation {
    pub(crate) fn new(operand: Relation) -> Self {
        SingletonRelation(Rc::new(SingletonNode {
            core: Materialized::new(),
            operand,
            changed: Channel::new(),
        }))
    }

    pub fn operand(&self) -> &Relation {
        &self.0.operand
    }

    pub fn schema(&self) -> Rc<Schema> {
        self.0.operand.schema()
    }

    /// Returns this singleton as a relation.
    pub fn relation(&self) -> Relation {
        Relation::Singleton(self.clone())
    }

    /// Returns the wrapped tuple.
    pub fn tuple(&self) -> Option<Tuple> {
        if self.is_retained() {
            self.0.core.first()
        } else {
            self.0.first()
        }
    }

    /// Reads one attribute of the wrapped tuple; `Null` when there is none.
    pub fn get<'a>(&self, attribute: impl Into<AttributeRef<'a>>) -> Result<Value> {
        match self.tuple() {
            Some(tuple) => tuple.get(attribute),
            None => {
                self.schema().locate(attribute.into())?;
                Ok(Value::Null)
            }
        }
    }

    /// Subscribes to changes of the wrapped tuple.
    pub fn on_change<F>(&self, callback: F) -> Result<SubscriptionHandle>
    where
        F: Fn(&SingletonChange) + 'static,
    {
        if !self.is_retained() {
            return Err(Error::dormant("subscribe"));
        }
        Ok(self.0.changed.subscribe(callback))
    }

    pub(crate) fn changed(&self) -> &Channel<SingletonChange> {
        &self.0.changed
    }

    /// A signal whose value is this relation, changing whenever it does.
    pub fn signal(&self) -> Signal {
        Signal::singleton(self)
    }

    /// A signal tracking one attribute of the wrapped tuple.
    pub fn attribute_signal(&self, attribute: &Attribute) -> Result<Signal> {
        let schema = self.schema();
        if !schema.contains(attribute) {
            return Err(Error::unknown_attribute(schema.name(), attribute.qualified_name()));
        }
        let attribute = attribute.clone();
        Ok(self.signal().derive(move |value| {
            value
                .as_object()
                .and_then(|object| object.downcast_ref::<SingletonRelation>())
                .and_then(SingletonRelation::tuple)
                .and_then(|tuple| tuple.get(&attribute).ok())
                .unwrap_or(Value::Null)
        }))
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

impl SingletonNode {
    fn first(&self) -> Option<Tuple> {
        match self.operand.read() {
            Ok(tuples) => tuples.into_iter().next(),
            Err(err) => {
                tracing::error!(relation = self.core.id().get(), error = %err, "singleton operand read failed");
                None
            }
        }
    }

    fn initial_read(&self) -> Result<Vec<Tuple>> {
        Ok(self.operand.read()?.into_iter().take(1).collect())
    }

    fn swap(&self, previous: Option<Tuple>, current: Option<Tuple>) {
        if let Some(tuple) = &previous {
            self.core.remove(tuple);
        }
        if let Some(tuple) = &current {
            self.core.admit(tuple.clone());
        }
        self.changed.publish(&SingletonChange { previous, current });
    }

    fn sync(&self) {
        let current = self.core.first();
        let first = self.first();
        if current != first {
            self.swap(current, first);
        }
    }

    fn on_update(&self, update: &TupleUpdate) {
        let current = self.core.first();
        let first = self.first();
        if current != first {
            self.swap(current, first);
        } else if current.as_ref() == Some(&update.tuple) {
            self.core.emit_update(update);
            self.changed.publish(&SingletonChange {
                previous: current.clone(),
                current,
            });
        }
    }
}

impl Retainable for SingletonRelation {
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
        core.hold(events.insert.subscribe(forward(node, |n: &SingletonNode, _: &Tuple| n.sync())));
        core.hold(events.delete.subscribe(forward(node, |n: &SingletonNode, _: &Tuple| n.sync())));
        core.hold(events.update.subscribe(forward(node, |n: &SingletonNode, u: &TupleUpdate| {
            n.on_update(u)
        })));
        Ok(())
    }

    fn deactivate(&self) {
        self.0.core.teardown();
    }
}

impl PartialEq for SingletonRelation {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
