//! Relations: sets and the live operators composed over them.
//!
//! Composing an operator validates it against its operand's schema and
//! returns a dormant relation. Retaining it retains its operands, computes
//! its contents from their current state and subscribes to their change
//! events; from then on every operand change is reflected before the
//! mutating call returns. Releasing the last keeper tears all of that down.
//!
//! Reads of a dormant relation compute a fresh answer from the operands.

mod join;
pub(crate) mod materialized;
mod order;
mod projection;
mod selection;
pub(crate) mod set;
mod set_projection;
mod singleton;

pub use join::{InnerJoin, JoinBuilder};
pub use materialized::RelationEvents;
pub use order::{Order, OrderBy};
pub use projection::Projection;
pub use selection::Selection;
pub use set::Set;
pub use set_projection::SetProjection;
pub use singleton::{SingletonChange, SingletonRelation};

use crate::predicate::Predicate;
use crate::schema::{Attribute, Schema};
use crate::tuple::{Tuple, TupleUpdate};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;
use tessel_core::{Error, Result};
use tessel_reactive::{KeeperId, Keepers, Retainable, SubscriptionHandle};

/// Any relation: a set or an operator over other relations.
#[derive(Clone)]
pub enum Relation {
    Set(Set),
    Selection(Selection),
    Projection(Projection),
    SetProjection(SetProjection),
    Join(InnerJoin),
    OrderBy(OrderBy),
    Singleton(SingletonRelation),
}

impl Relation {
    fn as_retainable(&self) -> &dyn Retainable {
        match self {
            Relation::Set(r) => r,
            Relation::Selection(r) => r,
            Relation::Projection(r) => r,
            Relation::SetProjection(r) => r,
            Relation::Join(r) => r,
            Relation::OrderBy(r) => r,
            Relation::Singleton(r) => r,
        }
    }

    /// Returns the id this relation uses as a keeper.
    pub fn id(&self) -> KeeperId {
        self.as_retainable().keeper_id()
    }

    /// Returns the attribute list of this relation.
    pub fn schema(&self) -> Rc<Schema> {
        match self {
            Relation::Set(r) => r.schema(),
            Relation::Selection(r) => r.schema(),
            Relation::Projection(r) => r.schema(),
            Relation::SetProjection(r) => r.schema(),
            Relation::Join(r) => r.schema(),
            Relation::OrderBy(r) => r.schema(),
            Relation::Singleton(r) => r.schema(),
        }
    }

    /// Looks up an attribute by name.
    pub fn attribute(&self, name: &str) -> Result<Attribute> {
        self.schema().resolve(name.into())
    }

    /// Returns the current tuples.
    ///
    /// Retained relations answer from their materialized contents; dormant
    /// ones compute the answer from their operands.
    pub fn read(&self) -> Result<Vec<Tuple>> {
        match self {
            Relation::Set(r) => Ok(r.read()),
            Relation::Selection(r) => r.read(),
            Relation::Projection(r) => r.read(),
            Relation::SetProjection(r) => r.read(),
            Relation::Join(r) => r.read(),
            Relation::OrderBy(r) => r.read(),
            Relation::Singleton(r) => r.read(),
        }
    }

    /// Returns the materialized tuples. Fails on a dormant relation.
    pub fn materialized(&self) -> Result<Vec<Tuple>> {
        if !self.is_retained() {
            return Err(Error::dormant("read materialized tuples"));
        }
        self.read()
    }

    pub(crate) fn events(&self) -> &RelationEvents {
        match self {
            Relation::Set(r) => r.events(),
            Relation::Selection(r) => r.events(),
            Relation::Projection(r) => r.events(),
            Relation::SetProjection(r) => r.events(),
            Relation::Join(r) => r.events(),
            Relation::OrderBy(r) => r.events(),
            Relation::Singleton(r) => r.events(),
        }
    }

    fn require_retained(&self) -> Result<()> {
        if self.is_retained() {
            Ok(())
        } else {
            Err(Error::dormant("subscribe"))
        }
    }

    /// Subscribes to tuples entering the relation.
    pub fn on_insert<F>(&self, callback: F) -> Result<SubscriptionHandle>
    where
        F: Fn(&Tuple) + 'static,
    {
        self.require_retained()?;
        Ok(self.events().insert.subscribe(callback))
    }

    /// Subscribes to tuples leaving the relation.
    pub fn on_delete<F>(&self, callback: F) -> Result<SubscriptionHandle>
    where
        F: Fn(&Tuple) + 'static,
    {
        self.require_retained()?;
        Ok(self.events().delete.subscribe(callback))
    }

    /// Subscribes to field changes of member tuples.
    pub fn on_update<F>(&self, callback: F) -> Result<SubscriptionHandle>
    where
        F: Fn(&TupleUpdate) + 'static,
    {
        self.require_retained()?;
        Ok(self.events().update.subscribe(callback))
    }

    /// Returns the set whose tuples this relation yields, if there is one.
    ///
    /// Joins and row-level projections have none.
    pub fn base_set(&self) -> Option<Set> {
        match self {
            Relation::Set(r) => Some(r.clone()),
            Relation::Selection(r) => r.operand().base_set(),
            Relation::OrderBy(r) => r.operand().base_set(),
            Relation::Singleton(r) => r.operand().base_set(),
            Relation::SetProjection(r) => Some(r.target().clone()),
            Relation::Projection(_) | Relation::Join(_) => None,
        }
    }

    /// Keeps the tuples that satisfy `predicate`.
    pub fn filter(&self, predicate: Predicate) -> Result<Relation> {
        Selection::new(self.clone(), predicate).map(Relation::Selection)
    }

    /// Copies the values of `attributes` out of each tuple, dropping duplicates.
    pub fn project(&self, attributes: &[Attribute]) -> Result<Relation> {
        Projection::new(self.clone(), attributes).map(Relation::Projection)
    }

    /// Yields the members of `set` contained in each tuple, without duplicates.
    pub fn project_set(&self, set: &Set) -> Result<Relation> {
        SetProjection::new(self.clone(), set.clone()).map(Relation::SetProjection)
    }

    /// Starts an inner join; finish it with [`JoinBuilder::on`].
    pub fn join(&self, other: impl Into<Relation>) -> JoinBuilder {
        JoinBuilder::new(self.clone(), other.into())
    }

    /// Orders tuples by `attribute`, ascending.
    pub fn order_by(&self, attribute: &Attribute) -> Result<Relation> {
        OrderBy::new(self.clone(), attribute, Order::Asc).map(Relation::OrderBy)
    }

    /// Orders tuples by `attribute`, descending.
    pub fn order_by_desc(&self, attribute: &Attribute) -> Result<Relation> {
        OrderBy::new(self.clone(), attribute, Order::Desc).map(Relation::OrderBy)
    }

    /// Tracks the first tuple of this relation.
    pub fn singleton(&self) -> SingletonRelation {
        SingletonRelation::new(self.clone())
    }
}

impl Retainable for Relation {
    fn keeper_id(&self) -> KeeperId {
        self.as_retainable().keeper_id()
    }

    fn keepers(&self) -> &Keepers {
        self.as_retainable().keepers()
    }

    fn dependencies(&self) -> Vec<&dyn Retainable> {
        self.as_retainable().dependencies()
    }

    fn activate(&self) -> Result<()> {
        self.as_retainable().activate()
    }

    fn deactivate(&self) {
        self.as_retainable().deactivate()
    }
}

impl PartialEq for Relation {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Relation::Set(_) => "Set",
            Relation::Selection(_) => "Selection",
            Relation::Projection(_) => "Projection",
            Relation::SetProjection(_) => "SetProjection",
            Relation::Join(_) => "Join",
            Relation::OrderBy(_) => "OrderBy",
            Relation::Singleton(_) => "Singleton",
        };
        write!(f, "{}({} {})", kind, self.schema().name(), self.id())
    }
}

impl From<Set> for Relation {
    fn from(set: Set) -> Self {
        Relation::Set(set)
    }
}

impl From<&Set> for Relation {
    fn from(set: &Set) -> Self {
        Relation::Set(set.clone())
    }
}

impl From<&Relation> for Relation {
    fn from(relation: &Relation) -> Self {
        relation.clone()
    }
}

impl From<SingletonRelation> for Relation {
    fn from(singleton: SingletonRelation) -> Self {
        Relation::Singleton(singleton)
    }
}
