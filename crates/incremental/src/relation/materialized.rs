//! State shared by every derived relation.

use crate::tuple::{Tuple, TupleUpdate};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell, RefMut};
use tessel_reactive::{Channel, KeeperId, Keepers, SubscriptionBundle, SubscriptionHandle};

/// The three change channels of a relation.
#[derive(Default)]
pub struct RelationEvents {
    pub(crate) insert: Channel<Tuple>,
    pub(crate) delete: Channel<Tuple>,
    pub(crate) update: Channel<TupleUpdate>,
}

/// Wraps a handler so that it holds its node weakly.
///
/// Subscriptions live in the operand's channels, so a strong reference would
/// keep the subscriber alive through its own dependency.
pub(crate) fn forward<N, E, F>(node: &Rc<N>, handler: F) -> impl Fn(&E) + 'static
where
    N: 'static,
    E: 'static,
    F: Fn(&N, &E) + 'static,
{
    let weak = Rc::downgrade(node);
    move |event| {
        if let Some(node) = weak.upgrade() {
            handler(&*node, event);
        }
    }
}

/// Materialized contents plus lifecycle bookkeeping of a derived relation.
///
/// Every mutation updates the tuple list first and publishes after the
/// borrow is released, so subscribers can read the relation re-entrantly.
pub(crate) struct Materialized {
    id: KeeperId,
    keepers: Keepers,
    events: RelationEvents,
    tuples: RefCell<Vec<Tuple>>,
    subscriptions: RefCell<SubscriptionBundle>,
}

impl Materialized {
    pub(crate) fn new() -> Self {
        Self {
            id: KeeperId::next(),
            keepers: Keepers::new(),
            events: RelationEvents::default(),
            tuples: RefCell::new(Vec::new()),
            subscriptions: RefCell::new(SubscriptionBundle::new()),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> KeeperId {
        self.id
    }

    #[inline]
    pub(crate) fn keepers(&self) -> &Keepers {
        &self.keepers
    }

    #[inline]
    pub(crate) fn events(&self) -> &RelationEvents {
        &self.events
    }

    pub(crate) fn snapshot(&self) -> Vec<Tuple> {
        self.tuples.borrow().clone()
    }

    pub(crate) fn first(&self) -> Option<Tuple> {
        self.tuples.borrow().first().cloned()
    }

    pub(crate) fn contains(&self, tuple: &Tuple) -> bool {
        self.tuples.borrow().iter().any(|t| t == tuple)
    }

    /// Returns the stored tuple equal to `tuple`.
    pub(crate) fn find(&self, tuple: &Tuple) -> Option<Tuple> {
        self.tuples.borrow().iter().find(|t| *t == tuple).cloned()
    }

    pub(crate) fn find_by<P>(&self, predicate: P) -> Option<Tuple>
    where
        P: Fn(&Tuple) -> bool,
    {
        self.tuples.borrow().iter().find(|t| predicate(t)).cloned()
    }

    pub(crate) fn tuples_mut(&self) -> RefMut<'_, Vec<Tuple>> {
        self.tuples.borrow_mut()
    }

    /// Replaces the contents without publishing.
    pub(crate) fn seed(&self, tuples: Vec<Tuple>) {
        *self.tuples.borrow_mut() = tuples;
    }

    /// Appends a tuple and publishes the insert.
    pub(crate) fn admit(&self, tuple: Tuple) {
        self.tuples.borrow_mut().push(tuple.clone());
        self.events.insert.publish(&tuple);
    }

    /// Removes a tuple and publishes the delete. Returns false if absent.
    pub(crate) fn remove(&self, tuple: &Tuple) -> bool {
        let removed = {
            let mut tuples = self.tuples.borrow_mut();
            match tuples.iter().position(|t| t == tuple) {
                Some(pos) => tuples.remove(pos),
                None => return false,
            }
        };
        self.events.delete.publish(&removed);
        true
    }

    pub(crate) fn emit_update(&self, update: &TupleUpdate) {
        self.events.update.publish(update);
    }

    pub(crate) fn hold(&self, handle: SubscriptionHandle) {
        self.subscriptions.borrow_mut().add(handle);
    }

    /// Cancels every subscription and drops the contents.
    pub(crate) fn teardown(&self) {
        self.subscriptions.borrow_mut().cancel_all();
        self.tuples.borrow_mut().clear();
    }
}

/// Suppresses repeated delivery of one field change.
///
/// A change reaches an operator once per path through the relation graph; a
/// tuple already notified for the current `sequence` is not notified again.
#[derive(Default)]
pub(crate) struct UpdateGuard {
    sequence: Cell<u64>,
    delivered: RefCell<Vec<Tuple>>,
}

impl UpdateGuard {
    pub(crate) fn first_delivery(&self, tuple: &Tuple, sequence: u64) -> bool {
        let mut delivered = self.delivered.borrow_mut();
        if self.sequence.get() != sequence {
            self.sequence.set(sequence);
            delivered.clear();
        }
        if delivered.iter().any(|t| t == tuple) {
            return false;
        }
        delivered.push(tuple.clone());
        true
    }

    pub(crate) fn reset(&self) {
        self.sequence.set(0);
        self.delivered.borrow_mut().clear();
    }
}
