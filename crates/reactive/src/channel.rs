//! Event channels.
//!
//! A `Channel<E>` is an ordered callback registry for one event kind on one
//! emitting object. Callbacks fire synchronously, in subscription order, before
//! `publish` returns.
//!
//! Publishing iterates over a snapshot of the registry, so a callback may
//! subscribe or unsubscribe (on this channel or any other) without corrupting
//! the dispatch in progress. A subscription cancelled mid-dispatch is skipped
//! if it has not fired yet.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

/// Unique identifier for a subscription within one channel.
pub type SubscriptionId = u64;

/// A registered callback.
struct Subscription<E> {
    id: SubscriptionId,
    callback: Box<dyn Fn(&E)>,
    active: Cell<bool>,
}

impl<E> Subscription<E> {
    fn notify(&self, event: &E) {
        if self.active.get() {
            (self.callback)(event);
        }
    }
}

struct ChannelState<E> {
    subscriptions: RefCell<Vec<Rc<Subscription<E>>>>,
    next_id: Cell<SubscriptionId>,
}

/// Type-erased removal, so handles don't carry the event type.
trait Detach {
    fn detach(&self, id: SubscriptionId) -> bool;
    fn is_attached(&self, id: SubscriptionId) -> bool;
}

impl<E> Detach for ChannelState<E> {
    fn detach(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.borrow_mut();
        match subscriptions.iter().position(|s| s.id == id) {
            Some(pos) => {
                let removed = subscriptions.remove(pos);
                removed.active.set(false);
                true
            }
            None => false,
        }
    }

    fn is_attached(&self, id: SubscriptionId) -> bool {
        self.subscriptions.borrow().iter().any(|s| s.id == id)
    }
}

/// An ordered list of callbacks for one event kind.
pub struct Channel<E: 'static> {
    state: Rc<ChannelState<E>>,
}

impl<E: 'static> Default for Channel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> Channel<E> {
    /// Creates an empty channel.
    pub fn new() -> Self {
        Self {
            state: Rc::new(ChannelState {
                subscriptions: RefCell::new(Vec::new()),
                next_id: Cell::new(1),
            }),
        }
    }

    /// Appends a callback and returns a handle that can cancel it.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&E) + 'static,
    {
        let id = self.state.next_id.get();
        self.state.next_id.set(id + 1);

        self.state.subscriptions.borrow_mut().push(Rc::new(Subscription {
            id,
            callback: Box::new(callback),
            active: Cell::new(true),
        }));

        let channel: Weak<dyn Detach> = Rc::downgrade(&self.state) as Weak<dyn Detach>;
        SubscriptionHandle { id, channel }
    }

    /// Removes a callback by ID.
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.detach(id)
    }

    /// Invokes every callback in subscription order.
    pub fn publish(&self, event: &E) {
        let snapshot: Vec<Rc<Subscription<E>>> = self.state.subscriptions.borrow().clone();
        for subscription in snapshot {
            subscription.notify(event);
        }
    }

    /// Returns the number of registered callbacks.
    #[inline]
    pub fn len(&self) -> usize {
        self.state.subscriptions.borrow().len()
    }

    /// Returns true if there are no callbacks.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.state.subscriptions.borrow().is_empty()
    }

    /// Removes every callback.
    pub fn clear(&self) {
        for subscription in self.state.subscriptions.borrow_mut().drain(..) {
            subscription.active.set(false);
        }
    }
}

/// A cancellable reference to one subscription.
///
/// Dropping the handle does not cancel the subscription; cancellation is
/// always explicit.
pub struct SubscriptionHandle {
    id: SubscriptionId,
    channel: Weak<dyn Detach>,
}

impl core::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl SubscriptionHandle {
    /// Returns the subscription ID.
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns whether the subscription is still registered.
    pub fn is_active(&self) -> bool {
        self.channel
            .upgrade()
            .map(|channel| channel.is_attached(self.id))
            .unwrap_or(false)
    }

    /// Removes the subscription from its channel.
    ///
    /// Returns false if it was already cancelled or the channel is gone.
    pub fn cancel(&self) -> bool {
        match self.channel.upgrade() {
            Some(channel) => channel.detach(self.id),
            None => false,
        }
    }
}

/// A group of subscriptions cancelled together.
#[derive(Default)]
pub struct SubscriptionBundle {
    handles: Vec<SubscriptionHandle>,
}

impl SubscriptionBundle {
    /// Creates an empty bundle.
    pub fn new() -> Self {
        Self { handles: Vec::new() }
    }

    /// Adds a handle to the bundle.
    pub fn add(&mut self, handle: SubscriptionHandle) {
        self.handles.push(handle);
    }

    /// Returns the number of handles held.
    #[inline]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if the bundle holds no handles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Cancels every subscription and empties the bundle.
    pub fn cancel_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.cancel();
        }
    }
}
