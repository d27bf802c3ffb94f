//! Tessel Reactive - Event channels and retain/release lifecycle.
//!
//! Every live object in Tessel is built from two primitives:
//!
//! - `Channel<E>`: an ordered, synchronous callback registry for one event kind
//! - `Retainable`: reference-counted activation with an explicit keeper registry
//!
//! # Example
//!
//! ```rust
//! use tessel_reactive::{Channel, SubscriptionBundle};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let inserted: Channel<i64> = Channel::new();
//! let total = Rc::new(Cell::new(0));
//!
//! let mut bundle = SubscriptionBundle::new();
//! let sum = total.clone();
//! bundle.add(inserted.subscribe(move |v| sum.set(sum.get() + *v)));
//!
//! inserted.publish(&2);
//! inserted.publish(&3);
//! bundle.cancel_all();
//! inserted.publish(&100);
//!
//! assert_eq!(total.get(), 5);
//! ```

#![no_std]

extern crate alloc;

pub mod channel;
pub mod lifecycle;

pub use channel::{Channel, SubscriptionBundle, SubscriptionHandle, SubscriptionId};
pub use lifecycle::{KeeperId, Keepers, Retainable};
