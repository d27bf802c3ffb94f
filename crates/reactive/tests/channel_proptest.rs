//! Property-based tests for channels and the retain/release lifecycle.

use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;
use tessel_core::Result;
use tessel_reactive::{Channel, KeeperId, Keepers, Retainable, SubscriptionHandle};

struct Node {
    id: KeeperId,
    keepers: Keepers,
    activations: RefCell<u32>,
    deactivations: RefCell<u32>,
}

impl Node {
    fn new() -> Self {
        Self {
            id: KeeperId::next(),
            keepers: Keepers::new(),
            activations: RefCell::new(0),
            deactivations: RefCell::new(0),
        }
    }
}

impl Retainable for Node {
    fn keeper_id(&self) -> KeeperId {
        self.id
    }

    fn keepers(&self) -> &Keepers {
        &self.keepers
    }

    fn activate(&self) -> Result<()> {
        *self.activations.borrow_mut() += 1;
        Ok(())
    }

    fn deactivate(&self) {
        *self.deactivations.borrow_mut() += 1;
    }
}

proptest! {
    /// Property: callbacks fire in subscription order, skipping cancelled ones.
    #[test]
    fn publish_follows_subscription_order(
        count in 1usize..12,
        cancelled in prop::collection::vec(any::<bool>(), 12),
    ) {
        let channel: Channel<u32> = Channel::new();
        let fired = Rc::new(RefCell::new(Vec::new()));
        let handles: Vec<SubscriptionHandle> = (0..count)
            .map(|i| {
                let log = fired.clone();
                channel.subscribe(move |_| log.borrow_mut().push(i))
            })
            .collect();

        let mut expected = Vec::new();
        for (i, handle) in handles.iter().enumerate() {
            if cancelled[i] {
                prop_assert!(handle.cancel());
            } else {
                expected.push(i);
            }
        }

        channel.publish(&0);
        prop_assert_eq!(&*fired.borrow(), &expected);
        prop_assert_eq!(channel.len(), expected.len());
    }

    /// Property: activation and teardown each run once per retained period.
    #[test]
    fn lifecycle_hooks_run_once_per_period(periods in 1usize..5, keepers in 1usize..5) {
        let node = Node::new();
        for _ in 0..periods {
            let ids: Vec<KeeperId> = (0..keepers).map(|_| KeeperId::next()).collect();
            for id in &ids {
                node.retain(*id).unwrap();
            }
            for id in ids.iter().rev() {
                node.release(*id).unwrap();
            }
            prop_assert!(!node.is_retained());
        }
        prop_assert_eq!(*node.activations.borrow(), periods as u32);
        prop_assert_eq!(*node.deactivations.borrow(), periods as u32);
    }
}
