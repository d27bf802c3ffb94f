//! Reference-counted activation.
//!
//! Relations, predicates and signals are dormant until some keeper retains
//! them. The transition from zero to one keeper retains every dependency
//! (with this object as their keeper) and then runs `activate`; the
//! transition from one to zero keepers runs `deactivate` and then releases
//! the dependencies. Nothing else in the engine starts or stops live state.

use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use hashbrown::HashSet;
use tessel_core::{Error, Result};

/// Global keeper id counter.
static NEXT_KEEPER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of something that can retain a `Retainable`.
///
/// Every retainable object owns one, which it uses as the keeper of its own
/// dependencies. Application code takes fresh ones from [`KeeperId::next`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeeperId(u64);

impl KeeperId {
    /// Allocates a new process-unique keeper id.
    pub fn next() -> Self {
        KeeperId(NEXT_KEEPER_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Returns the raw id.
    #[inline]
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for KeeperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The keeper registry of one retainable object.
#[derive(Default)]
pub struct Keepers {
    keepers: RefCell<HashSet<KeeperId>>,
}

impl Keepers {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            keepers: RefCell::new(HashSet::new()),
        }
    }

    /// Returns true if `keeper` is registered.
    pub fn contains(&self, keeper: KeeperId) -> bool {
        self.keepers.borrow().contains(&keeper)
    }

    /// Returns the number of keepers.
    #[inline]
    pub fn len(&self) -> usize {
        self.keepers.borrow().len()
    }

    /// Returns true if nobody retains the object.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keepers.borrow().is_empty()
    }

    fn insert(&self, keeper: KeeperId) -> bool {
        self.keepers.borrow_mut().insert(keeper)
    }

    fn remove(&self, keeper: KeeperId) -> bool {
        self.keepers.borrow_mut().remove(&keeper)
    }
}

/// An object whose live state is controlled by retain/release.
///
/// Implementors provide their keeper registry, their dependencies and the
/// activation hooks; `retain`, `release` and `is_retained` are provided.
pub trait Retainable {
    /// The id this object uses when retaining its dependencies.
    fn keeper_id(&self) -> KeeperId;

    /// The registry of keepers retaining this object.
    fn keepers(&self) -> &Keepers;

    /// Objects retained while this one is retained.
    ///
    /// An object listed more than once is retained once.
    fn dependencies(&self) -> Vec<&dyn Retainable> {
        Vec::new()
    }

    /// Runs once when the first keeper arrives, after dependencies are retained.
    fn activate(&self) -> Result<()> {
        Ok(())
    }

    /// Runs once when the last keeper leaves, before dependencies are released.
    fn deactivate(&self) {}

    /// Registers `owner` as a keeper.
    ///
    /// Fails if `owner` already retains this object. On failure nothing is
    /// left retained.
    fn retain(&self, owner: KeeperId) -> Result<()> {
        let keepers = self.keepers();
        if keepers.contains(owner) {
            return Err(Error::AlreadyRetained { keeper: owner.get() });
        }
        if !keepers.is_empty() {
            keepers.insert(owner);
            return Ok(());
        }

        let me = self.keeper_id();
        let dependencies = distinct(self.dependencies());
        for (i, dependency) in dependencies.iter().enumerate() {
            if let Err(err) = dependency.retain(me) {
                release_all(&dependencies[..i], me);
                return Err(err);
            }
        }
        if let Err(err) = self.activate() {
            release_all(&dependencies, me);
            return Err(err);
        }

        keepers.insert(owner);
        tracing::trace!(object = me.get(), keeper = owner.get(), "activated");
        Ok(())
    }

    /// Deregisters `owner`.
    ///
    /// Fails if `owner` does not retain this object.
    fn release(&self, owner: KeeperId) -> Result<()> {
        let keepers = self.keepers();
        if !keepers.remove(owner) {
            return Err(Error::NotRetained { keeper: owner.get() });
        }
        if !keepers.is_empty() {
            return Ok(());
        }

        let me = self.keeper_id();
        self.deactivate();
        release_all(&distinct(self.dependencies()), me);
        tracing::trace!(object = me.get(), keeper = owner.get(), "deactivated");
        Ok(())
    }

    /// Returns true if at least one keeper retains this object.
    fn is_retained(&self) -> bool {
        !self.keepers().is_empty()
    }
}

fn distinct(dependencies: Vec<&dyn Retainable>) -> Vec<&dyn Retainable> {
    let mut seen = HashSet::with_capacity(dependencies.len());
    dependencies
        .into_iter()
        .filter(|d| seen.insert(d.keeper_id()))
        .collect()
}

fn release_all(dependencies: &[&dyn Retainable], keeper: KeeperId) {
    for dependency in dependencies {
        if let Err(err) = dependency.release(keeper) {
            tracing::error!(keeper = keeper.get(), error = %err, "dependency release failed");
        }
    }
}
