//! Membership deltas.
//!
//! A Delta records one tuple entering (+1) or leaving (-1) a relation. Full
//! recomputations (a predicate whose signal moved) are turned into the
//! minimal batch of deltas between the old and new membership.

use alloc::vec::Vec;

/// A differential change to a data item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delta<T> {
    /// The data being changed
    pub data: T,
    /// The differential: +1 for insert, -1 for delete
    pub diff: i32,
}

impl<T> Delta<T> {
    /// Creates an insertion delta (+1).
    #[inline]
    pub fn insert(data: T) -> Self {
        Self { data, diff: 1 }
    }

    /// Creates a deletion delta (-1).
    #[inline]
    pub fn delete(data: T) -> Self {
        Self { data, diff: -1 }
    }

    /// Returns true if this is an insertion (diff > 0).
    #[inline]
    pub fn is_insert(&self) -> bool {
        self.diff > 0
    }

    /// Returns true if this is a deletion (diff < 0).
    #[inline]
    pub fn is_delete(&self) -> bool {
        self.diff < 0
    }

    /// Returns a reference to the data.
    #[inline]
    pub fn data(&self) -> &T {
        &self.data
    }
}

/// A batch of deltas.
pub type DeltaBatch<T> = Vec<Delta<T>>;

/// Extension trait for working with delta batches.
pub trait DeltaBatchExt<T> {
    /// Returns the number of insertions and deletions.
    fn counts(&self) -> (usize, usize);
}

impl<T> DeltaBatchExt<T> for DeltaBatch<T> {
    fn counts(&self) -> (usize, usize) {
        let inserts = self.iter().filter(|d| d.is_insert()).count();
        (inserts, self.len() - inserts)
    }
}

/// Computes the deltas that turn `before` into `after`.
///
/// Deletions come first, in `before` order, then insertions in `after` order.
pub fn diff<T: PartialEq + Clone>(before: &[T], after: &[T]) -> DeltaBatch<T> {
    let mut batch: DeltaBatch<T> = before
        .iter()
        .filter(|t| !after.contains(t))
        .cloned()
        .map(Delta::delete)
        .collect();
    batch.extend(
        after
            .iter()
            .filter(|t| !before.contains(t))
            .cloned()
            .map(Delta::insert),
    );
    batch
}
