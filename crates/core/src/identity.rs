//! Process-wide identity generation.
//!
//! Sets declare an identity attribute whose default is drawn from
//! `next_identity`, so tuples built in different sets never collide.

use core::sync::atomic::{AtomicI64, Ordering};

/// Global identity counter. Identities start at 1.
static NEXT_IDENTITY: AtomicI64 = AtomicI64::new(1);

/// Gets the next unique identity value.
pub fn next_identity() -> i64 {
    NEXT_IDENTITY.fetch_add(1, Ordering::SeqCst)
}

/// Moves the counter past `id` so hydrated identities are never reissued.
pub fn observe_identity(id: i64) {
    NEXT_IDENTITY.fetch_max(id.saturating_add(1), Ordering::SeqCst);
}
