//! cow-ordermap: a single-threaded, insertion-ordered map whose clones
//! share one underlying store copy-on-write.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: build CowOrderMap in safe, verifiable layers so each piece can
//!   be reasoned about independently.
//! - Layers:
//!   - OrderedStore<K, V, S>: structural map combining stable slot
//!     handles, a hashed key index, and an insertion-order list threaded
//!     through the slots; no sharing logic.
//!   - SharedState<K, V, S>: one OrderedStore plus an explicit sharing
//!     mode (Shareable | Frozen); the unit handles share or clone.
//!   - CowOrderMap<K, V, S>: public handle holding Rc<SharedState>;
//!     decides on every mutating call whether to diverge onto a private
//!     clone, and restores the pre-call state and flag when a mutation
//!     fails.
//!
//! Constraints
//! - Single-threaded: sharing goes through `Rc`, so the map is
//!   `!Send`/`!Sync` by construction (no atomics).
//! - Insertion order only: traversal visits keys in the order of their
//!   most recent insertion; re-inserting a present key refreshes recency
//!   and keeps the stored value.
//! - Strong failure guarantee: a mutating call that fails leaves the
//!   handle's content, order, and sharing relationship exactly as before.
//! - O(1) average lookups; stable generational handles internally, never
//!   re-hashing a stored key.
//!
//! Sharing state machine
//! - Cloning a handle whose state is Shareable shares the state and bumps
//!   the strong count; no allocation.
//! - Every mutating call first makes its handle the sole owner (cloning
//!   the store if the state is shared), then tags the owned state:
//!   Frozen when the call hands out a mutable value reference
//!   (`get_or_insert_with`/`get_or_insert_default`), Shareable otherwise.
//! - Cloning a handle whose state is Frozen deep-clones immediately; the
//!   copy starts Shareable. The next ordinary mutation of the frozen
//!   handle thaws it.
//! - Invariant: a Frozen state has strong count 1.
//!
//! Failure handling
//! - Lookup misses surface `Error::NotFound` from `remove`/`update`;
//!   read accessors return `Option`.
//! - Storage growth surfaces `Error::AllocationFailed`: index growth via
//!   `hashbrown`'s `try_reserve`, everything else via the deterministic
//!   failpoint in `fault` (compiled only under tests or the
//!   `fault-injection` feature). A failed step is undone before the error
//!   propagates: a diverging clone is discarded unbound, an orphaned
//!   sequence append is popped, an in-place flag change is reverted.
//!
//! Notes and non-goals
//! - No thread safety, no persistence, no ordering other than insertion
//!   order.
//! - No long-lived mutable lookup accessor: scoped `update` replaces it,
//!   so only the get-or-insert accessors ever freeze a state.
//! - Iteration borrows the handle's current state; iterators are plain
//!   `(&K, &V)` cursors and cannot outlive a divergence.

mod cow_order_map;
mod cow_order_map_proptest;
pub mod fault;
mod ordered_store;
mod shared_state;

use core::fmt;

// Public surface
pub use cow_order_map::{CowOrderMap, Iter};

/// Errors surfaced by map operations.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// The requested key is not present. The map is unchanged.
    NotFound,
    /// Storage could not be grown or cloned. The map's observable state
    /// (content, order, sharing) is as before the failed call.
    AllocationFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound => f.write_str("key not found"),
            Error::AllocationFailed => f.write_str("storage allocation failed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<hashbrown::TryReserveError> for Error {
    fn from(_: hashbrown::TryReserveError) -> Self {
        Error::AllocationFailed
    }
}
