//! SharedState: the unit of sharing between map handles.

use crate::ordered_store::OrderedStore;
use core::hash::{BuildHasher, Hash};

/// Sharing mode of one state instance. Tracked explicitly: the refcount
/// alone cannot distinguish a state that is merely aliased from one that
/// has handed out mutable access and must never be shared again.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Mode {
    /// May be referenced by any number of handles; a mutating handle
    /// diverges onto a private clone first.
    Shareable,
    /// Pinned to its sole handle; copying that handle deep-clones
    /// immediately instead of sharing.
    Frozen,
}

/// One store plus its sharing mode. Handles reference this through `Rc`;
/// the mode is mutated only once a handle is the sole owner.
///
/// Invariant: `mode == Frozen` implies the strong count is 1.
pub(crate) struct SharedState<K, V, S> {
    pub(crate) store: OrderedStore<K, V, S>,
    pub(crate) mode: Mode,
}

impl<K, V, S> SharedState<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            store: OrderedStore::with_hasher(hasher),
            mode: Mode::Shareable,
        }
    }
}
