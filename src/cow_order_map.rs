//! CowOrderMap: public handle layer with copy-on-write sharing.

use crate::ordered_store::{self, OrderedStore};
use crate::shared_state::{Mode, SharedState};
use crate::Error;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;
use std::rc::Rc;

/// An insertion-ordered map whose clones share one underlying store until
/// a mutation diverges them.
///
/// Cloning a handle is O(1) and shares the state; the first mutating call
/// through any sharing handle copies the data onto a private state before
/// touching it, so a mutation is never observable through another handle.
/// Every mutating operation either fully applies or leaves the handle's
/// observable state (content, order, and sharing relationship) unchanged.
///
/// Re-inserting a present key refreshes its recency: the entry moves to
/// the back of the order and keeps its previously stored value.
///
/// Single-threaded by design: handles share through [`Rc`] and the type is
/// `!Send + !Sync`.
pub struct CowOrderMap<K, V, S = RandomState> {
    state: Rc<SharedState<K, V, S>>,
}

impl<K, V> CowOrderMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            state: Rc::new(SharedState::with_hasher(RandomState::default())),
        }
    }
}

impl<K, V> Default for CowOrderMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> CowOrderMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            state: Rc::new(SharedState::with_hasher(hasher)),
        }
    }

    pub fn len(&self) -> usize {
        self.state.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.store.is_empty()
    }

    /// Read-only lookup; never clones and never changes the sharing mode.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.state.store.contains_key(key)
    }

    /// Read-only lookup; never clones and never changes the sharing mode.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = self.state.store.find(key)?;
        self.state.store.value(h)
    }

    /// Insertion-order traversal of the handle's current state.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.state.store.iter(),
        }
    }

    /// True when more than one handle currently references this state.
    pub fn is_shared(&self) -> bool {
        Rc::strong_count(&self.state) > 1
    }

    /// True when both handles reference the same state instance.
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl<K, V, S> CowOrderMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Prepare-to-modify: make this handle the sole owner of its state,
    /// record `mode` on it, then run `op` against the owned store.
    ///
    /// Shared state: `op` runs against a private clone and the handle
    /// rebinds only after success, so a failure leaves the handle on its
    /// pre-call state and flag. Sole owner: `op` runs in place with the
    /// previous flag restored on failure; store operations undo their own
    /// partial steps.
    fn with_unique<R>(
        &mut self,
        mode: Mode,
        op: impl FnOnce(&mut OrderedStore<K, V, S>) -> Result<R, Error>,
    ) -> Result<R, Error> {
        if Rc::strong_count(&self.state) > 1 {
            debug_assert_eq!(
                self.state.mode,
                Mode::Shareable,
                "a frozen state must not be shared"
            );
            let mut fresh = SharedState {
                store: self.state.store.try_clone()?,
                mode,
            };
            let r = op(&mut fresh.store)?;
            self.state = Rc::new(fresh);
            Ok(r)
        } else {
            let state = Rc::get_mut(&mut self.state)
                .expect("strong count 1 and no weak refs imply sole ownership");
            let prev_mode = core::mem::replace(&mut state.mode, mode);
            let res = op(&mut state.store);
            if res.is_err() {
                state.mode = prev_mode;
            }
            res
        }
    }

    /// Insert `key`, returning `Ok(true)` when it was absent.
    ///
    /// A present key is moved to the back of the order and keeps its
    /// previously stored value; `value` is dropped and `Ok(false)` is
    /// returned.
    pub fn insert(&mut self, key: K, value: V) -> Result<bool, Error> {
        match self.state.store.find(&key) {
            Some(h) => {
                self.with_unique(Mode::Shareable, |store| {
                    store.move_to_back(h);
                    Ok(())
                })?;
                Ok(false)
            }
            None => {
                self.with_unique(Mode::Shareable, move |store| store.push_back(key, value))?;
                Ok(true)
            }
        }
    }

    /// Remove `key` and return its stored value.
    ///
    /// [`Error::NotFound`] when absent; the handle is left untouched and
    /// no divergence happens.
    pub fn remove<Q>(&mut self, key: &Q) -> Result<V, Error>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = self.state.store.find(key).ok_or(Error::NotFound)?;
        self.with_unique(Mode::Shareable, |store| {
            let (_key, value) = store
                .remove(h)
                .expect("handle found before prepare stays valid across the clone");
            Ok(value)
        })
    }

    /// Run `f` against the value stored for `key` and pass its result
    /// through. The mutable borrow is scoped to the call, so the state
    /// stays shareable.
    ///
    /// [`Error::NotFound`] when absent; the handle is left untouched and
    /// no divergence happens.
    pub fn update<Q, R>(&mut self, key: &Q, f: impl FnOnce(&mut V) -> R) -> Result<R, Error>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = self.state.store.find(key).ok_or(Error::NotFound)?;
        self.with_unique(Mode::Shareable, |store| {
            Ok(f(store
                .value_mut(h)
                .expect("handle found before prepare stays valid across the clone")))
        })
    }

    /// Return a mutable reference to the value for `key`, constructing it
    /// with `default` (run only on insertion) and appending at the back
    /// when absent. A present key keeps its order position.
    ///
    /// Handing out the reference freezes the state: until the next
    /// ordinary mutation of this handle, cloning it copies eagerly instead
    /// of sharing.
    pub fn get_or_insert_with(
        &mut self,
        key: K,
        default: impl FnOnce() -> V,
    ) -> Result<&mut V, Error> {
        let h = match self.state.store.find(&key) {
            Some(h) => {
                self.with_unique(Mode::Frozen, |_| Ok(()))?;
                h
            }
            None => {
                self.with_unique(Mode::Frozen, move |store| store.push_back(key, default()))?
            }
        };
        let state = Rc::get_mut(&mut self.state)
            .expect("prepare-to-modify left this handle the sole owner");
        Ok(state
            .store
            .value_mut(h)
            .expect("handle resolves against the owned state"))
    }

    /// [`Self::get_or_insert_with`] using `V::default()`.
    pub fn get_or_insert_default(&mut self, key: K) -> Result<&mut V, Error>
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }

    /// Apply insert-style refresh semantics for every entry of `other`, in
    /// `other`'s order, onto `self`.
    ///
    /// Atomic: the merge is built in a private working copy and the handle
    /// rebinds only after every entry applied; any failure mid-way
    /// discards the copy and leaves `self` exactly as before. `other` may
    /// share state with `self`.
    pub fn merge(&mut self, other: &Self) -> Result<(), Error> {
        let mut working = self.state.store.try_clone()?;
        for (k, v) in other.state.store.iter() {
            match working.find(k) {
                Some(h) => {
                    working.move_to_back(h);
                }
                None => {
                    working.push_back(k.clone(), v.clone())?;
                }
            }
        }
        self.state = Rc::new(SharedState {
            store: working,
            mode: Mode::Shareable,
        });
        Ok(())
    }

    /// Remove every entry. A shared handle detaches onto a fresh empty
    /// state instead of cloning data that is about to be discarded.
    pub fn clear(&mut self) {
        if Rc::strong_count(&self.state) > 1 {
            let hasher = self.state.store.hasher().clone();
            self.state = Rc::new(SharedState::with_hasher(hasher));
        } else {
            let state = Rc::get_mut(&mut self.state)
                .expect("strong count 1 and no weak refs imply sole ownership");
            state.mode = Mode::Shareable;
            state.store.clear();
        }
    }
}

impl<K, V, S> Clone for CowOrderMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    fn clone(&self) -> Self {
        let state = match self.state.mode {
            Mode::Shareable => Rc::clone(&self.state),
            // Frozen: mutable access was handed out through this state;
            // share nothing. The copy starts shareable and solely owned.
            Mode::Frozen => Rc::new(SharedState {
                store: self.state.store.clone(),
                mode: Mode::Shareable,
            }),
        };
        Self { state }
    }
}

impl<K, V, S> fmt::Debug for CowOrderMap<K, V, S>
where
    K: Eq + Hash + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.state.store.iter()).finish()
    }
}

/// Equal iff both maps hold pairwise-equal entries in the same order.
impl<K, V, S> PartialEq for CowOrderMap<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        if Rc::ptr_eq(&self.state, &other.state) {
            return true;
        }
        self.len() == other.len() && self.state.store.iter().eq(other.state.store.iter())
    }
}

impl<K, V, S> Eq for CowOrderMap<K, V, S>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
{
}

/// Read-only forward cursor yielding `(&K, &V)` in insertion order.
pub struct Iter<'a, K, V> {
    inner: ordered_store::Iter<'a, K, V>,
}

impl<'a, K, V> Clone for Iter<'a, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> core::iter::FusedIterator for Iter<'_, K, V> {}

impl<'a, K, V, S> IntoIterator for &'a CowOrderMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}
