//! OrderedStore: structural layer combining stable handles, a hashed key
//! index, and an insertion-order list threaded through the slots.
//!
//! No sharing logic lives here; the copy-on-write layers above treat this
//! as a primitive. Every entry stores its precomputed `u64` hash and the
//! index always probes with the stored hash, so `K: Hash` is never invoked
//! again for an existing entry.

use crate::fault;
use crate::Error;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;

/// Stable position of one entry. Generational: a handle taken before an
/// erase never resolves to an entry inserted afterwards, even if the slot
/// is physically reused. Handles stay valid across `try_clone`, which
/// copies slots key-for-key.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct Handle(DefaultKey);

#[derive(Clone)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
    prev: Option<DefaultKey>,
    next: Option<DefaultKey>,
}

/// Ordered sequence of entries plus a key index.
///
/// Invariant: every key in the index maps to exactly one live slot holding
/// that key and vice versa; the order list visits every live slot exactly
/// once, oldest insertion first.
#[derive(Clone)]
pub(crate) struct OrderedStore<K, V, S = RandomState> {
    hasher: S,
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, Entry<K, V>>,
    head: Option<DefaultKey>,
    tail: Option<DefaultKey>,
}

impl<K, V, S> OrderedStore<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::new(),
            slots: SlotMap::with_key(),
            head: None,
            tail: None,
        }
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn find<Q>(&self, q: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        self.index
            .find(hash, |&k| {
                self.slots
                    .get(k)
                    .map(|e| e.key.borrow() == q)
                    .unwrap_or(false)
            })
            .map(|&k| Handle(k))
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(q).is_some()
    }

    pub fn value(&self, h: Handle) -> Option<&V> {
        self.slots.get(h.0).map(|e| &e.value)
    }

    pub fn value_mut(&mut self, h: Handle) -> Option<&mut V> {
        self.slots.get_mut(h.0).map(|e| &mut e.value)
    }

    /// Append a new entry at the tail of the order and index its key.
    ///
    /// The caller guarantees `key` is absent. Two-phase: the slot append
    /// happens first, then the index insert; if the index step cannot get
    /// storage, the orphaned tail entry is unlinked and removed again so
    /// the store is exactly as before the call.
    pub fn push_back(&mut self, key: K, value: V) -> Result<Handle, Error> {
        if fault::injected_failure() {
            return Err(Error::AllocationFailed);
        }
        let hash = self.make_hash(&key);
        let prev_tail = self.tail;
        let k = self.slots.insert(Entry {
            key,
            value,
            hash,
            prev: prev_tail,
            next: None,
        });
        match prev_tail {
            Some(t) => self.slots[t].next = Some(k),
            None => self.head = Some(k),
        }
        self.tail = Some(k);

        if let Err(e) = self.index_insert(k, hash) {
            // Undo the orphaned tail append.
            match prev_tail {
                Some(t) => self.slots[t].next = None,
                None => self.head = None,
            }
            self.tail = prev_tail;
            self.slots.remove(k);
            return Err(e);
        }
        Ok(Handle(k))
    }

    fn index_insert(&mut self, k: DefaultKey, hash: u64) -> Result<(), Error> {
        if fault::injected_failure() {
            return Err(Error::AllocationFailed);
        }
        let slots = &self.slots;
        self.index
            .try_reserve(1, |&kk| slots.get(kk).map(|e| e.hash).unwrap_or(0))?;
        self.index
            .insert_unique(hash, k, |&kk| slots.get(kk).map(|e| e.hash).unwrap_or(0));
        Ok(())
    }

    /// Remove the entry at `h`, relinking its neighbors. Positions of all
    /// other entries are untouched.
    pub fn remove(&mut self, h: Handle) -> Option<(K, V)> {
        let k = h.0;
        let entry = self.slots.remove(k)?;
        match entry.prev {
            Some(p) => self.slots[p].next = entry.next,
            None => self.head = entry.next,
        }
        match entry.next {
            Some(n) => self.slots[n].prev = entry.prev,
            None => self.tail = entry.prev,
        }
        self.index
            .find_entry(entry.hash, |&kk| kk == k)
            .expect("indexed key must be present for a live handle")
            .remove();
        Some((entry.key, entry.value))
    }

    /// Relink an existing entry at the tail of the order. Key, value, and
    /// handle are untouched; no allocation happens.
    pub fn move_to_back(&mut self, h: Handle) -> bool {
        let k = h.0;
        if self.tail == Some(k) {
            // Tail keys are live by invariant; stale handles carry an older
            // generation and never compare equal to the current tail.
            return true;
        }
        let (prev, next) = match self.slots.get(k) {
            Some(e) => (e.prev, e.next),
            None => return false,
        };
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        if let Some(n) = next {
            self.slots[n].prev = prev;
        }
        let old_tail = self.tail;
        if let Some(t) = old_tail {
            self.slots[t].next = Some(k);
        }
        let e = &mut self.slots[k];
        e.prev = old_tail;
        e.next = None;
        self.tail = Some(k);
        true
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: &self.slots,
            next: self.head,
            remaining: self.slots.len(),
        }
    }
}

impl<K, V, S> OrderedStore<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Deep copy preserving order and handle validity: slot keys survive
    /// the clone, so a handle resolved against `self` resolves to the
    /// corresponding entry of the copy.
    pub fn try_clone(&self) -> Result<Self, Error> {
        if fault::injected_failure() {
            return Err(Error::AllocationFailed);
        }
        Ok(self.clone())
    }
}

/// Order-linked traversal yielding entries oldest insertion first.
pub(crate) struct Iter<'a, K, V> {
    slots: &'a SlotMap<DefaultKey, Entry<K, V>>,
    next: Option<DefaultKey>,
    remaining: usize,
}

impl<'a, K, V> Clone for Iter<'a, K, V> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots,
            next: self.next,
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let k = self.next?;
        let e = &self.slots[k];
        self.next = e.next;
        self.remaining -= 1;
        Some((&e.key, &e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> core::iter::FusedIterator for Iter<'_, K, V> {}
