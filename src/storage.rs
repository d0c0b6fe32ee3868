//! Storage: dense entry vector with a hashbrown index of positions.
//!
//! Entries live contiguously in a `Vec`; the `HashTable` stores only
//! indices into it. Removal is `swap_remove` followed by a fixup of the
//! moved entry's index slot, so traversal stays dense and positional.

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use core::sync::atomic::{AtomicU64, Ordering};
use hashbrown::HashTable;
use std::collections::hash_map::RandomState;

static NEXT_STORAGE_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Debug)]
pub(crate) struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
}

/// Cursor to one entry of a [`ReactiveMap`](crate::ReactiveMap).
///
/// Positions are invalidated by every erase and by `clear`; a stale
/// position, or one taken from a different map, resolves to nothing
/// instead of aliasing another entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Position {
    owner: u64,
    index: usize,
    epoch: u64,
}

pub(crate) struct Storage<K, V, S = RandomState> {
    id: u64,
    hasher: S,
    index: HashTable<usize>,
    entries: Vec<Entry<K, V>>,
    // Bumped whenever an entry moves or disappears.
    epoch: u64,
}

/// Iterator over the entries of a map, in unspecified order.
pub struct Iter<'a, K, V> {
    it: core::slice::Iter<'a, Entry<K, V>>,
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Iter {
            it: self.it.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|e| (&e.key, &e.value))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V, S> Storage<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub(crate) fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            id: NEXT_STORAGE_ID.fetch_add(1, Ordering::Relaxed),
            hasher,
            index: HashTable::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
            epoch: 0,
        }
    }

    pub(crate) fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    pub(crate) fn hasher(&self) -> &S {
        &self.hasher
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries the index can hold without restructuring.
    pub(crate) fn capacity(&self) -> usize {
        self.index.capacity()
    }

    pub(crate) fn find_hashed<Q>(&self, hash: u64, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.index
            .find(hash, |&ix| self.entries[ix].key.borrow() == q)
            .copied()
    }

    pub(crate) fn find<Q>(&self, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        self.find_hashed(hash, q)
    }

    /// Insert `key` with a lazily built value. `Err` carries the index of
    /// the entry already holding `key`; `make` does not run in that case.
    pub(crate) fn insert_with<F>(&mut self, key: K, make: F) -> Result<usize, usize>
    where
        F: FnOnce() -> V,
    {
        let hash = self.make_hash(&key);
        if let Some(ix) = self.find_hashed(hash, &key) {
            return Err(ix);
        }
        Ok(self.push_hashed(hash, key, make()))
    }

    /// Append an entry whose key the caller already looked up under
    /// `hash` and found absent.
    pub(crate) fn push_hashed(&mut self, hash: u64, key: K, value: V) -> usize {
        let ix = self.entries.len();
        self.entries.push(Entry { key, value, hash });
        let entries = &self.entries;
        self.index.insert_unique(hash, ix, |&i| entries[i].hash);
        ix
    }

    #[cfg(test)]
    pub(crate) fn insert_unique(&mut self, key: K, value: V) -> Result<usize, usize> {
        self.insert_with(key, || value)
    }

    pub(crate) fn get_at(&self, ix: usize) -> Option<(&K, &V)> {
        self.entries.get(ix).map(|e| (&e.key, &e.value))
    }

    /// Caller guarantees `ix < len()`.
    pub(crate) fn value_mut_at(&mut self, ix: usize) -> &mut V {
        &mut self.entries[ix].value
    }

    /// Caller guarantees `ix < len()`.
    pub(crate) fn replace_at(&mut self, ix: usize, value: V) -> V {
        core::mem::replace(&mut self.entries[ix].value, value)
    }

    pub(crate) fn remove_at(&mut self, ix: usize) -> Option<(K, V)> {
        let hash = self.entries.get(ix)?.hash;
        self.index
            .find_entry(hash, |&i| i == ix)
            .expect("every entry has an index slot")
            .remove();

        let entry = self.entries.swap_remove(ix);
        let last = self.entries.len();
        if ix < last {
            // The former last entry now lives at `ix`; repoint its slot.
            let moved_hash = self.entries[ix].hash;
            if let Some(slot) = self.index.find_mut(moved_hash, |&i| i == last) {
                *slot = ix;
            }
        }
        self.epoch = self.epoch.wrapping_add(1);
        Some((entry.key, entry.value))
    }

    pub(crate) fn remove<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let ix = self.find(q)?;
        self.remove_at(ix)
    }

    /// Empty the storage and hand the former entries to the caller, who
    /// decides when they drop. The index keeps its allocation.
    pub(crate) fn take_entries(&mut self) -> Vec<Entry<K, V>> {
        if self.entries.is_empty() {
            return Vec::new();
        }
        self.index.clear();
        self.epoch = self.epoch.wrapping_add(1);
        core::mem::take(&mut self.entries)
    }

    pub(crate) fn reserve(&mut self, additional: usize) {
        let entries = &self.entries;
        self.index.reserve(additional, |&i| entries[i].hash);
        self.entries.reserve(additional);
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        let entries = &self.entries;
        self.index.shrink_to_fit(|&i| entries[i].hash);
        self.entries.shrink_to_fit();
    }

    pub(crate) fn position(&self, ix: usize) -> Position {
        Position {
            owner: self.id,
            index: ix,
            epoch: self.epoch,
        }
    }

    /// Map a position back to an entry index if it is still current.
    pub(crate) fn resolve(&self, pos: Position) -> Option<usize> {
        let current = pos.owner == self.id && pos.epoch == self.epoch;
        (current && pos.index < self.entries.len()).then_some(pos.index)
    }

    pub(crate) fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            it: self.entries.iter(),
        }
    }
}
