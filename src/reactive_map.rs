//! ReactiveMap: public map API that reports every committed mutation.

use crate::event::{EventKind, MapEvent};
use crate::notifier::{MapObserver, Notifier, Subscription};
use crate::storage::{Iter, Position, Storage};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops::Index;
use std::collections::hash_map::RandomState;

/// Returned by [`ReactiveMap::at`] when the key is absent.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("key not found in reactive map")]
pub struct KeyNotFound;

/// A hash map that notifies its listeners after every mutation.
///
/// Each mutating method first commits the change to storage, then
/// delivers exactly one matching [`MapEvent`] to the listeners, and only
/// then returns. Operations that turn out to be no-ops (inserting an
/// existing key, erasing a missing one, clearing an empty map) emit
/// nothing. Return values, not events, tell the caller whether anything
/// changed.
///
/// The one mutation that is not observed is writing through the `&mut V`
/// returned by [`get_or_insert_default`](Self::get_or_insert_default);
/// use [`update_if_exists`](Self::update_if_exists) or
/// [`insert_or_assign`](Self::insert_or_assign) for reported updates.
///
/// # Example
///
/// ```
/// use reactive_hashmap::{EventKind, ReactiveMap};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let mut map: ReactiveMap<i32, &str> = ReactiveMap::new();
/// let log = seen.clone();
/// map.subscribe(EventKind::Inserted, move |e| log.borrow_mut().push(e.cloned()));
///
/// assert!(map.emplace(1, "hello").1);
/// assert!(!map.emplace(1, "again").1);
/// assert_eq!(seen.borrow().len(), 1);
/// ```
pub struct ReactiveMap<K, V, S = RandomState> {
    storage: Storage<K, V, S>,
    notifier: Notifier<K, V>,
}

impl<K, V> ReactiveMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, Default::default())
    }
}

impl<K, V, S> Default for ReactiveMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> ReactiveMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_hasher(0, hasher)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            storage: Storage::with_capacity_and_hasher(capacity, hasher),
            notifier: Notifier::new(),
        }
    }

    pub fn hasher(&self) -> &S {
        self.storage.hasher()
    }

    // ---------- Listeners ----------

    /// Register `callback` for events of one kind.
    pub fn subscribe<F>(&mut self, kind: EventKind, callback: F) -> Subscription
    where
        F: FnMut(&MapEvent<'_, K, V>) + 'static,
    {
        self.notifier.subscribe(kind, callback)
    }

    /// Register `callback` for every event kind.
    pub fn subscribe_all<F>(&mut self, callback: F) -> Subscription
    where
        F: FnMut(&MapEvent<'_, K, V>) + 'static,
    {
        self.notifier.subscribe_all(callback)
    }

    pub fn observe<O>(&mut self, observer: O) -> Subscription
    where
        O: MapObserver<K, V> + 'static,
    {
        self.notifier.observe(Box::new(observer))
    }

    /// Remove a listener. Returns false for handles that are stale or
    /// were issued by another map.
    pub fn unsubscribe(&mut self, sub: Subscription) -> bool {
        self.notifier.unsubscribe(sub)
    }

    pub fn listener_count(&self) -> usize {
        self.notifier.len()
    }

    // ---------- Capacity ----------

    pub fn len(&self) -> usize {
        self.storage.len()
    }
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    /// Make room for at least `n` entries in total (not `n` more).
    /// Emits `Reserved` when the capacity actually changed.
    pub fn reserve(&mut self, n: usize) {
        let before = self.storage.capacity();
        self.storage.reserve(n.saturating_sub(self.storage.len()));
        let after = self.storage.capacity();
        if after != before {
            tracing::debug!(
                old_capacity = before,
                new_capacity = after,
                "reactive map reserved"
            );
            self.notifier.emit(&MapEvent::Reserved {
                new_capacity: after,
            });
        }
    }

    /// Release spare capacity. Emits `Rehashed` when the capacity changed.
    pub fn shrink_to_fit(&mut self) {
        let before = self.storage.capacity();
        self.storage.shrink_to_fit();
        self.report_rehash(before);
    }

    fn report_rehash(&mut self, before: usize) {
        let after = self.storage.capacity();
        if after != before {
            tracing::debug!(
                old_capacity = before,
                new_capacity = after,
                "reactive map rehashed"
            );
            self.notifier.emit(&MapEvent::Rehashed {
                old_capacity: before,
                new_capacity: after,
            });
        }
    }

    // ---------- Lookup ----------

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_key_value(q).map(|(_, v)| v)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.storage.find(q).and_then(|ix| self.storage.get_at(ix))
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.storage.find(q).is_some()
    }

    /// Checked access: `Err(KeyNotFound)` when `q` is absent.
    pub fn at<Q>(&self, q: &Q) -> Result<&V, KeyNotFound>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(q).ok_or(KeyNotFound)
    }

    /// Position of the entry holding `q`, for use with [`erase_at`](Self::erase_at).
    pub fn find<Q>(&self, q: &Q) -> Option<Position>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.storage.find(q).map(|ix| self.storage.position(ix))
    }

    // ---------- Modifiers ----------

    /// Commit a new entry and report it. `Err` is the index of the entry
    /// that already holds the key; nothing changed in that case.
    fn insert_new<F>(&mut self, key: K, make: F) -> Result<usize, usize>
    where
        F: FnOnce() -> V,
    {
        let before = self.storage.capacity();
        let ix = self.storage.insert_with(key, make)?;
        self.report_inserted(before, ix);
        Ok(ix)
    }

    fn report_inserted(&mut self, capacity_before: usize, ix: usize) {
        self.report_rehash(capacity_before);
        if let Some((key, value)) = self.storage.get_at(ix) {
            self.notifier.emit(&MapEvent::Inserted { key, value });
        }
    }

    /// Insert `key -> value` unless `key` is present. Returns the entry's
    /// position and whether it was inserted; emits `Inserted` iff it was.
    pub fn emplace(&mut self, key: K, value: V) -> (Position, bool) {
        self.try_emplace(key, || value)
    }

    /// Like [`emplace`](Self::emplace), but the value is built by `make`,
    /// which only runs when the key is absent.
    pub fn try_emplace<F>(&mut self, key: K, make: F) -> (Position, bool)
    where
        F: FnOnce() -> V,
    {
        match self.insert_new(key, make) {
            Ok(ix) => (self.storage.position(ix), true),
            Err(ix) => (self.storage.position(ix), false),
        }
    }

    /// Insert or overwrite. Emits `Inserted` for a new key and `Updated`
    /// for an existing one; returns the previous value, if any.
    pub fn insert_or_assign(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.storage.make_hash(&key);
        match self.storage.find_hashed(hash, &key) {
            Some(ix) => Some(self.assign_at(ix, value)),
            None => {
                let before = self.storage.capacity();
                let ix = self.storage.push_hashed(hash, key, value);
                self.report_inserted(before, ix);
                None
            }
        }
    }

    /// Replace the value of `q` if present, emitting `Updated`.
    pub fn update_if_exists<Q>(&mut self, q: &Q, new_value: V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.storage.find(q) {
            Some(ix) => {
                self.assign_at(ix, new_value);
                true
            }
            None => false,
        }
    }

    fn assign_at(&mut self, ix: usize, value: V) -> V {
        let old_value = self.storage.replace_at(ix, value);
        if let Some((key, new_value)) = self.storage.get_at(ix) {
            self.notifier.emit(&MapEvent::Updated {
                key,
                old_value: &old_value,
                new_value,
            });
        }
        old_value
    }

    /// Map-or-create access. Creating the default entry emits `Inserted`;
    /// writes through the returned reference are not reported.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        let ix = match self.insert_new(key, V::default) {
            Ok(ix) | Err(ix) => ix,
        };
        self.storage.value_mut_at(ix)
    }

    /// Remove `q`, returning how many entries were erased (0 or 1).
    pub fn erase<Q>(&mut self, q: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        usize::from(self.remove_entry(q).is_some())
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(q).map(|(_, v)| v)
    }

    /// Remove `q` and hand back the owned entry after `Erased` was
    /// delivered.
    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let removed = self.storage.remove(q)?;
        Some(self.report_erased(removed))
    }

    fn remove_index(&mut self, ix: usize) -> Option<(K, V)> {
        let removed = self.storage.remove_at(ix)?;
        Some(self.report_erased(removed))
    }

    // The entry is out of storage before anyone hears about it; the event
    // borrows the moved-out pair.
    fn report_erased(&mut self, (key, old_value): (K, V)) -> (K, V) {
        self.notifier.emit(&MapEvent::Erased {
            key: &key,
            old_value: &old_value,
        });
        (key, old_value)
    }

    /// Positional erase. Returns the position of the next entry to visit,
    /// or `None` past the end. A stale position erases nothing.
    pub fn erase_at(&mut self, pos: Position) -> Option<Position> {
        let ix = self.storage.resolve(pos)?;
        self.remove_index(ix);
        (ix < self.storage.len()).then(|| self.storage.position(ix))
    }

    /// Keep only the entries for which `keep` returns true; each dropped
    /// entry is reported with its own `Erased`.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut ix = 0;
        while let Some((key, value)) = self.storage.get_at(ix) {
            if keep(key, value) {
                ix += 1;
            } else {
                // The last entry moves into `ix`; look at it next.
                self.remove_index(ix);
            }
        }
    }

    /// Remove every entry and emit a single `Cleared`. Clearing an empty
    /// map emits nothing.
    pub fn clear(&mut self) {
        let removed = self.storage.take_entries();
        if removed.is_empty() {
            return;
        }
        self.notifier.emit(&MapEvent::Cleared {
            removed: removed.len(),
        });
    }

    // ---------- Traversal ----------

    pub fn iter(&self) -> Iter<'_, K, V> {
        self.storage.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    pub fn first_position(&self) -> Option<Position> {
        (!self.storage.is_empty()).then(|| self.storage.position(0))
    }

    pub fn next_position(&self, pos: Position) -> Option<Position> {
        let ix = self.storage.resolve(pos)? + 1;
        (ix < self.storage.len()).then(|| self.storage.position(ix))
    }

    pub fn get_at(&self, pos: Position) -> Option<(&K, &V)> {
        self.storage
            .resolve(pos)
            .and_then(|ix| self.storage.get_at(ix))
    }
}

impl<K, Q, V, S> Index<&Q> for ReactiveMap<K, V, S>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Eq + Hash,
    S: BuildHasher,
{
    type Output = V;

    /// Panics if the key is not present; see [`ReactiveMap::at`].
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("key not found in reactive map")
    }
}

impl<'a, K, V, S> IntoIterator for &'a ReactiveMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, S> FromIterator<(K, V)> for ReactiveMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

impl<K, V, S> Extend<(K, V)> for ReactiveMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Routes through `insert_or_assign`, so each entry is reported.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert_or_assign(k, v);
        }
    }
}

impl<K, V, S> fmt::Debug for ReactiveMap<K, V, S>
where
    K: Eq + Hash + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{EventKind, KeyNotFound, ReactiveMap};
    use crate::event::OwnedMapEvent;
    use core::hash::BuildHasher;
    use std::cell::{Cell, RefCell};
    use std::collections::hash_map::RandomState;
    use std::rc::Rc;

    type Events = Rc<RefCell<Vec<OwnedMapEvent<i32, String>>>>;

    fn recorded() -> (ReactiveMap<i32, String>, Events) {
        let mut m: ReactiveMap<i32, String> = ReactiveMap::new();
        let events: Events = Rc::default();
        let log = events.clone();
        m.subscribe_all(move |e| log.borrow_mut().push(e.cloned()));
        (m, events)
    }

    fn entry_events(events: &Events) -> Vec<OwnedMapEvent<i32, String>> {
        events
            .borrow()
            .iter()
            .filter(|e| !matches!(e.kind(), EventKind::Rehashed | EventKind::Reserved))
            .cloned()
            .collect()
    }

    #[test]
    fn emplace_reports_only_real_insertions() {
        let (mut m, events) = recorded();
        let (p1, inserted) = m.emplace(1, "a".to_string());
        assert!(inserted);
        let (p2, inserted) = m.emplace(1, "b".to_string());
        assert!(!inserted);
        assert_eq!(p1, p2);
        assert_eq!(m.get_at(p2), Some((&1, &"a".to_string())));
        assert_eq!(
            entry_events(&events),
            [OwnedMapEvent::Inserted {
                key: 1,
                value: "a".to_string()
            }]
        );
    }

    #[test]
    fn growth_is_reported_before_the_insertion() {
        let (mut m, events) = recorded();
        m.emplace(7, "x".to_string());
        let log = events.borrow();
        match log.as_slice() {
            [OwnedMapEvent::Rehashed {
                old_capacity: 0,
                new_capacity,
            }, OwnedMapEvent::Inserted { key: 7, .. }] => assert!(*new_capacity >= 1),
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[test]
    fn insert_or_assign_reports_inserted_then_updated() {
        let (mut m, events) = recorded();
        assert_eq!(m.insert_or_assign(1, "a".to_string()), None);
        assert_eq!(m.insert_or_assign(1, "b".to_string()), Some("a".to_string()));
        assert_eq!(m.len(), 1);
        assert_eq!(
            entry_events(&events),
            [
                OwnedMapEvent::Inserted {
                    key: 1,
                    value: "a".to_string()
                },
                OwnedMapEvent::Updated {
                    key: 1,
                    old_value: "a".to_string(),
                    new_value: "b".to_string()
                }
            ]
        );
    }

    #[test]
    fn get_or_insert_default_reports_creation_once() {
        let (mut m, events) = recorded();
        m.get_or_insert_default(3).push_str("abc");
        m.get_or_insert_default(3).push_str("def");
        assert_eq!(m.get(&3).map(String::as_str), Some("abcdef"));
        assert_eq!(
            entry_events(&events),
            [OwnedMapEvent::Inserted {
                key: 3,
                value: String::new()
            }]
        );
    }

    #[test]
    fn erase_at_walks_every_entry_once() {
        let (mut m, events) = recorded();
        for i in 0..6 {
            m.emplace(i, i.to_string());
        }
        events.borrow_mut().clear();

        let mut pos = m.first_position();
        let mut visited = Vec::new();
        while let Some(p) = pos {
            let (&k, _) = m.get_at(p).expect("current position");
            visited.push(k);
            pos = if k % 2 == 0 {
                m.erase_at(p)
            } else {
                m.next_position(p)
            };
        }
        visited.sort_unstable();
        assert_eq!(visited, [0, 1, 2, 3, 4, 5]);
        let mut left: Vec<i32> = m.keys().copied().collect();
        left.sort_unstable();
        assert_eq!(left, [1, 3, 5]);
        assert_eq!(events.borrow().len(), 3);
        assert!(events.borrow().iter().all(|e| e.kind() == EventKind::Erased));
    }

    #[test]
    fn stale_position_erases_nothing() {
        let (mut m, events) = recorded();
        m.emplace(1, "a".to_string());
        m.emplace(2, "b".to_string());
        let p = m.find(&1).unwrap();
        m.erase(&2);
        events.borrow_mut().clear();
        assert_eq!(m.erase_at(p), None);
        assert_eq!(m.len(), 1);
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn position_from_another_map_erases_nothing() {
        let (mut a, _a_events) = recorded();
        let (mut b, b_events) = recorded();
        a.emplace(1, "a-one".to_string());
        b.emplace(99, "b-ninety-nine".to_string());
        b_events.borrow_mut().clear();

        let p = a.find(&1).unwrap();
        assert_eq!(b.get_at(p), None);
        assert_eq!(b.next_position(p), None);
        assert_eq!(b.erase_at(p), None);
        assert_eq!(b.len(), 1);
        assert!(b_events.borrow().is_empty());
        assert_eq!(a.get_at(p), Some((&1, &"a-one".to_string())));
    }

    // Counts how many keys get hashed.
    #[derive(Clone, Default)]
    struct CountingState {
        inner: RandomState,
        hashes: Rc<Cell<usize>>,
    }

    impl BuildHasher for CountingState {
        type Hasher = <RandomState as BuildHasher>::Hasher;
        fn build_hasher(&self) -> Self::Hasher {
            self.hashes.set(self.hashes.get() + 1);
            self.inner.build_hasher()
        }
    }

    #[test]
    fn insert_or_assign_hashes_the_key_once() {
        let state = CountingState::default();
        let hashes = state.hashes.clone();
        let mut m: ReactiveMap<i32, i32, CountingState> = ReactiveMap::with_hasher(state);

        assert_eq!(m.insert_or_assign(1, 10), None);
        assert_eq!(hashes.get(), 1, "absent key");
        assert_eq!(m.insert_or_assign(1, 11), Some(10));
        assert_eq!(hashes.get(), 2, "present key");
        for k in 2..100 {
            m.insert_or_assign(k, k);
        }
        assert_eq!(hashes.get(), 100, "growth reuses stored hashes");
        assert_eq!(m[&1], 11);
    }

    #[test]
    fn retain_reports_each_dropped_entry() {
        let (mut m, events) = recorded();
        for i in 0..10 {
            m.emplace(i, format!("v{i}"));
        }
        events.borrow_mut().clear();
        m.retain(|k, _| k % 3 == 0);
        assert_eq!(m.len(), 4);
        let mut erased: Vec<i32> = events
            .borrow()
            .iter()
            .map(|e| match e {
                OwnedMapEvent::Erased { key, old_value } => {
                    assert_eq!(*old_value, format!("v{key}"));
                    *key
                }
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        erased.sort_unstable();
        assert_eq!(erased, [1, 2, 4, 5, 7, 8]);
    }

    #[test]
    fn clear_reports_once_and_not_when_empty() {
        let (mut m, events) = recorded();
        m.clear();
        assert!(events.borrow().is_empty());

        m.emplace(1, "a".to_string());
        m.emplace(2, "b".to_string());
        events.borrow_mut().clear();
        m.clear();
        assert!(m.is_empty());
        assert_eq!(*events.borrow(), [OwnedMapEvent::Cleared { removed: 2 }]);
    }

    #[test]
    fn reserve_reports_only_real_changes() {
        let (mut m, events) = recorded();
        m.reserve(0);
        assert!(events.borrow().is_empty());

        m.reserve(100);
        let cap = m.capacity();
        assert!(cap >= 100);
        assert_eq!(
            *events.borrow(),
            [OwnedMapEvent::Reserved { new_capacity: cap }]
        );

        m.reserve(10);
        assert_eq!(events.borrow().len(), 1, "already large enough");
    }

    #[test]
    fn shrink_to_fit_reports_rehash() {
        let (mut m, events) = recorded();
        m.reserve(1000);
        let big = m.capacity();
        m.emplace(1, "a".to_string());
        events.borrow_mut().clear();
        m.shrink_to_fit();
        let small = m.capacity();
        assert!(small < big);
        assert_eq!(
            *events.borrow(),
            [OwnedMapEvent::Rehashed {
                old_capacity: big,
                new_capacity: small
            }]
        );
    }

    #[test]
    fn at_and_index() {
        let (mut m, _events) = recorded();
        m.emplace(5, "five".to_string());
        assert_eq!(m.at(&5), Ok(&"five".to_string()));
        assert_eq!(m.at(&6), Err(KeyNotFound));
        assert_eq!(KeyNotFound.to_string(), "key not found in reactive map");
        assert_eq!(m[&5], "five");
    }

    #[test]
    #[should_panic(expected = "key not found")]
    fn index_panics_on_missing_key() {
        let m: ReactiveMap<i32, i32> = ReactiveMap::new();
        let _v: i32 = m[&1];
    }

    #[test]
    fn from_iter_and_extend() {
        let mut m: ReactiveMap<&'static str, i32> = [("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(m.len(), 2);

        let events = Rc::new(RefCell::new(Vec::new()));
        let log = events.clone();
        m.subscribe_all(move |e| log.borrow_mut().push(e.kind()));
        m.extend([("b", 3), ("c", 4)]);
        assert_eq!(m[&"b"], 3);
        let kinds: Vec<EventKind> = events
            .borrow()
            .iter()
            .copied()
            .filter(|k| *k != EventKind::Rehashed)
            .collect();
        assert_eq!(kinds, [EventKind::Updated, EventKind::Inserted]);
    }

    #[test]
    fn debug_lists_entries() {
        let mut m: ReactiveMap<i32, i32> = ReactiveMap::new();
        m.emplace(1, 2);
        assert_eq!(format!("{:?}", m), "{1: 2}");
    }
}
