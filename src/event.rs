//! Event taxonomy emitted by `ReactiveMap` after each committed mutation.

use core::fmt;

/// Payload-free tag of a [`MapEvent`]; listeners register against it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EventKind {
    Inserted,
    Updated,
    Erased,
    Cleared,
    Rehashed,
    Reserved,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::Inserted,
        EventKind::Updated,
        EventKind::Erased,
        EventKind::Cleared,
        EventKind::Rehashed,
        EventKind::Reserved,
    ];
}

/// One completed mutation, borrowed for the duration of a synchronous
/// delivery.
///
/// Key and value references point either into the map (for data that is
/// still stored) or at data that was just moved out of it (for `Erased`
/// and the `old_value` of `Updated`). Either way they are only valid
/// inside the listener call; use [`MapEvent::cloned`] to keep a copy.
pub enum MapEvent<'a, K, V> {
    /// A brand-new key was added.
    Inserted { key: &'a K, value: &'a V },
    /// An existing key's value was replaced.
    Updated {
        key: &'a K,
        old_value: &'a V,
        new_value: &'a V,
    },
    /// A key and its value were removed.
    Erased { key: &'a K, old_value: &'a V },
    /// Every entry was removed at once.
    Cleared { removed: usize },
    /// The index table was restructured.
    Rehashed {
        old_capacity: usize,
        new_capacity: usize,
    },
    /// `reserve` changed the capacity.
    Reserved { new_capacity: usize },
}

impl<'a, K, V> MapEvent<'a, K, V> {
    pub fn kind(&self) -> EventKind {
        match self {
            MapEvent::Inserted { .. } => EventKind::Inserted,
            MapEvent::Updated { .. } => EventKind::Updated,
            MapEvent::Erased { .. } => EventKind::Erased,
            MapEvent::Cleared { .. } => EventKind::Cleared,
            MapEvent::Rehashed { .. } => EventKind::Rehashed,
            MapEvent::Reserved { .. } => EventKind::Reserved,
        }
    }

    /// The key the event is about, for per-entry events.
    pub fn key(&self) -> Option<&'a K> {
        match *self {
            MapEvent::Inserted { key, .. }
            | MapEvent::Updated { key, .. }
            | MapEvent::Erased { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Copy the payload out so it can outlive the delivery.
    pub fn cloned(&self) -> OwnedMapEvent<K, V>
    where
        K: Clone,
        V: Clone,
    {
        match *self {
            MapEvent::Inserted { key, value } => OwnedMapEvent::Inserted {
                key: key.clone(),
                value: value.clone(),
            },
            MapEvent::Updated {
                key,
                old_value,
                new_value,
            } => OwnedMapEvent::Updated {
                key: key.clone(),
                old_value: old_value.clone(),
                new_value: new_value.clone(),
            },
            MapEvent::Erased { key, old_value } => OwnedMapEvent::Erased {
                key: key.clone(),
                old_value: old_value.clone(),
            },
            MapEvent::Cleared { removed } => OwnedMapEvent::Cleared { removed },
            MapEvent::Rehashed {
                old_capacity,
                new_capacity,
            } => OwnedMapEvent::Rehashed {
                old_capacity,
                new_capacity,
            },
            MapEvent::Reserved { new_capacity } => OwnedMapEvent::Reserved { new_capacity },
        }
    }
}

// Manual impls: the payload is references, so no `K: Clone` bound.
impl<K, V> Clone for MapEvent<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for MapEvent<'_, K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for MapEvent<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapEvent::Inserted { key, value } => f
                .debug_struct("Inserted")
                .field("key", key)
                .field("value", value)
                .finish(),
            MapEvent::Updated {
                key,
                old_value,
                new_value,
            } => f
                .debug_struct("Updated")
                .field("key", key)
                .field("old_value", old_value)
                .field("new_value", new_value)
                .finish(),
            MapEvent::Erased { key, old_value } => f
                .debug_struct("Erased")
                .field("key", key)
                .field("old_value", old_value)
                .finish(),
            MapEvent::Cleared { removed } => {
                f.debug_struct("Cleared").field("removed", removed).finish()
            }
            MapEvent::Rehashed {
                old_capacity,
                new_capacity,
            } => f
                .debug_struct("Rehashed")
                .field("old_capacity", old_capacity)
                .field("new_capacity", new_capacity)
                .finish(),
            MapEvent::Reserved { new_capacity } => f
                .debug_struct("Reserved")
                .field("new_capacity", new_capacity)
                .finish(),
        }
    }
}

/// Owned copy of a [`MapEvent`].
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum OwnedMapEvent<K, V> {
    Inserted { key: K, value: V },
    Updated { key: K, old_value: V, new_value: V },
    Erased { key: K, old_value: V },
    Cleared { removed: usize },
    Rehashed { old_capacity: usize, new_capacity: usize },
    Reserved { new_capacity: usize },
}

impl<K, V> OwnedMapEvent<K, V> {
    pub fn kind(&self) -> EventKind {
        match self {
            OwnedMapEvent::Inserted { .. } => EventKind::Inserted,
            OwnedMapEvent::Updated { .. } => EventKind::Updated,
            OwnedMapEvent::Erased { .. } => EventKind::Erased,
            OwnedMapEvent::Cleared { .. } => EventKind::Cleared,
            OwnedMapEvent::Rehashed { .. } => EventKind::Rehashed,
            OwnedMapEvent::Reserved { .. } => EventKind::Reserved,
        }
    }
}
