//! Notifier: listener registry with synchronous, ordered fan-out.

use crate::event::{EventKind, MapEvent};
use core::sync::atomic::{AtomicU64, Ordering};
use slotmap::{DefaultKey, SlotMap};

static NEXT_NOTIFIER_ID: AtomicU64 = AtomicU64::new(0);

/// Opaque handle returned by every registration; pass it to
/// `unsubscribe` to remove the listener.
///
/// Handles are generational and tied to the map that issued them: a
/// handle never resolves after removal, nor on a different map.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Subscription {
    key: DefaultKey,
    owner: u64,
}

/// Capability-style listener with one method per event kind.
///
/// Every method defaults to a no-op, so an observer implements only
/// the kinds it cares about.
pub trait MapObserver<K, V> {
    fn on_inserted(&mut self, _key: &K, _value: &V) {}
    fn on_updated(&mut self, _key: &K, _old_value: &V, _new_value: &V) {}
    fn on_erased(&mut self, _key: &K, _old_value: &V) {}
    fn on_cleared(&mut self, _removed: usize) {}
    fn on_rehashed(&mut self, _old_capacity: usize, _new_capacity: usize) {}
    fn on_reserved(&mut self, _new_capacity: usize) {}
}

type Callback<K, V> = Box<dyn FnMut(&MapEvent<'_, K, V>)>;

enum Listener<K, V> {
    Callback {
        // `None` receives every kind.
        filter: Option<EventKind>,
        callback: Callback<K, V>,
    },
    Observer(Box<dyn MapObserver<K, V>>),
}

impl<K, V> Listener<K, V> {
    /// Returns whether the listener was interested in `event`.
    fn deliver(&mut self, event: &MapEvent<'_, K, V>) -> bool {
        match self {
            Listener::Callback { filter, callback } => {
                if filter.is_some_and(|kind| kind != event.kind()) {
                    return false;
                }
                callback(event);
                true
            }
            Listener::Observer(observer) => {
                match *event {
                    MapEvent::Inserted { key, value } => observer.on_inserted(key, value),
                    MapEvent::Updated {
                        key,
                        old_value,
                        new_value,
                    } => observer.on_updated(key, old_value, new_value),
                    MapEvent::Erased { key, old_value } => observer.on_erased(key, old_value),
                    MapEvent::Cleared { removed } => observer.on_cleared(removed),
                    MapEvent::Rehashed {
                        old_capacity,
                        new_capacity,
                    } => observer.on_rehashed(old_capacity, new_capacity),
                    MapEvent::Reserved { new_capacity } => observer.on_reserved(new_capacity),
                }
                true
            }
        }
    }
}

pub(crate) struct Notifier<K, V> {
    id: u64,
    listeners: SlotMap<DefaultKey, Listener<K, V>>,
    // Registration order; slot order is not stable across removals.
    order: Vec<DefaultKey>,
}

impl<K, V> Notifier<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            id: NEXT_NOTIFIER_ID.fetch_add(1, Ordering::Relaxed),
            listeners: SlotMap::with_key(),
            order: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    fn register(&mut self, listener: Listener<K, V>) -> Subscription {
        let key = self.listeners.insert(listener);
        self.order.push(key);
        tracing::debug!(
            notifier = self.id,
            listeners = self.listeners.len(),
            "listener subscribed"
        );
        Subscription {
            key,
            owner: self.id,
        }
    }

    pub(crate) fn subscribe<F>(&mut self, kind: EventKind, callback: F) -> Subscription
    where
        F: FnMut(&MapEvent<'_, K, V>) + 'static,
    {
        self.register(Listener::Callback {
            filter: Some(kind),
            callback: Box::new(callback),
        })
    }

    pub(crate) fn subscribe_all<F>(&mut self, callback: F) -> Subscription
    where
        F: FnMut(&MapEvent<'_, K, V>) + 'static,
    {
        self.register(Listener::Callback {
            filter: None,
            callback: Box::new(callback),
        })
    }

    pub(crate) fn observe(&mut self, observer: Box<dyn MapObserver<K, V>>) -> Subscription {
        self.register(Listener::Observer(observer))
    }

    pub(crate) fn unsubscribe(&mut self, sub: Subscription) -> bool {
        if sub.owner != self.id || self.listeners.remove(sub.key).is_none() {
            return false;
        }
        self.order.retain(|&k| k != sub.key);
        tracing::debug!(
            notifier = self.id,
            listeners = self.listeners.len(),
            "listener unsubscribed"
        );
        true
    }

    /// Deliver `event` to every interested listener, in registration
    /// order, before returning. Listener panics propagate to the caller.
    pub(crate) fn emit(&mut self, event: &MapEvent<'_, K, V>) {
        if self.is_empty() {
            return;
        }
        let mut delivered = 0usize;
        for &key in &self.order {
            if let Some(listener) = self.listeners.get_mut(key) {
                if listener.deliver(event) {
                    delivered += 1;
                }
            }
        }
        tracing::trace!(
            notifier = self.id,
            kind = ?event.kind(),
            delivered,
            "map event delivered"
        );
    }
}
