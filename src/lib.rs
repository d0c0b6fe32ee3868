//! reactive-hashmap: a single-threaded hash map that tells registered
//! listeners about every change to its contents.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: let other components react to mutations of shared map state
//!   without polling and without wiring notification calls into every
//!   call site that mutates the map.
//! - Layers:
//!   - Storage<K, V, S>: dense entry vector plus a hashbrown index of
//!     positions; unique keys, O(1) average lookup/insert/erase,
//!     unspecified order. Never calls user code except `K: Eq/Hash`.
//!   - Notifier<K, V>: listener registry keyed by slotmap handles;
//!     delivers an event synchronously, in registration order.
//!   - ReactiveMap<K, V, S>: public API. Commits each mutation to
//!     Storage, then hands one `MapEvent` to the Notifier, then returns.
//!
//! Event coverage
//! - Every mutating method emits: `emplace`/`try_emplace`/
//!   `get_or_insert_default` (`Inserted`), `insert_or_assign`
//!   (`Inserted` or `Updated`), `update_if_exists` (`Updated`),
//!   `erase`/`remove`/`remove_entry`/`erase_at`/`retain` (`Erased`),
//!   `clear` (one `Cleared`), `reserve` (`Reserved`), growth on insert
//!   and `shrink_to_fit` (`Rehashed`).
//! - No-ops emit nothing: duplicate inserts, erasing a missing key,
//!   clearing an empty map, a `reserve` that changes no capacity.
//! - Writes through the `&mut V` returned by `get_or_insert_default`
//!   are the only unobserved mutation.
//!
//! Ordering
//! - Event-after-effect: the map already reflects a mutation when its
//!   listeners run; a growing insert reports `Rehashed` then `Inserted`.
//! - Erased data is moved out of Storage first and the event borrows the
//!   moved-out pair, so payloads never point into freed slots.
//! - Mutations take `&mut self`; listeners cannot reenter the map while
//!   an event is being delivered.
//!
//! Constraints
//! - Single-threaded: listeners are boxed non-`Send` closures.
//! - Listener panics are not caught. The mutation is committed before
//!   delivery starts, so the map stays consistent during unwinding.
//! - Positions are invalidated by every erase and by `clear`; a stale
//!   position, or one from another map, resolves to nothing.

mod event;
mod notifier;
mod reactive_map;
mod storage;
mod storage_proptest;

// Public surface
pub use event::{EventKind, MapEvent, OwnedMapEvent};
pub use notifier::{MapObserver, Subscription};
pub use reactive_map::{KeyNotFound, ReactiveMap};
pub use storage::{Iter, Position};
