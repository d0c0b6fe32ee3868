#![cfg(test)]

// Property tests for Storage kept inside the crate so they can reach the
// internal layer directly.

use crate::storage::Storage;
use proptest::prelude::*;
use std::collections::hash_map::RandomState;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations so shrinking moves toward earlier keys.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    Remove(usize),
    RemoveAt(usize),
    Find(usize),
    Contains(String),
    Replace(usize, i32),
    Reserve(usize),
    Shrink,
    Clear,
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            2 => idx.clone().prop_map(Op::Remove),
            2 => (0usize..16).prop_map(Op::RemoveAt),
            2 => idx.clone().prop_map(Op::Find),
            1 => "[a-z]{0,5}".prop_map(Op::Contains),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Replace(i, v)),
            1 => (0usize..64).prop_map(Op::Reserve),
            1 => Just(Op::Shrink),
            1 => Just(Op::Clear),
            1 => Just(Op::Iterate),
        ];
        (Just(pool), proptest::collection::vec(op, 1..120))
    })
}

// Constant hasher: every key collides, so lookups rely on `Eq` alone.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// State machine harness over Storage against a std::collections::HashMap model.
fn run_state_machine<S: BuildHasher>(
    mut sut: Storage<Key, i32, S>,
    pool: Vec<String>,
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<Key, i32> = HashMap::new();
    let key = |i: usize| Key(pool[i].clone());

    for op in ops {
        match op {
            Op::Insert(i, v) => {
                let k = key(i);
                let already = model.contains_key(&k);
                match sut.insert_unique(k.clone(), v) {
                    Ok(ix) => {
                        prop_assert!(!already, "insert must fail on duplicate");
                        prop_assert_eq!(sut.get_at(ix), Some((&k, &v)));
                        model.insert(k, v);
                    }
                    Err(ix) => {
                        prop_assert!(already, "duplicate only when key exists");
                        prop_assert_eq!(sut.get_at(ix).map(|(_, v)| *v), model.get(&k).copied());
                    }
                }
            }
            Op::Remove(i) => {
                let k = key(i);
                let got = sut.remove(&k);
                prop_assert_eq!(got.map(|(_, v)| v), model.remove(&k));
            }
            Op::RemoveAt(ix) => match sut.remove_at(ix) {
                Some((k, v)) => prop_assert_eq!(model.remove(&k), Some(v)),
                None => prop_assert!(ix >= model.len()),
            },
            Op::Find(i) => {
                let k = key(i);
                let found = sut.find(&k).and_then(|ix| sut.get_at(ix)).map(|(_, v)| *v);
                prop_assert_eq!(found, model.get(&k).copied());
            }
            Op::Contains(s) => {
                let has = sut.find(s.as_str()).is_some();
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(has, has_model);
            }
            Op::Replace(i, v) => {
                let k = key(i);
                if let Some(ix) = sut.find(&k) {
                    let old = sut.replace_at(ix, v);
                    prop_assert_eq!(model.insert(k, v), Some(old));
                }
            }
            Op::Reserve(n) => {
                sut.reserve(n);
                prop_assert!(sut.capacity() >= sut.len() + n);
            }
            Op::Shrink => sut.shrink_to_fit(),
            Op::Clear => {
                let taken = sut.take_entries();
                prop_assert_eq!(taken.len(), model.len());
                model.clear();
            }
            Op::Iterate => {
                let s_keys: BTreeSet<_> = sut.iter().map(|(k, _)| k.clone()).collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
            }
        }

        // Post-conditions after each op: size parity and every key resolves
        // to its own entry.
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        prop_assert!(sut.capacity() >= sut.len());
        for (k, v) in &model {
            let ix = sut.find(k);
            prop_assert!(ix.is_some(), "model key {:?} missing", k);
            prop_assert_eq!(ix.and_then(|ix| sut.get_at(ix)), Some((k, v)));
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let sut: Storage<Key, i32> = Storage::with_capacity_and_hasher(0, RandomState::new());
        run_state_machine(sut, pool, ops)?;
    }

    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let sut: Storage<Key, i32, ConstBuildHasher> =
            Storage::with_capacity_and_hasher(0, ConstBuildHasher);
        run_state_machine(sut, pool, ops)?;
    }
}
