#![cfg(test)]

// Property tests for HashTable kept inside the crate so they can call the
// structural checker after every operation.

use crate::error::InsertError;
use crate::policy::{First, KeyPolicy};
use crate::table::HashTable;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::BTreeMap;
use std::hash::{BuildHasher, Hasher};

const CAP: usize = 8;

type Value = (u32, i32);

// Pool-indexed keys keep shrinking effective: indices shrink towards the
// first key and op lists shrink in length.
#[derive(Clone, Debug)]
enum Op {
    InsertUnique(u32, i32),
    InsertEqual(u32, i32),
    Erase(u32),
    EraseFirst(u32),
    EqualRange(u32),
    Bump(u32, i32),
    Iterate,
    Clear,
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    // More keys than slots, so the table fills up and collides.
    let key = 0u32..12;
    let op = prop_oneof![
        3 => (key.clone(), any::<i32>()).prop_map(|(k, v)| Op::InsertUnique(k, v)),
        4 => (key.clone(), any::<i32>()).prop_map(|(k, v)| Op::InsertEqual(k, v)),
        2 => key.clone().prop_map(Op::Erase),
        2 => key.clone().prop_map(Op::EraseFirst),
        2 => key.clone().prop_map(Op::EqualRange),
        1 => (key, any::<i32>()).prop_map(|(k, d)| Op::Bump(k, d)),
        1 => Just(Op::Iterate),
        1 => Just(Op::Clear),
    ];
    proptest::collection::vec(op, 1..80)
}

/// Model: payloads per key in insertion order.
type Model = BTreeMap<u32, Vec<i32>>;

fn model_len(model: &Model) -> usize {
    model.values().map(Vec::len).sum()
}

fn run<P>(ops: Vec<Op>) -> Result<(), TestCaseError>
where
    P: KeyPolicy<Value, Key = u32>,
{
    let mut sut: HashTable<Value, P, CAP> = HashTable::new();
    let mut model = Model::new();

    for op in ops {
        match op {
            Op::InsertUnique(k, v) => {
                let present = model.contains_key(&k);
                let full = model_len(&model) == CAP;
                match sut.insert_unique((k, v)) {
                    Ok(pos) => {
                        prop_assert!(!present && !full);
                        prop_assert_eq!(sut.get(pos), Some(&(k, v)));
                        model.entry(k).or_default().push(v);
                    }
                    Err(InsertError::Duplicate(pos)) => {
                        prop_assert!(present, "duplicate error only when key exists");
                        prop_assert_eq!(sut.get(pos).map(|e| e.0), Some(k));
                    }
                    Err(InsertError::Full) => prop_assert!(full && !present),
                }
            }
            Op::InsertEqual(k, v) => {
                let full = model_len(&model) == CAP;
                match sut.insert_equal((k, v)) {
                    Ok(pos) => {
                        prop_assert!(!full);
                        prop_assert_eq!(sut.get(pos), Some(&(k, v)));
                        model.entry(k).or_default().push(v);
                    }
                    Err(InsertError::Full) => prop_assert!(full),
                    Err(InsertError::Duplicate(_)) => {
                        prop_assert!(false, "insert_equal never reports a duplicate")
                    }
                }
            }
            Op::Erase(k) => {
                let expected = model.remove(&k).map_or(0, |vs| vs.len());
                prop_assert_eq!(sut.erase(&k), expected);
                prop_assert!(!sut.contains(&k));
            }
            Op::EraseFirst(k) => {
                let (first, _) = sut.equal_range_bounds(&k);
                match first {
                    Some(pos) => {
                        let vs = model.get_mut(&k);
                        prop_assert!(vs.is_some());
                        if let Some(vs) = vs {
                            let v = vs.remove(0);
                            prop_assert_eq!(sut.erase_at(pos), Some((k, v)));
                            if vs.is_empty() {
                                model.remove(&k);
                            }
                        }
                    }
                    None => prop_assert!(!model.contains_key(&k)),
                }
            }
            Op::EqualRange(k) => {
                let got: Vec<i32> = sut.equal_range(&k).map(|e| e.1).collect();
                let want = model.get(&k).cloned().unwrap_or_default();
                prop_assert_eq!(sut.count(&k), want.len());
                prop_assert_eq!(got, want);
            }
            Op::Bump(k, d) => {
                if let Some(pos) = sut.find(&k) {
                    if let Some(e) = sut.get_mut(pos) {
                        e.1 = e.1.wrapping_add(d);
                    }
                    if let Some(vs) = model.get_mut(&k) {
                        vs[0] = vs[0].wrapping_add(d);
                    }
                } else {
                    prop_assert!(!model.contains_key(&k));
                }
            }
            Op::Iterate => {
                let mut seen = Model::new();
                for (k, v) in sut.iter() {
                    seen.entry(*k).or_default().push(*v);
                }
                prop_assert_eq!(seen, model.clone());
            }
            Op::Clear => {
                sut.clear();
                model.clear();
            }
        }

        // Post-conditions after each op.
        prop_assert_eq!(sut.len(), model_len(&model));
        prop_assert_eq!(sut.len() + sut.remaining(), CAP);
        prop_assert_eq!(sut.iter().count(), sut.len());
        prop_assert_eq!(sut.verify(), Ok(()));
        // Equal keys are adjacent in traversal.
        let order: Vec<u32> = sut.iter().map(|e| e.0).collect();
        for (i, k) in order.iter().enumerate() {
            if let Some(j) = order[i + 1..].iter().position(|x| x == k) {
                prop_assert!(order[i + 1..i + 1 + j].iter().all(|x| x == k));
            }
        }
    }
    Ok(())
}

// Property: state-machine equivalence against a multimap model.
// Invariants exercised across random operation sequences:
// - `insert_unique` rejects present keys and full tables, in that order.
// - `insert_equal` only fails when full; runs list payloads in insertion order.
// - `erase`/`erase_at` remove exactly what the model removes.
// - Traversal yields every live value once with equal keys adjacent.
// - `verify` accepts the structure after every operation.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(ops in arb_ops()) {
        run::<First>(ops)?;
    }
}

// Collision variant using a constant hasher: every value shares bucket 0.
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

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions(ops in arb_ops()) {
        run::<First<ConstBuildHasher>>(ops)?;
    }
}
