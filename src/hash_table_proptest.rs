#![cfg(test)]

// Property tests for HashTable kept inside the crate so they can check the
// internal cluster invariants after every operation.

use crate::hash::hash_bytes;
use crate::hash_table::{ByValue, HashTable, Insert, ResizeMode};
use proptest::prelude::*;
use std::collections::HashSet;

#[derive(Clone, Debug)]
enum Op {
    Insert(u16),
    Remove(u16),
    Find(u16),
}

fn arb_mode() -> impl Strategy<Value = ResizeMode> {
    prop_oneof![
        Just(ResizeMode::Enlarge),
        Just(ResizeMode::EnlargeAndShrink),
    ]
}

fn arb_ops(keys: u16) -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        3 => (0..keys).prop_map(Op::Insert),
        2 => (0..keys).prop_map(Op::Remove),
        1 => (0..keys).prop_map(Op::Find),
    ];
    proptest::collection::vec(op, 1..300)
}

fn strong_hash(k: u16) -> u32 {
    hash_bytes(&k.to_le_bytes())
}

// Only four distinct hashes: long shared clusters with many tombstones.
fn weak_hash(k: u16) -> u32 {
    u32::from(k % 4) * 3
}

fn run_state_machine(
    mode: ResizeMode,
    ops: Vec<Op>,
    hash: fn(u16) -> u32,
) -> Result<(), TestCaseError> {
    let mut sut: HashTable<u16> = HashTable::new(8, ByValue, mode).unwrap();
    let mut model: HashSet<u16> = HashSet::new();
    let mut reached_half = false;

    for op in ops {
        match op {
            Op::Insert(k) => {
                // Load is judged against the capacity the insert landed in,
                // before any enlarge it triggers.
                let cap = sut.capacity();
                let res = sut.insert(k, hash(k)).unwrap();
                if model.insert(k) {
                    prop_assert_eq!(res, Insert::Inserted);
                } else {
                    prop_assert_eq!(res, Insert::Present(k));
                }
                if sut.len() * 100 >= cap as usize * 50 {
                    reached_half = true;
                }
            }
            Op::Remove(k) => {
                let cap = sut.capacity();
                let res = sut.remove(&k, hash(k));
                prop_assert_eq!(res, model.take(&k));
                if !reached_half {
                    prop_assert_eq!(sut.capacity(), cap, "shrink before 50% load");
                }
            }
            Op::Find(k) => {
                let found = sut.find(&k, hash(k)).map(|m| *m.value());
                prop_assert_eq!(found, model.get(&k).copied());
            }
        }

        sut.assert_invariants();
        prop_assert_eq!(sut.len(), model.len());
        prop_assert!(sut.len() * 100 < sut.capacity() as usize * 75);
    }

    // Every value the model holds is reachable, and nothing else is stored.
    for &k in &model {
        prop_assert!(sut.contains(&k, hash(k)));
    }
    prop_assert_eq!(sut.iter().count(), model.len());
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashSet.
// Invariants exercised across random operation sequences:
// - insert reports Inserted exactly for new values, Present otherwise.
// - remove hands back the stored value iff the model holds it.
// - find has no false negatives or positives, tombstones included.
// - every stored value lies inside its home's cluster window, and every
//   non-empty cluster ends with one of its own members.
// - load stays below the enlarge threshold; shrink only after 50% load.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(mode in arb_mode(), ops in arb_ops(64)) {
        run_state_machine(mode, ops, strong_hash)?;
    }

    #[test]
    fn prop_state_machine_with_collisions(mode in arb_mode(), ops in arb_ops(24)) {
        run_state_machine(mode, ops, weak_hash)?;
    }
}

// Property: with resizing disabled, a small table either accepts a value or
// reports Full, and never loses stored values.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_fixed_capacity(ops in arb_ops(16)) {
        let mut sut: HashTable<u16> = HashTable::new(8, ByValue, ResizeMode::Disabled).unwrap();
        let mut model: HashSet<u16> = HashSet::new();
        for op in ops {
            match op {
                Op::Insert(k) => match sut.insert(k, weak_hash(k)) {
                    Ok(Insert::Inserted) => prop_assert!(model.insert(k)),
                    Ok(Insert::Present(v)) => prop_assert!(model.contains(&v)),
                    Err(_) => prop_assert_eq!(model.len(), 8),
                },
                Op::Remove(k) => {
                    prop_assert_eq!(sut.remove(&k, weak_hash(k)), model.take(&k));
                }
                Op::Find(k) => {
                    prop_assert_eq!(sut.contains(&k, weak_hash(k)), model.contains(&k));
                }
            }
            sut.assert_invariants();
            prop_assert_eq!(sut.capacity(), 8);
        }
    }
}
