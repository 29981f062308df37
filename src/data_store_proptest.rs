#![cfg(test)]

// Property tests for DataStore kept inside the crate so the colliding
// digest from the buckets tests can be reused.

use crate::buckets::{growth_step, tests::ConstDigest};
use crate::{DataStore, KeyDigest, Node, StoreConfig, StoreError};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    Update(usize, i32),
    Delete(usize),
    Search(usize),
    Contains(String),
    Resize(usize),
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            3 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Update(i, v)),
            1 => idx.clone().prop_map(OpI::Delete),
            1 => idx.clone().prop_map(OpI::Search),
            1 => "[a-z]{0,5}".prop_map(OpI::Contains),
            1 => (0usize..6).prop_map(OpI::Resize),
            1 => Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

/// Drive `sut` and a `HashMap` model through the same operations and
/// compare after every step.
fn run_state_machine<D: KeyDigest>(
    sut: DataStore<i32, D>,
    pool: Vec<String>,
    ops: Vec<OpI>,
    digests_collide: bool,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<String, i32> = HashMap::new();

    for op in ops {
        let (size_before, capacity_before) = (sut.size(), sut.capacity());
        match op {
            OpI::Insert(i, v) => {
                let k = &pool[i];
                let already = model.contains_key(k);
                match sut.insert(k.as_str(), v) {
                    Ok(node) => {
                        prop_assert!(!already, "insert must fail on duplicate");
                        prop_assert_eq!(node.key(), k.as_str());
                        prop_assert_eq!(*node.value(), v);
                        drop(node);
                        model.insert(k.clone(), v);
                        if size_before >= capacity_before {
                            prop_assert!(sut.capacity() > size_before);
                            prop_assert!(sut.capacity() >= growth_step(capacity_before));
                        } else {
                            prop_assert_eq!(sut.capacity(), capacity_before);
                        }
                    }
                    Err(StoreError::DuplicateKey(dk)) => {
                        prop_assert!(already, "duplicate error only when key exists");
                        prop_assert_eq!(&dk, k);
                        prop_assert_eq!(sut.capacity(), capacity_before);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                }
            }
            OpI::Update(i, v) => {
                let k = &pool[i];
                match sut.update(k, v) {
                    Ok(node) => {
                        prop_assert_eq!(*node.value(), v);
                        drop(node);
                        let slot = model.get_mut(k);
                        prop_assert!(slot.is_some(), "update succeeded on absent key");
                        if let Some(mv) = slot {
                            *mv = v;
                        }
                    }
                    Err(err) => {
                        prop_assert_eq!(err, StoreError::KeyNotFound(k.clone()));
                        prop_assert!(!model.contains_key(k));
                    }
                }
            }
            OpI::Delete(i) => {
                let k = &pool[i];
                let res = sut.delete(k);
                match model.remove(k) {
                    Some(_) => prop_assert_eq!(res, Ok(())),
                    None => prop_assert_eq!(res, Err(StoreError::KeyNotFound(k.clone()))),
                }
            }
            OpI::Search(i) => {
                let k = &pool[i];
                let found = sut.search(k).map(|n| *n.value());
                prop_assert_eq!(found, model.get(k).copied());
            }
            OpI::Contains(s) => {
                let has = sut.contains(&s);
                if digests_collide {
                    prop_assert_eq!(has, !model.is_empty());
                } else {
                    prop_assert_eq!(has, model.contains_key(&s));
                }
            }
            OpI::Resize(n) => {
                let res = sut.resize(n);
                if n == 0 {
                    prop_assert_eq!(res, Err(StoreError::InvalidCapacity(0)));
                    prop_assert_eq!(sut.capacity(), capacity_before);
                } else {
                    prop_assert_eq!(res, Ok(()));
                    prop_assert_eq!(sut.capacity(), n);
                }
                prop_assert_eq!(sut.size(), size_before);
            }
            OpI::Iterate => {
                let view = sut.iterate();
                let keys: BTreeSet<String> = view
                    .iter()
                    .flat_map(|(_, head)| head.chain().map(Node::key))
                    .map(str::to_string)
                    .collect();
                let chained: usize = view.iter().map(|(_, head)| head.chain().count()).sum();
                drop(view);
                prop_assert_eq!(chained, keys.len(), "keys are unique across chains");
                let m_keys: BTreeSet<String> = model.keys().cloned().collect();
                prop_assert_eq!(keys, m_keys);
            }
        }

        // Post-conditions after each op
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        if digests_collide {
            prop_assert_eq!(sut.size(), usize::from(!model.is_empty()));
        } else {
            prop_assert_eq!(sut.size(), model.len());
        }
        for (k, v) in &model {
            prop_assert_eq!(sut.get(k), Some(*v));
        }
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap
// with SHA-256 placement (one key per bucket).
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario(), cap in 1usize..5) {
        let sut = DataStore::with_capacity(cap).unwrap();
        run_state_machine(sut, pool, ops, false)?;
    }
}

// Property: same invariants when every key lands in one bucket, which
// stresses chain walking, head replacement and unlinking.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario(), locking in any::<bool>()) {
        let sut = StoreConfig::new()
            .capacity(2)
            .locking(locking)
            .build_with_digest(ConstDigest)
            .unwrap();
        run_state_machine(sut, pool, ops, true)?;
    }
}
