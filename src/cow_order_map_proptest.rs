#![cfg(test)]

// Property tests for CowOrderMap kept inside the crate so they sit next to
// the layers they exercise.
//
// The scenario maintains a population of handles, some of them clones of
// one another, and a separate ordered model (Vec of pairs) per handle.
// After every operation every handle must still match its own model: a
// mutation through one handle must never be observable through another,
// whatever the sharing relationships are.

use crate::CowOrderMap;
use crate::Error;
use proptest::prelude::*;
use std::hash::{BuildHasher, Hasher};

type Model = Vec<(String, i32)>;

// Insert-style refresh on the model: a present key moves to the back and
// keeps its stored value.
fn model_insert(m: &mut Model, k: String, v: i32) -> bool {
    if let Some(pos) = m.iter().position(|(mk, _)| *mk == k) {
        let entry = m.remove(pos);
        m.push(entry);
        false
    } else {
        m.push((k, v));
        true
    }
}

fn model_merge(m: &mut Model, other: &Model) {
    for (k, v) in other {
        model_insert(m, k.clone(), *v);
    }
}

// Pool-indexed operations to improve shrinking: indices shrink to earlier
// keys and handles, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, usize, i32),
    Remove(usize, usize),
    Update(usize, usize, i32),
    GetOrInsert(usize, usize, i32, i32),
    CloneHandle(usize),
    DropHandle(usize),
    Merge(usize, usize),
    Clear(usize),
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let key = proptest::sample::select(idxs);
        let handle = 0usize..6;
        let op = prop_oneof![
            (handle.clone(), key.clone(), any::<i32>()).prop_map(|(h, k, v)| OpI::Insert(h, k, v)),
            (handle.clone(), key.clone()).prop_map(|(h, k)| OpI::Remove(h, k)),
            (handle.clone(), key.clone(), any::<i32>()).prop_map(|(h, k, d)| OpI::Update(h, k, d)),
            (handle.clone(), key.clone(), any::<i32>(), any::<i32>())
                .prop_map(|(h, k, v, d)| OpI::GetOrInsert(h, k, v, d)),
            handle.clone().prop_map(OpI::CloneHandle),
            handle.clone().prop_map(OpI::DropHandle),
            (handle.clone(), handle.clone()).prop_map(|(a, b)| OpI::Merge(a, b)),
            handle.prop_map(OpI::Clear),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn run_scenario<S>(pool: Vec<String>, ops: Vec<OpI>, mk: impl Fn() -> CowOrderMap<String, i32, S>)
where
    S: BuildHasher + Clone,
{
    let mut handles: Vec<(CowOrderMap<String, i32, S>, Model)> = vec![(mk(), Vec::new())];

    for op in ops {
        match op {
            OpI::Insert(h, k, v) => {
                let h = h % handles.len();
                let key = pool[k].clone();
                let (sut, model) = &mut handles[h];
                let fresh = sut.insert(key.clone(), v).unwrap();
                let model_fresh = model_insert(model, key, v);
                assert_eq!(fresh, model_fresh, "insert freshness must match the model");
            }
            OpI::Remove(h, k) => {
                let h = h % handles.len();
                let key = &pool[k];
                let (sut, model) = &mut handles[h];
                match sut.remove(key.as_str()) {
                    Ok(v) => {
                        let pos = model
                            .iter()
                            .position(|(mk, _)| mk == key)
                            .expect("remove succeeded, model must hold the key");
                        let (_, mv) = model.remove(pos);
                        assert_eq!(v, mv, "removed value must match the model");
                    }
                    Err(Error::NotFound) => {
                        assert!(model.iter().all(|(mk, _)| mk != key));
                    }
                    Err(e) => panic!("unexpected error: {e:?}"),
                }
            }
            OpI::Update(h, k, d) => {
                let h = h % handles.len();
                let key = &pool[k];
                let (sut, model) = &mut handles[h];
                match sut.update(key.as_str(), |v| {
                    *v = v.saturating_add(d);
                    *v
                }) {
                    Ok(new_v) => {
                        let (_, mv) = model
                            .iter_mut()
                            .find(|(mk, _)| mk == key)
                            .expect("update succeeded, model must hold the key");
                        *mv = mv.saturating_add(d);
                        assert_eq!(new_v, *mv);
                    }
                    Err(Error::NotFound) => {
                        assert!(model.iter().all(|(mk, _)| mk != key));
                    }
                    Err(e) => panic!("unexpected error: {e:?}"),
                }
            }
            OpI::GetOrInsert(h, k, v, d) => {
                let h = h % handles.len();
                let key = pool[k].clone();
                let (sut, model) = &mut handles[h];
                let r = sut.get_or_insert_with(key.clone(), || v).unwrap();
                *r = r.saturating_add(d);
                if model.iter().all(|(mk, _)| *mk != key) {
                    model.push((key.clone(), v));
                }
                let (_, mv) = model
                    .iter_mut()
                    .find(|(mk, _)| *mk == key)
                    .expect("key present after get_or_insert");
                *mv = mv.saturating_add(d);
            }
            OpI::CloneHandle(h) => {
                if handles.len() < 6 {
                    let h = h % handles.len();
                    let cloned = (handles[h].0.clone(), handles[h].1.clone());
                    handles.push(cloned);
                }
            }
            OpI::DropHandle(h) => {
                if handles.len() > 1 {
                    let h = h % handles.len();
                    handles.remove(h);
                }
            }
            OpI::Merge(a, b) => {
                let a = a % handles.len();
                let b = b % handles.len();
                // Merging through a cheap clone of the source keeps the
                // borrow checker happy and exercises the same semantics,
                // including the self-merge shape when a == b.
                let other_sut = handles[b].0.clone();
                let other_model = handles[b].1.clone();
                let (sut, model) = &mut handles[a];
                sut.merge(&other_sut).unwrap();
                model_merge(model, &other_model);
            }
            OpI::Clear(h) => {
                let h = h % handles.len();
                let (sut, model) = &mut handles[h];
                sut.clear();
                model.clear();
            }
        }

        // Post-conditions: every handle still matches its own model.
        for (sut, model) in &handles {
            let got: Model = sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
            assert_eq!(&got, model, "a handle diverged from its model");
            assert_eq!(sut.len(), model.len());
            assert_eq!(sut.is_empty(), model.is_empty());
            for key in &pool {
                assert_eq!(
                    sut.contains_key(key.as_str()),
                    model.iter().any(|(mk, _)| mk == key)
                );
            }
        }
    }
}

// Property: state-machine equivalence of a population of COW handles
// against independent ordered models. Invariants exercised:
// - insert freshness, refresh-on-duplicate order and value retention;
// - remove/update miss reporting and hit parity;
// - get_or_insert lazy construction plus in-place mutation;
// - merge refresh semantics in source order, including self-merge;
// - isolation: no operation on one handle is observable through another.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_cow_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(pool, ops, CowOrderMap::new);
    }
}

// Collision variant using a constant hasher to stress equality resolution
// in the index while order bookkeeping churns.
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
    fn prop_cow_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_scenario(pool, ops, || CowOrderMap::with_hasher(ConstBuildHasher));
    }
}
