// Rollback behavior through the public API, driven by the fault-injection
// feature (cargo test --features fault-injection).
//
// Each mutating operation is failed at every allocation checkpoint it can
// hit; afterwards the target map must be identical in content, order, and
// sharing relationship to its pre-call state.
use cow_ordermap::fault;
use cow_ordermap::{CowOrderMap, Error};

fn entries(m: &CowOrderMap<i32, i32>) -> Vec<(i32, i32)> {
    m.iter().map(|(k, v)| (*k, *v)).collect()
}

// Test: insert rollback on a sole owner.
// Verifies: both the append checkpoint and the index checkpoint leave the
// map unchanged, and the same insert succeeds once disarmed.
#[test]
fn insert_rolls_back_in_place() {
    let mut m = CowOrderMap::new();
    m.insert(1, 1).unwrap();
    let before = entries(&m);

    for n in 0..2 {
        fault::fail_after(n);
        assert_eq!(m.insert(2, 2), Err(Error::AllocationFailed), "n = {n}");
        fault::disarm();
        assert_eq!(entries(&m), before, "n = {n}");
        assert!(!m.contains_key(&2));
    }

    assert_eq!(m.insert(2, 2), Ok(true));
    assert_eq!(entries(&m), [(1, 1), (2, 2)]);
}

// Test: divergence rollback on a shared handle.
// Verifies: a failure during or after the divergence clone leaves the
// handle still sharing its original state.
#[test]
fn failed_divergence_keeps_sharing() {
    let mut a = CowOrderMap::new();
    a.insert(1, 1).unwrap();
    a.insert(2, 2).unwrap();
    let b = a.clone();
    let before = entries(&a);

    // Checkpoint 0: the divergence clone; 1..3: the append and index
    // steps on the working copy.
    for n in 0..3 {
        fault::fail_after(n);
        assert_eq!(a.insert(3, 3), Err(Error::AllocationFailed), "n = {n}");
        fault::disarm();
        assert!(a.shares_storage_with(&b), "n = {n}");
        assert_eq!(entries(&a), before, "n = {n}");
    }

    assert_eq!(a.insert(3, 3), Ok(true));
    assert!(!a.shares_storage_with(&b));
    assert_eq!(entries(&b), before);
}

// Test: merge atomicity.
// Verifies: a failure at any checkpoint of the merge discards the working
// copy; no partial application is ever observable.
#[test]
fn merge_discards_working_copy_on_failure() {
    let mut a = CowOrderMap::new();
    a.insert(1, 10).unwrap();
    a.insert(2, 20).unwrap();

    let mut other = CowOrderMap::new();
    other.insert(2, 99).unwrap();
    other.insert(3, 30).unwrap();
    other.insert(4, 40).unwrap();

    let before = entries(&a);
    // Checkpoints: working-copy clone, then two per appended key (3, 4).
    for n in 0..5 {
        fault::fail_after(n);
        assert_eq!(a.merge(&other), Err(Error::AllocationFailed), "n = {n}");
        fault::disarm();
        assert_eq!(entries(&a), before, "n = {n}");
    }

    a.merge(&other).unwrap();
    assert_eq!(entries(&a), [(1, 10), (2, 20), (3, 30), (4, 40)]);
}

// Test: get_or_insert rollback restores shareability.
// Verifies: when the freezing accessor fails, the state neither freezes
// nor diverges.
#[test]
fn failed_get_or_insert_does_not_freeze() {
    let mut a: CowOrderMap<i32, i32> = CowOrderMap::new();
    a.insert(1, 1).unwrap();
    let b = a.clone();

    fault::fail_after(0);
    assert!(a.get_or_insert_default(2).is_err());
    assert!(a.shares_storage_with(&b), "failed freeze must not rebind");

    // The handle is still shareable: a later clone shares.
    a.insert(3, 3).unwrap();
    let c = a.clone();
    assert!(a.shares_storage_with(&c));
}
