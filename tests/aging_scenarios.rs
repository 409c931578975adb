// ==============================================
// END-TO-END AGING SCENARIOS (integration)
// ==============================================
//
// Each scenario drives a container with a hand-advanced clock and checks
// both traversal orders at every step. These walk the crate the way an
// expiration-based cache would, spanning module boundaries, so they live
// here rather than in any single source file.

use agekit::clock::ManualClock;
use agekit::ordered::{AgedOrderedMap, AgedOrderedMultimap, AgedOrderedMultiset, AgedOrderedSet};
use agekit::unordered::AgedUnorderedSet;

// ==============================================
// Basic aging on an ordered unique set
// ==============================================

#[test]
fn ordered_set_ages_and_touches() {
    let clock = ManualClock::new();
    let mut set = AgedOrderedSet::new(clock.clone());

    clock.set(1);
    set.insert(3);
    clock.set(2);
    set.insert(1);
    clock.set(3);
    set.insert(2);

    let associative: Vec<_> = set.iter().copied().collect();
    assert_eq!(associative, vec![1, 2, 3]);
    let temporal: Vec<_> = set.chronological().iter().map(|e| *e.key).collect();
    assert_eq!(temporal, vec![3, 1, 2]);

    clock.set(4);
    assert!(set.touch(&1));
    let temporal: Vec<_> = set.chronological().iter().map(|e| *e.key).collect();
    assert_eq!(temporal, vec![3, 2, 1]);

    // Client-written eviction: walk the oldest end until one entry is left.
    let mut evicted = Vec::new();
    while set.len() > 1 {
        evicted.push(set.pop_oldest().expect("non-empty"));
    }
    assert_eq!(evicted, vec![3, 2]);
    let survivors: Vec<_> = set.iter().copied().collect();
    assert_eq!(survivors, vec![1]);
    set.debug_validate_invariants();
}

// ==============================================
// Multi-key insertion order
// ==============================================

#[test]
fn multimap_keeps_insertion_order_within_runs() {
    let clock = ManualClock::new();
    let mut map = AgedOrderedMultimap::new(clock.clone());

    clock.set(1);
    map.insert('A', 'x');
    clock.set(2);
    map.insert('B', 'y');
    clock.set(3);
    map.insert('A', 'z');

    let associative: Vec<_> = map.iter().map(|(k, v)| (*k, *v)).collect();
    assert_eq!(associative, vec![('A', 'x'), ('A', 'z'), ('B', 'y')]);

    let temporal: Vec<_> = map.chronological().iter().map(|e| (*e.key, *e.value)).collect();
    assert_eq!(temporal, vec![('A', 'x'), ('B', 'y'), ('A', 'z')]);

    let run: Vec<_> = map.equal_range(&'A').map(|(k, v)| (*k, *v)).collect();
    assert_eq!(run, vec![('A', 'x'), ('A', 'z')]);
    map.debug_validate_invariants();
}

// ==============================================
// Index-style access on a unique map
// ==============================================

#[test]
fn default_insert_stamps_once_and_stays_put() {
    let clock = ManualClock::new();
    let mut map: AgedOrderedMap<u32, u64, ManualClock> = AgedOrderedMap::new(clock.clone());

    clock.set(1);
    let slot = map.get_or_insert_default(7);
    assert_eq!(*slot, 0);
    assert_eq!(map.len(), 1);

    let id = map.find(&7).expect("just inserted");
    assert_eq!(map.when_of(id), Some(1));

    // Assigning through the reference updates the value without re-stamping.
    clock.set(5);
    *map.get_or_insert_default(7) = 99;
    assert_eq!(map.get(&7), Some(&99));
    assert_eq!(map.when_of(id), Some(1));
    map.debug_validate_invariants();
}

// ==============================================
// Rehashing under growth
// ==============================================

#[test]
fn unordered_rehash_preserves_temporal_order() {
    let clock = ManualClock::new();
    let mut set = AgedUnorderedSet::new(clock.clone());
    assert_eq!(set.max_load_factor(), 1.0);

    let initial_buckets = set.bucket_count();
    for key in 1..=100u32 {
        clock.advance(1);
        set.insert(key);
    }
    assert!(set.bucket_count() > initial_buckets, "growth never rehashed");
    assert!(set.load_factor() <= set.max_load_factor());

    let temporal: Vec<_> = set.chronological().iter().map(|e| *e.key).collect();
    assert_eq!(temporal, (1..=100).collect::<Vec<_>>());
    set.debug_validate_invariants();
}

// ==============================================
// Erase by key on a multiset
// ==============================================

#[test]
fn multiset_erase_by_key_spares_other_runs() {
    let clock = ManualClock::new();
    let mut bag = AgedOrderedMultiset::new(clock.clone());

    clock.set(1);
    bag.insert('A');
    clock.set(2);
    bag.insert('B');
    clock.set(3);
    bag.insert('A');
    clock.set(4);
    bag.insert('B');
    clock.set(5);
    bag.insert('A');

    assert_eq!(bag.remove_all(&'A'), 3);
    assert_eq!(bag.len(), 2);

    let temporal: Vec<_> = bag.chronological().iter().map(|e| (*e.key, e.when)).collect();
    assert_eq!(temporal, vec![('B', 2), ('B', 4)]);
    bag.debug_validate_invariants();
}

// ==============================================
// `at` on a missing key
// ==============================================

#[test]
fn failed_at_leaves_container_untouched() {
    let clock = ManualClock::new();
    let mut map = AgedOrderedMap::new(clock.clone());
    clock.set(1);
    map.insert(1, "one");
    clock.set(2);
    map.insert(2, "two");

    let snapshot: Vec<_> = map
        .chronological()
        .iter()
        .map(|e| (*e.key, *e.value, e.when))
        .collect();

    assert!(map.at(&3).is_err());
    assert!(map.at_mut(&3).is_err());

    let after: Vec<_> = map
        .chronological()
        .iter()
        .map(|e| (*e.key, *e.value, e.when))
        .collect();
    assert_eq!(snapshot, after);
    assert_eq!(map.len(), 2);
    map.debug_validate_invariants();
}
