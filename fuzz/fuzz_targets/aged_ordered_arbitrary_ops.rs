#![no_main]

use agekit::clock::ManualClock;
use agekit::ordered::AgedOrderedMultimap;
use libfuzzer_sys::fuzz_target;

// Fuzz arbitrary operation sequences on AgedOrderedMultimap
//
// Tests random sequences of insert, remove_all, remove_entry, touch_all,
// touch_entry, pop_oldest, equal_range, and clear against a small key
// space, validating the dual-index invariants after every step.
fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let clock = ManualClock::new();
    let mut map: AgedOrderedMultimap<u8, u8, ManualClock> =
        AgedOrderedMultimap::new(clock.clone());
    let mut all_ids = Vec::new();

    let mut idx = 0;
    while idx + 1 < data.len() {
        let op = data[idx] % 9;
        let key = data[idx + 1] % 16;

        match op {
            0 | 1 => {
                // insert; odd ops advance the clock so ties also occur
                if op == 1 {
                    clock.advance(1);
                }
                let before = map.len();
                let id = map.insert(key, data[idx + 1]);
                all_ids.push(id);

                assert_eq!(map.len(), before + 1);
                assert!(map.contains_key(&key));
                assert!(map.count(&key) >= 1);
            }
            2 => {
                // remove_all
                let expected = map.count(&key);
                let before = map.len();
                assert_eq!(map.remove_all(&key), expected);
                assert_eq!(map.len(), before - expected);
                assert!(!map.contains_key(&key));
            }
            3 => {
                // remove_entry by a previously seen id (possibly stale)
                if !all_ids.is_empty() {
                    let id = all_ids[data[idx + 1] as usize % all_ids.len()];
                    let before = map.len();
                    if map.remove_entry(id).is_some() {
                        assert_eq!(map.len(), before - 1);
                    } else {
                        assert_eq!(map.len(), before);
                    }
                }
            }
            4 => {
                // touch_all
                clock.advance(1);
                let expected = map.count(&key);
                assert_eq!(map.touch_all(&key), expected);
            }
            5 => {
                // touch_entry
                if !all_ids.is_empty() {
                    let id = all_ids[data[idx + 1] as usize % all_ids.len()];
                    clock.advance(1);
                    map.touch_entry(id);
                }
            }
            6 => {
                // pop_oldest
                let before = map.len();
                if map.pop_oldest().is_some() {
                    assert_eq!(map.len(), before - 1);
                } else {
                    assert_eq!(before, 0);
                }
            }
            7 => {
                // equal_range agrees with count
                assert_eq!(map.equal_range(&key).count(), map.count(&key));
            }
            _ => {
                // occasional full reset
                if data[idx + 1] == 0 {
                    map.clear();
                    assert!(map.is_empty());
                }
            }
        }

        assert_eq!(map.iter().count(), map.len());
        assert_eq!(map.chronological().iter().count(), map.len());
        map.debug_validate_invariants();

        idx += 2;
    }
});
