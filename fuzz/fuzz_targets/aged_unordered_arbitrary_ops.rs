#![no_main]

use agekit::clock::ManualClock;
use agekit::unordered::AgedUnorderedMap;
use libfuzzer_sys::fuzz_target;

// Fuzz arbitrary operation sequences on AgedUnorderedMap
//
// Tests random sequences of insert, remove, touch, pop_oldest, rehash,
// reserve, and clear, validating the bucket-array and dual-index
// invariants (including the load-factor bound) after every step.
fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let clock = ManualClock::new();
    let mut map: AgedUnorderedMap<u16, u8, ManualClock> = AgedUnorderedMap::new(clock.clone());

    let mut idx = 0;
    while idx + 1 < data.len() {
        let op = data[idx] % 8;
        let key = u16::from(data[idx + 1]);

        match op {
            0 | 1 => {
                // insert
                if op == 1 {
                    clock.advance(1);
                }
                let existed = map.contains_key(&key);
                let before = map.len();
                let (_, fresh) = map.insert(key, data[idx + 1]);
                assert_eq!(fresh, !existed);
                assert_eq!(map.len(), if fresh { before + 1 } else { before });
            }
            2 => {
                // remove
                let existed = map.contains_key(&key);
                assert_eq!(map.remove(&key).is_some(), existed);
                assert!(!map.contains_key(&key));
            }
            3 => {
                // touch
                clock.advance(1);
                let existed = map.contains_key(&key);
                assert_eq!(map.touch(&key), existed);
            }
            4 => {
                // pop_oldest
                let before = map.len();
                if map.pop_oldest().is_some() {
                    assert_eq!(map.len(), before - 1);
                } else {
                    assert_eq!(before, 0);
                }
            }
            5 => {
                // explicit rehash; clamped so the load factor stays bounded
                map.rehash(usize::from(data[idx + 1]));
            }
            6 => {
                // reserve
                map.reserve(usize::from(data[idx + 1]) % 64);
            }
            _ => {
                if data[idx + 1] == 0 {
                    map.clear();
                    assert!(map.is_empty());
                }
            }
        }

        assert!(map.load_factor() <= map.max_load_factor() + f32::EPSILON);
        assert_eq!(map.iter().count(), map.len());
        assert_eq!(map.chronological().iter().count(), map.len());
        map.debug_validate_invariants();

        idx += 2;
    }
});
