use agekit::clock::ManualClock;
use agekit::unordered::AgedUnorderedMap;

const QUOTA: usize = 3;

fn main() {
    let clock = ManualClock::new();
    let mut cache = AgedUnorderedMap::new(clock.clone());

    for (key, value) in [("a", 1), ("b", 2), ("c", 3)] {
        clock.advance(1);
        cache.insert(key, value);
    }

    // Access "a": touch promotes it to the newest end.
    clock.advance(1);
    if cache.touch(&"a") {
        println!("hit a: {}", cache.get(&"a").unwrap());
    }

    // Inserting past the quota evicts from the oldest end, LRU-style.
    clock.advance(1);
    cache.insert("d", 4);
    while cache.len() > QUOTA {
        if let Some((key, _)) = cache.pop_oldest() {
            println!("evicted: {key}");
        }
    }

    println!("contains a? {}", cache.contains_key(&"a"));
}

// Expected output:
// hit a: 1
// evicted: b
// contains a? true
//
// Explanation: after touching "a" the temporal order is b, c, a, d.
// Capping to 3 entries drops "b", the least recently used.
