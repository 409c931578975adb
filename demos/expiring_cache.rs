use agekit::clock::{Clock, ManualClock};
use agekit::ordered::AgedOrderedMap;

const TTL: u64 = 30;

fn sweep(cache: &mut AgedOrderedMap<&'static str, u32, ManualClock>, now: u64) {
    loop {
        let expired = match cache.chronological().oldest() {
            Some(oldest) if now - oldest.when >= TTL => oldest.id,
            _ => break,
        };
        if let Some((key, _)) = cache.remove_entry(expired) {
            println!("expired: {key}");
        }
    }
}

fn main() {
    let clock = ManualClock::new();
    let mut cache = AgedOrderedMap::new(clock.clone());

    cache.insert("alpha", 1);
    clock.advance(10);
    cache.insert("beta", 2);
    clock.advance(10);
    cache.insert("gamma", 3);

    // A hit on "alpha" refreshes its timestamp.
    clock.advance(5);
    cache.touch(&"alpha");

    clock.advance(20);
    let now = clock.now();
    sweep(&mut cache, now);
    println!("left: {}", cache.len());
}

// Expected output:
// expired: beta
// left: 2
//
// Explanation: at sweep time the clock reads 45. "beta" was stamped at 10
// (35 ticks ago, past the 30-tick TTL). "alpha" was touched at 25 and
// "gamma" stamped at 20, both within the TTL.
