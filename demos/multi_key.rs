use agekit::clock::ManualClock;
use agekit::ordered::AgedOrderedMultimap;

fn main() {
    let clock = ManualClock::new();
    let mut routes: AgedOrderedMultimap<&str, &str, ManualClock> =
        AgedOrderedMultimap::new(clock.clone());

    clock.advance(1);
    routes.insert("eu", "fra-1");
    clock.advance(1);
    routes.insert("us", "iad-1");
    clock.advance(1);
    routes.insert("eu", "ams-2");

    for (region, host) in routes.iter() {
        println!("{region} -> {host}");
    }

    let eu_hosts: Vec<_> = routes.equal_range(&"eu").map(|(_, host)| *host).collect();
    println!("eu run: {eu_hosts:?}");

    println!("dropped: {}", routes.remove_all(&"eu"));
    println!("left: {}", routes.len());
}

// Expected output:
// eu -> fra-1
// eu -> ams-2
// us -> iad-1
// eu run: ["fra-1", "ams-2"]
// dropped: 2
// left: 1
//
// Explanation: duplicate keys keep their insertion order within the "eu"
// run, and erase-by-key removes the whole run at once.
