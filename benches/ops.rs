use std::hint::black_box;

use agekit::clock::ManualClock;
use agekit::ordered::AgedOrderedMap;
use agekit::unordered::AgedUnorderedMap;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};

const N: u64 = 10_000;

fn filled_ordered(clock: &ManualClock) -> AgedOrderedMap<u64, u64, ManualClock> {
    let mut map = AgedOrderedMap::with_capacity(clock.clone(), N as usize);
    for key in 0..N {
        clock.advance(1);
        map.insert(key, key);
    }
    map
}

fn filled_unordered(clock: &ManualClock) -> AgedUnorderedMap<u64, u64, ManualClock> {
    let mut map = AgedUnorderedMap::with_capacity(clock.clone(), N as usize);
    for key in 0..N {
        clock.advance(1);
        map.insert(key, key);
    }
    map
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    group.throughput(Throughput::Elements(N));

    group.bench_function("ordered", |b| {
        b.iter_batched(
            || ManualClock::new(),
            |clock| black_box(filled_ordered(&clock)),
            BatchSize::SmallInput,
        )
    });

    group.bench_function("unordered", |b| {
        b.iter_batched(
            || ManualClock::new(),
            |clock| black_box(filled_unordered(&clock)),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(N));

    let clock = ManualClock::new();
    let ordered = filled_ordered(&clock);
    group.bench_function("ordered", |b| {
        b.iter(|| {
            for key in 0..N {
                black_box(ordered.get(&key));
            }
        })
    });

    let unordered = filled_unordered(&clock);
    group.bench_function("unordered", |b| {
        b.iter(|| {
            for key in 0..N {
                black_box(unordered.get(&key));
            }
        })
    });

    group.finish();
}

fn bench_touch(c: &mut Criterion) {
    let mut group = c.benchmark_group("touch");
    group.throughput(Throughput::Elements(N));

    let clock = ManualClock::new();
    let mut ordered = filled_ordered(&clock);
    group.bench_function("ordered_by_key", |b| {
        b.iter(|| {
            clock.advance(1);
            for key in 0..N {
                black_box(ordered.touch(&key));
            }
        })
    });

    let ids: Vec<_> = (0..N).map(|k| ordered.find(&k).unwrap()).collect();
    group.bench_function("ordered_by_id", |b| {
        b.iter(|| {
            clock.advance(1);
            for &id in &ids {
                black_box(ordered.touch_entry(id));
            }
        })
    });

    let mut unordered = filled_unordered(&clock);
    group.bench_function("unordered_by_key", |b| {
        b.iter(|| {
            clock.advance(1);
            for key in 0..N {
                black_box(unordered.touch(&key));
            }
        })
    });

    group.finish();
}

fn bench_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("pop_oldest");
    group.throughput(Throughput::Elements(N));

    group.bench_function("ordered", |b| {
        b.iter_batched(
            || filled_ordered(&ManualClock::new()),
            |mut map| {
                while let Some(entry) = map.pop_oldest() {
                    black_box(entry);
                }
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("unordered", |b| {
        b.iter_batched(
            || filled_unordered(&ManualClock::new()),
            |mut map| {
                while let Some(entry) = map.pop_oldest() {
                    black_box(entry);
                }
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_insert, bench_get, bench_touch, bench_eviction);
criterion_main!(benches);
