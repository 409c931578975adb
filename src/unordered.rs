//! Unordered (hashed) aged containers.
//!
//! Same dual-index model as [`crate::ordered`], with the associative side
//! replaced by a hash table whose bucket array the container maintains
//! itself: the load-factor discipline (`load_factor`, `max_load_factor`,
//! `rehash`, `reserve`) and per-bucket iteration are public surface, so the
//! table cannot hide behind a library map.
//!
//! ```text
//!   buckets: Vec<Vec<EntryId>>          NodeArena + TimeList
//!   ┌───┬──────────────────┐
//!   │ 0 │ [id_4]           │            oldest ─► ... ◄─ newest
//!   │ 1 │ [id_1, id_7]     │  ◄── equal keys stay contiguous and in
//!   │ 2 │ []               │      insertion order within their bucket
//!   │ 3 │ [id_0]           │
//!   └───┴──────────────────┘
//! ```
//!
//! Before any insertion that grows the container, `maybe_rehash` checks
//! `len + additional` against `bucket_count * max_load_factor` and, when
//! exceeded, grows the bucket array to a prime-like suggested count and
//! relinks every entry. Rehashing touches only the bucket array: nodes stay
//! put in the arena and the temporal list is byte-for-byte unaffected.
//!
//! Keys hash through the configured [`BuildHasher`]
//! (default [`FxBuildHasher`]); `hash` consistency with `Eq` is the user's
//! responsibility, as for any hashed collection. Iteration order is bucket
//! order and means nothing; unlike the ordered variants, these containers
//! implement no cross-container comparison.

use std::fmt;
use std::hash::{BuildHasher, Hash};

use rustc_hash::FxBuildHasher;

use crate::chronological::{AgedEntry, AgedKey, Chronological, KeyChronological};
use crate::clock::Clock;
use crate::ds::node_arena::{EntryId, NodeArena};
use crate::ds::time_list::TimeList;
use crate::error::KeyNotFoundError;
use crate::traits::{AgedContainer, ChronologicalAccess};

const MIN_BUCKETS: usize = 13;
const DEFAULT_MAX_LOAD_FACTOR: f32 = 1.0;

/// Prime growth schedule for the bucket array.
const BUCKET_PRIMES: &[usize] = &[
    13, 29, 59, 127, 257, 541, 1109, 2357, 5087, 10_273, 20_753, 42_043,
    85_229, 172_933, 351_061, 712_697, 1_447_153, 2_938_679, 5_967_347,
    12_117_689, 24_607_243, 49_969_847, 101_473_717,
];

/// Smallest entry of the growth schedule holding at least `n` buckets.
fn suggested_upper_bucket_count(n: usize) -> usize {
    for &prime in BUCKET_PRIMES {
        if prime >= n {
            return prime;
        }
    }
    // Past the table: settle for odd.
    n | 1
}

// ---------------------------------------------------------------------------
// UnorderedCore
// ---------------------------------------------------------------------------

/// Shared machinery of the four unordered containers.
#[derive(Clone)]
struct UnorderedCore<K, V, C: Clock, S> {
    arena: NodeArena<K, V, C::Time>,
    list: TimeList,
    buckets: Vec<Vec<EntryId>>,
    hasher: S,
    max_load_factor: f32,
    clock: C,
}

impl<K: Eq + Hash, V, C: Clock, S: BuildHasher> UnorderedCore<K, V, C, S> {
    fn with_hasher(clock: C, hasher: S) -> Self {
        Self {
            arena: NodeArena::new(),
            list: TimeList::new(),
            buckets: vec![Vec::new(); MIN_BUCKETS],
            hasher,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
            clock,
        }
    }

    fn with_capacity_and_hasher(clock: C, capacity: usize, hasher: S) -> Self {
        let buckets = suggested_upper_bucket_count(
            (capacity as f32 / DEFAULT_MAX_LOAD_FACTOR).ceil() as usize,
        );
        Self {
            arena: NodeArena::with_capacity(capacity),
            list: TimeList::new(),
            buckets: vec![Vec::new(); buckets.max(MIN_BUCKETS)],
            hasher,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
            clock,
        }
    }

    fn len(&self) -> usize {
        self.arena.len()
    }

    fn clear(&mut self) {
        self.arena.clear();
        self.list.clear();
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    fn bucket_index(&self, key: &K) -> usize {
        (self.hasher.hash_one(key) % self.buckets.len() as u64) as usize
    }

    /// First entry equal to `key`, if any.
    fn probe(&self, key: &K) -> Option<EntryId> {
        let bucket = &self.buckets[self.bucket_index(key)];
        bucket
            .iter()
            .copied()
            .find(|&id| self.arena.node(id).map(|n| &n.key == key).unwrap_or(false))
    }

    /// Start and end (exclusive) of `key`'s contiguous run in bucket `b`.
    fn run_bounds(&self, b: usize, key: &K) -> Option<(usize, usize)> {
        let bucket = &self.buckets[b];
        let start = bucket
            .iter()
            .position(|&id| self.arena.node(id).map(|n| &n.key == key).unwrap_or(false))?;
        let mut end = start + 1;
        while end < bucket.len() {
            let same = self.arena.node(bucket[end]).map(|n| &n.key == key);
            if same != Some(true) {
                break;
            }
            end += 1;
        }
        Some((start, end))
    }

    /// Grows the bucket array if `additional` more entries would push the
    /// load factor over the limit. Nodes and the temporal list are untouched.
    fn maybe_rehash(&mut self, additional: usize) {
        let needed = self.arena.len() + additional;
        if needed as f32 > self.buckets.len() as f32 * self.max_load_factor {
            let target = (needed as f32 / self.max_load_factor).ceil() as usize;
            self.rebucket(suggested_upper_bucket_count(target));
        }
        debug_assert!(self.arena.len() as f32 <= self.buckets.len() as f32 * self.max_load_factor);
    }

    /// Rebuilds the bucket array at `count` buckets, relinking every entry.
    ///
    /// Entries are drained bucket by bucket, so equal keys (contiguous in
    /// their old bucket) arrive at the new bucket consecutively and the
    /// grouped insert keeps each run contiguous and in insertion order.
    fn rebucket(&mut self, count: usize) {
        let count = count.max(MIN_BUCKETS);
        if count == self.buckets.len() {
            return;
        }
        let old = std::mem::replace(&mut self.buckets, vec![Vec::new(); count]);
        for bucket in old {
            for id in bucket {
                let (b, pos) = {
                    let node = match self.arena.node(id) {
                        Some(node) => node,
                        None => continue,
                    };
                    let b = self.bucket_index(&node.key);
                    (b, self.run_end(b, &node.key))
                };
                match pos {
                    Some(pos) => self.buckets[b].insert(pos, id),
                    None => self.buckets[b].push(id),
                }
            }
        }
    }

    /// Index just past the last entry equal to `key` in bucket `b`.
    fn run_end(&self, b: usize, key: &K) -> Option<usize> {
        self.buckets[b]
            .iter()
            .rposition(|&id| self.arena.node(id).map(|n| &n.key == key).unwrap_or(false))
            .map(|pos| pos + 1)
    }

    /// Allocates a node stamped `now()` and links it at the temporal tail.
    fn stamp(&mut self, key: K, value: V) -> EntryId {
        let when = self.clock.now();
        let id = self.arena.alloc(key, value, when);
        self.list.push_newest(&mut self.arena, id);
        id
    }

    fn insert_unique(&mut self, key: K, value: V) -> (EntryId, bool) {
        if let Some(id) = self.probe(&key) {
            return (id, false);
        }
        self.maybe_rehash(1);
        let b = self.bucket_index(&key);
        let id = self.stamp(key, value);
        self.buckets[b].push(id);
        (id, true)
    }

    fn insert_multi(&mut self, key: K, value: V) -> EntryId {
        self.maybe_rehash(1);
        let b = self.bucket_index(&key);
        let pos = self.run_end(b, &key);
        let id = self.stamp(key, value);
        match pos {
            Some(pos) => self.buckets[b].insert(pos, id),
            None => self.buckets[b].push(id),
        }
        id
    }

    fn remove_entry(&mut self, id: EntryId) -> Option<(K, V)> {
        let b = {
            let node = self.arena.node(id)?;
            self.bucket_index(&node.key)
        };
        let pos = self.buckets[b].iter().position(|&e| e == id)?;
        self.buckets[b].remove(pos);
        self.list.unlink(&mut self.arena, id);
        let node = self.arena.release(id)?;
        Some((node.key, node.value))
    }

    fn remove_key(&mut self, key: &K) -> usize {
        let b = self.bucket_index(key);
        let (start, end) = match self.run_bounds(b, key) {
            Some(bounds) => bounds,
            None => return 0,
        };
        let ids: Vec<EntryId> = self.buckets[b].drain(start..end).collect();
        for &id in &ids {
            self.list.unlink(&mut self.arena, id);
            self.arena.release(id);
        }
        ids.len()
    }

    fn touch_entry(&mut self, id: EntryId) -> bool {
        if !self.arena.contains(id) {
            return false;
        }
        let now = self.clock.now();
        self.list.move_to_newest(&mut self.arena, id);
        if let Some(node) = self.arena.node_mut(id) {
            node.when = now;
        }
        true
    }

    fn touch_key(&mut self, key: &K) -> usize {
        let b = self.bucket_index(key);
        let ids: Vec<EntryId> = match self.run_bounds(b, key) {
            Some((start, end)) => self.buckets[b][start..end].to_vec(),
            None => return 0,
        };
        let now = self.clock.now();
        for &id in &ids {
            self.list.move_to_newest(&mut self.arena, id);
            if let Some(node) = self.arena.node_mut(id) {
                node.when = now;
            }
        }
        ids.len()
    }

    fn pop_oldest(&mut self) -> Option<(K, V)> {
        let id = self.list.oldest()?;
        self.remove_entry(id)
    }

    fn retain<F: FnMut(&K, &mut V) -> bool>(&mut self, mut keep: F) {
        let ids: Vec<EntryId> = self.arena.iter().map(|(id, _)| id).collect();
        for id in ids {
            let keep_it = match self.arena.node_mut(id) {
                Some(node) => keep(&node.key, &mut node.value),
                None => continue,
            };
            if !keep_it {
                self.remove_entry(id);
            }
        }
    }

    fn get_entry(&self, id: EntryId) -> Option<AgedEntry<'_, K, V, C::Time>> {
        let node = self.arena.node(id)?;
        Some(AgedEntry {
            id,
            when: node.when,
            key: &node.key,
            value: &node.value,
        })
    }

    fn when_of(&self, id: EntryId) -> Option<C::Time> {
        self.arena.node(id).map(|node| node.when)
    }

    fn oldest_when(&self) -> Option<C::Time> {
        let id = self.list.oldest()?;
        self.when_of(id)
    }

    fn newest_when(&self) -> Option<C::Time> {
        let id = self.list.newest()?;
        self.when_of(id)
    }

    fn chronological(&self) -> Chronological<'_, K, V, C::Time> {
        Chronological::new(&self.arena, &self.list)
    }

    fn iter(&self) -> Iter<'_, K, V, C::Time> {
        Iter {
            buckets: self.buckets.iter(),
            current: [].iter(),
            arena: &self.arena,
        }
    }

    fn equal_range(&self, key: &K) -> RunIter<'_, K, V, C::Time> {
        let b = self.bucket_index(key);
        let ids = match self.run_bounds(b, key) {
            Some((start, end)) => &self.buckets[b][start..end],
            None => &[],
        };
        RunIter {
            ids: ids.iter(),
            arena: &self.arena,
        }
    }

    fn bucket_iter(&self, n: usize) -> RunIter<'_, K, V, C::Time> {
        let ids = self.buckets.get(n).map(|b| b.as_slice()).unwrap_or(&[]);
        RunIter {
            ids: ids.iter(),
            arena: &self.arena,
        }
    }

    fn load_factor(&self) -> f32 {
        self.arena.len() as f32 / self.buckets.len() as f32
    }

    /// Raise-only: the limit never drops below its current value.
    fn set_max_load_factor(&mut self, factor: f32) {
        self.max_load_factor = factor.max(self.max_load_factor);
    }

    fn rehash(&mut self, count: usize) {
        let floor = (self.arena.len() as f32 / self.max_load_factor).ceil() as usize;
        self.rebucket(count.max(floor));
    }

    fn reserve(&mut self, additional: usize) {
        self.arena.reserve(additional);
        let count = (additional as f32 / self.max_load_factor).ceil() as usize;
        self.rehash(count);
    }

    #[cfg(any(test, debug_assertions))]
    fn debug_validate_invariants(&self) {
        self.arena.debug_validate_invariants();
        self.list.debug_validate_invariants(&self.arena);

        let mut total = 0usize;
        for (b, bucket) in self.buckets.iter().enumerate() {
            for &id in bucket {
                let node = self.arena.node(id).expect("bucketed node missing");
                assert_eq!(self.bucket_index(&node.key), b, "node in wrong bucket");
            }
            // Equal keys must form one contiguous run per bucket.
            for i in 0..bucket.len() {
                for j in (i + 2)..bucket.len() {
                    let ki = &self.arena.node(bucket[i]).expect("live").key;
                    let kj = &self.arena.node(bucket[j]).expect("live").key;
                    if ki == kj {
                        for mid in (i + 1)..j {
                            let km = &self.arena.node(bucket[mid]).expect("live").key;
                            assert!(km == ki, "split run in bucket");
                        }
                    }
                }
            }
            total += bucket.len();
        }
        assert_eq!(total, self.arena.len());
        for (id, node) in self.arena.iter() {
            let b = self.bucket_index(&node.key);
            assert!(self.buckets[b].contains(&id), "arena node missing from its bucket");
        }
        assert!(self.load_factor() <= self.max_load_factor + f32::EPSILON);
    }
}

// ---------------------------------------------------------------------------
// Associative iterators
// ---------------------------------------------------------------------------

/// Iterator over a hashed container in bucket order.
pub struct Iter<'a, K, V, W> {
    buckets: std::slice::Iter<'a, Vec<EntryId>>,
    current: std::slice::Iter<'a, EntryId>,
    arena: &'a NodeArena<K, V, W>,
}

impl<'a, K, V, W> Iterator for Iter<'a, K, V, W> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(&id) = self.current.next() {
                return self.arena.node(id).map(|node| (&node.key, &node.value));
            }
            self.current = self.buckets.next()?.iter();
        }
    }
}

/// Iterator over one bucket, or one key's run, in stored order.
pub struct RunIter<'a, K, V, W> {
    ids: std::slice::Iter<'a, EntryId>,
    arena: &'a NodeArena<K, V, W>,
}

impl<'a, K, V, W> Iterator for RunIter<'a, K, V, W> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let id = *self.ids.next()?;
        self.arena.node(id).map(|node| (&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

impl<K, V, W> DoubleEndedIterator for RunIter<'_, K, V, W> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let id = *self.ids.next_back()?;
        self.arena.node(id).map(|node| (&node.key, &node.value))
    }
}

impl<K, V, W> ExactSizeIterator for RunIter<'_, K, V, W> {}

/// Key-only iterator for the set-shaped containers.
pub struct Keys<'a, K, W> {
    inner: Iter<'a, K, (), W>,
}

impl<'a, K, W> Iterator for Keys<'a, K, W> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }
}

/// Key-only iterator over one bucket, or one key's run, of a set shape.
pub struct BucketKeys<'a, K, W> {
    inner: RunIter<'a, K, (), W>,
}

impl<'a, K, W> Iterator for BucketKeys<'a, K, W> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, W> DoubleEndedIterator for BucketKeys<'_, K, W> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(key, _)| key)
    }
}

impl<K, W> ExactSizeIterator for BucketKeys<'_, K, W> {}

// ---------------------------------------------------------------------------
// AgedUnorderedMap (unique keys)
// ---------------------------------------------------------------------------

/// Hashed map in which every entry carries an insertion/touch timestamp.
///
/// Keys are unique under `Eq`. Inserting an occupied key changes nothing and
/// reports the existing entry, exactly as in the ordered variant.
///
/// # Example
///
/// ```
/// use agekit::clock::ManualClock;
/// use agekit::unordered::AgedUnorderedMap;
///
/// let clock = ManualClock::new();
/// let mut map = AgedUnorderedMap::new(clock.clone());
///
/// clock.advance(1);
/// map.insert("session-a", 1);
/// clock.advance(1);
/// map.insert("session-b", 2);
///
/// assert_eq!(map.chronological().oldest().map(|e| *e.key), Some("session-a"));
/// map.touch(&"session-a");
/// assert_eq!(map.chronological().oldest().map(|e| *e.key), Some("session-b"));
/// ```
#[derive(Clone)]
pub struct AgedUnorderedMap<K, V, C: Clock, S = FxBuildHasher> {
    core: UnorderedCore<K, V, C, S>,
}

impl<K: Eq + Hash, V, C: Clock> AgedUnorderedMap<K, V, C, FxBuildHasher> {
    /// Creates an empty map observing `clock`, hashing with [`FxBuildHasher`].
    pub fn new(clock: C) -> Self {
        Self::with_hasher(clock, FxBuildHasher)
    }

    /// Creates an empty map sized for `capacity` entries.
    pub fn with_capacity(clock: C, capacity: usize) -> Self {
        Self::with_capacity_and_hasher(clock, capacity, FxBuildHasher)
    }

    /// Builds a map by inserting `entries` in order; on duplicate keys the
    /// first entry wins.
    pub fn from_entries<I: IntoIterator<Item = (K, V)>>(clock: C, entries: I) -> Self {
        let iter = entries.into_iter();
        let mut map = Self::with_capacity(clock, iter.size_hint().0);
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<K: Eq + Hash, V, C: Clock, S: BuildHasher> AgedUnorderedMap<K, V, C, S> {
    /// Creates an empty map with a caller-supplied hasher.
    pub fn with_hasher(clock: C, hasher: S) -> Self {
        Self {
            core: UnorderedCore::with_hasher(clock, hasher),
        }
    }

    /// Creates an empty map sized for `capacity` entries, with a hasher.
    pub fn with_capacity_and_hasher(clock: C, capacity: usize, hasher: S) -> Self {
        Self {
            core: UnorderedCore::with_capacity_and_hasher(clock, capacity, hasher),
        }
    }

    pub fn clock(&self) -> &C {
        &self.core.clock
    }

    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.len() == 0
    }

    /// Removes every entry; the bucket array keeps its size.
    pub fn clear(&mut self) {
        self.core.clear();
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.core.probe(key).is_some()
    }

    /// Returns the stable id of the entry for `key`, if present.
    pub fn find(&self, key: &K) -> Option<EntryId> {
        self.core.probe(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let id = self.core.probe(key)?;
        self.core.arena.node(id).map(|node| &node.value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let id = self.core.probe(key)?;
        self.core.arena.node_mut(id).map(|node| &mut node.value)
    }

    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        let id = self.core.probe(key)?;
        self.core.arena.node(id).map(|node| (&node.key, &node.value))
    }

    /// Keyed access with a hard contract: fails if `key` has no entry.
    pub fn at(&self, key: &K) -> Result<&V, KeyNotFoundError> {
        self.get(key).ok_or(KeyNotFoundError)
    }

    /// Mutable counterpart of [`at`](AgedUnorderedMap::at).
    pub fn at_mut(&mut self, key: &K) -> Result<&mut V, KeyNotFoundError> {
        self.get_mut(key).ok_or(KeyNotFoundError)
    }

    /// Inserts `value` under `key`, stamped with the clock's current time.
    ///
    /// An occupied key allocates nothing and changes nothing: the existing
    /// entry's id comes back with `false`. A fresh key may first grow the
    /// bucket array to keep the load factor within bounds.
    pub fn insert(&mut self, key: K, value: V) -> (EntryId, bool) {
        self.core.insert_unique(key, value)
    }

    /// Returns the value for `key`, inserting `make()` stamped `now()` first
    /// if the key is vacant. `make` runs only on vacancy.
    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: K, make: F) -> &mut V {
        let id = match self.core.probe(&key) {
            Some(id) => id,
            None => {
                self.core.maybe_rehash(1);
                let b = self.core.bucket_index(&key);
                let id = self.core.stamp(key, make());
                self.core.buckets[b].push(id);
                id
            }
        };
        &mut self
            .core
            .arena
            .node_mut(id)
            .expect("entry resolved above")
            .value
    }

    /// Index-style access: inserts `V::default()` stamped `now()` on a miss.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }

    /// Removes the entry for `key` and returns its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let id = self.core.probe(key)?;
        self.core.remove_entry(id).map(|(_, value)| value)
    }

    /// Removes the entry with the given id, returning its key and value.
    pub fn remove_entry(&mut self, id: EntryId) -> Option<(K, V)> {
        self.core.remove_entry(id)
    }

    /// Re-stamps the entry for `key` to `now()` and moves it to the newest
    /// end. The bucket array is untouched.
    pub fn touch(&mut self, key: &K) -> bool {
        self.core.touch_key(key) != 0
    }

    /// [`touch`](AgedUnorderedMap::touch) by stable id; O(1).
    pub fn touch_entry(&mut self, id: EntryId) -> bool {
        self.core.touch_entry(id)
    }

    pub fn when_of(&self, id: EntryId) -> Option<C::Time> {
        self.core.when_of(id)
    }

    pub fn get_entry(&self, id: EntryId) -> Option<AgedEntry<'_, K, V, C::Time>> {
        self.core.get_entry(id)
    }

    /// Removes and returns the entry that has gone longest without touch.
    pub fn pop_oldest(&mut self) -> Option<(K, V)> {
        self.core.pop_oldest()
    }

    /// Keeps only the entries for which `keep` returns `true`. Surviving
    /// entries keep their timestamps and temporal order.
    pub fn retain<F: FnMut(&K, &mut V) -> bool>(&mut self, keep: F) {
        self.core.retain(keep);
    }

    /// Iterates in bucket order (no meaningful order).
    pub fn iter(&self) -> Iter<'_, K, V, C::Time> {
        self.core.iter()
    }

    /// Temporal view, oldest to newest.
    pub fn chronological(&self) -> Chronological<'_, K, V, C::Time> {
        self.core.chronological()
    }

    // -- bucket interface --------------------------------------------------

    /// Current entries-per-bucket ratio.
    pub fn load_factor(&self) -> f32 {
        self.core.load_factor()
    }

    pub fn max_load_factor(&self) -> f32 {
        self.core.max_load_factor
    }

    /// Raises the load-factor limit. Values below the current limit are
    /// clamped to it, so the limit never decreases.
    pub fn set_max_load_factor(&mut self, factor: f32) {
        self.core.set_max_load_factor(factor);
    }

    /// Resizes the bucket array to at least
    /// `max(count, len / max_load_factor)` buckets and relinks every entry.
    pub fn rehash(&mut self, count: usize) {
        self.core.rehash(count);
    }

    /// Prepares for `additional` more entries without intermediate rehashes.
    pub fn reserve(&mut self, additional: usize) {
        self.core.reserve(additional);
    }

    pub fn bucket_count(&self) -> usize {
        self.core.buckets.len()
    }

    /// Bucket that `key` hashes into.
    pub fn bucket(&self, key: &K) -> usize {
        self.core.bucket_index(key)
    }

    /// Number of entries in bucket `n`.
    pub fn bucket_size(&self, n: usize) -> usize {
        self.core.buckets.get(n).map(|b| b.len()).unwrap_or(0)
    }

    /// Iterates the entries of bucket `n`.
    pub fn bucket_iter(&self, n: usize) -> RunIter<'_, K, V, C::Time> {
        self.core.bucket_iter(n)
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.core.debug_validate_invariants();
        for bucket in &self.core.buckets {
            for (i, &a) in bucket.iter().enumerate() {
                for &b in &bucket[i + 1..] {
                    let ka = &self.core.arena.node(a).expect("live").key;
                    let kb = &self.core.arena.node(b).expect("live").key;
                    assert!(ka != kb, "duplicate key in unique container");
                }
            }
        }
    }
}

impl<K: Eq + Hash, V, C: Clock, S: BuildHasher> AgedContainer<K>
    for AgedUnorderedMap<K, V, C, S>
{
    fn len(&self) -> usize {
        self.core.len()
    }

    fn clear(&mut self) {
        self.core.clear();
    }

    fn contains_key(&self, key: &K) -> bool {
        self.core.probe(key).is_some()
    }

    fn erase_all(&mut self, key: &K) -> usize {
        self.core.remove_key(key)
    }
}

impl<K: Eq + Hash, V, C: Clock, S: BuildHasher> ChronologicalAccess<K>
    for AgedUnorderedMap<K, V, C, S>
{
    type Time = C::Time;

    fn touch_all(&mut self, key: &K) -> usize {
        self.core.touch_key(key)
    }

    fn oldest_when(&self) -> Option<C::Time> {
        self.core.oldest_when()
    }

    fn newest_when(&self) -> Option<C::Time> {
        self.core.newest_when()
    }

    fn erase_oldest(&mut self) -> bool {
        self.core.pop_oldest().is_some()
    }
}

impl<K: Eq + Hash, V, C: Clock, S: BuildHasher> Extend<(K, V)>
    for AgedUnorderedMap<K, V, C, S>
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, C: Clock, S> fmt::Debug for AgedUnorderedMap<K, V, C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgedUnorderedMap")
            .field("len", &self.core.arena.len())
            .field("buckets", &self.core.buckets.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// AgedUnorderedMultimap
// ---------------------------------------------------------------------------

/// Hashed multimap: duplicate keys allowed, insertion order kept per key.
///
/// Within a bucket, entries with equal keys stay contiguous and in insertion
/// order; rehashing preserves both properties.
#[derive(Clone)]
pub struct AgedUnorderedMultimap<K, V, C: Clock, S = FxBuildHasher> {
    core: UnorderedCore<K, V, C, S>,
}

impl<K: Eq + Hash, V, C: Clock> AgedUnorderedMultimap<K, V, C, FxBuildHasher> {
    /// Creates an empty multimap hashing with [`FxBuildHasher`].
    pub fn new(clock: C) -> Self {
        Self::with_hasher(clock, FxBuildHasher)
    }

    /// Creates an empty multimap sized for `capacity` entries.
    pub fn with_capacity(clock: C, capacity: usize) -> Self {
        Self::with_capacity_and_hasher(clock, capacity, FxBuildHasher)
    }

    /// Builds a multimap by inserting `entries` in order.
    pub fn from_entries<I: IntoIterator<Item = (K, V)>>(clock: C, entries: I) -> Self {
        let iter = entries.into_iter();
        let mut map = Self::with_capacity(clock, iter.size_hint().0);
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<K: Eq + Hash, V, C: Clock, S: BuildHasher> AgedUnorderedMultimap<K, V, C, S> {
    /// Creates an empty multimap with a caller-supplied hasher.
    pub fn with_hasher(clock: C, hasher: S) -> Self {
        Self {
            core: UnorderedCore::with_hasher(clock, hasher),
        }
    }

    /// Creates an empty multimap sized for `capacity` entries, with a hasher.
    pub fn with_capacity_and_hasher(clock: C, capacity: usize, hasher: S) -> Self {
        Self {
            core: UnorderedCore::with_capacity_and_hasher(clock, capacity, hasher),
        }
    }

    pub fn clock(&self) -> &C {
        &self.core.clock
    }

    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.len() == 0
    }

    pub fn clear(&mut self) {
        self.core.clear();
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.core.probe(key).is_some()
    }

    /// Number of entries whose key is equivalent to `key`.
    pub fn count(&self, key: &K) -> usize {
        let b = self.core.bucket_index(key);
        self.core
            .run_bounds(b, key)
            .map(|(start, end)| end - start)
            .unwrap_or(0)
    }

    /// Stable id of the first entry in `key`'s run.
    pub fn find(&self, key: &K) -> Option<EntryId> {
        self.core.probe(key)
    }

    /// Value of the first entry in `key`'s run.
    pub fn get(&self, key: &K) -> Option<&V> {
        let id = self.core.probe(key)?;
        self.core.arena.node(id).map(|node| &node.value)
    }

    /// Inserts unconditionally at the end of `key`'s run.
    pub fn insert(&mut self, key: K, value: V) -> EntryId {
        self.core.insert_multi(key, value)
    }

    /// Iterates `key`'s run in insertion order.
    pub fn equal_range(&self, key: &K) -> RunIter<'_, K, V, C::Time> {
        self.core.equal_range(key)
    }

    /// Removes every entry equivalent to `key`; returns the count removed.
    pub fn remove_all(&mut self, key: &K) -> usize {
        self.core.remove_key(key)
    }

    /// Removes the entry with the given id, returning its key and value.
    pub fn remove_entry(&mut self, id: EntryId) -> Option<(K, V)> {
        self.core.remove_entry(id)
    }

    /// Re-stamps every entry in `key`'s run to one `now()` reading and moves
    /// the run, in order, to the newest end. Returns the count touched.
    pub fn touch_all(&mut self, key: &K) -> usize {
        self.core.touch_key(key)
    }

    pub fn touch_entry(&mut self, id: EntryId) -> bool {
        self.core.touch_entry(id)
    }

    pub fn when_of(&self, id: EntryId) -> Option<C::Time> {
        self.core.when_of(id)
    }

    pub fn get_entry(&self, id: EntryId) -> Option<AgedEntry<'_, K, V, C::Time>> {
        self.core.get_entry(id)
    }

    /// Removes and returns the entry that has gone longest without touch.
    pub fn pop_oldest(&mut self) -> Option<(K, V)> {
        self.core.pop_oldest()
    }

    /// Keeps only the entries for which `keep` returns `true`. Surviving
    /// entries keep their timestamps and temporal order.
    pub fn retain<F: FnMut(&K, &mut V) -> bool>(&mut self, keep: F) {
        self.core.retain(keep);
    }

    /// Iterates in bucket order (no meaningful order between keys).
    pub fn iter(&self) -> Iter<'_, K, V, C::Time> {
        self.core.iter()
    }

    /// Temporal view, oldest to newest.
    pub fn chronological(&self) -> Chronological<'_, K, V, C::Time> {
        self.core.chronological()
    }

    // -- bucket interface --------------------------------------------------

    pub fn load_factor(&self) -> f32 {
        self.core.load_factor()
    }

    pub fn max_load_factor(&self) -> f32 {
        self.core.max_load_factor
    }

    /// Raises the load-factor limit; never decreases it.
    pub fn set_max_load_factor(&mut self, factor: f32) {
        self.core.set_max_load_factor(factor);
    }

    pub fn rehash(&mut self, count: usize) {
        self.core.rehash(count);
    }

    pub fn reserve(&mut self, additional: usize) {
        self.core.reserve(additional);
    }

    pub fn bucket_count(&self) -> usize {
        self.core.buckets.len()
    }

    pub fn bucket(&self, key: &K) -> usize {
        self.core.bucket_index(key)
    }

    pub fn bucket_size(&self, n: usize) -> usize {
        self.core.buckets.get(n).map(|b| b.len()).unwrap_or(0)
    }

    pub fn bucket_iter(&self, n: usize) -> RunIter<'_, K, V, C::Time> {
        self.core.bucket_iter(n)
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.core.debug_validate_invariants();
    }
}

impl<K: Eq + Hash, V, C: Clock, S: BuildHasher> AgedContainer<K>
    for AgedUnorderedMultimap<K, V, C, S>
{
    fn len(&self) -> usize {
        self.core.len()
    }

    fn clear(&mut self) {
        self.core.clear();
    }

    fn contains_key(&self, key: &K) -> bool {
        self.core.probe(key).is_some()
    }

    fn erase_all(&mut self, key: &K) -> usize {
        self.core.remove_key(key)
    }
}

impl<K: Eq + Hash, V, C: Clock, S: BuildHasher> ChronologicalAccess<K>
    for AgedUnorderedMultimap<K, V, C, S>
{
    type Time = C::Time;

    fn touch_all(&mut self, key: &K) -> usize {
        self.core.touch_key(key)
    }

    fn oldest_when(&self) -> Option<C::Time> {
        self.core.oldest_when()
    }

    fn newest_when(&self) -> Option<C::Time> {
        self.core.newest_when()
    }

    fn erase_oldest(&mut self) -> bool {
        self.core.pop_oldest().is_some()
    }
}

impl<K: Eq + Hash, V, C: Clock, S: BuildHasher> Extend<(K, V)>
    for AgedUnorderedMultimap<K, V, C, S>
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, C: Clock, S> fmt::Debug for AgedUnorderedMultimap<K, V, C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgedUnorderedMultimap")
            .field("len", &self.core.arena.len())
            .field("buckets", &self.core.buckets.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// AgedUnorderedSet / AgedUnorderedMultiset
// ---------------------------------------------------------------------------

/// Hashed set shape: the stored value is the key itself.
#[derive(Clone)]
pub struct AgedUnorderedSet<K, C: Clock, S = FxBuildHasher> {
    map: AgedUnorderedMap<K, (), C, S>,
}

impl<K: Eq + Hash, C: Clock> AgedUnorderedSet<K, C, FxBuildHasher> {
    pub fn new(clock: C) -> Self {
        Self {
            map: AgedUnorderedMap::new(clock),
        }
    }

    pub fn with_capacity(clock: C, capacity: usize) -> Self {
        Self {
            map: AgedUnorderedMap::with_capacity(clock, capacity),
        }
    }

    /// Builds a set by inserting `keys` in order; duplicates are dropped.
    pub fn from_keys<I: IntoIterator<Item = K>>(clock: C, keys: I) -> Self {
        let iter = keys.into_iter();
        let mut set = Self::with_capacity(clock, iter.size_hint().0);
        for key in iter {
            set.insert(key);
        }
        set
    }
}

impl<K: Eq + Hash, C: Clock, S: BuildHasher> AgedUnorderedSet<K, C, S> {
    pub fn with_hasher(clock: C, hasher: S) -> Self {
        Self {
            map: AgedUnorderedMap::with_hasher(clock, hasher),
        }
    }

    pub fn clock(&self) -> &C {
        self.map.clock()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    pub fn find(&self, key: &K) -> Option<EntryId> {
        self.map.find(key)
    }

    /// Inserts `key` stamped `now()`; an occupied key changes nothing and
    /// returns the existing entry's id with `false`.
    pub fn insert(&mut self, key: K) -> (EntryId, bool) {
        self.map.insert(key, ())
    }

    /// Removes `key`'s entry; returns whether one existed.
    pub fn remove(&mut self, key: &K) -> bool {
        self.map.remove(key).is_some()
    }

    /// Removes the element with the given id, returning its key.
    pub fn remove_entry(&mut self, id: EntryId) -> Option<K> {
        self.map.remove_entry(id).map(|(key, ())| key)
    }

    /// Re-stamps `key`'s entry to `now()` and moves it to the newest end.
    pub fn touch(&mut self, key: &K) -> bool {
        self.map.touch(key)
    }

    pub fn touch_entry(&mut self, id: EntryId) -> bool {
        self.map.touch_entry(id)
    }

    pub fn when_of(&self, id: EntryId) -> Option<C::Time> {
        self.map.when_of(id)
    }

    pub fn get_entry(&self, id: EntryId) -> Option<AgedKey<'_, K, C::Time>> {
        self.map.get_entry(id).map(|entry| AgedKey {
            id: entry.id,
            when: entry.when,
            key: entry.key,
        })
    }

    /// Removes and returns the element that has gone longest without touch.
    pub fn pop_oldest(&mut self) -> Option<K> {
        self.map.pop_oldest().map(|(key, ())| key)
    }

    /// Keeps only the elements for which `keep` returns `true`.
    pub fn retain<F: FnMut(&K) -> bool>(&mut self, mut keep: F) {
        self.map.retain(|key, _| keep(key));
    }

    /// Iterates in bucket order.
    pub fn iter(&self) -> Keys<'_, K, C::Time> {
        Keys {
            inner: self.map.iter(),
        }
    }

    /// Temporal view, oldest to newest.
    pub fn chronological(&self) -> KeyChronological<'_, K, C::Time> {
        KeyChronological::new(self.map.chronological())
    }

    // -- bucket interface --------------------------------------------------

    pub fn load_factor(&self) -> f32 {
        self.map.load_factor()
    }

    pub fn max_load_factor(&self) -> f32 {
        self.map.max_load_factor()
    }

    pub fn set_max_load_factor(&mut self, factor: f32) {
        self.map.set_max_load_factor(factor);
    }

    pub fn rehash(&mut self, count: usize) {
        self.map.rehash(count);
    }

    pub fn reserve(&mut self, additional: usize) {
        self.map.reserve(additional);
    }

    pub fn bucket_count(&self) -> usize {
        self.map.bucket_count()
    }

    pub fn bucket(&self, key: &K) -> usize {
        self.map.bucket(key)
    }

    pub fn bucket_size(&self, n: usize) -> usize {
        self.map.bucket_size(n)
    }

    /// Iterates the elements of bucket `n`.
    pub fn bucket_iter(&self, n: usize) -> BucketKeys<'_, K, C::Time> {
        BucketKeys {
            inner: self.map.bucket_iter(n),
        }
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.map.debug_validate_invariants();
    }
}

impl<K: Eq + Hash, C: Clock, S: BuildHasher> AgedContainer<K>
    for AgedUnorderedSet<K, C, S>
{
    fn len(&self) -> usize {
        self.map.len()
    }

    fn clear(&mut self) {
        self.map.clear();
    }

    fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    fn erase_all(&mut self, key: &K) -> usize {
        self.map.remove(key).is_some() as usize
    }
}

impl<K: Eq + Hash, C: Clock, S: BuildHasher> ChronologicalAccess<K>
    for AgedUnorderedSet<K, C, S>
{
    type Time = C::Time;

    fn touch_all(&mut self, key: &K) -> usize {
        self.map.touch(key) as usize
    }

    fn oldest_when(&self) -> Option<C::Time> {
        ChronologicalAccess::oldest_when(&self.map)
    }

    fn newest_when(&self) -> Option<C::Time> {
        ChronologicalAccess::newest_when(&self.map)
    }

    fn erase_oldest(&mut self) -> bool {
        self.map.pop_oldest().is_some()
    }
}

impl<K: Eq + Hash, C: Clock, S: BuildHasher> Extend<K> for AgedUnorderedSet<K, C, S> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl<K, C: Clock, S> fmt::Debug for AgedUnorderedSet<K, C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgedUnorderedSet")
            .field("len", &self.map.core.arena.len())
            .finish_non_exhaustive()
    }
}

/// Hashed multiset: duplicate elements allowed, insertion order per key.
#[derive(Clone)]
pub struct AgedUnorderedMultiset<K, C: Clock, S = FxBuildHasher> {
    map: AgedUnorderedMultimap<K, (), C, S>,
}

impl<K: Eq + Hash, C: Clock> AgedUnorderedMultiset<K, C, FxBuildHasher> {
    pub fn new(clock: C) -> Self {
        Self {
            map: AgedUnorderedMultimap::new(clock),
        }
    }

    pub fn with_capacity(clock: C, capacity: usize) -> Self {
        Self {
            map: AgedUnorderedMultimap::with_capacity(clock, capacity),
        }
    }

    /// Builds a multiset by inserting `keys` in order.
    pub fn from_keys<I: IntoIterator<Item = K>>(clock: C, keys: I) -> Self {
        let iter = keys.into_iter();
        let mut set = Self::with_capacity(clock, iter.size_hint().0);
        for key in iter {
            set.insert(key);
        }
        set
    }
}

impl<K: Eq + Hash, C: Clock, S: BuildHasher> AgedUnorderedMultiset<K, C, S> {
    pub fn with_hasher(clock: C, hasher: S) -> Self {
        Self {
            map: AgedUnorderedMultimap::with_hasher(clock, hasher),
        }
    }

    pub fn clock(&self) -> &C {
        self.map.clock()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Number of elements equivalent to `key`.
    pub fn count(&self, key: &K) -> usize {
        self.map.count(key)
    }

    pub fn find(&self, key: &K) -> Option<EntryId> {
        self.map.find(key)
    }

    /// Inserts unconditionally at the end of `key`'s run.
    pub fn insert(&mut self, key: K) -> EntryId {
        self.map.insert(key, ())
    }

    /// Iterates `key`'s run in insertion order.
    pub fn equal_range(&self, key: &K) -> BucketKeys<'_, K, C::Time> {
        BucketKeys {
            inner: self.map.equal_range(key),
        }
    }

    /// Removes every element equivalent to `key`; returns the count removed.
    pub fn remove_all(&mut self, key: &K) -> usize {
        self.map.remove_all(key)
    }

    /// Removes the element with the given id, returning its key.
    pub fn remove_entry(&mut self, id: EntryId) -> Option<K> {
        self.map.remove_entry(id).map(|(key, ())| key)
    }

    /// Re-stamps every element equivalent to `key`; returns the count.
    pub fn touch_all(&mut self, key: &K) -> usize {
        self.map.touch_all(key)
    }

    pub fn touch_entry(&mut self, id: EntryId) -> bool {
        self.map.touch_entry(id)
    }

    pub fn when_of(&self, id: EntryId) -> Option<C::Time> {
        self.map.when_of(id)
    }

    pub fn get_entry(&self, id: EntryId) -> Option<AgedKey<'_, K, C::Time>> {
        self.map.get_entry(id).map(|entry| AgedKey {
            id: entry.id,
            when: entry.when,
            key: entry.key,
        })
    }

    /// Removes and returns the element that has gone longest without touch.
    pub fn pop_oldest(&mut self) -> Option<K> {
        self.map.pop_oldest().map(|(key, ())| key)
    }

    /// Keeps only the elements for which `keep` returns `true`.
    pub fn retain<F: FnMut(&K) -> bool>(&mut self, mut keep: F) {
        self.map.retain(|key, _| keep(key));
    }

    /// Iterates in bucket order.
    pub fn iter(&self) -> Keys<'_, K, C::Time> {
        Keys {
            inner: self.map.iter(),
        }
    }

    /// Temporal view, oldest to newest.
    pub fn chronological(&self) -> KeyChronological<'_, K, C::Time> {
        KeyChronological::new(self.map.chronological())
    }

    // -- bucket interface --------------------------------------------------

    pub fn load_factor(&self) -> f32 {
        self.map.load_factor()
    }

    pub fn max_load_factor(&self) -> f32 {
        self.map.max_load_factor()
    }

    pub fn set_max_load_factor(&mut self, factor: f32) {
        self.map.set_max_load_factor(factor);
    }

    pub fn rehash(&mut self, count: usize) {
        self.map.rehash(count);
    }

    pub fn reserve(&mut self, additional: usize) {
        self.map.reserve(additional);
    }

    pub fn bucket_count(&self) -> usize {
        self.map.bucket_count()
    }

    pub fn bucket(&self, key: &K) -> usize {
        self.map.bucket(key)
    }

    pub fn bucket_size(&self, n: usize) -> usize {
        self.map.bucket_size(n)
    }

    /// Iterates the elements of bucket `n`.
    pub fn bucket_iter(&self, n: usize) -> BucketKeys<'_, K, C::Time> {
        BucketKeys {
            inner: self.map.bucket_iter(n),
        }
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.map.debug_validate_invariants();
    }
}

impl<K: Eq + Hash, C: Clock, S: BuildHasher> AgedContainer<K>
    for AgedUnorderedMultiset<K, C, S>
{
    fn len(&self) -> usize {
        self.map.len()
    }

    fn clear(&mut self) {
        self.map.clear();
    }

    fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    fn erase_all(&mut self, key: &K) -> usize {
        self.map.remove_all(key)
    }
}

impl<K: Eq + Hash, C: Clock, S: BuildHasher> ChronologicalAccess<K>
    for AgedUnorderedMultiset<K, C, S>
{
    type Time = C::Time;

    fn touch_all(&mut self, key: &K) -> usize {
        self.map.touch_all(key)
    }

    fn oldest_when(&self) -> Option<C::Time> {
        ChronologicalAccess::oldest_when(&self.map)
    }

    fn newest_when(&self) -> Option<C::Time> {
        ChronologicalAccess::newest_when(&self.map)
    }

    fn erase_oldest(&mut self) -> bool {
        self.map.pop_oldest().is_some()
    }
}

impl<K: Eq + Hash, C: Clock, S: BuildHasher> Extend<K>
    for AgedUnorderedMultiset<K, C, S>
{
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl<K, C: Clock, S> fmt::Debug for AgedUnorderedMultiset<K, C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgedUnorderedMultiset")
            .field("len", &self.map.core.arena.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn suggested_counts_climb_the_schedule() {
        assert_eq!(suggested_upper_bucket_count(0), 13);
        assert_eq!(suggested_upper_bucket_count(13), 13);
        assert_eq!(suggested_upper_bucket_count(14), 29);
        assert_eq!(suggested_upper_bucket_count(100), 127);
        // Past the table: odd fallback.
        let big = 200_000_000;
        assert!(suggested_upper_bucket_count(big) % 2 == 1);
        assert!(suggested_upper_bucket_count(big) >= big);
    }

    #[test]
    fn insert_get_remove_basics() {
        let clock = ManualClock::new();
        let mut map = AgedUnorderedMap::new(clock.clone());
        clock.advance(1);
        let (id, fresh) = map.insert("a", 1);
        assert!(fresh);
        assert_eq!(map.get(&"a"), Some(&1));
        assert_eq!(map.when_of(id), Some(1));
        assert_eq!(map.at(&"missing"), Err(KeyNotFoundError));

        let (existing, inserted) = map.insert("a", 2);
        assert!(!inserted);
        assert_eq!(existing, id);
        assert_eq!(map.get(&"a"), Some(&1));
        assert_eq!(map.len(), 1);

        assert_eq!(map.remove(&"a"), Some(1));
        assert!(map.is_empty());
        map.debug_validate_invariants();
    }

    #[test]
    fn growth_keeps_load_factor_bounded() {
        let clock = ManualClock::new();
        let mut map = AgedUnorderedMap::new(clock);
        for key in 0..500u32 {
            map.insert(key, key);
            assert!(map.load_factor() <= map.max_load_factor() + f32::EPSILON);
        }
        assert_eq!(map.len(), 500);
        assert!(map.bucket_count() >= 500);
        map.debug_validate_invariants();
    }

    #[test]
    fn rehash_preserves_temporal_order() {
        let clock = ManualClock::new();
        let mut set = AgedUnorderedSet::new(clock.clone());
        for key in 1..=100u32 {
            clock.advance(1);
            set.insert(key);
        }
        // Growth rehashed at least once on the way to 100 entries.
        assert!(set.bucket_count() > 13);
        let aged: Vec<_> = set.chronological().iter().map(|e| *e.key).collect();
        let expected: Vec<_> = (1..=100).collect();
        assert_eq!(aged, expected);
        set.debug_validate_invariants();
    }

    #[test]
    fn explicit_rehash_clamps_to_load_floor() {
        let clock = ManualClock::new();
        let mut map = AgedUnorderedMap::new(clock);
        for key in 0..100u32 {
            map.insert(key, ());
        }
        let before: Vec<_> = map.chronological().iter().map(|e| *e.key).collect();
        // A count below len/max_load_factor cannot shrink past the floor.
        map.rehash(1);
        assert!(map.bucket_count() >= 100);
        assert!(map.load_factor() <= map.max_load_factor());
        let after: Vec<_> = map.chronological().iter().map(|e| *e.key).collect();
        assert_eq!(before, after);
        map.debug_validate_invariants();
    }

    #[test]
    fn max_load_factor_only_rises() {
        let clock = ManualClock::new();
        let mut map: AgedUnorderedMap<u32, (), ManualClock> = AgedUnorderedMap::new(clock);
        assert_eq!(map.max_load_factor(), 1.0);
        map.set_max_load_factor(0.25);
        assert_eq!(map.max_load_factor(), 1.0);
        map.set_max_load_factor(2.5);
        assert_eq!(map.max_load_factor(), 2.5);
        map.set_max_load_factor(1.0);
        assert_eq!(map.max_load_factor(), 2.5);
    }

    #[test]
    fn reserve_preempts_growth_rehashes() {
        let clock = ManualClock::new();
        let mut map = AgedUnorderedMap::new(clock);
        map.reserve(1000);
        let buckets = map.bucket_count();
        assert!(buckets as f32 >= 1000.0 / map.max_load_factor());
        for key in 0..1000u32 {
            map.insert(key, ());
        }
        assert_eq!(map.bucket_count(), buckets);
        map.debug_validate_invariants();
    }

    #[test]
    fn bucket_queries_agree_with_contents() {
        let clock = ManualClock::new();
        let mut map = AgedUnorderedMap::new(clock);
        for key in 0..50u32 {
            map.insert(key, key * 2);
        }
        let mut total = 0;
        for n in 0..map.bucket_count() {
            assert_eq!(map.bucket_iter(n).count(), map.bucket_size(n));
            total += map.bucket_size(n);
        }
        assert_eq!(total, map.len());

        let b = map.bucket(&7);
        assert!(map.bucket_iter(b).any(|(k, _)| *k == 7));
    }

    #[test]
    fn touch_reorders_without_rehash() {
        let clock = ManualClock::new();
        let mut map = AgedUnorderedMap::new(clock.clone());
        clock.set(1);
        map.insert("a", ());
        clock.set(2);
        map.insert("b", ());

        let buckets = map.bucket_count();
        clock.set(3);
        assert!(map.touch(&"a"));
        assert_eq!(map.bucket_count(), buckets);
        assert_eq!(map.chronological().oldest().map(|e| *e.key), Some("b"));
        assert_eq!(map.when_of(map.find(&"a").expect("present")), Some(3));
        assert!(!map.touch(&"zzz"));
        map.debug_validate_invariants();
    }

    #[test]
    fn clear_keeps_buckets_and_behaves_fresh() {
        let clock = ManualClock::new();
        let mut map = AgedUnorderedMap::new(clock.clone());
        for key in 0..100u32 {
            map.insert(key, ());
        }
        let buckets = map.bucket_count();
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.bucket_count(), buckets);
        assert_eq!(map.iter().count(), 0);

        clock.set(9);
        let (id, fresh) = map.insert(1, ());
        assert!(fresh);
        assert_eq!(map.when_of(id), Some(9));
        map.debug_validate_invariants();
    }

    #[test]
    fn get_or_insert_default_stamps_on_miss_only() {
        let clock = ManualClock::new();
        let mut map: AgedUnorderedMap<u32, u32, ManualClock> =
            AgedUnorderedMap::new(clock.clone());
        clock.set(2);
        *map.get_or_insert_default(5) = 50;
        let id = map.find(&5).expect("present");
        assert_eq!(map.when_of(id), Some(2));

        clock.set(7);
        assert_eq!(*map.get_or_insert_default(5), 50);
        assert_eq!(map.when_of(id), Some(2));
        map.debug_validate_invariants();
    }

    #[test]
    fn retain_filters_and_can_mutate() {
        let clock = ManualClock::new();
        let mut map = AgedUnorderedMap::new(clock);
        for key in 0..20u32 {
            map.insert(key, key);
        }
        map.retain(|key, value| {
            *value += 100;
            key % 4 == 0
        });
        assert_eq!(map.len(), 5);
        assert_eq!(map.get(&4), Some(&104));
        assert!(!map.contains_key(&5));
        map.debug_validate_invariants();
    }

    #[test]
    fn clone_is_independent() {
        let clock = ManualClock::new();
        let mut map = AgedUnorderedMap::new(clock.clone());
        map.insert(1u32, "a");
        map.insert(2, "b");
        let copy = map.clone();
        map.remove(&1);
        assert_eq!(copy.len(), 2);
        assert_eq!(copy.get(&1), Some(&"a"));
        copy.debug_validate_invariants();
    }

    mod multimap {
        use super::*;

        #[test]
        fn runs_stay_contiguous_in_buckets() {
            let clock = ManualClock::new();
            let mut map = AgedUnorderedMultimap::new(clock);
            for round in 0..3 {
                for key in 0..40u32 {
                    map.insert(key, round);
                }
            }
            assert_eq!(map.len(), 120);
            for key in 0..40u32 {
                assert_eq!(map.count(&key), 3);
                let run: Vec<_> = map.equal_range(&key).map(|(_, v)| *v).collect();
                assert_eq!(run, vec![0, 1, 2]);
            }
            map.debug_validate_invariants();
        }

        #[test]
        fn rehash_keeps_run_insertion_order() {
            let clock = ManualClock::new();
            let mut map = AgedUnorderedMultimap::new(clock);
            for value in 0..10u32 {
                for key in 0..30u32 {
                    map.insert(key, value);
                }
            }
            map.rehash(1109);
            for key in 0..30u32 {
                let run: Vec<_> = map.equal_range(&key).map(|(_, v)| *v).collect();
                assert_eq!(run, (0..10).collect::<Vec<_>>());
            }
            map.debug_validate_invariants();
        }

        #[test]
        fn remove_all_spares_other_runs() {
            let clock = ManualClock::new();
            let mut map = AgedUnorderedMultimap::new(clock);
            map.insert("a", 1);
            map.insert("b", 2);
            map.insert("a", 3);
            map.insert("b", 4);
            assert_eq!(map.remove_all(&"a"), 2);
            assert_eq!(map.len(), 2);
            let run: Vec<_> = map.equal_range(&"b").map(|(_, v)| *v).collect();
            assert_eq!(run, vec![2, 4]);
            assert_eq!(map.remove_all(&"a"), 0);
            map.debug_validate_invariants();
        }

        #[test]
        fn touch_all_moves_run_to_newest() {
            let clock = ManualClock::new();
            let mut map = AgedUnorderedMultimap::new(clock.clone());
            clock.set(1);
            map.insert("a", 1);
            clock.set(2);
            map.insert("b", 2);
            clock.set(3);
            map.insert("a", 3);

            clock.set(9);
            assert_eq!(map.touch_all(&"a"), 2);
            let aged: Vec<_> = map.chronological().iter().map(|e| (*e.value, e.when)).collect();
            assert_eq!(aged, vec![(2, 2), (1, 9), (3, 9)]);
            map.debug_validate_invariants();
        }
    }

    mod sets {
        use super::*;

        #[test]
        fn set_dedups_and_ages() {
            let clock = ManualClock::new();
            let mut set = AgedUnorderedSet::new(clock.clone());
            clock.set(1);
            let (id, fresh) = set.insert("x");
            assert!(fresh);
            clock.set(2);
            let (again, inserted) = set.insert("x");
            assert!(!inserted);
            assert_eq!(id, again);
            assert_eq!(set.when_of(id), Some(1));
            assert!(set.contains(&"x"));
            assert!(set.remove(&"x"));
            assert!(!set.remove(&"x"));
            set.debug_validate_invariants();
        }

        #[test]
        fn multiset_tracks_duplicates() {
            let clock = ManualClock::new();
            let mut bag = AgedUnorderedMultiset::new(clock);
            bag.insert(1u32);
            bag.insert(1);
            bag.insert(2);
            assert_eq!(bag.count(&1), 2);
            assert_eq!(bag.len(), 3);
            assert_eq!(bag.remove_all(&1), 2);
            assert_eq!(bag.len(), 1);
            bag.debug_validate_invariants();
        }

        #[test]
        fn set_pop_oldest_follows_age() {
            let clock = ManualClock::new();
            let mut set = AgedUnorderedSet::new(clock.clone());
            clock.set(1);
            set.insert("old");
            clock.set(2);
            set.insert("new");
            assert_eq!(set.pop_oldest(), Some("old"));
            assert_eq!(set.pop_oldest(), Some("new"));
            assert_eq!(set.pop_oldest(), None);
        }
    }
}
