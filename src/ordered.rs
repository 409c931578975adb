//! Ordered aged containers.
//!
//! Containers in this module keep two coordinated indices over one arena of
//! nodes: a `BTreeMap` from key to the run of entries with that key, and the
//! temporal list ordered by insertion/touch time.
//!
//! ## Architecture
//!
//! ```text
//!   ┌─────────────────────────────────────────────────────────────────┐
//!   │                     AgedOrderedMap<K, V, C>                     │
//!   │                                                                 │
//!   │   ┌───────────────────────────────────────────────────────────┐ │
//!   │   │  BTreeMap<K, Vec<EntryId>>  (associative index)           │ │
//!   │   │                                                           │ │
//!   │   │   "apple"  → [id_2]                                       │ │
//!   │   │   "pear"   → [id_0, id_3]   runs keep insertion order     │ │
//!   │   │   "quince" → [id_1]         (multi variants only)         │ │
//!   │   └───────────────────────────────────────────────────────────┘ │
//!   │                                                                 │
//!   │   ┌───────────────────────────────────────────────────────────┐ │
//!   │   │  NodeArena  (key, value, when, older/newer links)         │ │
//!   │   └───────────────────────────────────────────────────────────┘ │
//!   │                                                                 │
//!   │   ┌───────────────────────────────────────────────────────────┐ │
//!   │   │  TimeList   oldest ─► id_0 ◄─► id_1 ◄─► ... ◄─ newest     │ │
//!   │   └───────────────────────────────────────────────────────────┘ │
//!   └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Operations
//!
//! | Operation           | Complexity   | Notes                            |
//! |---------------------|--------------|----------------------------------|
//! | `insert`            | O(log n)     | probe, then stamp at temporal tail |
//! | `get` / `find`      | O(log n)     |                                  |
//! | `remove` (by key)   | O(log n)     | unlinks both indices             |
//! | `remove_entry` (id) | O(log n)     | index fix-up dominates           |
//! | `touch`             | O(log n)     | list splice itself is O(1)       |
//! | `touch_entry`       | O(1)         | no associative work at all       |
//! | `pop_oldest`        | O(log n)     |                                  |
//! | `iter` / `range`    | O(n) total   | key order, runs in insertion order |
//! | `chronological`     | O(n) total   | oldest to newest                 |
//!
//! Every mutation leaves the two indices agreeing on the exact entry set;
//! `debug_validate_invariants()` checks this in debug/test builds.
//!
//! Unique variants never overwrite: inserting an occupied key returns the
//! existing entry's id with `false` and changes nothing, so callers opt into
//! replacement explicitly (`get_mut`, `get_or_insert_with`). Equality and
//! ordering between containers compare the associative traversal only;
//! timestamps and temporal order are deliberately not observable there.

use std::cmp::Ordering;
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::ops::RangeBounds;

use crate::chronological::{AgedEntry, AgedKey, Chronological, KeyChronological};
use crate::clock::Clock;
use crate::ds::node_arena::{EntryId, NodeArena};
use crate::ds::time_list::TimeList;
use crate::error::KeyNotFoundError;
use crate::traits::{AgedContainer, ChronologicalAccess};

// ---------------------------------------------------------------------------
// OrderedCore
// ---------------------------------------------------------------------------

/// Shared machinery of the four ordered containers.
#[derive(Clone)]
struct OrderedCore<K, V, C: Clock> {
    arena: NodeArena<K, V, C::Time>,
    list: TimeList,
    index: BTreeMap<K, Vec<EntryId>>,
    clock: C,
}

impl<K: Ord + Clone, V, C: Clock> OrderedCore<K, V, C> {
    fn new(clock: C) -> Self {
        Self {
            arena: NodeArena::new(),
            list: TimeList::new(),
            index: BTreeMap::new(),
            clock,
        }
    }

    fn with_capacity(clock: C, capacity: usize) -> Self {
        Self {
            arena: NodeArena::with_capacity(capacity),
            list: TimeList::new(),
            index: BTreeMap::new(),
            clock,
        }
    }

    fn len(&self) -> usize {
        self.arena.len()
    }

    fn clear(&mut self) {
        self.arena.clear();
        self.list.clear();
        self.index.clear();
    }

    /// Allocates a node stamped `now()` and links it at the temporal tail.
    fn stamp(&mut self, key: K, value: V) -> EntryId {
        let when = self.clock.now();
        let id = self.arena.alloc(key, value, when);
        self.list.push_newest(&mut self.arena, id);
        id
    }

    fn insert_unique(&mut self, key: K, value: V) -> (EntryId, bool) {
        if let Some(run) = self.index.get(&key) {
            return (run[0], false);
        }
        let id = self.stamp(key.clone(), value);
        self.index.insert(key, vec![id]);
        (id, true)
    }

    fn insert_multi(&mut self, key: K, value: V) -> EntryId {
        let id = self.stamp(key.clone(), value);
        self.index.entry(key).or_default().push(id);
        id
    }

    fn first_of(&self, key: &K) -> Option<EntryId> {
        self.index.get(key).map(|run| run[0])
    }

    fn run_len(&self, key: &K) -> usize {
        self.index.get(key).map(|run| run.len()).unwrap_or(0)
    }

    fn remove_entry(&mut self, id: EntryId) -> Option<(K, V)> {
        if !self.arena.contains(id) {
            return None;
        }
        self.list.unlink(&mut self.arena, id);
        let node = self.arena.release(id)?;
        if let Some(run) = self.index.get_mut(&node.key) {
            if let Some(pos) = run.iter().position(|&e| e == id) {
                run.remove(pos);
            }
            if run.is_empty() {
                self.index.remove(&node.key);
            }
        }
        Some((node.key, node.value))
    }

    fn remove_key(&mut self, key: &K) -> usize {
        let ids = match self.index.remove(key) {
            Some(run) => run,
            None => return 0,
        };
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

    /// Re-stamps the whole run for `key`. `now()` is taken once; the run is
    /// walked in insertion order, which keeps its relative order at the tail.
    fn touch_key(&mut self, key: &K) -> usize {
        let ids = match self.index.get(key) {
            Some(run) => run.clone(),
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
            outer: self.index.iter(),
            front_run: &[],
            back_run: &[],
            arena: &self.arena,
        }
    }

    fn range<R: RangeBounds<K>>(&self, bounds: R) -> RangeIter<'_, K, V, C::Time> {
        RangeIter {
            outer: self.index.range(bounds),
            front_run: &[],
            back_run: &[],
            arena: &self.arena,
        }
    }

    fn run_iter(&self, key: &K) -> RunIter<'_, K, V, C::Time> {
        let ids = self
            .index
            .get(key)
            .map(|run| run.as_slice())
            .unwrap_or(&[]);
        RunIter {
            ids: ids.iter(),
            arena: &self.arena,
        }
    }

    #[cfg(any(test, debug_assertions))]
    fn debug_validate_invariants(&self) {
        self.arena.debug_validate_invariants();
        self.list.debug_validate_invariants(&self.arena);
        let mut total = 0usize;
        for (key, run) in &self.index {
            assert!(!run.is_empty(), "empty run left in index");
            for &id in run {
                let node = self.arena.node(id).expect("indexed node missing");
                assert!(&node.key == key, "node filed under wrong key");
            }
            total += run.len();
        }
        assert_eq!(total, self.arena.len());
    }
}

// ---------------------------------------------------------------------------
// Associative iterators
// ---------------------------------------------------------------------------

/// Iterator over a container in key order, runs in insertion order.
pub struct Iter<'a, K, V, W> {
    outer: btree_map::Iter<'a, K, Vec<EntryId>>,
    front_run: &'a [EntryId],
    back_run: &'a [EntryId],
    arena: &'a NodeArena<K, V, W>,
}

impl<'a, K, V, W> Iter<'a, K, V, W> {
    fn item(&self, id: EntryId) -> Option<(&'a K, &'a V)> {
        self.arena.node(id).map(|node| (&node.key, &node.value))
    }
}

impl<'a, K, V, W> Iterator for Iter<'a, K, V, W> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((&id, rest)) = self.front_run.split_first() {
                self.front_run = rest;
                return self.item(id);
            }
            match self.outer.next() {
                Some((_, run)) => self.front_run = run,
                None => {
                    let (&id, rest) = self.back_run.split_first()?;
                    self.back_run = rest;
                    return self.item(id);
                }
            }
        }
    }
}

impl<K, V, W> DoubleEndedIterator for Iter<'_, K, V, W> {
    fn next_back(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((&id, rest)) = self.back_run.split_last() {
                self.back_run = rest;
                return self.item(id);
            }
            match self.outer.next_back() {
                Some((_, run)) => self.back_run = run,
                None => {
                    let (&id, rest) = self.front_run.split_last()?;
                    self.front_run = rest;
                    return self.item(id);
                }
            }
        }
    }
}

/// Iterator over a key range in key order, runs in insertion order.
pub struct RangeIter<'a, K, V, W> {
    outer: btree_map::Range<'a, K, Vec<EntryId>>,
    front_run: &'a [EntryId],
    back_run: &'a [EntryId],
    arena: &'a NodeArena<K, V, W>,
}

impl<'a, K, V, W> RangeIter<'a, K, V, W> {
    fn item(&self, id: EntryId) -> Option<(&'a K, &'a V)> {
        self.arena.node(id).map(|node| (&node.key, &node.value))
    }
}

impl<'a, K, V, W> Iterator for RangeIter<'a, K, V, W> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((&id, rest)) = self.front_run.split_first() {
                self.front_run = rest;
                return self.item(id);
            }
            match self.outer.next() {
                Some((_, run)) => self.front_run = run,
                None => {
                    let (&id, rest) = self.back_run.split_first()?;
                    self.back_run = rest;
                    return self.item(id);
                }
            }
        }
    }
}

impl<K, V, W> DoubleEndedIterator for RangeIter<'_, K, V, W> {
    fn next_back(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((&id, rest)) = self.back_run.split_last() {
                self.back_run = rest;
                return self.item(id);
            }
            match self.outer.next_back() {
                Some((_, run)) => self.back_run = run,
                None => {
                    let (&id, rest) = self.front_run.split_last()?;
                    self.front_run = rest;
                    return self.item(id);
                }
            }
        }
    }
}

/// Iterator over the run of entries sharing one key, in insertion order.
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

impl<K, W> DoubleEndedIterator for Keys<'_, K, W> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(key, _)| key)
    }
}

/// Key-only range iterator for the set-shaped containers.
pub struct RangeKeys<'a, K, W> {
    inner: RangeIter<'a, K, (), W>,
}

/// Key-only run iterator for the multiset.
pub struct RunKeys<'a, K, W> {
    inner: RunIter<'a, K, (), W>,
}

impl<'a, K, W> Iterator for RunKeys<'a, K, W> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, W> DoubleEndedIterator for RunKeys<'_, K, W> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(key, _)| key)
    }
}

impl<K, W> ExactSizeIterator for RunKeys<'_, K, W> {}

impl<'a, K, W> Iterator for RangeKeys<'a, K, W> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }
}

impl<K, W> DoubleEndedIterator for RangeKeys<'_, K, W> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(key, _)| key)
    }
}

// ---------------------------------------------------------------------------
// AgedOrderedMap (unique keys)
// ---------------------------------------------------------------------------

/// Ordered map in which every entry carries an insertion/touch timestamp.
///
/// Keys are unique under `Ord`. Inserting an occupied key changes nothing
/// and reports the existing entry; see [`insert`](AgedOrderedMap::insert).
///
/// # Example
///
/// ```
/// use agekit::clock::ManualClock;
/// use agekit::ordered::AgedOrderedMap;
///
/// let clock = ManualClock::new();
/// let mut map = AgedOrderedMap::new(clock.clone());
///
/// clock.advance(1);
/// map.insert(3, "c");
/// clock.advance(1);
/// map.insert(1, "a");
///
/// // Associative order is by key; temporal order is by age.
/// let keys: Vec<_> = map.iter().map(|(k, _)| *k).collect();
/// assert_eq!(keys, vec![1, 3]);
/// let aged: Vec<_> = map.chronological().iter().map(|e| *e.key).collect();
/// assert_eq!(aged, vec![3, 1]);
/// ```
#[derive(Clone)]
pub struct AgedOrderedMap<K, V, C: Clock> {
    core: OrderedCore<K, V, C>,
}

impl<K: Ord + Clone, V, C: Clock> AgedOrderedMap<K, V, C> {
    /// Creates an empty map observing `clock`.
    pub fn new(clock: C) -> Self {
        Self {
            core: OrderedCore::new(clock),
        }
    }

    /// Creates an empty map with node storage reserved for `capacity` entries.
    pub fn with_capacity(clock: C, capacity: usize) -> Self {
        Self {
            core: OrderedCore::with_capacity(clock, capacity),
        }
    }

    /// Builds a map by inserting `entries` in order; on duplicate keys the
    /// first entry wins (unique insertion never overwrites).
    pub fn from_entries<I: IntoIterator<Item = (K, V)>>(clock: C, entries: I) -> Self {
        let iter = entries.into_iter();
        let mut map = Self::with_capacity(clock, iter.size_hint().0);
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }

    /// Returns the clock handle this map stamps entries with.
    pub fn clock(&self) -> &C {
        &self.core.clock
    }

    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.len() == 0
    }

    /// Removes every entry. The clock is kept.
    pub fn clear(&mut self) {
        self.core.clear();
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.core.first_of(key).is_some()
    }

    /// Returns the stable id of the entry for `key`, if present.
    pub fn find(&self, key: &K) -> Option<EntryId> {
        self.core.first_of(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let id = self.core.first_of(key)?;
        self.core.arena.node(id).map(|node| &node.value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let id = self.core.first_of(key)?;
        self.core.arena.node_mut(id).map(|node| &mut node.value)
    }

    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        let id = self.core.first_of(key)?;
        self.core.arena.node(id).map(|node| (&node.key, &node.value))
    }

    /// Keyed access with a hard contract: fails if `key` has no entry.
    pub fn at(&self, key: &K) -> Result<&V, KeyNotFoundError> {
        self.get(key).ok_or(KeyNotFoundError)
    }

    /// Mutable counterpart of [`at`](AgedOrderedMap::at).
    pub fn at_mut(&mut self, key: &K) -> Result<&mut V, KeyNotFoundError> {
        self.get_mut(key).ok_or(KeyNotFoundError)
    }

    /// Inserts `value` under `key`, stamped with the clock's current time.
    ///
    /// If an equivalent key is already present, nothing is allocated and
    /// nothing changes: the existing entry's id is returned with `false`,
    /// and the offered `value` is dropped. Otherwise the new entry is linked
    /// at the newest end of the temporal order and `(id, true)` is returned.
    pub fn insert(&mut self, key: K, value: V) -> (EntryId, bool) {
        self.core.insert_unique(key, value)
    }

    /// Returns the value for `key`, inserting `make()` stamped `now()` first
    /// if the key is vacant. `make` runs only on vacancy.
    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: K, make: F) -> &mut V {
        let id = match self.core.index.get(&key) {
            Some(run) => run[0],
            None => {
                let id = self.core.stamp(key.clone(), make());
                self.core.index.insert(key, vec![id]);
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

    /// Index-style access: the default value is inserted on a miss, stamped
    /// `now()`. A hit neither re-stamps nor reorders the entry.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }

    /// Removes the entry for `key` and returns its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let id = self.core.first_of(key)?;
        self.core.remove_entry(id).map(|(_, value)| value)
    }

    /// Removes the entry with the given id, returning its key and value.
    pub fn remove_entry(&mut self, id: EntryId) -> Option<(K, V)> {
        self.core.remove_entry(id)
    }

    /// Re-stamps the entry for `key` to `now()` and moves it to the newest
    /// end of the temporal order. The associative index is untouched.
    pub fn touch(&mut self, key: &K) -> bool {
        self.core.touch_key(key) != 0
    }

    /// [`touch`](AgedOrderedMap::touch) by stable id; O(1).
    pub fn touch_entry(&mut self, id: EntryId) -> bool {
        self.core.touch_entry(id)
    }

    /// Timestamp of the entry with the given id.
    pub fn when_of(&self, id: EntryId) -> Option<C::Time> {
        self.core.when_of(id)
    }

    /// The entry with the given id, as seen through temporal traversal.
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

    /// Iterates in key order.
    pub fn iter(&self) -> Iter<'_, K, V, C::Time> {
        self.core.iter()
    }

    /// Iterates the entries whose keys fall in `bounds`, in key order.
    pub fn range<R: RangeBounds<K>>(&self, bounds: R) -> RangeIter<'_, K, V, C::Time> {
        self.core.range(bounds)
    }

    /// Temporal view, oldest to newest.
    pub fn chronological(&self) -> Chronological<'_, K, V, C::Time> {
        self.core.chronological()
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.core.debug_validate_invariants();
        for run in self.core.index.values() {
            assert_eq!(run.len(), 1, "duplicate key in unique container");
        }
    }
}

impl<K: Ord + Clone, V, C: Clock> AgedContainer<K> for AgedOrderedMap<K, V, C> {
    fn len(&self) -> usize {
        self.core.len()
    }

    fn clear(&mut self) {
        self.core.clear();
    }

    fn contains_key(&self, key: &K) -> bool {
        AgedOrderedMap::contains_key(self, key)
    }

    fn erase_all(&mut self, key: &K) -> usize {
        self.core.remove_key(key)
    }
}

impl<K: Ord + Clone, V, C: Clock> ChronologicalAccess<K> for AgedOrderedMap<K, V, C> {
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

impl<K: Ord + Clone, V, C: Clock> Extend<(K, V)> for AgedOrderedMap<K, V, C> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K: Ord + Clone, V, C: Clock> fmt::Debug for AgedOrderedMap<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgedOrderedMap")
            .field("len", &self.core.len())
            .finish_non_exhaustive()
    }
}

impl<K: Ord + Clone, V: PartialEq, C: Clock> PartialEq for AgedOrderedMap<K, V, C> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K: Ord + Clone, V: Eq, C: Clock> Eq for AgedOrderedMap<K, V, C> {}

impl<K: Ord + Clone, V: PartialOrd, C: Clock> PartialOrd for AgedOrderedMap<K, V, C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<K: Ord + Clone, V: Ord, C: Clock> Ord for AgedOrderedMap<K, V, C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

// ---------------------------------------------------------------------------
// AgedOrderedMultimap
// ---------------------------------------------------------------------------

/// Ordered multimap: duplicate keys allowed, insertion order kept per key.
///
/// Entries with equal keys form a contiguous run in associative traversal,
/// ordered by insertion (every new duplicate lands at the end of its run).
#[derive(Clone)]
pub struct AgedOrderedMultimap<K, V, C: Clock> {
    core: OrderedCore<K, V, C>,
}

impl<K: Ord + Clone, V, C: Clock> AgedOrderedMultimap<K, V, C> {
    /// Creates an empty multimap observing `clock`.
    pub fn new(clock: C) -> Self {
        Self {
            core: OrderedCore::new(clock),
        }
    }

    /// Creates an empty multimap with storage reserved for `capacity` entries.
    pub fn with_capacity(clock: C, capacity: usize) -> Self {
        Self {
            core: OrderedCore::with_capacity(clock, capacity),
        }
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
        self.core.first_of(key).is_some()
    }

    /// Number of entries whose key is equivalent to `key`.
    pub fn count(&self, key: &K) -> usize {
        self.core.run_len(key)
    }

    /// Stable id of the first entry in `key`'s run.
    pub fn find(&self, key: &K) -> Option<EntryId> {
        self.core.first_of(key)
    }

    /// Value of the first entry in `key`'s run.
    pub fn get(&self, key: &K) -> Option<&V> {
        let id = self.core.first_of(key)?;
        self.core.arena.node(id).map(|node| &node.value)
    }

    /// Inserts unconditionally; the new entry joins the end of its key's run
    /// and the newest end of the temporal order.
    pub fn insert(&mut self, key: K, value: V) -> EntryId {
        self.core.insert_multi(key, value)
    }

    /// Iterates `key`'s run in insertion order.
    pub fn equal_range(&self, key: &K) -> RunIter<'_, K, V, C::Time> {
        self.core.run_iter(key)
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

    /// [`touch_all`](AgedOrderedMultimap::touch_all) for one entry; O(1).
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

    /// Iterates in key order, runs in insertion order.
    pub fn iter(&self) -> Iter<'_, K, V, C::Time> {
        self.core.iter()
    }

    /// Iterates the entries whose keys fall in `bounds`.
    pub fn range<R: RangeBounds<K>>(&self, bounds: R) -> RangeIter<'_, K, V, C::Time> {
        self.core.range(bounds)
    }

    /// Temporal view, oldest to newest.
    pub fn chronological(&self) -> Chronological<'_, K, V, C::Time> {
        self.core.chronological()
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.core.debug_validate_invariants();
    }
}

impl<K: Ord + Clone, V, C: Clock> AgedContainer<K> for AgedOrderedMultimap<K, V, C> {
    fn len(&self) -> usize {
        self.core.len()
    }

    fn clear(&mut self) {
        self.core.clear();
    }

    fn contains_key(&self, key: &K) -> bool {
        AgedOrderedMultimap::contains_key(self, key)
    }

    fn erase_all(&mut self, key: &K) -> usize {
        self.core.remove_key(key)
    }
}

impl<K: Ord + Clone, V, C: Clock> ChronologicalAccess<K> for AgedOrderedMultimap<K, V, C> {
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

impl<K: Ord + Clone, V, C: Clock> Extend<(K, V)> for AgedOrderedMultimap<K, V, C> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K: Ord + Clone, V, C: Clock> fmt::Debug for AgedOrderedMultimap<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgedOrderedMultimap")
            .field("len", &self.core.len())
            .finish_non_exhaustive()
    }
}

impl<K: Ord + Clone, V: PartialEq, C: Clock> PartialEq for AgedOrderedMultimap<K, V, C> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K: Ord + Clone, V: Eq, C: Clock> Eq for AgedOrderedMultimap<K, V, C> {}

impl<K: Ord + Clone, V: PartialOrd, C: Clock> PartialOrd for AgedOrderedMultimap<K, V, C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<K: Ord + Clone, V: Ord, C: Clock> Ord for AgedOrderedMultimap<K, V, C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

// ---------------------------------------------------------------------------
// AgedOrderedSet / AgedOrderedMultiset
// ---------------------------------------------------------------------------

/// Ordered set shape: the stored value is the key itself.
#[derive(Clone)]
pub struct AgedOrderedSet<K, C: Clock> {
    map: AgedOrderedMap<K, (), C>,
}

impl<K: Ord + Clone, C: Clock> AgedOrderedSet<K, C> {
    pub fn new(clock: C) -> Self {
        Self {
            map: AgedOrderedMap::new(clock),
        }
    }

    pub fn with_capacity(clock: C, capacity: usize) -> Self {
        Self {
            map: AgedOrderedMap::with_capacity(clock, capacity),
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

    /// Removes the entry with the given id, returning its key.
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

    /// Iterates in key order.
    pub fn iter(&self) -> Keys<'_, K, C::Time> {
        Keys {
            inner: self.map.iter(),
        }
    }

    /// Iterates the keys falling in `bounds`, in key order.
    pub fn range<R: RangeBounds<K>>(&self, bounds: R) -> RangeKeys<'_, K, C::Time> {
        RangeKeys {
            inner: self.map.range(bounds),
        }
    }

    /// Temporal view, oldest to newest.
    pub fn chronological(&self) -> KeyChronological<'_, K, C::Time> {
        KeyChronological::new(self.map.chronological())
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.map.debug_validate_invariants();
    }
}

impl<K: Ord + Clone, C: Clock> AgedContainer<K> for AgedOrderedSet<K, C> {
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

impl<K: Ord + Clone, C: Clock> ChronologicalAccess<K> for AgedOrderedSet<K, C> {
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

impl<K: Ord + Clone, C: Clock> Extend<K> for AgedOrderedSet<K, C> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl<K: Ord + Clone, C: Clock> fmt::Debug for AgedOrderedSet<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgedOrderedSet")
            .field("len", &self.map.core.len())
            .finish_non_exhaustive()
    }
}

impl<K: Ord + Clone, C: Clock> PartialEq for AgedOrderedSet<K, C> {
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl<K: Ord + Clone, C: Clock> Eq for AgedOrderedSet<K, C> {}

impl<K: Ord + Clone, C: Clock> PartialOrd for AgedOrderedSet<K, C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord + Clone, C: Clock> Ord for AgedOrderedSet<K, C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.map.cmp(&other.map)
    }
}

/// Ordered multiset: duplicate elements allowed, insertion order kept per key.
#[derive(Clone)]
pub struct AgedOrderedMultiset<K, C: Clock> {
    map: AgedOrderedMultimap<K, (), C>,
}

impl<K: Ord + Clone, C: Clock> AgedOrderedMultiset<K, C> {
    pub fn new(clock: C) -> Self {
        Self {
            map: AgedOrderedMultimap::new(clock),
        }
    }

    pub fn with_capacity(clock: C, capacity: usize) -> Self {
        Self {
            map: AgedOrderedMultimap::with_capacity(clock, capacity),
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
    pub fn equal_range(&self, key: &K) -> RunKeys<'_, K, C::Time> {
        RunKeys {
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

    /// Iterates in key order, runs in insertion order.
    pub fn iter(&self) -> Keys<'_, K, C::Time> {
        Keys {
            inner: self.map.iter(),
        }
    }

    /// Iterates the keys falling in `bounds`.
    pub fn range<R: RangeBounds<K>>(&self, bounds: R) -> RangeKeys<'_, K, C::Time> {
        RangeKeys {
            inner: self.map.range(bounds),
        }
    }

    /// Temporal view, oldest to newest.
    pub fn chronological(&self) -> KeyChronological<'_, K, C::Time> {
        KeyChronological::new(self.map.chronological())
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.map.debug_validate_invariants();
    }
}

impl<K: Ord + Clone, C: Clock> AgedContainer<K> for AgedOrderedMultiset<K, C> {
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

impl<K: Ord + Clone, C: Clock> ChronologicalAccess<K> for AgedOrderedMultiset<K, C> {
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

impl<K: Ord + Clone, C: Clock> Extend<K> for AgedOrderedMultiset<K, C> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl<K: Ord + Clone, C: Clock> fmt::Debug for AgedOrderedMultiset<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgedOrderedMultiset")
            .field("len", &self.map.core.len())
            .finish_non_exhaustive()
    }
}

impl<K: Ord + Clone, C: Clock> PartialEq for AgedOrderedMultiset<K, C> {
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl<K: Ord + Clone, C: Clock> Eq for AgedOrderedMultiset<K, C> {}

impl<K: Ord + Clone, C: Clock> PartialOrd for AgedOrderedMultiset<K, C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord + Clone, C: Clock> Ord for AgedOrderedMultiset<K, C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.map.cmp(&other.map)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
