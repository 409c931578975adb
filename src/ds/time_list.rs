//! Temporal doubly-linked list threaded through arena nodes.
//!
//! The list owns no storage of its own: the `older`/`newer` link fields live
//! inside each [`Node`](super::node_arena::Node), and `TimeList` keeps only
//! the two ends. Oldest entries sit at the head, newest at the tail; every
//! insertion links at the tail and `touch` re-links an existing entry there.
//!
//! ```text
//!   oldest ──► [e₀] ◄──► [e₁] ◄──► [e₂] ◄── newest
//!              first                 last
//!              stamped               stamped / touched
//! ```
//!
//! Splice operations are O(1); the only traversal is iteration itself.

use super::node_arena::{EntryId, NodeArena};

/// Head/tail bookkeeping for the temporal order of an aged container.
#[derive(Debug, Clone, Default)]
pub(crate) struct TimeList {
    oldest: Option<EntryId>,
    newest: Option<EntryId>,
}

impl TimeList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn oldest(&self) -> Option<EntryId> {
        self.oldest
    }

    pub(crate) fn newest(&self) -> Option<EntryId> {
        self.newest
    }

    /// Links a freshly allocated node at the newest end.
    pub(crate) fn push_newest<K, V, W>(&mut self, arena: &mut NodeArena<K, V, W>, id: EntryId) {
        let old_newest = self.newest;
        if let Some(node) = arena.node_mut(id) {
            node.older = old_newest;
            node.newer = None;
        } else {
            return;
        }
        match old_newest {
            Some(tail) => {
                if let Some(tail_node) = arena.node_mut(tail) {
                    tail_node.newer = Some(id);
                }
            }
            None => self.oldest = Some(id),
        }
        self.newest = Some(id);
    }

    /// Detaches `id` from the list; returns `false` if it is not a live node.
    pub(crate) fn unlink<K, V, W>(
        &mut self,
        arena: &mut NodeArena<K, V, W>,
        id: EntryId,
    ) -> bool {
        let (older, newer) = match arena.node(id) {
            Some(node) => (node.older, node.newer),
            None => return false,
        };

        match older {
            Some(o) => {
                if let Some(older_node) = arena.node_mut(o) {
                    older_node.newer = newer;
                }
            }
            None => self.oldest = newer,
        }

        match newer {
            Some(n) => {
                if let Some(newer_node) = arena.node_mut(n) {
                    newer_node.older = older;
                }
            }
            None => self.newest = older,
        }

        if let Some(node) = arena.node_mut(id) {
            node.older = None;
            node.newer = None;
        }
        true
    }

    /// Moves a linked node to the newest end; returns `false` if not live.
    pub(crate) fn move_to_newest<K, V, W>(
        &mut self,
        arena: &mut NodeArena<K, V, W>,
        id: EntryId,
    ) -> bool {
        if !arena.contains(id) {
            return false;
        }
        if self.newest == Some(id) {
            return true;
        }
        self.unlink(arena, id);
        self.push_newest(arena, id);
        true
    }

    pub(crate) fn clear(&mut self) {
        self.oldest = None;
        self.newest = None;
    }

    /// Walks the list end to end, asserting link integrity, full coverage of
    /// the arena, and non-decreasing timestamps.
    #[cfg(any(test, debug_assertions))]
    pub(crate) fn debug_validate_invariants<K, V, W: Ord + Copy>(
        &self,
        arena: &NodeArena<K, V, W>,
    ) {
        if self.oldest.is_none() || self.newest.is_none() {
            assert!(self.oldest.is_none());
            assert!(self.newest.is_none());
            assert_eq!(arena.len(), 0);
            return;
        }

        let mut seen = std::collections::HashSet::new();
        let mut count = 0usize;
        let mut current = self.oldest;
        let mut previous: Option<EntryId> = None;
        let mut last_when: Option<W> = None;

        while let Some(id) = current {
            assert!(seen.insert(id), "cycle in temporal list");
            let node = arena.node(id).expect("linked node missing from arena");
            assert_eq!(node.older, previous);
            if let Some(w) = last_when {
                assert!(w <= node.when, "temporal list out of order");
            }
            last_when = Some(node.when);
            if node.newer.is_none() {
                assert_eq!(self.newest, Some(id));
            }
            previous = Some(id);
            current = node.newer;
            count += 1;
            assert!(count <= arena.len());
        }

        assert_eq!(count, arena.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Arena = NodeArena<u32, (), u64>;

    fn link(list: &mut TimeList, arena: &mut Arena, key: u32, when: u64) -> EntryId {
        let id = arena.alloc(key, (), when);
        list.push_newest(arena, id);
        id
    }

    fn order(list: &TimeList, arena: &Arena) -> Vec<u32> {
        let mut keys = Vec::new();
        let mut current = list.oldest();
        while let Some(id) = current {
            let node = arena.node(id).expect("live node");
            keys.push(node.key);
            current = node.newer;
        }
        keys
    }

    #[test]
    fn push_newest_appends_at_tail() {
        let mut arena = Arena::new();
        let mut list = TimeList::new();
        link(&mut list, &mut arena, 1, 1);
        link(&mut list, &mut arena, 2, 2);
        link(&mut list, &mut arena, 3, 3);
        assert_eq!(order(&list, &arena), vec![1, 2, 3]);
        list.debug_validate_invariants(&arena);
    }

    #[test]
    fn unlink_middle_and_ends() {
        let mut arena = Arena::new();
        let mut list = TimeList::new();
        let a = link(&mut list, &mut arena, 1, 1);
        let b = link(&mut list, &mut arena, 2, 2);
        let c = link(&mut list, &mut arena, 3, 3);

        assert!(list.unlink(&mut arena, b));
        arena.release(b);
        assert_eq!(order(&list, &arena), vec![1, 3]);

        assert!(list.unlink(&mut arena, a));
        arena.release(a);
        assert_eq!(list.oldest(), Some(c));
        assert_eq!(list.newest(), Some(c));

        assert!(list.unlink(&mut arena, c));
        arena.release(c);
        assert!(list.oldest().is_none());
        assert!(list.newest().is_none());
        list.debug_validate_invariants(&arena);
    }

    #[test]
    fn unlink_dead_id_is_rejected() {
        let mut arena = Arena::new();
        let mut list = TimeList::new();
        assert!(!list.unlink(&mut arena, EntryId(0)));
    }

    #[test]
    fn move_to_newest_splices_in_place() {
        let mut arena = Arena::new();
        let mut list = TimeList::new();
        let a = link(&mut list, &mut arena, 1, 1);
        let _b = link(&mut list, &mut arena, 2, 2);
        let c = link(&mut list, &mut arena, 3, 3);

        assert!(list.move_to_newest(&mut arena, a));
        if let Some(node) = arena.node_mut(a) {
            node.when = 4;
        }
        assert_eq!(order(&list, &arena), vec![2, 3, 1]);

        // Moving the current newest is a no-op.
        assert!(list.move_to_newest(&mut arena, a));
        assert_eq!(order(&list, &arena), vec![2, 3, 1]);

        assert!(list.move_to_newest(&mut arena, c));
        if let Some(node) = arena.node_mut(c) {
            node.when = 5;
        }
        assert_eq!(order(&list, &arena), vec![2, 1, 3]);
        list.debug_validate_invariants(&arena);
    }

    #[test]
    fn clear_forgets_both_ends() {
        let mut arena = Arena::new();
        let mut list = TimeList::new();
        link(&mut list, &mut arena, 1, 1);
        link(&mut list, &mut arena, 2, 2);
        list.clear();
        arena.clear();
        assert!(list.oldest().is_none());
        assert!(list.newest().is_none());
        list.debug_validate_invariants(&arena);
    }
}
