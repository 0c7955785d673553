// Tue Jan 20 2026 - Alex
//
// The node arena and its union-find merge algorithm — the heart of the
// analysis. See SPEC_FULL.md §4.1.

use crate::ds::flags::NodeFlags;
use crate::ds::handle::{Handle, NodeId};
use crate::ds::node::{DsNode, GlobalRef};
use indexmap::IndexSet;
use std::collections::VecDeque;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct NodeStore {
    nodes: Vec<DsNode>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn alloc(&mut self) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(DsNode::empty());
        id
    }

    pub fn alloc_sized(&mut self, size: u64) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(DsNode::with_size(size));
        id
    }

    /// Appends every node from `other` onto the end of this arena, as-is.
    /// Forwarding links and edges inside `other` are self-consistent
    /// relative offsets from `other`'s own base and remain valid, since
    /// every one of `other`'s node ids simply shifts by the same amount.
    /// Callers outside this arena (scalar maps, call sites, ...) must
    /// rebase their own handles by the returned base index.
    pub fn append(&mut self, other: NodeStore) {
        let base = self.nodes.len() as u32;
        for node in other.nodes {
            let mut node = node;
            if let Some(fwd) = node.forwarding.as_mut() {
                fwd.node = NodeId(fwd.node.0 + base);
            }
            for h in node.edges.values_mut() {
                h.node = NodeId(h.node.0 + base);
            }
            self.nodes.push(node);
        }
    }

    /// Representative node, assumed already normalized. Panics (a
    /// programming error, per SPEC_FULL.md §7) if given a forwarded id.
    pub fn node(&self, id: NodeId) -> &DsNode {
        let n = &self.nodes[id.index()];
        debug_assert!(!n.is_forwarded(), "node() called on a forwarded node id");
        n
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut DsNode {
        debug_assert!(
            !self.nodes[id.index()].is_forwarded(),
            "node_mut() called on a forwarded node id"
        );
        &mut self.nodes[id.index()]
    }

    /// Read-only chase-and-normalize: follows the forwarding chain,
    /// accumulating the recorded offset delta at each link, then clamps
    /// the final offset per the representative's size/Array/Folded state.
    /// Does not path-compress (see `normalize`).
    pub fn normalize_ref(&self, h: Handle) -> Handle {
        let mut cur = h;
        loop {
            let node = &self.nodes[cur.node.index()];
            match node.forwarding {
                None => break,
                Some(fwd) => {
                    cur = Handle::new(fwd.node, cur.offset + fwd.offset);
                }
            }
        }
        let rep = &self.nodes[cur.node.index()];
        Handle::new(cur.node, rep.normalize_offset(cur.offset))
    }

    /// Same as `normalize_ref` but path-compresses: rewrites `h`'s node's
    /// forwarding link directly to the representative when `h` was itself
    /// forwarded, so a repeated lookup of the same stale handle is O(1)
    /// next time (Tarjan-style union-find).
    pub fn normalize(&mut self, h: Handle) -> Handle {
        let norm = self.normalize_ref(h);
        if h.node != norm.node {
            let slot = &mut self.nodes[h.node.index()];
            if slot.forwarding.is_some() {
                slot.forwarding = Some(Handle::new(norm.node, norm.offset - h.offset));
            }
        }
        norm
    }

    /// Collapses a node's internal structure to a single edge at offset 0
    /// by merging all existing edges pairwise. Idempotent.
    pub fn fold_node_completely(&mut self, n: NodeId) {
        let rep = self.normalize(Handle::at_zero(n)).node;
        if self.nodes[rep.index()].is_folded() {
            return;
        }
        let node = &mut self.nodes[rep.index()];
        node.size = 0;
        node.type_record.clear();
        node.insert_flags(NodeFlags::FOLDED);
        let edges: Vec<Handle> = node.edges.values().copied().collect();
        node.edges.clear();

        if edges.is_empty() {
            return;
        }
        let mut acc = edges[0];
        for h in &edges[1..] {
            acc = self.merge(acc, *h);
        }
        let rep = self.normalize(Handle::at_zero(n)).node;
        let acc = self.normalize(acc);
        self.nodes[rep.index()].edges.insert(0, acc);
    }

    /// The central operation, used pervasively: unifies the equivalence
    /// classes of `h1` and `h2`. Total — never fails. Implemented
    /// iteratively (a worklist of pending sub-merges) rather than via the
    /// naive recursive formulation in SPEC_FULL.md §4.1 step 7, to avoid
    /// unbounded Rust call-stack growth on deeply nested structures; the
    /// observable result is identical.
    pub fn merge(&mut self, h1: Handle, h2: Handle) -> Handle {
        let mut worklist: VecDeque<(Handle, Handle)> = VecDeque::new();
        worklist.push_back((h1, h2));

        while let Some((a, b)) = worklist.pop_front() {
            let na = self.normalize(a);
            let nb = self.normalize(b);

            if na.node == nb.node {
                if na.offset != nb.offset {
                    self.fold_node_completely(na.node);
                }
                continue;
            }

            let (rep_id, other_id, rep_off, other_off) = self.pick_representative(na, nb);
            let delta = rep_off - other_off;

            self.grow_or_mark_array(rep_id, other_id, delta);
            self.union_flags_and_globals(rep_id, other_id);
            let type_conflict = self.union_type_record(rep_id, other_id, delta);

            let other_edges: Vec<(i64, Handle)> =
                self.nodes[other_id.index()].edges.iter().map(|(&o, &h)| (o, h)).collect();

            {
                let other = &mut self.nodes[other_id.index()];
                other.edges.clear();
                other.globals.clear();
                other.type_record.clear();
                other.forwarding = Some(Handle::new(rep_id, delta));
            }

            if type_conflict {
                self.fold_node_completely(rep_id);
            }

            for (o, h) in other_edges {
                let target_off = o + delta;
                let existing = self.nodes[rep_id.index()].edges.get(&target_off).copied();
                match existing {
                    Some(existing_h) => worklist.push_back((existing_h, h)),
                    None => {
                        let nh = self.normalize(h);
                        self.nodes[rep_id.index()].edges.insert(target_off, nh);
                    }
                }
            }
        }

        self.normalize(h1)
    }

    /// Larger size wins; ties go to whichever node was allocated first
    /// (the smaller `NodeId`), standing in for "first-seen".
    fn pick_representative(&self, a: Handle, b: Handle) -> (NodeId, NodeId, i64, i64) {
        let size_a = self.nodes[a.node.index()].size;
        let size_b = self.nodes[b.node.index()].size;
        let a_wins = size_a > size_b || (size_a == size_b && a.node.index() <= b.node.index());
        if a_wins {
            (a.node, b.node, a.offset, b.offset)
        } else {
            (b.node, a.node, b.offset, a.offset)
        }
    }

    fn grow_or_mark_array(&mut self, rep_id: NodeId, other_id: NodeId, delta: i64) {
        let other_size = self.nodes[other_id.index()].size;
        let rep_is_array = self.nodes[rep_id.index()].is_array();
        let other_is_array = self.nodes[other_id.index()].is_array();
        let needed = other_size as i64 + delta;
        let rep_size = self.nodes[rep_id.index()].size as i64;

        if rep_is_array || other_is_array {
            self.nodes[rep_id.index()].insert_flags(NodeFlags::ARRAY);
            return;
        }
        if needed > rep_size {
            self.nodes[rep_id.index()].size = needed.max(0) as u64;
        }
    }

    fn union_flags_and_globals(&mut self, rep_id: NodeId, other_id: NodeId) {
        let other_flags = self.nodes[other_id.index()].flags;
        self.nodes[rep_id.index()].insert_flags(other_flags);

        let other_globals: Vec<GlobalRef> = self.nodes[other_id.index()].globals.iter().copied().collect();
        for g in other_globals {
            self.nodes[rep_id.index()].globals.insert(g);
        }
    }

    /// Installs `other`'s type-record entries into `rep` at their shifted
    /// offsets; returns true if a genuine conflict (two different types
    /// claiming the same offset) was found, in which case the caller must
    /// fold `rep`.
    fn union_type_record(&mut self, rep_id: NodeId, other_id: NodeId, delta: i64) -> bool {
        let other_types: Vec<(i64, Vec<_>)> = self.nodes[other_id.index()]
            .type_record
            .iter()
            .map(|(&o, s)| (o, s.iter().cloned().collect()))
            .collect();

        let mut conflict = false;
        for (o, tys) in other_types {
            let shifted = o + delta;
            let rep = &mut self.nodes[rep_id.index()];
            let entry = rep.type_record.entry(shifted).or_insert_with(IndexSet::new);
            for ty in tys {
                if !entry.is_empty() && !entry.contains(&ty) {
                    conflict = true;
                }
                entry.insert(ty);
            }
        }
        conflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Type;

    fn leaf(store: &mut NodeStore) -> Handle {
        let id = store.alloc_sized(8);
        Handle::at_zero(id)
    }

    #[test]
    fn merge_unifies_two_fresh_nodes() {
        let mut store = NodeStore::new();
        let a = leaf(&mut store);
        let b = leaf(&mut store);
        let m = store.merge(a, b);
        assert_eq!(store.normalize(a).node, m.node);
        assert_eq!(store.normalize(b).node, m.node);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut store = NodeStore::new();
        let a = leaf(&mut store);
        let b = leaf(&mut store);
        let once = store.merge(a, b);
        let twice = store.merge(a, b);
        assert_eq!(once.node, twice.node);
    }

    #[test]
    fn merge_is_commutative_in_final_class() {
        let mut store1 = NodeStore::new();
        let a1 = leaf(&mut store1);
        let b1 = leaf(&mut store1);
        store1.merge(a1, b1);

        let mut store2 = NodeStore::new();
        let a2 = leaf(&mut store2);
        let b2 = leaf(&mut store2);
        store2.merge(b2, a2);

        assert_eq!(store1.normalize(a1).node, store1.normalize(b1).node);
        assert_eq!(store2.normalize(a2).node, store2.normalize(b2).node);
    }

    #[test]
    fn merge_at_different_offsets_folds() {
        let mut store = NodeStore::new();
        let id = store.alloc_sized(16);
        let h0 = Handle::new(id, 0);
        let h8 = Handle::new(id, 8);
        store.merge(h0, h8);
        let rep = store.normalize(h0);
        assert!(store.node(rep.node).is_folded());
    }

    #[test]
    fn normalization_is_idempotent() {
        let mut store = NodeStore::new();
        let a = leaf(&mut store);
        let b = leaf(&mut store);
        store.merge(a, b);
        let once = store.normalize(a);
        let twice = store.normalize(once);
        assert_eq!(once, twice);
    }

    #[test]
    fn associativity_of_union_is_order_independent() {
        let final_class = |order: [(usize, usize); 2]| {
            let mut store = NodeStore::new();
            let handles: Vec<Handle> = (0..3).map(|_| leaf(&mut store)).collect();
            for (i, j) in order {
                store.merge(handles[i], handles[j]);
            }
            let reps: Vec<NodeId> = handles.iter().map(|h| store.normalize(*h).node).collect();
            (reps[0] == reps[1]) && (reps[1] == reps[2])
        };

        assert!(final_class([(0, 1), (1, 2)]));
        assert!(final_class([(1, 2), (0, 1)]));
        assert!(final_class([(2, 0), (0, 1)]));
    }

    #[test]
    fn conflicting_types_at_same_offset_fold() {
        let mut store = NodeStore::new();
        let id = store.alloc_sized(8);
        store.node_mut(id).type_record.insert(0, {
            let mut s = IndexSet::new();
            s.insert(Type::Int(32));
            s
        });
        let other = store.alloc_sized(8);
        store.node_mut(other).type_record.insert(0, {
            let mut s = IndexSet::new();
            s.insert(Type::ptr(Type::Opaque));
            s
        });
        let m = store.merge(Handle::at_zero(id), Handle::at_zero(other));
        assert!(store.node(m.node).is_folded());
    }
}
