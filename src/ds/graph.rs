// Tue Jan 20 2026 - Alex
//
// One graph = node store + scalar map + call-site records + return/vararg
// maps, per SPEC_FULL.md §3.4.

use crate::ds::flags::NodeFlags;
use crate::ds::handle::{Handle, NodeId};
use crate::ds::node::GlobalRef;
use crate::ds::scalar_map::ScalarMap;
use crate::ds::store::NodeStore;
use crate::ir::{FunctionId, ValueId};
use indexmap::{IndexMap, IndexSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DsCallee {
    Direct(FunctionId),
    Indirect(Handle),
}

/// One resolved-or-unresolved call site record. See SPEC_FULL.md §3.4.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DsCallSite {
    pub caller: FunctionId,
    pub instr_index: usize,
    pub callee: DsCallee,
    pub return_handle: Option<Handle>,
    pub arg_handles: Vec<Handle>,
    pub vararg_handle: Option<Handle>,
}

impl DsCallSite {
    pub fn is_direct(&self) -> bool {
        matches!(self.callee, DsCallee::Direct(_))
    }
}

/// Index into a `DsGraph`'s call-site list — the stable identity a call
/// graph and a call-target report key off of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct CallSiteId(pub(crate) u32);

impl CallSiteId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CallSiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cs{}", self.0)
    }
}

/// Controls which parts of a graph `clone_into`/`merge_in_graph` carry
/// over. See SPEC_FULL.md §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct CloneFlags {
    pub clone_call_sites: bool,
    pub clone_aux_call_sites: bool,
    pub strip_alloca_bit: bool,
}

impl CloneFlags {
    pub fn dont_clone_call_nodes() -> Self {
        Self {
            clone_call_sites: false,
            clone_aux_call_sites: false,
            strip_alloca_bit: true,
        }
    }

    pub fn full() -> Self {
        Self {
            clone_call_sites: true,
            clone_aux_call_sites: true,
            strip_alloca_bit: false,
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DsGraph {
    pub(crate) nodes: NodeStore,
    pub(crate) scalars: ScalarMap,
    pub(crate) returns: IndexMap<FunctionId, Handle>,
    pub(crate) varargs: IndexMap<FunctionId, Handle>,
    pub(crate) call_sites: Vec<DsCallSite>,
    pub(crate) aux_call_sites: Vec<DsCallSite>,
    /// Per-graph bindings from a global (function or variable) to the node
    /// in *this* graph's own arena that represents its address. Distinct
    /// per-function graphs each allocate their own node for the same
    /// global; reconciling those into one equivalence class happens during
    /// `splice_from` (see module docs and DESIGN.md).
    pub(crate) globals: IndexMap<GlobalRef, Handle>,
}

impl DsGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &NodeStore {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut NodeStore {
        &mut self.nodes
    }

    pub fn scalar_map(&self) -> &ScalarMap {
        &self.scalars
    }

    pub fn call_sites(&self) -> &[DsCallSite] {
        &self.call_sites
    }

    pub fn call_sites_mut(&mut self) -> &mut [DsCallSite] {
        &mut self.call_sites
    }

    pub fn aux_call_sites(&self) -> &[DsCallSite] {
        &self.aux_call_sites
    }

    pub fn push_call_site(&mut self, cs: DsCallSite) -> CallSiteId {
        let id = CallSiteId(self.call_sites.len() as u32);
        self.call_sites.push(cs);
        id
    }

    pub fn call_site(&self, id: CallSiteId) -> &DsCallSite {
        &self.call_sites[id.index()]
    }

    pub fn call_site_ids(&self) -> impl Iterator<Item = CallSiteId> {
        (0..self.call_sites.len() as u32).map(CallSiteId)
    }

    pub fn get_node_for_value(&mut self, f: FunctionId, v: ValueId) -> Handle {
        self.scalars.get_or_create(&mut self.nodes, f, v)
    }

    pub fn lookup_value(&self, f: FunctionId, v: ValueId) -> Option<Handle> {
        self.scalars.get(f, v)
    }

    pub fn bind_value(&mut self, f: FunctionId, v: ValueId, h: Handle) {
        self.scalars.bind(f, v, h);
    }

    pub fn return_handle(&mut self, f: FunctionId) -> Handle {
        if let Some(h) = self.returns.get(&f) {
            return *h;
        }
        let n = self.nodes.alloc();
        let h = Handle::at_zero(n);
        self.returns.insert(f, h);
        h
    }

    pub fn lookup_return(&self, f: FunctionId) -> Option<Handle> {
        self.returns.get(&f).copied()
    }

    pub fn erase_return(&mut self, f: FunctionId) {
        self.returns.shift_remove(&f);
    }

    pub fn vararg_handle(&mut self, f: FunctionId) -> Handle {
        if let Some(h) = self.varargs.get(&f) {
            return *h;
        }
        let n = self.nodes.alloc();
        let h = Handle::at_zero(n);
        self.varargs.insert(f, h);
        h
    }

    pub fn lookup_vararg(&self, f: FunctionId) -> Option<Handle> {
        self.varargs.get(&f).copied()
    }

    /// Binds `global`'s address to a handle within this graph, creating a
    /// fresh node (flagged `GLOBAL`, and `GlobalRef` recorded in its
    /// globals list) on first reference.
    pub fn global_handle(&mut self, global: GlobalRef) -> Handle {
        if let Some(h) = self.globals.get(&global) {
            return *h;
        }
        let n = self.nodes.alloc();
        self.nodes.node_mut(n).add_global(global);
        let h = Handle::at_zero(n);
        self.globals.insert(global, h);
        h
    }

    pub fn merge(&mut self, a: Handle, b: Handle) -> Handle {
        self.nodes.merge(a, b)
    }

    pub fn normalize(&mut self, h: Handle) -> Handle {
        self.nodes.normalize(h)
    }

    /// Read-only normalization, for call sites (like the call-target
    /// finder) that only have a shared reference to the result graph.
    pub fn normalize_ref(&self, h: Handle) -> Handle {
        self.nodes.normalize_ref(h)
    }

    /// Every function whose address is bound somewhere in this graph's
    /// global map, i.e. every function that could possibly be an indirect
    /// call target.
    pub fn function_globals(&self) -> impl Iterator<Item = FunctionId> + '_ {
        self.globals.keys().filter_map(|g| g.as_function())
    }

    /// Moves every node and scalar-map entry from `other` into `self`
    /// without cloning, rebasing `NodeId`s into `self`'s arena. `other`
    /// must not be used afterward. Global bindings present in both graphs
    /// for the same `GlobalRef` are merged on the spot — this realizes the
    /// driver's "re-form global equivalence classes" step incrementally
    /// rather than as a deferred pass (see DESIGN.md).
    pub fn splice_from(&mut self, other: DsGraph) {
        let DsGraph {
            nodes: other_nodes,
            scalars: other_scalars,
            returns: other_returns,
            varargs: other_varargs,
            call_sites: other_call_sites,
            aux_call_sites: other_aux_call_sites,
            globals: other_globals,
        } = other;

        let base = self.nodes.len() as u32;
        self.nodes.append(other_nodes);
        let rebase = |h: Handle| Handle::new(NodeId(h.node.0 + base), h.offset);

        for (f, v, h) in other_scalars.iter() {
            self.scalars.bind(f, v, rebase(h));
        }
        for (f, h) in other_returns {
            self.returns.insert(f, rebase(h));
        }
        for (f, h) in other_varargs {
            self.varargs.insert(f, rebase(h));
        }
        for mut cs in other_call_sites {
            cs.callee = match cs.callee {
                DsCallee::Direct(f) => DsCallee::Direct(f),
                DsCallee::Indirect(h) => DsCallee::Indirect(rebase(h)),
            };
            cs.return_handle = cs.return_handle.map(rebase);
            cs.vararg_handle = cs.vararg_handle.map(rebase);
            cs.arg_handles = cs.arg_handles.into_iter().map(rebase).collect();
            self.call_sites.push(cs);
        }
        for mut cs in other_aux_call_sites {
            cs.callee = match cs.callee {
                DsCallee::Direct(f) => DsCallee::Direct(f),
                DsCallee::Indirect(h) => DsCallee::Indirect(rebase(h)),
            };
            cs.return_handle = cs.return_handle.map(rebase);
            cs.vararg_handle = cs.vararg_handle.map(rebase);
            cs.arg_handles = cs.arg_handles.into_iter().map(rebase).collect();
            self.aux_call_sites.push(cs);
        }
        for (g, h) in other_globals {
            let incoming = rebase(h);
            match self.globals.get(&g) {
                Some(&existing) => {
                    self.merge(existing, incoming);
                }
                None => {
                    self.globals.insert(g, incoming);
                }
            }
        }
    }

    /// Deep-copies `src`'s nodes and mappings into `self`, returning the
    /// mapping from each of `src`'s (then-current) representative nodes to
    /// its corresponding handle in `self`.
    pub fn clone_into(&mut self, src: &DsGraph, flags: CloneFlags) -> IndexMap<NodeId, Handle> {
        let mut src_nodes = src.nodes.clone();
        let mut mapping: IndexMap<NodeId, Handle> = IndexMap::new();

        for i in 0..src_nodes.len() {
            let id = NodeId(i as u32);
            let rep = src_nodes.normalize(Handle::at_zero(id));
            if rep.node != id {
                continue;
            }
            let node = src_nodes.node(id);
            let new_id = self.nodes.alloc_sized(node.size());
            let mut new_flags = node.flags();
            if flags.strip_alloca_bit {
                new_flags.remove(NodeFlags::ALLOCA);
            }
            self.nodes.node_mut(new_id).insert_flags(new_flags);
            for g in node.globals() {
                self.nodes.node_mut(new_id).add_global(*g);
            }
            for (o, tys) in node.type_record() {
                for ty in tys {
                    self.nodes
                        .node_mut(new_id)
                        .type_record
                        .entry(*o)
                        .or_insert_with(IndexSet::new)
                        .insert(ty.clone());
                }
            }
            mapping.insert(id, Handle::at_zero(new_id));
        }

        // Second pass: edges, now that every representative has a mapped id.
        for i in 0..src_nodes.len() {
            let id = NodeId(i as u32);
            let rep = src_nodes.normalize(Handle::at_zero(id));
            if rep.node != id {
                continue;
            }
            let dest_id = mapping[&id].node;
            let edges: Vec<(i64, Handle)> = src_nodes.node(id).edges().collect();
            for (o, target) in edges {
                let target_norm = src_nodes.normalize(target);
                let dest_target = mapping
                    .get(&target_norm.node)
                    .copied()
                    .unwrap_or_else(|| Handle::at_zero(self.nodes.alloc()));
                let dest_target = Handle::new(dest_target.node, dest_target.offset + target_norm.offset);
                self.nodes.node_mut(dest_id).edges.insert(o, dest_target);
            }
        }

        let resolve = |h: Handle| -> Handle {
            let norm = src_nodes.normalize(h);
            let base = mapping[&norm.node];
            Handle::new(base.node, base.offset + norm.offset)
        };

        if flags.clone_call_sites {
            for cs in &src.call_sites {
                let mut cs = cs.clone();
                cs.callee = match cs.callee {
                    DsCallee::Direct(f) => DsCallee::Direct(f),
                    DsCallee::Indirect(h) => DsCallee::Indirect(resolve(h)),
                };
                cs.return_handle = cs.return_handle.map(resolve);
                cs.vararg_handle = cs.vararg_handle.map(resolve);
                cs.arg_handles = cs.arg_handles.iter().map(|h| resolve(*h)).collect();
                self.call_sites.push(cs);
            }
        }
        if flags.clone_aux_call_sites {
            for cs in &src.aux_call_sites {
                let mut cs = cs.clone();
                cs.callee = match cs.callee {
                    DsCallee::Direct(f) => DsCallee::Direct(f),
                    DsCallee::Indirect(h) => DsCallee::Indirect(resolve(h)),
                };
                cs.return_handle = cs.return_handle.map(resolve);
                cs.vararg_handle = cs.vararg_handle.map(resolve);
                cs.arg_handles = cs.arg_handles.iter().map(|h| resolve(*h)).collect();
                self.aux_call_sites.push(cs);
            }
        }

        mapping
    }

    /// Clones `callee_graph`'s formals/return/vararg into `self` (unless
    /// `callee_graph` already *is* `self`, the common case once every
    /// local graph has been spliced into one result graph) and merges
    /// them with the call site's actuals. See SPEC_FULL.md §4.2.
    pub fn merge_in_graph(
        &mut self,
        call_return: Option<Handle>,
        call_vararg: Option<Handle>,
        call_args: &[Handle],
        callee_return: Option<Handle>,
        callee_vararg: Option<Handle>,
        callee_params: &[Handle],
    ) {
        if let (Some(cr), Some(fr)) = (call_return, callee_return) {
            self.merge(cr, fr);
        }
        if let (Some(cv), Some(fv)) = (call_vararg, callee_vararg) {
            self.merge(cv, fv);
        }

        let mut vararg_sink = call_vararg.or(callee_vararg);
        for (i, &param) in callee_params.iter().enumerate() {
            match call_args.get(i) {
                Some(&arg) => {
                    self.merge(arg, param);
                }
                None => {
                    if let Some(v) = vararg_sink {
                        vararg_sink = Some(self.merge(v, param));
                    }
                }
            }
        }
        if call_args.len() > callee_params.len() {
            if let Some(v) = vararg_sink {
                let mut sink = v;
                for &arg in &call_args[callee_params.len()..] {
                    sink = self.merge(sink, arg);
                }
                let _ = sink;
            }
        }
    }

    /// Drops nodes with no incoming references and none of
    /// `{Global, External, Incomplete, Modified, Read, Unknown}`, no
    /// globals, and an empty type record. See SPEC_FULL.md §4.2.
    pub fn remove_trivially_dead_nodes(&mut self) {
        let keep_flags = NodeFlags::GLOBAL
            | NodeFlags::EXTERNAL
            | NodeFlags::INCOMPLETE
            | NodeFlags::MODIFIED
            | NodeFlags::READ
            | NodeFlags::UNKNOWN;

        let refcount = self.compute_refcounts();
        for i in 0..self.nodes.len() {
            let id = NodeId(i as u32);
            if self.nodes.normalize_ref(Handle::at_zero(id)).node != id {
                continue;
            }
            let node = self.nodes.node(id);
            if refcount.get(i).copied().unwrap_or(0) == 0
                && !node.flags().intersects(keep_flags)
                && node.globals().next().is_none()
                && node.type_record().is_empty()
            {
                // Logically dead: fold to an empty, zero-size sentinel so
                // later reachability sweeps skip it without shifting ids.
                self.nodes.node_mut(id).size = 0;
                self.nodes.node_mut(id).edges.clear();
            }
        }
    }

    fn compute_refcounts(&self) -> Vec<u32> {
        let mut counts = vec![0u32; self.nodes.len()];
        let mut bump = |h: Handle| {
            let n = self.nodes.normalize_ref(h);
            counts[n.node.index()] += 1;
        };
        for (_, _, h) in self.scalars.iter() {
            bump(h);
        }
        for (_, &h) in self.returns.iter() {
            bump(h);
        }
        for (_, &h) in self.varargs.iter() {
            bump(h);
        }
        for (_, &h) in self.globals.iter() {
            bump(h);
        }
        for cs in self.call_sites.iter().chain(self.aux_call_sites.iter()) {
            if let DsCallee::Indirect(h) = cs.callee {
                bump(h);
            }
            if let Some(h) = cs.return_handle {
                bump(h);
            }
            if let Some(h) = cs.vararg_handle {
                bump(h);
            }
            for &h in &cs.arg_handles {
                bump(h);
            }
        }
        for i in 0..self.nodes.len() {
            let id = NodeId(i as u32);
            if self.nodes.normalize_ref(Handle::at_zero(id)).node != id {
                continue;
            }
            for (_, h) in self.nodes.node(id).edges() {
                bump(h);
            }
        }
        counts
    }

    /// Reachability sweep from the scalar map, return/vararg maps, call
    /// sites, and (if `keep_unreachable_globals`) every global binding.
    pub fn remove_dead_nodes(&mut self, keep_unreachable_globals: bool) {
        let mut root_handles: Vec<Handle> = Vec::new();
        root_handles.extend(self.scalars.iter().map(|(_, _, h)| h));
        root_handles.extend(self.returns.values().copied());
        root_handles.extend(self.varargs.values().copied());
        for cs in self.call_sites.iter().chain(self.aux_call_sites.iter()) {
            if let DsCallee::Indirect(h) = cs.callee {
                root_handles.push(h);
            }
            root_handles.extend(cs.return_handle);
            root_handles.extend(cs.vararg_handle);
            root_handles.extend(cs.arg_handles.iter().copied());
        }
        if keep_unreachable_globals {
            root_handles.extend(self.globals.values().copied());
        }

        let mut reachable: IndexSet<NodeId> = IndexSet::new();
        let mut worklist: Vec<NodeId> = Vec::new();
        for h in root_handles {
            let n = self.nodes.normalize_ref(h).node;
            if reachable.insert(n) {
                worklist.push(n);
            }
        }
        while let Some(id) = worklist.pop() {
            let edges: Vec<(i64, Handle)> = self.nodes.node(id).edges().collect();
            for (_, h) in edges {
                let n = self.nodes.normalize_ref(h).node;
                if reachable.insert(n) {
                    worklist.push(n);
                }
            }
        }

        for i in 0..self.nodes.len() {
            let id = NodeId(i as u32);
            if self.nodes.normalize_ref(Handle::at_zero(id)).node != id {
                continue;
            }
            if !reachable.contains(&id) {
                self.nodes.node_mut(id).size = 0;
                self.nodes.node_mut(id).edges.clear();
            }
        }
    }

    /// Traverses from `seeds` and sets `Incomplete` transitively through
    /// edges. See SPEC_FULL.md §4.2.
    pub fn mark_incomplete_nodes(&mut self, seeds: impl IntoIterator<Item = Handle>) {
        let mut worklist: Vec<NodeId> = Vec::new();
        for h in seeds {
            let id = self.normalize(h).node;
            self.nodes.node_mut(id).insert_flags(NodeFlags::INCOMPLETE);
            worklist.push(id);
        }
        while let Some(id) = worklist.pop() {
            let edges: Vec<(i64, Handle)> = self.nodes.node(id).edges().collect();
            for (_, h) in edges {
                let target = self.normalize(h).node;
                let already = self.nodes.node(target).flags().contains(NodeFlags::INCOMPLETE);
                if !already {
                    self.nodes.node_mut(target).insert_flags(NodeFlags::INCOMPLETE);
                    worklist.push(target);
                }
            }
        }
    }

    /// Propagates `External` from every node already flagged `External`
    /// through the edge graph, matching `mark_incomplete_nodes`'s shape.
    pub fn propagate_external(&mut self) {
        let mut worklist: Vec<NodeId> = (0..self.nodes.len())
            .map(|i| NodeId(i as u32))
            .filter(|&id| {
                self.nodes.normalize_ref(Handle::at_zero(id)).node == id
                    && self.nodes.node(id).flags().contains(NodeFlags::EXTERNAL)
            })
            .collect();
        while let Some(id) = worklist.pop() {
            let edges: Vec<(i64, Handle)> = self.nodes.node(id).edges().collect();
            for (_, h) in edges {
                let target = self.normalize(h).node;
                if !self.nodes.node(target).flags().contains(NodeFlags::EXTERNAL) {
                    self.nodes.node_mut(target).insert_flags(NodeFlags::EXTERNAL);
                    worklist.push(target);
                }
            }
        }
    }
}
