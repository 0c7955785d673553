// Tue Jan 20 2026 - Alex

use crate::ds::handle::Handle;
use crate::ds::store::NodeStore;
use crate::ir::{FunctionId, ValueId};
use indexmap::IndexMap;

/// Index from IR values to handles, keyed by `(FunctionId, ValueId)` rather
/// than `ValueId` alone: a `ValueId` is only scoped to the function that
/// minted it (SPEC_FULL.md §3.2), and once per-function graphs are spliced
/// into one shared result graph, two functions' value #0 are unrelated
/// locals that must not collide in the same slot. Looking up an absent
/// value creates a fresh, empty node on demand and binds it — the map grows
/// monotonically, never shrinks. See SPEC_FULL.md §3.3.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ScalarMap {
    entries: IndexMap<(FunctionId, ValueId), Handle>,
}

impl ScalarMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&mut self, store: &mut NodeStore, f: FunctionId, v: ValueId) -> Handle {
        if let Some(h) = self.entries.get(&(f, v)) {
            return *h;
        }
        let node = store.alloc();
        let h = Handle::at_zero(node);
        self.entries.insert((f, v), h);
        h
    }

    pub fn get(&self, f: FunctionId, v: ValueId) -> Option<Handle> {
        self.entries.get(&(f, v)).copied()
    }

    pub fn bind(&mut self, f: FunctionId, v: ValueId, h: Handle) {
        self.entries.insert((f, v), h);
    }

    pub fn iter(&self) -> impl Iterator<Item = (FunctionId, ValueId, Handle)> + '_ {
        self.entries.iter().map(|(&(f, v), &h)| (f, v, h))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
