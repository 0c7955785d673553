// Tue Jan 20 2026 - Alex

use crate::ds::flags::NodeFlags;
use crate::ds::handle::Handle;
use crate::ir::{FunctionId, GlobalId, Type};
use indexmap::{IndexMap, IndexSet};
use std::collections::BTreeMap;

/// Something whose address classified into a node: a function (a possible
/// indirect-call target) or a global variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum GlobalRef {
    Function(FunctionId),
    Variable(GlobalId),
}

impl GlobalRef {
    pub fn as_function(&self) -> Option<FunctionId> {
        match self {
            GlobalRef::Function(f) => Some(*f),
            GlobalRef::Variable(_) => None,
        }
    }
}

/// An equivalence class of memory objects. See SPEC_FULL.md §3.1.
///
/// A node is either live-and-authoritative (`forwarding == None`) or
/// forwarded (`forwarding == Some(_)`), in which case every other field is
/// logically stale and must not be read directly — always go through
/// `NodeStore::normalize` first.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DsNode {
    pub(crate) size: u64,
    pub(crate) type_record: BTreeMap<i64, IndexSet<Type>>,
    pub(crate) flags: NodeFlags,
    pub(crate) edges: IndexMap<i64, Handle>,
    pub(crate) globals: IndexSet<GlobalRef>,
    pub(crate) forwarding: Option<Handle>,
}

impl DsNode {
    pub fn empty() -> Self {
        Self {
            size: 0,
            type_record: BTreeMap::new(),
            flags: NodeFlags::empty(),
            edges: IndexMap::new(),
            globals: IndexSet::new(),
            forwarding: None,
        }
    }

    pub fn with_size(size: u64) -> Self {
        Self {
            size,
            ..Self::empty()
        }
    }

    pub fn is_forwarded(&self) -> bool {
        self.forwarding.is_some()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    pub fn is_folded(&self) -> bool {
        self.flags.contains(NodeFlags::FOLDED)
    }

    pub fn is_array(&self) -> bool {
        self.flags.contains(NodeFlags::ARRAY)
    }

    pub fn is_complete(&self) -> bool {
        self.flags.is_complete()
    }

    pub fn globals(&self) -> impl Iterator<Item = &GlobalRef> {
        self.globals.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = (i64, Handle)> + '_ {
        self.edges.iter().map(|(&o, &h)| (o, h))
    }

    pub fn edge(&self, offset: i64) -> Option<Handle> {
        self.edges.get(&offset).copied()
    }

    pub fn type_record(&self) -> &BTreeMap<i64, IndexSet<Type>> {
        &self.type_record
    }

    pub fn insert_flags(&mut self, flags: NodeFlags) {
        self.flags |= flags;
    }

    pub fn add_global(&mut self, g: GlobalRef) {
        self.globals.insert(g);
        if matches!(g, GlobalRef::Function(_) | GlobalRef::Variable(_)) {
            self.insert_flags(NodeFlags::GLOBAL);
        }
    }

    /// Normalizes the offset of a would-be access per §3.2: modulo `size`
    /// if `Array`, clamped into `[0, size)` otherwise, or always 0 if
    /// `Folded`.
    pub(crate) fn normalize_offset(&self, offset: i64) -> i64 {
        if self.flags.contains(NodeFlags::FOLDED) {
            return 0;
        }
        if self.size == 0 {
            return 0;
        }
        let size = self.size as i64;
        if self.flags.contains(NodeFlags::ARRAY) {
            ((offset % size) + size) % size
        } else {
            offset.clamp(0, size - 1)
        }
    }
}

impl Default for DsNode {
    fn default() -> Self {
        Self::empty()
    }
}
