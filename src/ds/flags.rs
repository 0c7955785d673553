// Tue Jan 20 2026 - Alex

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Flag bits carried on a DS-node. See SPEC_FULL.md §3.1.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct NodeFlags: u32 {
        /// Summary not yet closed under all information flow.
        const INCOMPLETE = 1 << 0;
        /// Reachable from, or escapes to, code outside the module.
        const EXTERNAL   = 1 << 1;
        /// At least one `alloca` classifies into this node.
        const ALLOCA     = 1 << 2;
        /// At least one heap allocation classifies into this node.
        const HEAP       = 1 << 3;
        /// At least one global variable classifies into this node.
        const GLOBAL     = 1 << 4;
        /// Points to a node whose identity could not be determined.
        const UNKNOWN    = 1 << 5;
        /// An integer was cast to a pointer into this node.
        const INT2PTR    = 1 << 6;
        /// A pointer into this node was cast to an integer.
        const PTR2INT    = 1 << 7;
        /// Internal structure has been collapsed to offset 0.
        const FOLDED     = 1 << 8;
        /// Written through at least once.
        const MODIFIED   = 1 << 9;
        /// Read through at least once.
        const READ       = 1 << 10;
        /// Treated as an indexable array rather than a fixed-offset record.
        const ARRAY      = 1 << 11;
    }
}

impl NodeFlags {
    pub fn is_complete(self) -> bool {
        !self.intersects(NodeFlags::INCOMPLETE | NodeFlags::EXTERNAL)
    }
}
