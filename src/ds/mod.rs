// Tue Jan 20 2026 - Alex
//
// The data-structure (points-to) graph representation: nodes, handles,
// flags, the union-find arena, and the per-function/per-global graphs built
// on top of it. See SPEC_FULL.md §3 and §4.1.

pub mod flags;
pub mod graph;
pub mod handle;
pub mod local;
pub mod node;
pub mod scalar_map;
pub mod store;

pub use flags::NodeFlags;
pub use graph::{CallSiteId, CloneFlags, DsCallSite, DsCallee, DsGraph};
pub use handle::{Handle, NodeId};
pub use local::{LocalDsa, NaiveLocalDsa};
pub use node::{DsNode, GlobalRef};
pub use scalar_map::ScalarMap;
pub use store::NodeStore;
