// Tue Jan 20 2026 - Alex

use serde::{Deserialize, Serialize};

/// Tunable knobs the driver needs to behave like either of the two
/// historical variants this analysis unifies: one that threads an extra
/// "aux call site" bookkeeping list through merges (used by callers that
/// want speculative call resolution without polluting the primary call
/// graph) and one that doesn't.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverMode {
    /// Carry a second, parallel call-site list through clones/splices,
    /// populated the same way as the primary one but never consulted by
    /// `remove_dead_nodes`'s reachability roots.
    pub use_aux_calls: bool,
    /// Strip the `Alloca` flag when cloning a callee graph into a caller,
    /// so a callee's locals don't look caller-local after inlining their
    /// effects.
    pub strip_alloca_on_clone: bool,
    /// Run `DsGraph::propagate_external` after each bottom-up merge,
    /// rather than only at the very end.
    pub compute_external_flags: bool,
}

impl DriverMode {
    /// The common case: no aux bookkeeping, alloca bits stripped on
    /// clone, external flags computed incrementally.
    pub fn standard() -> Self {
        Self {
            use_aux_calls: false,
            strip_alloca_on_clone: true,
            compute_external_flags: true,
        }
    }

    /// The variant that keeps a speculative, parallel call-site list
    /// alongside the primary one.
    pub fn with_aux_calls() -> Self {
        Self {
            use_aux_calls: true,
            ..Self::standard()
        }
    }
}

impl Default for DriverMode {
    fn default() -> Self {
        Self::standard()
    }
}
