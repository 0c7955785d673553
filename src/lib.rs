// Tue Jan 20 2026 - Alex
//
// Context-insensitive, unification-based pointer (data-structure) analysis
// for a minimal in-memory SSA IR. See SPEC_FULL.md for the full design.

pub mod calltarget;
pub mod config;
pub mod ds;
pub mod error;
pub mod ir;
pub mod report;
pub mod steensgaard;

pub use calltarget::{CallGraph, CallTargetFinder};
pub use config::Config;
pub use ds::{DsGraph, LocalDsa, NaiveLocalDsa};
pub use error::AnalysisError;
pub use ir::Module;
pub use steensgaard::{DriverMode, Steensgaard, SteensgaardResult};
