// Tue Jan 20 2026 - Alex
//
// A minimal in-memory SSA IR. Loading a real module from bitcode or a
// textual format is out of scope (SPEC_FULL.md §1) — this model exists so
// the core analysis has something concrete to operate on and so tests can
// build scenarios without a frontend.

pub mod builder;
pub mod function;
pub mod ids;
pub mod instruction;
pub mod module;
pub mod ty;

pub use builder::FunctionBuilder;
pub use function::{Function, Linkage};
pub use ids::{FunctionId, GlobalId, ValueId};
pub use instruction::{Callee, CallSite, Instruction};
pub use module::{GlobalVar, Module};
pub use ty::{FunctionType, Type};
