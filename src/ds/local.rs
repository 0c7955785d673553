// Tue Jan 20 2026 - Alex
//
// The local (intraprocedural) pass boundary. A real local DSA pass walks a
// function's control-flow graph doing points-to-set-style abstract
// interpretation over its instructions; that is out of scope here (see
// SPEC_FULL.md §2.1). `NaiveLocalDsa` is a minimal, straight-line reference
// implementation: it treats `instructions` as already being in a single
// valid execution order and classifies each one directly, so the driver has
// something concrete to unify across call edges.

use crate::ds::flags::NodeFlags;
use crate::ds::graph::{DsCallSite, DsCallee, DsGraph};
use crate::ds::handle::Handle;
use crate::ds::node::GlobalRef;
use crate::ir::{Callee, CallSite, FunctionId, Instruction, Module, Type};

/// Capability set a driver needs from whatever produces per-function and
/// whole-module local graphs. Injected so the fixpoint driver in
/// `steensgaard` doesn't depend on a concrete local-pass implementation.
pub trait LocalDsa {
    /// Builds (or returns a cached) bottom-up local graph for `f`, seeded
    /// purely from `f`'s own instructions — no callee information folded
    /// in yet.
    fn get_ds_graph(&mut self, module: &Module, f: FunctionId) -> DsGraph;

    /// The shared graph every global variable and function address anchors
    /// into before any per-function graph is spliced in.
    fn get_globals_graph(&mut self, module: &Module) -> DsGraph;

    /// Whether `f` is a plausible callee for `site` — SPEC_FULL.md §6's
    /// ABI/type compatibility predicate. A local pass may also exclude
    /// functions it cannot model at all (e.g. those using unsupported
    /// intrinsics), independent of any one call site.
    fn function_is_callable(&self, module: &Module, site: &CallSite, f: FunctionId) -> bool;
}

/// Reference `LocalDsa`: walks a function's instructions in the order they
/// appear and classifies each one by its direct effect on the points-to
/// graph, per SPEC_FULL.md §4.1 step 0.
#[derive(Debug, Clone, Default)]
pub struct NaiveLocalDsa;

impl NaiveLocalDsa {
    pub fn new() -> Self {
        Self
    }

    fn build_globals_graph(&self, module: &Module) -> DsGraph {
        let mut g = DsGraph::new();
        for gid in module.global_ids() {
            let h = g.global_handle(GlobalRef::Variable(gid));
            g.nodes_mut().node_mut(h.node).insert_flags(NodeFlags::GLOBAL);
        }
        for fid in module.function_ids() {
            let h = g.global_handle(GlobalRef::Function(fid));
            g.nodes_mut().node_mut(h.node).insert_flags(NodeFlags::GLOBAL);
            if module.function(fid).is_declaration() {
                g.nodes_mut()
                    .node_mut(h.node)
                    .insert_flags(NodeFlags::EXTERNAL | NodeFlags::INCOMPLETE);
            }
        }
        g
    }

    fn build_local_graph(&self, module: &Module, fid: FunctionId) -> DsGraph {
        let mut g = DsGraph::new();
        let func = module.function(fid);

        for &p in &func.params {
            g.get_node_for_value(fid, p);
        }

        if func.is_declaration() {
            // No body to walk: the return and vararg sinks, and anything
            // reachable through them, must be treated as unknown/external.
            let ret = g.return_handle(fid);
            g.nodes_mut()
                .node_mut(ret.node)
                .insert_flags(NodeFlags::EXTERNAL | NodeFlags::INCOMPLETE | NodeFlags::UNKNOWN);
            for &p in &func.params {
                let h = g.get_node_for_value(fid, p);
                g.nodes_mut()
                    .node_mut(h.node)
                    .insert_flags(NodeFlags::EXTERNAL | NodeFlags::INCOMPLETE);
            }
            return g;
        }

        for (idx, instr) in func.instructions.iter().enumerate() {
            match instr {
                Instruction::Alloca { result } => {
                    let h = g.get_node_for_value(fid, *result);
                    g.nodes_mut().node_mut(h.node).insert_flags(NodeFlags::ALLOCA);
                }
                Instruction::Load { result, ptr } => {
                    let ptr_h = g.get_node_for_value(fid, *ptr);
                    g.nodes_mut().node_mut(ptr_h.node).insert_flags(NodeFlags::READ);
                    let ptr_rep = g.normalize(ptr_h).node;
                    let existing = g.nodes().node(ptr_rep).edge(0);
                    let loaded = match existing {
                        Some(h) => h,
                        None => {
                            let fresh = g.get_node_for_value(fid, *result);
                            g.nodes_mut().node_mut(ptr_rep).edges.insert(0, fresh);
                            fresh
                        }
                    };
                    let result_h = g.get_node_for_value(fid, *result);
                    g.merge(result_h, loaded);
                }
                Instruction::Store { ptr, value } => {
                    let ptr_h = g.get_node_for_value(fid, *ptr);
                    let value_h = g.get_node_for_value(fid, *value);
                    g.nodes_mut().node_mut(ptr_h.node).insert_flags(NodeFlags::MODIFIED);
                    let ptr_rep = g.normalize(ptr_h).node;
                    match g.nodes().node(ptr_rep).edge(0) {
                        Some(existing) => {
                            g.merge(existing, value_h);
                        }
                        None => {
                            let nv = g.normalize(value_h);
                            g.nodes_mut().node_mut(ptr_rep).edges.insert(0, nv);
                        }
                    }
                }
                Instruction::Gep { result, base, offset } => {
                    let base_h = g.get_node_for_value(fid, *base);
                    let result_h = Handle::new(base_h.node, base_h.offset + offset);
                    g.bind_value(fid, *result, result_h);
                }
                Instruction::GlobalAddr { result, global } => {
                    let h = g.global_handle(GlobalRef::Variable(*global));
                    g.bind_value(fid, *result, h);
                }
                Instruction::FunctionAddr { result, function } => {
                    let h = g.global_handle(GlobalRef::Function(*function));
                    g.bind_value(fid, *result, h);
                }
                Instruction::IntToPtr { result, value } => {
                    let v = g.get_node_for_value(fid, *value);
                    g.nodes_mut().node_mut(v.node).insert_flags(NodeFlags::PTR2INT);
                    let result_h = g.get_node_for_value(fid, *result);
                    g.nodes_mut()
                        .node_mut(result_h.node)
                        .insert_flags(NodeFlags::INT2PTR | NodeFlags::UNKNOWN | NodeFlags::INCOMPLETE);
                }
                Instruction::PtrToInt { result: _, value } => {
                    let v = g.get_node_for_value(fid, *value);
                    g.nodes_mut().node_mut(v.node).insert_flags(NodeFlags::PTR2INT);
                }
                Instruction::Select { result, a, b } => {
                    let a_h = g.get_node_for_value(fid, *a);
                    let b_h = g.get_node_for_value(fid, *b);
                    let m = g.merge(a_h, b_h);
                    g.bind_value(fid, *result, m);
                }
                Instruction::Call(cs) => {
                    let callee = match cs.callee {
                        Callee::Direct(f) => DsCallee::Direct(f),
                        Callee::Indirect(v) => DsCallee::Indirect(g.get_node_for_value(fid, v)),
                    };
                    let return_handle = cs.result.map(|r| g.get_node_for_value(fid, r));
                    let arg_handles = cs.args.iter().map(|&v| g.get_node_for_value(fid, v)).collect();
                    let vararg_handle = if cs.vararg_args.is_empty() {
                        None
                    } else {
                        let sink = g.get_node_for_value(fid, cs.vararg_args[0]);
                        let merged = cs.vararg_args[1..]
                            .iter()
                            .fold(sink, |acc, &v| g.merge(acc, g.get_node_for_value(fid, v)));
                        Some(merged)
                    };
                    g.push_call_site(DsCallSite {
                        caller: fid,
                        instr_index: idx,
                        callee,
                        return_handle,
                        arg_handles,
                        vararg_handle,
                    });
                }
                Instruction::Ret { value } => {
                    if let Some(v) = value {
                        let v_h = g.get_node_for_value(fid, *v);
                        let ret_h = g.return_handle(fid);
                        g.merge(ret_h, v_h);
                    }
                }
            }
        }
        g
    }
}

impl LocalDsa for NaiveLocalDsa {
    fn get_ds_graph(&mut self, module: &Module, f: FunctionId) -> DsGraph {
        self.build_local_graph(module, f)
    }

    fn get_globals_graph(&mut self, module: &Module) -> DsGraph {
        self.build_globals_graph(module)
    }

    fn function_is_callable(&self, module: &Module, site: &CallSite, f: FunctionId) -> bool {
        let sig = module.function(f).signature();

        let arity_ok = if site.vararg_args.is_empty() {
            site.args.len() == sig.params.len()
        } else {
            sig.is_vararg && site.args.len() + site.vararg_args.len() >= sig.params.len()
        };
        if !arity_ok {
            return false;
        }

        site.result.is_some() == !matches!(*sig.return_type, Type::Void)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBuilder, Linkage, Module, Type};

    fn build_store_load_module() -> (Module, FunctionId) {
        let mut m = Module::new();
        let mut b = FunctionBuilder::new("f", Type::Void, Linkage::Internal);
        let p = b.alloca();
        let v = b.alloca();
        b.store(p, v);
        let _loaded = b.load(p, Type::ptr(Type::Opaque));
        b.ret(None);
        let fid = m.add_function(b.finish());
        (m, fid)
    }

    #[test]
    fn store_then_load_aliases_stored_value() {
        let (module, fid) = build_store_load_module();
        let mut dsa = NaiveLocalDsa::new();
        let mut g = dsa.get_ds_graph(&module, fid);
        let func = module.function(fid);
        let alloca_p = func.params.get(0).copied();
        assert!(alloca_p.is_none());
        // values 0 and 1 are the two allocas in program order.
        let p_val = crate::ir::ValueId(0);
        let v_val = crate::ir::ValueId(1);
        let loaded_val = crate::ir::ValueId(2);
        let p_h = g.get_node_for_value(fid, p_val);
        let v_h = g.get_node_for_value(fid, v_val);
        let loaded_h = g.get_node_for_value(fid, loaded_val);
        assert_eq!(g.normalize(v_h).node, g.normalize(loaded_h).node);
        assert_ne!(g.normalize(p_h).node, g.normalize(v_h).node);
    }

    #[test]
    fn declaration_return_is_incomplete_and_external() {
        let mut m = Module::new();
        let b = FunctionBuilder::new("extern_fn", Type::ptr(Type::Opaque), Linkage::External);
        let fid = m.add_function(b.finish());
        let mut dsa = NaiveLocalDsa::new();
        let g = dsa.get_ds_graph(&m, fid);
        let ret = g.lookup_return(fid).expect("declared function gets a return sink");
        let flags = g.nodes().node(ret.node).flags();
        assert!(flags.contains(NodeFlags::EXTERNAL));
        assert!(flags.contains(NodeFlags::INCOMPLETE));
    }

    #[test]
    fn globals_graph_flags_declarations_external() {
        let mut m = Module::new();
        let b = FunctionBuilder::new("extern_fn", Type::Void, Linkage::External);
        m.add_function(b.finish());
        let mut dsa = NaiveLocalDsa::new();
        let g = dsa.get_globals_graph(&m);
        let fid = m.function_id_by_name("extern_fn").unwrap();
        let h = *g
            .globals
            .get(&GlobalRef::Function(fid))
            .expect("function address bound in globals graph");
        assert!(g.nodes().node(h.node).flags().contains(NodeFlags::EXTERNAL));
    }
}
