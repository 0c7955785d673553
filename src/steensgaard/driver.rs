// Tue Jan 20 2026 - Alex
//
// The whole-module fixpoint driver. See SPEC_FULL.md §4.3.

use crate::ds::{CloneFlags, DsCallee, DsGraph, LocalDsa, NodeFlags};
use crate::error::AnalysisError;
use crate::ir::{FunctionId, Instruction, Module};
use crate::steensgaard::mode::DriverMode;
use indexmap::IndexMap;

/// The published result of a whole-module run: the unified points-to graph
/// plus the refined call graph built from it.
#[derive(Debug, Clone)]
pub struct SteensgaardResult {
    graph: DsGraph,
    call_graph: crate::calltarget::CallGraph,
    stats: RunStats,
}

impl SteensgaardResult {
    /// The shared result graph — every function's local graph has already
    /// been merged into this one.
    pub fn ds_graph(&self) -> &DsGraph {
        &self.graph
    }

    pub fn ds_graph_mut(&mut self) -> &mut DsGraph {
        &mut self.graph
    }

    pub fn call_graph(&self) -> &crate::calltarget::CallGraph {
        &self.call_graph
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }
}

/// Counters published alongside a run, useful for regression tests and
/// diagnostics without re-walking the graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStats {
    pub iterations: usize,
    pub direct_sites: usize,
    pub indirect_sites: usize,
    pub complete_indirect_sites: usize,
    pub complete_empty_sites: usize,
}

pub struct Steensgaard<'a, D: LocalDsa> {
    dsa: &'a mut D,
    mode: DriverMode,
    max_iterations: Option<usize>,
}

impl<'a, D: LocalDsa> Steensgaard<'a, D> {
    pub fn new(dsa: &'a mut D, mode: DriverMode) -> Self {
        Self { dsa, mode, max_iterations: None }
    }

    /// Caps the fixpoint loop (SPEC_FULL.md §4.3, §9): once `run_on_module`
    /// would need more than `max` iterations to converge, it returns
    /// `AnalysisError::ConfigError` instead of looping further. `None` (the
    /// default) keeps the uncapped behavior, guarded only by the
    /// termination `debug_assert!`.
    pub fn with_max_iterations(mut self, max: Option<usize>) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn run_on_module(&mut self, module: &Module) -> Result<SteensgaardResult, AnalysisError> {
        // Step 1: anchor to a freshly-cloned globals graph.
        let globals_graph = self.dsa.get_globals_graph(module);
        let mut result = DsGraph::new();
        result.clone_into(&globals_graph, CloneFlags::full());

        // Step 2: splice in every defined function's local graph — anything
        // with a body, whether or not it's also externally visible (e.g.
        // an exported `main`).
        for fid in module.function_ids() {
            let func = module.function(fid);
            if func.is_declaration() {
                continue;
            }
            let local = self.dsa.get_ds_graph(module, fid);
            result.splice_from(local);
        }

        // Step 3: trivial dead-node cleanup, then an initial incompleteness
        // pass seeded from externally-visible functions' formals, plus
        // arguments/returns flowing across a direct call to a declaration
        // (SPEC_FULL.md §8 scenario 5).
        result.remove_trivially_dead_nodes();
        self.mark_initial_incomplete(module, &mut result);
        self.mark_declaration_call_edges_incomplete(module, &mut result);

        // Step 4: fixpoint over call-site resolution.
        let mut iterations = 0usize;
        let mut prev_candidate_sizes: IndexMap<usize, usize> = IndexMap::new();
        loop {
            iterations += 1;
            if let Some(max) = self.max_iterations {
                if iterations > max {
                    return Err(AnalysisError::ConfigError(format!(
                        "fixpoint did not converge within the configured max_iterations ({max})"
                    )));
                }
            }

            let mut changed = false;
            let mut resolutions: Vec<(usize, Vec<FunctionId>)> = Vec::new();

            for (idx, cs) in result.call_sites().iter().enumerate() {
                let candidates = self.candidate_set(module, &result, cs);
                let prev_len = prev_candidate_sizes.get(&idx).copied().unwrap_or(0);
                if candidates.len() != prev_len {
                    changed = true;
                }
                prev_candidate_sizes.insert(idx, candidates.len());
                resolutions.push((idx, candidates));
            }

            for (idx, candidates) in resolutions {
                for callee_fid in candidates {
                    self.apply_call_resolution(module, &mut result, idx, callee_fid);
                }
            }

            if !changed {
                break;
            }
            debug_assert!(
                iterations <= module.function_count() + 1,
                "fixpoint should converge within functions.len() + 1 iterations"
            );
        }

        // Step 5: internal functions' returns are fully accounted for now.
        for fid in module.function_ids() {
            if !module.function(fid).is_declaration() {
                result.erase_return(fid);
            }
        }
        self.mark_initial_incomplete(module, &mut result);

        // Step 6: reconcile global equivalence classes (folded into
        // `splice_from`/`clone_into`'s merge-on-collision behavior; see
        // DESIGN.md for why no separate pass is needed here).

        // Step 7: derived flag propagation.
        if self.mode.compute_external_flags {
            result.propagate_external();
        }

        // Step 8: build the output call graph and compute its SCCs.
        let call_graph = self.build_call_graph(module, &result);

        // Step 9: final reachability sweep, keeping unreachable globals.
        result.remove_dead_nodes(true);

        let stats = self.compute_stats(module, &result, &call_graph, iterations);

        Ok(SteensgaardResult {
            graph: result,
            call_graph,
            stats,
        })
    }

    /// Flags the caller-side argument, return, and vararg handles of every
    /// direct call whose target is a declaration as `External`/`Incomplete`
    /// — the callee's body is unavailable, so whatever it does with those
    /// pointers is unmodeled (SPEC_FULL.md §8 scenario 5).
    fn mark_declaration_call_edges_incomplete(&self, module: &Module, result: &mut DsGraph) {
        let mut seeds: Vec<crate::ds::Handle> = Vec::new();
        for cs in result.call_sites() {
            if let DsCallee::Direct(f) = cs.callee {
                if module.function(f).is_declaration() {
                    seeds.extend(cs.arg_handles.iter().copied());
                    seeds.extend(cs.return_handle);
                    seeds.extend(cs.vararg_handle);
                }
            }
        }
        for &h in &seeds {
            let id = result.normalize(h).node;
            result.nodes_mut().node_mut(id).insert_flags(NodeFlags::EXTERNAL);
        }
        result.mark_incomplete_nodes(seeds);
    }

    fn mark_initial_incomplete(&self, module: &Module, result: &mut DsGraph) {
        let mut seeds = Vec::new();
        for fid in module.function_ids() {
            let func = module.function(fid);
            if func.is_externally_visible() {
                for &p in &func.params {
                    if let Some(h) = result.lookup_value(fid, p) {
                        seeds.push(h);
                    }
                }
            }
        }
        result.mark_incomplete_nodes(seeds);
    }

    fn candidate_set(&self, module: &Module, result: &DsGraph, cs: &crate::ds::DsCallSite) -> Vec<FunctionId> {
        match cs.callee {
            DsCallee::Direct(f) => {
                if module.function(f).is_declaration() {
                    Vec::new()
                } else {
                    vec![f]
                }
            }
            DsCallee::Indirect(h) => {
                let ir_site = match &module.function(cs.caller).instructions[cs.instr_index] {
                    Instruction::Call(site) => site,
                    _ => unreachable!("DsCallSite.instr_index must name a Call instruction"),
                };
                let node = result.normalize_ref(h).node;
                result
                    .nodes()
                    .node(node)
                    .globals()
                    .filter_map(|g| g.as_function())
                    .filter(|&f| !module.function(f).is_declaration())
                    .filter(|&f| self.dsa.function_is_callable(module, ir_site, f))
                    .collect()
            }
        }
    }

    fn apply_call_resolution(
        &mut self,
        module: &Module,
        result: &mut DsGraph,
        cs_idx: usize,
        callee_fid: FunctionId,
    ) {
        let cs = result.call_sites()[cs_idx].clone();
        let callee_return = result.lookup_return(callee_fid);
        let callee_vararg = result.lookup_vararg(callee_fid);
        let callee_params: Vec<_> = module
            .function(callee_fid)
            .params
            .iter()
            .map(|&p| result.get_node_for_value(callee_fid, p))
            .collect();

        result.merge_in_graph(
            cs.return_handle,
            cs.vararg_handle,
            &cs.arg_handles,
            callee_return,
            callee_vararg,
            &callee_params,
        );
    }

    fn build_call_graph(&self, module: &Module, result: &DsGraph) -> crate::calltarget::CallGraph {
        let mut cg = crate::calltarget::CallGraph::new();
        for fid in module.function_ids() {
            if !module.function(fid).is_declaration() {
                cg.touch(fid);
            }
        }
        for cs in result.call_sites() {
            match cs.callee {
                DsCallee::Direct(f) => {
                    if !module.function(f).is_declaration() {
                        cg.add_edge(cs.caller, f);
                    }
                }
                DsCallee::Indirect(h) => {
                    let node = result.normalize_ref(h).node;
                    for g in result.nodes().node(node).globals() {
                        if let Some(f) = g.as_function() {
                            if !module.function(f).is_declaration() {
                                cg.add_edge(cs.caller, f);
                            }
                        }
                    }
                }
            }
        }
        cg
    }

    fn compute_stats(
        &self,
        module: &Module,
        result: &DsGraph,
        call_graph: &crate::calltarget::CallGraph,
        iterations: usize,
    ) -> RunStats {
        let mut stats = RunStats {
            iterations,
            ..RunStats::default()
        };
        let finder = crate::calltarget::CallTargetFinder::build(module, result, call_graph);
        for cs_id in result.call_site_ids() {
            let cs = result.call_site(cs_id);
            match cs.callee {
                DsCallee::Direct(_) => stats.direct_sites += 1,
                DsCallee::Indirect(_) => {
                    stats.indirect_sites += 1;
                    if finder.is_complete(cs_id) {
                        if finder.targets(cs_id).is_empty() {
                            stats.complete_empty_sites += 1;
                        } else {
                            stats.complete_indirect_sites += 1;
                        }
                    }
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ds::NaiveLocalDsa;
    use crate::ir::{FunctionBuilder, Linkage, Type};

    fn same_node(result: &DsGraph, f: FunctionId, a: crate::ir::ValueId, b: crate::ir::ValueId) -> bool {
        same_node_cross(result, f, a, f, b)
    }

    /// Like `same_node`, but the two values may belong to different
    /// functions — needed for cross-function predicates like
    /// `same_node(main:mval, foo:fval)`.
    fn same_node_cross(
        result: &DsGraph,
        fa: FunctionId,
        a: crate::ir::ValueId,
        fb: FunctionId,
        b: crate::ir::ValueId,
    ) -> bool {
        let a_h = result.lookup_value(fa, a).expect("value bound");
        let b_h = result.lookup_value(fb, b).expect("value bound");
        result.normalize_ref(a_h).node == result.normalize_ref(b_h).node
    }

    /// fp: `main` takes the address of `foo`, stores it through a local,
    /// loads it back, and calls it indirectly. Expect the single candidate
    /// to be `foo`, and the call site to resolve complete.
    #[test]
    fn fp_resolves_single_function_pointer() {
        let mut module = Module::new();

        let mut foo_b = FunctionBuilder::new("foo", Type::Int(32), Linkage::Internal);
        let fp = foo_b.param(Type::Int(32));
        foo_b.ret(Some(fp));
        let foo_id = module.add_function(foo_b.finish());

        let mut main_b = FunctionBuilder::new("main", Type::Int(32), Linkage::ExportedDefinition);
        let slot = main_b.alloca();
        let faddr = main_b.function_addr(foo_id, Type::ptr(Type::Opaque));
        main_b.store(slot, faddr);
        let loaded = main_b.load(slot, Type::ptr(Type::Opaque));
        let arg = main_b.param(Type::Int(32));
        let _result = main_b.call_indirect(loaded, vec![arg], Some(Type::Int(32)));
        main_b.ret(None);
        module.add_function(main_b.finish());

        let mut dsa = NaiveLocalDsa::new();
        let mut driver = Steensgaard::new(&mut dsa, DriverMode::standard());
        let result = driver.run_on_module(&module).expect("fixpoint converges");

        let cg = result.call_graph();
        assert!(cg.callees(module.function_id_by_name("main").unwrap()).any(|f| f == foo_id));
    }

    /// A `Select`-shaped relative of fp2: two candidate functions flow into
    /// the same function-pointer slot, and both must appear as candidates.
    /// Distinct from `fp2_resolves_through_helper_indirection` below, which
    /// builds the literal fp2 IR from SPEC_FULL.md §8 item 2.
    #[test]
    fn select_based_indirect_call_resolves_both_branches() {
        let mut module = Module::new();

        let mut foo_b = FunctionBuilder::new("foo", Type::Int(32), Linkage::Internal);
        let p1 = foo_b.param(Type::Int(32));
        foo_b.ret(Some(p1));
        let foo_id = module.add_function(foo_b.finish());

        let mut bar_b = FunctionBuilder::new("bar", Type::Int(32), Linkage::Internal);
        let p2 = bar_b.param(Type::Int(32));
        bar_b.ret(Some(p2));
        let bar_id = module.add_function(bar_b.finish());

        let mut main_b = FunctionBuilder::new("main", Type::Int(32), Linkage::ExportedDefinition);
        let fa = main_b.function_addr(foo_id, Type::ptr(Type::Opaque));
        let fb = main_b.function_addr(bar_id, Type::ptr(Type::Opaque));
        let mval2 = main_b.select(fa, fb, Type::ptr(Type::Opaque));
        let arg = main_b.param(Type::Int(32));
        let _r = main_b.call_indirect(mval2, vec![arg], Some(Type::Int(32)));
        main_b.ret(None);
        module.add_function(main_b.finish());

        let mut dsa = NaiveLocalDsa::new();
        let mut driver = Steensgaard::new(&mut dsa, DriverMode::standard());
        let result = driver.run_on_module(&module).expect("fixpoint converges");

        let main_id = module.function_id_by_name("main").unwrap();
        let callees: Vec<_> = result.call_graph().callees(main_id).collect();
        assert!(callees.contains(&foo_id));
        assert!(callees.contains(&bar_id));
    }

    /// fp2 (SPEC_FULL.md §8 item 2, literal): `main` allocates `%mval` and
    /// calls helper `call(@foo, %mval)`, which invokes its function-pointer
    /// parameter. Expects `same_node(main:mval, foo:fval)`,
    /// `same_node(main:mval2, main:mval)`, `same_node(call:cval, main:mval)`.
    #[test]
    fn fp2_resolves_through_helper_indirection() {
        let mut module = Module::new();

        let mut foo_b = FunctionBuilder::new("foo", Type::ptr(Type::Opaque), Linkage::Internal);
        let fval = foo_b.param(Type::ptr(Type::Opaque));
        foo_b.ret(Some(fval));
        let foo_id = module.add_function(foo_b.finish());

        let mut call_b = FunctionBuilder::new("call", Type::ptr(Type::Opaque), Linkage::Internal);
        let fptr_param = call_b.param(Type::ptr(Type::Opaque));
        let cval = call_b.param(Type::ptr(Type::Opaque));
        let result_v = call_b.call_indirect(fptr_param, vec![cval], Some(Type::ptr(Type::Opaque)));
        call_b.ret(result_v);
        let call_id = module.add_function(call_b.finish());

        let mut main_b = FunctionBuilder::new("main", Type::ptr(Type::Opaque), Linkage::ExportedDefinition);
        let mval = main_b.alloca();
        let foo_addr = main_b.function_addr(foo_id, Type::ptr(Type::Opaque));
        let mval2 = main_b.call_direct(call_id, vec![foo_addr, mval], Some(Type::ptr(Type::Opaque)));
        main_b.ret(None);
        module.add_function(main_b.finish());

        let mut dsa = NaiveLocalDsa::new();
        let mut driver = Steensgaard::new(&mut dsa, DriverMode::standard());
        let result = driver.run_on_module(&module).expect("fixpoint converges");

        let main_id = module.function_id_by_name("main").unwrap();
        let graph = result.ds_graph();

        assert!(same_node_cross(graph, main_id, mval, foo_id, fval));
        assert!(same_node(graph, main_id, mval2.expect("call has a result"), mval));
        assert!(same_node_cross(graph, call_id, cval, main_id, mval));
    }

    /// fp3 (SPEC_FULL.md §8 item 3): adds a second-order indirect
    /// `@woof(@call, %mval2)`, where `@call` (fp2's helper) is itself
    /// passed as `woof`'s function-pointer argument and, inside `woof`, is
    /// invoked with `@bar` as its own function-pointer argument. Expects
    /// every fp2 predicate plus `same_node(main:mval2, bar:bval)` — the
    /// fixpoint must discover `@bar` as a callee of the *original* indirect
    /// call inside `call`, reached only transitively through `woof`.
    #[test]
    fn fp3_discovers_transitively_indirect_callee() {
        let mut module = Module::new();

        let mut foo_b = FunctionBuilder::new("foo", Type::ptr(Type::Opaque), Linkage::Internal);
        let fval = foo_b.param(Type::ptr(Type::Opaque));
        foo_b.ret(Some(fval));
        let foo_id = module.add_function(foo_b.finish());

        let mut bar_b = FunctionBuilder::new("bar", Type::ptr(Type::Opaque), Linkage::Internal);
        let bval = bar_b.param(Type::ptr(Type::Opaque));
        bar_b.ret(Some(bval));
        let bar_id = module.add_function(bar_b.finish());

        let mut call_b = FunctionBuilder::new("call", Type::ptr(Type::Opaque), Linkage::Internal);
        let fptr_param = call_b.param(Type::ptr(Type::Opaque));
        let cval = call_b.param(Type::ptr(Type::Opaque));
        let call_result = call_b.call_indirect(fptr_param, vec![cval], Some(Type::ptr(Type::Opaque)));
        call_b.ret(call_result);
        let call_id = module.add_function(call_b.finish());

        let mut woof_b = FunctionBuilder::new("woof", Type::ptr(Type::Opaque), Linkage::Internal);
        let fptr2_param = woof_b.param(Type::ptr(Type::Opaque));
        let wval = woof_b.param(Type::ptr(Type::Opaque));
        let bar_addr_in_woof = woof_b.function_addr(bar_id, Type::ptr(Type::Opaque));
        let woof_result = woof_b.call_indirect(fptr2_param, vec![bar_addr_in_woof, wval], Some(Type::ptr(Type::Opaque)));
        woof_b.ret(woof_result);
        let woof_id = module.add_function(woof_b.finish());

        let mut main_b = FunctionBuilder::new("main", Type::ptr(Type::Opaque), Linkage::ExportedDefinition);
        let mval = main_b.alloca();
        let foo_addr = main_b.function_addr(foo_id, Type::ptr(Type::Opaque));
        let mval2 = main_b
            .call_direct(call_id, vec![foo_addr, mval], Some(Type::ptr(Type::Opaque)))
            .expect("call has a result");
        let call_addr = main_b.function_addr(call_id, Type::ptr(Type::Opaque));
        let _mval3 = main_b.call_direct(woof_id, vec![call_addr, mval2], Some(Type::ptr(Type::Opaque)));
        main_b.ret(None);
        module.add_function(main_b.finish());

        let mut dsa = NaiveLocalDsa::new();
        let mut driver = Steensgaard::new(&mut dsa, DriverMode::standard());
        let result = driver.run_on_module(&module).expect("fixpoint converges");

        let main_id = module.function_id_by_name("main").unwrap();
        let graph = result.ds_graph();

        assert!(same_node_cross(graph, main_id, mval, foo_id, fval));
        assert!(same_node(graph, main_id, mval2, mval));
        assert!(same_node_cross(graph, call_id, cval, main_id, mval));
        assert!(same_node_cross(graph, main_id, mval2, bar_id, bval));
    }

    /// direct recursion resolves cleanly and the call graph reports it as
    /// a (trivial) recursive group.
    #[test]
    fn direct_recursion_forms_a_call_graph_cycle() {
        let mut module = Module::new();
        let mut rec_b = FunctionBuilder::new("rec", Type::Int(32), Linkage::Internal);
        let p = rec_b.param(Type::Int(32));
        let self_id_placeholder = module.function_id_by_name("rec");
        assert!(self_id_placeholder.is_none());
        // Declare first so we can reference it for the direct self-call.
        let rec_id = module.add_function(FunctionBuilder::new("rec", Type::Int(32), Linkage::Internal).finish());
        let mut rec_b2 = FunctionBuilder::new("rec", Type::Int(32), Linkage::Internal);
        let p2 = rec_b2.param(Type::Int(32));
        let _c = rec_b2.call_direct(rec_id, vec![p2], Some(Type::Int(32)));
        rec_b2.ret(Some(p2));
        *module.function_mut(rec_id) = rec_b2.finish();
        let _ = (rec_b, p);

        let mut dsa = NaiveLocalDsa::new();
        let mut driver = Steensgaard::new(&mut dsa, DriverMode::standard());
        let result = driver.run_on_module(&module).expect("fixpoint converges");
        assert!(result.call_graph().is_recursive(rec_id));
    }

    /// A value passed as an argument to a direct call whose target is a bare
    /// declaration (SPEC_FULL.md §8 scenario 5) must come out `Incomplete`
    /// and `External`: the callee's body is unmodeled, so anything handed to
    /// it may alias state the analysis can never see.
    #[test]
    fn argument_to_external_declaration_is_incomplete_and_external() {
        let mut module = Module::new();
        let extern_id =
            module.add_function(FunctionBuilder::new("extern_fn", Type::Void, Linkage::External).finish());

        let mut main_b = FunctionBuilder::new("main", Type::Void, Linkage::ExportedDefinition);
        let x = main_b.alloca();
        main_b.call_direct(extern_id, vec![x], None);
        main_b.ret(None);
        module.add_function(main_b.finish());

        let mut dsa = NaiveLocalDsa::new();
        let mut driver = Steensgaard::new(&mut dsa, DriverMode::standard());
        let result = driver.run_on_module(&module).expect("fixpoint converges");

        let main_id = module.function_id_by_name("main").unwrap();
        let graph = result.ds_graph();
        let x_h = graph.lookup_value(main_id, x).expect("x bound");
        let flags = graph.nodes().node(graph.normalize_ref(x_h).node).flags();
        assert!(flags.contains(NodeFlags::INCOMPLETE));
        assert!(flags.contains(NodeFlags::EXTERNAL));
    }

    /// A `Complete` indirect call whose target node carries no function
    /// globals resolves to the complete-empty anomaly.
    #[test]
    fn complete_empty_indirect_call_has_no_candidates() {
        let mut module = Module::new();
        let mut main_b = FunctionBuilder::new("main", Type::Void, Linkage::Internal);
        let slot = main_b.alloca();
        let loaded = main_b.load(slot, Type::ptr(Type::Opaque));
        let _c = main_b.call_indirect(loaded, vec![], None);
        main_b.ret(None);
        module.add_function(main_b.finish());

        let mut dsa = NaiveLocalDsa::new();
        let mut driver = Steensgaard::new(&mut dsa, DriverMode::standard());
        let result = driver.run_on_module(&module).expect("fixpoint converges");
        assert_eq!(result.stats().complete_empty_sites, 1);
    }

    #[test]
    fn same_node_helper_distinguishes_unrelated_allocas() {
        let mut module = Module::new();
        let mut b = FunctionBuilder::new("f", Type::Void, Linkage::Internal);
        let a = b.alloca();
        let c = b.alloca();
        b.ret(None);
        module.add_function(b.finish());

        let mut dsa = NaiveLocalDsa::new();
        let fid = module.function_id_by_name("f").unwrap();
        let local = dsa.get_ds_graph(&module, fid);
        assert!(!same_node(&local, fid, a, c));
    }
}
