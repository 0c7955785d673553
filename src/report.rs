// Tue Jan 20 2026 - Alex
//
// Textual report format and the `-check-same-node` test-harness directive,
// per SPEC_FULL.md §6 and §8.1. Ecosystem-ordinary ambient tooling, not
// part of the core algorithm.

use crate::calltarget::CallTargetFinder;
use crate::ds::DsCallee;
use crate::ir::{Module, ValueId};
use crate::steensgaard::SteensgaardResult;
use std::fmt::Write as _;

/// Renders one line per call site, in call-site order, per SPEC_FULL.md §6:
/// `[* if incomplete] <instr-ptr> <caller-name> <instr-name> : <callee-name>*`
pub fn render_call_site_report(module: &Module, result: &SteensgaardResult, finder: &CallTargetFinder) -> String {
    let mut out = String::new();
    let graph = result.ds_graph();
    for cs_id in graph.call_site_ids() {
        let cs = graph.call_site(cs_id);
        let caller_name = &module.function(cs.caller).name;
        let instr_name = match cs.return_handle {
            Some(_) => format!("%call{}", cs.instr_index),
            None => "<void call>".to_string(),
        };
        let complete = finder.is_complete(cs_id);
        let marker = if complete { "" } else { "* " };

        let callee_names: Vec<&str> = match cs.callee {
            DsCallee::Direct(f) => vec![module.function(f).name.as_str()],
            DsCallee::Indirect(_) => finder
                .targets(cs_id)
                .iter()
                .map(|&f| module.function(f).name.as_str())
                .collect(),
        };

        let _ = write!(
            out,
            "{marker}i{} {caller_name} {instr_name} :",
            cs.instr_index,
        );
        for name in &callee_names {
            let _ = write!(out, " {name}");
        }
        out.push('\n');
    }
    out
}

/// One side of a `-check-same-node=A:x,B:y` directive: a function name and
/// the numeric `ValueId` index of one of its locals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    pub function: String,
    pub value: ValueId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSameNodeDirective {
    pub lhs: NodeRef,
    pub rhs: NodeRef,
}

impl CheckSameNodeDirective {
    /// Parses `-check-same-node=A:x,B:y` (the leading flag is optional —
    /// callers may also pass just `A:x,B:y`).
    pub fn parse(text: &str) -> Result<Self, String> {
        let body = text.strip_prefix("-check-same-node=").unwrap_or(text);
        let (lhs_str, rhs_str) = body
            .split_once(',')
            .ok_or_else(|| format!("malformed directive, expected 'A:x,B:y': {text}"))?;
        Ok(Self {
            lhs: Self::parse_ref(lhs_str)?,
            rhs: Self::parse_ref(rhs_str)?,
        })
    }

    fn parse_ref(s: &str) -> Result<NodeRef, String> {
        let (func, value) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("malformed node reference, expected 'Func:idx': {s}"))?;
        let idx: u32 = value
            .trim()
            .parse()
            .map_err(|_| format!("value index must be numeric: {value}"))?;
        Ok(NodeRef {
            function: func.trim().to_string(),
            value: ValueId(idx),
        })
    }
}

/// Evaluates a parsed directive against a converged result: true iff both
/// referenced locals normalize to the same node.
pub fn check_same_node(module: &Module, result: &SteensgaardResult, directive: &CheckSameNodeDirective) -> bool {
    let resolve = |r: &NodeRef| -> Option<crate::ds::Handle> {
        let fid = module.function_id_by_name(&r.function)?;
        result.ds_graph().lookup_value(fid, r.value)
    };
    match (resolve(&directive.lhs), resolve(&directive.rhs)) {
        (Some(a), Some(b)) => result.ds_graph().normalize_ref(a).node == result.ds_graph().normalize_ref(b).node,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ds::NaiveLocalDsa;
    use crate::ir::{FunctionBuilder, Linkage, Type};
    use crate::steensgaard::{DriverMode, Steensgaard};

    #[test]
    fn parses_check_same_node_directive() {
        let d = CheckSameNodeDirective::parse("-check-same-node=main:3,foo:1").unwrap();
        assert_eq!(d.lhs.function, "main");
        assert_eq!(d.lhs.value, ValueId(3));
        assert_eq!(d.rhs.function, "foo");
        assert_eq!(d.rhs.value, ValueId(1));
    }

    #[test]
    fn rejects_malformed_directive() {
        assert!(CheckSameNodeDirective::parse("garbage").is_err());
        assert!(CheckSameNodeDirective::parse("main:3,foo").is_err());
    }

    #[test]
    fn report_marks_direct_calls_complete() {
        let mut module = Module::new();
        let callee = FunctionBuilder::new("callee", Type::Void, Linkage::Internal).finish();
        let callee_id = module.add_function(callee);
        let mut main_b = FunctionBuilder::new("main", Type::Void, Linkage::Internal);
        main_b.call_direct(callee_id, vec![], None);
        main_b.ret(None);
        module.add_function(main_b.finish());

        let mut dsa = NaiveLocalDsa::new();
        let mut driver = Steensgaard::new(&mut dsa, DriverMode::standard());
        let result = driver.run_on_module(&module).expect("fixpoint converges");
        let finder =
            CallTargetFinder::build(&module, result.ds_graph(), result.call_graph());
        let report = render_call_site_report(&module, &result, &finder);
        assert!(report.contains("main"));
        assert!(report.contains("callee"));
        assert!(!report.starts_with('*'));
    }
}
