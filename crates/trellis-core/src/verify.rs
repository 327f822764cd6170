//! Structural export-readiness verification
//!
//! Standalone checks asserting that a module is in graph-executor form and
//! internally consistent. This is deliberately not a general IR verifier:
//! it covers exactly the guarantees the graph exporter relies on.

use crate::ir::attribute::ATTR_REPLICA_ID;
use crate::ir::graph::{FetchKind, Graph};
use crate::ir::module::{FunctionBody, Module};
use crate::ir::operation::OpKind;
use log::debug;
use std::collections::HashSet;

/// Checks that `module` is ready for graph export.
///
/// Returns every violation found; an empty list means the module is
/// export-ready. Never mutates the module, so the check is idempotent.
pub fn verify_export_ready(module: &Module) -> Vec<String> {
    let mut violations = Vec::new();

    for func in &module.functions {
        let graph = match &func.body {
            FunctionBody::Graph(graph) => graph,
            FunctionBody::Ops(_) => {
                violations.push(format!(
                    "function '{}' is still in functional form",
                    func.name
                ));
                continue;
            }
        };
        verify_graph(&func.name, func.params.as_slice(), graph, &mut violations);
    }

    for violation in &violations {
        debug!("export-readiness violation: {violation}");
    }
    violations
}

/// Whether `module` passes every export-readiness check.
pub fn is_export_ready(module: &Module) -> bool {
    verify_export_ready(module).is_empty()
}

fn verify_graph(func_name: &str, params: &[String], graph: &Graph, violations: &mut Vec<String>) {
    let mut island_names: HashSet<&str> = HashSet::new();
    for island in &graph.islands {
        if !island_names.insert(island.name.as_str()) {
            violations.push(format!(
                "function '{func_name}' has duplicate island '{}'",
                island.name
            ));
        }
    }

    for island in &graph.islands {
        for op in &island.ops {
            match &op.kind {
                OpKind::Generic { .. } | OpKind::Call { .. } => {}
                other => violations.push(format!(
                    "function '{func_name}' island '{}' still wraps a structured operation \
                     '{}' ({})",
                    island.name,
                    op.name,
                    kind_name(other)
                )),
            }
            if op.attrs.contains_key(ATTR_REPLICA_ID) {
                violations.push(format!(
                    "function '{func_name}' op '{}' still carries an unconverted replica id",
                    op.name
                ));
            }
        }
        for input in &island.control_inputs {
            if !island_names.contains(input.as_str()) {
                violations.push(format!(
                    "function '{func_name}' island '{}' has a control input to unknown \
                     island '{input}'",
                    island.name
                ));
            }
        }
    }

    for fetch in &graph.fetches {
        match fetch.kind {
            FetchKind::Data => {
                let defined =
                    graph.defines_value(&fetch.value) || params.contains(&fetch.value);
                if !defined {
                    violations.push(format!(
                        "function '{func_name}' fetches undefined value '{}'",
                        fetch.value
                    ));
                }
            }
            FetchKind::Control => {
                if !island_names.contains(fetch.value.as_str()) {
                    violations.push(format!(
                        "function '{func_name}' control-fetches unknown island '{}'",
                        fetch.value
                    ));
                }
            }
        }
    }
}

fn kind_name(kind: &OpKind) -> &'static str {
    match kind {
        OpKind::Generic { .. } => "generic",
        OpKind::Call { .. } => "call",
        OpKind::Return => "return",
        OpKind::IfRegion { .. } => "if_region",
        OpKind::WhileRegion { .. } => "while_region",
        OpKind::Replicate { .. } => "replicate",
        OpKind::ParallelExecute { .. } => "parallel_execute",
        OpKind::Launch { .. } => "launch",
    }
}
