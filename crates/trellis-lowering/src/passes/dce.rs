//! Unreachable symbol elimination

use crate::error::Result;
use crate::passes::ModulePass;
use log::debug;
use std::collections::HashSet;
use trellis_core::ir::{AttrValue, Function, FunctionBody, Module, OpKind, Operation, Visibility};

/// Removes private functions unreachable from any public function.
///
/// Reachability follows call edges and symbol-reference attributes (the
/// branch functions of `functional_if`/`functional_while` ops).
pub struct SymbolDce;

impl ModulePass for SymbolDce {
    fn name(&self) -> &'static str {
        "symbol-dce"
    }

    fn run(&self, module: &mut Module) -> Result<()> {
        let mut reachable: HashSet<String> = module
            .functions
            .iter()
            .filter(|func| func.visibility == Visibility::Public)
            .map(|func| func.name.clone())
            .collect();
        let mut worklist: Vec<String> = reachable.iter().cloned().collect();

        while let Some(name) = worklist.pop() {
            let Some(func) = module.function(&name) else {
                continue;
            };
            for symbol in referenced_symbols(func) {
                if reachable.insert(symbol.clone()) {
                    worklist.push(symbol);
                }
            }
        }

        let before = module.functions.len();
        module.functions.retain(|func| reachable.contains(&func.name));
        let removed = before - module.functions.len();
        if removed > 0 {
            debug!("symbol-dce removed {removed} unreachable function(s)");
        }
        Ok(())
    }
}

fn referenced_symbols(func: &Function) -> Vec<String> {
    let mut symbols = Vec::new();
    match &func.body {
        FunctionBody::Ops(ops) => {
            for op in ops {
                collect_op(op, &mut symbols);
            }
        }
        FunctionBody::Graph(graph) => {
            for island in &graph.islands {
                for op in &island.ops {
                    collect_op(op, &mut symbols);
                }
            }
        }
    }
    symbols
}

fn collect_op(op: &Operation, out: &mut Vec<String>) {
    if let OpKind::Call { callee } = &op.kind {
        out.push(callee.clone());
    }
    for value in op.attrs.values() {
        if let AttrValue::SymbolRef(symbol) = value {
            out.push(symbol.clone());
        }
    }
    for region in op.regions() {
        for nested in &region.ops {
            collect_op(nested, out);
        }
    }
}
