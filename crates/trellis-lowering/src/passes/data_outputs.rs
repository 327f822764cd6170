//! Control fetch to data output conversion

use crate::error::{LoweringError, Result};
use crate::passes::ModulePass;
use std::collections::HashMap;
use trellis_core::ir::{FetchKind, FunctionBody, Module};

/// Rewrites control-only fetches into data fetches.
///
/// A control fetch names an island; the conversion fetches the island's
/// last produced value instead, so downstream consumers can anchor the
/// effect through an ordinary data edge.
pub struct ConvertControlToDataOutputs;

impl ModulePass for ConvertControlToDataOutputs {
    fn name(&self) -> &'static str {
        "convert-control-to-data-outputs"
    }

    fn run(&self, module: &mut Module) -> Result<()> {
        for func in &mut module.functions {
            let graph = match &mut func.body {
                FunctionBody::Graph(graph) => graph,
                FunctionBody::Ops(_) => {
                    return Err(LoweringError::MalformedInput(format!(
                        "function '{}' is not in graph-executor form",
                        func.name
                    )))
                }
            };

            let last_values: HashMap<String, String> = graph
                .islands
                .iter()
                .filter_map(|island| {
                    island
                        .ops
                        .last()
                        .map(|op| (island.name.clone(), op.name.clone()))
                })
                .collect();

            for fetch in &mut graph.fetches {
                if fetch.kind != FetchKind::Control {
                    continue;
                }
                let Some(value) = last_values.get(&fetch.value) else {
                    return Err(LoweringError::MalformedInput(format!(
                        "function '{}' control-fetches unknown island '{}'",
                        func.name, fetch.value
                    )));
                };
                fetch.value = value.clone();
                fetch.kind = FetchKind::Data;
            }
        }
        Ok(())
    }
}
