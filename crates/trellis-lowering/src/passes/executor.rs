//! Conversion into graph-executor form
//!
//! Two steps: wrap each function body into a graph with a single island,
//! then split that island into one island per operation. The split is what
//! gives the rest of the pipeline its per-operation granularity.

use crate::error::{LoweringError, Result};
use crate::passes::{graph_mut, FunctionPass};
use trellis_core::ir::{Fetch, Function, FunctionBody, Graph, Island, OpKind};

/// Converts a function from functional form into executor form.
///
/// All body operations move into a single island; the `Return` terminator's
/// operands become the graph's data fetches.
pub struct FunctionalToExecutor;

impl FunctionPass for FunctionalToExecutor {
    fn name(&self) -> &'static str {
        "functional-to-executor"
    }

    fn run(&self, func: &mut Function) -> Result<()> {
        let ops = match &mut func.body {
            FunctionBody::Ops(ops) => ops,
            FunctionBody::Graph(_) => {
                return Err(LoweringError::MalformedInput(format!(
                    "function '{}' is already in graph-executor form",
                    func.name
                )))
            }
        };
        let mut ops = std::mem::take(ops);

        let ret = match ops.pop() {
            Some(op) if matches!(op.kind, OpKind::Return) => op,
            _ => {
                return Err(LoweringError::MalformedInput(format!(
                    "function '{}' has no return terminator",
                    func.name
                )))
            }
        };
        if ops.iter().any(|op| matches!(op.kind, OpKind::Return)) {
            return Err(LoweringError::MalformedInput(format!(
                "function '{}' has a return terminator before the end of its body",
                func.name
            )));
        }

        let fetches: Vec<Fetch> = ret.operands.into_iter().map(Fetch::data).collect();
        let islands = if ops.is_empty() {
            Vec::new()
        } else {
            vec![Island::new(format!("{}_island", func.name), ops)]
        };
        func.body = FunctionBody::Graph(Graph { islands, fetches });
        Ok(())
    }
}

/// Splits every island into one island per wrapped operation.
///
/// Islands take the name of their operation; control inputs of a split
/// island are inherited by every piece.
pub struct SplitIntoIslandPerOp;

impl FunctionPass for SplitIntoIslandPerOp {
    fn name(&self) -> &'static str {
        "split-into-island-per-op"
    }

    fn run(&self, func: &mut Function) -> Result<()> {
        let graph = graph_mut(func, self.name())?;
        let islands = std::mem::take(&mut graph.islands);
        for island in islands {
            let control_inputs = island.control_inputs;
            for op in island.ops {
                graph.islands.push(Island {
                    name: op.name.clone(),
                    control_inputs: control_inputs.clone(),
                    ops: vec![op],
                });
            }
        }
        Ok(())
    }
}
