//! Parallel execution expansion

use crate::error::{LoweringError, Result};
use crate::passes::{graph_mut, FunctionPass};
use trellis_core::ir::{Function, Island, OpKind};

/// Expands each parallel-execute island into one island per branch.
///
/// Branches must be self-contained; their values are consumed through
/// fetches or by name. Branch islands inherit the control inputs of the
/// island they replace.
pub struct ParallelExecuteToIslands;

impl FunctionPass for ParallelExecuteToIslands {
    fn name(&self) -> &'static str {
        "parallel-execute-to-islands"
    }

    fn run(&self, func: &mut Function) -> Result<()> {
        let graph = graph_mut(func, self.name())?;
        let mut expanded: Vec<Island> = Vec::new();

        for mut island in std::mem::take(&mut graph.islands) {
            let is_parallel = island.ops.len() == 1
                && matches!(island.ops[0].kind, OpKind::ParallelExecute { .. });
            if !is_parallel {
                expanded.push(island);
                continue;
            }

            let op = island.ops.remove(0);
            let branches = match op.kind {
                OpKind::ParallelExecute { branches } => branches,
                _ => {
                    return Err(LoweringError::Internal(format!(
                        "island '{}' lost its parallel-execute op",
                        island.name
                    )))
                }
            };

            for (index, branch) in branches.into_iter().enumerate() {
                if branch.ops.is_empty() {
                    continue;
                }
                expanded.push(Island {
                    name: format!("{}/branch_{index}", island.name),
                    ops: branch.ops,
                    control_inputs: island.control_inputs.clone(),
                });
            }
        }
        graph.islands = expanded;
        Ok(())
    }
}
