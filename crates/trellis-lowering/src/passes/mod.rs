//! Lowering passes
//!
//! Each pass is a stateless, named transformation or verification unit.
//! Passes are constructed fresh per pipeline build and owned solely by the
//! pipeline; they hold no state between runs.
//!
//! # Components
//!
//! - [`ModulePass`] / [`FunctionPass`]: the two pass scopes
//! - [`PassManager`]: executes a pipeline against a module

mod control_deps;
mod data_outputs;
mod dce;
mod device;
mod executor;
mod functional;
mod manager;
mod parallel;
mod replicate;
mod verify;

pub use control_deps::UpdateControlDependencies;
pub use data_outputs::ConvertControlToDataOutputs;
pub use dce::SymbolDce;
pub use device::{ColocateSplits, DevicePropagation, LaunchToDeviceAttribute};
pub use executor::{FunctionalToExecutor, SplitIntoIslandPerOp};
pub use functional::RegionControlFlowToFunctional;
pub use manager::PassManager;
pub use parallel::ParallelExecuteToIslands;
pub use replicate::{ReplicaIdToDeviceOrdinal, ReplicateToIslands};
pub use verify::VerifyExportReady;

use crate::error::{LoweringError, Result};
use trellis_core::ir::{Function, FunctionBody, Graph, Module};

/// A transformation or verification step over a whole module.
pub trait ModulePass {
    /// Pass name used in pipelines, logs and dump filenames.
    fn name(&self) -> &'static str;

    /// Run the pass on the module in place.
    fn run(&self, module: &mut Module) -> Result<()>;
}

/// A transformation step applied to each function independently.
///
/// Function passes may run concurrently across functions, so they must not
/// rely on shared mutable state.
pub trait FunctionPass: Send + Sync {
    /// Pass name used in pipelines, logs and dump filenames.
    fn name(&self) -> &'static str;

    /// Run the pass on one function in place.
    fn run(&self, func: &mut Function) -> Result<()>;
}

/// The function's graph body, or the error every graph-scoped pass reports
/// when it meets a function that has not been converted yet.
pub(crate) fn graph_mut<'a>(func: &'a mut Function, pass: &'static str) -> Result<&'a mut Graph> {
    match &mut func.body {
        FunctionBody::Graph(graph) => Ok(graph),
        FunctionBody::Ops(_) => Err(LoweringError::MalformedInput(format!(
            "pass '{pass}' requires function '{}' to be in graph-executor form",
            func.name
        ))),
    }
}
