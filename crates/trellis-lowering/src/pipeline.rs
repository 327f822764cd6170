//! Pipeline builder for graph-executor lowering
//!
//! Assembles the fixed, ordered list of passes into an immutable pipeline.
//! Flag-conditioned inclusion is evaluated once here, at build time; there
//! is no runtime branching inside individual passes.

use crate::flags::LoweringFlags;
use crate::passes::{
    ColocateSplits, ConvertControlToDataOutputs, DevicePropagation, FunctionPass,
    FunctionalToExecutor, LaunchToDeviceAttribute, ModulePass, ParallelExecuteToIslands,
    RegionControlFlowToFunctional, ReplicaIdToDeviceOrdinal, ReplicateToIslands,
    SplitIntoIslandPerOp, SymbolDce, UpdateControlDependencies, VerifyExportReady,
};

/// One step of a lowering pipeline, with its execution scope.
pub enum PipelineStep {
    /// Runs once over the whole module
    Module(Box<dyn ModulePass>),
    /// Runs on every function, possibly concurrently
    Function(Box<dyn FunctionPass>),
}

impl PipelineStep {
    /// The wrapped pass's name
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStep::Module(pass) => pass.name(),
            PipelineStep::Function(pass) => pass.name(),
        }
    }
}

/// An immutable, ordered sequence of lowering passes.
pub struct Pipeline {
    steps: Vec<PipelineStep>,
}

impl Pipeline {
    pub(crate) fn from_steps(steps: Vec<PipelineStep>) -> Self {
        Self { steps }
    }

    /// The steps in execution order
    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// The pass names in execution order
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(PipelineStep::name).collect()
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the pipeline has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Builds the graph-export lowering pipeline.
///
/// The order is load-bearing: later passes assume structural guarantees
/// established by earlier ones.
pub fn build_pipeline(flags: &LoweringFlags) -> Pipeline {
    let mut steps: Vec<PipelineStep> = Vec::new();

    steps.push(PipelineStep::Module(Box::new(
        RegionControlFlowToFunctional,
    )));

    // First, convert from functional form to executor form.
    steps.push(PipelineStep::Function(Box::new(FunctionalToExecutor)));

    // Split each function's single island into an island per op, as
    // expected by the passes that follow.
    steps.push(PipelineStep::Function(Box::new(SplitIntoIslandPerOp)));

    steps.push(PipelineStep::Function(Box::new(ReplicateToIslands)));
    steps.push(PipelineStep::Function(Box::new(ReplicaIdToDeviceOrdinal)));
    steps.push(PipelineStep::Function(Box::new(ParallelExecuteToIslands)));
    steps.push(PipelineStep::Function(Box::new(LaunchToDeviceAttribute)));

    // Encode the control deps implied by side effect analysis; reasons
    // over the per-op island graph, so it must follow the split.
    steps.push(PipelineStep::Module(Box::new(UpdateControlDependencies)));

    steps.push(PipelineStep::Function(Box::new(DevicePropagation)));
    steps.push(PipelineStep::Function(Box::new(ColocateSplits)));
    steps.push(PipelineStep::Module(Box::new(SymbolDce)));

    if flags.enable_control_to_data_outputs {
        steps.push(PipelineStep::Module(Box::new(ConvertControlToDataOutputs)));
    }

    steps.push(PipelineStep::Module(Box::new(VerifyExportReady)));

    Pipeline::from_steps(steps)
}
