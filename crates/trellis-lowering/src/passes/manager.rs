//! Pass manager
//!
//! Executes a pipeline against a module: module steps serially, function
//! steps fanned out across functions. Instrumentation (per-pass printing,
//! timing) only affects emitted artifacts and execution concurrency, never
//! transformation results.

use crate::dump::write_module_snapshot;
use crate::error::{LoweringError, Result};
use crate::pipeline::{Pipeline, PipelineStep};
use log::{debug, warn};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use trellis_core::ir::Module;

use super::FunctionPass;

/// Resolves the snapshot path for a pass name; `None` routes the snapshot
/// to the debug log instead of a file.
pub type PrintResolver = Box<dyn Fn(&str) -> Option<PathBuf> + Send + Sync>;

/// Executes lowering pipelines.
pub struct PassManager {
    multithreaded: bool,
    print_resolver: Option<PrintResolver>,
    timing: bool,
}

impl PassManager {
    pub fn new() -> Self {
        Self {
            multithreaded: true,
            print_resolver: None,
            timing: false,
        }
    }

    /// Force serial execution of per-function steps.
    pub fn disable_multithreading(&mut self) {
        self.multithreaded = false;
    }

    /// Print the whole module after each pass.
    ///
    /// Printing between passes cannot coexist with concurrent per-function
    /// execution, so this also forces serial execution.
    pub fn enable_ir_printing(&mut self, resolver: PrintResolver) {
        self.multithreaded = false;
        self.print_resolver = Some(resolver);
    }

    /// Collect per-pass wall times, reported after the run.
    pub fn enable_timing(&mut self) {
        self.timing = true;
    }

    /// Runs every step in order against `module`; stops at the first
    /// failure. The module is left in whatever state the failing pass
    /// produced.
    pub fn run(&self, pipeline: &Pipeline, module: &mut Module) -> Result<()> {
        let mut timings: Vec<(&'static str, Duration)> = Vec::new();
        let mut outcome = Ok(());

        for step in pipeline.steps() {
            let started = Instant::now();
            let step_outcome = self.run_step(step, module);
            if self.timing {
                timings.push((step.name(), started.elapsed()));
            }
            if let Some(resolver) = &self.print_resolver {
                print_after_pass(step.name(), resolver, module);
            }
            if let Err(error) = step_outcome {
                warn!("lowering pass '{}' failed: {error}", step.name());
                outcome = Err(error);
                break;
            }
        }

        if self.timing {
            report_timings(&timings);
        }
        outcome
    }

    fn run_step(&self, step: &PipelineStep, module: &mut Module) -> Result<()> {
        match step {
            PipelineStep::Module(pass) => pass.run(module),
            PipelineStep::Function(pass) => self.run_on_functions(pass.as_ref(), module),
        }
    }

    fn run_on_functions(&self, pass: &dyn FunctionPass, module: &mut Module) -> Result<()> {
        if !self.multithreaded || module.functions.len() < 2 {
            for func in &mut module.functions {
                pass.run(func)?;
            }
            return Ok(());
        }

        std::thread::scope(|scope| {
            let handles: Vec<_> = module
                .functions
                .iter_mut()
                .map(|func| scope.spawn(move || pass.run(func)))
                .collect();

            let mut first_error = None;
            for handle in handles {
                match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => {
                        if first_error.is_none() {
                            first_error = Some(error);
                        }
                    }
                    Err(_) => {
                        if first_error.is_none() {
                            first_error = Some(LoweringError::Internal(format!(
                                "function pass '{}' panicked",
                                pass.name()
                            )));
                        }
                    }
                }
            }
            match first_error {
                None => Ok(()),
                Some(error) => Err(error),
            }
        })
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

fn print_after_pass(pass_name: &str, resolver: &PrintResolver, module: &Module) {
    match resolver(pass_name) {
        Some(path) => {
            write_module_snapshot(&path, module, &format!("after pass {pass_name}"));
        }
        None => debug!("module after pass '{pass_name}':\n{module}"),
    }
}

fn report_timings(timings: &[(&'static str, Duration)]) {
    let total: Duration = timings.iter().map(|(_, elapsed)| *elapsed).sum();
    debug!(
        "lowering pass timings ({} passes, {total:?} total):",
        timings.len()
    );
    for (name, elapsed) in timings {
        debug!("  {name:<36} {elapsed:?}");
    }
}
