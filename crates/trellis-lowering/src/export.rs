//! Exporter: functional form to graph-executor form
//!
//! Top-level entry point invoked by the compiler driver. Builds the fixed
//! lowering pipeline, wires up diagnostics, runs it against the module in
//! place and translates the result into the stable export error contract.
//! A failed run is never retried here.

use crate::diagnostics;
use crate::dump::{write_module_snapshot, DebugDumper, GROUP_MAIN};
use crate::error::ExportError;
use crate::flags::{GlobalPassOptions, LoweringFlags};
use crate::passes::PassManager;
use crate::pipeline::build_pipeline;
use log::debug;
use std::sync::Arc;
use trellis_core::ir::Module;

const TAG_BEFORE: &str = "functional_to_executor_before";
const TAG_AFTER: &str = "functional_to_executor_after";

/// Lowers modules into graph-executor form.
pub struct Exporter {
    flags: LoweringFlags,
    options: GlobalPassOptions,
    dumper: Arc<DebugDumper>,
}

impl Exporter {
    /// Exporter with environment-derived configuration and the process-wide
    /// dumper
    pub fn new() -> Self {
        Self {
            flags: LoweringFlags::from_env(),
            options: GlobalPassOptions::from_env(),
            dumper: DebugDumper::global(),
        }
    }

    /// Exporter with explicit flags
    pub fn with_flags(flags: LoweringFlags) -> Self {
        Self {
            flags,
            options: GlobalPassOptions::default(),
            dumper: DebugDumper::global(),
        }
    }

    /// Replace the dump policy, e.g. for tests
    pub fn with_dumper(mut self, dumper: Arc<DebugDumper>) -> Self {
        self.dumper = dumper;
        self
    }

    /// Replace the pass manager overlay
    pub fn with_options(mut self, options: GlobalPassOptions) -> Self {
        self.options = options;
        self
    }

    /// Lowers `module` in place from functional form into graph-executor
    /// form.
    ///
    /// `module_name` feeds diagnostics only. On failure the module is left
    /// in the state the failing pass produced; the "after" snapshot is
    /// still written, since the partially lowered module is the main clue
    /// to what went wrong.
    pub fn export(
        &self,
        module: &mut Module,
        module_name: &str,
    ) -> std::result::Result<(), ExportError> {
        let pipeline = build_pipeline(&self.flags);
        let mut pm = PassManager::new();
        if self.options.disable_multithreading {
            pm.disable_multithreading();
        }

        let dump_run = diagnostics::should_dump_run(&self.dumper, module_name);
        if dump_run {
            self.snapshot(module, module_name, TAG_BEFORE);
            diagnostics::maybe_enable_detailed_logging(&mut pm, module_name, &self.dumper);
        }

        let result = pm.run(&pipeline, module);

        if dump_run {
            self.snapshot(module, module_name, TAG_AFTER);
        }

        match result {
            Ok(()) => Ok(()),
            Err(_) => Err(ExportError::LoweringFailed),
        }
    }

    fn snapshot(&self, module: &Module, module_name: &str, tag: &str) {
        if self.dumper.should_dump(module_name, GROUP_MAIN) {
            let path = self.dumper.dump_filename(module_name, GROUP_MAIN, tag);
            write_module_snapshot(&path, module, tag);
        } else {
            // verbosity-triggered snapshot with no dump dir configured
            debug!("module snapshot '{tag}':\n{module}");
        }
    }
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowers `module` from functional form into graph-executor form in place,
/// with environment-derived configuration.
pub fn export(module: &mut Module, module_name: &str) -> std::result::Result<(), ExportError> {
    Exporter::new().export(module, module_name)
}
