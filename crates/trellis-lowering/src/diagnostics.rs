//! Diagnostic instrumentation for lowering runs
//!
//! Two independent triggers feed two tiers of diagnostics: the log
//! verbosity level and the dump policy. The coarse tier snapshots the
//! module before and after a run; the detailed tier additionally prints
//! the module after every pass and collects timings. Instrumentation never
//! changes transformation results.

use crate::dump::{DebugDumper, GROUP_LOWERING_DETAIL, GROUP_MAIN};
use crate::passes::PassManager;
use log::LevelFilter;
use std::sync::Arc;

/// Whether before/after snapshots should be taken for this run.
pub fn should_dump_run(dumper: &DebugDumper, module_name: &str) -> bool {
    log::max_level() >= LevelFilter::Debug || dumper.should_dump(module_name, GROUP_MAIN)
}

/// Whether detailed per-pass instrumentation should be enabled.
pub fn should_log_detailed(dumper: &DebugDumper, module_name: &str) -> bool {
    log::max_level() >= LevelFilter::Trace
        || dumper.should_dump(module_name, GROUP_LOWERING_DETAIL)
}

/// Applies detailed instrumentation when its predicate fires; returns
/// whether it did.
pub fn maybe_enable_detailed_logging(
    pm: &mut PassManager,
    module_name: &str,
    dumper: &Arc<DebugDumper>,
) -> bool {
    if !should_log_detailed(dumper, module_name) {
        return false;
    }
    enable_detailed_logging(pm, module_name, dumper);
    true
}

/// Enables per-pass printing and timing on the manager.
///
/// Printing the whole module between passes cannot coexist with concurrent
/// per-function execution, so multithreading is disabled for the run.
pub fn enable_detailed_logging(
    pm: &mut PassManager,
    module_name: &str,
    dumper: &Arc<DebugDumper>,
) {
    pm.disable_multithreading();
    let dumper = Arc::clone(dumper);
    let module_name = module_name.to_string();
    pm.enable_ir_printing(Box::new(move |pass_name| {
        dumper
            .is_enabled()
            .then(|| dumper.dump_filename(&module_name, GROUP_LOWERING_DETAIL, pass_name))
    }));
    pm.enable_timing();
}
