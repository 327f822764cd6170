//! Export-readiness acceptance gate

use crate::error::{LoweringError, Result};
use crate::passes::ModulePass;
use trellis_core::ir::Module;
use trellis_core::verify::verify_export_ready;

/// Asserts that the module is ready for graph export.
///
/// Pure verification: never mutates the module, so re-running it on a
/// module it accepted succeeds again.
pub struct VerifyExportReady;

impl ModulePass for VerifyExportReady {
    fn name(&self) -> &'static str {
        "verify-export-ready"
    }

    fn run(&self, module: &mut Module) -> Result<()> {
        let violations = verify_export_ready(module);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(LoweringError::NotExportReady(violations.join("; ")))
        }
    }
}
