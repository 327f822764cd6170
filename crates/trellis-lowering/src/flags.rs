//! Lowering configuration
//!
//! Flags are read once into an immutable value and passed explicitly into
//! pipeline construction; passes never consult ambient process state.

use serde::{Deserialize, Serialize};

/// Feature flags consulted when the pipeline is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoweringFlags {
    /// Splice the control-to-data-outputs conversion pass into the pipeline
    pub enable_control_to_data_outputs: bool,
}

impl LoweringFlags {
    /// Flags with every optional pass disabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Read flags from the process environment
    pub fn from_env() -> Self {
        Self {
            enable_control_to_data_outputs: env_bool("TRELLIS_ENABLE_CONTROL_TO_DATA_OUTPUTS"),
        }
    }
}

/// Process-level pass manager overlay, applied to every run the exporter
/// starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalPassOptions {
    /// Force serial execution of per-function passes for all runs
    pub disable_multithreading: bool,
}

impl GlobalPassOptions {
    /// Read the overlay from the process environment
    pub fn from_env() -> Self {
        Self {
            disable_multithreading: env_bool("TRELLIS_LOWERING_DISABLE_MULTITHREADING"),
        }
    }
}

fn env_bool(key: &str) -> bool {
    matches!(
        std::env::var(key).ok().as_deref(),
        Some("1") | Some("true") | Some("on")
    )
}
