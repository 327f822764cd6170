//! TRELLIS Lowering - functional form to graph-executor form
//!
//! This crate lowers an IR module from functional/control-flow form into
//! graph-executor form, mutating the module in place. The work happens in a
//! fixed, ordered pass pipeline; the order is semantically load-bearing and
//! never changes at runtime except for one flag-gated optional pass.
//!
//! The top-level entry point is [`export`] (or [`Exporter`] for explicit
//! configuration). Diagnostic dumping and timing are best-effort side
//! channels that never change transformation results.

pub mod diagnostics;
pub mod dump;
pub mod error;
pub mod export;
pub mod flags;
pub mod passes;
pub mod pipeline;

// Re-export main types
pub use error::{ExportError, LoweringError, Result};
pub use export::{export, Exporter};
pub use flags::{GlobalPassOptions, LoweringFlags};
pub use passes::PassManager;
pub use pipeline::{build_pipeline, Pipeline, PipelineStep};
