//! Lowering error types

use thiserror::Error;

/// Internal error raised by individual lowering passes.
///
/// Pass-level detail stays inside this crate: it reaches the log and dump
/// side channels, while the exporter collapses every cause into
/// [`ExportError::LoweringFailed`].
#[derive(Error, Debug)]
pub enum LoweringError {
    /// Input not in the representation form the pass expects
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Conflicting attributes discovered during a rewrite
    #[error("Attribute conflict: {0}")]
    AttributeConflict(String),

    /// The module failed the export-readiness gate
    #[error("Module is not export-ready: {0}")]
    NotExportReady(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for lowering passes
pub type Result<T> = std::result::Result<T, LoweringError>;

/// Error returned by the exporter entry points.
///
/// Deliberately a single fixed variant covering every cause: the
/// caller-facing contract stays small and stable, and root cause is
/// recoverable from logs and dump artifacts instead.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("failed to lower module from functional form to graph executor form")]
    LoweringFailed,
}
