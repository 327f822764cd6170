//! TRELLIS Core - Core IR types for the TRELLIS graph compiler
//!
//! This crate provides the fundamental types shared across the TRELLIS
//! toolchain:
//! - The in-memory IR: modules, functions, operations, executor graphs
//! - Attribute values attached to IR entities
//! - A deterministic textual printer used for debug snapshots
//! - Structural export-readiness verification
//! - Error types

pub mod error;
pub mod ir;
pub mod verify;

// Re-export commonly used types
pub use error::CoreError;
pub use ir::{
    AttrMap, AttrValue, Fetch, FetchKind, Function, FunctionBody, Graph, Island, Module, OpKind,
    Operation, Region, Visibility,
};
