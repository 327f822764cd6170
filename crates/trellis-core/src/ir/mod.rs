//! Intermediate Representation (IR) for TRELLIS
//!
//! A module moves between two structural forms during compilation:
//! - **Functional form**: function bodies are flat operation lists ending in
//!   a `Return`, with structured operations carrying nested regions.
//! - **Graph-executor form**: function bodies are graphs of islands with
//!   explicit control edges and a fetch list.
//!
//! The lowering pipeline rewrites a module from the first form into the
//! second, in place.

pub mod attribute;
pub mod graph;
pub mod module;
pub mod operation;
mod printer;

pub use attribute::{AttrMap, AttrValue};
pub use graph::{Fetch, FetchKind, Graph, Island};
pub use module::{Function, FunctionBody, Module, Visibility};
pub use operation::{OpKind, Operation, Region};
