//! Graph-executor form
//!
//! In executor form a function body is a graph: an ordered list of islands,
//! each wrapping one or more operations, plus a fetch list naming the
//! graph's outputs. Control dependencies between islands are explicit.

use crate::ir::operation::Operation;
use serde::{Deserialize, Serialize};

/// Kind of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchKind {
    /// Fetches a produced value
    Data,
    /// Fetches only the completion of an island
    Control,
}

/// One graph output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fetch {
    /// Value name (data) or island name (control)
    pub value: String,

    /// Fetch kind
    pub kind: FetchKind,
}

impl Fetch {
    /// Create a data fetch
    pub fn data(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: FetchKind::Data,
        }
    }

    /// Create a control fetch
    pub fn control(island: impl Into<String>) -> Self {
        Self {
            value: island.into(),
            kind: FetchKind::Control,
        }
    }
}

/// A group of operations executed as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Island {
    /// Island name; unique within the graph
    pub name: String,

    /// Wrapped operations in execution order
    pub ops: Vec<Operation>,

    /// Names of islands that must complete before this one starts
    pub control_inputs: Vec<String>,
}

impl Island {
    /// Create an island with no control inputs
    pub fn new(name: impl Into<String>, ops: Vec<Operation>) -> Self {
        Self {
            name: name.into(),
            ops,
            control_inputs: Vec::new(),
        }
    }

    /// The wrapped operation, if the island wraps exactly one
    pub fn single_op(&self) -> Option<&Operation> {
        match self.ops.as_slice() {
            [op] => Some(op),
            _ => None,
        }
    }
}

/// A function body in graph-executor form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Graph {
    /// Islands in execution order
    pub islands: Vec<Island>,

    /// Graph outputs
    pub fetches: Vec<Fetch>,
}

impl Graph {
    /// Look up an island by name
    pub fn island(&self, name: &str) -> Option<&Island> {
        self.islands.iter().find(|island| island.name == name)
    }

    /// Whether any island operation produces `value`
    pub fn defines_value(&self, value: &str) -> bool {
        self.islands
            .iter()
            .any(|island| island.ops.iter().any(|op| op.name == value))
    }
}
