//! IR operations
//!
//! Operations are the unit of computation in both representation forms.
//! Structured kinds carry nested regions and only exist in functional form;
//! the lowering pipeline eliminates all of them before export.

use crate::ir::attribute::{
    AttrMap, AttrValue, ATTR_DEVICE, ATTR_RESOURCE, ATTR_RESOURCE_ACCESS, ATTR_STATEFUL,
};
use serde::{Deserialize, Serialize};

/// A nested block of operations owned by a structured operation.
///
/// A region's result is the result of its last operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Region {
    /// Operations in execution order
    pub ops: Vec<Operation>,
}

impl Region {
    /// Create a region from its operations
    pub fn new(ops: Vec<Operation>) -> Self {
        Self { ops }
    }
}

/// The kind of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OpKind {
    /// A plain computation identified by its opcode
    Generic {
        /// Opcode name (e.g., "add", "split")
        opcode: String,
    },

    /// A call to a named function
    Call {
        /// Callee function name
        callee: String,
    },

    /// Function terminator; its operands are the returned values
    Return,

    /// Region-based conditional
    IfRegion {
        /// Region executed when the condition operand is true
        then_region: Region,
        /// Region executed otherwise
        else_region: Region,
    },

    /// Region-based loop
    WhileRegion {
        /// Condition region
        cond_region: Region,
        /// Loop body region
        body_region: Region,
    },

    /// Replicated execution of the body region
    Replicate {
        /// Number of replicas to expand into
        num_replicas: u32,
        /// Body replicated per replica
        body: Region,
    },

    /// Concurrent execution of independent branches
    ParallelExecute {
        /// One region per branch
        branches: Vec<Region>,
    },

    /// Wrapper pinning its body to a device
    Launch {
        /// Target device
        device: String,
        /// Wrapped operations
        body: Region,
    },
}

/// A single IR operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Result name; unique within the enclosing function
    pub name: String,

    /// Operation kind
    pub kind: OpKind,

    /// Names of consumed values
    pub operands: Vec<String>,

    /// Attached attributes
    pub attrs: AttrMap,
}

impl Operation {
    /// Create a plain computation operation
    pub fn generic(
        name: impl Into<String>,
        opcode: impl Into<String>,
        operands: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: OpKind::Generic {
                opcode: opcode.into(),
            },
            operands: operands.into_iter().map(Into::into).collect(),
            attrs: AttrMap::new(),
        }
    }

    /// Create a call operation
    pub fn call(
        name: impl Into<String>,
        callee: impl Into<String>,
        operands: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: OpKind::Call {
                callee: callee.into(),
            },
            operands: operands.into_iter().map(Into::into).collect(),
            attrs: AttrMap::new(),
        }
    }

    /// Create a return terminator
    pub fn ret(operands: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: "ret".to_string(),
            kind: OpKind::Return,
            operands: operands.into_iter().map(Into::into).collect(),
            attrs: AttrMap::new(),
        }
    }

    /// Set an attribute, builder style
    pub fn with_attr(mut self, name: impl Into<String>, value: AttrValue) -> Self {
        self.attrs.insert(name.into(), value);
        self
    }

    /// The opcode, for generic operations
    pub fn opcode(&self) -> Option<&str> {
        match &self.kind {
            OpKind::Generic { opcode } => Some(opcode.as_str()),
            _ => None,
        }
    }

    /// Whether this operation carries nested regions
    pub fn is_structured(&self) -> bool {
        !self.regions().is_empty()
    }

    /// Nested regions, in declaration order
    pub fn regions(&self) -> Vec<&Region> {
        match &self.kind {
            OpKind::IfRegion {
                then_region,
                else_region,
            } => vec![then_region, else_region],
            OpKind::WhileRegion {
                cond_region,
                body_region,
            } => vec![cond_region, body_region],
            OpKind::Replicate { body, .. } | OpKind::Launch { body, .. } => vec![body],
            OpKind::ParallelExecute { branches } => branches.iter().collect(),
            OpKind::Generic { .. } | OpKind::Call { .. } | OpKind::Return => Vec::new(),
        }
    }

    /// Assigned device, if any
    pub fn device(&self) -> Option<&str> {
        self.attrs.get(ATTR_DEVICE).and_then(AttrValue::as_str)
    }

    /// Resource this operation touches, if any
    pub fn resource(&self) -> Option<&str> {
        self.attrs.get(ATTR_RESOURCE).and_then(AttrValue::as_str)
    }

    /// Whether a resource access is a read (write when the mode is absent)
    pub fn reads_resource(&self) -> bool {
        self.attrs
            .get(ATTR_RESOURCE_ACCESS)
            .and_then(AttrValue::as_str)
            == Some("read")
    }

    /// Whether this operation is an ordered side effect without a resource
    pub fn is_stateful(&self) -> bool {
        matches!(self.attrs.get(ATTR_STATEFUL), Some(AttrValue::Bool(true)))
    }
}
