//! Attribute values attached to IR entities
//!
//! Attributes are open-ended key/value metadata on operations, functions and
//! modules. Maps are `BTreeMap` so iteration order, and therefore printing,
//! is deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Device assignment of an operation.
pub const ATTR_DEVICE: &str = "device";
/// Concrete device ordinal, produced from `replica_id` during lowering.
pub const ATTR_DEVICE_ORDINAL: &str = "device_ordinal";
/// Replica index assigned when a replicated region is expanded.
pub const ATTR_REPLICA_ID: &str = "replica_id";
/// Name of the resource an operation touches.
pub const ATTR_RESOURCE: &str = "resource";
/// Access mode for `resource`: `"read"` or `"write"` (write when absent).
pub const ATTR_RESOURCE_ACCESS: &str = "resource_access";
/// Marks an operation as an ordered side effect without a specific resource.
pub const ATTR_STATEFUL: &str = "stateful";
/// Logical unit a split operation belongs to.
pub const ATTR_GROUP: &str = "group";
/// Colocation constraint emitted for split operations of one logical unit.
pub const ATTR_COLOCATION: &str = "colocation";

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// A string attribute
    Str(String),
    /// An integer attribute
    Int(i64),
    /// A boolean attribute
    Bool(bool),
    /// A list of strings
    StrList(Vec<String>),
    /// A reference to a named function symbol
    SymbolRef(String),
}

/// Attribute map keyed by attribute name.
pub type AttrMap = BTreeMap<String, AttrValue>;

impl AttrValue {
    /// The string payload, for `Str` values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// The integer payload, for `Int` values.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(value) => write!(f, "\"{value}\""),
            AttrValue::Int(value) => write!(f, "{value}"),
            AttrValue::Bool(value) => write!(f, "{value}"),
            AttrValue::StrList(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{value}\"")?;
                }
                write!(f, "]")
            }
            AttrValue::SymbolRef(symbol) => write!(f, "@{symbol}"),
        }
    }
}
