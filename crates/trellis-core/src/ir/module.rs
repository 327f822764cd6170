//! IR modules and functions
//!
//! The module is the mutable root container of the program graph. It is
//! owned by the caller for the whole compilation and rewritten in place by
//! lowering passes. Its name is used only for diagnostics, never identity.

use crate::error::Result;
use crate::ir::attribute::AttrMap;
use crate::ir::graph::Graph;
use crate::ir::operation::Operation;
use serde::{Deserialize, Serialize};

/// Symbol visibility of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Reachable from outside the module; a root for symbol reachability
    Public,
    /// Internal; removed when unreachable
    Private,
}

/// A function body, in one of the two representation forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FunctionBody {
    /// Functional form: flat operation list ending in a `Return`
    Ops(Vec<Operation>),
    /// Graph-executor form
    Graph(Graph),
}

/// A named function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// Function name; unique within the module
    pub name: String,

    /// Parameter value names
    pub params: Vec<String>,

    /// Symbol visibility
    pub visibility: Visibility,

    /// Function body
    pub body: FunctionBody,

    /// Attached attributes
    pub attrs: AttrMap,
}

impl Function {
    /// Create an empty public function in functional form
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            visibility: Visibility::Public,
            body: FunctionBody::Ops(Vec::new()),
            attrs: AttrMap::new(),
        }
    }

    /// Set the parameter names
    pub fn with_params(mut self, params: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    /// Set the body operations (functional form)
    pub fn with_ops(mut self, ops: Vec<Operation>) -> Self {
        self.body = FunctionBody::Ops(ops);
        self
    }

    /// Set the visibility
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// The body operations, when in functional form
    pub fn ops(&self) -> Option<&[Operation]> {
        match &self.body {
            FunctionBody::Ops(ops) => Some(ops.as_slice()),
            FunctionBody::Graph(_) => None,
        }
    }

    /// The body graph, when in graph-executor form
    pub fn graph(&self) -> Option<&Graph> {
        match &self.body {
            FunctionBody::Graph(graph) => Some(graph),
            FunctionBody::Ops(_) => None,
        }
    }
}

/// The root IR container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Module {
    /// Diagnostic name; carries no identity
    pub name: Option<String>,

    /// Functions in declaration order
    pub functions: Vec<Function>,

    /// Attached attributes
    pub attrs: AttrMap,
}

impl Module {
    /// Create an empty module
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the diagnostic name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Append a function
    pub fn push_function(&mut self, function: Function) {
        self.functions.push(function);
    }

    /// Look up a function by name
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|func| func.name == name)
    }

    /// Look up a function by name, mutably
    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|func| func.name == name)
    }

    /// Serialize the module to pretty JSON, for artifact storage
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize a module from JSON
    pub fn from_json(text: &str) -> Result<Module> {
        Ok(serde_json::from_str(text)?)
    }
}
