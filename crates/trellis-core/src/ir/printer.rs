//! Deterministic textual form of the IR
//!
//! The printed text is the payload of debug snapshots, so it must be stable
//! for identical modules: attribute maps are ordered and no addresses or
//! timestamps appear in the output.

use crate::ir::attribute::AttrMap;
use crate::ir::graph::{FetchKind, Graph};
use crate::ir::module::{Function, FunctionBody, Module, Visibility};
use crate::ir::operation::{OpKind, Operation, Region};
use std::fmt;

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "module @{name}")?,
            None => write!(f, "module")?,
        }
        write_attrs(f, &self.attrs, " attributes ")?;
        writeln!(f, " {{")?;
        for func in &self.functions {
            write_function(f, func)?;
        }
        writeln!(f, "}}")
    }
}

fn write_function(f: &mut fmt::Formatter<'_>, func: &Function) -> fmt::Result {
    let visibility = match func.visibility {
        Visibility::Public => "",
        Visibility::Private => "private ",
    };
    write!(f, "  func {visibility}@{}(", func.name)?;
    for (i, param) in func.params.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "%{param}")?;
    }
    write!(f, ")")?;
    write_attrs(f, &func.attrs, " attributes ")?;
    writeln!(f, " {{")?;
    match &func.body {
        FunctionBody::Ops(ops) => {
            for op in ops {
                write_op(f, op, 4)?;
            }
        }
        FunctionBody::Graph(graph) => write_graph(f, graph, 4)?,
    }
    writeln!(f, "  }}")
}

fn write_graph(f: &mut fmt::Formatter<'_>, graph: &Graph, indent: usize) -> fmt::Result {
    writeln!(f, "{:indent$}graph {{", "")?;
    for island in &graph.islands {
        write!(f, "{:width$}island @{}", "", island.name, width = indent + 2)?;
        if !island.control_inputs.is_empty() {
            write!(f, " [ctl: ")?;
            for (i, input) in island.control_inputs.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "@{input}")?;
            }
            write!(f, "]")?;
        }
        writeln!(f, " {{")?;
        for op in &island.ops {
            write_op(f, op, indent + 4)?;
        }
        writeln!(f, "{:width$}}}", "", width = indent + 2)?;
    }
    for fetch in &graph.fetches {
        match fetch.kind {
            FetchKind::Data => {
                writeln!(f, "{:width$}fetch %{}", "", fetch.value, width = indent + 2)?
            }
            FetchKind::Control => {
                writeln!(f, "{:width$}fetch ctl @{}", "", fetch.value, width = indent + 2)?
            }
        }
    }
    writeln!(f, "{:indent$}}}", "")
}

fn write_op(f: &mut fmt::Formatter<'_>, op: &Operation, indent: usize) -> fmt::Result {
    write!(f, "{:indent$}", "")?;
    match &op.kind {
        OpKind::Return => {
            write!(f, "return")?;
            for (i, operand) in op.operands.iter().enumerate() {
                write!(f, "{} %{operand}", if i == 0 { "" } else { "," })?;
            }
            write_attrs(f, &op.attrs, " ")?;
            return writeln!(f);
        }
        OpKind::Generic { opcode } => {
            write!(f, "%{} = \"{opcode}\"", op.name)?;
            write_operands(f, op)?;
            write_attrs(f, &op.attrs, " ")?;
            return writeln!(f);
        }
        OpKind::Call { callee } => {
            write!(f, "%{} = call @{callee}", op.name)?;
            write_operands(f, op)?;
            write_attrs(f, &op.attrs, " ")?;
            return writeln!(f);
        }
        OpKind::IfRegion {
            then_region,
            else_region,
        } => {
            write!(f, "%{} = if_region", op.name)?;
            write_operands(f, op)?;
            write_attrs(f, &op.attrs, " ")?;
            writeln!(f, " {{")?;
            write_region(f, "then", then_region, indent + 2)?;
            write_region(f, "else", else_region, indent + 2)?;
        }
        OpKind::WhileRegion {
            cond_region,
            body_region,
        } => {
            write!(f, "%{} = while_region", op.name)?;
            write_operands(f, op)?;
            write_attrs(f, &op.attrs, " ")?;
            writeln!(f, " {{")?;
            write_region(f, "cond", cond_region, indent + 2)?;
            write_region(f, "body", body_region, indent + 2)?;
        }
        OpKind::Replicate { num_replicas, body } => {
            write!(f, "%{} = replicate[{num_replicas}]", op.name)?;
            write_operands(f, op)?;
            write_attrs(f, &op.attrs, " ")?;
            writeln!(f, " {{")?;
            write_region(f, "body", body, indent + 2)?;
        }
        OpKind::ParallelExecute { branches } => {
            write!(f, "%{} = parallel_execute", op.name)?;
            write_operands(f, op)?;
            write_attrs(f, &op.attrs, " ")?;
            writeln!(f, " {{")?;
            for branch in branches {
                write_region(f, "branch", branch, indent + 2)?;
            }
        }
        OpKind::Launch { device, body } => {
            write!(f, "%{} = launch[\"{device}\"]", op.name)?;
            write_operands(f, op)?;
            write_attrs(f, &op.attrs, " ")?;
            writeln!(f, " {{")?;
            write_region(f, "body", body, indent + 2)?;
        }
    }
    writeln!(f, "{:indent$}}}", "")
}

fn write_region(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    region: &Region,
    indent: usize,
) -> fmt::Result {
    writeln!(f, "{:indent$}{label} {{", "")?;
    for op in &region.ops {
        write_op(f, op, indent + 2)?;
    }
    writeln!(f, "{:indent$}}}", "")
}

fn write_operands(f: &mut fmt::Formatter<'_>, op: &Operation) -> fmt::Result {
    write!(f, "(")?;
    for (i, operand) in op.operands.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "%{operand}")?;
    }
    write!(f, ")")
}

fn write_attrs(f: &mut fmt::Formatter<'_>, attrs: &AttrMap, prefix: &str) -> fmt::Result {
    if attrs.is_empty() {
        return Ok(());
    }
    write!(f, "{prefix}{{")?;
    for (i, (key, value)) in attrs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{key} = {value}")?;
    }
    write!(f, "}}")
}
