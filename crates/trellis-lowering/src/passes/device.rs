//! Device-related rewrites
//!
//! Three per-function passes: inline launch wrappers into device
//! attributes, propagate devices forward through the per-op graph, and
//! colocate split operations that form one logical unit.

use crate::error::{LoweringError, Result};
use crate::passes::{graph_mut, FunctionPass};
use std::collections::HashMap;
use trellis_core::ir::{
    attribute::{ATTR_COLOCATION, ATTR_DEVICE, ATTR_GROUP},
    AttrValue, Function, OpKind, Operation,
};

const SPLIT_OPCODE: &str = "split";

/// Inlines launch wrappers, attaching their device to each wrapped op.
///
/// A wrapped op already pinned to a different device is a conflict and
/// fails the pass. A nested launch keeps its own device. External uses of
/// a launch's result are redirected to its body's last operation.
pub struct LaunchToDeviceAttribute;

impl FunctionPass for LaunchToDeviceAttribute {
    fn name(&self) -> &'static str {
        "launch-to-device-attribute"
    }

    fn run(&self, func: &mut Function) -> Result<()> {
        let graph = graph_mut(func, self.name())?;
        let mut renames: HashMap<String, String> = HashMap::new();

        for island in &mut graph.islands {
            let mut inlined: Vec<Operation> = Vec::new();
            for op in std::mem::take(&mut island.ops) {
                inline_launch(op, &mut renames, &mut inlined)?;
            }
            island.ops = inlined;
        }

        for island in &mut graph.islands {
            for op in &mut island.ops {
                for operand in &mut op.operands {
                    if let Some(target) = resolve(&renames, operand) {
                        *operand = target;
                    }
                }
            }
        }
        for fetch in &mut graph.fetches {
            if let Some(target) = resolve(&renames, &fetch.value) {
                fetch.value = target;
            }
        }
        Ok(())
    }
}

fn inline_launch(
    op: Operation,
    renames: &mut HashMap<String, String>,
    out: &mut Vec<Operation>,
) -> Result<()> {
    let (device, body) = match op.kind {
        OpKind::Launch { device, body } => (device, body),
        _ => {
            out.push(op);
            return Ok(());
        }
    };

    if let Some(last) = body.ops.last() {
        renames.insert(op.name.clone(), last.name.clone());
    }
    for mut inner in body.ops {
        if matches!(inner.kind, OpKind::Launch { .. }) {
            inline_launch(inner, renames, out)?;
            continue;
        }
        match inner.attrs.get(ATTR_DEVICE) {
            Some(AttrValue::Str(existing)) if *existing != device => {
                return Err(LoweringError::AttributeConflict(format!(
                    "op '{}' is pinned to device '{existing}' inside a launch on '{device}'",
                    inner.name
                )));
            }
            _ => {
                inner
                    .attrs
                    .insert(ATTR_DEVICE.to_string(), AttrValue::Str(device.clone()));
            }
        }
        out.push(inner);
    }
    Ok(())
}

// Rename chains appear when a launch ends in another launch; follow them
// to the surviving op.
fn resolve(renames: &HashMap<String, String>, value: &str) -> Option<String> {
    let mut current = renames.get(value)?;
    while let Some(next) = renames.get(current) {
        current = next;
    }
    Some(current.clone())
}

/// Propagates device assignments forward through the per-op graph.
///
/// An op without a device whose device-carrying operands all agree on one
/// device inherits it. Runs to a fixpoint within the function.
pub struct DevicePropagation;

impl FunctionPass for DevicePropagation {
    fn name(&self) -> &'static str {
        "device-propagation"
    }

    fn run(&self, func: &mut Function) -> Result<()> {
        let graph = graph_mut(func, self.name())?;
        loop {
            let mut devices: HashMap<String, String> = HashMap::new();
            for island in &graph.islands {
                for op in &island.ops {
                    if let Some(device) = op.device() {
                        devices.insert(op.name.clone(), device.to_string());
                    }
                }
            }

            let mut changed = false;
            for island in &mut graph.islands {
                for op in &mut island.ops {
                    if op.attrs.contains_key(ATTR_DEVICE) {
                        continue;
                    }
                    let mut operand_devices =
                        op.operands.iter().filter_map(|operand| devices.get(operand));
                    let Some(first) = operand_devices.next() else {
                        continue;
                    };
                    if operand_devices.all(|device| device == first) {
                        op.attrs
                            .insert(ATTR_DEVICE.to_string(), AttrValue::Str(first.clone()));
                        changed = true;
                    }
                }
            }
            if !changed {
                return Ok(());
            }
        }
    }
}

/// Colocates split operations that belong to one logical unit.
///
/// Split ops sharing a `group` attribute receive a common colocation
/// constraint naming the group's first split in island order.
pub struct ColocateSplits;

impl FunctionPass for ColocateSplits {
    fn name(&self) -> &'static str {
        "colocate-splits"
    }

    fn run(&self, func: &mut Function) -> Result<()> {
        let graph = graph_mut(func, self.name())?;

        let mut leaders: HashMap<String, String> = HashMap::new();
        for island in &graph.islands {
            for op in &island.ops {
                if op.opcode() != Some(SPLIT_OPCODE) {
                    continue;
                }
                if let Some(group) = op.attrs.get(ATTR_GROUP).and_then(AttrValue::as_str) {
                    leaders
                        .entry(group.to_string())
                        .or_insert_with(|| op.name.clone());
                }
            }
        }

        for island in &mut graph.islands {
            for op in &mut island.ops {
                if op.opcode() != Some(SPLIT_OPCODE) {
                    continue;
                }
                let Some(group) = op.attrs.get(ATTR_GROUP).and_then(AttrValue::as_str) else {
                    continue;
                };
                if let Some(leader) = leaders.get(group) {
                    let constraint = AttrValue::Str(format!("loc:@{leader}"));
                    op.attrs.insert(ATTR_COLOCATION.to_string(), constraint);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::ir::{Fetch, FunctionBody, Graph, Island, Region};

    fn graph_function(graph: Graph) -> Function {
        let mut func = Function::new("main").with_params(["arg0"]);
        func.body = FunctionBody::Graph(graph);
        func
    }

    fn launch_island(name: &str, device: &str, body: Vec<Operation>) -> Island {
        Island::new(
            name,
            vec![Operation {
                name: name.to_string(),
                kind: OpKind::Launch {
                    device: device.to_string(),
                    body: Region::new(body),
                },
                operands: Vec::new(),
                attrs: Default::default(),
            }],
        )
    }

    #[test]
    fn test_launch_inlines_with_device() {
        let mut func = graph_function(Graph {
            islands: vec![
                launch_island(
                    "l0",
                    "/gpu:0",
                    vec![Operation::generic("mm0", "matmul", ["arg0"])],
                ),
                Island::new("u0", vec![Operation::generic("u0", "neg", ["l0"])]),
            ],
            fetches: vec![Fetch::data("l0")],
        });

        LaunchToDeviceAttribute.run(&mut func).unwrap();

        let graph = func.graph().unwrap();
        let inlined = &graph.island("l0").unwrap().ops[0];
        assert_eq!(inlined.name, "mm0");
        assert_eq!(inlined.device(), Some("/gpu:0"));
        // uses of the launch result follow its body's last op
        assert_eq!(graph.island("u0").unwrap().ops[0].operands, vec!["mm0"]);
        assert_eq!(graph.fetches[0].value, "mm0");
    }

    #[test]
    fn test_launch_device_conflict_is_rejected() {
        let pinned = Operation::generic("mm0", "matmul", ["arg0"])
            .with_attr(ATTR_DEVICE, AttrValue::Str("/cpu:0".to_string()));
        let mut func = graph_function(Graph {
            islands: vec![launch_island("l0", "/gpu:0", vec![pinned])],
            fetches: Vec::new(),
        });

        let error = LaunchToDeviceAttribute.run(&mut func).unwrap_err();
        assert!(matches!(error, LoweringError::AttributeConflict(_)));
    }

    #[test]
    fn test_launch_matching_device_is_kept() {
        let pinned = Operation::generic("mm0", "matmul", ["arg0"])
            .with_attr(ATTR_DEVICE, AttrValue::Str("/gpu:0".to_string()));
        let mut func = graph_function(Graph {
            islands: vec![launch_island("l0", "/gpu:0", vec![pinned])],
            fetches: Vec::new(),
        });

        LaunchToDeviceAttribute.run(&mut func).unwrap();
        let graph = func.graph().unwrap();
        assert_eq!(graph.island("l0").unwrap().ops[0].device(), Some("/gpu:0"));
    }

    #[test]
    fn test_nested_launch_keeps_its_device() {
        let inner = Operation {
            name: "l1".to_string(),
            kind: OpKind::Launch {
                device: "/gpu:1".to_string(),
                body: Region::new(vec![Operation::generic("mm1", "matmul", ["arg0"])]),
            },
            operands: Vec::new(),
            attrs: Default::default(),
        };
        let mut func = graph_function(Graph {
            islands: vec![launch_island("l0", "/gpu:0", vec![inner])],
            fetches: vec![Fetch::data("l0")],
        });

        LaunchToDeviceAttribute.run(&mut func).unwrap();

        let graph = func.graph().unwrap();
        let op = &graph.island("l0").unwrap().ops[0];
        assert_eq!(op.name, "mm1");
        assert_eq!(op.device(), Some("/gpu:1"));
        // the rename chain l0 -> l1 -> mm1 is followed to the end
        assert_eq!(graph.fetches[0].value, "mm1");
    }

    #[test]
    fn test_device_propagation_reaches_fixpoint() {
        let src = Operation::generic("src", "const", Vec::<String>::new())
            .with_attr(ATTR_DEVICE, AttrValue::Str("/gpu:0".to_string()));
        let mid = Operation::generic("mid", "neg", ["src"]);
        let sink = Operation::generic("sink", "abs", ["mid"]);
        let mut func = graph_function(Graph {
            islands: vec![
                Island::new("src", vec![src]),
                Island::new("mid", vec![mid]),
                Island::new("sink", vec![sink]),
            ],
            fetches: Vec::new(),
        });

        DevicePropagation.run(&mut func).unwrap();

        let graph = func.graph().unwrap();
        // the device flows through mid and on to sink in one run
        assert_eq!(graph.island("mid").unwrap().ops[0].device(), Some("/gpu:0"));
        assert_eq!(graph.island("sink").unwrap().ops[0].device(), Some("/gpu:0"));
    }

    #[test]
    fn test_device_propagation_stops_on_disagreement() {
        let a = Operation::generic("a", "const", Vec::<String>::new())
            .with_attr(ATTR_DEVICE, AttrValue::Str("/gpu:0".to_string()));
        let b = Operation::generic("b", "const", Vec::<String>::new())
            .with_attr(ATTR_DEVICE, AttrValue::Str("/gpu:1".to_string()));
        let join = Operation::generic("join", "add", ["a", "b"]);
        let mut func = graph_function(Graph {
            islands: vec![
                Island::new("a", vec![a]),
                Island::new("b", vec![b]),
                Island::new("join", vec![join]),
            ],
            fetches: Vec::new(),
        });

        DevicePropagation.run(&mut func).unwrap();

        let graph = func.graph().unwrap();
        assert_eq!(graph.island("join").unwrap().ops[0].device(), None);
    }

    #[test]
    fn test_colocate_splits_by_group() {
        let split0 = Operation::generic("split0", "split", ["arg0"])
            .with_attr(ATTR_GROUP, AttrValue::Str("g0".to_string()));
        let split1 = Operation::generic("split1", "split", ["arg0"])
            .with_attr(ATTR_GROUP, AttrValue::Str("g0".to_string()));
        let loner = Operation::generic("split2", "split", ["arg0"]);
        let mut func = graph_function(Graph {
            islands: vec![
                Island::new("split0", vec![split0]),
                Island::new("split1", vec![split1]),
                Island::new("split2", vec![loner]),
            ],
            fetches: Vec::new(),
        });

        ColocateSplits.run(&mut func).unwrap();

        let graph = func.graph().unwrap();
        let constraint = AttrValue::Str("loc:@split0".to_string());
        assert_eq!(
            graph.island("split0").unwrap().ops[0].attrs.get(ATTR_COLOCATION),
            Some(&constraint)
        );
        assert_eq!(
            graph.island("split1").unwrap().ops[0].attrs.get(ATTR_COLOCATION),
            Some(&constraint)
        );
        // ungrouped splits are left alone
        assert_eq!(
            graph.island("split2").unwrap().ops[0].attrs.get(ATTR_COLOCATION),
            None
        );
    }
}
