//! Replicated execution expansion
//!
//! Expands each replicated island into one island per replica, then turns
//! the replica indices left behind into concrete device ordinals.

use crate::error::{LoweringError, Result};
use crate::passes::{graph_mut, FunctionPass};
use std::collections::HashSet;
use trellis_core::ir::{
    attribute::{ATTR_DEVICE_ORDINAL, ATTR_REPLICA_ID},
    AttrValue, Function, Island, OpKind,
};

/// Expands replicated islands into one island per replica.
///
/// Replica bodies must be self-contained: values defined inside the body
/// are renamed per replica, and an external use of the replicate's result
/// resolves to replica 0's clone of the body's last operation.
pub struct ReplicateToIslands;

impl FunctionPass for ReplicateToIslands {
    fn name(&self) -> &'static str {
        "replicate-to-islands"
    }

    fn run(&self, func: &mut Function) -> Result<()> {
        let func_name = func.name.clone();
        let graph = graph_mut(func, self.name())?;

        // replicate result name -> replica 0 clone of the body result
        let mut renames: Vec<(String, String)> = Vec::new();
        let mut expanded: Vec<Island> = Vec::new();

        for mut island in std::mem::take(&mut graph.islands) {
            let is_replicate = island.ops.len() == 1
                && matches!(island.ops[0].kind, OpKind::Replicate { .. });
            if !is_replicate {
                expanded.push(island);
                continue;
            }

            let op = island.ops.remove(0);
            let (num_replicas, body) = match op.kind {
                OpKind::Replicate { num_replicas, body } => (num_replicas, body),
                _ => {
                    return Err(LoweringError::Internal(format!(
                        "island '{}' lost its replicate op",
                        island.name
                    )))
                }
            };
            if body.ops.is_empty() {
                return Err(LoweringError::MalformedInput(format!(
                    "replicate '{}' in function '{func_name}' has an empty body",
                    op.name
                )));
            }

            let defined: HashSet<String> =
                body.ops.iter().map(|body_op| body_op.name.clone()).collect();
            let last = body.ops[body.ops.len() - 1].name.clone();
            renames.push((op.name.clone(), format!("{last}/replica_0")));

            for replica in 0..num_replicas {
                let mut ops = body.ops.clone();
                for cloned in &mut ops {
                    for operand in &mut cloned.operands {
                        if defined.contains(operand.as_str()) {
                            *operand = format!("{operand}/replica_{replica}");
                        }
                    }
                    cloned.name = format!("{}/replica_{replica}", cloned.name);
                    cloned
                        .attrs
                        .insert(ATTR_REPLICA_ID.to_string(), AttrValue::Int(replica as i64));
                }
                expanded.push(Island {
                    name: format!("{}/replica_{replica}", island.name),
                    ops,
                    control_inputs: island.control_inputs.clone(),
                });
            }
        }
        graph.islands = expanded;

        for (from, to) in &renames {
            for island in &mut graph.islands {
                for op in &mut island.ops {
                    for operand in &mut op.operands {
                        if operand == from {
                            *operand = to.clone();
                        }
                    }
                }
            }
            for fetch in &mut graph.fetches {
                if &fetch.value == from {
                    fetch.value = to.clone();
                }
            }
        }
        Ok(())
    }
}

/// Replaces every `replica_id` attribute with a `device_ordinal` attribute
/// of the same value.
pub struct ReplicaIdToDeviceOrdinal;

impl FunctionPass for ReplicaIdToDeviceOrdinal {
    fn name(&self) -> &'static str {
        "replica-id-to-device-ordinal"
    }

    fn run(&self, func: &mut Function) -> Result<()> {
        let graph = graph_mut(func, self.name())?;
        for island in &mut graph.islands {
            for op in &mut island.ops {
                let Some(value) = op.attrs.remove(ATTR_REPLICA_ID) else {
                    continue;
                };
                match value {
                    AttrValue::Int(ordinal) => {
                        op.attrs
                            .insert(ATTR_DEVICE_ORDINAL.to_string(), AttrValue::Int(ordinal));
                    }
                    other => {
                        return Err(LoweringError::MalformedInput(format!(
                            "op '{}' has a non-integer replica id ({other})",
                            op.name
                        )))
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::ir::{Fetch, FunctionBody, Graph, Operation, Region};

    fn replicate_island(name: &str, num_replicas: u32, body: Vec<Operation>) -> Island {
        Island::new(
            name,
            vec![Operation {
                name: name.to_string(),
                kind: OpKind::Replicate {
                    num_replicas,
                    body: Region::new(body),
                },
                operands: Vec::new(),
                attrs: Default::default(),
            }],
        )
    }

    fn graph_function(graph: Graph) -> Function {
        let mut func = Function::new("main").with_params(["arg0"]);
        func.body = FunctionBody::Graph(graph);
        func
    }

    #[test]
    fn test_expansion_island_per_replica() {
        let mut func = graph_function(Graph {
            islands: vec![replicate_island(
                "rep0",
                3,
                vec![
                    Operation::generic("s0", "sin", ["arg0"]),
                    Operation::generic("c0", "cos", ["s0"]),
                ],
            )],
            fetches: Vec::new(),
        });

        ReplicateToIslands.run(&mut func).unwrap();

        let graph = func.graph().unwrap();
        assert_eq!(graph.islands.len(), 3);
        assert_eq!(graph.islands[0].name, "rep0/replica_0");
        assert_eq!(graph.islands[2].name, "rep0/replica_2");

        let replica1 = &graph.islands[1];
        assert_eq!(replica1.ops[0].name, "s0/replica_1");
        // internal references are rewritten per replica
        assert_eq!(replica1.ops[1].operands, vec!["s0/replica_1"]);
        // external references are untouched
        assert_eq!(replica1.ops[0].operands, vec!["arg0"]);
        assert_eq!(
            replica1.ops[0].attrs.get(ATTR_REPLICA_ID),
            Some(&AttrValue::Int(1))
        );
    }

    #[test]
    fn test_external_use_resolves_to_replica_zero() {
        let mut func = graph_function(Graph {
            islands: vec![
                replicate_island("rep0", 2, vec![Operation::generic("s0", "sin", ["arg0"])]),
                Island::new("u0", vec![Operation::generic("u0", "neg", ["rep0"])]),
            ],
            fetches: vec![Fetch::data("rep0")],
        });

        ReplicateToIslands.run(&mut func).unwrap();

        let graph = func.graph().unwrap();
        let user = graph.island("u0").unwrap();
        assert_eq!(user.ops[0].operands, vec!["s0/replica_0"]);
        assert_eq!(graph.fetches[0].value, "s0/replica_0");
    }

    #[test]
    fn test_empty_body_is_rejected() {
        let mut func = graph_function(Graph {
            islands: vec![replicate_island("rep0", 2, Vec::new())],
            fetches: Vec::new(),
        });

        let error = ReplicateToIslands.run(&mut func).unwrap_err();
        assert!(matches!(error, LoweringError::MalformedInput(_)));
    }

    #[test]
    fn test_non_replicate_islands_pass_through() {
        let mut func = graph_function(Graph {
            islands: vec![Island::new(
                "a0",
                vec![Operation::generic("a0", "add", ["arg0"])],
            )],
            fetches: Vec::new(),
        });
        let before = func.clone();

        ReplicateToIslands.run(&mut func).unwrap();
        assert_eq!(func, before);
    }

    #[test]
    fn test_replica_id_becomes_device_ordinal() {
        let op = Operation::generic("s0", "sin", ["arg0"])
            .with_attr(ATTR_REPLICA_ID, AttrValue::Int(2));
        let mut func = graph_function(Graph {
            islands: vec![Island::new("s0", vec![op])],
            fetches: Vec::new(),
        });

        ReplicaIdToDeviceOrdinal.run(&mut func).unwrap();

        let graph = func.graph().unwrap();
        let op = &graph.islands[0].ops[0];
        assert!(!op.attrs.contains_key(ATTR_REPLICA_ID));
        assert_eq!(op.attrs.get(ATTR_DEVICE_ORDINAL), Some(&AttrValue::Int(2)));
    }

    #[test]
    fn test_non_integer_replica_id_is_rejected() {
        let op = Operation::generic("s0", "sin", ["arg0"])
            .with_attr(ATTR_REPLICA_ID, AttrValue::Str("x".to_string()));
        let mut func = graph_function(Graph {
            islands: vec![Island::new("s0", vec![op])],
            fetches: Vec::new(),
        });

        assert!(ReplicaIdToDeviceOrdinal.run(&mut func).is_err());
    }
}
