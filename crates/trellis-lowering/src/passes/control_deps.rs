//! Control dependency reconstruction
//!
//! Recomputes explicit control edges between islands from side-effect
//! analysis. Existing edges are discarded: after the structural expansions
//! earlier in the pipeline they no longer reflect the effects actually
//! present in the graph.

use crate::error::{LoweringError, Result};
use crate::passes::ModulePass;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use trellis_core::ir::{Fetch, FunctionBody, Graph, Module};

/// Recomputes control dependencies between islands.
///
/// Islands are visited in order. For a given resource, a read depends on
/// the last write; a write depends on the last write and every read since
/// it. Stateful ops without a resource serialize with each other. Effectful
/// islands nothing depends on are control-fetched so their effects are
/// anchored in the graph's outputs.
pub struct UpdateControlDependencies;

impl ModulePass for UpdateControlDependencies {
    fn name(&self) -> &'static str {
        "update-control-dependencies"
    }

    fn run(&self, module: &mut Module) -> Result<()> {
        for func in &mut module.functions {
            let graph = match &mut func.body {
                FunctionBody::Graph(graph) => graph,
                FunctionBody::Ops(_) => {
                    return Err(LoweringError::MalformedInput(format!(
                        "function '{}' is not in graph-executor form",
                        func.name
                    )))
                }
            };
            update_graph(graph);
        }
        Ok(())
    }
}

#[derive(Default)]
struct ResourceState {
    last_write: Option<String>,
    reads_since_write: Vec<String>,
}

fn update_graph(graph: &mut Graph) {
    let mut resources: BTreeMap<String, ResourceState> = BTreeMap::new();
    let mut last_stateful: Option<String> = None;
    let mut has_dependent: HashSet<String> = HashSet::new();
    let mut effectful: Vec<String> = Vec::new();

    for island in &mut graph.islands {
        island.control_inputs.clear();
        let mut deps: BTreeSet<String> = BTreeSet::new();
        let mut is_effectful = false;

        for op in &island.ops {
            if let Some(resource) = op.resource() {
                is_effectful = true;
                let state = resources.entry(resource.to_string()).or_default();
                if op.reads_resource() {
                    if let Some(writer) = &state.last_write {
                        deps.insert(writer.clone());
                    }
                    state.reads_since_write.push(island.name.clone());
                } else {
                    if let Some(writer) = &state.last_write {
                        deps.insert(writer.clone());
                    }
                    for reader in state.reads_since_write.drain(..) {
                        deps.insert(reader);
                    }
                    state.last_write = Some(island.name.clone());
                }
            } else if op.is_stateful() {
                is_effectful = true;
                if let Some(previous) = &last_stateful {
                    deps.insert(previous.clone());
                }
                last_stateful = Some(island.name.clone());
            }
        }

        deps.remove(&island.name);
        for dep in &deps {
            has_dependent.insert(dep.clone());
        }
        island.control_inputs = deps.into_iter().collect();
        if is_effectful {
            effectful.push(island.name.clone());
        }
    }

    for name in effectful {
        if has_dependent.contains(&name) {
            continue;
        }
        if graph.fetches.iter().any(|fetch| fetch.value == name) {
            continue;
        }
        graph.fetches.push(Fetch::control(name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::ir::{
        attribute::{ATTR_RESOURCE, ATTR_RESOURCE_ACCESS, ATTR_STATEFUL},
        AttrValue, FetchKind, Function, Island, Operation,
    };

    fn read(name: &str, resource: &str) -> Operation {
        Operation::generic(name, "resource_read", Vec::<String>::new())
            .with_attr(ATTR_RESOURCE, AttrValue::Str(resource.to_string()))
            .with_attr(ATTR_RESOURCE_ACCESS, AttrValue::Str("read".to_string()))
    }

    fn write(name: &str, resource: &str) -> Operation {
        Operation::generic(name, "resource_write", Vec::<String>::new())
            .with_attr(ATTR_RESOURCE, AttrValue::Str(resource.to_string()))
    }

    fn stateful(name: &str) -> Operation {
        Operation::generic(name, "print", Vec::<String>::new())
            .with_attr(ATTR_STATEFUL, AttrValue::Bool(true))
    }

    fn module_of(ops: Vec<Operation>) -> Module {
        let islands = ops
            .into_iter()
            .map(|op| {
                let name = op.name.clone();
                Island::new(name, vec![op])
            })
            .collect();
        let mut func = Function::new("main");
        func.body = FunctionBody::Graph(Graph {
            islands,
            fetches: Vec::new(),
        });
        let mut module = Module::new();
        module.push_function(func);
        module
    }

    fn control_inputs(module: &Module, island: &str) -> Vec<String> {
        module.functions[0]
            .graph()
            .unwrap()
            .island(island)
            .unwrap()
            .control_inputs
            .clone()
    }

    #[test]
    fn test_read_after_write_dependency() {
        let mut module = module_of(vec![write("w0", "var"), read("r0", "var")]);
        UpdateControlDependencies.run(&mut module).unwrap();

        assert!(control_inputs(&module, "w0").is_empty());
        assert_eq!(control_inputs(&module, "r0"), vec!["w0".to_string()]);
    }

    #[test]
    fn test_write_after_reads_dependency() {
        let mut module = module_of(vec![
            write("w0", "var"),
            read("r0", "var"),
            read("r1", "var"),
            write("w1", "var"),
        ]);
        UpdateControlDependencies.run(&mut module).unwrap();

        // the second write waits for both reads and the first write
        assert_eq!(
            control_inputs(&module, "w1"),
            vec!["r0".to_string(), "r1".to_string(), "w0".to_string()]
        );
    }

    #[test]
    fn test_distinct_resources_are_independent() {
        let mut module = module_of(vec![write("w0", "a"), write("w1", "b")]);
        UpdateControlDependencies.run(&mut module).unwrap();

        assert!(control_inputs(&module, "w1").is_empty());
    }

    #[test]
    fn test_stateful_ops_chain_serially() {
        let mut module = module_of(vec![stateful("p0"), stateful("p1"), stateful("p2")]);
        UpdateControlDependencies.run(&mut module).unwrap();

        assert!(control_inputs(&module, "p0").is_empty());
        assert_eq!(control_inputs(&module, "p1"), vec!["p0".to_string()]);
        assert_eq!(control_inputs(&module, "p2"), vec!["p1".to_string()]);
    }

    #[test]
    fn test_stale_edges_are_discarded() {
        let mut module = module_of(vec![
            Operation::generic("a0", "add", Vec::<String>::new()),
        ]);
        if let FunctionBody::Graph(graph) = &mut module.functions[0].body {
            graph.islands[0].control_inputs.push("ghost".to_string());
        }

        UpdateControlDependencies.run(&mut module).unwrap();
        assert!(control_inputs(&module, "a0").is_empty());
    }

    #[test]
    fn test_effectful_sink_is_control_fetched() {
        let mut module = module_of(vec![write("w0", "var"), read("r0", "var"), stateful("p0")]);
        UpdateControlDependencies.run(&mut module).unwrap();

        let graph = module.functions[0].graph().unwrap();
        let control_fetches: Vec<&str> = graph
            .fetches
            .iter()
            .filter(|fetch| fetch.kind == FetchKind::Control)
            .map(|fetch| fetch.value.as_str())
            .collect();
        // w0 has a dependent (r0); r0 and p0 are sinks
        assert_eq!(control_fetches, vec!["r0", "p0"]);
    }

    #[test]
    fn test_pure_graph_gets_no_edges_or_fetches() {
        let mut module = module_of(vec![
            Operation::generic("a0", "add", Vec::<String>::new()),
            Operation::generic("m0", "mul", ["a0"]),
        ]);
        UpdateControlDependencies.run(&mut module).unwrap();

        let graph = module.functions[0].graph().unwrap();
        assert!(graph.islands.iter().all(|island| island.control_inputs.is_empty()));
        assert!(graph.fetches.is_empty());
    }

    #[test]
    fn test_functional_form_is_rejected() {
        let mut module = Module::new();
        module.push_function(Function::new("main").with_ops(vec![Operation::ret(Vec::<String>::new())]));

        assert!(UpdateControlDependencies.run(&mut module).is_err());
    }
}
