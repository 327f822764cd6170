//! Region-based control flow to functional form
//!
//! Rewrites `if_region`/`while_region` operations into call-based
//! functional ops, outlining each region into a fresh private function.
//! Launch, replicate and parallel-execute regions survive this pass; they
//! are eliminated later, on the executor graph.

use crate::error::{LoweringError, Result};
use crate::passes::ModulePass;
use std::collections::HashSet;
use trellis_core::ir::{
    AttrValue, Function, FunctionBody, Module, OpKind, Operation, Region, Visibility,
};

/// Normalizes region-based control flow into call-based functional form.
pub struct RegionControlFlowToFunctional;

impl ModulePass for RegionControlFlowToFunctional {
    fn name(&self) -> &'static str {
        "region-control-flow-to-functional"
    }

    fn run(&self, module: &mut Module) -> Result<()> {
        let mut outlined: Vec<Function> = Vec::new();
        for func in &mut module.functions {
            let ops = match &mut func.body {
                FunctionBody::Ops(ops) => ops,
                FunctionBody::Graph(_) => {
                    return Err(LoweringError::MalformedInput(format!(
                        "function '{}' is already in graph-executor form",
                        func.name
                    )))
                }
            };
            for op in ops.iter_mut() {
                rewrite_op(&func.name, op, &mut outlined)?;
            }
        }
        module.functions.extend(outlined);
        Ok(())
    }
}

fn rewrite_op(func_name: &str, op: &mut Operation, outlined: &mut Vec<Function>) -> Result<()> {
    match &mut op.kind {
        OpKind::IfRegion {
            then_region,
            else_region,
        } => {
            rewrite_region(func_name, then_region, outlined)?;
            rewrite_region(func_name, else_region, outlined)?;
            let then_branch = outline(func_name, &op.name, "then", then_region, outlined);
            let else_branch = outline(func_name, &op.name, "else", else_region, outlined);
            op.attrs
                .insert("then_branch".to_string(), AttrValue::SymbolRef(then_branch));
            op.attrs
                .insert("else_branch".to_string(), AttrValue::SymbolRef(else_branch));
            op.kind = OpKind::Generic {
                opcode: "functional_if".to_string(),
            };
        }
        OpKind::WhileRegion {
            cond_region,
            body_region,
        } => {
            rewrite_region(func_name, cond_region, outlined)?;
            rewrite_region(func_name, body_region, outlined)?;
            let cond = outline(func_name, &op.name, "cond", cond_region, outlined);
            let body = outline(func_name, &op.name, "body", body_region, outlined);
            op.attrs.insert("cond".to_string(), AttrValue::SymbolRef(cond));
            op.attrs.insert("body".to_string(), AttrValue::SymbolRef(body));
            op.kind = OpKind::Generic {
                opcode: "functional_while".to_string(),
            };
        }
        OpKind::Replicate { body, .. } | OpKind::Launch { body, .. } => {
            rewrite_region(func_name, body, outlined)?;
        }
        OpKind::ParallelExecute { branches } => {
            for branch in branches {
                rewrite_region(func_name, branch, outlined)?;
            }
        }
        OpKind::Generic { .. } | OpKind::Call { .. } | OpKind::Return => {}
    }
    Ok(())
}

fn rewrite_region(
    func_name: &str,
    region: &mut Region,
    outlined: &mut Vec<Function>,
) -> Result<()> {
    for op in region.ops.iter_mut() {
        rewrite_op(func_name, op, outlined)?;
    }
    Ok(())
}

/// Moves a region's ops into a fresh private function and returns its name.
///
/// Free values of the region become the function's parameters; the region's
/// result (its last op) becomes the function's return value.
fn outline(
    func_name: &str,
    op_name: &str,
    suffix: &str,
    region: &mut Region,
    outlined: &mut Vec<Function>,
) -> String {
    let name = format!("{func_name}_{op_name}_{suffix}");
    let mut ops = std::mem::take(&mut region.ops);
    let params = free_values(&ops);
    let result = ops.last().map(|op| op.name.clone());
    ops.push(Operation::ret(result.into_iter()));

    let function = Function::new(name.clone())
        .with_params(params)
        .with_visibility(Visibility::Private)
        .with_ops(ops);
    outlined.push(function);
    name
}

fn free_values(ops: &[Operation]) -> Vec<String> {
    let defined: HashSet<&str> = ops.iter().map(|op| op.name.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut free = Vec::new();
    for op in ops {
        for operand in &op.operands {
            if !defined.contains(operand.as_str()) && seen.insert(operand.as_str()) {
                free.push(operand.clone());
            }
        }
    }
    free
}

#[cfg(test)]
mod tests {
    use super::*;

    fn if_op(name: &str, cond: &str, then_ops: Vec<Operation>, else_ops: Vec<Operation>) -> Operation {
        Operation {
            name: name.to_string(),
            kind: OpKind::IfRegion {
                then_region: Region::new(then_ops),
                else_region: Region::new(else_ops),
            },
            operands: vec![cond.to_string()],
            attrs: Default::default(),
        }
    }

    #[test]
    fn test_if_region_is_outlined() {
        let mut module = Module::new();
        module.push_function(
            Function::new("main").with_params(["arg0"]).with_ops(vec![
                if_op(
                    "if0",
                    "arg0",
                    vec![Operation::generic("t0", "one", ["arg0"])],
                    vec![Operation::generic("e0", "zero", Vec::<String>::new())],
                ),
                Operation::ret(["if0"]),
            ]),
        );

        RegionControlFlowToFunctional.run(&mut module).unwrap();

        assert_eq!(module.functions.len(), 3);
        let main_ops = module.function("main").unwrap().ops().unwrap();
        assert_eq!(main_ops[0].opcode(), Some("functional_if"));
        assert_eq!(
            main_ops[0].attrs.get("then_branch"),
            Some(&AttrValue::SymbolRef("main_if0_then".to_string()))
        );
        assert_eq!(
            main_ops[0].attrs.get("else_branch"),
            Some(&AttrValue::SymbolRef("main_if0_else".to_string()))
        );

        let then_func = module.function("main_if0_then").unwrap();
        assert_eq!(then_func.visibility, Visibility::Private);
        // the free value became a parameter, the region result is returned
        assert_eq!(then_func.params, vec!["arg0"]);
        let then_ops = then_func.ops().unwrap();
        assert!(matches!(then_ops.last().map(|op| &op.kind), Some(OpKind::Return)));
        assert_eq!(then_ops.last().map(|op| op.operands.clone()), Some(vec!["t0".to_string()]));
    }

    #[test]
    fn test_nested_control_flow_is_outlined() {
        let inner = if_op(
            "if1",
            "c",
            vec![Operation::generic("t1", "one", Vec::<String>::new())],
            vec![],
        );
        let mut module = Module::new();
        module.push_function(Function::new("main").with_ops(vec![
            if_op("if0", "c", vec![inner], vec![]),
            Operation::ret(Vec::<String>::new()),
        ]));

        RegionControlFlowToFunctional.run(&mut module).unwrap();

        // if0 then/else plus the nested if1 then/else
        assert!(module.function("main_if0_then").is_some());
        assert!(module.function("main_if0_else").is_some());
        assert!(module.function("main_if1_then").is_some());
        assert!(module.function("main_if1_else").is_some());
    }

    #[test]
    fn test_while_region_is_outlined() {
        let while_op = Operation {
            name: "w0".to_string(),
            kind: OpKind::WhileRegion {
                cond_region: Region::new(vec![Operation::generic("c0", "less", ["w_arg"])]),
                body_region: Region::new(vec![Operation::generic("b0", "inc", ["w_arg"])]),
            },
            operands: vec!["arg0".to_string()],
            attrs: Default::default(),
        };
        let mut module = Module::new();
        module.push_function(
            Function::new("main")
                .with_params(["arg0"])
                .with_ops(vec![while_op, Operation::ret(["w0"])]),
        );

        RegionControlFlowToFunctional.run(&mut module).unwrap();

        let main_ops = module.function("main").unwrap().ops().unwrap();
        assert_eq!(main_ops[0].opcode(), Some("functional_while"));
        assert!(module.function("main_w0_cond").is_some());
        assert!(module.function("main_w0_body").is_some());
    }

    #[test]
    fn test_graph_form_input_is_rejected() {
        let mut func = Function::new("main");
        func.body = FunctionBody::Graph(Default::default());
        let mut module = Module::new();
        module.push_function(func);

        let error = RegionControlFlowToFunctional.run(&mut module).unwrap_err();
        assert!(matches!(error, LoweringError::MalformedInput(_)));
    }

    #[test]
    fn test_plain_ops_are_untouched() {
        let mut module = Module::new();
        module.push_function(Function::new("main").with_params(["arg0"]).with_ops(vec![
            Operation::generic("a0", "add", ["arg0"]),
            Operation::ret(["a0"]),
        ]));
        let before = module.clone();

        RegionControlFlowToFunctional.run(&mut module).unwrap();
        assert_eq!(module, before);
    }
}
