//=============================================
// nodlang/compiler/mod.rs
//=============================================
// Author: Nodlang Contributors
// License: Duality Public License (DPL v1.0)
// Goal: Graph to bytecode lowering
// Objective: Walk the scope tree of a parsed program and emit the flat
//            instruction list executed by the register VM
// Formatting: Zobie.format (.solvraformat)
//=============================================

pub mod instruction;

use crate::graph::{Graph, GraphError, MAIN_PROPERTY, NodeId, NodeKind, PropertyId};
use crate::vm::register::{Qword, Register};
use instruction::{Code, Operation};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error("graph is empty, nothing to compile")]
    EmptyGraph,
    #[error("graph has no program root")]
    MissingRoot,
    #[error("\"{0}\" is not declared")]
    UndeclaredVariable(String),
    #[error("\"{0}\" should have a scope")]
    OrphanVariable(String),
    #[error("\"{0}\" is not a function available")]
    AbstractInvokable(String),
    #[error("{structure} {node:?} has no condition")]
    MissingCondition {
        structure: &'static str,
        node: NodeId,
    },
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Refuse graphs the VM could not run: undeclared variables, variables
/// without a scope, invokables with no native.
pub fn is_syntax_tree_valid(graph: &Graph) -> Result<(), CompileError> {
    if graph.is_empty() {
        return Err(CompileError::EmptyGraph);
    }
    for (_, node) in graph.nodes() {
        if let Some(data) = node.variable() {
            if !data.declared {
                return Err(CompileError::UndeclaredVariable(node.name.clone()));
            }
            if data.scope.is_none() {
                return Err(CompileError::OrphanVariable(node.name.clone()));
            }
        }
        if let Some(invokable) = node.invokable() {
            if invokable.is_abstract() {
                return Err(CompileError::AbstractInvokable(invokable.signature.to_string()));
            }
        }
    }
    Ok(())
}

struct Compiler<'a> {
    graph: &'a Graph,
    code: Code,
    /// Nodes already emitted for the instruction being compiled.
    visited: HashSet<NodeId>,
}

/// Compile the program rooted at the graph's root.
pub fn compile(graph: &Graph) -> Result<Code, CompileError> {
    is_syntax_tree_valid(graph).inspect_err(|err| error!(target: "compiler", %err, "syntax tree refused"))?;
    let root = graph.root().ok_or(CompileError::MissingRoot)?;

    let mut compiler = Compiler {
        graph,
        code: Code::new(root),
        visited: HashSet::new(),
    };
    compiler
        .compile_scope(root, true)
        .inspect_err(|err| error!(target: "compiler", %err, "unable to compile program"))?;
    debug!(target: "compiler", instructions = compiler.code.len(), "program compiled");
    Ok(compiler.code)
}

impl Compiler<'_> {
    fn name_of(&self, id: NodeId) -> String {
        self.graph
            .node(id)
            .map(|node| node.name.clone())
            .unwrap_or_default()
    }

    /// Frame, live ranges of the scope's variables, then its children. The
    /// program scope ends with `ret` before the variables are popped.
    fn compile_scope(&mut self, owner: NodeId, fake_return: bool) -> Result<(), CompileError> {
        let name = self.name_of(owner);
        self.code
            .push(Operation::PushStackFrame { scope: owner }, format!("{name}'s scope"));
        self.push_variables(owner);

        let children = self.graph.node(owner)?.children().to_vec();
        for child in children {
            self.compile_node(child)?;
        }

        if fake_return {
            self.code.push(Operation::Ret, "");
        }

        self.pop_variables(owner);
        self.code
            .push(Operation::PopStackFrame { scope: owner }, format!("{name}'s scope"));
        Ok(())
    }

    fn push_variables(&mut self, owner: NodeId) {
        for variable in self.graph.variables_of(owner) {
            let name = self.name_of(variable);
            self.code.push(Operation::PushVar { variable }, name);
        }
    }

    fn pop_variables(&mut self, owner: NodeId) {
        for variable in self.graph.variables_of(owner) {
            let name = self.name_of(variable);
            self.code.push(Operation::PopVar { variable }, name);
        }
    }

    fn compile_node(&mut self, id: NodeId) -> Result<(), CompileError> {
        let graph = self.graph;
        match &graph.node(id)?.kind {
            NodeKind::Conditional(_) => self.compile_conditional(id),
            NodeKind::ForLoop(_) => self.compile_for_loop(id),
            NodeKind::WhileLoop(_) => self.compile_while_loop(id),
            NodeKind::Block | NodeKind::Program => self.compile_scope(id, false),
            NodeKind::Instruction(_) => self.compile_instruction(id),
            _ => {
                self.compile_expression(id, None)?;
                Ok(())
            }
        }
    }

    /// Evaluate the expression feeding the instruction, then the instruction
    /// itself, and leave its value in the accumulator.
    fn compile_instruction(&mut self, instruction: NodeId) -> Result<(), CompileError> {
        self.visited.clear();
        self.compile_expression(instruction, Some(instruction))?;
        let ty = self.graph.property(PropertyId::new(instruction, MAIN_PROPERTY))?.ty;
        self.code.push(
            Operation::DerefPtr {
                ptr: PropertyId::new(instruction, MAIN_PROPERTY),
            },
            format!("copy root's value ({ty})"),
        );
        Ok(())
    }

    /// Post-order over dataflow inputs. Variables are only evaluated where
    /// they are declared; elsewhere they are read as they are.
    fn compile_expression(&mut self, id: NodeId, instruction: Option<NodeId>) -> Result<(), CompileError> {
        if !self.visited.insert(id) {
            return Ok(());
        }
        let node = self.graph.node(id)?;
        let sources: Vec<PropertyId> = node
            .properties
            .iter()
            .filter_map(|property| property.input())
            .collect();

        for source in sources {
            let source_node = self.graph.node(source.node)?;
            if let Some(data) = source_node.variable() {
                let declared_here = match (data.declaration, instruction) {
                    (Some(declaration), Some(current)) => declaration == current,
                    (None, _) => true,
                    _ => false,
                };
                if !declared_here {
                    continue;
                }
            }
            self.compile_expression(source.node, instruction)?;
        }

        let node = self.graph.node(id)?;
        let evaluated = matches!(
            node.kind,
            NodeKind::Instruction(_)
                | NodeKind::Variable(_)
                | NodeKind::Literal
                | NodeKind::Operator(_)
                | NodeKind::Function(_)
        );
        if evaluated {
            self.code.push(Operation::EvalNode { node: id }, node.name.clone());
        }
        Ok(())
    }

    /// Evaluate a condition instruction and compare it with `true`; the
    /// accumulator then holds the outcome for `jne`.
    fn compile_condition(&mut self, instruction: NodeId) -> Result<(), CompileError> {
        self.compile_instruction(instruction)?;
        self.code.push(
            Operation::Mov {
                dst: Register::Rdx,
                src: Qword::Bool(true),
            },
            "store true in rdx",
        );
        self.code.push(
            Operation::Cmp {
                left: Register::Rax,
                right: Register::Rdx,
            },
            "compare condition with rdx",
        );
        Ok(())
    }

    fn compile_conditional(&mut self, id: NodeId) -> Result<(), CompileError> {
        let graph = self.graph;
        let node = graph.node(id)?;
        let NodeKind::Conditional(data) = &node.kind else {
            return Ok(());
        };
        let condition = data.condition.ok_or(CompileError::MissingCondition {
            structure: "if",
            node: id,
        })?;
        let branches = node.children().to_vec();

        self.push_variables(id);
        self.compile_condition(condition)?;
        let jump_over_true = self.code.push(Operation::Jne { offset: 0 }, "conditional jump");

        let mut jump_after_else = None;
        if let Some(true_branch) = branches.first() {
            self.compile_node(*true_branch)?;
            if branches.len() > 1 {
                jump_after_else = Some(self.code.push(Operation::Jmp { offset: 0 }, "jump after else"));
            }
        }
        self.code.patch_jump(jump_over_true, self.code.next_line());

        if let Some(false_branch) = branches.get(1) {
            self.compile_node(*false_branch)?;
            if let Some(jump) = jump_after_else {
                self.code.patch_jump(jump, self.code.next_line());
            }
        }
        self.pop_variables(id);
        Ok(())
    }

    fn compile_for_loop(&mut self, id: NodeId) -> Result<(), CompileError> {
        let graph = self.graph;
        let node = graph.node(id)?;
        let NodeKind::ForLoop(data) = &node.kind else {
            return Ok(());
        };
        let (init, iteration) = (data.init, data.iteration);
        let condition = data.condition.ok_or(CompileError::MissingCondition {
            structure: "for",
            node: id,
        })?;
        let body = node.children().first().copied();

        self.push_variables(id);
        if let Some(init) = init {
            self.compile_instruction(init)?;
        }

        let condition_line = self.code.next_line();
        self.compile_condition(condition)?;
        let skip_body = self.code.push(Operation::Jne { offset: 0 }, "jump true branch");

        if let Some(body) = body {
            self.compile_node(body)?;
            if let Some(iteration) = iteration {
                self.compile_instruction(iteration)?;
            }
            let jump_back = self.code.push(Operation::Jmp { offset: 0 }, "jump back to \"for\"");
            self.code.patch_jump(jump_back, condition_line);
        }

        self.code.patch_jump(skip_body, self.code.next_line());
        self.pop_variables(id);
        Ok(())
    }

    fn compile_while_loop(&mut self, id: NodeId) -> Result<(), CompileError> {
        let graph = self.graph;
        let node = graph.node(id)?;
        let NodeKind::WhileLoop(data) = &node.kind else {
            return Ok(());
        };
        let condition = data.condition.ok_or(CompileError::MissingCondition {
            structure: "while",
            node: id,
        })?;
        let body = node.children().first().copied();

        self.push_variables(id);
        let condition_line = self.code.next_line();
        self.compile_condition(condition)?;
        let skip_body = self.code.push(Operation::Jne { offset: 0 }, "jump if not equal");

        if let Some(body) = body {
            self.compile_node(body)?;
            let jump_back = self.code.push(Operation::Jmp { offset: 0 }, "jump back to \"while\"");
            self.code.patch_jump(jump_back, condition_line);
        }

        self.code.patch_jump(skip_body, self.code.next_line());
        self.pop_variables(id);
        Ok(())
    }
}
