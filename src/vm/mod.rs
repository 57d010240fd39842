//=============================================
// nodlang/vm/mod.rs
//=============================================
// Author: Nodlang Contributors
// License: Duality Public License (DPL v1.0)
// Goal: Register virtual machine
// Objective: Execute compiled code against the graph it was compiled from,
//            either to completion or one node boundary at a time
// Formatting: Zobie.format (.solvraformat)
//=============================================

//=============================================
//            Section 1: Imports & Errors
//=============================================

pub mod register;

use crate::compiler::instruction::{Code, Instruction, Opcode, Operation};
use crate::graph::{Graph, GraphError, MAIN_PROPERTY, NodeId, NodeKind, PropertyId};
use crate::language::natives::NativeError;
use crate::language::types::{Type, Value};
use register::{Cpu, Qword, Register};
use thiserror::Error;
use tracing::{debug, error, trace};

pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VmError {
    #[error("a program is already loaded, release it first")]
    AlreadyLoaded,
    #[error("no program loaded")]
    NotLoaded,
    #[error("program is not running")]
    NotRunning,
    #[error("program is empty")]
    EmptyProgram,
    #[error("variable {0:?} popped while uninitialized")]
    PopUninitialized(NodeId),
    #[error("null pointer dereference at {0}")]
    NullPointer(PropertyId),
    #[error("node {0:?} no longer exists")]
    DanglingNode(NodeId),
    #[error("'{node}' has no native implementation")]
    NotEvaluable { node: String },
    #[error("native '{node}' failed: {source}")]
    Native {
        node: String,
        #[source]
        source: NativeError,
    },
    #[error("step budget of {0} exceeded")]
    StepBudgetExceeded(u64),
    #[error(transparent)]
    Graph(GraphError),
}

impl From<GraphError> for VmError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::NodeNotFound(id) => VmError::DanglingNode(id),
            GraphError::PropertyNotFound(ptr) => VmError::NullPointer(ptr),
            other => VmError::Graph(other),
        }
    }
}

//=============================================
//            Section 2: Machine State
//=============================================

/// Loads one program at a time and executes it against a graph.
#[derive(Debug, Clone)]
pub struct VirtualMachine {
    cpu: Cpu,
    program: Option<Code>,
    running: bool,
    debugging: bool,
    next_node: Option<NodeId>,
    /// Line of the `eval_node` the last step stopped on.
    last_step: Option<usize>,
    max_steps: u64,
}

impl Default for VirtualMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualMachine {
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            program: None,
            running: false,
            debugging: false,
            next_node: None,
            last_step: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn load_program(&mut self, code: Code) -> Result<(), VmError> {
        if self.running || self.program.is_some() {
            error!(target: "vm", "load_program refused, a program is already loaded");
            return Err(VmError::AlreadyLoaded);
        }
        if code.is_empty() {
            return Err(VmError::EmptyProgram);
        }
        self.cpu.clear_registers();
        self.program = Some(code);
        Ok(())
    }

    /// Stop if needed, clear the registers and hand the program back.
    pub fn release_program(&mut self) -> Option<Code> {
        if self.running {
            // cannot fail while running
            let _ = self.stop_program();
        }
        self.cpu.clear_registers();
        self.last_step = None;
        self.program.take()
    }

    pub fn stop_program(&mut self) -> Result<(), VmError> {
        if !self.running {
            error!(target: "vm", "stop_program failed, program is not running");
            return Err(VmError::NotRunning);
        }
        self.running = false;
        self.debugging = false;
        self.next_node = None;
        self.last_step = None;
        debug!(target: "vm", "program stopped");
        Ok(())
    }

    pub fn program(&self) -> Option<&Code> {
        self.program.as_ref()
    }

    pub fn is_program_running(&self) -> bool {
        self.running
    }

    pub fn is_debugging(&self) -> bool {
        self.debugging
    }

    /// Loaded but not running.
    pub fn is_program_stopped(&self) -> bool {
        self.program.is_some() && !self.running
    }

    pub fn read_register(&self, register: Register) -> &Qword {
        self.cpu.read(register)
    }

    /// Accumulator: value of the last instruction executed.
    pub fn last_result(&self) -> &Qword {
        self.cpu.read(Register::Rax)
    }

    pub fn get_next_instruction(&self) -> Option<&Instruction> {
        self.program.as_ref()?.get(self.cpu.eip())
    }

    /// Node the next step will evaluate.
    pub fn next_node(&self) -> Option<NodeId> {
        self.next_node
    }

    fn next_opcode(&self) -> Option<Opcode> {
        self.get_next_instruction().map(Instruction::opcode)
    }

    //=============================================
    //            Section 3: Execution
    //=============================================

    /// Run from the first instruction until `ret` or the end of the code.
    pub fn run_program(&mut self, graph: &mut Graph) -> Result<(), VmError> {
        if self.program.is_none() {
            return Err(VmError::NotLoaded);
        }
        debug!(target: "vm", "running program");
        self.running = true;
        self.cpu.clear_registers();

        let mut steps: u64 = 0;
        let outcome = loop {
            match self.next_opcode() {
                None | Some(Opcode::Ret) => break Ok(()),
                Some(_) => {}
            }
            steps += 1;
            if steps > self.max_steps {
                break Err(VmError::StepBudgetExceeded(self.max_steps));
            }
            if let Err(err) = self.execute(graph) {
                break Err(err);
            }
        };

        self.running = false;
        self.debugging = false;
        self.next_node = None;
        match &outcome {
            Ok(()) => debug!(target: "vm", steps, "program terminated"),
            Err(err) => error!(target: "vm", %err, steps, "program aborted"),
        }
        outcome
    }

    /// Arm step-by-step execution; nothing is executed until `step_over`.
    pub fn debug_program(&mut self) -> Result<(), VmError> {
        let root = self.program.as_ref().ok_or(VmError::NotLoaded)?.root();
        self.debugging = true;
        self.running = true;
        self.cpu.clear_registers();
        self.next_node = root;
        self.last_step = None;
        debug!(target: "vm", "debugging program");
        Ok(())
    }

    /// Execute up to the next `eval_node` boundary. Returns false once the
    /// program completed, which also stops it.
    pub fn step_over(&mut self, graph: &mut Graph) -> Result<bool, VmError> {
        if !self.running {
            return Err(VmError::NotRunning);
        }

        let mut must_exit = false;
        let mut steps: u64 = 0;
        while let Some(instruction) = self.get_next_instruction() {
            if instruction.opcode() == Opcode::EvalNode && self.last_step != Some(instruction.line) {
                break;
            }
            if instruction.opcode() == Opcode::Ret {
                must_exit = true;
                break;
            }
            steps += 1;
            if steps > self.max_steps {
                return Err(VmError::StepBudgetExceeded(self.max_steps));
            }
            self.execute(graph)?;
        }

        let next = self.get_next_instruction().map(|i| (i.line, i.op.clone()));
        match next {
            Some((line, op)) if !must_exit => {
                self.last_step = Some(line);
                if let Operation::EvalNode { node } = op {
                    self.next_node = Some(node);
                }
                trace!(target: "vm", line, "step over");
                Ok(true)
            }
            _ => {
                self.stop_program()?;
                Ok(false)
            }
        }
    }

    /// Dispatch the instruction under the instruction pointer.
    fn execute(&mut self, graph: &mut Graph) -> Result<(), VmError> {
        let instruction = self
            .get_next_instruction()
            .cloned()
            .ok_or(VmError::NotLoaded)?;
        trace!(target: "vm", "{instruction}");

        match instruction.op {
            Operation::Cmp { left, right } => {
                let equal = self.cpu.read(left).as_bool() == self.cpu.read(right).as_bool();
                self.cpu.write(Register::Rax, Qword::Bool(equal));
                self.cpu.advance(1);
            }
            Operation::DerefPtr { ptr } => {
                let value = graph
                    .property(ptr)
                    .map_err(|_| VmError::NullPointer(ptr))?
                    .value
                    .clone();
                self.cpu.write(Register::Rax, Qword::from(value));
                self.cpu.advance(1);
            }
            Operation::Mov { dst, src } => {
                self.cpu.write(dst, src);
                self.cpu.advance(1);
            }
            Operation::PushVar { variable } => {
                self.cpu.advance(1);
                reset_variable(graph, variable)?;
            }
            Operation::PopVar { variable } => {
                self.cpu.advance(1);
                let node = graph.node(variable).map_err(|_| VmError::DanglingNode(variable))?;
                if !node.variable().is_some_and(|data| data.is_initialized()) {
                    error!(target: "vm", name = %node.name, "variable popped while uninitialized");
                    return Err(VmError::PopUninitialized(variable));
                }
                reset_variable(graph, variable)?;
            }
            Operation::PushStackFrame { .. } | Operation::PopStackFrame { .. } => {
                self.cpu.advance(1);
            }
            Operation::EvalNode { node } => {
                eval_node(graph, node)?;
                self.cpu.advance(1);
            }
            Operation::Jmp { offset } => self.cpu.advance(offset),
            Operation::Jne { offset } => {
                if self.cpu.read(Register::Rax).as_bool() == Some(true) {
                    self.cpu.advance(1);
                } else {
                    self.cpu.advance(offset);
                }
            }
            // halts without moving the instruction pointer
            Operation::Ret => {}
        }
        Ok(())
    }
}

//=============================================
//            Section 4: Node Evaluation
//=============================================

/// Start (or end) a variable's live range: uninitialized, default value.
fn reset_variable(graph: &mut Graph, variable: NodeId) -> Result<(), VmError> {
    let node = graph
        .node_mut(variable)
        .map_err(|_| VmError::DanglingNode(variable))?;
    if let Some(data) = node.variable_mut() {
        data.initialized = false;
    }
    if let Some(value) = node.properties.get_mut(MAIN_PROPERTY) {
        value.value = Value::default_for(value.ty);
    }
    Ok(())
}

fn store(slot_ty: Type, value: Value) -> Value {
    match slot_ty {
        Type::Any | Type::Null => value,
        ty => value.cast(ty),
    }
}

/// Pull connected input values into the node, invoke its native if it has
/// one and clear its dirty flag. An initialized variable is left as is.
pub fn eval_node(graph: &mut Graph, id: NodeId) -> Result<(), VmError> {
    let node = graph.node_mut(id).map_err(|_| VmError::DanglingNode(id))?;
    let mut transfer_inputs = true;
    if let Some(data) = node.variable_mut() {
        if data.initialized {
            transfer_inputs = false;
        } else {
            data.initialized = true;
        }
    }

    if transfer_inputs {
        let inputs: Vec<(usize, PropertyId)> = node
            .properties
            .iter()
            .enumerate()
            .filter_map(|(index, property)| property.input().map(|source| (index, source)))
            .collect();
        for (index, source) in inputs {
            let value = graph.property(source)?.value.clone();
            let slot = graph.property_mut(PropertyId::new(id, index))?;
            slot.value = store(slot.ty, value);
        }
    }

    let node = graph.node(id)?;
    let invocation = match &node.kind {
        NodeKind::Operator(invokable) | NodeKind::Function(invokable) => {
            let function = invokable.function.clone().ok_or_else(|| VmError::NotEvaluable {
                node: node.name.clone(),
            })?;
            Some((function, node.name.clone()))
        }
        _ => None,
    };

    if let Some((function, name)) = invocation {
        let mut args: Vec<Value> = node.properties[1..]
            .iter()
            .map(|property| property.value.clone())
            .collect();
        let result = (function.native)(&mut args).map_err(|source| VmError::Native {
            node: name.clone(),
            source,
        })?;

        let result_slot = graph.property_mut(PropertyId::new(id, MAIN_PROPERTY))?;
        result_slot.value = store(result_slot.ty, result);

        // by reference arguments are written back to their source
        for (index, arg) in function.signature.args.iter().enumerate() {
            if !arg.by_ref {
                continue;
            }
            let input = PropertyId::new(id, index + 1);
            let value = args.get(index).cloned().unwrap_or_default();
            let source = graph.source_of(input);
            let slot = graph.property_mut(input)?;
            slot.value = store(slot.ty, value.clone());
            if let Some(source) = source {
                let target = graph.property_mut(source)?;
                target.value = store(target.ty, value);
            }
        }
        trace!(target: "vm", node = %name, "native invoked");
    }

    graph.node_mut(id)?.dirty = false;
    Ok(())
}

//=============================================
//            Section 5: Tests
//=============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::language::Language;
    use crate::parser::parse;

    fn load(source: &str) -> (Graph, VirtualMachine) {
        let language = Language::new();
        let mut graph = Graph::new();
        parse(&language, &mut graph, source, false).expect("parse");
        let code = compile(&graph).expect("compile");
        let mut vm = VirtualMachine::new();
        vm.load_program(code).expect("load");
        (graph, vm)
    }

    #[test]
    fn run_leaves_result_in_accumulator() {
        let (mut graph, mut vm) = load("2*(5+3);");
        vm.run_program(&mut graph).expect("run");
        assert_eq!(vm.last_result(), &Qword::Int(16));
        assert!(vm.is_program_stopped());
    }

    #[test]
    fn second_load_requires_release() {
        let (_, mut vm) = load("1;");
        let other = vm.program().cloned().expect("program");
        assert_eq!(vm.load_program(other.clone()), Err(VmError::AlreadyLoaded));
        assert!(vm.release_program().is_some());
        assert!(vm.load_program(other).is_ok());
    }

    #[test]
    fn stop_requires_running_program() {
        let (_, mut vm) = load("1;");
        assert_eq!(vm.stop_program(), Err(VmError::NotRunning));
    }

    #[test]
    fn step_budget_is_enforced() {
        let (mut graph, vm) = load("int i = 0; while (i < 10) { i = i + 1; }");
        let mut vm = vm.with_max_steps(5);
        assert_eq!(vm.run_program(&mut graph), Err(VmError::StepBudgetExceeded(5)));
        assert!(!vm.is_program_running());
    }

    #[test]
    fn stepping_stops_on_eval_node() {
        let (mut graph, mut vm) = load("int a = 1; a + 2;");
        vm.debug_program().expect("debug");
        assert!(vm.is_debugging());
        while vm.step_over(&mut graph).expect("step") {
            let next = vm.get_next_instruction().expect("next");
            assert_eq!(next.opcode(), Opcode::EvalNode);
        }
        assert!(!vm.is_program_running());
        assert_eq!(vm.last_result(), &Qword::Int(3));
    }

    #[test]
    fn native_failure_is_reported() {
        let (mut graph, mut vm) = load("1/0;");
        assert!(matches!(
            vm.run_program(&mut graph),
            Err(VmError::Native {
                source: NativeError::DivisionByZero,
                ..
            })
        ));
    }
}
