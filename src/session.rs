//=============================================
// nodlang/session.rs
//=============================================
// Author: Nodlang Contributors
// License: Duality Public License (DPL v1.0)
// Goal: Per-document engine state
// Objective: Own one language, graph, configuration and virtual machine and
//            chain parse, serialize, compile and execution over them
// Formatting: Zobie.format (.solvraformat)
//=============================================

use crate::compiler::{self, instruction::Code};
use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::graph::{Graph, NodeId};
use crate::language::Language;
use crate::parser::Parser;
use crate::serializer::Serializer;
use crate::vm::VirtualMachine;
use crate::vm::register::Qword;
use tracing::debug;

/// One open document. Sessions share nothing with each other.
#[derive(Debug)]
pub struct Session {
    language: Language,
    config: EngineConfig,
    graph: Graph,
    vm: VirtualMachine,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Session {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_language(Language::new(), config)
    }

    pub fn with_language(language: Language, config: EngineConfig) -> Self {
        let vm = VirtualMachine::new().with_max_steps(config.max_steps);
        Self {
            language,
            config,
            graph: Graph::new(),
            vm,
        }
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn vm(&self) -> &VirtualMachine {
        &self.vm
    }

    /// Replace the graph with the program in `source`. Any loaded program
    /// is released first since it refers to the old graph.
    pub fn parse(&mut self, source: &str) -> Result<NodeId, EngineError> {
        self.vm.release_program();
        let root = Parser::new(&self.language, &mut self.graph)
            .strict_mode(self.config.strict_mode)
            .parse(source)?;
        Ok(root)
    }

    pub fn serialize(&self) -> Result<String, EngineError> {
        Ok(Serializer::new(&self.language, &self.graph).serialize_program()?)
    }

    pub fn parse_and_serialize(&mut self, source: &str) -> Result<String, EngineError> {
        self.parse(source)?;
        self.serialize()
    }

    /// Run `source`, then print the graph back. Running must not disturb
    /// the recorded text.
    pub fn parse_eval_and_serialize(&mut self, source: &str) -> Result<String, EngineError> {
        self.eval(source)?;
        self.serialize()
    }

    pub fn compile(&self) -> Result<Code, EngineError> {
        Ok(compiler::compile(&self.graph)?)
    }

    /// Compile the current graph and load it, replacing any loaded program.
    pub fn load(&mut self) -> Result<(), EngineError> {
        let code = self.compile()?;
        self.vm.release_program();
        self.vm.load_program(code)?;
        Ok(())
    }

    /// Run the loaded program to completion.
    pub fn run(&mut self) -> Result<&Qword, EngineError> {
        self.vm.run_program(&mut self.graph)?;
        Ok(self.vm.last_result())
    }

    pub fn debug(&mut self) -> Result<(), EngineError> {
        self.vm.debug_program()?;
        Ok(())
    }

    /// Advance to the next node boundary; false once the program ended.
    pub fn step_over(&mut self) -> Result<bool, EngineError> {
        Ok(self.vm.step_over(&mut self.graph)?)
    }

    /// Parse, compile, load and run `source`, returning the accumulator.
    pub fn eval(&mut self, source: &str) -> Result<Qword, EngineError> {
        self.parse(source)?;
        self.load()?;
        let result = self.run()?.clone();
        debug!(target: "vm", %result, "evaluated");
        Ok(result)
    }
}
