pub mod compiler;
pub mod config;
pub mod errors;
pub mod graph;
pub mod language;
pub mod parser;
pub mod serializer;
pub mod session;
pub mod tokenizer;
pub mod vm;

pub use compiler::compile;
pub use compiler::instruction::{Code, Instruction, Opcode, Operation};
pub use config::EngineConfig;
pub use errors::{EngineError, ErrorCode};
pub use graph::{Graph, NodeId, PropertyId};
pub use language::Language;
pub use language::types::{Type, Value};
pub use parser::{ParseError, Parser, parse};
pub use serializer::{Serializer, serialize};
pub use session::Session;
pub use vm::VirtualMachine;
pub use vm::register::{Qword, Register};
