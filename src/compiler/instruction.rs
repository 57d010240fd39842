use crate::graph::{NodeId, PropertyId};
use crate::vm::register::{Qword, Register};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    Mov = 0,
    DerefPtr,
    PushVar,
    PopVar,
    PushStackFrame,
    PopStackFrame,
    EvalNode,
    Jmp,
    Jne,
    Cmp,
    Ret,
}

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Mov => "mov",
            Opcode::DerefPtr => "deref_ptr",
            Opcode::PushVar => "push_var",
            Opcode::PopVar => "pop_var",
            Opcode::PushStackFrame => "push_stack_frame",
            Opcode::PopStackFrame => "pop_stack_frame",
            Opcode::EvalNode => "eval_node",
            Opcode::Jmp => "jmp",
            Opcode::Jne => "jne",
            Opcode::Cmp => "cmp",
            Opcode::Ret => "ret",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Opcode with its operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    Mov { dst: Register, src: Qword },
    /// Copy the value behind a property into the accumulator.
    DerefPtr { ptr: PropertyId },
    PushVar { variable: NodeId },
    PopVar { variable: NodeId },
    PushStackFrame { scope: NodeId },
    PopStackFrame { scope: NodeId },
    EvalNode { node: NodeId },
    /// Relative jump.
    Jmp { offset: i64 },
    /// Relative jump taken when the accumulator is false.
    Jne { offset: i64 },
    Cmp { left: Register, right: Register },
    Ret,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub line: usize,
    pub op: Operation,
    pub comment: String,
}

impl Instruction {
    pub fn new(line: usize, op: Operation) -> Self {
        Self {
            line,
            op,
            comment: String::new(),
        }
    }

    pub fn opcode(&self) -> Opcode {
        match self.op {
            Operation::Mov { .. } => Opcode::Mov,
            Operation::DerefPtr { .. } => Opcode::DerefPtr,
            Operation::PushVar { .. } => Opcode::PushVar,
            Operation::PopVar { .. } => Opcode::PopVar,
            Operation::PushStackFrame { .. } => Opcode::PushStackFrame,
            Operation::PopStackFrame { .. } => Opcode::PopStackFrame,
            Operation::EvalNode { .. } => Opcode::EvalNode,
            Operation::Jmp { .. } => Opcode::Jmp,
            Operation::Jne { .. } => Opcode::Jne,
            Operation::Cmp { .. } => Opcode::Cmp,
            Operation::Ret => Opcode::Ret,
        }
    }

    fn operands(&self) -> String {
        match &self.op {
            Operation::Mov { dst, src } => format!("{dst}, {src}"),
            Operation::DerefPtr { ptr } => format!("[{ptr}]"),
            Operation::PushVar { variable } | Operation::PopVar { variable } => format!("{variable:?}"),
            Operation::PushStackFrame { scope } | Operation::PopStackFrame { scope } => {
                format!("{scope:?}")
            }
            Operation::EvalNode { node } => format!("{node:?}"),
            Operation::Jmp { offset } | Operation::Jne { offset } => format!("{offset:+}"),
            Operation::Cmp { left, right } => format!("{left}, {right}"),
            Operation::Ret => String::new(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = format!("{:<16} {}", self.opcode().mnemonic(), self.operands());
        if self.comment.is_empty() {
            write!(f, "{:04}: {}", self.line, body.trim_end())
        } else {
            write!(f, "{:04}: {body}  // {}", self.line, self.comment)
        }
    }
}

#[derive(Debug, Error)]
pub enum BytecodeError {
    #[error("invalid bytecode magic")]
    InvalidMagic,
    #[error("unsupported bytecode version {0}")]
    UnsupportedVersion(u16),
    #[error("io error: {0}")]
    Io(String),
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl From<std::io::Error> for BytecodeError {
    fn from(err: std::io::Error) -> Self {
        BytecodeError::Io(err.to_string())
    }
}

/// Compiled program: a flat instruction list plus the program root it was
/// compiled from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Code {
    instructions: Vec<Instruction>,
    root: Option<NodeId>,
}

impl Code {
    const MAGIC: &'static [u8; 4] = b"NDBC";
    const VERSION: u16 = 1;

    pub fn new(root: NodeId) -> Self {
        Self {
            instructions: Vec::new(),
            root: Some(root),
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, line: usize) -> Option<&Instruction> {
        self.instructions.get(line)
    }

    pub fn next_line(&self) -> usize {
        self.instructions.len()
    }

    /// Append and return the new instruction's line.
    pub fn push(&mut self, op: Operation, comment: impl Into<String>) -> usize {
        let line = self.instructions.len();
        let mut instruction = Instruction::new(line, op);
        instruction.comment = comment.into();
        self.instructions.push(instruction);
        line
    }

    /// Back-patch the offset of a jump emitted earlier.
    pub fn patch_jump(&mut self, line: usize, target: usize) {
        if let Some(instruction) = self.instructions.get_mut(line) {
            let offset = target as i64 - line as i64;
            match &mut instruction.op {
                Operation::Jmp { offset: slot } | Operation::Jne { offset: slot } => *slot = offset,
                _ => {}
            }
        }
    }

    pub fn encode<W: Write>(&self, mut writer: W) -> Result<(), BytecodeError> {
        writer.write_all(Self::MAGIC)?;
        writer.write_all(&Self::VERSION.to_le_bytes())?;
        let payload = bincode::serialize(self).map_err(|err| BytecodeError::Encoding(err.to_string()))?;
        writer.write_all(&(payload.len() as u32).to_le_bytes())?;
        writer.write_all(&payload)?;
        Ok(())
    }

    pub fn serialize(&self) -> Result<Vec<u8>, BytecodeError> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(buf)
    }

    pub fn decode<R: Read>(mut reader: R) -> Result<Self, BytecodeError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != Self::MAGIC {
            return Err(BytecodeError::InvalidMagic);
        }

        let mut version_bytes = [0u8; 2];
        reader.read_exact(&mut version_bytes)?;
        let version = u16::from_le_bytes(version_bytes);
        if version != Self::VERSION {
            return Err(BytecodeError::UnsupportedVersion(version));
        }

        let mut len_bytes = [0u8; 4];
        reader.read_exact(&mut len_bytes)?;
        let mut payload = vec![0u8; u32::from_le_bytes(len_bytes) as usize];
        reader.read_exact(&mut payload)?;
        bincode::deserialize(&payload).map_err(|err| BytecodeError::Encoding(err.to_string()))
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in &self.instructions {
            writeln!(f, "{instruction}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    fn sample() -> Code {
        let mut graph = Graph::new();
        let root = graph.create_root();
        let mut code = Code::new(root);
        code.push(Operation::PushStackFrame { scope: root }, "program's scope");
        code.push(
            Operation::Mov {
                dst: Register::Rdx,
                src: Qword::Bool(true),
            },
            "store true in rdx",
        );
        let jump = code.push(Operation::Jne { offset: 0 }, "");
        code.push(Operation::Ret, "");
        code.patch_jump(jump, code.next_line());
        code
    }

    #[test]
    fn listing_format() {
        let code = sample();
        let listing = code.to_string();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("0001: mov"));
        assert!(lines[1].ends_with("rdx, true  // store true in rdx"));
        assert_eq!(lines[2], format!("0002: {:<16} +2", "jne"));
        assert_eq!(lines[3], "0003: ret");
    }

    #[test]
    fn bytecode_header_is_checked() {
        let code = sample();
        let bytes = code.serialize().expect("encode");
        assert_eq!(&bytes[..4], b"NDBC");
        let decoded = Code::decode(bytes.as_slice()).expect("decode");
        assert_eq!(decoded, code);

        let mut corrupted = bytes.clone();
        corrupted[0] = b'X';
        assert!(matches!(Code::decode(corrupted.as_slice()), Err(BytecodeError::InvalidMagic)));
    }
}
