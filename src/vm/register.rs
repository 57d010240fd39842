use crate::graph::{NodeId, PropertyId};
use crate::language::types::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Register {
    /// Accumulator: last instruction result, comparison result.
    Rax = 0,
    /// Scratch register.
    Rdx,
    /// Instruction pointer.
    Eip,
}

impl Register {
    pub const COUNT: usize = 3;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::Rax => "rax",
            Register::Rdx => "rdx",
            Register::Eip => "eip",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Register word.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Qword {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Pointer(PropertyId),
    Node(NodeId),
}

impl Qword {
    /// Truth value used by `cmp`/`jne`; pointers and handles have none.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Qword::Bool(b) => Some(*b),
            Qword::Int(n) => Some(*n != 0),
            Qword::Double(n) => Some(*n != 0.0),
            Qword::String(s) => Some(!s.is_empty()),
            Qword::Null | Qword::Pointer(_) | Qword::Node(_) => None,
        }
    }

    pub fn as_address(&self) -> Option<usize> {
        match self {
            Qword::Int(n) => usize::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Back to a graph value, when the word holds one.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Qword::Null => Some(Value::Null),
            Qword::Bool(b) => Some(Value::Bool(*b)),
            Qword::Int(n) => i32::try_from(*n).ok().map(Value::Int),
            Qword::Double(n) => Some(Value::Double(*n)),
            Qword::String(s) => Some(Value::String(s.clone())),
            Qword::Pointer(_) | Qword::Node(_) => None,
        }
    }
}

impl From<Value> for Qword {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Qword::Null,
            Value::Bool(b) => Qword::Bool(b),
            Value::Int(n) => Qword::Int(i64::from(n)),
            Value::Double(n) => Qword::Double(n),
            Value::String(s) => Qword::String(s),
        }
    }
}

impl fmt::Display for Qword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Qword::Null => f.write_str("null"),
            Qword::Bool(b) => write!(f, "{b}"),
            Qword::Int(n) => write!(f, "{n}"),
            Qword::Double(n) => write!(f, "{n}"),
            Qword::String(s) => write!(f, "{s:?}"),
            Qword::Pointer(ptr) => write!(f, "&{ptr}"),
            Qword::Node(node) => write!(f, "{node:?}"),
        }
    }
}

/// Register file.
#[derive(Debug, Clone, Default)]
pub struct Cpu {
    registers: [Qword; Register::COUNT],
}

impl Cpu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_registers(&mut self) {
        self.registers = Default::default();
        self.registers[Register::Eip.index()] = Qword::Int(0);
    }

    pub fn read(&self, register: Register) -> &Qword {
        &self.registers[register.index()]
    }

    pub fn write(&mut self, register: Register, value: Qword) {
        self.registers[register.index()] = value;
    }

    pub fn eip(&self) -> usize {
        self.read(Register::Eip).as_address().unwrap_or(0)
    }

    /// Move the instruction pointer by a signed amount; it never goes
    /// below zero.
    pub fn advance(&mut self, amount: i64) {
        let target = (self.eip() as i64).saturating_add(amount).max(0);
        self.write(Register::Eip, Qword::Int(target));
    }
}
