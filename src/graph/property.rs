use super::node::NodeId;
use crate::language::types::{Type, Value};
use crate::tokenizer::token::Token;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of a property: owning node plus slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyId {
    pub node: NodeId,
    pub index: usize,
}

impl PropertyId {
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}.{}", self.node, self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    In,
    Out,
    InOut,
}

impl Direction {
    pub fn accepts_input(self) -> bool {
        matches!(self, Direction::In | Direction::InOut)
    }

    pub fn provides_output(self) -> bool {
        matches!(self, Direction::Out | Direction::InOut)
    }
}

/// Brackets recorded around an expression feeding a property.
#[derive(Debug, Clone, PartialEq)]
pub struct Parens {
    pub open: Token,
    pub close: Token,
}

/// Typed value slot owned by a node.
#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub ty: Type,
    pub direction: Direction,
    pub by_ref: bool,
    pub value: Value,
    /// Source formatting at the site feeding this slot.
    pub token: Option<Token>,
    /// Brackets wrapping the connected expression, innermost first.
    pub parens: Vec<Parens>,
    pub(crate) input: Option<PropertyId>,
    pub(crate) outputs: Vec<PropertyId>,
}

impl Property {
    pub fn new(name: impl Into<String>, ty: Type, direction: Direction) -> Self {
        Self {
            name: name.into(),
            ty,
            direction,
            by_ref: false,
            value: Value::default_for(ty),
            token: None,
            parens: Vec::new(),
            input: None,
            outputs: Vec::new(),
        }
    }

    pub fn by_ref(mut self, by_ref: bool) -> Self {
        self.by_ref = by_ref;
        self
    }

    pub fn input(&self) -> Option<PropertyId> {
        self.input
    }

    pub fn outputs(&self) -> &[PropertyId] {
        &self.outputs
    }

    pub fn is_connected(&self) -> bool {
        self.input.is_some()
    }

    /// Editor facing setter: also refreshes the recorded token so the new
    /// value is what gets serialized.
    pub fn set_value(&mut self, value: Value) {
        if let (None, Some(token)) = (self.input, self.token.as_mut()) {
            token.word = value.to_literal();
        }
        self.value = value.cast(self.ty);
    }
}
