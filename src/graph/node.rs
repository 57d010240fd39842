use super::arena::ArenaHandle;
use super::property::Property;
use crate::language::Function;
use crate::language::signature::Signature;
use crate::tokenizer::token::Token;
use std::sync::Arc;

pub type NodeId = ArenaHandle<Node>;

/// Nested variable environment carried by programs, blocks and the control
/// structures.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// `{` for blocks, leading ignored text for the program.
    pub begin: Option<Token>,
    /// `}` for blocks, trailing ignored text for the program.
    pub end: Option<Token>,
    pub(crate) variables: Vec<NodeId>,
}

impl Scope {
    pub fn variables(&self) -> &[NodeId] {
        &self.variables
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstructionData {
    /// `;` closing the instruction, if any.
    pub token_end: Option<Token>,
}

#[derive(Debug, Clone, Default)]
pub struct VariableData {
    /// False for implicit variables created for unknown identifiers.
    pub declared: bool,
    pub(crate) initialized: bool,
    pub type_token: Option<Token>,
    pub identifier_token: Option<Token>,
    pub assignment_token: Option<Token>,
    /// Instruction where the variable is declared and serialized in full.
    pub declaration: Option<NodeId>,
    /// Node owning the scope the variable is registered in.
    pub scope: Option<NodeId>,
}

impl VariableData {
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Bracket and keyword tokens of `if`, `for` and `while`.
#[derive(Debug, Clone, Default)]
pub struct StructureTokens {
    pub keyword: Option<Token>,
    pub paren_open: Option<Token>,
    pub paren_close: Option<Token>,
}

#[derive(Debug, Clone, Default)]
pub struct ConditionalData {
    pub tokens: StructureTokens,
    pub token_else: Option<Token>,
    pub condition: Option<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct ForLoopData {
    pub tokens: StructureTokens,
    pub init: Option<NodeId>,
    pub condition: Option<NodeId>,
    pub iteration: Option<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct WhileLoopData {
    pub tokens: StructureTokens,
    pub condition: Option<NodeId>,
}

/// Tokens of a call written as `name(arg, arg)`.
#[derive(Debug, Clone, Default)]
pub struct CallTokens {
    /// `name`, or `operator` followed by the operator token.
    pub callee: Vec<Token>,
    pub open: Option<Token>,
    pub separators: Vec<Token>,
    pub close: Option<Token>,
}

/// Operator or function bound to a native, or left abstract when no native
/// matches its signature.
#[derive(Debug, Clone)]
pub struct Invokable {
    pub signature: Signature,
    pub function: Option<Arc<Function>>,
    /// Operator token for infix/prefix notation.
    pub token: Option<Token>,
    /// Call tokens for function notation.
    pub call: Option<CallTokens>,
}

impl Invokable {
    pub fn is_abstract(&self) -> bool {
        self.function.is_none()
    }
}

/// Closed set of node variants.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Program,
    Block,
    Instruction(InstructionData),
    Variable(VariableData),
    Literal,
    Conditional(ConditionalData),
    ForLoop(ForLoopData),
    WhileLoop(WhileLoopData),
    /// Invokable written in operator notation.
    Operator(Invokable),
    /// Invokable written in call notation.
    Function(Invokable),
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Program => "program",
            NodeKind::Block => "block",
            NodeKind::Instruction(_) => "instruction",
            NodeKind::Variable(_) => "variable",
            NodeKind::Literal => "literal",
            NodeKind::Conditional(_) => "conditional",
            NodeKind::ForLoop(_) => "for_loop",
            NodeKind::WhileLoop(_) => "while_loop",
            NodeKind::Operator(_) => "operator",
            NodeKind::Function(_) => "function",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub properties: Vec<Property>,
    pub scope: Option<Scope>,
    pub dirty: bool,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) predecessors: Vec<NodeId>,
    pub(crate) successors: Vec<NodeId>,
    /// Nodes whose variant data points at this one.
    pub(crate) referrers: Vec<NodeId>,
    /// Creation order, shared with edges; drives checkpoint restore.
    pub(crate) sequence: u64,
}

impl Node {
    pub(crate) fn new(name: impl Into<String>, kind: NodeKind, sequence: u64) -> Self {
        Self {
            name: name.into(),
            kind,
            properties: Vec::new(),
            scope: None,
            dirty: true,
            parent: None,
            children: Vec::new(),
            predecessors: Vec::new(),
            successors: Vec::new(),
            referrers: Vec::new(),
            sequence,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn predecessors(&self) -> &[NodeId] {
        &self.predecessors
    }

    pub fn successors(&self) -> &[NodeId] {
        &self.successors
    }

    pub fn has_scope(&self) -> bool {
        self.scope.is_some()
    }

    pub fn property(&self, index: usize) -> Option<&Property> {
        self.properties.get(index)
    }

    pub fn property_by_name(&self, name: &str) -> Option<(usize, &Property)> {
        self.properties
            .iter()
            .enumerate()
            .find(|(_, property)| property.name == name)
    }

    pub fn is_instruction(&self) -> bool {
        matches!(self.kind, NodeKind::Instruction(_))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.kind, NodeKind::Variable(_))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, NodeKind::Literal)
    }

    pub fn variable(&self) -> Option<&VariableData> {
        match &self.kind {
            NodeKind::Variable(data) => Some(data),
            _ => None,
        }
    }

    pub fn variable_mut(&mut self) -> Option<&mut VariableData> {
        match &mut self.kind {
            NodeKind::Variable(data) => Some(data),
            _ => None,
        }
    }

    pub fn invokable(&self) -> Option<&Invokable> {
        match &self.kind {
            NodeKind::Operator(invokable) | NodeKind::Function(invokable) => Some(invokable),
            _ => None,
        }
    }

    pub fn invokable_mut(&mut self) -> Option<&mut Invokable> {
        match &mut self.kind {
            NodeKind::Operator(invokable) | NodeKind::Function(invokable) => Some(invokable),
            _ => None,
        }
    }

    /// Instructions referenced by a control structure (condition, init,
    /// iteration), in source order.
    pub fn structure_instructions(&self) -> Vec<NodeId> {
        match &self.kind {
            NodeKind::Conditional(data) => data.condition.into_iter().collect(),
            NodeKind::ForLoop(data) => [data.init, data.condition, data.iteration]
                .into_iter()
                .flatten()
                .collect(),
            NodeKind::WhileLoop(data) => data.condition.into_iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Drop every reference to `id` held in the node's variant data.
    pub(crate) fn forget(&mut self, id: NodeId) {
        let clear = |slot: &mut Option<NodeId>| {
            if *slot == Some(id) {
                *slot = None;
            }
        };
        match &mut self.kind {
            NodeKind::Variable(data) => {
                clear(&mut data.declaration);
                clear(&mut data.scope);
            }
            NodeKind::Conditional(data) => clear(&mut data.condition),
            NodeKind::ForLoop(data) => {
                clear(&mut data.init);
                clear(&mut data.condition);
                clear(&mut data.iteration);
            }
            NodeKind::WhileLoop(data) => clear(&mut data.condition),
            _ => {}
        }
    }
}
