//! Graph to source text.
//!
//! Every token recorded by the parser is written back with its surrounding
//! ignored text, so `serialize(parse(source)) == source`. Nodes created by
//! an editor carry no tokens and fall back to canonical spellings.

use crate::graph::{Graph, GraphError, MAIN_PROPERTY, Node, NodeId, NodeKind, PropertyId};
use crate::language::types::Type;
use crate::language::{Language, OperatorKind};
use crate::tokenizer::token::Token;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SerializeError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("type {0} has no keyword, variable '{1}' cannot be declared")]
    UnknownType(Type, String),
}

pub type SerializeResult = Result<(), SerializeError>;

pub struct Serializer<'a> {
    language: &'a Language,
    graph: &'a Graph,
}

impl<'a> Serializer<'a> {
    pub fn new(language: &'a Language, graph: &'a Graph) -> Self {
        Self { language, graph }
    }

    pub fn serialize(&self, node: NodeId) -> Result<String, SerializeError> {
        let mut out = String::new();
        self.write_node(&mut out, node)?;
        Ok(out)
    }

    /// The whole program, or an empty string for an empty graph.
    pub fn serialize_program(&self) -> Result<String, SerializeError> {
        match self.graph.root() {
            Some(root) => self.serialize(root),
            None => Ok(String::new()),
        }
    }

    fn write_node(&self, out: &mut String, id: NodeId) -> SerializeResult {
        let node = self.graph.node(id)?;
        match &node.kind {
            NodeKind::Program => {
                let scope = node.scope.as_ref();
                write_token(out, scope.and_then(|s| s.begin.as_ref()));
                self.write_children(out, node)?;
                write_token(out, scope.and_then(|s| s.end.as_ref()));
            }
            NodeKind::Block => {
                let scope = node.scope.as_ref();
                write_token_or(out, scope.and_then(|s| s.begin.as_ref()), "{");
                self.write_children(out, node)?;
                write_token_or(out, scope.and_then(|s| s.end.as_ref()), "}");
            }
            NodeKind::Instruction(data) => {
                self.write_input(out, PropertyId::new(id, MAIN_PROPERTY))?;
                write_token(out, data.token_end.as_ref());
            }
            NodeKind::Variable(_) => self.write_declaration(out, id, node)?,
            NodeKind::Literal => self.write_literal(out, PropertyId::new(id, MAIN_PROPERTY))?,
            NodeKind::Conditional(data) => {
                write_token_or(out, data.tokens.keyword.as_ref(), "if");
                write_token_or(out, data.tokens.paren_open.as_ref(), "(");
                if let Some(condition) = data.condition {
                    self.write_node(out, condition)?;
                }
                write_token_or(out, data.tokens.paren_close.as_ref(), ")");
                let children = node.children();
                if let Some(branch) = children.first() {
                    self.write_node(out, *branch)?;
                }
                if let Some(alternative) = children.get(1) {
                    write_token_or(out, data.token_else.as_ref(), " else ");
                    self.write_node(out, *alternative)?;
                }
            }
            NodeKind::ForLoop(data) => {
                write_token_or(out, data.tokens.keyword.as_ref(), "for");
                write_token_or(out, data.tokens.paren_open.as_ref(), "(");
                for part in [data.init, data.condition, data.iteration].into_iter().flatten() {
                    self.write_node(out, part)?;
                }
                write_token_or(out, data.tokens.paren_close.as_ref(), ")");
                self.write_children(out, node)?;
            }
            NodeKind::WhileLoop(data) => {
                write_token_or(out, data.tokens.keyword.as_ref(), "while");
                write_token_or(out, data.tokens.paren_open.as_ref(), "(");
                if let Some(condition) = data.condition {
                    self.write_node(out, condition)?;
                }
                write_token_or(out, data.tokens.paren_close.as_ref(), ")");
                self.write_children(out, node)?;
            }
            NodeKind::Operator(invokable) => match invokable.signature.arity() {
                1 => {
                    write_token_or(out, invokable.token.as_ref(), &invokable.signature.identifier);
                    let operand = PropertyId::new(id, 1);
                    let brackets = invokable.token.is_none() && self.is_binary_source(operand);
                    self.write_operand(out, operand, brackets)?;
                }
                2 => self.write_binary(out, id, node)?,
                _ => self.write_call(out, id, node)?,
            },
            NodeKind::Function(_) => self.write_call(out, id, node)?,
        }
        Ok(())
    }

    fn write_children(&self, out: &mut String, node: &Node) -> SerializeResult {
        for child in node.children() {
            self.write_node(out, *child)?;
        }
        Ok(())
    }

    //=============================================
    // Expressions
    //=============================================

    /// Input property: brackets, the consuming site's formatting around the
    /// connected source, or the digested token when nothing is connected.
    fn write_input(&self, out: &mut String, id: PropertyId) -> SerializeResult {
        let property = self.graph.property(id)?;
        for parens in property.parens.iter().rev() {
            parens.open.write_to(out);
        }
        match property.input() {
            Some(source) => {
                if let Some(token) = &property.token {
                    out.push_str(&token.prefix);
                }
                self.write_source(out, source, id)?;
                if let Some(token) = &property.token {
                    out.push_str(&token.suffix);
                }
            }
            None => match &property.token {
                Some(token) => token.write_to(out),
                None => out.push_str(&property.value.to_literal()),
            },
        }
        for parens in &property.parens {
            parens.close.write_to(out);
        }
        Ok(())
    }

    fn write_source(&self, out: &mut String, source: PropertyId, consumer: PropertyId) -> SerializeResult {
        let node = self.graph.node(source.node)?;
        match &node.kind {
            NodeKind::Variable(_) if self.is_declaration_site(node, source, consumer) => {
                self.write_declaration(out, source.node, node)
            }
            NodeKind::Variable(_) => {
                out.push_str(&node.name);
                Ok(())
            }
            NodeKind::Literal => self.write_literal(out, source),
            _ => self.write_node(out, source.node),
        }
    }

    /// A variable is written in full where it is declared: its declaring
    /// instruction, or its first consumer when it has none.
    fn is_declaration_site(&self, node: &Node, source: PropertyId, consumer: PropertyId) -> bool {
        let Some(data) = node.variable() else {
            return false;
        };
        if !data.declared {
            return false;
        }
        match data.declaration {
            Some(instruction) => consumer == PropertyId::new(instruction, MAIN_PROPERTY),
            None => node
                .property(source.index)
                .and_then(|property| property.outputs().first())
                == Some(&consumer),
        }
    }

    fn write_literal(&self, out: &mut String, id: PropertyId) -> SerializeResult {
        let property = self.graph.property(id)?;
        match &property.token {
            Some(token) => token.write_to(out),
            None => out.push_str(&property.value.to_literal()),
        }
        Ok(())
    }

    fn write_declaration(&self, out: &mut String, id: NodeId, node: &Node) -> SerializeResult {
        let Some(data) = node.variable() else {
            return Ok(());
        };
        let value = PropertyId::new(id, MAIN_PROPERTY);
        let property = self.graph.property(value)?;

        match &data.type_token {
            Some(token) => token.write_to(out),
            None => {
                let (_, keyword) = self
                    .language
                    .type_keyword(property.ty)
                    .ok_or_else(|| SerializeError::UnknownType(property.ty, node.name.clone()))?;
                out.push_str(keyword);
                out.push(' ');
            }
        }

        // the name may have been edited since parsing
        match &data.identifier_token {
            Some(token) => {
                out.push_str(&token.prefix);
                out.push_str(&node.name);
                out.push_str(&token.suffix);
            }
            None => out.push_str(&node.name),
        }

        if property.is_connected() {
            write_token_or(out, data.assignment_token.as_ref(), " = ");
            self.write_input(out, value)?;
        }
        Ok(())
    }

    fn write_binary(&self, out: &mut String, id: NodeId, node: &Node) -> SerializeResult {
        let Some(invokable) = node.invokable() else {
            return Ok(());
        };
        let (left, right) = (PropertyId::new(id, 1), PropertyId::new(id, 2));

        // parsed operators keep their recorded parentheses only
        let (left_brackets, right_brackets) = match (&invokable.token, self.precedence_of(id)) {
            (None, Some(own)) => (
                self.source_precedence(left).is_some_and(|p| p < own),
                self.source_precedence(right).is_some_and(|p| p < own || (p == own && own > 0)),
            ),
            _ => (false, false),
        };

        self.write_operand(out, left, left_brackets)?;
        write_token_or(out, invokable.token.as_ref(), &invokable.signature.identifier);
        self.write_operand(out, right, right_brackets)
    }

    fn write_operand(&self, out: &mut String, id: PropertyId, brackets: bool) -> SerializeResult {
        let brackets = brackets && self.graph.property(id)?.parens.is_empty();
        if brackets {
            out.push('(');
        }
        self.write_input(out, id)?;
        if brackets {
            out.push(')');
        }
        Ok(())
    }

    fn write_call(&self, out: &mut String, id: NodeId, node: &Node) -> SerializeResult {
        let Some(invokable) = node.invokable() else {
            return Ok(());
        };
        let arity = invokable.signature.arity();
        match &invokable.call {
            Some(call) => {
                for token in &call.callee {
                    token.write_to(out);
                }
                write_token_or(out, call.open.as_ref(), "(");
                for index in 0..arity {
                    self.write_input(out, PropertyId::new(id, index + 1))?;
                    match call.separators.get(index) {
                        Some(separator) => separator.write_to(out),
                        None if index + 1 < arity => out.push(','),
                        None => {}
                    }
                }
                write_token_or(out, call.close.as_ref(), ")");
            }
            None => {
                let identifier = &invokable.signature.identifier;
                if self.is_operator(identifier) {
                    out.push_str("operator");
                }
                out.push_str(identifier);
                out.push('(');
                for index in 0..arity {
                    if index > 0 {
                        out.push(',');
                    }
                    self.write_input(out, PropertyId::new(id, index + 1))?;
                }
                out.push(')');
            }
        }
        Ok(())
    }

    //=============================================
    // Precedence
    //=============================================

    fn is_operator(&self, identifier: &str) -> bool {
        self.language
            .operators()
            .iter()
            .any(|op| op.identifier == identifier)
    }

    /// Precedence of an operator node; function nodes have none.
    fn precedence_of(&self, id: NodeId) -> Option<u8> {
        match &self.graph.node(id).ok()?.kind {
            NodeKind::Operator(invokable) => self
                .language
                .precedence(&invokable.signature.identifier, invokable.signature.arity()),
            _ => None,
        }
    }

    fn source_precedence(&self, input: PropertyId) -> Option<u8> {
        let source = self.graph.source_of(input)?;
        self.precedence_of(source.node)
    }

    fn is_binary_source(&self, input: PropertyId) -> bool {
        self.graph.source_of(input).is_some_and(|source| {
            matches!(
                self.graph.node(source.node).map(|node| &node.kind),
                Ok(NodeKind::Operator(invokable))
                    if OperatorKind::from_arity(invokable.signature.arity()) == Some(OperatorKind::Binary)
            )
        })
    }
}

fn write_token(out: &mut String, token: Option<&Token>) {
    if let Some(token) = token {
        token.write_to(out);
    }
}

fn write_token_or(out: &mut String, token: Option<&Token>, fallback: &str) {
    match token {
        Some(token) => token.write_to(out),
        None => out.push_str(fallback),
    }
}

/// Serialize `node` and everything it owns.
pub fn serialize(language: &Language, graph: &Graph, node: NodeId) -> Result<String, SerializeError> {
    Serializer::new(language, graph).serialize(node)
}
