//=============================================
// nodlang/parser/mod.rs
//=============================================
// Author: Nodlang Contributors
// License: Duality Public License (DPL v1.0)
// Goal: Nodlang recursive descent parser implementation
// Objective: Build the graph of a program from a token ribbon, undoing both
//            token consumption and graph mutations when a production fails
// Formatting: Zobie.format (.solvraformat)
//=============================================

//=============================================
//            Section 1: Imports
//=============================================

use crate::graph::{
    Edge, Graph, GraphResult, MAIN_PROPERTY, NodeId, NodeKind, Parens, PropertyId, SideEffects,
};
use crate::language::signature::Signature;
use crate::language::types::{Type, Value, unquote};
use crate::language::{Language, OperatorKind};
use crate::tokenizer::ribbon::Ribbon;
use crate::tokenizer::token::{Position, Token, TokenKind};
use crate::tokenizer::{TokenizeError, tokenize};
use thiserror::Error;
use tracing::{debug, error, trace, warn};

//=============================================
//            Section 2: Parse Errors
//=============================================

/// Parser error types
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("Scanner error: {0}")]
    Tokenize(#[from] TokenizeError),
    #[error("Syntax error: unexpected close bracket at {position}")]
    UnexpectedCloseBracket { position: Position },
    #[error("Syntax error: bracket count mismatch, {count} still opened")]
    UnclosedBrackets { count: usize },
    #[error("Unable to parse token {index} '{word}' at {position}, program is not complete")]
    UnexpectedToken {
        index: usize,
        word: String,
        position: Position,
    },
    #[error("Expecting declaration for symbol '{name}' at {position} (strict mode)")]
    UndeclaredIdentifier { name: String, position: Position },
}

//=============================================
//            Section 3: Parser Core
//=============================================

/// Output slot produced by an expression, with the formatting that belongs
/// to the site consuming it.
#[derive(Debug, Clone)]
struct Operand {
    property: PropertyId,
    /// Identifier token for variable references.
    token: Option<Token>,
    parens: Vec<Parens>,
}

impl Operand {
    fn of(property: PropertyId) -> Self {
        Self {
            property,
            token: None,
            parens: Vec::new(),
        }
    }
}

fn graph_ok<T>(result: GraphResult<T>) -> Option<T> {
    result
        .map_err(|err| debug!(target: "parser", %err, "graph refused mutation"))
        .ok()
}

pub struct Parser<'a> {
    language: &'a Language,
    graph: &'a mut Graph,
    ribbon: Ribbon,
    scopes: Vec<NodeId>,
    strict_mode: bool,
    undeclared: Option<(String, Position)>,
}

impl<'a> Parser<'a> {
    pub fn new(language: &'a Language, graph: &'a mut Graph) -> Self {
        Self {
            language,
            graph,
            ribbon: Ribbon::new(),
            scopes: Vec::new(),
            strict_mode: false,
            undeclared: None,
        }
    }

    /// Refuse identifiers that were never declared instead of creating
    /// implicit variables for them.
    pub fn strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn ribbon(&self) -> &Ribbon {
        &self.ribbon
    }

    /// Parse `source` into the graph and return the program root. On
    /// failure the graph is left cleared.
    pub fn parse(&mut self, source: &str) -> Result<NodeId, ParseError> {
        self.graph.clear();
        self.scopes.clear();
        self.undeclared = None;

        self.ribbon = tokenize(self.language, source).map_err(|err| {
            error!(target: "parser", %err, "tokenize failed");
            ParseError::from(err)
        })?;

        if let Err(err) = self.check_brackets() {
            error!(target: "parser", %err, "syntax check failed");
            return Err(err);
        }

        let root = self.parse_program();

        if let Some(token) = self.ribbon.peek() {
            let err = match self.undeclared.take() {
                Some((name, position)) => ParseError::UndeclaredIdentifier { name, position },
                None => ParseError::UnexpectedToken {
                    index: self.ribbon.cursor(),
                    word: token.word.clone(),
                    position: token.position,
                },
            };
            error!(target: "parser", %err, "parse failed");
            self.graph.clear();
            return Err(err);
        }

        self.graph.clear_dirty();
        debug!(target: "parser", nodes = self.graph.node_count(), edges = self.graph.edge_count(), "parse succeeded");
        Ok(root)
    }

    /// Every close bracket must match an opened one, and none may stay open.
    fn check_brackets(&self) -> Result<(), ParseError> {
        let mut opened: usize = 0;
        for token in self.ribbon.tokens() {
            match token.kind {
                TokenKind::ExprBegin => opened += 1,
                TokenKind::ExprEnd => {
                    opened = opened.checked_sub(1).ok_or(ParseError::UnexpectedCloseBracket {
                        position: token.position,
                    })?;
                }
                _ => {}
            }
        }
        if opened > 0 {
            return Err(ParseError::UnclosedBrackets { count: opened });
        }
        Ok(())
    }

    /// Run a production as a transaction: on failure the ribbon cursor, the
    /// graph and the scope stack return to their state before the attempt.
    fn transaction<T>(
        &mut self,
        production: &'static str,
        body: impl FnOnce(&mut Self) -> Option<T>,
    ) -> Option<T> {
        self.ribbon.transaction_start();
        let checkpoint = self.graph.checkpoint();
        let depth = self.scopes.len();

        let result = body(self);

        if result.is_some() {
            self.ribbon.transaction_commit();
        } else {
            self.ribbon.transaction_rollback();
            self.graph.restore(checkpoint);
            self.scopes.truncate(depth);
        }
        trace!(target: "parser", production, ok = result.is_some(), cursor = self.ribbon.cursor());
        result
    }

    fn current_scope(&self) -> Option<NodeId> {
        self.scopes.last().copied()
    }

    fn type_of(&self, operand: &Operand) -> Type {
        self.graph
            .property(operand.property)
            .map(|property| property.ty)
            .unwrap_or(Type::Any)
    }

    /// Record the consuming site's formatting on `input`.
    fn dress(&mut self, input: PropertyId, token: Option<Token>, parens: Vec<Parens>) -> Option<()> {
        let slot = graph_ok(self.graph.property_mut(input))?;
        if token.is_some() {
            slot.token = token;
        }
        slot.parens = parens;
        Some(())
    }

    fn plug(&mut self, operand: Operand, input: PropertyId) -> Option<()> {
        graph_ok(self.graph.connect_or_merge(operand.property, input))?;
        self.dress(input, operand.token, operand.parens)
    }

    fn plug_instruction(&mut self, operand: Operand, instruction: NodeId) -> Option<()> {
        graph_ok(self.graph.connect_to_instruction(operand.property, instruction))?;
        self.dress(
            PropertyId::new(instruction, MAIN_PROPERTY),
            operand.token,
            operand.parens,
        )
    }

    /// Header instructions are held by the structure's data, not by edges.
    fn note_header(&mut self, structure: NodeId, headers: impl Iterator<Item = NodeId>) -> Option<()> {
        for header in headers {
            graph_ok(self.graph.note_reference(structure, header))?;
        }
        Some(())
    }

    fn adopt(&mut self, child: NodeId) -> Option<()> {
        let parent = self.current_scope()?;
        graph_ok(self.graph.connect(Edge::Child { parent, child }, SideEffects::On))
    }

    //=============================================
    //            Section 4: Statements
    //=============================================

    fn parse_program(&mut self) -> NodeId {
        let root = self.graph.create_root();
        self.scopes.push(root);

        // a program may be empty
        self.parse_code_block();

        if let Ok(node) = self.graph.node_mut(root) {
            if let Some(scope) = node.scope.as_mut() {
                scope.begin = Some(self.ribbon.prefix.clone());
                scope.end = Some(self.ribbon.suffix.clone());
            }
        }
        self.scopes.pop();
        root
    }

    fn parse_code_block(&mut self) -> Option<()> {
        self.transaction("code_block", |p| {
            let owner = p.current_scope()?;
            while p.ribbon.has_remaining() {
                if let Some(instruction) = p.parse_instr() {
                    p.adopt(instruction)?;
                    continue;
                }
                if p.parse_conditional().is_some()
                    || p.parse_for_loop().is_some()
                    || p.parse_while_loop().is_some()
                    || p.parse_scope().is_some()
                {
                    continue;
                }
                break;
            }
            let has_children = graph_ok(p.graph.node(owner))
                .is_some_and(|node| !node.children().is_empty());
            has_children.then_some(())
        })
    }

    fn parse_instr(&mut self) -> Option<NodeId> {
        self.transaction("instruction", |p| {
            let expression = p.parse_expression(0, None)?;
            let instruction = p.graph.create_instruction();

            if p.ribbon.has_remaining() {
                if let Some(end) = p.ribbon.eat_if(TokenKind::EndOfInstruction) {
                    if let Ok(node) = p.graph.node_mut(instruction) {
                        if let NodeKind::Instruction(data) = &mut node.kind {
                            data.token_end = Some(end);
                        }
                    }
                } else if !matches!(
                    p.ribbon.peek_kind(),
                    Some(TokenKind::ExprEnd) | Some(TokenKind::ScopeEnd)
                ) {
                    return None;
                }
            }

            p.plug_instruction(expression, instruction)?;
            Some(instruction)
        })
    }

    fn parse_scope(&mut self) -> Option<NodeId> {
        self.transaction("scope", |p| {
            let begin = p.ribbon.eat_if(TokenKind::ScopeBegin)?;
            let block = p.graph.create_scope();
            p.adopt(block)?;
            p.scopes.push(block);

            p.parse_code_block();

            let end = p.ribbon.eat_if(TokenKind::ScopeEnd)?;
            p.scopes.pop();

            let scope = graph_ok(p.graph.node_mut(block))?.scope.as_mut()?;
            scope.begin = Some(begin);
            scope.end = Some(end);
            Some(block)
        })
    }

    fn parse_conditional(&mut self) -> Option<NodeId> {
        self.transaction("conditional", |p| {
            let token_if = p.ribbon.eat_if(TokenKind::KeywordIf)?;
            let conditional = p.graph.create_conditional();
            p.adopt(conditional)?;
            p.scopes.push(conditional);

            let paren_open = p.ribbon.eat_if(TokenKind::ExprBegin)?;
            let (condition, paren_close) = match p.ribbon.eat_if(TokenKind::ExprEnd) {
                Some(close) => (None, close),
                None => {
                    let condition = p.parse_instr()?;
                    (Some(condition), p.ribbon.eat_if(TokenKind::ExprEnd)?)
                }
            };

            p.parse_scope()?;

            let token_else = p.ribbon.eat_if(TokenKind::KeywordElse);
            if token_else.is_some() && p.parse_scope().is_none() && p.parse_conditional().is_none() {
                return None;
            }
            p.scopes.pop();

            if let NodeKind::Conditional(data) = &mut graph_ok(p.graph.node_mut(conditional))?.kind {
                data.tokens.keyword = Some(token_if);
                data.tokens.paren_open = Some(paren_open);
                data.tokens.paren_close = Some(paren_close);
                data.token_else = token_else;
                data.condition = condition;
            }
            p.note_header(conditional, condition.into_iter())?;
            Some(conditional)
        })
    }

    fn parse_for_loop(&mut self) -> Option<NodeId> {
        self.transaction("for_loop", |p| {
            let token_for = p.ribbon.eat_if(TokenKind::KeywordFor)?;
            let for_loop = p.graph.create_for_loop();
            p.adopt(for_loop)?;
            p.scopes.push(for_loop);

            let paren_open = p.ribbon.eat_if(TokenKind::ExprBegin)?;
            let init = p.parse_instr()?;
            let condition = p.parse_instr()?;
            let iteration = p.parse_instr()?;
            let paren_close = p.ribbon.eat_if(TokenKind::ExprEnd)?;
            p.parse_scope()?;
            p.scopes.pop();

            if let NodeKind::ForLoop(data) = &mut graph_ok(p.graph.node_mut(for_loop))?.kind {
                data.tokens.keyword = Some(token_for);
                data.tokens.paren_open = Some(paren_open);
                data.tokens.paren_close = Some(paren_close);
                data.init = Some(init);
                data.condition = Some(condition);
                data.iteration = Some(iteration);
            }
            p.note_header(for_loop, [init, condition, iteration].into_iter())?;
            Some(for_loop)
        })
    }

    fn parse_while_loop(&mut self) -> Option<NodeId> {
        self.transaction("while_loop", |p| {
            let token_while = p.ribbon.eat_if(TokenKind::KeywordWhile)?;
            let while_loop = p.graph.create_while_loop();
            p.adopt(while_loop)?;
            p.scopes.push(while_loop);

            let paren_open = p.ribbon.eat_if(TokenKind::ExprBegin)?;
            let condition = p.parse_instr()?;
            let paren_close = p.ribbon.eat_if(TokenKind::ExprEnd)?;
            p.parse_scope()?;
            p.scopes.pop();

            if let NodeKind::WhileLoop(data) = &mut graph_ok(p.graph.node_mut(while_loop))?.kind {
                data.tokens.keyword = Some(token_while);
                data.tokens.paren_open = Some(paren_open);
                data.tokens.paren_close = Some(paren_close);
                data.condition = Some(condition);
            }
            p.note_header(while_loop, std::iter::once(condition))?;
            Some(while_loop)
        })
    }

    //=============================================
    //            Section 5: Expressions
    //=============================================

    /// Precedence climbing: a binary operator extends `left` only when its
    /// precedence is strictly greater than `precedence` (zero never refuses).
    fn parse_expression(&mut self, precedence: u8, left_override: Option<Operand>) -> Option<Operand> {
        if !self.ribbon.has_remaining() {
            return left_override;
        }

        let mut left = left_override;
        if left.is_none() {
            left = self.parse_parenthesis();
        }
        if left.is_none() {
            left = self.parse_unary();
        }
        if left.is_none() {
            left = self.parse_function_call();
        }
        if left.is_none() {
            left = self.parse_variable_declaration();
        }
        if left.is_none() {
            left = self.parse_atomic();
        }

        if !self.ribbon.has_remaining() {
            return left;
        }
        let left = left?;

        match self.parse_binary(precedence, left.clone()) {
            Some(result) if !self.ribbon.has_remaining() => Some(result),
            Some(result) => self.parse_expression(precedence, Some(result)),
            None => Some(left),
        }
    }

    fn parse_binary(&mut self, precedence: u8, left: Operand) -> Option<Operand> {
        if !self.ribbon.can_eat(2) {
            return None;
        }
        self.transaction("binary", |p| {
            let operator_token = p.ribbon.eat()?;
            if operator_token.kind != TokenKind::Operator
                || p.ribbon.peek_kind() == Some(TokenKind::Operator)
            {
                return None;
            }

            let operator_precedence = p
                .language
                .find_operator(&operator_token.word, OperatorKind::Binary)?
                .precedence;
            if operator_precedence <= precedence && precedence > 0 {
                return None;
            }

            let right = p.parse_expression(operator_precedence, None)?;

            let candidate = Signature::new(operator_token.word.clone(), Type::Any)
                .with_args(&[p.type_of(&left), p.type_of(&right)]);
            let node = p.create_operator(candidate);
            if let Some(invokable) = graph_ok(p.graph.node_mut(node))?.invokable_mut() {
                invokable.token = Some(operator_token);
            }

            p.plug(left, PropertyId::new(node, 1))?;
            p.plug(right, PropertyId::new(node, 2))?;
            Some(Operand::of(PropertyId::new(node, MAIN_PROPERTY)))
        })
    }

    fn parse_unary(&mut self) -> Option<Operand> {
        if !self.ribbon.can_eat(2) {
            return None;
        }
        self.transaction("unary", |p| {
            let operator_token = p.ribbon.eat()?;
            if operator_token.kind != TokenKind::Operator {
                return None;
            }

            let mut operand = p.parse_atomic();
            if operand.is_none() {
                operand = p.parse_parenthesis();
            }
            let operand = operand?;

            let candidate = Signature::new(operator_token.word.clone(), Type::Any)
                .with_arg(p.type_of(&operand));
            let node = p.create_operator(candidate);
            if let Some(invokable) = graph_ok(p.graph.node_mut(node))?.invokable_mut() {
                invokable.token = Some(operator_token);
            }

            p.plug(operand, PropertyId::new(node, 1))?;
            Some(Operand::of(PropertyId::new(node, MAIN_PROPERTY)))
        })
    }

    /// Operator node bound to the best native, or abstract if none fits.
    fn create_operator(&mut self, candidate: Signature) -> NodeId {
        match self.language.find_function(&candidate) {
            Some(function) => self.graph.create_operator(function),
            None => {
                warn!(target: "parser", signature = %candidate, "no native operator, creating an abstract one");
                self.graph.create_abstract_operator(candidate)
            }
        }
    }

    fn parse_atomic(&mut self) -> Option<Operand> {
        if !self.ribbon.has_remaining() {
            return None;
        }
        self.transaction("atomic", |p| {
            let token = p.ribbon.eat()?;
            if token.kind == TokenKind::Operator {
                return None;
            }
            p.parse_token(token)
        })
    }

    fn parse_token(&mut self, token: Token) -> Option<Operand> {
        let value = match token.kind {
            TokenKind::Identifier => return self.parse_identifier(token),
            TokenKind::LiteralBool => Value::Bool(token.word == "true"),
            TokenKind::LiteralInt => Value::Int(token.word.parse().ok()?),
            TokenKind::LiteralDouble => Value::Double(token.word.parse().ok()?),
            TokenKind::LiteralString => Value::String(unquote(&token.word)),
            _ => return None,
        };
        let literal = self.graph.create_literal(value);
        let output = PropertyId::new(literal, MAIN_PROPERTY);
        graph_ok(self.graph.property_mut(output))?.token = Some(token);
        Some(Operand::of(output))
    }

    fn parse_identifier(&mut self, token: Token) -> Option<Operand> {
        let scope = self.current_scope()?;
        let variable = match self.graph.find_variable(scope, &token.word) {
            Some(variable) => variable,
            None if self.strict_mode => {
                error!(target: "parser", name = %token.word, "expecting declaration (strict mode)");
                self.undeclared
                    .get_or_insert_with(|| (token.word.clone(), token.position));
                return None;
            }
            None => {
                warn!(target: "parser", name = %token.word, "expecting declaration, compilation will fail");
                graph_ok(self.graph.create_undeclared_variable(&token.word, scope))?
            }
        };
        Some(Operand {
            property: PropertyId::new(variable, MAIN_PROPERTY),
            token: Some(token),
            parens: Vec::new(),
        })
    }

    fn parse_parenthesis(&mut self) -> Option<Operand> {
        if !self.ribbon.has_remaining() {
            return None;
        }
        self.transaction("parenthesis", |p| {
            let open = p.ribbon.eat_if(TokenKind::ExprBegin)?;
            let mut inner = p.parse_expression(0, None)?;
            let close = p.ribbon.eat_if(TokenKind::ExprEnd)?;
            inner.parens.push(Parens { open, close });
            Some(inner)
        })
    }

    /// `name(args)` or `operator<op>(args)`.
    fn parse_function_call(&mut self) -> Option<Operand> {
        if !self.ribbon.can_eat(3) {
            return None;
        }
        self.transaction("function_call", |p| {
            let first = p.ribbon.eat()?;
            let second = p.ribbon.eat()?;
            let (identifier, callee, open) =
                if first.kind == TokenKind::Identifier && second.kind == TokenKind::ExprBegin {
                    (first.word.clone(), vec![first], second)
                } else {
                    let third = p.ribbon.eat()?;
                    if first.kind != TokenKind::KeywordOperator
                        || second.kind != TokenKind::Operator
                        || third.kind != TokenKind::ExprBegin
                    {
                        return None;
                    }
                    (second.word.clone(), vec![first, second], third)
                };

            let mut args = Vec::new();
            let mut separators = Vec::new();
            while p.ribbon.has_remaining() && p.ribbon.peek_kind() != Some(TokenKind::ExprEnd) {
                args.push(p.parse_expression(0, None)?);
                if let Some(separator) = p.ribbon.eat_if(TokenKind::ListSeparator) {
                    separators.push(separator);
                }
            }
            let close = p.ribbon.eat_if(TokenKind::ExprEnd)?;

            let types: Vec<Type> = args.iter().map(|arg| p.type_of(arg)).collect();
            let candidate = Signature::new(identifier, Type::Any).with_args(&types);
            let node = match p.language.find_function(&candidate) {
                Some(function) => p.graph.create_function(function),
                None => {
                    warn!(target: "parser", signature = %candidate, "no native function, creating an abstract one");
                    p.graph.create_abstract_function(candidate)
                }
            };
            if let Some(invokable) = graph_ok(p.graph.node_mut(node))?.invokable_mut() {
                invokable.call = Some(crate::graph::CallTokens {
                    callee,
                    open: Some(open),
                    separators,
                    close: Some(close),
                });
            }

            for (index, arg) in args.into_iter().enumerate() {
                p.plug(arg, PropertyId::new(node, index + 1))?;
            }
            Some(Operand::of(PropertyId::new(node, MAIN_PROPERTY)))
        })
    }

    /// `type name [= expression]`.
    fn parse_variable_declaration(&mut self) -> Option<Operand> {
        if !self.ribbon.can_eat(2) {
            return None;
        }
        self.transaction("variable_declaration", |p| {
            let type_token = p.ribbon.eat()?;
            let identifier_token = p.ribbon.eat()?;
            let ty = p.language.type_of(type_token.kind)?;
            if identifier_token.kind != TokenKind::Identifier {
                return None;
            }

            let scope = p.current_scope()?;
            let variable = graph_ok(p.graph.create_variable(ty, &identifier_token.word, scope))?;

            let assignment = p
                .ribbon
                .peek()
                .filter(|token| token.kind == TokenKind::Operator && token.word == "=")
                .is_some();
            let assignment_token = if assignment { p.ribbon.eat() } else { None };

            if assignment_token.is_some() {
                let expression = p.parse_expression(0, None)?;
                let expression_type = p.type_of(&expression);
                if !expression_type.is_implicitly_convertible(ty) {
                    error!(
                        target: "parser",
                        name = %identifier_token.word,
                        from = %expression_type,
                        to = %ty,
                        "unable to assign expression to variable"
                    );
                    return None;
                }
                p.plug(expression, PropertyId::new(variable, MAIN_PROPERTY))?;
            }

            if let Some(data) = graph_ok(p.graph.node_mut(variable))?.variable_mut() {
                data.type_token = Some(type_token);
                data.identifier_token = Some(identifier_token);
                data.assignment_token = assignment_token;
            }
            Some(Operand::of(PropertyId::new(variable, MAIN_PROPERTY)))
        })
    }
}

/// Parse `source` into `graph` with a throwaway parser.
pub fn parse(
    language: &Language,
    graph: &mut Graph,
    source: &str,
    strict_mode: bool,
) -> Result<NodeId, ParseError> {
    Parser::new(language, graph).strict_mode(strict_mode).parse(source)
}

//=============================================
//            Section 6: Tests
//=============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> (Graph, NodeId) {
        let language = Language::new();
        let mut graph = Graph::new();
        let root = parse(&language, &mut graph, source, false).expect("parse");
        (graph, root)
    }

    #[test]
    fn binary_chain_is_left_deep() {
        let (graph, root) = parse_ok("1-2-3;");
        let instruction = graph.node(root).expect("root").children()[0];
        let top = graph
            .source_of(PropertyId::new(instruction, MAIN_PROPERTY))
            .expect("connected");
        let lvalue = graph
            .source_of(PropertyId::new(top.node, 1))
            .expect("left is an operator");
        assert!(matches!(graph.node(lvalue.node).expect("node").kind, NodeKind::Operator(_)));
        // the right literal was digested
        assert_eq!(graph.source_of(PropertyId::new(top.node, 2)), None);
    }

    #[test]
    fn failed_call_leaves_graph_untouched() {
        let language = Language::new();
        let mut graph = Graph::new();
        let mut parser = Parser::new(&language, &mut graph);
        parser.ribbon = tokenize(&language, "dna_to_protein(\"GATACA\"").expect("tokenize");
        let root = parser.graph.create_root();
        parser.scopes.push(root);
        let (nodes, edges) = (parser.graph.node_count(), parser.graph.edge_count());

        assert!(parser.parse_function_call().is_none());

        assert_eq!(parser.ribbon.cursor(), 0);
        assert_eq!(parser.graph.node_count(), nodes);
        assert_eq!(parser.graph.edge_count(), edges);
        parser.graph.check_invariants().expect("invariants");
    }

    #[test]
    fn failed_declaration_releases_name() {
        let language = Language::new();
        let mut graph = Graph::new();
        let mut parser = Parser::new(&language, &mut graph);
        parser.ribbon = tokenize(&language, "int a = \"text\"").expect("tokenize");
        let root = parser.graph.create_root();
        parser.scopes.push(root);

        assert!(parser.parse_variable_declaration().is_none());
        assert!(parser.graph.variables_of(root).is_empty());
        assert_eq!(parser.graph.node_count(), 1);
    }

    #[test]
    fn undeclared_identifier_in_strict_mode() {
        let language = Language::new();
        let mut graph = Graph::new();
        let err = parse(&language, &mut graph, "a + 1;", true).expect_err("strict");
        match err {
            ParseError::UndeclaredIdentifier { name, .. } => assert_eq!(name, "a"),
            other => panic!("expected undeclared identifier, found {other:?}"),
        }
        assert!(graph.is_empty());
    }

    #[test]
    fn unbalanced_brackets_rejected_before_parsing() {
        let language = Language::new();
        let mut graph = Graph::new();
        assert_eq!(
            parse(&language, &mut graph, "(1+2", false),
            Err(ParseError::UnclosedBrackets { count: 1 })
        );
        assert!(matches!(
            parse(&language, &mut graph, "1+2)", false),
            Err(ParseError::UnexpectedCloseBracket { .. })
        ));
    }

    #[test]
    fn scanner_errors_keep_their_source() {
        use std::error::Error as _;
        let language = Language::new();
        let mut graph = Graph::new();
        let err = parse(&language, &mut graph, "int a = \"open;", false).expect_err("unterminated");
        assert!(matches!(err, ParseError::Tokenize(TokenizeError::UnterminatedString { .. })));
        assert!(err.to_string().starts_with("Scanner error: unterminated string literal"));
        assert!(err.source().is_some());
    }

    #[test]
    fn leftover_tokens_clear_graph() {
        let language = Language::new();
        let mut graph = Graph::new();
        let err = parse(&language, &mut graph, "int a = 1; }", false).expect_err("leftover");
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn unknown_function_becomes_abstract() {
        let (graph, root) = parse_ok("dna_to_protein(\"GATACA\");");
        let instruction = graph.node(root).expect("root").children()[0];
        let call = graph
            .source_of(PropertyId::new(instruction, MAIN_PROPERTY))
            .expect("call");
        let invokable = graph.node(call.node).expect("node").invokable().expect("invokable");
        assert!(invokable.is_abstract());
    }

    #[test]
    fn scope_lookup_sees_outer_declarations() {
        let (graph, _) = parse_ok("int a = 1; { int b = a; }");
        graph.check_invariants().expect("invariants");
        let undeclared = graph
            .nodes()
            .filter_map(|(_, node)| node.variable())
            .filter(|data| !data.declared)
            .count();
        assert_eq!(undeclared, 0);
    }
}
