//=============================================
// nodlang/graph/mod.rs
//=============================================
// Author: Nodlang Contributors
// License: Duality Public License (DPL v1.0)
// Goal: Graph intermediate representation
// Objective: Own every node and edge of a program and keep the containment,
//            control-flow and dataflow relations consistent under mutation
// Formatting: Zobie.format (.solvraformat)
//=============================================

//=============================================
//            Section 1: Modules & Imports
//=============================================

pub mod arena;
pub mod node;
pub mod property;

pub use node::{
    CallTokens, ConditionalData, ForLoopData, InstructionData, Invokable, Node, NodeId, NodeKind,
    Scope, StructureTokens, VariableData, WhileLoopData,
};
pub use property::{Direction, Parens, Property, PropertyId};

use crate::language::Function;
use crate::language::signature::Signature;
use crate::language::types::{Type, Value};
use arena::Arena;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Slot of the main property of a node: the instruction root, the variable
/// or literal value, the invokable result.
pub const MAIN_PROPERTY: usize = 0;

//=============================================
//            Section 2: Errors & Edges
//=============================================

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    #[error("node {0:?} does not exist")]
    NodeNotFound(NodeId),
    #[error("property {0} does not exist")]
    PropertyNotFound(PropertyId),
    #[error("node {0:?} has no scope")]
    NoScope(NodeId),
    #[error("variable '{0}' is already declared in this scope")]
    DuplicateVariable(String),
    #[error("property {0} already has an input")]
    InputAlreadyConnected(PropertyId),
    #[error("node {0:?} already has a parent")]
    AlreadyHasParent(NodeId),
    #[error("cannot connect {output} to {input}: wrong direction")]
    DirectionMismatch {
        output: PropertyId,
        input: PropertyId,
    },
    #[error("type {from} is not implicitly convertible to {to}")]
    IncompatibleTypes { from: Type, to: Type },
    #[error("a node cannot be connected to itself")]
    SelfConnection,
    #[error("edge {0:?} does not exist")]
    EdgeNotFound(Edge),
    #[error("graph invariant violated: {0}")]
    InvariantViolated(String),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Relation between two nodes, or between two properties for dataflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    /// Lexical containment.
    Child { parent: NodeId, child: NodeId },
    /// Execution order.
    Next { previous: NodeId, next: NodeId },
    /// Value flowing from an output property into an input property.
    Value { output: PropertyId, input: PropertyId },
}

/// Whether a connect/disconnect also applies the derived relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffects {
    On,
    Off,
}

/// Creation high-water mark; everything created after it can be dropped
/// with [`Graph::restore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    sequence: u64,
}

//=============================================
//            Section 3: Graph & Creation
//=============================================

/// Nodes live in the arena and edges in a map to their creation sequence.
/// Both are also appended to creation logs so a restore only walks what came
/// after the checkpoint; log entries whose target is gone are skipped.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Arena<Node>,
    edges: HashMap<Edge, u64>,
    node_log: Vec<(u64, NodeId)>,
    edge_log: Vec<(u64, Edge)>,
    root: Option<NodeId>,
    sequence: u64,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        debug!(target: "graph", nodes = self.nodes.len(), edges = self.edges.len(), "clearing graph");
        self.nodes.clear();
        self.edges.clear();
        self.node_log.clear();
        self.edge_log.clear();
        self.root = None;
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(id)
    }

    pub fn node(&self, id: NodeId) -> GraphResult<&Node> {
        self.nodes.get(id).ok_or(GraphError::NodeNotFound(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> GraphResult<&mut Node> {
        self.nodes.get_mut(id).ok_or(GraphError::NodeNotFound(id))
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    /// Live edges in creation order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edge_log
            .iter()
            .filter(|(sequence, edge)| self.edges.get(edge) == Some(sequence))
            .map(|(_, edge)| edge)
    }

    pub fn property(&self, id: PropertyId) -> GraphResult<&Property> {
        self.node(id.node)?
            .properties
            .get(id.index)
            .ok_or(GraphError::PropertyNotFound(id))
    }

    pub fn property_mut(&mut self, id: PropertyId) -> GraphResult<&mut Property> {
        self.node_mut(id.node)?
            .properties
            .get_mut(id.index)
            .ok_or(GraphError::PropertyNotFound(id))
    }

    /// Node feeding the main property of `id`, if connected.
    pub fn source_of(&self, id: PropertyId) -> Option<PropertyId> {
        self.property(id).ok().and_then(Property::input)
    }

    /// Set every node's dirty flag to false.
    pub fn clear_dirty(&mut self) {
        for (_, node) in self.nodes.iter_mut() {
            node.dirty = false;
        }
    }

    fn next_sequence(&mut self) -> u64 {
        let sequence = self.sequence;
        self.sequence += 1;
        sequence
    }

    fn insert(&mut self, name: impl Into<String>, kind: NodeKind) -> NodeId {
        let sequence = self.next_sequence();
        let node = Node::new(name, kind, sequence);
        let id = self.nodes.allocate(node);
        self.node_log.push((sequence, id));
        if self.node_log.len() > 2 * self.nodes.len() + 64 {
            let nodes = &self.nodes;
            self.node_log.retain(|(_, id)| nodes.contains(*id));
        }
        trace!(target: "graph", ?id, "node created");
        id
    }

    fn insert_with_scope(&mut self, name: &str, kind: NodeKind) -> NodeId {
        let id = self.insert(name, kind);
        if let Some(node) = self.nodes.get_mut(id) {
            node.scope = Some(Scope::default());
        }
        id
    }

    fn push_property(&mut self, id: NodeId, property: Property) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.properties.push(property);
        }
    }

    /// Program node owning the outermost scope. Replaces any previous root.
    pub fn create_root(&mut self) -> NodeId {
        let id = self.insert_with_scope("program", NodeKind::Program);
        self.root = Some(id);
        id
    }

    /// Block `{ ... }` with its own scope.
    pub fn create_scope(&mut self) -> NodeId {
        self.insert_with_scope("scope", NodeKind::Block)
    }

    pub fn create_instruction(&mut self) -> NodeId {
        let id = self.insert("instruction", NodeKind::Instruction(InstructionData::default()));
        self.push_property(id, Property::new("root", Type::Any, Direction::In));
        id
    }

    pub fn create_conditional(&mut self) -> NodeId {
        self.insert_with_scope("if", NodeKind::Conditional(ConditionalData::default()))
    }

    pub fn create_for_loop(&mut self) -> NodeId {
        self.insert_with_scope("for", NodeKind::ForLoop(ForLoopData::default()))
    }

    pub fn create_while_loop(&mut self) -> NodeId {
        self.insert_with_scope("while", NodeKind::WhileLoop(WhileLoopData::default()))
    }

    pub fn create_literal(&mut self, value: Value) -> NodeId {
        let id = self.insert("literal", NodeKind::Literal);
        let mut property = Property::new("value", value.ty(), Direction::Out);
        property.value = value;
        self.push_property(id, property);
        id
    }

    /// Declared variable registered in the scope owned by `scope_owner`.
    pub fn create_variable(
        &mut self,
        ty: Type,
        name: &str,
        scope_owner: NodeId,
    ) -> GraphResult<NodeId> {
        self.create_variable_impl(ty, name, scope_owner, true)
    }

    /// Implicit variable for an identifier that was never declared.
    pub fn create_undeclared_variable(
        &mut self,
        name: &str,
        scope_owner: NodeId,
    ) -> GraphResult<NodeId> {
        self.create_variable_impl(Type::Null, name, scope_owner, false)
    }

    fn create_variable_impl(
        &mut self,
        ty: Type,
        name: &str,
        scope_owner: NodeId,
        declared: bool,
    ) -> GraphResult<NodeId> {
        let owner = self.node(scope_owner)?;
        let scope = owner.scope.as_ref().ok_or(GraphError::NoScope(scope_owner))?;
        let duplicate = scope
            .variables
            .iter()
            .filter_map(|var| self.nodes.get(*var))
            .any(|var| var.name == name);
        if duplicate {
            return Err(GraphError::DuplicateVariable(name.to_string()));
        }

        let data = VariableData {
            declared,
            scope: Some(scope_owner),
            ..VariableData::default()
        };
        let id = self.insert(name, NodeKind::Variable(data));
        self.push_property(id, Property::new("value", ty, Direction::InOut));
        if let Some(scope) = self.node_mut(scope_owner)?.scope.as_mut() {
            scope.variables.push(id);
        }
        Ok(id)
    }

    pub fn create_operator(&mut self, function: Arc<Function>) -> NodeId {
        let signature = function.signature.clone();
        self.create_invokable(signature, Some(function), true)
    }

    pub fn create_function(&mut self, function: Arc<Function>) -> NodeId {
        let signature = function.signature.clone();
        self.create_invokable(signature, Some(function), false)
    }

    /// Operator with no native behind it: serializable, not evaluable.
    pub fn create_abstract_operator(&mut self, signature: Signature) -> NodeId {
        self.create_invokable(signature, None, true)
    }

    pub fn create_abstract_function(&mut self, signature: Signature) -> NodeId {
        self.create_invokable(signature, None, false)
    }

    fn create_invokable(
        &mut self,
        signature: Signature,
        function: Option<Arc<Function>>,
        operator: bool,
    ) -> NodeId {
        let name = signature.identifier.clone();
        let arity = signature.arity();
        let return_type = signature.return_type;
        let args = signature.args.clone();
        let invokable = Invokable {
            signature,
            function,
            token: None,
            call: None,
        };
        let kind = if operator {
            NodeKind::Operator(invokable)
        } else {
            NodeKind::Function(invokable)
        };
        let id = self.insert(name, kind);
        self.push_property(id, Property::new("result", return_type, Direction::Out));
        for (index, arg) in args.iter().enumerate() {
            let arg_name = match (operator, arity, index) {
                (true, 1, _) => "value".to_string(),
                (true, 2, 0) => "lvalue".to_string(),
                (true, 2, _) => "rvalue".to_string(),
                _ => format!("arg{index}"),
            };
            let property = Property::new(arg_name, arg.ty, Direction::In).by_ref(arg.by_ref);
            self.push_property(id, property);
        }
        id
    }

    //=============================================
    //            Section 4: Scopes
    //=============================================

    /// Look `name` up in the scope of `scope_owner`, then in the scopes of
    /// its ancestors. Inner declarations shadow outer ones.
    pub fn find_variable(&self, scope_owner: NodeId, name: &str) -> Option<NodeId> {
        let mut current = Some(scope_owner);
        while let Some(id) = current {
            let node = self.nodes.get(id)?;
            if let Some(scope) = &node.scope {
                let found = scope
                    .variables
                    .iter()
                    .copied()
                    .find(|var| self.nodes.get(*var).is_some_and(|v| v.name == name));
                if found.is_some() {
                    return found;
                }
            }
            current = node.parent;
        }
        None
    }

    /// Variables declared directly in the scope of `owner`.
    pub fn variables_of(&self, owner: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(owner)
            .and_then(|node| node.scope.as_ref())
            .map(|scope| scope.variables.clone())
            .unwrap_or_default()
    }

    /// Last instructions reachable through the children of a scope owner,
    /// descending into nested scopes.
    pub fn last_instructions(&self, owner: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_last_instructions(owner, &mut out);
        out
    }

    fn collect_last_instructions(&self, owner: NodeId, out: &mut Vec<NodeId>) {
        let Some(node) = self.nodes.get(owner) else {
            return;
        };
        let last = node.children.last().copied();
        for child_id in &node.children {
            let Some(child) = self.nodes.get(*child_id) else {
                continue;
            };
            if child.is_instruction() {
                if last == Some(*child_id) {
                    out.push(*child_id);
                }
            } else if child.has_scope() {
                self.collect_last_instructions(*child_id, out);
            }
        }
    }

    fn is_descendant(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.nodes.get(id).and_then(|node| node.parent);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.nodes.get(parent).and_then(|node| node.parent);
        }
        false
    }

    //=============================================
    //            Section 5: Connect
    //=============================================

    pub fn connect(&mut self, edge: Edge, side_effects: SideEffects) -> GraphResult<()> {
        match edge {
            Edge::Child { parent, child } => self.connect_child(parent, child, side_effects),
            Edge::Next { previous, next } => self.connect_next(previous, next, side_effects),
            Edge::Value { output, input } => self.connect_value(output, input, side_effects),
        }
    }

    fn register_edge(&mut self, edge: Edge) {
        let sequence = self.next_sequence();
        trace!(target: "graph", ?edge, "edge created");
        self.edges.insert(edge, sequence);
        self.edge_log.push((sequence, edge));
        if self.edge_log.len() > 2 * self.edges.len() + 64 {
            let edges = &self.edges;
            self.edge_log.retain(|(sequence, edge)| edges.get(edge) == Some(sequence));
        }
    }

    pub fn has_edge(&self, edge: &Edge) -> bool {
        self.edges.contains_key(edge)
    }

    fn connect_child(
        &mut self,
        parent: NodeId,
        child: NodeId,
        side_effects: SideEffects,
    ) -> GraphResult<()> {
        if parent == child {
            return Err(GraphError::SelfConnection);
        }
        self.node(parent)?;
        if self.node(child)?.parent.is_some() {
            return Err(GraphError::AlreadyHasParent(child));
        }
        self.register_edge(Edge::Child { parent, child });
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);

        if side_effects == SideEffects::On {
            self.thread_new_child(parent, child)?;
        }
        Ok(())
    }

    /// Control-flow for a freshly appended child: the parent itself flows
    /// into its first child, later children follow the previous sibling (or
    /// every last instruction nested in it).
    fn thread_new_child(&mut self, parent: NodeId, child: NodeId) -> GraphResult<()> {
        let parent_node = self.node(parent)?;
        if parent_node.successors.is_empty() {
            return self.connect_next(parent, child, SideEffects::Off);
        }
        let siblings = &parent_node.children;
        let Some(previous) = siblings.len().checked_sub(2).map(|i| siblings[i]) else {
            return Ok(());
        };
        if self.node(previous)?.has_scope() {
            for instruction in self.last_instructions(previous) {
                self.connect_next(instruction, child, SideEffects::Off)?;
            }
            Ok(())
        } else {
            self.connect_next(previous, child, SideEffects::Off)
        }
    }

    fn connect_next(
        &mut self,
        previous: NodeId,
        next: NodeId,
        side_effects: SideEffects,
    ) -> GraphResult<()> {
        if previous == next {
            return Err(GraphError::SelfConnection);
        }
        self.node(previous)?;
        self.node(next)?;
        let edge = Edge::Next { previous, next };
        if self.has_edge(&edge) {
            return Ok(());
        }
        self.register_edge(edge);
        self.node_mut(previous)?.successors.push(next);
        self.node_mut(next)?.predecessors.push(previous);

        if side_effects == SideEffects::On {
            self.adopt_successor(previous, next)?;
        }
        Ok(())
    }

    /// A scope owner adopts what follows it as a child; otherwise the
    /// successor joins the previous node's parent, along with the chain of
    /// parentless successors hanging after it.
    fn adopt_successor(&mut self, previous: NodeId, next: NodeId) -> GraphResult<()> {
        let previous_node = self.node(previous)?;
        let parent = if previous_node.has_scope() {
            previous
        } else if let Some(parent) = previous_node.parent {
            parent
        } else {
            return Ok(());
        };

        let mut current = Some(next);
        while let Some(id) = current {
            let node = self.node(id)?;
            if node.parent.is_some() || id == parent {
                break;
            }
            let following = node.successors.first().copied();
            self.connect_child(parent, id, SideEffects::Off)?;
            current = following;
        }
        Ok(())
    }

    fn connect_value(
        &mut self,
        output: PropertyId,
        input: PropertyId,
        side_effects: SideEffects,
    ) -> GraphResult<()> {
        if output.node == input.node {
            return Err(GraphError::SelfConnection);
        }
        let source = self.property(output)?;
        let target = self.property(input)?;
        if !source.direction.provides_output() || !target.direction.accepts_input() {
            return Err(GraphError::DirectionMismatch { output, input });
        }
        if target.input.is_some() {
            return Err(GraphError::InputAlreadyConnected(input));
        }
        if !source.ty.is_implicitly_convertible(target.ty) {
            return Err(GraphError::IncompatibleTypes {
                from: source.ty,
                to: target.ty,
            });
        }

        self.register_edge(Edge::Value { output, input });
        self.property_mut(output)?.outputs.push(input);
        self.property_mut(input)?.input = Some(output);

        if side_effects == SideEffects::On && self.node(output.node)?.is_literal() {
            // the destination keeps the literal's surrounding formatting
            let moved = self.property_mut(output)?.token.as_mut().map(|t| t.take_formatting());
            if let Some(token) = moved {
                self.property_mut(input)?.token = Some(token);
            }
        }
        Ok(())
    }

    /// Connect `output` into `input`, or digest it when the output belongs to
    /// a literal that does not feed a variable: the value and token move
    /// into the input and the literal node is destroyed.
    ///
    /// Returns true when an edge was created.
    pub fn connect_or_merge(&mut self, output: PropertyId, input: PropertyId) -> GraphResult<bool> {
        let source_is_literal = self.node(output.node)?.is_literal();
        let target_is_variable = self.node(input.node)?.is_variable();
        if !(source_is_literal && !target_is_variable) {
            self.connect_value(output, input, SideEffects::On)?;
            return Ok(true);
        }

        let literal = self.property(output)?;
        let (value, token, source_ty) = (literal.value.clone(), literal.token.clone(), literal.ty);
        let target = self.property_mut(input)?;
        if !source_ty.is_implicitly_convertible(target.ty) {
            return Err(GraphError::IncompatibleTypes {
                from: source_ty,
                to: target.ty,
            });
        }
        target.value = match target.ty {
            Type::Any | Type::Null => value,
            ty => value.cast(ty),
        };
        target.token = token;
        trace!(target: "graph", node = ?output.node, "literal digested");
        self.destroy(output.node)?;
        Ok(false)
    }

    /// Plug an expression into the root of an instruction. A variable with
    /// no declaring instruction yet takes this one.
    pub fn connect_to_instruction(&mut self, output: PropertyId, instruction: NodeId) -> GraphResult<bool> {
        let created = self.connect_or_merge(output, PropertyId::new(instruction, MAIN_PROPERTY))?;
        let mut declared = false;
        if let Ok(node) = self.node_mut(output.node) {
            if let Some(data) = node.variable_mut() {
                if data.declaration.is_none() {
                    data.declaration = Some(instruction);
                    declared = true;
                }
            }
        }
        if declared {
            self.note_reference(output.node, instruction)?;
        }
        Ok(created)
    }

    /// Plug an expression into a variable's value.
    pub fn connect_to_variable(&mut self, output: PropertyId, variable: NodeId) -> GraphResult<bool> {
        self.connect_or_merge(output, PropertyId::new(variable, MAIN_PROPERTY))
    }

    /// Record that the variant data of `holder` points at `target` (a loop
    /// header, a condition, a declaring instruction), so destroying `target`
    /// clears the reference.
    pub fn note_reference(&mut self, holder: NodeId, target: NodeId) -> GraphResult<()> {
        self.node(holder)?;
        let referrers = &mut self.node_mut(target)?.referrers;
        if !referrers.contains(&holder) {
            referrers.push(holder);
        }
        Ok(())
    }

    //=============================================
    //            Section 6: Disconnect & Destroy
    //=============================================

    pub fn disconnect(&mut self, edge: Edge, side_effects: SideEffects) -> GraphResult<()> {
        self.edges.remove(&edge).ok_or(GraphError::EdgeNotFound(edge))?;
        trace!(target: "graph", ?edge, "edge removed");

        match edge {
            Edge::Child { parent, child } => {
                if let Ok(node) = self.node_mut(parent) {
                    remove_last(&mut node.children, &child);
                }
                if let Ok(node) = self.node_mut(child) {
                    node.parent = None;
                }
                if side_effects == SideEffects::On {
                    self.unthread_child(parent, child)?;
                }
            }
            Edge::Next { previous, next } => {
                let parent = self.nodes.get(next).and_then(|node| node.parent);
                if let Ok(node) = self.node_mut(previous) {
                    remove_last(&mut node.successors, &next);
                }
                if let Ok(node) = self.node_mut(next) {
                    remove_last(&mut node.predecessors, &previous);
                }
                if let (SideEffects::On, Some(parent)) = (side_effects, parent) {
                    self.release_successors(parent, next)?;
                }
            }
            Edge::Value { output, input } => {
                if let Ok(property) = self.property_mut(output) {
                    remove_last(&mut property.outputs, &input);
                }
                if let Ok(property) = self.property_mut(input) {
                    property.input = None;
                }
            }
        }
        Ok(())
    }

    /// Undo the control-flow a child received when it was appended.
    fn unthread_child(&mut self, parent: NodeId, child: NodeId) -> GraphResult<()> {
        let predecessors = self.node(child)?.predecessors.clone();
        for previous in predecessors {
            if previous == parent || self.is_descendant(previous, parent) {
                self.disconnect(Edge::Next { previous, next: child }, SideEffects::Off)?;
            }
        }
        Ok(())
    }

    /// Inverse of [`Graph::adopt_successor`]: the successor and the chain
    /// following it leave `parent`.
    fn release_successors(&mut self, parent: NodeId, first: NodeId) -> GraphResult<()> {
        let mut current = Some(first);
        while let Some(id) = current {
            let Ok(node) = self.node(id) else {
                break;
            };
            if node.parent != Some(parent) {
                break;
            }
            let following = node.successors.first().copied();
            self.disconnect(Edge::Child { parent, child: id }, SideEffects::Off)?;
            current = following;
        }
        Ok(())
    }

    /// Remove a node: every edge touching it, its scope registration (or
    /// the variables of the scope it owns), data references held by other
    /// nodes and the root pointer. Only the node's neighbours are visited.
    pub fn destroy(&mut self, id: NodeId) -> GraphResult<()> {
        let node = self.node(id)?;
        let touching = incident_edges(id, node);
        let referrers = node.referrers.clone();
        let mut referenced = node.structure_instructions();
        referenced.extend(node.variable().and_then(|data| data.declaration));
        let owner = node.variable().and_then(|data| data.scope);
        let owned_variables = node
            .scope
            .as_ref()
            .map(|scope| scope.variables.clone())
            .unwrap_or_default();

        for edge in touching {
            self.disconnect(edge, SideEffects::Off)?;
        }

        if let Some(owner) = owner {
            if let Ok(owner_node) = self.node_mut(owner) {
                if let Some(scope) = owner_node.scope.as_mut() {
                    remove_last(&mut scope.variables, &id);
                }
            }
        }
        for variable in owned_variables {
            if let Ok(var_node) = self.node_mut(variable) {
                if let Some(data) = var_node.variable_mut() {
                    data.scope = None;
                }
            }
        }
        for holder in referrers {
            if let Ok(other) = self.node_mut(holder) {
                other.forget(id);
            }
        }
        for target in referenced {
            if let Ok(other) = self.node_mut(target) {
                remove_last(&mut other.referrers, &id);
            }
        }

        self.nodes.remove(id);
        if self.root == Some(id) {
            self.root = None;
        }
        trace!(target: "graph", ?id, "node destroyed");
        Ok(())
    }

    //=============================================
    //            Section 7: Checkpoints
    //=============================================

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            sequence: self.sequence,
        }
    }

    /// Drop every node and edge created after `checkpoint`, newest first.
    /// Walks the creation logs back from their tails, so the cost follows
    /// what was created since the checkpoint rather than the graph size.
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        let late = |log_tail: Option<u64>| log_tail.filter(|sequence| *sequence >= checkpoint.sequence);
        loop {
            let node_tail = late(self.node_log.last().map(|(sequence, _)| *sequence));
            let edge_tail = late(self.edge_log.last().map(|(sequence, _)| *sequence));
            match (node_tail, edge_tail) {
                (None, None) => break,
                (Some(node), edge) if edge.is_none_or(|edge| node > edge) => {
                    let Some((_, id)) = self.node_log.pop() else {
                        break;
                    };
                    if !self.nodes.contains(id) {
                        continue;
                    }
                    if let Err(err) = self.destroy(id) {
                        warn!(target: "graph", %err, "restore skipped a node");
                    }
                }
                _ => {
                    let Some((sequence, edge)) = self.edge_log.pop() else {
                        break;
                    };
                    if self.edges.get(&edge) != Some(&sequence) {
                        continue;
                    }
                    if let Err(err) = self.disconnect(edge, SideEffects::Off) {
                        warn!(target: "graph", %err, "restore skipped an edge");
                    }
                }
            }
        }
    }

    //=============================================
    //            Section 8: Invariants
    //=============================================

    /// Check that every relation list mirrors the edge registry and no
    /// handle anywhere is stale.
    pub fn check_invariants(&self) -> GraphResult<()> {
        let fail = |message: String| -> GraphResult<()> { Err(GraphError::InvariantViolated(message)) };

        if let Some(root) = self.root {
            if !self.nodes.contains(root) {
                return fail(format!("root {root:?} is not registered"));
            }
        }

        for edge in self.edges.keys() {
            match *edge {
                Edge::Child { parent, child } => {
                    let (Some(p), Some(c)) = (self.nodes.get(parent), self.nodes.get(child)) else {
                        return fail(format!("dangling child edge {edge:?}"));
                    };
                    if !p.children.contains(&child) || c.parent != Some(parent) {
                        return fail(format!("child edge {edge:?} not mirrored"));
                    }
                }
                Edge::Next { previous, next } => {
                    let (Some(p), Some(n)) = (self.nodes.get(previous), self.nodes.get(next)) else {
                        return fail(format!("dangling next edge {edge:?}"));
                    };
                    if !p.successors.contains(&next) || !n.predecessors.contains(&previous) {
                        return fail(format!("next edge {edge:?} not mirrored"));
                    }
                }
                Edge::Value { output, input } => {
                    let (Ok(out), Ok(inp)) = (self.property(output), self.property(input)) else {
                        return fail(format!("dangling value edge {edge:?}"));
                    };
                    if !out.outputs.contains(&input) || inp.input != Some(output) {
                        return fail(format!("value edge {edge:?} not mirrored"));
                    }
                }
            }
        }

        for (id, node) in self.nodes.iter() {
            if let Some(parent) = node.parent {
                if !self.has_edge(&Edge::Child { parent, child: id }) {
                    return fail(format!("{id:?} lists parent {parent:?} without an edge"));
                }
            }
            for child in &node.children {
                if !self.has_edge(&Edge::Child { parent: id, child: *child }) {
                    return fail(format!("{id:?} lists child {child:?} without an edge"));
                }
            }
            for next in &node.successors {
                if !self.has_edge(&Edge::Next { previous: id, next: *next }) {
                    return fail(format!("{id:?} lists successor {next:?} without an edge"));
                }
            }
            for previous in &node.predecessors {
                if !self.has_edge(&Edge::Next { previous: *previous, next: id }) {
                    return fail(format!("{id:?} lists predecessor {previous:?} without an edge"));
                }
            }
            for (index, property) in node.properties.iter().enumerate() {
                let here = PropertyId::new(id, index);
                if let Some(source) = property.input {
                    if !self.has_edge(&Edge::Value { output: source, input: here }) {
                        return fail(format!("{here} lists input {source} without an edge"));
                    }
                }
                for target in &property.outputs {
                    if !self.has_edge(&Edge::Value { output: here, input: *target }) {
                        return fail(format!("{here} lists output {target} without an edge"));
                    }
                }
            }
            if let Some(scope) = &node.scope {
                for variable in &scope.variables {
                    let registered = self
                        .nodes
                        .get(*variable)
                        .and_then(Node::variable)
                        .is_some_and(|data| data.scope == Some(id));
                    if !registered {
                        return fail(format!("scope of {id:?} lists stray variable {variable:?}"));
                    }
                }
            }
            for referenced in node.structure_instructions() {
                if !self.nodes.contains(referenced) {
                    return fail(format!("{id:?} references destroyed {referenced:?}"));
                }
            }
        }
        Ok(())
    }
}

/// Every edge with `id` at one end, read off the node's own relation lists.
fn incident_edges(id: NodeId, node: &Node) -> Vec<Edge> {
    let mut edges = Vec::new();
    if let Some(parent) = node.parent {
        edges.push(Edge::Child { parent, child: id });
    }
    edges.extend(node.children.iter().map(|&child| Edge::Child { parent: id, child }));
    edges.extend(node.predecessors.iter().map(|&previous| Edge::Next { previous, next: id }));
    edges.extend(node.successors.iter().map(|&next| Edge::Next { previous: id, next }));
    for (index, property) in node.properties.iter().enumerate() {
        let here = PropertyId::new(id, index);
        edges.extend(property.input.map(|output| Edge::Value { output, input: here }));
        edges.extend(property.outputs.iter().map(|&input| Edge::Value { output: here, input }));
    }
    edges
}

/// Recent entries sit at the tail, so search from there.
fn remove_last<T: PartialEq>(list: &mut Vec<T>, item: &T) {
    if let Some(position) = list.iter().rposition(|entry| entry == item) {
        list.remove(position);
    }
}

//=============================================
//            Section 9: Tests
//=============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_child_follows_parent_then_siblings_chain() {
        let mut graph = Graph::new();
        let root = graph.create_root();
        let a = graph.create_instruction();
        let b = graph.create_instruction();
        graph
            .connect(Edge::Child { parent: root, child: a }, SideEffects::On)
            .expect("connect a");
        graph
            .connect(Edge::Child { parent: root, child: b }, SideEffects::On)
            .expect("connect b");
        assert_eq!(graph.node(root).expect("root").successors(), &[a]);
        assert_eq!(graph.node(a).expect("a").successors(), &[b]);
        graph.check_invariants().expect("invariants");
    }

    #[test]
    fn sibling_after_block_follows_its_last_instruction() {
        let mut graph = Graph::new();
        let root = graph.create_root();
        let block = graph.create_scope();
        let inner = graph.create_instruction();
        let after = graph.create_instruction();
        graph.connect(Edge::Child { parent: root, child: block }, SideEffects::On).expect("block");
        graph.connect(Edge::Child { parent: block, child: inner }, SideEffects::On).expect("inner");
        graph.connect(Edge::Child { parent: root, child: after }, SideEffects::On).expect("after");
        assert_eq!(graph.node(after).expect("after").predecessors(), &[inner]);
    }

    #[test]
    fn next_edge_adopts_parentless_chain() {
        let mut graph = Graph::new();
        let root = graph.create_root();
        let a = graph.create_instruction();
        let b = graph.create_instruction();
        let c = graph.create_instruction();
        graph.connect(Edge::Child { parent: root, child: a }, SideEffects::On).expect("a");
        graph.connect(Edge::Next { previous: b, next: c }, SideEffects::Off).expect("b->c");
        graph.connect(Edge::Next { previous: a, next: b }, SideEffects::On).expect("a->b");
        assert_eq!(graph.node(root).expect("root").children(), &[a, b, c]);

        graph.disconnect(Edge::Next { previous: a, next: b }, SideEffects::On).expect("undo");
        assert_eq!(graph.node(root).expect("root").children(), &[a]);
        assert_eq!(graph.node(b).expect("b").parent(), None);
        graph.check_invariants().expect("invariants");
    }

    #[test]
    fn literal_is_digested_by_non_variable_targets() {
        let mut graph = Graph::new();
        graph.create_root();
        let instruction = graph.create_instruction();
        let literal = graph.create_literal(Value::Int(5));
        let created = graph
            .connect_to_instruction(PropertyId::new(literal, MAIN_PROPERTY), instruction)
            .expect("digest");
        assert!(!created);
        assert!(!graph.contains(literal));
        let root = graph.property(PropertyId::new(instruction, MAIN_PROPERTY)).expect("root");
        assert_eq!(root.value, Value::Int(5));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn literal_feeding_variable_keeps_an_edge() {
        let mut graph = Graph::new();
        let root = graph.create_root();
        let variable = graph.create_variable(Type::Double, "d", root).expect("var");
        let literal = graph.create_literal(Value::Int(10));
        let created = graph
            .connect_to_variable(PropertyId::new(literal, MAIN_PROPERTY), variable)
            .expect("connect");
        assert!(created);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn duplicate_declaration_rejected_but_shadowing_allowed() {
        let mut graph = Graph::new();
        let root = graph.create_root();
        graph.create_variable(Type::Int, "a", root).expect("outer a");
        assert_eq!(
            graph.create_variable(Type::Int, "a", root),
            Err(GraphError::DuplicateVariable("a".into()))
        );
        let block = graph.create_scope();
        graph.connect(Edge::Child { parent: root, child: block }, SideEffects::On).expect("block");
        let inner = graph.create_variable(Type::Int, "a", block).expect("inner a");
        assert_eq!(graph.find_variable(block, "a"), Some(inner));
    }

    #[test]
    fn destroy_scope_owner_releases_variables() {
        let mut graph = Graph::new();
        let root = graph.create_root();
        let block = graph.create_scope();
        graph.connect(Edge::Child { parent: root, child: block }, SideEffects::On).expect("block");
        let var = graph.create_variable(Type::Int, "x", block).expect("x");
        graph.destroy(block).expect("destroy");
        assert_eq!(graph.node(var).expect("var").variable().and_then(|d| d.scope), None);
        assert!(graph.node(root).expect("root").children().is_empty());
        assert_eq!(graph.edge_count(), 0);
        graph.check_invariants().expect("invariants");
    }

    #[test]
    fn destroying_root_clears_root_pointer() {
        let mut graph = Graph::new();
        let root = graph.create_root();
        graph.destroy(root).expect("destroy");
        assert!(graph.root().is_none());
        assert!(graph.node(root).is_err());
    }

    #[test]
    fn restore_truncates_everything_created_since_checkpoint() {
        let mut graph = Graph::new();
        let root = graph.create_root();
        let kept = graph.create_instruction();
        graph.connect(Edge::Child { parent: root, child: kept }, SideEffects::On).expect("kept");
        let (nodes, edges) = (graph.node_count(), graph.edge_count());

        let checkpoint = graph.checkpoint();
        let block = graph.create_scope();
        graph.connect(Edge::Child { parent: root, child: block }, SideEffects::On).expect("block");
        graph.create_variable(Type::Bool, "flag", block).expect("flag");
        graph.create_undeclared_variable("ghost", root).expect("ghost");
        graph.restore(checkpoint);

        assert_eq!(graph.node_count(), nodes);
        assert_eq!(graph.edge_count(), edges);
        assert!(graph.variables_of(root).is_empty());
        graph.check_invariants().expect("invariants");
    }

    #[test]
    fn destroying_a_header_clears_the_loop_reference() {
        let mut graph = Graph::new();
        let root = graph.create_root();
        let while_loop = graph.create_while_loop();
        graph.connect(Edge::Child { parent: root, child: while_loop }, SideEffects::On).expect("loop");
        let condition = graph.create_instruction();
        if let NodeKind::WhileLoop(data) = &mut graph.node_mut(while_loop).expect("loop").kind {
            data.condition = Some(condition);
        }
        graph.note_reference(while_loop, condition).expect("note");

        graph.destroy(condition).expect("destroy");
        assert!(graph.node(while_loop).expect("loop").structure_instructions().is_empty());
        graph.check_invariants().expect("invariants");
    }

    #[test]
    fn reconnected_edge_survives_restore_once() {
        let mut graph = Graph::new();
        let a = graph.create_instruction();
        let b = graph.create_instruction();
        let edge = Edge::Next { previous: a, next: b };
        graph.connect(edge, SideEffects::Off).expect("connect");
        graph.disconnect(edge, SideEffects::Off).expect("disconnect");
        graph.connect(edge, SideEffects::Off).expect("reconnect");

        let checkpoint = graph.checkpoint();
        let c = graph.create_instruction();
        graph.connect(Edge::Next { previous: b, next: c }, SideEffects::Off).expect("late");
        graph.restore(checkpoint);

        assert!(graph.has_edge(&edge));
        assert_eq!(graph.edges().collect::<Vec<_>>(), vec![&edge]);
        assert!(graph.node(b).expect("b").successors().is_empty());
        graph.check_invariants().expect("invariants");
    }
}
