// SPDX-License-Identifier: MIT OR Apache-2.0
//! Documents: a root graph plus the arena of every nested function graph.
//!
//! All graphs of one open document live in a flat arena keyed by
//! [`GraphId`]; parent linkage between a function graph and its hosting
//! site is data ([`ParentRef`]), so walking to the top-level graph is a
//! loop over tags rather than pointer chasing.

use crate::graph::Graph;
use crate::node::NodeId;
use crate::param::{ParamKey, ParameterOverride};
use crate::subgraph::{GraphId, ParentRef};
use crate::typeset::TypeSet;
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one open document.
///
/// Editor state (undo stacks, navigator) is keyed by this, not by the
/// document's display name, so multiple open documents never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    /// Create a new random document ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

/// The active value of a node property after override resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveValue<'a> {
    /// No override row: the node's own live value
    Default(&'a Value),
    /// Constant-mode override
    Constant(&'a Value),
    /// Function-mode override; evaluation happens outside this core
    Function(GraphId),
}

/// One open document: the root graph and every function graph nested under
/// it, plus the modified flag used for save prompts.
#[derive(Debug)]
pub struct Document {
    /// Stable identity for editor state keyed per document
    pub id: DocumentId,
    root: GraphId,
    graphs: IndexMap<GraphId, Graph>,
    modified: bool,
}

impl Document {
    /// Create a document with an empty root graph
    pub fn new(name: impl Into<String>) -> Self {
        let root = Graph::new(name);
        let root_id = root.id;
        let mut graphs = IndexMap::new();
        graphs.insert(root_id, root);
        Self {
            id: DocumentId::new(),
            root: root_id,
            graphs,
            modified: false,
        }
    }

    /// Create a document around an existing root graph
    pub fn with_root(root: Graph) -> Self {
        let root_id = root.id;
        let mut graphs = IndexMap::new();
        graphs.insert(root_id, root);
        Self {
            id: DocumentId::new(),
            root: root_id,
            graphs,
            modified: false,
        }
    }

    /// The root graph's ID
    pub fn root(&self) -> GraphId {
        self.root
    }

    /// Get a graph from the arena
    pub fn graph(&self, id: GraphId) -> Option<&Graph> {
        self.graphs.get(&id)
    }

    /// Get a mutable graph from the arena
    pub fn graph_mut(&mut self, id: GraphId) -> Option<&mut Graph> {
        self.graphs.get_mut(&id)
    }

    /// All graphs in the arena (root first)
    pub fn graphs(&self) -> impl Iterator<Item = &Graph> {
        self.graphs.values()
    }

    /// Insert a graph into the arena
    pub fn insert_graph(&mut self, graph: Graph) -> GraphId {
        let id = graph.id;
        self.graphs.insert(id, graph);
        id
    }

    /// Whether the document has unsaved changes
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Mark the document as having unsaved changes
    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    /// Clear the modified flag (after save)
    pub fn clear_modified(&mut self) {
        self.modified = false;
    }

    /// Walk parent references up to the top-level graph.
    ///
    /// Terminates because parent assignment is single-valued and never
    /// points at a descendant; an id missing from the arena stops the walk.
    pub fn top_graph(&self, mut id: GraphId) -> GraphId {
        loop {
            let Some(graph) = self.graphs.get(&id) else {
                return id;
            };
            let parent = graph
                .function
                .as_ref()
                .map(|f| &f.parent)
                .unwrap_or(&ParentRef::None);
            match parent {
                ParentRef::None => return id,
                ParentRef::Node { graph, .. } => id = *graph,
                ParentRef::Graph(host) => id = *host,
            }
        }
    }

    /// Resolve the active value of a node property.
    pub fn active_value(
        &self,
        graph_id: GraphId,
        node_id: NodeId,
        property: &str,
    ) -> Result<ActiveValue<'_>, ParamError> {
        let graph = self
            .graphs
            .get(&graph_id)
            .ok_or(ParamError::GraphNotFound(graph_id))?;
        let node = graph
            .node(node_id)
            .ok_or(ParamError::NodeNotFound(node_id))?;
        let key = (node_id, property.to_string());
        match graph.get_override(&key) {
            Some(ParameterOverride::Constant { value, .. }) => Ok(ActiveValue::Constant(value)),
            Some(ParameterOverride::Function(id)) => Ok(ActiveValue::Function(*id)),
            None => node
                .value(property)
                .map(ActiveValue::Default)
                .ok_or_else(|| ParamError::UnknownProperty(property.to_string())),
        }
    }

    /// Promote a property to a constant override capturing its current live
    /// value.
    ///
    /// Returns `Ok(false)` without mutating when the property is not marked
    /// promotable. A prior function-mode row at the same key is disposed.
    pub fn promote_to_constant(
        &mut self,
        graph_id: GraphId,
        node_id: NodeId,
        property: &str,
    ) -> Result<bool, ParamError> {
        let graph = self
            .graphs
            .get(&graph_id)
            .ok_or(ParamError::GraphNotFound(graph_id))?;
        let node = graph
            .node(node_id)
            .ok_or(ParamError::NodeNotFound(node_id))?;
        let descriptor = node
            .property(property)
            .ok_or_else(|| ParamError::UnknownProperty(property.to_string()))?;
        if !descriptor.promotable {
            return Ok(false);
        }
        let kind = descriptor.kind;
        let value = node
            .value(property)
            .cloned()
            .ok_or_else(|| ParamError::UnknownProperty(property.to_string()))?;

        let key = (node_id, property.to_string());
        let prior = graph.get_override(&key).and_then(ParameterOverride::function);

        let graph = self.graphs.get_mut(&graph_id).expect("graph checked above");
        graph.set_override(key, ParameterOverride::Constant { value, kind });
        if let Some(old) = prior {
            self.detach_parent(old);
            self.dispose_graph(old);
        }
        self.modified = true;
        Ok(true)
    }

    /// Promote a property to function mode with a freshly created function
    /// graph.
    ///
    /// The new graph's expected output is the property's declared kind and
    /// its parent is the host node. A prior function row at the same key is
    /// disposed; a prior constant row is simply replaced.
    pub fn promote_to_function(
        &mut self,
        graph_id: GraphId,
        node_id: NodeId,
        property: &str,
    ) -> Result<GraphId, ParamError> {
        let graph = self
            .graphs
            .get(&graph_id)
            .ok_or(ParamError::GraphNotFound(graph_id))?;
        let node = graph
            .node(node_id)
            .ok_or(ParamError::NodeNotFound(node_id))?;
        let descriptor = node
            .property(property)
            .ok_or_else(|| ParamError::UnknownProperty(property.to_string()))?;
        if !descriptor.promotable {
            return Err(ParamError::NotPromotable(property.to_string()));
        }
        let name = format!("{} {}", node.name, property);
        let function = Graph::function(name, descriptor.kind);
        let function_id = function.id;
        self.graphs.insert(function_id, function);
        self.attach_function(function_id, graph_id, node_id, property)?;
        Ok(function_id)
    }

    /// Attach an existing function graph to a call site, replacing (and
    /// disposing) any prior function row at that key.
    pub fn attach_function(
        &mut self,
        function_id: GraphId,
        graph_id: GraphId,
        node_id: NodeId,
        property: &str,
    ) -> Result<(), ParamError> {
        if !self.graphs.contains_key(&graph_id) {
            return Err(ParamError::GraphNotFound(graph_id));
        }
        let key = (node_id, property.to_string());
        let prior = self
            .graphs
            .get(&graph_id)
            .and_then(|g| g.get_override(&key))
            .and_then(ParameterOverride::function)
            .filter(|old| *old != function_id);

        let parent = ParentRef::Node {
            graph: graph_id,
            node: node_id,
            property: Some(property.to_string()),
        };
        let function = self
            .graphs
            .get_mut(&function_id)
            .ok_or(ParamError::GraphNotFound(function_id))?;
        let Some(info) = function.function.as_mut() else {
            return Err(ParamError::NotAFunction(function_id));
        };
        info.parent = parent;

        let graph = self.graphs.get_mut(&graph_id).expect("graph checked above");
        graph.set_override(key, ParameterOverride::Function(function_id));
        if let Some(old) = prior {
            self.detach_parent(old);
            self.dispose_graph(old);
        }
        self.modified = true;
        Ok(())
    }

    /// Remove a property's override row, reverting it to default state.
    ///
    /// A function-mode row's graph is detached and disposed unless
    /// `keep_function` is set (used when reassigning the function to a
    /// different call site).
    pub fn demote(
        &mut self,
        graph_id: GraphId,
        node_id: NodeId,
        property: &str,
        keep_function: bool,
    ) -> Result<Option<ParameterOverride>, ParamError> {
        let key = (node_id, property.to_string());
        let graph = self
            .graphs
            .get_mut(&graph_id)
            .ok_or(ParamError::GraphNotFound(graph_id))?;
        let removed = graph.remove_override(&key);
        if let Some(ParameterOverride::Function(function_id)) = &removed {
            self.detach_parent(*function_id);
            if !keep_function {
                self.dispose_graph(*function_id);
            }
        }
        if removed.is_some() {
            self.modified = true;
        }
        Ok(removed)
    }

    /// Move a function graph from one call site to another without
    /// disposing it.
    ///
    /// The old site reverts to default; the new site enters function mode
    /// with the same graph instance, retargeted to the new property's
    /// declared kind.
    pub fn reassign_function(
        &mut self,
        from: (GraphId, NodeId, &str),
        to: (GraphId, NodeId, &str),
    ) -> Result<GraphId, ParamError> {
        let key = (from.1, from.2.to_string());
        let function_id = self
            .graphs
            .get(&from.0)
            .ok_or(ParamError::GraphNotFound(from.0))?
            .get_override(&key)
            .and_then(ParameterOverride::function)
            .ok_or(ParamError::NoFunctionAt(from.1))?;

        let kind = {
            let graph = self
                .graphs
                .get(&to.0)
                .ok_or(ParamError::GraphNotFound(to.0))?;
            let node = graph.node(to.1).ok_or(ParamError::NodeNotFound(to.1))?;
            node.property(to.2)
                .ok_or_else(|| ParamError::UnknownProperty(to.2.to_string()))?
                .kind
        };

        self.demote(from.0, from.1, from.2, true)?;
        if let Some(info) = self
            .graphs
            .get_mut(&function_id)
            .and_then(|g| g.function.as_mut())
        {
            info.output = kind;
        }
        self.attach_function(function_id, to.0, to.1, to.2)?;
        Ok(function_id)
    }

    /// Create the per-pixel program graph for a node, or return the
    /// existing one.
    pub fn pixel_program(
        &mut self,
        graph_id: GraphId,
        node_id: NodeId,
    ) -> Result<GraphId, ParamError> {
        let graph = self
            .graphs
            .get(&graph_id)
            .ok_or(ParamError::GraphNotFound(graph_id))?;
        let node = graph
            .node(node_id)
            .ok_or(ParamError::NodeNotFound(node_id))?;
        if let Some(existing) = node.program {
            return Ok(existing);
        }

        let mut function = Graph::function(format!("{} program", node.name), TypeSet::COLOR);
        if let Some(info) = function.function.as_mut() {
            info.parent = ParentRef::Node {
                graph: graph_id,
                node: node_id,
                property: None,
            };
        }
        let function_id = function.id;
        self.graphs.insert(function_id, function);
        let graph = self.graphs.get_mut(&graph_id).expect("graph checked above");
        if let Some(node) = graph.node_mut(node_id) {
            node.program = Some(function_id);
        }
        self.modified = true;
        Ok(function_id)
    }

    /// Create a named custom function hosted by a graph
    pub fn add_custom_function(
        &mut self,
        host: GraphId,
        name: impl Into<String>,
        output: TypeSet,
    ) -> Result<GraphId, ParamError> {
        if !self.graphs.contains_key(&host) {
            return Err(ParamError::GraphNotFound(host));
        }
        let mut function = Graph::function(name, output);
        if let Some(info) = function.function.as_mut() {
            info.parent = ParentRef::Graph(host);
        }
        let function_id = function.id;
        self.graphs.insert(function_id, function);
        let graph = self.graphs.get_mut(&host).expect("host checked above");
        graph.add_custom_function(function_id);
        self.modified = true;
        Ok(function_id)
    }

    /// Detach and dispose a custom function hosted by a graph
    pub fn remove_custom_function(&mut self, host: GraphId, function_id: GraphId) -> bool {
        let Some(graph) = self.graphs.get_mut(&host) else {
            return false;
        };
        if !graph.remove_custom_function(function_id) {
            return false;
        }
        self.detach_parent(function_id);
        self.dispose_graph(function_id);
        self.modified = true;
        true
    }

    fn detach_parent(&mut self, function_id: GraphId) {
        if let Some(info) = self
            .graphs
            .get_mut(&function_id)
            .and_then(|g| g.function.as_mut())
        {
            info.parent = ParentRef::None;
        }
    }

    /// Remove a graph and, recursively, every function graph it hosts.
    ///
    /// Detached-but-undisposed function graphs are a leak; every detach
    /// path funnels through here.
    pub fn dispose_graph(&mut self, id: GraphId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(graph) = self.graphs.shift_remove(&current) else {
                tracing::debug!("dispose of unknown graph {:?}", current);
                continue;
            };
            for node in graph.nodes() {
                if let Some(program) = node.program {
                    stack.push(program);
                }
            }
            for (_, row) in graph.overrides() {
                if let Some(function_id) = row.function() {
                    stack.push(function_id);
                }
            }
            stack.extend(graph.custom_functions().iter().copied());
        }
    }
}

/// Error for parameter/sub-graph operations
#[derive(Debug, thiserror::Error)]
pub enum ParamError {
    /// Graph not found in the document arena
    #[error("Graph not found: {0:?}")]
    GraphNotFound(GraphId),

    /// Node not found
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Property not declared by the node's schema
    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    /// Property is not marked promotable
    #[error("Property not promotable: {0}")]
    NotPromotable(String),

    /// Graph exists but carries no function metadata
    #[error("Graph is not a function graph: {0:?}")]
    NotAFunction(GraphId),

    /// No function-mode override at the source site
    #[error("No function override on node {0:?}")]
    NoFunctionAt(NodeId),
}

/// Lookup helpers mirroring the override queries on [`Graph`], keyed from
/// the document level.
impl Document {
    /// Whether an override row exists
    pub fn has_override(&self, graph_id: GraphId, key: &ParamKey) -> bool {
        self.graphs
            .get(&graph_id)
            .is_some_and(|g| g.has_override(key))
    }

    /// Whether the override row is in function mode
    pub fn is_function(&self, graph_id: GraphId, key: &ParamKey) -> bool {
        self.graphs.get(&graph_id).is_some_and(|g| g.is_function(key))
    }

    /// Get an override row
    pub fn get_override(&self, graph_id: GraphId, key: &ParamKey) -> Option<&ParameterOverride> {
        self.graphs.get(&graph_id)?.get_override(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeType, PropertyDescriptor};
    use crate::port::Port;
    use crate::typeset::TypeSet;

    fn uniform_type() -> NodeType {
        NodeType {
            id: "uniform".into(),
            name: "Uniform".into(),
            inputs: vec![],
            outputs: vec![Port::output("out", TypeSet::COLOR)],
            properties: vec![
                PropertyDescriptor::promotable("x", Value::Float(0.5)),
                PropertyDescriptor::fixed("label", Value::String("u".into())),
            ],
        }
    }

    fn doc_with_node() -> (Document, GraphId, NodeId) {
        let mut doc = Document::new("material");
        let root = doc.root();
        let node = Node::new(&uniform_type());
        let node_id = doc.graph_mut(root).unwrap().add_node(node).unwrap();
        (doc, root, node_id)
    }

    #[test]
    fn test_promote_to_constant_captures_live_value() {
        let (mut doc, root, node) = doc_with_node();
        doc.graph_mut(root)
            .unwrap()
            .node_mut(node)
            .unwrap()
            .set_value("x", Value::Float(0.25));

        assert!(doc.promote_to_constant(root, node, "x").unwrap());
        let key = (node, "x".to_string());
        assert_eq!(
            doc.get_override(root, &key),
            Some(&ParameterOverride::Constant {
                value: Value::Float(0.25),
                kind: TypeSet::FLOAT,
            })
        );
    }

    #[test]
    fn test_promote_non_promotable_is_noop() {
        let (mut doc, root, node) = doc_with_node();
        assert!(!doc.promote_to_constant(root, node, "label").unwrap());
        assert!(!doc.has_override(root, &(node, "label".to_string())));
    }

    #[test]
    fn test_promote_demote_round_trips_live_value() {
        let (mut doc, root, node) = doc_with_node();
        doc.graph_mut(root)
            .unwrap()
            .node_mut(node)
            .unwrap()
            .set_value("x", Value::Float(0.75));

        doc.promote_to_constant(root, node, "x").unwrap();
        doc.demote(root, node, "x", false).unwrap();

        match doc.active_value(root, node, "x").unwrap() {
            ActiveValue::Default(v) => assert_eq!(v, &Value::Float(0.75)),
            other => panic!("expected default state, got {other:?}"),
        }
    }

    #[test]
    fn test_function_replaces_constant_row() {
        let (mut doc, root, node) = doc_with_node();
        doc.promote_to_constant(root, node, "x").unwrap();
        let function = doc.promote_to_function(root, node, "x").unwrap();

        let key = (node, "x".to_string());
        assert_eq!(
            doc.get_override(root, &key),
            Some(&ParameterOverride::Function(function))
        );
        // Exactly one row per key, and the function expects the property's
        // declared kind.
        let info = doc.graph(function).unwrap().function.as_ref().unwrap();
        assert_eq!(info.output, TypeSet::FLOAT);
        assert_eq!(
            info.parent,
            ParentRef::Node {
                graph: root,
                node,
                property: Some("x".to_string()),
            }
        );
    }

    #[test]
    fn test_demote_disposes_function_graph() {
        let (mut doc, root, node) = doc_with_node();
        let function = doc.promote_to_function(root, node, "x").unwrap();
        assert!(doc.graph(function).is_some());

        doc.demote(root, node, "x", false).unwrap();
        assert!(doc.graph(function).is_none());
        assert!(!doc.has_override(root, &(node, "x".to_string())));
    }

    #[test]
    fn test_reassign_function_preserves_instance() {
        let mut doc = Document::new("material");
        let root = doc.root();
        let a = doc
            .graph_mut(root)
            .unwrap()
            .add_node(Node::new(&uniform_type()))
            .unwrap();
        let b = doc
            .graph_mut(root)
            .unwrap()
            .add_node(Node::new(&uniform_type()))
            .unwrap();

        let function = doc.promote_to_function(root, a, "x").unwrap();
        let moved = doc.reassign_function((root, a, "x"), (root, b, "x")).unwrap();

        assert_eq!(function, moved);
        assert!(doc.graph(function).is_some());
        assert!(!doc.has_override(root, &(a, "x".to_string())));
        assert!(doc.is_function(root, &(b, "x".to_string())));
    }

    #[test]
    fn test_top_graph_walks_to_root() {
        let (mut doc, root, node) = doc_with_node();
        let function = doc.promote_to_function(root, node, "x").unwrap();

        // Nest one level deeper through a custom function of the function
        // graph.
        let nested = doc
            .add_custom_function(function, "helper", TypeSet::FLOAT)
            .unwrap();

        assert_eq!(doc.top_graph(root), root);
        assert_eq!(doc.top_graph(function), root);
        assert_eq!(doc.top_graph(nested), root);
    }

    #[test]
    fn test_dispose_is_recursive() {
        let (mut doc, root, node) = doc_with_node();
        let function = doc.promote_to_function(root, node, "x").unwrap();
        let nested = doc
            .add_custom_function(function, "helper", TypeSet::FLOAT)
            .unwrap();

        doc.demote(root, node, "x", false).unwrap();
        assert!(doc.graph(function).is_none());
        assert!(doc.graph(nested).is_none());
    }

    #[test]
    fn test_pixel_program_is_idempotent() {
        let (mut doc, root, node) = doc_with_node();
        let first = doc.pixel_program(root, node).unwrap();
        let second = doc.pixel_program(root, node).unwrap();
        assert_eq!(first, second);
        assert_eq!(doc.top_graph(first), root);
    }
}
