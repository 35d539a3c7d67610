// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes, connections, and overrides.

use crate::connection::{Connection, ConnectionId};
use crate::node::{Node, NodeId};
use crate::param::{ParamKey, ParameterOverride};
use crate::port::PortId;
use crate::subgraph::{FunctionInfo, GraphId};
use crate::typeset::TypeSet;
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Canvas view settings persisted with a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphView {
    /// Canvas size
    pub size: [f32; 2],
    /// Zoom factor
    pub zoom: f32,
    /// Pan offset
    pub pan: [f32; 2],
}

impl Default for GraphView {
    fn default() -> Self {
        Self {
            size: [1024.0, 1024.0],
            zoom: 1.0,
            pan: [0.0, 0.0],
        }
    }
}

/// A node graph: an ordered collection of nodes, the edges between their
/// ports, parameter overrides keyed by `(node, property)`, and graph-scoped
/// custom parameters and functions.
#[derive(Debug, Clone)]
pub struct Graph {
    /// Unique graph ID within the owning document
    pub id: GraphId,
    /// Graph name
    pub name: String,
    /// Read-only graphs reject every structural mutation
    pub read_only: bool,
    /// Canvas view settings
    pub view: GraphView,
    /// Function metadata, set when this graph computes a value for a host
    /// site
    pub function: Option<FunctionInfo>,
    /// Graph-scoped named constants
    pub custom_params: IndexMap<String, Value>,
    nodes: IndexMap<NodeId, Node>,
    connections: IndexMap<ConnectionId, Connection>,
    overrides: IndexMap<ParamKey, ParameterOverride>,
    custom_functions: Vec<GraphId>,
    revision: u64,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: GraphId::new(),
            name: name.into(),
            read_only: false,
            view: GraphView::default(),
            function: None,
            custom_params: IndexMap::new(),
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
            overrides: IndexMap::new(),
            custom_functions: Vec::new(),
            revision: 0,
        }
    }

    /// Create a new empty function graph with the given expected output
    pub fn function(name: impl Into<String>, output: TypeSet) -> Self {
        let mut graph = Self::new(name);
        graph.function = Some(FunctionInfo::new(output));
        graph
    }

    /// Monotonic revision counter, bumped on every structural change
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn bump(&mut self) {
        self.revision += 1;
    }

    /// Add a node to the graph.
    ///
    /// Fails without mutating when the graph is read-only or the node's id
    /// is already taken.
    pub fn add_node(&mut self, node: Node) -> Result<NodeId, GraphError> {
        if self.read_only {
            return Err(GraphError::ReadOnly);
        }
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        let id = node.id;
        self.nodes.insert(id, node);
        self.bump();
        Ok(id)
    }

    /// Remove a node, disconnecting every edge touching its ports first.
    ///
    /// Returns the node and its removed edges so callers can capture them
    /// for undo.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<(Node, Vec<Connection>)> {
        if self.read_only || !self.nodes.contains_key(&node_id) {
            return None;
        }
        let mut removed = Vec::new();
        self.connections.retain(|_, c| {
            if c.involves_node(node_id) {
                removed.push(c.clone());
                false
            } else {
                true
            }
        });
        let node = self.nodes.shift_remove(&node_id)?;
        self.bump();
        Some((node, removed))
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Connect an output port to an input port.
    ///
    /// Validates node/port existence, the output-to-input direction, the
    /// type gate, and acyclicity. An edge already feeding the input is
    /// replaced after the new edge fully validates, never left dangling.
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_port: PortId,
        to_node: NodeId,
        to_port: PortId,
    ) -> Result<ConnectionId, ConnectError> {
        if self.read_only {
            return Err(ConnectError::ReadOnly);
        }
        let source_node = self
            .nodes
            .get(&from_node)
            .ok_or(ConnectError::NodeNotFound(from_node))?;
        let target_node = self
            .nodes
            .get(&to_node)
            .ok_or(ConnectError::NodeNotFound(to_node))?;

        let source_port = source_node
            .outputs
            .iter()
            .find(|p| p.id == from_port)
            .ok_or(ConnectError::PortNotFound(from_port))?;
        let target_port = target_node
            .inputs
            .iter()
            .find(|p| p.id == to_port)
            .ok_or(ConnectError::PortNotFound(to_port))?;

        if !source_port.can_connect(target_port) {
            return Err(ConnectError::IncompatiblePorts);
        }

        // Connecting a node to itself is trivially circular.
        if from_node == to_node {
            return Err(ConnectError::SelfLoop);
        }
        if self.would_cycle(from_node, to_node) {
            return Err(ConnectError::WouldCycle);
        }

        // Single-parent invariant: the prior edge into this input is torn
        // down, not left dangling.
        self.disconnect_input(to_port);

        let connection = Connection::new(from_node, from_port, to_node, to_port);
        let id = connection.id;
        self.connections.insert(id, connection);
        self.bump();
        Ok(id)
    }

    /// Whether an edge `from_node -> to_node` would close a cycle: true if
    /// `from_node` is reachable downstream of `to_node`.
    pub fn would_cycle(&self, from_node: NodeId, to_node: NodeId) -> bool {
        let mut stack = vec![to_node];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == from_node {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            for c in self.connections.values() {
                if c.from_node == current {
                    stack.push(c.to_node);
                }
            }
        }
        false
    }

    /// Remove the edge into an input port, if any. Idempotent.
    pub fn disconnect_input(&mut self, to_port: PortId) -> Option<Connection> {
        if self.read_only {
            return None;
        }
        let id = self
            .connections
            .values()
            .find(|c| c.to_port == to_port)
            .map(|c| c.id)?;
        let removed = self.connections.shift_remove(&id);
        if removed.is_some() {
            self.bump();
        }
        removed
    }

    /// Remove a connection by ID
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        if self.read_only {
            return None;
        }
        let removed = self.connections.shift_remove(&connection_id);
        if removed.is_some() {
            self.bump();
        }
        removed
    }

    /// Get the edge into an input port, if any
    pub fn connection_into(&self, to_port: PortId) -> Option<&Connection> {
        self.connections.values().find(|c| c.to_port == to_port)
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get connections involving a node
    pub fn connections_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections
            .values()
            .filter(move |c| c.involves_node(node_id))
    }

    /// Get connections leaving a node
    pub fn connections_from_node(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections
            .values()
            .filter(move |c| c.from_node == node_id)
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Insert or replace an override row; rejected on a read-only graph
    pub fn set_override(&mut self, key: ParamKey, row: ParameterOverride) -> bool {
        if self.read_only {
            return false;
        }
        self.overrides.insert(key, row);
        self.bump();
        true
    }

    /// Remove an override row, reverting the property to its default
    pub fn remove_override(&mut self, key: &ParamKey) -> Option<ParameterOverride> {
        if self.read_only {
            return None;
        }
        let removed = self.overrides.shift_remove(key);
        if removed.is_some() {
            self.bump();
        }
        removed
    }

    /// Get an override row; absence means the property is in default state
    pub fn get_override(&self, key: &ParamKey) -> Option<&ParameterOverride> {
        self.overrides.get(key)
    }

    /// Whether an override row exists for the key
    pub fn has_override(&self, key: &ParamKey) -> bool {
        self.overrides.contains_key(key)
    }

    /// Whether the key's override row is in function mode
    pub fn is_function(&self, key: &ParamKey) -> bool {
        self.overrides.get(key).is_some_and(ParameterOverride::is_function)
    }

    /// All override rows
    pub fn overrides(&self) -> impl Iterator<Item = (&ParamKey, &ParameterOverride)> {
        self.overrides.iter()
    }

    /// Override rows attached to one node
    pub fn overrides_for_node(
        &self,
        node_id: NodeId,
    ) -> impl Iterator<Item = (&ParamKey, &ParameterOverride)> {
        self.overrides.iter().filter(move |(k, _)| k.0 == node_id)
    }

    /// Record a named custom function hosted by this graph
    pub fn add_custom_function(&mut self, graph_id: GraphId) {
        if !self.custom_functions.contains(&graph_id) {
            self.custom_functions.push(graph_id);
            self.bump();
        }
    }

    /// Forget a hosted custom function
    pub fn remove_custom_function(&mut self, graph_id: GraphId) -> bool {
        let before = self.custom_functions.len();
        self.custom_functions.retain(|g| *g != graph_id);
        if self.custom_functions.len() != before {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Custom functions hosted by this graph
    pub fn custom_functions(&self) -> &[GraphId] {
        &self.custom_functions
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Error when adding a node
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Graph is read-only
    #[error("Graph is read-only")]
    ReadOnly,

    /// Node ID already present in this graph
    #[error("Duplicate node: {0:?}")]
    DuplicateNode(NodeId),
}

/// Error when creating a connection
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Graph is read-only
    #[error("Graph is read-only")]
    ReadOnly,

    /// Node not found
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Port not found on the expected side of the node
    #[error("Port not found: {0:?}")]
    PortNotFound(PortId),

    /// Incompatible port type-sets
    #[error("Incompatible port types")]
    IncompatiblePorts,

    /// Self-loop not allowed
    #[error("Self-loop not allowed")]
    SelfLoop,

    /// Edge would close a cycle
    #[error("Connection would create a cycle")]
    WouldCycle,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeType;
    use crate::port::Port;

    fn float_node(name: &str) -> Node {
        Node::new(&NodeType {
            id: "float_op".into(),
            name: name.into(),
            inputs: vec![Port::input("in", TypeSet::FLOAT)],
            outputs: vec![Port::output("out", TypeSet::FLOAT)],
            properties: vec![],
        })
    }

    fn connect_out_in(graph: &mut Graph, from: NodeId, to: NodeId) -> Result<ConnectionId, ConnectError> {
        let from_port = graph.node(from).unwrap().outputs[0].id;
        let to_port = graph.node(to).unwrap().inputs[0].id;
        graph.connect(from, from_port, to, to_port)
    }

    #[test]
    fn test_add_node_rejects_duplicates_and_read_only() {
        let mut graph = Graph::new("test");
        let node = float_node("a");
        let dup = node.clone();
        graph.add_node(node).unwrap();
        assert!(matches!(
            graph.add_node(dup),
            Err(GraphError::DuplicateNode(_))
        ));

        graph.read_only = true;
        assert!(matches!(
            graph.add_node(float_node("b")),
            Err(GraphError::ReadOnly)
        ));
    }

    #[test]
    fn test_connect_then_reverse_is_circular() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(float_node("a")).unwrap();
        let b = graph.add_node(float_node("b")).unwrap();

        connect_out_in(&mut graph, a, b).unwrap();
        assert!(matches!(
            connect_out_in(&mut graph, b, a),
            Err(ConnectError::WouldCycle)
        ));
    }

    #[test]
    fn test_self_loop_rejected() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(float_node("a")).unwrap();
        assert!(matches!(
            connect_out_in(&mut graph, a, a),
            Err(ConnectError::SelfLoop)
        ));
    }

    #[test]
    fn test_transitive_cycle_rejected() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(float_node("a")).unwrap();
        let b = graph.add_node(float_node("b")).unwrap();
        let c = graph.add_node(float_node("c")).unwrap();

        connect_out_in(&mut graph, a, b).unwrap();
        connect_out_in(&mut graph, b, c).unwrap();
        assert!(matches!(
            connect_out_in(&mut graph, c, a),
            Err(ConnectError::WouldCycle)
        ));
    }

    #[test]
    fn test_type_gate() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(float_node("a")).unwrap();
        let color = Node::new(&NodeType {
            id: "color_in".into(),
            name: "color".into(),
            inputs: vec![Port::input("in", TypeSet::COLOR)],
            outputs: vec![],
            properties: vec![],
        });
        let b = graph.add_node(color).unwrap();

        let from_port = graph.node(a).unwrap().outputs[0].id;
        let to_port = graph.node(b).unwrap().inputs[0].id;
        assert!(matches!(
            graph.connect(a, from_port, b, to_port),
            Err(ConnectError::IncompatiblePorts)
        ));
    }

    #[test]
    fn test_reconnect_replaces_prior_edge() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(float_node("a")).unwrap();
        let b = graph.add_node(float_node("b")).unwrap();
        let c = graph.add_node(float_node("c")).unwrap();

        connect_out_in(&mut graph, a, c).unwrap();
        connect_out_in(&mut graph, b, c).unwrap();

        // Single-parent invariant: one edge into c, coming from b.
        let to_port = graph.node(c).unwrap().inputs[0].id;
        assert_eq!(graph.connection_count(), 1);
        assert_eq!(graph.connection_into(to_port).unwrap().from_node, b);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(float_node("a")).unwrap();
        let b = graph.add_node(float_node("b")).unwrap();
        connect_out_in(&mut graph, a, b).unwrap();

        let to_port = graph.node(b).unwrap().inputs[0].id;
        assert!(graph.disconnect_input(to_port).is_some());
        assert!(graph.disconnect_input(to_port).is_none());
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn test_remove_node_drops_touching_edges() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(float_node("a")).unwrap();
        let b = graph.add_node(float_node("b")).unwrap();
        let c = graph.add_node(float_node("c")).unwrap();
        connect_out_in(&mut graph, a, b).unwrap();
        connect_out_in(&mut graph, b, c).unwrap();

        let (removed, edges) = graph.remove_node(b).unwrap();
        assert_eq!(removed.id, b);
        assert_eq!(edges.len(), 2);
        assert_eq!(graph.connection_count(), 0);
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_read_only_rejects_every_structural_mutation() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(float_node("a")).unwrap();
        let b = graph.add_node(float_node("b")).unwrap();
        let edge = connect_out_in(&mut graph, a, b).unwrap();
        let to_port = graph.node(b).unwrap().inputs[0].id;
        let key = (a, "x".to_string());

        graph.read_only = true;
        assert!(graph.disconnect(edge).is_none());
        assert!(graph.disconnect_input(to_port).is_none());
        assert!(!graph.set_override(
            key.clone(),
            ParameterOverride::Constant {
                value: Value::Float(1.0),
                kind: TypeSet::FLOAT,
            }
        ));
        assert!(graph.remove_override(&key).is_none());
        assert!(graph.remove_node(a).is_none());
        assert_eq!(graph.connection_count(), 1);
    }

    #[test]
    fn test_revision_bumps_on_structural_change() {
        let mut graph = Graph::new("test");
        let r0 = graph.revision();
        let a = graph.add_node(float_node("a")).unwrap();
        let b = graph.add_node(float_node("b")).unwrap();
        connect_out_in(&mut graph, a, b).unwrap();
        assert!(graph.revision() > r0);
    }
}
