// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions and the node type registry.
//!
//! Node types declare an explicit property schema
//! ([`PropertyDescriptor`]) rather than relying on runtime introspection;
//! editors and the override resolver consume this schema.

use crate::port::{Port, PortId};
use crate::subgraph::GraphId;
use crate::typeset::TypeSet;
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type name used by comment-container nodes.
pub const COMMENT_TYPE: &str = "comment";

/// Unique identifier for a node.
///
/// Unique within a single graph only; two graphs may hold unrelated nodes
/// with the same identifier after a copy, which is why paste remaps ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Schema entry for one exposed node property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    /// Property name
    pub name: String,
    /// Declared value kind
    pub kind: TypeSet,
    /// Whether the property may be promoted to a constant or function
    pub promotable: bool,
    /// Node-local default value
    pub default: Value,
}

impl PropertyDescriptor {
    /// Create a promotable property descriptor
    pub fn promotable(name: impl Into<String>, default: Value) -> Self {
        Self {
            name: name.into(),
            kind: default.kind(),
            promotable: true,
            default,
        }
    }

    /// Create a non-promotable property descriptor
    pub fn fixed(name: impl Into<String>, default: Value) -> Self {
        Self {
            name: name.into(),
            kind: default.kind(),
            promotable: false,
            default,
        }
    }
}

/// Node type definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeType {
    /// Unique type identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Default input ports
    pub inputs: Vec<Port>,
    /// Default output ports
    pub outputs: Vec<Port>,
    /// Exposed property schema
    pub properties: Vec<PropertyDescriptor>,
}

/// A node instance in a graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Node type ID
    pub node_type: String,
    /// Display name (can be customized)
    pub name: String,
    /// Position in the graph canvas
    pub position: [f32; 2],
    /// Size in the graph canvas (comment containers use this for containment)
    pub size: Option<[f32; 2]>,
    /// Input ports
    pub inputs: Vec<Port>,
    /// Output ports
    pub outputs: Vec<Port>,
    /// Exposed property schema, cloned from the node type
    pub properties: Vec<PropertyDescriptor>,
    /// Live property values; absent entries fall back to the schema default
    pub values: IndexMap<String, Value>,
    /// Per-pixel program sub-graph, if this node carries one
    pub program: Option<GraphId>,
}

impl Node {
    /// Create a new node from a type definition, ports re-identified per
    /// instance.
    pub fn new(node_type: &NodeType) -> Self {
        let inputs = node_type
            .inputs
            .iter()
            .map(|p| Port {
                id: PortId::new(),
                ..p.clone()
            })
            .collect();
        let outputs = node_type
            .outputs
            .iter()
            .map(|p| Port {
                id: PortId::new(),
                ..p.clone()
            })
            .collect();
        Self {
            id: NodeId::new(),
            node_type: node_type.id.clone(),
            name: node_type.name.clone(),
            position: [0.0, 0.0],
            size: None,
            inputs,
            outputs,
            properties: node_type.properties.clone(),
            values: IndexMap::new(),
            program: None,
        }
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Get an input port by index
    pub fn input(&self, index: usize) -> Option<&Port> {
        self.inputs.get(index)
    }

    /// Get an output port by index
    pub fn output(&self, index: usize) -> Option<&Port> {
        self.outputs.get(index)
    }

    /// Get a port by ID
    pub fn port(&self, port_id: PortId) -> Option<&Port> {
        self.inputs
            .iter()
            .find(|p| p.id == port_id)
            .or_else(|| self.outputs.iter().find(|p| p.id == port_id))
    }

    /// Get the index of an input port
    pub fn input_index(&self, port_id: PortId) -> Option<usize> {
        self.inputs.iter().position(|p| p.id == port_id)
    }

    /// Get the index of an output port
    pub fn output_index(&self, port_id: PortId) -> Option<usize> {
        self.outputs.iter().position(|p| p.id == port_id)
    }

    /// Get a property descriptor by name
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Get the live value of a property, falling back to the schema default
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values
            .get(name)
            .or_else(|| self.property(name).map(|p| &p.default))
    }

    /// Set the live value of a property; ignored for unknown properties
    pub fn set_value(&mut self, name: &str, value: Value) -> bool {
        if self.property(name).is_none() {
            return false;
        }
        self.values.insert(name.to_string(), value);
        true
    }

    /// Reset a property to its schema default
    pub fn reset_value(&mut self, name: &str) {
        self.values.shift_remove(name);
    }

    /// Whether this node is a comment container
    pub fn is_comment(&self) -> bool {
        self.node_type == COMMENT_TYPE
    }

    /// Whether a point lies within this node's canvas rectangle.
    ///
    /// Always false for nodes without a size.
    pub fn contains_point(&self, point: [f32; 2]) -> bool {
        let Some(size) = self.size else {
            return false;
        };
        point[0] >= self.position[0]
            && point[1] >= self.position[1]
            && point[0] <= self.position[0] + size[0]
            && point[1] <= self.position[1] + size[1]
    }
}

/// Registry of available node types
#[derive(Debug, Default)]
pub struct NodeRegistry {
    /// Registered node types by ID
    types: IndexMap<String, NodeType>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
        }
    }

    /// Register a node type
    pub fn register(&mut self, node_type: NodeType) {
        self.types.insert(node_type.id.clone(), node_type);
    }

    /// Get a node type by ID
    pub fn get(&self, id: &str) -> Option<&NodeType> {
        self.types.get(id)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    /// Create a node from a type ID
    pub fn create_node(&self, type_id: &str) -> Option<Node> {
        self.get(type_id).map(Node::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blend_type() -> NodeType {
        NodeType {
            id: "blend".into(),
            name: "Blend".into(),
            inputs: vec![
                Port::input("background", TypeSet::COLOR),
                Port::input("foreground", TypeSet::COLOR),
            ],
            outputs: vec![Port::output("out", TypeSet::COLOR)],
            properties: vec![
                PropertyDescriptor::promotable("opacity", Value::Float(1.0)),
                PropertyDescriptor::fixed("mode", Value::String("normal".into())),
            ],
        }
    }

    #[test]
    fn test_live_value_falls_back_to_default() {
        let mut node = Node::new(&blend_type());
        assert_eq!(node.value("opacity"), Some(&Value::Float(1.0)));
        assert!(node.set_value("opacity", Value::Float(0.25)));
        assert_eq!(node.value("opacity"), Some(&Value::Float(0.25)));
        node.reset_value("opacity");
        assert_eq!(node.value("opacity"), Some(&Value::Float(1.0)));
    }

    #[test]
    fn test_unknown_property_rejected() {
        let mut node = Node::new(&blend_type());
        assert!(!node.set_value("missing", Value::Float(0.0)));
        assert_eq!(node.value("missing"), None);
    }

    #[test]
    fn test_instances_get_fresh_port_ids() {
        let ty = blend_type();
        let a = Node::new(&ty);
        let b = Node::new(&ty);
        assert_ne!(a.inputs[0].id, b.inputs[0].id);
        assert_ne!(a.outputs[0].id, b.outputs[0].id);
    }

    #[test]
    fn test_comment_containment() {
        let ty = NodeType {
            id: COMMENT_TYPE.into(),
            name: "Comment".into(),
            inputs: vec![],
            outputs: vec![],
            properties: vec![],
        };
        let mut comment = Node::new(&ty).with_position(10.0, 10.0);
        assert!(!comment.contains_point([15.0, 15.0]));
        comment.size = Some([100.0, 50.0]);
        assert!(comment.contains_point([15.0, 15.0]));
        assert!(!comment.contains_point([200.0, 15.0]));
    }
}
