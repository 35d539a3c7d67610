// SPDX-License-Identifier: MIT OR Apache-2.0
//! The round-trippable JSON shape shared by save, clipboard, and undo
//! snapshots.
//!
//! A node record carries its outgoing edges as
//! `(target node id, target input index, source output index)` triples; a
//! graph record nests the records of every function graph it hosts, so one
//! document serializes as a single tree. Parent references are not stored;
//! they are re-derived from the nesting on load.

use crate::document::Document;
use crate::graph::{ConnectError, Graph, GraphError, GraphView};
use crate::node::{Node, NodeId, PropertyDescriptor};
use crate::param::ParameterOverride;
use crate::port::Port;
use crate::subgraph::{FunctionInfo, GraphId, ParentRef};
use crate::typeset::TypeSet;
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One outgoing edge of a serialized node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Target node ID
    pub to_node: NodeId,
    /// Index of the target input port
    pub to_input: usize,
    /// Index of the source output port
    pub from_output: usize,
}

/// Serialized form of one node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node ID
    pub id: NodeId,
    /// Node type name
    pub node_type: String,
    /// Display name
    pub name: String,
    /// Canvas position
    pub position: [f32; 2],
    /// Canvas size, if any
    pub size: Option<[f32; 2]>,
    /// Input ports
    pub inputs: Vec<Port>,
    /// Output ports
    pub outputs: Vec<Port>,
    /// Property schema
    pub properties: Vec<PropertyDescriptor>,
    /// Live property values
    pub values: IndexMap<String, Value>,
    /// Per-pixel program body, if the node carries one
    pub program: Option<Box<GraphRecord>>,
    /// Outgoing edges
    pub connections: Vec<ConnectionRecord>,
}

/// Serialized form of one override row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OverrideRecord {
    /// Constant-mode row
    Constant {
        /// Captured value
        value: Value,
        /// Declared kind
        kind: TypeSet,
    },
    /// Function-mode row with the embedded function graph body
    Function {
        /// Function graph body
        graph: Box<GraphRecord>,
    },
}

/// Serialized function metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionRecord {
    /// Expected output kinds at the calling site
    pub output: TypeSet,
}

/// Serialized form of one graph, nested function graphs included
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRecord {
    /// Graph ID
    pub id: GraphId,
    /// Graph name
    pub name: String,
    /// Read-only flag
    pub read_only: bool,
    /// Canvas view settings
    pub view: GraphView,
    /// Function metadata, when this graph computes a value for a host site
    pub function: Option<FunctionRecord>,
    /// Node records
    pub nodes: Vec<NodeRecord>,
    /// Override rows keyed `"<node uuid>.<property>"`
    pub overrides: IndexMap<String, OverrideRecord>,
    /// Graph-scoped named constants
    pub custom_params: IndexMap<String, Value>,
    /// Named custom function bodies
    pub custom_functions: Vec<GraphRecord>,
}

/// Error at the serialization boundary
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// Malformed JSON or mismatched shape
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Graph not found while capturing
    #[error("Graph not found: {0:?}")]
    GraphNotFound(GraphId),

    /// Node not found while capturing
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Override key does not parse as `"<uuid>.<property>"`
    #[error("Malformed override key: {0}")]
    BadOverrideKey(String),

    /// Connection record does not resolve against the instantiated nodes
    #[error("Connection record out of range")]
    BadConnection(#[from] ConnectError),

    /// Node insertion failed while instantiating
    #[error("Node insertion failed: {0}")]
    Graph(#[from] GraphError),
}

/// Build the string key for an override row
pub fn override_key(node_id: NodeId, property: &str) -> String {
    format!("{}.{}", node_id.0, property)
}

/// Parse an override key back into its node id and property name
pub fn parse_override_key(key: &str) -> Result<(NodeId, String), FormatError> {
    let (id, property) = key
        .split_once('.')
        .ok_or_else(|| FormatError::BadOverrideKey(key.to_string()))?;
    let uuid = Uuid::parse_str(id).map_err(|_| FormatError::BadOverrideKey(key.to_string()))?;
    Ok((NodeId(uuid), property.to_string()))
}

impl NodeRecord {
    /// Capture a node, its outgoing edges, and its program body.
    pub fn capture(doc: &Document, graph_id: GraphId, node_id: NodeId) -> Result<Self, FormatError> {
        let graph = doc
            .graph(graph_id)
            .ok_or(FormatError::GraphNotFound(graph_id))?;
        let node = graph
            .node(node_id)
            .ok_or(FormatError::NodeNotFound(node_id))?;

        let mut connections = Vec::new();
        for c in graph.connections_from_node(node_id) {
            let target = graph
                .node(c.to_node)
                .ok_or(FormatError::NodeNotFound(c.to_node))?;
            let (Some(to_input), Some(from_output)) =
                (target.input_index(c.to_port), node.output_index(c.from_port))
            else {
                continue;
            };
            connections.push(ConnectionRecord {
                to_node: c.to_node,
                to_input,
                from_output,
            });
        }

        let program = match node.program {
            Some(program_id) => Some(Box::new(GraphRecord::capture(doc, program_id)?)),
            None => None,
        };

        Ok(Self {
            id: node.id,
            node_type: node.node_type.clone(),
            name: node.name.clone(),
            position: node.position,
            size: node.size,
            inputs: node.inputs.clone(),
            outputs: node.outputs.clone(),
            properties: node.properties.clone(),
            values: node.values.clone(),
            program,
            connections,
        })
    }

    /// Serialize to the canonical JSON form
    pub fn to_json(&self) -> Result<String, FormatError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from the canonical JSON form
    pub fn from_json(json: &str) -> Result<Self, FormatError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl GraphRecord {
    /// Capture a graph and, recursively, every function graph it hosts.
    pub fn capture(doc: &Document, graph_id: GraphId) -> Result<Self, FormatError> {
        let graph = doc
            .graph(graph_id)
            .ok_or(FormatError::GraphNotFound(graph_id))?;

        let mut nodes = Vec::with_capacity(graph.node_count());
        for node_id in graph.node_ids() {
            nodes.push(NodeRecord::capture(doc, graph_id, node_id)?);
        }

        let mut overrides = IndexMap::new();
        for ((node_id, property), row) in graph.overrides() {
            let record = match row {
                ParameterOverride::Constant { value, kind } => OverrideRecord::Constant {
                    value: value.clone(),
                    kind: *kind,
                },
                ParameterOverride::Function(function_id) => OverrideRecord::Function {
                    graph: Box::new(GraphRecord::capture(doc, *function_id)?),
                },
            };
            overrides.insert(override_key(*node_id, property), record);
        }

        let mut custom_functions = Vec::new();
        for function_id in graph.custom_functions() {
            custom_functions.push(GraphRecord::capture(doc, *function_id)?);
        }

        Ok(Self {
            id: graph.id,
            name: graph.name.clone(),
            read_only: graph.read_only,
            view: graph.view.clone(),
            function: graph
                .function
                .as_ref()
                .map(|f| FunctionRecord { output: f.output }),
            nodes,
            overrides,
            custom_params: graph.custom_params.clone(),
            custom_functions,
        })
    }

    /// Serialize to the canonical JSON form
    pub fn to_json(&self) -> Result<String, FormatError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from the canonical JSON form.
    ///
    /// Malformed input is logged and surfaced as an error so the triggering
    /// operation can abort without partial mutation.
    pub fn from_json(json: &str) -> Result<Self, FormatError> {
        match serde_json::from_str(json) {
            Ok(record) => Ok(record),
            Err(err) => {
                tracing::warn!("failed to parse graph record: {err}");
                Err(err.into())
            }
        }
    }
}

/// Instantiate a whole document from its root graph record.
pub fn instantiate_document(record: &GraphRecord) -> Result<Document, FormatError> {
    let mut shell = Graph::new(record.name.clone());
    shell.id = record.id;
    let mut doc = Document::with_root(shell);
    let root = doc.root();
    fill_graph(&mut doc, root, record)?;
    doc.clear_modified();
    Ok(doc)
}

/// Instantiate a graph record (and its nested bodies) into a document's
/// arena under the given parent reference.
pub fn instantiate_graph(
    doc: &mut Document,
    record: &GraphRecord,
    parent: ParentRef,
) -> Result<GraphId, FormatError> {
    let mut shell = Graph::new(record.name.clone());
    shell.id = record.id;
    if let Some(function) = &record.function {
        shell.function = Some(FunctionInfo {
            output: function.output,
            parent,
        });
    }
    let graph_id = doc.insert_graph(shell);
    fill_graph(doc, graph_id, record)?;
    Ok(graph_id)
}

fn fill_graph(doc: &mut Document, graph_id: GraphId, record: &GraphRecord) -> Result<(), FormatError> {
    for node_record in &record.nodes {
        instantiate_node(doc, graph_id, node_record)?;
    }
    for node_record in &record.nodes {
        connect_node_record(doc, graph_id, node_record)?;
    }

    for (key, row) in &record.overrides {
        let (node_id, property) = parse_override_key(key)?;
        let row = match row {
            OverrideRecord::Constant { value, kind } => ParameterOverride::Constant {
                value: value.clone(),
                kind: *kind,
            },
            OverrideRecord::Function { graph } => {
                let parent = ParentRef::Node {
                    graph: graph_id,
                    node: node_id,
                    property: Some(property.clone()),
                };
                let function_id = instantiate_graph(doc, graph, parent)?;
                ParameterOverride::Function(function_id)
            }
        };
        if let Some(graph) = doc.graph_mut(graph_id) {
            graph.set_override((node_id, property), row);
        }
    }

    for function_record in &record.custom_functions {
        let function_id = instantiate_graph(doc, function_record, ParentRef::Graph(graph_id))?;
        if let Some(graph) = doc.graph_mut(graph_id) {
            graph.add_custom_function(function_id);
        }
    }

    if let Some(graph) = doc.graph_mut(graph_id) {
        graph.custom_params = record.custom_params.clone();
        graph.view = record.view.clone();
        // Set last so instantiation itself is not rejected.
        graph.read_only = record.read_only;
    }
    Ok(())
}

/// Instantiate a node record (ports, values, program body) into a graph.
///
/// Outgoing edges are not restored here; once every endpoint exists, call
/// [`connect_node_record`].
pub fn instantiate_node(
    doc: &mut Document,
    graph_id: GraphId,
    record: &NodeRecord,
) -> Result<NodeId, FormatError> {
    let node = Node {
        id: record.id,
        node_type: record.node_type.clone(),
        name: record.name.clone(),
        position: record.position,
        size: record.size,
        inputs: record.inputs.clone(),
        outputs: record.outputs.clone(),
        properties: record.properties.clone(),
        values: record.values.clone(),
        program: None,
    };
    let graph = doc
        .graph_mut(graph_id)
        .ok_or(FormatError::GraphNotFound(graph_id))?;
    let node_id = graph.add_node(node)?;

    if let Some(program) = &record.program {
        let parent = ParentRef::Node {
            graph: graph_id,
            node: node_id,
            property: None,
        };
        let program_id = instantiate_graph(doc, program, parent)?;
        if let Some(node) = doc.graph_mut(graph_id).and_then(|g| g.node_mut(node_id)) {
            node.program = Some(program_id);
        }
    }
    Ok(node_id)
}

/// Restore the outgoing edges of a node record.
pub fn connect_node_record(
    doc: &mut Document,
    graph_id: GraphId,
    record: &NodeRecord,
) -> Result<(), FormatError> {
    let graph = doc
        .graph_mut(graph_id)
        .ok_or(FormatError::GraphNotFound(graph_id))?;
    for c in &record.connections {
        let from_port = graph
            .node(record.id)
            .and_then(|n| n.output(c.from_output))
            .map(|p| p.id)
            .ok_or(FormatError::NodeNotFound(record.id))?;
        let to_port = graph
            .node(c.to_node)
            .and_then(|n| n.input(c.to_input))
            .map(|p| p.id)
            .ok_or(FormatError::NodeNotFound(c.to_node))?;
        graph.connect(record.id, from_port, c.to_node, to_port)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeType, PropertyDescriptor};
    use crate::port::Port as P;

    fn build_doc() -> Document {
        let mut doc = Document::new("material");
        let root = doc.root();
        let ty = NodeType {
            id: "noise".into(),
            name: "Noise".into(),
            inputs: vec![P::input("in", TypeSet::FLOAT)],
            outputs: vec![P::output("out", TypeSet::FLOAT)],
            properties: vec![PropertyDescriptor::promotable("scale", Value::Float(4.0))],
        };
        let a = doc.graph_mut(root).unwrap().add_node(Node::new(&ty)).unwrap();
        let b = doc.graph_mut(root).unwrap().add_node(Node::new(&ty)).unwrap();
        let from_port = doc.graph(root).unwrap().node(a).unwrap().outputs[0].id;
        let to_port = doc.graph(root).unwrap().node(b).unwrap().inputs[0].id;
        doc.graph_mut(root)
            .unwrap()
            .connect(a, from_port, b, to_port)
            .unwrap();

        doc.promote_to_constant(root, a, "scale").unwrap();
        doc.promote_to_function(root, b, "scale").unwrap();
        doc.add_custom_function(root, "curve", TypeSet::FLOAT).unwrap();
        doc
    }

    #[test]
    fn test_graph_record_round_trip() {
        let doc = build_doc();
        let record = GraphRecord::capture(&doc, doc.root()).unwrap();
        let json = record.to_json().unwrap();

        let restored = instantiate_document(&GraphRecord::from_json(&json).unwrap()).unwrap();
        let record2 = GraphRecord::capture(&restored, restored.root()).unwrap();
        assert_eq!(json, record2.to_json().unwrap());
    }

    #[test]
    fn test_round_trip_preserves_structure() {
        let doc = build_doc();
        let record = GraphRecord::capture(&doc, doc.root()).unwrap();
        let restored = instantiate_document(&record).unwrap();

        let root = restored.root();
        let graph = restored.graph(root).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.connection_count(), 1);
        assert_eq!(graph.custom_functions().len(), 1);
        assert_eq!(graph.overrides().count(), 2);
        // Function graph bodies landed in the arena with parents rewired.
        for (_, row) in graph.overrides() {
            if let Some(function_id) = row.function() {
                assert_eq!(restored.top_graph(function_id), root);
            }
        }
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(GraphRecord::from_json("not json").is_err());
        assert!(GraphRecord::from_json("{\"nodes\": 3}").is_err());
    }

    #[test]
    fn test_override_key_round_trip() {
        let node = NodeId::new();
        let key = override_key(node, "scale");
        let (parsed, property) = parse_override_key(&key).unwrap();
        assert_eq!(parsed, node);
        assert_eq!(property, "scale");
        assert!(parse_override_key("garbage").is_err());
    }
}
