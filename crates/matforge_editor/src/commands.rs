// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reversible structural edits.
//!
//! Commands capture whatever they need to invert themselves using the same
//! JSON records as save and clipboard, so undoing a deletion recreates the
//! node byte-for-byte including its function graph bodies.

use matforge_graph::format::{
    connect_node_record, instantiate_graph, instantiate_node, FormatError, GraphRecord, NodeRecord,
    OverrideRecord,
};
use matforge_graph::{
    clipboard, ConnectError, Document, GraphError, GraphId, Node, NodeId, ParamError,
    ParameterOverride, ParentRef, PortId, Value,
};
use serde::{Deserialize, Serialize};

/// Error type for command execution
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Node insertion failed
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Connection failed
    #[error("Connect error: {0}")]
    Connect(#[from] ConnectError),

    /// Parameter operation failed
    #[error("Parameter error: {0}")]
    Param(#[from] ParamError),

    /// Snapshot capture or restore failed
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Graph not found
    #[error("Graph not found: {0:?}")]
    GraphNotFound(GraphId),

    /// Node not found
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Command reverted before it was applied, or vice versa
    #[error("Command state out of order")]
    OutOfOrder,
}

/// A reversible structural edit scoped to one graph of one document.
pub trait GraphCommand: std::fmt::Debug + Send {
    /// Human-readable label for undo menus
    fn label(&self) -> &str;

    /// Perform the edit
    fn apply(&mut self, doc: &mut Document) -> Result<(), CommandError>;

    /// Invert the edit
    fn revert(&mut self, doc: &mut Document) -> Result<(), CommandError>;
}

/// One incoming edge of a node, by port indices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingRecord {
    /// Source node
    pub from_node: NodeId,
    /// Index of the source output port
    pub from_output: usize,
    /// Index of the target input port
    pub to_input: usize,
}

/// Everything needed to recreate a node in place: its record (outgoing
/// edges and program body included), its incoming edges, and its override
/// rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Node record
    pub record: NodeRecord,
    /// Incoming edges
    pub incoming: Vec<IncomingRecord>,
    /// Override rows keyed by property name
    pub overrides: Vec<(String, OverrideRecord)>,
}

/// Capture a full snapshot of a live node.
pub fn capture_node(
    doc: &Document,
    graph_id: GraphId,
    node_id: NodeId,
) -> Result<NodeSnapshot, CommandError> {
    let record = NodeRecord::capture(doc, graph_id, node_id)?;
    let graph = doc
        .graph(graph_id)
        .ok_or(CommandError::GraphNotFound(graph_id))?;
    let node = graph
        .node(node_id)
        .ok_or(CommandError::NodeNotFound(node_id))?;

    let mut incoming = Vec::new();
    for c in graph.connections_for_node(node_id) {
        if c.to_node != node_id {
            continue;
        }
        let source = graph
            .node(c.from_node)
            .ok_or(CommandError::NodeNotFound(c.from_node))?;
        let (Some(from_output), Some(to_input)) =
            (source.output_index(c.from_port), node.input_index(c.to_port))
        else {
            continue;
        };
        incoming.push(IncomingRecord {
            from_node: c.from_node,
            from_output,
            to_input,
        });
    }

    let mut overrides = Vec::new();
    for ((_, property), row) in graph.overrides_for_node(node_id) {
        let record = match row {
            ParameterOverride::Constant { value, kind } => OverrideRecord::Constant {
                value: value.clone(),
                kind: *kind,
            },
            ParameterOverride::Function(function_id) => OverrideRecord::Function {
                graph: Box::new(GraphRecord::capture(doc, *function_id)?),
            },
        };
        overrides.push((property.clone(), record));
    }

    Ok(NodeSnapshot {
        record,
        incoming,
        overrides,
    })
}

/// Remove a node along with its override rows and program graph, leaving
/// nothing dangling in the document arena.
pub fn remove_node_deep(
    doc: &mut Document,
    graph_id: GraphId,
    node_id: NodeId,
) -> Result<(), CommandError> {
    let properties: Vec<String> = doc
        .graph(graph_id)
        .ok_or(CommandError::GraphNotFound(graph_id))?
        .overrides_for_node(node_id)
        .map(|((_, p), _)| p.clone())
        .collect();
    for property in properties {
        doc.demote(graph_id, node_id, &property, false)?;
    }

    let graph = doc
        .graph_mut(graph_id)
        .ok_or(CommandError::GraphNotFound(graph_id))?;
    let (node, _edges) = graph
        .remove_node(node_id)
        .ok_or(CommandError::NodeNotFound(node_id))?;
    if let Some(program) = node.program {
        doc.dispose_graph(program);
    }
    doc.mark_modified();
    Ok(())
}

/// Restore a override row captured in a snapshot.
fn restore_override(
    doc: &mut Document,
    graph_id: GraphId,
    node_id: NodeId,
    property: &str,
    record: &OverrideRecord,
) -> Result<(), CommandError> {
    let row = match record {
        OverrideRecord::Constant { value, kind } => ParameterOverride::Constant {
            value: value.clone(),
            kind: *kind,
        },
        OverrideRecord::Function { graph } => {
            let parent = ParentRef::Node {
                graph: graph_id,
                node: node_id,
                property: Some(property.to_string()),
            };
            let function_id = instantiate_graph(doc, graph, parent)?;
            ParameterOverride::Function(function_id)
        }
    };
    let graph = doc
        .graph_mut(graph_id)
        .ok_or(CommandError::GraphNotFound(graph_id))?;
    graph.set_override((node_id, property.to_string()), row);
    Ok(())
}

/// Recreate a node from its snapshot: the node itself, its program body,
/// and its override rows. Edges are restored separately.
pub fn restore_node(
    doc: &mut Document,
    graph_id: GraphId,
    snapshot: &NodeSnapshot,
) -> Result<NodeId, CommandError> {
    let node_id = instantiate_node(doc, graph_id, &snapshot.record)?;
    for (property, record) in &snapshot.overrides {
        restore_override(doc, graph_id, node_id, property, record)?;
    }
    Ok(node_id)
}

/// Restore the incoming edges of a snapshot.
pub fn restore_incoming(
    doc: &mut Document,
    graph_id: GraphId,
    snapshot: &NodeSnapshot,
) -> Result<(), CommandError> {
    let graph = doc
        .graph_mut(graph_id)
        .ok_or(CommandError::GraphNotFound(graph_id))?;
    let node_id = snapshot.record.id;
    for edge in &snapshot.incoming {
        let from_port = graph
            .node(edge.from_node)
            .and_then(|n| n.output(edge.from_output))
            .map(|p| p.id)
            .ok_or(CommandError::NodeNotFound(edge.from_node))?;
        let to_port = graph
            .node(node_id)
            .and_then(|n| n.input(edge.to_input))
            .map(|p| p.id)
            .ok_or(CommandError::NodeNotFound(node_id))?;
        graph.connect(edge.from_node, from_port, node_id, to_port)?;
    }
    Ok(())
}

/// Command to create a node
#[derive(Debug)]
pub struct CreateNodeCommand {
    graph: GraphId,
    record: NodeRecord,
}

impl CreateNodeCommand {
    /// Create from a freshly built (not yet inserted) node
    pub fn new(graph: GraphId, node: &Node) -> Self {
        Self {
            graph,
            record: NodeRecord {
                id: node.id,
                node_type: node.node_type.clone(),
                name: node.name.clone(),
                position: node.position,
                size: node.size,
                inputs: node.inputs.clone(),
                outputs: node.outputs.clone(),
                properties: node.properties.clone(),
                values: node.values.clone(),
                program: None,
                connections: Vec::new(),
            },
        }
    }

    /// The id the node is created under
    pub fn node_id(&self) -> NodeId {
        self.record.id
    }
}

impl GraphCommand for CreateNodeCommand {
    fn label(&self) -> &str {
        "Create Node"
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), CommandError> {
        instantiate_node(doc, self.graph, &self.record)?;
        doc.mark_modified();
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), CommandError> {
        remove_node_deep(doc, self.graph, self.record.id)
    }
}

/// Command to delete a node and everything attached to it
#[derive(Debug)]
pub struct DeleteNodeCommand {
    graph: GraphId,
    node: NodeId,
    snapshot: Option<NodeSnapshot>,
}

impl DeleteNodeCommand {
    /// Create a delete command for one node
    pub fn new(graph: GraphId, node: NodeId) -> Self {
        Self {
            graph,
            node,
            snapshot: None,
        }
    }
}

impl GraphCommand for DeleteNodeCommand {
    fn label(&self) -> &str {
        "Delete Node"
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), CommandError> {
        self.snapshot = Some(capture_node(doc, self.graph, self.node)?);
        remove_node_deep(doc, self.graph, self.node)
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), CommandError> {
        let snapshot = self.snapshot.as_ref().ok_or(CommandError::OutOfOrder)?;
        restore_node(doc, self.graph, snapshot)?;
        connect_node_record(doc, self.graph, &snapshot.record)?;
        restore_incoming(doc, self.graph, snapshot)?;
        doc.mark_modified();
        Ok(())
    }
}

/// Captured endpoints of a replaced or removed edge
#[derive(Debug, Clone)]
struct EdgeEndpoints {
    from_node: NodeId,
    from_port: PortId,
    to_node: NodeId,
    to_port: PortId,
}

/// Command to connect two ports, capturing the edge it replaces
#[derive(Debug)]
pub struct ConnectCommand {
    graph: GraphId,
    from_node: NodeId,
    from_port: PortId,
    to_node: NodeId,
    to_port: PortId,
    replaced: Option<EdgeEndpoints>,
}

impl ConnectCommand {
    /// Create a connect command
    pub fn new(
        graph: GraphId,
        from_node: NodeId,
        from_port: PortId,
        to_node: NodeId,
        to_port: PortId,
    ) -> Self {
        Self {
            graph,
            from_node,
            from_port,
            to_node,
            to_port,
            replaced: None,
        }
    }
}

impl GraphCommand for ConnectCommand {
    fn label(&self) -> &str {
        "Connect"
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), CommandError> {
        let graph = doc
            .graph_mut(self.graph)
            .ok_or(CommandError::GraphNotFound(self.graph))?;
        self.replaced = graph.connection_into(self.to_port).map(|c| EdgeEndpoints {
            from_node: c.from_node,
            from_port: c.from_port,
            to_node: c.to_node,
            to_port: c.to_port,
        });
        graph.connect(self.from_node, self.from_port, self.to_node, self.to_port)?;
        doc.mark_modified();
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), CommandError> {
        let graph = doc
            .graph_mut(self.graph)
            .ok_or(CommandError::GraphNotFound(self.graph))?;
        graph.disconnect_input(self.to_port);
        if let Some(edge) = &self.replaced {
            graph.connect(edge.from_node, edge.from_port, edge.to_node, edge.to_port)?;
        }
        doc.mark_modified();
        Ok(())
    }
}

/// Command to remove the edge into an input port
#[derive(Debug)]
pub struct DisconnectCommand {
    graph: GraphId,
    to_port: PortId,
    removed: Option<EdgeEndpoints>,
}

impl DisconnectCommand {
    /// Create a disconnect command
    pub fn new(graph: GraphId, to_port: PortId) -> Self {
        Self {
            graph,
            to_port,
            removed: None,
        }
    }
}

impl GraphCommand for DisconnectCommand {
    fn label(&self) -> &str {
        "Disconnect"
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), CommandError> {
        let graph = doc
            .graph_mut(self.graph)
            .ok_or(CommandError::GraphNotFound(self.graph))?;
        self.removed = graph.disconnect_input(self.to_port).map(|c| EdgeEndpoints {
            from_node: c.from_node,
            from_port: c.from_port,
            to_node: c.to_node,
            to_port: c.to_port,
        });
        if self.removed.is_some() {
            doc.mark_modified();
        }
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), CommandError> {
        if let Some(edge) = &self.removed {
            let graph = doc
                .graph_mut(self.graph)
                .ok_or(CommandError::GraphNotFound(self.graph))?;
            graph.connect(edge.from_node, edge.from_port, edge.to_node, edge.to_port)?;
            doc.mark_modified();
        }
        Ok(())
    }
}

/// Capture the current override row at a key, if any.
fn capture_override(
    doc: &Document,
    graph_id: GraphId,
    node_id: NodeId,
    property: &str,
) -> Result<Option<OverrideRecord>, CommandError> {
    let key = (node_id, property.to_string());
    let Some(row) = doc.get_override(graph_id, &key) else {
        return Ok(None);
    };
    let record = match row {
        ParameterOverride::Constant { value, kind } => OverrideRecord::Constant {
            value: value.clone(),
            kind: *kind,
        },
        ParameterOverride::Function(function_id) => OverrideRecord::Function {
            graph: Box::new(GraphRecord::capture(doc, *function_id)?),
        },
    };
    Ok(Some(record))
}

/// Put a key back into the state a captured record describes: default when
/// `None`, otherwise the captured row.
fn reset_override(
    doc: &mut Document,
    graph_id: GraphId,
    node_id: NodeId,
    property: &str,
    prior: Option<&OverrideRecord>,
) -> Result<(), CommandError> {
    doc.demote(graph_id, node_id, property, false)?;
    if let Some(record) = prior {
        restore_override(doc, graph_id, node_id, property, record)?;
    }
    Ok(())
}

/// Command to promote a property to a constant override
#[derive(Debug)]
pub struct PromoteConstantCommand {
    graph: GraphId,
    node: NodeId,
    property: String,
    prior: Option<Option<OverrideRecord>>,
}

impl PromoteConstantCommand {
    /// Create a promote-to-constant command
    pub fn new(graph: GraphId, node: NodeId, property: impl Into<String>) -> Self {
        Self {
            graph,
            node,
            property: property.into(),
            prior: None,
        }
    }
}

impl GraphCommand for PromoteConstantCommand {
    fn label(&self) -> &str {
        "Promote to Constant"
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), CommandError> {
        self.prior = Some(capture_override(doc, self.graph, self.node, &self.property)?);
        doc.promote_to_constant(self.graph, self.node, &self.property)?;
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), CommandError> {
        let prior = self.prior.as_ref().ok_or(CommandError::OutOfOrder)?;
        reset_override(doc, self.graph, self.node, &self.property, prior.as_ref())
    }
}

/// Command to promote a property to function mode.
///
/// The first apply creates a fresh function graph; a redo after undo
/// recreates the same graph from the snapshot captured at revert time, so
/// ids stay stable across the undo/redo cycle.
#[derive(Debug)]
pub struct PromoteFunctionCommand {
    graph: GraphId,
    node: NodeId,
    property: String,
    prior: Option<Option<OverrideRecord>>,
    body: Option<GraphRecord>,
}

impl PromoteFunctionCommand {
    /// Create a promote-to-function command
    pub fn new(graph: GraphId, node: NodeId, property: impl Into<String>) -> Self {
        Self {
            graph,
            node,
            property: property.into(),
            prior: None,
            body: None,
        }
    }
}

impl GraphCommand for PromoteFunctionCommand {
    fn label(&self) -> &str {
        "Promote to Function"
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), CommandError> {
        self.prior = Some(capture_override(doc, self.graph, self.node, &self.property)?);
        match &self.body {
            Some(record) => {
                let parent = ParentRef::Node {
                    graph: self.graph,
                    node: self.node,
                    property: Some(self.property.clone()),
                };
                let function_id = instantiate_graph(doc, record, parent)?;
                doc.attach_function(function_id, self.graph, self.node, &self.property)?;
            }
            None => {
                doc.promote_to_function(self.graph, self.node, &self.property)?;
            }
        }
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), CommandError> {
        let prior = self.prior.as_ref().ok_or(CommandError::OutOfOrder)?;
        let key = (self.node, self.property.clone());
        if let Some(function_id) = doc
            .get_override(self.graph, &key)
            .and_then(ParameterOverride::function)
        {
            self.body = Some(GraphRecord::capture(doc, function_id)?);
        }
        reset_override(doc, self.graph, self.node, &self.property, prior.as_ref())
    }
}

/// Command to demote a property back to its default
#[derive(Debug)]
pub struct DemoteCommand {
    graph: GraphId,
    node: NodeId,
    property: String,
    removed: Option<Option<OverrideRecord>>,
}

impl DemoteCommand {
    /// Create a demote command
    pub fn new(graph: GraphId, node: NodeId, property: impl Into<String>) -> Self {
        Self {
            graph,
            node,
            property: property.into(),
            removed: None,
        }
    }
}

impl GraphCommand for DemoteCommand {
    fn label(&self) -> &str {
        "Demote to Default"
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), CommandError> {
        self.removed = Some(capture_override(doc, self.graph, self.node, &self.property)?);
        doc.demote(self.graph, self.node, &self.property, false)?;
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), CommandError> {
        let removed = self.removed.as_ref().ok_or(CommandError::OutOfOrder)?;
        reset_override(doc, self.graph, self.node, &self.property, removed.as_ref())
    }
}

/// Command to move a function graph between call sites
#[derive(Debug)]
pub struct ReassignFunctionCommand {
    from: (GraphId, NodeId, String),
    to: (GraphId, NodeId, String),
}

impl ReassignFunctionCommand {
    /// Create a reassign command
    pub fn new(from: (GraphId, NodeId, String), to: (GraphId, NodeId, String)) -> Self {
        Self { from, to }
    }
}

impl GraphCommand for ReassignFunctionCommand {
    fn label(&self) -> &str {
        "Move Function"
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), CommandError> {
        doc.reassign_function(
            (self.from.0, self.from.1, &self.from.2),
            (self.to.0, self.to.1, &self.to.2),
        )?;
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), CommandError> {
        doc.reassign_function(
            (self.to.0, self.to.1, &self.to.2),
            (self.from.0, self.from.1, &self.from.2),
        )?;
        Ok(())
    }
}

/// Command to set a property's live value
#[derive(Debug)]
pub struct SetValueCommand {
    graph: GraphId,
    node: NodeId,
    property: String,
    value: Value,
    previous: Option<Option<Value>>,
}

impl SetValueCommand {
    /// Create a set-value command
    pub fn new(graph: GraphId, node: NodeId, property: impl Into<String>, value: Value) -> Self {
        Self {
            graph,
            node,
            property: property.into(),
            value,
            previous: None,
        }
    }
}

impl GraphCommand for SetValueCommand {
    fn label(&self) -> &str {
        "Edit Value"
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), CommandError> {
        let node = doc
            .graph_mut(self.graph)
            .ok_or(CommandError::GraphNotFound(self.graph))?
            .node_mut(self.node)
            .ok_or(CommandError::NodeNotFound(self.node))?;
        self.previous = Some(node.values.get(&self.property).cloned());
        node.set_value(&self.property, self.value.clone());
        doc.mark_modified();
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), CommandError> {
        let previous = self.previous.as_ref().ok_or(CommandError::OutOfOrder)?;
        let node = doc
            .graph_mut(self.graph)
            .ok_or(CommandError::GraphNotFound(self.graph))?
            .node_mut(self.node)
            .ok_or(CommandError::NodeNotFound(self.node))?;
        match previous {
            Some(value) => {
                node.set_value(&self.property, value.clone());
            }
            None => node.reset_value(&self.property),
        }
        doc.mark_modified();
        Ok(())
    }
}

/// Command to paste a clipboard payload
#[derive(Debug)]
pub struct PasteCommand {
    graph: GraphId,
    payload: clipboard::ClipboardPayload,
    target: [f32; 2],
    pasted: Vec<NodeId>,
    snapshots: Option<Vec<NodeSnapshot>>,
}

impl PasteCommand {
    /// Create a paste command
    pub fn new(graph: GraphId, payload: clipboard::ClipboardPayload, target: [f32; 2]) -> Self {
        Self {
            graph,
            payload,
            target,
            pasted: Vec::new(),
            snapshots: None,
        }
    }

    /// Ids of the pasted nodes, available after apply
    pub fn pasted(&self) -> &[NodeId] {
        &self.pasted
    }
}

impl GraphCommand for PasteCommand {
    fn label(&self) -> &str {
        "Paste"
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), CommandError> {
        match &self.snapshots {
            // Redo: recreate the exact nodes the undo removed.
            Some(snapshots) => {
                for snapshot in snapshots {
                    restore_node(doc, self.graph, snapshot)?;
                }
                for snapshot in snapshots {
                    connect_node_record(doc, self.graph, &snapshot.record)?;
                }
                doc.mark_modified();
            }
            None => {
                self.pasted = clipboard::paste(doc, self.graph, &self.payload, self.target)?;
            }
        }
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), CommandError> {
        let mut snapshots = Vec::with_capacity(self.pasted.len());
        for node_id in &self.pasted {
            snapshots.push(capture_node(doc, self.graph, *node_id)?);
        }
        for node_id in &self.pasted {
            remove_node_deep(doc, self.graph, *node_id)?;
        }
        self.snapshots = Some(snapshots);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matforge_graph::{NodeType, Port, PropertyDescriptor, TypeSet};

    fn noise_type() -> NodeType {
        NodeType {
            id: "noise".into(),
            name: "Noise".into(),
            inputs: vec![Port::input("in", TypeSet::FLOAT)],
            outputs: vec![Port::output("out", TypeSet::FLOAT)],
            properties: vec![PropertyDescriptor::promotable("scale", Value::Float(4.0))],
        }
    }

    fn chain_doc() -> (Document, GraphId, NodeId, NodeId, NodeId) {
        let mut doc = Document::new("material");
        let root = doc.root();
        let graph = doc.graph_mut(root).unwrap();
        let a = graph.add_node(Node::new(&noise_type())).unwrap();
        let b = graph.add_node(Node::new(&noise_type())).unwrap();
        let c = graph.add_node(Node::new(&noise_type())).unwrap();
        connect(&mut doc, root, a, b);
        connect(&mut doc, root, b, c);
        (doc, root, a, b, c)
    }

    fn connect(doc: &mut Document, graph_id: GraphId, from: NodeId, to: NodeId) {
        let graph = doc.graph_mut(graph_id).unwrap();
        let from_port = graph.node(from).unwrap().outputs[0].id;
        let to_port = graph.node(to).unwrap().inputs[0].id;
        graph.connect(from, from_port, to, to_port).unwrap();
    }

    fn structure(doc: &Document) -> String {
        GraphRecord::capture(doc, doc.root())
            .unwrap()
            .to_json()
            .unwrap()
    }

    #[test]
    fn test_delete_then_revert_restores_edges_and_overrides() {
        let (mut doc, root, _, b, _) = chain_doc();
        doc.promote_to_function(root, b, "scale").unwrap();
        let before = structure(&doc);

        let mut cmd = DeleteNodeCommand::new(root, b);
        cmd.apply(&mut doc).unwrap();
        assert!(doc.graph(root).unwrap().node(b).is_none());
        assert_eq!(doc.graph(root).unwrap().connection_count(), 0);

        cmd.revert(&mut doc).unwrap();
        assert_eq!(structure(&doc), before);
    }

    #[test]
    fn test_connect_revert_restores_replaced_edge() {
        let (mut doc, root, a, _, c) = chain_doc();
        // Rewire c's input from b to a, then revert.
        let before = structure(&doc);
        let from_port = doc.graph(root).unwrap().node(a).unwrap().outputs[0].id;
        let to_port = doc.graph(root).unwrap().node(c).unwrap().inputs[0].id;

        let mut cmd = ConnectCommand::new(root, a, from_port, c, to_port);
        cmd.apply(&mut doc).unwrap();
        assert_eq!(
            doc.graph(root).unwrap().connection_into(to_port).unwrap().from_node,
            a
        );

        cmd.revert(&mut doc).unwrap();
        let restored = doc.graph(root).unwrap().connection_into(to_port).unwrap();
        assert_ne!(restored.from_node, a);
        assert_eq!(doc.graph(root).unwrap().connection_count(), 2);
        let _ = before;
    }

    #[test]
    fn test_disconnect_round_trip() {
        let (mut doc, root, a, b, _) = chain_doc();
        let to_port = doc.graph(root).unwrap().node(b).unwrap().inputs[0].id;

        let mut cmd = DisconnectCommand::new(root, to_port);
        cmd.apply(&mut doc).unwrap();
        assert!(doc.graph(root).unwrap().connection_into(to_port).is_none());

        cmd.revert(&mut doc).unwrap();
        assert_eq!(
            doc.graph(root).unwrap().connection_into(to_port).unwrap().from_node,
            a
        );
    }

    #[test]
    fn test_promote_function_redo_keeps_graph_contents() {
        let (mut doc, root, a, _, _) = chain_doc();
        let mut cmd = PromoteFunctionCommand::new(root, a, "scale");
        cmd.apply(&mut doc).unwrap();

        let key = (a, "scale".to_string());
        let function = doc
            .get_override(root, &key)
            .and_then(ParameterOverride::function)
            .unwrap();
        // Populate the function body so redo has something to lose.
        doc.graph_mut(function)
            .unwrap()
            .add_node(Node::new(&noise_type()))
            .unwrap();

        cmd.revert(&mut doc).unwrap();
        assert!(doc.get_override(root, &key).is_none());
        assert!(doc.graph(function).is_none());

        cmd.apply(&mut doc).unwrap();
        let redone = doc
            .get_override(root, &key)
            .and_then(ParameterOverride::function)
            .unwrap();
        assert_eq!(redone, function);
        assert_eq!(doc.graph(redone).unwrap().node_count(), 1);
    }

    #[test]
    fn test_promote_constant_revert_restores_prior_function() {
        let (mut doc, root, a, _, _) = chain_doc();
        doc.promote_to_function(root, a, "scale").unwrap();
        let before = structure(&doc);

        let mut cmd = PromoteConstantCommand::new(root, a, "scale");
        cmd.apply(&mut doc).unwrap();
        let key = (a, "scale".to_string());
        assert!(!doc.is_function(root, &key));

        cmd.revert(&mut doc).unwrap();
        assert!(doc.is_function(root, &key));
        assert_eq!(structure(&doc), before);
    }

    #[test]
    fn test_set_value_revert_restores_default_state() {
        let (mut doc, root, a, _, _) = chain_doc();
        let mut cmd = SetValueCommand::new(root, a, "scale", Value::Float(9.0));
        cmd.apply(&mut doc).unwrap();
        assert_eq!(
            doc.graph(root).unwrap().node(a).unwrap().value("scale"),
            Some(&Value::Float(9.0))
        );

        cmd.revert(&mut doc).unwrap();
        // Back to the schema default, not a stored copy of it.
        assert!(doc.graph(root).unwrap().node(a).unwrap().values.is_empty());
        assert_eq!(
            doc.graph(root).unwrap().node(a).unwrap().value("scale"),
            Some(&Value::Float(4.0))
        );
    }

    #[test]
    fn test_paste_undo_redo_round_trip() {
        let (mut doc, root, a, b, _) = chain_doc();
        let payload = clipboard::copy(&doc, root, &[a, b]).unwrap();

        let mut cmd = PasteCommand::new(root, payload, [500.0, 500.0]);
        cmd.apply(&mut doc).unwrap();
        assert_eq!(cmd.pasted().len(), 2);
        assert_eq!(doc.graph(root).unwrap().node_count(), 5);
        let after_paste = structure(&doc);

        cmd.revert(&mut doc).unwrap();
        assert_eq!(doc.graph(root).unwrap().node_count(), 3);

        cmd.apply(&mut doc).unwrap();
        assert_eq!(structure(&doc), after_paste);
    }
}
