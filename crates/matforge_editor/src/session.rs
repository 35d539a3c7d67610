// SPDX-License-Identifier: MIT OR Apache-2.0
//! One open document and its editing state.
//!
//! A session owns the document, the node type registry, the breadcrumb
//! navigator, the undo ledger, and the commit debouncer, and exposes the
//! operations a front end calls. Every structural edit goes through a
//! command so it lands on the undo stack; every successful edit marks the
//! document modified and publishes a graph update.

use crate::commands::{
    CommandError, ConnectCommand, CreateNodeCommand, DeleteNodeCommand, DemoteCommand,
    DisconnectCommand, GraphCommand, PasteCommand, PromoteConstantCommand, PromoteFunctionCommand,
    ReassignFunctionCommand, SetValueCommand,
};
use crate::debounce::CommitDebouncer;
use crate::events::{EditorEvent, EventHub};
use crate::history::UndoLedger;
use crate::navigator::{Navigator, StackEntry, StackEntryKind};
use matforge_graph::clipboard::{self, ClipboardPayload};
use matforge_graph::format::{instantiate_document, FormatError, GraphRecord};
use matforge_graph::{
    Document, GraphId, Node, NodeId, NodeRegistry, ParamError, ParameterOverride, PortId, Value,
};
use std::time::Instant;
use uuid::Uuid;

/// Error surfaced by session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A command failed to apply
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Serialization failed
    #[error(transparent)]
    Format(#[from] FormatError),

    /// A parameter lookup failed
    #[error(transparent)]
    Param(#[from] ParamError),

    /// Unknown node type name
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// Graph not found in the document
    #[error("Graph not found: {0:?}")]
    GraphNotFound(GraphId),

    /// Node not found in the displayed graph
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),
}

/// An open document plus all of its editing state.
pub struct Session {
    document: Document,
    registry: NodeRegistry,
    navigator: Navigator,
    hub: EventHub,
    ledger: UndoLedger,
    debouncer: CommitDebouncer,
}

impl Session {
    /// Open a session on a fresh document
    pub fn new(name: impl Into<String>, registry: NodeRegistry) -> Self {
        Self::from_document(Document::new(name), registry)
    }

    /// Open a session on a saved document
    pub fn open(json: &str, registry: NodeRegistry) -> Result<Self, SessionError> {
        let record = GraphRecord::from_json(json)?;
        let document = instantiate_document(&record)?;
        Ok(Self::from_document(document, registry))
    }

    fn from_document(document: Document, registry: NodeRegistry) -> Self {
        let navigator = Navigator::new(document.id, document.root());
        Self {
            document,
            registry,
            navigator,
            hub: EventHub::new(),
            ledger: UndoLedger::new(),
            debouncer: CommitDebouncer::new(),
        }
    }

    /// The open document
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The event hub, for subscribing front-end listeners
    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// The undo ledger
    pub fn ledger(&self) -> &UndoLedger {
        &self.ledger
    }

    /// The breadcrumb navigator
    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// The graph currently displayed
    pub fn displayed(&self) -> GraphId {
        self.navigator.displayed()
    }

    fn commit(&mut self, mut command: Box<dyn GraphCommand>, graph: GraphId) -> Result<(), SessionError> {
        command.apply(&mut self.document)?;
        self.ledger.push(self.document.id, command, &self.hub);
        self.document.mark_modified();
        self.hub.publish(&EditorEvent::GraphUpdated {
            document: self.document.id,
            graph,
        });
        Ok(())
    }

    /// Create a node of a registered type in the displayed graph
    pub fn create_node(&mut self, type_id: &str, position: [f32; 2]) -> Result<NodeId, SessionError> {
        let mut node = self
            .registry
            .create_node(type_id)
            .ok_or_else(|| SessionError::UnknownNodeType(type_id.to_string()))?;
        node.position = position;
        let graph = self.displayed();
        let command = CreateNodeCommand::new(graph, &node);
        let node_id = command.node_id();
        self.commit(Box::new(command), graph)?;
        Ok(node_id)
    }

    /// Delete a node from the displayed graph
    pub fn delete_node(&mut self, node: NodeId) -> Result<(), SessionError> {
        let graph = self.displayed();
        self.commit(Box::new(DeleteNodeCommand::new(graph, node)), graph)
    }

    /// Connect an output port to an input port in the displayed graph
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_port: PortId,
        to_node: NodeId,
        to_port: PortId,
    ) -> Result<(), SessionError> {
        let graph = self.displayed();
        self.commit(
            Box::new(ConnectCommand::new(graph, from_node, from_port, to_node, to_port)),
            graph,
        )?;
        self.hub.publish(&EditorEvent::LinesChanged {
            document: self.document.id,
            graph,
        });
        Ok(())
    }

    /// Remove the edge into an input port
    pub fn disconnect(&mut self, to_port: PortId) -> Result<(), SessionError> {
        let graph = self.displayed();
        self.commit(Box::new(DisconnectCommand::new(graph, to_port)), graph)?;
        self.hub.publish(&EditorEvent::LinesChanged {
            document: self.document.id,
            graph,
        });
        Ok(())
    }

    /// Promote a property to a constant override
    pub fn promote_to_constant(&mut self, node: NodeId, property: &str) -> Result<(), SessionError> {
        let graph = self.displayed();
        self.commit(
            Box::new(PromoteConstantCommand::new(graph, node, property)),
            graph,
        )
    }

    /// Promote a property to function mode
    pub fn promote_to_function(&mut self, node: NodeId, property: &str) -> Result<(), SessionError> {
        let graph = self.displayed();
        self.commit(
            Box::new(PromoteFunctionCommand::new(graph, node, property)),
            graph,
        )
    }

    /// Demote a property back to default state
    pub fn demote(&mut self, node: NodeId, property: &str) -> Result<(), SessionError> {
        let graph = self.displayed();
        self.commit(Box::new(DemoteCommand::new(graph, node, property)), graph)
    }

    /// Move a function graph between call sites in the displayed graph
    pub fn reassign_function(
        &mut self,
        from: (NodeId, &str),
        to: (NodeId, &str),
    ) -> Result<(), SessionError> {
        let graph = self.displayed();
        self.commit(
            Box::new(ReassignFunctionCommand::new(
                (graph, from.0, from.1.to_string()),
                (graph, to.0, to.1.to_string()),
            )),
            graph,
        )
    }

    /// Serialize a node selection to clipboard text
    pub fn copy(&self, selection: &[NodeId]) -> Result<String, SessionError> {
        let payload = clipboard::copy(&self.document, self.displayed(), selection)?;
        Ok(payload.to_json()?)
    }

    /// Paste clipboard text into the displayed graph.
    ///
    /// Text that is not a paste payload is ignored; nothing is pasted and
    /// nothing lands on the undo stack.
    pub fn paste(&mut self, text: &str, target: [f32; 2]) -> Result<Vec<NodeId>, SessionError> {
        let Some(payload) = ClipboardPayload::from_json(text) else {
            return Ok(Vec::new());
        };
        if payload.is_empty() {
            return Ok(Vec::new());
        }
        let graph = self.displayed();
        let mut command = PasteCommand::new(graph, payload, target);
        command.apply(&mut self.document)?;
        let pasted = command.pasted().to_vec();
        if pasted.is_empty() {
            return Ok(pasted);
        }
        self.ledger.push(self.document.id, Box::new(command), &self.hub);
        self.document.mark_modified();
        self.hub.publish(&EditorEvent::GraphUpdated {
            document: self.document.id,
            graph,
        });
        Ok(pasted)
    }

    /// Undo the most recent edit
    pub fn undo(&mut self) -> bool {
        let changed = self
            .ledger
            .undo(self.document.id, &mut self.document, &self.hub);
        if changed {
            self.document.mark_modified();
        }
        changed
    }

    /// Redo the most recently undone edit
    pub fn redo(&mut self) -> bool {
        let changed = self
            .ledger
            .redo(self.document.id, &mut self.document, &self.hub);
        if changed {
            self.document.mark_modified();
        }
        changed
    }

    /// Descend into a node's per-pixel program, creating it on first entry
    pub fn enter_program(&mut self, node: NodeId) -> Result<GraphId, SessionError> {
        let graph = self.displayed();
        let program = self.document.pixel_program(graph, node)?;
        self.navigator.push(
            StackEntry {
                id: node.0,
                graph: program,
                kind: StackEntryKind::Pixel,
                property: None,
            },
            &self.hub,
        );
        Ok(program)
    }

    /// Descend into a promoted parameter's function graph
    pub fn enter_parameter(&mut self, node: NodeId, property: &str) -> Result<GraphId, SessionError> {
        let graph = self.displayed();
        let key = (node, property.to_string());
        let function = self
            .document
            .get_override(graph, &key)
            .and_then(ParameterOverride::function)
            .ok_or(ParamError::NoFunctionAt(node))?;
        self.navigator.push(
            StackEntry {
                id: node.0,
                graph: function,
                kind: StackEntryKind::Parameter,
                property: Some(property.to_string()),
            },
            &self.hub,
        );
        Ok(function)
    }

    /// Descend into a custom function hosted by the displayed graph
    pub fn enter_function(&mut self, function: GraphId) -> Result<GraphId, SessionError> {
        let graph = self.displayed();
        let hosted = self
            .document
            .graph(graph)
            .ok_or(SessionError::GraphNotFound(graph))?
            .custom_functions()
            .contains(&function);
        if !hosted {
            return Err(SessionError::GraphNotFound(function));
        }
        self.navigator.push(
            StackEntry {
                id: function.0,
                graph: function,
                kind: StackEntryKind::Function,
                property: None,
            },
            &self.hub,
        );
        Ok(function)
    }

    /// Return to an ancestor graph (`None` returns to the root)
    pub fn pop_to(&mut self, entry_id: Option<Uuid>) -> GraphId {
        self.navigator.pop_to(entry_id, &self.hub)
    }

    /// Serialize the navigation path for session persistence
    pub fn serialize_stack(&self) -> Result<String, SessionError> {
        Ok(self
            .navigator
            .serialize_stack()
            .map_err(FormatError::from)?)
    }

    /// Replay a serialized navigation path; falls back to the root on any
    /// stale entry
    pub fn restore_stack(&mut self, json: &str) -> bool {
        self.navigator.restore(json, &self.document, &self.hub)
    }

    /// Record a live value change against the displayed graph; the settled
    /// value becomes an undoable command once the key has been quiet, via
    /// [`Self::pump`]
    pub fn set_value_debounced(
        &mut self,
        node: NodeId,
        property: &str,
        value: Value,
        now: Instant,
    ) {
        let graph = self.displayed();
        self.debouncer.submit(graph, node, property, value, now);
    }

    /// Commit every debounced value whose quiet period has elapsed.
    ///
    /// Each value targets the graph it was submitted in, so commits land
    /// correctly even after navigating elsewhere. A failing commit is
    /// logged and skipped; the rest of the batch still lands. Returns the
    /// number of committed values.
    pub fn pump(&mut self, now: Instant) -> usize {
        let mut committed = 0;
        for (graph, (node, property), value) in self.debouncer.poll(now) {
            let command = SetValueCommand::new(graph, node, property.clone(), value);
            match self.commit(Box::new(command), graph) {
                Ok(()) => committed += 1,
                Err(err) => {
                    tracing::error!("debounced commit of '{property}' failed: {err}");
                }
            }
        }
        committed
    }

    /// Serialize the whole document and clear the modified flag
    pub fn save(&mut self) -> Result<String, SessionError> {
        self.debouncer.cancel();
        let record = GraphRecord::capture(&self.document, self.document.root())?;
        let json = record.to_json()?;
        self.document.clear_modified();
        Ok(json)
    }

    /// Rename a graph and notify listeners
    pub fn rename_graph(&mut self, graph: GraphId, name: impl Into<String>) -> Result<(), SessionError> {
        let name = name.into();
        let target = self
            .document
            .graph_mut(graph)
            .ok_or(SessionError::GraphNotFound(graph))?;
        target.name.clone_from(&name);
        self.document.mark_modified();
        self.hub.publish(&EditorEvent::NameChanged {
            document: self.document.id,
            graph,
            name,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matforge_graph::{NodeType, Port, PropertyDescriptor, TypeSet};
    use std::time::Duration;

    fn registry() -> NodeRegistry {
        let mut registry = NodeRegistry::new();
        registry.register(NodeType {
            id: "noise".into(),
            name: "Noise".into(),
            inputs: vec![Port::input("in", TypeSet::FLOAT)],
            outputs: vec![Port::output("out", TypeSet::FLOAT)],
            properties: vec![PropertyDescriptor::promotable("scale", Value::Float(4.0))],
        });
        registry
    }

    fn session() -> Session {
        Session::new("material", registry())
    }

    #[test]
    fn test_edit_cycle_with_undo() {
        let mut session = session();
        let a = session.create_node("noise", [0.0, 0.0]).unwrap();
        let b = session.create_node("noise", [200.0, 0.0]).unwrap();

        let graph = session.displayed();
        let from_port = session.document().graph(graph).unwrap().node(a).unwrap().outputs[0].id;
        let to_port = session.document().graph(graph).unwrap().node(b).unwrap().inputs[0].id;
        session.connect(a, from_port, b, to_port).unwrap();

        assert_eq!(session.document().graph(graph).unwrap().connection_count(), 1);
        assert!(session.document().is_modified());

        assert!(session.undo());
        assert_eq!(session.document().graph(graph).unwrap().connection_count(), 0);
        assert!(session.undo());
        assert_eq!(session.document().graph(graph).unwrap().node_count(), 1);

        assert!(session.redo());
        assert!(session.redo());
        assert_eq!(session.document().graph(graph).unwrap().connection_count(), 1);
    }

    #[test]
    fn test_unknown_node_type_is_an_error() {
        let mut session = session();
        assert!(matches!(
            session.create_node("nope", [0.0, 0.0]),
            Err(SessionError::UnknownNodeType(_))
        ));
    }

    #[test]
    fn test_navigation_into_parameter_function() {
        let mut session = session();
        let node = session.create_node("noise", [0.0, 0.0]).unwrap();
        session.promote_to_function(node, "scale").unwrap();

        let root = session.document().root();
        let function = session.enter_parameter(node, "scale").unwrap();
        assert_eq!(session.displayed(), function);
        assert_ne!(function, root);

        // Edits now land in the function graph.
        let inner = session.create_node("noise", [0.0, 0.0]).unwrap();
        assert!(session.document().graph(function).unwrap().node(inner).is_some());

        session.pop_to(None);
        assert_eq!(session.displayed(), root);
    }

    #[test]
    fn test_stack_survives_save_and_restore() {
        let mut session = session();
        let node = session.create_node("noise", [0.0, 0.0]).unwrap();
        session.promote_to_function(node, "scale").unwrap();
        session.enter_parameter(node, "scale").unwrap();

        let stack = session.serialize_stack().unwrap();
        let saved = session.save().unwrap();
        assert!(!session.document().is_modified());

        let mut reopened = Session::open(&saved, registry()).unwrap();
        assert!(reopened.restore_stack(&stack));
        assert_eq!(reopened.navigator().depth(), 1);
    }

    #[test]
    fn test_copy_paste_through_clipboard_text() {
        let mut session = session();
        let a = session.create_node("noise", [0.0, 0.0]).unwrap();
        let b = session.create_node("noise", [200.0, 0.0]).unwrap();

        let text = session.copy(&[a, b]).unwrap();
        let pasted = session.paste(&text, [400.0, 0.0]).unwrap();
        assert_eq!(pasted.len(), 2);

        let graph = session.displayed();
        assert_eq!(session.document().graph(graph).unwrap().node_count(), 4);

        // Arbitrary clipboard text pastes nothing and is not undoable.
        let depth = session.ledger().undo_depth(session.document().id);
        assert!(session.paste("hello", [0.0, 0.0]).unwrap().is_empty());
        assert_eq!(session.ledger().undo_depth(session.document().id), depth);
    }

    #[test]
    fn test_debounced_values_become_one_command() {
        let mut session = session();
        let node = session.create_node("noise", [0.0, 0.0]).unwrap();
        let start = Instant::now();

        for i in 0..5u64 {
            session.set_value_debounced(
                node,
                "scale",
                Value::Float(10.0 + i as f32),
                start + Duration::from_millis(i * 10),
            );
        }
        assert_eq!(session.pump(start + Duration::from_millis(60)), 0);
        assert_eq!(session.pump(start + Duration::from_secs(1)), 1);

        let graph = session.displayed();
        assert_eq!(
            session.document().graph(graph).unwrap().node(node).unwrap().value("scale"),
            Some(&Value::Float(14.0))
        );

        // One undo steps back over the whole drag.
        assert!(session.undo());
        assert_eq!(
            session.document().graph(graph).unwrap().node(node).unwrap().value("scale"),
            Some(&Value::Float(4.0))
        );
    }

    #[test]
    fn test_debounced_commit_lands_in_its_graph_after_navigation() {
        let mut session = session();
        let node = session.create_node("noise", [0.0, 0.0]).unwrap();
        session.promote_to_function(node, "scale").unwrap();
        let function = session.enter_parameter(node, "scale").unwrap();
        let inner = session.create_node("noise", [0.0, 0.0]).unwrap();

        // Drag a value inside the function graph, then leave before the
        // quiet period elapses.
        let start = Instant::now();
        session.set_value_debounced(inner, "scale", Value::Float(7.0), start);
        session.pop_to(None);

        assert_eq!(session.pump(start + Duration::from_secs(1)), 1);
        assert_eq!(
            session
                .document()
                .graph(function)
                .unwrap()
                .node(inner)
                .unwrap()
                .value("scale"),
            Some(&Value::Float(7.0))
        );
    }

    #[test]
    fn test_wire_changes_publish_line_events() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let mut session = session();
        let a = session.create_node("noise", [0.0, 0.0]).unwrap();
        let b = session.create_node("noise", [200.0, 0.0]).unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        session.hub().subscribe(move |event| {
            if matches!(event, EditorEvent::LinesChanged { .. }) {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });

        let graph = session.displayed();
        let from_port = session.document().graph(graph).unwrap().node(a).unwrap().outputs[0].id;
        let to_port = session.document().graph(graph).unwrap().node(b).unwrap().inputs[0].id;
        session.connect(a, from_port, b, to_port).unwrap();
        session.disconnect(to_port).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
