// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph stack navigation.
//!
//! The navigator records the editor's current path through nested
//! sub-graphs as a breadcrumb stack. The displayed graph is always the top
//! entry's destination, or the document's root graph when the stack is
//! empty (the root is implicit, never an entry itself).

use crate::events::{EditorEvent, EventHub};
use matforge_graph::{Document, DocumentId, GraphId, NodeId, ParameterOverride};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of sub-graph an entry descended into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackEntryKind {
    /// A node's per-pixel program
    Pixel,
    /// A promoted parameter's function graph
    Parameter,
    /// A named custom function
    Function,
}

/// One navigation step
#[derive(Debug, Clone, PartialEq)]
pub struct StackEntry {
    /// Node id (pixel/parameter entries) or function graph id (function
    /// entries)
    pub id: Uuid,
    /// Destination graph
    pub graph: GraphId,
    /// Entry kind
    pub kind: StackEntryKind,
    /// Property name, for parameter entries
    pub property: Option<String>,
}

/// Serialized form of one stack entry, independent of the full graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackEntryRecord {
    /// Node or function graph id
    pub id: Uuid,
    /// Property name, for parameter entries
    pub parameter: Option<String>,
    /// Entry kind
    #[serde(rename = "type")]
    pub kind: StackEntryKind,
}

/// Per-document breadcrumb navigator.
#[derive(Debug)]
pub struct Navigator {
    document: DocumentId,
    root: GraphId,
    stack: Vec<StackEntry>,
    attached: Option<GraphId>,
}

impl Navigator {
    /// Create a navigator showing the root graph
    pub fn new(document: DocumentId, root: GraphId) -> Self {
        Self {
            document,
            root,
            stack: Vec::new(),
            attached: None,
        }
    }

    /// The graph currently displayed
    pub fn displayed(&self) -> GraphId {
        self.stack.last().map_or(self.root, |e| e.graph)
    }

    /// The breadcrumb entries, bottom first
    pub fn entries(&self) -> &[StackEntry] {
        &self.stack
    }

    /// Stack depth (the implicit root is not counted)
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Enter a sub-graph.
    ///
    /// A no-op when an entry with the same id and kind is already anywhere
    /// on the stack; returns whether the entry was pushed.
    pub fn push(&mut self, entry: StackEntry, hub: &EventHub) -> bool {
        if self
            .stack
            .iter()
            .any(|e| e.id == entry.id && e.kind == entry.kind)
        {
            return false;
        }
        self.stack.push(entry);
        self.sync(hub);
        true
    }

    /// Return to an ancestor.
    ///
    /// `None` clears the whole stack back to the root. `Some(id)` pops
    /// entries until that entry tops the stack; a no-op when it already
    /// does, or when the id is not on the stack at all.
    pub fn pop_to(&mut self, entry_id: Option<Uuid>, hub: &EventHub) -> GraphId {
        match entry_id {
            None => self.stack.clear(),
            Some(id) => {
                let Some(index) = self.stack.iter().position(|e| e.id == id) else {
                    tracing::debug!("pop_to target {id} not on the stack");
                    return self.displayed();
                };
                self.stack.truncate(index + 1);
            }
        }
        self.sync(hub);
        self.displayed()
    }

    /// Serialize the current path for session restore
    pub fn serialize_stack(&self) -> Result<String, serde_json::Error> {
        let records: Vec<StackEntryRecord> = self
            .stack
            .iter()
            .map(|e| StackEntryRecord {
                id: e.id,
                parameter: e.property.clone(),
                kind: e.kind,
            })
            .collect();
        serde_json::to_string(&records)
    }

    /// Replay a serialized path against the current document.
    ///
    /// Every step must resolve against the graph reached so far; any stale
    /// id or structural mismatch discards the whole path and shows the
    /// root graph. Returns whether the full path was restored.
    pub fn restore(&mut self, json: &str, doc: &Document, hub: &EventHub) -> bool {
        let records: Vec<StackEntryRecord> = match serde_json::from_str(json) {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!("stack restore aborted, records do not parse: {err}");
                self.stack.clear();
                self.sync(hub);
                return false;
            }
        };

        // Resolve the whole path before touching the live stack, so a
        // failure can never leave it half-applied.
        let mut resolved = Vec::with_capacity(records.len());
        let mut current = self.root;
        for record in &records {
            let Some(entry) = resolve_entry(doc, current, record) else {
                tracing::warn!(
                    "stack restore aborted, entry {:?} does not resolve",
                    record.id
                );
                self.stack.clear();
                self.sync(hub);
                return false;
            };
            current = entry.graph;
            resolved.push(entry);
        }

        self.stack = resolved;
        self.sync(hub);
        true
    }

    /// Publish a display change when (and only when) the displayed graph
    /// actually switched since the last sync.
    fn sync(&mut self, hub: &EventHub) {
        let displayed = self.displayed();
        if self.attached == Some(displayed) {
            return;
        }
        self.attached = Some(displayed);
        hub.publish(&EditorEvent::DisplayChanged {
            document: self.document,
            graph: displayed,
        });
    }
}

fn resolve_entry(doc: &Document, current: GraphId, record: &StackEntryRecord) -> Option<StackEntry> {
    let graph = doc.graph(current)?;
    match record.kind {
        StackEntryKind::Pixel => {
            let node = graph.node(NodeId(record.id))?;
            let program = node.program?;
            doc.graph(program)?;
            Some(StackEntry {
                id: record.id,
                graph: program,
                kind: StackEntryKind::Pixel,
                property: None,
            })
        }
        StackEntryKind::Parameter => {
            let property = record.parameter.clone()?;
            let key = (NodeId(record.id), property.clone());
            let function = graph
                .get_override(&key)
                .and_then(ParameterOverride::function)?;
            doc.graph(function)?;
            Some(StackEntry {
                id: record.id,
                graph: function,
                kind: StackEntryKind::Parameter,
                property: Some(property),
            })
        }
        StackEntryKind::Function => {
            let function = GraphId(record.id);
            if !graph.custom_functions().contains(&function) {
                return None;
            }
            doc.graph(function)?;
            Some(StackEntry {
                id: record.id,
                graph: function,
                kind: StackEntryKind::Function,
                property: None,
            })
        }
    }
}
