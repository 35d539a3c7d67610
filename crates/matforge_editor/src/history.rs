// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-document undo/redo ledger.
//!
//! Each open document gets its own pair of stacks, keyed by
//! [`DocumentId`]; undoing in one document never touches another. History
//! is bounded: the oldest entry falls off the far end once the limit is
//! reached.

use crate::commands::GraphCommand;
use crate::events::{EditorEvent, EventHub};
use matforge_graph::{Document, DocumentId};
use std::collections::HashMap;
use std::collections::VecDeque;

/// Maximum number of undo entries retained per document
pub const MAX_HISTORY: usize = 100;

#[derive(Default)]
struct DocumentHistory {
    undo: VecDeque<Box<dyn GraphCommand>>,
    redo: VecDeque<Box<dyn GraphCommand>>,
}

/// The undo/redo ledger for every open document.
#[derive(Default)]
pub struct UndoLedger {
    stacks: HashMap<DocumentId, DocumentHistory>,
    max_depth: usize,
}

impl UndoLedger {
    /// Create a ledger with the default per-document depth limit
    pub fn new() -> Self {
        Self {
            stacks: HashMap::new(),
            max_depth: MAX_HISTORY,
        }
    }

    /// Create a ledger with a custom depth limit
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            stacks: HashMap::new(),
            max_depth,
        }
    }

    /// Record an already-applied command.
    ///
    /// Clears the redo stack: a fresh edit invalidates anything that was
    /// undone before it.
    pub fn push(&mut self, document: DocumentId, command: Box<dyn GraphCommand>, hub: &EventHub) {
        let history = self.stacks.entry(document).or_default();
        history.redo.clear();
        history.undo.push_back(command);
        while history.undo.len() > self.max_depth {
            history.undo.pop_front();
        }
        hub.publish(&EditorEvent::CommandAdded {
            document,
            depth: history.undo.len(),
        });
    }

    /// Undo the most recent command of a document.
    ///
    /// A silent no-op (returns false) when the document has no history or
    /// nothing left to undo. A command whose revert fails stays on the undo
    /// stack unmoved.
    pub fn undo(&mut self, document: DocumentId, doc: &mut Document, hub: &EventHub) -> bool {
        let Some(history) = self.stacks.get_mut(&document) else {
            return false;
        };
        let Some(mut command) = history.undo.pop_back() else {
            return false;
        };
        if let Err(err) = command.revert(doc) {
            tracing::error!("undo of '{}' failed: {err}", command.label());
            history.undo.push_back(command);
            return false;
        }
        history.redo.push_back(command);
        hub.publish(&EditorEvent::UndoPerformed {
            document,
            depth: history.undo.len(),
        });
        true
    }

    /// Redo the most recently undone command of a document.
    pub fn redo(&mut self, document: DocumentId, doc: &mut Document, hub: &EventHub) -> bool {
        let Some(history) = self.stacks.get_mut(&document) else {
            return false;
        };
        let Some(mut command) = history.redo.pop_back() else {
            return false;
        };
        if let Err(err) = command.apply(doc) {
            tracing::error!("redo of '{}' failed: {err}", command.label());
            history.redo.push_back(command);
            return false;
        }
        history.undo.push_back(command);
        hub.publish(&EditorEvent::RedoPerformed {
            document,
            depth: history.undo.len(),
        });
        true
    }

    /// Whether the document has anything to undo
    pub fn can_undo(&self, document: DocumentId) -> bool {
        self.stacks
            .get(&document)
            .is_some_and(|h| !h.undo.is_empty())
    }

    /// Whether the document has anything to redo
    pub fn can_redo(&self, document: DocumentId) -> bool {
        self.stacks
            .get(&document)
            .is_some_and(|h| !h.redo.is_empty())
    }

    /// Current undo-stack depth of a document
    pub fn undo_depth(&self, document: DocumentId) -> usize {
        self.stacks.get(&document).map_or(0, |h| h.undo.len())
    }

    /// Current redo-stack depth of a document
    pub fn redo_depth(&self, document: DocumentId) -> usize {
        self.stacks.get(&document).map_or(0, |h| h.redo.len())
    }

    /// Label of the command undo would revert next
    pub fn undo_label(&self, document: DocumentId) -> Option<&str> {
        self.stacks
            .get(&document)?
            .undo
            .back()
            .map(|c| c.label())
    }

    /// Label of the command redo would apply next
    pub fn redo_label(&self, document: DocumentId) -> Option<&str> {
        self.stacks
            .get(&document)?
            .redo
            .back()
            .map(|c| c.label())
    }

    /// Drop all history of a document (on close)
    pub fn clear(&mut self, document: DocumentId) {
        self.stacks.remove(&document);
    }
}
