// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed publish/subscribe hub for editor notifications.
//!
//! One hub instance is passed to every component at construction; there is
//! no process-wide static state, so isolation between open documents is
//! structural. Subscriptions may be scoped to a single document identity.

use matforge_graph::{DocumentId, GraphId};
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

/// Notification emitted by the editing engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// Structure of a graph changed (nodes, edges, overrides)
    GraphUpdated {
        /// Owning document
        document: DocumentId,
        /// Changed graph
        graph: GraphId,
    },
    /// A graph was renamed
    NameChanged {
        /// Owning document
        document: DocumentId,
        /// Renamed graph
        graph: GraphId,
        /// New name
        name: String,
    },
    /// The wires of a graph changed (edge added, removed, or replaced)
    LinesChanged {
        /// Owning document
        document: DocumentId,
        /// Graph whose wires changed
        graph: GraphId,
    },
    /// The displayed graph of a document switched
    DisplayChanged {
        /// Owning document
        document: DocumentId,
        /// Newly displayed graph
        graph: GraphId,
    },
    /// A command landed on a document's undo stack
    CommandAdded {
        /// Owning document
        document: DocumentId,
        /// New undo-stack depth
        depth: usize,
    },
    /// An undo was performed; depth 0 means nothing left to undo
    UndoPerformed {
        /// Owning document
        document: DocumentId,
        /// New undo-stack depth
        depth: usize,
    },
    /// A redo was performed
    RedoPerformed {
        /// Owning document
        document: DocumentId,
        /// New undo-stack depth
        depth: usize,
    },
}

impl EditorEvent {
    /// The document this event belongs to
    pub fn document(&self) -> DocumentId {
        match self {
            Self::GraphUpdated { document, .. }
            | Self::NameChanged { document, .. }
            | Self::LinesChanged { document, .. }
            | Self::DisplayChanged { document, .. }
            | Self::CommandAdded { document, .. }
            | Self::UndoPerformed { document, .. }
            | Self::RedoPerformed { document, .. } => *document,
        }
    }
}

/// Handle for removing a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

type Callback = Arc<dyn Fn(&EditorEvent) + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    scope: Option<DocumentId>,
    callback: Callback,
}

/// The event hub. Cheap to share by reference; publishing takes `&self`.
#[derive(Default)]
pub struct EventHub {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl EventHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&EditorEvent) + Send + Sync + 'static,
    {
        self.add(None, Arc::new(callback))
    }

    /// Subscribe to events of one document only
    pub fn subscribe_document<F>(&self, document: DocumentId, callback: F) -> SubscriptionId
    where
        F: Fn(&EditorEvent) + Send + Sync + 'static,
    {
        self.add(Some(document), Arc::new(callback))
    }

    fn add(&self, scope: Option<DocumentId>, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        self.subscribers.write().push(Subscriber {
            id,
            scope,
            callback,
        });
        id
    }

    /// Remove a subscription; returns whether it existed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    /// Deliver an event to every matching subscriber.
    ///
    /// The subscriber list is snapshotted before delivery, so callbacks may
    /// subscribe or unsubscribe without deadlocking on the hub's lock.
    pub fn publish(&self, event: &EditorEvent) {
        let matching: Vec<Callback> = self
            .subscribers
            .read()
            .iter()
            .filter(|s| s.scope.is_none() || s.scope == Some(event.document()))
            .map(|s| Arc::clone(&s.callback))
            .collect();
        for callback in matching {
            callback(event);
        }
    }
}
