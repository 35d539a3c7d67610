// SPDX-License-Identifier: MIT OR Apache-2.0
//! Debounced value commits.
//!
//! Dragging a slider produces a stream of value changes; only the settled
//! value should become an undoable command. The debouncer holds the latest
//! value per `(graph, node, property)` key and releases it once the key
//! has been quiet for the configured delay. The graph id is captured at
//! submission time, so a commit still targets the right graph after the
//! user navigates away. Time is passed in explicitly, so behavior is
//! deterministic and testable without sleeping.

use indexmap::IndexMap;
use matforge_graph::{GraphId, NodeId, ParamKey, Value};
use std::time::{Duration, Instant};

/// Delay before a quiet key is committed
pub const DEFAULT_COMMIT_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug)]
struct PendingCommit {
    value: Value,
    deadline: Instant,
}

/// Collects rapid value changes and releases one commit per key.
#[derive(Debug)]
pub struct CommitDebouncer {
    delay: Duration,
    pending: IndexMap<(GraphId, ParamKey), PendingCommit>,
}

impl CommitDebouncer {
    /// Create a debouncer with the default delay
    pub fn new() -> Self {
        Self::with_delay(DEFAULT_COMMIT_DELAY)
    }

    /// Create a debouncer with a custom delay
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            pending: IndexMap::new(),
        }
    }

    /// Record a value change, superseding any pending value for the same
    /// key and restarting its quiet period.
    pub fn submit(
        &mut self,
        graph: GraphId,
        node: NodeId,
        property: impl Into<String>,
        value: Value,
        now: Instant,
    ) {
        self.pending.insert(
            (graph, (node, property.into())),
            PendingCommit {
                value,
                deadline: now + self.delay,
            },
        );
    }

    /// Release every key whose quiet period has elapsed, in submission
    /// order.
    pub fn poll(&mut self, now: Instant) -> Vec<(GraphId, ParamKey, Value)> {
        let mut due = Vec::new();
        self.pending.retain(|(graph, key), commit| {
            if commit.deadline <= now {
                due.push((*graph, key.clone(), commit.value.clone()));
                false
            } else {
                true
            }
        });
        due
    }

    /// Release everything immediately, elapsed or not (on blur/close)
    pub fn flush(&mut self) -> Vec<(GraphId, ParamKey, Value)> {
        self.pending
            .drain(..)
            .map(|((graph, key), commit)| (graph, key, commit.value))
            .collect()
    }

    /// Drop everything pending without committing
    pub fn cancel(&mut self) {
        self.pending.clear();
    }

    /// Whether any commit is waiting
    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

impl Default for CommitDebouncer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(100);

    #[test]
    fn test_rapid_changes_collapse_to_last_value() {
        let mut debouncer = CommitDebouncer::with_delay(DELAY);
        let graph = GraphId::new();
        let node = NodeId::new();
        let start = Instant::now();

        for i in 0..10 {
            debouncer.submit(
                graph,
                node,
                "scale",
                Value::Float(i as f32),
                start + Duration::from_millis(i * 5),
            );
        }

        assert!(debouncer.poll(start + Duration::from_millis(50)).is_empty());
        let due = debouncer.poll(start + Duration::from_millis(200));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].0, graph);
        assert_eq!(due[0].2, Value::Float(9.0));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn test_keys_release_independently() {
        let mut debouncer = CommitDebouncer::with_delay(DELAY);
        let graph = GraphId::new();
        let node = NodeId::new();
        let start = Instant::now();

        debouncer.submit(graph, node, "scale", Value::Float(1.0), start);
        debouncer.submit(
            graph,
            node,
            "offset",
            Value::Float(2.0),
            start + Duration::from_millis(80),
        );

        let due = debouncer.poll(start + Duration::from_millis(120));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].1 .1, "scale");
        assert!(debouncer.is_pending());

        let due = debouncer.poll(start + Duration::from_millis(200));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].1 .1, "offset");
    }

    #[test]
    fn test_commits_remember_their_graph() {
        let mut debouncer = CommitDebouncer::with_delay(DELAY);
        let outer = GraphId::new();
        let inner = GraphId::new();
        let node = NodeId::new();
        let start = Instant::now();

        debouncer.submit(inner, node, "scale", Value::Float(1.0), start);
        debouncer.submit(outer, node, "scale", Value::Float(2.0), start);

        let due = debouncer.poll(start + Duration::from_millis(200));
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].0, inner);
        assert_eq!(due[1].0, outer);
    }

    #[test]
    fn test_flush_and_cancel() {
        let mut debouncer = CommitDebouncer::with_delay(DELAY);
        let graph = GraphId::new();
        let node = NodeId::new();
        let start = Instant::now();

        debouncer.submit(graph, node, "scale", Value::Float(1.0), start);
        assert_eq!(debouncer.flush().len(), 1);
        assert!(!debouncer.is_pending());

        debouncer.submit(graph, node, "scale", Value::Float(2.0), start);
        debouncer.cancel();
        assert!(debouncer.poll(start + Duration::from_secs(10)).is_empty());
    }
}
