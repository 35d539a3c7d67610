// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cancellation tokens for background scans.
//!
//! Long-running work (library scans, thumbnail passes) checks its token
//! between items and bails out once a newer scan of the same target has
//! started. Starting a scan cancels the previous token for that target, so
//! at most one scan per target is ever live.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Shared cancellation flag handed to a background scan.
#[derive(Debug, Clone, Default)]
pub struct ScanToken {
    cancelled: Arc<AtomicBool>,
}

impl ScanToken {
    /// Create a fresh, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the scan should stop
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Cancel the scan
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

/// Tracks the live token per scan target.
#[derive(Debug, Default)]
pub struct ScanRegistry {
    active: HashMap<Uuid, ScanToken>,
}

impl ScanRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a scan of a target, cancelling any scan already running for
    /// it. Returns the token the new scan should poll.
    pub fn start(&mut self, target: Uuid) -> ScanToken {
        let token = ScanToken::new();
        if let Some(previous) = self.active.insert(target, token.clone()) {
            tracing::debug!("superseding running scan of {target}");
            previous.cancel();
        }
        token
    }

    /// Mark a target's scan finished; its token is forgotten
    pub fn finish(&mut self, target: Uuid) {
        self.active.remove(&target);
    }

    /// Cancel every live scan (on shutdown)
    pub fn cancel_all(&mut self) {
        for token in self.active.values() {
            token.cancel();
        }
        self.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_scan_cancels_previous() {
        let mut registry = ScanRegistry::new();
        let target = Uuid::new_v4();

        let first = registry.start(target);
        assert!(!first.is_cancelled());

        let second = registry.start(target);
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn test_targets_are_independent() {
        let mut registry = ScanRegistry::new();
        let a = registry.start(Uuid::new_v4());
        let b = registry.start(Uuid::new_v4());

        registry.cancel_all();
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
    }
}
