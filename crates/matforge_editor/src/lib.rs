// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editing engine for `MatForge` documents.
//!
//! Built on the data model in `matforge_graph`, this crate adds the state
//! a front end needs around an open document:
//! - Reversible commands and a bounded per-document undo/redo ledger
//! - Breadcrumb navigation through nested sub-graphs, with serialize and
//!   restore for session persistence
//! - A typed publish/subscribe hub scoped by document identity
//! - Debounced value commits, so a slider drag becomes one undo step
//! - Cancellation tokens for background scans
//!
//! [`session::Session`] ties these together into the surface a UI calls.

pub mod commands;
pub mod debounce;
pub mod events;
pub mod history;
pub mod navigator;
pub mod scan;
pub mod session;

pub use commands::{
    CommandError, ConnectCommand, CreateNodeCommand, DeleteNodeCommand, DemoteCommand,
    DisconnectCommand, GraphCommand, NodeSnapshot, PasteCommand, PromoteConstantCommand,
    PromoteFunctionCommand, ReassignFunctionCommand, SetValueCommand,
};
pub use debounce::{CommitDebouncer, DEFAULT_COMMIT_DELAY};
pub use events::{EditorEvent, EventHub, SubscriptionId};
pub use history::{UndoLedger, MAX_HISTORY};
pub use navigator::{Navigator, StackEntry, StackEntryKind, StackEntryRecord};
pub use scan::{ScanRegistry, ScanToken};
pub use session::{Session, SessionError};
