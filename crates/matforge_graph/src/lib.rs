// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node graph model for `MatForge`.
//!
//! This crate provides the data model of a procedural-material document:
//! - Typed input/output ports with bitmask type-sets
//! - Connection validation (type gate, single parent, acyclicity)
//! - Parameter overrides (default / constant / function states)
//! - Recursive sub-graph composition (function graphs, pixel programs,
//!   named custom functions) in a per-document graph arena
//! - One round-trippable JSON shape for save, clipboard, and undo
//! - Copy/paste with identity remapping
//!
//! The editing engine (navigation, undo/redo, sessions) lives in
//! `matforge_editor`.

pub mod clipboard;
pub mod connection;
pub mod document;
pub mod format;
pub mod graph;
pub mod node;
pub mod param;
pub mod port;
pub mod subgraph;
pub mod typeset;
pub mod value;

pub use connection::{Connection, ConnectionId};
pub use document::{ActiveValue, Document, DocumentId, ParamError};
pub use graph::{ConnectError, Graph, GraphError, GraphView};
pub use node::{Node, NodeId, NodeRegistry, NodeType, PropertyDescriptor};
pub use param::{ParamKey, ParameterOverride};
pub use port::{Port, PortDirection, PortId};
pub use subgraph::{FunctionInfo, GraphId, ParentRef};
pub use typeset::TypeSet;
pub use value::Value;
