// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sub-graph composition: function graphs and their parent linkage.
//!
//! A graph can itself be the value of a node property (a promoted
//! parameter), a node's per-pixel program, or a named function hosted by
//! another graph. The linkage back to the hosting site is a tagged union so
//! the "exactly one parent" invariant holds by construction.

use crate::node::NodeId;
use crate::typeset::TypeSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a graph within a document's graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphId(pub Uuid);

impl GraphId {
    /// Create a new random graph ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::new()
    }
}

/// Back-reference from a function graph to the site that hosts it.
///
/// At most one variant other than `None` is ever set; assigning a parent
/// replaces the previous reference wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParentRef {
    /// Detached (the root graph, or a function graph mid-reassignment)
    #[default]
    None,
    /// Hosted by a node: a promoted parameter (with property name) or a
    /// pixel program (without)
    Node {
        /// Graph owning the host node
        graph: GraphId,
        /// Host node
        node: NodeId,
        /// Property name for promoted parameters
        property: Option<String>,
    },
    /// Hosted by a graph as a named custom function
    Graph(GraphId),
}

impl ParentRef {
    /// Whether this reference is detached
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Function-graph metadata: what the calling site expects, and where the
/// graph is hosted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionInfo {
    /// Value kinds the calling site requires of this graph's output
    pub output: TypeSet,
    /// Hosting site
    pub parent: ParentRef,
}

impl FunctionInfo {
    /// Create detached function metadata with the given expected output
    pub fn new(output: TypeSet) -> Self {
        Self {
            output,
            parent: ParentRef::None,
        }
    }
}
