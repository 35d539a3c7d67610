// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parameter overrides.
//!
//! An override replaces a node property's default with either a constant or
//! the result of a function graph. No row means the property is in its
//! default state.

use crate::node::NodeId;
use crate::subgraph::GraphId;
use crate::typeset::TypeSet;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Key for one override row: the node and the property it applies to
pub type ParamKey = (NodeId, String);

/// One override row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterOverride {
    /// Constant mode: a literal value with its declared kind
    Constant {
        /// Captured value
        value: Value,
        /// Declared kind of the property
        kind: TypeSet,
    },
    /// Function mode: the value is computed by a function graph
    Function(GraphId),
}

impl ParameterOverride {
    /// Whether this row is in function mode
    pub fn is_function(&self) -> bool {
        matches!(self, Self::Function(_))
    }

    /// The function graph, if this row is in function mode
    pub fn function(&self) -> Option<GraphId> {
        match self {
            Self::Function(id) => Some(*id),
            Self::Constant { .. } => None,
        }
    }
}
