// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use crate::typeset::TypeSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortId(pub Uuid);

impl PortId {
    /// Create a new random port ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PortId {
    fn default() -> Self {
        Self::new()
    }
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port; accepts at most one incoming connection
    Input,
    /// Output port; may fan out to many inputs
    Output,
}

/// A typed connection point on a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    /// Unique port ID
    pub id: PortId,
    /// Port name
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Value kinds this port accepts (input) or produces (output)
    pub types: TypeSet,
}

impl Port {
    /// Create a new input port
    pub fn input(name: impl Into<String>, types: TypeSet) -> Self {
        Self {
            id: PortId::new(),
            name: name.into(),
            direction: PortDirection::Input,
            types,
        }
    }

    /// Create a new output port
    pub fn output(name: impl Into<String>, types: TypeSet) -> Self {
        Self {
            id: PortId::new(),
            name: name.into(),
            direction: PortDirection::Output,
            types,
        }
    }

    /// Check whether this output port may feed the given input port.
    ///
    /// Directions must be output-to-input and the type-sets must pass the
    /// compatibility gate.
    pub fn can_connect(&self, input: &Port) -> bool {
        if self.direction != PortDirection::Output || input.direction != PortDirection::Input {
            return false;
        }
        self.types.can_connect(input.types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_gate() {
        let out = Port::output("out", TypeSet::FLOAT);
        let inp = Port::input("in", TypeSet::FLOAT);
        assert!(out.can_connect(&inp));
        // input-to-input and output-to-output are rejected
        assert!(!inp.can_connect(&out));
        assert!(!out.can_connect(&Port::output("other", TypeSet::FLOAT)));
    }
}
