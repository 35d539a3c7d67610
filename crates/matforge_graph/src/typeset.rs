// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port type-sets and connection compatibility.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Bitmask of value kinds a port accepts or produces.
    ///
    /// A port may accept a union of kinds (e.g. `FLOAT | FLOAT4`), which is
    /// why this is a mask rather than an enum.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct TypeSet: u16 {
        /// Scalar float
        const FLOAT = 1 << 0;
        /// 2-component float vector
        const FLOAT2 = 1 << 1;
        /// 3-component float vector
        const FLOAT3 = 1 << 2;
        /// 4-component float vector
        const FLOAT4 = 1 << 3;
        /// RGBA color
        const COLOR = 1 << 4;
        /// Boolean
        const BOOLEAN = 1 << 5;
        /// Integer
        const INTEGER = 1 << 6;
        /// String
        const STRING = 1 << 7;
        /// Execution signal (sequencing, not a value)
        const ENTRY = 1 << 8;
    }
}

impl TypeSet {
    /// Whether an output with this type-set may connect to an input with
    /// `input`.
    ///
    /// Compatible iff the sets intersect, except that an execution-only set
    /// connects exclusively to another execution-only set.
    pub fn can_connect(self, input: TypeSet) -> bool {
        if self == TypeSet::ENTRY || input == TypeSet::ENTRY {
            return self == input;
        }
        self.intersects(input)
    }
}

impl Serialize for TypeSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u16(self.bits())
    }
}

impl<'de> Deserialize<'de> for TypeSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bits = u16::deserialize(deserializer)?;
        Ok(Self::from_bits_truncate(bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersection_gate() {
        let out = TypeSet::FLOAT | TypeSet::FLOAT4;
        assert!(out.can_connect(TypeSet::FLOAT));
        assert!(out.can_connect(TypeSet::FLOAT4 | TypeSet::COLOR));
        assert!(!out.can_connect(TypeSet::BOOLEAN));
        assert!(!out.can_connect(TypeSet::empty()));
    }

    #[test]
    fn test_entry_connects_only_to_entry() {
        assert!(TypeSet::ENTRY.can_connect(TypeSet::ENTRY));
        assert!(!TypeSet::ENTRY.can_connect(TypeSet::FLOAT));
        assert!(!TypeSet::FLOAT.can_connect(TypeSet::ENTRY));
        // A mixed set containing ENTRY is not execution-only and does not
        // match a pure ENTRY set.
        let mixed = TypeSet::ENTRY | TypeSet::FLOAT;
        assert!(!mixed.can_connect(TypeSet::ENTRY));
        assert!(!TypeSet::ENTRY.can_connect(mixed));
    }

    #[test]
    fn test_serde_round_trip() {
        let set = TypeSet::FLOAT | TypeSet::COLOR;
        let json = serde_json::to_string(&set).unwrap();
        let back: TypeSet = serde_json::from_str(&json).unwrap();
        assert_eq!(set, back);
    }
}
