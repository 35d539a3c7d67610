// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property and constant values.

use crate::typeset::TypeSet;
use serde::{Deserialize, Serialize};

/// A concrete value held by a node property or a constant override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Scalar float
    Float(f32),
    /// 2-component float vector
    Float2([f32; 2]),
    /// 3-component float vector
    Float3([f32; 3]),
    /// 4-component float vector
    Float4([f32; 4]),
    /// RGBA color
    Color([f32; 4]),
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i32),
    /// String
    String(String),
}

impl Value {
    /// Get the type-set kind of this value.
    pub fn kind(&self) -> TypeSet {
        match self {
            Self::Float(_) => TypeSet::FLOAT,
            Self::Float2(_) => TypeSet::FLOAT2,
            Self::Float3(_) => TypeSet::FLOAT3,
            Self::Float4(_) => TypeSet::FLOAT4,
            Self::Color(_) => TypeSet::COLOR,
            Self::Bool(_) => TypeSet::BOOLEAN,
            Self::Int(_) => TypeSet::INTEGER,
            Self::String(_) => TypeSet::STRING,
        }
    }
}
