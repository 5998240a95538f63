//! # Drift Common
//!
//! Leaf crate shared by the compiler tiers and the package toolchain.
//! It owns the process-wide type intern table, source spans, and the
//! literal value representation used by both the AST contract and MIR.

pub mod span;
pub mod types;

pub use span::Span;
pub use types::{
    GenericTypeExpr, TypeData, TypeError, TypeId, TypeKind, TypeTable, VariantArm,
    VariantArmSchema, VariantFieldSchema, VariantInstance, VariantSchema,
};

use serde::{Deserialize, Serialize};

/// A literal value as produced by the parser and materialized by MIR `Const`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v:?}"),
        }
    }
}

/// A type expression as written in source, part of the parser contract.
///
/// `Optional<Int>` arrives as `TypeExpr { name: "Optional", args: [Int] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeExpr {
    pub name: String,
    #[serde(default)]
    pub args: Vec<TypeExpr>,
}

impl TypeExpr {
    pub fn simple(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }
}
