//! # MIR Instructions
//!
//! Instructions perform computations but do not transfer control flow, with
//! one exception: a fallible `Call` may carry normal/error edges (see the
//! verifier's edge rules). `Move` and `Copy` are distinct so the ownership
//! analysis can tell consumption from duplication.

use drift_common::{Literal, TypeId};

use crate::terminator::Edge;
use crate::ValueId;

/// Binary operators supported in MIR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Neq,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    And,
    Or,
}

impl From<drift_compiler_hir::BinaryOp> for BinOp {
    fn from(op: drift_compiler_hir::BinaryOp) -> Self {
        use drift_compiler_hir::BinaryOp as H;
        match op {
            H::Add => Self::Add,
            H::Sub => Self::Sub,
            H::Mul => Self::Mul,
            H::Div => Self::Div,
            H::Eq => Self::Eq,
            H::Neq => Self::Neq,
            H::Less => Self::Less,
            H::Greater => Self::Greater,
            H::LessEqual => Self::LessEqual,
            H::GreaterEqual => Self::GreaterEqual,
            H::And => Self::And,
            H::Or => Self::Or,
        }
    }
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Eq => "==",
            Self::Neq => "!=",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::And => "&&",
            Self::Or => "||",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Not,
}

impl From<drift_compiler_hir::UnaryOp> for UnOp {
    fn from(op: drift_compiler_hir::UnaryOp) -> Self {
        match op {
            drift_compiler_hir::UnaryOp::Neg => Self::Neg,
            drift_compiler_hir::UnaryOp::Not => Self::Not,
        }
    }
}

/// A MIR instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Materialize a literal.
    Const {
        dest: ValueId,
        value: Literal,
        ty: TypeId,
    },
    /// Consume `source` into `dest`; the source may not be used afterwards.
    Move { dest: ValueId, source: ValueId },
    /// Duplicate `source` into `dest` without consuming it.
    Copy { dest: ValueId, source: ValueId },
    /// SSA alias introduced by SSA construction. Carries no ownership
    /// semantics; both names denote the same value.
    Assign { dest: ValueId, source: ValueId },
    /// Call a function. Fallible callees may carry a normal edge and an
    /// error edge whose target's first parameter receives the Error.
    Call {
        dest: ValueId,
        callee: String,
        args: Vec<ValueId>,
        normal: Option<Edge>,
        error: Option<Edge>,
    },
    BinaryOp {
        dest: ValueId,
        op: BinOp,
        left: ValueId,
        right: ValueId,
    },
    UnaryOp {
        dest: ValueId,
        op: UnOp,
        operand: ValueId,
    },
    StructInit {
        dest: ValueId,
        ty: TypeId,
        args: Vec<ValueId>,
    },
    FieldGet {
        dest: ValueId,
        base: ValueId,
        field: String,
    },
    ArrayInit {
        dest: ValueId,
        element_ty: TypeId,
        elements: Vec<ValueId>,
    },
    ArrayGet {
        dest: ValueId,
        base: ValueId,
        index: ValueId,
    },
    ArraySet {
        base: ValueId,
        index: ValueId,
        value: ValueId,
    },
    /// Observe the address of a local; the local must then be materialized
    /// as a storage-backed slot rather than an SSA value.
    AddrOfLocal { dest: ValueId, local: String },
    /// End a value's lifetime; it may not be used afterwards.
    Drop { value: ValueId },
    ConstructResultOk { dest: ValueId, value: ValueId },
    ConstructResultErr { dest: ValueId, error: ValueId },
    /// Construct an Error value from an event discriminant. The event name
    /// is carried for the throw summary.
    ConstructError {
        dest: ValueId,
        code: ValueId,
        event: Option<String>,
    },
    /// Pre-SSA local write; SSA construction replaces these with versioned
    /// names.
    StoreLocal { local: String, value: ValueId },
    /// Pre-SSA local read.
    LoadLocal { dest: ValueId, local: String },
}

impl Instruction {
    /// The value this instruction defines, if any.
    pub fn dest(&self) -> Option<&ValueId> {
        match self {
            Self::Const { dest, .. }
            | Self::Move { dest, .. }
            | Self::Copy { dest, .. }
            | Self::Assign { dest, .. }
            | Self::Call { dest, .. }
            | Self::BinaryOp { dest, .. }
            | Self::UnaryOp { dest, .. }
            | Self::StructInit { dest, .. }
            | Self::FieldGet { dest, .. }
            | Self::ArrayInit { dest, .. }
            | Self::ArrayGet { dest, .. }
            | Self::AddrOfLocal { dest, .. }
            | Self::ConstructResultOk { dest, .. }
            | Self::ConstructResultErr { dest, .. }
            | Self::ConstructError { dest, .. }
            | Self::LoadLocal { dest, .. } => Some(dest),
            Self::ArraySet { .. } | Self::Drop { .. } | Self::StoreLocal { .. } => None,
        }
    }

    /// Value operands this instruction reads (excluding edge arguments).
    pub fn operands(&self) -> Vec<&ValueId> {
        match self {
            Self::Const { .. } | Self::AddrOfLocal { .. } | Self::LoadLocal { .. } => vec![],
            Self::Move { source, .. } | Self::Copy { source, .. } | Self::Assign { source, .. } => {
                vec![source]
            }
            Self::Call { args, .. } => args.iter().collect(),
            Self::BinaryOp { left, right, .. } => vec![left, right],
            Self::UnaryOp { operand, .. } => vec![operand],
            Self::StructInit { args, .. } => args.iter().collect(),
            Self::FieldGet { base, .. } => vec![base],
            Self::ArrayInit { elements, .. } => elements.iter().collect(),
            Self::ArrayGet { base, index, .. } => vec![base, index],
            Self::ArraySet { base, index, value } => vec![base, index, value],
            Self::Drop { value } => vec![value],
            Self::ConstructResultOk { value, .. } => vec![value],
            Self::ConstructResultErr { error, .. } => vec![error],
            Self::ConstructError { code, .. } => vec![code],
            Self::StoreLocal { value, .. } => vec![value],
        }
    }
}
