//! # HIR Nodes
//!
//! A sugar-free, canonical representation of Drift functions:
//! - every introduced name carries a stable `BindingId`
//! - every `HVar` is resolved to the binding that defines it
//! - every expression carries a `HirExprId` for checker side tables
//! - `for` loops, borrow syntax, and method sugar are already expanded
//!
//! The only remaining sugar marker is `TrySuffix` (`expr?`), which expands
//! during MIR lowering because its expansion needs explicit control flow.

use drift_common::{Span, TypeExpr};

index_vec::define_index_type! {
    /// Identity of an expression node, used to key checker side tables.
    pub struct HirExprId = u32;
}

index_vec::define_index_type! {
    /// Identity of an introduced name (let, parameter, catch binder).
    pub struct BindingId = u32;
}

/// Binary operators after desugaring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
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

impl BinaryOp {
    /// Parse the surface operator spelling used by the parser contract.
    pub fn from_symbol(op: &str) -> Option<Self> {
        Some(match op {
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "==" => Self::Eq,
            "!=" => Self::Neq,
            "<" => Self::Less,
            ">" => Self::Greater,
            "<=" => Self::LessEqual,
            ">=" => Self::GreaterEqual,
            "and" | "&&" => Self::And,
            "or" | "||" => Self::Or,
            _ => return None,
        })
    }

    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Neq | Self::Less | Self::Greater | Self::LessEqual | Self::GreaterEqual
        )
    }

    pub const fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    pub const fn is_arithmetic(self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div)
    }
}

impl std::fmt::Display for BinaryOp {
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
            Self::And => "and",
            Self::Or => "or",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn from_symbol(op: &str) -> Option<Self> {
        Some(match op {
            "-" => Self::Neg,
            "not" | "!" => Self::Not,
            _ => return None,
        })
    }
}

/// A lexical block of statements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HBlock {
    pub statements: Vec<HStmt>,
}

impl HBlock {
    pub fn new(statements: Vec<HStmt>) -> Self {
        Self { statements }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HStmt {
    pub span: Option<Span>,
    pub kind: HStmtKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HStmtKind {
    Let {
        name: String,
        declared_type: Option<TypeExpr>,
        value: HExpr,
        binding_id: BindingId,
        mutable: bool,
    },
    Assign {
        target: HExpr,
        value: HExpr,
    },
    If {
        cond: HExpr,
        then_block: HBlock,
        else_block: Option<HBlock>,
    },
    While {
        cond: HExpr,
        body: HBlock,
    },
    Try {
        body: HBlock,
        catches: Vec<HCatchArm>,
    },
    Return {
        value: Option<HExpr>,
    },
    Throw {
        value: HExpr,
    },
    ExprStmt {
        expr: HExpr,
    },
    Import {
        path: String,
    },
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HCatchArm {
    /// Event name this arm handles; `None` is the catch-all arm.
    pub event: Option<String>,
    /// Binder for the caught error value.
    pub binder: Option<(String, BindingId)>,
    pub block: HBlock,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HExpr {
    pub id: HirExprId,
    pub span: Option<Span>,
    pub kind: HExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HExprKind {
    LiteralInt(i64),
    LiteralBool(bool),
    LiteralString(String),
    Var {
        name: String,
        /// Resolved at lowering time; `None` only for unresolved names that
        /// already produced a diagnostic.
        binding_id: Option<BindingId>,
    },
    Field {
        subject: Box<HExpr>,
        name: String,
    },
    Index {
        subject: Box<HExpr>,
        index: Box<HExpr>,
    },
    Call {
        callee: String,
        args: Vec<HExpr>,
        kwargs: Vec<(String, HExpr)>,
    },
    MethodCall {
        receiver: Box<HExpr>,
        method: String,
        args: Vec<HExpr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<HExpr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<HExpr>,
        right: Box<HExpr>,
    },
    Borrow {
        subject: Box<HExpr>,
        is_mut: bool,
    },
    Ternary {
        cond: Box<HExpr>,
        then_expr: Box<HExpr>,
        else_expr: Box<HExpr>,
    },
    ArrayLiteral {
        elements: Vec<HExpr>,
    },
    DvInit {
        dv_type_name: String,
        args: Vec<HExpr>,
        attr_names: Vec<String>,
    },
    ResultOk(Box<HExpr>),
    ResultErr(Box<HExpr>),
    /// `operand?`, expanded by MIR lowering into a branch on the result
    /// discriminant with an Err-forwarding path.
    TrySuffix(Box<HExpr>),
}

/// Signature-level facts extracted from a `FunctionDef` during lowering.
#[derive(Debug, Clone, PartialEq)]
pub struct FnDecl {
    pub name: String,
    pub params: Vec<HParam>,
    pub return_type: Option<TypeExpr>,
    pub throws: Option<Vec<String>>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HParam {
    pub name: String,
    pub type_expr: TypeExpr,
    pub binding_id: BindingId,
    pub mutable: bool,
}

/// A lowered function: its declaration facts plus the sugar-free body.
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredFunction {
    pub decl: FnDecl,
    pub body: HBlock,
}

/// A lowered module, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredModule {
    pub name: String,
    pub exports: Vec<String>,
    pub functions: Vec<LoweredFunction>,
}
