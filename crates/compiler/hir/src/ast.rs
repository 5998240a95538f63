//! # Parser Contract AST
//!
//! The node shapes the external parser emits and this compiler consumes.
//! The types are serde-derived so a parser living in another process can
//! hand the compiler an AST interchange document.

use drift_common::{Literal, Span, TypeExpr};
use serde::{Deserialize, Serialize};

/// A compilation unit as delivered by the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(default)]
    pub exports: Vec<String>,
    #[serde(default)]
    pub imports: Vec<String>,
    pub functions: Vec<FunctionDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    /// Declared thrown event names (`throws(...)`); `None` means nothrow
    /// unless the return type is a result carrier.
    #[serde(default)]
    pub throws: Option<Vec<String>>,
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub loc: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub type_expr: TypeExpr,
    #[serde(default)]
    pub mutable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchArm {
    /// Event name; `None` is a catch-all arm.
    pub event: Option<String>,
    /// Name bound to the caught error inside the arm.
    pub binder: Option<String>,
    pub block: Vec<Stmt>,
    #[serde(default)]
    pub loc: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stmt {
    Let {
        name: String,
        type_expr: Option<TypeExpr>,
        value: Expr,
        #[serde(default)]
        mutable: bool,
        #[serde(default)]
        loc: Option<Span>,
    },
    Assign {
        target: Expr,
        value: Expr,
        #[serde(default)]
        loc: Option<Span>,
    },
    If {
        cond: Expr,
        then_block: Vec<Stmt>,
        #[serde(default)]
        else_block: Vec<Stmt>,
        #[serde(default)]
        loc: Option<Span>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
        #[serde(default)]
        loc: Option<Span>,
    },
    For {
        iter_var: String,
        iterable: Expr,
        body: Vec<Stmt>,
        #[serde(default)]
        loc: Option<Span>,
    },
    Try {
        body: Vec<Stmt>,
        catches: Vec<CatchArm>,
        #[serde(default)]
        loc: Option<Span>,
    },
    Return {
        value: Option<Expr>,
        #[serde(default)]
        loc: Option<Span>,
    },
    Throw {
        value: Expr,
        #[serde(default)]
        loc: Option<Span>,
    },
    Expr {
        expr: Expr,
        #[serde(default)]
        loc: Option<Span>,
    },
    Import {
        path: String,
        #[serde(default)]
        loc: Option<Span>,
    },
    Break {
        #[serde(default)]
        loc: Option<Span>,
    },
    Continue {
        #[serde(default)]
        loc: Option<Span>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Literal {
        value: Literal,
        #[serde(default)]
        loc: Option<Span>,
    },
    Name {
        ident: String,
        #[serde(default)]
        loc: Option<Span>,
    },
    Attr {
        value: Box<Expr>,
        attr: String,
        #[serde(default)]
        loc: Option<Span>,
    },
    Index {
        value: Box<Expr>,
        index: Box<Expr>,
        #[serde(default)]
        loc: Option<Span>,
    },
    Call {
        func: Box<Expr>,
        #[serde(default)]
        args: Vec<Expr>,
        #[serde(default)]
        kwargs: Vec<(String, Expr)>,
        #[serde(default)]
        loc: Option<Span>,
    },
    Binary {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
        #[serde(default)]
        loc: Option<Span>,
    },
    Unary {
        op: String,
        operand: Box<Expr>,
        #[serde(default)]
        loc: Option<Span>,
    },
    Borrow {
        subject: Box<Expr>,
        #[serde(default)]
        mutable: bool,
        #[serde(default)]
        loc: Option<Span>,
    },
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
        #[serde(default)]
        loc: Option<Span>,
    },
    ArrayLiteral {
        elems: Vec<Expr>,
        #[serde(default)]
        loc: Option<Span>,
    },
    /// Construction of a diagnostic-value payload (`Exc("msg", detail: dv)`).
    DvInit {
        name: String,
        #[serde(default)]
        args: Vec<Expr>,
        #[serde(default)]
        attr_names: Vec<String>,
        #[serde(default)]
        loc: Option<Span>,
    },
    ResultOk {
        value: Box<Expr>,
        #[serde(default)]
        loc: Option<Span>,
    },
    ResultErr {
        value: Box<Expr>,
        #[serde(default)]
        loc: Option<Span>,
    },
    /// The `expr?` try-sugar.
    TrySuffix {
        operand: Box<Expr>,
        #[serde(default)]
        loc: Option<Span>,
    },
}

impl Expr {
    pub fn loc(&self) -> Option<Span> {
        match self {
            Self::Literal { loc, .. }
            | Self::Name { loc, .. }
            | Self::Attr { loc, .. }
            | Self::Index { loc, .. }
            | Self::Call { loc, .. }
            | Self::Binary { loc, .. }
            | Self::Unary { loc, .. }
            | Self::Borrow { loc, .. }
            | Self::Ternary { loc, .. }
            | Self::ArrayLiteral { loc, .. }
            | Self::DvInit { loc, .. }
            | Self::ResultOk { loc, .. }
            | Self::ResultErr { loc, .. }
            | Self::TrySuffix { loc, .. } => *loc,
        }
    }
}
