//! # Drift HIR
//!
//! The first compiler tier: a sugar-free tree with binding identities.
//!
//! The crate owns three things:
//! - the parser contract AST ([`ast`]),
//! - the HIR node catalog ([`nodes`]),
//! - AST → HIR lowering with scope resolution and desugaring ([`lower`]).

pub mod ast;
pub mod lower;
pub mod nodes;

pub use lower::{AstToHir, HirBuilder};
pub use nodes::{
    BinaryOp, BindingId, FnDecl, HBlock, HCatchArm, HExpr, HExprKind, HParam, HStmt, HStmtKind,
    HirExprId, LoweredFunction, LoweredModule, UnaryOp,
};
