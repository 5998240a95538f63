//! # Drift Semantic Analysis
//!
//! Type assignment and ownership discipline over HIR:
//! - [`signatures`]: function signatures and per-function checker metadata
//! - [`type_checker`]: assigns a `TypeId` to every expression and binding,
//!   validates shapes, and accumulates diagnostics
//! - [`catch_arms`]: catch-arm validation against the exception catalog
//! - [`place`]: symbolic paths used by the borrow checker
//! - [`borrow_checker`]: region-based aliasing discipline with
//!   signature-driven auto-borrow at call sites
//! - [`type_env`]: the SSA value-typing interface consumed by stage-4
//!   invariant checks

pub mod borrow_checker;
pub mod catch_arms;
pub mod place;
pub mod signatures;
pub mod type_checker;
pub mod type_env;

pub use borrow_checker::BorrowChecker;
pub use catch_arms::{validate_catch_arms, CatchArmInfo};
pub use place::{Place, PlaceBase, PlaceKind, Projection};
pub use signatures::{CheckedProgram, FnInfo, FnSignature};
pub use type_checker::{CheckFnResult, TypeChecker, TypedFn};
pub use type_env::TypeEnv;
