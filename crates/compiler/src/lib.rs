//! # Drift Compiler Driver
//!
//! Wires the pipeline end to end:
//!
//! ```text
//! AST → HIR → checked HIR → MIR → verified MIR → SSA → stage-4 checks → LLVM IR
//! ```
//!
//! plus DMIR-PKG emission for `--emit-package`. Checking accumulates
//! diagnostics across functions; compilation fails if any are present.

pub mod package;
pub mod pipeline;

pub use package::{build_manifest, emit_package};
pub use pipeline::{check_module, compile_module, CompileError, CompiledModule};
