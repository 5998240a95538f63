//! # Drift LLVM Lowering (v1)
//!
//! Textual LLVM IR emitter for SSA functions under the v1 Drift ABI:
//!
//! - `Int` → `i64`, `Bool` → `i1` in registers
//! - `Error` → `%DriftError = type { i64, ptr, ptr, ptr }`
//! - `FnResult<Int, Error>` → `%FnResult_Int_Error = type { i1, i64, %DriftError }`
//!
//! The lowering walks SSA blocks in order, emitting phi nodes first (from
//! block parameters and predecessor edge arguments), then scalar
//! instructions, then the terminator. Unsupported constructs (loops,
//! parameters, non-scalar types, method receivers, unhandled instruction
//! classes) raise [`CodegenError`] rather than producing malformed IR.

pub mod llvm;

pub use llvm::{lower_ssa_func_to_llvm, CodegenError, LlvmModuleBuilder};
