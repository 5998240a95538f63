//! # Drift Intermediate Representation (MIR)
//!
//! This crate defines the data structures for the mid-level representation
//! of the Drift compiler, plus the passes that surround it. MIR is an
//! explicit CFG of named basic blocks with typed block parameters and
//! three-address instructions; it is generated from checked HIR and feeds
//! SSA construction and code generation.
//!
//! ## Architecture
//!
//! ```text
//! MirModule
//!   functions: IndexMap<String, MirFunction>
//!
//! MirFunction
//!   blocks: IndexMap<String, BasicBlock>   (ordered, named)
//!   entry:  String
//!
//! BasicBlock
//!   params:       Vec<BlockParam>          (typed; φ-node role)
//!   instructions: Vec<Instruction>
//!   terminator:   Option<Terminator>
//! ```
//!
//! ## Passes
//!
//! - [`builder`]: HIR → MIR lowering
//! - [`analysis`]: address-taken set and the per-function throw summary
//! - [`verifier`]: structural and dataflow verification before SSA
//! - [`ssa`]: SSA construction over acyclic CFGs (backedges are rejected)
//! - [`throw_checks`]: stage-4 can-throw and return-shape invariants

pub mod analysis;
pub mod basic_block;
pub mod builder;
pub mod function;
pub mod instruction;
pub mod module;
pub mod pretty;
pub mod ssa;
pub mod ssa_typing;
pub mod terminator;
pub mod throw_checks;
pub mod verifier;

pub use analysis::{address_taken_locals, ThrowSummary, ThrowSummaryBuilder};
pub use basic_block::{BasicBlock, BlockParam};
pub use builder::{HirToMir, LoweringError, MirBuilder};
pub use function::MirFunction;
pub use instruction::{BinOp, Instruction, UnOp};
pub use module::MirModule;
pub use ssa::{MirToSsa, SsaError, SsaFunc};
pub use ssa_typing::{build_type_env_from_ssa, SsaTypeEnv};
pub use terminator::{Edge, Terminator};
pub use throw_checks::{run_throw_checks, FuncThrowInfo, InvariantError};
pub use verifier::{verify_function, verify_module, VerificationError};

/// Values are named; definitions mint fresh names (`t1`, `x_2`, ...).
pub type ValueId = String;
