//! # MIR Basic Block
//!
//! A basic block is a straight-line sequence of instructions with one entry
//! point (its typed parameter list) and one exit point (its terminator).

use drift_common::TypeId;

use crate::instruction::Instruction;
use crate::terminator::Terminator;

/// A typed block parameter. Parameters play the role of φ-nodes: each
/// predecessor edge supplies one argument per parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockParam {
    pub name: String,
    pub ty: TypeId,
}

impl BlockParam {
    pub fn new(name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A basic block in the control flow graph.
///
/// # Invariants
///
/// - every block has exactly one terminator once construction finishes
/// - instructions within a block execute sequentially
/// - control enters only at the beginning and leaves only at the end
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub name: String,
    pub params: Vec<BlockParam>,
    pub instructions: Vec<Instruction>,
    /// `None` only during construction; verification requires a terminator.
    pub terminator: Option<Terminator>,
}

impl BasicBlock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            instructions: Vec::new(),
            terminator: None,
        }
    }

    pub fn with_params(name: impl Into<String>, params: Vec<BlockParam>) -> Self {
        Self {
            name: name.into(),
            params,
            instructions: Vec::new(),
            terminator: None,
        }
    }

    pub fn push_instruction(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    pub fn set_terminator(&mut self, terminator: Terminator) {
        self.terminator = Some(terminator);
    }

    pub fn has_terminator(&self) -> bool {
        self.terminator.is_some()
    }
}
