//! # MIR Construction
//!
//! [`MirBuilder`] manages the function scaffold (blocks, temp naming,
//! current insertion point); [`HirToMir`] drives the lowering from checked
//! HIR.

mod lowering;

pub use lowering::{HirToMir, LoweringError};

use drift_common::TypeId;
use rustc_hash::FxHashSet;

use crate::basic_block::{BasicBlock, BlockParam};
use crate::function::MirFunction;
use crate::instruction::Instruction;
use crate::terminator::Terminator;
use crate::ValueId;

/// Helper to construct a MIR function incrementally.
#[derive(Debug)]
pub struct MirBuilder {
    pub func: MirFunction,
    current: String,
    temp_counter: u32,
    block_counter: u32,
    locals_set: FxHashSet<String>,
}

impl MirBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let func = MirFunction::new(name);
        let current = func.entry.clone();
        Self {
            func,
            current,
            temp_counter: 0,
            block_counter: 0,
            locals_set: FxHashSet::default(),
        }
    }

    pub fn new_temp(&mut self) -> ValueId {
        self.temp_counter += 1;
        format!("t{}", self.temp_counter)
    }

    /// Append an instruction to the current block and return its dest.
    ///
    /// Instructions after a terminator are unreachable and dropped.
    pub fn emit(&mut self, instr: Instruction) -> Option<ValueId> {
        let dest = instr.dest().cloned();
        let block = self
            .func
            .blocks
            .get_mut(&self.current)
            .expect("current block exists");
        if block.terminator.is_none() {
            block.push_instruction(instr);
        }
        dest
    }

    /// Set the current block's terminator unless one is already present.
    pub fn set_terminator(&mut self, term: Terminator) {
        let block = self
            .func
            .blocks
            .get_mut(&self.current)
            .expect("current block exists");
        if block.terminator.is_none() {
            block.set_terminator(term);
        }
    }

    pub fn current_block(&self) -> &str {
        &self.current
    }

    pub fn current_is_terminated(&self) -> bool {
        self.func
            .blocks
            .get(&self.current)
            .is_some_and(|b| b.terminator.is_some())
    }

    /// Create a fresh block named `<hint>_<n>` and return its name.
    pub fn new_block(&mut self, hint: &str) -> String {
        self.block_counter += 1;
        let name = format!("{hint}_{}", self.block_counter);
        self.func.add_block(BasicBlock::new(name.clone()));
        name
    }

    /// Create a fresh block with parameters.
    pub fn new_block_with_params(&mut self, hint: &str, params: Vec<BlockParam>) -> String {
        self.block_counter += 1;
        let name = format!("{hint}_{}", self.block_counter);
        self.func
            .add_block(BasicBlock::with_params(name.clone(), params));
        name
    }

    pub fn switch_to(&mut self, name: &str) {
        debug_assert!(self.func.blocks.contains_key(name));
        self.current = name.to_string();
    }

    /// Remove a block that ended up with no predecessors (e.g. the join of
    /// an `if` whose branches both return).
    pub fn remove_block(&mut self, name: &str) {
        self.func.blocks.shift_remove(name);
    }

    pub fn ensure_local(&mut self, name: &str, ty: Option<TypeId>) {
        if self.locals_set.insert(name.to_string()) {
            self.func.locals.push(name.to_string());
        }
        if let Some(ty) = ty {
            self.func.local_types.insert(name.to_string(), ty);
        }
    }
}
