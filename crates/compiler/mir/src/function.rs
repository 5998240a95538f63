//! # MIR Function
//!
//! A function owns an ordered map of named basic blocks plus the entry
//! block's name. Locals live beside the blocks until SSA construction
//! renames them away.

use drift_common::TypeId;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::basic_block::BasicBlock;
use crate::terminator::Edge;

/// The MIR for a single function, laid out as a CFG of named blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct MirFunction {
    pub name: String,
    /// Parameter names with their types, in signature order.
    pub params: Vec<(String, TypeId)>,
    /// Declared locals, in first-use order.
    pub locals: Vec<String>,
    /// Types for locals when the checker supplied them.
    pub local_types: FxHashMap<String, TypeId>,
    /// All blocks, in creation order. Iteration order is deterministic.
    pub blocks: IndexMap<String, BasicBlock>,
    pub entry: String,
}

impl MirFunction {
    /// Create a function with an empty `entry` block.
    pub fn new(name: impl Into<String>) -> Self {
        let mut blocks = IndexMap::new();
        blocks.insert("entry".to_string(), BasicBlock::new("entry"));
        Self {
            name: name.into(),
            params: Vec::new(),
            locals: Vec::new(),
            local_types: FxHashMap::default(),
            blocks,
            entry: "entry".to_string(),
        }
    }

    pub fn block(&self, name: &str) -> Option<&BasicBlock> {
        self.blocks.get(name)
    }

    pub fn block_mut(&mut self, name: &str) -> Option<&mut BasicBlock> {
        self.blocks.get_mut(name)
    }

    pub fn entry_block(&self) -> &BasicBlock {
        &self.blocks[&self.entry]
    }

    pub fn add_block(&mut self, block: BasicBlock) {
        self.blocks.insert(block.name.clone(), block);
    }

    /// Successor block names of `name`, through the terminator and any
    /// fallible-call edges.
    pub fn successors(&self, name: &str) -> Vec<String> {
        let Some(block) = self.block(name) else {
            return vec![];
        };
        let mut out: Vec<String> = Vec::new();
        for instr in &block.instructions {
            if let crate::Instruction::Call { normal, error, .. } = instr {
                for edge in [normal, error].into_iter().flatten() {
                    out.push(edge.target.clone());
                }
            }
        }
        if let Some(term) = &block.terminator {
            for edge in term.edges() {
                out.push(edge.target.clone());
            }
        }
        out.dedup();
        out
    }

    /// All edges into `target`: `(source block, edge, is_call_error_edge)`.
    pub fn incoming_edges(&self, target: &str) -> Vec<(&str, &Edge, bool)> {
        let mut out = Vec::new();
        for (source, block) in &self.blocks {
            for instr in &block.instructions {
                if let crate::Instruction::Call { normal, error, .. } = instr {
                    if let Some(edge) = normal {
                        if edge.target == target {
                            out.push((source.as_str(), edge, false));
                        }
                    }
                    if let Some(edge) = error {
                        if edge.target == target {
                            out.push((source.as_str(), edge, true));
                        }
                    }
                }
            }
            if let Some(term) = &block.terminator {
                for edge in term.edges() {
                    if edge.target == target {
                        out.push((source.as_str(), edge, false));
                    }
                }
            }
        }
        out
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}
