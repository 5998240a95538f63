//! # SSA Construction
//!
//! Converts MIR into SSA form over acyclic CFGs:
//!
//! - every `StoreLocal` becomes a versioned definition (`x_1`, `x_2`, ...)
//!   and every `LoadLocal` becomes an `Assign` alias of the reaching
//!   definition
//! - when predecessors disagree on a local's reaching definition, the merge
//!   block receives a fresh block parameter and every predecessor edge is
//!   extended with its own value (the φ-node role)
//! - backedges are rejected: v1 supports if/else diamonds but not loops
//!
//! Address-taken locals are left storage-backed and untouched.

use std::collections::BTreeSet;

use drift_common::TypeTable;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::basic_block::BlockParam;
use crate::{Instruction, MirFunction, ValueId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SsaError {
    #[error("{func}: backedge into '{target}': loops are not supported in SSA v1")]
    Backedge { func: String, target: String },
    #[error("{func}:{block}: load before store for local '{local}'")]
    LoadBeforeStore {
        func: String,
        block: String,
        local: String,
    },
    #[error("{func}:{block}: cannot merge local '{local}' across a call edge")]
    MergeAcrossCallEdge {
        func: String,
        block: String,
        local: String,
    },
}

/// Wrapper for an SSA-converted MIR function.
///
/// Tracks how many SSA definitions each local received and the latest SSA
/// name per local.
#[derive(Debug)]
pub struct SsaFunc {
    pub func: MirFunction,
    pub local_versions: FxHashMap<String, u32>,
    pub current_value: FxHashMap<String, String>,
}

/// Convert MIR to SSA form.
#[derive(Debug, Default)]
pub struct MirToSsa {
    address_taken: BTreeSet<String>,
}

impl MirToSsa {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locals whose address is observed stay storage-backed.
    pub fn with_address_taken(mut self, address_taken: BTreeSet<String>) -> Self {
        self.address_taken = address_taken;
        self
    }

    pub fn run(&self, mut func: MirFunction, table: &mut TypeTable) -> Result<SsaFunc, SsaError> {
        let order = reverse_postorder(&func)?;

        let mut local_versions: FxHashMap<String, u32> = FxHashMap::default();
        let mut current_value: FxHashMap<String, String> = FxHashMap::default();
        // Reaching definition per local at each block's exit.
        let mut out_envs: FxHashMap<String, FxHashMap<String, ValueId>> = FxHashMap::default();

        for block_name in &order {
            let mut env: FxHashMap<String, ValueId> = if *block_name == func.entry {
                // Function parameters are pre-defined values named after
                // themselves.
                func.params
                    .iter()
                    .map(|(name, _)| (name.clone(), name.clone()))
                    .collect()
            } else {
                self.merge_predecessors(
                    &mut func,
                    block_name,
                    &out_envs,
                    &mut local_versions,
                    table,
                )?
            };

            let block = func.blocks.get_mut(block_name).expect("block exists");
            let mut rewritten = Vec::with_capacity(block.instructions.len());
            for instr in block.instructions.drain(..) {
                match instr {
                    Instruction::StoreLocal { local, value }
                        if !self.address_taken.contains(&local) =>
                    {
                        let version = local_versions.get(&local).copied().unwrap_or(0) + 1;
                        local_versions.insert(local.clone(), version);
                        let name = format!("{local}_{version}");
                        env.insert(local.clone(), name.clone());
                        current_value.insert(local.clone(), name.clone());
                        rewritten.push(Instruction::Assign {
                            dest: name,
                            source: value,
                        });
                    }
                    Instruction::LoadLocal { dest, local }
                        if !self.address_taken.contains(&local) =>
                    {
                        let Some(value) = env.get(&local) else {
                            return Err(SsaError::LoadBeforeStore {
                                func: func.name.clone(),
                                block: block_name.clone(),
                                local,
                            });
                        };
                        rewritten.push(Instruction::Assign {
                            dest,
                            source: value.clone(),
                        });
                    }
                    other => rewritten.push(other),
                }
            }
            block.instructions = rewritten;
            out_envs.insert(block_name.clone(), env);
        }

        Ok(SsaFunc {
            func,
            local_versions,
            current_value,
        })
    }

    /// Merge reaching definitions from all terminator-edge predecessors.
    /// Agreement inherits the name; disagreement mints a block parameter
    /// and extends each predecessor edge with its value.
    fn merge_predecessors(
        &self,
        func: &mut MirFunction,
        block_name: &str,
        out_envs: &FxHashMap<String, FxHashMap<String, ValueId>>,
        local_versions: &mut FxHashMap<String, u32>,
        table: &mut TypeTable,
    ) -> Result<FxHashMap<String, ValueId>, SsaError> {
        let mut term_preds: Vec<String> = Vec::new();
        let mut call_edge_preds: Vec<String> = Vec::new();
        for (source, block) in &func.blocks {
            if let Some(term) = &block.terminator {
                if term.edges().iter().any(|e| e.target == block_name) {
                    term_preds.push(source.clone());
                }
            }
            for instr in &block.instructions {
                if let Instruction::Call { normal, error, .. } = instr {
                    if [normal, error]
                        .into_iter()
                        .flatten()
                        .any(|e| e.target == block_name)
                        && !term_preds.contains(source)
                    {
                        call_edge_preds.push(source.clone());
                    }
                }
            }
        }

        if term_preds.is_empty() {
            return Ok(FxHashMap::default());
        }

        // Locals defined at the exit of every terminator predecessor.
        let mut shared: Vec<String> = out_envs
            .get(&term_preds[0])
            .map(|env| env.keys().cloned().collect())
            .unwrap_or_default();
        shared.retain(|local| {
            term_preds
                .iter()
                .all(|p| out_envs.get(p).is_some_and(|env| env.contains_key(local)))
        });
        shared.sort();

        let mut env = FxHashMap::default();
        for local in shared {
            let values: Vec<&ValueId> = term_preds
                .iter()
                .map(|p| &out_envs[p][&local])
                .collect();
            if values.iter().all(|v| *v == values[0]) {
                env.insert(local, values[0].clone());
                continue;
            }

            // Disagreement: the merge needs a block parameter.
            if !call_edge_preds.is_empty() {
                return Err(SsaError::MergeAcrossCallEdge {
                    func: func.name.clone(),
                    block: block_name.to_string(),
                    local,
                });
            }
            let version = local_versions.get(&local).copied().unwrap_or(0) + 1;
            local_versions.insert(local.clone(), version);
            let param_name = format!("{local}_{version}");
            let ty = func
                .local_types
                .get(&local)
                .copied()
                .unwrap_or_else(|| table.ensure_unknown());

            for pred in &term_preds {
                let value = out_envs[pred][&local].clone();
                let pred_block = func.blocks.get_mut(pred).expect("pred exists");
                if let Some(term) = pred_block.terminator.as_mut() {
                    for edge in term.edges_mut() {
                        if edge.target == block_name {
                            edge.args.push(value.clone());
                        }
                    }
                }
            }
            func.blocks
                .get_mut(block_name)
                .expect("block exists")
                .params
                .push(BlockParam::new(param_name.clone(), ty));
            env.insert(local, param_name);
        }
        Ok(env)
    }
}

/// Reverse postorder over terminator and call edges; rejects backedges.
fn reverse_postorder(func: &MirFunction) -> Result<Vec<String>, SsaError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Grey,
        Black,
    }

    let mut colors: FxHashMap<String, Color> = func
        .blocks
        .keys()
        .map(|k| (k.clone(), Color::White))
        .collect();
    let mut postorder: Vec<String> = Vec::new();

    fn visit(
        func: &MirFunction,
        name: &str,
        colors: &mut FxHashMap<String, Color>,
        postorder: &mut Vec<String>,
    ) -> Result<(), SsaError> {
        colors.insert(name.to_string(), Color::Grey);
        for succ in func.successors(name) {
            match colors.get(succ.as_str()) {
                Some(Color::White) => visit(func, &succ, colors, postorder)?,
                Some(Color::Grey) => {
                    return Err(SsaError::Backedge {
                        func: func.name.clone(),
                        target: succ,
                    })
                }
                _ => {}
            }
        }
        colors.insert(name.to_string(), Color::Black);
        postorder.push(name.to_string());
        Ok(())
    }

    visit(func, &func.entry, &mut colors, &mut postorder)?;
    postorder.reverse();
    Ok(postorder)
}
