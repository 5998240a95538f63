//! # Stage-4 Throw Invariants
//!
//! Combines the stage-3 throw summary with declared intent and enforces the
//! can-throw invariants after SSA:
//!
//! - a function not declared can-throw must have an empty throw summary and
//!   must not construct an Error
//! - a can-throw function returns only result-carrier values: structurally
//!   (the returned name is defined by a result constructor) or, when a type
//!   environment is available, type-aware (the returned value's type is the
//!   carrier). Type-aware supersedes structural.

use std::collections::BTreeSet;

use drift_compiler_semantic::TypeEnv;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::analysis::ThrowSummary;
use crate::{Instruction, MirFunction, SsaFunc, Terminator};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct InvariantError {
    pub message: String,
}

fn err(message: impl Into<String>) -> InvariantError {
    InvariantError {
        message: message.into(),
    }
}

/// Aggregated throw facts for a function, combining summary + declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncThrowInfo {
    pub constructs_error: bool,
    pub exception_types: BTreeSet<String>,
    pub may_fail_sites: BTreeSet<(String, usize)>,
    pub declared_can_throw: bool,
}

/// Combine throw summaries with declaration intent.
pub fn build_func_throw_info(
    summaries: &FxHashMap<String, ThrowSummary>,
    declared_can_throw: &FxHashMap<String, bool>,
) -> FxHashMap<String, FuncThrowInfo> {
    summaries
        .iter()
        .map(|(name, summary)| {
            (
                name.clone(),
                FuncThrowInfo {
                    constructs_error: summary.constructs_error,
                    exception_types: summary.exception_types.clone(),
                    may_fail_sites: summary.may_fail_sites.clone(),
                    declared_can_throw: declared_can_throw.get(name).copied().unwrap_or(false),
                },
            )
        })
        .collect()
}

/// A function not declared can-throw must not construct errors and must
/// have an empty throw summary.
pub fn enforce_can_throw_invariants(
    func_infos: &FxHashMap<String, FuncThrowInfo>,
) -> Result<(), InvariantError> {
    for (fname, info) in func_infos {
        if info.declared_can_throw {
            continue;
        }
        if info.constructs_error {
            return Err(err(format!(
                "function {fname} constructs an Error but is not declared can-throw"
            )));
        }
        if !info.exception_types.is_empty() {
            let events = info
                .exception_types
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(err(format!(
                "function {fname} may raise {{ {events} }} but is not declared can-throw"
            )));
        }
    }
    Ok(())
}

/// Every return of a can-throw function must carry a value.
pub fn enforce_return_shape_for_can_throw(
    func_infos: &FxHashMap<String, FuncThrowInfo>,
    funcs: &FxHashMap<String, MirFunction>,
) -> Result<(), InvariantError> {
    for (fname, info) in func_infos {
        if !info.declared_can_throw {
            continue;
        }
        let Some(func) = funcs.get(fname) else {
            continue;
        };
        for block in func.blocks.values() {
            if let Some(Terminator::Return { value: None }) = &block.terminator {
                return Err(err(format!(
                    "function {fname} is declared can-throw but has a bare return in block {}",
                    block.name
                )));
            }
        }
    }
    Ok(())
}

/// Structural return-shape check: every returned value of a can-throw
/// function must be defined by `ConstructResultOk`/`Err` somewhere in the
/// function. Conservative; a type-aware pass supersedes it.
pub fn enforce_fnresult_returns_for_can_throw(
    func_infos: &FxHashMap<String, FuncThrowInfo>,
    funcs: &FxHashMap<String, MirFunction>,
) -> Result<(), InvariantError> {
    for (fname, info) in func_infos {
        if !info.declared_can_throw {
            continue;
        }
        let Some(func) = funcs.get(fname) else {
            continue;
        };
        for block in func.blocks.values() {
            let Some(Terminator::Return { value: Some(return_val) }) = &block.terminator else {
                continue;
            };
            let found = func.blocks.values().any(|b| {
                b.instructions.iter().any(|instr| match instr {
                    Instruction::ConstructResultOk { dest, .. }
                    | Instruction::ConstructResultErr { dest, .. } => dest == return_val,
                    _ => false,
                })
            });
            if !found {
                return Err(err(format!(
                    "function {fname} is declared can-throw but return in block {} does not \
                     return a FnResult (no ConstructResultOk/Err defines {return_val})",
                    block.name
                )));
            }
        }
    }
    Ok(())
}

/// Type-aware return-shape check: every returned SSA value of a can-throw
/// function must have the result-carrier type per the type environment.
pub fn enforce_fnresult_returns_typeaware(
    func_infos: &FxHashMap<String, FuncThrowInfo>,
    ssa_funcs: &FxHashMap<String, SsaFunc>,
    type_env: &dyn TypeEnv,
) -> Result<(), InvariantError> {
    for (fname, info) in func_infos {
        if !info.declared_can_throw {
            continue;
        }
        let Some(ssa) = ssa_funcs.get(fname) else {
            continue;
        };
        for block in ssa.func.blocks.values() {
            let Some(Terminator::Return { value: Some(value) }) = &block.terminator else {
                continue;
            };
            let ty = type_env.type_of_ssa_value(fname, value);
            let is_carrier = ty.is_some_and(|t| type_env.is_fnresult(t));
            if !is_carrier {
                return Err(err(format!(
                    "function {fname} is declared can-throw but return in block {} has \
                     non-FnResult type {ty:?}",
                    block.name
                )));
            }
        }
    }
    Ok(())
}

/// Build `FuncThrowInfo` and run all stage-4 throw invariants.
///
/// The structural return-shape check runs when no type environment is
/// available; with SSA + types supplied, the type-aware check supersedes
/// it.
pub fn run_throw_checks(
    funcs: &FxHashMap<String, MirFunction>,
    summaries: &FxHashMap<String, ThrowSummary>,
    declared_can_throw: &FxHashMap<String, bool>,
    ssa_funcs: Option<&FxHashMap<String, SsaFunc>>,
    type_env: Option<&dyn TypeEnv>,
) -> Result<FxHashMap<String, FuncThrowInfo>, InvariantError> {
    let func_infos = build_func_throw_info(summaries, declared_can_throw);
    enforce_can_throw_invariants(&func_infos)?;
    enforce_return_shape_for_can_throw(&func_infos, funcs)?;
    match (ssa_funcs, type_env) {
        (Some(ssa_funcs), Some(type_env)) => {
            enforce_fnresult_returns_typeaware(&func_infos, ssa_funcs, type_env)?;
        }
        _ => {
            enforce_fnresult_returns_for_can_throw(&func_infos, funcs)?;
        }
    }
    Ok(func_infos)
}
