//! # SSA Value Typing
//!
//! Assigns `TypeId`s to SSA values using checker signatures and a small
//! fixed-point walk: constants, result constructors, calls through their
//! signatures, aliases, and block parameters. Unknowns stay unknown.
//!
//! The result feeds the type-aware stage-4 return-shape check, superseding
//! the structural one.

use drift_common::{Literal, TypeId, TypeTable};
use drift_compiler_semantic::{FnSignature, TypeEnv};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{Instruction, SsaFunc, Terminator};

/// Concrete [`TypeEnv`] over SSA values.
#[derive(Debug, Default)]
pub struct SsaTypeEnv {
    value_types: FxHashMap<(String, String), TypeId>,
    fnresult_ids: FxHashSet<TypeId>,
}

impl TypeEnv for SsaTypeEnv {
    fn type_of_ssa_value(&self, func: &str, value: &str) -> Option<TypeId> {
        self.value_types
            .get(&(func.to_string(), value.to_string()))
            .copied()
    }

    fn is_fnresult(&self, ty: TypeId) -> bool {
        self.fnresult_ids.contains(&ty)
    }
}

/// Build a type environment for SSA values. Returns `None` when nothing was
/// assigned (untyped unit-test pipelines).
pub fn build_type_env_from_ssa(
    ssa_funcs: &FxHashMap<String, SsaFunc>,
    signatures: &FxHashMap<String, FnSignature>,
    table: &mut TypeTable,
) -> Option<SsaTypeEnv> {
    let mut env = SsaTypeEnv::default();
    let unknown = table.ensure_unknown();
    let error_ty = table.ensure_error();

    let mut set = |env: &mut SsaTypeEnv,
                   table: &TypeTable,
                   fn_name: &str,
                   value: &str,
                   ty: TypeId|
     -> bool {
        let key = (fn_name.to_string(), value.to_string());
        if env.value_types.get(&key) == Some(&ty) {
            return false;
        }
        if table.is_fnresult(ty) {
            env.fnresult_ids.insert(ty);
        }
        env.value_types.insert(key, ty);
        true
    };

    // Fixed point with a small iteration cap.
    for _ in 0..5 {
        let mut changed = false;
        for (fn_name, ssa) in ssa_funcs {
            let sig = signatures.get(fn_name);
            let fn_return_parts = sig
                .and_then(|s| s.return_type_id)
                .and_then(|rt| table.fnresult_parts(rt));

            for block in ssa.func.blocks.values() {
                for param in &block.params {
                    changed |= set(&mut env, table, fn_name, &param.name, param.ty);
                }
                for instr in &block.instructions {
                    match instr {
                        Instruction::Const { dest, value, .. } => {
                            let ty = match value {
                                Literal::Int(_) => table.ensure_int(),
                                Literal::Bool(_) => table.ensure_bool(),
                                Literal::Str(_) => table.ensure_string(),
                            };
                            changed |= set(&mut env, table, fn_name, dest, ty);
                        }
                        Instruction::ConstructResultOk { dest, value } => {
                            let ok = env
                                .type_of_ssa_value(fn_name, value)
                                .unwrap_or(unknown);
                            let err = fn_return_parts.map(|(_, e)| e).unwrap_or(error_ty);
                            let ty = table.ensure_fnresult(ok, err);
                            env.fnresult_ids.insert(ty);
                            changed |= set(&mut env, table, fn_name, dest, ty);
                        }
                        Instruction::ConstructResultErr { dest, .. } => {
                            let ok = fn_return_parts.map(|(o, _)| o).unwrap_or(unknown);
                            let ty = table.ensure_fnresult(ok, error_ty);
                            env.fnresult_ids.insert(ty);
                            changed |= set(&mut env, table, fn_name, dest, ty);
                        }
                        Instruction::ConstructError { dest, .. } => {
                            changed |= set(&mut env, table, fn_name, dest, error_ty);
                        }
                        Instruction::Call { dest, callee, .. } => {
                            let ty = signatures
                                .get(callee)
                                .and_then(|s| s.return_type_id)
                                .unwrap_or(unknown);
                            changed |= set(&mut env, table, fn_name, dest, ty);
                        }
                        Instruction::Assign { dest, source }
                        | Instruction::Move { dest, source }
                        | Instruction::Copy { dest, source } => {
                            if let Some(ty) = env.type_of_ssa_value(fn_name, source) {
                                changed |= set(&mut env, table, fn_name, dest, ty);
                            }
                        }
                        _ => {}
                    }
                }

                if let Some(Terminator::Return { value: Some(value) }) = &block.terminator {
                    // A fallible function's returned value defaults to the
                    // declared result type, but an already-typed value keeps
                    // its own type so shape mismatches stay visible.
                    if env.type_of_ssa_value(fn_name, value).is_none() {
                        if let Some((ok, err)) = fn_return_parts {
                            let ty = table.ensure_fnresult(ok, err);
                            env.fnresult_ids.insert(ty);
                            changed |= set(&mut env, table, fn_name, value, ty);
                        }
                    }
                }
            }
        }
        if !changed {
            break;
        }
    }

    if env.value_types.is_empty() {
        None
    } else {
        Some(env)
    }
}
