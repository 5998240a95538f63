//! # MIR Verifier
//!
//! Rejects malformed MIR with precise messages before SSA construction.
//!
//! The verifier computes, per block, the set of names defined on *every*
//! path from entry (intersection over predecessor out-states) together
//! with their types, then walks each block enforcing:
//!
//! - definitions are unique and uses are defined
//! - a value consumed by `Move` or `Drop` is not used afterwards
//! - `StoreLocal`/`LoadLocal` respect store-before-load, with stored-ness
//!   merged by intersection across predecessors
//! - edges target existing blocks with matching argument arity and types
//! - a fallible call's error edge targets a block whose first parameter is
//!   Error (the call machinery populates it; the edge passes the rest)
//! - every block is reachable from entry and carries a terminator

use std::collections::{BTreeSet, HashMap, HashSet};

use drift_common::{TypeId, TypeKind, TypeTable};
use drift_compiler_semantic::FnInfo;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::{BasicBlock, Edge, Instruction, MirFunction, MirModule, Terminator, ValueId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct VerificationError {
    pub message: String,
}

fn err(message: impl Into<String>) -> VerificationError {
    VerificationError {
        message: message.into(),
    }
}

/// Verify every function of a module, in declaration order.
pub fn verify_module(
    module: &MirModule,
    table: &mut TypeTable,
    fn_infos: Option<&FxHashMap<String, FnInfo>>,
) -> Result<(), VerificationError> {
    for func in module.functions.values() {
        verify_function(func, table, fn_infos)?;
    }
    Ok(())
}

pub fn verify_function(
    func: &MirFunction,
    table: &mut TypeTable,
    fn_infos: Option<&FxHashMap<String, FnInfo>>,
) -> Result<(), VerificationError> {
    if !func.blocks.contains_key(&func.entry) {
        return Err(err(format!(
            "{}: entry block '{}' missing",
            func.name, func.entry
        )));
    }
    for (name, block) in &func.blocks {
        if block.terminator.is_none() {
            return Err(err(format!("{}:{}: missing terminator", func.name, name)));
        }
    }

    let facts = BlockFacts::compute(func, table, fn_infos);
    let flow = DefFlow::solve(func, &facts);
    verify_cfg(func, &facts, &flow)?;
    for block in func.blocks.values() {
        verify_block(func, block, &flow)?;
    }
    verify_error_edge_types(func, table)?;
    Ok(())
}

/// Per-block local facts: names defined, their types, and locals stored.
struct BlockFacts {
    defs: HashMap<String, HashSet<ValueId>>,
    types: HashMap<String, HashMap<ValueId, TypeId>>,
    stores: HashMap<String, HashSet<String>>,
}

impl BlockFacts {
    fn compute(
        func: &MirFunction,
        table: &mut TypeTable,
        fn_infos: Option<&FxHashMap<String, FnInfo>>,
    ) -> Self {
        let mut defs = HashMap::new();
        let mut types = HashMap::new();
        let mut stores = HashMap::new();

        for (name, block) in &func.blocks {
            let mut defined: HashSet<ValueId> = HashSet::new();
            let mut type_map: HashMap<ValueId, TypeId> = HashMap::new();
            let mut stored: HashSet<String> = HashSet::new();

            for param in &block.params {
                defined.insert(param.name.clone());
                type_map.insert(param.name.clone(), param.ty);
            }
            for instr in &block.instructions {
                match instr {
                    Instruction::Const { dest, ty, .. } => {
                        defined.insert(dest.clone());
                        type_map.insert(dest.clone(), *ty);
                    }
                    Instruction::Move { dest, source }
                    | Instruction::Copy { dest, source }
                    | Instruction::Assign { dest, source } => {
                        defined.insert(dest.clone());
                        if let Some(ty) = type_map.get(source) {
                            type_map.insert(dest.clone(), *ty);
                        }
                    }
                    Instruction::Call { dest, callee, .. } => {
                        defined.insert(dest.clone());
                        if let Some(ty) =
                            fn_infos.and_then(|m| m.get(callee)).and_then(|i| i.return_type_id)
                        {
                            type_map.insert(dest.clone(), ty);
                        }
                    }
                    Instruction::StructInit { dest, ty, .. } => {
                        defined.insert(dest.clone());
                        type_map.insert(dest.clone(), *ty);
                    }
                    Instruction::ArrayInit {
                        dest, element_ty, ..
                    } => {
                        defined.insert(dest.clone());
                        type_map.insert(dest.clone(), table.ensure_array(*element_ty));
                    }
                    Instruction::FieldGet { dest, .. }
                    | Instruction::ArrayGet { dest, .. }
                    | Instruction::UnaryOp { dest, .. }
                    | Instruction::AddrOfLocal { dest, .. }
                    | Instruction::ConstructResultOk { dest, .. }
                    | Instruction::ConstructResultErr { dest, .. } => {
                        defined.insert(dest.clone());
                    }
                    Instruction::BinaryOp { dest, op, .. } => {
                        defined.insert(dest.clone());
                        let ty = match op {
                            crate::BinOp::Eq
                            | crate::BinOp::Neq
                            | crate::BinOp::Less
                            | crate::BinOp::Greater
                            | crate::BinOp::LessEqual
                            | crate::BinOp::GreaterEqual
                            | crate::BinOp::And
                            | crate::BinOp::Or => table.ensure_bool(),
                            _ => table.ensure_int(),
                        };
                        type_map.insert(dest.clone(), ty);
                    }
                    Instruction::ConstructError { dest, .. } => {
                        defined.insert(dest.clone());
                        type_map.insert(dest.clone(), table.ensure_error());
                    }
                    Instruction::LoadLocal { dest, local } => {
                        defined.insert(dest.clone());
                        if let Some(ty) = func.local_types.get(local) {
                            type_map.insert(dest.clone(), *ty);
                        }
                    }
                    Instruction::StoreLocal { local, .. } => {
                        stored.insert(local.clone());
                    }
                    // ArraySet/Drop produce no new defs.
                    Instruction::ArraySet { .. } | Instruction::Drop { .. } => {}
                }
            }
            defs.insert(name.clone(), defined);
            types.insert(name.clone(), type_map);
            stores.insert(name.clone(), stored);
        }
        Self {
            defs,
            types,
            stores,
        }
    }
}

/// Fixed-point dataflow of definedness, types, and stored locals.
struct DefFlow {
    in_defs: HashMap<String, HashSet<ValueId>>,
    in_types: HashMap<String, HashMap<ValueId, TypeId>>,
    in_stores: HashMap<String, HashSet<String>>,
}

impl DefFlow {
    fn solve(func: &MirFunction, facts: &BlockFacts) -> Self {
        let block_names: Vec<String> = func.blocks.keys().cloned().collect();
        let preds = predecessors(func);

        // Universe for the decreasing intersection frame.
        let mut universe: HashSet<ValueId> = HashSet::new();
        for set in facts.defs.values() {
            universe.extend(set.iter().cloned());
        }
        let mut store_universe: HashSet<String> = func.locals.iter().cloned().collect();
        let fn_params: HashSet<String> = func.params.iter().map(|(n, _)| n.clone()).collect();
        store_universe.extend(fn_params.iter().cloned());

        let mut in_defs: HashMap<String, HashSet<ValueId>> = HashMap::new();
        let mut in_types: HashMap<String, HashMap<ValueId, TypeId>> = HashMap::new();
        let mut in_stores: HashMap<String, HashSet<String>> = HashMap::new();
        for name in &block_names {
            if *name == func.entry {
                in_defs.insert(name.clone(), HashSet::new());
                in_stores.insert(name.clone(), fn_params.clone());
            } else {
                in_defs.insert(name.clone(), universe.clone());
                in_stores.insert(name.clone(), store_universe.clone());
            }
            in_types.insert(name.clone(), HashMap::new());
        }

        let mut changed = true;
        while changed {
            changed = false;
            for name in &block_names {
                if *name == func.entry {
                    continue;
                }
                let Some(pred_list) = preds.get(name) else {
                    continue;
                };
                if pred_list.is_empty() {
                    continue;
                }

                let mut merged_defs: Option<HashSet<ValueId>> = None;
                let mut merged_stores: Option<HashSet<String>> = None;
                let mut merged_types: HashMap<ValueId, TypeId> = HashMap::new();
                for pred in pred_list {
                    let out: HashSet<ValueId> = in_defs[pred]
                        .union(&facts.defs[pred])
                        .cloned()
                        .collect();
                    merged_defs = Some(match merged_defs {
                        None => out,
                        Some(acc) => acc.intersection(&out).cloned().collect(),
                    });

                    let stored_out: HashSet<String> = in_stores[pred]
                        .union(&facts.stores[pred])
                        .cloned()
                        .collect();
                    merged_stores = Some(match merged_stores {
                        None => stored_out,
                        Some(acc) => acc.intersection(&stored_out).cloned().collect(),
                    });

                    for (value, ty) in in_types[pred].iter().chain(facts.types[pred].iter()) {
                        merged_types.entry(value.clone()).or_insert(*ty);
                    }
                }

                let merged_defs = merged_defs.unwrap_or_default();
                if merged_defs != in_defs[name] {
                    in_defs.insert(name.clone(), merged_defs);
                    changed = true;
                }
                let merged_stores = merged_stores.unwrap_or_default();
                if merged_stores != in_stores[name] {
                    in_stores.insert(name.clone(), merged_stores);
                    changed = true;
                }
                if merged_types != in_types[name] {
                    in_types.insert(name.clone(), merged_types);
                    changed = true;
                }
            }
        }

        Self {
            in_defs,
            in_types,
            in_stores,
        }
    }
}

fn predecessors(func: &MirFunction) -> HashMap<String, Vec<String>> {
    let mut preds: HashMap<String, Vec<String>> = HashMap::new();
    for name in func.blocks.keys() {
        preds.insert(name.clone(), Vec::new());
    }
    for (source, _) in &func.blocks {
        for succ in func.successors(source) {
            if let Some(list) = preds.get_mut(&succ) {
                if !list.contains(source) {
                    list.push(source.clone());
                }
            }
        }
    }
    preds
}

fn verify_cfg(
    func: &MirFunction,
    facts: &BlockFacts,
    flow: &DefFlow,
) -> Result<(), VerificationError> {
    // Reachability from entry over terminator and call edges.
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut stack = vec![func.entry.clone()];
    while let Some(name) = stack.pop() {
        if !seen.insert(name.clone()) {
            continue;
        }
        if !func.blocks.contains_key(&name) {
            return Err(err(format!(
                "{}: edge to unknown block '{name}'",
                func.name
            )));
        }
        for succ in func.successors(&name) {
            if !func.blocks.contains_key(&succ) {
                return Err(err(format!(
                    "{}:{name}: edge to unknown block '{succ}'",
                    func.name
                )));
            }
            stack.push(succ);
        }
    }
    if seen.len() != func.blocks.len() {
        let missing: Vec<&str> = func
            .blocks
            .keys()
            .filter(|k| !seen.contains(*k))
            .map(|k| k.as_str())
            .collect();
        return Err(err(format!(
            "{}: unreachable blocks: {}",
            func.name,
            missing.join(", ")
        )));
    }

    // Validate incoming edges against block params.
    for (block_name, block) in &func.blocks {
        let param_types: Vec<TypeId> = block.params.iter().map(|p| p.ty).collect();
        for (source, edge, is_error_edge) in func.incoming_edges(block_name) {
            let expected = if is_error_edge {
                // The call populates the leading Error parameter.
                param_types.len().saturating_sub(1)
            } else {
                param_types.len()
            };
            if edge.args.len() != expected {
                return Err(err(format!(
                    "{}:{block_name}: predecessor '{source}' passed {} args, expected {expected}",
                    func.name,
                    edge.args.len()
                )));
            }
            let offset = if is_error_edge { 1 } else { 0 };
            let src_types = &facts.types[source];
            let src_in_types = &flow.in_types[source];
            for (index, arg) in edge.args.iter().enumerate() {
                if let (Some(arg_ty), Some(param_ty)) = (
                    src_types.get(arg).or_else(|| src_in_types.get(arg)),
                    param_types.get(index + offset),
                )
                {
                    if arg_ty != param_ty {
                        return Err(err(format!(
                            "{}:{block_name}: arg {index} type mismatch from predecessor '{source}'",
                            func.name
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}

struct State {
    defined: HashSet<ValueId>,
    moved: HashSet<ValueId>,
    dropped: HashSet<ValueId>,
    stored: HashSet<String>,
}

impl State {
    fn ensure_defined(
        &self,
        func: &str,
        block: &BasicBlock,
        name: &ValueId,
        ctx: &str,
    ) -> Result<(), VerificationError> {
        if !self.defined.contains(name) {
            return Err(err(format!(
                "{func}:{}: {ctx}: '{name}' is undefined",
                block.name
            )));
        }
        Ok(())
    }

    fn ensure_not_defined(
        &self,
        func: &str,
        block: &BasicBlock,
        name: &ValueId,
        ctx: &str,
    ) -> Result<(), VerificationError> {
        if self.defined.contains(name) {
            return Err(err(format!(
                "{func}:{}: {ctx}: '{name}' already defined",
                block.name
            )));
        }
        Ok(())
    }

    fn ensure_not_moved_or_dropped(
        &self,
        func: &str,
        block: &BasicBlock,
        name: &ValueId,
        ctx: &str,
    ) -> Result<(), VerificationError> {
        if self.moved.contains(name) {
            return Err(err(format!(
                "{func}:{}: {ctx}: '{name}' was moved",
                block.name
            )));
        }
        if self.dropped.contains(name) {
            return Err(err(format!(
                "{func}:{}: {ctx}: '{name}' was dropped",
                block.name
            )));
        }
        Ok(())
    }

    fn use_operand(
        &self,
        func: &str,
        block: &BasicBlock,
        name: &ValueId,
        ctx: &str,
    ) -> Result<(), VerificationError> {
        self.ensure_defined(func, block, name, ctx)?;
        self.ensure_not_moved_or_dropped(func, block, name, ctx)
    }

    fn define(
        &mut self,
        func: &str,
        block: &BasicBlock,
        name: &ValueId,
        ctx: &str,
    ) -> Result<(), VerificationError> {
        self.ensure_not_defined(func, block, name, ctx)?;
        self.defined.insert(name.clone());
        Ok(())
    }
}

fn verify_block(
    func: &MirFunction,
    block: &BasicBlock,
    flow: &DefFlow,
) -> Result<(), VerificationError> {
    let fname = func.name.as_str();
    let mut state = State {
        defined: flow.in_defs[&block.name].clone(),
        moved: HashSet::new(),
        dropped: HashSet::new(),
        stored: flow.in_stores[&block.name].clone(),
    };
    for param in &block.params {
        state.defined.insert(param.name.clone());
    }

    for (index, instr) in block.instructions.iter().enumerate() {
        let is_last = index + 1 == block.instructions.len();
        match instr {
            Instruction::Const { dest, .. } => state.define(fname, block, dest, "const")?,
            Instruction::Move { dest, source } => {
                state.use_operand(fname, block, source, "move")?;
                state.define(fname, block, dest, "move")?;
                state.moved.insert(source.clone());
            }
            Instruction::Copy { dest, source } => {
                state.use_operand(fname, block, source, "copy")?;
                state.define(fname, block, dest, "copy")?;
            }
            Instruction::Assign { dest, source } => {
                state.use_operand(fname, block, source, "assign")?;
                state.define(fname, block, dest, "assign")?;
            }
            Instruction::Call {
                dest,
                args,
                normal,
                error,
                ..
            } => {
                for arg in args {
                    state.use_operand(fname, block, arg, "call")?;
                }
                state.define(fname, block, dest, "call")?;
                if (normal.is_some() || error.is_some()) && !is_last {
                    return Err(err(format!(
                        "{fname}:{}: call with edges must be the final instruction",
                        block.name
                    )));
                }
                if let Some(edge) = normal {
                    ensure_edge_target(func, block, edge, false)?;
                    // The normal continuation is also the terminator target.
                    match &block.terminator {
                        Some(Terminator::Br { edge: term_edge })
                            if term_edge.target == edge.target => {}
                        _ => {
                            return Err(err(format!(
                                "{fname}:{}: call normal edge must match the block terminator",
                                block.name
                            )))
                        }
                    }
                }
                if let Some(edge) = error {
                    ensure_edge_target(func, block, edge, true)?;
                }
            }
            Instruction::StructInit { dest, args, .. } => {
                for arg in args {
                    state.use_operand(fname, block, arg, "struct_init")?;
                }
                state.define(fname, block, dest, "struct_init")?;
            }
            Instruction::FieldGet { dest, base, .. } => {
                state.use_operand(fname, block, base, "field_get")?;
                state.define(fname, block, dest, "field_get")?;
            }
            Instruction::ArrayInit { dest, elements, .. } => {
                for element in elements {
                    state.use_operand(fname, block, element, "array_init")?;
                }
                state.define(fname, block, dest, "array_init")?;
            }
            Instruction::ArrayGet { dest, base, index } => {
                state.use_operand(fname, block, base, "array_get")?;
                state.use_operand(fname, block, index, "array_get")?;
                state.define(fname, block, dest, "array_get")?;
            }
            Instruction::ArraySet { base, index, value } => {
                state.use_operand(fname, block, base, "array_set")?;
                state.use_operand(fname, block, index, "array_set")?;
                state.use_operand(fname, block, value, "array_set")?;
            }
            Instruction::UnaryOp { dest, operand, .. } => {
                state.use_operand(fname, block, operand, "unary")?;
                state.define(fname, block, dest, "unary")?;
            }
            Instruction::BinaryOp {
                dest, left, right, ..
            } => {
                state.use_operand(fname, block, left, "binary")?;
                state.use_operand(fname, block, right, "binary")?;
                state.define(fname, block, dest, "binary")?;
            }
            Instruction::AddrOfLocal { dest, local } => {
                if !func.locals.contains(local) && !func.params.iter().any(|(n, _)| n == local) {
                    return Err(err(format!(
                        "{fname}:{}: addr_of: unknown local '{local}'",
                        block.name
                    )));
                }
                state.define(fname, block, dest, "addr_of")?;
            }
            Instruction::Drop { value } => {
                state.use_operand(fname, block, value, "drop")?;
                state.dropped.insert(value.clone());
            }
            Instruction::ConstructResultOk { dest, value } => {
                state.use_operand(fname, block, value, "result_ok")?;
                state.define(fname, block, dest, "result_ok")?;
            }
            Instruction::ConstructResultErr { dest, error } => {
                state.use_operand(fname, block, error, "result_err")?;
                state.define(fname, block, dest, "result_err")?;
            }
            Instruction::ConstructError { dest, code, .. } => {
                state.use_operand(fname, block, code, "construct_error")?;
                state.define(fname, block, dest, "construct_error")?;
            }
            Instruction::StoreLocal { local, value } => {
                state.use_operand(fname, block, value, "store_local")?;
                state.stored.insert(local.clone());
            }
            Instruction::LoadLocal { dest, local } => {
                if !state.stored.contains(local) {
                    return Err(err(format!(
                        "{fname}:{}: load before store for local '{local}'",
                        block.name
                    )));
                }
                state.define(fname, block, dest, "load_local")?;
            }
        }
    }

    match block.terminator.as_ref() {
        Some(Terminator::Br { edge }) => {
            ensure_edge_target(func, block, edge, false)?;
            ensure_edge_args_defined(func, block, edge, &state)?;
        }
        Some(Terminator::CondBr {
            cond,
            then_edge,
            else_edge,
        }) => {
            state.use_operand(fname, block, cond, "condbr")?;
            ensure_edge_target(func, block, then_edge, false)?;
            ensure_edge_target(func, block, else_edge, false)?;
            ensure_edge_args_defined(func, block, then_edge, &state)?;
            ensure_edge_args_defined(func, block, else_edge, &state)?;
        }
        Some(Terminator::Return { value }) => {
            if let Some(value) = value {
                state.use_operand(fname, block, value, "return")?;
            }
        }
        Some(Terminator::Raise { error }) => {
            state.use_operand(fname, block, error, "raise")?;
        }
        None => {
            return Err(err(format!(
                "{fname}:{}: missing terminator",
                block.name
            )))
        }
    }
    Ok(())
}

fn ensure_edge_args_defined(
    func: &MirFunction,
    block: &BasicBlock,
    edge: &Edge,
    state: &State,
) -> Result<(), VerificationError> {
    for arg in &edge.args {
        state.use_operand(&func.name, block, arg, "edge")?;
    }
    Ok(())
}

fn ensure_edge_target(
    func: &MirFunction,
    block: &BasicBlock,
    edge: &Edge,
    is_error_edge: bool,
) -> Result<(), VerificationError> {
    let Some(target) = func.blocks.get(&edge.target) else {
        return Err(err(format!(
            "{}:{}: edge to unknown block '{}'",
            func.name, block.name, edge.target
        )));
    };
    let expected = if is_error_edge {
        target.params.len().saturating_sub(1)
    } else {
        target.params.len()
    };
    if edge.args.len() != expected {
        return Err(err(format!(
            "{}:{}: edge to '{}' expects {expected} args, got {}",
            func.name,
            block.name,
            edge.target,
            edge.args.len()
        )));
    }
    if is_error_edge && target.params.is_empty() {
        // The first parameter of an error-edge target receives the
        // in-flight Error; its type is checked with the table in
        // `verify_error_edge_types`.
        return Err(err(format!(
            "{}:{}: error edge '{}' target has no Error parameter",
            func.name, block.name, edge.target
        )));
    }
    Ok(())
}

/// Check that an error edge's first parameter has Error type. Needs the
/// table, so it runs as part of module-level verification.
pub fn verify_error_edge_types(
    func: &MirFunction,
    table: &TypeTable,
) -> Result<(), VerificationError> {
    for (source, block) in &func.blocks {
        for instr in &block.instructions {
            if let Instruction::Call { error: Some(edge), .. } = instr {
                let Some(target) = func.blocks.get(&edge.target) else {
                    continue;
                };
                match target.params.first() {
                    Some(param) if table.kind(param.ty) == TypeKind::Error => {}
                    _ => {
                        return Err(err(format!(
                            "{}:{source}: error edge '{}' first param must be Error",
                            func.name, edge.target
                        )))
                    }
                }
            }
        }
    }
    Ok(())
}
