//! Pretty-printing for MIR, used in logs and test assertions.

use std::fmt::Write as _;

use crate::{BasicBlock, Instruction, MirFunction, Terminator};

pub fn pretty_function(func: &MirFunction) -> String {
    let mut out = String::new();
    let params = func
        .params
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, "fn {}({params}) {{", func.name);
    for block in func.blocks.values() {
        pretty_block(&mut out, block);
    }
    out.push_str("}\n");
    out
}

fn pretty_block(out: &mut String, block: &BasicBlock) {
    if block.params.is_empty() {
        let _ = writeln!(out, "  {}:", block.name);
    } else {
        let params = block
            .params
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "  {}({params}):", block.name);
    }
    for instr in &block.instructions {
        let _ = writeln!(out, "    {}", pretty_instruction(instr));
    }
    match &block.terminator {
        Some(term) => {
            let _ = writeln!(out, "    {}", pretty_terminator(term));
        }
        None => out.push_str("    <no terminator>\n"),
    }
}

pub fn pretty_instruction(instr: &Instruction) -> String {
    match instr {
        Instruction::Const { dest, value, .. } => format!("{dest} = const {value}"),
        Instruction::Move { dest, source } => format!("{dest} = move {source}"),
        Instruction::Copy { dest, source } => format!("{dest} = copy {source}"),
        Instruction::Assign { dest, source } => format!("{dest} = {source}"),
        Instruction::Call {
            dest,
            callee,
            args,
            normal,
            error,
        } => {
            let mut s = format!("{dest} = call {callee}({})", args.join(", "));
            if let Some(edge) = normal {
                let _ = write!(s, " normal {}", edge.target);
            }
            if let Some(edge) = error {
                let _ = write!(s, " error {}", edge.target);
            }
            s
        }
        Instruction::BinaryOp {
            dest,
            op,
            left,
            right,
        } => format!("{dest} = {left} {op} {right}"),
        Instruction::UnaryOp { dest, op, operand } => format!("{dest} = {op:?} {operand}"),
        Instruction::StructInit { dest, args, .. } => {
            format!("{dest} = struct_init({})", args.join(", "))
        }
        Instruction::FieldGet { dest, base, field } => format!("{dest} = {base}.{field}"),
        Instruction::ArrayInit { dest, elements, .. } => {
            format!("{dest} = array [{}]", elements.join(", "))
        }
        Instruction::ArrayGet { dest, base, index } => format!("{dest} = {base}[{index}]"),
        Instruction::ArraySet { base, index, value } => format!("{base}[{index}] = {value}"),
        Instruction::AddrOfLocal { dest, local } => format!("{dest} = addr_of {local}"),
        Instruction::Drop { value } => format!("drop {value}"),
        Instruction::ConstructResultOk { dest, value } => format!("{dest} = result_ok {value}"),
        Instruction::ConstructResultErr { dest, error } => format!("{dest} = result_err {error}"),
        Instruction::ConstructError { dest, code, event } => match event {
            Some(event) => format!("{dest} = construct_error {code} ({event})"),
            None => format!("{dest} = construct_error {code}"),
        },
        Instruction::StoreLocal { local, value } => format!("store {local}, {value}"),
        Instruction::LoadLocal { dest, local } => format!("{dest} = load {local}"),
    }
}

pub fn pretty_terminator(term: &Terminator) -> String {
    match term {
        Terminator::Return { value: Some(value) } => format!("return {value}"),
        Terminator::Return { value: None } => "return".to_string(),
        Terminator::Raise { error } => format!("raise {error}"),
        Terminator::Br { edge } => {
            if edge.args.is_empty() {
                format!("br {}", edge.target)
            } else {
                format!("br {}({})", edge.target, edge.args.join(", "))
            }
        }
        Terminator::CondBr {
            cond,
            then_edge,
            else_edge,
        } => format!(
            "cond_br {cond}, {}({}), {}({})",
            then_edge.target,
            then_edge.args.join(", "),
            else_edge.target,
            else_edge.args.join(", ")
        ),
    }
}
