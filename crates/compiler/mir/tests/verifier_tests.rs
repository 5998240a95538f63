//! MIR verifier integration tests: CFG well-formedness, definedness
//! dataflow, move/drop discipline, and edge agreement.

use drift_common::{Literal, TypeTable};
use drift_compiler_mir::{
    verify_function, BasicBlock, BlockParam, Edge, Instruction, MirBuilder, MirFunction,
    Terminator,
};

fn const_int(b: &mut MirBuilder, table: &mut TypeTable, value: i64) -> String {
    let ty = table.ensure_int();
    let dest = b.new_temp();
    b.emit(Instruction::Const {
        dest: dest.clone(),
        value: Literal::Int(value),
        ty,
    });
    dest
}

#[test]
fn straight_line_function_verifies() {
    let mut table = TypeTable::new();
    let mut b = MirBuilder::new("f");
    let v = const_int(&mut b, &mut table, 42);
    b.set_terminator(Terminator::Return { value: Some(v) });
    assert!(verify_function(&b.func, &mut table, None).is_ok());
}

#[test]
fn missing_terminator_is_rejected() {
    let mut table = TypeTable::new();
    let func = MirFunction::new("f");
    let err = verify_function(&func, &mut table, None).unwrap_err();
    assert!(err.message.contains("missing terminator"));
}

#[test]
fn use_of_undefined_value_is_rejected() {
    let mut table = TypeTable::new();
    let mut b = MirBuilder::new("f");
    b.set_terminator(Terminator::Return {
        value: Some("ghost".to_string()),
    });
    let err = verify_function(&b.func, &mut table, None).unwrap_err();
    assert!(err.message.contains("undefined"));
}

#[test]
fn use_after_move_is_rejected() {
    let mut table = TypeTable::new();
    let mut b = MirBuilder::new("f");
    let v = const_int(&mut b, &mut table, 1);
    let moved = b.new_temp();
    b.emit(Instruction::Move {
        dest: moved,
        source: v.clone(),
    });
    // Using the moved-out source afterwards must fail.
    let sum = b.new_temp();
    b.emit(Instruction::BinaryOp {
        dest: sum.clone(),
        op: drift_compiler_mir::BinOp::Add,
        left: v,
        right: "t2".to_string(),
    });
    b.set_terminator(Terminator::Return { value: Some(sum) });
    let err = verify_function(&b.func, &mut table, None).unwrap_err();
    assert!(err.message.contains("was moved"));
}

#[test]
fn use_after_drop_is_rejected() {
    let mut table = TypeTable::new();
    let mut b = MirBuilder::new("f");
    let v = const_int(&mut b, &mut table, 1);
    b.emit(Instruction::Drop { value: v.clone() });
    b.set_terminator(Terminator::Return { value: Some(v) });
    let err = verify_function(&b.func, &mut table, None).unwrap_err();
    assert!(err.message.contains("was dropped"));
}

#[test]
fn duplicate_definition_is_rejected() {
    let mut table = TypeTable::new();
    let int = table.ensure_int();
    let mut b = MirBuilder::new("f");
    b.emit(Instruction::Const {
        dest: "t1".to_string(),
        value: Literal::Int(1),
        ty: int,
    });
    b.emit(Instruction::Const {
        dest: "t1".to_string(),
        value: Literal::Int(2),
        ty: int,
    });
    b.set_terminator(Terminator::Return {
        value: Some("t1".to_string()),
    });
    let err = verify_function(&b.func, &mut table, None).unwrap_err();
    assert!(err.message.contains("already defined"));
}

#[test]
fn unreachable_block_is_rejected() {
    let mut table = TypeTable::new();
    let mut b = MirBuilder::new("f");
    let v = const_int(&mut b, &mut table, 1);
    b.set_terminator(Terminator::Return { value: Some(v) });
    let mut island = BasicBlock::new("island");
    island.set_terminator(Terminator::Return { value: None });
    b.func.add_block(island);
    let err = verify_function(&b.func, &mut table, None).unwrap_err();
    assert!(err.message.contains("unreachable blocks"));
}

#[test]
fn edge_to_unknown_block_is_rejected() {
    let mut table = TypeTable::new();
    let mut b = MirBuilder::new("f");
    b.set_terminator(Terminator::br("nowhere"));
    let err = verify_function(&b.func, &mut table, None).unwrap_err();
    assert!(err.message.contains("unknown block"));
}

#[test]
fn edge_arity_mismatch_is_rejected() {
    let mut table = TypeTable::new();
    let int = table.ensure_int();
    let mut b = MirBuilder::new("f");
    // Target expects one param; the edge passes none.
    let target = BasicBlock::with_params("target", vec![BlockParam::new("p", int)]);
    b.func.add_block({
        let mut t = target;
        t.set_terminator(Terminator::Return {
            value: Some("p".to_string()),
        });
        t
    });
    b.set_terminator(Terminator::br("target"));
    let err = verify_function(&b.func, &mut table, None).unwrap_err();
    assert!(err.message.contains("args"));
}

#[test]
fn edge_arg_type_mismatch_is_rejected() {
    let mut table = TypeTable::new();
    let int = table.ensure_int();
    let bool_ty = table.ensure_bool();

    let mut b = MirBuilder::new("f");
    let flag = {
        let dest = b.new_temp();
        b.emit(Instruction::Const {
            dest: dest.clone(),
            value: Literal::Bool(true),
            ty: bool_ty,
        });
        dest
    };
    let mut target = BasicBlock::with_params("target", vec![BlockParam::new("p", int)]);
    target.set_terminator(Terminator::Return {
        value: Some("p".to_string()),
    });
    b.func.add_block(target);
    b.set_terminator(Terminator::Br {
        edge: Edge::with_args("target", vec![flag]),
    });
    let err = verify_function(&b.func, &mut table, None).unwrap_err();
    assert!(err.message.contains("type mismatch"));
}

#[test]
fn diamond_with_typed_block_args_verifies() {
    let mut table = TypeTable::new();
    let int = table.ensure_int();
    let bool_ty = table.ensure_bool();

    let mut b = MirBuilder::new("f");
    let cond = {
        let dest = b.new_temp();
        b.emit(Instruction::Const {
            dest: dest.clone(),
            value: Literal::Bool(true),
            ty: bool_ty,
        });
        dest
    };
    let then_name = b.new_block("then");
    let else_name = b.new_block("else");
    let mut join = BasicBlock::with_params("join", vec![BlockParam::new("v", int)]);
    join.set_terminator(Terminator::Return {
        value: Some("v".to_string()),
    });
    b.func.add_block(join);

    b.set_terminator(Terminator::CondBr {
        cond,
        then_edge: Edge::new(then_name.clone()),
        else_edge: Edge::new(else_name.clone()),
    });

    b.switch_to(&then_name);
    let a = const_int(&mut b, &mut table, 1);
    b.set_terminator(Terminator::Br {
        edge: Edge::with_args("join", vec![a]),
    });

    b.switch_to(&else_name);
    let c = const_int(&mut b, &mut table, 2);
    b.set_terminator(Terminator::Br {
        edge: Edge::with_args("join", vec![c]),
    });

    assert!(verify_function(&b.func, &mut table, None).is_ok());
}

#[test]
fn error_edge_first_param_must_be_error_type() {
    let mut table = TypeTable::new();
    let int = table.ensure_int();

    let mut b = MirBuilder::new("f");
    // Handler block whose first param is Int, not Error.
    let mut handler = BasicBlock::with_params("handler", vec![BlockParam::new("e", int)]);
    handler.set_terminator(Terminator::Return { value: None });
    b.func.add_block(handler);
    let cont = b.new_block("cont");
    b.func
        .block_mut(&cont)
        .unwrap()
        .set_terminator(Terminator::Return { value: None });

    let dest = b.new_temp();
    b.emit(Instruction::Call {
        dest,
        callee: "fallible".to_string(),
        args: vec![],
        normal: Some(Edge::new(cont.clone())),
        error: Some(Edge::new("handler")),
    });
    b.set_terminator(Terminator::br(cont));

    let err = verify_function(&b.func, &mut table, None).unwrap_err();
    assert!(err.message.contains("first param must be Error"));
}

#[test]
fn store_load_locals_flow_through_blocks() {
    let mut table = TypeTable::new();
    let mut b = MirBuilder::new("f");
    b.ensure_local("x", Some(table.ensure_int()));
    let v = const_int(&mut b, &mut table, 5);
    b.emit(Instruction::StoreLocal {
        local: "x".to_string(),
        value: v,
    });
    let next = b.new_block("next");
    b.set_terminator(Terminator::br(next.clone()));
    b.switch_to(&next);
    b.emit(Instruction::LoadLocal {
        dest: "t9".to_string(),
        local: "x".to_string(),
    });
    b.set_terminator(Terminator::Return {
        value: Some("t9".to_string()),
    });
    assert!(verify_function(&b.func, &mut table, None).is_ok());
}

#[test]
fn load_before_store_is_rejected() {
    let mut table = TypeTable::new();
    let mut b = MirBuilder::new("f");
    b.ensure_local("x", None);
    b.emit(Instruction::LoadLocal {
        dest: "t1".to_string(),
        local: "x".to_string(),
    });
    b.set_terminator(Terminator::Return {
        value: Some("t1".to_string()),
    });
    let err = verify_function(&b.func, &mut table, None).unwrap_err();
    assert!(err.message.contains("load before store"));
}
