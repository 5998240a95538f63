//! LLVM emitter tests against the v1 ABI.

use drift_common::{Literal, TypeTable};
use drift_compiler_codegen::{lower_ssa_func_to_llvm, LlvmModuleBuilder};
use drift_compiler_mir::{
    BasicBlock, BlockParam, Edge, Instruction, MirBuilder, MirToSsa, SsaFunc, Terminator,
};
use drift_compiler_semantic::FnInfo;
use rustc_hash::FxHashMap;

fn fn_info(name: &str, can_throw: bool, return_type_id: Option<drift_common::TypeId>) -> FnInfo {
    FnInfo {
        name: name.to_string(),
        declared_can_throw: can_throw,
        declared_events: None,
        return_type_id,
        error_type_id: None,
        span: None,
    }
}

fn ssa_of(builder: MirBuilder, table: &mut TypeTable) -> SsaFunc {
    MirToSsa::new().run(builder.func, table).expect("ssa")
}

#[test]
fn scalar_return_42_emits_i64_function() {
    let mut table = TypeTable::new();
    let int = table.ensure_int();

    let mut b = MirBuilder::new("drift_main");
    let v = b.new_temp();
    b.emit(Instruction::Const {
        dest: v.clone(),
        value: Literal::Int(42),
        ty: int,
    });
    b.set_terminator(Terminator::Return { value: Some(v) });

    let ssa = ssa_of(b, &mut table);
    let info = fn_info("drift_main", false, Some(int));
    let text = lower_ssa_func_to_llvm(&ssa, &info, &FxHashMap::default(), &table).unwrap();

    assert!(text.contains("define i64 @drift_main()"));
    assert!(text.contains("add i64 0, 42"));
    assert!(text.contains("ret i64"));
}

#[test]
fn fallible_ok_return_emits_result_carrier() {
    let mut table = TypeTable::new();
    let int = table.ensure_int();

    let mut b = MirBuilder::new("callee");
    let v = b.new_temp();
    b.emit(Instruction::Const {
        dest: v.clone(),
        value: Literal::Int(1),
        ty: int,
    });
    let carrier = b.new_temp();
    b.emit(Instruction::ConstructResultOk {
        dest: carrier.clone(),
        value: v,
    });
    b.set_terminator(Terminator::Return {
        value: Some(carrier),
    });

    let ssa = ssa_of(b, &mut table);
    let info = fn_info("callee", true, None);
    let text = lower_ssa_func_to_llvm(&ssa, &info, &FxHashMap::default(), &table).unwrap();

    assert!(text.contains("define %FnResult_Int_Error @callee()"));
    assert!(text.contains("insertvalue %FnResult_Int_Error undef, i1 0, 0"));
    assert!(text.contains("ret %FnResult_Int_Error"));
}

#[test]
fn carrier_field_access_lowers_to_extractvalue() {
    let mut table = TypeTable::new();
    let int = table.ensure_int();
    let error = table.ensure_error();
    let carrier_ty = table.ensure_fnresult(int, error);

    let mut b = MirBuilder::new("caller");
    let result = b.new_temp();
    b.emit(Instruction::Call {
        dest: result.clone(),
        callee: "callee".to_string(),
        args: vec![],
        normal: None,
        error: None,
    });
    let is_err = b.new_temp();
    b.emit(Instruction::FieldGet {
        dest: is_err.clone(),
        base: result.clone(),
        field: "is_err".to_string(),
    });
    let ok = b.new_temp();
    b.emit(Instruction::FieldGet {
        dest: ok.clone(),
        base: result,
        field: "ok".to_string(),
    });
    b.set_terminator(Terminator::Return { value: Some(ok) });

    let ssa = ssa_of(b, &mut table);
    let info = fn_info("caller", false, Some(int));
    let mut fn_infos = FxHashMap::default();
    fn_infos.insert("callee".to_string(), fn_info("callee", true, Some(carrier_ty)));
    let text = lower_ssa_func_to_llvm(&ssa, &info, &fn_infos, &table).unwrap();

    assert!(text.contains("call %FnResult_Int_Error @callee()"));
    assert!(text.contains("extractvalue %FnResult_Int_Error %t1, 0"));
    assert!(text.contains("extractvalue %FnResult_Int_Error %t1, 1"));
}

#[test]
fn diamond_join_param_becomes_phi() {
    let mut table = TypeTable::new();
    let int = table.ensure_int();
    let bool_ty = table.ensure_bool();

    let mut b = MirBuilder::new("f");
    let cond = b.new_temp();
    b.emit(Instruction::Const {
        dest: cond.clone(),
        value: Literal::Bool(true),
        ty: bool_ty,
    });
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
    let a = b.new_temp();
    b.emit(Instruction::Const {
        dest: a.clone(),
        value: Literal::Int(1),
        ty: int,
    });
    b.set_terminator(Terminator::Br {
        edge: Edge::with_args("join", vec![a]),
    });

    b.switch_to(&else_name);
    let c = b.new_temp();
    b.emit(Instruction::Const {
        dest: c.clone(),
        value: Literal::Int(2),
        ty: int,
    });
    b.set_terminator(Terminator::Br {
        edge: Edge::with_args("join", vec![c]),
    });

    let ssa = ssa_of(b, &mut table);
    let info = fn_info("f", false, Some(int));
    let text = lower_ssa_func_to_llvm(&ssa, &info, &FxHashMap::default(), &table).unwrap();

    assert!(text.contains("%v = phi i64"));
    assert!(text.contains("br i1"));
}

#[test]
fn functions_with_parameters_are_rejected() {
    let mut table = TypeTable::new();
    let int = table.ensure_int();

    let mut func = drift_compiler_mir::MirFunction::new("f");
    func.params.push(("a".to_string(), int));
    func.blocks
        .get_mut("entry")
        .unwrap()
        .set_terminator(Terminator::Return { value: None });
    let ssa = SsaFunc {
        func,
        local_versions: Default::default(),
        current_value: Default::default(),
    };
    let info = fn_info("f", false, Some(int));
    let result = lower_ssa_func_to_llvm(&ssa, &info, &FxHashMap::default(), &table);
    assert!(result.is_err());
}

#[test]
fn module_builder_declares_abi_types() {
    let module = LlvmModuleBuilder::new();
    let text = module.render();
    assert!(text.contains("%DriftError = type { i64, ptr, ptr, ptr }"));
    assert!(text.contains("%FnResult_Int_Error = type { i1, i64, %DriftError }"));
}
