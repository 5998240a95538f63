//! The compilation pipeline for one module.

use std::collections::{BTreeMap, BTreeSet};

use drift_common::{GenericTypeExpr, TypeTable, VariantArmSchema, VariantFieldSchema};
use drift_compiler_codegen::{lower_ssa_func_to_llvm, CodegenError, LlvmModuleBuilder};
use drift_compiler_diagnostics::DiagnosticCollection;
use drift_compiler_hir::{
    ast, AstToHir, HBlock, HExpr, HExprKind, HStmtKind, LoweredFunction,
};
use drift_compiler_mir::{
    address_taken_locals, build_type_env_from_ssa, run_throw_checks, verify_function, HirToMir,
    InvariantError, LoweringError, MirBuilder, MirFunction, MirToSsa, SsaError, SsaFunc,
    ThrowSummaryBuilder, VerificationError,
};
use drift_compiler_semantic::{FnInfo, FnSignature, TypeEnv, TypedFn};
use rustc_hash::FxHashMap;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("checking failed: {}", .0.summary())]
    Diagnostics(DiagnosticCollection),
    #[error(transparent)]
    Lowering(#[from] LoweringError),
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    Ssa(#[from] SsaError),
    #[error(transparent)]
    Invariant(#[from] InvariantError),
    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

/// The result of compiling one module.
#[derive(Debug)]
pub struct CompiledModule {
    pub name: String,
    pub exports: Vec<String>,
    pub llvm_ir: String,
    pub fn_infos: FxHashMap<String, FnInfo>,
    /// Signature metadata for exported values, keyed `module::value`, as
    /// embedded in package manifests.
    pub export_signatures: BTreeMap<String, Value>,
}

/// Run lowering plus the type and borrow checkers only, returning the
/// accumulated diagnostics. Useful for check-only tooling and tests.
pub fn check_module(module: &ast::Module, file_path: &str) -> DiagnosticCollection {
    match checked_phase(module, file_path) {
        Ok(checked) => checked.diagnostics,
        Err(diagnostics) => diagnostics,
    }
}

struct CheckedPhase {
    lowered: drift_compiler_hir::LoweredModule,
    signatures: FxHashMap<String, FnSignature>,
    param_types: FxHashMap<String, Vec<drift_common::TypeId>>,
    catalog: FxHashMap<String, i64>,
    table: TypeTable,
    typed_fns: FxHashMap<String, TypedFn>,
    diagnostics: DiagnosticCollection,
}

/// Compile a parsed module through every tier. Functions compile in
/// declaration order so emitted diagnostics stay stable.
pub fn compile_module(module: &ast::Module, file_path: &str) -> Result<CompiledModule, CompileError> {
    let checked = match checked_phase(module, file_path) {
        Ok(checked) => checked,
        Err(diagnostics) => return Err(CompileError::Diagnostics(diagnostics)),
    };
    if checked.diagnostics.has_errors() {
        let mut diagnostics = checked.diagnostics;
        diagnostics.sort();
        return Err(CompileError::Diagnostics(diagnostics));
    }
    lower_and_emit(checked)
}

fn checked_phase(module: &ast::Module, file_path: &str) -> Result<CheckedPhase, DiagnosticCollection> {
    let mut table = TypeTable::new();
    seed_prelude(&mut table);

    // AST → HIR.
    let mut ast_lower = AstToHir::new(file_path);
    let lowered = ast_lower.lower_module(module);
    let mut diagnostics = DiagnosticCollection::new();
    diagnostics.extend(ast_lower.into_diagnostics());

    // Signatures, resolved against the type table.
    let mut signatures: FxHashMap<String, FnSignature> = FxHashMap::default();
    let mut param_types: FxHashMap<String, Vec<drift_common::TypeId>> = FxHashMap::default();
    for func in &lowered.functions {
        let mut sig = FnSignature::new(&func.decl.name);
        let mut resolved_params = Vec::with_capacity(func.decl.params.len());
        for param in &func.decl.params {
            let ty = match table.resolve_type_expr(&param.type_expr) {
                Ok(ty) => ty,
                Err(err) => {
                    diagnostics.add(
                        drift_compiler_diagnostics::Diagnostic::error(
                            drift_compiler_diagnostics::DiagnosticCode::TypeMismatch,
                            err.to_string(),
                        )
                        .with_location(file_path, func.decl.span.unwrap_or_default()),
                    );
                    table.ensure_unknown()
                }
            };
            resolved_params.push(ty);
            sig.param_names.push(param.name.clone());
        }
        sig.param_type_ids = resolved_params.clone();
        param_types.insert(func.decl.name.clone(), resolved_params);

        if let Some(return_type) = &func.decl.return_type {
            match table.resolve_type_expr(return_type) {
                Ok(ty) => sig = sig.with_return_type(&table, ty),
                Err(err) => diagnostics.add(
                    drift_compiler_diagnostics::Diagnostic::error(
                        drift_compiler_diagnostics::DiagnosticCode::TypeMismatch,
                        err.to_string(),
                    )
                    .with_location(file_path, func.decl.span.unwrap_or_default()),
                ),
            }
        }
        if let Some(throws) = &func.decl.throws {
            sig = sig.with_declared_events(throws.iter().cloned());
        }
        signatures.insert(func.decl.name.clone(), sig);
    }

    let catalog = exception_catalog(&lowered.functions, &signatures);

    // Type checking and borrow checking, per function.
    let mut checker = drift_compiler_semantic::TypeChecker::new(table)
        .with_signatures(signatures.clone())
        .with_exception_catalog(catalog.clone())
        .with_file_path(file_path);
    let mut typed_fns: FxHashMap<String, TypedFn> = FxHashMap::default();
    for func in &lowered.functions {
        let params: Vec<_> = func
            .decl
            .params
            .iter()
            .zip(&param_types[&func.decl.name])
            .map(|(p, ty)| (p.binding_id, *ty))
            .collect();
        let result =
            checker.check_function_with_params(&func.decl.name, &func.body, &params);
        diagnostics.extend(result.diagnostics);

        let borrow_diags = drift_compiler_semantic::BorrowChecker::new(&checker.type_table)
            .with_binding_types(result.typed_fn.locals.clone())
            .with_signatures(&signatures)
            .with_file_path(file_path)
            .check_block(&func.body);
        diagnostics.extend(borrow_diags);

        typed_fns.insert(func.decl.name.clone(), result.typed_fn);
    }

    Ok(CheckedPhase {
        lowered,
        signatures,
        param_types,
        catalog,
        table: checker.type_table,
        typed_fns,
        diagnostics,
    })
}

fn lower_and_emit(checked: CheckedPhase) -> Result<CompiledModule, CompileError> {
    let CheckedPhase {
        lowered,
        signatures,
        param_types,
        catalog,
        mut table,
        typed_fns,
        ..
    } = checked;

    let fn_infos: FxHashMap<String, FnInfo> = signatures
        .iter()
        .map(|(name, sig)| (name.clone(), FnInfo::from_signature(sig)))
        .collect();

    // HIR → MIR → verify → SSA, in declaration order.
    let mut funcs: FxHashMap<String, MirFunction> = FxHashMap::default();
    let mut summaries = FxHashMap::default();
    let mut ssa_funcs: FxHashMap<String, SsaFunc> = FxHashMap::default();
    for func in &lowered.functions {
        let name = func.decl.name.clone();
        let params: Vec<(String, drift_common::TypeId)> = func
            .decl
            .params
            .iter()
            .zip(&param_types[&name])
            .map(|(p, ty)| (p.name.clone(), *ty))
            .collect();

        let lower = HirToMir::new(MirBuilder::new(name.as_str()), &mut table, &fn_infos)
            .with_typed_fn(&typed_fns[&name])
            .with_exception_catalog(catalog.clone());
        let mir = lower.lower_function(params, &func.body)?;
        verify_function(&mir, &mut table, Some(&fn_infos))?;

        summaries.insert(name.clone(), ThrowSummaryBuilder::new().build(&mir, &fn_infos));
        let taken = address_taken_locals(&mir);
        funcs.insert(name.clone(), mir.clone());
        let ssa = MirToSsa::new()
            .with_address_taken(taken)
            .run(mir, &mut table)?;
        ssa_funcs.insert(name, ssa);
    }

    // Stage-4 invariants, type-aware when SSA typing succeeds.
    let declared_can_throw: FxHashMap<String, bool> = signatures
        .iter()
        .map(|(name, sig)| (name.clone(), sig.declared_can_throw))
        .collect();
    let type_env = build_type_env_from_ssa(&ssa_funcs, &signatures, &mut table);
    run_throw_checks(
        &funcs,
        &summaries,
        &declared_can_throw,
        Some(&ssa_funcs),
        type_env.as_ref().map(|e| e as &dyn TypeEnv),
    )?;

    // LLVM emission, in declaration order.
    let mut llvm = LlvmModuleBuilder::new();
    for func in &lowered.functions {
        let name = &func.decl.name;
        let text = lower_ssa_func_to_llvm(&ssa_funcs[name], &fn_infos[name], &fn_infos, &table)?;
        llvm.emit_func(text);
    }

    let export_signatures = export_signatures(&lowered.name, &lowered.exports, &signatures, &table);

    Ok(CompiledModule {
        name: lowered.name,
        exports: lowered.exports,
        llvm_ir: llvm.render(),
        fn_infos,
        export_signatures,
    })
}

/// The prelude `Optional<T>` variant the `for` desugaring relies on.
fn seed_prelude(table: &mut TypeTable) {
    table.declare_variant(
        "lang.core",
        "Optional",
        vec!["T".to_string()],
        vec![
            VariantArmSchema {
                name: "Some".to_string(),
                fields: vec![VariantFieldSchema {
                    name: "value".to_string(),
                    type_expr: GenericTypeExpr::param(0),
                }],
            },
            VariantArmSchema {
                name: "None".to_string(),
                fields: vec![],
            },
        ],
    );
}

/// Event names used anywhere in the module, with deterministic
/// discriminants (sorted, starting at 1).
fn exception_catalog(
    functions: &[LoweredFunction],
    signatures: &FxHashMap<String, FnSignature>,
) -> FxHashMap<String, i64> {
    let mut events: BTreeSet<String> = BTreeSet::new();
    for sig in signatures.values() {
        if let Some(declared) = &sig.declared_events {
            events.extend(declared.iter().cloned());
        }
    }
    for func in functions {
        collect_event_names(&func.body, &mut events);
    }
    events
        .into_iter()
        .enumerate()
        .map(|(index, name)| (name, index as i64 + 1))
        .collect()
}

fn collect_event_names(block: &HBlock, events: &mut BTreeSet<String>) {
    for stmt in &block.statements {
        match &stmt.kind {
            HStmtKind::Let { value, .. } => collect_expr_events(value, events),
            HStmtKind::Assign { target, value } => {
                collect_expr_events(target, events);
                collect_expr_events(value, events);
            }
            HStmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                collect_expr_events(cond, events);
                collect_event_names(then_block, events);
                if let Some(else_block) = else_block {
                    collect_event_names(else_block, events);
                }
            }
            HStmtKind::While { cond, body } => {
                collect_expr_events(cond, events);
                collect_event_names(body, events);
            }
            HStmtKind::Try { body, catches } => {
                collect_event_names(body, events);
                for arm in catches {
                    if let Some(event) = &arm.event {
                        events.insert(event.clone());
                    }
                    collect_event_names(&arm.block, events);
                }
            }
            HStmtKind::Return { value } => {
                if let Some(value) = value {
                    collect_expr_events(value, events);
                }
            }
            HStmtKind::Throw { value } => collect_expr_events(value, events),
            HStmtKind::ExprStmt { expr } => collect_expr_events(expr, events),
            HStmtKind::Import { .. } | HStmtKind::Break | HStmtKind::Continue => {}
        }
    }
}

fn collect_expr_events(expr: &HExpr, events: &mut BTreeSet<String>) {
    match &expr.kind {
        HExprKind::DvInit {
            dv_type_name, args, ..
        } => {
            events.insert(dv_type_name.clone());
            for arg in args {
                collect_expr_events(arg, events);
            }
        }
        HExprKind::Field { subject, .. } => collect_expr_events(subject, events),
        HExprKind::Index { subject, index } => {
            collect_expr_events(subject, events);
            collect_expr_events(index, events);
        }
        HExprKind::Call { args, kwargs, .. } => {
            for arg in args {
                collect_expr_events(arg, events);
            }
            for (_, value) in kwargs {
                collect_expr_events(value, events);
            }
        }
        HExprKind::MethodCall { receiver, args, .. } => {
            collect_expr_events(receiver, events);
            for arg in args {
                collect_expr_events(arg, events);
            }
        }
        HExprKind::Unary { expr, .. } => collect_expr_events(expr, events),
        HExprKind::Binary { left, right, .. } => {
            collect_expr_events(left, events);
            collect_expr_events(right, events);
        }
        HExprKind::Borrow { subject, .. } => collect_expr_events(subject, events),
        HExprKind::Ternary {
            cond,
            then_expr,
            else_expr,
        } => {
            collect_expr_events(cond, events);
            collect_expr_events(then_expr, events);
            collect_expr_events(else_expr, events);
        }
        HExprKind::ArrayLiteral { elements } => {
            for element in elements {
                collect_expr_events(element, events);
            }
        }
        HExprKind::ResultOk(value)
        | HExprKind::ResultErr(value)
        | HExprKind::TrySuffix(value) => collect_expr_events(value, events),
        HExprKind::LiteralInt(_)
        | HExprKind::LiteralBool(_)
        | HExprKind::LiteralString(_)
        | HExprKind::Var { .. } => {}
    }
}

/// Manifest signature metadata for exported values.
fn export_signatures(
    module_name: &str,
    exports: &[String],
    signatures: &FxHashMap<String, FnSignature>,
    table: &TypeTable,
) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    for export in exports {
        let Some(sig) = signatures.get(export) else {
            continue;
        };
        let params: Vec<String> = sig
            .param_type_ids
            .iter()
            .map(|ty| table.display(*ty))
            .collect();
        let returns = sig
            .return_type_id
            .map(|ty| table.display(ty))
            .unwrap_or_else(|| "Unit".to_string());
        out.insert(
            format!("{module_name}::{export}"),
            json!({
                "params": params,
                "returns": returns,
                "is_exported_entrypoint": true,
                "is_method": false,
            }),
        );
    }
    out
}
