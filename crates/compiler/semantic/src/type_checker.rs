//! # Type Checker
//!
//! Assigns a `TypeId` to every expression and binding of a function and
//! validates assignment, arithmetic, logical, comparison, index, field, and
//! call shapes. Violations become diagnostics; checking always continues so
//! a single run reports everything it can find.
//!
//! Effects are accounted here as well: thrown event names accumulate from
//! `throw` payloads and callee declarations, and a function's declared event
//! set must cover everything its body can raise.

use std::collections::BTreeSet;

use drift_common::{TypeData, TypeId, TypeKind, TypeTable};
use drift_compiler_diagnostics::{Diagnostic, DiagnosticCode};
use drift_compiler_hir::{
    BinaryOp, BindingId, HBlock, HCatchArm, HExpr, HExprKind, HStmt, HStmtKind, HirExprId, UnaryOp,
};
use rustc_hash::FxHashMap;

use crate::catch_arms::{validate_catch_arms, CatchArmInfo};
use crate::signatures::FnSignature;

/// Checker side tables for one function.
#[derive(Debug, Default, Clone)]
pub struct TypedFn {
    pub expr_types: FxHashMap<HirExprId, TypeId>,
    pub locals: FxHashMap<BindingId, TypeId>,
}

/// Result of checking a single function.
#[derive(Debug)]
pub struct CheckFnResult {
    pub typed_fn: TypedFn,
    pub diagnostics: Vec<Diagnostic>,
    /// Event names this function may raise, from throws and callees.
    pub effects: BTreeSet<String>,
}

/// The per-program type checker. Owns the type table for the duration of
/// checking; the driver takes it back for MIR lowering.
pub struct TypeChecker {
    pub type_table: TypeTable,
    signatures: FxHashMap<String, FnSignature>,
    exception_catalog: Option<FxHashMap<String, i64>>,
    file_path: String,
}

impl TypeChecker {
    pub fn new(type_table: TypeTable) -> Self {
        Self {
            type_table,
            signatures: FxHashMap::default(),
            exception_catalog: None,
            file_path: String::new(),
        }
    }

    pub fn with_signatures(mut self, signatures: FxHashMap<String, FnSignature>) -> Self {
        self.signatures = signatures;
        self
    }

    pub fn with_exception_catalog(mut self, catalog: FxHashMap<String, i64>) -> Self {
        self.exception_catalog = Some(catalog);
        self
    }

    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = file_path.into();
        self
    }

    pub fn signatures(&self) -> &FxHashMap<String, FnSignature> {
        &self.signatures
    }

    /// Check one function body. The signature, when registered, supplies the
    /// return shape, parameter types, and throw intent.
    pub fn check_function(&mut self, name: &str, block: &HBlock) -> CheckFnResult {
        self.check_function_with_params(name, block, &[])
    }

    /// Like [`Self::check_function`], seeding parameter binding types first.
    pub fn check_function_with_params(
        &mut self,
        name: &str,
        block: &HBlock,
        params: &[(BindingId, TypeId)],
    ) -> CheckFnResult {
        let sig = self.signatures.get(name).cloned();
        let mut walker = FnChecker {
            table: &mut self.type_table,
            signatures: &self.signatures,
            exception_catalog: self.exception_catalog.as_ref(),
            sig: sig.as_ref(),
            fn_name: name.to_string(),
            file_path: self.file_path.clone(),
            typed: TypedFn::default(),
            diagnostics: Vec::new(),
            effects: BTreeSet::new(),
        };
        for (binding, ty) in params {
            walker.typed.locals.insert(*binding, *ty);
        }
        walker.check_block(block);
        walker.enforce_declared_events();
        CheckFnResult {
            typed_fn: walker.typed,
            diagnostics: walker.diagnostics,
            effects: walker.effects,
        }
    }

}

struct FnChecker<'a> {
    table: &'a mut TypeTable,
    signatures: &'a FxHashMap<String, FnSignature>,
    exception_catalog: Option<&'a FxHashMap<String, i64>>,
    sig: Option<&'a FnSignature>,
    fn_name: String,
    file_path: String,
    typed: TypedFn,
    diagnostics: Vec<Diagnostic>,
    effects: BTreeSet<String>,
}

impl<'a> FnChecker<'a> {
    fn error(&mut self, code: DiagnosticCode, message: String, span: Option<drift_common::Span>) {
        self.diagnostics.push(
            Diagnostic::error(code, message)
                .with_location(self.file_path.clone(), span.unwrap_or_default()),
        );
    }

    fn dv_type(&mut self) -> TypeId {
        self.table.ensure_scalar("DiagnosticValue")
    }

    fn unknown(&mut self) -> TypeId {
        self.table.ensure_unknown()
    }

    fn is_unknown(&self, ty: TypeId) -> bool {
        self.table.kind(ty) == TypeKind::Unknown
    }

    /// Equality with Unknown acting as a wildcard so one missing type does
    /// not cascade into unrelated diagnostics.
    fn compatible(&self, a: TypeId, b: TypeId) -> bool {
        a == b || self.is_unknown(a) || self.is_unknown(b)
    }

    fn is_numeric(&mut self, ty: TypeId) -> bool {
        ty == self.table.ensure_int() || self.is_unknown(ty)
    }

    fn deref(&self, ty: TypeId) -> TypeId {
        match self.table.get(ty) {
            TypeData::Ref { inner, .. } => *inner,
            _ => ty,
        }
    }

    // --- Blocks and statements ---

    fn check_block(&mut self, block: &HBlock) {
        for stmt in &block.statements {
            self.check_stmt(stmt);
        }
    }

    fn check_stmt(&mut self, stmt: &HStmt) {
        match &stmt.kind {
            HStmtKind::Let {
                declared_type,
                value,
                binding_id,
                ..
            } => {
                let value_ty = self.check_expr(value);
                let binding_ty = match declared_type {
                    Some(expr) => match self.table.resolve_type_expr(expr) {
                        Ok(declared) => {
                            if !self.compatible(value_ty, declared) {
                                let expected = self.table.display(declared);
                                let actual = self.table.display(value_ty);
                                self.error(
                                    DiagnosticCode::TypeMismatch,
                                    format!("Expected type {expected}, got {actual}"),
                                    stmt.span,
                                );
                            }
                            declared
                        }
                        Err(err) => {
                            self.error(DiagnosticCode::TypeMismatch, err.to_string(), stmt.span);
                            value_ty
                        }
                    },
                    None => value_ty,
                };
                self.typed.locals.insert(*binding_id, binding_ty);
            }
            HStmtKind::Assign { target, value } => self.check_assign(target, value, stmt),
            HStmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                let cond_ty = self.check_expr(cond);
                let bool_ty = self.table.ensure_bool();
                if !self.compatible(cond_ty, bool_ty) {
                    self.error(
                        DiagnosticCode::TypeMismatch,
                        "if condition must be Bool".to_string(),
                        cond.span,
                    );
                }
                self.check_block(then_block);
                if let Some(else_block) = else_block {
                    self.check_block(else_block);
                }
            }
            HStmtKind::While { cond, body } => {
                let cond_ty = self.check_expr(cond);
                let bool_ty = self.table.ensure_bool();
                if !self.compatible(cond_ty, bool_ty) {
                    self.error(
                        DiagnosticCode::TypeMismatch,
                        "while condition must be Bool".to_string(),
                        cond.span,
                    );
                }
                self.check_block(body);
            }
            HStmtKind::Try { body, catches } => {
                self.check_block(body);
                self.check_catches(catches);
            }
            HStmtKind::Return { value } => {
                let value_ty = value.as_ref().map(|v| self.check_expr(v));
                if let Some(expected) = self.sig.and_then(|s| s.return_type_id) {
                    match value_ty {
                        Some(actual) => {
                            if !self.compatible(actual, expected) {
                                let expected = self.table.display(expected);
                                let actual = self.table.display(actual);
                                self.error(
                                    DiagnosticCode::InvalidReturnType,
                                    format!("Expected type {expected}, got {actual}"),
                                    stmt.span,
                                );
                            }
                        }
                        None => {
                            let unit = self.table.ensure_unit();
                            if !self.compatible(unit, expected) {
                                let expected = self.table.display(expected);
                                self.error(
                                    DiagnosticCode::InvalidReturnType,
                                    format!("Expected type {expected}, got Unit"),
                                    stmt.span,
                                );
                            }
                        }
                    }
                }
            }
            HStmtKind::Throw { value } => {
                let payload_ty = self.check_expr(value);
                let dv = self.dv_type();
                if !self.compatible(payload_ty, dv) {
                    self.error(
                        DiagnosticCode::InvalidThrowPayload,
                        "throw payload must be DiagnosticValue".to_string(),
                        value.span,
                    );
                }
                if let HExprKind::DvInit { dv_type_name, .. } = &value.kind {
                    self.effects.insert(dv_type_name.clone());
                }
                if let Some(sig) = self.sig {
                    if !sig.declared_can_throw {
                        let fn_name = self.fn_name.clone();
                        self.error(
                            DiagnosticCode::EffectViolation,
                            format!("function '{fn_name}' throws but is not declared can-throw"),
                            stmt.span,
                        );
                    }
                }
            }
            HStmtKind::ExprStmt { expr } => {
                self.check_expr(expr);
            }
            HStmtKind::Import { .. } | HStmtKind::Break | HStmtKind::Continue => {}
        }
    }

    fn check_catches(&mut self, catches: &[HCatchArm]) {
        if let Some(catalog) = self.exception_catalog {
            let known: BTreeSet<String> = catalog.keys().cloned().collect();
            let infos: Vec<CatchArmInfo> = catches
                .iter()
                .map(|arm| CatchArmInfo {
                    event: arm.event.clone(),
                    binder: arm.binder.as_ref().map(|(name, _)| name.clone()),
                    span: arm.span,
                })
                .collect();
            validate_catch_arms(&infos, &known, &mut self.diagnostics);
        }
        for arm in catches {
            if let Some((_, binding)) = &arm.binder {
                let err_ty = self.table.ensure_error();
                self.typed.locals.insert(*binding, err_ty);
            }
            self.check_block(&arm.block);
        }
    }

    fn check_assign(&mut self, target: &HExpr, value: &HExpr, stmt: &HStmt) {
        let value_ty = self.check_expr(value);
        match &target.kind {
            HExprKind::Var { binding_id, .. } => {
                let target_ty = binding_id
                    .and_then(|b| self.typed.locals.get(&b).copied())
                    .unwrap_or_else(|| self.unknown());
                self.typed.expr_types.insert(target.id, target_ty);
                if !self.compatible(target_ty, value_ty) {
                    self.error(
                        DiagnosticCode::InvalidAssignment,
                        "assignment type mismatch".to_string(),
                        stmt.span,
                    );
                }
            }
            HExprKind::Index { .. } | HExprKind::Field { .. } => {
                let target_ty = self.check_expr(target);
                if !self.compatible(target_ty, value_ty) {
                    self.error(
                        DiagnosticCode::InvalidAssignment,
                        "assignment type mismatch".to_string(),
                        stmt.span,
                    );
                }
            }
            _ => {
                self.error(
                    DiagnosticCode::InvalidAssignment,
                    "unsupported assignment target".to_string(),
                    target.span,
                );
            }
        }
    }

    // --- Expressions ---

    fn check_expr(&mut self, expr: &HExpr) -> TypeId {
        let ty = self.check_expr_kind(expr);
        self.typed.expr_types.insert(expr.id, ty);
        ty
    }

    fn check_expr_kind(&mut self, expr: &HExpr) -> TypeId {
        match &expr.kind {
            HExprKind::LiteralInt(_) => self.table.ensure_int(),
            HExprKind::LiteralBool(_) => self.table.ensure_bool(),
            HExprKind::LiteralString(_) => self.table.ensure_string(),
            HExprKind::Var { binding_id, .. } => binding_id
                .and_then(|b| self.typed.locals.get(&b).copied())
                .unwrap_or_else(|| self.unknown()),
            HExprKind::Field { subject, name } => self.check_field(subject, name, expr),
            HExprKind::Index { subject, index } => {
                let subject_ty = self.check_expr(subject);
                let subject_ty = self.deref(subject_ty);
                let index_ty = self.check_expr(index);
                let int_ty = self.table.ensure_int();
                if !self.compatible(index_ty, int_ty) {
                    self.error(
                        DiagnosticCode::InvalidIndexType,
                        "array index must be Int".to_string(),
                        index.span,
                    );
                }
                match self.table.array_element(subject_ty) {
                    Some(element) => element,
                    None if self.is_unknown(subject_ty) => self.unknown(),
                    None => {
                        let shown = self.table.display(subject_ty);
                        self.error(
                            DiagnosticCode::InvalidIndexAccess,
                            format!("indexing requires an array, got {shown}"),
                            subject.span,
                        );
                        self.unknown()
                    }
                }
            }
            HExprKind::Call {
                callee,
                args,
                kwargs,
            } => self.check_call(callee, args, kwargs, expr),
            HExprKind::MethodCall {
                receiver,
                method,
                args,
            } => self.check_method_call(receiver, method, args, expr),
            HExprKind::Unary { op, expr: operand } => {
                let operand_ty = self.check_expr(operand);
                match op {
                    UnaryOp::Neg => {
                        if !self.is_numeric(operand_ty) {
                            let shown = self.table.display(operand_ty);
                            self.error(
                                DiagnosticCode::TypeMismatch,
                                format!("Expected numeric type, got {shown}"),
                                operand.span,
                            );
                        }
                        self.table.ensure_int()
                    }
                    UnaryOp::Not => {
                        let bool_ty = self.table.ensure_bool();
                        if !self.compatible(operand_ty, bool_ty) {
                            self.error(
                                DiagnosticCode::TypeMismatch,
                                "logical not requires a Bool operand".to_string(),
                                operand.span,
                            );
                        }
                        bool_ty
                    }
                }
            }
            HExprKind::Binary { op, left, right } => self.check_binary(*op, left, right, expr),
            HExprKind::Borrow { subject, is_mut } => {
                let subject_ty = self.check_expr(subject);
                if *is_mut {
                    self.table.ensure_ref_mut(subject_ty)
                } else {
                    self.table.ensure_ref(subject_ty)
                }
            }
            HExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                let cond_ty = self.check_expr(cond);
                let bool_ty = self.table.ensure_bool();
                if !self.compatible(cond_ty, bool_ty) {
                    self.error(
                        DiagnosticCode::TypeMismatch,
                        "ternary condition must be Bool".to_string(),
                        cond.span,
                    );
                }
                let then_ty = self.check_expr(then_expr);
                let else_ty = self.check_expr(else_expr);
                if !self.compatible(then_ty, else_ty) {
                    self.error(
                        DiagnosticCode::TypeMismatch,
                        "ternary branches must have the same type".to_string(),
                        expr.span,
                    );
                }
                if self.is_unknown(then_ty) {
                    else_ty
                } else {
                    then_ty
                }
            }
            HExprKind::ArrayLiteral { elements } => {
                let mut element_ty = None;
                let mut consistent = true;
                for element in elements {
                    let ty = self.check_expr(element);
                    match element_ty {
                        None => element_ty = Some(ty),
                        Some(prev) if self.compatible(prev, ty) => {}
                        Some(_) => consistent = false,
                    }
                }
                if !consistent {
                    self.error(
                        DiagnosticCode::TypeMismatch,
                        "array literal elements do not have a consistent type".to_string(),
                        expr.span,
                    );
                }
                let element = element_ty.unwrap_or_else(|| self.unknown());
                self.table.ensure_array(element)
            }
            HExprKind::DvInit {
                args, attr_names, ..
            } => {
                let arg_types: Vec<TypeId> = args.iter().map(|a| self.check_expr(a)).collect();
                if !attr_names.is_empty() {
                    if attr_names.len() != args.len() {
                        self.error(
                            DiagnosticCode::InvalidThrowPayload,
                            "attribute names/values mismatch".to_string(),
                            expr.span,
                        );
                    } else {
                        let dv = self.dv_type();
                        for (name, ty) in attr_names.iter().zip(arg_types) {
                            if !self.compatible(ty, dv) {
                                self.error(
                                    DiagnosticCode::InvalidThrowPayload,
                                    format!("attribute '{name}' value must be DiagnosticValue"),
                                    expr.span,
                                );
                            }
                        }
                    }
                }
                self.dv_type()
            }
            HExprKind::ResultOk(value) => {
                let ok = self.check_expr(value);
                let err = self
                    .sig
                    .and_then(|s| s.error_type_id)
                    .unwrap_or_else(|| self.table.ensure_error());
                self.table.ensure_fnresult(ok, err)
            }
            HExprKind::ResultErr(value) => {
                let err_value_ty = self.check_expr(value);
                let error_ty = self.table.ensure_error();
                let dv = self.dv_type();
                if !self.compatible(err_value_ty, error_ty) && !self.compatible(err_value_ty, dv) {
                    self.error(
                        DiagnosticCode::TypeMismatch,
                        "Err payload must be an Error".to_string(),
                        value.span,
                    );
                }
                let ok = self
                    .sig
                    .and_then(|s| s.return_type_id)
                    .and_then(|rt| self.table.fnresult_parts(rt))
                    .map(|(ok, _)| ok)
                    .unwrap_or_else(|| self.unknown());
                self.table.ensure_fnresult(ok, error_ty)
            }
            HExprKind::TrySuffix(operand) => {
                let operand_ty = self.check_expr(operand);
                if let Some(sig) = self.sig {
                    if !sig.declared_can_throw {
                        let fn_name = self.fn_name.clone();
                        self.error(
                            DiagnosticCode::EffectViolation,
                            format!(
                                "function '{fn_name}' uses ? but is not declared can-throw"
                            ),
                            expr.span,
                        );
                    }
                }
                match self.table.fnresult_parts(operand_ty) {
                    Some((ok, _)) => ok,
                    None if self.is_unknown(operand_ty) => self.unknown(),
                    None => {
                        self.error(
                            DiagnosticCode::TypeMismatch,
                            "? requires a fallible call returning FnResult".to_string(),
                            operand.span,
                        );
                        self.unknown()
                    }
                }
            }
        }
    }

    fn check_field(&mut self, subject: &HExpr, name: &str, expr: &HExpr) -> TypeId {
        let subject_ty = self.check_expr(subject);
        let subject_ty = self.deref(subject_ty);
        let data = self.table.get(subject_ty).clone();
        match data {
            TypeData::Variant(inst) => {
                if name == "is_some" && inst.arm("Some").is_some() {
                    return self.table.ensure_bool();
                }
                for arm in &inst.arms {
                    if let Some(pos) = arm.field_names.iter().position(|f| f == name) {
                        return arm.field_types[pos];
                    }
                }
                let shown = self.table.display(subject_ty);
                self.error(
                    DiagnosticCode::InvalidFieldAccess,
                    format!("no field '{name}' on {shown}"),
                    expr.span,
                );
                self.unknown()
            }
            TypeData::Error => match name {
                "code" => self.table.ensure_int(),
                "message" => self.table.ensure_string(),
                _ => {
                    self.error(
                        DiagnosticCode::InvalidFieldAccess,
                        format!("no field '{name}' on Error"),
                        expr.span,
                    );
                    self.unknown()
                }
            },
            TypeData::Unknown(_) => self.unknown(),
            _ => {
                let shown = self.table.display(subject_ty);
                self.error(
                    DiagnosticCode::InvalidFieldAccess,
                    format!("no field '{name}' on {shown}"),
                    expr.span,
                );
                self.unknown()
            }
        }
    }

    fn check_call(
        &mut self,
        callee: &str,
        args: &[HExpr],
        kwargs: &[(String, HExpr)],
        expr: &HExpr,
    ) -> TypeId {
        let arg_types: Vec<TypeId> = args.iter().map(|a| self.check_expr(a)).collect();
        let Some(sig) = self.signatures.get(callee).cloned() else {
            self.error(
                DiagnosticCode::InvalidFunctionCall,
                format!("Unknown function '{callee}'"),
                expr.span,
            );
            for (_, value) in kwargs {
                self.check_expr(value);
            }
            return self.unknown();
        };

        if arg_types.len() != sig.param_type_ids.len() {
            self.error(
                DiagnosticCode::InvalidFunctionCall,
                format!(
                    "'{callee}' expects {} args, got {}",
                    sig.param_type_ids.len(),
                    arg_types.len()
                ),
                expr.span,
            );
        } else {
            for (index, (actual, expected)) in
                arg_types.iter().zip(&sig.param_type_ids).enumerate()
            {
                if !self.arg_compatible(*actual, *expected) {
                    let expected = self.table.display(*expected);
                    let actual = self.table.display(*actual);
                    self.error(
                        DiagnosticCode::InvalidFunctionCall,
                        format!(
                            "'{callee}' argument {index}: Expected type {expected}, got {actual}"
                        ),
                        args[index].span,
                    );
                }
            }
        }

        for (kw_name, value) in kwargs {
            if !sig.allowed_kwargs.iter().any(|k| k == kw_name) {
                self.error(
                    DiagnosticCode::InvalidFunctionCall,
                    format!("'{callee}' does not accept keyword '{kw_name}'"),
                    value.span,
                );
            }
            self.check_expr(value);
        }

        if let Some(events) = &sig.declared_events {
            self.effects.extend(events.iter().cloned());
        }
        sig.return_type_id.unwrap_or_else(|| self.unknown())
    }

    fn check_method_call(
        &mut self,
        receiver: &HExpr,
        method: &str,
        args: &[HExpr],
        _expr: &HExpr,
    ) -> TypeId {
        let receiver_ty = self.check_expr(receiver);
        let receiver_ty = self.deref(receiver_ty);
        let arg_types: Vec<TypeId> = args.iter().map(|a| self.check_expr(a)).collect();

        // Iterator protocol used by `for` desugaring: arrays yield an
        // Optional<element> per `next`.
        if method == "next" && args.is_empty() {
            if let Some(element) = self.table.array_element(receiver_ty) {
                if let Some(base) = self.table.schema_by_name("Optional") {
                    if let Ok(instance) = self.table.ensure_instantiated(base, vec![element]) {
                        return instance;
                    }
                }
                return self.unknown();
            }
        }

        match self.signatures.get(method).cloned() {
            Some(sig) => {
                // The receiver occupies parameter slot zero.
                let expected_arity = sig.param_type_ids.len();
                let actual_arity = arg_types.len() + 1;
                if expected_arity != actual_arity {
                    self.error(
                        DiagnosticCode::InvalidFunctionCall,
                        format!(
                            "'{method}' expects {expected_arity} args (incl. receiver), got {actual_arity}"
                        ),
                        _expr.span,
                    );
                } else {
                    let all_args: Vec<TypeId> =
                        std::iter::once(receiver_ty).chain(arg_types).collect();
                    for (index, (actual, expected)) in
                        all_args.iter().zip(&sig.param_type_ids).enumerate()
                    {
                        if !self.arg_compatible(*actual, *expected) {
                            let expected = self.table.display(*expected);
                            let actual = self.table.display(*actual);
                            self.error(
                                DiagnosticCode::InvalidFunctionCall,
                                format!(
                                    "'{method}' argument {index}: Expected type {expected}, got {actual}"
                                ),
                                _expr.span,
                            );
                        }
                    }
                }
                if let Some(events) = &sig.declared_events {
                    self.effects.extend(events.iter().cloned());
                }
                sig.return_type_id.unwrap_or_else(|| self.unknown())
            }
            None => self.unknown(),
        }
    }

    /// Argument compatibility including auto-borrow: an owned value may feed
    /// a reference-typed parameter; the checker inserts the borrow.
    fn arg_compatible(&self, actual: TypeId, expected: TypeId) -> bool {
        if self.compatible(actual, expected) {
            return true;
        }
        if let TypeData::Ref { inner, .. } = self.table.get(expected) {
            return self.compatible(actual, *inner);
        }
        false
    }

    fn check_binary(
        &mut self,
        op: BinaryOp,
        left: &HExpr,
        right: &HExpr,
        expr: &HExpr,
    ) -> TypeId {
        let left_ty = self.check_expr(left);
        let right_ty = self.check_expr(right);
        let string_ty = self.table.ensure_string();
        let bool_ty = self.table.ensure_bool();

        if op.is_arithmetic() {
            if left_ty == string_ty || right_ty == string_ty {
                if op != BinaryOp::Add
                    || !self.compatible(left_ty, string_ty)
                    || !self.compatible(right_ty, string_ty)
                {
                    self.error(
                        DiagnosticCode::TypeMismatch,
                        "string binary ops require String operands".to_string(),
                        expr.span,
                    );
                }
                return string_ty;
            }
            if !self.is_numeric(left_ty) {
                let shown = self.table.display(left_ty);
                self.error(
                    DiagnosticCode::TypeMismatch,
                    format!("Expected numeric type, got {shown}"),
                    left.span,
                );
            }
            if !self.compatible(right_ty, left_ty) {
                let expected = self.table.display(left_ty);
                let actual = self.table.display(right_ty);
                self.error(
                    DiagnosticCode::TypeMismatch,
                    format!("Expected type {expected}, got {actual}"),
                    right.span,
                );
            }
            return self.table.ensure_int();
        }

        if op.is_logical() {
            if !self.compatible(left_ty, bool_ty) || !self.compatible(right_ty, bool_ty) {
                self.error(
                    DiagnosticCode::TypeMismatch,
                    "logical operators require Bool operands".to_string(),
                    expr.span,
                );
            }
            return bool_ty;
        }

        // Comparisons.
        match op {
            BinaryOp::Eq | BinaryOp::Neq => {
                if !self.compatible(right_ty, left_ty) {
                    let expected = self.table.display(left_ty);
                    let actual = self.table.display(right_ty);
                    self.error(
                        DiagnosticCode::TypeMismatch,
                        format!("Expected type {expected}, got {actual}"),
                        right.span,
                    );
                }
            }
            _ => {
                if !self.is_numeric(left_ty) {
                    let shown = self.table.display(left_ty);
                    self.error(
                        DiagnosticCode::TypeMismatch,
                        format!("Expected numeric type, got {shown}"),
                        left.span,
                    );
                }
                if !self.compatible(right_ty, left_ty) {
                    let expected = self.table.display(left_ty);
                    let actual = self.table.display(right_ty);
                    self.error(
                        DiagnosticCode::TypeMismatch,
                        format!("Expected type {expected}, got {actual}"),
                        right.span,
                    );
                }
            }
        }
        bool_ty
    }

    /// Declared thrown events must cover everything the body can raise.
    fn enforce_declared_events(&mut self) {
        let Some(sig) = self.sig else { return };
        let Some(declared) = &sig.declared_events else {
            return;
        };
        let undeclared: Vec<&String> = self.effects.difference(declared).collect();
        if !undeclared.is_empty() {
            let diff = undeclared
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let declared_list = declared
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let fn_name = self.fn_name.clone();
            self.error(
                DiagnosticCode::EffectViolation,
                format!(
                    "function '{fn_name}' may throw {{ {diff} }} but only declares [{declared_list}]"
                ),
                sig_span(self.sig),
            );
        }
    }
}

fn sig_span(_sig: Option<&FnSignature>) -> Option<drift_common::Span> {
    None
}
