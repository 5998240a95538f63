//! # HIR → MIR Lowering
//!
//! Lowers sugar-free HIR into explicit instructions and basic blocks:
//!
//! - `if` becomes a `CondBr` whose branches join at a continuation block
//! - `while` becomes a header block with a `CondBr` to body or exit
//! - `try`/`catch` routes raises and fallible-call error edges to a handler
//!   block that receives the error as a block argument and dispatches on
//!   the event discriminant; fall-through continues in a `try_cont` block
//! - `expr?` expands to a `CondBr` on the carrier's `is_err` discriminant
//!   with an Err-forwarding return on the error path
//! - ternaries produce a join block with a typed block parameter
//!
//! Operations produce value names; statements produce side effects
//! (`StoreLocal` or `Construct*`). Field assignment has no MIR
//! counterpart and is rejected.

use drift_common::{Literal, TypeId, TypeTable};
use drift_compiler_hir::{HBlock, HCatchArm, HExpr, HExprKind, HStmt, HStmtKind};
use drift_compiler_semantic::{FnInfo, TypedFn};
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::basic_block::BlockParam;
use crate::instruction::Instruction;
use crate::terminator::{Edge, Terminator};
use crate::MirBuilder;
use crate::{MirFunction, ValueId};

#[derive(Debug, Error)]
pub enum LoweringError {
    #[error("no MIR lowering for {0}")]
    Unsupported(String),
    #[error("break/continue outside of a loop")]
    LoopContextMissing,
}

struct LoopCtx {
    header: String,
    exit: String,
}

/// Lower checked HIR into MIR.
pub struct HirToMir<'a> {
    b: MirBuilder,
    table: &'a mut TypeTable,
    typed: Option<&'a TypedFn>,
    fn_infos: &'a FxHashMap<String, FnInfo>,
    exception_catalog: FxHashMap<String, i64>,
    loop_stack: Vec<LoopCtx>,
    handler_stack: Vec<String>,
}

impl<'a> HirToMir<'a> {
    pub fn new(
        builder: MirBuilder,
        table: &'a mut TypeTable,
        fn_infos: &'a FxHashMap<String, FnInfo>,
    ) -> Self {
        Self {
            b: builder,
            table,
            typed: None,
            fn_infos,
            exception_catalog: FxHashMap::default(),
            loop_stack: Vec::new(),
            handler_stack: Vec::new(),
        }
    }

    pub fn with_typed_fn(mut self, typed: &'a TypedFn) -> Self {
        self.typed = Some(typed);
        self
    }

    pub fn with_exception_catalog(mut self, catalog: FxHashMap<String, i64>) -> Self {
        self.exception_catalog = catalog;
        self
    }

    /// Lower a whole function body. Parameters are storage-backed locals
    /// seeded by the caller; a missing trailing terminator becomes a bare
    /// return.
    pub fn lower_function(
        mut self,
        params: Vec<(String, TypeId)>,
        body: &HBlock,
    ) -> Result<MirFunction, LoweringError> {
        for (name, ty) in &params {
            self.b.ensure_local(name, Some(*ty));
        }
        self.b.func.params = params;
        self.lower_block(body)?;
        if !self.b.current_is_terminated() {
            self.b.set_terminator(Terminator::Return { value: None });
        }
        Ok(self.b.func)
    }

    /// Lower a block into the current insertion point (exposed for tests).
    pub fn lower_block(&mut self, block: &HBlock) -> Result<(), LoweringError> {
        for stmt in &block.statements {
            self.lower_stmt(stmt)?;
            if self.b.current_is_terminated() {
                // Statements after a terminator are unreachable.
                break;
            }
        }
        Ok(())
    }

    pub fn into_function(self) -> MirFunction {
        self.b.func
    }

    // --- Statements ---

    fn lower_stmt(&mut self, stmt: &HStmt) -> Result<(), LoweringError> {
        match &stmt.kind {
            HStmtKind::Let {
                name,
                value,
                binding_id,
                ..
            } => {
                let ty = self
                    .typed
                    .and_then(|t| t.locals.get(binding_id).copied());
                self.b.ensure_local(name, ty);
                let value = self.lower_expr(value)?;
                self.b.emit(Instruction::StoreLocal {
                    local: name.clone(),
                    value,
                });
                Ok(())
            }
            HStmtKind::Assign { target, value } => self.lower_assign(target, value),
            HStmtKind::If {
                cond,
                then_block,
                else_block,
            } => self.lower_if(cond, then_block, else_block.as_ref()),
            HStmtKind::While { cond, body } => self.lower_while(cond, body),
            HStmtKind::Try { body, catches } => self.lower_try(body, catches),
            HStmtKind::Return { value } => {
                let value = value
                    .as_ref()
                    .map(|v| self.lower_expr(v))
                    .transpose()?;
                self.b.set_terminator(Terminator::Return { value });
                Ok(())
            }
            HStmtKind::Throw { value } => {
                let error = self.lower_error_value(value)?;
                match self.handler_stack.last().cloned() {
                    Some(handler) => {
                        self.b.set_terminator(Terminator::Br {
                            edge: Edge::with_args(handler, vec![error]),
                        });
                    }
                    None => self.b.set_terminator(Terminator::Raise { error }),
                }
                Ok(())
            }
            HStmtKind::ExprStmt { expr } => {
                self.lower_expr(expr)?;
                Ok(())
            }
            HStmtKind::Import { .. } => Ok(()),
            HStmtKind::Break => {
                let exit = self
                    .loop_stack
                    .last()
                    .map(|l| l.exit.clone())
                    .ok_or(LoweringError::LoopContextMissing)?;
                self.b.set_terminator(Terminator::br(exit));
                Ok(())
            }
            HStmtKind::Continue => {
                let header = self
                    .loop_stack
                    .last()
                    .map(|l| l.header.clone())
                    .ok_or(LoweringError::LoopContextMissing)?;
                self.b.set_terminator(Terminator::br(header));
                Ok(())
            }
        }
    }

    fn lower_assign(&mut self, target: &HExpr, value: &HExpr) -> Result<(), LoweringError> {
        let value = self.lower_expr(value)?;
        match &target.kind {
            HExprKind::Var { name, .. } => {
                self.b.ensure_local(name, None);
                self.b.emit(Instruction::StoreLocal {
                    local: name.clone(),
                    value,
                });
                Ok(())
            }
            HExprKind::Index { subject, index } => {
                let base = self.lower_expr(subject)?;
                let index = self.lower_expr(index)?;
                self.b.emit(Instruction::ArraySet { base, index, value });
                Ok(())
            }
            other => Err(LoweringError::Unsupported(format!(
                "assignment target {other:?}"
            ))),
        }
    }

    fn lower_if(
        &mut self,
        cond: &HExpr,
        then_block: &HBlock,
        else_block: Option<&HBlock>,
    ) -> Result<(), LoweringError> {
        let cond = self.lower_expr(cond)?;
        let then_name = self.b.new_block("then");
        let else_name = self.b.new_block("else");
        let join_name = self.b.new_block("join");

        self.b.set_terminator(Terminator::CondBr {
            cond,
            then_edge: Edge::new(then_name.clone()),
            else_edge: Edge::new(else_name.clone()),
        });

        self.b.switch_to(&then_name);
        self.lower_block(then_block)?;
        let then_falls = !self.b.current_is_terminated();
        self.b.set_terminator(Terminator::br(join_name.clone()));

        self.b.switch_to(&else_name);
        if let Some(else_block) = else_block {
            self.lower_block(else_block)?;
        }
        let else_falls = !self.b.current_is_terminated();
        self.b.set_terminator(Terminator::br(join_name.clone()));

        if then_falls || else_falls {
            self.b.switch_to(&join_name);
        } else {
            // Both branches left the function; the join is unreachable.
            self.b.remove_block(&join_name);
            self.b.switch_to(&then_name);
        }
        Ok(())
    }

    fn lower_while(&mut self, cond: &HExpr, body: &HBlock) -> Result<(), LoweringError> {
        let header = self.b.new_block("loop_header");
        let body_name = self.b.new_block("loop_body");
        let exit = self.b.new_block("loop_exit");

        self.b.set_terminator(Terminator::br(header.clone()));

        self.b.switch_to(&header);
        let cond = self.lower_expr(cond)?;
        self.b.set_terminator(Terminator::CondBr {
            cond,
            then_edge: Edge::new(body_name.clone()),
            else_edge: Edge::new(exit.clone()),
        });

        self.loop_stack.push(LoopCtx {
            header: header.clone(),
            exit: exit.clone(),
        });
        self.b.switch_to(&body_name);
        self.lower_block(body)?;
        self.b.set_terminator(Terminator::br(header.clone()));
        self.loop_stack.pop();

        self.b.switch_to(&exit);
        Ok(())
    }

    fn lower_try(&mut self, body: &HBlock, catches: &[HCatchArm]) -> Result<(), LoweringError> {
        let error_ty = self.table.ensure_error();
        // The handler's error parameter shares the temp namespace so nested
        // try blocks never collide.
        let err_value: ValueId = self.b.new_temp();
        let handler = self
            .b
            .new_block_with_params("handler", vec![BlockParam::new(err_value.clone(), error_ty)]);
        let cont = self.b.new_block("try_cont");

        self.handler_stack.push(handler.clone());
        self.lower_block(body)?;
        let mut cont_reachable = !self.b.current_is_terminated();
        self.b.set_terminator(Terminator::br(cont.clone()));
        self.handler_stack.pop();

        // Handler: dispatch on the event discriminant.
        self.b.switch_to(&handler);
        let mut catch_all: Option<&HCatchArm> = None;
        let int_ty = self.table.ensure_int();

        let mut arm_blocks: Vec<(String, &HCatchArm)> = Vec::new();
        for arm in catches {
            if arm.event.is_none() {
                catch_all = Some(arm);
            } else {
                let name = self.b.new_block("catch");
                arm_blocks.push((name, arm));
            }
        }

        for (arm_block, arm) in &arm_blocks {
            let event = arm.event.as_deref().expect("dispatched arms are named");
            let discriminant = self.exception_catalog.get(event).copied().unwrap_or(0);
            let code = {
                let dest = self.b.new_temp();
                self.b.emit(Instruction::FieldGet {
                    dest: dest.clone(),
                    base: err_value.clone(),
                    field: "code".to_string(),
                });
                dest
            };
            let expected = {
                let dest = self.b.new_temp();
                self.b.emit(Instruction::Const {
                    dest: dest.clone(),
                    value: Literal::Int(discriminant),
                    ty: int_ty,
                });
                dest
            };
            let matches = self.b.new_temp();
            self.b.emit(Instruction::BinaryOp {
                dest: matches.clone(),
                op: crate::BinOp::Eq,
                left: code,
                right: expected,
            });
            let next_check = self.b.new_block("dispatch");
            self.b.set_terminator(Terminator::CondBr {
                cond: matches,
                then_edge: Edge::new(arm_block.clone()),
                else_edge: Edge::new(next_check.clone()),
            });
            self.b.switch_to(&next_check);
        }

        // No arm matched: run the catch-all or rethrow.
        match catch_all {
            Some(arm) => cont_reachable |= self.lower_catch_arm(arm, &err_value, &cont)?,
            None => self.b.set_terminator(Terminator::Raise {
                error: err_value.clone(),
            }),
        }

        for (arm_block, arm) in arm_blocks {
            self.b.switch_to(&arm_block);
            cont_reachable |= self.lower_catch_arm(arm, &err_value, &cont)?;
        }

        if cont_reachable {
            self.b.switch_to(&cont);
        } else {
            // Every path out of the try leaves the function.
            self.b.remove_block(&cont);
            self.b.switch_to(&handler);
        }
        Ok(())
    }

    /// Returns whether the arm falls through into the continuation.
    fn lower_catch_arm(
        &mut self,
        arm: &HCatchArm,
        err_value: &ValueId,
        cont: &str,
    ) -> Result<bool, LoweringError> {
        if let Some((name, _)) = &arm.binder {
            self.b.ensure_local(name, None);
            self.b.emit(Instruction::StoreLocal {
                local: name.clone(),
                value: err_value.clone(),
            });
        }
        self.lower_block(&arm.block)?;
        let falls = !self.b.current_is_terminated();
        self.b.set_terminator(Terminator::br(cont.to_string()));
        Ok(falls)
    }

    // --- Expressions ---

    fn expr_type(&self, expr: &HExpr) -> Option<TypeId> {
        self.typed.and_then(|t| t.expr_types.get(&expr.id).copied())
    }

    fn lower_expr(&mut self, expr: &HExpr) -> Result<ValueId, LoweringError> {
        match &expr.kind {
            HExprKind::LiteralInt(value) => {
                let ty = self.table.ensure_int();
                let dest = self.b.new_temp();
                self.b.emit(Instruction::Const {
                    dest: dest.clone(),
                    value: Literal::Int(*value),
                    ty,
                });
                Ok(dest)
            }
            HExprKind::LiteralBool(value) => {
                let ty = self.table.ensure_bool();
                let dest = self.b.new_temp();
                self.b.emit(Instruction::Const {
                    dest: dest.clone(),
                    value: Literal::Bool(*value),
                    ty,
                });
                Ok(dest)
            }
            HExprKind::LiteralString(value) => {
                let ty = self.table.ensure_string();
                let dest = self.b.new_temp();
                self.b.emit(Instruction::Const {
                    dest: dest.clone(),
                    value: Literal::Str(value.clone()),
                    ty,
                });
                Ok(dest)
            }
            HExprKind::Var { name, .. } => {
                self.b.ensure_local(name, None);
                let dest = self.b.new_temp();
                self.b.emit(Instruction::LoadLocal {
                    dest: dest.clone(),
                    local: name.clone(),
                });
                Ok(dest)
            }
            HExprKind::Field { subject, name } => {
                let base = self.lower_expr(subject)?;
                let dest = self.b.new_temp();
                self.b.emit(Instruction::FieldGet {
                    dest: dest.clone(),
                    base,
                    field: name.clone(),
                });
                Ok(dest)
            }
            HExprKind::Index { subject, index } => {
                let base = self.lower_expr(subject)?;
                let index = self.lower_expr(index)?;
                let dest = self.b.new_temp();
                self.b.emit(Instruction::ArrayGet {
                    dest: dest.clone(),
                    base,
                    index,
                });
                Ok(dest)
            }
            HExprKind::Call { callee, args, kwargs } => {
                if !kwargs.is_empty() {
                    return Err(LoweringError::Unsupported(
                        "keyword arguments in MIR calls".to_string(),
                    ));
                }
                let args = args
                    .iter()
                    .map(|a| self.lower_expr(a))
                    .collect::<Result<Vec<_>, _>>()?;
                self.emit_call(callee, args)
            }
            HExprKind::MethodCall {
                receiver,
                method,
                args,
            } => {
                let mut all_args = vec![self.lower_expr(receiver)?];
                for arg in args {
                    all_args.push(self.lower_expr(arg)?);
                }
                self.emit_call(method, all_args)
            }
            HExprKind::Unary { op, expr: operand } => {
                let operand = self.lower_expr(operand)?;
                let dest = self.b.new_temp();
                self.b.emit(Instruction::UnaryOp {
                    dest: dest.clone(),
                    op: (*op).into(),
                    operand,
                });
                Ok(dest)
            }
            HExprKind::Binary { op, left, right } => {
                let left = self.lower_expr(left)?;
                let right = self.lower_expr(right)?;
                let dest = self.b.new_temp();
                self.b.emit(Instruction::BinaryOp {
                    dest: dest.clone(),
                    op: (*op).into(),
                    left,
                    right,
                });
                Ok(dest)
            }
            HExprKind::Borrow { subject, .. } => match &subject.kind {
                HExprKind::Var { name, .. } => {
                    self.b.ensure_local(name, None);
                    let dest = self.b.new_temp();
                    self.b.emit(Instruction::AddrOfLocal {
                        dest: dest.clone(),
                        local: name.clone(),
                    });
                    Ok(dest)
                }
                _ => self.lower_expr(subject),
            },
            HExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                let result_ty = self
                    .expr_type(expr)
                    .unwrap_or_else(|| self.table.ensure_unknown());
                let cond = self.lower_expr(cond)?;
                let then_name = self.b.new_block("tern_then");
                let else_name = self.b.new_block("tern_else");
                // The join's parameter shares the temp namespace so it stays
                // unique within the function.
                let param_name = self.b.new_temp();
                let join_name = self.b.new_block_with_params(
                    "tern_join",
                    vec![BlockParam::new(param_name.clone(), result_ty)],
                );

                self.b.set_terminator(Terminator::CondBr {
                    cond,
                    then_edge: Edge::new(then_name.clone()),
                    else_edge: Edge::new(else_name.clone()),
                });

                self.b.switch_to(&then_name);
                let then_value = self.lower_expr(then_expr)?;
                self.b.set_terminator(Terminator::Br {
                    edge: Edge::with_args(join_name.clone(), vec![then_value]),
                });

                self.b.switch_to(&else_name);
                let else_value = self.lower_expr(else_expr)?;
                self.b.set_terminator(Terminator::Br {
                    edge: Edge::with_args(join_name.clone(), vec![else_value]),
                });

                self.b.switch_to(&join_name);
                Ok(param_name)
            }
            HExprKind::ArrayLiteral { elements } => {
                let element_ty = self
                    .expr_type(expr)
                    .and_then(|ty| self.table.array_element(ty))
                    .unwrap_or_else(|| self.table.ensure_unknown());
                let elements = elements
                    .iter()
                    .map(|e| self.lower_expr(e))
                    .collect::<Result<Vec<_>, _>>()?;
                let dest = self.b.new_temp();
                self.b.emit(Instruction::ArrayInit {
                    dest: dest.clone(),
                    element_ty,
                    elements,
                });
                Ok(dest)
            }
            HExprKind::DvInit { dv_type_name, .. } => {
                self.lower_construct_error(dv_type_name)
            }
            HExprKind::ResultOk(value) => {
                let value = self.lower_expr(value)?;
                let dest = self.b.new_temp();
                self.b.emit(Instruction::ConstructResultOk {
                    dest: dest.clone(),
                    value,
                });
                Ok(dest)
            }
            HExprKind::ResultErr(value) => {
                let error = self.lower_error_value(value)?;
                let dest = self.b.new_temp();
                self.b.emit(Instruction::ConstructResultErr {
                    dest: dest.clone(),
                    error,
                });
                Ok(dest)
            }
            HExprKind::TrySuffix(operand) => self.lower_try_suffix(operand),
        }
    }

    /// Lower a value used where an Error is required. `DvInit` constructs
    /// the Error directly; everything else lowers as-is.
    fn lower_error_value(&mut self, expr: &HExpr) -> Result<ValueId, LoweringError> {
        match &expr.kind {
            HExprKind::DvInit { dv_type_name, .. } => self.lower_construct_error(dv_type_name),
            _ => self.lower_expr(expr),
        }
    }

    fn lower_construct_error(&mut self, event: &str) -> Result<ValueId, LoweringError> {
        let int_ty = self.table.ensure_int();
        let discriminant = self.exception_catalog.get(event).copied().unwrap_or(0);
        let code = self.b.new_temp();
        self.b.emit(Instruction::Const {
            dest: code.clone(),
            value: Literal::Int(discriminant),
            ty: int_ty,
        });
        let dest = self.b.new_temp();
        self.b.emit(Instruction::ConstructError {
            dest: dest.clone(),
            code,
            event: Some(event.to_string()),
        });
        Ok(dest)
    }

    /// Emit a call. Inside a `try`, fallible callees carry an error edge to
    /// the active handler; the call is then the final instruction of its
    /// block and the terminator continues to the normal target.
    fn emit_call(&mut self, callee: &str, args: Vec<ValueId>) -> Result<ValueId, LoweringError> {
        let callee_can_throw = self
            .fn_infos
            .get(callee)
            .is_some_and(|info| info.declared_can_throw);
        let dest = self.b.new_temp();

        match self.handler_stack.last().cloned() {
            Some(handler) if callee_can_throw => {
                let cont = self.b.new_block("call_cont");
                self.b.emit(Instruction::Call {
                    dest: dest.clone(),
                    callee: callee.to_string(),
                    args,
                    normal: Some(Edge::new(cont.clone())),
                    error: Some(Edge::new(handler)),
                });
                self.b.set_terminator(Terminator::br(cont.clone()));
                self.b.switch_to(&cont);
            }
            _ => {
                self.b.emit(Instruction::Call {
                    dest: dest.clone(),
                    callee: callee.to_string(),
                    args,
                    normal: None,
                    error: None,
                });
            }
        }
        Ok(dest)
    }

    /// Expand `operand?`:
    ///
    /// ```text
    ///   t = <operand>            ; the result carrier
    ///   d = t.is_err
    ///   cond_br d, try_err_N(t), try_ok_N(t)
    /// try_err_N(c1):
    ///   e = c1.err
    ///   r = result_err e
    ///   return r
    /// try_ok_N(c2):
    ///   v = c2.ok                ; expression value continues here
    /// ```
    ///
    /// The carrier travels over the edges as a block argument so every use
    /// is defined on the path that reaches it.
    fn lower_try_suffix(&mut self, operand: &HExpr) -> Result<ValueId, LoweringError> {
        let carrier_ty = self
            .expr_type(operand)
            .unwrap_or_else(|| self.table.ensure_unknown());
        let carrier = self.lower_expr(operand)?;
        let is_err = self.b.new_temp();
        self.b.emit(Instruction::FieldGet {
            dest: is_err.clone(),
            base: carrier.clone(),
            field: "is_err".to_string(),
        });

        let err_param = self.b.new_temp();
        let err_name = self
            .b
            .new_block_with_params("try_err", vec![BlockParam::new(err_param.clone(), carrier_ty)]);
        let ok_param = self.b.new_temp();
        let ok_name = self
            .b
            .new_block_with_params("try_ok", vec![BlockParam::new(ok_param.clone(), carrier_ty)]);
        self.b.set_terminator(Terminator::CondBr {
            cond: is_err,
            then_edge: Edge::with_args(err_name.clone(), vec![carrier.clone()]),
            else_edge: Edge::with_args(ok_name.clone(), vec![carrier]),
        });

        self.b.switch_to(&err_name);
        let err = self.b.new_temp();
        self.b.emit(Instruction::FieldGet {
            dest: err.clone(),
            base: err_param,
            field: "err".to_string(),
        });
        let forwarded = self.b.new_temp();
        self.b.emit(Instruction::ConstructResultErr {
            dest: forwarded.clone(),
            error: err,
        });
        self.b.set_terminator(Terminator::Return {
            value: Some(forwarded),
        });

        self.b.switch_to(&ok_name);
        let ok = self.b.new_temp();
        self.b.emit(Instruction::FieldGet {
            dest: ok.clone(),
            base: ok_param,
            field: "ok".to_string(),
        });
        Ok(ok)
    }
}
