//! # AST → HIR Lowering
//!
//! Produces sugar-free HIR from the parser contract AST:
//! - resolves every name to a `BindingId` through arena-allocated scope
//!   records (lookup climbs parent indices, never references)
//! - expands `for x in e { .. }` into the iterator protocol
//! - turns `&x` / `&mut x` into explicit `Borrow` nodes
//! - splits method-call sugar (`recv.m(..)`) from plain calls
//!
//! Unresolved names are reported as diagnostics; lowering continues so the
//! checker can accumulate further findings.

use drift_compiler_diagnostics::{Diagnostic, DiagnosticCode};
use drift_common::Span;
use rustc_hash::FxHashMap;

use crate::ast;
use crate::nodes::{
    BinaryOp, BindingId, FnDecl, HBlock, HCatchArm, HExpr, HExprKind, HParam, HStmt, HStmtKind,
    HirExprId, LoweredFunction, LoweredModule, UnaryOp,
};

/// Allocates HIR identities. Also used directly by tests that build HIR by
/// hand.
#[derive(Debug, Default)]
pub struct HirBuilder {
    next_expr: u32,
    next_binding: u32,
}

impl HirBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_binding(&mut self) -> BindingId {
        let id = BindingId::from_raw(self.next_binding);
        self.next_binding += 1;
        id
    }

    pub fn expr(&mut self, kind: HExprKind, span: Option<Span>) -> HExpr {
        let id = HirExprId::from_raw(self.next_expr);
        self.next_expr += 1;
        HExpr { id, span, kind }
    }

    pub fn lit_int(&mut self, value: i64) -> HExpr {
        self.expr(HExprKind::LiteralInt(value), None)
    }

    pub fn lit_bool(&mut self, value: bool) -> HExpr {
        self.expr(HExprKind::LiteralBool(value), None)
    }

    pub fn lit_string(&mut self, value: &str) -> HExpr {
        self.expr(HExprKind::LiteralString(value.to_string()), None)
    }

    pub fn var(&mut self, name: &str, binding_id: Option<BindingId>) -> HExpr {
        self.expr(
            HExprKind::Var {
                name: name.to_string(),
                binding_id,
            },
            None,
        )
    }

    pub fn borrow(&mut self, subject: HExpr, is_mut: bool) -> HExpr {
        self.expr(
            HExprKind::Borrow {
                subject: Box::new(subject),
                is_mut,
            },
            None,
        )
    }
}

/// One lexical scope in the arena. Lookup climbs `parent` indices.
#[derive(Debug)]
struct ScopeRecord {
    parent: Option<usize>,
    bindings: FxHashMap<String, BindingId>,
}

/// Lowers parser AST into HIR.
pub struct AstToHir {
    builder: HirBuilder,
    scopes: Vec<ScopeRecord>,
    current: usize,
    diagnostics: Vec<Diagnostic>,
    file_path: String,
    hidden_counter: u32,
}

impl AstToHir {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            builder: HirBuilder::new(),
            scopes: vec![ScopeRecord {
                parent: None,
                bindings: FxHashMap::default(),
            }],
            current: 0,
            diagnostics: Vec::new(),
            file_path: file_path.into(),
            hidden_counter: 0,
        }
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Lower a whole module in declaration order.
    pub fn lower_module(&mut self, module: &ast::Module) -> LoweredModule {
        let functions = module
            .functions
            .iter()
            .map(|f| self.lower_function(f))
            .collect();
        LoweredModule {
            name: module.name.clone(),
            exports: module.exports.clone(),
            functions,
        }
    }

    pub fn lower_function(&mut self, func: &ast::FunctionDef) -> LoweredFunction {
        let scope = self.enter_scope();
        let params = func
            .params
            .iter()
            .map(|p| HParam {
                name: p.name.clone(),
                type_expr: p.type_expr.clone(),
                binding_id: self.define(&p.name),
                mutable: p.mutable,
            })
            .collect();
        let body = self.lower_block(&func.body);
        self.exit_scope(scope);

        LoweredFunction {
            decl: FnDecl {
                name: func.name.clone(),
                params,
                return_type: func.return_type.clone(),
                throws: func.throws.clone(),
                span: func.loc,
            },
            body,
        }
    }

    pub fn lower_block(&mut self, stmts: &[ast::Stmt]) -> HBlock {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            self.lower_stmt(stmt, &mut out);
        }
        HBlock::new(out)
    }

    fn lower_scoped_block(&mut self, stmts: &[ast::Stmt]) -> HBlock {
        let scope = self.enter_scope();
        let block = self.lower_block(stmts);
        self.exit_scope(scope);
        block
    }

    // --- Scopes ---

    fn enter_scope(&mut self) -> usize {
        self.scopes.push(ScopeRecord {
            parent: Some(self.current),
            bindings: FxHashMap::default(),
        });
        let id = self.scopes.len() - 1;
        self.current = id;
        id
    }

    fn exit_scope(&mut self, id: usize) {
        debug_assert_eq!(self.current, id);
        self.current = self.scopes[id].parent.unwrap_or(0);
    }

    fn define(&mut self, name: &str) -> BindingId {
        let id = self.builder.fresh_binding();
        self.scopes[self.current]
            .bindings
            .insert(name.to_string(), id);
        id
    }

    fn lookup(&self, name: &str) -> Option<BindingId> {
        let mut index = Some(self.current);
        while let Some(i) = index {
            if let Some(id) = self.scopes[i].bindings.get(name) {
                return Some(*id);
            }
            index = self.scopes[i].parent;
        }
        None
    }

    fn hidden_name(&mut self, prefix: &str) -> String {
        self.hidden_counter += 1;
        format!("__{prefix}{}", self.hidden_counter)
    }

    // --- Statements ---

    fn lower_stmt(&mut self, stmt: &ast::Stmt, out: &mut Vec<HStmt>) {
        match stmt {
            ast::Stmt::Let {
                name,
                type_expr,
                value,
                mutable,
                loc,
            } => {
                // Initializer resolves in the enclosing scope, before the
                // binding becomes visible.
                let value = self.lower_expr(value);
                let binding_id = self.define(name);
                out.push(HStmt {
                    span: *loc,
                    kind: HStmtKind::Let {
                        name: name.clone(),
                        declared_type: type_expr.clone(),
                        value,
                        binding_id,
                        mutable: *mutable,
                    },
                });
            }
            ast::Stmt::Assign { target, value, loc } => {
                let target = self.lower_expr(target);
                let value = self.lower_expr(value);
                out.push(HStmt {
                    span: *loc,
                    kind: HStmtKind::Assign { target, value },
                });
            }
            ast::Stmt::If {
                cond,
                then_block,
                else_block,
                loc,
            } => {
                let cond = self.lower_expr(cond);
                let then_block = self.lower_scoped_block(then_block);
                let else_block = if else_block.is_empty() {
                    None
                } else {
                    Some(self.lower_scoped_block(else_block))
                };
                out.push(HStmt {
                    span: *loc,
                    kind: HStmtKind::If {
                        cond,
                        then_block,
                        else_block,
                    },
                });
            }
            ast::Stmt::While { cond, body, loc } => {
                let cond = self.lower_expr(cond);
                let body = self.lower_scoped_block(body);
                out.push(HStmt {
                    span: *loc,
                    kind: HStmtKind::While { cond, body },
                });
            }
            ast::Stmt::For {
                iter_var,
                iterable,
                body,
                loc,
            } => self.lower_for(iter_var, iterable, body, *loc, out),
            ast::Stmt::Try { body, catches, loc } => {
                let body = self.lower_scoped_block(body);
                let catches = catches
                    .iter()
                    .map(|arm| {
                        let scope = self.enter_scope();
                        let binder = arm
                            .binder
                            .as_ref()
                            .map(|name| (name.clone(), self.define(name)));
                        let block = self.lower_block(&arm.block);
                        self.exit_scope(scope);
                        HCatchArm {
                            event: arm.event.clone(),
                            binder,
                            block,
                            span: arm.loc,
                        }
                    })
                    .collect();
                out.push(HStmt {
                    span: *loc,
                    kind: HStmtKind::Try { body, catches },
                });
            }
            ast::Stmt::Return { value, loc } => {
                let value = value.as_ref().map(|v| self.lower_expr(v));
                out.push(HStmt {
                    span: *loc,
                    kind: HStmtKind::Return { value },
                });
            }
            ast::Stmt::Throw { value, loc } => {
                let value = self.lower_expr(value);
                out.push(HStmt {
                    span: *loc,
                    kind: HStmtKind::Throw { value },
                });
            }
            ast::Stmt::Expr { expr, loc } => {
                let expr = self.lower_expr(expr);
                out.push(HStmt {
                    span: *loc,
                    kind: HStmtKind::ExprStmt { expr },
                });
            }
            ast::Stmt::Import { path, loc } => {
                out.push(HStmt {
                    span: *loc,
                    kind: HStmtKind::Import { path: path.clone() },
                });
            }
            ast::Stmt::Break { loc } => out.push(HStmt {
                span: *loc,
                kind: HStmtKind::Break,
            }),
            ast::Stmt::Continue { loc } => out.push(HStmt {
                span: *loc,
                kind: HStmtKind::Continue,
            }),
        }
    }

    /// Expand `for x in e { body }` into the iterator protocol:
    ///
    /// ```text
    /// let __iterN = e;
    /// while true {
    ///     let __nextN = __iterN.next();
    ///     if __nextN.is_some {
    ///         let x = __nextN.value;   // Some payload
    ///         body
    ///     } else {
    ///         break;
    ///     }
    /// }
    /// ```
    ///
    /// `is_some` reads the optional arm discriminant and `value` the `Some`
    /// payload field of the prelude `Optional<T>` variant.
    fn lower_for(
        &mut self,
        iter_var: &str,
        iterable: &ast::Expr,
        body: &[ast::Stmt],
        loc: Option<Span>,
        out: &mut Vec<HStmt>,
    ) {
        let iter_name = self.hidden_name("iter");
        let next_name = self.hidden_name("next");

        let iterable = self.lower_expr(iterable);
        let iter_binding = self.define(&iter_name);
        out.push(HStmt {
            span: loc,
            kind: HStmtKind::Let {
                name: iter_name.clone(),
                declared_type: None,
                value: iterable,
                binding_id: iter_binding,
                mutable: true,
            },
        });

        let loop_scope = self.enter_scope();

        let iter_var_expr = self.builder.var(&iter_name, Some(iter_binding));
        let next_call = self.builder.expr(
            HExprKind::MethodCall {
                receiver: Box::new(iter_var_expr),
                method: "next".to_string(),
                args: Vec::new(),
            },
            loc,
        );
        let next_binding = self.define(&next_name);
        let next_let = HStmt {
            span: loc,
            kind: HStmtKind::Let {
                name: next_name.clone(),
                declared_type: None,
                value: next_call,
                binding_id: next_binding,
                mutable: false,
            },
        };

        let next_var = self.builder.var(&next_name, Some(next_binding));
        let is_some = self.builder.expr(
            HExprKind::Field {
                subject: Box::new(next_var),
                name: "is_some".to_string(),
            },
            loc,
        );

        // Then-branch: bind the payload and run the body.
        let then_scope = self.enter_scope();
        let next_var2 = self.builder.var(&next_name, Some(next_binding));
        let payload = self.builder.expr(
            HExprKind::Field {
                subject: Box::new(next_var2),
                name: "value".to_string(),
            },
            loc,
        );
        let item_binding = self.define(iter_var);
        let mut then_stmts = vec![HStmt {
            span: loc,
            kind: HStmtKind::Let {
                name: iter_var.to_string(),
                declared_type: None,
                value: payload,
                binding_id: item_binding,
                mutable: false,
            },
        }];
        for stmt in body {
            self.lower_stmt(stmt, &mut then_stmts);
        }
        self.exit_scope(then_scope);

        let else_block = HBlock::new(vec![HStmt {
            span: loc,
            kind: HStmtKind::Break,
        }]);

        let loop_body = HBlock::new(vec![
            next_let,
            HStmt {
                span: loc,
                kind: HStmtKind::If {
                    cond: is_some,
                    then_block: HBlock::new(then_stmts),
                    else_block: Some(else_block),
                },
            },
        ]);
        self.exit_scope(loop_scope);

        let cond = self.builder.lit_bool(true);
        out.push(HStmt {
            span: loc,
            kind: HStmtKind::While { cond, body: loop_body },
        });
    }

    // --- Expressions ---

    pub fn lower_expr(&mut self, expr: &ast::Expr) -> HExpr {
        match expr {
            ast::Expr::Literal { value, loc } => {
                let kind = match value {
                    drift_common::Literal::Int(v) => HExprKind::LiteralInt(*v),
                    drift_common::Literal::Bool(v) => HExprKind::LiteralBool(*v),
                    drift_common::Literal::Str(v) => HExprKind::LiteralString(v.clone()),
                };
                self.builder.expr(kind, *loc)
            }
            ast::Expr::Name { ident, loc } => {
                let binding_id = self.lookup(ident);
                if binding_id.is_none() {
                    self.diagnostics.push(
                        Diagnostic::undeclared_variable(ident, loc.unwrap_or_default())
                            .with_location(self.file_path.clone(), loc.unwrap_or_default()),
                    );
                }
                self.builder.expr(
                    HExprKind::Var {
                        name: ident.clone(),
                        binding_id,
                    },
                    *loc,
                )
            }
            ast::Expr::Attr { value, attr, loc } => {
                let subject = self.lower_expr(value);
                self.builder.expr(
                    HExprKind::Field {
                        subject: Box::new(subject),
                        name: attr.clone(),
                    },
                    *loc,
                )
            }
            ast::Expr::Index { value, index, loc } => {
                let subject = self.lower_expr(value);
                let index = self.lower_expr(index);
                self.builder.expr(
                    HExprKind::Index {
                        subject: Box::new(subject),
                        index: Box::new(index),
                    },
                    *loc,
                )
            }
            ast::Expr::Call {
                func,
                args,
                kwargs,
                loc,
            } => self.lower_call(func, args, kwargs, *loc),
            ast::Expr::Binary {
                op,
                left,
                right,
                loc,
            } => {
                let left = self.lower_expr(left);
                let right = self.lower_expr(right);
                match BinaryOp::from_symbol(op) {
                    Some(op) => self.builder.expr(
                        HExprKind::Binary {
                            op,
                            left: Box::new(left),
                            right: Box::new(right),
                        },
                        *loc,
                    ),
                    None => {
                        self.diagnostics.push(
                            Diagnostic::error(
                                DiagnosticCode::TypeMismatch,
                                format!("Unsupported operator '{op}'"),
                            )
                            .with_location(self.file_path.clone(), loc.unwrap_or_default()),
                        );
                        left
                    }
                }
            }
            ast::Expr::Unary { op, operand, loc } => {
                let operand_h = self.lower_expr(operand);
                match UnaryOp::from_symbol(op) {
                    Some(op) => self.builder.expr(
                        HExprKind::Unary {
                            op,
                            expr: Box::new(operand_h),
                        },
                        *loc,
                    ),
                    None => {
                        self.diagnostics.push(
                            Diagnostic::error(
                                DiagnosticCode::TypeMismatch,
                                format!("Unknown unary operator '{op}'"),
                            )
                            .with_location(self.file_path.clone(), loc.unwrap_or_default()),
                        );
                        operand_h
                    }
                }
            }
            ast::Expr::Borrow {
                subject,
                mutable,
                loc,
            } => {
                let subject = self.lower_expr(subject);
                self.builder.expr(
                    HExprKind::Borrow {
                        subject: Box::new(subject),
                        is_mut: *mutable,
                    },
                    *loc,
                )
            }
            ast::Expr::Ternary {
                cond,
                then_expr,
                else_expr,
                loc,
            } => {
                let cond = self.lower_expr(cond);
                let then_expr = self.lower_expr(then_expr);
                let else_expr = self.lower_expr(else_expr);
                self.builder.expr(
                    HExprKind::Ternary {
                        cond: Box::new(cond),
                        then_expr: Box::new(then_expr),
                        else_expr: Box::new(else_expr),
                    },
                    *loc,
                )
            }
            ast::Expr::ArrayLiteral { elems, loc } => {
                let elements = elems.iter().map(|e| self.lower_expr(e)).collect();
                self.builder.expr(HExprKind::ArrayLiteral { elements }, *loc)
            }
            ast::Expr::DvInit {
                name,
                args,
                attr_names,
                loc,
            } => {
                let args = args.iter().map(|e| self.lower_expr(e)).collect();
                self.builder.expr(
                    HExprKind::DvInit {
                        dv_type_name: name.clone(),
                        args,
                        attr_names: attr_names.clone(),
                    },
                    *loc,
                )
            }
            ast::Expr::ResultOk { value, loc } => {
                let value = self.lower_expr(value);
                self.builder.expr(HExprKind::ResultOk(Box::new(value)), *loc)
            }
            ast::Expr::ResultErr { value, loc } => {
                let value = self.lower_expr(value);
                self.builder.expr(HExprKind::ResultErr(Box::new(value)), *loc)
            }
            ast::Expr::TrySuffix { operand, loc } => {
                let operand = self.lower_expr(operand);
                self.builder
                    .expr(HExprKind::TrySuffix(Box::new(operand)), *loc)
            }
        }
    }

    fn lower_call(
        &mut self,
        func: &ast::Expr,
        args: &[ast::Expr],
        kwargs: &[(String, ast::Expr)],
        loc: Option<Span>,
    ) -> HExpr {
        match func {
            ast::Expr::Name { ident, .. } => {
                let args = args.iter().map(|a| self.lower_expr(a)).collect();
                let kwargs = kwargs
                    .iter()
                    .map(|(name, value)| (name.clone(), self.lower_expr(value)))
                    .collect();
                self.builder.expr(
                    HExprKind::Call {
                        callee: ident.clone(),
                        args,
                        kwargs,
                    },
                    loc,
                )
            }
            ast::Expr::Attr { value, attr, .. } => {
                let receiver = self.lower_expr(value);
                let args = args.iter().map(|a| self.lower_expr(a)).collect();
                self.builder.expr(
                    HExprKind::MethodCall {
                        receiver: Box::new(receiver),
                        method: attr.clone(),
                        args,
                    },
                    loc,
                )
            }
            other => {
                self.diagnostics.push(
                    Diagnostic::error(
                        DiagnosticCode::InvalidFunctionCall,
                        "Unsupported callee expression".to_string(),
                    )
                    .with_location(
                        self.file_path.clone(),
                        other.loc().unwrap_or_default(),
                    ),
                );
                self.lower_expr(other)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_common::Literal;

    fn int(v: i64) -> ast::Expr {
        ast::Expr::Literal {
            value: Literal::Int(v),
            loc: None,
        }
    }

    fn name(s: &str) -> ast::Expr {
        ast::Expr::Name {
            ident: s.to_string(),
            loc: None,
        }
    }

    #[test]
    fn let_then_var_resolves_to_same_binding() {
        let mut lower = AstToHir::new("test.drift");
        let block = lower.lower_block(&[
            ast::Stmt::Let {
                name: "x".to_string(),
                type_expr: None,
                value: int(1),
                mutable: false,
                loc: None,
            },
            ast::Stmt::Expr {
                expr: name("x"),
                loc: None,
            },
        ]);
        assert!(lower.diagnostics().is_empty());

        let let_binding = match &block.statements[0].kind {
            HStmtKind::Let { binding_id, .. } => *binding_id,
            other => panic!("expected let, got {other:?}"),
        };
        match &block.statements[1].kind {
            HStmtKind::ExprStmt { expr } => match &expr.kind {
                HExprKind::Var { binding_id, .. } => assert_eq!(*binding_id, Some(let_binding)),
                other => panic!("expected var, got {other:?}"),
            },
            other => panic!("expected expr stmt, got {other:?}"),
        }
    }

    #[test]
    fn unresolved_name_produces_diagnostic() {
        let mut lower = AstToHir::new("test.drift");
        lower.lower_block(&[ast::Stmt::Expr {
            expr: name("ghost"),
            loc: None,
        }]);
        assert!(lower
            .diagnostics()
            .iter()
            .any(|d| d.message.contains("ghost")));
    }

    #[test]
    fn for_desugars_to_iterator_while_loop() {
        let mut lower = AstToHir::new("test.drift");
        let block = lower.lower_block(&[ast::Stmt::For {
            iter_var: "i".to_string(),
            iterable: ast::Expr::ArrayLiteral {
                elems: vec![int(1), int(2), int(3)],
                loc: None,
            },
            body: vec![ast::Stmt::Expr {
                expr: name("i"),
                loc: None,
            }],
            loc: None,
        }]);
        assert!(lower.diagnostics().is_empty());

        // Hidden iterator let, then the while loop.
        assert_eq!(block.statements.len(), 2);
        assert!(matches!(
            block.statements[0].kind,
            HStmtKind::Let { ref name, .. } if name.starts_with("__iter")
        ));
        let body = match &block.statements[1].kind {
            HStmtKind::While { body, .. } => body,
            other => panic!("expected while, got {other:?}"),
        };
        // Loop body: `let __next = __iter.next()` then the arm dispatch.
        assert!(matches!(
            body.statements[0].kind,
            HStmtKind::Let { ref name, ref value, .. }
                if name.starts_with("__next")
                    && matches!(value.kind, HExprKind::MethodCall { ref method, .. } if method == "next")
        ));
        match &body.statements[1].kind {
            HStmtKind::If {
                cond, else_block, ..
            } => {
                assert!(
                    matches!(&cond.kind, HExprKind::Field { name, .. } if name == "is_some")
                );
                let else_block = else_block.as_ref().expect("else block");
                assert!(matches!(else_block.statements[0].kind, HStmtKind::Break));
            }
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn shadowing_in_inner_scope_does_not_leak() {
        let mut lower = AstToHir::new("test.drift");
        let block = lower.lower_block(&[
            ast::Stmt::Let {
                name: "x".to_string(),
                type_expr: None,
                value: int(1),
                mutable: false,
                loc: None,
            },
            ast::Stmt::If {
                cond: ast::Expr::Literal {
                    value: Literal::Bool(true),
                    loc: None,
                },
                then_block: vec![ast::Stmt::Let {
                    name: "x".to_string(),
                    type_expr: None,
                    value: int(2),
                    mutable: false,
                    loc: None,
                }],
                else_block: vec![],
                loc: None,
            },
            ast::Stmt::Expr {
                expr: name("x"),
                loc: None,
            },
        ]);
        assert!(lower.diagnostics().is_empty());

        let outer = match &block.statements[0].kind {
            HStmtKind::Let { binding_id, .. } => *binding_id,
            _ => unreachable!(),
        };
        match &block.statements[2].kind {
            HStmtKind::ExprStmt { expr } => match &expr.kind {
                HExprKind::Var { binding_id, .. } => assert_eq!(*binding_id, Some(outer)),
                _ => unreachable!(),
            },
            _ => unreachable!(),
        }
    }
}
