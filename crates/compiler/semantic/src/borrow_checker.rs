//! # Borrow / Region Checker
//!
//! Enforces aliasing discipline on references over HIR:
//!
//! - every borrow gets a *live region*: the program points between its
//!   creation and the last use of the binding it is stored in (a borrow that
//!   is never named lives for a single point)
//! - creating a mutable borrow fails while any borrow of an overlapping
//!   place is live; creating an immutable borrow fails while a mutable
//!   borrow is live
//! - moving or assigning to a place while a borrow of it is live fails
//! - a moved place may not be used again until it is re-assigned
//!
//! Auto-borrow: when a callee signature declares a reference parameter and
//! the argument is an owned place, the call borrows instead of moving.
//! Signatures drive this; without one the default is move.

use drift_common::{Span, TypeData, TypeId, TypeKind, TypeTable};
use drift_compiler_diagnostics::{Diagnostic, DiagnosticCode};
use drift_compiler_hir::{BindingId, HBlock, HExpr, HExprKind, HStmt, HStmtKind};
use rustc_hash::FxHashMap;

use crate::place::Place;
use crate::signatures::FnSignature;

#[derive(Debug)]
enum Event {
    Borrow {
        place: Place,
        is_mut: bool,
        binder: Option<BindingId>,
        point: usize,
        span: Option<Span>,
    },
    Use {
        place: Place,
        point: usize,
        span: Option<Span>,
    },
    Move {
        place: Place,
        point: usize,
        span: Option<Span>,
    },
    Assign {
        place: Place,
        point: usize,
        span: Option<Span>,
    },
    /// Use of a binding that holds a borrow; extends that borrow's region.
    BindingUse { binding: BindingId, point: usize },
}

#[derive(Debug)]
struct BorrowRecord {
    place: Place,
    is_mut: bool,
    start: usize,
    end: usize,
    span: Option<Span>,
}

/// Region-based borrow checker for one function body.
pub struct BorrowChecker<'a> {
    type_table: &'a TypeTable,
    binding_types: FxHashMap<BindingId, TypeId>,
    signatures: Option<&'a FxHashMap<String, FnSignature>>,
    enable_auto_borrow: bool,
    file_path: String,
}

impl<'a> BorrowChecker<'a> {
    pub fn new(type_table: &'a TypeTable) -> Self {
        Self {
            type_table,
            binding_types: FxHashMap::default(),
            signatures: None,
            enable_auto_borrow: false,
            file_path: String::new(),
        }
    }

    pub fn with_binding_types(mut self, binding_types: FxHashMap<BindingId, TypeId>) -> Self {
        self.binding_types = binding_types;
        self
    }

    pub fn with_signatures(mut self, signatures: &'a FxHashMap<String, FnSignature>) -> Self {
        self.signatures = Some(signatures);
        self.enable_auto_borrow = true;
        self
    }

    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = file_path.into();
        self
    }

    /// Check a function body, returning borrow diagnostics.
    pub fn check_block(&self, block: &HBlock) -> Vec<Diagnostic> {
        let mut collector = Collector {
            checker: self,
            events: Vec::new(),
            ref_bindings: FxHashMap::default(),
            binding_types: self.binding_types.clone(),
            point: 0,
        };
        collector.walk_block(block);
        let Collector { events, .. } = collector;
        self.analyze(&events)
    }

    fn analyze(&self, events: &[Event]) -> Vec<Diagnostic> {
        // Last use point per borrow-holding binding.
        let mut last_use: FxHashMap<BindingId, usize> = FxHashMap::default();
        for event in events {
            if let Event::BindingUse { binding, point } = event {
                last_use.insert(*binding, *point);
            }
        }

        let mut borrows: Vec<BorrowRecord> = Vec::new();
        for event in events {
            if let Event::Borrow {
                place,
                is_mut,
                binder,
                point,
                span,
            } = event
            {
                let end = binder
                    .and_then(|b| last_use.get(&b).copied())
                    .unwrap_or(*point)
                    .max(*point);
                borrows.push(BorrowRecord {
                    place: place.clone(),
                    is_mut: *is_mut,
                    start: *point,
                    end,
                    span: *span,
                });
            }
        }

        let mut diagnostics = Vec::new();

        // Borrow-creation conflicts.
        for (i, b) in borrows.iter().enumerate() {
            for (j, o) in borrows.iter().enumerate() {
                if i == j || !o.place.overlaps(&b.place) {
                    continue;
                }
                let live_at_creation = o.start < b.start && b.start <= o.end;
                if !live_at_creation {
                    continue;
                }
                if b.is_mut {
                    diagnostics.push(self.diag(
                        DiagnosticCode::BorrowConflict,
                        format!(
                            "cannot create mutable borrow of `{}`: conflicting borrow is still live",
                            b.place
                        ),
                        b.span,
                    ));
                } else if o.is_mut {
                    diagnostics.push(self.diag(
                        DiagnosticCode::BorrowConflict,
                        format!(
                            "cannot borrow `{}` while a mutable borrow is live",
                            b.place
                        ),
                        b.span,
                    ));
                }
            }
        }

        // Moves and assignments under live borrows; use-after-move.
        let mut moved_at: Vec<(Place, usize)> = Vec::new();
        for event in events {
            let (place, point, span, is_move, is_assign) = match event {
                Event::Move { place, point, span } => (place, *point, *span, true, false),
                Event::Assign { place, point, span } => (place, *point, *span, false, true),
                Event::Use { place, point, span } => (place, *point, *span, false, false),
                Event::Borrow {
                    place, point, span, ..
                } => (place, *point, *span, false, false),
                Event::BindingUse { .. } => continue,
            };

            let was_moved = moved_at
                .iter()
                .any(|(m, p)| m.overlaps(place) && *p < point);
            if was_moved {
                if is_assign {
                    // Re-initialization clears the move.
                    moved_at.retain(|(m, _)| !m.overlaps(place));
                } else {
                    diagnostics.push(self.diag(
                        DiagnosticCode::UseAfterMove,
                        format!("`{place}` used after move"),
                        span,
                    ));
                    continue;
                }
            }

            if is_move || is_assign {
                for o in &borrows {
                    if o.place.overlaps(place) && o.start < point && point <= o.end {
                        let verb = if is_move { "move" } else { "assign to" };
                        diagnostics.push(self.diag(
                            DiagnosticCode::BorrowConflict,
                            format!("cannot {verb} `{place}` while it is borrowed"),
                            span,
                        ));
                    }
                }
            }
            if is_move {
                moved_at.push((place.clone(), point));
            }
        }

        diagnostics
    }

    fn diag(&self, code: DiagnosticCode, message: String, span: Option<Span>) -> Diagnostic {
        Diagnostic::error(code, message)
            .with_location(self.file_path.clone(), span.unwrap_or_default())
    }

    fn is_copy(&self, ty: TypeId) -> bool {
        match self.type_table.get(ty) {
            TypeData::Scalar(name) => name == "Int" || name == "Bool",
            TypeData::Ref { .. } | TypeData::Unit => true,
            _ => false,
        }
    }
}

struct Collector<'c, 'a> {
    checker: &'c BorrowChecker<'a>,
    events: Vec<Event>,
    /// Bindings that hold borrows, mapped to the index of their borrow event.
    ref_bindings: FxHashMap<BindingId, usize>,
    binding_types: FxHashMap<BindingId, TypeId>,
    point: usize,
}

impl<'c, 'a> Collector<'c, 'a> {
    fn next_point(&mut self) -> usize {
        self.point += 1;
        self.point
    }

    fn binding_is_ref(&self, binding: BindingId) -> bool {
        if self.ref_bindings.contains_key(&binding) {
            return true;
        }
        self.binding_types
            .get(&binding)
            .is_some_and(|ty| self.checker.type_table.kind(*ty) == TypeKind::Ref)
    }

    fn place_is_copy(&self, place: &Place) -> bool {
        place
            .base
            .binding_id
            .and_then(|b| self.binding_types.get(&b))
            .is_some_and(|ty| self.checker.is_copy(*ty))
    }

    fn walk_block(&mut self, block: &HBlock) {
        for stmt in &block.statements {
            self.walk_stmt(stmt);
        }
    }

    fn walk_stmt(&mut self, stmt: &HStmt) {
        match &stmt.kind {
            HStmtKind::Let {
                value, binding_id, ..
            } => {
                if let HExprKind::Borrow { subject, is_mut } = &value.kind {
                    if let Some(place) = Place::of_expr(subject) {
                        let point = self.next_point();
                        self.events.push(Event::Borrow {
                            place,
                            is_mut: *is_mut,
                            binder: Some(*binding_id),
                            point,
                            span: value.span.or(stmt.span),
                        });
                        self.ref_bindings.insert(*binding_id, self.events.len() - 1);
                        return;
                    }
                }
                self.walk_rvalue(value, true);
            }
            HStmtKind::Assign { target, value } => {
                self.walk_rvalue(value, true);
                if let Some(place) = Place::of_expr(target) {
                    let point = self.next_point();
                    self.events.push(Event::Assign {
                        place,
                        point,
                        span: stmt.span,
                    });
                } else {
                    self.walk_rvalue(target, false);
                }
            }
            HStmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                self.walk_rvalue(cond, false);
                self.walk_block(then_block);
                if let Some(else_block) = else_block {
                    self.walk_block(else_block);
                }
            }
            HStmtKind::While { cond, body } => {
                self.walk_rvalue(cond, false);
                self.walk_block(body);
            }
            HStmtKind::Try { body, catches } => {
                self.walk_block(body);
                for arm in catches {
                    self.walk_block(&arm.block);
                }
            }
            HStmtKind::Return { value } => {
                if let Some(value) = value {
                    self.walk_rvalue(value, false);
                }
            }
            HStmtKind::Throw { value } => self.walk_rvalue(value, false),
            HStmtKind::ExprStmt { expr } => self.walk_rvalue(expr, false),
            HStmtKind::Import { .. } | HStmtKind::Break | HStmtKind::Continue => {}
        }
    }

    /// Walk an expression in rvalue position. `consuming` marks contexts
    /// that take ownership of a top-level place (let initializers).
    fn walk_rvalue(&mut self, expr: &HExpr, consuming: bool) {
        match &expr.kind {
            HExprKind::LiteralInt(_)
            | HExprKind::LiteralBool(_)
            | HExprKind::LiteralString(_) => {}
            HExprKind::Var { binding_id, .. } => {
                if let Some(binding) = binding_id {
                    if self.binding_is_ref(*binding) {
                        let point = self.next_point();
                        self.events.push(Event::BindingUse {
                            binding: *binding,
                            point,
                        });
                        return;
                    }
                }
                if let Some(place) = Place::of_expr(expr) {
                    let point = self.next_point();
                    if consuming && !self.place_is_copy(&place) {
                        self.events.push(Event::Move {
                            place,
                            point,
                            span: expr.span,
                        });
                    } else {
                        self.events.push(Event::Use {
                            place,
                            point,
                            span: expr.span,
                        });
                    }
                }
            }
            HExprKind::Field { subject, .. } => {
                if let Some(place) = Place::of_expr(expr) {
                    let point = self.next_point();
                    self.events.push(Event::Use {
                        place,
                        point,
                        span: expr.span,
                    });
                } else {
                    self.walk_rvalue(subject, false);
                }
            }
            HExprKind::Index { subject, index } => {
                self.walk_rvalue(index, false);
                if let Some(place) = Place::of_expr(expr) {
                    let point = self.next_point();
                    self.events.push(Event::Use {
                        place,
                        point,
                        span: expr.span,
                    });
                } else {
                    self.walk_rvalue(subject, false);
                }
            }
            HExprKind::Call { callee, args, kwargs } => {
                let sig = self
                    .checker
                    .signatures
                    .and_then(|sigs| sigs.get(callee.as_str()));
                for (index, arg) in args.iter().enumerate() {
                    let param_ty = sig.and_then(|s| s.param_type_ids.get(index)).copied();
                    self.walk_call_arg(arg, param_ty);
                }
                for (_, value) in kwargs {
                    self.walk_rvalue(value, false);
                }
            }
            HExprKind::MethodCall {
                receiver,
                method,
                args,
            } => {
                let sig = self
                    .checker
                    .signatures
                    .and_then(|sigs| sigs.get(method.as_str()));
                // The receiver occupies parameter slot zero.
                let receiver_param = sig.and_then(|s| s.param_type_ids.first()).copied();
                self.walk_call_arg(receiver, receiver_param);
                for (index, arg) in args.iter().enumerate() {
                    let param_ty = sig.and_then(|s| s.param_type_ids.get(index + 1)).copied();
                    self.walk_call_arg(arg, param_ty);
                }
            }
            HExprKind::Unary { expr: operand, .. } => self.walk_rvalue(operand, false),
            HExprKind::Binary { left, right, .. } => {
                self.walk_rvalue(left, false);
                self.walk_rvalue(right, false);
            }
            HExprKind::Borrow { subject, is_mut } => {
                if let Some(place) = Place::of_expr(subject) {
                    let point = self.next_point();
                    self.events.push(Event::Borrow {
                        place,
                        is_mut: *is_mut,
                        binder: None,
                        point,
                        span: expr.span,
                    });
                } else {
                    self.walk_rvalue(subject, false);
                }
            }
            HExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                self.walk_rvalue(cond, false);
                self.walk_rvalue(then_expr, consuming);
                self.walk_rvalue(else_expr, consuming);
            }
            HExprKind::ArrayLiteral { elements } => {
                for element in elements {
                    self.walk_rvalue(element, true);
                }
            }
            HExprKind::DvInit { args, .. } => {
                for arg in args {
                    self.walk_rvalue(arg, true);
                }
            }
            HExprKind::ResultOk(value) | HExprKind::ResultErr(value) => {
                self.walk_rvalue(value, true);
            }
            HExprKind::TrySuffix(operand) => self.walk_rvalue(operand, false),
        }
    }

    /// A call argument moves its operand unless the callee's parameter is a
    /// reference, in which case the checker inserts an implicit borrow.
    fn walk_call_arg(&mut self, arg: &HExpr, param_ty: Option<TypeId>) {
        if let HExprKind::Var { binding_id, .. } = &arg.kind {
            if let Some(binding) = binding_id {
                if self.binding_is_ref(*binding) {
                    let point = self.next_point();
                    self.events.push(Event::BindingUse {
                        binding: *binding,
                        point,
                    });
                    return;
                }
            }
            if let Some(place) = Place::of_expr(arg) {
                if self.checker.enable_auto_borrow {
                    if let Some(param_ty) = param_ty {
                        if let TypeData::Ref { mutable, .. } =
                            self.checker.type_table.get(param_ty)
                        {
                            let point = self.next_point();
                            self.events.push(Event::Borrow {
                                place,
                                is_mut: *mutable,
                                binder: None,
                                point,
                                span: arg.span,
                            });
                            return;
                        }
                    }
                }
                let point = self.next_point();
                if self.place_is_copy(&place) {
                    self.events.push(Event::Use {
                        place,
                        point,
                        span: arg.span,
                    });
                } else {
                    self.events.push(Event::Move {
                        place,
                        point,
                        span: arg.span,
                    });
                }
                return;
            }
        }
        self.walk_rvalue(arg, true);
    }
}
