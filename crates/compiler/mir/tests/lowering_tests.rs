//! Integration tests: AST → HIR → MIR lowering sanity.

use drift_common::{Literal, TypeTable};
use drift_compiler_hir::{ast, AstToHir};
use drift_compiler_mir::{HirToMir, Instruction, MirBuilder, Terminator};
use rustc_hash::FxHashMap;

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
fn for_ast_lowered_to_mir_cfg() {
    // for i in [1,2,3] { i; }
    let for_ast = ast::Stmt::For {
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
    };

    // AST → HIR (desugars into the iterator while-loop).
    let mut ast_lower = AstToHir::new("test.drift");
    let hir = ast_lower.lower_block(&[for_ast]);
    assert!(ast_lower.diagnostics().is_empty());

    // HIR → MIR.
    let mut table = TypeTable::new();
    let fn_infos = FxHashMap::default();
    let mut lower = HirToMir::new(MirBuilder::new("f_for"), &mut table, &fn_infos);
    lower.lower_block(&hir).expect("lowering succeeds");
    let func = lower.into_function();

    // Basic CFG sanity: multiple blocks and the entry terminates.
    assert!(func.block_count() > 1);
    assert!(func.entry_block().has_terminator());
    assert!(func.blocks.keys().any(|name| name.starts_with("loop_")));
}

#[test]
fn if_else_lowers_to_condbr_with_join() {
    let stmt = ast::Stmt::If {
        cond: ast::Expr::Literal {
            value: Literal::Bool(true),
            loc: None,
        },
        then_block: vec![ast::Stmt::Let {
            name: "x".to_string(),
            type_expr: None,
            value: int(1),
            mutable: false,
            loc: None,
        }],
        else_block: vec![ast::Stmt::Let {
            name: "y".to_string(),
            type_expr: None,
            value: int(2),
            mutable: false,
            loc: None,
        }],
        loc: None,
    };

    let mut ast_lower = AstToHir::new("test.drift");
    let hir = ast_lower.lower_block(&[stmt]);

    let mut table = TypeTable::new();
    let fn_infos = FxHashMap::default();
    let mut lower = HirToMir::new(MirBuilder::new("f_if"), &mut table, &fn_infos);
    lower.lower_block(&hir).expect("lowering succeeds");
    let func = lower.into_function();

    match func.entry_block().terminator.as_ref() {
        Some(Terminator::CondBr { .. }) => {}
        other => panic!("expected CondBr, got {other:?}"),
    }
    assert!(func.blocks.keys().any(|name| name.starts_with("join")));
}

#[test]
fn try_suffix_expands_to_discriminant_branch() {
    // fn body: return callee()?  (inside a can-throw context)
    let stmt = ast::Stmt::Return {
        value: Some(ast::Expr::TrySuffix {
            operand: Box::new(ast::Expr::Call {
                func: Box::new(name("callee")),
                args: vec![],
                kwargs: vec![],
                loc: None,
            }),
            loc: None,
        }),
        loc: None,
    };

    let mut ast_lower = AstToHir::new("test.drift");
    let hir = ast_lower.lower_block(&[stmt]);

    let mut table = TypeTable::new();
    let fn_infos = FxHashMap::default();
    let mut lower = HirToMir::new(MirBuilder::new("f_try"), &mut table, &fn_infos);
    lower.lower_block(&hir).expect("lowering succeeds");
    let func = lower.into_function();

    // The expansion branches on the carrier discriminant and forwards the
    // error through a result constructor on the error path.
    assert!(func.blocks.keys().any(|name| name.starts_with("try_err")));
    assert!(func.blocks.keys().any(|name| name.starts_with("try_ok")));
    match func.entry_block().terminator.as_ref() {
        Some(Terminator::CondBr { .. }) => {}
        other => panic!("expected CondBr on is_err, got {other:?}"),
    }
    let err_block = func
        .blocks
        .values()
        .find(|b| b.name.starts_with("try_err"))
        .unwrap();
    assert!(err_block
        .instructions
        .iter()
        .any(|i| matches!(i, Instruction::ConstructResultErr { .. })));
    match err_block.terminator.as_ref() {
        Some(Terminator::Return { value: Some(_) }) => {}
        other => panic!("error path must forward a result, got {other:?}"),
    }
}

#[test]
fn throw_inside_try_branches_to_handler_with_error_arg() {
    let stmt = ast::Stmt::Try {
        body: vec![ast::Stmt::Throw {
            value: ast::Expr::DvInit {
                name: "ParseError".to_string(),
                args: vec![],
                attr_names: vec![],
                loc: None,
            },
            loc: None,
        }],
        catches: vec![ast::CatchArm {
            event: Some("ParseError".to_string()),
            binder: Some("e".to_string()),
            block: vec![],
            loc: None,
        }],
        loc: None,
    };

    let mut ast_lower = AstToHir::new("test.drift");
    let hir = ast_lower.lower_block(&[stmt]);

    let mut table = TypeTable::new();
    let fn_infos = FxHashMap::default();
    let catalog: FxHashMap<String, i64> = [("ParseError".to_string(), 7)].into_iter().collect();
    let mut lower = HirToMir::new(MirBuilder::new("f_throw"), &mut table, &fn_infos)
        .with_exception_catalog(catalog);
    lower.lower_block(&hir).expect("lowering succeeds");
    let func = lower.into_function();

    let handler = func
        .blocks
        .values()
        .find(|b| b.name.starts_with("handler"))
        .expect("handler block");
    assert_eq!(handler.params.len(), 1);

    // The throw site jumps to the handler passing the constructed error.
    match func.entry_block().terminator.as_ref() {
        Some(Terminator::Br { edge }) => {
            assert!(edge.target.starts_with("handler"));
            assert_eq!(edge.args.len(), 1);
        }
        other => panic!("expected Br to handler, got {other:?}"),
    }
    assert!(func
        .entry_block()
        .instructions
        .iter()
        .any(|i| matches!(i, Instruction::ConstructError { event: Some(e), .. } if e == "ParseError")));
}
