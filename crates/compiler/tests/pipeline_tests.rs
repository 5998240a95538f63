//! End-to-end pipeline tests: AST in, LLVM IR (or diagnostics) out.

use drift_common::{Literal, TypeExpr};
use drift_compiler::{check_module, compile_module, CompileError};
use drift_compiler_hir::ast;

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

fn module(functions: Vec<ast::FunctionDef>) -> ast::Module {
    ast::Module {
        name: "main".to_string(),
        exports: vec![],
        imports: vec![],
        functions,
    }
}

fn fn_def(name: &str, return_type: Option<TypeExpr>, body: Vec<ast::Stmt>) -> ast::FunctionDef {
    ast::FunctionDef {
        name: name.to_string(),
        params: vec![],
        return_type,
        throws: None,
        body,
        loc: None,
    }
}

fn fnresult_int() -> TypeExpr {
    TypeExpr {
        name: "FnResult".to_string(),
        args: vec![TypeExpr::simple("Int"), TypeExpr::simple("Error")],
    }
}

#[test]
fn scalar_return_compiles_to_i64_function() {
    let module = module(vec![fn_def(
        "drift_main",
        Some(TypeExpr::simple("Int")),
        vec![ast::Stmt::Return {
            value: Some(int(42)),
            loc: None,
        }],
    )]);

    let compiled = compile_module(&module, "main.drift").expect("pipeline succeeds");
    assert!(compiled.llvm_ir.contains("define i64 @drift_main()"));
    assert!(compiled.llvm_ir.contains("add i64 0, 42"));
    assert!(compiled.llvm_ir.contains("ret i64"));
}

#[test]
fn fallible_ok_return_lowers_to_result_carrier() {
    // callee: fallible, returns Ok(1); drift_main: returns Ok(callee()?).
    let callee = fn_def(
        "callee",
        Some(fnresult_int()),
        vec![ast::Stmt::Return {
            value: Some(ast::Expr::ResultOk {
                value: Box::new(int(1)),
                loc: None,
            }),
            loc: None,
        }],
    );
    let main = fn_def(
        "drift_main",
        Some(fnresult_int()),
        vec![ast::Stmt::Return {
            value: Some(ast::Expr::ResultOk {
                value: Box::new(ast::Expr::TrySuffix {
                    operand: Box::new(ast::Expr::Call {
                        func: Box::new(name("callee")),
                        args: vec![],
                        kwargs: vec![],
                        loc: None,
                    }),
                    loc: None,
                }),
                loc: None,
            }),
            loc: None,
        }],
    );

    let compiled = compile_module(&module(vec![callee, main]), "main.drift")
        .expect("pipeline succeeds");

    // The callee lowers to a function returning the result carrier.
    assert!(compiled
        .llvm_ir
        .contains("define %FnResult_Int_Error @callee()"));
    // The try-sugar expands to a branch on the carrier's discriminant.
    assert!(compiled.llvm_ir.contains("br i1"));
    assert!(compiled
        .llvm_ir
        .contains("call %FnResult_Int_Error @callee()"));
    assert!(compiled
        .llvm_ir
        .contains("extractvalue %FnResult_Int_Error"));
}

#[test]
fn borrow_conflict_is_detected() {
    // let x = 1; let r = &x; &mut x; r
    let body = vec![
        ast::Stmt::Let {
            name: "x".to_string(),
            type_expr: None,
            value: int(1),
            mutable: true,
            loc: None,
        },
        ast::Stmt::Let {
            name: "r".to_string(),
            type_expr: None,
            value: ast::Expr::Borrow {
                subject: Box::new(name("x")),
                mutable: false,
                loc: None,
            },
            mutable: false,
            loc: None,
        },
        ast::Stmt::Expr {
            expr: ast::Expr::Borrow {
                subject: Box::new(name("x")),
                mutable: true,
                loc: None,
            },
            loc: None,
        },
        ast::Stmt::Expr {
            expr: name("r"),
            loc: None,
        },
    ];
    let module = module(vec![fn_def("drift_main", Some(TypeExpr::simple("Int")), body)]);

    let err = compile_module(&module, "main.drift").unwrap_err();
    match err {
        CompileError::Diagnostics(diagnostics) => {
            assert!(diagnostics
                .iter()
                .any(|d| d.message.contains("borrow")));
        }
        other => panic!("expected diagnostics, got {other:?}"),
    }
}

#[test]
fn auto_borrow_at_call_site_leaves_argument_owned() {
    // foo declares a reference parameter; x stays usable after foo(x).
    let foo = ast::FunctionDef {
        name: "foo".to_string(),
        params: vec![ast::Param {
            name: "r".to_string(),
            type_expr: TypeExpr {
                name: "Ref".to_string(),
                args: vec![TypeExpr::simple("String")],
            },
            mutable: false,
        }],
        return_type: Some(TypeExpr::simple("Int")),
        throws: None,
        body: vec![ast::Stmt::Return {
            value: Some(int(0)),
            loc: None,
        }],
        loc: None,
    };
    let main_body = vec![
        ast::Stmt::Let {
            name: "x".to_string(),
            type_expr: None,
            value: ast::Expr::Literal {
                value: Literal::Str("owned".to_string()),
                loc: None,
            },
            mutable: false,
            loc: None,
        },
        ast::Stmt::Expr {
            expr: ast::Expr::Call {
                func: Box::new(name("foo")),
                args: vec![name("x")],
                kwargs: vec![],
                loc: None,
            },
            loc: None,
        },
        // x is used as owned afterwards.
        ast::Stmt::Expr {
            expr: name("x"),
            loc: None,
        },
        ast::Stmt::Return {
            value: Some(int(0)),
            loc: None,
        },
    ];
    let module = module(vec![
        foo,
        fn_def("drift_main", Some(TypeExpr::simple("Int")), main_body),
    ]);

    let diagnostics = check_module(&module, "main.drift");
    assert!(
        !diagnostics.has_errors(),
        "unexpected diagnostics: {:?}",
        diagnostics.all()
    );
}

#[test]
fn nothrow_function_constructing_error_fails_stage4() {
    // drift_main is not declared fallible but throws.
    let body = vec![ast::Stmt::Throw {
        value: ast::Expr::DvInit {
            name: "BoomError".to_string(),
            args: vec![],
            attr_names: vec![],
            loc: None,
        },
        loc: None,
    }];
    let module = module(vec![fn_def("drift_main", Some(TypeExpr::simple("Int")), body)]);

    // The checker already reports the effect violation.
    let err = compile_module(&module, "main.drift").unwrap_err();
    match err {
        CompileError::Diagnostics(diagnostics) => {
            assert!(diagnostics
                .iter()
                .any(|d| d.message.contains("can-throw")));
        }
        other => panic!("expected diagnostics, got {other:?}"),
    }
}

#[test]
fn undeclared_event_superset_is_enforced() {
    // callee declares ParseError; caller declares only IoError.
    let callee = ast::FunctionDef {
        name: "callee".to_string(),
        params: vec![],
        return_type: Some(fnresult_int()),
        throws: Some(vec!["ParseError".to_string()]),
        body: vec![ast::Stmt::Return {
            value: Some(ast::Expr::ResultOk {
                value: Box::new(int(1)),
                loc: None,
            }),
            loc: None,
        }],
        loc: None,
    };
    let caller = ast::FunctionDef {
        name: "caller".to_string(),
        params: vec![],
        return_type: Some(fnresult_int()),
        throws: Some(vec!["IoError".to_string()]),
        body: vec![ast::Stmt::Return {
            value: Some(ast::Expr::ResultOk {
                value: Box::new(ast::Expr::TrySuffix {
                    operand: Box::new(ast::Expr::Call {
                        func: Box::new(name("callee")),
                        args: vec![],
                        kwargs: vec![],
                        loc: None,
                    }),
                    loc: None,
                }),
                loc: None,
            }),
            loc: None,
        }],
        loc: None,
    };

    let diagnostics = check_module(&module(vec![callee, caller]), "main.drift");
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("may throw")));
}
