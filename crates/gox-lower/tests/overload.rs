//! Integration tests for overload declaration handling.
//!
//! Overload groups are validated during the preload pass; every
//! rejection lands in the diagnostic list and sibling declarations keep
//! compiling. Registration binds the set plus mangled per-candidate
//! aliases, and call sites pick candidates by arity.

use std::rc::Rc;

use gox_ast::decl::{Decl, Field, FuncDecl, FuncType, OverloadDecl};
use gox_ast::expr::{BasicLit, Expr, Ident, LitKind};
use gox_ast::stmt::{Block, Stmt};
use gox_ast::{File, Package as AstPackage};
use gox_common::{SourceMap, Span};
use gox_gen::{MemImporter, Op, Symbol};
use gox_lower::Config;

// ── Helpers ────────────────────────────────────────────────────────────

fn ident(name: &str) -> Expr {
    Expr::Ident(Ident::new(name))
}

fn int_lit(v: &str) -> Expr {
    Expr::BasicLit(BasicLit {
        span: Span::dummy(),
        kind: LitKind::Int,
        value: v.to_string(),
    })
}

fn int_param(name: &str) -> Field {
    Field::named(Ident::new(name), ident("int"))
}

fn func_decl(name: &str, params: Vec<Field>, body: Vec<Stmt>) -> Decl {
    Decl::Func(FuncDecl {
        span: Span::dummy(),
        name: Ident::new(name),
        recv: None,
        typ: FuncType {
            span: Span::dummy(),
            params,
            results: vec![],
            variadic: false,
            type_params: vec![],
        },
        body: Some(Block::new(body)),
    })
}

fn overload_decl(name: &str, operator: bool, funcs: Vec<Expr>) -> Decl {
    Decl::Overload(OverloadDecl {
        span: Span::dummy(),
        name: Ident::new(name),
        operator,
        recv: None,
        funcs,
    })
}

fn lower_one_file(decls: Vec<Decl>) -> gox_lower::Lowered {
    let mut files = AstPackage::new();
    files.files.insert(
        "main.gos".to_string(),
        File {
            decls,
            is_proj: false,
            is_class: false,
        },
    );
    let conf = Config::new(Rc::new(MemImporter::new()));
    gox_lower::lower(&files, SourceMap::new(), conf).expect("no fatal error expected")
}

// ── Rejections ─────────────────────────────────────────────────────────

#[test]
fn operator_outside_the_overloadable_set() {
    let lowered = lower_one_file(vec![overload_decl("++", true, vec![])]);
    assert_eq!(lowered.diags.len(), 1);
    assert_eq!(
        lowered.diags[0].message,
        "TODO - can't overload operator ++"
    );
}

#[test]
fn literal_candidate_is_an_unknown_func() {
    let lit = Expr::FuncLit {
        span: Span::dummy(),
        typ: FuncType::default(),
        body: Block::default(),
    };
    let lowered = lower_one_file(vec![overload_decl("add", false, vec![lit])]);
    assert_eq!(lowered.diags.len(), 1);
    assert_eq!(lowered.diags[0].message, "unknown func - FuncLit");
}

#[test]
fn basic_lit_candidate_is_an_unknown_func() {
    let lowered = lower_one_file(vec![overload_decl("add", false, vec![int_lit("1")])]);
    // "+" maps fine; the candidate itself is still rejected.
    let lowered2 = lower_one_file(vec![overload_decl("+", true, vec![int_lit("1")])]);
    assert_eq!(lowered.diags[0].message, "unknown func - BasicLit");
    assert_eq!(lowered2.diags[0].message, "unknown func - BasicLit");
}

#[test]
fn double_pointer_receiver_is_rejected() {
    let recv = Field {
        span: Span::dummy(),
        names: vec![],
        typ: Some(Expr::Star {
            span: Span::dummy(),
            x: Box::new(Expr::Star {
                span: Span::dummy(),
                x: Box::new(ident("T")),
            }),
        }),
    };
    let decl = Decl::Overload(OverloadDecl {
        span: Span::dummy(),
        name: Ident::new("add"),
        operator: false,
        recv: Some(recv),
        funcs: vec![],
    });
    let lowered = lower_one_file(vec![decl]);
    assert_eq!(lowered.diags.len(), 1);
    assert_eq!(lowered.diags[0].message, "invalid recv type");
}

#[test]
fn non_named_receiver_base_is_rejected() {
    let recv = Field {
        span: Span::dummy(),
        names: vec![],
        typ: Some(Expr::Star {
            span: Span::dummy(),
            x: Box::new(Expr::Ellipsis { span: Span::dummy() }),
        }),
    };
    let decl = Decl::Overload(OverloadDecl {
        span: Span::dummy(),
        name: Ident::new("add"),
        operator: false,
        recv: Some(recv),
        funcs: vec![],
    });
    let lowered = lower_one_file(vec![decl]);
    assert_eq!(lowered.diags.len(), 1);
    assert_eq!(lowered.diags[0].message, "invalid recv");
}

#[test]
fn duplicate_candidate_shapes_are_ambiguous() {
    let lowered = lower_one_file(vec![
        func_decl("addInt", vec![int_param("x")], vec![]),
        func_decl("addInt2", vec![int_param("x")], vec![]),
        overload_decl("add", false, vec![ident("addInt"), ident("addInt2")]),
    ]);
    assert_eq!(lowered.diags.len(), 1);
    assert_eq!(
        lowered.diags[0].message,
        "duplicate overload signature: func(int)"
    );
}

#[test]
fn a_bad_overload_does_not_hide_its_siblings() {
    let lowered = lower_one_file(vec![
        func_decl("mulOne", vec![int_param("x")], vec![]),
        overload_decl("++", true, vec![]),
        overload_decl("mul", false, vec![ident("mulOne")]),
    ]);
    // The operator rejection is recorded; the valid group still binds.
    assert_eq!(lowered.diags.len(), 1);
    assert!(matches!(
        lowered.pkg.scope.lookup("mul"),
        Some(Symbol::Overload { funcs, .. }) if funcs.len() == 1
    ));
}

// ── Registration and call-site selection ───────────────────────────────

#[test]
fn candidates_register_with_mangled_aliases() {
    let lowered = lower_one_file(vec![
        func_decl("mulOne", vec![int_param("x")], vec![]),
        func_decl("mulTwo", vec![int_param("x"), int_param("y")], vec![]),
        overload_decl("mul", false, vec![ident("mulOne"), ident("mulTwo")]),
    ]);
    assert!(lowered.diags.is_empty(), "diags: {:?}", lowered.diags);
    assert!(matches!(
        lowered.pkg.scope.lookup("mul"),
        Some(Symbol::Overload { funcs, .. }) if funcs.len() == 2
    ));
    assert!(lowered.pkg.scope.lookup("mul__0").is_some());
    assert!(lowered.pkg.scope.lookup("mul__1").is_some());
}

#[test]
fn call_sites_select_candidates_by_arity() {
    let call = Stmt::Expr(Expr::Call {
        span: Span::dummy(),
        fun: Box::new(ident("mul")),
        args: vec![int_lit("1"), int_lit("2")],
        ellipsis: false,
    });
    let lowered = lower_one_file(vec![
        func_decl("mulOne", vec![int_param("x")], vec![]),
        func_decl("mulTwo", vec![int_param("x"), int_param("y")], vec![]),
        overload_decl("mul", false, vec![ident("mulOne"), ident("mulTwo")]),
        func_decl("run", vec![], vec![call]),
    ]);
    assert!(lowered.diags.is_empty(), "diags: {:?}", lowered.diags);
    let ops = lowered.pkg.builder.ops();
    assert!(ops.contains(&Op::Ref {
        name: "mulTwo".to_string()
    }));
    assert!(ops.contains(&Op::Call {
        nargs: 2,
        ellipsis: false
    }));
}

#[test]
fn operator_overload_registers_under_its_mapped_name() {
    let lowered = lower_one_file(vec![
        func_decl("mulInt", vec![int_param("x"), int_param("y")], vec![]),
        overload_decl("*", true, vec![ident("mulInt")]),
    ]);
    assert!(lowered.diags.is_empty(), "diags: {:?}", lowered.diags);
    assert!(lowered.pkg.scope.lookup("Goxo_Mul").is_some());
}
