//! End-to-end diagnostic pipeline tests.
//!
//! A compile run must report every discoverable error with stable text
//! and ordering, render them through ariadne, and dump them as JSON for
//! tooling. Exact message text is snapshotted inline with insta.

use std::rc::Rc;

use gox_ast::decl::{Decl, FuncDecl, FuncType, ImportDecl};
use gox_ast::expr::{BasicLit, Expr, Ident, LitKind};
use gox_ast::stmt::{Block, Stmt};
use gox_ast::{File, Package as AstPackage};
use gox_common::{SourceMap, Span};
use gox_gen::MemImporter;
use gox_lower::{diagnostics, Config};

// ── Helpers ────────────────────────────────────────────────────────────

fn lower_decls(decls: Vec<Decl>, lookup_pub: Option<gox_lower::LookupPub>) -> gox_lower::Lowered {
    let mut files = AstPackage::new();
    files.files.insert(
        "main.gos".to_string(),
        File {
            decls,
            is_proj: false,
            is_class: false,
        },
    );
    let mut conf = Config::new(Rc::new(MemImporter::new()));
    if let Some(lp) = lookup_pub {
        conf = conf.with_lookup_pub(lp);
    }
    gox_lower::lower(&files, SourceMap::new(), conf).expect("no fatal error expected")
}

fn func_with_body(body: Vec<Stmt>) -> Decl {
    Decl::Func(FuncDecl {
        span: Span::dummy(),
        name: Ident::new("run"),
        recv: None,
        typ: FuncType::default(),
        body: Some(Block::new(body)),
    })
}

// ── Message stability ──────────────────────────────────────────────────

#[test]
fn accumulated_messages_keep_insertion_order() {
    let bad_lit = Expr::BasicLit(BasicLit {
        span: Span::dummy(),
        kind: LitKind::CStr,
        value: "\\\\x".to_string(),
    });
    let lowered = lower_decls(
        vec![func_with_body(vec![
            Stmt::Bad { span: Span::dummy() },
            Stmt::Expr(bad_lit),
        ])],
        None,
    );
    let joined: Vec<String> = lowered.diags.iter().map(|d| d.message.clone()).collect();
    insta::assert_snapshot!(joined.join("\n"), @r"
    compileStmt failed: unknown - BadStmt
    compileBasicLit: invalid syntax
    ");
}

#[test]
fn c_package_failure_message_shape() {
    let import = Decl::Import(ImportDecl {
        span: Span::dummy(),
        name: None,
        path_span: Span::dummy(),
        path: "C/unknownpkg".to_string(),
    });
    let lowered = lower_decls(
        vec![import],
        Some(Box::new(|_path: &str| Err("not found".to_string()))),
    );
    assert_eq!(lowered.diags.len(), 1);
    // The trailing newline is part of the message shape.
    assert_eq!(
        lowered.diags[0].message,
        "-: unknownpkg not found or not a valid C package (c2gox.a.pub file not found).\n"
    );
}

// ── Rendering ──────────────────────────────────────────────────────────

#[test]
fn rendered_reports_carry_their_messages() {
    let lowered = lower_decls(
        vec![func_with_body(vec![Stmt::Bad { span: Span::dummy() }])],
        None,
    );
    let rendered = diagnostics::render_all(&lowered.diags, "run\n", "main.gos");
    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].contains("Error"));
    assert!(rendered[0].contains("compileStmt failed: unknown - BadStmt"));
}

// ── JSON dump ──────────────────────────────────────────────────────────

#[test]
fn json_dump_is_machine_readable() {
    let lowered = lower_decls(
        vec![func_with_body(vec![Stmt::Bad { span: Span::dummy() }])],
        None,
    );
    let json = diagnostics::to_json(&lowered.diags);
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed[0]["message"], "compileStmt failed: unknown - BadStmt");
    assert!(parsed[0]["pos"].is_null());
}

// ── Clean compiles ─────────────────────────────────────────────────────

#[test]
fn a_clean_compile_has_no_diagnostics() {
    let lowered = lower_decls(vec![func_with_body(vec![])], None);
    assert!(lowered.diags.is_empty(), "diags: {:?}", lowered.diags);
}
