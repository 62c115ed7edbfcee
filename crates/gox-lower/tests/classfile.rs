//! Integration tests for the class/project merger.
//!
//! A project classfile plus its worker classfiles merge into one
//! project; the support package drives scheduling and command dispatch.
//! These tests build the class-lookup collaborator and the host support
//! package in memory and exercise merging, scheduler caching, and the
//! synthesized entry glue.

use std::rc::Rc;

use gox_ast::{File, Package as AstPackage};
use gox_common::SourceMap;
use gox_gen::{HostPackage, MemImporter, Op, Package, Param, Signature, Type};
use gox_lower::classfile::load_class;
use gox_lower::{Config, PkgCtx, ProjectDesc, WorkClass};

// ── Helpers ────────────────────────────────────────────────────────────

const GAME_PKG: &str = "github.com/goxlang/lib/game";

/// Host support package: the Game/Sprite classes, one scheduler shared
/// by both slots, and the command dispatcher.
fn game_importer() -> MemImporter {
    let mut imp = MemImporter::new();
    let mut game = HostPackage::new(GAME_PKG);
    game.insert_type("Game", Type::named("Game"));
    game.insert_type("Sprite", Type::named("Sprite"));
    game.insert_str_const("Gox_sched", "Sched");
    game.insert_func("Sched", Signature::default());
    game.insert_func("Goxt_Game_Main", Signature::default());
    let mut exec = Signature::new(
        vec![Param::new("args", Type::slice(Type::Any))],
        vec![],
    );
    exec.variadic = true;
    game.insert_method("Game", "Gox_Exec", exec);
    imp.insert(game);
    imp
}

fn lookup_game(ext: &str) -> Option<ProjectDesc> {
    match ext {
        ".t2gmx" | ".t2spx" => Some(ProjectDesc {
            ext: ".t2gmx".to_string(),
            class: "Game".to_string(),
            works: vec![WorkClass {
                ext: ".t2spx".to_string(),
                class: "Sprite".to_string(),
            }],
            pkg_paths: vec![GAME_PKG.to_string()],
        }),
        _ => None,
    }
}

fn proj_file() -> File {
    File {
        decls: vec![],
        is_proj: true,
        is_class: true,
    }
}

fn work_file() -> File {
    File {
        decls: vec![],
        is_proj: false,
        is_class: true,
    }
}

fn test_pkg() -> Package {
    Package::new("main", "main", Rc::new(game_importer()))
}

// ── Merging ────────────────────────────────────────────────────────────

#[test]
fn project_and_worker_merge_into_one_project() {
    let mut ctx = PkgCtx::new();
    let mut pkg = test_pkg();
    load_class(&mut ctx, &mut pkg, "main.t2gmx", &proj_file(), &lookup_game).unwrap();
    load_class(&mut ctx, &mut pkg, "bar.t2spx", &work_file(), &lookup_game).unwrap();

    assert_eq!(ctx.projs.len(), 1);
    assert_eq!(ctx.classes.len(), 2);
    let proj = &ctx.projs[".t2gmx"];
    assert!(proj.has_main);
    assert_eq!(ctx.classes["bar.t2spx"].class, "Sprite");
    assert_eq!(ctx.classes["main.t2gmx"].class, "Game");
}

#[test]
fn sibling_workers_without_entry_point_merge_fine() {
    let mut ctx = PkgCtx::new();
    let mut pkg = test_pkg();
    load_class(&mut ctx, &mut pkg, "a.t2spx", &work_file(), &lookup_game).unwrap();
    load_class(&mut ctx, &mut pkg, "b.t2spx", &work_file(), &lookup_game).unwrap();

    assert_eq!(ctx.projs.len(), 1);
    assert_eq!(ctx.classes.len(), 2);
    assert!(!ctx.projs[".t2gmx"].has_main);
}

#[test]
fn second_entry_point_in_a_merge_group_is_fatal() {
    let mut ctx = PkgCtx::new();
    let mut pkg = test_pkg();
    load_class(&mut ctx, &mut pkg, "main.t2gmx", &proj_file(), &lookup_game).unwrap();
    let err = load_class(&mut ctx, &mut pkg, "dup.t2gmx", &proj_file(), &lookup_game).unwrap_err();
    assert_eq!(err.message(), "multiple project files found: Game Game");
}

#[test]
fn unknown_project_extension_is_fatal() {
    let mut ctx = PkgCtx::new();
    let mut pkg = test_pkg();
    let err = load_class(&mut ctx, &mut pkg, "main.abcx", &proj_file(), &lookup_game).unwrap_err();
    assert_eq!(err.message(), "class not found: .abcx");
}

#[test]
fn explicit_class_struct_names_its_base() {
    use gox_ast::decl::{Decl, Field, TypeDecl};
    use gox_ast::expr::{Expr, Ident};
    use gox_common::Span;
    use gox_lower::BlockCtx;

    let decl = Decl::Type(TypeDecl {
        span: Span::dummy(),
        name: Ident::new("Game"),
        type_params: vec![],
        typ: Expr::StructType {
            span: Span::dummy(),
            fields: vec![Field {
                span: Span::dummy(),
                names: vec![],
                typ: Some(Expr::Ident(Ident::new("BaseGame"))),
            }],
        },
    });
    let file = File {
        decls: vec![decl],
        is_proj: true,
        is_class: true,
    };

    let mut ctx = PkgCtx::new();
    let mut pkg = test_pkg();
    load_class(&mut ctx, &mut pkg, "main.t2gmx", &file, &lookup_game).unwrap();
    {
        let mut bctx = BlockCtx::new(&mut ctx, &mut pkg);
        gox_lower::decl::preload_file(&mut bctx, "main.t2gmx", &file).unwrap();
    }
    assert_eq!(
        ctx.classes["main.t2gmx"].base.as_deref(),
        Some("BaseGame")
    );
}

// ── Scheduler caching ──────────────────────────────────────────────────

#[test]
fn scheds_compute_once_and_share_storage() {
    let mut ctx = PkgCtx::new();
    let mut pkg = test_pkg();
    let proj = load_class(&mut ctx, &mut pkg, "main.t2gmx", &proj_file(), &lookup_game).unwrap();

    let scheds = proj.get_scheds().expect("scheduling is enabled");
    assert_eq!(scheds.len(), 2);
    // A single scheduler name fills both slots with the same function.
    assert!(Rc::ptr_eq(&scheds[0], &scheds[1]));

    // The second call returns the identical cached storage.
    let again = proj.get_scheds().expect("still enabled");
    assert!(Rc::ptr_eq(&scheds, &again));

    // Disabling scheduling yields none, not an empty allocation.
    proj.has_scheds = false;
    assert!(proj.get_scheds().is_none());
}

// ── Entry glue ─────────────────────────────────────────────────────────

#[test]
fn lowering_a_project_synthesizes_main_glue() {
    let mut files = AstPackage::new();
    files.files.insert("main.t2gmx".to_string(), proj_file());
    let conf = Config::new(Rc::new(game_importer()))
        .with_lookup_class(Box::new(lookup_game));

    let lowered = gox_lower::lower(&files, SourceMap::new(), conf).unwrap();
    assert!(lowered.diags.is_empty(), "diags: {:?}", lowered.diags);
    let ops = lowered.pkg.builder.ops();
    assert!(ops.contains(&Op::Autogen));
    assert!(ops.contains(&Op::FuncStart {
        name: "main".to_string()
    }));
    assert!(ops.contains(&Op::Ref {
        name: "Goxt_Game_Main".to_string()
    }));
}

#[test]
fn unknown_commands_in_classfiles_route_through_gox_exec() {
    use gox_ast::decl::{Decl, FuncDecl, FuncType};
    use gox_ast::expr::{Expr, Ident};
    use gox_ast::stmt::{Block, Stmt};
    use gox_common::Span;

    let update = Decl::Func(FuncDecl {
        span: Span::dummy(),
        name: Ident::new("update"),
        recv: None,
        typ: FuncType::default(),
        body: Some(Block::new(vec![Stmt::Expr(Expr::Ident(Ident::new(
            "jump",
        )))])),
    });
    let mut files = AstPackage::new();
    files.files.insert(
        "main.t2gmx".to_string(),
        File {
            decls: vec![update],
            is_proj: true,
            is_class: true,
        },
    );
    let conf = Config::new(Rc::new(game_importer()))
        .with_lookup_class(Box::new(lookup_game));
    let lowered = gox_lower::lower(&files, SourceMap::new(), conf).unwrap();
    assert!(lowered.diags.is_empty(), "diags: {:?}", lowered.diags);
    let ops = lowered.pkg.builder.ops();
    assert!(ops.contains(&Op::Ref {
        name: "Game.Gox_Exec".to_string()
    }));
    assert!(ops.contains(&Op::Lit {
        text: "\"jump\"".to_string()
    }));
}

#[test]
fn missing_primary_class_in_support_package_is_fatal() {
    let mut files = AstPackage::new();
    files.files.insert("main.t2gmx".to_string(), proj_file());
    // Importer whose support package lacks the Game class.
    let mut imp = MemImporter::new();
    let mut game = HostPackage::new(GAME_PKG);
    game.insert_str_const("Gox_sched", "Sched");
    imp.insert(game);
    let conf = Config::new(Rc::new(imp)).with_lookup_class(Box::new(lookup_game));

    let err = gox_lower::lower(&files, SourceMap::new(), conf).unwrap_err();
    assert_eq!(
        err.message(),
        "github.com/goxlang/lib/game.Game not found"
    );
}
