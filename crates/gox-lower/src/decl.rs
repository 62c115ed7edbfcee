//! The preload pass and deferred declaration resolution.
//!
//! Preload walks every file's declarations before any body is lowered:
//! types and function signatures bind eagerly into the package scope,
//! bodies and variable initializers become loaders, overload groups
//! queue up until every candidate can resolve. Loader resolution is the
//! explicit state machine in the package context: running a loader a
//! second time is a no-op, and a loader that failed stays failed
//! without reporting twice.

use gox_ast as ast;
use gox_ast::decl::{Decl, Field, FuncDecl, FuncType, TypeDecl, VarDecl};
use gox_ast::expr::{Expr, Ident};
use gox_gen::{Param, Signature, Symbol, Type};

use crate::cimport::load_import;
use crate::context::{fatal, rec, BlockCtx, LoadAction, LoaderState, Result};
use crate::expr::compile_expr;
use crate::overload::{get_recv_type, preload_overload};
use crate::stmt::compile_body;

/// Preload one file: eager symbols in, loaders registered, imports
/// bound, overloads queued. Each declaration runs under the recovery
/// boundary so one bad declaration does not hide its siblings.
pub fn preload_file(ctx: &mut BlockCtx, file_name: &str, f: &ast::File) -> Result<()> {
    log::debug!("preload {} ({} decls)", file_name, f.decls.len());
    for (i, d) in f.decls.iter().enumerate() {
        if let Err(e) = preload_decl(ctx, file_name, i, d) {
            ctx.pkg_ctx.handle_err(e)?;
        }
    }
    Ok(())
}

fn preload_decl(ctx: &mut BlockCtx, file_name: &str, idx: usize, d: &Decl) -> Result<()> {
    match d {
        Decl::Func(fd) => preload_func(ctx, file_name, idx, fd),
        Decl::Type(td) => preload_type(ctx, file_name, td),
        Decl::Var(vd) => preload_var(ctx, file_name, idx, vd),
        Decl::Overload(_) => {
            ctx.pkg_ctx
                .pending_overloads
                .push((file_name.to_string(), idx));
            Ok(())
        }
        Decl::Import(spec) => load_import(ctx, spec),
        // Closed union; this arm is the forward-compatibility fallback
        // for declaration kinds the preload pass does not handle.
        Decl::Bad { span } => Err(rec(
            format!("preloadFile: unknown decl - {}", d.kind_name()),
            ctx.pkg_ctx.pos(*span),
        )),
    }
}

fn preload_func(ctx: &mut BlockCtx, file_name: &str, idx: usize, fd: &FuncDecl) -> Result<()> {
    if !fd.typ.type_params.is_empty() {
        return Err(fatal("type parameters are unsupported"));
    }
    let pos = ctx.pkg_ctx.pos(fd.name.span);
    let mut sig = build_signature(ctx, &fd.typ)?;
    if let Some(recv) = &fd.recv {
        sig.recv = Some(to_recv(ctx, recv)?);
    } else if let Some(class) = ctx.pkg_ctx.classes.get(file_name).map(|c| c.class.clone()) {
        // A classfile's top-level functions are methods of its class.
        sig.recv = Some(Type::pointer(Type::named(class)));
    }

    if ctx.pkg.new_func(&fd.name.name, sig).is_none() {
        return Err(rec(
            format!(
                "{} redeclared in this block\n\tprevious declaration at {}",
                fd.name.name,
                ctx.pkg_ctx.interp.position(None)
            ),
            pos,
        ));
    }
    if fd.body.is_some() {
        let key = loader_key(ctx, file_name, fd);
        ctx.pkg_ctx.new_loader(
            &key,
            LoadAction::Func {
                file: file_name.to_string(),
                decl: idx,
            },
        );
    }
    Ok(())
}

/// Loader arena key for a function body: methods are namespaced by
/// their receiver's type.
fn loader_key(ctx: &BlockCtx, file_name: &str, fd: &FuncDecl) -> String {
    if let Some(recv) = &fd.recv {
        if let Some(typ) = &recv.typ {
            if let Ok((id, _)) = get_recv_type(typ) {
                return format!("{}.{}", id.name, fd.name.name);
            }
        }
    }
    if let Some(class) = ctx.pkg_ctx.classes.get(file_name) {
        return format!("{}.{}", class.class, fd.name.name);
    }
    fd.name.name.clone()
}

fn preload_type(ctx: &mut BlockCtx, file_name: &str, td: &TypeDecl) -> Result<()> {
    if !td.type_params.is_empty() {
        return Err(fatal("type parameters are unsupported"));
    }
    new_type(ctx, &td.name)?;
    if matches!(td.typ, Expr::StructType { .. }) {
        // A classfile declaring its own class struct names its base
        // class through the leading embedded field.
        let declares_class = ctx
            .pkg_ctx
            .classes
            .get(file_name)
            .is_some_and(|c| c.class == td.name.name);
        if declares_class {
            let base = parse_type_embed_name(&td.typ)?.name.clone();
            if let Some(cls) = ctx.pkg_ctx.classes.get_mut(file_name) {
                cls.base = Some(base);
            }
        }
    } else {
        to_type(ctx, &td.typ)?;
    }
    Ok(())
}

/// Declare a named type in the package scope.
pub fn new_type(ctx: &mut BlockCtx, name: &Ident) -> Result<()> {
    let pos = ctx.pkg_ctx.pos(name.span);
    let declared = ctx.pkg.scope.declare(Symbol::TypeName {
        name: name.name.clone(),
        ty: Type::named(&name.name),
    });
    if !declared {
        return Err(rec(
            format!(
                "{} redeclared in this block\n\tprevious declaration at {}",
                name.name,
                ctx.pkg_ctx.interp.position(None)
            ),
            pos,
        ));
    }
    Ok(())
}

fn preload_var(ctx: &mut BlockCtx, file_name: &str, idx: usize, vd: &VarDecl) -> Result<()> {
    for name in &vd.names {
        if ctx.pkg_ctx.syms.contains_key(&name.name) || ctx.pkg.scope.contains(&name.name) {
            return Err(rec(
                format!(
                    "{} redeclared in this block\n\tprevious declaration at {}",
                    name.name,
                    ctx.pkg_ctx.interp.position(None)
                ),
                ctx.pkg_ctx.pos(name.span),
            ));
        }
        ctx.pkg_ctx.new_loader(
            &name.name,
            LoadAction::Var {
                file: file_name.to_string(),
                decl: idx,
            },
        );
    }
    Ok(())
}

/// Resolve the loader registered under `name`, if any. Idempotent: a
/// loader runs its action once; later calls see `Resolved`/`Failed` and
/// return immediately. `Resolving` re-entry is the cycle guard.
pub fn ensure_loaded(ctx: &mut BlockCtx, name: &str) -> Result<()> {
    let Some(&id) = ctx.pkg_ctx.syms.get(name) else {
        return Ok(());
    };
    let state = std::mem::replace(&mut ctx.pkg_ctx.loaders[id], LoaderState::Resolving);
    match state {
        LoaderState::Unresolved(action) => {
            let result = run_action(ctx, action);
            ctx.pkg_ctx.loaders[id] = match &result {
                Ok(()) => LoaderState::Resolved,
                Err(_) => LoaderState::Failed,
            };
            result
        }
        // Already running further up the stack; leave the guard in
        // place and let the outer frame finish.
        LoaderState::Resolving => Ok(()),
        done => {
            ctx.pkg_ctx.loaders[id] = done;
            Ok(())
        }
    }
}

/// Resolve every registered loader, in name order, each under the
/// recovery boundary.
pub fn resolve_all(ctx: &mut BlockCtx) -> Result<()> {
    let mut names: Vec<String> = ctx.pkg_ctx.syms.keys().cloned().collect();
    names.sort();
    for name in names {
        if let Err(e) = ensure_loaded(ctx, &name) {
            ctx.pkg_ctx.handle_err(e)?;
        }
    }
    Ok(())
}

/// Process the overload declarations queued during preload, now that
/// every candidate function is registered.
pub fn process_pending_overloads(ctx: &mut BlockCtx) -> Result<()> {
    let pending = std::mem::take(&mut ctx.pkg_ctx.pending_overloads);
    for (file, idx) in pending {
        let Some(od) = lookup_decl(ctx, &file, idx).and_then(|d| match d {
            Decl::Overload(od) => Some(od),
            _ => None,
        }) else {
            continue;
        };
        set_cur_file(ctx, &file);
        if let Err(e) = preload_overload(ctx, &od) {
            ctx.pkg_ctx.handle_err(e)?;
        }
    }
    Ok(())
}

fn lookup_decl(ctx: &BlockCtx, file: &str, idx: usize) -> Option<Decl> {
    ctx.files?.files.get(file)?.decls.get(idx).cloned()
}

fn set_cur_file(ctx: &mut BlockCtx, file: &str) {
    let id = ctx.pkg_ctx.interp.sources.add(file, "");
    ctx.pkg_ctx.cur_file = Some(id);
}

fn run_action(ctx: &mut BlockCtx, action: LoadAction) -> Result<()> {
    match action {
        LoadAction::Noop => Ok(()),
        LoadAction::Func { file, decl } => {
            let Some(Decl::Func(fd)) = lookup_decl(ctx, &file, decl) else {
                return Ok(());
            };
            set_cur_file(ctx, &file);
            compile_func_body(ctx, &file, &fd)
        }
        LoadAction::Var { file, decl } => {
            let Some(Decl::Var(vd)) = lookup_decl(ctx, &file, decl) else {
                return Ok(());
            };
            set_cur_file(ctx, &file);
            compile_var_decl(ctx, &vd)
        }
    }
}

/// Lower one function body. The signature was bound at preload; this
/// opens the function, binds parameters in a child scope, and walks the
/// statements under the per-statement recovery boundary.
fn compile_func_body(ctx: &mut BlockCtx, file_name: &str, fd: &FuncDecl) -> Result<()> {
    let Some(body) = &fd.body else {
        return Ok(());
    };
    let mut sig = build_signature(ctx, &fd.typ)?;
    if let Some(recv) = &fd.recv {
        sig.recv = Some(to_recv(ctx, recv)?);
    } else if let Some(class) = ctx.pkg_ctx.classes.get(file_name).map(|c| c.class.clone()) {
        sig.recv = Some(Type::pointer(Type::named(class)));
    }
    ctx.pkg.builder.func_start(&fd.name.name, &sig);
    ctx.enter_scope();
    let result = compile_func_inner(ctx, fd, &sig, body);
    ctx.leave_scope();
    ctx.pkg.builder.func_end();
    result
}

fn compile_func_inner(
    ctx: &mut BlockCtx,
    fd: &FuncDecl,
    sig: &Signature,
    body: &gox_ast::stmt::Block,
) -> Result<()> {
    if let Some(recv) = &fd.recv {
        if let Some(name) = recv.names.first() {
            let ty = sig.recv.clone().unwrap_or(Type::Invalid);
            ctx.declare(
                Symbol::Var {
                    name: name.name.clone(),
                    ty,
                },
                ctx.pkg_ctx.pos(name.span),
            )?;
        }
    }
    for p in &sig.params {
        if p.name.is_empty() || p.name == "_" {
            continue;
        }
        ctx.declare(
            Symbol::Var {
                name: p.name.clone(),
                ty: p.ty.clone(),
            },
            None,
        )?;
    }
    compile_body(ctx, body)
}

/// Lower a package-scope variable declaration: annotation types, or
/// initializer lowering when values are present.
fn compile_var_decl(ctx: &mut BlockCtx, vd: &VarDecl) -> Result<()> {
    // One loader per declared name shares this action; the first run
    // binds every name, later runs are no-ops.
    if vd
        .names
        .first()
        .is_some_and(|n| ctx.pkg.scope.contains(&n.name))
    {
        return Ok(());
    }
    let pos = ctx.pkg_ctx.pos(vd.span);
    let annot = match &vd.typ {
        Some(t) => Some(to_type(ctx, t)?),
        None => None,
    };
    if vd.values.is_empty() {
        let ty = annot.ok_or_else(|| rec("missing type or initializer", pos))?;
        for name in &vd.names {
            ctx.pkg.scope.bind(Symbol::Var {
                name: name.name.clone(),
                ty: ty.clone(),
            });
        }
        return Ok(());
    }
    let depth = ctx.pkg.builder.stack_depth();
    for v in &vd.values {
        compile_expr(ctx, v)?;
    }
    let got = ctx.pkg.builder.stack_depth() - depth;
    if got != vd.names.len() {
        ctx.pkg.builder.end_stmt(depth);
        return Err(rec(
            format!(
                "assignment mismatch: {} variables but {} values",
                vd.names.len(),
                got
            ),
            pos,
        ));
    }
    let names: Vec<String> = vd.names.iter().map(|n| n.name.clone()).collect();
    let tys = ctx
        .pkg
        .builder
        .define(names, pos)
        .map_err(crate::context::from_code_error)?;
    for (name, ty) in vd.names.iter().zip(tys) {
        let ty = annot.clone().unwrap_or(ty);
        ctx.pkg.scope.bind(Symbol::Var {
            name: name.name.clone(),
            ty,
        });
    }
    Ok(())
}

/// Build a host signature from a syntactic function type.
pub fn build_signature(ctx: &BlockCtx, ft: &FuncType) -> Result<Signature> {
    let mut params = Vec::new();
    for field in &ft.params {
        let typ = field
            .typ
            .as_ref()
            .ok_or_else(|| rec("missing parameter type", ctx.pkg_ctx.pos(field.span)))?;
        let ty = to_type(ctx, typ)?;
        if field.names.is_empty() {
            params.push(Param::new("", ty));
        } else {
            for name in &field.names {
                params.push(Param::new(name.name.clone(), ty.clone()));
            }
        }
    }
    let mut results = Vec::new();
    for field in &ft.results {
        let typ = field
            .typ
            .as_ref()
            .ok_or_else(|| rec("missing result type", ctx.pkg_ctx.pos(field.span)))?;
        let ty = to_type(ctx, typ)?;
        let n = field.names.len().max(1);
        for _ in 0..n {
            results.push(ty.clone());
        }
    }
    let mut sig = Signature::new(params, results);
    sig.variadic = ft.variadic;
    Ok(sig)
}

/// Resolve a receiver field to its host type: a named type or a single
/// pointer to one. Type parameters never resolve on this host.
pub fn to_recv(ctx: &BlockCtx, field: &Field) -> Result<Type> {
    let typ = field
        .typ
        .as_ref()
        .ok_or_else(|| rec("invalid recv", ctx.pkg_ctx.pos(field.span)))?;
    let (id, ptr) = get_recv_type(typ)?;
    debug_assert!(ctx.lookup_type_param(&id.name).is_none());
    let base = Type::named(&id.name);
    Ok(if ptr { Type::pointer(base) } else { base })
}

/// The embedded base-class name of a classfile's leading struct type.
pub fn parse_type_embed_name(typ: &Expr) -> Result<&Ident> {
    if let Expr::StructType { fields, .. } = typ {
        for f in fields {
            if f.names.is_empty() {
                if let Some(Expr::Ident(id)) = &f.typ {
                    return Ok(id);
                }
            }
        }
    }
    Err(rec("no embedded base class", None))
}

/// Resolve a type expression to a host type.
pub fn to_type(ctx: &BlockCtx, e: &Expr) -> Result<Type> {
    match e {
        Expr::Ident(id) => {
            if let Some(ty) = basic_type(&id.name) {
                return Ok(ty);
            }
            if let Some(ty) = ctx.lookup_type_param(&id.name) {
                return Ok(ty);
            }
            match ctx.lookup(&id.name) {
                Some(Symbol::TypeName { ty, .. }) => Ok(ty),
                _ => Err(rec(
                    format!("undefined: {}", id.name),
                    ctx.pkg_ctx.pos(id.span),
                )),
            }
        }
        Expr::Star { x, .. } => Ok(Type::pointer(to_type(ctx, x)?)),
        Expr::ArrayType { elt, .. } => Ok(Type::slice(to_type(ctx, elt)?)),
        Expr::Selector { x, sel, .. } => {
            if let Expr::Ident(base) = x.as_ref() {
                if let Some(Symbol::PkgName { pkg, .. }) = ctx.lookup(&base.name) {
                    if let Some(Symbol::TypeName { ty, .. }) = pkg.lookup(&sel.name) {
                        return Ok(ty);
                    }
                }
            }
            Err(rec(
                format!("undefined type: {}", sel.name),
                ctx.pkg_ctx.pos(sel.span),
            ))
        }
        other => Err(rec(
            format!("toType failed: unknown - {}", other.kind_name()),
            ctx.pkg_ctx.pos(other.span()),
        )),
    }
}

fn basic_type(name: &str) -> Option<Type> {
    use gox_gen::BasicKind::*;
    let kind = match name {
        "bool" => Bool,
        "int" => Int,
        "int8" => Int8,
        "int16" => Int16,
        "int32" | "rune" => Int32,
        "int64" => Int64,
        "uint" => Uint,
        "uint8" | "byte" => Uint8,
        "uint16" => Uint16,
        "uint32" => Uint32,
        "uint64" => Uint64,
        "float32" => Float32,
        "float64" => Float64,
        "string" => String,
        "error" => return Some(Type::error()),
        "any" => return Some(Type::Any),
        _ => return None,
    };
    Some(Type::Basic(kind))
}
