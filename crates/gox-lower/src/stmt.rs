//! Statement lowering.
//!
//! Function bodies walk their statements under the per-statement
//! recovery boundary: one bad statement becomes a diagnostic and the
//! rest of the body still lowers. Command-style calls -- a bare
//! identifier or selector chain in statement position -- are recognized
//! here and rewritten into zero-argument calls when the target allows
//! it.

use gox_ast::expr::{Expr, Ident};
use gox_ast::stmt::{AssignTok, Block, RangeStmt, Stmt};
use gox_common::Pos;
use gox_gen::{Symbol, Type};

use crate::classfile::try_gox_exec;
use crate::context::{from_code_error, rec, BlockCtx, Result};
use crate::expr::{
    check_command_without_args, compile_expr, compile_func_alias, CommandClass,
};
use crate::overload::select_candidate;

/// Lower every statement of a block under the recovery boundary.
pub fn compile_body(ctx: &mut BlockCtx, block: &Block) -> Result<()> {
    for s in &block.stmts {
        if let Err(e) = compile_stmt(ctx, s) {
            ctx.pkg_ctx.handle_err(e)?;
        }
    }
    Ok(())
}

/// Lower one statement. The match is exhaustive; kinds with no rule hit
/// the `compileStmt failed: unknown - <kind>` fallback arm.
pub fn compile_stmt(ctx: &mut BlockCtx, s: &Stmt) -> Result<()> {
    let depth = ctx.pkg.builder.stack_depth();
    let r = match s {
        Stmt::Expr(x) => compile_expr_stmt(ctx, x),
        Stmt::Assign { .. } => compile_assign_stmt(ctx, s),
        Stmt::Range(range) => compile_range_stmt(ctx, range),
        Stmt::Block(b) => {
            ctx.pkg.builder.block_open();
            ctx.enter_scope();
            let r = compile_body(ctx, b);
            ctx.leave_scope();
            ctx.pkg.builder.block_close();
            r
        }
        Stmt::Return { results, span } => {
            let pos = ctx.pkg_ctx.pos(*span);
            for e in results {
                compile_expr(ctx, e)?;
            }
            let got = ctx.pkg.builder.stack_depth() - depth;
            ctx.pkg.builder.ret(got, pos).map_err(from_code_error)
        }
        Stmt::If {
            cond, body, els, span,
        } => {
            let pos = ctx.pkg_ctx.pos(*span);
            compile_expr(ctx, cond)?;
            ctx.pkg.builder.if_cond(pos).map_err(from_code_error)?;
            ctx.pkg.builder.if_then();
            ctx.enter_scope();
            let r = compile_body(ctx, body);
            ctx.leave_scope();
            r?;
            if let Some(els) = els {
                ctx.pkg.builder.if_else();
                compile_stmt(ctx, els)?;
            }
            ctx.pkg.builder.if_end();
            Ok(())
        }
        // Closed union; forward-compatibility fallback for statement
        // kinds with no lowering rule.
        Stmt::Bad { span } => Err(rec(
            format!("compileStmt failed: unknown - {}", s.kind_name()),
            ctx.pkg_ctx.pos(*span),
        )),
    };
    ctx.pkg.builder.end_stmt(depth);
    r
}

/// A bare expression in statement position. Identifiers and selector
/// chains are command-style call candidates; everything else lowers as
/// a plain expression.
fn compile_expr_stmt(ctx: &mut BlockCtx, x: &Expr) -> Result<()> {
    match x {
        Expr::Ident(id) => compile_command_ident(ctx, id),
        Expr::Selector { .. } => match check_command_without_args(x) {
            CommandClass::WithoutArgs => {
                let pos = ctx.pkg_ctx.pos(x.span());
                compile_expr(ctx, x)?;
                maybe_auto_call(ctx, pos)
            }
            CommandClass::Reference | CommandClass::Invalid => compile_expr(ctx, x),
        },
        _ => compile_expr(ctx, x),
    }
}

/// A bare identifier in statement position: rewrite to a zero-argument
/// call when the target is callable without required parameters, fall
/// back to the project's `Gox_Exec` dispatcher for unknown commands in
/// classfiles, and otherwise report the unresolved name.
fn compile_command_ident(ctx: &mut BlockCtx, id: &Ident) -> Result<()> {
    let pos = ctx.pkg_ctx.pos(id.span);
    let sym = crate::expr::compile_ident_lookup(ctx, &id.name)?;
    let Some(sym) = sym else {
        if compile_func_alias(ctx, id)? {
            return maybe_auto_call(ctx, pos);
        }
        if gox_exec_fallback(ctx, &id.name) {
            return Ok(());
        }
        return Err(rec(format!("undefined: {}", id.name), pos));
    };
    if let Symbol::Overload { funcs, .. } = &sym {
        if let Some(f) = select_candidate(funcs, 0) {
            let name = f.name.clone();
            let pkg = f.pkg.clone();
            let sig = f.sig.clone();
            crate::expr::push_func_ref(ctx, &pkg, &name, sig);
            return ctx
                .pkg
                .builder
                .call(0, false, pos)
                .map_err(from_code_error);
        }
    }
    crate::expr::push_known_symbol(ctx, &sym, pos)?;
    maybe_auto_call(ctx, pos)
}

/// Call the value on top of the stack when it is callable with no
/// required arguments; leave it as a plain reference otherwise.
fn maybe_auto_call(ctx: &mut BlockCtx, pos: Option<Pos>) -> Result<()> {
    let callable = matches!(
        ctx.pkg.builder.top_type(),
        Some(Type::Signature(sig)) if sig.required_params() == 0
    );
    if callable {
        ctx.pkg.builder.call(0, false, pos).map_err(from_code_error)?;
    }
    Ok(())
}

/// Dispatch an unknown command through the current classfile project's
/// `Gox_Exec`, when one exists.
fn gox_exec_fallback(ctx: &mut BlockCtx, command: &str) -> bool {
    let file_name = ctx
        .pkg_ctx
        .cur_file
        .and_then(|f| ctx.pkg_ctx.interp.sources.file_name(f))
        .map(str::to_string);
    let Some(key) = file_name
        .and_then(|n| ctx.pkg_ctx.classes.get(&n))
        .map(|c| c.proj_ext.clone())
    else {
        return false;
    };
    let proj = ctx.pkg_ctx.projs.get(&key);
    try_gox_exec(ctx.pkg, proj, command)
}

/// Lower an assignment, in the defining (`:=`) or plain (`=`) form.
pub fn compile_assign_stmt(ctx: &mut BlockCtx, s: &Stmt) -> Result<()> {
    let Stmt::Assign {
        span,
        tok,
        lhs,
        rhs,
    } = s
    else {
        unreachable!("compile_assign_stmt on non-assignment");
    };
    let pos = ctx.pkg_ctx.pos(*span);
    match tok {
        AssignTok::Define => {
            let mut names = Vec::with_capacity(lhs.len());
            for l in lhs {
                match l {
                    Expr::Ident(id) => names.push(id.clone()),
                    other => {
                        return Err(rec(
                            "can't define: left operand is not an identifier",
                            ctx.pkg_ctx.pos(other.span()),
                        ))
                    }
                }
            }
            let depth = ctx.pkg.builder.stack_depth();
            for r in rhs {
                compile_expr(ctx, r)?;
            }
            let got = ctx.pkg.builder.stack_depth() - depth;
            if got != names.len() {
                return Err(rec(
                    format!(
                        "assignment mismatch: {} variables but {} values",
                        names.len(),
                        got
                    ),
                    pos,
                ));
            }
            let tys = ctx
                .pkg
                .builder
                .define(names.iter().map(|n| n.name.clone()).collect(), pos)
                .map_err(from_code_error)?;
            for (id, ty) in names.iter().zip(tys) {
                if id.name == "_" {
                    continue;
                }
                ctx.declare(
                    Symbol::Var {
                        name: id.name.clone(),
                        ty,
                    },
                    ctx.pkg_ctx.pos(id.span),
                )?;
            }
            Ok(())
        }
        AssignTok::Assign => {
            for l in lhs {
                match l {
                    Expr::Ident(id) if id.name == "_" => {
                        ctx.pkg.builder.push_ref("_", Type::Any);
                    }
                    other => compile_expr(ctx, other)?,
                }
            }
            let depth = ctx.pkg.builder.stack_depth();
            for r in rhs {
                compile_expr(ctx, r)?;
            }
            let got = ctx.pkg.builder.stack_depth() - depth;
            if got != lhs.len() {
                return Err(rec(
                    format!(
                        "assignment mismatch: {} variables but {} values",
                        lhs.len(),
                        got
                    ),
                    pos,
                ));
            }
            ctx.pkg
                .builder
                .assign(lhs.len(), pos)
                .map_err(from_code_error)
        }
    }
}

/// Lower a `range` statement, in both the defining and the
/// plain-assignment forms, with the `_` placeholder honored.
pub fn compile_range_stmt(ctx: &mut BlockCtx, r: &RangeStmt) -> Result<()> {
    let pos = ctx.pkg_ctx.pos(r.span);
    compile_expr(ctx, &r.x)?;
    let define = r.tok == AssignTok::Define;
    let key = range_name(r.key.as_ref());
    let value = range_name(r.value.as_ref());
    let (kt, vt) = ctx
        .pkg
        .builder
        .range_start(define, key.clone(), value.clone(), pos)
        .map_err(from_code_error)?;
    ctx.enter_scope();
    let res = (|| {
        if define {
            if let Some(name) = key.filter(|n| n != "_") {
                ctx.declare(Symbol::Var { name, ty: kt }, pos)?;
            }
            if let Some(name) = value.filter(|n| n != "_") {
                ctx.declare(Symbol::Var { name, ty: vt }, pos)?;
            }
        }
        compile_body(ctx, &r.body)
    })();
    ctx.leave_scope();
    ctx.pkg.builder.range_end();
    res
}

fn range_name(e: Option<&Expr>) -> Option<String> {
    match e {
        Some(Expr::Ident(id)) => Some(id.name.clone()),
        _ => None,
    }
}
