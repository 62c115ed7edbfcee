//! Expression lowering.
//!
//! One rule per AST kind. The match is exhaustive over the closed
//! union; kinds with no lowering rule fall through to the
//! `compileExpr failed: unknown - <kind>` arm so nothing ever silently
//! no-ops. Lowered values are pushed onto the code builder's stack; the
//! host's own typing of calls and operators applies there.

use gox_ast::expr::{BasicLit, BinOp, ErrWrapTok, Expr, Ident, LitKind, StringPart};
use gox_common::Pos;
use gox_gen::{BasicKind, Param, Signature, Symbol, Type};

use crate::builtin::capitalize;
use crate::context::{from_code_error, rec, BlockCtx, Result};
use crate::decl::{build_signature, ensure_loaded};
use crate::overload::select_candidate;
use crate::stmt::compile_body;

/// Classification of a bare selector chain in statement position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandClass {
    /// The chain bottoms out in an identifier: a command-style call
    /// candidate with no arguments.
    WithoutArgs,
    /// The chain bottoms out in a call expression: a plain reference,
    /// never rewritten.
    Reference,
    /// Anything else; the selector target cannot be a command.
    Invalid,
}

/// Classify a selector chain by walking to its base.
pub fn check_command_without_args(x: &Expr) -> CommandClass {
    let mut cur = x;
    loop {
        match cur {
            Expr::Selector { x, .. } => cur = x,
            Expr::Ident(_) => return CommandClass::WithoutArgs,
            Expr::Call { .. } => return CommandClass::Reference,
            _ => return CommandClass::Invalid,
        }
    }
}

/// Lower one expression, pushing its value(s).
pub fn compile_expr(ctx: &mut BlockCtx, e: &Expr) -> Result<()> {
    let pos = ctx.pkg_ctx.pos(e.span());
    match e {
        Expr::Ident(id) => compile_ident(ctx, id),
        Expr::BasicLit(lit) => compile_basic_lit(ctx, lit),
        Expr::InterpString { parts, .. } => compile_interp_string(ctx, parts, pos),
        Expr::Selector { .. } => compile_selector(ctx, e),
        Expr::Call { .. } => compile_call(ctx, e),
        Expr::Binary { op, x, y, .. } => {
            compile_expr(ctx, x)?;
            compile_expr(ctx, y)?;
            let cmp = matches!(
                op,
                BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
            );
            ctx.pkg
                .builder
                .binary(op.symbol(), cmp, pos)
                .map_err(from_code_error)
        }
        Expr::Unary { op, x, .. } => {
            compile_expr(ctx, x)?;
            ctx.pkg
                .builder
                .unary(op.symbol(), pos)
                .map_err(from_code_error)
        }
        Expr::Paren { x, .. } => compile_expr(ctx, x),
        Expr::Star { x, .. } => {
            compile_expr(ctx, x)?;
            ctx.pkg.builder.unary("*", pos).map_err(from_code_error)
        }
        Expr::SliceLit { elts, .. } => {
            for elt in elts {
                compile_expr(ctx, elt)?;
            }
            ctx.pkg
                .builder
                .slice_lit(elts.len(), pos)
                .map_err(from_code_error)
        }
        Expr::CompositeLit { typ, elts, .. } => {
            let ty = match typ {
                Some(t) => crate::decl::to_type(ctx, t)?,
                None => return Err(rec("composite literal requires a type", pos)),
            };
            for elt in elts {
                compile_expr(ctx, elt)?;
            }
            ctx.pkg
                .builder
                .composite_lit(elts.len(), ty, pos)
                .map_err(from_code_error)
        }
        Expr::FuncLit { typ, body, .. } => {
            let sig = build_signature(ctx, typ)?;
            ctx.pkg.builder.func_start("", &sig);
            ctx.enter_scope();
            let r = declare_params_and_body(ctx, &sig, body);
            ctx.leave_scope();
            ctx.pkg.builder.func_end();
            r?;
            ctx.pkg.builder.push_ref("(func literal)", Type::func(sig));
            Ok(())
        }
        Expr::ErrWrap { .. } => compile_err_wrap_expr(ctx, e),
        // Lambdas only lower against an expected signature at a call
        // site; everything else here has no lowering rule (yet).
        other => Err(rec(
            format!("compileExpr failed: unknown - {}", other.kind_name()),
            pos,
        )),
    }
}

fn declare_params_and_body(
    ctx: &mut BlockCtx,
    sig: &Signature,
    body: &gox_ast::stmt::Block,
) -> Result<()> {
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

/// Lower an identifier reference: block scopes outward, then the
/// package scope (running its loader on demand), then the function
/// alias rule, then the builtin scopes.
pub fn compile_ident(ctx: &mut BlockCtx, id: &Ident) -> Result<()> {
    let pos = ctx.pkg_ctx.pos(id.span);
    if id.name == "_" {
        return Err(rec("cannot use _ as value", pos));
    }
    if let Some(sym) = compile_ident_lookup(ctx, &id.name)? {
        return push_known_symbol(ctx, &sym, pos);
    }
    if compile_func_alias(ctx, id)? {
        return Ok(());
    }
    Err(rec(format!("undefined: {}", id.name), pos))
}

/// Push a reference to a function, qualified when foreign.
pub(crate) fn push_func_ref(ctx: &mut BlockCtx, pkg_path: &str, name: &str, sig: Signature) {
    let q = qualified_name(ctx, pkg_path, name);
    ctx.pkg.builder.push_ref(&q, Type::func(sig));
}

pub(crate) fn push_known_symbol(ctx: &mut BlockCtx, sym: &Symbol, pos: Option<Pos>) -> Result<()> {
    match sym {
        Symbol::Var { name, ty } | Symbol::TypeName { name, ty } => {
            ctx.pkg.builder.push_ref(name, ty.clone());
            Ok(())
        }
        Symbol::Const { name, ty, .. } => {
            ctx.pkg.builder.push_ref(name, ty.clone());
            Ok(())
        }
        Symbol::Func(f) => {
            let name = qualified_name(ctx, &f.pkg, &f.name);
            ctx.pkg.builder.push_ref(&name, Type::func(f.sig.clone()));
            Ok(())
        }
        Symbol::Overload { name, funcs } => {
            let ty = funcs
                .first()
                .map(|f| Type::func(f.sig.clone()))
                .unwrap_or(Type::Invalid);
            match funcs.first() {
                Some(f) => {
                    let q = qualified_name(ctx, &f.pkg, &f.name);
                    ctx.pkg.builder.push_ref(&q, ty);
                }
                None => ctx.pkg.builder.push_ref(name, ty),
            }
            Ok(())
        }
        Symbol::Builtin { name, pkg, sym } => {
            let r = ctx.pkg.try_import(pkg);
            match r.lookup(sym) {
                Some(Symbol::Func(f)) => {
                    let q = qualified_name(ctx, &f.pkg, &f.name);
                    ctx.pkg.builder.push_ref(&q, Type::func(f.sig.clone()));
                    Ok(())
                }
                Some(Symbol::TypeName { ty, .. }) => {
                    ctx.pkg.builder.push_ref(name, ty);
                    Ok(())
                }
                _ => Err(rec(format!("undefined: {}", name), pos)),
            }
        }
        Symbol::PkgName { name, .. } => Err(rec(
            format!("use of package {} without selector", name),
            pos,
        )),
    }
}

/// `pkg.Sym` for foreign symbols, bare for package-local ones.
fn qualified_name(ctx: &BlockCtx, pkg_path: &str, name: &str) -> String {
    if pkg_path == ctx.pkg.path {
        return name.to_string();
    }
    let short = pkg_path.rsplit('/').next().unwrap_or(pkg_path);
    format!("{}.{}", short, name)
}

/// The lowercase-to-exported function alias: `foo` may refer to a
/// package-scope `Foo`. Returns whether the alias resolved and was
/// pushed.
pub fn compile_func_alias(ctx: &mut BlockCtx, id: &Ident) -> Result<bool> {
    let cap = capitalize(&id.name);
    if cap == id.name {
        return Ok(false);
    }
    if ctx.pkg_ctx.syms.contains_key(&cap) {
        ensure_loaded(ctx, &cap)?;
    }
    match ctx.pkg.scope.lookup(&cap).cloned() {
        Some(Symbol::Func(f)) => {
            let q = qualified_name(ctx, &f.pkg, &f.name);
            ctx.pkg.builder.push_ref(&q, Type::func(f.sig.clone()));
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Lower a basic literal, validating its text against the host grammar.
pub fn compile_basic_lit(ctx: &mut BlockCtx, lit: &BasicLit) -> Result<()> {
    let pos = ctx.pkg_ctx.pos(lit.span);
    let kind = match lit.kind {
        LitKind::Int => parse_int_lit(&lit.value).map(|_| BasicKind::UntypedInt),
        LitKind::Float => parse_float_lit(&lit.value).map(|_| BasicKind::UntypedFloat),
        LitKind::Rune => unquote_rune(&lit.value).map(|_| BasicKind::UntypedRune),
        LitKind::Str | LitKind::CStr => {
            unquote_string(&lit.value).map(|_| BasicKind::UntypedString)
        }
    };
    match kind {
        Some(k) => {
            ctx.pkg.builder.push_lit(k, &lit.value);
            Ok(())
        }
        None => Err(rec("compileBasicLit: invalid syntax", pos)),
    }
}

fn parse_int_lit(text: &str) -> Option<i128> {
    let t: String = text.chars().filter(|&c| c != '_').collect();
    let (digits, radix) = match t.as_bytes() {
        [b'0', b'x' | b'X', rest @ ..] => (rest, 16),
        [b'0', b'o' | b'O', rest @ ..] => (rest, 8),
        [b'0', b'b' | b'B', rest @ ..] => (rest, 2),
        rest => (rest, 10),
    };
    if digits.is_empty() {
        return None;
    }
    i128::from_str_radix(std::str::from_utf8(digits).ok()?, radix).ok()
}

fn parse_float_lit(text: &str) -> Option<f64> {
    let t: String = text.chars().filter(|&c| c != '_').collect();
    if t.is_empty() || t.starts_with('+') || t.starts_with('-') {
        return None;
    }
    t.parse::<f64>().ok()
}

fn unquote_rune(text: &str) -> Option<char> {
    let inner = text.strip_prefix('\'')?.strip_suffix('\'')?;
    let s = unescape(inner)?;
    let mut chars = s.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    Some(c)
}

fn unquote_string(text: &str) -> Option<String> {
    if let Some(raw) = text.strip_prefix('`') {
        return raw.strip_suffix('`').map(str::to_string);
    }
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    unescape(inner)
}

fn unescape(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            '0' => out.push('\0'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            'x' => out.push(hex_escape(&mut chars, 2)?),
            'u' => out.push(hex_escape(&mut chars, 4)?),
            'U' => out.push(hex_escape(&mut chars, 8)?),
            _ => return None,
        }
    }
    Some(out)
}

fn hex_escape(chars: &mut std::str::Chars<'_>, n: usize) -> Option<char> {
    let mut v: u32 = 0;
    for _ in 0..n {
        v = v * 16 + chars.next()?.to_digit(16)?;
    }
    char::from_u32(v)
}

/// Lower an interpolated string into a sprint-style call over its
/// parts.
fn compile_interp_string(ctx: &mut BlockCtx, parts: &[StringPart], pos: Option<Pos>) -> Result<()> {
    let mut sig = Signature::new(
        vec![Param::new("args", Type::slice(Type::Any))],
        vec![Type::Basic(BasicKind::String)],
    );
    sig.variadic = true;
    ctx.pkg.builder.push_ref("fmt.Sprint", Type::func(sig));
    for part in parts {
        match part {
            StringPart::Lit(s) => ctx
                .pkg
                .builder
                .push_lit(BasicKind::UntypedString, &format!("{:?}", s)),
            StringPart::Expr(e) => compile_expr(ctx, e)?,
        }
    }
    ctx.pkg
        .builder
        .call(parts.len(), false, pos)
        .map_err(from_code_error)
}

fn compile_selector(ctx: &mut BlockCtx, e: &Expr) -> Result<()> {
    let Expr::Selector { x, sel, span } = e else {
        unreachable!("compile_selector on non-selector");
    };
    let pos = ctx.pkg_ctx.pos(*span);

    // Package member reference.
    if let Expr::Ident(base) = x.as_ref() {
        if let Some(Symbol::PkgName { pkg, .. }) = ctx.lookup(&base.name) {
            let q = format!("{}.{}", base.name, sel.name);
            return match pkg.lookup(&sel.name) {
                Some(Symbol::Func(f)) => {
                    ctx.pkg.builder.push_ref(&q, Type::func(f.sig.clone()));
                    Ok(())
                }
                Some(Symbol::TypeName { ty, .. })
                | Some(Symbol::Var { ty, .. })
                | Some(Symbol::Const { ty, .. }) => {
                    ctx.pkg.builder.push_ref(&q, ty);
                    Ok(())
                }
                _ => Err(rec(format!("undefined: {}", q), pos)),
            };
        }
    }

    // Member of a value.
    compile_expr(ctx, x)?;
    let recv_ty = ctx
        .pkg
        .builder
        .top_type()
        .cloned()
        .unwrap_or(Type::Invalid);
    let builtin = ctx
        .pkg
        .builtin_method(&recv_ty, &sel.name)
        .map(|m| Type::func(m.func.sig.clone()));
    if let Some(ty) = builtin {
        ctx.pkg.builder.member(&sel.name, ty);
        return Ok(());
    }
    let base = match &recv_ty {
        Type::Named(n) => Some(n.clone()),
        Type::Pointer(inner) => match inner.as_ref() {
            Type::Named(n) => Some(n.clone()),
            _ => None,
        },
        _ => None,
    };
    if let Some(n) = base {
        let method = ctx.pkg.method(&n, &sel.name).map(|f| Type::func(f.sig.clone()));
        if let Some(ty) = method {
            ctx.pkg.builder.member(&sel.name, ty);
            return Ok(());
        }
    }
    Err(rec(
        format!(
            "undefined (type {} has no field or method {})",
            recv_ty, sel.name
        ),
        pos,
    ))
}

fn compile_call(ctx: &mut BlockCtx, e: &Expr) -> Result<()> {
    let Expr::Call {
        fun,
        args,
        ellipsis,
        span,
    } = e
    else {
        unreachable!("compile_call on non-call");
    };
    let pos = ctx.pkg_ctx.pos(*span);

    match fun.as_ref() {
        Expr::Ident(id) => {
            let sym = compile_ident_lookup(ctx, &id.name)?;
            match sym {
                Some(Symbol::Overload { name, funcs }) => {
                    let f = select_candidate(&funcs, args.len()).ok_or_else(|| {
                        rec(
                            format!("cannot call {} with {} arguments", name, args.len()),
                            pos,
                        )
                    })?;
                    let q = qualified_name(ctx, &f.pkg, &f.name);
                    ctx.pkg.builder.push_ref(&q, Type::func(f.sig.clone()));
                }
                Some(other) => push_known_symbol(ctx, &other, pos)?,
                None => {
                    if !compile_func_alias(ctx, id)? {
                        return Err(rec(
                            format!("undefined: {}", id.name),
                            ctx.pkg_ctx.pos(id.span),
                        ));
                    }
                }
            }
        }
        other => compile_expr(ctx, other)?,
    }

    let callee_sig = ctx
        .pkg
        .builder
        .top_type()
        .and_then(Type::signature)
        .cloned();
    for (i, arg) in args.iter().enumerate() {
        match arg {
            Expr::Lambda { .. } | Expr::Lambda2 { .. } => {
                let expected = callee_sig.as_ref().and_then(|s| {
                    let p = if s.variadic && i + 1 >= s.params.len() {
                        s.params.last()
                    } else {
                        s.params.get(i)
                    };
                    p.and_then(|p| p.ty.signature()).cloned()
                });
                let Some(lam_sig) = expected else {
                    return Err(rec(
                        "cannot use lambda expression as argument",
                        ctx.pkg_ctx.pos(arg.span()),
                    ));
                };
                compile_lambda(ctx, arg, &lam_sig)?;
            }
            _ => compile_expr(ctx, arg)?,
        }
    }
    let r = ctx.pkg.builder.call(args.len(), *ellipsis, pos);
    r.map_err(|err| {
        // Arity failures name the call target, captioned from source
        // when the file text is available.
        if err.msg.ends_with("arguments in call") {
            let caption = ctx.pkg_ctx.interp.caller(ctx.pkg_ctx.cur_file, e);
            rec(format!("{} to {}", err.msg, caption), err.pos)
        } else {
            from_code_error(err)
        }
    })
}

pub(crate) fn compile_ident_lookup(ctx: &mut BlockCtx, name: &str) -> Result<Option<Symbol>> {
    if let Some(sym) = ctx.lookup(name) {
        return Ok(Some(sym));
    }
    ensure_loaded(ctx, name)?;
    Ok(ctx.pkg.scope.lookup(name).cloned())
}

/// Lower a lambda of either syntactic form against its expected
/// signature. Both forms share the one arity check.
pub fn compile_lambda(ctx: &mut BlockCtx, e: &Expr, sig: &Signature) -> Result<()> {
    let (lhs, span) = match e {
        Expr::Lambda { lhs, span, .. } | Expr::Lambda2 { lhs, span, .. } => (lhs, *span),
        other => {
            return Err(rec(
                format!("compileExpr failed: unknown - {}", other.kind_name()),
                ctx.pkg_ctx.pos(other.span()),
            ))
        }
    };
    let pos = ctx.pkg_ctx.pos(span);
    if lhs.len() != sig.params.len() {
        let verb = if lhs.len() > sig.params.len() {
            "too many"
        } else {
            "too few"
        };
        let have: Vec<&str> = lhs.iter().map(|id| id.name.as_str()).collect();
        let want: Vec<String> = sig.params.iter().map(|p| p.ty.to_string()).collect();
        return Err(rec(
            format!(
                "{} arguments in lambda expression\n\thave ({})\n\twant ({})",
                verb,
                have.join(", "),
                want.join(", ")
            ),
            pos,
        ));
    }

    ctx.pkg.builder.func_start("", sig);
    ctx.enter_scope();
    let r = compile_lambda_body(ctx, e, lhs, sig);
    ctx.leave_scope();
    ctx.pkg.builder.func_end();
    r?;
    ctx.pkg.builder.push_ref("(lambda)", Type::func(sig.clone()));
    Ok(())
}

fn compile_lambda_body(
    ctx: &mut BlockCtx,
    e: &Expr,
    lhs: &[Ident],
    sig: &Signature,
) -> Result<()> {
    for (id, p) in lhs.iter().zip(&sig.params) {
        if id.name == "_" {
            continue;
        }
        ctx.declare(
            Symbol::Var {
                name: id.name.clone(),
                ty: p.ty.clone(),
            },
            ctx.pkg_ctx.pos(id.span),
        )?;
    }
    match e {
        Expr::Lambda { rhs, .. } => {
            let depth = ctx.pkg.builder.stack_depth();
            compile_expr(ctx, rhs)?;
            let got = ctx.pkg.builder.stack_depth() - depth;
            if sig.results.is_empty() {
                ctx.pkg.builder.end_stmt(depth);
                Ok(())
            } else {
                ctx.pkg
                    .builder
                    .ret(got, ctx.pkg_ctx.pos(rhs.span()))
                    .map_err(from_code_error)
            }
        }
        Expr::Lambda2 { body, .. } => compile_body(ctx, body),
        _ => unreachable!("checked by compile_lambda"),
    }
}

/// Lower the error-propagation shorthand. Outside a function body there
/// is no result shape to propagate into, so `expr?` is illegal at
/// package scope.
pub fn compile_err_wrap_expr(ctx: &mut BlockCtx, e: &Expr) -> Result<()> {
    let Expr::ErrWrap { x, tok, span } = e else {
        unreachable!("compile_err_wrap_expr on non-errwrap");
    };
    let pos = ctx.pkg_ctx.pos(*span);
    if !ctx.pkg.builder.in_func() {
        let t = match tok {
            ErrWrapTok::Question => "?",
            ErrWrapTok::Not => "!",
        };
        return Err(rec(format!("can't use expr{} in global", t), pos));
    }
    compile_expr(ctx, x)?;
    ctx.pkg.builder.err_prop(pos).map_err(from_code_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gox_common::Span;

    fn sel(x: Expr, name: &str) -> Expr {
        Expr::Selector {
            span: Span::dummy(),
            x: Box::new(x),
            sel: Ident::new(name),
        }
    }

    #[test]
    fn selector_chain_on_ident_is_a_command_candidate() {
        let chain = sel(sel(Expr::Ident(Ident::new("foo")), "bar"), "val");
        assert_eq!(check_command_without_args(&chain), CommandClass::WithoutArgs);
    }

    #[test]
    fn selector_chain_on_call_is_a_plain_reference() {
        let call = Expr::Call {
            span: Span::dummy(),
            fun: Box::new(Expr::Ident(Ident::new("f"))),
            args: vec![],
            ellipsis: false,
        };
        assert_eq!(check_command_without_args(&sel(call, "x")), CommandClass::Reference);
    }

    #[test]
    fn selector_chain_on_literal_is_invalid() {
        let lit = Expr::BasicLit(BasicLit {
            span: Span::dummy(),
            kind: LitKind::Int,
            value: "1".into(),
        });
        assert_eq!(check_command_without_args(&sel(lit, "x")), CommandClass::Invalid);
    }

    #[test]
    fn int_literal_forms() {
        assert_eq!(parse_int_lit("42"), Some(42));
        assert_eq!(parse_int_lit("0x2A"), Some(42));
        assert_eq!(parse_int_lit("0b101"), Some(5));
        assert_eq!(parse_int_lit("1_000"), Some(1000));
        assert_eq!(parse_int_lit("0x"), None);
        assert_eq!(parse_int_lit(""), None);
    }

    #[test]
    fn string_unquoting() {
        assert_eq!(unquote_string("\"hi\\n\""), Some("hi\n".to_string()));
        assert_eq!(unquote_string("`raw\\n`"), Some("raw\\n".to_string()));
        // No quotes at all: invalid syntax.
        assert_eq!(unquote_string("\\\\x"), None);
        assert_eq!(unquote_string("\"\\q\""), None);
    }

    #[test]
    fn rune_unquoting() {
        assert_eq!(unquote_rune("'a'"), Some('a'));
        assert_eq!(unquote_rune("'\\n'"), Some('\n'));
        assert_eq!(unquote_rune("'ab'"), None);
    }
}
