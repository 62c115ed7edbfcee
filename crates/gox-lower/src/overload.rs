//! Overload declaration validation and registration.
//!
//! Two flavors reach the preload pass: free-function overload groups and
//! method overload groups (with a receiver type). Validation never
//! aborts the compilation on its own -- every rejection is a recoverable
//! error the preload boundary turns into a diagnostic -- but the
//! boundary can be disabled so the driver (or a test) sees the raw
//! failure.

use gox_ast::decl::OverloadDecl;
use gox_ast::expr::{Expr, Ident};
use gox_gen::{FuncRef, Symbol, Type};

use crate::context::{rec, BlockCtx, Result};
use crate::decl::ensure_loaded;

/// The fixed set of overloadable operator tokens and the host method
/// suffix each maps to.
const OVERLOAD_OPS: &[(&str, &str)] = &[
    ("+", "Add"),
    ("-", "Sub"),
    ("*", "Mul"),
    ("/", "Quo"),
    ("%", "Rem"),
    ("&", "And"),
    ("|", "Or"),
    ("^", "Xor"),
    ("<<", "Lsh"),
    (">>", "Rsh"),
    ("&^", "AndNot"),
    ("==", "Eq"),
    ("!=", "Ne"),
    ("<", "Lt"),
    ("<=", "Le"),
    (">", "Gt"),
    (">=", "Ge"),
];

/// The name an overload group registers under. Operator overloads map
/// their token through the fixed operator set; any other token is not
/// overloadable.
pub fn overload_name(name: &str, operator: bool) -> Result<String> {
    if !operator {
        return Ok(name.to_string());
    }
    match OVERLOAD_OPS.iter().find(|(sym, _)| *sym == name) {
        Some((_, method)) => Ok(format!("Goxo_{}", method)),
        None => Err(rec(
            format!("TODO - can't overload operator {}", name),
            None,
        )),
    }
}

/// Resolve a receiver type expression to its named type, through at most
/// one pointer. Double indirection and non-identifier bases are
/// rejected.
pub fn get_recv_type(expr: &Expr) -> Result<(&Ident, bool)> {
    match expr {
        Expr::Ident(id) => Ok((id, false)),
        Expr::Star { x, .. } => match x.as_ref() {
            Expr::Ident(id) => Ok((id, true)),
            Expr::Star { .. } => Err(rec("invalid recv type", None)),
            _ => Err(rec("invalid recv", None)),
        },
        _ => Err(rec("invalid recv", None)),
    }
}

/// A free-function overload group must not carry a receiver.
pub fn check_overload_func(d: &OverloadDecl) -> Result<()> {
    if d.recv.is_some() {
        return Err(rec("unexpected receiver in func overload", None));
    }
    Ok(())
}

/// A method overload group must carry a receiver with a type.
pub fn check_overload_method(d: &OverloadDecl) -> Result<()> {
    match &d.recv {
        Some(field) if field.typ.is_some() => Ok(()),
        _ => Err(rec("method overload requires a receiver", None)),
    }
}

/// A method candidate's receiver type must name the declared receiver
/// type.
pub fn check_overload_method_recv_type(declared: &Ident, recv: &Expr) -> Result<()> {
    match recv {
        Expr::Ident(id) if id.name == declared.name => Ok(()),
        Expr::Ident(id) => Err(rec(
            format!("method overload recv type mismatch: {}", id.name),
            None,
        )),
        other => Err(rec(
            format!("method overload recv type mismatch: {}", other.kind_name()),
            None,
        )),
    }
}

/// Validate and register one overload declaration.
pub fn preload_overload(ctx: &mut BlockCtx, d: &OverloadDecl) -> Result<()> {
    let pos = ctx.pkg_ctx.pos(d.span);
    match &d.recv {
        None => {
            check_overload_func(d)?;
            let name = overload_name(&d.name.name, d.operator)?;
            let funcs = collect_candidates(ctx, d, None)?;
            check_dup_shapes(&funcs)?;
            register_set(ctx, &name, funcs, pos)
        }
        Some(field) => {
            check_overload_method(d)?;
            let typ = field.typ.as_ref().expect("checked above");
            let (rid, _ptr) = get_recv_type(typ)?;
            let rid = rid.clone();
            let name = overload_name(&d.name.name, d.operator)?;
            let funcs = collect_candidates(ctx, d, Some(&rid))?;
            check_dup_shapes(&funcs)?;
            register_set(ctx, &format!("{}.{}", rid.name, name), funcs, pos)
        }
    }
}

/// Resolve every candidate to a concrete, named function. A literal
/// function expression (or anything else that is not a function
/// reference) is the classic `unknown func` rejection.
fn collect_candidates(
    ctx: &mut BlockCtx,
    d: &OverloadDecl,
    recv: Option<&Ident>,
) -> Result<Vec<FuncRef>> {
    let mut funcs = Vec::with_capacity(d.funcs.len());
    for cand in &d.funcs {
        let pos = ctx.pkg_ctx.pos(cand.span());
        match cand {
            Expr::Ident(id) => {
                ensure_loaded(ctx, &id.name)?;
                match ctx.pkg.scope.lookup(&id.name) {
                    Some(Symbol::Func(f)) => funcs.push(f.clone()),
                    _ => return Err(rec(format!("undefined func: {}", id.name), pos)),
                }
            }
            Expr::Selector { x, sel, .. } => {
                let declared = recv.ok_or_else(|| rec("invalid recv", pos))?;
                check_overload_method_recv_type(declared, x)?;
                match ctx.pkg.method(&declared.name, &sel.name) {
                    Some(f) => funcs.push(f),
                    None => {
                        return Err(rec(
                            format!("undefined func: {}.{}", declared.name, sel.name),
                            pos,
                        ))
                    }
                }
            }
            other => {
                return Err(rec(
                    format!("unknown func - {}", other.kind_name()),
                    pos,
                ))
            }
        }
    }
    Ok(funcs)
}

/// Two candidates with the same discriminating parameter shape make the
/// set ambiguous.
fn check_dup_shapes(funcs: &[FuncRef]) -> Result<()> {
    for (i, a) in funcs.iter().enumerate() {
        for b in &funcs[i + 1..] {
            let same_params = a
                .sig
                .params
                .iter()
                .map(|p| &p.ty)
                .eq(b.sig.params.iter().map(|p| &p.ty));
            if same_params && a.sig.variadic == b.sig.variadic {
                return Err(rec(
                    format!(
                        "duplicate overload signature: {}",
                        Type::func(a.sig.clone())
                    ),
                    None,
                ));
            }
        }
    }
    Ok(())
}

/// Bind the overload set and a mangled `name__<n>` alias per candidate.
fn register_set(
    ctx: &mut BlockCtx,
    name: &str,
    funcs: Vec<FuncRef>,
    pos: Option<gox_common::Pos>,
) -> Result<()> {
    for (i, f) in funcs.iter().enumerate() {
        ctx.pkg.scope.bind(Symbol::Overload {
            name: format!("{}__{}", name, i),
            funcs: vec![f.clone()],
        });
    }
    if !ctx.pkg.scope.declare(Symbol::Overload {
        name: name.to_string(),
        funcs,
    }) {
        return Err(rec(
            format!("{} redeclared in this block", name),
            pos,
        ));
    }
    Ok(())
}

/// Pick the candidate of `funcs` that accepts `nargs` arguments, in
/// registration order.
pub fn select_candidate(funcs: &[FuncRef], nargs: usize) -> Option<FuncRef> {
    funcs
        .iter()
        .find(|f| {
            let sig = &f.sig;
            nargs >= sig.required_params() && (sig.variadic || nargs <= sig.params.len())
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gox_common::Span;
    use gox_gen::{FuncSym, Param, Signature};
    use std::rc::Rc;

    #[test]
    fn operator_tokens_outside_the_set_are_rejected() {
        let err = overload_name("++", true).unwrap_err();
        assert_eq!(err.message(), "TODO - can't overload operator ++");
        assert_eq!(overload_name("*", true).unwrap(), "Goxo_Mul");
        assert_eq!(overload_name("add", false).unwrap(), "add");
    }

    #[test]
    fn double_pointer_receiver_is_rejected() {
        let recv = Expr::Star {
            span: Span::dummy(),
            x: Box::new(Expr::Star {
                span: Span::dummy(),
                x: Box::new(Expr::Ident(Ident::new("T"))),
            }),
        };
        let err = get_recv_type(&recv).unwrap_err();
        assert_eq!(err.message(), "invalid recv type");
    }

    #[test]
    fn pointer_receiver_resolves() {
        let recv = Expr::Star {
            span: Span::dummy(),
            x: Box::new(Expr::Ident(Ident::new("T"))),
        };
        let (id, ptr) = get_recv_type(&recv).unwrap();
        assert_eq!(id.name, "T");
        assert!(ptr);
    }

    #[test]
    fn recv_type_mismatch_messages() {
        let declared = Ident::new("foo");
        let err =
            check_overload_method_recv_type(&declared, &Expr::Ident(Ident::new("bar")))
                .unwrap_err();
        assert_eq!(err.message(), "method overload recv type mismatch: bar");

        let lit = Expr::BasicLit(gox_ast::expr::BasicLit {
            span: Span::dummy(),
            kind: gox_ast::expr::LitKind::Int,
            value: "123".to_string(),
        });
        let err = check_overload_method_recv_type(&declared, &lit).unwrap_err();
        assert_eq!(
            err.message(),
            "method overload recv type mismatch: BasicLit"
        );
    }

    #[test]
    fn duplicate_shapes_are_ambiguous() {
        let sig = Signature::new(
            vec![Param::new("x", Type::Basic(gox_gen::BasicKind::Int))],
            vec![],
        );
        let f = |name: &str| -> FuncRef {
            Rc::new(FuncSym {
                pkg: "demo".into(),
                name: name.into(),
                sig: sig.clone(),
            })
        };
        let err = check_dup_shapes(&[f("a"), f("b")]).unwrap_err();
        assert_eq!(
            err.message(),
            "duplicate overload signature: func(int)"
        );
    }

    #[test]
    fn candidate_selection_by_arity() {
        let f = |n: usize| -> FuncRef {
            let params = (0..n)
                .map(|i| Param::new(format!("p{}", i), Type::Basic(gox_gen::BasicKind::Int)))
                .collect();
            Rc::new(FuncSym {
                pkg: "demo".into(),
                name: format!("f{}", n),
                sig: Signature::new(params, vec![]),
            })
        };
        let set = [f(0), f(2)];
        assert_eq!(select_candidate(&set, 0).unwrap().name, "f0");
        assert_eq!(select_candidate(&set, 2).unwrap().name, "f2");
        assert!(select_candidate(&set, 3).is_none());
    }
}
