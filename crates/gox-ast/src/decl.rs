//! Declaration nodes: functions, types, variables, overload groups, and
//! import specs.

use gox_common::Span;

use crate::expr::{Expr, Ident};
use crate::stmt::Block;

/// A parameter, result, receiver, or struct field. An embedded field has
/// no names; a result may be unnamed.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub span: Span,
    pub names: Vec<Ident>,
    pub typ: Option<Expr>,
}

impl Field {
    pub fn unnamed(typ: Expr) -> Self {
        Self {
            span: typ.span(),
            names: Vec::new(),
            typ: Some(typ),
        }
    }

    pub fn named(name: Ident, typ: Expr) -> Self {
        Self {
            span: name.span.cover(typ.span()),
            names: vec![name],
            typ: Some(typ),
        }
    }
}

/// A function signature in the tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FuncType {
    pub span: Span,
    pub params: Vec<Field>,
    pub results: Vec<Field>,
    pub variadic: bool,
    /// Host generics are rejected during lowering; the front end still
    /// parses the parameter list so the rejection can be positioned.
    pub type_params: Vec<Ident>,
}

/// An ordinary function or method declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub span: Span,
    pub name: Ident,
    pub recv: Option<Field>,
    pub typ: FuncType,
    pub body: Option<Block>,
}

/// A named type declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub span: Span,
    pub name: Ident,
    pub type_params: Vec<Ident>,
    pub typ: Expr,
}

/// A variable declaration, possibly with initializers.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub span: Span,
    pub names: Vec<Ident>,
    pub typ: Option<Expr>,
    pub values: Vec<Expr>,
}

/// An overload group: `func name = (f, g)` or, with `operator` set, an
/// operator overload such as `func * = (mulInt, mulFloat)`. When
/// `operator` is set the name field holds the operator token text.
#[derive(Debug, Clone, PartialEq)]
pub struct OverloadDecl {
    pub span: Span,
    pub name: Ident,
    pub operator: bool,
    pub recv: Option<Field>,
    pub funcs: Vec<Expr>,
}

/// An import spec. Paths under the `C/` prefix resolve through the
/// C-package bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub span: Span,
    pub name: Option<Ident>,
    pub path_span: Span,
    pub path: String,
}

/// A top-level declaration; closed union, matched exhaustively during
/// the preload pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Func(FuncDecl),
    Type(TypeDecl),
    Var(VarDecl),
    Overload(OverloadDecl),
    Import(ImportDecl),
    /// A declaration the front end could not form.
    Bad { span: Span },
}

impl Decl {
    pub fn span(&self) -> Span {
        match self {
            Decl::Func(d) => d.span,
            Decl::Type(d) => d.span,
            Decl::Var(d) => d.span,
            Decl::Overload(d) => d.span,
            Decl::Import(d) => d.span,
            Decl::Bad { span } => *span,
        }
    }

    /// The kind name used in `unknown decl - <kind>` diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Decl::Func(_) => "FuncDecl",
            Decl::Type(_) => "TypeDecl",
            Decl::Var(_) => "VarDecl",
            Decl::Overload(_) => "OverloadFuncDecl",
            Decl::Import(_) => "ImportDecl",
            Decl::Bad { .. } => "BadDecl",
        }
    }
}
