//! Expression nodes.
//!
//! Type positions reuse `Expr` (identifiers, selectors, `*T`, struct
//! types), the way the host language's own tree does.

use gox_common::Span;

/// An identifier with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub span: Span,
    pub name: String,
}

impl Ident {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            span: Span::dummy(),
            name: name.into(),
        }
    }

    pub fn with_span(span: Span, name: impl Into<String>) -> Self {
        Self {
            span,
            name: name.into(),
        }
    }
}

/// The literal kinds the host grammar recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Int,
    Float,
    Rune,
    Str,
    /// A C string literal, produced only under the C-package bridge.
    CStr,
}

/// A basic literal carrying its raw source text (quotes included for
/// string and rune literals).
#[derive(Debug, Clone, PartialEq)]
pub struct BasicLit {
    pub span: Span,
    pub kind: LitKind,
    pub value: String,
}

/// One segment of an interpolated string literal.
#[derive(Debug, Clone, PartialEq)]
pub enum StringPart {
    Lit(String),
    Expr(Expr),
}

/// The error-propagation shorthand token: `expr?` or `expr!`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrWrapTok {
    Question,
    Not,
}

/// Binary operator tokens, named after the host methods they map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Quo,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    AndNot,
    LAnd,
    LOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Quo => "/",
            BinOp::Rem => "%",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::AndNot => "&^",
            BinOp::LAnd => "&&",
            BinOp::LOr => "||",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        }
    }
}

/// Unary operator tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

impl UnOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Not => "!",
        }
    }
}

/// An expression node. The union is closed; the lowerer matches it
/// exhaustively and reports an `unknown - <kind>` diagnostic from its
/// fallback arm for kinds it does not lower.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(Ident),
    BasicLit(BasicLit),
    /// An interpolated string: `"count: ${n}"`.
    InterpString {
        span: Span,
        parts: Vec<StringPart>,
    },
    Selector {
        span: Span,
        x: Box<Expr>,
        sel: Ident,
    },
    Call {
        span: Span,
        fun: Box<Expr>,
        args: Vec<Expr>,
        ellipsis: bool,
    },
    Binary {
        span: Span,
        op: BinOp,
        x: Box<Expr>,
        y: Box<Expr>,
    },
    Unary {
        span: Span,
        op: UnOp,
        x: Box<Expr>,
    },
    Paren {
        span: Span,
        x: Box<Expr>,
    },
    /// `*T` in type position, or pointer indirection in value position.
    Star {
        span: Span,
        x: Box<Expr>,
    },
    SliceLit {
        span: Span,
        elts: Vec<Expr>,
    },
    CompositeLit {
        span: Span,
        typ: Option<Box<Expr>>,
        elts: Vec<Expr>,
    },
    FuncLit {
        span: Span,
        typ: crate::decl::FuncType,
        body: crate::stmt::Block,
    },
    /// Single-expression lambda: `(x, y) => x + y`.
    Lambda {
        span: Span,
        lhs: Vec<Ident>,
        rhs: Box<Expr>,
    },
    /// Block-bodied lambda: `(x, y) => { ... }`.
    Lambda2 {
        span: Span,
        lhs: Vec<Ident>,
        body: crate::stmt::Block,
    },
    /// Error-propagation shorthand: `expr?` / `expr!`.
    ErrWrap {
        span: Span,
        x: Box<Expr>,
        tok: ErrWrapTok,
    },
    /// A struct type in type position; classfiles use its first embedded
    /// field to name their base class.
    StructType {
        span: Span,
        fields: Vec<crate::decl::Field>,
    },
    /// `[]T` in type position.
    ArrayType {
        span: Span,
        elt: Box<Expr>,
    },
    /// `...` -- present in the grammar, never lowered; exercises the
    /// unknown-kind fallback.
    Ellipsis {
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Ident(id) => id.span,
            Expr::BasicLit(lit) => lit.span,
            Expr::InterpString { span, .. }
            | Expr::Selector { span, .. }
            | Expr::Call { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Paren { span, .. }
            | Expr::Star { span, .. }
            | Expr::SliceLit { span, .. }
            | Expr::CompositeLit { span, .. }
            | Expr::FuncLit { span, .. }
            | Expr::Lambda { span, .. }
            | Expr::Lambda2 { span, .. }
            | Expr::ErrWrap { span, .. }
            | Expr::StructType { span, .. }
            | Expr::ArrayType { span, .. }
            | Expr::Ellipsis { span } => *span,
        }
    }

    /// The kind name used in `unknown - <kind>` diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Ident(_) => "Ident",
            Expr::BasicLit(_) => "BasicLit",
            Expr::InterpString { .. } => "InterpString",
            Expr::Selector { .. } => "SelectorExpr",
            Expr::Call { .. } => "CallExpr",
            Expr::Binary { .. } => "BinaryExpr",
            Expr::Unary { .. } => "UnaryExpr",
            Expr::Paren { .. } => "ParenExpr",
            Expr::Star { .. } => "StarExpr",
            Expr::SliceLit { .. } => "SliceLit",
            Expr::CompositeLit { .. } => "CompositeLit",
            Expr::FuncLit { .. } => "FuncLit",
            Expr::Lambda { .. } => "LambdaExpr",
            Expr::Lambda2 { .. } => "LambdaExpr2",
            Expr::ErrWrap { .. } => "ErrWrapExpr",
            Expr::StructType { .. } => "StructType",
            Expr::ArrayType { .. } => "ArrayType",
            Expr::Ellipsis { .. } => "Ellipsis",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names() {
        assert_eq!(Expr::Ellipsis { span: Span::dummy() }.kind_name(), "Ellipsis");
        assert_eq!(Expr::Ident(Ident::new("x")).kind_name(), "Ident");
    }

    #[test]
    fn selector_span_is_own() {
        let e = Expr::Selector {
            span: Span::new(2, 9),
            x: Box::new(Expr::Ident(Ident::new("foo"))),
            sel: Ident::new("bar"),
        };
        assert_eq!(e.span(), Span::new(2, 9));
    }
}
