//! Host type representation.
//!
//! A deliberately small model of the host language's types: enough for
//! the lowerer to resolve receivers, check lambda arities, classify
//! command-style calls, and key per-type builtin methods. Anything
//! subtler is the host toolchain's concern, not ours.

use std::fmt;

/// The host's predeclared basic kinds, including the untyped constant
/// kinds literals start life as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    String,
    UntypedBool,
    UntypedInt,
    UntypedRune,
    UntypedFloat,
    UntypedString,
    UntypedNil,
}

impl BasicKind {
    /// The canonical lowercase spelling of the kind.
    pub fn name(self) -> &'static str {
        match self {
            BasicKind::Bool => "bool",
            BasicKind::Int => "int",
            BasicKind::Int8 => "int8",
            BasicKind::Int16 => "int16",
            BasicKind::Int32 => "int32",
            BasicKind::Int64 => "int64",
            BasicKind::Uint => "uint",
            BasicKind::Uint8 => "uint8",
            BasicKind::Uint16 => "uint16",
            BasicKind::Uint32 => "uint32",
            BasicKind::Uint64 => "uint64",
            BasicKind::Float32 => "float32",
            BasicKind::Float64 => "float64",
            BasicKind::String => "string",
            BasicKind::UntypedBool => "untyped bool",
            BasicKind::UntypedInt => "untyped int",
            BasicKind::UntypedRune => "untyped rune",
            BasicKind::UntypedFloat => "untyped float",
            BasicKind::UntypedString => "untyped string",
            BasicKind::UntypedNil => "untyped nil",
        }
    }

    pub fn is_untyped(self) -> bool {
        matches!(
            self,
            BasicKind::UntypedBool
                | BasicKind::UntypedInt
                | BasicKind::UntypedRune
                | BasicKind::UntypedFloat
                | BasicKind::UntypedString
                | BasicKind::UntypedNil
        )
    }

    /// The typed kind an untyped constant defaults to.
    pub fn default_typed(self) -> BasicKind {
        match self {
            BasicKind::UntypedBool => BasicKind::Bool,
            BasicKind::UntypedInt => BasicKind::Int,
            BasicKind::UntypedRune => BasicKind::Int32,
            BasicKind::UntypedFloat => BasicKind::Float64,
            BasicKind::UntypedString => BasicKind::String,
            other => other,
        }
    }
}

/// A named function parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A function signature, optionally with a receiver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    pub recv: Option<Type>,
    pub params: Vec<Param>,
    pub results: Vec<Type>,
    pub variadic: bool,
}

impl Signature {
    pub fn new(params: Vec<Param>, results: Vec<Type>) -> Self {
        Self {
            recv: None,
            params,
            results,
            variadic: false,
        }
    }

    /// How many arguments a call site must supply at minimum.
    pub fn required_params(&self) -> usize {
        if self.variadic {
            self.params.len().saturating_sub(1)
        } else {
            self.params.len()
        }
    }

    /// Whether the last result is the host error interface, i.e. the
    /// shape the error-propagation shorthand needs.
    pub fn returns_error(&self) -> bool {
        matches!(self.results.last(), Some(Type::Named(n)) if n == "error")
    }
}

/// A host type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Invalid,
    Basic(BasicKind),
    /// A named (defined) type, by its declared name.
    Named(String),
    Pointer(Box<Type>),
    Slice(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Signature(Box<Signature>),
    /// The empty interface; the builtin `any`.
    Any,
}

impl Type {
    pub fn named(name: impl Into<String>) -> Type {
        Type::Named(name.into())
    }

    pub fn pointer(elem: Type) -> Type {
        Type::Pointer(Box::new(elem))
    }

    pub fn slice(elem: Type) -> Type {
        Type::Slice(Box::new(elem))
    }

    pub fn func(sig: Signature) -> Type {
        Type::Signature(Box::new(sig))
    }

    /// The host `error` interface type.
    pub fn error() -> Type {
        Type::named("error")
    }

    pub fn signature(&self) -> Option<&Signature> {
        match self {
            Type::Signature(sig) => Some(sig),
            _ => None,
        }
    }

    /// The element type a `range` over this type yields, when ranging is
    /// legal at all: `(key, value)`.
    pub fn range_elems(&self) -> Option<(Type, Type)> {
        match self {
            Type::Slice(elem) => Some((Type::Basic(BasicKind::Int), (**elem).clone())),
            Type::Map(k, v) => Some(((**k).clone(), (**v).clone())),
            Type::Basic(BasicKind::String) => Some((
                Type::Basic(BasicKind::Int),
                Type::Basic(BasicKind::Int32),
            )),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Invalid => write!(f, "<invalid>"),
            Type::Basic(k) => write!(f, "{}", k.name()),
            Type::Named(n) => write!(f, "{}", n),
            Type::Pointer(e) => write!(f, "*{}", e),
            Type::Slice(e) => write!(f, "[]{}", e),
            Type::Map(k, v) => write!(f, "map[{}]{}", k, v),
            Type::Signature(sig) => {
                write!(f, "func(")?;
                for (i, p) in sig.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if sig.variadic && i + 1 == sig.params.len() {
                        write!(f, "...")?;
                    }
                    write!(f, "{}", p.ty)?;
                }
                write!(f, ")")?;
                match sig.results.len() {
                    0 => Ok(()),
                    1 => write!(f, " {}", sig.results[0]),
                    _ => {
                        write!(f, " (")?;
                        for (i, r) in sig.results.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{}", r)?;
                        }
                        write!(f, ")")
                    }
                }
            }
            Type::Any => write!(f, "any"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(Type::Basic(BasicKind::Int).to_string(), "int");
        assert_eq!(Type::slice(Type::Basic(BasicKind::String)).to_string(), "[]string");
        assert_eq!(Type::pointer(Type::named("Game")).to_string(), "*Game");
        let sig = Signature::new(
            vec![Param::new("x", Type::Basic(BasicKind::Int))],
            vec![Type::error()],
        );
        assert_eq!(Type::func(sig).to_string(), "func(int) error");
    }

    #[test]
    fn required_params_variadic() {
        let mut sig = Signature::new(
            vec![
                Param::new("format", Type::Basic(BasicKind::String)),
                Param::new("args", Type::slice(Type::Any)),
            ],
            vec![],
        );
        sig.variadic = true;
        assert_eq!(sig.required_params(), 1);
    }

    #[test]
    fn range_elems() {
        let (k, v) = Type::slice(Type::Basic(BasicKind::String)).range_elems().unwrap();
        assert_eq!(k, Type::Basic(BasicKind::Int));
        assert_eq!(v, Type::Basic(BasicKind::String));
        assert!(Type::Basic(BasicKind::Int).range_elems().is_none());
    }

    #[test]
    fn untyped_defaults() {
        assert_eq!(BasicKind::UntypedInt.default_typed(), BasicKind::Int);
        assert_eq!(BasicKind::UntypedRune.default_typed(), BasicKind::Int32);
        assert!(BasicKind::UntypedInt.is_untyped());
        assert!(!BasicKind::Int.is_untyped());
    }
}
