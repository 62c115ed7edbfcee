//! Symbol tables.
//!
//! A [`Scope`] is one flat name table. The lowerer stacks them (block
//! scopes over the package scope over the universe scope); host packages
//! expose their exports through one as well. Redeclaration is detected
//! here and reported by the caller, which owns the message wording.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::package::PkgRef;
use crate::types::{Signature, Type};

/// A concrete host function: its defining package path, name, and
/// signature. Shared by reference so overload sets and scheduler lists
/// can alias one definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncSym {
    pub pkg: String,
    pub name: String,
    pub sig: Signature,
}

pub type FuncRef = Rc<FuncSym>;

/// A constant's value, as far as this model tracks it.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Str(String),
    Int(i64),
}

/// A named entity a scope can hold.
#[derive(Debug, Clone)]
pub enum Symbol {
    Var {
        name: String,
        ty: Type,
    },
    Func(FuncRef),
    TypeName {
        name: String,
        ty: Type,
    },
    Const {
        name: String,
        ty: Type,
        value: ConstValue,
    },
    /// A language builtin from the process-wide registry, bound into a
    /// package's builtin scope when its host package imports.
    Builtin {
        name: String,
        pkg: String,
        sym: String,
    },
    /// An overload set: the ordered candidates registered under a name.
    Overload {
        name: String,
        funcs: Vec<FuncRef>,
    },
    /// An imported package bound to a name.
    PkgName {
        name: String,
        pkg: PkgRef,
    },
}

impl Symbol {
    pub fn name(&self) -> &str {
        match self {
            Symbol::Var { name, .. }
            | Symbol::TypeName { name, .. }
            | Symbol::Const { name, .. }
            | Symbol::Builtin { name, .. }
            | Symbol::Overload { name, .. }
            | Symbol::PkgName { name, .. } => name,
            Symbol::Func(f) => &f.name,
        }
    }

    /// The host type of the symbol, when it has one.
    pub fn ty(&self) -> Type {
        match self {
            Symbol::Var { ty, .. } | Symbol::TypeName { ty, .. } | Symbol::Const { ty, .. } => {
                ty.clone()
            }
            Symbol::Func(f) => Type::func(f.sig.clone()),
            // Builtins are typed at the use site, once the host symbol
            // they map to is known.
            Symbol::Builtin { .. } => Type::Invalid,
            Symbol::Overload { funcs, .. } => funcs
                .first()
                .map(|f| Type::func(f.sig.clone()))
                .unwrap_or(Type::Invalid),
            Symbol::PkgName { .. } => Type::Invalid,
        }
    }
}

/// One flat name table.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    names: FxHashMap<String, Symbol>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `sym` under its name. Returns `false` (and leaves the
    /// existing binding in place) if the name is already declared here.
    pub fn declare(&mut self, sym: Symbol) -> bool {
        let name = sym.name().to_string();
        if self.names.contains_key(&name) {
            return false;
        }
        self.names.insert(name, sym);
        true
    }

    /// Rebind `sym` unconditionally (aliases, shadow-tolerant inserts).
    pub fn bind(&mut self, sym: Symbol) {
        self.names.insert(sym.name().to_string(), sym);
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.names.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Declared names in sorted order, for deterministic walks.
    pub fn sorted_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BasicKind;

    fn var(name: &str) -> Symbol {
        Symbol::Var {
            name: name.into(),
            ty: Type::Basic(BasicKind::Int),
        }
    }

    #[test]
    fn declare_rejects_duplicates() {
        let mut s = Scope::new();
        assert!(s.declare(var("x")));
        assert!(!s.declare(var("x")));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn bind_overwrites() {
        let mut s = Scope::new();
        s.bind(var("x"));
        s.bind(Symbol::Var {
            name: "x".into(),
            ty: Type::Basic(BasicKind::String),
        });
        assert_eq!(s.lookup("x").unwrap().ty(), Type::Basic(BasicKind::String));
    }

    #[test]
    fn func_symbol_type_is_its_signature() {
        let f: FuncRef = Rc::new(FuncSym {
            pkg: "fmt".into(),
            name: "Println".into(),
            sig: Signature::default(),
        });
        assert_eq!(Symbol::Func(f).ty().to_string(), "func()");
    }
}
