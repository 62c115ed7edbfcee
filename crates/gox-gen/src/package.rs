//! The package under construction and host package imports.
//!
//! Host package resolution is a collaborator concern: the driver plugs
//! an [`Importer`] in, and the lowerer only ever asks `try_import`,
//! which never fails -- a missing host package yields a [`PkgRef`] with
//! no types, and callers decide whether that matters. [`MemImporter`]
//! is the in-memory implementation used by tests and by hosts that
//! preload their package metadata.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::builder::CodeBuilder;
use crate::scope::{ConstValue, FuncRef, FuncSym, Scope, Symbol};
use crate::types::{Signature, Type};

/// An already-compiled host package: its exports, plus any methods its
/// named types carry.
#[derive(Debug, Default)]
pub struct HostPackage {
    pub path: String,
    pub name: String,
    pub scope: Scope,
    /// Methods keyed by `(type name, method name)`.
    methods: FxHashMap<(String, String), FuncRef>,
}

impl HostPackage {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        Self {
            path,
            name,
            scope: Scope::new(),
            methods: FxHashMap::default(),
        }
    }

    pub fn insert_func(&mut self, name: &str, sig: Signature) -> FuncRef {
        let f: FuncRef = Rc::new(FuncSym {
            pkg: self.path.clone(),
            name: name.to_string(),
            sig,
        });
        self.scope.bind(Symbol::Func(Rc::clone(&f)));
        f
    }

    pub fn insert_type(&mut self, name: &str, ty: Type) {
        self.scope.bind(Symbol::TypeName {
            name: name.to_string(),
            ty,
        });
    }

    pub fn insert_str_const(&mut self, name: &str, value: &str) {
        self.scope.bind(Symbol::Const {
            name: name.to_string(),
            ty: Type::Basic(crate::types::BasicKind::String),
            value: ConstValue::Str(value.to_string()),
        });
    }

    /// Attach a method to one of this package's named types.
    pub fn insert_method(&mut self, type_name: &str, name: &str, sig: Signature) -> FuncRef {
        let f: FuncRef = Rc::new(FuncSym {
            pkg: self.path.clone(),
            name: format!("{}.{}", type_name, name),
            sig,
        });
        self.methods
            .insert((type_name.to_string(), name.to_string()), Rc::clone(&f));
        f
    }

    pub fn method(&self, type_name: &str, name: &str) -> Option<FuncRef> {
        self.methods
            .get(&(type_name.to_string(), name.to_string()))
            .cloned()
    }
}

/// A reference to an imported host package. `types` is `None` when the
/// import could not be resolved; lookups then simply find nothing.
#[derive(Debug, Clone, Default)]
pub struct PkgRef {
    pub types: Option<Rc<HostPackage>>,
}

impl PkgRef {
    pub fn is_valid(&self) -> bool {
        self.types.is_some()
    }

    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.types.as_ref()?.scope.lookup(name).cloned()
    }

    pub fn method(&self, type_name: &str, name: &str) -> Option<FuncRef> {
        self.types.as_ref()?.method(type_name, name)
    }

    pub fn path(&self) -> Option<&str> {
        self.types.as_ref().map(|p| p.path.as_str())
    }
}

/// The host package resolution collaborator.
pub trait Importer {
    fn import(&self, path: &str) -> Option<Rc<HostPackage>>;
}

/// In-memory importer backed by a path table.
#[derive(Default)]
pub struct MemImporter {
    pkgs: FxHashMap<String, Rc<HostPackage>>,
}

impl MemImporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pkg: HostPackage) -> Rc<HostPackage> {
        let rc = Rc::new(pkg);
        self.pkgs.insert(rc.path.clone(), Rc::clone(&rc));
        rc
    }
}

impl Importer for MemImporter {
    fn import(&self, path: &str) -> Option<Rc<HostPackage>> {
        self.pkgs.get(path).cloned()
    }
}

/// A per-type builtin method attached from a companion host package.
#[derive(Debug, Clone)]
pub struct BuiltinMethod {
    pub name: String,
    pub func: FuncRef,
}

/// Hooks for untyped big-number literal support, wired up when the
/// numeric-extension host package is importable.
#[derive(Debug, Clone, Default)]
pub struct UntypedBig {
    pub int: Option<Type>,
    pub rat: Option<Type>,
    pub float: Option<Type>,
}

/// The host package being generated for one compilation.
pub struct Package {
    pub path: String,
    pub name: String,
    /// Package-level declarations.
    pub scope: Scope,
    /// The emission collaborator.
    pub builder: CodeBuilder,
    /// Untyped big-number configuration; set during builtin setup.
    pub untyped_big: UntypedBig,
    importer: Rc<dyn Importer>,
    imports: FxHashMap<String, PkgRef>,
    /// Per-type builtin methods attached from companion packages.
    builtin_methods: FxHashMap<Type, Vec<BuiltinMethod>>,
    /// Methods declared in this package, keyed by named-type name.
    methods: FxHashMap<String, Vec<FuncRef>>,
}

impl std::fmt::Debug for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("path", &self.path)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Package {
    pub fn new(path: impl Into<String>, name: impl Into<String>, importer: Rc<dyn Importer>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            scope: Scope::new(),
            builder: CodeBuilder::new(),
            untyped_big: UntypedBig::default(),
            importer,
            imports: FxHashMap::default(),
            builtin_methods: FxHashMap::default(),
            methods: FxHashMap::default(),
        }
    }

    /// Import a host package, caching the result. Never fails; an
    /// unresolvable path yields an empty [`PkgRef`].
    pub fn try_import(&mut self, path: &str) -> PkgRef {
        if let Some(cached) = self.imports.get(path) {
            return cached.clone();
        }
        let pkg = PkgRef {
            types: self.importer.import(path),
        };
        self.imports.insert(path.to_string(), pkg.clone());
        pkg
    }

    /// The per-type builtin method table for `ty`, creating it on first
    /// use.
    pub fn builtin_ti(&mut self, ty: Type) -> &mut Vec<BuiltinMethod> {
        self.builtin_methods.entry(ty).or_default()
    }

    pub fn builtin_method(&self, ty: &Type, name: &str) -> Option<&BuiltinMethod> {
        self.builtin_methods
            .get(ty)?
            .iter()
            .find(|m| m.name == name)
    }

    /// Declare a function in the package scope and register it as a
    /// method of its receiver's named type, if any. Returns `None` on
    /// redeclaration (free functions only; methods share a name space
    /// per receiver type).
    pub fn new_func(&mut self, name: &str, sig: Signature) -> Option<FuncRef> {
        let f: FuncRef = Rc::new(FuncSym {
            pkg: self.path.clone(),
            name: name.to_string(),
            sig: sig.clone(),
        });
        match &sig.recv {
            Some(recv) => {
                let key = recv_type_name(recv)?.to_string();
                self.methods.entry(key).or_default().push(Rc::clone(&f));
            }
            None => {
                if !self.scope.declare(Symbol::Func(Rc::clone(&f))) {
                    return None;
                }
            }
        }
        Some(f)
    }

    pub fn method(&self, type_name: &str, name: &str) -> Option<FuncRef> {
        self.methods
            .get(type_name)?
            .iter()
            .find(|f| f.name == name)
            .cloned()
    }
}

/// The named type a receiver resolves to, through one level of pointer.
pub fn recv_type_name(recv: &Type) -> Option<&str> {
    match recv {
        Type::Named(n) => Some(n),
        Type::Pointer(inner) => match inner.as_ref() {
            Type::Named(n) => Some(n),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BasicKind;

    fn test_pkg() -> Package {
        let mut imp = MemImporter::new();
        let mut fmt = HostPackage::new("fmt");
        fmt.insert_func("Println", Signature::default());
        imp.insert(fmt);
        Package::new("demo", "demo", Rc::new(imp))
    }

    #[test]
    fn try_import_caches() {
        let mut pkg = test_pkg();
        let a = pkg.try_import("fmt");
        let b = pkg.try_import("fmt");
        assert!(a.is_valid());
        assert!(Rc::ptr_eq(a.types.as_ref().unwrap(), b.types.as_ref().unwrap()));
        assert!(!pkg.try_import("no/such/pkg").is_valid());
    }

    #[test]
    fn new_func_rejects_redeclared_free_function() {
        let mut pkg = test_pkg();
        assert!(pkg.new_func("main", Signature::default()).is_some());
        assert!(pkg.new_func("main", Signature::default()).is_none());
    }

    #[test]
    fn methods_key_by_receiver_name() {
        let mut pkg = test_pkg();
        let mut sig = Signature::default();
        sig.recv = Some(Type::pointer(Type::named("Game")));
        pkg.new_func("update", sig).unwrap();
        assert!(pkg.method("Game", "update").is_some());
        assert!(pkg.method("Game", "draw").is_none());
    }

    #[test]
    fn builtin_method_lookup() {
        let mut pkg = test_pkg();
        let f: FuncRef = Rc::new(FuncSym {
            pkg: "x/stringutil".into(),
            name: "Capitalize".into(),
            sig: Signature::default(),
        });
        pkg.builtin_ti(Type::Basic(BasicKind::String)).push(BuiltinMethod {
            name: "capitalize".into(),
            func: f,
        });
        assert!(pkg
            .builtin_method(&Type::Basic(BasicKind::String), "capitalize")
            .is_some());
        assert!(pkg
            .builtin_method(&Type::Basic(BasicKind::Int), "capitalize")
            .is_none());
    }
}
