//! The builtin-symbol registry.
//!
//! Language builtins (`echo`, `open`, `type`, the big-number kinds, ...)
//! are fixed mappings from a builtin name to a symbol in a host library
//! package. The table is process-wide, built once behind a `OnceLock`,
//! and read-only afterwards, so concurrent compilations of independent
//! packages share it freely.
//!
//! Installation into a package is a separate, per-compilation step:
//! [`init_builtins`] imports each referenced host package through the
//! package's importer and only binds the entries whose package actually
//! resolved. A missing host package silently drops its entries -- the
//! builtin just does not exist in that build. Companion packages attach
//! convenience methods to `string` and `[]string` the same way.

use std::sync::OnceLock;

use rustc_hash::FxHashMap;

use gox_gen::{BasicKind, BuiltinMethod, Package, PkgRef, Scope, Symbol, Type};

use crate::context::{rec, Result};

/// Host package providing the big-number kinds.
pub const NG_PKG: &str = "github.com/goxlang/gox/builtin/ng";
/// Host package providing line-oriented I/O builtins.
pub const IOX_PKG: &str = "github.com/goxlang/gox/builtin/iox";
/// Host package providing core runtime helpers.
pub const BUILTIN_PKG: &str = "github.com/goxlang/gox/builtin";
/// Companion package with `string` convenience methods.
pub const STRINGUTIL_PKG: &str = "github.com/goxlang/x/stringutil";
/// Companion package with `[]string` convenience methods.
pub const STRINGSLICE_PKG: &str = "github.com/goxlang/gox/builtin/stringslice";

/// One registry row: builtin name, host package path, host symbol. An
/// empty symbol in the source table means "capitalize the name".
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinEntry {
    pub name: String,
    pub pkg: String,
    pub sym: String,
}

impl BuiltinEntry {
    /// The fully qualified host symbol, `pkg.Sym`.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.pkg, self.sym)
    }
}

const BUILTIN_DEFS: &[(&str, &str, &str)] = &[
    ("bigint", NG_PKG, ""),
    ("bigrat", NG_PKG, ""),
    ("bigfloat", NG_PKG, ""),
    ("int128", NG_PKG, ""),
    ("uint128", NG_PKG, ""),
    ("lines", IOX_PKG, ""),
    ("blines", IOX_PKG, "BLines"),
    ("newRange", BUILTIN_PKG, "NewRange__0"),
    ("echo", "fmt", "Println"),
    ("print", "fmt", ""),
    ("println", "fmt", ""),
    ("printf", "fmt", ""),
    ("errorf", "fmt", ""),
    ("fprint", "fmt", ""),
    ("fprintln", "fmt", ""),
    ("sprint", "fmt", ""),
    ("sprintln", "fmt", ""),
    ("sprintf", "fmt", ""),
    ("open", "os", ""),
    ("create", "os", ""),
    ("type", "reflect", "TypeOf"),
];

/// The process-wide builtin table.
pub struct BuiltinRegistry {
    entries: Vec<BuiltinEntry>,
    by_name: FxHashMap<String, usize>,
}

impl BuiltinRegistry {
    fn build() -> Self {
        let mut entries = Vec::with_capacity(BUILTIN_DEFS.len());
        let mut by_name = FxHashMap::default();
        for &(name, pkg, sym) in BUILTIN_DEFS {
            let sym = if sym.is_empty() {
                capitalize(name)
            } else {
                sym.to_string()
            };
            by_name.insert(name.to_string(), entries.len());
            entries.push(BuiltinEntry {
                name: name.to_string(),
                pkg: pkg.to_string(),
                sym,
            });
        }
        Self { entries, by_name }
    }

    pub fn lookup(&self, name: &str) -> Option<&BuiltinEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[BuiltinEntry] {
        &self.entries
    }

    /// Entries grouped by host package, packages in sorted order so
    /// installation walks deterministically.
    pub fn by_pkg(&self) -> Vec<(&str, Vec<&BuiltinEntry>)> {
        let mut groups: Vec<(&str, Vec<&BuiltinEntry>)> = Vec::new();
        for e in &self.entries {
            match groups.iter_mut().find(|(p, _)| *p == e.pkg) {
                Some((_, v)) => v.push(e),
                None => groups.push((&e.pkg, vec![e])),
            }
        }
        groups.sort_by_key(|(p, _)| *p);
        groups
    }
}

/// The registry, built on first use and immutable afterwards.
pub fn builtin_registry() -> &'static BuiltinRegistry {
    static REGISTRY: OnceLock<BuiltinRegistry> = OnceLock::new();
    REGISTRY.get_or_init(BuiltinRegistry::build)
}

/// Install the registry into a fresh builtin scope for `pkg`.
///
/// Each entry binds only when its host package imports; a named host
/// type binds as a type name, anything callable as a single-candidate
/// overload. `any` is always present. Companion packages, when
/// importable, contribute per-type methods through the package's
/// builtin method tables.
pub fn init_builtins(pkg: &mut Package) -> Scope {
    let mut scope = Scope::new();
    for (pkg_path, entries) in builtin_registry().by_pkg() {
        let r = pkg.try_import(pkg_path);
        if !r.is_valid() {
            continue;
        }
        for e in entries {
            match r.lookup(&e.sym) {
                Some(Symbol::TypeName { ty, .. }) => scope.bind(Symbol::TypeName {
                    name: e.name.clone(),
                    ty,
                }),
                Some(Symbol::Func(f)) => scope.bind(Symbol::Overload {
                    name: e.name.clone(),
                    funcs: vec![f],
                }),
                _ => {}
            }
        }
    }
    scope.bind(Symbol::TypeName {
        name: "any".to_string(),
        ty: Type::Any,
    });

    let ng = pkg.try_import(NG_PKG);
    if ng.is_valid() {
        init_math_big(pkg, &ng);
    }
    pkg.try_import("strconv");
    pkg.try_import("strings");

    let strx = pkg.try_import(STRINGUTIL_PKG);
    if let Some(Symbol::Func(f)) = strx.lookup("Capitalize") {
        pkg.builtin_ti(Type::Basic(BasicKind::String)).push(BuiltinMethod {
            name: "Capitalize".to_string(),
            func: f,
        });
    }

    let ss = pkg.try_import(STRINGSLICE_PKG);
    if ss.is_valid() {
        let slice_str = Type::slice(Type::Basic(BasicKind::String));
        for name in [
            "Capitalize",
            "ToTitle",
            "ToUpper",
            "ToLower",
            "Repeat",
            "Replace",
            "ReplaceAll",
            "Trim",
            "TrimSpace",
            "TrimLeft",
            "TrimRight",
            "TrimPrefix",
            "TrimSuffix",
        ] {
            if let Some(Symbol::Func(f)) = ss.lookup(name) {
                pkg.builtin_ti(slice_str.clone()).push(BuiltinMethod {
                    name: name.to_string(),
                    func: f,
                });
            }
        }
    }
    scope
}

/// Wire the big-number named types into the untyped-literal hooks.
fn init_math_big(pkg: &mut Package, ng: &PkgRef) {
    let named = |name: &str| match ng.lookup(name) {
        Some(Symbol::TypeName { ty, .. }) => Some(ty),
        _ => None,
    };
    pkg.untyped_big.int = named("UntypedBigint");
    pkg.untyped_big.rat = named("UntypedBigrat");
    pkg.untyped_big.float = named("UntypedBigfloat");
}

/// The canonical name of a primitive or named type. Composite types have
/// none and fail.
pub fn get_type_name(ty: &Type) -> Result<&str> {
    match ty {
        Type::Basic(k) => Ok(k.name()),
        Type::Named(n) => Ok(n),
        other => Err(rec(format!("unnamed type: {}", other), None)),
    }
}

/// Capitalize the first byte, the host convention for exported names.
pub(crate) fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
