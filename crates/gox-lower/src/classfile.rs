//! The class/project merger ("gmx").
//!
//! Sibling classfiles in one directory merge into a project: one primary
//! class (the file that declares the program entry point) plus any
//! number of worker classes, all described by the pluggable class-lookup
//! collaborator. The merger also owns the scheduling glue: a project's
//! support package names its scheduler method(s) through the
//! `Gox_sched` string constant, and the computed list is cached so every
//! worker shares the same canonical entry points.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use gox_ast as ast;
use gox_gen::{BasicKind, ConstValue, FuncRef, Package, PkgRef, Signature, Symbol, Type};

use crate::context::{fatal, PkgCtx, Result};

/// String constant naming a support package's scheduler methods.
pub const SCHED_CONST: &str = "Gox_sched";
/// The command-dispatch method a project class may provide.
pub const EXEC_METHOD: &str = "Gox_Exec";
/// The generated entry-glue function called from `main`.
pub const ENTRY_PREFIX: &str = "Goxt_";

const CLASS_EXT: &str = ".gox";
const DEFAULT_OUT_FILE: &str = "";
const TESTING_OUT_FILE: &str = "_test";

/// A worker class described by the class-lookup collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkClass {
    pub ext: String,
    pub class: String,
}

/// A project descriptor from the class-lookup collaborator: the
/// canonical project extension, its primary class, worker classes, and
/// the host packages providing runtime support.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDesc {
    pub ext: String,
    pub class: String,
    pub works: Vec<WorkClass>,
    pub pkg_paths: Vec<String>,
}

/// `lookup(extension) -> (project descriptor, found)`.
pub type ClassLookup = Box<dyn Fn(&str) -> Option<ProjectDesc>>;

/// One merge group: the project a directory's classfiles form.
#[derive(Debug)]
pub struct GmxProject {
    pub ext: String,
    pub class: String,
    /// Worker classes by their file extension.
    pub works: FxHashMap<String, String>,
    pub pkg_paths: Vec<String>,
    pub pkg_refs: Vec<PkgRef>,
    /// Whether a project file (entry-point declarer) joined the group.
    pub has_main: bool,
    /// Whether the support packages provide scheduling at all.
    pub has_scheds: bool,
    scheds: Option<Rc<Vec<FuncRef>>>,
}

impl GmxProject {
    /// The project's scheduling functions, computed lazily on first call
    /// and cached: repeated calls return the identical storage. A
    /// project without scheduling yields `None`, never an allocated
    /// empty list, so callers can tell "no schedulers" from "not yet
    /// computed".
    pub fn get_scheds(&mut self) -> Option<Rc<Vec<FuncRef>>> {
        if !self.has_scheds {
            return None;
        }
        if self.scheds.is_none() {
            let mut fns = Vec::new();
            for r in &self.pkg_refs {
                let listed = get_string_const(r, SCHED_CONST);
                if listed.is_empty() {
                    continue;
                }
                let names: Vec<&str> = listed.split(',').map(str::trim).collect();
                if names.len() == 1 {
                    // One scheduler serves both slots: every worker
                    // shares the same canonical entry point.
                    if let Some(f) = sched_lookup(&self.pkg_refs, names[0]) {
                        fns.push(f.clone());
                        fns.push(f);
                    }
                } else {
                    for n in names {
                        if let Some(f) = sched_lookup(&self.pkg_refs, n) {
                            fns.push(f);
                        }
                    }
                }
                break;
            }
            self.scheds = Some(Rc::new(fns));
        }
        self.scheds.clone()
    }
}

/// One classfile's association with its project.
#[derive(Debug, Clone, PartialEq)]
pub struct GmxClass {
    pub ext: String,
    pub class: String,
    /// Key of the owning project in the package context.
    pub proj_ext: String,
    /// Base class named by the classfile's own struct declaration, when
    /// it declares one explicitly.
    pub base: Option<String>,
}

/// Derive the host identifier, base file name, and recognized suffix of
/// a classfile path. Pure: `"/foo/bar.abc_yap.gox"` yields
/// `("bar_abc", "bar.abc", "_yap.gox")`.
pub fn class_name_and_ext(path: &str) -> (String, String, String) {
    let fname = path.rsplit('/').next().unwrap_or(path);
    let (clsfile, ext) = split_fname(fname);
    (fold_ident(clsfile), clsfile.to_string(), ext.to_string())
}

/// Split a classfile name into base and recognized suffix. The generic
/// classfile extension is compound: `foo_bar.gox` has suffix
/// `_bar.gox`; any other extension is taken as-is.
fn split_fname(fname: &str) -> (&str, &str) {
    let mut ext = match fname.rfind('.') {
        Some(i) => &fname[i..],
        None => "",
    };
    if ext == CLASS_EXT {
        let stem = &fname[..fname.len() - ext.len()];
        if let Some(i) = stem.rfind('_') {
            ext = &fname[i..];
        }
    }
    (&fname[..fname.len() - ext.len()], ext)
}

/// Fold a file base name into a valid host identifier: non-identifier
/// characters become `_`, runs collapse to one.
fn fold_ident(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        let mapped = if c.is_ascii_alphanumeric() { c } else { '_' };
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }
    out
}

/// Which output file a source file's declarations land in: `*_test`
/// sources go to the testing file, everything else to the default.
pub fn gen_out_file(file: &str, is_class: bool) -> &'static str {
    if file.ends_with("_test.gos") || (is_class && file.ends_with("_test.gox")) {
        return TESTING_OUT_FILE;
    }
    DEFAULT_OUT_FILE
}

/// A string constant exported by a support package, or `""`.
pub fn get_string_const(pkg: &PkgRef, name: &str) -> String {
    match pkg.lookup(name) {
        Some(Symbol::Const {
            value: ConstValue::Str(s),
            ..
        }) => s,
        _ => String::new(),
    }
}

/// A symbol a support package must export; absence is fatal.
pub fn class_ref(pkg: &PkgRef, name: &str) -> Result<Symbol> {
    pkg.lookup(name).ok_or_else(|| {
        fatal(format!(
            "{}.{} not found",
            pkg.path().unwrap_or("?"),
            name
        ))
    })
}

/// The first support package exporting a scheduler function `name`.
fn sched_lookup(refs: &[PkgRef], name: &str) -> Option<FuncRef> {
    refs.iter().find_map(|r| match r.lookup(name) {
        Some(Symbol::Func(f)) => Some(f),
        _ => None,
    })
}

/// Associate one classfile with its merge group, creating the project on
/// first sight. An unrecognized extension is fatal; so is a second
/// entry-point-declaring file in one group.
pub fn load_class<'a>(
    ctx: &'a mut PkgCtx,
    pkg: &mut Package,
    file: &str,
    f: &ast::File,
    lookup_class: &dyn Fn(&str) -> Option<ProjectDesc>,
) -> Result<&'a mut GmxProject> {
    let (_ident, _clsfile, ext) = class_name_and_ext(file);
    let desc = lookup_class(&ext).ok_or_else(|| fatal(format!("class not found: {}", ext)))?;
    let key = desc.ext.clone();

    if !ctx.projs.contains_key(&key) {
        let pkg_refs: Vec<PkgRef> = desc.pkg_paths.iter().map(|p| pkg.try_import(p)).collect();
        let has_scheds = pkg_refs
            .iter()
            .any(|r| !get_string_const(r, SCHED_CONST).is_empty());
        log::debug!("gmx: new project {} (class {})", key, desc.class);
        ctx.projs.insert(
            key.clone(),
            GmxProject {
                ext: desc.ext.clone(),
                class: desc.class.clone(),
                works: desc
                    .works
                    .iter()
                    .map(|w| (w.ext.clone(), w.class.clone()))
                    .collect(),
                pkg_paths: desc.pkg_paths.clone(),
                pkg_refs,
                has_main: false,
                has_scheds,
                scheds: None,
            },
        );
    }

    let proj = ctx.projs.get_mut(&key).expect("inserted above");
    let class = if ext == proj.ext {
        proj.class.clone()
    } else {
        proj.works
            .get(&ext)
            .cloned()
            .ok_or_else(|| fatal(format!("class not found: {}", ext)))?
    };

    if f.is_proj {
        if proj.has_main {
            return Err(fatal(format!(
                "multiple project files found: {} {}",
                proj.class, class
            )));
        }
        proj.has_main = true;
    }

    ctx.classes.insert(
        file.to_string(),
        GmxClass {
            ext,
            class,
            proj_ext: key.clone(),
            base: None,
        },
    );
    Ok(ctx.projs.get_mut(&key).expect("inserted above"))
}

/// Select the project that provides the synthesized entry glue:
/// entry-point declarers first, any project otherwise. `multi` reports
/// an ambiguous choice (more than one candidate at the winning tier's
/// level or below).
pub fn gmx_check_projs(ctx: &PkgCtx) -> (Option<String>, bool) {
    let mut keys: Vec<&String> = ctx.projs.keys().collect();
    keys.sort();
    let mut sel: Option<String> = None;
    let mut multi = false;
    for k in &keys {
        if ctx.projs[*k].has_main {
            if sel.is_none() {
                sel = Some((*k).clone());
            } else {
                multi = true;
            }
        }
    }
    if sel.is_none() {
        for k in keys {
            if sel.is_none() {
                sel = Some(k.clone());
            } else {
                multi = true;
            }
        }
    }
    (sel, multi)
}

/// Synthesize the project's `main` glue: verify the primary class
/// exists in a support package, then emit a `main` that hands off to
/// the generated `Goxt_<Class>_Main` entry.
pub fn gmx_main(ctx: &mut PkgCtx, pkg: &mut Package, key: &str) -> Result<()> {
    let (class, entry, first_pkg) = {
        let proj = match ctx.projs.get(key) {
            Some(p) => p,
            None => return Ok(()),
        };
        (
            proj.class.clone(),
            format!("{}{}_Main", ENTRY_PREFIX, proj.class),
            proj.pkg_refs.iter().find(|r| r.is_valid()).cloned(),
        )
    };
    let game_ref = first_pkg.ok_or_else(|| {
        let path = ctx
            .projs
            .get(key)
            .and_then(|p| p.pkg_paths.first())
            .cloned()
            .unwrap_or_default();
        fatal(format!("{}.{} not found", path, class))
    })?;
    class_ref(&game_ref, &class)?;

    let cb = &mut pkg.builder;
    cb.mark_autogen();
    cb.func_start("main", &Signature::default());
    cb.push_ref(&entry, Type::func(Signature::default()));
    let depth = cb.stack_depth() - 1;
    cb.call(0, false, None).map_err(crate::context::from_code_error)?;
    cb.end_stmt(depth);
    cb.func_end();
    Ok(())
}

/// Route an unresolved command through the project class's `Gox_Exec`
/// dispatcher, when it has one. Returns whether the call was emitted.
pub fn try_gox_exec(pkg: &mut Package, proj: Option<&GmxProject>, command: &str) -> bool {
    let Some(p) = proj else {
        return false;
    };
    let Some(m) = p
        .pkg_refs
        .iter()
        .find_map(|r| r.method(&p.class, EXEC_METHOD))
    else {
        return false;
    };
    let cb = &mut pkg.builder;
    let depth = cb.stack_depth();
    cb.push_ref(
        &format!("{}.{}", p.class, EXEC_METHOD),
        Type::func(m.sig.clone()),
    );
    cb.push_lit(BasicKind::UntypedString, &format!("{:?}", command));
    if cb.call(1, false, None).is_err() {
        cb.end_stmt(depth);
        return false;
    }
    cb.end_stmt(depth);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_name_and_ext_vectors() {
        let (name, clsfile, ext) = class_name_and_ext("/foo/bar.abc_yap.gox");
        assert_eq!((name.as_str(), clsfile.as_str(), ext.as_str()), ("bar_abc", "bar.abc", "_yap.gox"));

        let (name, clsfile, ext) = class_name_and_ext("/foo/get-bar_:id.yap");
        assert_eq!(
            (name.as_str(), clsfile.as_str(), ext.as_str()),
            ("get_bar_id", "get-bar_:id", ".yap")
        );
    }

    #[test]
    fn class_name_and_ext_is_idempotent() {
        let a = class_name_and_ext("/foo/bar.abc_yap.gox");
        let b = class_name_and_ext("/foo/bar.abc_yap.gox");
        assert_eq!(a, b);
    }

    #[test]
    fn out_file_buckets() {
        assert_eq!(gen_out_file("a_test.gos", false), "_test");
        assert_eq!(gen_out_file("a_test.gox", true), "_test");
        assert_eq!(gen_out_file("a_test.gox", false), "");
        assert_eq!(gen_out_file("a.gos", false), "");
    }

    #[test]
    fn string_const_of_unknown_symbol_is_empty() {
        let spx = PkgRef::default();
        assert_eq!(get_string_const(&spx, "unknown"), "");
    }

    #[test]
    fn class_ref_missing_is_fatal() {
        use std::rc::Rc;
        let pkg = PkgRef {
            types: Some(Rc::new(gox_gen::HostPackage::new("foo"))),
        };
        let err = class_ref(&pkg, "bar").unwrap_err();
        assert_eq!(err.message(), "foo.bar not found");
    }

    fn proj(has_main: bool) -> GmxProject {
        GmxProject {
            ext: String::new(),
            class: String::new(),
            works: FxHashMap::default(),
            pkg_paths: Vec::new(),
            pkg_refs: Vec::new(),
            has_main,
            has_scheds: false,
            scheds: None,
        }
    }

    #[test]
    fn check_projs_flags_two_entry_declarers() {
        let mut ctx = PkgCtx::new();
        ctx.projs.insert(".a".into(), proj(true));
        ctx.projs.insert(".b".into(), proj(true));
        let (sel, multi) = gmx_check_projs(&ctx);
        assert!(sel.is_some());
        assert!(multi);
    }

    #[test]
    fn check_projs_flags_two_plain_projects() {
        let mut ctx = PkgCtx::new();
        ctx.projs.insert(".a".into(), proj(false));
        ctx.projs.insert(".b".into(), proj(false));
        let (sel, multi) = gmx_check_projs(&ctx);
        assert_eq!(sel.as_deref(), Some(".a"));
        assert!(multi);
    }

    #[test]
    fn scheds_disabled_yields_none() {
        let mut p = proj(false);
        p.has_scheds = false;
        assert!(p.get_scheds().is_none());
    }
}
