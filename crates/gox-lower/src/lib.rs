//! Semantic lowering for the Gox language.
//!
//! Gox is a scripting-flavored strict superset of a statically typed,
//! curly-brace host language. An external front end parses source files
//! into the [`gox_ast`] tree; this crate resolves that tree into the
//! host object model of [`gox_gen`], ready for a code-generation
//! backend. The host's own type rules are delegated to `gox-gen`; what
//! lives here is the superset's semantics:
//!
//! - [`context`]: package/block contexts, loaders, and the
//!   diagnostic/recovery engine
//! - [`builtin`]: the process-wide builtin-symbol registry
//! - [`classfile`]: the class/project merger ("gmx") and classfile
//!   naming
//! - [`overload`]: operator/method overload validation
//! - [`decl`]: the preload pass and deferred declaration resolution
//! - [`expr`] / [`stmt`]: the lowering rules, including command-style
//!   calls, lambdas, the error-propagation shorthand, and `range`
//!   desugaring
//! - [`cimport`]: the C-style external package bridge
//! - [`diagnostics`]: ariadne rendering of accumulated diagnostics

pub mod builtin;
pub mod cimport;
pub mod classfile;
pub mod context;
pub mod decl;
pub mod diagnostics;
pub mod expr;
pub mod overload;
pub mod stmt;

use std::rc::Rc;

use gox_ast as ast;
use gox_common::{Diagnostic, SourceMap};
use gox_gen::{Importer, Package};

pub use builtin::{builtin_registry, get_type_name, init_builtins};
pub use cimport::{c2x_base, CPkgImporter, LookupPub, C_PUB_FILE};
pub use classfile::{
    class_name_and_ext, gen_out_file, gmx_check_projs, ClassLookup, GmxClass, GmxProject,
    ProjectDesc, WorkClass,
};
pub use context::{BlockCtx, LoadAction, LoaderState, LowerError, NodeInterp, PkgCtx};
pub use expr::{check_command_without_args, compile_expr, compile_lambda, CommandClass};
pub use overload::overload_name;
pub use stmt::compile_stmt;

/// Compilation configuration: the collaborators a driver plugs in.
pub struct Config {
    pub pkg_path: String,
    pub pkg_name: String,
    pub importer: Rc<dyn Importer>,
    pub lookup_class: Option<ClassLookup>,
    pub lookup_pub: Option<LookupPub>,
    /// Disable only in engine self-tests that assert raw failure text.
    pub recover: bool,
}

impl Config {
    pub fn new(importer: Rc<dyn Importer>) -> Self {
        Self {
            pkg_path: "main".to_string(),
            pkg_name: "main".to_string(),
            importer,
            lookup_class: None,
            lookup_pub: None,
            recover: true,
        }
    }

    pub fn with_name(mut self, path: &str, name: &str) -> Self {
        self.pkg_path = path.to_string();
        self.pkg_name = name.to_string();
        self
    }

    pub fn with_lookup_class(mut self, f: ClassLookup) -> Self {
        self.lookup_class = Some(f);
        self
    }

    pub fn with_lookup_pub(mut self, f: LookupPub) -> Self {
        self.lookup_pub = Some(f);
        self
    }

    pub fn without_recover(mut self) -> Self {
        self.recover = false;
        self
    }
}

/// A lowered package: the generated host package plus every diagnostic
/// accumulated on the way. A clean compile has an empty list.
#[derive(Debug)]
pub struct Lowered {
    pub pkg: Package,
    pub diags: Vec<Diagnostic>,
}

/// Lower one parsed package.
///
/// Control flow follows the pre-pass/lower split: classfiles merge into
/// projects first, then every file preloads (types and signatures bind,
/// bodies become loaders, overloads queue), then loaders resolve under
/// the recovery boundary, and finally the selected project's entry glue
/// is synthesized. Recoverable failures land in `Lowered::diags`; fatal
/// structural failures return `Err`.
pub fn lower(
    files: &ast::Package,
    sources: SourceMap,
    conf: Config,
) -> std::result::Result<Lowered, LowerError> {
    let Config {
        pkg_path,
        pkg_name,
        importer,
        lookup_class,
        lookup_pub,
        recover,
    } = conf;

    let mut pkg = Package::new(pkg_path, pkg_name, importer);
    let mut ctx = PkgCtx::new();
    ctx.recover = recover;
    ctx.interp = NodeInterp { sources };
    ctx.cpkgs = lookup_pub.map(CPkgImporter::new);
    ctx.builtin = init_builtins(&mut pkg);

    let names: Vec<String> = files
        .sorted_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    // Class pre-pass: merge classfiles into projects.
    let lookup = |ext: &str| lookup_class.as_ref().and_then(|l| l(ext));
    for name in &names {
        let Some(f) = files.files.get(name) else {
            continue;
        };
        let id = ctx.interp.sources.add(name, "");
        ctx.cur_file = Some(id);
        if f.is_proj || f.is_class {
            classfile::load_class(&mut ctx, &mut pkg, name, f, &lookup)?;
        }
    }

    {
        let mut bctx = BlockCtx::with_files(&mut ctx, &mut pkg, files);
        for name in &names {
            let Some(f) = files.files.get(name) else {
                continue;
            };
            let id = bctx.pkg_ctx.interp.sources.add(name, "");
            bctx.pkg_ctx.cur_file = Some(id);
            decl::preload_file(&mut bctx, name, f)?;
        }
        decl::process_pending_overloads(&mut bctx)?;
        decl::resolve_all(&mut bctx)?;
    }

    let (sel, multi) = gmx_check_projs(&ctx);
    match sel {
        Some(key) if !multi => classfile::gmx_main(&mut ctx, &mut pkg, &key)?,
        Some(_) => log::debug!("gmx: ambiguous project selection, skipping entry glue"),
        None => {}
    }

    Ok(Lowered {
        pkg,
        diags: ctx.diags,
    })
}
