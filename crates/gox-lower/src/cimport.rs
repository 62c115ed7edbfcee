//! The C-package bridge.
//!
//! Import paths under the `C/` prefix name foreign, non-host packages.
//! Locating a C package's public interface file is a collaborator
//! concern ([`LookupPub`]); the bridge only shapes the failure into a
//! recoverable diagnostic so the rest of the file still compiles.

use std::rc::Rc;

use gox_ast::decl::ImportDecl;
use gox_gen::{HostPackage, PkgRef, Symbol};

use crate::context::{BlockCtx, Result};

/// The conventional name of a C package's public interface file.
pub const C_PUB_FILE: &str = "c2gox.a.pub";

/// `lookup(import path) -> (pub file path, error)`.
pub type LookupPub = Box<dyn Fn(&str) -> std::result::Result<String, String>>;

/// The default base path bare C package names resolve under.
pub fn c2x_base(base: &str) -> String {
    if base.is_empty() {
        return "github.com/goxlang/".to_string();
    }
    let mut base = base.to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    base
}

/// Resolves C packages through the pluggable pub-file lookup.
pub struct CPkgImporter {
    lookup: LookupPub,
}

impl CPkgImporter {
    pub fn new(lookup: LookupPub) -> Self {
        Self { lookup }
    }

    pub fn import(&self, pkg_path: &str) -> std::result::Result<String, String> {
        (self.lookup)(pkg_path)
    }
}

/// Lower one import spec: C packages through the bridge, everything
/// else through the package's host importer. Unresolvable imports are
/// recoverable.
pub fn load_import(ctx: &mut BlockCtx, spec: &ImportDecl) -> Result<()> {
    let pos = ctx.pkg_ctx.pos(spec.path_span);
    if let Some(rest) = spec.path.strip_prefix("C/") {
        let name = rest.rsplit('/').next().unwrap_or(rest).to_string();
        let pkg_path = c2x_base("") + rest;
        let looked_up = ctx
            .pkg_ctx
            .cpkgs
            .as_ref()
            .map(|cp| cp.import(&pkg_path));
        match looked_up {
            Some(Ok(_pubfile)) => {
                let alias = spec.name.as_ref().map(|n| n.name.clone()).unwrap_or(name);
                // Another file of the package may have imported this
                // path already; rebinding the same package is a no-op.
                if let Some(Symbol::PkgName { pkg: existing, .. }) = ctx.lookup(&alias) {
                    if existing.path() == Some(spec.path.as_str()) {
                        return Ok(());
                    }
                }
                let mut host = HostPackage::new(spec.path.clone());
                host.name = alias.clone();
                ctx.declare(
                    Symbol::PkgName {
                        name: alias,
                        pkg: PkgRef {
                            types: Some(Rc::new(host)),
                        },
                    },
                    pos,
                )?;
            }
            Some(Err(_)) | None => {
                let at = ctx.pkg_ctx.interp.position(pos);
                ctx.pkg_ctx.handle_recover(
                    format!(
                        "{}: {} not found or not a valid C package ({} file not found).\n",
                        at, name, C_PUB_FILE
                    ),
                    pos,
                );
            }
        }
        return Ok(());
    }

    let r = ctx.pkg.try_import(&spec.path);
    if !r.is_valid() {
        ctx.pkg_ctx
            .handle_recover(format!("package {} not found", spec.path), pos);
        return Ok(());
    }
    let alias = match (&spec.name, r.types.as_ref()) {
        (Some(n), _) => n.name.clone(),
        (None, Some(p)) => p.name.clone(),
        (None, None) => unreachable!("valid PkgRef always has types"),
    };
    if let Some(Symbol::PkgName { pkg: existing, .. }) = ctx.lookup(&alias) {
        if existing.path() == r.path() {
            return Ok(());
        }
    }
    ctx.declare(Symbol::PkgName { name: alias, pkg: r }, pos)
}
