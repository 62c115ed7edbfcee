//! Compilation contexts and the diagnostic/recovery engine.
//!
//! A [`PkgCtx`] lives for one package compilation and owns everything
//! mutated along the way: the diagnostic list, the project/class tables
//! of the gmx merger, the loader arena, and the source map. A
//! [`BlockCtx`] is the per-lexical-block view: a stack of scope frames
//! over the package scope over the builtin/universe scopes, plus the
//! insertion point into the code builder.
//!
//! Recovery is an explicit error-kind check, not unwinding: lowering
//! functions return [`LowerError`], and the per-declaration and
//! per-statement boundaries feed [`LowerError::Recoverable`] values into
//! [`PkgCtx::handle_recover`] and keep going. Fatal errors propagate to
//! the driver untouched. Setting `recover` to `false` disables the
//! conversion so self-tests can assert exact failure text.

use std::fmt;

use rustc_hash::FxHashMap;

use gox_ast as ast;
use gox_common::{Diagnostic, FileId, Pos, SourceMap, Span};
use gox_gen::{CodeError, Package, Scope, Symbol, Type};

use crate::classfile::{GmxClass, GmxProject};
use crate::cimport::CPkgImporter;

/// A lowering failure: either recorded-and-survivable or pass-fatal.
#[derive(Debug)]
pub enum LowerError {
    /// Converted into a [`Diagnostic`] at the nearest recovery boundary;
    /// compilation of sibling declarations and statements continues.
    Recoverable(Diagnostic),
    /// Aborts the current lowering pass; the input has no sensible
    /// resolved form (duplicate project files, unknown classfile
    /// extension, generics on a host without them).
    Fatal(String),
}

impl LowerError {
    pub fn message(&self) -> &str {
        match self {
            LowerError::Recoverable(d) => &d.message,
            LowerError::Fatal(msg) => msg,
        }
    }
}

impl fmt::Display for LowerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for LowerError {}

pub type Result<T> = std::result::Result<T, LowerError>;

/// A recoverable failure at `pos`.
pub(crate) fn rec(msg: impl Into<String>, pos: Option<Pos>) -> LowerError {
    LowerError::Recoverable(Diagnostic::new(msg, pos))
}

/// A pass-fatal failure.
pub(crate) fn fatal(msg: impl Into<String>) -> LowerError {
    LowerError::Fatal(msg.into())
}

pub(crate) fn from_code_error(e: CodeError) -> LowerError {
    LowerError::Recoverable(Diagnostic::new(e.msg, e.pos))
}

/// Index into the loader arena.
pub type LoaderId = usize;

/// What resolving a loader does. Actions address declarations by file
/// name and declaration index, so the arena owns no AST.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadAction {
    Func { file: String, decl: usize },
    Var { file: String, decl: usize },
    /// Resolving does nothing; used for aliases that were bound eagerly.
    Noop,
}

/// The per-symbol resolution state machine. `Resolving` guards against
/// cycles; a finished loader never runs its action again.
#[derive(Debug, Clone, PartialEq)]
pub enum LoaderState {
    Unresolved(LoadAction),
    Resolving,
    Resolved,
    Failed,
}

/// Source-position services for diagnostics: position strings and call
/// captions.
#[derive(Default)]
pub struct NodeInterp {
    pub sources: SourceMap,
}

impl NodeInterp {
    /// `file:line:col`, or `-` when the position is unknown.
    pub fn position(&self, pos: Option<Pos>) -> String {
        self.sources.format(pos)
    }

    /// A caption for the call target of `e`, used in error messages:
    /// the source text of a call's function part when available,
    /// otherwise the generic caption.
    pub fn caller(&self, file: Option<FileId>, e: &ast::expr::Expr) -> String {
        if let ast::expr::Expr::Call { fun, .. } = e {
            if let Some(file) = file {
                if let Some(text) = self.sources.snippet(Pos::new(file, fun.span())) {
                    return text.to_string();
                }
            }
        }
        "the function call".to_string()
    }
}

/// Per-package compilation state.
pub struct PkgCtx {
    /// Diagnostics in insertion order; empty on a clean compile.
    pub diags: Vec<Diagnostic>,
    /// Projects of the gmx merger, keyed by canonical project extension.
    pub projs: FxHashMap<String, GmxProject>,
    /// Class descriptors, keyed by classfile name.
    pub classes: FxHashMap<String, GmxClass>,
    /// Loader table: declared name to arena index.
    pub syms: FxHashMap<String, LoaderId>,
    /// The loader arena.
    pub loaders: Vec<LoaderState>,
    /// Overload declarations seen during preload, processed once every
    /// file's functions are registered: `(file name, decl index)`.
    pub pending_overloads: Vec<(String, usize)>,
    /// The builtin scope installed for this package.
    pub builtin: Scope,
    /// The C-package bridge, when the driver configured one.
    pub cpkgs: Option<CPkgImporter>,
    pub interp: NodeInterp,
    /// Whether the recovery boundary converts recoverable failures into
    /// diagnostics (true) or propagates them raw (self-tests only).
    pub recover: bool,
    /// The file currently being lowered, for span-to-position mapping.
    pub cur_file: Option<FileId>,
}

impl Default for PkgCtx {
    fn default() -> Self {
        Self::new()
    }
}

impl PkgCtx {
    pub fn new() -> Self {
        Self {
            diags: Vec::new(),
            projs: FxHashMap::default(),
            classes: FxHashMap::default(),
            syms: FxHashMap::default(),
            loaders: Vec::new(),
            pending_overloads: Vec::new(),
            builtin: Scope::new(),
            cpkgs: None,
            interp: NodeInterp::default(),
            recover: true,
            cur_file: None,
        }
    }

    /// The position of `span` in the file currently being lowered.
    /// Synthesized nodes (dummy spans) have no position.
    pub fn pos(&self, span: Span) -> Option<Pos> {
        if span == Span::dummy() {
            return None;
        }
        self.cur_file.map(|f| Pos::new(f, span))
    }

    /// Record a recovered failure as a diagnostic.
    pub fn handle_recover(&mut self, msg: impl Into<String>, pos: Option<Pos>) {
        self.diags.push(Diagnostic::new(msg, pos));
    }

    /// The recovery boundary. Recoverable errors become diagnostics and
    /// compilation continues; fatal errors (or any error when `recover`
    /// is off) propagate.
    pub fn handle_err(&mut self, err: LowerError) -> Result<()> {
        match err {
            LowerError::Recoverable(d) if self.recover => {
                self.diags.push(d);
                Ok(())
            }
            other => Err(other),
        }
    }

    /// Register a loader under `name`. Returns `None` when the name is
    /// already taken (the caller reports the redeclaration).
    pub fn new_loader(&mut self, name: &str, action: LoadAction) -> Option<LoaderId> {
        if self.syms.contains_key(name) {
            return None;
        }
        let id = self.loaders.len();
        self.loaders.push(LoaderState::Unresolved(action));
        self.syms.insert(name.to_string(), id);
        Some(id)
    }
}

/// One scope frame of a block, with the declaration positions needed by
/// redeclaration messages.
struct Frame {
    scope: Scope,
    decl_pos: FxHashMap<String, Option<Pos>>,
}

impl Frame {
    fn new() -> Self {
        Self {
            scope: Scope::new(),
            decl_pos: FxHashMap::default(),
        }
    }
}

/// The per-lexical-block view of a compilation: scope frames over the
/// package under construction, plus loader access for deferred symbol
/// resolution. Children are entered and left through the frame stack;
/// a child never outlives its parent.
pub struct BlockCtx<'a> {
    pub pkg_ctx: &'a mut PkgCtx,
    pub pkg: &'a mut Package,
    /// The parsed package, for loader resolution. Tests that never touch
    /// loaders leave it empty.
    pub files: Option<&'a ast::Package>,
    frames: Vec<Frame>,
}

impl<'a> BlockCtx<'a> {
    pub fn new(pkg_ctx: &'a mut PkgCtx, pkg: &'a mut Package) -> Self {
        Self {
            pkg_ctx,
            pkg,
            files: None,
            frames: vec![Frame::new()],
        }
    }

    pub fn with_files(
        pkg_ctx: &'a mut PkgCtx,
        pkg: &'a mut Package,
        files: &'a ast::Package,
    ) -> Self {
        let mut ctx = Self::new(pkg_ctx, pkg);
        ctx.files = Some(files);
        ctx
    }

    pub fn enter_scope(&mut self) {
        self.frames.push(Frame::new());
    }

    pub fn leave_scope(&mut self) {
        debug_assert!(self.frames.len() > 1, "cannot leave the outermost frame");
        self.frames.pop();
    }

    /// Declare `sym` in the innermost frame. Shadowing an outer frame is
    /// fine; a second declaration in the same frame is the classic
    /// redeclaration diagnostic.
    pub fn declare(&mut self, sym: Symbol, pos: Option<Pos>) -> Result<()> {
        let name = sym.name().to_string();
        let frame = self.frames.last_mut().expect("frame stack is never empty");
        if !frame.scope.declare(sym) {
            let prev = frame.decl_pos.get(&name).copied().flatten();
            let at = self.pkg_ctx.interp.position(prev);
            return Err(rec(
                format!(
                    "{} redeclared in this block\n\tprevious declaration at {}",
                    name, at
                ),
                pos,
            ));
        }
        frame.decl_pos.insert(name, pos);
        Ok(())
    }

    /// Walk block frames innermost-out, then the package scope, then the
    /// package's builtin scope, then the process-wide registry.
    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        for frame in self.frames.iter().rev() {
            if let Some(sym) = frame.scope.lookup(name) {
                return Some(sym.clone());
            }
        }
        if let Some(sym) = self.pkg.scope.lookup(name) {
            return Some(sym.clone());
        }
        if let Some(sym) = self.pkg_ctx.builtin.lookup(name) {
            return Some(sym.clone());
        }
        crate::builtin::builtin_registry()
            .lookup(name)
            .map(|e| Symbol::Builtin {
                name: e.name.clone(),
                pkg: e.pkg.clone(),
                sym: e.sym.clone(),
            })
    }

    /// Type-parameter lookup. The host toolchain has no generics, so
    /// this is the permanent not-found fallback.
    pub fn lookup_type_param(&self, _name: &str) -> Option<Type> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use gox_gen::{BasicKind, MemImporter};

    fn test_pkg() -> Package {
        Package::new("demo", "demo", Rc::new(MemImporter::new()))
    }

    fn var(name: &str) -> Symbol {
        Symbol::Var {
            name: name.into(),
            ty: Type::Basic(BasicKind::Int),
        }
    }

    #[test]
    fn handle_recover_appends_one_diagnostic() {
        let mut ctx = PkgCtx::new();
        ctx.handle_recover("hello", None);
        assert_eq!(ctx.diags.len(), 1);
        assert_eq!(ctx.diags[0].message, "hello");
    }

    #[test]
    fn handle_err_respects_recover_flag() {
        let mut ctx = PkgCtx::new();
        ctx.handle_err(rec("oops", None)).unwrap();
        assert_eq!(ctx.diags.len(), 1);

        ctx.recover = false;
        assert!(ctx.handle_err(rec("oops", None)).is_err());
        assert!(ctx.handle_err(fatal("bad")).is_err());
        assert_eq!(ctx.diags.len(), 1);
    }

    #[test]
    fn redeclare_in_same_frame_fails() {
        let mut ctx = PkgCtx::new();
        let mut pkg = test_pkg();
        let mut bctx = BlockCtx::new(&mut ctx, &mut pkg);
        bctx.declare(var("x"), None).unwrap();
        let err = bctx.declare(var("x"), None).unwrap_err();
        assert_eq!(
            err.message(),
            "x redeclared in this block\n\tprevious declaration at -"
        );
    }

    #[test]
    fn shadowing_across_frames_is_allowed() {
        let mut ctx = PkgCtx::new();
        let mut pkg = test_pkg();
        let mut bctx = BlockCtx::new(&mut ctx, &mut pkg);
        bctx.declare(var("x"), None).unwrap();
        bctx.enter_scope();
        bctx.declare(var("x"), None).unwrap();
        bctx.leave_scope();
        assert!(bctx.lookup("x").is_some());
    }

    #[test]
    fn caller_caption() {
        use gox_ast::expr::{Expr, Ident};
        let interp = NodeInterp::default();
        let caption = interp.caller(None, &Expr::Ident(Ident::new("foo")));
        assert_eq!(caption, "the function call");
    }

    #[test]
    fn loader_names_are_unique() {
        let mut ctx = PkgCtx::new();
        assert!(ctx.new_loader("Foo", LoadAction::Noop).is_some());
        assert!(ctx.new_loader("Foo", LoadAction::Noop).is_none());
    }

    #[test]
    fn type_param_lookup_is_always_not_found() {
        let mut ctx = PkgCtx::new();
        let mut pkg = test_pkg();
        let bctx = BlockCtx::new(&mut ctx, &mut pkg);
        assert!(bctx.lookup_type_param("T").is_none());
    }
}
