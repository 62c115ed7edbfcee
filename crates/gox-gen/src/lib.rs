//! Host-language object model and code emission interface.
//!
//! The lowering stage does not generate host source itself; it drives a
//! code-generation collaborator through this crate. The collaborator is
//! a black box from the lowerer's point of view: it can declare types,
//! functions and variables, open and close lexical blocks, and emit
//! resolved expressions and statements. The implementation here records
//! everything into an op stream (enough for a backend or a test to
//! replay) while tracking just as much host typing as the lowerer's
//! sugar rules need -- the host language's own type rules are the
//! authority, not reimplemented here.
//!
//! # Architecture
//!
//! - [`types`]: host types ([`Type`], [`Signature`], [`BasicKind`])
//! - [`scope`]: flat symbol tables and the [`Symbol`] union
//! - [`package`]: the package under construction, host package imports,
//!   and the [`Importer`] collaborator
//! - [`builder`]: the recording [`CodeBuilder`]
//! - [`error`]: structured code-generation errors

pub mod builder;
pub mod error;
pub mod package;
pub mod scope;
pub mod types;

pub use builder::{CodeBuilder, Op};
pub use error::CodeError;
pub use package::{BuiltinMethod, HostPackage, Importer, MemImporter, Package, PkgRef};
pub use scope::{ConstValue, FuncRef, FuncSym, Scope, Symbol};
pub use types::{BasicKind, Param, Signature, Type};
