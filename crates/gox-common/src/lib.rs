//! Shared foundation types for the Gox compiler.
//!
//! Every later stage speaks in terms of this crate:
//!
//! - [`span`]: byte-offset spans and on-demand line/column lookup
//! - [`source`]: the multi-file source map and the `Pos` currency used
//!   by diagnostics
//! - [`diag`]: the `Diagnostic` value accumulated during lowering

pub mod diag;
pub mod source;
pub mod span;

pub use diag::Diagnostic;
pub use source::{FileId, Pos, SourceMap};
pub use span::{LineIndex, Span};
