//! The diagnostic value accumulated while lowering a package.
//!
//! Recoverable failures never abort the compilation; they are converted
//! into `Diagnostic`s and appended, in insertion order, to the package
//! context. Duplicates are permitted -- callers wanting distinct entries
//! should order by position.

use std::fmt;

use serde::Serialize;

use crate::source::Pos;

/// One reported problem: a message and, when known, a source position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub pos: Option<Pos>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, pos: Option<Pos>) -> Self {
        Self {
            message: message.into(),
            pos,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Diagnostic {}
