//! The multi-file source map.
//!
//! A package compiles from several files at once (plain `.gos` scripts plus
//! any number of classfiles), so a position is a `(file, span)` pair. The
//! map owns each file's text and line index and renders positions as
//! `name:line:col`; a position with no file renders as `-`, matching the
//! convention of the host toolchain.

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::span::{LineIndex, Span};

/// Index of a file registered in a [`SourceMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FileId(pub u32);

/// A source position: a span inside one registered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pos {
    pub file: FileId,
    pub span: Span,
}

impl Pos {
    pub fn new(file: FileId, span: Span) -> Self {
        Self { file, span }
    }
}

struct SourceFile {
    name: String,
    text: String,
    lines: LineIndex,
}

/// Owns the text of every file in the compilation and formats positions.
#[derive(Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
    by_name: FxHashMap<String, FileId>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file and return its id. Registering the same name twice
    /// returns the original id and leaves the first text in place.
    pub fn add(&mut self, name: &str, text: &str) -> FileId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = FileId(self.files.len() as u32);
        self.files.push(SourceFile {
            name: name.to_string(),
            text: text.to_string(),
            lines: LineIndex::new(text),
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn file_name(&self, id: FileId) -> Option<&str> {
        self.files.get(id.0 as usize).map(|f| f.name.as_str())
    }

    pub fn text(&self, id: FileId) -> Option<&str> {
        self.files.get(id.0 as usize).map(|f| f.text.as_str())
    }

    /// The source text under `pos`, if the file is registered and the span
    /// is in bounds.
    pub fn snippet(&self, pos: Pos) -> Option<&str> {
        let f = self.files.get(pos.file.0 as usize)?;
        f.text
            .get(pos.span.start as usize..pos.span.end as usize)
    }

    /// Render a position as `name:line:col`. Unknown positions render `-`.
    pub fn format(&self, pos: Option<Pos>) -> String {
        match pos.and_then(|p| self.files.get(p.file.0 as usize).map(|f| (p, f))) {
            Some((p, f)) => {
                let (line, col) = f.lines.line_col(p.span.start);
                format!("{}:{}:{}", f.name, line, col)
            }
            None => "-".to_string(),
        }
    }
}
