//! Ariadne-based rendering of accumulated diagnostics.
//!
//! The lowering core stores diagnostics as plain `(message, position)`
//! values; this module turns them into labeled, human-readable reports
//! against the original source, and into the machine-readable JSON dump
//! drivers can ship to tooling. Output is colorless so tests can assert
//! it byte-for-byte.

use std::ops::Range;

use ariadne::{Config, Label, Report, ReportKind, Source};

use gox_common::Diagnostic;

/// Render one diagnostic against its file's source text.
pub fn render_diagnostic(d: &Diagnostic, source: &str, _filename: &str) -> String {
    let config = Config::default().with_color(false);
    let len = source.len();
    let span: Range<usize> = match &d.pos {
        Some(p) => {
            let s = (p.span.start as usize).min(len);
            let e = (p.span.end as usize).min(len).max(s);
            if s == e {
                s..(s + 1).min(len.max(s + 1))
            } else {
                s..e
            }
        }
        None => 0..len.min(1),
    };

    let mut builder = Report::build(ReportKind::Error, span.clone())
        .with_message(&d.message)
        .with_config(config);
    builder.add_label(Label::new(span).with_message("reported here"));
    let report = builder.finish();

    let mut buf = Vec::new();
    let cache = Source::from(source);
    report
        .write(cache, &mut buf)
        .expect("failed to write diagnostic");
    String::from_utf8_lossy(&buf).into_owned()
}

/// Render every diagnostic in order.
pub fn render_all(diags: &[Diagnostic], source: &str, filename: &str) -> Vec<String> {
    diags
        .iter()
        .map(|d| render_diagnostic(d, source, filename))
        .collect()
}

/// The machine-readable dump of a compile's diagnostics.
pub fn to_json(diags: &[Diagnostic]) -> String {
    serde_json::to_string_pretty(diags).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gox_common::{FileId, Pos, Span};

    #[test]
    fn rendered_report_contains_message() {
        let d = Diagnostic::new(
            "undefined: foo",
            Some(Pos::new(FileId(0), Span::new(0, 3))),
        );
        let out = render_diagnostic(&d, "foo 1\n", "main.gos");
        assert!(out.contains("Error"), "missing header: {}", out);
        assert!(out.contains("undefined: foo"), "missing message: {}", out);
    }

    #[test]
    fn positionless_diagnostic_still_renders() {
        let d = Diagnostic::new("hello", None);
        let out = render_diagnostic(&d, "", "main.gos");
        assert!(out.contains("hello"));
    }

    #[test]
    fn json_dump_round_trips_messages() {
        let diags = vec![
            Diagnostic::new("first", None),
            Diagnostic::new("second", None),
        ];
        let json = to_json(&diags);
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["message"], "first");
        assert_eq!(parsed[1]["message"], "second");
    }
}
