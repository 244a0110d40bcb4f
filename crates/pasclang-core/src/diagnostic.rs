//! Diagnostic types for error reporting.
//!
//! Every stage of the pipeline reports through a shared [`Diagnostics`]
//! sink. Errors make the sink sticky (`has_errors`); the owning stage
//! decides when to abort by raising its typed [`CompileError`]
//! afterwards, so one walk can deliver several reports.
//!
//! [`CompileError`]: crate::compiler::CompileError

use crate::source::{SourceMap, Span};
use std::fmt;

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl Severity {
    fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        }
    }
}

/// A single diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn note(message: impl Into<String>) -> Self {
        Self::new(Severity::Note, message)
    }

    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            span: None,
            notes: Vec::new(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Render the diagnostic with source context.
    ///
    /// When a span is present the offending line is quoted with a caret
    /// underlining the span, from its start column to its end column if
    /// both are on the same line, otherwise to the end of the line.
    pub fn render(&self, source_map: &SourceMap) -> String {
        let mut output = String::new();
        output.push_str(&format!("{}: {}\n", self.severity.as_str(), self.message));

        if let Some(span) = self.span {
            if let Some(source) = source_map.get(span.source) {
                let (line, col) = source.line_col(span.start);
                let (end_line, end_col) = source.line_col(span.end);
                output.push_str(&format!("  --> {}:{}:{}\n", source.name(), line, col));

                let text = source.line_text(line);
                let gutter = line.to_string().len().max(2);
                output.push_str(&format!("{:gutter$} |\n", ""));
                output.push_str(&format!("{:>gutter$} | {}\n", line, text));

                let width = if end_line == line && end_col > col {
                    end_col - col
                } else {
                    (text.chars().count() + 1).saturating_sub(col)
                };
                output.push_str(&format!(
                    "{:gutter$} | {:skip$}{}\n",
                    "",
                    "",
                    "^".repeat(width.max(1)),
                    skip = col - 1,
                ));
            }
        }

        for note in &self.notes {
            output.push_str(&format!("  = note: {}\n", note));
        }

        output
    }
}

/// A collection of diagnostics, in emission order.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    diagnostics: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    pub fn error(&mut self, span: Span, message: impl Into<String>) {
        self.push(Diagnostic::error(message).with_span(span));
    }

    pub fn warning(&mut self, span: Span, message: impl Into<String>) {
        self.push(Diagnostic::warning(message).with_span(span));
    }

    pub fn note(&mut self, message: impl Into<String>) {
        self.push(Diagnostic::note(message));
    }

    /// Sticky error flag: true once any `Severity::Error` was pushed.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Render all diagnostics.
    pub fn render(&self, source_map: &SourceMap) -> String {
        self.diagnostics
            .iter()
            .map(|d| d.render(source_map))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diag in &self.diagnostics {
            writeln!(f, "{}: {}", diag.severity.as_str(), diag.message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceMap;

    #[test]
    fn test_sticky_error_flag() {
        let mut diags = Diagnostics::new();
        assert!(!diags.has_errors());

        diags.push(Diagnostic::warning("just a warning"));
        assert!(!diags.has_errors());

        diags.push(Diagnostic::error("a real error"));
        assert!(diags.has_errors());
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn test_render_with_caret_span() {
        let mut map = SourceMap::new();
        let id = map.add_file("t.pp", "program\nbegin x := true end.");
        // Span over `true`
        let span = Span::new(id, 19, 23);

        let rendered = Diagnostic::error("unexpected type bool[0] instead of int[0]")
            .with_span(span)
            .render(&map);

        assert!(rendered.starts_with("error: unexpected type"));
        assert!(rendered.contains("--> t.pp:2:12"));
        assert!(rendered.contains("begin x := true end."));
        assert!(rendered.contains("^^^^"));
    }

    #[test]
    fn test_render_note_without_span() {
        let map = SourceMap::new();
        let rendered = Diagnostic::note("further reports may be wrong").render(&map);
        assert_eq!(rendered, "note: further reports may be wrong\n");
    }
}
