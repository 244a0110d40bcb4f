//! Source file management for diagnostics.
//!
//! The [`SourceMap`] owns the contents of every compiled file and hands
//! out [`SourceId`]s. Spans are byte ranges into a source; line, column
//! and beginning-of-line offsets are derived on demand so that
//! diagnostics can quote the offending line with a caret underneath.

use std::collections::HashMap;
use std::path::PathBuf;

/// Unique identifier for a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub u32);

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// A source file with its content and metadata.
#[derive(Debug, Clone)]
pub struct Source {
    /// Unique ID for this source.
    pub id: SourceId,
    /// Optional file path (None for inline sources).
    pub path: Option<PathBuf>,
    /// The source code content.
    pub content: String,
}

impl Source {
    /// Get a display name for this source.
    pub fn name(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| format!("<source#{}>", self.id.0))
    }

    /// Get 1-based line and column for a byte offset.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let mut line = 1;
        let mut col = 1;
        for (i, ch) in self.content.char_indices() {
            if i >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        (line, col)
    }

    /// Byte offset of the beginning of the line containing `offset`.
    pub fn line_start(&self, offset: usize) -> usize {
        let upto = &self.content[..offset.min(self.content.len())];
        upto.rfind('\n').map(|i| i + 1).unwrap_or(0)
    }

    /// The text of a 1-based line, without its terminator.
    pub fn line_text(&self, line: usize) -> &str {
        self.content.lines().nth(line.saturating_sub(1)).unwrap_or("")
    }

    /// Number of lines in the source.
    pub fn line_count(&self) -> usize {
        self.content.lines().count()
    }
}

/// Manages a collection of source files.
#[derive(Debug, Default, Clone)]
pub struct SourceMap {
    sources: HashMap<SourceId, Source>,
    path_to_id: HashMap<PathBuf, SourceId>,
    next_id: u32,
}

impl SourceMap {
    /// Create a new empty source map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source file with a path.
    pub fn add_file(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> SourceId {
        let path = path.into();
        let content = content.into();

        // Return existing ID if already added
        if let Some(&id) = self.path_to_id.get(&path) {
            return id;
        }

        let id = SourceId(self.next_id);
        self.next_id += 1;

        self.path_to_id.insert(path.clone(), id);
        self.sources.insert(
            id,
            Source {
                id,
                path: Some(path),
                content,
            },
        );

        id
    }

    /// Add an inline source (no path).
    pub fn add_inline(&mut self, content: impl Into<String>) -> SourceId {
        let id = SourceId(self.next_id);
        self.next_id += 1;

        self.sources.insert(
            id,
            Source {
                id,
                path: None,
                content: content.into(),
            },
        );

        id
    }

    /// Get a source by ID.
    pub fn get(&self, id: SourceId) -> Option<&Source> {
        self.sources.get(&id)
    }
}

/// A location in source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    /// Source file ID.
    pub source: SourceId,
    /// Start byte offset.
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Create a new span.
    pub fn new(source: SourceId, start: usize, end: usize) -> Self {
        Self { source, start, end }
    }

    /// Create a zero-length span at a position.
    pub fn point(source: SourceId, offset: usize) -> Self {
        Self::new(source, offset, offset)
    }

    /// Merge two spans (smallest start to largest end).
    pub fn merge(self, other: Self) -> Self {
        debug_assert_eq!(self.source, other.source);
        Self {
            source: self.source,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Self {
            source: SourceId(0),
            start: 0,
            end: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col() {
        let mut map = SourceMap::new();
        let id = map.add_inline("program\nbegin\nend.\n");
        let source = map.get(id).unwrap();

        assert_eq!(source.line_col(0), (1, 1));
        assert_eq!(source.line_col(8), (2, 1));
        assert_eq!(source.line_col(13), (2, 6));
        assert_eq!(source.line_col(14), (3, 1));
    }

    #[test]
    fn test_line_start_and_text() {
        let mut map = SourceMap::new();
        let id = map.add_inline("program\nbegin writeln(1) end.");
        let source = map.get(id).unwrap();

        assert_eq!(source.line_start(0), 0);
        assert_eq!(source.line_start(10), 8);
        assert_eq!(source.line_text(1), "program");
        assert_eq!(source.line_text(2), "begin writeln(1) end.");
    }

    #[test]
    fn test_same_path_reuses_id() {
        let mut map = SourceMap::new();
        let a = map.add_file("main.pp", "program begin end.");
        let b = map.add_file("main.pp", "program begin end.");
        assert_eq!(a, b);
    }

    #[test]
    fn test_span_merge() {
        let a = Span::new(SourceId(0), 4, 10);
        let b = Span::new(SourceId(0), 8, 16);
        let merged = a.merge(b);
        assert_eq!(merged.start, 4);
        assert_eq!(merged.end, 16);
    }
}
