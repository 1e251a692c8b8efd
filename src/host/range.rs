//! Source positions for diagnostics and error attribution.

use core::fmt;
use core::ops::Range;

/// A position in a source file. Lines and columns are 1-based; `byte` is a 0-based offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourcePos {
    pub line: usize,
    pub column: usize,
    pub byte: usize,
}

impl SourcePos {
    pub fn new(line: usize, column: usize, byte: usize) -> Self {
        SourcePos { line, column, byte }
    }
}

impl Default for SourcePos {
    fn default() -> Self {
        SourcePos::new(1, 1, 0)
    }
}

/// A span of source text in a named file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SourceRange {
    pub file: String,
    pub start: SourcePos,
    pub end: SourcePos,
}

impl SourceRange {
    pub fn new(file: impl Into<String>, start: SourcePos, end: SourcePos) -> Self {
        SourceRange {
            file: file.into(),
            start,
            end,
        }
    }

    /// Build a range from a byte span of `source`, computing lines and columns.
    ///
    /// Columns count characters, not bytes. Offsets past the end of `source` are clamped.
    pub fn from_byte_span(file: impl Into<String>, source: &str, span: Range<usize>) -> Self {
        SourceRange {
            file: file.into(),
            start: position_of(source, span.start),
            end: position_of(source, span.end),
        }
    }
}

fn position_of(source: &str, byte: usize) -> SourcePos {
    let mut byte = byte.min(source.len());
    while !source.is_char_boundary(byte) {
        byte -= 1;
    }

    let before = &source[..byte];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = source[line_start..byte].chars().count() + 1;
    SourcePos::new(line, column, byte)
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.line == self.end.line {
            write!(
                f,
                "{}:{},{}-{}",
                self.file, self.start.line, self.start.column, self.end.column
            )
        } else {
            write!(
                f,
                "{}:{},{}-{},{}",
                self.file, self.start.line, self.start.column, self.end.line, self.end.column
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_single_line() {
        let range = SourceRange::new("main.hcl", SourcePos::new(3, 1, 20), SourcePos::new(3, 18, 37));
        assert_eq!(range.to_string(), "main.hcl:3,1-18");
    }

    #[test]
    fn test_display_multi_line() {
        let range = SourceRange::new("main.hcl", SourcePos::new(1, 1, 0), SourcePos::new(4, 2, 60));
        assert_eq!(range.to_string(), "main.hcl:1,1-4,2");
    }

    #[test]
    fn test_from_byte_span() {
        let source = "a = 1\n[[jqfunction]]\nname = \"é\"\n";
        let start = source.find("[[").unwrap();
        let end = source.len() - 1;
        let range = SourceRange::from_byte_span("defs.toml", source, start..end);
        assert_eq!(range.start, SourcePos::new(2, 1, start));
        assert_eq!(range.end.line, 3);
        assert_eq!(range.end.column, 11);
    }

    #[test]
    fn test_from_byte_span_clamps() {
        let range = SourceRange::from_byte_span("x", "ab", 5..9);
        assert_eq!(range.start, SourcePos::new(1, 3, 2));
    }
}
