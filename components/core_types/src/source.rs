//! Source position and span types for diagnostics.

use serde::{Deserialize, Serialize};

/// Represents a position in source code.
///
/// Lines and columns are 1-based; `offset` is a byte offset into the
/// source text so that spans can slice the original string.
///
/// # Examples
///
/// ```
/// use core_types::SourcePosition;
///
/// let pos = SourcePosition::new(10, 5, 150);
/// assert_eq!(pos.line, 10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourcePosition {
    /// Line number (1-based)
    pub line: u32,
    /// Column number (1-based)
    pub column: u32,
    /// Byte offset from the start of the source text
    pub offset: usize,
}

impl SourcePosition {
    /// Creates a new position.
    pub fn new(line: u32, column: u32, offset: usize) -> Self {
        SourcePosition {
            line,
            column,
            offset,
        }
    }
}

/// A half-open byte range `[start, end)` of source text plus the line it
/// starts on.
///
/// # Examples
///
/// ```
/// use core_types::SourceSpan;
///
/// let source = "var a = 1; a";
/// let span = SourceSpan::new(0, 10, 1);
/// assert_eq!(span.text(source), "var a = 1;");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceSpan {
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
    /// Line of the first character (1-based)
    pub line: u32,
}

impl SourceSpan {
    /// Creates a new span.
    pub fn new(start: usize, end: usize, line: u32) -> Self {
        SourceSpan { start, end, line }
    }

    /// Returns the slice of `source` covered by this span.
    ///
    /// Out-of-range spans yield an empty string.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.start..self.end).unwrap_or("")
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Returns true if the span covers no text.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
