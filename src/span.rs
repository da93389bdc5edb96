//! Source spans and display locations.
//!
//! Spans are line-oriented: the front end hands us line numbers, not byte
//! offsets. Synthesized nodes (reflection output, adopted stub members)
//! carry no span at all.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A line range in a source file. `end_line` is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub end_line: u32,
}

impl Span {
    /// Create a span covering `start_line..=end_line`.
    pub fn new(start_line: u32, end_line: u32) -> Self {
        Self {
            start_line,
            end_line,
        }
    }

    /// Create a single-line span.
    pub fn line(line: u32) -> Self {
        Self::new(line, line)
    }
}

/// Best-effort source location used as a prefix on diagnostics.
///
/// Renders as `file:line`, `file` when the line is unknown, or a generic
/// placeholder when nothing is known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
}

impl Location {
    pub fn new(file: Option<PathBuf>, line: Option<u32>) -> Self {
        Self { file, line }
    }

    /// A location with nothing known.
    pub fn unknown() -> Self {
        Self::default()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{}", file.display(), line),
            (Some(file), None) => write!(f, "{}", file.display()),
            (None, _) => write!(f, "<unknown location>"),
        }
    }
}
