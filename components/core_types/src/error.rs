//! JavaScript error types and error handling.
//!
//! Every error raised by the compiler or the virtual machine carries a
//! message, an optional 1-based source position, and an optional source path
//! (absent for sources that do not come from a file).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::SourcePosition;

/// The kind of JavaScript error.
///
/// These correspond to JavaScript's built-in error constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Syntax error in JavaScript code
    SyntaxError,
    /// Type error (e.g., calling a non-function)
    TypeError,
    /// Reference to an undefined variable
    ReferenceError,
    /// Value out of allowed range
    RangeError,
    /// Error in eval() function
    EvalError,
    /// Error in URI handling functions
    URIError,
    /// Internal engine error
    InternalError,
}

impl ErrorKind {
    /// The constructor name used for this kind of error in script code.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::EvalError => "EvalError",
            ErrorKind::URIError => "URIError",
            ErrorKind::InternalError => "InternalError",
        }
    }

    /// Maps a constructor name back to an error kind.
    pub fn from_name(name: &str) -> Option<ErrorKind> {
        Some(match name {
            "SyntaxError" => ErrorKind::SyntaxError,
            "TypeError" => ErrorKind::TypeError,
            "ReferenceError" => ErrorKind::ReferenceError,
            "RangeError" => ErrorKind::RangeError,
            "EvalError" => ErrorKind::EvalError,
            "URIError" => ErrorKind::URIError,
            "InternalError" => ErrorKind::InternalError,
            _ => return None,
        })
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A JavaScript error with message and location.
///
/// # Examples
///
/// ```
/// use core_types::{ErrorKind, JsError, SourcePosition};
///
/// let error = JsError::new(ErrorKind::SyntaxError, "Unexpected token )")
///     .with_position(SourcePosition::new(3, 7, 42))
///     .with_path("main.js");
///
/// assert_eq!(error.line(), Some(3));
/// assert_eq!(error.to_string(), "SyntaxError: Unexpected token ) (main.js:3)");
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}{}", location_suffix(.source_path.as_deref(), .source_position.as_ref()))]
pub struct JsError {
    /// The type of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Source position where the error occurred
    pub source_position: Option<SourcePosition>,
    /// Path of the source the error came from, if it came from a file
    pub source_path: Option<String>,
}

fn location_suffix(path: Option<&str>, position: Option<&SourcePosition>) -> String {
    match (path, position) {
        (Some(path), Some(pos)) => format!(" ({}:{})", path, pos.line),
        (Some(path), None) => format!(" ({})", path),
        (None, Some(pos)) => format!(" (line {})", pos.line),
        (None, None) => String::new(),
    }
}

impl JsError {
    /// Creates an error with no location attached.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        JsError {
            kind,
            message: message.into(),
            source_position: None,
            source_path: None,
        }
    }

    /// Attaches a source position.
    pub fn with_position(mut self, position: SourcePosition) -> Self {
        self.source_position = Some(position);
        self
    }

    /// Attaches a source path unless one is already recorded.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        if self.source_path.is_none() {
            self.source_path = Some(path.into());
        }
        self
    }

    /// The 1-based line number the error was raised at, if known.
    pub fn line(&self) -> Option<u32> {
        self.source_position.as_ref().map(|pos| pos.line)
    }

    /// Returns true for errors of the given kind.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}
