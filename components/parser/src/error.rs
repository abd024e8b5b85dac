//! Parser error types and helpers

use core_types::{ErrorKind, JsError, SourcePosition};

/// Create a syntax error at a given position
pub fn syntax_error(message: impl Into<String>, position: Option<SourcePosition>) -> JsError {
    let error = JsError::new(ErrorKind::SyntaxError, message);
    match position {
        Some(position) => error.with_position(position),
        None => error,
    }
}

/// Create an unexpected token error
pub fn unexpected_token(expected: &str, got: &str, position: Option<SourcePosition>) -> JsError {
    syntax_error(format!("Expected {}, got {}", expected, got), position)
}

/// Create an unexpected end of input error
pub fn unexpected_eof(position: Option<SourcePosition>) -> JsError {
    syntax_error("Unexpected end of input", position)
}

/// Create the error raised when statements or expressions nest deeper
/// than the compiler accepts
pub fn nesting_too_deep(position: Option<SourcePosition>) -> JsError {
    let error = JsError::new(ErrorKind::RangeError, "Maximum nesting depth exceeded");
    match position {
        Some(position) => error.with_position(position),
        None => error,
    }
}
