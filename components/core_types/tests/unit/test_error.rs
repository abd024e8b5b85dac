//! Unit tests for ErrorKind and JsError

use core_types::{ErrorKind, JsError, SourcePosition};

#[test]
fn test_error_kind_display_matches_constructor_name() {
    assert_eq!(ErrorKind::TypeError.to_string(), "TypeError");
    assert_eq!(ErrorKind::URIError.to_string(), "URIError");
    assert_eq!(ErrorKind::from_name("RangeError"), Some(ErrorKind::RangeError));
    assert_eq!(ErrorKind::from_name("rangeerror"), None);
}

#[test]
fn test_error_without_location() {
    let error = JsError::new(ErrorKind::ReferenceError, "x is not defined");
    assert_eq!(error.to_string(), "ReferenceError: x is not defined");
    assert_eq!(error.line(), None);
    assert!(error.source_path.is_none());
}

#[test]
fn test_error_with_line_only() {
    let error = JsError::new(ErrorKind::SyntaxError, "Unexpected end of input")
        .with_position(SourcePosition::new(12, 1, 200));
    assert_eq!(error.line(), Some(12));
    assert_eq!(error.to_string(), "SyntaxError: Unexpected end of input (line 12)");
}

#[test]
fn test_error_with_path_only() {
    let error = JsError::new(ErrorKind::TypeError, "boom").with_path("lib/util.js");
    assert_eq!(error.to_string(), "TypeError: boom (lib/util.js)");
}

#[test]
fn test_first_path_wins() {
    let error = JsError::new(ErrorKind::EvalError, "nested")
        .with_path("inner.js")
        .with_path("outer.js");
    assert_eq!(error.source_path.as_deref(), Some("inner.js"));
}

#[test]
fn test_is_checks_kind() {
    let error = JsError::new(ErrorKind::RangeError, "Maximum call stack size exceeded");
    assert!(error.is(ErrorKind::RangeError));
    assert!(!error.is(ErrorKind::TypeError));
}

#[test]
fn test_error_is_std_error() {
    fn as_dyn(error: JsError) -> Box<dyn std::error::Error> {
        Box::new(error)
    }
    let boxed = as_dyn(JsError::new(ErrorKind::InternalError, "Uncaught 6"));
    assert_eq!(boxed.to_string(), "InternalError: Uncaught 6");
}
