//! Unit tests for SourcePosition and SourceSpan

use core_types::{SourcePosition, SourceSpan};

#[test]
fn test_position_default_is_zeroed() {
    let pos = SourcePosition::default();
    assert_eq!((pos.line, pos.column, pos.offset), (0, 0, 0));
}

#[test]
fn test_position_is_copy() {
    let pos = SourcePosition::new(4, 2, 31);
    let copy = pos;
    assert_eq!(pos, copy);
}

#[test]
fn test_position_deserializes_from_json() {
    let pos: SourcePosition = serde_json::from_str(r#"{"line":2,"column":9,"offset":17}"#).unwrap();
    assert_eq!(pos, SourcePosition::new(2, 9, 17));
}

#[test]
fn test_span_slices_multiline_text() {
    let source = "a = 1;\nb = 2 +\n 3;\nc";
    let span = SourceSpan::new(7, 17, 2);
    assert_eq!(span.text(source), "b = 2 +\n 3");
    assert_eq!(span.len(), 10);
    assert!(!span.is_empty());
}

#[test]
fn test_span_out_of_range_is_empty_text() {
    let span = SourceSpan::new(5, 50, 1);
    assert_eq!(span.text("short"), "");
}

#[test]
fn test_reversed_span_has_zero_length() {
    let span = SourceSpan::new(8, 3, 1);
    assert_eq!(span.len(), 0);
    assert!(span.is_empty());
}
