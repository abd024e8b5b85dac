//! Unit tests for Value and the conversion routines

use core_types::conversion::{number_to_string, string_to_number, to_int32, to_number, to_uint32};
use core_types::Value;

// ============================================================================
// Number representation
// ============================================================================

#[test]
fn test_number_normalizes_integers() {
    assert!(matches!(Value::number(7.0), Value::Smi(7)));
    assert!(matches!(Value::number(-2147483648.0), Value::Smi(i32::MIN)));
    assert!(matches!(Value::number(2147483648.0), Value::Double(_)));
    assert!(matches!(Value::number(f64::NAN), Value::Double(_)));
}

#[test]
fn test_smi_and_double_compare_by_value() {
    assert_eq!(Value::Smi(3), Value::Double(3.0));
    assert_ne!(Value::Double(f64::NAN), Value::Double(f64::NAN));
    assert_ne!(Value::Smi(1), Value::Boolean(true));
}

#[test]
fn test_from_conversions() {
    assert_eq!(Value::from(2.5), Value::Double(2.5));
    assert_eq!(Value::from(true), Value::Boolean(true));
    assert_eq!(Value::from("hi"), Value::String("hi".into()));
}

// ============================================================================
// ToString
// ============================================================================

#[test]
fn test_display_of_primitives() {
    assert_eq!(Value::Undefined.to_string(), "undefined");
    assert_eq!(Value::Boolean(false).to_string(), "false");
    assert_eq!(Value::Smi(-4).to_string(), "-4");
    assert_eq!(Value::Double(-0.0).to_string(), "0");
    assert_eq!(Value::Double(f64::NEG_INFINITY).to_string(), "-Infinity");
}

#[test]
fn test_number_to_string_switches_to_exponent() {
    assert_eq!(number_to_string(123456789012345680000.0), "123456789012345680000");
    assert_eq!(number_to_string(123e-20), "1.23e-18");
    assert_eq!(number_to_string(-1234.5678), "-1234.5678");
    assert_eq!(number_to_string(0.00000123), "0.00000123");
}

// ============================================================================
// ToNumber and integer conversions
// ============================================================================

#[test]
fn test_to_number_of_primitives() {
    assert_eq!(to_number(&Value::Null), 0.0);
    assert_eq!(to_number(&Value::Boolean(true)), 1.0);
    assert!(to_number(&Value::Undefined).is_nan());
    assert_eq!(to_number(&Value::String(" \n12.5\t".into())), 12.5);
}

#[test]
fn test_string_to_number_edge_cases() {
    assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
    assert_eq!(string_to_number("0b101"), 5.0);
    assert_eq!(string_to_number("0o17"), 15.0);
    assert!(string_to_number("1_000").is_nan());
    assert!(string_to_number("-0x10").is_nan());
}

#[test]
fn test_int32_and_uint32_wrap_modulo() {
    assert_eq!(to_int32(-1.5), -1);
    assert_eq!(to_int32(f64::INFINITY), 0);
    assert_eq!(to_int32(4294967295.0), -1);
    assert_eq!(to_uint32(-1.0), 4294967295);
    assert_eq!(to_uint32(-2.0) & 31, 30);
}

// ============================================================================
// typeof and truthiness
// ============================================================================

#[test]
fn test_type_of_primitives() {
    assert_eq!(Value::Null.type_of(), "object");
    assert_eq!(Value::Uninitialized.type_of(), "undefined");
    assert_eq!(Value::String(String::new()).type_of(), "string");
    assert_eq!(Value::HeapObject(3).type_of(), "object");
}

#[test]
fn test_truthiness() {
    assert!(!Value::Smi(0).is_truthy());
    assert!(!Value::Double(-0.0).is_truthy());
    assert!(Value::String("0".into()).is_truthy());
    assert!(Value::Double(f64::INFINITY).is_truthy());
}
