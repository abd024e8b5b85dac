//! Coercion contracts of generated code
//!
//! ToNumber, ToInt32/ToUint32 in shifts and bitwise operators, ToPrimitive
//! in `+` and comparisons, and the equality algorithms.

use core_types::Value;
use integration_tests::{assert_number, assert_string, execute_js};

fn number(source: &str) -> f64 {
    execute_js(source)
        .unwrap_or_else(|e| panic!("{} failed: {}", source, e))
        .as_number()
        .unwrap_or_else(|| panic!("{} is not a number", source))
}

fn boolean(source: &str) -> bool {
    match execute_js(source).unwrap_or_else(|e| panic!("{} failed: {}", source, e)) {
        Value::Boolean(b) => b,
        other => panic!("{} gave {:?}", source, other),
    }
}

// ============================================================================
// Shifts and bitwise operators
// ============================================================================

#[test]
fn test_shift_count_truncates_fraction() {
    assert_number(&execute_js("10 << 1.2").unwrap(), 20.0, "10 << 1.2");
}

#[test]
fn test_negative_shift_count_wraps() {
    assert_number(&execute_js("8 << -2").unwrap(), 0.0, "8 << -2");
}

#[test]
fn test_shift_count_masked_to_five_bits() {
    assert_eq!(number("1 << 32"), 1.0);
    assert_eq!(number("1 << 33"), 2.0);
    assert_eq!(number("-1 >>> 0"), 4294967295.0);
    assert_eq!(number("-8 >> 1"), -4.0);
}

#[test]
fn test_bitwise_operands_wrap_to_int32() {
    assert_eq!(number("4294967296 | 0"), 0.0);
    assert_eq!(number("2147483648 | 0"), -2147483648.0);
    assert_eq!(number("~5"), -6.0);
    assert_eq!(number("'12' & 10"), 8.0);
    assert_eq!(number("NaN | 0"), 0.0);
}

#[test]
fn test_shift_compound_assignment() {
    assert_eq!(number("var s = 3; s <<= 2.9; s"), 12.0);
    assert_eq!(number("var u = -1; u >>>= 28; u"), 15.0);
}

// ============================================================================
// ToNumber and arithmetic
// ============================================================================

#[test]
fn test_string_to_number() {
    assert_eq!(number("'  42  ' * 1"), 42.0);
    assert_eq!(number("'0x1F' - 0"), 31.0);
    assert_eq!(number("'' - 0"), 0.0);
    assert!(number("'4a' - 0").is_nan());
    assert_eq!(number("+'1e3'"), 1000.0);
}

#[test]
fn test_unary_plus_and_minus() {
    assert_eq!(number("+true"), 1.0);
    assert_eq!(number("+null"), 0.0);
    assert!(number("+undefined").is_nan());
    assert_eq!(number("-'3'"), -3.0);
}

#[test]
fn test_increment_converts_operand() {
    assert_eq!(number("var s = '5'; s++; s"), 6.0);
    assert_eq!(number("var t = '5'; t++"), 5.0);
    assert_eq!(number("var b = true; ++b"), 2.0);
}

#[test]
fn test_modulo_and_exponent() {
    assert_eq!(number("-7 % 2"), -1.0);
    assert_eq!(number("5.5 % 2"), 1.5);
    assert_eq!(number("2 ** -1"), 0.5);
    assert!(number("1 ** Infinity").is_nan());
}

#[test]
fn test_division_by_zero() {
    assert_eq!(number("1 / 0"), f64::INFINITY);
    assert_eq!(number("-1 / 0"), f64::NEG_INFINITY);
    assert!(number("0 / 0").is_nan());
}

// ============================================================================
// Addition and ToPrimitive
// ============================================================================

#[test]
fn test_addition_prefers_strings() {
    assert_string(&execute_js("1 + '2'").unwrap(), "12", "number + string");
    assert_string(&execute_js("'a' + null").unwrap(), "anull", "string + null");
    assert_eq!(number("1 + true"), 2.0);
    assert!(number("1 + undefined").is_nan());
}

#[test]
fn test_addition_applies_to_primitive() {
    assert_string(&execute_js("[1, 2] + [3]").unwrap(), "1,23", "arrays");
    assert_string(&execute_js("({}) + ''").unwrap(), "[object Object]", "object");
    assert_eq!(
        number("var o = { valueOf: function () { return 3; }, toString: function () { return 'x'; } }; o + 1"),
        4.0
    );
}

#[test]
fn test_template_converts_substitutions() {
    assert_string(&execute_js("`${1 + 1}|${null}|${[1, 2]}`").unwrap(), "2|null|1,2", "template");
}

#[test]
fn test_number_to_string() {
    assert_string(&execute_js("'' + 0.1").unwrap(), "0.1", "0.1");
    assert_string(&execute_js("'' + 1e21").unwrap(), "1e+21", "1e21");
    assert_string(&execute_js("'' + -0").unwrap(), "0", "-0");
    assert_string(&execute_js("'' + 1 / 3").unwrap(), "0.3333333333333333", "1/3");
}

// ============================================================================
// Comparison
// ============================================================================

#[test]
fn test_relational_comparison() {
    assert!(boolean("3 > 2"));
    assert!(boolean("2 >= 2"));
    assert!(boolean("'10' < '9'"));
    assert!(!boolean("'10' < 9"));
    assert!(boolean("'a' < 'b'"));
}

#[test]
fn test_comparisons_with_nan_are_false() {
    assert!(!boolean("NaN < 1"));
    assert!(!boolean("NaN >= 1"));
    assert!(!boolean("undefined <= 0"));
    assert!(!boolean("undefined >= 0"));
}

#[test]
fn test_comparison_evaluates_left_operand_first() {
    assert_string(
        &execute_js(
            "var log = '';
             var a = { valueOf: function () { log += 'a'; return 1; } };
             var b = { valueOf: function () { log += 'b'; return 2; } };
             a > b; a <= b; log",
        )
        .unwrap(),
        "abab",
        "ToPrimitive order",
    );
}

#[test]
fn test_loose_equality() {
    assert!(boolean("null == undefined"));
    assert!(!boolean("null == 0"));
    assert!(boolean("'1' == 1"));
    assert!(boolean("true == 1"));
    assert!(boolean("[2] == 2"));
    assert!(boolean("'' != null"));
}

#[test]
fn test_strict_equality() {
    assert!(!boolean("'1' === 1"));
    assert!(!boolean("NaN === NaN"));
    assert!(boolean("0 === -0"));
    assert!(boolean("var o = {}; o === o"));
    assert!(boolean("({}) !== ({})"));
}

#[test]
fn test_logical_not_and_truthiness() {
    assert!(boolean("!''"));
    assert!(boolean("!0"));
    assert!(!boolean("!'0'"));
    assert!(!boolean("!{}"));
    assert!(boolean("!NaN"));
}

#[test]
fn test_typeof_results() {
    assert_string(&execute_js("typeof null").unwrap(), "object", "null");
    assert_string(&execute_js("typeof function () {}").unwrap(), "function", "function");
    assert_string(&execute_js("typeof 1.5").unwrap(), "number", "number");
    assert_string(&execute_js("typeof ''").unwrap(), "string", "string");
    assert_string(&execute_js("typeof []").unwrap(), "object", "array");
}

#[test]
fn test_operator_type_errors() {
    let error = execute_js("1 instanceof 2").unwrap_err();
    assert!(error.is(core_types::ErrorKind::TypeError));
    let error = execute_js("'a' in 'abc'").unwrap_err();
    assert!(error.is(core_types::ErrorKind::TypeError));
}
