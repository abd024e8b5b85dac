//! Abstract type conversions that do not depend on an object model.
//!
//! Conversions that may need to call back into script code (ToPrimitive on
//! objects, ToObject) live in the virtual machine; it reduces objects to
//! primitives first and then uses the functions here.

use crate::Value;

const TWO_POW_32: f64 = 4294967296.0;
const TWO_POW_31: f64 = 2147483648.0;

/// ToBoolean.
pub fn to_boolean(value: &Value) -> bool {
    match value {
        Value::Undefined | Value::Null | Value::Uninitialized => false,
        Value::Boolean(b) => *b,
        Value::Smi(n) => *n != 0,
        Value::Double(n) => !(n.is_nan() || *n == 0.0),
        Value::String(s) => !s.is_empty(),
        Value::HeapObject(_) => true,
    }
}

/// ToNumber for primitive values.
///
/// Heap objects map to `NaN`; callers holding an object must apply
/// ToPrimitive (hint Number) first.
///
/// # Examples
///
/// ```
/// use core_types::{conversion::to_number, Value};
///
/// assert_eq!(to_number(&Value::Boolean(true)), 1.0);
/// assert_eq!(to_number(&Value::Null), 0.0);
/// assert!(to_number(&Value::Undefined).is_nan());
/// assert_eq!(to_number(&Value::String(" 0x1F ".into())), 31.0);
/// ```
pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Undefined | Value::Uninitialized => f64::NAN,
        Value::Null => 0.0,
        Value::Boolean(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Smi(n) => *n as f64,
        Value::Double(n) => *n,
        Value::String(s) => string_to_number(s),
        Value::HeapObject(_) => f64::NAN,
    }
}

/// ToInt32: truncate toward zero, then wrap modulo 2^32 into the signed range.
///
/// # Examples
///
/// ```
/// use core_types::conversion::to_int32;
///
/// assert_eq!(to_int32(1.9), 1);
/// assert_eq!(to_int32(-1.9), -1);
/// assert_eq!(to_int32(2147483648.0), -2147483648);
/// assert_eq!(to_int32(f64::NAN), 0);
/// ```
pub fn to_int32(n: f64) -> i32 {
    let m = to_uint32_modulo(n);
    if m >= TWO_POW_31 {
        (m - TWO_POW_32) as i32
    } else {
        m as i32
    }
}

/// ToUint32: truncate toward zero, then wrap modulo 2^32.
///
/// # Examples
///
/// ```
/// use core_types::conversion::to_uint32;
///
/// assert_eq!(to_uint32(-1.0), 4294967295);
/// assert_eq!(to_uint32(-2.0), 4294967294);
/// assert_eq!(to_uint32(f64::INFINITY), 0);
/// ```
pub fn to_uint32(n: f64) -> u32 {
    to_uint32_modulo(n) as u32
}

fn to_uint32_modulo(n: f64) -> f64 {
    if !n.is_finite() || n == 0.0 {
        return 0.0;
    }
    n.trunc().rem_euclid(TWO_POW_32)
}

/// ToString for primitive values.
pub fn to_string(value: &Value) -> String {
    value.to_string()
}

/// StringToNumber: the `StringNumericLiteral` grammar.
///
/// Surrounding whitespace is ignored, the empty string is zero, and any
/// other malformed input is `NaN`.
pub fn string_to_number(text: &str) -> f64 {
    let trimmed = text.trim_matches(is_js_whitespace);
    if trimmed.is_empty() {
        return 0.0;
    }

    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = trimmed.strip_prefix(prefix) {
            return parse_radix_digits(digits, radix);
        }
    }

    let (sign, unsigned) = match trimmed.as_bytes()[0] {
        b'+' => (1.0, &trimmed[1..]),
        b'-' => (-1.0, &trimmed[1..]),
        _ => (1.0, trimmed),
    };
    if unsigned == "Infinity" {
        return sign * f64::INFINITY;
    }
    if !is_decimal_literal(unsigned) {
        return f64::NAN;
    }
    unsigned.parse::<f64>().map(|n| sign * n).unwrap_or(f64::NAN)
}

/// Parses digits in the given radix into a number, `NaN` if any digit is
/// invalid or the input is empty.
pub fn parse_radix_digits(digits: &str, radix: u32) -> f64 {
    if digits.is_empty() {
        return f64::NAN;
    }
    let mut value = 0.0f64;
    for c in digits.chars() {
        match c.to_digit(radix) {
            Some(d) => value = value * radix as f64 + d as f64,
            None => return f64::NAN,
        }
    }
    value
}

/// Whitespace and line terminators as recognised by the lexical grammar.
pub fn is_js_whitespace(c: char) -> bool {
    matches!(
        c,
        '\u{0009}' | '\u{000B}' | '\u{000C}' | ' ' | '\u{00A0}' | '\u{FEFF}'
            | '\n' | '\r' | '\u{2028}' | '\u{2029}'
    ) || (c.is_whitespace() && !c.is_ascii())
}

/// `Digits? . Digits? ExponentPart?` with at least one digit in the mantissa.
fn is_decimal_literal(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    let mut mantissa_digits = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
        mantissa_digits += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
            mantissa_digits += 1;
        }
    }
    if mantissa_digits == 0 {
        return false;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        i += 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let exponent_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exponent_start {
            return false;
        }
    }
    i == bytes.len()
}

/// Number::toString(10): the shortest round-tripping decimal digits laid
/// out with the fixed/exponential switch points of the language.
///
/// # Examples
///
/// ```
/// use core_types::conversion::number_to_string;
///
/// assert_eq!(number_to_string(123.0), "123");
/// assert_eq!(number_to_string(-0.0), "0");
/// assert_eq!(number_to_string(1e21), "1e+21");
/// assert_eq!(number_to_string(1e-7), "1e-7");
/// assert_eq!(number_to_string(0.000001), "0.000001");
/// assert_eq!(number_to_string(1.5e300), "1.5e+300");
/// ```
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    let (digits, point) = shortest_digits(n.abs());
    let k = digits.len() as i32;
    let mut out = String::new();
    if n < 0.0 {
        out.push('-');
    }

    if k <= point && point <= 21 {
        out.push_str(&digits);
        out.extend(std::iter::repeat('0').take((point - k) as usize));
    } else if 0 < point && point <= 21 {
        out.push_str(&digits[..point as usize]);
        out.push('.');
        out.push_str(&digits[point as usize..]);
    } else if -6 < point && point <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat('0').take((-point) as usize));
        out.push_str(&digits);
    } else {
        let exponent = point - 1;
        out.push_str(&digits[..1]);
        if k > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push('e');
        out.push(if exponent >= 0 { '+' } else { '-' });
        out.push_str(&exponent.abs().to_string());
    }
    out
}

/// Returns the significant digits of a positive finite number and the
/// position of the decimal point relative to the first digit, so that
/// `n = 0.d1d2...dk * 10^point`.
fn shortest_digits(n: f64) -> (String, i32) {
    let mut buffer = ryu::Buffer::new();
    let formatted = buffer.format_finite(n);

    let (mantissa, exponent) = match formatted.split_once(['e', 'E']) {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (formatted, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));

    let mut digits: String = int_part.chars().chain(frac_part.chars()).collect();
    let mut point = int_part.len() as i32 + exponent;

    let leading = digits.chars().take_while(|&c| c == '0').count();
    digits.drain(..leading);
    point -= leading as i32;
    let trimmed_len = digits.trim_end_matches('0').len();
    digits.truncate(trimmed_len);

    (digits, point)
}
