//! JavaScript value representation.
//!
//! This module provides the core `Value` enum shared by the constant pool,
//! the compiler's literal folding, and the virtual machine.

use std::fmt;

use crate::conversion;

/// Represents any JavaScript value.
///
/// Primitive values are stored inline, while objects are referenced by
/// their id in the virtual machine's heap.
///
/// # Examples
///
/// ```
/// use core_types::Value;
///
/// let undefined = Value::Undefined;
/// let number = Value::Smi(42);
/// let float = Value::Double(3.14);
///
/// assert!(!undefined.is_truthy());
/// assert!(number.is_truthy());
/// assert_eq!(float.type_of(), "number");
/// ```
#[derive(Clone)]
pub enum Value {
    /// JavaScript undefined value
    Undefined,
    /// JavaScript null value
    Null,
    /// JavaScript boolean (true or false)
    Boolean(bool),
    /// Small integer (fits in 32 bits)
    Smi(i32),
    /// IEEE 754 double-precision floating point
    Double(f64),
    /// JavaScript string value
    String(String),
    /// Heap-allocated object, including functions (referenced by id)
    HeapObject(usize),
    /// Marker held by a `let`/`const` binding before its declaration runs.
    ///
    /// Reading a binding in this state raises a ReferenceError, so the
    /// marker never becomes visible to script code.
    Uninitialized,
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Null => write!(f, "Null"),
            Value::Boolean(b) => f.debug_tuple("Boolean").field(b).finish(),
            Value::Smi(n) => f.debug_tuple("Smi").field(n).finish(),
            Value::Double(n) => f.debug_tuple("Double").field(n).finish(),
            Value::String(s) => f.debug_tuple("String").field(s).finish(),
            Value::HeapObject(id) => f.debug_tuple("HeapObject").field(id).finish(),
            Value::Uninitialized => write!(f, "Uninitialized"),
        }
    }
}

/// Structural equality used by tests and constant deduplication.
///
/// Numbers compare by value across the `Smi`/`Double` split; this is not
/// JavaScript's `===` (which lives in the virtual machine).
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Uninitialized, Value::Uninitialized) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::HeapObject(a), Value::HeapObject(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

impl Value {
    /// Creates a number value, using the small-integer form when the value
    /// is an integer in `i32` range and not negative zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_types::Value;
    ///
    /// assert!(matches!(Value::number(3.0), Value::Smi(3)));
    /// assert!(matches!(Value::number(0.5), Value::Double(_)));
    /// assert!(matches!(Value::number(-0.0), Value::Double(_)));
    /// ```
    pub fn number(n: f64) -> Value {
        if n.fract() == 0.0
            && n >= i32::MIN as f64
            && n <= i32::MAX as f64
            && !(n == 0.0 && n.is_sign_negative())
        {
            Value::Smi(n as i32)
        } else {
            Value::Double(n)
        }
    }

    /// Returns the numeric value if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Smi(n) => Some(*n as f64),
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns true for `Smi` and `Double`.
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Smi(_) | Value::Double(_))
    }

    /// Returns true for heap objects.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::HeapObject(_))
    }

    /// Returns true for `undefined` and `null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Returns whether this value is truthy in JavaScript semantics (ToBoolean).
    ///
    /// # Examples
    ///
    /// ```
    /// use core_types::Value;
    ///
    /// assert!(!Value::Undefined.is_truthy());
    /// assert!(!Value::Double(f64::NAN).is_truthy());
    /// assert!(!Value::String(String::new()).is_truthy());
    /// assert!(Value::HeapObject(0).is_truthy());
    /// ```
    pub fn is_truthy(&self) -> bool {
        conversion::to_boolean(self)
    }

    /// Returns the `typeof` result for primitive values.
    ///
    /// Heap objects report `"object"`; the virtual machine refines this to
    /// `"function"` for callable objects.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined | Value::Uninitialized => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Smi(_) | Value::Double(_) => "number",
            Value::String(_) => "string",
            Value::HeapObject(_) => "object",
        }
    }
}

/// JavaScript `String()` conversion for primitives.
///
/// # Examples
///
/// ```
/// use core_types::Value;
///
/// assert_eq!(Value::Null.to_string(), "null");
/// assert_eq!(Value::Double(1e21).to_string(), "1e+21");
/// assert_eq!(Value::Double(0.1).to_string(), "0.1");
/// ```
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined | Value::Uninitialized => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Smi(n) => write!(f, "{}", n),
            Value::Double(n) => f.write_str(&conversion::number_to_string(*n)),
            Value::String(s) => f.write_str(s),
            Value::HeapObject(_) => write!(f, "[object Object]"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
