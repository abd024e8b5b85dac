//! Constant pool values
//!
//! Only primitives that can appear as literals are stored in a chunk's
//! constant pool; the virtual machine converts them into
//! `core_types::Value` when loading.

/// Literal value stored in a constant pool
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JavaScript undefined
    Undefined,
    /// JavaScript null
    Null,
    /// JavaScript boolean
    Boolean(bool),
    /// JavaScript number (IEEE 754 double)
    Number(f64),
    /// JavaScript string
    String(String),
}

impl Value {
    /// Check if value is a number
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    /// Try to get the number value
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Constant-pool identity: numbers compare bitwise so that `0` and
    /// `-0` (and distinct NaN payloads) get separate entries.
    pub fn same_constant(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.to_bits() == b.to_bits(),
            (a, b) => a == b,
        }
    }
}

impl From<Value> for core_types::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Undefined => core_types::Value::Undefined,
            Value::Null => core_types::Value::Null,
            Value::Boolean(b) => core_types::Value::Boolean(b),
            Value::Number(n) => core_types::Value::number(n),
            Value::String(s) => core_types::Value::String(s),
        }
    }
}
