//! Abstract operations that need the object model
//!
//! Conversions of objects to primitives may call script functions
//! (`valueOf`, `toString`), so they live on the VM rather than in
//! `core_types::conversion`.

use core_types::conversion::{to_number, to_string};
use core_types::{ErrorKind, JsError, Value};

use crate::heap::{JsObject, NativeFunction, ObjectKind, Property};
use crate::vm::{Abrupt, VM};

/// Hint passed to ToPrimitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredType {
    /// No preference (`+`, `==`)
    Default,
    /// Numeric contexts and relational comparison
    Number,
    /// String contexts
    String,
}

impl VM {
    /// Returns true for closures and native functions.
    pub(crate) fn is_callable(&self, value: &Value) -> bool {
        match value {
            Value::HeapObject(id) => self.heap.get(*id).is_some_and(JsObject::is_callable),
            _ => false,
        }
    }

    /// The `typeof` string of a value.
    pub(crate) fn type_of(&self, value: &Value) -> &'static str {
        if self.is_callable(value) {
            "function"
        } else {
            value.type_of()
        }
    }

    /// ToPrimitive. Tries `valueOf` then `toString` (the other way round
    /// for the String hint), falling back to the built-in string form.
    pub(crate) fn to_primitive(&mut self, value: &Value, hint: PreferredType) -> Result<Value, Abrupt> {
        let Value::HeapObject(id) = value else {
            return Ok(value.clone());
        };
        let order = match hint {
            PreferredType::String => ["toString", "valueOf"],
            _ => ["valueOf", "toString"],
        };
        for method in order {
            let function = self.heap.get_property(*id, method);
            if self.is_callable(&function) {
                let result = self.call(&function, value.clone(), Vec::new())?;
                if !result.is_object() {
                    return Ok(result);
                }
            }
        }
        Ok(Value::String(self.default_string(*id)?))
    }

    fn default_string(&mut self, id: usize) -> Result<String, Abrupt> {
        let kind = match self.heap.get(id) {
            Some(object) => object.kind.clone(),
            None => return Ok("[object Object]".to_string()),
        };
        Ok(match kind {
            ObjectKind::Array => {
                let length = to_number(&self.heap.get_property(id, "length"));
                let mut parts = Vec::new();
                let mut index = 0.0;
                while index < length {
                    let element = self.heap.get_property(id, &to_string(&Value::number(index)));
                    parts.push(if element.is_nullish() {
                        String::new()
                    } else {
                        self.to_string_value(&element)?
                    });
                    index += 1.0;
                }
                parts.join(",")
            }
            ObjectKind::Closure { template, .. } => format!(
                "function {}() {{ [native code] }}",
                template.name.as_deref().unwrap_or("")
            ),
            ObjectKind::Native(native) => {
                let name = match native {
                    NativeFunction::Eval => "eval",
                    NativeFunction::ErrorConstructor(Some(kind)) => kind.name(),
                    NativeFunction::ErrorConstructor(None) => "Error",
                };
                format!("function {}() {{ [native code] }}", name)
            }
            ObjectKind::Error => {
                let name = self.heap.get_property(id, "name");
                let message = self.heap.get_property(id, "message");
                let name = if name.is_nullish() {
                    "Error".to_string()
                } else {
                    self.to_string_value(&name)?
                };
                let message = if message.is_nullish() {
                    String::new()
                } else {
                    self.to_string_value(&message)?
                };
                if message.is_empty() {
                    name
                } else {
                    format!("{}: {}", name, message)
                }
            }
            ObjectKind::RegExp => format!(
                "/{}/{}",
                self.heap.get_property(id, "source"),
                self.heap.get_property(id, "flags")
            ),
            ObjectKind::Ordinary => "[object Object]".to_string(),
        })
    }

    /// ToNumber.
    pub(crate) fn to_number_value(&mut self, value: &Value) -> Result<f64, Abrupt> {
        let primitive = self.to_primitive(value, PreferredType::Number)?;
        Ok(to_number(&primitive))
    }

    /// ToString.
    pub(crate) fn to_string_value(&mut self, value: &Value) -> Result<String, Abrupt> {
        let primitive = self.to_primitive(value, PreferredType::String)?;
        Ok(to_string(&primitive))
    }

    /// ToObject, boxing primitives into fresh plain objects.
    pub(crate) fn to_object(&mut self, value: &Value) -> Result<usize, Abrupt> {
        match value {
            Value::Undefined | Value::Null | Value::Uninitialized => Err(JsError::new(
                ErrorKind::TypeError,
                "Cannot convert undefined or null to object",
            )
            .into()),
            Value::HeapObject(id) => Ok(*id),
            Value::String(s) => {
                let id = self
                    .heap
                    .allocate(JsObject::new(ObjectKind::Ordinary, Some(self.object_prototype)));
                let units: Vec<u16> = s.encode_utf16().collect();
                for (index, unit) in units.iter().enumerate() {
                    self.heap.define_property(
                        id,
                        &index.to_string(),
                        Property::data(Value::String(String::from_utf16_lossy(&[*unit]))),
                    );
                }
                self.heap.define_property(
                    id,
                    "length",
                    Property::hidden(Value::number(units.len() as f64)),
                );
                Ok(id)
            }
            _ => Ok(self
                .heap
                .allocate(JsObject::new(ObjectKind::Ordinary, Some(self.object_prototype)))),
        }
    }

    /// Creates an array holding `elements`.
    pub(crate) fn create_array(&mut self, elements: Vec<Value>) -> Value {
        let id = self
            .heap
            .allocate(JsObject::new(ObjectKind::Array, Some(self.array_prototype)));
        self.heap.define_property(
            id,
            "length",
            Property {
                value: Value::number(elements.len() as f64),
                enumerable: false,
                configurable: false,
            },
        );
        for (index, element) in elements.into_iter().enumerate() {
            self.heap
                .define_property(id, &index.to_string(), Property::data(element));
        }
        Value::HeapObject(id)
    }

    /// Creates the arguments object for a call with `arguments`.
    pub(crate) fn create_arguments(&mut self, arguments: &[Value]) -> Value {
        let id = self
            .heap
            .allocate(JsObject::new(ObjectKind::Ordinary, Some(self.object_prototype)));
        for (index, argument) in arguments.iter().enumerate() {
            self.heap
                .define_property(id, &index.to_string(), Property::data(argument.clone()));
        }
        self.heap.define_property(
            id,
            "length",
            Property::hidden(Value::number(arguments.len() as f64)),
        );
        Value::HeapObject(id)
    }

    /// `base[key]`.
    pub(crate) fn get_value(&mut self, base: &Value, key: &str) -> Result<Value, Abrupt> {
        match base {
            Value::Undefined | Value::Null | Value::Uninitialized => Err(JsError::new(
                ErrorKind::TypeError,
                format!("Cannot read properties of {} (reading '{}')", base, key),
            )
            .into()),
            Value::HeapObject(id) => Ok(self.heap.get_property(*id, key)),
            Value::String(s) => {
                if key == "length" {
                    return Ok(Value::number(s.encode_utf16().count() as f64));
                }
                Ok(key
                    .parse::<usize>()
                    .ok()
                    .filter(|index| index.to_string() == key)
                    .and_then(|index| s.encode_utf16().nth(index))
                    .map(|unit| Value::String(String::from_utf16_lossy(&[unit])))
                    .unwrap_or(Value::Undefined))
            }
            _ => Ok(Value::Undefined),
        }
    }

    /// `base[key] = value`. Strict code may not write to primitives.
    pub(crate) fn set_value(&mut self, base: &Value, key: &str, value: Value, strict: bool) -> Result<(), Abrupt> {
        match base {
            Value::Undefined | Value::Null | Value::Uninitialized => Err(JsError::new(
                ErrorKind::TypeError,
                format!("Cannot set properties of {} (setting '{}')", base, key),
            )
            .into()),
            Value::HeapObject(id) => {
                self.heap.set_property(*id, key, value);
                Ok(())
            }
            _ if strict => Err(JsError::new(
                ErrorKind::TypeError,
                format!("Cannot create property '{}' on {} '{}'", key, base.type_of(), base),
            )
            .into()),
            _ => Ok(()),
        }
    }

    /// The `+` operator.
    pub(crate) fn add(&mut self, left: &Value, right: &Value) -> Result<Value, Abrupt> {
        let left = self.to_primitive(left, PreferredType::Default)?;
        let right = self.to_primitive(right, PreferredType::Default)?;
        if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
            let mut text = to_string(&left);
            text.push_str(&to_string(&right));
            return Ok(Value::String(text));
        }
        Ok(Value::number(to_number(&left) + to_number(&right)))
    }

    /// Abstract Equality Comparison (`==`).
    pub(crate) fn loose_equals(&mut self, left: &Value, right: &Value) -> Result<bool, Abrupt> {
        Ok(match (left, right) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::HeapObject(a), Value::HeapObject(b)) => a == b,
            (Value::String(_), Value::String(_)) | (Value::Boolean(_), Value::Boolean(_)) => {
                strict_equals(left, right)
            }
            (l, r) if l.is_number() && r.is_number() => strict_equals(l, r),
            (Value::Boolean(_), _) => {
                let left = Value::number(to_number(left));
                return self.loose_equals(&left, right);
            }
            (_, Value::Boolean(_)) => {
                let right = Value::number(to_number(right));
                return self.loose_equals(left, &right);
            }
            (Value::HeapObject(_), _) => {
                let left = self.to_primitive(left, PreferredType::Default)?;
                return self.loose_equals(&left, right);
            }
            (_, Value::HeapObject(_)) => {
                let right = self.to_primitive(right, PreferredType::Default)?;
                return self.loose_equals(left, &right);
            }
            // Number and string
            (l, r) => to_number(l) == to_number(r),
        })
    }

    /// `instanceof`.
    pub(crate) fn instance_of(&mut self, value: &Value, constructor: &Value) -> Result<bool, Abrupt> {
        if !self.is_callable(constructor) {
            return Err(JsError::new(
                ErrorKind::TypeError,
                "Right-hand side of 'instanceof' is not callable",
            )
            .into());
        }
        let Value::HeapObject(object) = value else {
            return Ok(false);
        };
        match self.get_value(constructor, "prototype")? {
            Value::HeapObject(prototype) => Ok(self.heap.inherits_from(*object, prototype)),
            _ => Err(JsError::new(
                ErrorKind::TypeError,
                "Function has non-object prototype in instanceof check",
            )
            .into()),
        }
    }

    /// `key in object`.
    pub(crate) fn has_in(&mut self, key: &Value, object: &Value) -> Result<bool, Abrupt> {
        let Value::HeapObject(id) = object else {
            let key = self.to_string_value(key)?;
            return Err(JsError::new(
                ErrorKind::TypeError,
                format!("Cannot use 'in' operator to search for '{}' in {}", key, object),
            )
            .into());
        };
        let key = self.to_string_value(key)?;
        Ok(self.heap.has_property(*id, &key))
    }
}

/// Strict Equality Comparison (`===`).
pub fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::HeapObject(a), Value::HeapObject(b)) => a == b,
        (l, r) => match (l.as_number(), r.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

/// Abstract Relational Comparison `x < y` over primitives; `None` when a
/// NaN is involved.
pub fn less_than(x: &Value, y: &Value) -> Option<bool> {
    if let (Value::String(a), Value::String(b)) = (x, y) {
        return Some(a.encode_utf16().lt(b.encode_utf16()));
    }
    let (a, b) = (to_number(x), to_number(y));
    if a.is_nan() || b.is_nan() {
        None
    } else {
        Some(a < b)
    }
}

/// `base ** exponent`.
pub fn exponentiate(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        f64::NAN
    } else {
        base.powf(exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_equals_numbers() {
        assert!(strict_equals(&Value::Smi(1), &Value::Double(1.0)));
        assert!(!strict_equals(&Value::Double(f64::NAN), &Value::Double(f64::NAN)));
        assert!(strict_equals(&Value::Double(-0.0), &Value::Smi(0)));
        assert!(!strict_equals(&Value::Smi(1), &Value::String("1".into())));
    }

    #[test]
    fn test_less_than() {
        assert_eq!(less_than(&Value::Smi(1), &Value::Smi(2)), Some(true));
        assert_eq!(less_than(&Value::String("b".into()), &Value::String("a".into())), Some(false));
        assert_eq!(less_than(&Value::Undefined, &Value::Smi(2)), None);
        assert_eq!(less_than(&Value::String("10".into()), &Value::Smi(9)), Some(false));
    }

    #[test]
    fn test_exponentiate_edges() {
        assert!(exponentiate(1.0, f64::INFINITY).is_nan());
        assert_eq!(exponentiate(f64::NAN, 0.0), 1.0);
        assert_eq!(exponentiate(2.0, 10.0), 1024.0);
    }

    #[test]
    fn test_loose_equals() {
        let mut vm = VM::new();
        assert!(vm.loose_equals(&Value::Null, &Value::Undefined).unwrap());
        assert!(vm.loose_equals(&Value::String("1".into()), &Value::Boolean(true)).unwrap());
        assert!(!vm.loose_equals(&Value::Null, &Value::Smi(0)).unwrap());
        let array = vm.create_array(vec![Value::Smi(1), Value::Smi(2)]);
        assert!(vm.loose_equals(&array, &Value::String("1,2".into())).unwrap());
    }

    #[test]
    fn test_add_concatenates_objects() {
        let mut vm = VM::new();
        let array = vm.create_array(vec![Value::Smi(1)]);
        let result = vm.add(&array, &Value::Smi(1)).unwrap();
        assert_eq!(result, Value::String("11".into()));
        let sum = vm.add(&Value::Boolean(true), &Value::Smi(1)).unwrap();
        assert_eq!(sum, Value::Smi(2));
    }

    #[test]
    fn test_string_indexing() {
        let mut vm = VM::new();
        let text = Value::String("abc".into());
        assert_eq!(vm.get_value(&text, "length").unwrap(), Value::Smi(3));
        assert_eq!(vm.get_value(&text, "1").unwrap(), Value::String("b".into()));
        assert_eq!(vm.get_value(&text, "01").unwrap(), Value::Undefined);
        assert!(vm.get_value(&Value::Null, "x").is_err());
    }
}
