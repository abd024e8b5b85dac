//! Dispatch loop for bytecode execution
//!
//! Handles individual opcode execution.

use std::rc::Rc;

use bytecode_system::{BytecodeChunk, CompareKind, Opcode};
use core_types::conversion::{to_boolean, to_int32, to_uint32};
use core_types::{ErrorKind, JsError, Value};

use crate::call_frame::{CallFrame, Handler};
use crate::environment::{Env, Environment, Record};
use crate::heap::{JsObject, ObjectKind, Property};
use crate::operations::{exponentiate, less_than, strict_equals, PreferredType};
use crate::vm::{Abrupt, VM};

/// Where an unqualified name resolved at run time.
enum NameReference {
    /// A binding of a declarative record
    Binding(Rc<Environment>),
    /// A property of a `with` object or of the global object
    Property(usize),
    /// Nowhere
    Unresolved,
}

fn reference_error(message: String) -> Abrupt {
    JsError::new(ErrorKind::ReferenceError, message).into()
}

fn uninitialized(name: &str) -> Abrupt {
    reference_error(format!("Cannot access '{}' before initialization", name))
}

fn constant_assignment() -> Abrupt {
    JsError::new(ErrorKind::TypeError, "Assignment to constant variable.").into()
}

/// The record `hops` links above the current one.
fn record_at(env: &Env, hops: u32) -> Result<Rc<Environment>, Abrupt> {
    env.as_ref()
        .and_then(|env| env.ancestor(hops))
        .cloned()
        .ok_or_else(|| JsError::new(ErrorKind::InternalError, "scope record missing").into())
}

impl VM {
    /// Runs `chunk` in `frame` until it returns or throws past every
    /// handler of the frame.
    pub(crate) fn run(&mut self, chunk: &BytecodeChunk, frame: &mut CallFrame) -> Result<Value, Abrupt> {
        loop {
            let Some(opcode) = chunk.instructions.get(frame.ip) else {
                return Ok(Value::Undefined);
            };
            let at = frame.ip;
            frame.ip += 1;

            let abrupt = match self.step(chunk, opcode, frame) {
                Ok(None) => continue,
                Ok(Some(value)) => return Ok(value),
                Err(Abrupt::Error(error)) if error.source_position.is_none() => {
                    match chunk.position_at(at) {
                        Some(position) => Abrupt::Error(error.with_position(position)),
                        None => Abrupt::Error(error),
                    }
                }
                Err(abrupt) => abrupt,
            };

            let Some(handler) = frame.handlers.pop() else {
                return Err(abrupt);
            };
            let value = self.exception_value(abrupt);
            frame.stack.truncate(handler.stack_len);
            frame.env = handler.env;
            frame.push(value);
            frame.ip = handler.catch_ip;
        }
    }

    fn step(&mut self, chunk: &BytecodeChunk, opcode: &Opcode, frame: &mut CallFrame) -> Result<Option<Value>, Abrupt> {
        match opcode {
            Opcode::LoadConstant(index) => {
                let value = chunk
                    .constants
                    .get(*index)
                    .cloned()
                    .map(Value::from)
                    .unwrap_or(Value::Undefined);
                frame.push(value);
            }
            Opcode::LoadUndefined => frame.push(Value::Undefined),
            Opcode::LoadNull => frame.push(Value::Null),
            Opcode::LoadTrue => frame.push(Value::Boolean(true)),
            Opcode::LoadFalse => frame.push(Value::Boolean(false)),
            Opcode::LoadUninitialized => frame.push(Value::Uninitialized),
            Opcode::CreateRegExp { pattern, flags } => {
                let id = self
                    .heap
                    .allocate(JsObject::new(ObjectKind::RegExp, Some(self.object_prototype)));
                self.heap
                    .define_property(id, "source", Property::hidden(Value::String(pattern.clone())));
                self.heap
                    .define_property(id, "flags", Property::hidden(Value::String(flags.clone())));
                self.heap
                    .define_property(id, "lastIndex", Property::hidden(Value::Smi(0)));
                frame.push(Value::HeapObject(id));
            }

            Opcode::LoadLocal(register) => {
                let value = frame.register(register.0);
                frame.push(value);
            }
            Opcode::StoreLocal(register) => {
                let value = frame.pop();
                frame.set_register(register.0, value);
            }
            Opcode::CheckInitialized(name) => {
                if matches!(frame.peek(), Value::Uninitialized) {
                    return Err(uninitialized(name));
                }
            }
            Opcode::LoadArgument(index) => {
                let value = frame
                    .arguments
                    .get(*index as usize)
                    .cloned()
                    .unwrap_or(Value::Undefined);
                frame.push(value);
            }
            Opcode::LoadCallee => {
                let callee = frame.callee.clone();
                frame.push(callee);
            }
            Opcode::CreateArguments => {
                let arguments = self.create_arguments(&frame.arguments);
                frame.push(arguments);
            }
            Opcode::LoadThis => {
                let this = frame.this.clone();
                frame.push(this);
            }

            Opcode::PushScope(layout) => {
                frame.env = Some(Environment::declarative(layout, frame.env.take()));
            }
            Opcode::PushWithScope => {
                let value = frame.pop();
                let object = self.to_object(&value)?;
                frame.env = Some(Environment::object(object, frame.env.take()));
            }
            Opcode::PopScope => {
                frame.env = frame.env.as_ref().and_then(|env| env.parent.clone());
            }
            Opcode::CloneScope => {
                frame.env = frame.env.as_ref().map(Environment::copy);
            }
            Opcode::ScopeHas { hops, name } => {
                let record = record_at(&frame.env, *hops)?;
                let found = match &record.record {
                    Record::Declarative { .. } => record.binding(name).is_some(),
                    Record::Object(id) => self.heap.has_property(*id, name),
                };
                frame.push(Value::Boolean(found));
            }
            Opcode::LoadScoped { hops, name } => {
                let record = record_at(&frame.env, *hops)?;
                let value = match &record.record {
                    Record::Object(id) => self.heap.get_property(*id, name),
                    Record::Declarative { .. } => match record.binding(name) {
                        Some(binding) if matches!(binding.value, Value::Uninitialized) => {
                            return Err(uninitialized(name));
                        }
                        Some(binding) => binding.value,
                        None => return Err(reference_error(format!("{} is not defined", name))),
                    },
                };
                frame.push(value);
            }
            Opcode::StoreScoped { hops, name, strict } => {
                let value = frame.pop();
                let record = record_at(&frame.env, *hops)?;
                match &record.record {
                    Record::Object(id) => {
                        let object = Value::HeapObject(*id);
                        self.set_value(&object, name, value, *strict)?;
                    }
                    Record::Declarative { .. } => Self::assign_binding(&record, name, value)?,
                }
            }
            Opcode::InitScoped { hops, name } => {
                let value = frame.pop();
                let record = record_at(&frame.env, *hops)?;
                if !record.initialize(name, value) {
                    return Err(reference_error(format!("{} is not defined", name)));
                }
            }
            Opcode::DeclareVar(name) => self.declare_var(&frame.env, name),
            Opcode::LoadName {
                name,
                throw_if_missing,
            } => {
                let value = match self.resolve_name(&frame.env, name) {
                    NameReference::Binding(record) => match record.binding(name) {
                        Some(binding) if matches!(binding.value, Value::Uninitialized) => {
                            return Err(uninitialized(name));
                        }
                        Some(binding) => binding.value,
                        None => Value::Undefined,
                    },
                    NameReference::Property(id) => self.heap.get_property(id, name),
                    NameReference::Unresolved if *throw_if_missing => {
                        return Err(reference_error(format!("{} is not defined", name)));
                    }
                    NameReference::Unresolved => Value::Undefined,
                };
                frame.push(value);
            }
            Opcode::StoreName { name, strict } => {
                let value = frame.pop();
                match self.resolve_name(&frame.env, name) {
                    NameReference::Binding(record) => Self::assign_binding(&record, name, value)?,
                    NameReference::Property(id) => {
                        self.set_value(&Value::HeapObject(id), name, value, *strict)?;
                    }
                    NameReference::Unresolved if *strict => {
                        return Err(reference_error(format!("{} is not defined", name)));
                    }
                    NameReference::Unresolved => self.heap.set_property(self.global, name, value),
                }
            }
            Opcode::DeleteName(name) => {
                let deleted = match self.resolve_name(&frame.env, name) {
                    NameReference::Binding(_) => false,
                    NameReference::Property(id) => self.heap.delete_property(id, name),
                    NameReference::Unresolved => true,
                };
                frame.push(Value::Boolean(deleted));
            }

            Opcode::LoadGlobal {
                name,
                throw_if_missing,
            } => {
                let value = match self.heap.lookup(self.global, name) {
                    Some(property) => property.value.clone(),
                    None if *throw_if_missing => {
                        return Err(reference_error(format!("{} is not defined", name)));
                    }
                    None => Value::Undefined,
                };
                frame.push(value);
            }
            Opcode::StoreGlobal { name, strict } => {
                let value = frame.pop();
                if *strict && !self.heap.has_property(self.global, name) {
                    return Err(reference_error(format!("{} is not defined", name)));
                }
                self.heap.set_property(self.global, name, value);
            }
            Opcode::DeclareGlobal(name) => {
                let exists = self
                    .heap
                    .get(self.global)
                    .is_some_and(|global| global.properties.contains_key(name));
                if !exists {
                    self.heap.define_property(
                        self.global,
                        name,
                        Property {
                            value: Value::Undefined,
                            enumerable: true,
                            configurable: false,
                        },
                    );
                }
            }

            Opcode::ToNumber => {
                let value = frame.pop();
                let number = self.to_number_value(&value)?;
                frame.push(Value::number(number));
            }
            Opcode::Add => {
                let right = frame.pop();
                let left = frame.pop();
                let result = self.add(&left, &right)?;
                frame.push(result);
            }
            Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Mod
            | Opcode::Exp
            | Opcode::BitAnd
            | Opcode::BitOr
            | Opcode::BitXor
            | Opcode::ShiftLeft
            | Opcode::ShiftRight
            | Opcode::UnsignedShiftRight => {
                let right = frame.pop();
                let left = frame.pop();
                let left = self.to_number_value(&left)?;
                let right = self.to_number_value(&right)?;
                frame.push(numeric_binary(opcode, left, right));
            }
            Opcode::Neg | Opcode::Inc | Opcode::Dec | Opcode::BitNot => {
                let value = frame.pop();
                let n = self.to_number_value(&value)?;
                let result = match opcode {
                    Opcode::Neg => -n,
                    Opcode::Inc => n + 1.0,
                    Opcode::Dec => n - 1.0,
                    _ => f64::from(!to_int32(n)),
                };
                frame.push(Value::number(result));
            }
            Opcode::Not => {
                let value = frame.pop();
                frame.push(Value::Boolean(!to_boolean(&value)));
            }
            Opcode::Typeof => {
                let value = frame.pop();
                frame.push(Value::String(self.type_of(&value).to_string()));
            }

            Opcode::Equal => {
                let right = frame.pop();
                let left = frame.pop();
                let equal = self.loose_equals(&left, &right)?;
                frame.push(Value::Boolean(equal));
            }
            Opcode::StrictEqual => {
                let right = frame.pop();
                let left = frame.pop();
                frame.push(Value::Boolean(strict_equals(&left, &right)));
            }
            Opcode::Compare { kind, swap } => {
                let right = frame.pop();
                let left = frame.pop();
                let left = self.to_primitive(&left, PreferredType::Number)?;
                let right = self.to_primitive(&right, PreferredType::Number)?;
                let (x, y) = if *swap { (right, left) } else { (left, right) };
                let result = match kind {
                    CompareKind::LessThan => less_than(&x, &y).unwrap_or(false),
                    CompareKind::LessThanOrEqual => less_than(&y, &x).is_some_and(|greater| !greater),
                };
                frame.push(Value::Boolean(result));
            }
            Opcode::Instanceof => {
                let constructor = frame.pop();
                let value = frame.pop();
                let result = self.instance_of(&value, &constructor)?;
                frame.push(Value::Boolean(result));
            }
            Opcode::In => {
                let object = frame.pop();
                let key = frame.pop();
                let result = self.has_in(&key, &object)?;
                frame.push(Value::Boolean(result));
            }

            Opcode::Jump(target) => frame.ip = *target,
            Opcode::JumpIfTrue(target) => {
                if to_boolean(&frame.pop()) {
                    frame.ip = *target;
                }
            }
            Opcode::JumpIfFalse(target) => {
                if !to_boolean(&frame.pop()) {
                    frame.ip = *target;
                }
            }
            Opcode::Return => return Ok(Some(frame.pop())),

            Opcode::CreateObject => {
                let id = self
                    .heap
                    .allocate(JsObject::new(ObjectKind::Ordinary, Some(self.object_prototype)));
                frame.push(Value::HeapObject(id));
            }
            Opcode::CreateArray(count) => {
                let elements = frame.pop_n(*count);
                let array = self.create_array(elements);
                frame.push(array);
            }
            Opcode::DefineProperty(key) => {
                let value = frame.pop();
                if let Value::HeapObject(id) = frame.peek() {
                    self.heap.define_property(id, key, Property::data(value));
                }
            }
            Opcode::LoadProperty(key) => {
                let object = frame.pop();
                let value = self.get_value(&object, key)?;
                frame.push(value);
            }
            Opcode::StoreProperty(key) => {
                let value = frame.pop();
                let object = frame.pop();
                self.set_value(&object, key, value.clone(), frame.strict)?;
                frame.push(value);
            }
            Opcode::GetIndex => {
                let key = frame.pop();
                let object = frame.pop();
                let key = self.to_string_value(&key)?;
                let value = self.get_value(&object, &key)?;
                frame.push(value);
            }
            Opcode::SetIndex => {
                let value = frame.pop();
                let key = frame.pop();
                let object = frame.pop();
                let key = self.to_string_value(&key)?;
                self.set_value(&object, &key, value.clone(), frame.strict)?;
                frame.push(value);
            }
            Opcode::DeleteProperty => {
                let key = frame.pop();
                let object = frame.pop();
                let key = self.to_string_value(&key)?;
                let deleted = match object {
                    Value::Undefined | Value::Null => {
                        return Err(JsError::new(
                            ErrorKind::TypeError,
                            format!("Cannot convert undefined or null to object (deleting '{}')", key),
                        )
                        .into());
                    }
                    Value::HeapObject(id) => self.heap.delete_property(id, &key),
                    _ => true,
                };
                if !deleted && frame.strict {
                    return Err(JsError::new(
                        ErrorKind::TypeError,
                        format!("Cannot delete property '{}'", key),
                    )
                    .into());
                }
                frame.push(Value::Boolean(deleted));
            }
            Opcode::EnumerateKeys => {
                let value = frame.pop();
                let keys = match &value {
                    Value::HeapObject(id) => self.heap.enumerable_keys(*id),
                    Value::String(s) => (0..s.encode_utf16().count()).map(|i| i.to_string()).collect(),
                    _ => Vec::new(),
                };
                let keys = keys.into_iter().map(Value::String).collect();
                let array = self.create_array(keys);
                frame.push(array);
            }

            Opcode::CreateClosure(index) => {
                let template = chunk.nested_functions().get(*index).cloned().ok_or_else(|| {
                    JsError::new(ErrorKind::InternalError, format!("no nested function {}", index))
                })?;
                let closure = self.create_closure(template, frame.env.clone());
                frame.push(closure);
            }
            Opcode::Call(argc) => {
                let args = frame.pop_n(usize::from(*argc));
                let callee = frame.pop();
                let result = self.call(&callee, Value::Undefined, args)?;
                frame.push(result);
            }
            Opcode::CallMethod(argc) => {
                let args = frame.pop_n(usize::from(*argc));
                let callee = frame.pop();
                let this = frame.pop();
                let result = self.call(&callee, this, args)?;
                frame.push(result);
            }
            Opcode::CallNew(argc) => {
                let args = frame.pop_n(usize::from(*argc));
                let callee = frame.pop();
                let result = self.construct(&callee, args)?;
                frame.push(result);
            }
            Opcode::CallEval { argc, strict } => {
                let args = frame.pop_n(usize::from(*argc));
                let callee = frame.pop();
                let result = self.call_eval(&callee, args, *strict, frame)?;
                frame.push(result);
            }

            Opcode::Throw => return Err(Abrupt::Throw(frame.pop())),
            Opcode::ThrowError { kind, message } => {
                return Err(JsError::new(*kind, message.clone()).into());
            }
            Opcode::PushTry(target) => {
                frame.handlers.push(Handler {
                    catch_ip: *target,
                    stack_len: frame.stack.len(),
                    env: frame.env.clone(),
                });
            }
            Opcode::PopTry => {
                frame.handlers.pop();
            }

            Opcode::Pop => {
                frame.pop();
            }
            Opcode::Dup => {
                let top = frame.peek();
                frame.push(top);
            }
            Opcode::Dup2 => {
                let pair = frame.stack.len().checked_sub(2).map(|start| frame.stack[start..].to_vec());
                if let Some(pair) = pair {
                    frame.stack.extend(pair);
                }
            }
        }
        Ok(None)
    }

    /// Assigns an existing declarative binding, honouring TDZ and `const`.
    fn assign_binding(record: &Environment, name: &str, value: Value) -> Result<(), Abrupt> {
        match record.binding(name) {
            Some(binding) if matches!(binding.value, Value::Uninitialized) => Err(uninitialized(name)),
            Some(binding) if !binding.mutable => Err(constant_assignment()),
            Some(_) => {
                record.initialize(name, value);
                Ok(())
            }
            None => Err(reference_error(format!("{} is not defined", name))),
        }
    }

    fn resolve_name(&self, env: &Env, name: &str) -> NameReference {
        let mut current = env.clone();
        while let Some(record) = current {
            match &record.record {
                Record::Declarative { .. } => {
                    if record.binding(name).is_some() {
                        return NameReference::Binding(Rc::clone(&record));
                    }
                }
                Record::Object(id) => {
                    if self.heap.has_property(*id, name) {
                        return NameReference::Property(*id);
                    }
                }
            }
            current = record.parent.clone();
        }
        if self.heap.has_property(self.global, name) {
            NameReference::Property(self.global)
        } else {
            NameReference::Unresolved
        }
    }

    /// `var` from eval code: the nearest variable record, else a deletable
    /// property of the global object.
    fn declare_var(&mut self, env: &Env, name: &str) {
        let mut current = env.clone();
        while let Some(record) = current {
            if record.is_variable_scope() {
                record.declare(name);
                return;
            }
            current = record.parent.clone();
        }
        if !self.heap.has_property(self.global, name) {
            self.heap
                .define_property(self.global, name, Property::data(Value::Undefined));
        }
    }
}

fn numeric_binary(opcode: &Opcode, left: f64, right: f64) -> Value {
    let shift = || to_uint32(right) & 31;
    let result = match opcode {
        Opcode::Sub => left - right,
        Opcode::Mul => left * right,
        Opcode::Div => left / right,
        Opcode::Mod => left % right,
        Opcode::Exp => exponentiate(left, right),
        Opcode::BitAnd => f64::from(to_int32(left) & to_int32(right)),
        Opcode::BitOr => f64::from(to_int32(left) | to_int32(right)),
        Opcode::BitXor => f64::from(to_int32(left) ^ to_int32(right)),
        Opcode::ShiftLeft => f64::from(to_int32(left).wrapping_shl(shift())),
        Opcode::ShiftRight => f64::from(to_int32(left).wrapping_shr(shift())),
        Opcode::UnsignedShiftRight => f64::from(to_uint32(left) >> shift()),
        _ => f64::NAN,
    };
    Value::number(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytecode_system::{RegisterId, Value as Constant};

    fn run(chunk: &BytecodeChunk) -> Result<Value, JsError> {
        VM::new().execute(chunk)
    }

    #[test]
    fn test_shift_masks_count() {
        assert_eq!(numeric_binary(&Opcode::ShiftLeft, 10.0, 1.2), Value::Smi(20));
        assert_eq!(numeric_binary(&Opcode::ShiftLeft, 8.0, -2.0), Value::Smi(0));
        assert_eq!(numeric_binary(&Opcode::ShiftLeft, 1.0, 33.0), Value::Smi(2));
        assert_eq!(numeric_binary(&Opcode::ShiftRight, -8.0, 1.0), Value::Smi(-4));
        assert_eq!(
            numeric_binary(&Opcode::UnsignedShiftRight, -1.0, 0.0),
            Value::number(4294967295.0)
        );
    }

    #[test]
    fn test_mod_keeps_dividend_sign() {
        assert_eq!(numeric_binary(&Opcode::Mod, -7.0, 2.0), Value::Smi(-1));
        assert_eq!(numeric_binary(&Opcode::Mod, 7.5, 2.0), Value::Double(1.5));
    }

    #[test]
    fn test_registers_and_jumps() {
        let mut chunk = BytecodeChunk::new();
        chunk.register_count = 1;
        let five = chunk.add_constant(Constant::Number(5.0));
        chunk.emit(Opcode::LoadConstant(five));
        chunk.emit(Opcode::StoreLocal(RegisterId(0)));
        chunk.emit(Opcode::LoadFalse);
        chunk.emit(Opcode::JumpIfFalse(6));
        chunk.emit(Opcode::LoadNull);
        chunk.emit(Opcode::Return);
        chunk.emit(Opcode::LoadLocal(RegisterId(0)));
        chunk.emit(Opcode::Return);
        assert_eq!(run(&chunk).unwrap(), Value::Smi(5));
    }

    #[test]
    fn test_compare_swap() {
        // 3 > 2 is 2 < 3
        let mut chunk = BytecodeChunk::new();
        let three = chunk.add_constant(Constant::Number(3.0));
        let two = chunk.add_constant(Constant::Number(2.0));
        chunk.emit(Opcode::LoadConstant(three));
        chunk.emit(Opcode::LoadConstant(two));
        chunk.emit(Opcode::Compare {
            kind: CompareKind::LessThan,
            swap: true,
        });
        chunk.emit(Opcode::Return);
        assert_eq!(run(&chunk).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_less_than_or_equal_with_nan_is_false() {
        let mut chunk = BytecodeChunk::new();
        let one = chunk.add_constant(Constant::Number(1.0));
        chunk.emit(Opcode::LoadUndefined);
        chunk.emit(Opcode::LoadConstant(one));
        chunk.emit(Opcode::Compare {
            kind: CompareKind::LessThanOrEqual,
            swap: false,
        });
        chunk.emit(Opcode::Return);
        assert_eq!(run(&chunk).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_handler_catches_thrown_error() {
        let mut chunk = BytecodeChunk::new();
        chunk.emit(Opcode::PushTry(3));
        chunk.emit(Opcode::ThrowError {
            kind: ErrorKind::TypeError,
            message: "boom".into(),
        });
        chunk.emit(Opcode::Return);
        chunk.emit(Opcode::LoadProperty("message".into()));
        chunk.emit(Opcode::Return);
        assert_eq!(run(&chunk).unwrap(), Value::String("boom".into()));
    }

    #[test]
    fn test_uncaught_error_carries_position() {
        let mut chunk = BytecodeChunk::new();
        chunk.emit(Opcode::LoadNull);
        chunk.emit_with_position(
            Opcode::LoadProperty("x".into()),
            core_types::SourcePosition::new(3, 1, 20),
        );
        chunk.emit(Opcode::Return);
        let error = run(&chunk).unwrap_err();
        assert!(error.is(ErrorKind::TypeError));
        assert_eq!(error.line(), Some(3));
    }

    #[test]
    fn test_tdz_on_scoped_binding() {
        let mut chunk = BytecodeChunk::new();
        chunk.emit(Opcode::PushScope(bytecode_system::ScopeLayout {
            lets: vec!["x".into()],
            ..Default::default()
        }));
        chunk.emit(Opcode::LoadScoped {
            hops: 0,
            name: "x".into(),
        });
        chunk.emit(Opcode::Return);
        let error = run(&chunk).unwrap_err();
        assert!(error.is(ErrorKind::ReferenceError));
        assert!(error.message.contains("before initialization"));
    }
}
