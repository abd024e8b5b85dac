//! Unit tests for interpreter components

use bytecode_system::{BytecodeChunk, CompareKind, Opcode, RegisterId, ScopeLayout, Value as BcValue};
use core_types::{ErrorKind, Value};
use interpreter::{CallFrame, Environment, ObjectKind, VM};

// ============================================================================
// VM Tests
// ============================================================================

#[test]
fn test_vm_creation() {
    let vm = VM::new();
    assert_eq!(vm.get_global("undefined"), Some(Value::Undefined));
    assert!(vm.get_global("Error").is_some());
    assert!(vm.get_global("eval").is_some());
}

#[test]
fn test_vm_global_overwrite() {
    let mut vm = VM::new();

    vm.set_global("x".to_string(), Value::Smi(10));
    vm.set_global("x".to_string(), Value::Smi(20));

    assert_eq!(vm.get_global("x"), Some(Value::Smi(20)));
}

#[test]
fn test_vm_execute_add_double() {
    let mut vm = VM::new();
    let mut chunk = BytecodeChunk::new();

    let a = chunk.add_constant(BcValue::Number(1.5));
    let b = chunk.add_constant(BcValue::Number(2.5));

    chunk.emit(Opcode::LoadConstant(a));
    chunk.emit(Opcode::LoadConstant(b));
    chunk.emit(Opcode::Add);
    chunk.emit(Opcode::Return);

    assert_eq!(vm.execute(&chunk).unwrap(), Value::Smi(4));
}

#[test]
fn test_vm_execute_string_concat() {
    let mut vm = VM::new();
    let mut chunk = BytecodeChunk::new();

    let a = chunk.add_constant(BcValue::String("a".into()));
    let b = chunk.add_constant(BcValue::Number(1.0));

    chunk.emit(Opcode::LoadConstant(a));
    chunk.emit(Opcode::LoadConstant(b));
    chunk.emit(Opcode::Add);
    chunk.emit(Opcode::Return);

    assert_eq!(vm.execute(&chunk).unwrap(), Value::String("a1".into()));
}

#[test]
fn test_vm_execute_sub_coerces_strings() {
    let mut vm = VM::new();
    let mut chunk = BytecodeChunk::new();

    let a = chunk.add_constant(BcValue::String("30".into()));
    let b = chunk.add_constant(BcValue::Number(10.0));

    chunk.emit(Opcode::LoadConstant(a));
    chunk.emit(Opcode::LoadConstant(b));
    chunk.emit(Opcode::Sub);
    chunk.emit(Opcode::Return);

    assert_eq!(vm.execute(&chunk).unwrap(), Value::Smi(20));
}

#[test]
fn test_vm_execute_unsigned_shift() {
    let mut vm = VM::new();
    let mut chunk = BytecodeChunk::new();

    let a = chunk.add_constant(BcValue::Number(-16.0));
    let b = chunk.add_constant(BcValue::Number(28.0));

    chunk.emit(Opcode::LoadConstant(a));
    chunk.emit(Opcode::LoadConstant(b));
    chunk.emit(Opcode::UnsignedShiftRight);
    chunk.emit(Opcode::Return);

    assert_eq!(vm.execute(&chunk).unwrap(), Value::Smi(15));
}

#[test]
fn test_vm_execute_compare_strings() {
    let mut vm = VM::new();
    let mut chunk = BytecodeChunk::new();

    let a = chunk.add_constant(BcValue::String("apple".into()));
    let b = chunk.add_constant(BcValue::String("banana".into()));

    chunk.emit(Opcode::LoadConstant(a));
    chunk.emit(Opcode::LoadConstant(b));
    chunk.emit(Opcode::Compare {
        kind: CompareKind::LessThan,
        swap: false,
    });
    chunk.emit(Opcode::Return);

    assert_eq!(vm.execute(&chunk).unwrap(), Value::Boolean(true));
}

#[test]
fn test_vm_execute_typeof() {
    let mut vm = VM::new();
    let mut chunk = BytecodeChunk::new();

    chunk.emit(Opcode::LoadNull);
    chunk.emit(Opcode::Typeof);
    chunk.emit(Opcode::Return);

    assert_eq!(vm.execute(&chunk).unwrap(), Value::String("object".into()));
}

#[test]
fn test_vm_execute_dup2() {
    let mut vm = VM::new();
    let mut chunk = BytecodeChunk::new();

    let one = chunk.add_constant(BcValue::Number(1.0));
    let two = chunk.add_constant(BcValue::Number(2.0));
    chunk.emit(Opcode::LoadConstant(one));
    chunk.emit(Opcode::LoadConstant(two));
    chunk.emit(Opcode::Dup2);
    chunk.emit(Opcode::Sub);
    chunk.emit(Opcode::Return);

    assert_eq!(vm.execute(&chunk).unwrap(), Value::Smi(-1));
}

#[test]
fn test_vm_execute_locals() {
    let mut vm = VM::new();
    let mut chunk = BytecodeChunk::new();
    chunk.register_count = 2;

    let a = chunk.add_constant(BcValue::Number(7.0));
    chunk.emit(Opcode::LoadConstant(a));
    chunk.emit(Opcode::StoreLocal(RegisterId(1)));
    chunk.emit(Opcode::LoadLocal(RegisterId(1)));
    chunk.emit(Opcode::Inc);
    chunk.emit(Opcode::Return);

    assert_eq!(vm.execute(&chunk).unwrap(), Value::Smi(8));
}

// ============================================================================
// Scope Record Tests
// ============================================================================

#[test]
fn test_scoped_store_to_const_throws() {
    let mut vm = VM::new();
    let mut chunk = BytecodeChunk::new();

    chunk.emit(Opcode::PushScope(ScopeLayout {
        consts: vec!["c".into()],
        ..Default::default()
    }));
    chunk.emit(Opcode::LoadTrue);
    chunk.emit(Opcode::InitScoped {
        hops: 0,
        name: "c".into(),
    });
    chunk.emit(Opcode::LoadFalse);
    chunk.emit(Opcode::StoreScoped {
        hops: 0,
        name: "c".into(),
        strict: false,
    });
    chunk.emit(Opcode::LoadUndefined);
    chunk.emit(Opcode::Return);

    let error = vm.execute(&chunk).unwrap_err();
    assert!(error.is(ErrorKind::TypeError));
}

#[test]
fn test_scope_has_walks_hops() {
    let mut vm = VM::new();
    let mut chunk = BytecodeChunk::new();

    chunk.emit(Opcode::PushScope(ScopeLayout {
        vars: vec!["outer".into()],
        ..Default::default()
    }));
    chunk.emit(Opcode::PushScope(ScopeLayout::default()));
    chunk.emit(Opcode::ScopeHas {
        hops: 1,
        name: "outer".into(),
    });
    chunk.emit(Opcode::Return);

    assert_eq!(vm.execute(&chunk).unwrap(), Value::Boolean(true));
}

#[test]
fn test_with_scope_reads_object_properties() {
    let mut vm = VM::new();
    let mut chunk = BytecodeChunk::new();

    let five = chunk.add_constant(BcValue::Number(5.0));
    chunk.emit(Opcode::CreateObject);
    chunk.emit(Opcode::LoadConstant(five));
    chunk.emit(Opcode::DefineProperty("p".into()));
    chunk.emit(Opcode::PushWithScope);
    chunk.emit(Opcode::LoadName {
        name: "p".into(),
        throw_if_missing: true,
    });
    chunk.emit(Opcode::Return);

    assert_eq!(vm.execute(&chunk).unwrap(), Value::Smi(5));
}

#[test]
fn test_with_over_null_throws() {
    let mut vm = VM::new();
    let mut chunk = BytecodeChunk::new();

    chunk.emit(Opcode::LoadNull);
    chunk.emit(Opcode::PushWithScope);
    chunk.emit(Opcode::LoadUndefined);
    chunk.emit(Opcode::Return);

    assert!(vm.execute(&chunk).unwrap_err().is(ErrorKind::TypeError));
}

#[test]
fn test_load_name_missing() {
    let mut vm = VM::new();
    let mut chunk = BytecodeChunk::new();

    chunk.emit(Opcode::LoadName {
        name: "nowhere".into(),
        throw_if_missing: true,
    });
    chunk.emit(Opcode::Return);

    let error = vm.execute(&chunk).unwrap_err();
    assert!(error.is(ErrorKind::ReferenceError));
    assert_eq!(error.message, "nowhere is not defined");
}

#[test]
fn test_clone_scope_detaches_iterations() {
    let layout = ScopeLayout {
        lets: vec!["i".into()],
        ..Default::default()
    };
    let env = Environment::declarative(&layout, None);
    env.initialize("i", Value::Smi(0));
    let next = env.copy();
    next.initialize("i", Value::Smi(1));
    assert_eq!(env.binding("i").unwrap().value, Value::Smi(0));
}

// ============================================================================
// CallFrame Tests
// ============================================================================

#[test]
fn test_call_frame_strict_builder() {
    let frame = CallFrame::new(3, None, Value::Undefined, Value::Undefined, vec![Value::Smi(1)]).strict(true);
    assert!(frame.strict);
    assert_eq!(frame.registers.len(), 3);
    assert_eq!(frame.arguments, vec![Value::Smi(1)]);
}

// ============================================================================
// Script Tests
// ============================================================================

#[test]
fn test_closures_share_captured_record() {
    let mut vm = VM::new();
    let result = vm
        .run_script(
            "function counter() { var n = 0; return function () { n = n + 1; return n; }; }
             var c = counter(); c(); c(); c()",
        )
        .unwrap();
    assert_eq!(result, Value::Smi(3));
}

#[test]
fn test_constructor_and_instanceof() {
    let mut vm = VM::new();
    let result = vm
        .run_script("function P(x) { this.x = x; } var p = new P(4); p instanceof P && p.x === 4")
        .unwrap();
    assert_eq!(result, Value::Boolean(true));
}

#[test]
fn test_caught_vm_error_is_error_object() {
    let mut vm = VM::new();
    let result = vm
        .run_script("var r; try { undefinedName; } catch (e) { r = e instanceof ReferenceError; } r")
        .unwrap();
    assert_eq!(result, Value::Boolean(true));
}

#[test]
fn test_error_to_string() {
    let mut vm = VM::new();
    let result = vm.run_script("'' + new TypeError('bad')").unwrap();
    assert_eq!(result, Value::String("TypeError: bad".into()));
}

#[test]
fn test_value_of_drives_arithmetic() {
    let mut vm = VM::new();
    let result = vm
        .run_script("var o = { valueOf: function () { return 41; } }; o + 1")
        .unwrap();
    assert_eq!(result, Value::Smi(42));
}

#[test]
fn test_array_literal_is_array() {
    let mut vm = VM::new();
    let result = vm.run_script("[1, 2, 3]").unwrap();
    let Value::HeapObject(id) = result else {
        panic!("expected an object, got {:?}", result);
    };
    assert!(matches!(vm.heap().get(id).unwrap().kind, ObjectKind::Array));
    assert_eq!(vm.display(&result).unwrap(), "1,2,3");
}

#[test]
fn test_calling_non_function() {
    let mut vm = VM::new();
    let error = vm.run_script("var x = 1; x()").unwrap_err();
    assert!(error.is(ErrorKind::TypeError));
    assert!(error.message.contains("is not a function"));
}
