//! Tests for BytecodeChunk and FunctionTemplate

use bytecode_system::{BytecodeChunk, FunctionTemplate, Opcode, Value};
use core_types::{SourcePosition, SourceSpan};

#[test]
fn test_chunk_creation() {
    let chunk = BytecodeChunk::new();
    assert_eq!(chunk.instructions.len(), 0);
    assert_eq!(chunk.constants.len(), 0);
    assert_eq!(chunk.register_count, 0);
    assert!(chunk.nested_functions().is_empty());
}

#[test]
fn test_chunk_emit_with_position_records_line() {
    let mut chunk = BytecodeChunk::new();
    let idx = chunk.emit_with_position(Opcode::Throw, SourcePosition::new(7, 3, 64));
    assert_eq!(idx, 0);
    assert_eq!(chunk.position_at(idx).map(|p| p.line), Some(7));
    assert_eq!(chunk.positions.len(), 1);

    chunk.emit(Opcode::Return);
    assert_eq!(chunk.position_at(1), None);
}

#[test]
fn test_chunk_constant_pool_keeps_signed_zero_apart() {
    let mut chunk = BytecodeChunk::new();
    let pos = chunk.add_constant(Value::Number(0.0));
    let neg = chunk.add_constant(Value::Number(-0.0));
    assert_ne!(pos, neg);
    assert_eq!(chunk.add_constant(Value::Number(0.0)), pos);
}

#[test]
fn test_nested_function_templates_are_shared() {
    let mut chunk = BytecodeChunk::new();
    let idx = chunk.add_nested_function(FunctionTemplate {
        name: None,
        params: vec!["x".into(), "x".into()],
        strict: true,
        chunk: BytecodeChunk::new(),
        span: SourceSpan::new(0, 14, 1),
    });
    let copy = chunk.clone();
    assert!(std::rc::Rc::ptr_eq(
        &chunk.nested_functions()[idx],
        &copy.nested_functions()[idx]
    ));
    assert_eq!(copy.nested_functions()[idx].params, vec!["x", "x"]);
}
