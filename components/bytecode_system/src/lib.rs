//! Bytecode system for the JavaScript compiler
//!
//! This crate provides the instruction set the code generator emits and the
//! virtual machine executes.
//!
//! # Features
//!
//! - Stack machine with a per-frame register file for direct-slot variables
//! - Name-addressed dynamic scope records for `with`, `eval`, and captured
//!   variables
//! - Instructions that carry the exact ECMAScript coercion contracts
//!   (ToNumber, ToInt32/ToUint32 shifts, swapped relational comparison)
//!
//! # Example
//!
//! ```
//! use bytecode_system::{BytecodeChunk, Opcode, Value};
//!
//! let mut chunk = BytecodeChunk::new();
//!
//! let idx = chunk.add_constant(Value::Number(42.0));
//! chunk.emit(Opcode::LoadConstant(idx));
//! chunk.emit(Opcode::Return);
//!
//! assert_eq!(chunk.instruction_count(), 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod opcode;
pub mod value;

// Re-export main types at crate root
pub use chunk::{BytecodeChunk, FunctionTemplate};
pub use opcode::{CompareKind, Opcode, RegisterId, ScopeLayout};
pub use value::Value;
