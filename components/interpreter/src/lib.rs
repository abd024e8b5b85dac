//! Bytecode interpreter for the JavaScript compiler
//!
//! This crate provides a bytecode virtual machine with:
//! - Stack-based execution over a per-frame register file
//! - Dynamic scope records for scopes the compiler could not keep in slots
//! - Direct and indirect `eval` through the compiler
//! - Exception handlers that turn VM errors into catchable error objects
//!
//! # Example
//!
//! ```
//! use interpreter::VM;
//! use core_types::Value;
//!
//! let mut vm = VM::new();
//! assert_eq!(vm.run_script("5 + 6 * 2").unwrap(), Value::Smi(17));
//!
//! let result = vm
//!     .run_script("e = 5; try { throw 6; } catch (e) { var e = 10; } e")
//!     .unwrap();
//! assert_eq!(result, Value::Smi(5));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod call_frame;
pub mod dispatch;
pub mod environment;
pub mod heap;
pub mod operations;
pub mod vm;

// Re-export main types at crate root
pub use call_frame::CallFrame;
pub use environment::{Env, Environment};
pub use heap::{Heap, JsObject, ObjectKind};
pub use vm::{Abrupt, VM};
