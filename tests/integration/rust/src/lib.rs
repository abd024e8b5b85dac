//! Integration test suite for the JavaScript compiler
//!
//! Shared helpers for tests that run source text through the whole
//! pipeline: lexer, parser, scope manager, code generator and VM.

use std::sync::Once;

use core_types::{JsError, Value};
use interpreter::VM;

/// Re-export components for test convenience
pub mod components {
    pub use bytecode_system;
    pub use core_types;
    pub use interpreter;
    pub use parser;
}

static TRACING: Once = Once::new();

/// Installs a test-writer subscriber filtered by `RUST_LOG`, once per
/// test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Compiles and runs `source` as program code in a fresh VM.
pub fn execute_js(source: &str) -> Result<Value, JsError> {
    init_tracing();
    VM::new().run_script(source)
}

/// Runs `source` in a fresh VM and returns the VM for inspection.
pub fn execute_in_vm(source: &str) -> Result<(Value, VM), JsError> {
    init_tracing();
    let mut vm = VM::new();
    let value = vm.run_script(source)?;
    Ok((value, vm))
}

/// Asserts that `result` is the number `expected`.
pub fn assert_number(result: &Value, expected: f64, message: &str) {
    match result.as_number() {
        Some(n) if n == expected || (n.is_nan() && expected.is_nan()) => {}
        _ => panic!("{}: expected number {}, got {:?}", message, expected, result),
    }
}

/// Asserts that `result` is the string `expected`.
pub fn assert_string(result: &Value, expected: &str, message: &str) {
    match result {
        Value::String(s) => assert_eq!(s, expected, "{}", message),
        _ => panic!("{}: expected string {:?}, got {:?}", message, expected, result),
    }
}
