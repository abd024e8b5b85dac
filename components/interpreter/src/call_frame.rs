//! Call frame for routine execution

use core_types::Value;

use crate::environment::Env;

/// An installed exception handler.
#[derive(Debug, Clone)]
pub struct Handler {
    /// Where execution resumes with the exception on the stack
    pub catch_ip: usize,
    /// Operand stack height to restore
    pub stack_len: usize,
    /// Record chain to restore
    pub env: Env,
}

/// Execution state of one running routine.
#[derive(Debug)]
pub struct CallFrame {
    /// Index of the next instruction
    pub ip: usize,
    /// Direct-slot variables and temporaries
    pub registers: Vec<Value>,
    /// Operand stack
    pub stack: Vec<Value>,
    /// Current record chain
    pub env: Env,
    /// `this` of the call
    pub this: Value,
    /// The function being executed, `undefined` for scripts
    pub callee: Value,
    /// Actual arguments
    pub arguments: Vec<Value>,
    /// The routine is strict code
    pub strict: bool,
    /// Active exception handlers, innermost last
    pub handlers: Vec<Handler>,
}

impl CallFrame {
    /// Creates a frame with `register_count` undefined registers.
    pub fn new(register_count: u32, env: Env, this: Value, callee: Value, arguments: Vec<Value>) -> Self {
        Self {
            ip: 0,
            registers: vec![Value::Undefined; register_count as usize],
            stack: Vec::with_capacity(16),
            env,
            this,
            callee,
            arguments,
            strict: false,
            handlers: Vec::new(),
        }
    }

    /// Marks the frame as running strict code.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Pops the operand stack; an empty stack yields `undefined`.
    pub fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or(Value::Undefined)
    }

    /// Pops `count` values, returned in push order.
    pub fn pop_n(&mut self, count: usize) -> Vec<Value> {
        let start = self.stack.len().saturating_sub(count);
        self.stack.split_off(start)
    }

    /// Pushes onto the operand stack.
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// The top of the operand stack.
    pub fn peek(&self) -> Value {
        self.stack.last().cloned().unwrap_or(Value::Undefined)
    }

    /// Reads a register; out-of-range registers read as `undefined`.
    pub fn register(&self, index: u32) -> Value {
        self.registers
            .get(index as usize)
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    /// Writes a register, growing the file if needed.
    pub fn set_register(&mut self, index: u32, value: Value) {
        let index = index as usize;
        if index >= self.registers.len() {
            self.registers.resize(index + 1, Value::Undefined);
        }
        self.registers[index] = value;
    }
}
