//! Bytecode chunk - compiled bytecode container
//!
//! Contains instructions, constants, nested function templates, and the
//! table mapping instruction indices back to source positions.

use std::fmt::Write as _;
use std::rc::Rc;

use core_types::{SourcePosition, SourceSpan};

use crate::opcode::Opcode;
use crate::value::Value;

/// A compiled bytecode chunk containing instructions and constants
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BytecodeChunk {
    /// Sequence of bytecode instructions
    pub instructions: Vec<Opcode>,
    /// `(instruction index, position)` pairs in ascending index order.
    ///
    /// Only instructions that can raise a runtime error get an entry.
    pub positions: Vec<(usize, SourcePosition)>,
    /// Constant pool for literal values
    pub constants: Vec<Value>,
    /// Number of registers needed for execution
    pub register_count: u32,
    /// Functions defined inside this chunk, referenced by `CreateClosure`
    pub nested_functions: Vec<Rc<FunctionTemplate>>,
}

/// A compiled function body that closures are instantiated from.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionTemplate {
    /// Declared name, if any
    pub name: Option<String>,
    /// Declared argument names in order (duplicates allowed)
    pub params: Vec<String>,
    /// Whether the body is strict code
    pub strict: bool,
    /// The function body
    pub chunk: BytecodeChunk,
    /// Span of the function in its source text
    pub span: SourceSpan,
}

impl BytecodeChunk {
    /// Create a new empty bytecode chunk
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a reference to nested functions
    pub fn nested_functions(&self) -> &[Rc<FunctionTemplate>] {
        &self.nested_functions
    }

    /// Add a nested function and return its index
    pub fn add_nested_function(&mut self, function: FunctionTemplate) -> usize {
        let idx = self.nested_functions.len();
        self.nested_functions.push(Rc::new(function));
        idx
    }

    /// Emit an instruction without source position, returning its index
    pub fn emit(&mut self, opcode: Opcode) -> usize {
        self.instructions.push(opcode);
        self.instructions.len() - 1
    }

    /// Emit an instruction with source position, returning its index
    pub fn emit_with_position(&mut self, opcode: Opcode, position: SourcePosition) -> usize {
        let idx = self.emit(opcode);
        self.positions.push((idx, position));
        idx
    }

    /// Source position recorded for the instruction at `index`, if any
    pub fn position_at(&self, index: usize) -> Option<SourcePosition> {
        self.positions
            .binary_search_by_key(&index, |&(at, _)| at)
            .ok()
            .map(|found| self.positions[found].1)
    }

    /// Add a constant to the constant pool and return its index.
    ///
    /// Identical constants share one entry.
    pub fn add_constant(&mut self, value: Value) -> usize {
        if let Some(idx) = self.constants.iter().position(|c| c.same_constant(&value)) {
            return idx;
        }
        let idx = self.constants.len();
        self.constants.push(value);
        idx
    }

    /// Get the number of instructions
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Get the number of constants
    pub fn constant_count(&self) -> usize {
        self.constants.len()
    }

    /// Index the next emitted instruction will get
    pub fn next_index(&self) -> usize {
        self.instructions.len()
    }

    /// Human-readable listing of the chunk and its nested functions.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        self.disassemble_into(&mut out, 0);
        out
    }

    fn disassemble_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let _ = writeln!(out, "{}registers: {}", indent, self.register_count);
        for (i, constant) in self.constants.iter().enumerate() {
            let _ = writeln!(out, "{}  const[{}] = {:?}", indent, i, constant);
        }
        for (i, instruction) in self.instructions.iter().enumerate() {
            let _ = writeln!(out, "{}{:04} {:?}", indent, i, instruction);
        }
        for (i, function) in self.nested_functions.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}function[{}] {}({})",
                indent,
                i,
                function.name.as_deref().unwrap_or("<anonymous>"),
                function.params.join(", ")
            );
            function.chunk.disassemble_into(out, depth + 1);
        }
    }
}
