//! ECMAScript Compiler Component
//!
//! Turns source text into bytecode routines: lexer, operator-precedence
//! expression parser, statement parser, scope manager and code generator.
//!
//! # Overview
//!
//! - [`Lexer`] - Tokenizes source text, operand- or operator-position aware
//! - [`operators`] - The operator table driving expression parsing
//! - [`Parser`] - Statement parser producing a [`Program`]
//! - [`ScopeTree`] - Declarations, hoisting and storage decisions per scope
//! - [`BytecodeGenerator`] - Lowers the AST to bytecode
//! - [`Compiler`] - Entry point tying it all together
//!
//! # Example
//!
//! ```
//! use parser::{CodeContext, Compiler, CompilerOptions, Parser};
//!
//! let program = Parser::new("let x = 5 + 6 * 2;").parse_program().unwrap();
//! assert_eq!(program.statements.len(), 1);
//!
//! let compiler = Compiler::new(CompilerOptions::default());
//! let routine = compiler.compile("x = 1 +\n 5", CodeContext::Global).unwrap();
//! assert!(routine.chunk.instruction_count() > 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod bytecode_gen;
pub mod compiler;
pub mod context;
pub mod error;
mod expression;
pub mod lexer;
pub mod operators;
pub mod parser;
pub mod scope;

pub use ast::{Expression, FunctionLiteral, OperatorExpression, Program, Statement};
pub use bytecode_gen::{BytecodeGenerator, GeneratedUnit};
pub use compiler::{CompiledRoutine, Compiler};
pub use context::{CodeContext, CompatibilityMode, CompilerOptions, MethodContext, OptimizationHints};
pub use lexer::{Keyword, Lexer, Punctuator, Token};
pub use operators::{operator_table, Operator, OperatorKind};
pub use parser::Parser;
pub use scope::{Binding, DeclarationKind, ScopeId, ScopeKind, ScopeTree, StorageStrategy};
