//! Compilation entry point
//!
//! [`Compiler`] owns everything a compilation needs; no state is kept in
//! thread-locals or globals, so independent compilers can run side by side.

use bytecode_system::BytecodeChunk;
use core_types::{JsError, SourceSpan};
use tracing::debug;

use crate::bytecode_gen::{BytecodeGenerator, GeneratedUnit};
use crate::context::{CodeContext, CompilerOptions, MethodContext, OptimizationHints};
use crate::parser::Parser;

/// A compiled unit, ready to run.
#[derive(Debug)]
pub struct CompiledRoutine {
    /// Code of the unit
    pub chunk: BytecodeChunk,
    /// Declared argument names in order; duplicates are kept
    pub arguments: Vec<String>,
    /// Hints accumulated while parsing
    pub hints: OptimizationHints,
    /// Source span of the unit
    pub span: SourceSpan,
    /// The unit is strict code
    pub strict: bool,
    /// Kind of code compiled
    pub context: CodeContext,
    /// Every function of the unit
    pub methods: Vec<MethodContext>,
}

/// Compiles source text to executable routines.
///
/// # Examples
///
/// ```
/// use parser::{CodeContext, Compiler, CompilerOptions};
///
/// let compiler = Compiler::new(CompilerOptions::default());
/// let routine = compiler.compile("var x = 5 + 6 * 2;", CodeContext::Global).unwrap();
/// assert!(!routine.strict);
/// assert!(routine.chunk.instruction_count() > 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompilerOptions,
}

impl Compiler {
    /// Creates a compiler with the given options.
    pub fn new(options: CompilerOptions) -> Self {
        Self { options }
    }

    /// The compiler's options.
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compiles `source` as the given kind of code.
    pub fn compile(&self, source: &str, context: CodeContext) -> Result<CompiledRoutine, JsError> {
        self.compile_with_hints(source, context, None)
    }

    /// Compiles `source`, folding in hints from an earlier compilation of
    /// the same code. A previously observed `eval` keeps every scope in a
    /// dynamic record.
    pub fn compile_with_hints(
        &self,
        source: &str,
        context: CodeContext,
        hints: Option<&OptimizationHints>,
    ) -> Result<CompiledRoutine, JsError> {
        self.compile_unit(source, context, hints).map_err(|error| {
            match &self.options.source_path {
                Some(path) => error.with_path(path.clone()),
                None => error,
            }
        })
    }

    fn compile_unit(
        &self,
        source: &str,
        context: CodeContext,
        previous: Option<&OptimizationHints>,
    ) -> Result<CompiledRoutine, JsError> {
        let mut options = self.options.clone();
        if previous.is_some_and(|hints| hints.has_eval) {
            options.disable_slot_optimization = true;
        }

        debug!(
            context = ?context,
            path = options.source_path.as_deref().unwrap_or("<anonymous>"),
            force_strict = options.force_strict,
            "compiling unit"
        );
        let program = Parser::with_options(source, options, context.clone()).parse_program()?;

        let (GeneratedUnit { chunk, methods }, arguments, span) = match program.function.as_deref() {
            Some(function) => (
                BytecodeGenerator::generate_function_unit(&program)?,
                function.params.clone(),
                function.span,
            ),
            None => (
                BytecodeGenerator::generate_program(&program)?,
                Vec::new(),
                SourceSpan::new(0, source.len(), 1),
            ),
        };

        let mut hints = match &program.function {
            Some(function) => function.hints.clone(),
            None => program.hints.clone(),
        };
        if let Some(previous) = previous {
            hints.merge(previous);
        }

        debug!(
            statements = program.statements.len(),
            strict = program.strict,
            instructions = chunk.instruction_count(),
            "compiled unit"
        );
        Ok(CompiledRoutine {
            chunk,
            arguments,
            hints,
            span,
            strict: program.strict,
            context,
            methods,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytecode_system::Opcode;
    use core_types::ErrorKind;

    #[test]
    fn test_syntax_error_carries_path_and_line() {
        let compiler = Compiler::new(CompilerOptions {
            source_path: Some("app.js".to_string()),
            ..Default::default()
        });
        let error = compiler.compile("var a = 1;\nvar b = a ? 2;", CodeContext::Global).unwrap_err();
        assert!(error.is(ErrorKind::SyntaxError));
        assert_eq!(error.line(), Some(2));
        assert_eq!(error.source_path.as_deref(), Some("app.js"));
    }

    #[test]
    fn test_function_context() {
        let compiler = Compiler::default();
        let routine = compiler
            .compile(
                "return a + b;",
                CodeContext::Function {
                    arguments: vec!["a".into(), "b".into()],
                },
            )
            .unwrap();
        assert_eq!(routine.arguments, vec!["a".to_string(), "b".to_string()]);
        let ops: Vec<_> = routine.chunk.instructions.iter().collect();
        assert!(ops.contains(&&Opcode::LoadArgument(1)));
    }

    #[test]
    fn test_strict_eval_context() {
        let routine = Compiler::default()
            .compile("var x = 1;", CodeContext::Eval { strict: true })
            .unwrap();
        assert!(routine.strict);
    }

    #[test]
    fn test_hints_with_eval_force_records() {
        let source = "function f() { var x = 1; return x; }";
        let compiler = Compiler::default();

        let fast = compiler.compile(source, CodeContext::Global).unwrap();
        let uses_slots = |routine: &CompiledRoutine| {
            routine.methods[0]
                .routine
                .chunk
                .instructions
                .iter()
                .all(|op| !matches!(op, Opcode::PushScope(_)))
        };
        assert!(uses_slots(&fast));

        let previous = OptimizationHints {
            has_eval: true,
            ..Default::default()
        };
        let slow = compiler
            .compile_with_hints(source, CodeContext::Global, Some(&previous))
            .unwrap();
        assert!(!uses_slots(&slow));
        assert!(slow.hints.has_eval);
    }

    #[test]
    fn test_hints_are_collected() {
        let routine = Compiler::default()
            .compile("x; x; function g() { return this; }", CodeContext::Global)
            .unwrap();
        assert_eq!(routine.hints.variable_occurrences.get("x"), Some(&2));
        assert!(routine.hints.has_nested_function);
        assert!(routine.methods[0].hints.has_this);
    }
}
