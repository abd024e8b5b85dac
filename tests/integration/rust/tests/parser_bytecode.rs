//! Parser and Bytecode Integration Tests
//!
//! AST shape, statement spans, syntax errors raised before code generation,
//! compiler options, and the compiled routines handed to the VM.

use bytecode_system::Opcode;
use core_types::ErrorKind;
use parser::{
    CodeContext, CompatibilityMode, Compiler, CompilerOptions, Expression, OperatorKind, Parser, Statement,
};

fn first_expression(source: &str) -> Expression {
    let program = Parser::new(source).parse_program().unwrap();
    match program.statements.into_iter().next() {
        Some(Statement::Expression { expression, .. }) => expression,
        other => panic!("expected an expression statement, got {:?}", other),
    }
}

fn operands(expression: &Expression) -> &[Expression] {
    &expression
        .as_operator()
        .unwrap_or_else(|| panic!("not an operator node: {:?}", expression))
        .operands
}

// ============================================================================
// Tree shape
// ============================================================================

#[test]
fn test_higher_precedence_binds_inner_operands() {
    let tree = first_expression("5 + 6 * 2");
    assert!(tree.is_operator(OperatorKind::Add));
    let parts = operands(&tree);
    assert_eq!(parts.len(), 2);
    assert!(parts[1].is_operator(OperatorKind::Multiply));
}

#[test]
fn test_lower_precedence_on_the_right() {
    let tree = first_expression("a * b + c");
    assert!(tree.is_operator(OperatorKind::Add));
    assert!(operands(&tree)[0].is_operator(OperatorKind::Multiply));
}

#[test]
fn test_assignment_chain_is_right_nested() {
    let tree = first_expression("a = b = c");
    assert!(tree.is_operator(OperatorKind::Assign));
    let parts = operands(&tree);
    assert!(matches!(parts[0], Expression::Identifier { ref name, .. } if name == "a"));
    assert!(parts[1].is_operator(OperatorKind::Assign));
}

#[test]
fn test_every_node_respects_operand_bounds() {
    fn check(expression: &Expression) {
        if let Some(op) = expression.as_operator() {
            assert!(op.operands.len() >= op.operator.min_operands, "{:?}", op.operator.kind);
            if op.operator.secondary.is_none() {
                assert!(op.operands.len() <= op.operator.max_operands, "{:?}", op.operator.kind);
            } else {
                assert!(op.closed, "{:?} left open", op.operator.kind);
            }
            op.operands.iter().for_each(check);
        }
    }
    check(&first_expression("f(a, b ? c : d, -x[i++])(1) + (y, z) * !w"));
}

#[test]
fn test_conditional_records_its_colon() {
    let tree = first_expression("a ? b : c");
    let op = tree.as_operator().unwrap();
    assert_eq!(op.operator.kind, OperatorKind::Conditional);
    assert!(op.closed);
    assert_eq!(op.operands.len(), 3);
}

// ============================================================================
// Spans
// ============================================================================

#[test]
fn test_statement_spans_reconstruct_source() {
    let source = "var a = 1;\nfunction f() { return a; }\n// note\nif (a) { a++ } else a--\nx = 1 + \n 5\nlabel: for (;;) break label;";
    let program = Parser::new(source).parse_program().unwrap();
    assert_eq!(program.statements.len(), 5);

    let mut cursor = 0;
    let mut rebuilt = Vec::new();
    for statement in &program.statements {
        let span = statement.span();
        assert!(span.start >= cursor, "spans overlap");
        let gap = &source[cursor..span.start];
        let without_comments: String = gap
            .lines()
            .map(|line| line.split("//").next().unwrap_or(""))
            .collect();
        assert!(without_comments.trim().is_empty(), "unexpected text between statements: {:?}", gap);
        rebuilt.push(span.text(source));
        cursor = span.end;
    }
    assert!(source[cursor..].trim().is_empty());
    assert_eq!(
        rebuilt,
        vec![
            "var a = 1;",
            "function f() { return a; }",
            "if (a) { a++ } else a--",
            "x = 1 + \n 5",
            "label: for (;;) break label;",
        ]
    );
}

#[test]
fn test_span_lines_are_one_based() {
    let program = Parser::new("a;\n\nb;").parse_program().unwrap();
    let lines: Vec<u32> = program.statements.iter().map(|s| s.span().line).collect();
    assert_eq!(lines, vec![1, 3]);
}

// ============================================================================
// Syntax errors
// ============================================================================

#[test]
fn test_unbalanced_conditional_is_syntax_error() {
    let error = Parser::new("a ? b;").parse_program().unwrap_err();
    assert!(error.is(ErrorKind::SyntaxError));
}

#[test]
fn test_unmatched_closing_tokens() {
    for source in ["(a", "a)", "f(1, 2", "x[1", "{ a;", "a }"] {
        let error = Parser::new(source).parse_program().unwrap_err();
        assert!(error.is(ErrorKind::SyntaxError), "{} gave {:?}", source, error);
    }
}

#[test]
fn test_missing_operand_is_syntax_error() {
    for source in ["1 +", "* 2", "a = ;", "typeof"] {
        let error = Parser::new(source).parse_program().unwrap_err();
        assert!(error.is(ErrorKind::SyntaxError), "{} gave {:?}", source, error);
    }
}

#[test]
fn test_misplaced_control_statements() {
    for source in ["return 1;", "break;", "continue;", "try {}", "a: a: ;", "while (1) { continue nowhere; }"] {
        let error = Parser::new(source).parse_program().unwrap_err();
        assert!(error.is(ErrorKind::SyntaxError), "{} gave {:?}", source, error);
    }
}

#[test]
fn test_throw_requires_expression_on_same_line() {
    let error = Parser::new("throw\n1;").parse_program().unwrap_err();
    assert!(error.is(ErrorKind::SyntaxError));
}

#[test]
fn test_error_reports_line_and_path() {
    let compiler = Compiler::new(CompilerOptions {
        source_path: Some("scripts/broken.js".into()),
        ..Default::default()
    });
    let error = compiler.compile("var ok = 1;\n\nvar = 2;", CodeContext::Global).unwrap_err();
    assert!(error.is(ErrorKind::SyntaxError));
    assert_eq!(error.line(), Some(3));
    assert_eq!(error.source_path.as_deref(), Some("scripts/broken.js"));
}

#[test]
fn test_nesting_limit_is_an_error_not_a_crash() {
    let deep = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
    let error = Compiler::default().compile(&deep, CodeContext::Global).unwrap_err();
    assert!(error.is(ErrorKind::RangeError));

    let blocks = format!("{}{}", "{".repeat(2_000), "}".repeat(2_000));
    let error = Compiler::default().compile(&blocks, CodeContext::Global).unwrap_err();
    assert!(error.is(ErrorKind::RangeError));
}

#[test]
fn test_long_chains_compile_and_run() {
    let conditional: String = (0..150).map(|i| format!("x == {} ? {} : ", i, i)).collect();
    let mut vm = interpreter::VM::new();
    let value = vm
        .run_script(&format!("var x = 149; {}-1", conditional))
        .unwrap();
    assert_eq!(value, core_types::Value::Smi(149));

    let names: Vec<String> = (0..150).map(|i| format!("a{}", i)).collect();
    vm.run_script(&format!("var {} = 7", names.join(" = "))).unwrap();
    assert_eq!(vm.get_global("a0"), Some(core_types::Value::Smi(7)));
    assert_eq!(vm.get_global("a149"), Some(core_types::Value::Smi(7)));

    let grouped = format!("{}2{} * 3", "(".repeat(100), ")".repeat(100));
    assert_eq!(vm.run_script(&grouped).unwrap(), core_types::Value::Smi(6));
}

// ============================================================================
// Options
// ============================================================================

#[test]
fn test_options_load_from_json() {
    let options: CompilerOptions = serde_json::from_str(
        r#"{ "compatibility": "ecmascript3", "source_path": "legacy.js" }"#,
    )
    .unwrap();
    assert_eq!(options.compatibility, CompatibilityMode::Ecmascript3);
    assert!(!options.force_strict);

    let mut vm = interpreter::VM::with_options(options);
    let value = vm.run_script("010").unwrap();
    assert_eq!(value, core_types::Value::Smi(8));
}

#[test]
fn test_legacy_octal_rejected_by_default() {
    let error = Compiler::default().compile("010", CodeContext::Global).unwrap_err();
    assert!(error.is(ErrorKind::SyntaxError));
}

// ============================================================================
// Compiled routines
// ============================================================================

#[test]
fn test_global_routine_declares_globals() {
    let routine = Compiler::default()
        .compile("var a = 1; function b() {}", CodeContext::Global)
        .unwrap();
    let declared: Vec<&str> = routine
        .chunk
        .instructions
        .iter()
        .filter_map(|op| match op {
            Opcode::DeclareGlobal(name) => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert!(declared.contains(&"a"));
    assert!(declared.contains(&"b"));
    assert_eq!(routine.methods.len(), 1);
}

#[test]
fn test_function_context_routine() {
    let routine = Compiler::default()
        .compile(
            "return a + b;",
            CodeContext::Function {
                arguments: vec!["a".into(), "b".into()],
            },
        )
        .unwrap();
    assert_eq!(routine.arguments, vec!["a".to_string(), "b".to_string()]);

    let mut vm = interpreter::VM::new();
    let function = vm.instantiate(&routine);
    let result = vm
        .call_function(
            &function,
            core_types::Value::Undefined,
            vec![core_types::Value::Smi(2), core_types::Value::Smi(3)],
        )
        .unwrap();
    assert_eq!(result, core_types::Value::Smi(5));
}

#[test]
fn test_direct_eval_hint_reaches_recompilation() {
    let compiler = Compiler::default();
    let first = compiler
        .compile("function f() { return eval('1'); }", CodeContext::Global)
        .unwrap();
    let method = first.methods.iter().find(|m| m.hints.has_eval).unwrap();

    let again = compiler
        .compile_with_hints("var plain = 1; plain", CodeContext::Global, Some(&method.hints))
        .unwrap();
    assert!(again.hints.has_eval);
}

#[test]
fn test_instructions_carry_positions() {
    let routine = Compiler::default()
        .compile("var a;\n\na.b;", CodeContext::Global)
        .unwrap();
    let load = routine
        .chunk
        .instructions
        .iter()
        .position(|op| matches!(op, Opcode::LoadProperty(_)))
        .unwrap();
    assert_eq!(routine.chunk.position_at(load).map(|p| p.line), Some(3));

    let error = interpreter::VM::new().execute_routine(&routine).unwrap_err();
    assert!(error.is(ErrorKind::TypeError));
    assert_eq!(error.line(), Some(3));
}
