//! Scope Manager behavior observed through execution
//!
//! Lexical declarations, storage strategies (direct slots versus dynamic
//! records), `with`, direct and indirect `eval`, and strict-mode rules.

use core_types::{ErrorKind, Value};
use integration_tests::{assert_number, assert_string, execute_in_vm, execute_js, init_tracing};
use interpreter::VM;
use parser::{CompilerOptions, Compiler, CodeContext};

// ============================================================================
// Block scoping
// ============================================================================

#[test]
fn test_let_is_block_scoped() {
    let result = execute_js("var r = 'outer'; { let r = 'inner'; } r").unwrap();
    assert_string(&result, "outer", "block let");
}

#[test]
fn test_let_in_function_is_block_scoped() {
    let result = execute_js(
        "function f() { let v = 1; { let v = 2; } return v; } f()",
    )
    .unwrap();
    assert_number(&result, 1.0, "slot let");
}

#[test]
fn test_temporal_dead_zone_in_function() {
    let error = execute_js("function f() { x; let x = 1; } f()").unwrap_err();
    assert!(error.is(ErrorKind::ReferenceError));
}

#[test]
fn test_temporal_dead_zone_through_closure() {
    let error = execute_js(
        "function f() { function g() { return x; } var r = g(); let x = 1; return r; } f()",
    )
    .unwrap_err();
    assert!(error.is(ErrorKind::ReferenceError));
}

#[test]
fn test_const_assignment_throws_type_error() {
    let error = execute_js("function f() { const c = 1; c = 2; } f()").unwrap_err();
    assert!(error.is(ErrorKind::TypeError));

    let error = execute_js("const g = 1; g = 2").unwrap_err();
    assert!(error.is(ErrorKind::TypeError));
}

#[test]
fn test_duplicate_let_is_syntax_error() {
    let error = execute_js("let a = 1; let a = 2;").unwrap_err();
    assert!(error.is(ErrorKind::SyntaxError));
}

#[test]
fn test_let_loop_bindings_are_per_iteration() {
    let result = execute_js(
        "var fs = [];
         for (let i = 0; i < 3; i++) { fs[i] = function () { return i; }; }
         '' + fs[0]() + fs[1]() + fs[2]()",
    )
    .unwrap();
    assert_string(&result, "012", "fresh binding per iteration");
}

#[test]
fn test_var_loop_binding_is_shared() {
    let result = execute_js(
        "var fs = [];
         for (var i = 0; i < 3; i++) { fs[i] = function () { return i; }; }
         '' + fs[0]() + fs[1]() + fs[2]()",
    )
    .unwrap();
    assert_string(&result, "333", "one binding");
}

#[test]
fn test_catch_parameter_shadows_in_function() {
    let result = execute_js(
        "function f() { var e = 1; try { throw 2; } catch (e) { e = 3; } return e; } f()",
    )
    .unwrap();
    assert_number(&result, 1.0, "catch parameter is its own binding");
}

// ============================================================================
// Dynamic scopes
// ============================================================================

#[test]
fn test_with_resolves_object_properties_first() {
    let result = execute_js(
        "function f() { var a = 'local'; var o = { a: 'object' }; with (o) { return a; } } f()",
    )
    .unwrap();
    assert_string(&result, "object", "with lookup");
}

#[test]
fn test_with_falls_back_to_enclosing_binding() {
    let result = execute_js(
        "function f() { var b = 'local'; with ({ a: 1 }) { return b; } } f()",
    )
    .unwrap();
    assert_string(&result, "local", "with fallback");
}

#[test]
fn test_with_assignment_writes_property() {
    let result = execute_js("var o = { p: 1 }; with (o) { p = 5; } o.p").unwrap();
    assert_number(&result, 5.0, "with store");
}

#[test]
fn test_direct_eval_sees_locals() {
    let result = execute_js("function f() { var secret = 41; return eval('secret + 1'); } f()").unwrap();
    assert_number(&result, 42.0, "direct eval");
}

#[test]
fn test_direct_eval_declares_in_caller() {
    let result = execute_js("function f() { eval('var made = 7'); return made; } f()").unwrap();
    assert_number(&result, 7.0, "eval var lands in the function record");
}

#[test]
fn test_eval_at_global_creates_global() {
    let (_, vm) = execute_in_vm("eval('var fromEval = 3')").unwrap();
    assert_eq!(vm.get_global("fromEval"), Some(Value::Smi(3)));
}

#[test]
fn test_strict_eval_keeps_vars_private() {
    let result = execute_js(
        "function f() { 'use strict'; eval('var hidden = 1'); return typeof hidden; } f()",
    )
    .unwrap();
    assert_string(&result, "undefined", "strict eval var");
}

#[test]
fn test_indirect_eval_is_global() {
    let result = execute_js(
        "var v = 'global'; function f() { var v = 'local'; var e = eval; return e('v'); } f()",
    )
    .unwrap();
    assert_string(&result, "global", "indirect eval");
}

#[test]
fn test_eval_of_non_string_returns_it() {
    let result = execute_js("eval(5)").unwrap();
    assert_number(&result, 5.0, "eval passthrough");
}

#[test]
fn test_eval_syntax_error_is_catchable() {
    let result = execute_js("var ok; try { eval('1 +'); } catch (e) { ok = e instanceof SyntaxError; } ok").unwrap();
    assert_eq!(result, Value::Boolean(true));
}

#[test]
fn test_disabled_slot_optimization_matches_slots() {
    init_tracing();
    let source = "function f(a) { var b = a * 2; { let c = b + 1; b = c; } return b; } f(4)";
    let options = CompilerOptions {
        disable_slot_optimization: true,
        ..Default::default()
    };
    let mut records = VM::with_options(options.clone());
    let routine = Compiler::new(options).compile(source, CodeContext::Global).unwrap();
    let with_records = records.execute_routine(&routine).unwrap();
    let with_slots = execute_js(source).unwrap();
    assert_eq!(with_records, with_slots);
    assert_number(&with_slots, 9.0, "same result");
}

// ============================================================================
// Strict mode
// ============================================================================

#[test]
fn test_strict_implicit_global_throws() {
    let error = execute_js("'use strict'; undeclared = 1").unwrap_err();
    assert!(error.is(ErrorKind::ReferenceError));
}

#[test]
fn test_sloppy_implicit_global_is_created() {
    let (_, vm) = execute_in_vm("function f() { implicit = 9; } f()").unwrap();
    assert_eq!(vm.get_global("implicit"), Some(Value::Smi(9)));
}

#[test]
fn test_strict_with_is_syntax_error() {
    let error = execute_js("'use strict'; with ({}) {}").unwrap_err();
    assert!(error.is(ErrorKind::SyntaxError));
}

#[test]
fn test_strict_eval_binding_is_syntax_error() {
    let error = execute_js("'use strict'; var eval = 1;").unwrap_err();
    assert!(error.is(ErrorKind::SyntaxError));
    let error = execute_js("function f(arguments) { 'use strict'; }").unwrap_err();
    assert!(error.is(ErrorKind::SyntaxError));
}

#[test]
fn test_strict_delete_identifier_is_syntax_error() {
    let error = execute_js("'use strict'; var a; delete a;").unwrap_err();
    assert!(error.is(ErrorKind::SyntaxError));
}

#[test]
fn test_force_strict_option() {
    let mut vm = VM::with_options(CompilerOptions {
        force_strict: true,
        ..Default::default()
    });
    let error = vm.run_script("sneaky = 1").unwrap_err();
    assert!(error.is(ErrorKind::ReferenceError));
}

#[test]
fn test_sloppy_this_is_global_object() {
    let result = execute_js("var g = 'yes'; function f() { return this.g; } f()").unwrap();
    assert_string(&result, "yes", "sloppy this");
}

#[test]
fn test_strict_this_is_undefined() {
    let result = execute_js("function f() { 'use strict'; return this; } f()").unwrap();
    assert_eq!(result, Value::Undefined);
}

#[test]
fn test_typeof_unresolvable_is_undefined() {
    let result = execute_js("typeof neverDeclared").unwrap();
    assert_string(&result, "undefined", "typeof guard");
}
