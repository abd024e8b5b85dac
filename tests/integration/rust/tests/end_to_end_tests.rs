//! End-to-End JavaScript Execution Tests
//!
//! Source -> Parser -> Scope Manager -> BytecodeGenerator -> VM -> Result.
//! Covers:
//! - Precedence, associativity and automatic semicolon insertion
//! - Hoisting and loop variables
//! - Functions, closures and constructors
//! - Exception handling
//! - Objects, arrays and control flow

use core_types::{ErrorKind, Value};
use integration_tests::{assert_number, assert_string, execute_in_vm, execute_js};

// ============================================================================
// Precedence and associativity
// ============================================================================

#[test]
fn test_multiplication_binds_tighter_than_addition() {
    let result = execute_js("5 + 6 * 2").unwrap();
    assert_number(&result, 17.0, "5 + 6 * 2");
}

#[test]
fn test_parenthesized_grouping() {
    let result = execute_js("(5 + 6) * 2").unwrap();
    assert_number(&result, 22.0, "(5 + 6) * 2");
}

#[test]
fn test_assignment_is_right_associative() {
    let (result, vm) = execute_in_vm("var a, b, c = 3; a = b = c; a + b").unwrap();
    assert_number(&result, 6.0, "a = b = c");
    assert_eq!(vm.get_global("a"), Some(Value::Smi(3)));
    assert_eq!(vm.get_global("b"), Some(Value::Smi(3)));
}

#[test]
fn test_exponent_is_right_associative() {
    let result = execute_js("2 ** 3 ** 2").unwrap();
    assert_number(&result, 512.0, "2 ** 3 ** 2");
}

#[test]
fn test_subtraction_is_left_associative() {
    let result = execute_js("10 - 4 - 3").unwrap();
    assert_number(&result, 3.0, "10 - 4 - 3");
}

#[test]
fn test_conditional_nests_to_the_right() {
    let result = execute_js("var n = 2; n == 1 ? 'one' : n == 2 ? 'two' : 'many'").unwrap();
    assert_string(&result, "two", "nested conditional");
}

#[test]
fn test_logical_operators_short_circuit() {
    let (result, vm) = execute_in_vm("var hit = 0; false && (hit = 1); true || (hit = 2); null || 'x'").unwrap();
    assert_string(&result, "x", "|| yields the operand");
    assert_eq!(vm.get_global("hit"), Some(Value::Smi(0)));
}

// ============================================================================
// Automatic semicolon insertion
// ============================================================================

#[test]
fn test_no_insertion_after_infix_operator() {
    let result = execute_js("x = 1 + \n 5").unwrap();
    assert_number(&result, 6.0, "newline after +");
}

#[test]
fn test_postfix_on_same_line() {
    let (_, mut vm) = execute_in_vm("x = 0, y = 0").unwrap();
    vm.run_script("x ++ \n y").unwrap();
    assert_eq!(vm.get_global("x"), Some(Value::Smi(1)));
    assert_eq!(vm.get_global("y"), Some(Value::Smi(0)));
}

#[test]
fn test_line_break_turns_postfix_into_prefix() {
    let (_, mut vm) = execute_in_vm("x = 0, y = 0").unwrap();
    vm.run_script("x \n ++ y").unwrap();
    assert_eq!(vm.get_global("x"), Some(Value::Smi(0)));
    assert_eq!(vm.get_global("y"), Some(Value::Smi(1)));
}

#[test]
fn test_return_followed_by_line_break() {
    let result = execute_js("function f() { return\n 42 } f()").unwrap();
    assert_eq!(result, Value::Undefined);
}

#[test]
fn test_do_while_without_semicolon() {
    let result = execute_js("var i = 0; do i++; while (i < 3) i").unwrap();
    assert_number(&result, 3.0, "do-while ASI");
}

// ============================================================================
// Hoisting and loops
// ============================================================================

#[test]
fn test_for_loop_hoists_var() {
    let (result, vm) = execute_in_vm("y = 1; for (var x = 1; x < 5; x++) { y = y + x } y").unwrap();
    assert_number(&result, 11.0, "loop sum");
    assert_eq!(vm.get_global("x"), Some(Value::Smi(5)));
}

#[test]
fn test_for_var_without_initializer_resets_binding() {
    let (_, vm) = execute_in_vm("var runs = 0; x = 0; for (var x; x < 5; x++) { runs++ }").unwrap();
    assert_eq!(vm.get_global("x"), Some(Value::Undefined));
    assert_eq!(vm.get_global("runs"), Some(Value::Smi(0)));
}

#[test]
fn test_function_declarations_are_hoisted() {
    let result = execute_js("var r = f(); function f() { return 'early'; } r").unwrap();
    assert_string(&result, "early", "call before declaration");
}

#[test]
fn test_var_used_before_declaration_is_undefined() {
    let result = execute_js("var t = typeof v; var v = 1; t").unwrap();
    assert_string(&result, "undefined", "hoisted var");
}

#[test]
fn test_while_with_break_and_continue() {
    let result = execute_js(
        "var i = 0, s = 0;
         while (true) { i++; if (i > 10) break; if (i % 2) continue; s += i; }
         s",
    )
    .unwrap();
    assert_number(&result, 30.0, "even sum");
}

#[test]
fn test_labeled_continue_targets_outer_loop() {
    let result = execute_js(
        "var n = 0;
         outer: for (var i = 0; i < 3; i++) {
             for (var j = 0; j < 3; j++) { if (j == 1) continue outer; n++; }
         }
         n",
    )
    .unwrap();
    assert_number(&result, 3.0, "labeled continue");
}

#[test]
fn test_switch_falls_through() {
    let result = execute_js(
        "var out = '';
         switch (2) { case 1: out += 'a'; case 2: out += 'b'; case 3: out += 'c'; break; default: out += 'd'; }
         out",
    )
    .unwrap();
    assert_string(&result, "bc", "fall-through");
}

#[test]
fn test_switch_default_in_middle() {
    let result = execute_js("var out = ''; switch (9) { case 1: out = 'one'; default: out += 'x'; case 2: out += 'y'; } out")
        .unwrap();
    assert_string(&result, "xy", "default first falls into later cases");
}

#[test]
fn test_for_in_visits_keys_in_order() {
    let result = execute_js("var o = { a: 1, b: 2, c: 3 }, keys = ''; for (var k in o) keys += k; keys").unwrap();
    assert_string(&result, "abc", "for-in order");
}

#[test]
fn test_for_of_over_array() {
    let result = execute_js("var total = 0; for (var v of [1, 2, 3, 4]) total += v; total").unwrap();
    assert_number(&result, 10.0, "for-of sum");
}

// ============================================================================
// Functions and objects
// ============================================================================

#[test]
fn test_recursion() {
    let result = execute_js("function fact(n) { return n <= 1 ? 1 : n * fact(n - 1); } fact(10)").unwrap();
    assert_number(&result, 3628800.0, "factorial");
}

#[test]
fn test_closure_counter() {
    let result = execute_js(
        "function make() { var c = 0; return function () { return ++c; }; }
         var next = make(); next(); next(); next()",
    )
    .unwrap();
    assert_number(&result, 3.0, "closure state");
}

#[test]
fn test_named_function_expression_sees_itself() {
    let result = execute_js("var f = function g(n) { return n ? g(n - 1) + 1 : 0; }; f(4)").unwrap();
    assert_number(&result, 4.0, "self reference");
}

#[test]
fn test_method_call_binds_this() {
    let result = execute_js("var o = { v: 7, get: function () { return this.v; } }; o.get()").unwrap();
    assert_number(&result, 7.0, "this in method");
}

#[test]
fn test_new_with_and_without_arguments() {
    let result = execute_js(
        "function P(x) { this.x = x === undefined ? 'none' : x; }
         var bare = new P;
         new P(5).x + new P().x + bare.x",
    )
    .unwrap();
    assert_string(&result, "5nonenone", "new forms");
}

#[test]
fn test_arguments_object() {
    let result = execute_js("function f() { return arguments.length + ':' + arguments[1]; } f(1, 'b', 3)").unwrap();
    assert_string(&result, "3:b", "length and index");

    let result = execute_js("function h(a) { arguments[0] = 9; return a; } h(1)").unwrap();
    assert_number(&result, 1.0, "parameters are not aliased");

    let result = execute_js("function k() { return eval('arguments.length'); } k(1, 2)").unwrap();
    assert_number(&result, 2.0, "visible to direct eval");

    let result = execute_js("function g(arguments) { return arguments; } g(5)").unwrap();
    assert_number(&result, 5.0, "parameter named arguments wins");

    let result = execute_js("typeof arguments").unwrap();
    assert_string(&result, "undefined", "no arguments in global code");
}

#[test]
fn test_array_literal_with_elision() {
    let result = execute_js("var a = [1, , 3]; a.length + ':' + a[1] + ':' + a[2]").unwrap();
    assert_string(&result, "3:undefined:3", "elision");
}

#[test]
fn test_compound_assignment_on_members() {
    let result = execute_js("var o = { n: 1 }; o.n += 4; o['n'] *= 3; o.n <<= 1; o.n").unwrap();
    assert_number(&result, 30.0, "compound member assignment");
}

#[test]
fn test_delete_and_in() {
    let result = execute_js("var o = { a: 1 }; var before = 'a' in o; delete o.a; before && !('a' in o)").unwrap();
    assert_eq!(result, Value::Boolean(true));
}

#[test]
fn test_comma_and_void() {
    let result = execute_js("var a = (1, 2, 3); void a === undefined && a === 3").unwrap();
    assert_eq!(result, Value::Boolean(true));
}

#[test]
fn test_template_literals() {
    let result = execute_js("var who = 'world', n = 2; `hello ${who} x${n + 1}`").unwrap();
    assert_string(&result, "hello world x3", "template");
}

#[test]
fn test_tagged_template_passes_strings_and_values() {
    let result = execute_js(
        "function tag(strings, a, b) { return strings.length + '|' + strings[1] + '|' + (a + b); }
         tag`x${1}y${2}z`",
    )
    .unwrap();
    assert_string(&result, "3|y|3", "tagged template");
}

#[test]
fn test_regexp_literal_is_opaque_object() {
    let result = execute_js("var r = /a+b/gi; r.source + ' ' + r.flags").unwrap();
    assert_string(&result, "a+b gi", "regexp parts");
}

// ============================================================================
// Exceptions
// ============================================================================

#[test]
fn test_catch_binding_does_not_leak() {
    let result = execute_js("e = 5; try { throw 6; } catch (e) { var e = 10; } e").unwrap();
    assert_number(&result, 5.0, "catch scope");
}

#[test]
fn test_finally_runs_on_return() {
    let (result, vm) = execute_in_vm(
        "var log = ''; function f() { try { return 'r'; } finally { log += 'f'; } } f()",
    )
    .unwrap();
    assert_string(&result, "r", "try value");
    assert_eq!(vm.get_global("log"), Some(Value::String("f".into())));
}

#[test]
fn test_finally_runs_on_break() {
    let result = execute_js("var n = 0; while (true) { try { break; } finally { n++; } } n").unwrap();
    assert_number(&result, 1.0, "finally on break");
}

#[test]
fn test_rethrow_from_finally_path() {
    let result = execute_js(
        "var steps = '';
         try { try { throw 'inner'; } finally { steps += 'f'; } } catch (e) { steps += e; }
         steps",
    )
    .unwrap();
    assert_string(&result, "finner", "finally then outer catch");
}

#[test]
fn test_runtime_error_is_catchable() {
    let result = execute_js("var m; try { null.x; } catch (e) { m = e instanceof TypeError; } m").unwrap();
    assert_eq!(result, Value::Boolean(true));
}

#[test]
fn test_uncaught_throw_surfaces_as_error() {
    let error = execute_js("function f() { throw new RangeError('deep'); } f()").unwrap_err();
    assert!(error.is(ErrorKind::RangeError));
    assert_eq!(error.message, "deep");
}

#[test]
fn test_unbounded_recursion_is_a_range_error() {
    for source in ["function f() { f() } f()", "function f() { return f(); } f()"] {
        let error = execute_js(source).unwrap_err();
        assert!(error.is(ErrorKind::RangeError), "{} gave {:?}", source, error);
    }
    let result = execute_js(
        "function down(n) { return n == 0 ? 0 : 1 + down(n - 1); }
         var r; try { down(1e6); } catch (e) { r = down(300); } r",
    )
    .unwrap();
    assert_number(&result, 300.0, "recursion after overflow");
}

#[test]
fn test_invalid_assignment_target_throws_only_when_reached() {
    let result = execute_js("if (false) { 1 = 2; } 'fine'").unwrap();
    assert_string(&result, "fine", "unreached invalid assignment");

    let error = execute_js("1 = 2").unwrap_err();
    assert!(error.is(ErrorKind::ReferenceError));
}

#[test]
fn test_debugger_is_a_no_op() {
    let result = execute_js("debugger; 1").unwrap();
    assert_number(&result, 1.0, "debugger");
}
