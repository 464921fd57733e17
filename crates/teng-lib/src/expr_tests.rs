//! Expression evaluation through the whole pipeline.

use teng_core::{Fragment, Severity};

use crate::test_utils::{assert_clean, assert_log, g};

fn eval(expr: &str) -> (String, teng_core::ErrorLog) {
    g(&format!("${{{expr}}}"), &Fragment::new())
}

#[test]
fn integer_arithmetic_and_precedence() {
    let (out, log) = eval("1 + 2 * 3");
    assert_clean(&log);
    assert_eq!(out, "7");

    let (out, _) = eval("(1 + 2) * 3");
    assert_eq!(out, "9");

    let (out, _) = eval("7 / 2");
    assert_eq!(out, "3");

    let (out, _) = eval("7 % 3");
    assert_eq!(out, "1");

    let (out, _) = eval("-3 + 1");
    assert_eq!(out, "-2");
}

#[test]
fn real_arithmetic_keeps_the_decimal_point() {
    let (out, log) = eval("1.5 + 1.5");
    assert_clean(&log);
    assert_eq!(out, "3.0");

    let (out, _) = eval("3.14 * 1");
    assert_eq!(out, "3.14");
}

#[test]
fn division_by_zero_is_an_error() {
    let (out, log) = eval("1 / 0");
    assert_eq!(out, "undefined");
    assert_log(
        &log,
        &[(
            Severity::Error,
            (1, 4),
            "Runtime: right operand of / division operator is zero",
        )],
    );

    let (out, log) = eval("1 % 0");
    assert_eq!(out, "undefined");
    assert_eq!(
        log.entries()[0].msg,
        "Runtime: right operand of % division operator is zero",
    );
}

#[test]
fn comparison_operators_yield_ints() {
    for (expr, expected) in [
        ("1 == 1", "1"),
        ("1 != 1", "0"),
        ("2 < 3", "1"),
        ("2 <= 2", "1"),
        ("3 > 4", "0"),
        ("'abc' == 'abc'", "1"),
        ("'abc' < 'abd'", "1"),
        ("'2' == 2", "1"),
    ] {
        let (out, log) = eval(expr);
        assert_clean(&log);
        assert_eq!(out, expected, "for {expr}");
    }
}

#[test]
fn logical_operators_preserve_operand_values() {
    for (expr, expected) in [
        ("3 || 0", "3"),
        ("0 || 3", "3"),
        ("3 && 2", "2"),
        ("0 && 2", "0"),
        ("'' || 'x'", "x"),
    ] {
        let (out, log) = eval(expr);
        assert_clean(&log);
        assert_eq!(out, expected, "for {expr}");
    }
}

#[test]
fn short_circuit_skips_the_right_operand() {
    // the missing variable on the right is never evaluated
    let (out, log) = eval("1 || missing");
    assert_clean(&log);
    assert_eq!(out, "1");

    let (out, log) = eval("0 && missing");
    assert_clean(&log);
    assert_eq!(out, "0");
}

#[test]
fn concat_stringifies_both_sides() {
    let (out, log) = eval("'a' ++ 1");
    assert_clean(&log);
    assert_eq!(out, "a1");

    let (out, _) = eval("1.0 ++ 'x'");
    assert_eq!(out, "1.0x");
}

#[test]
fn repeat_builds_repeated_strings() {
    let (out, log) = eval("'ab' ** 3");
    assert_clean(&log);
    assert_eq!(out, "ababab");

    // whole reals keep their trailing .0 when stringified
    let (out, log) = eval("0.0 ** 3");
    assert_clean(&log);
    assert_eq!(out, "0.00.00.0");
}

#[test]
fn repeat_rejects_negative_counts() {
    let (out, log) = eval("'ab' ** -1");
    assert_eq!(out, "undefined");
    assert_eq!(
        log.entries()[0].msg,
        "Runtime: right operand of ** repeat operator is negative",
    );
}

#[test]
fn bit_operators_work_on_integrals() {
    for (expr, expected) in [("6 & 3", "2"), ("6 | 3", "7"), ("6 ^ 3", "5"), ("~0", "-1")] {
        let (out, log) = eval(expr);
        assert_clean(&log);
        assert_eq!(out, expected, "for {expr}");
    }
}

#[test]
fn unary_operators() {
    let (out, log) = eval("!0");
    assert_clean(&log);
    assert_eq!(out, "1");

    let (out, _) = eval("!'x'");
    assert_eq!(out, "0");

    let (out, _) = eval("-(1 + 2)");
    assert_eq!(out, "-3");
}

#[test]
fn ternary_operator() {
    let (out, log) = eval("1 ? 'a' : 'b'");
    assert_clean(&log);
    assert_eq!(out, "a");

    let (out, _) = eval("0 ? 'a' : 'b'");
    assert_eq!(out, "b");
}

#[test]
fn regex_match_operators() {
    let (out, log) = eval("'abc' =~ /b/");
    assert_clean(&log);
    assert_eq!(out, "1");

    let (out, _) = eval("'abc' !~ /b/");
    assert_eq!(out, "0");

    let (out, _) = eval("'ABC' =~ /abc/i");
    assert_eq!(out, "1");
}

#[test]
fn numeric_strings_coerce_strictly() {
    let mut root = Fragment::new();
    root.add_variable("n", "3");
    root.add_variable("bad", "3x");
    let (out, log) = g("${n + 1}", &root);
    assert_clean(&log);
    assert_eq!(out, "4");

    let (out, log) = g("${bad + 1}", &root);
    assert_eq!(out, "undefined");
    assert_eq!(
        log.entries()[0].msg,
        "Runtime: Left operand of + numeric operator is string_ref",
    );
}

#[test]
fn undefined_poisons_downstream_operators() {
    let (out, log) = g("${missing + 1}", &Fragment::new());
    assert_eq!(out, "undefined");
    assert_log(
        &log,
        &[
            (
                Severity::Warning,
                (1, 2),
                "Runtime: Variable '.missing' is undefined [open_frags=., iteration=0/1]",
            ),
            (
                Severity::Warning,
                (1, 10),
                "Runtime: Left operand of + numeric operator is undefined",
            ),
        ],
    );
}

#[test]
fn case_picks_the_matching_branch() {
    // spec scenario 7
    let mut root = Fragment::new();
    root.add_variable("n", 3);
    let (out, log) = g("${case(n, 1:'a', 2,3:'b', *:'z')}", &root);
    assert_clean(&log);
    assert_eq!(out, "b");
}

#[test]
fn case_falls_back_to_the_default_branch() {
    let mut root = Fragment::new();
    root.add_variable("n", 9);
    let (out, log) = g("${case(n, 1:'a', 2,3:'b', *:'z')}", &root);
    assert_clean(&log);
    assert_eq!(out, "z");
}

#[test]
fn case_without_default_degrades_to_undefined() {
    let mut root = Fragment::new();
    root.add_variable("n", 9);
    let (out, log) = g("${case(n, 1:'a')}", &root);
    assert_clean(&log);
    assert_eq!(out, "undefined");
}

#[test]
fn case_matches_strings_and_negative_numbers() {
    let mut root = Fragment::new();
    root.add_variable("s", "two");
    let (out, log) = g("${case(s, 'one':1, 'two':2, *:0)}", &root);
    assert_clean(&log);
    assert_eq!(out, "2");

    let mut root = Fragment::new();
    root.add_variable("n", -1);
    let (out, _) = g("${case(n, -1:'neg', *:'other')}", &root);
    assert_eq!(out, "neg");
}

#[test]
fn nested_case_expressions() {
    let mut root = Fragment::new();
    root.add_variable("a", 1);
    root.add_variable("b", 2);
    let (out, log) = g("${case(a, 1: case(b, 2:'ok', *:'no'), *:'no')}", &root);
    assert_clean(&log);
    assert_eq!(out, "ok");
}

#[test]
fn parentheses_are_transparent() {
    for expr in ["1 + 2", "'a' ++ 'b'", "3 || 0"] {
        let (plain, plain_log) = eval(expr);
        let (wrapped, wrapped_log) = eval(&format!("({expr})"));
        assert_eq!(plain, wrapped, "for {expr}");
        assert_eq!(plain_log.len(), wrapped_log.len());
    }
}

#[test]
fn comments_inside_expressions_are_ignored() {
    let (out, log) = eval("1 /* one */ + /* plus */ 2");
    assert_clean(&log);
    assert_eq!(out, "3");
}

#[test]
fn hex_and_octal_literals() {
    let (out, log) = eval("0x10 + 010");
    assert_clean(&log);
    assert_eq!(out, "24");
}

#[test]
fn expr_directive_prints_like_a_short_print() {
    let (out, log) = g("<?teng expr 1 + 1?>", &Fragment::new());
    assert_clean(&log);
    assert_eq!(out, "2");
}

#[test]
fn set_directive_defines_page_local_variables() {
    let (out, log) = g("<?teng set x = 6 * 7?>${x}", &Fragment::new());
    assert_clean(&log);
    assert_eq!(out, "42");
}

#[test]
fn data_variables_shadow_set_variables() {
    let mut root = Fragment::new();
    root.add_variable("x", "data");
    let (out, log) = g("<?teng set x = 'setvar'?>${x}", &root);
    assert_clean(&log);
    assert_eq!(out, "data");
}
