//! Built-in functions.

use teng_core::{Fragment, Severity};

use crate::test_utils::{assert_clean, g};

fn eval(expr: &str) -> (String, teng_core::ErrorLog) {
    g(&format!("${{{expr}}}"), &Fragment::new())
}

#[test]
fn len_counts_characters() {
    let (out, log) = eval("len('abcd')");
    assert_clean(&log);
    assert_eq!(out, "4");

    let (out, _) = eval("len('řžýá')");
    assert_eq!(out, "4");

    let (out, _) = eval("len('')");
    assert_eq!(out, "0");
}

#[test]
fn substr_is_character_indexed() {
    let (out, log) = eval("substr('abcd', 1, 3)");
    assert_clean(&log);
    assert_eq!(out, "bc");

    let (out, _) = eval("substr('řžýá', 1, 3)");
    assert_eq!(out, "žý");

    let (out, _) = eval("substr('abc', 0, 10)");
    assert_eq!(out, "abc");

    let (out, _) = eval("substr('abcd', -3, -1)");
    assert_eq!(out, "bc");

    let (out, _) = eval("substr('abcd', 2)");
    assert_eq!(out, "cd");
}

#[test]
fn wordsubstr_widens_to_whole_words() {
    let (out, log) = eval("wordsubstr('there are more words', 11, 13)");
    assert_clean(&log);
    assert_eq!(out, "more");

    let (out, _) = eval("wordsubstr('there are more words', 9, 13)");
    assert_eq!(out, "more");

    let (out, _) = eval("wordsubstr('there are more words', 8, 13)");
    assert_eq!(out, "are more");
}

#[test]
fn reorder_substitutes_positional_placeholders() {
    let (out, log) = eval("reorder('%{2} and %{1}', 'a', 'b')");
    assert_clean(&log);
    assert_eq!(out, "b and a");
}

#[test]
fn reorder_keeps_bad_placeholders_and_warns() {
    let (out, log) = eval("reorder('%{2}', 'only-one')");
    assert_eq!(out, "%{2}");
    assert_eq!(log.len(), 1);
    assert_eq!(log.entries()[0].severity, Severity::Warning);
    assert_eq!(
        log.entries()[0].msg,
        "reorder(): invalid or missing index in format '%{2}'",
    );
}

#[test]
fn replace_all_occurrences() {
    let (out, log) = eval("replace('a-b-c', '-', '+')");
    assert_clean(&log);
    assert_eq!(out, "a+b+c");
}

#[test]
fn case_conversion() {
    let (out, log) = eval("strtolower('ABCž')");
    assert_clean(&log);
    assert_eq!(out, "abcž");

    let (out, _) = eval("strtoupper('abcř')");
    assert_eq!(out, "ABCŘ");
}

#[test]
fn nl2br_inserts_breaks() {
    let (out, log) = g(r"%{nl2br('a\nb')}", &Fragment::new());
    assert_clean(&log);
    assert_eq!(out, "a<br />\nb");
}

#[test]
fn escape_uses_the_active_escaper() {
    let mut root = Fragment::new();
    root.add_variable("v", "<x>");
    let (out, log) = g("%{escape(v)}", &root);
    assert_clean(&log);
    assert_eq!(out, "&lt;x&gt;");
}

#[test]
fn unescape_reverses_html_entities() {
    let (out, log) = g("%{unescape('&amp;&lt;x&gt;')}", &Fragment::new());
    assert_clean(&log);
    assert_eq!(out, "&<x>");
}

#[test]
fn url_escaping_roundtrip() {
    let (out, log) = eval("urlescape('a b&c')");
    assert_clean(&log);
    assert_eq!(out, "a%20b%26c");

    let (out, _) = eval("urlunescape('a%20b%26c')");
    assert_eq!(out, "a b&c");
}

#[test]
fn urlunescape_passes_multibyte_text_through() {
    // a '%' directly followed by a multi-byte character must not be
    // treated as an escape sequence
    let (out, log) = eval("urlunescape('50%€ off')");
    assert_clean(&log);
    assert_eq!(out, "50%€ off");

    let (out, _) = eval("urlunescape('%zz')");
    assert_eq!(out, "%zz");
}

#[test]
fn quoteescape_backslashes_quotes() {
    let (out, log) = eval(r#"quoteescape('a"b')"#);
    assert_clean(&log);
    assert_eq!(out, "a\\\"b");
}

#[test]
fn int_converts_strings_and_reals() {
    let (out, log) = eval("int('12')");
    assert_clean(&log);
    assert_eq!(out, "12");

    let (out, _) = eval("int(3.9)");
    assert_eq!(out, "3");

    let (out, log) = eval("int('3suffix')");
    assert_eq!(out, "undefined");
    assert_eq!(log.entries()[0].msg, "int(): can't convert string to int");

    // the two-argument form falls back instead of warning
    let (out, log) = eval("int('3suffix', 0)");
    assert_clean(&log);
    assert_eq!(out, "0");
}

#[test]
fn isnumber_is_type_based() {
    let (out, log) = eval("isnumber(3)");
    assert_clean(&log);
    assert_eq!(out, "1");

    let (out, _) = eval("isnumber(3.14)");
    assert_eq!(out, "1");

    let (out, _) = eval("isnumber('3')");
    assert_eq!(out, "0");
}

#[test]
fn round_to_a_precision() {
    let (out, log) = eval("round(3.336, 2)");
    assert_clean(&log);
    assert_eq!(out, "3.34");

    let (out, _) = eval("round(3.0, 2)");
    assert_eq!(out, "3.0");
}

#[test]
fn numformat_groups_thousands() {
    let (out, log) = eval("numformat(1234567.891, 2, ',', ' ')");
    assert_clean(&log);
    assert_eq!(out, "1 234 567,89");

    let (out, _) = eval("numformat(1234, 0)");
    assert_eq!(out, "1234");
}

#[test]
fn numformat_arity_is_checked() {
    let (out, log) = eval("numformat(1)");
    assert_eq!(out, "undefined");
    assert_eq!(
        log.entries()[0].msg,
        "numformat(): the function expects from 2 to 4 args",
    );
}

#[test]
fn sectotime_formats_hours_minutes_seconds() {
    let (out, log) = eval("sectotime(3661)");
    assert_clean(&log);
    assert_eq!(out, "1:01:01");

    let (out, _) = eval("sectotime(59)");
    assert_eq!(out, "0:00:59");
}

#[test]
fn date_formats_a_timestamp() {
    let (out, log) = eval("date('%Y-%m-%d %H:%M:%S', 1528374615)");
    assert_clean(&log);
    assert_eq!(out, "2018-06-07 12:30:15");
}

#[test]
fn timestamp_parses_back() {
    let (out, log) = eval("timestamp('2018-06-07 12:30:15')");
    assert_clean(&log);
    assert_eq!(out, "1528374615");

    let (out, log) = eval("timestamp('not a date')");
    assert_eq!(out, "undefined");
    assert_eq!(log.len(), 1);
    assert!(log.entries()[0].msg.starts_with("timestamp(): Can't parse date"));
}

#[test]
fn regex_replace_with_a_regex_literal() {
    let (out, log) = eval("regex_replace('foo bar', /o+/g, '0')");
    assert_clean(&log);
    assert_eq!(out, "f0 bar");

    let (out, _) = eval("regex_replace('aaa', /a/, 'b')");
    assert_eq!(out, "baa");

    let (out, _) = eval("regex_replace('aaa', 'a', 'b')");
    assert_eq!(out, "bbb");
}

#[test]
fn unknown_function_warns_and_yields_undefined() {
    let (out, log) = eval("nosuchfn(1)");
    assert_eq!(out, "undefined");
    assert_eq!(log.len(), 1);
    assert_eq!(log.entries()[0].msg, "Runtime: call of unknown function nosuchfn()");
}

#[test]
fn arity_violations_warn() {
    let (out, log) = eval("len()");
    assert_eq!(out, "undefined");
    assert_eq!(log.entries()[0].msg, "len(): the function expects exactly 1 arg");

    let (out, log) = eval("len('a', 'b')");
    assert_eq!(out, "undefined");
    assert_eq!(log.entries()[0].msg, "len(): the function expects exactly 1 arg");
}

#[test]
fn functions_compose_with_operators() {
    let (out, log) = eval("len('abc') + 1");
    assert_clean(&log);
    assert_eq!(out, "4");

    let (out, _) = eval("strtoupper('a') ++ strtolower('B')");
    assert_eq!(out, "Ab");
}
