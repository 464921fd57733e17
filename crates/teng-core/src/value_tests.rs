use super::*;
use crate::value::{fmt_real, parse_number};

#[test]
fn truthiness() {
    assert!(!Value::Undefined.is_truthy());
    assert!(!Value::Integral(0).is_truthy());
    assert!(!Value::Real(0.0).is_truthy());
    assert!(!Value::String(String::new()).is_truthy());
    assert!(!Value::StringRef("").is_truthy());
    assert!(Value::Integral(-1).is_truthy());
    assert!(Value::Real(0.5).is_truthy());
    assert!(Value::StringRef("x").is_truthy());

    let frag = Fragment::new();
    assert!(Value::FragRef(&frag).is_truthy());
    let list = FragmentList::new();
    assert!(!Value::ListRef(&list).is_truthy());
}

#[test]
fn type_names() {
    assert_eq!(Value::Undefined.type_name(), "undefined");
    assert_eq!(Value::Integral(3).type_name(), "integral");
    assert_eq!(Value::Real(3.14).type_name(), "real");
    assert_eq!(Value::StringRef("three").type_name(), "string_ref");
    let frag = Fragment::new();
    assert_eq!(Value::FragRef(&frag).type_name(), "frag_ref");
    let list = FragmentList::new();
    assert_eq!(Value::ListRef(&list).type_name(), "list_ref");
}

#[test]
fn integral_printing_has_no_leading_zeros() {
    assert_eq!(Value::Integral(42).printable(), "42");
    assert_eq!(Value::Integral(-7).printable(), "-7");
    assert_eq!(Value::Integral(0).printable(), "0");
}

#[test]
fn real_printing_keeps_trailing_zero_for_whole_values() {
    assert_eq!(fmt_real(0.0), "0.0");
    assert_eq!(fmt_real(3.0), "3.0");
    assert_eq!(fmt_real(-2.0), "-2.0");
    assert_eq!(fmt_real(3.14), "3.14");
    assert_eq!(fmt_real(0.5), "0.5");
}

#[test]
fn undefined_prints_as_word() {
    assert_eq!(Value::Undefined.printable(), "undefined");
}

#[test]
fn fragment_values_print_as_markers() {
    let frag = Fragment::new();
    assert_eq!(Value::FragRef(&frag).printable(), "$frag$");
    let list = FragmentList::new();
    assert_eq!(Value::ListRef(&list).printable(), "$list$");
}

#[test]
fn number_parsing_is_strict() {
    assert_eq!(parse_number("12"), Some(Number::Integral(12)));
    assert_eq!(parse_number("-3"), Some(Number::Integral(-3)));
    assert_eq!(parse_number("3.5"), Some(Number::Real(3.5)));
    assert_eq!(parse_number("12abc"), None);
    assert_eq!(parse_number(" 12"), None);
    assert_eq!(parse_number(""), None);
    assert_eq!(parse_number("abc"), None);
}

#[test]
fn string_coercion_goes_through_parse() {
    assert_eq!(Value::StringRef("7").to_number(), Some(Number::Integral(7)));
    assert_eq!(Value::StringRef("x7").to_number(), None);
    assert_eq!(Value::Integral(7).to_number(), Some(Number::Integral(7)));
    assert!(Value::Undefined.to_number().is_none());
}

#[test]
fn regex_flags() {
    let re = CompiledRegex::new("ab+", "ig").unwrap();
    assert!(re.is_global());
    assert!(re.re.is_match("AB"));
    assert_eq!(re.to_string(), "/ab+/ig");
}
