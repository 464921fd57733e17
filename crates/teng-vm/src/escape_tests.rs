use crate::escape::lookup_content_type;

#[test]
fn html_escapes_the_four_dangerous_characters() {
    let ct = lookup_content_type("text/html").unwrap();
    assert_eq!((ct.escape)("&<>\""), "&amp;&lt;&gt;&quot;");
    assert_eq!((ct.escape)("plain"), "plain");
    assert_eq!((ct.escape)("a'b"), "a'b");
}

#[test]
fn shell_passes_markup_through() {
    let ct = lookup_content_type("application/x-sh").unwrap();
    assert_eq!((ct.escape)("&<>\""), "&<>\"");
    assert_eq!(ct.line_comment, "#");
}

#[test]
fn quoted_string_backslash_escapes() {
    let ct = lookup_content_type("quoted-string").unwrap();
    assert_eq!((ct.escape)("a\"b\nc"), "a\\\"b\\nc");
    assert_eq!((ct.escape)("a\\b"), "a\\\\b");
}

#[test]
fn lookup_is_case_insensitive() {
    assert!(lookup_content_type("TEXT/HTML").is_some());
    assert!(lookup_content_type("unknown/unknown").is_none());
}

#[test]
fn none_is_the_identity() {
    let ct = lookup_content_type("none").unwrap();
    assert_eq!((ct.escape)("&<>\"'\n"), "&<>\"'\n");
}
