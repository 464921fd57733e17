//! The content-type registry: ctype name → escaper + line comment marker.
//!
//! The table is fixed at process start and read-only thereafter. `PRINT`
//! consults the top of the VM's ctype stack; `PRINT_RAW` bypasses it.

use std::borrow::Cow;

/// One registered content type.
pub struct ContentType {
    pub name: &'static str,
    pub escape: fn(&str) -> Cow<'_, str>,
    /// Marker starting a line comment in this content type.
    pub line_comment: &'static str,
}

static TABLE: &[ContentType] = &[
    ContentType { name: "text/html", escape: escape_html, line_comment: "<!--" },
    ContentType { name: "text/xhtml", escape: escape_html, line_comment: "<!--" },
    ContentType { name: "text/xml", escape: escape_html, line_comment: "<!--" },
    ContentType { name: "application/x-sh", escape: escape_none, line_comment: "#" },
    ContentType { name: "quoted-string", escape: escape_quoted, line_comment: "" },
    ContentType { name: "none", escape: escape_none, line_comment: "" },
];

/// Look a content type up by name, case-insensitively.
pub fn lookup_content_type(name: &str) -> Option<&'static ContentType> {
    TABLE.iter().find(|ct| ct.name.eq_ignore_ascii_case(name))
}

fn escape_none(text: &str) -> Cow<'_, str> {
    Cow::Borrowed(text)
}

fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

/// Backslash-escape the characters that break a quoted string.
fn escape_quoted(text: &str) -> Cow<'_, str> {
    if !text.contains(['\\', '"', '\'', '\n', '\r', '\t']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}
