//! String built-ins.

use teng_core::Value;

use super::{Warnings, expect_args, int_arg, string_arg};
use crate::escape::ContentType;

pub(super) fn len<'a>(args: Vec<Value<'a>>, warns: &mut Warnings) -> Value<'a> {
    if !expect_args("len", &args, 1, 1, warns) {
        return Value::Undefined;
    }
    match string_arg("len", &args[0], warns) {
        Some(s) => Value::Integral(s.chars().count() as i64),
        None => Value::Undefined,
    }
}

/// Character index with one round of negative wrapping, clamped to the
/// string bounds.
fn wrap_index(i: i64, len: usize) -> usize {
    let len = len as i64;
    let j = if i < 0 { i + len } else { i };
    j.clamp(0, len) as usize
}

pub(super) fn substr<'a>(args: Vec<Value<'a>>, warns: &mut Warnings) -> Value<'a> {
    if !expect_args("substr", &args, 2, 3, warns) {
        return Value::Undefined;
    }
    let Some(s) = string_arg("substr", &args[0], warns) else { return Value::Undefined };
    let Some(from) = int_arg("substr", &args[1], warns) else { return Value::Undefined };
    let chars: Vec<char> = s.chars().collect();
    let to = match args.get(2) {
        Some(v) => match int_arg("substr", v, warns) {
            Some(t) => t,
            None => return Value::Undefined,
        },
        None => chars.len() as i64,
    };
    let from = wrap_index(from, chars.len());
    let to = wrap_index(to, chars.len());
    if from >= to {
        return Value::String(String::new());
    }
    Value::String(chars[from..to].iter().collect())
}

pub(super) fn wordsubstr<'a>(args: Vec<Value<'a>>, warns: &mut Warnings) -> Value<'a> {
    if !expect_args("wordsubstr", &args, 2, 3, warns) {
        return Value::Undefined;
    }
    let Some(s) = string_arg("wordsubstr", &args[0], warns) else { return Value::Undefined };
    let Some(from) = int_arg("wordsubstr", &args[1], warns) else { return Value::Undefined };
    let chars: Vec<char> = s.chars().collect();
    let to = match args.get(2) {
        Some(v) => match int_arg("wordsubstr", v, warns) {
            Some(t) => t,
            None => return Value::Undefined,
        },
        None => chars.len() as i64,
    };
    let mut from = wrap_index(from, chars.len());
    let mut to = wrap_index(to, chars.len());
    if from >= to {
        return Value::String(String::new());
    }
    // widen both edges to whole words
    while from > 0 && !chars[from - 1].is_whitespace() && !chars[from].is_whitespace() {
        from -= 1;
    }
    while to < chars.len() && !chars[to].is_whitespace() {
        to += 1;
    }
    let result: String = chars[from..to].iter().collect();
    Value::String(result.trim().to_owned())
}

pub(super) fn reorder<'a>(args: Vec<Value<'a>>, warns: &mut Warnings) -> Value<'a> {
    if args.is_empty() {
        warns.push("reorder(): the function expects at least 1 arg".to_owned());
        return Value::Undefined;
    }
    let Some(format) = string_arg("reorder", &args[0], warns) else { return Value::Undefined };
    let mut out = String::with_capacity(format.len());
    let mut rest = format.as_str();
    while let Some(at) = rest.find("%{") {
        out.push_str(&rest[..at]);
        let tail = &rest[at..];
        match tail[2..].find('}') {
            Some(close) => {
                let body = &tail[2..2 + close];
                let placeholder = &tail[..close + 3];
                match body.parse::<usize>() {
                    Ok(n) if n >= 1 && n < args.len() => {
                        out.push_str(&args[n].printable());
                    }
                    _ => {
                        // a bad placeholder stays in the output verbatim
                        warns.push(format!(
                            "reorder(): invalid or missing index in format '{placeholder}'",
                        ));
                        out.push_str(placeholder);
                    }
                }
                rest = &tail[close + 3..];
            }
            None => {
                out.push_str(tail);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    Value::String(out)
}

pub(super) fn replace<'a>(args: Vec<Value<'a>>, warns: &mut Warnings) -> Value<'a> {
    if !expect_args("replace", &args, 3, 3, warns) {
        return Value::Undefined;
    }
    let (Some(s), Some(from), Some(to)) = (
        string_arg("replace", &args[0], warns),
        string_arg("replace", &args[1], warns),
        string_arg("replace", &args[2], warns),
    ) else {
        return Value::Undefined;
    };
    Value::String(s.replace(&from, &to))
}

pub(super) fn strtolower<'a>(args: Vec<Value<'a>>, warns: &mut Warnings) -> Value<'a> {
    if !expect_args("strtolower", &args, 1, 1, warns) {
        return Value::Undefined;
    }
    match string_arg("strtolower", &args[0], warns) {
        Some(s) => Value::String(s.to_lowercase()),
        None => Value::Undefined,
    }
}

pub(super) fn strtoupper<'a>(args: Vec<Value<'a>>, warns: &mut Warnings) -> Value<'a> {
    if !expect_args("strtoupper", &args, 1, 1, warns) {
        return Value::Undefined;
    }
    match string_arg("strtoupper", &args[0], warns) {
        Some(s) => Value::String(s.to_uppercase()),
        None => Value::Undefined,
    }
}

pub(super) fn nl2br<'a>(args: Vec<Value<'a>>, warns: &mut Warnings) -> Value<'a> {
    if !expect_args("nl2br", &args, 1, 1, warns) {
        return Value::Undefined;
    }
    match string_arg("nl2br", &args[0], warns) {
        Some(s) => Value::String(s.replace('\n', "<br />\n")),
        None => Value::Undefined,
    }
}

pub(super) fn escape<'a>(
    args: Vec<Value<'a>>,
    escaper: &'static ContentType,
    warns: &mut Warnings,
) -> Value<'a> {
    if !expect_args("escape", &args, 1, 1, warns) {
        return Value::Undefined;
    }
    match string_arg("escape", &args[0], warns) {
        Some(s) => Value::String((escaper.escape)(&s).into_owned()),
        None => Value::Undefined,
    }
}

/// Reverse of the HTML escaper: the four named entities back to characters.
pub(super) fn unescape<'a>(args: Vec<Value<'a>>, warns: &mut Warnings) -> Value<'a> {
    if !expect_args("unescape", &args, 1, 1, warns) {
        return Value::Undefined;
    }
    let Some(s) = string_arg("unescape", &args[0], warns) else { return Value::Undefined };
    Value::String(
        s.replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\""),
    )
}

pub(super) fn quoteescape<'a>(args: Vec<Value<'a>>, warns: &mut Warnings) -> Value<'a> {
    if !expect_args("quoteescape", &args, 1, 1, warns) {
        return Value::Undefined;
    }
    let Some(s) = string_arg("quoteescape", &args[0], warns) else { return Value::Undefined };
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
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
    Value::String(out)
}

const URL_UNRESERVED: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_.~";

pub(super) fn urlescape<'a>(args: Vec<Value<'a>>, warns: &mut Warnings) -> Value<'a> {
    if !expect_args("urlescape", &args, 1, 1, warns) {
        return Value::Undefined;
    }
    let Some(s) = string_arg("urlescape", &args[0], warns) else { return Value::Undefined };
    let mut out = String::with_capacity(s.len());
    for byte in s.as_bytes() {
        if URL_UNRESERVED.contains(byte) {
            out.push(*byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    Value::String(out)
}

pub(super) fn urlunescape<'a>(args: Vec<Value<'a>>, warns: &mut Warnings) -> Value<'a> {
    if !expect_args("urlunescape", &args, 1, 1, warns) {
        return Value::Undefined;
    }
    let Some(s) = string_arg("urlunescape", &args[0], warns) else { return Value::Undefined };
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        // decode on raw bytes: the two bytes after '%' need not sit on a
        // character boundary of the input
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    Value::String(String::from_utf8_lossy(&out).into_owned())
}

fn hex_digit(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|v| v as u8)
}

pub(super) fn regex_replace<'a>(args: Vec<Value<'a>>, warns: &mut Warnings) -> Value<'a> {
    if !expect_args("regex_replace", &args, 3, 3, warns) {
        return Value::Undefined;
    }
    let Some(s) = string_arg("regex_replace", &args[0], warns) else { return Value::Undefined };
    let Some(replacement) = string_arg("regex_replace", &args[2], warns) else {
        return Value::Undefined;
    };
    match &args[1] {
        Value::Regex(re) => {
            let replaced = if re.is_global() {
                re.re.replace_all(&s, replacement.as_str())
            } else {
                re.re.replace(&s, replacement.as_str())
            };
            Value::String(replaced.into_owned())
        }
        other => match string_arg("regex_replace", other, warns) {
            Some(pattern) => match regex::Regex::new(&pattern) {
                Ok(re) => Value::String(re.replace_all(&s, replacement.as_str()).into_owned()),
                Err(_) => {
                    warns.push(format!("regex_replace(): invalid regex '{pattern}'"));
                    Value::Undefined
                }
            },
            None => Value::Undefined,
        },
    }
}
