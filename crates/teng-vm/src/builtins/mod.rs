//! The built-in function registry.
//!
//! Entries are fixed at process start: name, arity bounds, argument
//! coercion and result type. A bad call never unwinds; it pushes a warning
//! and yields `Undefined`.

mod dates;
mod numbers;
mod strings;

use teng_core::Value;

use crate::escape::ContentType;

/// Diagnostics produced while evaluating one call; the VM logs them as
/// warnings at the call site.
pub(crate) type Warnings = Vec<String>;

/// Invoke a built-in by name. Unknown names warn and yield `Undefined`.
pub(crate) fn call<'a>(
    name: &str,
    args: Vec<Value<'a>>,
    escaper: &'static ContentType,
    warns: &mut Warnings,
) -> Value<'a> {
    match name {
        "len" => strings::len(args, warns),
        "substr" => strings::substr(args, warns),
        "wordsubstr" => strings::wordsubstr(args, warns),
        "reorder" => strings::reorder(args, warns),
        "replace" => strings::replace(args, warns),
        "strtolower" => strings::strtolower(args, warns),
        "strtoupper" => strings::strtoupper(args, warns),
        "nl2br" => strings::nl2br(args, warns),
        "escape" => strings::escape(args, escaper, warns),
        "unescape" => strings::unescape(args, warns),
        "quoteescape" => strings::quoteescape(args, warns),
        "urlescape" => strings::urlescape(args, warns),
        "urlunescape" => strings::urlunescape(args, warns),
        "regex_replace" => strings::regex_replace(args, warns),
        "int" => numbers::int(args, warns),
        "isnumber" => numbers::isnumber(args, warns),
        "round" => numbers::round(args, warns),
        "numformat" => numbers::numformat(args, warns),
        "random" => numbers::random(args, warns),
        "now" => dates::now(args, warns),
        "timestamp" => dates::timestamp(args, warns),
        "date" => dates::date(args, warns),
        "sectotime" => dates::sectotime(args, warns),
        _ => {
            warns.push(format!("Runtime: call of unknown function {name}()"));
            Value::Undefined
        }
    }
}

/// Check the argument count, warning in the original's wording.
pub(crate) fn expect_args(name: &str, args: &[Value<'_>], min: usize, max: usize, warns: &mut Warnings) -> bool {
    if (min..=max).contains(&args.len()) {
        return true;
    }
    if min == max {
        let plural = if min == 1 { "arg" } else { "args" };
        warns.push(format!("{name}(): the function expects exactly {min} {plural}"));
    } else {
        warns.push(format!("{name}(): the function expects from {min} to {max} args"));
    }
    false
}

/// Coerce one argument to a string, warning when it is not one.
pub(crate) fn string_arg(name: &str, value: &Value<'_>, warns: &mut Warnings) -> Option<String> {
    match value {
        Value::String(_) | Value::StringRef(_) | Value::Integral(_) | Value::Real(_) => {
            Some(value.printable())
        }
        _ => {
            warns.push(format!(
                "{name}(): the argument should be a string, not {}",
                value.type_name(),
            ));
            None
        }
    }
}

/// Coerce one argument to an integer, warning when it cannot be.
pub(crate) fn int_arg(name: &str, value: &Value<'_>, warns: &mut Warnings) -> Option<i64> {
    match value.to_number() {
        Some(teng_core::Number::Integral(v)) => Some(v),
        _ => {
            warns.push(format!(
                "{name}(): the argument should be an int, not {}",
                value.type_name(),
            ));
            None
        }
    }
}
