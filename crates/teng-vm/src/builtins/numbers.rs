//! Numeric built-ins.

use teng_core::{Number, Value};

use super::{Warnings, expect_args, int_arg};

pub(super) fn int<'a>(args: Vec<Value<'a>>, warns: &mut Warnings) -> Value<'a> {
    if !expect_args("int", &args, 1, 2, warns) {
        return Value::Undefined;
    }
    // the optional second argument suppresses the conversion warning and
    // is returned as the fallback
    let fallback = args.get(1).cloned();
    match &args[0] {
        Value::Integral(v) => Value::Integral(*v),
        Value::Real(v) => Value::Integral(*v as i64),
        Value::String(_) | Value::StringRef(_) => {
            let s = args[0].as_str().expect("string variant");
            match s.trim().parse::<i64>() {
                Ok(v) => Value::Integral(v),
                Err(_) => match s.trim().parse::<f64>() {
                    Ok(v) => Value::Integral(v as i64),
                    Err(_) => match fallback {
                        Some(fb) => fb,
                        None => {
                            warns.push("int(): can't convert string to int".to_owned());
                            Value::Undefined
                        }
                    },
                },
            }
        }
        other => {
            warns.push(format!("int(): can't convert {} to int", other.type_name()));
            Value::Undefined
        }
    }
}

pub(super) fn isnumber<'a>(args: Vec<Value<'a>>, warns: &mut Warnings) -> Value<'a> {
    if !expect_args("isnumber", &args, 1, 1, warns) {
        return Value::Undefined;
    }
    let numeric = matches!(args[0], Value::Integral(_) | Value::Real(_));
    Value::Integral(numeric as i64)
}

pub(super) fn round<'a>(args: Vec<Value<'a>>, warns: &mut Warnings) -> Value<'a> {
    if !expect_args("round", &args, 2, 2, warns) {
        return Value::Undefined;
    }
    let Some(precision) = int_arg("round", &args[1], warns) else { return Value::Undefined };
    let value = match args[0].to_number() {
        Some(Number::Integral(v)) => return Value::Integral(v),
        Some(Number::Real(v)) => v,
        None => {
            warns.push(format!(
                "round(): the argument should be a number, not {}",
                args[0].type_name(),
            ));
            return Value::Undefined;
        }
    };
    let factor = 10f64.powi(precision.clamp(0, 15) as i32);
    Value::Real((value * factor).round() / factor)
}

pub(super) fn numformat<'a>(args: Vec<Value<'a>>, warns: &mut Warnings) -> Value<'a> {
    if !expect_args("numformat", &args, 2, 4, warns) {
        return Value::Undefined;
    }
    let value = match args[0].to_number() {
        Some(n) => n.as_real(),
        None => {
            warns.push(format!(
                "numformat(): the argument should be a number, not {}",
                args[0].type_name(),
            ));
            return Value::Undefined;
        }
    };
    let Some(precision) = int_arg("numformat", &args[1], warns) else { return Value::Undefined };
    let precision = precision.clamp(0, 15) as usize;
    let decimal_point = match args.get(2) {
        Some(v) => v.printable(),
        None => ".".to_owned(),
    };
    let thousand_sep = match args.get(3) {
        Some(v) => v.printable(),
        None => String::new(),
    };

    let formatted = format!("{value:.precision$}");
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i.to_owned(), f.to_owned()),
        None => (formatted, String::new()),
    };
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", int_part.as_str()),
    };
    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push_str(&thousand_sep);
        }
        grouped.push(ch);
    }
    let mut out = format!("{sign}{grouped}");
    if !frac_part.is_empty() {
        out.push_str(&decimal_point);
        out.push_str(&frac_part);
    }
    Value::String(out)
}

pub(super) fn random<'a>(args: Vec<Value<'a>>, warns: &mut Warnings) -> Value<'a> {
    use rand::Rng;

    if !expect_args("random", &args, 1, 1, warns) {
        return Value::Undefined;
    }
    let Some(bound) = int_arg("random", &args[0], warns) else { return Value::Undefined };
    if bound <= 0 {
        warns.push("random(): the argument should be a positive int".to_owned());
        return Value::Undefined;
    }
    Value::Integral(rand::thread_rng().gen_range(0..bound))
}
