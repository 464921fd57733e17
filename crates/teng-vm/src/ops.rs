//! Arithmetic, comparison and string operators.
//!
//! Every operator is total: a type mismatch never unwinds, it produces a
//! diagnostic and `Undefined`, which then poisons downstream consumers.

use teng_core::{Number, Value};

/// A recoverable operator failure; the VM logs it and pushes `Undefined`.
pub(crate) enum OpFail {
    Warn(String),
    Error(String),
}

type OpResult<'a> = Result<Value<'a>, OpFail>;

fn left_fail(view: &str, class: &str, value: &Value<'_>) -> OpFail {
    OpFail::Warn(format!(
        "Runtime: Left operand of {view} {class} operator is {}",
        value.type_name(),
    ))
}

fn right_fail(view: &str, class: &str, value: &Value<'_>) -> OpFail {
    OpFail::Warn(format!(
        "Runtime: Right operand of {view} {class} operator is {}",
        value.type_name(),
    ))
}

fn numeric_pair<'a>(
    lhs: &Value<'a>,
    rhs: &Value<'a>,
    view: &str,
    class: &str,
) -> Result<(Number, Number), OpFail> {
    let ln = lhs.to_number().ok_or_else(|| left_fail(view, class, lhs))?;
    let rn = rhs.to_number().ok_or_else(|| right_fail(view, class, rhs))?;
    Ok((ln, rn))
}

fn integral_pair<'a>(
    lhs: &Value<'a>,
    rhs: &Value<'a>,
    view: &str,
    class: &str,
) -> Result<(i64, i64), OpFail> {
    let (ln, rn) = numeric_pair(lhs, rhs, view, class)?;
    let li = match ln {
        Number::Integral(v) => v,
        Number::Real(_) => return Err(left_fail(view, class, lhs)),
    };
    let ri = match rn {
        Number::Integral(v) => v,
        Number::Real(_) => return Err(right_fail(view, class, rhs)),
    };
    Ok((li, ri))
}

pub(crate) fn add<'a>(lhs: Value<'a>, rhs: Value<'a>) -> OpResult<'a> {
    arith(lhs, rhs, "+", i64::wrapping_add, |a, b| a + b)
}

pub(crate) fn sub<'a>(lhs: Value<'a>, rhs: Value<'a>) -> OpResult<'a> {
    arith(lhs, rhs, "-", i64::wrapping_sub, |a, b| a - b)
}

pub(crate) fn mul<'a>(lhs: Value<'a>, rhs: Value<'a>) -> OpResult<'a> {
    arith(lhs, rhs, "*", i64::wrapping_mul, |a, b| a * b)
}

fn arith<'a>(
    lhs: Value<'a>,
    rhs: Value<'a>,
    view: &str,
    int_op: fn(i64, i64) -> i64,
    real_op: fn(f64, f64) -> f64,
) -> OpResult<'a> {
    let (ln, rn) = numeric_pair(&lhs, &rhs, view, "numeric")?;
    Ok(match (ln, rn) {
        (Number::Integral(a), Number::Integral(b)) => Value::Integral(int_op(a, b)),
        (a, b) => Value::Real(real_op(a.as_real(), b.as_real())),
    })
}

pub(crate) fn div<'a>(lhs: Value<'a>, rhs: Value<'a>) -> OpResult<'a> {
    let (ln, rn) = numeric_pair(&lhs, &rhs, "/", "division")?;
    match (ln, rn) {
        (Number::Integral(a), Number::Integral(b)) => {
            if b == 0 {
                return Err(OpFail::Error(
                    "Runtime: right operand of / division operator is zero".to_owned(),
                ));
            }
            Ok(Value::Integral(a.wrapping_div(b)))
        }
        (a, b) => {
            if b.as_real() == 0.0 {
                return Err(OpFail::Error(
                    "Runtime: right operand of / division operator is zero".to_owned(),
                ));
            }
            Ok(Value::Real(a.as_real() / b.as_real()))
        }
    }
}

pub(crate) fn rem<'a>(lhs: Value<'a>, rhs: Value<'a>) -> OpResult<'a> {
    let (li, ri) = integral_pair(&lhs, &rhs, "%", "division")?;
    if ri == 0 {
        return Err(OpFail::Error(
            "Runtime: right operand of % division operator is zero".to_owned(),
        ));
    }
    Ok(Value::Integral(li.wrapping_rem(ri)))
}

pub(crate) fn concat<'a>(lhs: Value<'a>, rhs: Value<'a>) -> OpResult<'a> {
    for (value, fail) in [
        (&lhs, left_fail as fn(&str, &str, &Value<'_>) -> OpFail),
        (&rhs, right_fail),
    ] {
        if matches!(
            value,
            Value::Undefined | Value::FragRef(_) | Value::ListRef(_)
        ) {
            return Err(fail("++", "string", value));
        }
    }
    let mut out = lhs.printable();
    out.push_str(&rhs.printable());
    Ok(Value::String(out))
}

pub(crate) fn repeat<'a>(lhs: Value<'a>, rhs: Value<'a>) -> OpResult<'a> {
    if matches!(lhs, Value::Undefined | Value::FragRef(_) | Value::ListRef(_)) {
        return Err(left_fail("**", "repeat", &lhs));
    }
    let count = match rhs.to_number() {
        Some(Number::Integral(v)) => v,
        _ => return Err(right_fail("**", "repeat", &rhs)),
    };
    if count < 0 {
        return Err(OpFail::Error(
            "Runtime: right operand of ** repeat operator is negative".to_owned(),
        ));
    }
    Ok(Value::String(lhs.printable().repeat(count as usize)))
}

pub(crate) fn bit<'a>(lhs: Value<'a>, rhs: Value<'a>, view: &str) -> OpResult<'a> {
    let (li, ri) = integral_pair(&lhs, &rhs, view, "bit")?;
    Ok(Value::Integral(match view {
        "&" => li & ri,
        "|" => li | ri,
        "^" => li ^ ri,
        _ => unreachable!("not a bit operator: {view}"),
    }))
}

pub(crate) fn compare<'a>(lhs: Value<'a>, rhs: Value<'a>, view: &str) -> OpResult<'a> {
    use std::cmp::Ordering;

    let ordering = if let (Some(l), Some(r)) = (lhs.as_str(), rhs.as_str()) {
        l.cmp(r)
    } else {
        let (ln, rn) = numeric_pair(&lhs, &rhs, view, "comparison")?;
        match (ln, rn) {
            (Number::Integral(a), Number::Integral(b)) => a.cmp(&b),
            (a, b) => a
                .as_real()
                .partial_cmp(&b.as_real())
                .ok_or_else(|| right_fail(view, "comparison", &rhs))?,
        }
    };
    let truth = match view {
        "==" => ordering == Ordering::Equal,
        "!=" => ordering != Ordering::Equal,
        "<" => ordering == Ordering::Less,
        "<=" => ordering != Ordering::Greater,
        ">" => ordering == Ordering::Greater,
        ">=" => ordering != Ordering::Less,
        _ => unreachable!("not a comparison operator: {view}"),
    };
    Ok(Value::Integral(truth as i64))
}

pub(crate) fn match_regex<'a>(lhs: Value<'a>, rhs: Value<'a>, negated: bool) -> OpResult<'a> {
    let view = if negated { "!~" } else { "=~" };
    let Value::Regex(re) = &rhs else {
        return Err(right_fail(view, "regex", &rhs));
    };
    if matches!(lhs, Value::Undefined | Value::FragRef(_) | Value::ListRef(_)) {
        return Err(left_fail(view, "regex", &lhs));
    }
    let matched = re.re.is_match(&lhs.printable());
    Ok(Value::Integral((matched != negated) as i64))
}

pub(crate) fn neg(value: Value<'_>) -> OpResult<'_> {
    match value.to_number() {
        Some(Number::Integral(v)) => Ok(Value::Integral(v.wrapping_neg())),
        Some(Number::Real(v)) => Ok(Value::Real(-v)),
        None => Err(OpFail::Warn(format!(
            "Runtime: Operand of - numeric operator is {}",
            value.type_name(),
        ))),
    }
}

pub(crate) fn pos(value: Value<'_>) -> OpResult<'_> {
    match value.to_number() {
        Some(Number::Integral(v)) => Ok(Value::Integral(v)),
        Some(Number::Real(v)) => Ok(Value::Real(v)),
        None => Err(OpFail::Warn(format!(
            "Runtime: Operand of + numeric operator is {}",
            value.type_name(),
        ))),
    }
}

pub(crate) fn not(value: Value<'_>) -> Value<'static> {
    Value::Integral(!value.is_truthy() as i64)
}

pub(crate) fn bit_not(value: Value<'_>) -> OpResult<'_> {
    match value.to_number() {
        Some(Number::Integral(v)) => Ok(Value::Integral(!v)),
        _ => Err(OpFail::Warn(format!(
            "Runtime: Operand of ~ bit operator is {}",
            value.type_name(),
        ))),
    }
}
