//! Date and time built-ins.
//!
//! Calendar math is done on days-since-epoch directly; timestamps are
//! always civil local-free (UTC) seconds.

use std::time::{SystemTime, UNIX_EPOCH};

use teng_core::{Number, Value};

use super::{Warnings, expect_args, int_arg, string_arg};

pub(super) fn now<'a>(args: Vec<Value<'a>>, warns: &mut Warnings) -> Value<'a> {
    if !expect_args("now", &args, 0, 0, warns) {
        return Value::Undefined;
    }
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Value::Real(since_epoch.as_secs_f64())
}

pub(super) fn timestamp<'a>(args: Vec<Value<'a>>, warns: &mut Warnings) -> Value<'a> {
    if !expect_args("timestamp", &args, 1, 1, warns) {
        return Value::Undefined;
    }
    let Some(text) = string_arg("timestamp", &args[0], warns) else { return Value::Undefined };
    match parse_date_time(&text) {
        Ok(ts) => Value::Integral(ts),
        Err(detail) => {
            warns.push(format!(
                "timestamp(): Can't parse date; {detail}; \
                 use YYYY-MM-DD[ HH:MM:SS] format",
            ));
            Value::Undefined
        }
    }
}

pub(super) fn date<'a>(args: Vec<Value<'a>>, warns: &mut Warnings) -> Value<'a> {
    if !expect_args("date", &args, 1, 2, warns) {
        return Value::Undefined;
    }
    let Some(format) = string_arg("date", &args[0], warns) else { return Value::Undefined };
    let ts = match args.get(1) {
        Some(v) => match v.to_number() {
            Some(Number::Integral(t)) => t,
            Some(Number::Real(t)) => t as i64,
            None => {
                warns.push(format!(
                    "date(): the timestamp should be a number, not {}",
                    v.type_name(),
                ));
                return Value::Undefined;
            }
        },
        None => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64,
    };
    Value::String(strftime(&format, ts))
}

pub(super) fn sectotime<'a>(args: Vec<Value<'a>>, warns: &mut Warnings) -> Value<'a> {
    if !expect_args("sectotime", &args, 1, 1, warns) {
        return Value::Undefined;
    }
    let Some(total) = int_arg("sectotime", &args[0], warns) else { return Value::Undefined };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    Value::String(format!("{hours}:{minutes:02}:{seconds:02}"))
}

// ---- civil calendar math ----

/// Days from 1970-01-01 to the given civil date (Gregorian, proleptic).
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468
}

/// The inverse of `days_from_civil`.
fn civil_from_days(z: i64) -> (i64, i64, i64) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = (mp + 2) % 12 + 1;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

fn parse_date_time(text: &str) -> Result<i64, &'static str> {
    let text = text.trim();
    let (date_part, time_part) = match text.split_once([' ', 'T']) {
        Some((d, t)) => (d, Some(t)),
        None => (text, None),
    };
    let mut fields = date_part.split('-');
    let year: i64 = fields
        .next()
        .and_then(|f| f.parse().ok())
        .ok_or("parseDateTime(): invalid format of year")?;
    let month: i64 = fields
        .next()
        .and_then(|f| f.parse().ok())
        .filter(|m| (1..=12).contains(m))
        .ok_or("parseDateTime(): invalid format of month")?;
    let day: i64 = fields
        .next()
        .and_then(|f| f.parse().ok())
        .filter(|d| (1..=31).contains(d))
        .ok_or("parseDateTime(): invalid format of day")?;

    let mut seconds = 0i64;
    if let Some(time) = time_part {
        let mut fields = time.split(':');
        let hour: i64 = fields
            .next()
            .and_then(|f| f.parse().ok())
            .filter(|h| (0..24).contains(h))
            .ok_or("parseDateTime(): invalid format of hour")?;
        let minute: i64 = fields
            .next()
            .and_then(|f| f.parse().ok())
            .filter(|m| (0..60).contains(m))
            .ok_or("parseDateTime(): expected ':' as hour/minute separator")?;
        let second: i64 = fields
            .next()
            .and_then(|f| f.parse().ok())
            .filter(|s| (0..60).contains(s))
            .ok_or("parseDateTime(): expected ':' as minute/second separator")?;
        seconds = hour * 3600 + minute * 60 + second;
    }
    Ok(days_from_civil(year, month, day) * 86400 + seconds)
}

/// A strftime subset: `%Y %m %d %H %M %S %u %%`.
fn strftime(format: &str, ts: i64) -> String {
    let days = ts.div_euclid(86400);
    let secs = ts.rem_euclid(86400);
    let (year, month, day) = civil_from_days(days);
    let (hour, minute, second) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    // 1970-01-01 was a Thursday; ISO weekdays are 1..=7 from Monday
    let weekday = (days + 3).rem_euclid(7) + 1;

    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('Y') => out.push_str(&year.to_string()),
            Some('m') => out.push_str(&format!("{month:02}")),
            Some('d') => out.push_str(&format!("{day:02}")),
            Some('H') => out.push_str(&format!("{hour:02}")),
            Some('M') => out.push_str(&format!("{minute:02}")),
            Some('S') => out.push_str(&format!("{second:02}")),
            Some('u') => out.push_str(&weekday.to_string()),
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}
