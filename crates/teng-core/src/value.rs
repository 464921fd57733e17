//! The runtime value model.
//!
//! Values are a tagged sum, not a class hierarchy; the VM dispatches on the
//! tag in its arithmetic ops. Reference variants borrow from the data tree
//! (or the program's string pool) for the duration of one page generation.

use std::fmt;
use std::sync::Arc;

use crate::fragment::{Fragment, FragmentList};

/// A compiled regex literal: pattern, flags and the compiled machine.
#[derive(Debug)]
pub struct CompiledRegex {
    pub pattern: String,
    pub flags: String,
    pub re: regex::Regex,
}

impl CompiledRegex {
    /// Compile `pattern` with `/i`, `/m`, `/s` flag support. The `g` flag is
    /// recorded and consulted by `regex_replace`.
    pub fn new(pattern: &str, flags: &str) -> Result<Self, regex::Error> {
        let mut builder = regex::RegexBuilder::new(pattern);
        builder.case_insensitive(flags.contains('i'));
        builder.multi_line(flags.contains('m'));
        builder.dot_matches_new_line(flags.contains('s'));
        Ok(Self {
            pattern: pattern.to_owned(),
            flags: flags.to_owned(),
            re: builder.build()?,
        })
    }

    /// True when the `g` flag requests replace-all semantics.
    pub fn is_global(&self) -> bool {
        self.flags.contains('g')
    }
}

impl PartialEq for CompiledRegex {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.flags == other.flags
    }
}

impl fmt::Display for CompiledRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.pattern, self.flags)
    }
}

/// A number produced by coercion: integral or real.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integral(i64),
    Real(f64),
}

impl Number {
    pub fn as_real(self) -> f64 {
        match self {
            Number::Integral(v) => v as f64,
            Number::Real(v) => v,
        }
    }
}

/// A runtime value. `'a` borrows the data tree and the program string pool.
#[derive(Debug, Clone, Default)]
pub enum Value<'a> {
    /// The result of any lookup or operation that failed non-fatally.
    #[default]
    Undefined,
    Integral(i64),
    Real(f64),
    /// An owned string produced by an operation.
    String(String),
    /// A borrow into data-tree or string-pool storage.
    StringRef(&'a str),
    Regex(Arc<CompiledRegex>),
    FragRef(&'a Fragment),
    ListRef(&'a FragmentList),
}

impl<'a> Value<'a> {
    /// The type name reported by the `type()` query and used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Integral(_) => "integral",
            Value::Real(_) => "real",
            Value::String(_) => "string",
            Value::StringRef(_) => "string_ref",
            Value::Regex(_) => "regex",
            Value::FragRef(_) => "frag_ref",
            Value::ListRef(_) => "list_ref",
        }
    }

    /// Zero integrals and reals, empty strings, empty lists and `Undefined`
    /// are false; everything else (fragments included) is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined => false,
            Value::Integral(v) => *v != 0,
            Value::Real(v) => *v != 0.0,
            Value::String(v) => !v.is_empty(),
            Value::StringRef(v) => !v.is_empty(),
            Value::Regex(_) => true,
            Value::FragRef(_) => true,
            Value::ListRef(v) => !v.is_empty(),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Both string variants as `&str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            Value::StringRef(v) => Some(v),
            _ => None,
        }
    }

    /// Coerce to a number. Strings parse as a complete numeric literal;
    /// trailing garbage makes the coercion fail.
    pub fn to_number(&self) -> Option<Number> {
        match self {
            Value::Integral(v) => Some(Number::Integral(*v)),
            Value::Real(v) => Some(Number::Real(*v)),
            Value::String(v) => parse_number(v),
            Value::StringRef(v) => parse_number(v),
            _ => None,
        }
    }

    /// Deterministic string form used by `PRINT` and by string concatenation.
    pub fn printable(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_owned(),
            Value::Integral(v) => v.to_string(),
            Value::Real(v) => fmt_real(*v),
            Value::String(v) => v.clone(),
            Value::StringRef(v) => (*v).to_owned(),
            Value::Regex(re) => re.to_string(),
            Value::FragRef(_) => "$frag$".to_owned(),
            Value::ListRef(_) => "$list$".to_owned(),
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.printable())
    }
}

/// Format a real deterministically: whole finite values keep a trailing
/// `.0` (so `0.0` prints as `0.0`, not `0`); everything else uses the
/// shortest representation that round-trips.
pub fn fmt_real(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

/// Parse a complete numeric literal: decimal integer or float with optional
/// exponent. Returns `None` when any byte of the input is left unconsumed.
pub fn parse_number(s: &str) -> Option<Number> {
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = s.parse::<i64>() {
        return Some(Number::Integral(v));
    }
    // reject forms f64::parse accepts but the template language does not
    if s.contains(['x', 'X']) || s.trim() != s {
        return None;
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(Number::Real(v)),
        _ => None,
    }
}
