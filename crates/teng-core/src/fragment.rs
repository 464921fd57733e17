//! The fragment data tree and its builder API.
//!
//! The tree is built by the caller before template execution and treated as
//! immutable for the duration of one page generation. It is a tree by
//! construction: the builder hands out `&mut` references into the parent, so
//! cycles cannot arise.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// A scalar accepted by [`Fragment::add_variable`].
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Integral(i64),
    Real(f64),
    String(String),
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Integral(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Integral(v as i64)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Real(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::String(v.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::String(v)
    }
}

/// One value stored under a fragment key.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentValue {
    Integral(i64),
    Real(f64),
    String(String),
    Frag(Box<Fragment>),
    List(FragmentList),
}

/// An ordered mapping from identifier to child value.
///
/// Identifiers are ASCII `[A-Za-z_][A-Za-z0-9_]*` by template grammar, but
/// the builder accepts arbitrary Unicode keys; such keys are only reachable
/// through runtime variables. Insertion order is observable via `jsonify`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    items: IndexMap<String, FragmentValue>,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scalar variable, replacing any previous value under the key.
    pub fn add_variable(&mut self, name: impl Into<String>, value: impl Into<Scalar>) {
        let value = match value.into() {
            Scalar::Integral(v) => FragmentValue::Integral(v),
            Scalar::Real(v) => FragmentValue::Real(v),
            Scalar::String(v) => FragmentValue::String(v),
        };
        self.items.insert(name.into(), value);
    }

    /// Add a child fragment. A first call creates a plain fragment; further
    /// calls under the same key promote it to a list and append.
    pub fn add_fragment(&mut self, name: impl Into<String>) -> &mut Fragment {
        let name = name.into();
        match self.items.get(&name) {
            Some(FragmentValue::Frag(_)) => {
                // promote frag -> list of two
                let old = self.items.swap_remove(&name);
                let Some(FragmentValue::Frag(first)) = old else { unreachable!() };
                let mut list = FragmentList::new();
                list.items.push(*first);
                list.items.push(Fragment::new());
                self.items.insert(name.clone(), FragmentValue::List(list));
            }
            Some(FragmentValue::List(_)) => {
                let Some(FragmentValue::List(list)) = self.items.get_mut(&name) else {
                    unreachable!()
                };
                list.items.push(Fragment::new());
            }
            _ => {
                self.items
                    .insert(name.clone(), FragmentValue::Frag(Box::new(Fragment::new())));
            }
        }
        match self.items.get_mut(&name) {
            Some(FragmentValue::Frag(frag)) => frag,
            Some(FragmentValue::List(list)) => list.items.last_mut().expect("just appended"),
            _ => unreachable!(),
        }
    }

    /// Add an empty fragment list, replacing any previous value under the key.
    pub fn add_fragment_list(&mut self, name: impl Into<String>) -> &mut FragmentList {
        let name = name.into();
        self.items.insert(name.clone(), FragmentValue::List(FragmentList::new()));
        let Some(FragmentValue::List(list)) = self.items.get_mut(&name) else { unreachable!() };
        list
    }

    pub fn get(&self, name: &str) -> Option<&FragmentValue> {
        self.items.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FragmentValue)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Serialize to JSON, preserving insertion order.
    pub fn json(&self) -> String {
        serde_json::to_string(self).expect("fragment serialization cannot fail")
    }

    /// Debug listing of the tree, one `key: value` pair per line with
    /// nested fragments indented. Insertion order is preserved.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    fn dump_into(&self, out: &mut String, depth: usize) {
        for (key, value) in &self.items {
            out.push_str(&"    ".repeat(depth));
            out.push_str(key);
            match value {
                FragmentValue::Integral(v) => out.push_str(&format!(": {v}\n")),
                FragmentValue::Real(v) => out.push_str(&format!(": {v}\n")),
                FragmentValue::String(v) => out.push_str(&format!(": {v:?}\n")),
                FragmentValue::Frag(f) => {
                    out.push_str(":\n");
                    f.dump_into(out, depth + 1);
                }
                FragmentValue::List(l) => {
                    out.push_str(&format!("[{}]:\n", l.len()));
                    for item in l.iter() {
                        item.dump_into(out, depth + 1);
                    }
                }
            }
        }
    }
}

/// An ordered sequence of sibling fragments, length >= 0.
///
/// A plain fragment and a one-element list are equivalent targets for most
/// path operations; they differ only for the `type` and `count` queries and
/// for indexed access.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FragmentList {
    items: Vec<Fragment>,
}

impl FragmentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new empty fragment and return it.
    pub fn add_fragment(&mut self) -> &mut Fragment {
        self.items.push(Fragment::new());
        self.items.last_mut().expect("just pushed")
    }

    pub fn get(&self, index: usize) -> Option<&Fragment> {
        self.items.get(index)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fragment> {
        self.items.iter()
    }

    pub fn json(&self) -> String {
        serde_json::to_string(self).expect("fragment list serialization cannot fail")
    }
}

impl Serialize for Fragment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.items.len()))?;
        for (key, value) in &self.items {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Serialize for FragmentList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.items.len()))?;
        for item in &self.items {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

impl Serialize for FragmentValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FragmentValue::Integral(v) => serializer.serialize_i64(*v),
            FragmentValue::Real(v) => serializer.serialize_f64(*v),
            FragmentValue::String(v) => serializer.serialize_str(v),
            FragmentValue::Frag(v) => v.serialize(serializer),
            FragmentValue::List(v) => v.serialize(serializer),
        }
    }
}
