//! The narrow dictionary interface the compiler and the VM consume.

/// Read-only key → localized string lookup.
///
/// The persistent loader (file format, language selection) lives outside
/// the core pipeline; compiler and VM only ever ask for one entry.
pub trait Dictionary {
    fn entry(&self, key: &str) -> Option<&str>;
}

/// A dictionary with no entries, for pages generated without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyDictionary;

impl Dictionary for EmptyDictionary {
    fn entry(&self, _key: &str) -> Option<&str> {
        None
    }
}
