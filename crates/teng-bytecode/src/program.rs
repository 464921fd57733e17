//! The compiled program: instruction arena plus literal pools.

use std::collections::HashMap;
use std::sync::Arc;

use teng_core::CompiledRegex;

use crate::instr::{Instr, RegexId, StrId};

/// Grow-only interning pool for string literals, identifiers and path
/// representations.
#[derive(Debug, Default)]
pub struct StringPool {
    items: Vec<String>,
    index: HashMap<String, StrId>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning the id of the existing entry when one
    /// matches.
    pub fn intern(&mut self, s: &str) -> StrId {
        if let Some(&id) = self.index.get(s) {
            return id;
        }
        let id = self.items.len() as StrId;
        self.items.push(s.to_owned());
        self.index.insert(s.to_owned(), id);
        id
    }

    pub fn get(&self, id: StrId) -> &str {
        &self.items[id as usize]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|s| s.as_str())
    }
}

/// A compiled template program.
///
/// Immutable after compilation; a single program may be executed against
/// many different data roots, and holds no references to any data tree.
#[derive(Debug, Default)]
pub struct Program {
    pub instrs: Vec<Instr>,
    pub strings: StringPool,
    pub regexes: Vec<Arc<CompiledRegex>>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn str(&self, id: StrId) -> &str {
        self.strings.get(id)
    }

    pub fn regex(&self, id: RegexId) -> &Arc<CompiledRegex> {
        &self.regexes[id as usize]
    }

    /// Register a compiled regex literal and return its pool id.
    pub fn add_regex(&mut self, regex: CompiledRegex) -> RegexId {
        let id = self.regexes.len() as RegexId;
        self.regexes.push(Arc::new(regex));
        id
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }
}
