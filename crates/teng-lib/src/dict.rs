//! The persistent dictionary loader.
//!
//! Dictionaries are line-oriented text files: `key value…` per line, `#`
//! comments, continuation lines starting with whitespace appended to the
//! previous entry. A language selects `<stem>.<lang>.<ext>` next to the
//! base file when present.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DictError {
    #[error("cannot read dictionary file: {0}")]
    Io(#[from] std::io::Error),
}

/// An in-memory dictionary, read-only after load.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    entries: HashMap<String, String>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a dictionary, preferring the language-specific variant of the
    /// file when `lang` is given and the variant exists.
    pub fn load(path: &Path, lang: Option<&str>) -> Result<Self, DictError> {
        let path = match lang {
            Some(lang) if !lang.is_empty() => {
                let localized = localized_path(path, lang);
                if localized.exists() { localized } else { path.to_owned() }
            }
            _ => path.to_owned(),
        };
        let text = std::fs::read_to_string(&path)?;
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> Self {
        let mut entries: HashMap<String, String> = HashMap::new();
        let mut last_key: Option<String> = None;
        for line in text.lines() {
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }
            if line.starts_with([' ', '\t']) {
                // continuation of the previous entry
                if let Some(key) = &last_key {
                    let entry = entries.get_mut(key).expect("key was just inserted");
                    if !entry.is_empty() {
                        entry.push(' ');
                    }
                    entry.push_str(line.trim());
                }
                continue;
            }
            let mut split = line.splitn(2, [' ', '\t']);
            let key = split.next().expect("line is non-empty").to_owned();
            let value = split.next().unwrap_or("").trim().to_owned();
            entries.insert(key.clone(), value);
            last_key = Some(key);
        }
        Self { entries }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl teng_core::Dictionary for Dict {
    fn entry(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

/// `dict.txt` + `cs` → `dict.cs.txt`; extension-less files get `.cs`
/// appended.
fn localized_path(path: &Path, lang: &str) -> PathBuf {
    let mut out = path.to_owned();
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => {
            out.set_extension(format!("{lang}.{ext}"));
        }
        None => {
            out.set_extension(lang);
        }
    }
    out
}
