//! Engine configuration, loaded from a TOML file.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Engine configuration. Every key is optional; defaults keep the engine
/// fully functional without a config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Disable the `%{…}` and `#{…}` print forms; `${…}` stays the only
    /// print.
    #[serde(default)]
    pub no_print_escape: bool,
    /// Default content type for pages that don't specify one.
    pub ctype: Option<String>,
    /// Encoding label; informational only, templates are UTF-8.
    pub encoding: Option<String>,
    /// Dictionary file used when the page request names none.
    pub dictionary: Option<PathBuf>,
    /// Root directory for `<?teng include?>` resolution.
    pub include_root: Option<PathBuf>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}
