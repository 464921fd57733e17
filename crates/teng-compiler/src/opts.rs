//! Compilation options: the narrow slice of engine configuration the
//! front-end consumes.

use std::path::PathBuf;

/// Options consulted while compiling one template.
#[derive(Debug, Clone, Default)]
pub struct CompileOpts {
    /// Disable the `%{…}` and `#{…}` short print forms; they then pass
    /// through as ordinary template text.
    pub no_print_escape: bool,
    /// Root directory for `<?teng include?>` resolution. Includes are
    /// rejected when unset.
    pub include_root: Option<PathBuf>,
}
