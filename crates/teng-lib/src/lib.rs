//! Teng — a general-purpose templating engine.
//!
//! Templates are compiled to a flat bytecode program and executed by a
//! stack VM against a caller-built fragment tree. Syntax and runtime
//! problems never abort a page: they are recorded in a structured
//! diagnostic log and rendering continues with `Undefined` placeholders.
//!
//! ```
//! use teng_lib::{Fragment, Teng};
//!
//! let mut root = Fragment::new();
//! root.add_variable("title", "hello");
//! let (output, log) = Teng::new(".").page("<b>${title}</b>").generate_to_string(&root);
//! assert_eq!(output, "<b>hello</b>");
//! assert!(log.is_empty());
//! ```

mod config;
mod dict;

pub use config::{Config, ConfigError};
pub use dict::{Dict, DictError};
pub use teng_bytecode::Program;
pub use teng_core::{
    Entry, ErrorLog, Fragment, FragmentList, FragmentValue, Pos, Scalar, Severity, Value,
};
pub use teng_vm::{Sink, StringSink, WriterSink};

use std::path::{Path, PathBuf};

use teng_compiler::{CompileOpts, Source, compile};
use teng_core::Dictionary;
use teng_vm::Vm;

/// The engine: a filesystem root for includes plus page-generation entry
/// points. One instance may serve many pages.
#[derive(Debug, Clone)]
pub struct Teng {
    root: PathBuf,
}

impl Teng {
    /// Create an engine rooted at `root`; include directives and relative
    /// dictionary/config paths resolve beneath it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Start building one page generation.
    pub fn page<'a>(&'a self, template: &'a str) -> PageBuilder<'a> {
        PageBuilder {
            engine: self,
            template,
            filename: "",
            dict_path: None,
            lang: None,
            config_path: None,
            content_type: "text/html",
            encoding: "utf-8",
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() { path.to_owned() } else { self.root.join(path) }
    }
}

/// One page generation request.
pub struct PageBuilder<'a> {
    engine: &'a Teng,
    template: &'a str,
    filename: &'a str,
    dict_path: Option<&'a Path>,
    lang: Option<&'a str>,
    config_path: Option<&'a Path>,
    content_type: &'a str,
    encoding: &'a str,
}

impl<'a> PageBuilder<'a> {
    /// Filename label used in diagnostics; empty shows as `(no file)`.
    pub fn filename(mut self, filename: &'a str) -> Self {
        self.filename = filename;
        self
    }

    pub fn dictionary(mut self, path: &'a (impl AsRef<Path> + ?Sized)) -> Self {
        self.dict_path = Some(path.as_ref());
        self
    }

    pub fn lang(mut self, lang: &'a str) -> Self {
        self.lang = Some(lang);
        self
    }

    pub fn config(mut self, path: &'a (impl AsRef<Path> + ?Sized)) -> Self {
        self.config_path = Some(path.as_ref());
        self
    }

    pub fn content_type(mut self, name: &'a str) -> Self {
        self.content_type = name;
        self
    }

    /// Informational encoding label; templates are always UTF-8.
    pub fn encoding(mut self, name: &'a str) -> Self {
        self.encoding = name;
        self
    }

    /// Generate the page into `sink`, appending diagnostics to `log`.
    /// Fatal conditions abort mid-stream; whatever was already written
    /// stays in the sink.
    pub fn generate(self, data: &Fragment, sink: &mut dyn Sink, log: &mut ErrorLog) {
        let _ = self.encoding;
        let config = match self.config_path {
            Some(path) => match Config::load(&self.engine.resolve(path)) {
                Ok(config) => config,
                Err(err) => {
                    log.error(Pos::start(), format!("Cannot load configuration: {err}"));
                    Config::default()
                }
            },
            None => Config::default(),
        };

        let dict = match self.dict_path.or(config.dictionary.as_deref()) {
            Some(path) => match Dict::load(&self.engine.resolve(path), self.lang) {
                Ok(dict) => dict,
                Err(err) => {
                    log.error(Pos::start(), format!("Cannot load dictionary: {err}"));
                    Dict::new()
                }
            },
            None => Dict::new(),
        };

        let include_root = config
            .include_root
            .as_deref()
            .map(|p| self.engine.resolve(p))
            .unwrap_or_else(|| self.engine.root.clone());
        let opts = CompileOpts {
            no_print_escape: config.no_print_escape,
            include_root: Some(include_root),
        };

        let source = Source::new(self.template, self.filename);
        let program = compile(&source, Some(&dict as &dyn Dictionary), &opts, log);

        let ctype = match config.ctype.as_deref() {
            Some(default) if self.content_type.is_empty() => default,
            _ => self.content_type,
        };
        Vm::new(&program, data)
            .dictionary(&dict)
            .content_type(ctype)
            .run(sink, log);
    }

    /// Convenience wrapper returning the rendered output and the log.
    pub fn generate_to_string(self, data: &Fragment) -> (String, ErrorLog) {
        let mut sink = StringSink::new();
        let mut log = ErrorLog::new();
        self.generate(data, &mut sink, &mut log);
        (sink.into_string(), log)
    }
}

#[cfg(test)]
mod test_utils;

#[cfg(test)]
mod expr_tests;
#[cfg(test)]
mod fun_tests;
#[cfg(test)]
mod rtvar_tests;
