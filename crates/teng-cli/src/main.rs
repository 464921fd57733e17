//! Command line front-end: render a template against a JSON data file.

mod data;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use teng_core::{ErrorLog, Fragment, Severity};
use teng_lib::Teng;
use teng_vm::WriterSink;

#[derive(Parser)]
#[command(name = "teng", about = "Render Teng templates", version)]
struct Args {
    /// Template file to render.
    template: PathBuf,

    /// JSON file holding the data tree (an object at the root).
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Dictionary file.
    #[arg(long)]
    dict: Option<PathBuf>,

    /// Dictionary language.
    #[arg(short, long)]
    lang: Option<String>,

    /// Configuration file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Content type driving output escaping.
    #[arg(long, default_value = "text/html")]
    ctype: String,

    /// Root directory for includes; defaults to the template's directory.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Print the compiled program instead of rendering.
    #[arg(long)]
    dump: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let template = match std::fs::read_to_string(&args.template) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("teng: cannot read template {}: {err}", args.template.display());
            return ExitCode::FAILURE;
        }
    };

    let data = match &args.data {
        Some(path) => match data::load(path) {
            Ok(root) => root,
            Err(err) => {
                eprintln!("teng: cannot load data {}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => Fragment::new(),
    };

    let root = args.root.clone().unwrap_or_else(|| {
        args.template.parent().map_or_else(|| PathBuf::from("."), PathBuf::from)
    });
    let engine = Teng::new(root);

    if args.dump {
        return dump_program(&args, &template);
    }

    let mut log = ErrorLog::new();
    let mut sink = WriterSink::new(std::io::stdout().lock());
    let filename = args.template.display().to_string();
    let mut page = engine
        .page(&template)
        .filename(&filename)
        .content_type(&args.ctype);
    if let Some(dict) = &args.dict {
        page = page.dictionary(dict);
    }
    if let Some(lang) = &args.lang {
        page = page.lang(lang);
    }
    if let Some(config) = &args.config {
        page = page.config(config);
    }
    page.generate(&data, &mut sink, &mut log);

    for entry in log.entries() {
        eprintln!("{entry}");
    }
    if log.count_of(Severity::Error) + log.count_of(Severity::Fatal) > 0 {
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn dump_program(args: &Args, template: &str) -> ExitCode {
    use teng_compiler::{CompileOpts, Source, compile};

    let mut log = ErrorLog::new();
    let opts = CompileOpts {
        no_print_escape: false,
        include_root: args.root.clone(),
    };
    let source = Source::new(template, args.template.display().to_string());
    let program = compile(&source, None, &opts, &mut log);
    print!("{}", program.dump());
    for entry in log.entries() {
        eprintln!("{entry}");
    }
    ExitCode::SUCCESS
}
