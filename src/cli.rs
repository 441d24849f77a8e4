use clap::{CommandFactory, Parser};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::builder::Format;
use crate::config::Overrides;

#[derive(Parser, Debug)]
#[command(name = "bookbuild", version)]
#[command(about = "Build the book's markdown sources into PDF, EPUB and HTML with pandoc")]
#[command(after_help = "EXAMPLES:
    bookbuild --pdf             Build the PDF
    bookbuild --pdf --epub      Build PDF and EPUB
    bookbuild --all             Build every format
    bookbuild --test            Check pandoc, LaTeX, template and content

Flags are case-insensitive.")]
pub struct Cli {
    /// Build the PDF
    #[arg(long)]
    pub pdf: bool,

    /// Build the EPUB
    #[arg(long)]
    pub epub: bool,

    /// Build the standalone HTML page
    #[arg(long)]
    pub html: bool,

    /// Build every format
    #[arg(long)]
    pub all: bool,

    /// Check dependencies and content, build nothing
    #[arg(long)]
    pub test: bool,

    /// Project root containing content/ and metadata.yaml
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Output directory, relative to the project root
    #[arg(long = "out-dir", value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Skip markdown files shorter than this many lines
    #[arg(long = "min-lines", value_name = "N")]
    pub min_lines: Option<usize>,

    /// Config file (default: <root>/bookbuild.json when present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the build summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Log debug output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// What one invocation asks for, decided once from the parsed flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Help,
    CheckDeps,
    Build(BTreeSet<Format>),
}

impl Cli {
    pub fn formats(&self) -> BTreeSet<Format> {
        if self.all {
            return Format::ALL.into_iter().collect();
        }
        [
            (self.pdf, Format::Pdf),
            (self.epub, Format::Epub),
            (self.html, Format::Html),
        ]
        .into_iter()
        .filter_map(|(selected, format)| selected.then_some(format))
        .collect()
    }

    pub fn action(&self) -> Action {
        if self.test {
            return Action::CheckDeps;
        }
        let formats = self.formats();
        if formats.is_empty() {
            Action::Help
        } else {
            Action::Build(formats)
        }
    }

    pub fn overrides(&self) -> Overrides {
        Overrides {
            out_dir: self.out_dir.clone(),
            min_lines: self.min_lines,
        }
    }

    pub fn help_text() -> String {
        Cli::command().render_help().to_string()
    }
}

/// Lowercases flag names so `--PDF`, `--Pdf` and `--pdf` are the same flag,
/// as are `-H` and `-h`. `-V` (version) is the one flag left as given, since
/// it would otherwise fold onto `-v`. Values, including the part after `=`,
/// are left alone.
pub fn fold_flag_case<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut folded = Vec::new();
    let mut iter = args.into_iter().map(Into::into);

    if let Some(program) = iter.next() {
        folded.push(program);
    }

    let mut takes_value = false;
    let mut end_of_flags = false;
    for arg in iter {
        let is_flag = arg
            .to_str()
            .is_some_and(|text| text.starts_with('-') && text != "-" && text != "-V");
        if end_of_flags || takes_value || !is_flag {
            takes_value = false;
            folded.push(arg);
            continue;
        }
        let text = arg.to_string_lossy().into_owned();

        if text == "--" {
            end_of_flags = true;
            folded.push(arg);
            continue;
        }

        let (name, value) = match text.split_once('=') {
            Some((name, value)) => (name.to_lowercase(), Some(value)),
            None => (text.as_str().to_lowercase(), None),
        };
        takes_value = value.is_none() && flag_takes_value(&name);

        folded.push(match value {
            Some(value) => OsString::from(format!("{}={}", name, value)),
            None => OsString::from(name),
        });
    }

    folded
}

fn flag_takes_value(name: &str) -> bool {
    matches!(name, "--root" | "--out-dir" | "--min-lines" | "--config")
}

/// Parses raw process arguments after case folding.
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    Cli::try_parse_from(fold_flag_case(args))
}
