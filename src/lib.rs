//! # bookbuild
//!
//! A CLI utility that turns the book's markdown chapters and appendices into
//! PDF, EPUB and HTML by driving pandoc.
//!
//! ## Features
//!
//! - Recursive, ordered discovery of chapter and appendix files
//! - Stub filtering: files shorter than a minimum line count are skipped
//! - One parameterized builder for every output format
//! - Dependency check for pandoc, the LaTeX engine and the template
//! - Partial failures are counted, not fatal to sibling formats
//!
//! ## Usage
//!
//! ```bash
//! bookbuild --test
//! bookbuild --pdf --epub
//! ```

pub mod builder;
pub mod cli;
pub mod config;
pub mod content;
pub mod deps;
pub mod inspect;
mod orchestrator;

pub use builder::{BuildOutcome, BuildResult, Format, FormatBuilder};
pub use config::{BookConfig, BookMetadata, Overrides, ProjectLayout};
pub use content::{discover, ContentFilter, ContentGroup, ContentUnit, Manifest};
pub use deps::{DependencyChecker, DependencyReport};
pub use orchestrator::{BuildRequest, BuildSummary, Orchestrator};
