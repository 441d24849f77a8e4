//! Pre-build toolchain and project checks.
//!
//! Every check runs even when an earlier one fails, so a single `--test`
//! shows everything that is missing.

use anyhow::{anyhow, Result};
use colored::*;
use serde::Serialize;
use std::path::Path;
use tokio::fs;
use tokio::process::Command;
use tracing::debug;

use crate::config::{BookConfig, ProjectLayout};
use crate::content::{scan, ContentFilter, ContentGroup};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    /// Reported but never affects the verdict.
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Check {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Check {
    pub fn pass(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Pass,
            detail: detail.into(),
            hint: None,
        }
    }

    pub fn fail(name: &str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Fail,
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    pub fn info(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Info,
            detail: detail.into(),
            hint: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DependencyReport {
    pub checks: Vec<Check>,
}

impl DependencyReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.status != CheckStatus::Fail)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| c.status == CheckStatus::Fail)
    }

    pub fn print(&self) {
        println!("{}", "Dependency check".bold());
        for check in &self.checks {
            let mark = match check.status {
                CheckStatus::Pass => "✓".green(),
                CheckStatus::Fail => "✗".red(),
                CheckStatus::Info => "i".blue(),
            };
            println!("  {} {}: {}", mark, check.name, check.detail);
            if let Some(hint) = &check.hint {
                println!("      {} {}", "hint:".yellow(), hint);
            }
        }

        let failed = self.failures().count();
        if failed == 0 {
            println!("{}", "All checks passed.".green());
        } else {
            println!("{}", format!("{} check(s) failed.", failed).red());
        }
    }
}

/// Extracts the major version from a `--version` banner such as
/// `pandoc 3.1.9` or `pandoc.exe 2.19.2`.
pub fn parse_major_version(banner: &str) -> Option<u32> {
    let first_line = banner.lines().next()?;
    first_line
        .split_whitespace()
        .find(|token| token.starts_with(|c: char| c.is_ascii_digit()))
        .and_then(|version| version.split('.').next())
        .and_then(|major| major.parse().ok())
}

async fn probe(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| anyhow!("`{}` not found: {}", program, e))?;

    if !output.status.success() {
        return Err(anyhow!("`{} {}` exited with {}", program, args.join(" "), output.status));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

pub struct DependencyChecker<'a> {
    config: &'a BookConfig,
    layout: &'a ProjectLayout,
}

impl<'a> DependencyChecker<'a> {
    pub fn new(config: &'a BookConfig, layout: &'a ProjectLayout) -> Self {
        Self { config, layout }
    }

    pub async fn run(&self) -> DependencyReport {
        let filter = ContentFilter::new(self.config.min_lines);

        let checks = vec![
            self.check_converter().await,
            self.check_engine().await,
            self.check_template().await,
            self.check_out_dir().await,
            check_file("title file", &self.layout.title).await,
            check_file("metadata file", &self.layout.metadata).await,
            check_content(ContentGroup::Chapter, &self.layout.chapters, &filter).await,
            check_content(ContentGroup::Appendix, &self.layout.appendices, &filter).await,
        ];

        for check in &checks {
            debug!("check {} -> {:?}", check.name, check.status);
        }

        DependencyReport { checks }
    }

    async fn check_converter(&self) -> Check {
        const NAME: &str = "converter";
        let converter = &self.config.converter;
        let required = self.config.converter_min_major;
        let hint = format!("install {} {}.x or newer (https://pandoc.org/installing.html)", converter, required);

        match probe(converter, &["--version"]).await {
            Ok(banner) => match parse_major_version(&banner) {
                Some(major) if major >= required => {
                    Check::pass(NAME, banner.lines().next().unwrap_or_default().trim().to_string())
                }
                Some(major) => Check::fail(
                    NAME,
                    format!("{} major version {} is older than {}", converter, major, required),
                    hint,
                ),
                None => Check::fail(NAME, format!("cannot read {} version", converter), hint),
            },
            Err(e) => Check::fail(NAME, e.to_string(), hint),
        }
    }

    async fn check_engine(&self) -> Check {
        const NAME: &str = "LaTeX engine";
        let engine = &self.config.pdf_engine;
        match probe(engine, &["--version"]).await {
            Ok(_) => Check::pass(NAME, format!("{} available", engine)),
            Err(e) => Check::fail(
                NAME,
                e.to_string(),
                format!("install a TeX distribution that provides {} (e.g. TeX Live)", engine),
            ),
        }
    }

    async fn check_template(&self) -> Check {
        const NAME: &str = "template";
        match self.config.expected_template_path() {
            Some(path) if exists(&path).await => Check::pass(NAME, path.display().to_string()),
            Some(path) => Check::fail(
                NAME,
                format!("{} not found", path.display()),
                format!(
                    "download the {} template and place it at {}",
                    self.config.template,
                    path.display()
                ),
            ),
            None => Check::fail(
                NAME,
                "cannot locate template directory ($HOME is not set)",
                "set `template_path` in the config file",
            ),
        }
    }

    async fn check_out_dir(&self) -> Check {
        const NAME: &str = "output directory";
        let out_dir = &self.layout.out_dir;
        if exists(out_dir).await {
            Check::info(NAME, format!("{} exists", out_dir.display()))
        } else {
            Check::info(NAME, format!("{} will be created", out_dir.display()))
        }
    }
}

async fn check_file(name: &str, path: &Path) -> Check {
    if exists(path).await {
        Check::pass(name, path.display().to_string())
    } else {
        Check::fail(
            name,
            format!("{} not found", path.display()),
            format!("create {} or point the config at it", path.display()),
        )
    }
}

async fn check_content(group: ContentGroup, root: &Path, filter: &ContentFilter) -> Check {
    let name = match group {
        ContentGroup::Chapter => "chapters",
        ContentGroup::Appendix => "appendices",
    };
    let result = scan(root, group, filter).await;
    let included = result.included.len();
    let skipped = result.skipped.len();

    if included > 0 {
        Check::pass(name, format!("{} usable, {} skipped", included, skipped))
    } else {
        Check::fail(
            name,
            format!("no {} with at least {} lines under {}", name, filter.min_lines, root.display()),
            format!("add content under {} or lower --min-lines", root.display()),
        )
    }
}
