use anyhow::{anyhow, Result};
use colored::*;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tokio::fs;
use tracing::{error, info};

use crate::builder::{BuildOutcome, BuildResult, Format, FormatBuilder};
use crate::config::{BookConfig, BookMetadata, Overrides, ProjectLayout};
use crate::content::{ContentFilter, ContentUnit, Manifest};
use crate::deps::{DependencyChecker, DependencyReport};

/// The formats and metadata for one invocation. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    formats: Vec<Format>,
    metadata: BookMetadata,
}

impl BuildRequest {
    pub fn new(formats: BTreeSet<Format>, metadata: BookMetadata) -> Self {
        Self {
            formats: formats.into_iter().collect(),
            metadata,
        }
    }

    pub fn formats(&self) -> &[Format] {
        &self.formats
    }

    pub fn metadata(&self) -> &BookMetadata {
        &self.metadata
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub inputs: usize,
    pub skipped: Vec<ContentUnit>,
    pub results: Vec<BuildResult>,
}

impl BuildSummary {
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }

    pub fn succeeded(&self) -> bool {
        self.failures() == 0
    }

    pub fn print(&self) {
        println!("{}", "Build summary".bold());
        println!("  inputs: {} ({} skipped)", self.inputs, self.skipped.len());
        for unit in &self.skipped {
            let lines = unit
                .lines
                .map(|n| format!("{} lines", n))
                .unwrap_or_else(|| "unreadable".to_string());
            println!("    skipped {}: {}", unit.path.display(), lines);
        }

        for result in &self.results {
            match &result.outcome {
                BuildOutcome::Success {
                    output,
                    bytes,
                    artifact,
                } => {
                    let mut line = format!(
                        "  {} {}: {} ({} bytes",
                        "✓".green(),
                        result.format,
                        output.display().to_string().blue(),
                        bytes
                    );
                    if let Some(pages) = artifact.pages {
                        line.push_str(&format!(", {} pages", pages));
                    }
                    line.push(')');
                    println!("{}", line);
                }
                BuildOutcome::Failure {
                    exit_code,
                    diagnostics,
                } => {
                    let status = exit_code
                        .map(|code| format!("exit code {}", code))
                        .unwrap_or_else(|| "no exit code".to_string());
                    println!("  {} {}: failed ({})", "✗".red(), result.format, status);
                    for line in diagnostics.lines().take(10) {
                        println!("      {}", line);
                    }
                }
            }
        }

        let failures = self.failures();
        if failures == 0 {
            println!("{}", format!("{} format(s) built.", self.results.len()).green());
        } else {
            println!(
                "{}",
                format!("{} of {} format(s) failed.", failures, self.results.len()).red()
            );
        }
    }
}

/// Holds the resolved project for one run and drives checks and builds.
pub struct Orchestrator {
    config: BookConfig,
    layout: ProjectLayout,
}

impl Orchestrator {
    pub fn new(root: &Path, config: BookConfig) -> Self {
        let layout = ProjectLayout::resolve(root, &config);
        Self { config, layout }
    }

    /// Resolves the root, loads the config file and applies CLI overrides.
    pub async fn load(root: &Path, config_path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let root = ProjectLayout::canonical_root(root).await?;
        let mut config = BookConfig::load(&root, config_path).await?;
        config.apply(overrides);
        Ok(Self::new(&root, config))
    }

    pub fn config(&self) -> &BookConfig {
        &self.config
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn request(&self, formats: BTreeSet<Format>) -> BuildRequest {
        BuildRequest::new(formats, self.config.metadata.clone())
    }

    pub async fn check(&self) -> DependencyReport {
        info!("Checking dependencies for {}", self.layout.root.display().to_string().blue());
        DependencyChecker::new(&self.config, &self.layout).run().await
    }

    /// Runs every requested format in order against one manifest.
    ///
    /// Errors only for configuration problems found before any build starts;
    /// converter failures end up in the summary.
    pub async fn build(&self, request: &BuildRequest) -> Result<BuildSummary> {
        if !fs::try_exists(&self.layout.metadata).await.unwrap_or(false) {
            return Err(anyhow!(
                "Metadata file '{}' does not exist",
                self.layout.metadata.display()
            ));
        }

        let filter = ContentFilter::new(self.config.min_lines);
        let manifest = Manifest::assemble(&self.layout, &filter).await?;
        let builder = FormatBuilder::new(&self.config, &self.layout);

        let mut results = Vec::with_capacity(request.formats().len());
        let mut errors = 0;

        for &format in request.formats() {
            let result = builder.build(format, &manifest, request.metadata()).await;
            if !result.is_success() {
                errors += 1;
                error!("{} build failed, continuing with remaining formats", format);
            }
            results.push(result);
        }

        info!(
            "Finished {} build(s), {} failed",
            results.len(),
            errors
        );

        Ok(BuildSummary {
            inputs: manifest.input_count(),
            skipped: manifest.skipped,
            results,
        })
    }
}
