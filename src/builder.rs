use anyhow::{anyhow, Result};
use colored::*;
use serde::{Deserialize, Serialize};
use slug::slugify;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::config::{BookConfig, BookMetadata, ProjectLayout};
use crate::content::Manifest;
use crate::inspect::{inspect_artifact, ArtifactInfo};

/// Output formats, ordered the way builds run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Pdf,
    Epub,
    Html,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Pdf, Format::Epub, Format::Html];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Pdf => "pdf",
            Format::Epub => "epub",
            Format::Html => "html",
        }
    }

    /// Pandoc writer; PDF is inferred from the output extension and engine.
    pub fn writer(self) -> Option<&'static str> {
        match self {
            Format::Pdf => None,
            Format::Epub => Some("epub3"),
            Format::Html => Some("html5"),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Pdf => write!(f, "PDF"),
            Format::Epub => write!(f, "EPUB"),
            Format::Html => write!(f, "HTML"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BuildOutcome {
    Success {
        output: PathBuf,
        bytes: u64,
        #[serde(flatten)]
        artifact: ArtifactInfo,
    },
    Failure {
        exit_code: Option<i32>,
        diagnostics: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildResult {
    pub format: Format,
    #[serde(flatten)]
    pub outcome: BuildOutcome,
}

impl BuildResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BuildOutcome::Success { .. })
    }

    fn failure(format: Format, exit_code: Option<i32>, diagnostics: impl Into<String>) -> Self {
        Self {
            format,
            outcome: BuildOutcome::Failure {
                exit_code,
                diagnostics: diagnostics.into(),
            },
        }
    }
}

/// Runs the converter for one format at a time over a shared manifest.
pub struct FormatBuilder<'a> {
    config: &'a BookConfig,
    layout: &'a ProjectLayout,
}

impl<'a> FormatBuilder<'a> {
    pub fn new(config: &'a BookConfig, layout: &'a ProjectLayout) -> Self {
        Self { config, layout }
    }

    pub fn output_path(&self, format: Format, metadata: &BookMetadata) -> PathBuf {
        let stem = match slugify(metadata.display_title()) {
            s if s.is_empty() => "book".to_string(),
            s => s,
        };
        self.layout
            .out_dir
            .join(format!("{}.{}", stem, format.extension()))
    }

    /// Full converter argument list: inputs in manifest order, then options.
    pub fn converter_args(
        &self,
        format: Format,
        manifest: &Manifest,
        metadata: &BookMetadata,
        output: &Path,
    ) -> Vec<OsString> {
        let config = self.config;
        let mut args: Vec<OsString> = manifest
            .inputs()
            .into_iter()
            .map(|p| p.as_os_str().to_owned())
            .collect();

        let mut push = |arg: String| args.push(OsString::from(arg));

        push(format!("--metadata-file={}", self.layout.metadata.display()));
        push("--from=markdown".to_string());
        if let Some(writer) = format.writer() {
            push(format!("--to={}", writer));
        }
        push("--toc".to_string());
        push(format!("--toc-depth={}", config.toc_depth));
        push("--number-sections".to_string());
        push(format!("--highlight-style={}", config.highlight_style));

        if let Some(title) = &metadata.title {
            push(format!("--metadata=title:{}", title));
        }
        if let Some(author) = &metadata.author {
            push(format!("--metadata=author:{}", author));
        }
        if let Some(date) = &metadata.date {
            push(format!("--metadata=date:{}", date));
        }

        match format {
            Format::Pdf => {
                push(format!("--template={}", config.template));
                push(format!("--pdf-engine={}", config.pdf_engine));
                push("--top-level-division=chapter".to_string());
                push("--listings".to_string());
            }
            Format::Epub => {
                push("--split-level=1".to_string());
                if let Some(cover) = &config.cover_image {
                    push(format!(
                        "--epub-cover-image={}",
                        self.layout.root.join(cover).display()
                    ));
                }
            }
            Format::Html => {
                push("--standalone".to_string());
                push("--embed-resources".to_string());
                if let Some(css) = &config.css {
                    push(format!("--css={}", self.layout.root.join(css).display()));
                }
            }
        }

        args.push(OsString::from("-o"));
        args.push(output.as_os_str().to_owned());
        args
    }

    pub async fn build(&self, format: Format, manifest: &Manifest, metadata: &BookMetadata) -> BuildResult {
        let output = self.output_path(format, metadata);
        info!(
            "Building {} from {} inputs into \"{}\"",
            format.to_string().green(),
            manifest.input_count(),
            output.display().to_string().blue()
        );

        if let Err(e) = self.prepare_out_dir(&output).await {
            error!("{}", e);
            return BuildResult::failure(format, None, e.to_string());
        }

        let args = self.converter_args(format, manifest, metadata, &output);
        debug!("{} {:?}", self.config.converter, args);

        let result = Command::new(&self.config.converter)
            .args(&args)
            .current_dir(&self.layout.root)
            .output()
            .await;

        let run = match result {
            Ok(run) => run,
            Err(e) => {
                let message = format!("Failed to run `{}`: {}", self.config.converter, e);
                error!("{}", message);
                return BuildResult::failure(format, None, message);
            }
        };

        let mut diagnostics = String::from_utf8_lossy(&run.stderr).trim().to_string();
        if run.status.code().is_none() {
            diagnostics = format!("converter {}\n{}", run.status, diagnostics).trim().to_string();
        }

        if !run.status.success() {
            error!(
                "{} build failed ({}): {}",
                format,
                run.status,
                diagnostics
            );
            if fs::try_exists(&output).await.unwrap_or(false) {
                warn!(
                    "{} was left behind by a failed build and should not be published",
                    output.display()
                );
            }
            return BuildResult::failure(format, run.status.code(), diagnostics);
        }

        if !diagnostics.is_empty() {
            debug!("{} converter output: {}", format, diagnostics);
        }

        let bytes = match fs::metadata(&output).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                let message = format!(
                    "Converter reported success but {} is missing: {}",
                    output.display(),
                    e
                );
                error!("{}", message);
                return BuildResult::failure(format, run.status.code(), message);
            }
        };

        let artifact = match inspect_artifact(format, &output).await {
            Ok(info) => info,
            Err(e) => {
                warn!("Could not inspect {}: {}", output.display(), e);
                ArtifactInfo::default()
            }
        };

        info!("{} written to {}", format, output.display().to_string().green());

        BuildResult {
            format,
            outcome: BuildOutcome::Success {
                output,
                bytes,
                artifact,
            },
        }
    }

    /// Creates the output directory and removes the previous artifact, so only
    /// a file written by this run can be reported.
    async fn prepare_out_dir(&self, output: &Path) -> Result<()> {
        fs::create_dir_all(&self.layout.out_dir)
            .await
            .map_err(|e| anyhow!("Failed to create output directory {}: {}", self.layout.out_dir.display(), e))?;

        match fs::remove_file(output).await {
            Ok(()) => {
                debug!("Removed previous {}", output.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow!("Failed to remove previous {}: {}", output.display(), e)),
        }
    }
}
