use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Config file looked up in the project root when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "bookbuild.json";

pub const DEFAULT_TITLE: &str = "FreeBSD Device Drivers";

/// Fixed book metadata for every build. Fields set here override the
/// metadata file; unset fields leave it alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BookMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
}

impl BookMetadata {
    /// Title used for naming output files.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_TITLE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BookConfig {
    pub chapters_dir: PathBuf,
    pub appendices_dir: PathBuf,
    pub title_file: PathBuf,
    pub metadata_file: PathBuf,
    pub out_dir: PathBuf,
    pub min_lines: usize,
    pub converter: String,
    pub converter_min_major: u32,
    pub pdf_engine: String,
    pub template: String,
    /// Where the dependency check expects the template; derived from `$HOME` when unset.
    pub template_path: Option<PathBuf>,
    pub toc_depth: u8,
    pub highlight_style: String,
    pub cover_image: Option<PathBuf>,
    pub css: Option<PathBuf>,
    pub metadata: BookMetadata,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            chapters_dir: PathBuf::from("content/chapters"),
            appendices_dir: PathBuf::from("content/appendices"),
            title_file: PathBuf::from("content/title.md"),
            metadata_file: PathBuf::from("metadata.yaml"),
            out_dir: PathBuf::from("build"),
            min_lines: 20,
            converter: "pandoc".to_string(),
            converter_min_major: 3,
            pdf_engine: "xelatex".to_string(),
            template: "eisvogel".to_string(),
            template_path: None,
            toc_depth: 2,
            highlight_style: "tango".to_string(),
            cover_image: None,
            css: None,
            metadata: BookMetadata::default(),
        }
    }
}

/// Command line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub out_dir: Option<PathBuf>,
    pub min_lines: Option<usize>,
}

impl BookConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| anyhow!("Invalid config: {}", e))
    }

    /// Loads the config for `root`. An explicit `path` must exist; the default
    /// `bookbuild.json` is optional and falls back to built-in defaults.
    pub async fn load(root: &Path, path: Option<&Path>) -> Result<Self> {
        let (config_path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (root.join(DEFAULT_CONFIG_FILE), false),
        };

        if !fs::try_exists(&config_path).await.unwrap_or(false) {
            if required {
                return Err(anyhow!("Config file '{}' does not exist", config_path.display()));
            }
            debug!("No config file at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&config_path)
            .await
            .map_err(|e| anyhow!("Failed to read config {}: {}", config_path.display(), e))?;
        let config = Self::from_json(&text)
            .map_err(|e| anyhow!("{}: {}", config_path.display(), e))?;

        info!("Loaded config from {}", config_path.display());
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(out_dir) = &overrides.out_dir {
            self.out_dir = out_dir.clone();
        }
        if let Some(min_lines) = overrides.min_lines {
            self.min_lines = min_lines;
        }
    }

    /// Template location checked before a build: the configured path, or
    /// pandoc's per-user template directory.
    pub fn expected_template_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.template_path {
            return Some(path.clone());
        }
        std::env::var_os("HOME").map(|home| {
            PathBuf::from(home)
                .join(".local/share/pandoc/templates")
                .join(format!("{}.latex", self.template))
        })
    }
}

/// Config paths resolved against an absolute project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub chapters: PathBuf,
    pub appendices: PathBuf,
    pub title: PathBuf,
    pub metadata: PathBuf,
    pub out_dir: PathBuf,
}

impl ProjectLayout {
    pub fn resolve(root: &Path, config: &BookConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            chapters: root.join(&config.chapters_dir),
            appendices: root.join(&config.appendices_dir),
            title: root.join(&config.title_file),
            metadata: root.join(&config.metadata_file),
            out_dir: root.join(&config.out_dir),
        }
    }

    pub async fn canonical_root(root: &Path) -> Result<PathBuf> {
        fs::canonicalize(root)
            .await
            .map_err(|e| anyhow!("Project root '{}' is not accessible: {}", root.display(), e))
    }
}
