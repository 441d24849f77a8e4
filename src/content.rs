use anyhow::{anyhow, Result};
use colored::*;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::task;
use tracing::{debug, info, warn};

use crate::config::ProjectLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentGroup {
    Chapter,
    Appendix,
}

impl fmt::Display for ContentGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentGroup::Chapter => write!(f, "chapter"),
            ContentGroup::Appendix => write!(f, "appendix"),
        }
    }
}

/// One markdown file under a content root. `lines` is `None` when the file
/// could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentUnit {
    pub path: PathBuf,
    pub group: ContentGroup,
    pub lines: Option<usize>,
}

impl ContentUnit {
    pub async fn inspect(path: PathBuf, group: ContentGroup) -> Self {
        let lines = match fs::read(&path).await {
            Ok(data) => Some(count_lines(&data)),
            Err(e) => {
                warn!("Cannot read {}: {}", path.display(), e);
                None
            }
        };
        Self { path, group, lines }
    }
}

/// Counts lines the way a reader sees them: a trailing line without a
/// newline still counts.
pub fn count_lines(data: &[u8]) -> usize {
    let newlines = data.iter().filter(|&&b| b == b'\n').count();
    match data.last() {
        Some(&b'\n') | None => newlines,
        Some(_) => newlines + 1,
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

/// Lazy depth-first walk yielding markdown files in `Path` order.
///
/// Siblings are visited sorted, and `Path` compares component by component,
/// so the walk order equals sorting the full list of paths. Symlinked
/// directories are not followed.
pub struct Discovery {
    pending: Vec<(PathBuf, bool)>,
}

pub fn discover(root: &Path) -> Discovery {
    let mut discovery = Discovery { pending: Vec::new() };
    if root.is_dir() {
        discovery.push_children(root);
    } else {
        debug!("Content root {} does not exist", root.display());
    }
    discovery
}

impl Discovery {
    fn push_children(&mut self, dir: &Path) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list {}: {}", dir.display(), e);
                return;
            }
        };

        let mut children: Vec<(PathBuf, bool)> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| {
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                (entry.path(), is_dir)
            })
            .collect();

        // Reverse order so the stack pops the smallest path first.
        children.sort_by(|a, b| b.0.cmp(&a.0));
        self.pending.extend(children);
    }
}

impl Iterator for Discovery {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        while let Some((path, is_dir)) = self.pending.pop() {
            if is_dir {
                self.push_children(&path);
            } else if is_markdown(&path) && path.is_file() {
                return Some(path);
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentFilter {
    pub min_lines: usize,
}

impl ContentFilter {
    pub fn new(min_lines: usize) -> Self {
        Self { min_lines }
    }

    pub fn admits(&self, unit: &ContentUnit) -> bool {
        unit.lines.is_some_and(|lines| lines >= self.min_lines)
    }
}

/// Units of one content root, split by the filter.
#[derive(Debug, Clone, Default)]
pub struct GroupScan {
    pub included: Vec<ContentUnit>,
    pub skipped: Vec<ContentUnit>,
}

/// Walks `root` on the blocking pool, then reads each file through `tokio::fs`.
pub async fn scan(root: &Path, group: ContentGroup, filter: &ContentFilter) -> GroupScan {
    let mut result = GroupScan::default();

    let walk_root = root.to_path_buf();
    let paths = match task::spawn_blocking(move || discover(&walk_root).collect::<Vec<_>>()).await {
        Ok(paths) => paths,
        Err(e) => {
            warn!("Listing {} failed: {}", root.display(), e);
            Vec::new()
        }
    };

    for path in paths {
        let unit = ContentUnit::inspect(path, group).await;
        if filter.admits(&unit) {
            debug!("Including {} {}", group, unit.path.display());
            result.included.push(unit);
        } else {
            match unit.lines {
                Some(lines) => warn!(
                    "Skipping {} {} ({} lines, minimum is {})",
                    group,
                    unit.path.display().to_string().yellow(),
                    lines,
                    filter.min_lines
                ),
                None => warn!(
                    "Skipping unreadable {} {}",
                    group,
                    unit.path.display().to_string().yellow()
                ),
            }
            result.skipped.push(unit);
        }
    }

    result
}

/// The converter input list for one run: title, then chapters, then appendices.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub title: PathBuf,
    pub chapters: Vec<ContentUnit>,
    pub appendices: Vec<ContentUnit>,
    pub skipped: Vec<ContentUnit>,
}

impl Manifest {
    pub async fn assemble(layout: &ProjectLayout, filter: &ContentFilter) -> Result<Self> {
        if !fs::try_exists(&layout.title).await.unwrap_or(false) {
            return Err(anyhow!("Title file '{}' does not exist", layout.title.display()));
        }

        let chapters = scan(&layout.chapters, ContentGroup::Chapter, filter).await;
        let appendices = scan(&layout.appendices, ContentGroup::Appendix, filter).await;

        let mut skipped = chapters.skipped;
        skipped.extend(appendices.skipped);

        let manifest = Self {
            title: layout.title.clone(),
            chapters: chapters.included,
            appendices: appendices.included,
            skipped,
        };

        info!(
            "Assembled {} inputs ({} chapters, {} appendices, {} skipped)",
            manifest.input_count(),
            manifest.chapters.len(),
            manifest.appendices.len(),
            manifest.skipped.len()
        );

        Ok(manifest)
    }

    pub fn inputs(&self) -> Vec<&Path> {
        std::iter::once(self.title.as_path())
            .chain(self.chapters.iter().map(|u| u.path.as_path()))
            .chain(self.appendices.iter().map(|u| u.path.as_path()))
            .collect()
    }

    pub fn input_count(&self) -> usize {
        1 + self.chapters.len() + self.appendices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs as stdfs;

    fn write_lines(path: &Path, lines: usize) {
        if let Some(parent) = path.parent() {
            stdfs::create_dir_all(parent).unwrap();
        }
        stdfs::write(path, "line\n".repeat(lines)).unwrap();
    }

    #[test]
    fn counts_trailing_unterminated_line() {
        assert_eq!(count_lines(b""), 0);
        assert_eq!(count_lines(b"a\nb\n"), 2);
        assert_eq!(count_lines(b"a\nb"), 2);
        assert_eq!(count_lines(b"\n\n\n"), 3);
    }

    #[test]
    fn missing_root_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(discover(&dir.path().join("absent")).count(), 0);
    }

    #[test]
    fn discovery_is_recursive_sorted_and_markdown_only() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_lines(&root.join("02-b.md"), 1);
        write_lines(&root.join("01-a/part2.md"), 1);
        write_lines(&root.join("01-a/part1.MD"), 1);
        write_lines(&root.join("01-a-extra.md"), 1);
        write_lines(&root.join("notes.txt"), 1);

        let found: Vec<PathBuf> = discover(root).collect();
        let mut sorted = found.clone();
        sorted.sort();

        assert_eq!(found, sorted);
        assert_eq!(
            found,
            vec![
                root.join("01-a/part1.MD"),
                root.join("01-a/part2.md"),
                root.join("01-a-extra.md"),
                root.join("02-b.md"),
            ]
        );
    }

    #[test]
    fn discovery_is_stable_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.md", "a.md", "b/z.md", "b/y.md"] {
            write_lines(&dir.path().join(name), 3);
        }
        let first: Vec<_> = discover(dir.path()).collect();
        let second: Vec<_> = discover(dir.path()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn unreadable_units_are_never_admitted() {
        let filter = ContentFilter::new(0);
        let unit = ContentUnit {
            path: PathBuf::from("gone.md"),
            group: ContentGroup::Chapter,
            lines: None,
        };
        assert!(!filter.admits(&unit));
    }

    #[tokio::test]
    async fn scan_splits_on_threshold() {
        let dir = tempfile::tempdir().unwrap();
        write_lines(&dir.path().join("a.md"), 19);
        write_lines(&dir.path().join("b.md"), 20);
        write_lines(&dir.path().join("c.md"), 200);

        let scan = scan(dir.path(), ContentGroup::Chapter, &ContentFilter::new(20)).await;
        let included: Vec<_> = scan.included.iter().map(|u| u.path.clone()).collect();
        assert_eq!(included, vec![dir.path().join("b.md"), dir.path().join("c.md")]);
        assert_eq!(scan.skipped.len(), 1);
        assert_eq!(scan.skipped[0].lines, Some(19));
    }

    #[tokio::test]
    async fn assemble_requires_title() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::resolve(dir.path(), &crate::config::BookConfig::default());
        assert!(Manifest::assemble(&layout, &ContentFilter::new(20)).await.is_err());
    }

    proptest! {
        #[test]
        fn filter_keeps_exactly_the_units_at_or_above_threshold(
            counts in proptest::collection::vec(proptest::option::of(0usize..60), 0..30),
            min_lines in 0usize..40,
        ) {
            let filter = ContentFilter::new(min_lines);
            let units: Vec<ContentUnit> = counts
                .iter()
                .enumerate()
                .map(|(i, lines)| ContentUnit {
                    path: PathBuf::from(format!("{i:03}.md")),
                    group: ContentGroup::Chapter,
                    lines: *lines,
                })
                .collect();

            let kept: Vec<_> = units.iter().filter(|u| filter.admits(u)).collect();
            let expected = counts.iter().filter(|c| c.is_some_and(|n| n >= min_lines)).count();

            prop_assert_eq!(kept.len(), expected);
            prop_assert!(kept.iter().all(|u| u.lines.unwrap() >= min_lines));
        }
    }
}
