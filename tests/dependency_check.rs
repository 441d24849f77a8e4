#![cfg(unix)]

mod common;

use std::fs;
use std::path::Path;

use bookbuild::deps::CheckStatus;
use bookbuild::{BookConfig, Orchestrator};
use common::{fake_converter, sample_book, write_script};

/// A project where every check passes: fake pandoc 3, fake xelatex and a
/// template file inside the temp dir.
fn healthy_config(root: &Path) -> BookConfig {
    let converter = fake_converter(root, &root.join("calls.log"), None);
    let engine = root.join("fake-xelatex");
    write_script(&engine, "echo 'XeTeX 3.14'\n");
    let template = root.join("eisvogel.latex");
    fs::write(&template, "% template\n").unwrap();

    BookConfig {
        converter: converter.display().to_string(),
        pdf_engine: engine.display().to_string(),
        template_path: Some(template),
        ..BookConfig::default()
    }
}

fn status_of(report: &bookbuild::DependencyReport, name: &str) -> CheckStatus {
    report
        .checks
        .iter()
        .find(|c| c.name == name)
        .unwrap_or_else(|| panic!("no check named {name}"))
        .status
}

#[tokio::test]
async fn healthy_project_passes() {
    let dir = tempfile::tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    sample_book(&root);

    let report = Orchestrator::new(&root, healthy_config(&root)).check().await;
    assert!(report.passed(), "{report:?}");
    assert_eq!(status_of(&report, "output directory"), CheckStatus::Info);
}

#[tokio::test]
async fn missing_template_alone_fails_the_check() {
    let dir = tempfile::tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    sample_book(&root);
    let config = healthy_config(&root);
    fs::remove_file(root.join("eisvogel.latex")).unwrap();

    let report = Orchestrator::new(&root, config).check().await;
    assert!(!report.passed());
    let failed: Vec<_> = report.failures().map(|c| c.name.as_str()).collect();
    assert_eq!(failed, vec!["template"]);
}

#[tokio::test]
async fn old_converter_fails_version_check() {
    let dir = tempfile::tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    sample_book(&root);
    let mut config = healthy_config(&root);
    let old = root.join("old-pandoc");
    write_script(&old, "echo 'pandoc 2.19.2'\n");
    config.converter = old.display().to_string();

    let report = Orchestrator::new(&root, config).check().await;
    assert_eq!(status_of(&report, "converter"), CheckStatus::Fail);
    assert_eq!(report.failures().count(), 1);
}

#[tokio::test]
async fn stub_only_appendices_fail_after_filtering() {
    let dir = tempfile::tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    sample_book(&root);
    let config = BookConfig {
        min_lines: 35,
        ..healthy_config(&root)
    };

    let report = Orchestrator::new(&root, config).check().await;
    assert_eq!(status_of(&report, "chapters"), CheckStatus::Pass);
    assert_eq!(status_of(&report, "appendices"), CheckStatus::Fail);
    assert!(!report.passed());
}

#[tokio::test]
async fn every_check_runs_even_when_all_fail() {
    let dir = tempfile::tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    let config = BookConfig {
        converter: root.join("missing-pandoc").display().to_string(),
        pdf_engine: root.join("missing-xelatex").display().to_string(),
        template_path: Some(root.join("missing.latex")),
        ..BookConfig::default()
    };

    let report = Orchestrator::new(&root, config).check().await;
    assert_eq!(report.checks.len(), 8);
    assert_eq!(report.failures().count(), 7);
}
