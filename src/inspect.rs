use anyhow::{anyhow, Result};
use lopdf::Document;
use scraper::{Html, Selector};
use serde::Serialize;
use std::path::Path;
use tokio::fs;
use tracing::debug;

use crate::builder::Format;

/// What could be learned from a freshly written artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

pub async fn inspect_artifact(format: Format, path: &Path) -> Result<ArtifactInfo> {
    match format {
        Format::Pdf => {
            let data = fs::read(path)
                .await
                .map_err(|e| anyhow!("Failed to read PDF file {}: {}", path.display(), e))?;
            let pages = pdf_page_count(&data)
                .map_err(|e| anyhow!("Failed to parse PDF file {}: {}", path.display(), e))?;
            debug!("{} has {} pages", path.display(), pages);
            Ok(ArtifactInfo {
                pages: Some(pages),
                ..Default::default()
            })
        }
        Format::Html => {
            let text = fs::read_to_string(path)
                .await
                .map_err(|e| anyhow!("Failed to read HTML file {}: {}", path.display(), e))?;
            Ok(ArtifactInfo {
                title: html_title(&text)?,
                ..Default::default()
            })
        }
        Format::Epub => Ok(ArtifactInfo::default()),
    }
}

pub fn pdf_page_count(data: &[u8]) -> Result<usize> {
    let document = Document::load_mem(data).map_err(|e| anyhow!("{}", e))?;
    Ok(document.get_pages().len())
}

pub fn html_title(text: &str) -> Result<Option<String>> {
    let document = Html::parse_document(text);
    let selector =
        Selector::parse("head > title").map_err(|e| anyhow!("Invalid selector: {:?}", e))?;

    Ok(document
        .select(&selector)
        .next()
        .map(|title| title.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_title_is_trimmed() {
        let html = "<!DOCTYPE html><html><head><title>\n  FreeBSD Device Drivers </title></head><body></body></html>";
        assert_eq!(
            html_title(html).unwrap().as_deref(),
            Some("FreeBSD Device Drivers")
        );
    }

    #[test]
    fn html_without_title_yields_none() {
        assert_eq!(html_title("<html><body><h1>x</h1></body></html>").unwrap(), None);
        assert_eq!(html_title("<html><head><title>  </title></head></html>").unwrap(), None);
    }

    #[test]
    fn garbage_is_not_a_pdf() {
        assert!(pdf_page_count(b"artifact").is_err());
    }

    #[tokio::test]
    async fn epub_is_not_inspected() {
        let info = inspect_artifact(Format::Epub, Path::new("/nonexistent.epub"))
            .await
            .unwrap();
        assert_eq!(info, ArtifactInfo::default());
    }
}
