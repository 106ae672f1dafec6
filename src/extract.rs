//! Document format detection and text extraction.
//!
//! Ingestion recognizes a fixed set of document formats by file extension.
//! The built-in extractor handles the text-based ones; the trait seam lets
//! deployments plug in converters for the binary office formats without
//! touching the indexing pipeline.

use std::path::Path;

use crate::error::RagError;

/// Document formats accepted by ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocFormat {
    Docx,
    Pptx,
    Pdf,
    Txt,
    Xlsx,
    Csv,
    Html,
    Md,
    Rtf,
    Odt,
}

impl DocFormat {
    /// Map a file path to its format by extension (case-insensitive).
    /// Unrecognized extensions return `None` and the file is skipped.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "docx" => Some(Self::Docx),
            "pptx" => Some(Self::Pptx),
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Txt),
            "xlsx" => Some(Self::Xlsx),
            "csv" => Some(Self::Csv),
            "html" | "htm" => Some(Self::Html),
            "md" => Some(Self::Md),
            "rtf" => Some(Self::Rtf),
            "odt" => Some(Self::Odt),
            _ => None,
        }
    }
}

pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path, format: DocFormat) -> Result<String, RagError>;
}

/// Extractor for the text-based formats. Binary office formats report an
/// unavailable backend so ingestion can skip the file with a warning.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path, format: DocFormat) -> Result<String, RagError> {
        match format {
            DocFormat::Txt | DocFormat::Md | DocFormat::Csv => read_file(path),
            DocFormat::Html => Ok(strip_html(&read_file(path)?)),
            DocFormat::Docx
            | DocFormat::Pptx
            | DocFormat::Pdf
            | DocFormat::Xlsx
            | DocFormat::Rtf
            | DocFormat::Odt => Err(RagError::BackendUnavailable(format!(
                "no extractor available for {format:?} files"
            ))),
        }
    }
}

fn read_file(path: &Path) -> Result<String, RagError> {
    std::fs::read_to_string(path).map_err(|e| {
        RagError::BackendUnavailable(format!("failed to read {}: {e}", path.display()))
    })
}

/// Reduce an HTML document to its visible text: drop script and style
/// blocks, strip tags, decode the common entities, collapse whitespace.
fn strip_html(html: &str) -> String {
    let without_blocks = remove_element(&remove_element(html, "script"), "style");

    let mut text = String::with_capacity(without_blocks.len());
    let mut in_tag = false;
    for c in without_blocks.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove `<name ...>...</name>` blocks, case-insensitively.
fn remove_element(html: &str, name: &str) -> String {
    // ASCII lowering keeps byte offsets aligned with the original
    let lower = html.to_ascii_lowercase();
    let open = format!("<{name}");
    let close = format!("</{name}>");

    let mut out = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(start) = lower[pos..].find(&open) {
        let start = pos + start;
        out.push_str(&html[pos..start]);
        match lower[start..].find(&close) {
            Some(end) => pos = start + end + close.len(),
            None => {
                // Unclosed block: drop the rest of the document
                return out;
            }
        }
    }
    out.push_str(&html[pos..]);
    out
}
