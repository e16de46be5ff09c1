//! Turning uploaded files into text.
//!
//! The upload collaborator persists raw bytes to a stable path; this module
//! finds those files and extracts their text. UTF-8 text and (with the `pdf`
//! feature) PDF are understood natively. Other formats plug in through
//! [`TextExtractor`].

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::document::Document;
use crate::error::{RagError, Result};

/// File extensions [`discover_documents`] picks up.
#[cfg(feature = "pdf")]
pub const DOCUMENT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "pdf"];

/// File extensions [`discover_documents`] picks up.
#[cfg(not(feature = "pdf"))]
pub const DOCUMENT_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];

const PDF_MAGIC: &[u8] = b"%PDF-";

/// The header may follow leading junk, but only within the first 1024 bytes.
fn has_pdf_header(bytes: &[u8]) -> bool {
    let head = bytes.get(..1024).unwrap_or(bytes);
    head.windows(PDF_MAGIC.len()).any(|window| window == PDF_MAGIC)
}

fn is_pdf(document: &Document) -> bool {
    has_pdf_header(&document.bytes)
        || Path::new(&document.source_ref)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn ingestion_error(document: &Document, message: impl Into<String>) -> RagError {
    RagError::IngestionError { source_ref: document.source_ref.clone(), message: message.into() }
}

/// Extracts plain text from a document's raw bytes.
pub trait TextExtractor: Send + Sync {
    /// # Errors
    ///
    /// Returns [`RagError::IngestionError`] naming the document when it holds
    /// no extractable text.
    fn extract(&self, document: &Document) -> Result<String>;
}

/// Decodes UTF-8 text, rejecting binary, PDF and empty input.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, document: &Document) -> Result<String> {
        // NUL bytes never occur in text files; treat them as a binary upload.
        if document.bytes.contains(&0) {
            return Err(ingestion_error(document, "document is not a text file"));
        }
        if has_pdf_header(&document.bytes) {
            return Err(ingestion_error(document, "document is a PDF, not plain text"));
        }
        let text = std::str::from_utf8(&document.bytes)
            .map_err(|e| ingestion_error(document, format!("document is not valid UTF-8: {e}")))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        if text.trim().is_empty() {
            return Err(ingestion_error(document, "document contains no text"));
        }
        Ok(text.replace("\r\n", "\n"))
    }
}

/// Extracts the text layer of a PDF with `pdf-extract`.
///
/// Scanned PDFs without a text layer fail like empty documents.
#[cfg(feature = "pdf")]
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

#[cfg(feature = "pdf")]
impl TextExtractor for PdfExtractor {
    fn extract(&self, document: &Document) -> Result<String> {
        if !has_pdf_header(&document.bytes) {
            return Err(ingestion_error(document, "document has no PDF header"));
        }
        // pdf-extract panics on some malformed files instead of erroring.
        let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&document.bytes))
            .map_err(|_| ingestion_error(document, "PDF could not be parsed"))?
            .map_err(|e| ingestion_error(document, format!("PDF could not be parsed: {e}")))?;
        if text.trim().is_empty() {
            return Err(ingestion_error(document, "PDF has no extractable text"));
        }
        Ok(text.replace("\r\n", "\n"))
    }
}

/// Routes PDFs (by header or `.pdf` name) to [`PdfExtractor`] and everything
/// else to [`PlainTextExtractor`]. The pipeline's default extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoExtractor;

impl TextExtractor for AutoExtractor {
    fn extract(&self, document: &Document) -> Result<String> {
        if is_pdf(document) {
            return extract_pdf(document);
        }
        PlainTextExtractor.extract(document)
    }
}

#[cfg(feature = "pdf")]
fn extract_pdf(document: &Document) -> Result<String> {
    PdfExtractor.extract(document)
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf(document: &Document) -> Result<String> {
    Err(ingestion_error(document, "PDF support is not enabled (feature `pdf`)"))
}

/// Collect ingestible files under `root`, sorted by path.
///
/// A `root` that is itself a file is returned as-is regardless of extension,
/// so callers can name files explicitly.
///
/// # Errors
///
/// Returns [`RagError::IngestionError`] if `root` does not exist.
pub fn discover_documents(root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.is_dir() {
        return Err(RagError::IngestionError {
            source_ref: root.display().to_string(),
            message: "path does not exist".to_string(),
        });
    }

    let mut files = WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        })
        .map(|entry| entry.into_path())
        .collect::<Vec<_>>();

    files.sort();
    Ok(files)
}
