//! Text extraction for uploaded documents.

#[cfg(test)]
mod tests;

use std::fs;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use tracing::debug;

use crate::embeddings::chunking::{ChunkingConfig, TextChunk, chunk_text};
use crate::{NotebookError, Result};

pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["pdf", "txt", "md", "markdown"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Text,
    Markdown,
}

impl std::fmt::Display for DocumentFormat {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            DocumentFormat::Pdf => write!(f, "PDF"),
            DocumentFormat::Text => write!(f, "Text"),
            DocumentFormat::Markdown => write!(f, "Markdown"),
        }
    }
}

impl DocumentFormat {
    /// Match the extension case-insensitively
    #[inline]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "pdf" => Ok(Self::Pdf),
            "txt" => Ok(Self::Text),
            "md" | "markdown" => Ok(Self::Markdown),
            "" => Err(NotebookError::UnsupportedFormat(format!(
                "'{}' has no file extension (supported: {})",
                path.display(),
                SUPPORTED_EXTENSIONS.join(", ")
            ))),
            other => Err(NotebookError::UnsupportedFormat(format!(
                ".{} (supported: {})",
                other,
                SUPPORTED_EXTENSIONS.join(", ")
            ))),
        }
    }
}

/// Extract plain text from a document on disk
#[inline]
pub fn extract_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let format = DocumentFormat::from_path(path)?;
    let bytes = fs::read(path)?;

    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    extract_text_from_bytes(format, &bytes, &name)
}

/// Extract plain text from document bytes. `name` is only used in error messages.
#[inline]
pub fn extract_text_from_bytes(format: DocumentFormat, bytes: &[u8], name: &str) -> Result<String> {
    let text = match format {
        DocumentFormat::Pdf => extract_pdf(bytes, name)?,
        DocumentFormat::Text | DocumentFormat::Markdown => {
            String::from_utf8_lossy(bytes).into_owned()
        }
    };

    debug!(
        "Extracted {} characters from {} file '{}'",
        text.chars().count(),
        format,
        name
    );
    Ok(text)
}

fn extract_pdf(bytes: &[u8], name: &str) -> Result<String> {
    let processing_error = |message: String| NotebookError::Processing {
        file: name.to_string(),
        message,
    };

    // The PDF parser panics on some malformed inputs
    match catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes))) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(processing_error(format!("PDF parse error: {e}"))),
        Err(_) => Err(processing_error("PDF parser crashed on this file".to_string())),
    }
}

/// Extract and chunk a document in one step
#[inline]
pub fn process_document<P: AsRef<Path>>(
    path: P,
    config: &ChunkingConfig,
) -> Result<Vec<TextChunk>> {
    let text = extract_text(path)?;
    Ok(chunk_text(&text, config)?)
}
