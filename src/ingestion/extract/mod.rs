
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{RagError, Result};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const TEXT_MIME_TYPES: &[&str] = &[
    "application/json",
    "application/xml",
    "application/yaml",
    "application/x-yaml",
    "application/javascript",
    "application/x-ndjson",
    "application/csv",
    "application/markdown",
];

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "text", "md", "markdown", "csv", "tsv", "json", "yaml", "yml", "xml", "html", "htm",
    "log", "rst",
];

/// How the text of a downloaded file is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Text extracted page by page
    Pdf,
    /// Decoded as UTF-8 as a single source
    Text,
}

impl ContentKind {
    /// Choose an extractor from the declared MIME type, falling back to the file extension
    #[inline]
    pub fn detect(mime: &str, file_name: &str) -> Result<Self> {
        let mime = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if mime == "application/pdf" {
            return Ok(Self::Pdf);
        }
        if mime.starts_with("text/") || TEXT_MIME_TYPES.contains(&mime.as_str()) {
            return Ok(Self::Text);
        }

        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if extension == "pdf" {
            Ok(Self::Pdf)
        } else if TEXT_EXTENSIONS.contains(&extension.as_str()) {
            Ok(Self::Text)
        } else {
            Err(RagError::Validation(format!(
                "Unsupported file type '{}' for {}",
                mime, file_name
            )))
        }
    }
}

/// Read the text sources of a file, in order (one per PDF page, or one for text)
#[inline]
pub async fn extract_text(path: &Path, kind: ContentKind) -> Result<Vec<String>> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || extract_text_blocking(&path, kind))
        .await
        .map_err(|e| RagError::Validation(format!("Text extraction aborted: {}", e)))?
}

/// Blocking variant of [`extract_text`]
#[inline]
pub fn extract_text_blocking(path: &Path, kind: ContentKind) -> Result<Vec<String>> {
    let sources = match kind {
        ContentKind::Pdf => pdf_extract::extract_text_by_pages(path).map_err(|e| {
            RagError::Validation(format!("Failed to extract text from PDF: {}", e))
        })?,
        ContentKind::Text => vec![decode_text(&std::fs::read(path)?)?],
    };

    debug!(
        "Extracted {} source(s) from {}",
        sources.len(),
        path.display()
    );
    Ok(sources)
}

/// Strict UTF-8 decode with any byte order mark removed
#[inline]
pub fn decode_text(bytes: &[u8]) -> Result<String> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    String::from_utf8(bytes.to_vec())
        .map_err(|e| RagError::Validation(format!("File is not valid UTF-8 text: {}", e)))
}
