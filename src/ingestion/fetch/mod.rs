#[cfg(test)]
mod tests;

use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::DocumentsConfig;
use crate::{RagError, Result};

/// Downloads source files for document ingestion
#[derive(Debug, Clone)]
pub struct BlobFetcher {
    agent: ureq::Agent,
    max_bytes: u64,
}

/// Downloaded bytes held in a temporary file.
///
/// The file is removed when this value is dropped, whichever way ingestion ends.
#[derive(Debug)]
pub struct DownloadedBlob {
    file: NamedTempFile,
    len: u64,
}

impl DownloadedBlob {
    #[inline]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Delete the temporary file now, reporting any failure
    #[inline]
    pub fn close(self) -> Result<()> {
        self.file.close()?;
        Ok(())
    }
}

impl BlobFetcher {
    #[inline]
    pub fn new(config: &DocumentsConfig) -> Self {
        Self::with_limits(
            Duration::from_secs(config.fetch_timeout_seconds),
            config.max_bytes,
        )
    }

    #[inline]
    pub fn with_limits(timeout: Duration, max_bytes: u64) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self { agent, max_bytes }
    }

    /// GET `url` into a temporary file whose name ends with `suffix`
    #[inline]
    pub async fn fetch(&self, url: &str, suffix: &str) -> Result<DownloadedBlob> {
        let fetcher = self.clone();
        let url = url.to_string();
        let suffix = suffix.to_string();
        tokio::task::spawn_blocking(move || fetcher.download(&url, &suffix))
            .await
            .map_err(|e| RagError::UpstreamUnavailable(format!("Download task failed: {}", e)))?
    }

    /// Blocking variant of [`BlobFetcher::fetch`]
    #[inline]
    pub fn download(&self, url: &str, suffix: &str) -> Result<DownloadedBlob> {
        debug!("Downloading {}", url);

        let bytes = self
            .agent
            .get(url)
            .call()
            .and_then(|mut resp| {
                resp.body_mut()
                    .with_config()
                    .limit(self.max_bytes)
                    .read_to_vec()
            })
            .map_err(|e| self.classify(url, e))?;

        let mut file = tempfile::Builder::new()
            .prefix("chat-rag-")
            .suffix(suffix)
            .tempfile()?;
        file.write_all(&bytes)?;
        file.flush()?;

        info!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(DownloadedBlob {
            file,
            len: bytes.len() as u64,
        })
    }

    fn classify(&self, url: &str, error: ureq::Error) -> RagError {
        match error {
            ureq::Error::StatusCode(404) => {
                RagError::NotFound(format!("Source file not found: {}", url))
            }
            ureq::Error::StatusCode(status) if (400..500).contains(&status) => {
                RagError::Validation(format!("Source file request rejected: HTTP {}", status))
            }
            ureq::Error::StatusCode(status) => {
                warn!("Source server error {} for {}", status, url);
                RagError::UpstreamUnavailable(format!("Source file server error: HTTP {}", status))
            }
            ureq::Error::BodyExceedsLimit(_) => RagError::Validation(format!(
                "Source file exceeds the {} byte limit",
                self.max_bytes
            )),
            ureq::Error::BadUri(reason) => {
                RagError::Validation(format!("Invalid source URL: {}", reason))
            }
            other => {
                warn!("Download of {} failed: {}", url, other);
                RagError::UpstreamUnavailable(format!("Failed to download source file: {}", other))
            }
        }
    }
}

/// File extension of `file_name` including the leading dot, or an empty string
#[inline]
pub fn file_suffix(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}
