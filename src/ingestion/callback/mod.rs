#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);
const CALLBACK_TOKEN_HEADER: &str = "x-callback-token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentStatus {
    Deleted,
    Failed,
}

/// Body posted to a caller-supplied callback URL when a document task finishes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentCallback {
    pub document_id: String,
    pub status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Where and how to report a finished document task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackTarget {
    pub url: String,
    pub token: String,
}

/// Fire-and-forget notifier; delivery failures are logged and never fail the task
#[derive(Debug, Clone)]
pub struct CallbackClient {
    agent: ureq::Agent,
}

impl Default for CallbackClient {
    fn default() -> Self {
        Self::with_timeout(CALLBACK_TIMEOUT)
    }
}

impl CallbackClient {
    #[inline]
    pub fn with_timeout(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self { agent }
    }

    /// POST `body` to the target, returning any delivery error
    #[inline]
    pub fn post(&self, target: &CallbackTarget, body: &DocumentCallback) -> Result<()> {
        let json = serde_json::to_string(body).context("Failed to serialize callback body")?;
        self.agent
            .post(&target.url)
            .header("Content-Type", "application/json")
            .header(CALLBACK_TOKEN_HEADER, &target.token)
            .send(&json)
            .with_context(|| format!("Callback to {} failed", target.url))?;
        Ok(())
    }

    /// Deliver the callback in the background of the current task, logging failures
    #[inline]
    pub async fn notify(&self, target: &CallbackTarget, body: DocumentCallback) {
        let client = self.clone();
        let target = target.clone();
        let document_id = body.document_id.clone();
        let outcome = tokio::task::spawn_blocking(move || client.post(&target, &body)).await;

        match outcome {
            Ok(Ok(())) => debug!("Delivered callback for document {}", document_id),
            Ok(Err(e)) => warn!("{:#}", e),
            Err(e) => warn!("Callback task for document {} aborted: {}", document_id, e),
        }
    }
}
