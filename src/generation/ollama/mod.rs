#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::RagError;
use crate::config::Config;
use crate::embeddings::ollama::OllamaClient;
use crate::generation::Generator;

/// Chat completion against Ollama's `/api/chat`, non-streaming
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: OllamaClient,
    model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::with_client(
            OllamaClient::new(config)?,
            config.generation.model.clone(),
            config.generation.temperature,
        ))
    }

    #[inline]
    pub fn with_client(client: OllamaClient, model: String, temperature: f32) -> Self {
        Self {
            client,
            model,
            temperature,
        }
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Blocking chat call
    #[inline]
    pub fn chat(&self, system: &str, prompt: &str) -> Result<String> {
        debug!(
            "Requesting completion from {} (prompt length: {})",
            self.model,
            prompt.len()
        );

        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        let response_text = self
            .client
            .post_json("/api/chat", &request)
            .context("Failed to generate chat completion")?;

        let response: ChatResponse =
            serde_json::from_str(&response_text).context("Failed to parse chat response")?;

        let answer = response.message.content.trim().to_string();
        if answer.is_empty() {
            return Err(anyhow::anyhow!("Model {} returned an empty answer", self.model));
        }

        Ok(answer)
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, system: &str, prompt: &str) -> crate::Result<String> {
        let generator = self.clone();
        let system = system.to_string();
        let prompt = prompt.to_string();

        tokio::task::spawn_blocking(move || generator.chat(&system, &prompt))
            .await
            .map_err(|e| RagError::UpstreamUnavailable(format!("Generation task failed: {}", e)))?
            .map_err(|e| RagError::UpstreamUnavailable(format!("{:#}", e)))
    }
}
