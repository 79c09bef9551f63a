// Text generation module
// Prompt selection by response mode and the generation capability seam


pub mod ollama;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::{RagError, Result};

pub use ollama::OllamaGenerator;

const CONVERSATIONAL_SYSTEM_PROMPT: &str = "Generate a response based on the user's previous messages.
Use the provided message history to understand their communication style and knowledge.
The response should be natural and contextually appropriate.";

const KNOWLEDGE_BASE_SYSTEM_PROMPT: &str = "Answer the question using only the provided knowledge base excerpts.
Be concise and structured: lead with a direct answer, then list the supporting points.
If the excerpts do not contain the answer, say that plainly instead of guessing.";

/// Produces an answer from system instructions and a rendered user prompt
#[async_trait]
pub trait Generator: Send + Sync + std::fmt::Debug {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Selects the prompt used to turn retrieved context into an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Reply in the voice of a peer, grounded in their message history
    Conversational,
    /// Concise structured summary over workspace documents
    KnowledgeBase,
}

/// One retrieved text handed to the generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextPassage {
    pub text: String,
    /// Where the text came from, e.g. a file name and chunk number
    pub source: Option<String>,
}

impl ResponseMode {
    #[inline]
    pub fn system_prompt(self) -> &'static str {
        match self {
            Self::Conversational => CONVERSATIONAL_SYSTEM_PROMPT,
            Self::KnowledgeBase => KNOWLEDGE_BASE_SYSTEM_PROMPT,
        }
    }

    #[inline]
    pub fn render_prompt(self, passages: &[ContextPassage], query: &str) -> String {
        match self {
            Self::Conversational => {
                let history: Vec<&str> = passages.iter().map(|p| p.text.as_str()).collect();
                format!(
                    "Previous messages:\n{}\n\nCurrent message to respond to: {}\n\nGenerate response:",
                    history.join("\n"),
                    query
                )
            }
            Self::KnowledgeBase => {
                let excerpts = if passages.is_empty() {
                    "(no matching excerpts)\n".to_string()
                } else {
                    passages
                        .iter()
                        .enumerate()
                        .map(|(i, passage)| match &passage.source {
                            Some(source) => {
                                format!("[{}] ({})\n{}\n\n", i + 1, source, passage.text)
                            }
                            None => format!("[{}]\n{}\n\n", i + 1, passage.text),
                        })
                        .collect::<Vec<_>>()
                        .concat()
                };
                format!(
                    "Knowledge base excerpts:\n{}\nQuestion: {}\n\nAnswer:",
                    excerpts, query
                )
            }
        }
    }
}

/// Build the generator described by the configuration
#[inline]
pub fn create_generator(config: &Config) -> Result<Arc<dyn Generator>> {
    let generator = OllamaGenerator::new(config)
        .map_err(|e| RagError::Config(format!("Invalid generation settings: {:#}", e)))?;
    Ok(Arc::new(generator))
}
