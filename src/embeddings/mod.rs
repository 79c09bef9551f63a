// Embeddings module
// Text chunking plus the embedding gateway and its providers

pub mod chunking;
pub mod hashing;
pub mod ollama;
pub mod provider;

pub use chunking::{ChunkingConfig, TextChunk, chunk_text, join_sources, reassemble};
pub use hashing::HashingEmbedder;
pub use ollama::OllamaClient;
pub use provider::{Embedder, create_embedder};
