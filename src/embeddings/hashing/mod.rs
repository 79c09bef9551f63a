
use async_trait::async_trait;
use std::collections::HashMap;

use crate::Result;
use crate::embeddings::provider::Embedder;

const MODEL_NAME: &str = "hashing-trigram";

/// Deterministic embedder that needs no external service.
///
/// Words and their character trigrams are hashed into buckets and the result is
/// normalised to unit length, so texts sharing vocabulary land close together.
/// Suitable for development and tests, not for semantic quality.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        let lower = text.to_lowercase();

        let mut frequencies: HashMap<&str, u32> = HashMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            *frequencies.entry(word).or_insert(0) += 1;
        }

        for (word, count) in frequencies {
            let weight = count as f32;
            vector[self.bucket(word.as_bytes(), 31)] += weight;

            let padded: Vec<char> = format!(" {} ", word).chars().collect();
            for trigram in padded.windows(3) {
                let trigram: String = trigram.iter().collect();
                vector[self.bucket(trigram.as_bytes(), 37)] += weight.sqrt();
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        vector
    }

    fn bucket(&self, bytes: &[u8], multiplier: u64) -> usize {
        let hash = bytes.iter().fold(0_u64, |acc, &b| {
            acc.wrapping_mul(multiplier).wrapping_add(u64::from(b))
        });
        (hash % self.dimension as u64) as usize
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}
