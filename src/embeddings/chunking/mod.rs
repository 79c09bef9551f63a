
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Separators tried when looking for a place to end a chunk, most preferred first
const BREAK_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " "];

/// Separator placed between source texts (PDF pages, files) before chunking
pub const SOURCE_SEPARATOR: &str = "\n\n";

/// A slice of document text ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// The chunk text, including any overlap with the previous chunk
    pub content: String,
    /// Zero-based position of this chunk within the document
    pub chunk_index: usize,
    /// Offset of the first character in the source text, in characters
    pub char_start: usize,
    /// Offset one past the last character in the source text, in characters
    pub char_end: usize,
    /// Number of leading characters shared with the previous chunk
    pub overlap: usize,
}

impl TextChunk {
    /// The part of this chunk not already covered by the previous chunk
    #[inline]
    pub fn novel_text(&self) -> &str {
        self.content
            .char_indices()
            .nth(self.overlap)
            .map_or("", |(byte_offset, _)| &self.content[byte_offset..])
    }

    #[inline]
    pub fn char_len(&self) -> usize {
        self.char_end - self.char_start
    }
}

/// Configuration for text chunking. Sizes are measured in characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length
    pub chunk_size: usize,
    /// Upper bound on characters repeated from the end of the previous chunk
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Join several source texts into one document body
#[inline]
pub fn join_sources<S: AsRef<str>>(sources: &[S]) -> String {
    let mut joined = String::new();
    for (i, source) in sources.iter().enumerate() {
        if i > 0 {
            joined.push_str(SOURCE_SEPARATOR);
        }
        joined.push_str(source.as_ref());
    }
    joined
}

/// Split text into overlapping chunks of at most `chunk_size` characters.
///
/// Each chunk ends at the latest paragraph break, line break, sentence end or
/// whitespace that fits, falling back to a hard cut. The following chunk starts
/// no more than `chunk_overlap` characters before that end, moved forward to the
/// start of a word when one is available. Text without any non-whitespace
/// content produces no chunks.
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<TextChunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let byte_offsets: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();

    let total = chars.len();
    let chunk_size = config.chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut overlap = 0;

    loop {
        let hard_end = (start + chunk_size).min(total);
        let end = if hard_end == total {
            total
        } else {
            find_break(&chars, start + config.chunk_overlap + 1, hard_end).unwrap_or(hard_end)
        };

        chunks.push(TextChunk {
            content: text[byte_offsets[start]..byte_offsets[end]].to_string(),
            chunk_index: chunks.len(),
            char_start: start,
            char_end: end,
            overlap,
        });

        if end == total {
            break;
        }

        let next_start = next_chunk_start(&chars, start, end, config.chunk_overlap);
        overlap = end - next_start;
        start = next_start;
    }

    debug!(
        "Split {} characters into {} chunks (size {}, overlap {})",
        total,
        chunks.len(),
        chunk_size,
        config.chunk_overlap
    );

    chunks
}

/// Rebuild the source text from its chunks by concatenating their novel spans
#[inline]
pub fn reassemble(chunks: &[TextChunk]) -> String {
    chunks.iter().map(TextChunk::novel_text).collect()
}

/// Latest position in `floor..=hard_end` directly after a separator, by separator preference
fn find_break(chars: &[char], floor: usize, hard_end: usize) -> Option<usize> {
    BREAK_SEPARATORS.iter().find_map(|separator| {
        let pattern: Vec<char> = separator.chars().collect();
        let lowest = floor.max(pattern.len());
        (lowest..=hard_end)
            .rev()
            .find(|&position| chars[position - pattern.len()..position] == pattern[..])
    })
}

fn next_chunk_start(chars: &[char], start: usize, end: usize, overlap: usize) -> usize {
    let candidate = end.saturating_sub(overlap).max(start + 1);
    (candidate..end)
        .find(|&position| {
            position > 0 && chars[position - 1].is_whitespace() && !chars[position].is_whitespace()
        })
        .unwrap_or(candidate)
}
