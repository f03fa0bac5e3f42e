use crate::config::{RetrievalOptions, DEFAULT_CHUNK_WORDS};
use crate::error::DocumentError;
use crate::models::Chunk;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_words: DEFAULT_CHUNK_WORDS,
        }
    }
}

impl From<&RetrievalOptions> for ChunkingConfig {
    fn from(value: &RetrievalOptions) -> Self {
        Self {
            max_words: value.chunk_words,
        }
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits `text` into chunks of exactly `max_words` words, the last one
/// possibly shorter. Whitespace-only text yields no chunks.
pub fn chunk_words(text: &str, max_words: usize) -> Result<Vec<Chunk>, DocumentError> {
    if max_words == 0 {
        return Err(DocumentError::InvalidChunkConfig(
            "max_words must be greater than zero".to_string(),
        ));
    }

    let mut chunks = Vec::new();
    let mut buffer: Vec<&str> = Vec::with_capacity(max_words);

    for word in text.split_whitespace() {
        buffer.push(word);
        if buffer.len() == max_words {
            chunks.push(seal(chunks.len(), &buffer));
            buffer.clear();
        }
    }

    if !buffer.is_empty() {
        chunks.push(seal(chunks.len(), &buffer));
    }

    tracing::debug!(chunk_count = chunks.len(), max_words, "text split into chunks");
    Ok(chunks)
}

pub fn build_chunks(text: &str, config: ChunkingConfig) -> Result<Vec<Chunk>, DocumentError> {
    chunk_words(text, config.max_words)
}

fn seal(index: usize, words: &[&str]) -> Chunk {
    Chunk {
        index,
        text: words.join(" "),
        word_count: words.len(),
    }
}

/// Writes the chunk texts as a pretty-printed JSON array.
pub fn save_chunks_json(path: &Path, chunks: &[Chunk]) -> Result<(), DocumentError> {
    let texts = chunks.iter().map(|chunk| chunk.text.as_str()).collect::<Vec<_>>();
    let rendered = serde_json::to_string_pretty(&texts)
        .map_err(|error| DocumentError::Io(std::io::Error::other(error)))?;
    std::fs::write(path, rendered)?;
    Ok(())
}
