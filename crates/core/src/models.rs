use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity and size of one processed document. Logged, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFingerprint {
    pub source: String,
    pub checksum: String,
    pub size_bytes: u64,
    pub page_count: usize,
    pub fetched_at: DateTime<Utc>,
}

/// A word-aligned span of document text. `index` is the chunk's position in
/// its sequence and the identity the selectors rank by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub word_count: usize,
}

impl Chunk {
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.text.split_whitespace()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RelevanceScore {
    /// Number of distinct question words found in the chunk. Higher is better.
    Overlap(usize),
    /// Squared euclidean distance between embeddings. Lower is better.
    Distance(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankedChunk {
    pub position: usize,
    pub score: RelevanceScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionStrategy {
    #[default]
    Keyword,
    Vector,
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyword => f.write_str("keyword"),
            Self::Vector => f.write_str("vector"),
        }
    }
}

impl FromStr for SelectionStrategy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(Self::Keyword),
            "vector" | "embedding" => Ok(Self::Vector),
            other => Err(ConfigError::Invalid {
                key: "SELECTION_STRATEGY",
                reason: format!("unknown strategy '{other}', expected keyword or vector"),
            }),
        }
    }
}

/// One answered question. `chunk_positions` are the chunks that made it into
/// the context, best first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question: String,
    pub answer: String,
    pub justification: String,
    pub chunk_positions: Vec<usize>,
    pub synthesis_failed: bool,
}
