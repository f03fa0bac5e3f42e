//! Per-question chunk selection.
//!
//! Two strategies share the [`ChunkSelector`] contract: keyword overlap,
//! which counts the distinct question words present in each chunk, and
//! vector similarity, which embeds every chunk once per document and answers
//! each question with a nearest-neighbour lookup.

use crate::embeddings::Embedder;
use crate::error::DocumentError;
use crate::models::{Chunk, RankedChunk, RelevanceScore, SelectionStrategy};
use crate::traits::ChunkSelector;
use crate::vector_index::FlatVectorIndex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

pub fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|word| word.to_lowercase())
        .collect()
}

/// Ranks `chunks` by keyword overlap with `question` and keeps the top `k`.
pub fn select_positions(question: &str, chunks: &[Chunk], k: usize) -> Vec<RankedChunk> {
    let sets = chunks.iter().map(|chunk| word_set(&chunk.text)).collect::<Vec<_>>();
    rank_by_overlap(&word_set(question), &sets, k)
}

/// Keyword selection returning the chunks themselves.
pub fn select<'a>(question: &str, chunks: &'a [Chunk], k: usize) -> Vec<&'a Chunk> {
    select_positions(question, chunks, k)
        .into_iter()
        .filter_map(|ranked| chunks.get(ranked.position))
        .collect()
}

fn rank_by_overlap(
    question: &HashSet<String>,
    chunk_sets: &[HashSet<String>],
    k: usize,
) -> Vec<RankedChunk> {
    let mut scored = chunk_sets
        .iter()
        .enumerate()
        .map(|(position, words)| (position, question.intersection(words).count()))
        .collect::<Vec<_>>();

    // stable sort keeps ascending position among equal scores
    scored.sort_by(|left, right| right.1.cmp(&left.1));

    scored
        .into_iter()
        .take(k)
        .map(|(position, overlap)| RankedChunk {
            position,
            score: RelevanceScore::Overlap(overlap),
        })
        .collect()
}

pub struct KeywordSelector {
    chunks: Vec<Chunk>,
    word_sets: Vec<HashSet<String>>,
}

impl KeywordSelector {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        let word_sets = chunks.iter().map(|chunk| word_set(&chunk.text)).collect();
        Self { chunks, word_sets }
    }
}

impl ChunkSelector for KeywordSelector {
    fn strategy(&self) -> SelectionStrategy {
        SelectionStrategy::Keyword
    }

    fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    fn score_and_rank(&self, question: &str, k: usize) -> Vec<RankedChunk> {
        rank_by_overlap(&word_set(question), &self.word_sets, k)
    }
}

pub struct VectorSelector {
    chunks: Vec<Chunk>,
    index: FlatVectorIndex,
    embedder: Arc<dyn Embedder>,
}

impl VectorSelector {
    /// Embeds every chunk and builds the index. Done once per document.
    pub fn new(chunks: Vec<Chunk>, embedder: Arc<dyn Embedder>) -> Result<Self, DocumentError> {
        // every later query vector must match the index width
        let embedded_width = embedder.embed("").len();
        if embedded_width != embedder.dimensions() {
            return Err(DocumentError::Index(format!(
                "{} reports {} dimensions but embeds {}",
                embedder.model_id(),
                embedder.dimensions(),
                embedded_width
            )));
        }

        let texts = chunks.iter().map(|chunk| chunk.text.as_str()).collect::<Vec<_>>();
        let vectors = embedder.embed_all(&texts);
        if vectors.len() != chunks.len() {
            return Err(DocumentError::Index(format!(
                "embedding count {} doesn't match chunk count {}",
                vectors.len(),
                chunks.len()
            )));
        }

        let index = FlatVectorIndex::build(embedder.dimensions(), vectors)?;
        Ok(Self {
            chunks,
            index,
            embedder,
        })
    }
}

impl ChunkSelector for VectorSelector {
    fn strategy(&self) -> SelectionStrategy {
        SelectionStrategy::Vector
    }

    fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    fn score_and_rank(&self, question: &str, k: usize) -> Vec<RankedChunk> {
        if self.index.is_empty() {
            return Vec::new();
        }

        let query = self.embedder.embed(question);
        match self.index.nearest(&query, k) {
            Ok(hits) => hits
                .into_iter()
                .map(|(position, distance)| RankedChunk {
                    position,
                    score: RelevanceScore::Distance(distance),
                })
                .collect(),
            Err(error) => {
                warn!(error = %error, model = self.embedder.model_id(), "vector lookup failed");
                Vec::new()
            }
        }
    }
}

/// Builds the selector for `strategy` over one document's chunks.
pub fn build_selector(
    strategy: SelectionStrategy,
    chunks: Vec<Chunk>,
    embedder: &Arc<dyn Embedder>,
) -> Result<Box<dyn ChunkSelector>, DocumentError> {
    match strategy {
        SelectionStrategy::Keyword => Ok(Box::new(KeywordSelector::new(chunks))),
        SelectionStrategy::Vector => Ok(Box::new(VectorSelector::new(
            chunks,
            Arc::clone(embedder),
        )?)),
    }
}
