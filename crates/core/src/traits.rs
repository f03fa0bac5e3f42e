use crate::error::{DocumentError, SynthesisError};
use crate::extractor::ExtractedText;
use crate::fetch::DocumentSource;
use crate::models::{Chunk, RankedChunk, SelectionStrategy};
use async_trait::async_trait;

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, source: &DocumentSource) -> Result<Vec<u8>, DocumentError>;
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Returns the text of every page, joined with newlines. Pages without
    /// text are kept in the count but contribute nothing.
    async fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, DocumentError>;
}

#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    async fn synthesize(&self, question: &str, context: &str) -> Result<String, SynthesisError>;
}

/// Ranks the chunks of one document against a question. Built once per
/// document and queried once per question.
pub trait ChunkSelector: Send + Sync {
    fn strategy(&self) -> SelectionStrategy;

    fn chunks(&self) -> &[Chunk];

    /// Returns at most `k` chunks, best first. Never fails on an empty corpus.
    fn score_and_rank(&self, question: &str, k: usize) -> Vec<RankedChunk>;

    fn select(&self, question: &str, k: usize) -> Vec<&Chunk> {
        let chunks = self.chunks();
        self.score_and_rank(question, k)
            .into_iter()
            .filter_map(|ranked| chunks.get(ranked.position))
            .collect()
    }
}
