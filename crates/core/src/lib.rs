pub mod chunking;
pub mod config;
pub mod context;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod fetch;
pub mod models;
pub mod orchestrator;
pub mod selection;
pub mod synthesis;
pub mod traits;
pub mod vector_index;

pub use chunking::{build_chunks, chunk_words, normalize_whitespace, save_chunks_json, ChunkingConfig};
pub use config::{FetchConfig, OcrEndpointConfig, RetrievalOptions, SynthesizerConfig};
pub use context::{assemble_context, AssembledContext};
pub use embeddings::{CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{ConfigError, DocumentError, ErrorKind, QueryError, SynthesisError};
pub use extractor::{extract_pages, ExtractedText, PageText, PdfTextExtractor};
pub use fetch::{DocumentSource, HttpFetcher};
pub use models::{
    AnswerRecord, Chunk, DocumentFingerprint, RankedChunk, RelevanceScore, SelectionStrategy,
};
pub use orchestrator::{
    prepare_document, InferenceContext, PreparedDocument, QueryOrchestrator,
    SYNTHESIS_ERROR_PREFIX,
};
pub use selection::{build_selector, select, select_positions, KeywordSelector, VectorSelector};
pub use synthesis::ChatCompletionSynthesizer;
pub use traits::{AnswerSynthesizer, ChunkSelector, DocumentFetcher, TextExtractor};
pub use vector_index::FlatVectorIndex;
