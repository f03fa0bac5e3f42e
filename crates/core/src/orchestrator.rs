use crate::chunking::{build_chunks, ChunkingConfig};
use crate::config::RetrievalOptions;
use crate::context::assemble_context;
use crate::embeddings::{CharacterNgramEmbedder, Embedder};
use crate::error::{ConfigError, DocumentError, QueryError};
use crate::fetch::DocumentSource;
use crate::models::{AnswerRecord, Chunk, DocumentFingerprint};
use crate::selection::build_selector;
use crate::traits::{AnswerSynthesizer, ChunkSelector, DocumentFetcher, TextExtractor};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const SYNTHESIS_ERROR_PREFIX: &str = "Error generating answer:";

/// Read-only resources built once at start-up and shared by every request.
pub struct InferenceContext {
    options: RetrievalOptions,
    embedder: Arc<dyn Embedder>,
}

impl InferenceContext {
    pub fn new(options: RetrievalOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        let embedder = Arc::new(CharacterNgramEmbedder::new(options.embedding_dimensions));
        Ok(Self { options, embedder })
    }

    pub fn with_embedder(
        options: RetrievalOptions,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, ConfigError> {
        options.validate()?;
        Ok(Self { options, embedder })
    }

    pub fn options(&self) -> &RetrievalOptions {
        &self.options
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }
}

#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub fingerprint: DocumentFingerprint,
    pub chunks: Vec<Chunk>,
}

pub struct QueryOrchestrator {
    fetcher: Arc<dyn DocumentFetcher>,
    extractor: Arc<dyn TextExtractor>,
    synthesizer: Arc<dyn AnswerSynthesizer>,
    context: Arc<InferenceContext>,
}

impl QueryOrchestrator {
    pub fn new(
        fetcher: Arc<dyn DocumentFetcher>,
        extractor: Arc<dyn TextExtractor>,
        synthesizer: Arc<dyn AnswerSynthesizer>,
        context: Arc<InferenceContext>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            synthesizer,
            context,
        }
    }

    pub fn options(&self) -> &RetrievalOptions {
        self.context.options()
    }

    /// Fetches, extracts and chunks one document. Any failure here is fatal
    /// for the whole request.
    pub async fn prepare_document(&self, reference: &str) -> Result<PreparedDocument, QueryError> {
        prepare_document(
            self.fetcher.as_ref(),
            self.extractor.as_ref(),
            reference,
            ChunkingConfig::from(self.options()),
        )
        .await
    }

    /// Answers every question against one document, in question order.
    pub async fn run(
        &self,
        reference: &str,
        questions: &[String],
    ) -> Result<Vec<AnswerRecord>, QueryError> {
        let document = self.prepare_document(reference).await?;
        let options = self.options();

        let selector = build_selector(options.strategy, document.chunks, self.context.embedder())?;
        info!(
            strategy = %selector.strategy(),
            chunk_count = selector.chunks().len(),
            question_count = questions.len(),
            "answering questions"
        );

        // collected before buffering; a borrowing `map` closure makes `run` non-Send
        let selector = selector.as_ref();
        let pending = questions
            .iter()
            .map(|question| self.answer(selector, question))
            .collect::<Vec<_>>();

        let records = stream::iter(pending)
            .buffered(options.answer_concurrency)
            .collect::<Vec<_>>()
            .await;

        Ok(records)
    }

    async fn answer(&self, selector: &dyn ChunkSelector, question: &str) -> AnswerRecord {
        let options = self.options();
        let selected = selector.select(question, options.top_k);
        let assembled = assemble_context(&selected, options.max_context_words);

        debug!(question, positions = ?assembled.positions, "chunks selected");
        if assembled.truncated {
            warn!(
                question,
                max_context_words = options.max_context_words,
                "context truncated to word budget"
            );
        }

        let (answer, synthesis_failed) =
            match self.synthesizer.synthesize(question, &assembled.context).await {
                Ok(answer) => (answer, false),
                Err(error) => {
                    warn!(question, error = %error, "answer synthesis failed");
                    (format!("{SYNTHESIS_ERROR_PREFIX} {error}"), true)
                }
            };

        AnswerRecord {
            question: question.to_string(),
            answer,
            justification: assembled.justification,
            chunk_positions: assembled.positions,
            synthesis_failed,
        }
    }
}

pub async fn prepare_document(
    fetcher: &dyn DocumentFetcher,
    extractor: &dyn TextExtractor,
    reference: &str,
    chunking: ChunkingConfig,
) -> Result<PreparedDocument, QueryError> {
    let source = DocumentSource::parse(reference)?;
    let bytes = fetcher.fetch(&source).await?;
    let extracted = extractor.extract(&bytes).await?;

    if extracted.text.trim().is_empty() {
        let reason = format!("no text extracted from {source}");
        return Err(DocumentError::EmptyContent(reason).into());
    }

    let chunks = build_chunks(&extracted.text, chunking)?;
    if chunks.is_empty() {
        let reason = format!("zero chunks produced for {source}");
        return Err(DocumentError::EmptyContent(reason).into());
    }

    let fingerprint = fingerprint(&source, &bytes, extracted.page_count);
    info!(
        document = %fingerprint.source,
        checksum = %fingerprint.checksum,
        size_bytes = fingerprint.size_bytes,
        page_count = fingerprint.page_count,
        chunk_count = chunks.len(),
        "document prepared"
    );

    Ok(PreparedDocument {
        fingerprint,
        chunks,
    })
}

pub fn fingerprint(
    source: &DocumentSource,
    bytes: &[u8],
    page_count: usize,
) -> DocumentFingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    DocumentFingerprint {
        source: source.to_string(),
        checksum: format!("{:x}", hasher.finalize()),
        size_bytes: bytes.len() as u64,
        page_count,
        fetched_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FetchConfig, SynthesizerConfig};
    use crate::error::{ErrorKind, SynthesisError};
    use crate::extractor::tests::pdf_with_pages;
    use crate::extractor::{ExtractedText, PdfTextExtractor};
    use crate::fetch::HttpFetcher;
    use crate::models::SelectionStrategy;
    use crate::synthesis::ChatCompletionSynthesizer;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves the reference itself as the document body.
    struct EchoFetcher;

    #[async_trait]
    impl DocumentFetcher for EchoFetcher {
        async fn fetch(&self, source: &DocumentSource) -> Result<Vec<u8>, DocumentError> {
            match source {
                DocumentSource::Local(path) if path.ends_with("unreachable") => {
                    Err(DocumentError::Fetch("connection refused".to_string()))
                }
                DocumentSource::Local(path) => Ok(path.to_string_lossy().as_bytes().to_vec()),
                DocumentSource::Remote(url) => {
                    Ok(url.path().trim_start_matches('/').as_bytes().to_vec())
                }
            }
        }
    }

    struct Utf8Extractor;

    #[async_trait]
    impl TextExtractor for Utf8Extractor {
        async fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, DocumentError> {
            let text = String::from_utf8(bytes.to_vec())
                .map_err(|error| DocumentError::Extraction(error.to_string()))?;
            Ok(ExtractedText {
                text: text.replace('_', " "),
                page_count: 1,
            })
        }
    }

    /// Answers with the context it was given; fails on questions containing
    /// "fail"; earlier questions are made slower than later ones.
    #[derive(Default)]
    struct ScriptedSynthesizer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AnswerSynthesizer for ScriptedSynthesizer {
        async fn synthesize(&self, question: &str, context: &str) -> Result<String, SynthesisError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30u64.saturating_sub(call as u64 * 10))).await;
            if question.contains("fail") {
                return Err(SynthesisError::EmptyResponse("scripted".to_string()));
            }
            Ok(format!("[{question}] {context}"))
        }
    }

    fn orchestrator(options: RetrievalOptions) -> (QueryOrchestrator, Arc<ScriptedSynthesizer>) {
        let synthesizer = Arc::new(ScriptedSynthesizer::default());
        let context = Arc::new(InferenceContext::new(options).expect("options should be valid"));
        let orchestrator = QueryOrchestrator::new(
            Arc::new(EchoFetcher),
            Arc::new(Utf8Extractor),
            synthesizer.clone(),
            context,
        );
        (orchestrator, synthesizer)
    }

    fn questions(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[tokio::test]
    async fn five_word_document_answers_from_best_chunk() {
        let (orchestrator, _) = orchestrator(RetrievalOptions {
            chunk_words: 2,
            top_k: 1,
            ..RetrievalOptions::default()
        });

        let records = orchestrator
            .run("A_B_C_D_E", &questions(&["c d"]))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].chunk_positions, vec![1]);
        assert_eq!(records[0].answer, "[c d] C D");
        assert_eq!(records[0].justification, "Based on these document chunks:\n- C D");
        assert!(!records[0].synthesis_failed);
    }

    #[tokio::test]
    async fn answers_keep_question_order() {
        let (orchestrator, _) = orchestrator(RetrievalOptions {
            chunk_words: 2,
            top_k: 2,
            ..RetrievalOptions::default()
        });
        let asked = questions(&["a b", "c d", "e", "b c"]);

        let records = orchestrator.run("A_B_C_D_E", &asked).await.unwrap();

        let returned = records.iter().map(|record| record.question.clone()).collect::<Vec<_>>();
        assert_eq!(returned, asked);
        assert_eq!(records[2].chunk_positions, vec![2, 0]);
    }

    #[tokio::test]
    async fn synthesis_failure_is_isolated_to_its_question() {
        let (orchestrator, synthesizer) = orchestrator(RetrievalOptions {
            chunk_words: 2,
            ..RetrievalOptions::default()
        });

        let records = orchestrator
            .run("A_B_C_D_E", &questions(&["a b", "please fail", "e"]))
            .await
            .unwrap();

        assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 3);
        assert!(!records[0].synthesis_failed);
        assert!(records[1].synthesis_failed);
        assert!(records[1].answer.starts_with(SYNTHESIS_ERROR_PREFIX));
        assert!(records[1].justification.starts_with("Based on these document chunks:"));
        assert!(!records[2].synthesis_failed);
        assert_eq!(records[2].answer, "[e] E\nA B\nC D");
    }

    #[tokio::test]
    async fn fetch_failure_aborts_before_any_question() {
        let (orchestrator, synthesizer) = orchestrator(RetrievalOptions::default());

        let error = orchestrator
            .run("unreachable", &questions(&["a", "b"]))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), Some(ErrorKind::Fetch));
        assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blank_document_is_empty_content() {
        let (orchestrator, synthesizer) = orchestrator(RetrievalOptions::default());

        let error = orchestrator.run("___", &questions(&["a"])).await.unwrap_err();

        assert_eq!(error.kind(), Some(ErrorKind::EmptyContent));
        assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_source_is_rejected() {
        let (orchestrator, _) = orchestrator(RetrievalOptions::default());
        let error = orchestrator.run("gopher://x/doc.pdf", &[]).await.unwrap_err();
        assert!(matches!(error, QueryError::Document(DocumentError::InvalidSource(_))));
    }

    #[tokio::test]
    async fn vector_strategy_runs_end_to_end() {
        let (orchestrator, _) = orchestrator(RetrievalOptions {
            chunk_words: 3,
            top_k: 1,
            strategy: SelectionStrategy::Vector,
            ..RetrievalOptions::default()
        });

        let records = orchestrator
            .run(
                "invoice_billing_address_cataract_surgery_waiting",
                &questions(&["cataract surgery waiting"]),
            )
            .await
            .unwrap();

        assert_eq!(records[0].chunk_positions, vec![1]);
    }

    #[tokio::test]
    async fn pdf_on_disk_is_answered() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("policy.pdf");
        std::fs::write(
            &file,
            pdf_with_pages(&[
                "The grace period is thirty days",
                "Cataract surgery has a two year waiting period",
            ]),
        )?;

        let orchestrator = QueryOrchestrator::new(
            Arc::new(HttpFetcher::new(&FetchConfig::default())?),
            Arc::new(PdfTextExtractor::default()),
            Arc::new(ScriptedSynthesizer::default()),
            Arc::new(InferenceContext::new(RetrievalOptions {
                chunk_words: 6,
                top_k: 1,
                ..RetrievalOptions::default()
            })?),
        );

        let reference = file.to_string_lossy().into_owned();
        let records = orchestrator
            .run(&reference, &questions(&["what is the grace period"]))
            .await?;

        assert_eq!(records[0].chunk_positions, vec![0]);
        assert!(records[0].answer.contains("grace period is thirty days"));
        Ok(())
    }

    #[tokio::test]
    async fn hung_backend_fails_only_its_question() {
        use wiremock::matchers::{body_string_contains, method};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let reply = |content: &str| {
            serde_json::json!({ "choices": [{ "message": { "content": content } }] })
        };
        Mock::given(method("POST"))
            .and(body_string_contains("grace"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(reply("never delivered"))
                    .set_delay(Duration::from_secs(3600)),
            )
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("answered")))
            .mount(&server)
            .await;

        let synthesizer = ChatCompletionSynthesizer::new(&SynthesizerConfig {
            api_key: Some("test-key".to_string()),
            base_url: server.uri(),
            timeout: Duration::from_millis(300),
            ..SynthesizerConfig::default()
        })
        .unwrap();
        let orchestrator = QueryOrchestrator::new(
            Arc::new(EchoFetcher),
            Arc::new(Utf8Extractor),
            Arc::new(synthesizer),
            Arc::new(InferenceContext::new(RetrievalOptions::default()).unwrap()),
        );

        let asked = questions(&["first question", "grace period?", "third"]);
        let records = tokio::time::timeout(
            Duration::from_secs(10),
            orchestrator.run("A_B_C_D_E", &asked),
        )
        .await
        .expect("batch should finish despite the hung call")
        .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].answer, "answered");
        assert!(records[1].synthesis_failed);
        assert!(records[1].answer.starts_with(SYNTHESIS_ERROR_PREFIX));
        assert_eq!(records[2].answer, "answered");
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn run_future_is_send() {
        let (orchestrator, _) = orchestrator(RetrievalOptions::default());
        let asked = questions(&["a"]);
        let future = orchestrator.run("A_B", &asked);
        assert_send(&future);
    }

    #[tokio::test]
    async fn prepared_document_carries_fingerprint() {
        let (orchestrator, _) = orchestrator(RetrievalOptions::default());
        let prepared = orchestrator.prepare_document("one_two_three").await.unwrap();

        assert_eq!(prepared.chunks.len(), 1);
        assert_eq!(prepared.fingerprint.size_bytes, 13);
        assert_eq!(prepared.fingerprint.checksum.len(), 64);
    }
}
