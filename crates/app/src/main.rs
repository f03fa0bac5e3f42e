mod handlers;
mod router;
mod server;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use pdf_answer_core::config::{
    DEFAULT_ANSWER_CONCURRENCY, DEFAULT_CHUNK_WORDS, DEFAULT_FETCH_TIMEOUT_SECS,
    DEFAULT_LLM_BASE_URL, DEFAULT_LLM_MODEL, DEFAULT_LLM_TIMEOUT_SECS, DEFAULT_MAX_CONTEXT_WORDS,
    DEFAULT_MAX_DOCUMENT_BYTES, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TOP_K,
};
use pdf_answer_core::{
    prepare_document, save_chunks_json, ChatCompletionSynthesizer, ChunkingConfig, FetchConfig,
    HttpFetcher, InferenceContext, OcrEndpointConfig, PdfTextExtractor, QueryOrchestrator,
    RetrievalOptions, SelectionStrategy, SynthesizerConfig, DEFAULT_EMBEDDING_DIMENSIONS,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::server::ServeOptions;

const PREVIEW_CHARS: usize = 500;

#[derive(Parser)]
#[command(
    name = "pdf-answer",
    version,
    about = "Answer questions about a PDF document with retrieved context"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    llm: LlmArgs,

    #[command(flatten)]
    retrieval: RetrievalArgs,

    #[command(flatten)]
    fetch: FetchArgs,
}

#[derive(Args)]
struct LlmArgs {
    /// API key for the chat-completion backend.
    #[arg(long, env = "GROQ_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// Chat-completion model.
    #[arg(long, env = "GROQ_MODEL", global = true, default_value = DEFAULT_LLM_MODEL)]
    model: String,

    /// Base URL of an OpenAI-compatible API.
    #[arg(long, env = "LLM_BASE_URL", global = true, default_value = DEFAULT_LLM_BASE_URL)]
    llm_base_url: String,

    #[arg(long, env = "LLM_TEMPERATURE", global = true, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,

    #[arg(long, env = "LLM_MAX_TOKENS", global = true, default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,

    /// Seconds before one chat-completion call is abandoned.
    #[arg(
        long,
        env = "LLM_TIMEOUT_SECS",
        global = true,
        default_value_t = DEFAULT_LLM_TIMEOUT_SECS
    )]
    llm_timeout_secs: u64,
}

#[derive(Args)]
struct RetrievalArgs {
    /// Words per chunk.
    #[arg(long, env = "CHUNK_SIZE", global = true, default_value_t = DEFAULT_CHUNK_WORDS)]
    chunk_size: usize,

    /// Chunks handed to the model per question.
    #[arg(long, env = "TOP_K", global = true, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// `keyword` (word overlap) or `vector` (nearest embeddings).
    #[arg(
        long,
        env = "SELECTION_STRATEGY",
        global = true,
        default_value_t = SelectionStrategy::Keyword
    )]
    strategy: SelectionStrategy,

    #[arg(
        long,
        env = "EMBEDDING_DIMENSIONS",
        global = true,
        default_value_t = DEFAULT_EMBEDDING_DIMENSIONS
    )]
    embedding_dimensions: usize,

    /// Upper bound on context words sent per question.
    #[arg(
        long,
        env = "MAX_CONTEXT_WORDS",
        global = true,
        default_value_t = DEFAULT_MAX_CONTEXT_WORDS
    )]
    max_context_words: usize,

    /// Questions answered concurrently.
    #[arg(
        long,
        env = "ANSWER_CONCURRENCY",
        global = true,
        default_value_t = DEFAULT_ANSWER_CONCURRENCY
    )]
    answer_concurrency: usize,
}

#[derive(Args)]
struct FetchArgs {
    #[arg(
        long,
        env = "MAX_DOCUMENT_BYTES",
        global = true,
        default_value_t = DEFAULT_MAX_DOCUMENT_BYTES
    )]
    max_document_bytes: u64,

    #[arg(
        long,
        env = "FETCH_TIMEOUT_SECS",
        global = true,
        default_value_t = DEFAULT_FETCH_TIMEOUT_SECS
    )]
    fetch_timeout_secs: u64,

    /// OCR service used when a PDF has no extractable text.
    #[arg(long, env = "LLM_OCR_ENDPOINT", global = true)]
    ocr_endpoint: Option<String>,

    #[arg(long, env = "LLM_OCR_API_KEY", global = true, hide_env_values = true)]
    ocr_api_key: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP answering service.
    Serve {
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: String,

        #[arg(long, env = "PORT", default_value_t = 5000)]
        port: u16,

        #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 300)]
        request_timeout_secs: u64,

        #[arg(long, env = "MAX_BODY_BYTES", default_value_t = 1_048_576)]
        max_body_bytes: usize,
    },
    /// Answer questions about one document and print the answers as JSON.
    Ask {
        /// URL or local path of the PDF.
        #[arg(long)]
        document: String,

        /// Repeat for several questions; answers keep this order.
        #[arg(short, long = "question", required = true)]
        questions: Vec<String>,
    },
    /// Fetch, extract and chunk a document without calling the model.
    Chunk {
        /// URL or local path of the PDF.
        #[arg(long)]
        document: String,

        /// Write the chunk texts to this file as a JSON array.
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

impl Cli {
    fn retrieval_options(&self) -> RetrievalOptions {
        RetrievalOptions {
            chunk_words: self.retrieval.chunk_size,
            top_k: self.retrieval.top_k,
            strategy: self.retrieval.strategy,
            embedding_dimensions: self.retrieval.embedding_dimensions,
            max_context_words: self.retrieval.max_context_words,
            answer_concurrency: self.retrieval.answer_concurrency,
        }
    }

    fn synthesizer_config(&self) -> SynthesizerConfig {
        SynthesizerConfig {
            api_key: self.llm.api_key.clone(),
            base_url: self.llm.llm_base_url.clone(),
            model: self.llm.model.clone(),
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
            timeout: Duration::from_secs(self.llm.llm_timeout_secs),
        }
    }

    fn fetch_config(&self, allow_local_files: bool) -> FetchConfig {
        FetchConfig {
            max_document_bytes: self.fetch.max_document_bytes,
            timeout: Duration::from_secs(self.fetch.fetch_timeout_secs),
            allow_local_files,
        }
    }

    fn extractor(&self) -> PdfTextExtractor {
        let ocr = OcrEndpointConfig::from_parts(
            self.fetch.ocr_endpoint.clone(),
            self.fetch.ocr_api_key.clone(),
        );
        if let Some(config) = &ocr {
            info!(endpoint = %config.endpoint, "ocr fallback enabled");
        }
        PdfTextExtractor::new(ocr)
    }

    /// Validates every setting up front so a bad key fails before any request.
    fn orchestrator(&self, allow_local_files: bool) -> anyhow::Result<QueryOrchestrator> {
        let synthesizer = ChatCompletionSynthesizer::new(&self.synthesizer_config())?;
        let context = InferenceContext::new(self.retrieval_options())?;
        let fetcher = HttpFetcher::new(&self.fetch_config(allow_local_files))?;

        info!(
            model = synthesizer.model(),
            strategy = %context.options().strategy,
            chunk_words = context.options().chunk_words,
            top_k = context.options().top_k,
            "answering pipeline ready"
        );

        Ok(QueryOrchestrator::new(
            Arc::new(fetcher),
            Arc::new(self.extractor()),
            Arc::new(synthesizer),
            Arc::new(context),
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-answer boot"
    );

    match &cli.command {
        Command::Serve {
            host,
            port,
            request_timeout_secs,
            max_body_bytes,
        } => {
            let orchestrator = Arc::new(cli.orchestrator(false)?);
            server::serve(
                orchestrator,
                ServeOptions {
                    host: host.clone(),
                    port: *port,
                    request_timeout: Duration::from_secs(*request_timeout_secs),
                    max_body_bytes: *max_body_bytes,
                },
            )
            .await?;
        }
        Command::Ask {
            document,
            questions,
        } => {
            let orchestrator = cli.orchestrator(true)?;
            let records = orchestrator.run(document, questions).await?;

            let failed = records.iter().filter(|record| record.synthesis_failed).count();
            if failed > 0 {
                warn!(failed, "some questions could not be answered");
            }
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Chunk { document, save } => {
            let options = cli.retrieval_options();
            options.validate()?;

            let fetcher = HttpFetcher::new(&cli.fetch_config(true))?;
            let extractor = cli.extractor();
            let prepared = prepare_document(
                &fetcher,
                &extractor,
                document,
                ChunkingConfig::from(&options),
            )
            .await?;

            println!("{}", serde_json::to_string_pretty(&prepared.fingerprint)?);
            println!("{} chunks of up to {} words", prepared.chunks.len(), options.chunk_words);
            if let Some(first) = prepared.chunks.first() {
                let preview: String = first.text.chars().take(PREVIEW_CHARS).collect();
                println!("first chunk preview:\n{preview}");
            }

            if let Some(path) = save {
                save_chunks_json(path, &prepared.chunks)?;
                println!(
                    "{} chunks saved to {} at {}",
                    prepared.chunks.len(),
                    path.display(),
                    Utc::now().to_rfc3339()
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ask_collects_questions_in_order() {
        let cli = Cli::try_parse_from([
            "pdf-answer",
            "ask",
            "--document",
            "policy.pdf",
            "-q",
            "first?",
            "--question",
            "second?",
        ])
        .unwrap();

        match cli.command {
            Command::Ask {
                document,
                questions,
            } => {
                assert_eq!(document, "policy.pdf");
                assert_eq!(questions, vec!["first?", "second?"]);
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn ask_requires_a_question() {
        let result = Cli::try_parse_from(["pdf-answer", "ask", "--document", "policy.pdf"]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "pdf-answer",
            "chunk",
            "--document",
            "policy.pdf",
            "--chunk-size",
            "42",
            "--strategy",
            "vector",
        ])
        .unwrap();

        let options = cli.retrieval_options();
        assert_eq!(options.chunk_words, 42);
        assert_eq!(options.strategy, SelectionStrategy::Vector);
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let result = Cli::try_parse_from([
            "pdf-answer",
            "chunk",
            "--document",
            "policy.pdf",
            "--strategy",
            "bm25",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn llm_timeout_flag_reaches_synthesizer_config() {
        let cli = Cli::try_parse_from([
            "pdf-answer",
            "serve",
            "--llm-timeout-secs",
            "7",
        ])
        .unwrap();
        assert_eq!(cli.synthesizer_config().timeout, Duration::from_secs(7));
        assert!(!cli.fetch_config(false).allow_local_files);
    }

    #[test]
    fn missing_api_key_fails_before_serving() {
        let cli = Cli::try_parse_from(["pdf-answer", "--api-key", "", "serve"]).unwrap();
        assert!(cli.orchestrator(false).is_err());
    }
}
