use crate::embeddings::DEFAULT_EMBEDDING_DIMENSIONS;
use crate::error::ConfigError;
use crate::models::SelectionStrategy;
use std::time::Duration;

pub const DEFAULT_CHUNK_WORDS: usize = 300;
pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_MAX_CONTEXT_WORDS: usize = 3_000;
pub const DEFAULT_ANSWER_CONCURRENCY: usize = 4;

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama3-70b-8192";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_MAX_TOKENS: u32 = 500;
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_OCR_TIMEOUT_SECS: u64 = 120;

pub const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    pub chunk_words: usize,
    pub top_k: usize,
    pub strategy: SelectionStrategy,
    pub embedding_dimensions: usize,
    pub max_context_words: usize,
    pub answer_concurrency: usize,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            chunk_words: DEFAULT_CHUNK_WORDS,
            top_k: DEFAULT_TOP_K,
            strategy: SelectionStrategy::Keyword,
            embedding_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            max_context_words: DEFAULT_MAX_CONTEXT_WORDS,
            answer_concurrency: DEFAULT_ANSWER_CONCURRENCY,
        }
    }
}

impl RetrievalOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("CHUNK_SIZE", self.chunk_words)?;
        positive("TOP_K", self.top_k)?;
        positive("EMBEDDING_DIMENSIONS", self.embedding_dimensions)?;
        positive("MAX_CONTEXT_WORDS", self.max_context_words)?;
        positive("ANSWER_CONCURRENCY", self.answer_concurrency)?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct SynthesizerConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Upper bound on one chat-completion call, connect included.
    pub timeout: Duration,
}

impl std::fmt::Debug for SynthesizerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesizerConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
        }
    }
}

impl SynthesizerConfig {
    /// Checks the settings and returns the API key, which is required.
    pub fn validate(&self) -> Result<&str, ConfigError> {
        let api_key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::Missing("GROQ_API_KEY"))?;

        url::Url::parse(&self.base_url).map_err(|error| ConfigError::Invalid {
            key: "LLM_BASE_URL",
            reason: error.to_string(),
        })?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::Missing("GROQ_MODEL"));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid {
                key: "LLM_TEMPERATURE",
                reason: format!("{} is outside 0.0..=2.0", self.temperature),
            });
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid {
                key: "LLM_MAX_TOKENS",
                reason: "must be positive".to_string(),
            });
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid {
                key: "LLM_TIMEOUT_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(api_key)
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub max_document_bytes: u64,
    pub timeout: Duration,
    /// When false only http(s) sources are fetched. Off for anything that
    /// takes document references from remote callers.
    pub allow_local_files: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            allow_local_files: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OcrEndpointConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl OcrEndpointConfig {
    /// Builds the config from optional raw values; a blank endpoint disables OCR.
    pub fn from_parts(endpoint: Option<String>, api_key: Option<String>) -> Option<Self> {
        let endpoint = endpoint?.trim().to_string();
        if endpoint.is_empty() {
            return None;
        }

        let api_key = api_key.and_then(|value| {
            let key = value.trim().to_string();
            if key.is_empty() {
                None
            } else {
                Some(key)
            }
        });

        Some(Self {
            endpoint,
            api_key,
            timeout: Duration::from_secs(DEFAULT_OCR_TIMEOUT_SECS),
        })
    }
}

fn positive(key: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}
