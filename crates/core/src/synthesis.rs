use crate::config::{SynthesizerConfig, DEFAULT_CONNECT_TIMEOUT_SECS};
use crate::error::{ConfigError, SynthesisError};
use crate::traits::AnswerSynthesizer;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{error, warn};

pub const SYSTEM_PROMPT: &str =
    "You are a helpful assistant for document analysis and understanding.";

const BACKEND: &str = "chat-completions";

pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "Answer the following question using only the context provided.\n\n\
         Question: {question}\n\n\
         Context:\n{context}\n\n\
         Answer:"
    )
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Answers through an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct ChatCompletionSynthesizer {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    rate_limit_backoff: Duration,
}

impl fmt::Debug for ChatCompletionSynthesizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatCompletionSynthesizer")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionSynthesizer {
    pub fn new(config: &SynthesizerConfig) -> Result<Self, ConfigError> {
        let api_key = config.validate()?.to_string();
        let mut base_url = config.base_url.trim().to_string();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        let connect_timeout = config
            .timeout
            .min(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS));
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(config.timeout)
            .build()
            .map_err(|error| ConfigError::Invalid {
                key: "LLM_TIMEOUT_SECS",
                reason: error.to_string(),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            rate_limit_backoff: Duration::from_secs(1),
        })
    }

    #[must_use]
    pub fn with_rate_limit_backoff(mut self, backoff: Duration) -> Self {
        self.rate_limit_backoff = backoff;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send_request(&self, prompt: &str) -> Result<String, SynthesisError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SynthesisError::RateLimited(BACKEND.to_string()));
        }

        if !status.is_success() {
            error!(status = %status, body = %text, "chat completion request failed");
            return Err(SynthesisError::BackendResponse {
                backend: BACKEND.to_string(),
                status: status.as_u16(),
                details: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text)?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| SynthesisError::EmptyResponse(BACKEND.to_string()))
    }
}

#[async_trait]
impl AnswerSynthesizer for ChatCompletionSynthesizer {
    async fn synthesize(&self, question: &str, context: &str) -> Result<String, SynthesisError> {
        let prompt = build_prompt(question, context);
        match self.send_request(&prompt).await {
            Err(SynthesisError::RateLimited(_)) => {
                warn!(
                    backoff_ms = self.rate_limit_backoff.as_millis() as u64,
                    "chat completion rate limited, retrying once"
                );
                tokio::time::sleep(self.rate_limit_backoff).await;
                self.send_request(&prompt).await
            }
            other => other,
        }
    }
}
