use crate::config::OcrEndpointConfig;
use crate::error::DocumentError;
use crate::traits::TextExtractor;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use lopdf::Document;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: usize,
}

impl ExtractedText {
    fn from_pages(pages: &[PageText]) -> Self {
        Self {
            text: pages
                .iter()
                .map(|page| page.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            page_count: pages.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct LlmOcrRequest {
    pdf_base64: String,
}

#[derive(Debug, Clone, Deserialize)]
struct LlmOcrResponse {
    pages: Option<Vec<LlmOcrPage>>,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct LlmOcrPage {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    text: Option<String>,
}

/// Reads the text layer of every page with `lopdf`. Pages without text stay
/// in the list with an empty string.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<PageText>, DocumentError> {
    let document =
        Document::load_mem(bytes).map_err(|error| DocumentError::Extraction(error.to_string()))?;

    let page_numbers = document.get_pages().into_keys().collect::<Vec<_>>();
    if page_numbers.is_empty() {
        return Err(DocumentError::Extraction("pdf has no pages".to_string()));
    }

    let mut pages = Vec::with_capacity(page_numbers.len());
    for page_no in page_numbers {
        let text = match document.extract_text(&[page_no]) {
            Ok(text) => text,
            Err(error) => {
                warn!(page = page_no, error = %error, "skipping unreadable page");
                String::new()
            }
        };
        if text.trim().is_empty() {
            debug!(page = page_no, "page has no text layer");
        }
        pages.push(PageText {
            number: page_no,
            text,
        });
    }

    if pages.iter().all(|page| page.text.trim().is_empty()) {
        return Err(DocumentError::EmptyContent(
            "pdf had no readable page text".to_string(),
        ));
    }

    Ok(pages)
}

/// PDF text extraction with an optional multimodal OCR fallback for
/// documents whose text layer is missing or unreadable.
pub struct PdfTextExtractor {
    client: Client,
    ocr: Option<OcrEndpointConfig>,
}

impl Default for PdfTextExtractor {
    fn default() -> Self {
        Self::new(None)
    }
}

impl PdfTextExtractor {
    pub fn new(ocr: Option<OcrEndpointConfig>) -> Self {
        Self {
            client: Client::new(),
            ocr,
        }
    }

    async fn extract_with_llm_ocr(
        &self,
        cfg: &OcrEndpointConfig,
        bytes: &[u8],
    ) -> Result<Vec<PageText>, DocumentError> {
        let payload = LlmOcrRequest {
            pdf_base64: STANDARD.encode(bytes),
        };

        let mut request = self
            .client
            .post(&cfg.endpoint)
            .timeout(cfg.timeout)
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(api_key) = &cfg.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|error| DocumentError::OcrFailed(error.to_string()))?;

        if !response.status().is_success() {
            return Err(DocumentError::OcrFailed(format!(
                "multimodal OCR request to {} returned {}",
                cfg.endpoint,
                response.status()
            )));
        }

        let payload: LlmOcrResponse = response
            .json()
            .await
            .map_err(|error| DocumentError::OcrFailed(error.to_string()))?;
        payload_to_pages(&payload)
    }
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, DocumentError> {
        let owned = bytes.to_vec();
        let extracted = tokio::task::spawn_blocking(move || extract_pages(&owned))
            .await
            .map_err(|error| DocumentError::Extraction(error.to_string()))?;

        let pages = match (extracted, &self.ocr) {
            (Ok(pages), _) => pages,
            (
                Err(primary @ (DocumentError::Extraction(_) | DocumentError::EmptyContent(_))),
                Some(cfg),
            ) => {
                warn!(error = %primary, endpoint = %cfg.endpoint, "falling back to multimodal OCR");
                self.extract_with_llm_ocr(cfg, bytes)
                    .await
                    .map_err(|ocr_error| match primary {
                        DocumentError::EmptyContent(reason) => DocumentError::EmptyContent(
                            format!("{reason}; multimodal OCR fallback failed: {ocr_error}"),
                        ),
                        DocumentError::Extraction(reason) => DocumentError::Extraction(
                            format!("{reason}; multimodal OCR fallback failed: {ocr_error}"),
                        ),
                        other => other,
                    })?
            }
            (Err(error), _) => return Err(error),
        };

        Ok(ExtractedText::from_pages(&pages))
    }
}

fn payload_to_pages(payload: &LlmOcrResponse) -> Result<Vec<PageText>, DocumentError> {
    if let Some(listed) = &payload.pages {
        let listed = listed
            .iter()
            .enumerate()
            .filter_map(|(position, page)| {
                let text = page.text.as_deref().map(str::trim).unwrap_or_default();
                if text.is_empty() {
                    return None;
                }
                Some(PageText {
                    number: page.page.unwrap_or(position as u32 + 1),
                    text: text.to_string(),
                })
            })
            .collect::<Vec<_>>();

        if !listed.is_empty() {
            return Ok(listed);
        }
    }

    if let Some(raw_text) = &payload.text {
        let pages = raw_text
            .split('\u{000c}')
            .enumerate()
            .filter_map(|(index, chunk)| {
                let normalized = chunk.trim();
                if normalized.is_empty() {
                    None
                } else {
                    Some(PageText {
                        number: (index + 1) as u32,
                        text: normalized.to_string(),
                    })
                }
            })
            .collect::<Vec<_>>();

        if !pages.is_empty() {
            return Ok(pages);
        }
    }

    Err(DocumentError::OcrFailed(
        "multimodal OCR response has no readable text".to_string(),
    ))
}
