use thiserror::Error;

/// Coarse classification of failures, used to decide what is request-fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Fetch,
    Extraction,
    EmptyContent,
    Synthesis,
    Configuration,
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid document source: {0}")]
    InvalidSource(String),

    #[error("failed to fetch document: {0}")]
    Fetch(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("document is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("pdf parse error: {0}")]
    Extraction(String),

    #[error("multimodal OCR failed: {0}")]
    OcrFailed(String),

    #[error("no content found: {0}")]
    EmptyContent(String),

    #[error("embedding index error: {0}")]
    Index(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),
}

impl DocumentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSource(_)
            | Self::Fetch(_)
            | Self::Http(_)
            | Self::Io(_)
            | Self::TooLarge { .. } => ErrorKind::Fetch,
            Self::Extraction(_) | Self::OcrFailed(_) | Self::Index(_) => ErrorKind::Extraction,
            Self::EmptyContent(_) => ErrorKind::EmptyContent,
            Self::InvalidChunkConfig(_) => ErrorKind::Configuration,
        }
    }
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from {backend} (status {status}): {details}")]
    BackendResponse {
        backend: String,
        status: u16,
        details: String,
    },

    #[error("rate limited by {0}")]
    RateLimited(String),

    #[error("empty response from {0}")]
    EmptyResponse(String),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not configured")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl QueryError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Document(error) => Some(error.kind()),
            Self::Config(_) => Some(ErrorKind::Configuration),
            Self::InvalidRequest(_) => None,
        }
    }
}

pub type Result<T, E = DocumentError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_errors_map_to_request_fatal_kinds() {
        assert_eq!(DocumentError::Fetch("timeout".into()).kind(), ErrorKind::Fetch);
        assert_eq!(
            DocumentError::Extraction("bad xref".into()).kind(),
            ErrorKind::Extraction
        );
        assert_eq!(
            DocumentError::EmptyContent("no pages".into()).kind(),
            ErrorKind::EmptyContent
        );
    }

    #[test]
    fn query_error_is_transparent_over_document_error() {
        let error = QueryError::from(DocumentError::EmptyContent("zero chunks".into()));
        assert_eq!(error.to_string(), "no content found: zero chunks");
        assert_eq!(error.kind(), Some(ErrorKind::EmptyContent));
    }
}
