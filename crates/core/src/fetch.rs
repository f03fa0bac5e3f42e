use crate::config::FetchConfig;
use crate::error::DocumentError;
use crate::traits::DocumentFetcher;
use async_trait::async_trait;
use reqwest::Client;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// Where a document comes from: an http(s) URL or a file on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Remote(Url),
    Local(PathBuf),
}

impl DocumentSource {
    pub fn parse(raw: &str) -> Result<Self, DocumentError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DocumentError::InvalidSource("document reference is empty".to_string()));
        }

        match Url::parse(raw) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(Self::Remote(url)),
                "file" => url.to_file_path().map(Self::Local).map_err(|()| {
                    DocumentError::InvalidSource(format!("not a usable file url: {raw}"))
                }),
                other => Err(DocumentError::InvalidSource(format!(
                    "unsupported scheme '{other}' in {raw}"
                ))),
            },
            Err(url::ParseError::RelativeUrlWithoutBase) => Ok(Self::Local(PathBuf::from(raw))),
            Err(error) => Err(DocumentError::InvalidSource(format!("{raw}: {error}"))),
        }
    }

    /// Like [`DocumentSource::parse`] but only accepts http(s) URLs.
    pub fn parse_remote(raw: &str) -> Result<Self, DocumentError> {
        match Self::parse(raw)? {
            remote @ Self::Remote(_) => Ok(remote),
            Self::Local(_) => Err(DocumentError::InvalidSource(
                "only http(s) document URLs are accepted".to_string(),
            )),
        }
    }
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => write!(f, "{url}"),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

pub struct HttpFetcher {
    client: Client,
    max_bytes: u64,
    allow_local_files: bool,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, DocumentError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            max_bytes: config.max_document_bytes,
            allow_local_files: config.allow_local_files,
        })
    }

    fn check_size(&self, size: u64) -> Result<(), DocumentError> {
        if size > self.max_bytes {
            return Err(DocumentError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }

    async fn fetch_remote(&self, url: &Url) -> Result<Vec<u8>, DocumentError> {
        let mut response = self.client.get(url.clone()).send().await?;

        if !response.status().is_success() {
            return Err(DocumentError::Fetch(format!(
                "{url} returned {}",
                response.status()
            )));
        }

        if let Some(length) = response.content_length() {
            self.check_size(length)?;
        }

        let mut body = Vec::new();
        while let Some(piece) = response.chunk().await? {
            self.check_size((body.len() + piece.len()) as u64)?;
            body.extend_from_slice(&piece);
        }

        Ok(body)
    }

    async fn fetch_local(&self, path: &Path) -> Result<Vec<u8>, DocumentError> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(DocumentError::InvalidSource(format!(
                "not a file: {}",
                path.display()
            )));
        }
        self.check_size(metadata.len())?;
        Ok(tokio::fs::read(path).await?)
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, source: &DocumentSource) -> Result<Vec<u8>, DocumentError> {
        let bytes = match source {
            DocumentSource::Remote(url) => self.fetch_remote(url).await?,
            DocumentSource::Local(_) if !self.allow_local_files => {
                return Err(DocumentError::InvalidSource(
                    "only http(s) document URLs are accepted".to_string(),
                ));
            }
            DocumentSource::Local(path) => self.fetch_local(path).await?,
        };
        debug!(source = %source, size_bytes = bytes.len(), "document fetched");
        Ok(bytes)
    }
}
