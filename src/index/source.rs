//! Remote source of the index document

use std::io::Read;
use std::time::Duration;

use flate2::read::GzDecoder;
#[cfg(test)]
use mockall::automock;
use reqwest::StatusCode;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use tracing::{debug, warn};

use crate::index::error::FetchError;

/// Result of a conditional fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResponse {
    /// The index changed. `body` is already decompressed.
    Modified { body: Vec<u8>, etag: Option<String> },
    /// The server confirmed the cached copy is current.
    NotModified,
}

/// Trait for downloading the index with conditional-GET semantics
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait IndexSource: Send + Sync {
    /// Fetches the index. When `etag` is given the server may answer `NotModified`.
    async fn fetch(&self, etag: Option<String>) -> Result<FetchResponse, FetchError>;
}

/// Fetches a gzip-compressed JSON index over HTTP(S)
pub struct HttpIndexSource {
    client: reqwest::Client,
    url: String,
}

impl HttpIndexSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent("gmaven-index")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl IndexSource for HttpIndexSource {
    async fn fetch(&self, etag: Option<String>) -> Result<FetchResponse, FetchError> {
        let mut request = self.client.get(&self.url);
        if let Some(etag) = &etag {
            request = request.header(IF_NONE_MATCH, etag.as_str());
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            debug!("Index not modified since {:?}", etag);
            return Ok(FetchResponse::NotModified);
        }

        if status != StatusCode::OK {
            warn!("Index server returned status {}: {}", status, self.url);
            return Err(FetchError::UnexpectedStatus(status.as_u16()));
        }

        let new_etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let compressed = response.bytes().await?;
        let body = gunzip(&compressed)?;

        debug!(
            "Downloaded index: {} bytes compressed, {} bytes decompressed",
            compressed.len(),
            body.len()
        );
        Ok(FetchResponse::Modified {
            body,
            etag: new_etag,
        })
    }
}

fn gunzip(compressed: &[u8]) -> Result<Vec<u8>, FetchError> {
    let mut body = Vec::new();
    GzDecoder::new(compressed)
        .read_to_end(&mut body)
        .map_err(FetchError::Decompress)?;
    Ok(body)
}
