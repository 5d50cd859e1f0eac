//! HTTP client for the upstream analytics documents.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::trace;

/// User-Agent sent with every upstream request.
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// A document could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Request { url: String, source: reqwest::Error },

    #[error("Request to {url} returned {status}")]
    Status { url: String, status: StatusCode },

    #[error("Failed to read response body from {url}: {source}")]
    Body { url: String, source: reqwest::Error },
}

impl FetchError {
    /// The URL the failed request was sent to.
    pub fn url(&self) -> &str {
        match self {
            FetchError::Request { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::Body { url, .. } => url,
        }
    }
}

/// Fetches raw document bodies.
///
/// One call is one outbound request: no retries and no caching.
pub trait SourceClient: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Bytes, FetchError>> + Send;
}

/// [`SourceClient`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpSourceClient {
    client: reqwest::Client,
}

impl HttpSourceClient {
    /// Create a client whose requests are bounded by `timeout`, covering
    /// connect, headers and body.
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }
}

impl SourceClient for HttpSourceClient {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        trace!(url, "Fetching analytics document");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        response.bytes().await.map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })
    }
}
