//! Fetching windows of revision history.
//!
//! Revisions are quantized into fixed size windows so that hovering over a
//! run of nearby revisions costs one request and one overlay instead of one
//! per revision.  The `WindowKey` for a revision is both the cache key for the
//! overlay and the description of the request.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::file_format::vcs_history::HistoryResponse;

#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
pub struct WindowKey {
    pub repository: String,
    /// First revision of the window; always a multiple of the window size.
    pub first_revision: u64,
}

impl WindowKey {
    pub fn for_revision(repository: &str, revision: u64, window_size: u64) -> Self {
        let window_size = window_size.max(1);
        WindowKey {
            repository: repository.to_string(),
            first_revision: revision - revision % window_size,
        }
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.repository, self.first_revision)
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("bad changelog URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server answered HTTP {status}")]
    Status { status: u16 },
    #[error("expected a JSON changelog, server sent {content_type:?}")]
    ContentType { content_type: String },
    #[error("malformed changelog response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Whether a `Content-Type` value names JSON, ignoring parameters such as
/// the charset.
fn is_json_content_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .map_or(false, |mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

/// Where revision history comes from.  The overlay manager never talks to the
/// network itself; the driver hands its fetch requests to one of these.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch(
        &self,
        repository: &str,
        first_revision: u64,
        count: u64,
    ) -> Result<HistoryResponse, FetchError>;
}

/// `HistorySource` backed by the test manager's REST endpoint.
pub struct HttpHistorySource {
    client: Client,
    base_url: Url,
}

impl HttpHistorySource {
    /// `base_url` must end in a slash; the changelog path is resolved
    /// relative to it.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(HttpHistorySource { client, base_url })
    }

    pub fn changelog_url(
        &self,
        repository: &str,
        first_revision: u64,
        count: u64,
    ) -> Result<Url, FetchError> {
        let path = format!(
            "vcs/changelog/{}/{}/{}",
            urlencoding::encode(repository),
            first_revision,
            count
        );
        Ok(self.base_url.join(&path)?)
    }
}

#[async_trait]
impl HistorySource for HttpHistorySource {
    async fn fetch(
        &self,
        repository: &str,
        first_revision: u64,
        count: u64,
    ) -> Result<HistoryResponse, FetchError> {
        let url = self.changelog_url(repository, first_revision, count)?;
        tracing::info!("GET {}", url);

        let resp = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        // Expired sessions get an HTML login page with a 200.
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !is_json_content_type(content_type) {
            return Err(FetchError::ContentType {
                content_type: content_type.to_string(),
            });
        }

        let body = resp.text().await?;
        let history: HistoryResponse = serde_json::from_str(&body)?;
        tracing::debug!(
            "{}@{}: {} commits",
            repository,
            first_revision,
            history.commits.len()
        );
        Ok(history)
    }
}
