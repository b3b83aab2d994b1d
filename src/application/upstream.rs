//! Narrow contract for the upstream events source.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::Subject;

use super::error::Unavailable;

/// One conditional page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub subject: Subject,
    pub page: u32,
    pub per_page: u32,
    /// Revalidation token sent as `If-None-Match`.
    pub etag: Option<String>,
}

/// Raw upstream response; the body is validated by the caller.
#[derive(Debug, Clone, Default)]
pub struct UpstreamResponse {
    pub status: u16,
    pub etag: Option<String>,
    /// `X-Poll-Interval` in seconds.
    pub poll_interval: Option<u64>,
    pub rate_limit_remaining: Option<u64>,
    /// `X-RateLimit-Reset` as unix seconds.
    pub rate_limit_reset: Option<i64>,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.status, 403 | 429) && self.rate_limit_remaining == Some(0)
    }

    pub fn reset_at(&self) -> Option<OffsetDateTime> {
        self.rate_limit_reset
            .and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("upstream request timed out")]
    Timeout,
}

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }
}

impl From<TransportError> for Unavailable {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Network(message) => Unavailable::Network(message),
            TransportError::Timeout => Unavailable::Timeout,
        }
    }
}

#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch_page(&self, query: PageQuery) -> Result<UpstreamResponse, TransportError>;

    /// Whether requests carry a token, which raises the rate-limit ceiling.
    fn is_authenticated(&self) -> bool {
        false
    }
}
