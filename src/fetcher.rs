use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::scheduler::Order;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Request {
        url: String,
        reason: String,
        /// Server supplied hint for when to come back
        retry_after: Option<Duration>,
    },

    #[error("fetch of {url} timed out after {elapsed:?}")]
    Timeout { url: String, elapsed: Duration },

    #[error("fetcher is gone")]
    Killed,
}

impl FetchError {
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::Request { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Result of a successful fetch.
#[derive(Debug, Default)]
pub struct Fetched {
    /// New orders found in the response; they go back into the frontier.
    pub discovered: Vec<Order>,
    /// Server supplied hint for when to come back
    pub retry_after: Option<Duration>,
}

/// Fetcher interface
///
/// The engine calls `fetch` with the host of `order` checked out, so an
/// implementation never sees two concurrent calls for the same host. The host
/// stays checked out until the returned future completes, also when it runs
/// past `fetch_timeout`, so an implementation must not leave work for the
/// order running after it returns.
#[async_trait]
pub trait Fetcher {
    async fn fetch(&self, order: &Order) -> Result<Fetched, FetchError>;
}
