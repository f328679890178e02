//! Error types for the scheduler module

use thiserror::Error;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors.
///
/// Every variant is a protocol violation by the caller; nothing inside the
/// scheduler performs I/O or can fail transiently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// `remove_top` was called on a host queue with no pending orders
    #[error("host queue for '{host}' is empty")]
    EmptyQueue { host: String },

    /// A release or removal was attempted through a handle that does not
    /// hold the host's current checkout
    #[error("host '{host}' is not checked out by this lease")]
    NotCheckedOut { host: String },

    /// The url could not be turned into a crawl target
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl SchedulerError {
    pub fn empty_queue(host: impl Into<String>) -> Self {
        Self::EmptyQueue { host: host.into() }
    }

    pub fn not_checked_out(host: impl Into<String>) -> Self {
        Self::NotCheckedOut { host: host.into() }
    }

    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}
