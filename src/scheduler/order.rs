use std::fmt;

use crate::util;

use super::error::{SchedulerError, SchedulerResult};

pub const DEFAULT_PRIORITY: f64 = 1.0;

/// What kind of document an order points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OrderKind {
    Page,
    Feed,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Page => write!(f, "page"),
            OrderKind::Feed => write!(f, "feed"),
        }
    }
}

/// An already-normalized url together with the host it belongs to and a
/// stable key identifying it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Target {
    url: String,
    host: String,
    key: u64,
}

impl Target {
    /// Build a target from a url that the caller has already normalized.
    pub fn new(url: impl Into<String>, host: impl Into<String>) -> Self {
        let url = url.into();
        let key = util::url_key(&url);
        Self {
            url,
            host: host.into(),
            key,
        }
    }

    /// Normalize an absolute http(s) url and derive its host.
    pub fn parse(url: &str) -> SchedulerResult<Self> {
        let normalized = util::normalize_url(url)
            .map_err(|e| SchedulerError::invalid_url(url, e.to_string()))?;
        let host = util::get_host(&normalized)
            .ok_or_else(|| SchedulerError::invalid_url(url, "url has no host"))?;
        Ok(Self::new(normalized, host))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn key(&self) -> u64 {
        self.key
    }
}

/// One pending fetch. Orders are immutable; the scheduler never deduplicates
/// them.
#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    target: Target,
    kind: OrderKind,
    priority: f64,
}

impl Order {
    pub fn new(target: Target, kind: OrderKind, priority: f64) -> Self {
        // NaN has no place in a max-heap
        let priority = if priority.is_nan() {
            log::warn!("NaN priority for {}, treating as lowest", target.url());
            f64::NEG_INFINITY
        } else {
            priority
        };
        Self {
            target,
            kind,
            priority,
        }
    }

    pub fn page(target: Target, priority: f64) -> Self {
        Self::new(target, OrderKind::Page, priority)
    }

    pub fn feed(target: Target, priority: f64) -> Self {
        Self::new(target, OrderKind::Feed, priority)
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn host(&self) -> &str {
        self.target.host()
    }

    pub fn kind(&self) -> OrderKind {
        self.kind
    }

    pub fn priority(&self) -> f64 {
        self.priority
    }
}

/// A page at [`DEFAULT_PRIORITY`].
impl From<Target> for Order {
    fn from(target: Target) -> Self {
        Self::page(target, DEFAULT_PRIORITY)
    }
}
