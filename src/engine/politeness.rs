use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use crate::Config;

/// Decides when a host may be visited again after a fetch.
///
/// Successful fetches wait `download_delay` plus up to `jitter`. Consecutive
/// failures back off exponentially from `failure_backoff`, capped at
/// `max_backoff`. A server supplied Retry-After is never undercut.
pub struct Politeness {
    delay: Duration,
    jitter: Duration,
    failure_backoff: Duration,
    max_backoff: Duration,
    // Consecutive failures per host. Only hosts currently failing are kept.
    failures: Mutex<HashMap<String, u32>>,
}

impl Politeness {
    pub fn new(config: &Config) -> Self {
        Self {
            delay: config.download_delay(),
            jitter: config.download_delay_jitter(),
            failure_backoff: config.failure_backoff(),
            max_backoff: config.max_backoff(),
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn on_success(&self, host: &str, retry_after: Option<Duration>) -> Instant {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(host);

        let mut delay = self.delay;
        if !self.jitter.is_zero() {
            let jitter_ms = self.jitter.as_millis() as u64;
            delay += Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms));
        }
        Instant::now() + delay.max(retry_after.unwrap_or_default())
    }

    pub fn on_failure(&self, host: &str, retry_after: Option<Duration>) -> Instant {
        let failures = {
            let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
            let count = failures.entry(host.to_owned()).or_insert(0);
            *count = count.saturating_add(1);
            *count
        };
        let backoff = self.backoff(failures);
        log::debug!("{} failed {} time(s) in a row, backing off {:?}", host, failures, backoff);
        Instant::now() + backoff.max(retry_after.unwrap_or_default())
    }

    fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.failure_backoff
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Drop what is known about `host`. Called once the host has left the
    /// frontier.
    pub fn forget(&self, host: &str) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(host);
    }

    /// Number of hosts with a failure streak on record.
    pub fn failing_hosts(&self) -> usize {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn failures(&self, host: &str) -> u32 {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host)
            .copied()
            .unwrap_or(0)
    }
}
