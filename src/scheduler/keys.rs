//! Sort keys for the ready and sleeping sets.
//!
//! A key is a snapshot of the queue state it was built from. Whenever that
//! state changes while the queue sits in a set, the old key must be removed
//! and a fresh one inserted.

use std::cmp::Ordering;

use tokio::time::Instant;

use super::host_queue::HostQueue;

/// Highest top priority first; among equals, whichever became ready first.
#[derive(Clone, Debug)]
pub(super) struct ReadyKey {
    pub priority: f64,
    pub stamp: u64,
    pub host: String,
}

impl ReadyKey {
    /// `None` for an empty queue, which must never be ready.
    pub fn for_queue(queue: &HostQueue, stamp: u64) -> Option<Self> {
        queue.top_priority().map(|priority| Self {
            priority,
            stamp,
            host: queue.host().to_owned(),
        })
    }

    /// The key to use after the queue changed, or `None` if this one is still
    /// accurate.
    pub fn refreshed(&self, queue: &HostQueue) -> Option<Self> {
        let priority = queue.top_priority()?;
        if priority.total_cmp(&self.priority) == Ordering::Equal {
            return None;
        }
        Some(Self {
            priority,
            stamp: self.stamp,
            host: self.host.clone(),
        })
    }
}

impl Ord for ReadyKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| self.stamp.cmp(&other.stamp))
            .then_with(|| self.host.cmp(&other.host))
    }
}

impl PartialOrd for ReadyKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ReadyKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ReadyKey {}

/// Earliest wake time first; among equals, whichever went to sleep first.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(super) struct SleepKey {
    pub wake_at: Instant,
    pub stamp: u64,
    pub host: String,
}

impl SleepKey {
    pub fn for_queue(queue: &HostQueue, stamp: u64) -> Self {
        Self {
            wake_at: queue.next_visit(),
            stamp,
            host: queue.host().to_owned(),
        }
    }
}
