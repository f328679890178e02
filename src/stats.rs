use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{NaiveDateTime, Utc};

pub struct Stats {
    total_fetched: AtomicU64,
    total_failed: AtomicU64,
    total_discovered: AtomicU64,
    total_dropped: AtomicU64,
    start_time: NaiveDateTime,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            total_fetched: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
            total_discovered: AtomicU64::new(0),
            total_dropped: AtomicU64::new(0),
            start_time: Utc::now().naive_utc(),
        }
    }

    pub fn incr_total_fetched(&self) {
        self.total_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_total_failed(&self) {
        self.total_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_total_discovered(&self, value: u64) {
        self.total_discovered.fetch_add(value, Ordering::Relaxed);
    }

    // Discovered orders turned away because the frontier was full
    pub fn add_total_dropped(&self, value: u64) {
        self.total_dropped.fetch_add(value, Ordering::Relaxed);
    }

    pub fn total_fetched(&self) -> u64 {
        self.total_fetched.load(Ordering::Relaxed)
    }

    pub fn total_failed(&self) -> u64 {
        self.total_failed.load(Ordering::Relaxed)
    }

    pub fn total_discovered(&self) -> u64 {
        self.total_discovered.load(Ordering::Relaxed)
    }

    pub fn total_dropped(&self) -> u64 {
        self.total_dropped.load(Ordering::Relaxed)
    }

    pub fn fetched_per_minute(&self) -> u64 {
        let fetched = self.total_fetched();
        let elapsed = (self.elapsed_time() / 60) as u64;
        if elapsed > 0 {
            fetched / elapsed
        } else {
            0
        }
    }

    /// Elapsed time since the engine was created in seconds
    pub fn elapsed_time(&self) -> i64 {
        let now = Utc::now().naive_utc();
        let elapsed = now - self.start_time;
        elapsed.num_seconds()
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}
