use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tokio::time::Instant;

use super::error::{SchedulerError, SchedulerResult};
use super::order::Order;

// Heap entry. `seq` breaks priority ties so that equal priorities come out in
// insertion order.
#[derive(Debug)]
struct Entry {
    order: Order,
    seq: u64,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order
            .priority()
            .total_cmp(&other.order.priority())
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

/// Pending orders for a single host, highest priority first, plus the
/// earliest instant the host may be fetched again.
#[derive(Debug)]
pub struct HostQueue {
    host: String,
    orders: BinaryHeap<Entry>,
    next_seq: u64,
    next_visit: Instant,
}

impl HostQueue {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            orders: BinaryHeap::new(),
            next_seq: 0,
            next_visit: Instant::now(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Insert an order. The order must belong to this queue's host.
    pub fn add(&mut self, order: Order) {
        debug_assert_eq!(order.host(), self.host);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.orders.push(Entry { order, seq });
    }

    pub fn peek_top(&self) -> Option<&Order> {
        self.orders.peek().map(|entry| &entry.order)
    }

    pub fn remove_top(&mut self) -> SchedulerResult<Order> {
        self.orders
            .pop()
            .map(|entry| entry.order)
            .ok_or_else(|| SchedulerError::empty_queue(&self.host))
    }

    /// Priority of the top order, if any.
    pub fn top_priority(&self) -> Option<f64> {
        self.peek_top().map(Order::priority)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn next_visit(&self) -> Instant {
        self.next_visit
    }

    pub fn set_next_visit(&mut self, next_visit: Instant) {
        self.next_visit = next_visit;
    }
}
