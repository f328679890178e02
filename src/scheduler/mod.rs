//! Politeness-aware frontier.
//!
//! Orders are grouped into one [`HostQueue`] per host. A host queue lives in
//! exactly one place at a time:
//!
//! - the *ready* set, ordered by the priority of its top order,
//! - the *sleeping* set, ordered by the instant its cooldown ends,
//! - or in the hands of a single worker through a [`Lease`].
//!
//! Because a checked out host is in neither set, no two workers ever fetch
//! the same host at once. Politeness is the cooldown the worker sets when it
//! hands the host back.
//!
//! ```rust,ignore
//! let scheduler = Scheduler::new();
//! scheduler.enqueue(Order::page(Target::parse("https://example.com/")?, 1.0));
//!
//! let mut lease = scheduler.acquire().await;
//! let order = lease.remove_top()?;
//! // ... fetch order.target().url() ...
//! lease.release_after(Duration::from_secs(2))?;
//! ```

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

pub mod error;
mod host_queue;
mod keys;
mod order;

pub use error::{SchedulerError, SchedulerResult};
pub use host_queue::HostQueue;
pub use order::{Order, OrderKind, Target, DEFAULT_PRIORITY};

use keys::{ReadyKey, SleepKey};

/// Cooldown applied to a host whose lease is dropped without being released.
pub const DEFAULT_ABANDON_DELAY: Duration = Duration::from_secs(30);

/// Counters describing the frontier at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub pending: usize,
    pub hosts: usize,
    pub ready: usize,
    pub sleeping: usize,
    pub checked_out: usize,
}

/// Shared handle to the frontier. Cloning is cheap; all clones see the same
/// state.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<State>,
    notify: Notify,
    abandon_delay: Duration,
}

enum Slot {
    Ready(ReadyKey),
    Sleeping(SleepKey),
    CheckedOut(u64),
}

struct HostEntry {
    queue: HostQueue,
    slot: Slot,
}

// `hosts`, `ready` and `sleeping` are only consistent with each other as a
// whole, so they share one lock.
#[derive(Default)]
struct State {
    hosts: HashMap<String, HostEntry>,
    ready: BTreeSet<ReadyKey>,
    sleeping: BTreeSet<SleepKey>,
    pending: usize,
    checked_out: usize,
    next_stamp: u64,
}

enum Poll {
    Leased { host: String, ticket: u64 },
    Wait(Option<Instant>),
}

impl State {
    fn stamp(&mut self) -> u64 {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        stamp
    }

    /// Returns whether a host became ready.
    fn enqueue(&mut self, order: Order) -> bool {
        let stamp = self.stamp();
        self.pending += 1;
        match self.hosts.entry(order.host().to_owned()) {
            Entry::Vacant(vacant) => {
                let key = ReadyKey {
                    priority: order.priority(),
                    stamp,
                    host: vacant.key().clone(),
                };
                let mut queue = HostQueue::new(vacant.key().clone());
                queue.add(order);
                self.ready.insert(key.clone());
                vacant.insert(HostEntry {
                    queue,
                    slot: Slot::Ready(key),
                });
                true
            }
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.queue.add(order);
                // A sleeping host's wake time is unaffected by new orders and
                // a checked out host is in no set at all.
                if let Slot::Ready(key) = &mut entry.slot {
                    if let Some(fresh) = key.refreshed(&entry.queue) {
                        self.ready.remove(&*key);
                        self.ready.insert(fresh.clone());
                        *key = fresh;
                    }
                }
                false
            }
        }
    }

    /// Moves every host whose cooldown has ended into the ready set.
    fn promote_expired(&mut self, now: Instant) -> usize {
        let mut promoted = 0;
        while let Some(first) = self.sleeping.first() {
            if first.wake_at > now {
                break;
            }
            let Some(key) = self.sleeping.pop_first() else {
                break;
            };
            let stamp = self.stamp();
            let Some(entry) = self.hosts.get_mut(&key.host) else {
                log::error!("sleeping host {} has no queue", key.host);
                continue;
            };
            debug_assert!(matches!(&entry.slot, Slot::Sleeping(slept) if *slept == key));
            match ReadyKey::for_queue(&entry.queue, stamp) {
                Some(ready) => {
                    self.ready.insert(ready.clone());
                    entry.slot = Slot::Ready(ready);
                    promoted += 1;
                }
                None => {
                    log::error!("sleeping host {} has an empty queue", key.host);
                    self.hosts.remove(&key.host);
                }
            }
        }
        promoted
    }

    fn poll_checkout(&mut self, now: Instant) -> Poll {
        // Expired sleepers compete with hosts that are already ready.
        let promoted = self.promote_expired(now);
        if promoted > 0 {
            log::debug!("{} host(s) woke up", promoted);
        }
        while let Some(key) = self.ready.pop_first() {
            let ticket = self.stamp();
            match self.hosts.get_mut(&key.host) {
                Some(entry) => {
                    entry.slot = Slot::CheckedOut(ticket);
                    self.checked_out += 1;
                    return Poll::Leased {
                        host: key.host,
                        ticket,
                    };
                }
                None => log::error!("ready host {} has no queue", key.host),
            }
        }
        Poll::Wait(self.sleeping.first().map(|key| key.wake_at))
    }

    fn checked_out_entry(&mut self, host: &str, ticket: u64) -> SchedulerResult<&mut HostEntry> {
        match self.hosts.get_mut(host) {
            Some(entry) if matches!(entry.slot, Slot::CheckedOut(t) if t == ticket) => Ok(entry),
            _ => Err(SchedulerError::not_checked_out(host)),
        }
    }

    fn remove_top(&mut self, host: &str, ticket: u64) -> SchedulerResult<Order> {
        let order = self.checked_out_entry(host, ticket)?.queue.remove_top()?;
        self.pending -= 1;
        Ok(order)
    }

    /// Returns whether the host went to sleep (as opposed to being dropped).
    fn release(&mut self, host: &str, ticket: u64, next_visit: Instant) -> SchedulerResult<bool> {
        let stamp = self.stamp();
        let entry = self.checked_out_entry(host, ticket)?;
        if entry.queue.is_empty() {
            self.hosts.remove(host);
            self.checked_out -= 1;
            return Ok(false);
        }
        entry.queue.set_next_visit(next_visit);
        let key = SleepKey::for_queue(&entry.queue, stamp);
        entry.slot = Slot::Sleeping(key.clone());
        self.sleeping.insert(key);
        self.checked_out -= 1;
        Ok(true)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            pending: self.pending,
            hosts: self.hosts.len(),
            ready: self.ready.len(),
            sleeping: self.sleeping.len(),
            checked_out: self.checked_out,
        }
    }
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        // No state mutation can panic half way, so a poisoned lock still
        // guards consistent data.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, host: &str, ticket: u64, next_visit: Instant) -> SchedulerResult<bool> {
        let went_to_sleep = self.state().release(host, ticket, next_visit)?;
        if went_to_sleep {
            // Waiters may be blocked on a later deadline, or on none at all.
            self.notify.notify_waiters();
        } else {
            log::debug!("host {} drained, dropped from frontier", host);
        }
        Ok(went_to_sleep)
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_abandon_delay(DEFAULT_ABANDON_DELAY)
    }

    /// `abandon_delay` is the cooldown given to a host whose lease is dropped
    /// without an explicit release.
    pub fn with_abandon_delay(abandon_delay: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                notify: Notify::new(),
                abandon_delay,
            }),
        }
    }

    /// Add an order to the frontier. Never blocks on anything but the state
    /// lock.
    pub fn enqueue(&self, order: Order) {
        let became_ready = self.shared.state().enqueue(order);
        if became_ready {
            self.shared.notify.notify_one();
        }
    }

    pub fn enqueue_all<I>(&self, orders: I)
    where
        I: IntoIterator<Item = Order>,
    {
        let mut became_ready = 0;
        {
            let mut state = self.shared.state();
            for order in orders {
                if state.enqueue(order) {
                    became_ready += 1;
                }
            }
        }
        for _ in 0..became_ready {
            self.shared.notify.notify_one();
        }
    }

    /// Wait for the highest priority host that is allowed to be fetched now
    /// and check it out.
    ///
    /// The returned lease always holds at least one order. Dropping the
    /// future before it resolves never loses a checkout.
    pub async fn acquire(&self) -> Lease {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            // Register before looking at the state so that a release or
            // enqueue in between is not missed.
            notified.as_mut().enable();

            let wake_at = match self.poll() {
                Ok(lease) => return lease,
                Err(wake_at) => wake_at,
            };

            match wake_at {
                Some(deadline) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = tokio::time::sleep_until(deadline) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Check out a host if one is ready right now.
    pub fn try_acquire(&self) -> Option<Lease> {
        self.poll().ok()
    }

    /// Like [`Scheduler::acquire`], giving up after `timeout`.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Option<Lease> {
        tokio::time::timeout(timeout, self.acquire()).await.ok()
    }

    fn poll(&self) -> Result<Lease, Option<Instant>> {
        let poll = self.shared.state().poll_checkout(Instant::now());
        match poll {
            Poll::Leased { host, ticket } => Ok(Lease {
                shared: self.shared.clone(),
                host,
                ticket,
                next_visit: None,
                released: false,
            }),
            Poll::Wait(wake_at) => Err(wake_at),
        }
    }

    /// Orders not yet removed, including those of checked out hosts.
    pub fn pending_count(&self) -> usize {
        self.shared.state().pending
    }

    pub fn checked_out_count(&self) -> usize {
        self.shared.state().checked_out
    }

    pub fn host_count(&self) -> usize {
        self.shared.state().hosts.len()
    }

    /// No pending orders and no outstanding leases.
    pub fn is_idle(&self) -> bool {
        let state = self.shared.state();
        state.pending == 0 && state.checked_out == 0
    }

    pub fn snapshot(&self) -> Snapshot {
        self.shared.state().snapshot()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive checkout of one host.
///
/// While a lease is alive no other worker can acquire its host. A lease that
/// is dropped without [`Lease::release`] hands the host back with the next
/// visit set through [`Lease::set_next_visit`], or with the scheduler's
/// abandon delay if none was set.
pub struct Lease {
    shared: Arc<Shared>,
    host: String,
    ticket: u64,
    next_visit: Option<Instant>,
    released: bool,
}

impl Lease {
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Take the highest priority order of this host.
    pub fn remove_top(&mut self) -> SchedulerResult<Order> {
        self.shared.state().remove_top(&self.host, self.ticket)
    }

    pub fn peek_top(&self) -> Option<Order> {
        let mut state = self.shared.state();
        let entry = state.checked_out_entry(&self.host, self.ticket).ok()?;
        entry.queue.peek_top().cloned()
    }

    /// Orders still queued for this host, including ones enqueued since the
    /// checkout.
    pub fn len(&self) -> usize {
        let mut state = self.shared.state();
        state
            .checked_out_entry(&self.host, self.ticket)
            .map(|entry| entry.queue.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_next_visit(&mut self, next_visit: Instant) {
        self.next_visit = Some(next_visit);
    }

    pub fn next_visit(&self) -> Option<Instant> {
        self.next_visit
    }

    /// Hand the host back. It will not be acquired again before
    /// `next_visit`; if it has no orders left it leaves the frontier and
    /// `false` is returned.
    pub fn release(mut self, next_visit: Instant) -> SchedulerResult<bool> {
        self.released = true;
        self.shared.release(&self.host, self.ticket, next_visit)
    }

    pub fn release_after(self, delay: Duration) -> SchedulerResult<bool> {
        self.release(Instant::now() + delay)
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let next_visit = match self.next_visit {
            Some(next_visit) => next_visit,
            None => {
                log::warn!(
                    "lease on {} dropped without release, backing off {:?}",
                    self.host,
                    self.shared.abandon_delay
                );
                Instant::now() + self.shared.abandon_delay
            }
        };
        if let Err(e) = self.shared.release(&self.host, self.ticket, next_visit) {
            log::error!("{}", e);
        }
    }
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("host", &self.host)
            .field("ticket", &self.ticket)
            .field("next_visit", &self.next_visit)
            .finish()
    }
}
