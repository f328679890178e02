//! Integration tests for the frontier
//!
//! All tests run on a paused tokio clock, so cooldowns elapse instantly and
//! deterministically once every task is waiting.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use frontier::scheduler::{Order, Scheduler, SchedulerError, Target};
use tokio::time::Instant;

fn order(host: &str, priority: f64) -> Order {
    let url = format!("https://{}/{}", host, priority);
    Order::page(Target::new(url, host), priority)
}

/// Acquire, take the top order and release with `cooldown`.
async fn dispatch(scheduler: &Scheduler, cooldown: Duration) -> Order {
    let mut lease = scheduler.acquire().await;
    let order = lease.remove_top().unwrap();
    lease.release_after(cooldown).unwrap();
    order
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_priority_ordering_within_host() {
    let scheduler = Scheduler::new();
    for p in [1.1, 1.2, 1.3] {
        scheduler.enqueue(order("h1", p));
    }

    let mut got = vec![];
    for _ in 0..3 {
        got.push(dispatch(&scheduler, Duration::ZERO).await.priority());
    }
    assert_eq!(got, vec![1.3, 1.2, 1.1]);
}

#[tokio::test(start_paused = true)]
async fn test_cross_host_ordering_interleaves_by_priority() {
    let scheduler = Scheduler::new();
    for (host, priorities) in [("h1", [1.1, 1.2]), ("h2", [2.1, 2.2]), ("h3", [3.1, 3.2])] {
        for p in priorities {
            scheduler.enqueue(order(host, p));
        }
    }

    let mut got = vec![];
    for _ in 0..6 {
        got.push(dispatch(&scheduler, Duration::from_millis(10)).await.priority());
    }
    assert_eq!(got, vec![3.2, 2.2, 1.2, 3.1, 2.1, 1.1]);
    assert_eq!(scheduler.host_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_woken_host_outranks_lower_ready_host() {
    let scheduler = Scheduler::new();
    scheduler.enqueue(order("high", 9.0));
    scheduler.enqueue(order("high", 8.0));

    let start = Instant::now();
    assert_eq!(dispatch(&scheduler, Duration::from_secs(1)).await.priority(), 9.0);
    scheduler.enqueue(order("low", 1.0));

    tokio::time::sleep_until(start + Duration::from_secs(1)).await;
    assert_eq!(dispatch(&scheduler, Duration::ZERO).await.priority(), 8.0);
    assert_eq!(dispatch(&scheduler, Duration::ZERO).await.priority(), 1.0);
}

// ============================================================================
// Mutual exclusion
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_checked_out_host_is_not_handed_out_again() {
    let scheduler = Scheduler::new();
    for i in 0..10 {
        scheduler.enqueue(order("h1", i as f64));
    }

    let mut lease = scheduler.acquire().await;
    lease.remove_top().unwrap();
    assert!(scheduler.try_acquire().is_none());
    assert!(scheduler
        .acquire_timeout(Duration::from_secs(60))
        .await
        .is_none());

    lease.release(Instant::now()).unwrap();
    let lease = scheduler.acquire_timeout(Duration::from_secs(1)).await;
    assert_eq!(lease.map(|l| l.host().to_owned()), Some("h1".to_owned()));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_workers_never_share_a_host() {
    let scheduler = Scheduler::new();
    let hosts = ["a", "b", "c", "d"];
    for host in hosts {
        for i in 0..25 {
            scheduler.enqueue(order(host, i as f64));
        }
    }

    let in_flight = Arc::new(Mutex::new(HashSet::new()));
    let fetched = Arc::new(Mutex::new(0usize));
    let mut handles = vec![];
    for _ in 0..8 {
        let scheduler = scheduler.clone();
        let in_flight = in_flight.clone();
        let fetched = fetched.clone();
        handles.push(tokio::spawn(async move {
            while let Some(mut lease) = scheduler.acquire_timeout(Duration::from_secs(5)).await {
                let host = lease.host().to_owned();
                assert!(in_flight.lock().unwrap().insert(host.clone()), "{} fetched twice at once", host);
                lease.remove_top().unwrap();
                tokio::time::sleep(Duration::from_millis(3)).await;
                assert!(in_flight.lock().unwrap().remove(&host));
                *fetched.lock().unwrap() += 1;
                lease.release_after(Duration::from_millis(5)).unwrap();
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(*fetched.lock().unwrap(), 100);
    assert!(scheduler.is_idle());
}

// ============================================================================
// Cooldown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cooldown_is_honoured_without_new_enqueues() {
    let scheduler = Scheduler::new();
    scheduler.enqueue(order("h1", 2.0));
    scheduler.enqueue(order("h1", 1.0));

    let start = Instant::now();
    let mut lease = scheduler.acquire().await;
    lease.remove_top().unwrap();
    lease.release(start + Duration::from_secs(5)).unwrap();

    assert!(scheduler.try_acquire().is_none());
    let mut lease = scheduler.acquire().await;
    assert!(Instant::now() >= start + Duration::from_secs(5));
    assert_eq!(lease.remove_top().unwrap().priority(), 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_enqueue_into_sleeping_host_keeps_cooldown() {
    let scheduler = Scheduler::new();
    scheduler.enqueue(order("h1", 2.0));
    scheduler.enqueue(order("h1", 1.0));

    let start = Instant::now();
    let mut lease = scheduler.acquire().await;
    lease.remove_top().unwrap();
    assert!(lease.release(start + Duration::from_secs(5)).unwrap());

    scheduler.enqueue(order("h1", 100.0));
    let snapshot = scheduler.snapshot();
    assert_eq!(snapshot.sleeping, 1);
    assert_eq!(snapshot.ready, 0);
    assert_eq!(snapshot.pending, 2);
    assert!(scheduler.try_acquire().is_none());

    let mut lease = scheduler.acquire().await;
    assert_eq!(lease.host(), "h1");
    assert!(Instant::now() >= start + Duration::from_secs(5));
    assert_eq!(lease.remove_top().unwrap().priority(), 100.0);
}

#[tokio::test(start_paused = true)]
async fn test_blocked_acquire_wakes_for_new_host() {
    let scheduler = Scheduler::new();
    let waiter = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.acquire().await.host().to_owned() })
    };
    tokio::task::yield_now().await;
    scheduler.enqueue(order("late", 1.0));
    assert_eq!(waiter.await.unwrap(), "late");
}

#[tokio::test(start_paused = true)]
async fn test_blocked_acquire_picks_up_later_sleeper() {
    let scheduler = Scheduler::new();
    scheduler.enqueue(order("h1", 1.0));
    scheduler.enqueue(order("h1", 0.5));
    let mut lease = scheduler.acquire().await;
    lease.remove_top().unwrap();

    // The waiter starts with nothing to wait for but must learn about the
    // cooldown once the lease is released.
    let waiter = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.acquire().await.host().to_owned() })
    };
    tokio::task::yield_now().await;
    let start = Instant::now();
    lease.release_after(Duration::from_secs(3)).unwrap();

    assert_eq!(waiter.await.unwrap(), "h1");
    assert!(Instant::now() >= start + Duration::from_secs(3));
}

// ============================================================================
// Lifecycle and counters
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_drained_host_is_removed_and_recreated_ready() {
    let scheduler = Scheduler::new();
    scheduler.enqueue(order("h1", 1.0));

    let mut lease = scheduler.acquire().await;
    lease.remove_top().unwrap();
    lease.release_after(Duration::from_secs(3600)).unwrap();
    assert_eq!(scheduler.host_count(), 0);

    scheduler.enqueue(order("h1", 1.0));
    let lease = scheduler.try_acquire();
    assert!(lease.is_some(), "no cooldown should carry over");
}

#[tokio::test(start_paused = true)]
async fn test_pending_count_tracks_removals() {
    let scheduler = Scheduler::new();
    for host in ["a", "b"] {
        for p in [1.0, 2.0, 3.0] {
            scheduler.enqueue(order(host, p));
        }
    }
    assert_eq!(scheduler.pending_count(), 6);

    let mut lease = scheduler.acquire().await;
    assert_eq!(scheduler.pending_count(), 6);
    lease.remove_top().unwrap();
    assert_eq!(scheduler.pending_count(), 5);

    // Orders added to a checked out host still count.
    scheduler.enqueue(order(lease.host(), 0.1));
    assert_eq!(scheduler.pending_count(), 6);
    assert_eq!(lease.len(), 3);

    lease.release_after(Duration::from_secs(1)).unwrap();
    assert_eq!(scheduler.pending_count(), 6);

    let snapshot = scheduler.snapshot();
    assert_eq!(snapshot.hosts, 2);
    assert_eq!(snapshot.ready + snapshot.sleeping, 2);
    assert_eq!(snapshot.checked_out, 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_lease_is_released_with_abandon_delay() {
    let scheduler = Scheduler::with_abandon_delay(Duration::from_secs(30));
    scheduler.enqueue(order("h1", 2.0));
    scheduler.enqueue(order("h1", 1.0));

    let start = Instant::now();
    {
        let mut lease = scheduler.acquire().await;
        lease.remove_top().unwrap();
        // Dropped here, as if the fetch had panicked.
    }
    assert_eq!(scheduler.checked_out_count(), 0);
    assert_eq!(scheduler.snapshot().sleeping, 1);

    let _lease = scheduler.acquire().await;
    assert!(Instant::now() >= start + Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_lease_uses_next_visit_when_set() {
    let scheduler = Scheduler::new();
    scheduler.enqueue(order("h1", 2.0));
    scheduler.enqueue(order("h1", 1.0));

    let start = Instant::now();
    {
        let mut lease = scheduler.acquire().await;
        lease.remove_top().unwrap();
        lease.set_next_visit(start + Duration::from_secs(2));
    }

    let _lease = scheduler.acquire().await;
    let waited = Instant::now() - start;
    assert!(waited >= Duration::from_secs(2));
    assert!(waited < Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_lease_reports_empty_queue() {
    let scheduler = Scheduler::new();
    scheduler.enqueue(order("h1", 1.0));

    let mut lease = scheduler.acquire().await;
    lease.remove_top().unwrap();
    assert_eq!(
        lease.remove_top(),
        Err(SchedulerError::EmptyQueue { host: "h1".to_owned() })
    );
    lease.release(Instant::now()).unwrap();
}
