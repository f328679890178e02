use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::fetcher::FetchError;
use crate::scheduler::Lease;

use super::EngineState;

pub(super) fn start_worker_thread(
    worker_id: u32,
    state: Arc<EngineState>,
    stop_tx: broadcast::Sender<()>,
    mut stop_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    log::debug!("[worker-{}] start", worker_id);
    tokio::spawn(async move {
        'run: loop {
            let lease = tokio::select! {
                biased;
                _ = stop_rx.recv() => break 'run,
                lease = state.scheduler.acquire() => lease,
            };

            process(worker_id, &state, lease).await;

            if state.config.exit_when_idle && state.scheduler.is_idle() {
                // Crawl finished, exit.
                log::debug!("[worker-{}] frontier drained", worker_id);
                let _res = stop_tx.send(());
                break 'run;
            }
        }
        log::debug!("[worker-{}] stop", worker_id);
    })
}

async fn process(worker_id: u32, state: &EngineState, mut lease: Lease) {
    let order = match lease.remove_top() {
        Ok(order) => order,
        Err(e) => {
            log::error!("[worker-{}] {}", worker_id, e);
            release(worker_id, state, lease, Instant::now());
            return;
        }
    };
    let url = order.target().url();
    log::info!("[worker-{}] {} ({}, priority {})", worker_id, url, order.kind(), order.priority());

    let timeout = state.config.fetch_timeout();
    let mut fetch = state.fetcher.fetch(&order);
    let result = match tokio::time::timeout(timeout, &mut fetch).await {
        Ok(result) => result,
        Err(_) => {
            // The host stays checked out until the fetcher returns.
            log::warn!(
                "[worker-{}] {} still running after {:?}, holding {}",
                worker_id,
                url,
                timeout,
                lease.host()
            );
            if let Err(e) = fetch.await {
                log::debug!("[worker-{}] late result: {}", worker_id, e);
            }
            Err(FetchError::Timeout {
                url: url.to_owned(),
                elapsed: timeout,
            })
        }
    };

    let next_visit = match result {
        Ok(fetched) => {
            state.stats.incr_total_fetched();

            let discovered = fetched.discovered.len() as u64;
            state.stats.add_total_discovered(discovered);
            let max_pending = state.config.max_pending;
            let mut dropped = 0;
            for new_order in fetched.discovered {
                if max_pending > 0 && state.scheduler.pending_count() >= max_pending {
                    dropped += 1;
                    continue;
                }
                state.scheduler.enqueue(new_order);
            }
            if dropped > 0 {
                log::debug!(
                    "[worker-{}] frontier full, dropped {} discovered order(s)",
                    worker_id,
                    dropped
                );
                state.stats.add_total_dropped(dropped);
            }

            state.politeness.on_success(lease.host(), fetched.retry_after)
        }
        Err(e) => {
            log::error!("[worker-{}] {}", worker_id, e);
            state.stats.incr_total_failed();
            state.politeness.on_failure(lease.host(), e.retry_after())
        }
    };

    release(worker_id, state, lease, next_visit);
}

fn release(worker_id: u32, state: &EngineState, lease: Lease, next_visit: Instant) {
    let host = lease.host().to_owned();
    match lease.release(next_visit) {
        Ok(true) => {}
        // Drained: nothing left to be polite about.
        Ok(false) => state.politeness.forget(&host),
        Err(e) => log::error!("[worker-{}] {}", worker_id, e),
    }
}
