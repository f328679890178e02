use std::sync::Arc;

use tokio::sync::broadcast;

mod politeness;
mod reporting_task;
mod worker_task;

use crate::config::{Config, ConfigError};
use crate::fetcher::Fetcher;
use crate::scheduler::{Order, Scheduler};
use crate::stats::Stats;

pub use politeness::Politeness;

use reporting_task::start_reporting_thread;
use worker_task::start_worker_thread;

struct EngineState {
    config: Arc<Config>,
    scheduler: Scheduler,
    fetcher: Box<dyn Fetcher + Send + Sync>,
    politeness: Politeness,
    stats: Stats,
}

// Note that `config` and `fetcher` are read-only after initialization and
// the scheduler synchronizes itself, so none of it sits behind a mutex.
pub struct Engine {
    state: Arc<EngineState>,
}

impl Engine {
    pub fn new(
        config: Config,
        fetcher: Box<dyn Fetcher + Send + Sync>,
    ) -> Result<Self, ConfigError> {
        config.sanity_check()?;
        let scheduler = Scheduler::with_abandon_delay(config.abandon_delay());
        let politeness = Politeness::new(&config);
        let state = EngineState {
            config: Arc::new(config),
            scheduler,
            fetcher,
            politeness,
            stats: Stats::new(),
        };
        Ok(Self { state: Arc::new(state) })
    }

    /// The frontier the workers draw from. Producers outside the engine may
    /// enqueue into it at any time.
    pub fn scheduler(&self) -> &Scheduler {
        &self.state.scheduler
    }

    pub fn stats(&self) -> &Stats {
        &self.state.stats
    }

    pub fn politeness(&self) -> &Politeness {
        &self.state.politeness
    }

    pub fn seed<I>(&self, orders: I)
    where
        I: IntoIterator<Item = Order>,
    {
        self.state.scheduler.enqueue_all(orders);
    }

    /// Run the workers until the frontier drains (with `exit_when_idle`) or
    /// Ctrl-C is pressed (with `handle_ctrlc`).
    pub async fn start(&self) {
        let config = &self.state.config;

        if config.exit_when_idle && self.state.scheduler.is_idle() {
            log::info!("Nothing to crawl");
            return;
        }

        let (stop_tx, _) = broadcast::channel::<()>(32);
        if config.handle_ctrlc {
            let tx = stop_tx.clone();
            let res = ctrlc::set_handler(move || {
                let _ = tx.send(());
            });
            if let Err(e) = res {
                log::warn!("failed to install Ctrl-C handler: {}", e);
            }
        }

        // Subscribe everyone before any worker can send the stop signal.
        let worker_rxs: Vec<_> = (0..config.concurrent_requests)
            .map(|_| stop_tx.subscribe())
            .collect();
        let reporting_rx = stop_tx.subscribe();

        let mut join_handles = vec![];
        log::debug!("concurrent requests: {}", config.concurrent_requests);
        for (i, stop_rx) in worker_rxs.into_iter().enumerate() {
            let handle = start_worker_thread(
                (i + 1) as u32,
                self.state.clone(),
                stop_tx.clone(),
                stop_rx,
            );
            join_handles.push(handle);
        }
        join_handles.push(start_reporting_thread(self.state.clone(), reporting_rx));

        for h in join_handles {
            if let Err(e) = h.await {
                log::error!("{}", e);
            }
        }

        log::info!(
            "Exit gracefully, {} fetched, {} failed, {} pending",
            self.state.stats.total_fetched(),
            self.state.stats.total_failed(),
            self.state.scheduler.pending_count(),
        );
    }
}
