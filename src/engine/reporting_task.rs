use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::EngineState;

pub(super) fn start_reporting_thread(
    state: Arc<EngineState>,
    mut stop_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        'run: loop {
            let sleep = tokio::time::sleep(state.config.report_interval());
            tokio::pin!(sleep);

            tokio::select! {
                _ = stop_rx.recv() => {
                    break 'run;
                }
                _ = &mut sleep => {
                    let snapshot = state.scheduler.snapshot();
                    log::info!(
                        "{} fetched at {} pages/minute, {} failed, {} pending over {} hosts ({} ready, {} sleeping, {} in flight)",
                        state.stats.total_fetched(),
                        state.stats.fetched_per_minute(),
                        state.stats.total_failed(),
                        snapshot.pending,
                        snapshot.hosts,
                        snapshot.ready,
                        snapshot.sleeping,
                        snapshot.checked_out,
                    );
                }
            }
        }
    })
}
