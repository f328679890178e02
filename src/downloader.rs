use std::time::Duration;

use async_trait::async_trait;

use crate::fetcher::{FetchError, Fetched, Fetcher};
use crate::scheduler::Order;
use crate::Config;

/// Blocking `ureq` fetcher run on tokio's blocking pool.
///
/// It only fetches; it does not look at the body, so it never discovers new
/// orders. The agent's own timeout bounds each blocking call, and `fetch`
/// waits for that call to finish.
#[derive(Clone)]
pub struct Downloader {
    agent: ureq::Agent,
}

impl Downloader {
    pub fn new(config: &Config) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(&config.bot_name)
            .timeout(config.fetch_timeout())
            .build();
        Self { agent }
    }
}

#[async_trait]
impl Fetcher for Downloader {
    async fn fetch(&self, order: &Order) -> Result<Fetched, FetchError> {
        let agent = self.agent.clone();
        let url = order.target().url().to_owned();
        tokio::task::spawn_blocking(move || get(&agent, &url))
            .await
            .map_err(|_| FetchError::Killed)?
    }
}

fn get(agent: &ureq::Agent, url: &str) -> Result<Fetched, FetchError> {
    match agent.get(url).call() {
        Ok(response) => {
            let retry_after = response.header("retry-after").and_then(parse_retry_after);
            // Drain the body so the connection can be reused.
            if let Err(e) = response.into_string() {
                log::debug!("{}: {}", url, e);
            }
            Ok(Fetched {
                discovered: vec![],
                retry_after,
            })
        }
        Err(ureq::Error::Status(code, response)) => Err(FetchError::Request {
            url: url.to_owned(),
            reason: format!("status {}", code),
            retry_after: response.header("retry-after").and_then(parse_retry_after),
        }),
        Err(e) => Err(FetchError::Request {
            url: url.to_owned(),
            reason: e.to_string(),
            retry_after: None,
        }),
    }
}

/// Only the delta-seconds form of `Retry-After` is understood.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
