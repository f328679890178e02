mod config;
mod downloader;
mod engine;
mod fetcher;
mod stats;

pub mod scheduler;
pub mod util;

// (Re) Exports
pub use config::{Config, ConfigError};
pub use downloader::Downloader;
pub use engine::{Engine, Politeness};
pub use fetcher::{FetchError, Fetched, Fetcher};
pub use scheduler::{Lease, Order, OrderKind, Scheduler, SchedulerError, Target};
pub use stats::Stats;

/// Engine with the default config and the `ureq` downloader, seeded with
/// `seeds`.
pub fn engine<I>(seeds: I) -> Result<Engine, ConfigError>
where
    I: IntoIterator<Item = Order>,
{
    engine_with_config(Config::default(), seeds)
}

pub fn engine_with_config<I>(config: Config, seeds: I) -> Result<Engine, ConfigError>
where
    I: IntoIterator<Item = Order>,
{
    let downloader = Downloader::new(&config);
    let engine = Engine::new(config, Box::new(downloader))?;
    engine.seed(seeds);
    Ok(engine)
}
