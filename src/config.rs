use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config.{field} {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bot name / user agent
    pub bot_name: String,
    /// Number of workers, which is also the maximum number of hosts fetched
    /// at the same time
    pub concurrent_requests: u32,
    /// The amount of time (in secs) to wait before fetching from the same
    /// host again after a successful fetch.
    pub download_delay: f32,
    /// Random extra delay (in secs) added on top of `download_delay`.
    pub download_delay_jitter: f32,
    /// Cooldown (in secs) after the first failed fetch of a host. Doubles with
    /// every consecutive failure.
    pub failure_backoff: f32,
    /// Upper bound (in secs) for the failure cooldown.
    pub max_backoff: f32,
    /// Give up on a single fetch after this many secs.
    pub fetch_timeout: f32,
    /// Cooldown (in secs) for a host whose worker went away without handing
    /// it back.
    pub abandon_delay: f32,
    /// Discovered orders are dropped while this many orders are pending. A
    /// value of 0 means that this setting will be ignored.
    pub max_pending: usize,
    /// Interval between progress reports in secs.
    pub report_interval_secs: u64,
    /// Stop once there is nothing pending and nothing in flight.
    pub exit_when_idle: bool,
    /// Install a Ctrl-C handler that stops the engine.
    pub handle_ctrlc: bool,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s)?;
        config.sanity_check()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn sanity_check(&self) -> Result<(), ConfigError> {
        if self.concurrent_requests == 0 {
            return Err(ConfigError::invalid("concurrent_requests", "cannot be zero"));
        }
        let delays = [
            ("download_delay", self.download_delay),
            ("download_delay_jitter", self.download_delay_jitter),
            ("failure_backoff", self.failure_backoff),
            ("max_backoff", self.max_backoff),
            ("abandon_delay", self.abandon_delay),
        ];
        for (field, value) in delays {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(field, "must be a positive number"));
            }
        }
        if !self.fetch_timeout.is_finite() || self.fetch_timeout <= 0.0 {
            return Err(ConfigError::invalid("fetch_timeout", "must be greater than zero"));
        }
        if self.max_backoff < self.failure_backoff {
            return Err(ConfigError::invalid(
                "max_backoff",
                "must be greater than or equal to config.failure_backoff",
            ));
        }
        if self.report_interval_secs == 0 {
            return Err(ConfigError::invalid("report_interval_secs", "cannot be zero"));
        }
        Ok(())
    }

    pub fn download_delay(&self) -> Duration {
        secs(self.download_delay)
    }

    pub fn download_delay_jitter(&self) -> Duration {
        secs(self.download_delay_jitter)
    }

    pub fn failure_backoff(&self) -> Duration {
        secs(self.failure_backoff)
    }

    pub fn max_backoff(&self) -> Duration {
        secs(self.max_backoff)
    }

    pub fn fetch_timeout(&self) -> Duration {
        secs(self.fetch_timeout)
    }

    pub fn abandon_delay(&self) -> Duration {
        secs(self.abandon_delay)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }
}

// Only called on values that passed `sanity_check`.
fn secs(value: f32) -> Duration {
    Duration::try_from_secs_f32(value).unwrap_or(Duration::ZERO)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_name: "frontierbot".to_owned(),
            concurrent_requests: 16,
            download_delay: 2.0,
            download_delay_jitter: 0.5,
            failure_backoff: 10.0,
            max_backoff: 600.0,
            fetch_timeout: 30.0,
            abandon_delay: 30.0,
            max_pending: 1_000_000,
            report_interval_secs: 60,
            exit_when_idle: true,
            handle_ctrlc: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_is_sane() {
        assert!(Config::default().sanity_check().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            bot_name = "testbot"
            concurrent_requests = 4
            download_delay = 0.25
            "#,
        )
        .unwrap();
        assert_eq!(config.bot_name, "testbot");
        assert_eq!(config.concurrent_requests, 4);
        assert_eq!(config.download_delay(), Duration::from_millis(250));
        assert_eq!(config.report_interval_secs, 60);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = Config::from_toml_str("concurrent_requests = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "concurrent_requests", .. }));
    }

    #[test]
    fn test_negative_delay_rejected() {
        let config = Config {
            download_delay: -1.0,
            ..Config::default()
        };
        assert!(matches!(
            config.sanity_check(),
            Err(ConfigError::Invalid { field: "download_delay", .. })
        ));
    }

    #[test]
    fn test_backoff_bounds() {
        let config = Config {
            failure_backoff: 60.0,
            max_backoff: 10.0,
            ..Config::default()
        };
        assert!(config.sanity_check().is_err());
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            Config::from_toml_str("concurrent_requests = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_pending = 10\nexit_when_idle = false").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.max_pending, 10);
        assert!(!config.exit_when_idle);
    }
}
