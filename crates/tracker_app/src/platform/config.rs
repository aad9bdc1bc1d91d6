//! Optional RON settings file.
//!
//! ```ron
//! (
//!     base_url: Some("https://api.example.com/v1/"),
//!     request_timeout_ms: Some(10000),
//!     max_reconnect_attempts: Some(5),
//! )
//! ```
//!
//! Anything left out keeps its built-in default.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracker_core::TrackerConfig;
use tracker_engine::{FetchSettings, PollSettings, StreamSettings};
use tracker_logging::tracker_info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("no base URL: pass --base-url or set base_url in the config file")]
    MissingBaseUrl,
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerFileConfig {
    pub base_url: Option<String>,
    pub status_path: Option<String>,
    pub events_path: Option<String>,
    pub connect_timeout_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub max_poll_failures: Option<u32>,
    pub max_reconnect_attempts: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub long_running_after_secs: Option<u64>,
    pub hand_off_window_ms: Option<u64>,
}

/// Everything the tracker needs, with defaults filled in.
#[derive(Debug, Clone)]
pub struct Settings {
    pub fetch: FetchSettings,
    pub tracker: TrackerConfig,
    pub poll: PollSettings,
    pub stream: StreamSettings,
    /// Replaces the job preset's interval when set.
    pub poll_interval: Option<Duration>,
}

/// Reads `path` if given; no path means all defaults.
pub fn load(path: Option<&Path>) -> Result<TrackerFileConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(TrackerFileConfig::default());
    };
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = ron::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tracker_info!("loaded tracker configuration from {:?}", path);
    Ok(config)
}

impl TrackerFileConfig {
    /// Applies the file over the defaults; `base_url` from the command line
    /// wins over the file.
    pub fn resolve(self, base_url: Option<&str>) -> Result<Settings, ConfigError> {
        let base_url = base_url
            .map(str::to_string)
            .or(self.base_url)
            .ok_or(ConfigError::MissingBaseUrl)?;

        let mut fetch = FetchSettings::default().with_base_url(base_url);
        if let Some(path) = self.status_path {
            fetch.status_path = path;
        }
        if let Some(path) = self.events_path {
            fetch.events_path = path;
        }
        if let Some(ms) = self.connect_timeout_ms {
            fetch.connect_timeout = positive_ms(ms, "connect_timeout_ms")?;
        }
        if let Some(ms) = self.request_timeout_ms {
            fetch.request_timeout = positive_ms(ms, "request_timeout_ms")?;
        }

        let mut poll = PollSettings::default();
        if let Some(max) = self.max_poll_failures {
            if max == 0 {
                return Err(ConfigError::Zero("max_poll_failures"));
            }
            poll.max_consecutive_failures = max;
        }

        let mut stream = StreamSettings::default();
        if let Some(max) = self.max_reconnect_attempts {
            stream.max_reconnect_attempts = max;
        }
        if let Some(ms) = self.initial_backoff_ms {
            stream.initial_backoff = positive_ms(ms, "initial_backoff_ms")?;
        }
        if let Some(ms) = self.max_backoff_ms {
            stream.max_backoff = positive_ms(ms, "max_backoff_ms")?;
        }

        let mut tracker = TrackerConfig::default();
        if let Some(secs) = self.long_running_after_secs {
            tracker.long_running_after = Duration::from_secs(secs);
        }
        if let Some(ms) = self.hand_off_window_ms {
            tracker.hand_off_window = Duration::from_millis(ms);
        }

        let poll_interval = self
            .poll_interval_ms
            .map(|ms| positive_ms(ms, "poll_interval_ms"))
            .transpose()?;

        Ok(Settings {
            fetch,
            tracker,
            poll,
            stream,
            poll_interval,
        })
    }
}

fn positive_ms(ms: u64, field: &'static str) -> Result<Duration, ConfigError> {
    if ms == 0 {
        return Err(ConfigError::Zero(field));
    }
    Ok(Duration::from_millis(ms))
}
