//! Service configuration
//!
//! Loaded from a YAML file, then overridden from the environment (a `.env`
//! file is honoured by the binary). Each component receives only the section
//! it needs.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use trackport_common::logging::LogConfig;

use crate::error::{IngestError, Result};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default remote request timeout in seconds.
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;

/// Default number of attempts per remote operation.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default backoff unit; attempt `n` waits `n * unit` before the next try.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;

/// Default batch file name pattern (`YYYYMMDD_HHMMSS.csv`).
pub const DEFAULT_FILE_PATTERN: &str = r"^\d{8}_\d{6}\.csv$";

/// Default number of concurrent file workers.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Default capacity of the bounded work channel.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default wait after a filesystem event before the file is inspected.
pub const DEFAULT_EVENT_GRACE_MS: u64 = 500;

/// Default interval between the two stat samples of the stability check.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;

/// Default hard deadline for processing one file (10 minutes).
pub const DEFAULT_FILE_PROCESS_TIMEOUT_SECS: u64 = 600;

/// Default row error rate under which a file still counts as processed.
pub const DEFAULT_MAX_ERROR_RATE: f64 = 0.05;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub remote: RemoteConfig,
    pub file_watch: FileWatchConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Remote order service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// REST base URL, e.g. `https://shop.example.com/rest/V1`
    #[serde(default)]
    pub base_url: String,

    /// Bearer token
    #[serde(default)]
    pub token: String,

    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// Watched directory and worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileWatchConfig {
    pub directory: PathBuf,

    #[serde(default = "default_file_pattern")]
    pub file_pattern: String,

    pub processed_dir: PathBuf,

    pub failed_dir: PathBuf,

    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_event_grace_ms")]
    pub event_grace_ms: u64,

    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// 0 disables the per-file deadline
    #[serde(default = "default_file_process_timeout_secs")]
    pub file_process_timeout_secs: u64,

    #[serde(default = "default_max_error_rate")]
    pub max_error_rate: f64,
}

fn default_remote_timeout_secs() -> u64 {
    DEFAULT_REMOTE_TIMEOUT_SECS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}

fn default_file_pattern() -> String {
    DEFAULT_FILE_PATTERN.to_string()
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_event_grace_ms() -> u64 {
    DEFAULT_EVENT_GRACE_MS
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

fn default_file_process_timeout_secs() -> u64 {
    DEFAULT_FILE_PROCESS_TIMEOUT_SECS
}

fn default_max_error_rate() -> f64 {
    DEFAULT_MAX_ERROR_RATE
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl FileWatchConfig {
    /// Configuration with defaults for everything but the three directories
    pub fn new(
        directory: impl Into<PathBuf>,
        processed_dir: impl Into<PathBuf>,
        failed_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            directory: directory.into(),
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
            processed_dir: processed_dir.into(),
            failed_dir: failed_dir.into(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            event_grace_ms: DEFAULT_EVENT_GRACE_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            file_process_timeout_secs: DEFAULT_FILE_PROCESS_TIMEOUT_SECS,
            max_error_rate: DEFAULT_MAX_ERROR_RATE,
        }
    }

    pub fn pattern(&self) -> Result<Regex> {
        Ok(Regex::new(&self.file_pattern)?)
    }

    pub fn event_grace(&self) -> Duration {
        Duration::from_millis(self.event_grace_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn file_process_timeout(&self) -> Option<Duration> {
        (self.file_process_timeout_secs > 0)
            .then(|| Duration::from_secs(self.file_process_timeout_secs))
    }
}

impl Config {
    /// Load configuration from a YAML file, apply environment overrides and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: Config = trackport_common::fs::load_yaml(path)?;
        let config = config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Override settings from environment variables
    ///
    /// - `TRACKPORT_REMOTE_BASE_URL`, `TRACKPORT_REMOTE_TOKEN`
    /// - `TRACKPORT_WATCH_DIR`, `TRACKPORT_MAX_CONCURRENCY`
    /// - the `LOG_*` variables understood by [`LogConfig::apply_env`]
    pub fn apply_env(mut self) -> Result<Self> {
        if let Ok(url) = std::env::var("TRACKPORT_REMOTE_BASE_URL") {
            self.remote.base_url = url;
        }

        if let Ok(token) = std::env::var("TRACKPORT_REMOTE_TOKEN") {
            self.remote.token = token;
        }

        if let Ok(dir) = std::env::var("TRACKPORT_WATCH_DIR") {
            self.file_watch.directory = PathBuf::from(dir);
        }

        if let Ok(value) = std::env::var("TRACKPORT_MAX_CONCURRENCY") {
            self.file_watch.max_concurrency = value.parse().map_err(|_| {
                IngestError::config(format!("TRACKPORT_MAX_CONCURRENCY is not a number: {}", value))
            })?;
        }

        self.log = self.log.apply_env()?;

        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.remote.base_url.trim().is_empty() {
            return Err(IngestError::config("remote.base_url cannot be empty"));
        }

        if self.remote.token.trim().is_empty() {
            return Err(IngestError::config("remote.token cannot be empty"));
        }

        if self.remote.max_retries == 0 {
            return Err(IngestError::config("remote.max_retries must be greater than 0"));
        }

        let watch = &self.file_watch;
        for (name, dir) in [
            ("file_watch.directory", &watch.directory),
            ("file_watch.processed_dir", &watch.processed_dir),
            ("file_watch.failed_dir", &watch.failed_dir),
        ] {
            if dir.as_os_str().is_empty() {
                return Err(IngestError::config(format!("{} cannot be empty", name)));
            }
        }

        if watch.max_concurrency == 0 {
            return Err(IngestError::config(
                "file_watch.max_concurrency must be greater than 0",
            ));
        }

        if watch.queue_capacity == 0 {
            return Err(IngestError::config(
                "file_watch.queue_capacity must be greater than 0",
            ));
        }

        if !(watch.max_error_rate > 0.0 && watch.max_error_rate <= 1.0) {
            return Err(IngestError::config(format!(
                "file_watch.max_error_rate must be in (0, 1], got {}",
                watch.max_error_rate
            )));
        }

        watch.pattern()?;

        if watch.processed_dir == watch.directory || watch.failed_dir == watch.directory {
            tracing::warn!(
                "Processed or failed directory equals the watched directory; moved files may be picked up again"
            );
        }

        Ok(())
    }
}
