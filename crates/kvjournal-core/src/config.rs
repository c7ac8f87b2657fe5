//! Journal configuration
//!
//! Only the backing file path is required. The remaining knobs default to an
//! unbounded queue, a single sync at close, and three write retries.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{JournalError, JournalResult};

/// When the journal forces written records onto persistent media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    /// Leave flushing to the OS page cache
    Never,
    /// One durable sync when the journal is closed
    #[default]
    OnClose,
    /// Durable sync after every record (slow, strongest guarantee)
    EveryRecord,
}

/// Journal configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Location of the backing file; created if absent, appended to if present
    pub path: PathBuf,
    /// Maximum pending records before `append` fails with `QueueFull`.
    /// `None` means unbounded: sustained overload grows memory without limit.
    pub capacity: Option<usize>,
    /// Durable sync policy for the backing file
    pub sync: SyncPolicy,
    /// Extra attempts for a failed record write before it is dead-lettered
    pub write_retries: u32,
    /// Pause between write attempts
    pub retry_backoff: Duration,
}

impl Config {
    /// Configuration with defaults for everything but the path.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            capacity: None,
            sync: SyncPolicy::default(),
            write_retries: 3,
            retry_backoff: Duration::from_millis(10),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_sync(mut self, sync: SyncPolicy) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_write_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.write_retries = retries;
        self.retry_backoff = backoff;
        self
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> JournalResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(config_error("path must not be empty"));
        }
        if self.path.is_dir() {
            return Err(config_error(format!(
                "path {} is a directory",
                self.path.display()
            )));
        }
        if self.capacity == Some(0) {
            return Err(config_error("capacity must be > 0"));
        }
        if self.write_retries > 100 {
            return Err(config_error("write_retries must be <= 100"));
        }
        if self.retry_backoff > Duration::from_secs(10) {
            return Err(config_error("retry_backoff must be <= 10s"));
        }
        Ok(())
    }
}

fn config_error(reason: impl Into<String>) -> JournalError {
    JournalError::Config {
        reason: reason.into(),
    }
}
