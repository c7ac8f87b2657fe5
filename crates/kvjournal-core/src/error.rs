//! Error types for journal operations
//!
//! Request-time failures (bad config, double start, append after close) are
//! returned to the caller. Consumer-side write failures happen after `append`
//! has already returned, so they surface through `Stats::failed` and the log
//! instead of through this type.

use std::path::PathBuf;

use thiserror::Error;

/// Journal error types with enough context to diagnose the failing file or frame.
#[derive(Debug, Clone, Error)]
pub enum JournalError {
    /// Configuration rejected before any file was touched
    #[error("invalid journal configuration: {reason}")]
    Config {
        /// What is wrong with the configuration
        reason: String,
    },

    /// Opening, writing, syncing or reading the journal file failed
    #[error("{}", io_message(.path, .message, .kind))]
    Io {
        /// The file path where the error occurred
        path: Option<PathBuf>,
        /// The underlying I/O error kind
        kind: std::io::ErrorKind,
        /// Human-readable description
        message: String,
    },

    /// Deleting the journal file during destroy failed
    #[error("failed to remove journal file {}: {message} ({kind})", .path.display())]
    Remove {
        path: PathBuf,
        kind: std::io::ErrorKind,
        message: String,
    },

    /// Operation attempted after close or destroy
    #[error("journal is closed")]
    Closed,

    /// `start` called while the consumer is already running
    #[error("journal consumer is already running")]
    AlreadyRunning,

    /// Bounded queue is at capacity
    #[error("journal queue is full ({capacity} records pending)")]
    QueueFull { capacity: usize },

    /// Key or value is too large to be framed
    #[error("entry {component} too large: {size} bytes exceeds limit of {max} bytes")]
    OversizedEntry {
        /// "key" or "value"
        component: &'static str,
        size: u64,
        max: u64,
    },

    /// Frame structure is invalid
    #[error("journal corrupted at offset {offset}: {reason}")]
    Corrupted { offset: u64, reason: String },

    /// CRC32C of a frame body does not match its header
    #[error("checksum mismatch at offset {offset}: expected 0x{expected:08x}, got 0x{actual:08x}")]
    ChecksumMismatch {
        offset: u64,
        expected: u32,
        actual: u32,
    },

    /// Frame extends past the end of the available bytes
    #[error("torn write at offset {offset}: need {needed} bytes, only {available} available")]
    TornWrite {
        offset: u64,
        needed: u64,
        available: u64,
    },
}

fn io_message(path: &Option<PathBuf>, message: &str, kind: &std::io::ErrorKind) -> String {
    match path {
        Some(path) => format!("I/O error in {}: {} ({})", path.display(), message, kind),
        None => format!("I/O error: {} ({})", message, kind),
    }
}

impl JournalError {
    /// Wrap an I/O error with the path it happened on.
    pub(crate) fn io(path: impl Into<PathBuf>, context: &str, err: std::io::Error) -> Self {
        JournalError::Io {
            path: Some(path.into()),
            kind: err.kind(),
            message: format!("{}: {}", context, err),
        }
    }
}

impl From<std::io::Error> for JournalError {
    fn from(err: std::io::Error) -> Self {
        JournalError::Io {
            path: None,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for journal operations
pub type JournalResult<T> = Result<T, JournalError>;
