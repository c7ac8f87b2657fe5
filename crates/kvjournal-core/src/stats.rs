//! Per-journal progress counters
//!
//! Plain atomics with relaxed ordering: readers never block producers or the
//! consumer, and a `Stats` snapshot is not consistent across fields.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::entry::OpCode;

/// Live counters owned by one journal.
#[derive(Debug, Default)]
pub struct JournalStats {
    queue_len: AtomicU64,
    put: AtomicU64,
    update_ttl: AtomicU64,
    delete: AtomicU64,
    failed: AtomicU64,
    sync_failed: AtomicU64,
    bytes_written: AtomicU64,
}

impl JournalStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A record entered the queue.
    pub(crate) fn enqueued(&self) {
        self.queue_len.fetch_add(1, Ordering::Relaxed);
    }

    /// A record left the queue, written or dead-lettered.
    ///
    /// Saturates at zero so a stray call cannot wrap the gauge.
    pub(crate) fn dequeued(&self) {
        let _ = self
            .queue_len
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |len| len.checked_sub(1));
    }

    /// A record of kind `op` reached the file.
    pub(crate) fn persisted(&self, op: OpCode, bytes: u64) {
        let counter = match op {
            OpCode::Put => &self.put,
            OpCode::UpdateTtl => &self.update_ttl,
            OpCode::Delete => &self.delete,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// A record was dropped after exhausting its write attempts.
    pub(crate) fn dead_lettered(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A written record could not be synced. It stays counted as persisted.
    pub(crate) fn sync_failure(&self) {
        self.sync_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Stats {
        Stats {
            queue_len: self.queue_len.load(Ordering::Relaxed),
            put: self.put.load(Ordering::Relaxed),
            update_ttl: self.update_ttl.load(Ordering::Relaxed),
            delete: self.delete.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            sync_failed: self.sync_failed.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the journal counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Records enqueued but not yet written or dead-lettered
    pub queue_len: u64,
    pub put: u64,
    pub update_ttl: u64,
    pub delete: u64,
    /// Records dropped after exhausting write retries
    pub failed: u64,
    /// Records written whose per-record sync still failed after retries
    pub sync_failed: u64,
    /// Framed bytes appended to the file
    pub bytes_written: u64,
}

impl Stats {
    /// Records successfully written, all kinds.
    pub fn persisted(&self) -> u64 {
        self.put + self.update_ttl + self.delete
    }
}
