//! Journal: lifecycle façade over the pending queue, consumer and file.
//!
//! **Write path**: `append` copies the entry into a record and pushes it onto
//! the in-memory queue. No disk I/O, so producer latency does not depend on
//! the device.
//! **Background**: after `start`, one consumer thread drains the queue into
//! the journal file in enqueue order.
//!
//! Lifecycle: Idle → Running → Closed → Destroyed. `close` and `destroy` are
//! also valid straight from Idle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::consumer::{drain, start_consumer, ConsumerHandle, RetryPolicy};
use crate::entry::{Entry, OpCode, Record};
use crate::error::{JournalError, JournalResult};
use crate::format::check_entry_size;
use crate::queue::PendingQueue;
use crate::stats::{JournalStats, Stats};
use crate::writer::JournalWriter;

/// Observable lifecycle state of a journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalState {
    Idle,
    Running,
    Closed,
    Destroyed,
}

enum State {
    /// Opened, writer parked until `start`
    Idle(JournalWriter),
    /// Writer owned by the consumer thread
    Running(ConsumerHandle),
    Closed,
    Destroyed,
}

/// Asynchronous operation journal for one shard.
///
/// All methods take `&self`; share it across producer threads with `Arc`.
/// Lifecycle calls serialize on the state mutex. `append` and `stats` never
/// touch it.
pub struct Journal {
    path: PathBuf,
    queue: Arc<PendingQueue>,
    stats: Arc<JournalStats>,
    state: Mutex<State>,
    retry: RetryPolicy,
}

impl Journal {
    /// Open or create the journal file described by `config`.
    ///
    /// Returns in the Idle state: appends are queued but nothing is written
    /// until `start` (or `close`).
    pub fn open(config: Config) -> JournalResult<Self> {
        config.validate()?;

        let writer = JournalWriter::open(&config)?;
        info!(
            path = %config.path.display(),
            existing_bytes = writer.size(),
            capacity = ?config.capacity,
            sync = ?config.sync,
            "journal opened"
        );

        let stats = Arc::new(JournalStats::new());
        let queue = Arc::new(PendingQueue::new(config.capacity, Arc::clone(&stats)));

        Ok(Self {
            path: config.path,
            queue,
            stats,
            state: Mutex::new(State::Idle(writer)),
            retry: RetryPolicy {
                retries: config.write_retries,
                backoff: config.retry_backoff,
            },
        })
    }

    /// Queue one operation for the journal.
    ///
    /// Reads the entry's accessors once and returns without waiting for disk.
    /// Concurrent callers are totally ordered by the queue lock.
    pub fn append<E: Entry + ?Sized>(
        &self,
        op: OpCode,
        fingerprint: u64,
        entry: &E,
    ) -> JournalResult<()> {
        check_entry_size(entry.key().as_bytes(), entry.value())?;
        self.queue.push(Record::from_entry(op, fingerprint, entry))
    }

    /// Spawn the consumer. Valid only from Idle.
    pub fn start(&self) -> JournalResult<()> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, State::Closed) {
            State::Idle(writer) => {
                match start_consumer(
                    writer,
                    Arc::clone(&self.queue),
                    Arc::clone(&self.stats),
                    self.retry,
                ) {
                    Ok(handle) => {
                        *state = State::Running(handle);
                        info!(
                            path = %self.path.display(),
                            pending = self.queue.len(),
                            "journal consumer starting"
                        );
                        Ok(())
                    }
                    Err(failed) => {
                        let pending = self.queue.len();
                        match failed.writer {
                            Some(writer) => {
                                *state = State::Idle(writer);
                                error!(
                                    path = %self.path.display(),
                                    pending,
                                    error = %failed.error,
                                    "journal consumer failed to start, still idle"
                                );
                            }
                            None => {
                                self.queue.close();
                                error!(
                                    path = %self.path.display(),
                                    stranded = pending,
                                    error = %failed.error,
                                    "journal consumer failed to start and lost its writer, closed"
                                );
                            }
                        }
                        Err(failed.error)
                    }
                }
            }
            State::Running(handle) => {
                *state = State::Running(handle);
                Err(JournalError::AlreadyRunning)
            }
            other => {
                *state = other;
                Err(JournalError::Closed)
            }
        }
    }

    /// Current counters. Lock-free; fields are read independently.
    pub fn stats(&self) -> Stats {
        self.stats.snapshot()
    }

    /// Block until every queued record is written or dropped, or `timeout`
    /// elapses. Returns whether the queue drained.
    ///
    /// Only makes progress while Running.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        self.queue.wait_drained(timeout)
    }

    /// Stop accepting appends, drain what is queued, and close the file.
    ///
    /// Idempotent. A journal that was never started writes its queued
    /// records here, on the calling thread.
    pub fn close(&self) -> JournalResult<()> {
        let mut state = self.state.lock();
        self.close_locked(&mut state)
    }

    /// Close, then delete the journal file.
    ///
    /// The journal ends Destroyed even when either step fails. A failed
    /// deletion is reported as `JournalError::Remove`.
    pub fn destroy(&self) -> JournalResult<()> {
        let mut state = self.state.lock();
        if matches!(*state, State::Destroyed) {
            return Ok(());
        }

        let closed = self.close_locked(&mut state);
        *state = State::Destroyed;

        if let Err(e) = &closed {
            error!(
                path = %self.path.display(),
                error = %e,
                "journal close failed during destroy"
            );
        }

        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(JournalError::Remove {
                    path: self.path.clone(),
                    kind: e.kind(),
                    message: e.to_string(),
                });
            }
        }

        info!(path = %self.path.display(), "journal destroyed");
        closed
    }

    fn close_locked(&self, state: &mut State) -> JournalResult<()> {
        match std::mem::replace(state, State::Closed) {
            State::Idle(mut writer) => {
                self.queue.close();
                let written = drain(&mut writer, &self.queue, &self.stats, self.retry);
                writer.close()?;
                info!(
                    path = %self.path.display(),
                    drained = written,
                    "journal closed before start"
                );
                Ok(())
            }
            State::Running(handle) => {
                self.queue.close();
                let writer = handle.join()?;
                writer.close()?;
                let stats = self.stats.snapshot();
                info!(
                    path = %self.path.display(),
                    persisted = stats.persisted(),
                    failed = stats.failed,
                    "journal closed"
                );
                Ok(())
            }
            State::Closed => Ok(()),
            State::Destroyed => {
                *state = State::Destroyed;
                Ok(())
            }
        }
    }

    pub fn state(&self) -> JournalState {
        match *self.state.lock() {
            State::Idle(_) => JournalState::Idle,
            State::Running(_) => JournalState::Running,
            State::Closed => JournalState::Closed,
            State::Destroyed => JournalState::Destroyed,
        }
    }

    /// Journal file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Journal {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if matches!(*state, State::Idle(_) | State::Running(_)) {
            warn!(path = %self.path.display(), "journal dropped without close, closing");
            if let Err(e) = self.close_locked(&mut state) {
                error!(path = %self.path.display(), error = %e, "journal close on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::tests::MockEntry;
    use crate::reader::JournalReader;
    use tempfile::TempDir;

    const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

    fn test_journal() -> (Journal, TempDir) {
        let dir = TempDir::new().unwrap();
        let journal = Journal::open(Config::new(dir.path().join("test.journal"))).unwrap();
        (journal, dir)
    }

    fn entry(i: usize) -> MockEntry {
        MockEntry::new(&format!("key-{}", i), format!("val-{}", i).as_bytes(), i as i64, 18071988)
    }

    #[test]
    fn test_open_idle() {
        let (journal, _dir) = test_journal();
        assert_eq!(journal.state(), JournalState::Idle);
        assert_eq!(journal.stats(), Stats::default());
        assert!(journal.path().exists());
        journal.close().unwrap();
    }

    #[test]
    fn test_open_rejects_empty_path() {
        assert!(matches!(
            Journal::open(Config::new("")),
            Err(JournalError::Config { .. })
        ));
    }

    #[test]
    fn test_append_without_start_counts_queue() {
        let (journal, _dir) = test_journal();
        for i in 0..10 {
            journal.append(OpCode::Put, i as u64, &entry(i)).unwrap();
        }
        let stats = journal.stats();
        assert_eq!(stats.queue_len, 10);
        assert_eq!(stats.persisted(), 0);
        journal.close().unwrap();
    }

    #[test]
    fn test_start_drains_queue() {
        let (journal, _dir) = test_journal();
        for i in 0..20 {
            journal.append(OpCode::Put, i as u64, &entry(i)).unwrap();
        }
        journal.start().unwrap();
        assert_eq!(journal.state(), JournalState::Running);
        assert!(journal.wait_drained(DRAIN_TIMEOUT));

        let stats = journal.stats();
        assert_eq!(stats.put, 20);
        assert_eq!(stats.queue_len, 0);
        assert!(stats.bytes_written > 0);
        journal.close().unwrap();
    }

    #[test]
    fn test_double_start_rejected() {
        let (journal, _dir) = test_journal();
        journal.start().unwrap();
        assert!(matches!(journal.start(), Err(JournalError::AlreadyRunning)));
        assert_eq!(journal.state(), JournalState::Running);
        journal.close().unwrap();
    }

    #[test]
    fn test_start_after_close_rejected() {
        let (journal, _dir) = test_journal();
        journal.close().unwrap();
        assert!(matches!(journal.start(), Err(JournalError::Closed)));
        journal.destroy().unwrap();
        assert!(matches!(journal.start(), Err(JournalError::Closed)));
    }

    #[test]
    fn test_append_after_close_rejected() {
        let (journal, _dir) = test_journal();
        journal.start().unwrap();
        journal.close().unwrap();
        assert!(matches!(
            journal.append(OpCode::Put, 1, &entry(1)),
            Err(JournalError::Closed)
        ));
        assert_eq!(journal.stats().queue_len, 0);
    }

    #[test]
    fn test_close_idempotent() {
        let (journal, _dir) = test_journal();
        journal.start().unwrap();
        journal.close().unwrap();
        journal.close().unwrap();
        assert_eq!(journal.state(), JournalState::Closed);
    }

    #[test]
    fn test_close_before_start_persists_queue() {
        let (journal, _dir) = test_journal();
        journal.append(OpCode::Put, 1, &entry(1)).unwrap();
        journal.append(OpCode::Delete, 1, &entry(1)).unwrap();
        journal.close().unwrap();

        let stats = journal.stats();
        assert_eq!((stats.put, stats.delete, stats.queue_len), (1, 1, 0));
        assert_eq!(JournalReader::open(journal.path()).records().unwrap().len(), 2);
    }

    #[test]
    fn test_destroy_removes_file() {
        let (journal, _dir) = test_journal();
        journal.append(OpCode::Put, 1, &entry(1)).unwrap();
        journal.destroy().unwrap();
        assert!(!journal.path().exists());
        assert_eq!(journal.state(), JournalState::Destroyed);

        // Close and destroy after destroy are no-ops
        journal.close().unwrap();
        journal.destroy().unwrap();
        assert_eq!(journal.state(), JournalState::Destroyed);
    }

    #[test]
    fn test_oversized_key_rejected_at_append() {
        let (journal, _dir) = test_journal();
        let big = MockEntry::new(&"k".repeat(crate::format::MAX_KEY_SIZE + 1), b"", 0, 0);
        assert!(matches!(
            journal.append(OpCode::Put, 1, &big),
            Err(JournalError::OversizedEntry { component: "key", .. })
        ));
        assert_eq!(journal.stats().queue_len, 0);
        journal.close().unwrap();
    }

    #[test]
    fn test_capacity_backpressure() {
        let dir = TempDir::new().unwrap();
        let config = Config::new(dir.path().join("bounded.journal")).with_capacity(2);
        let journal = Journal::open(config).unwrap();
        journal.append(OpCode::Put, 1, &entry(1)).unwrap();
        journal.append(OpCode::Put, 2, &entry(2)).unwrap();
        assert!(matches!(
            journal.append(OpCode::Put, 3, &entry(3)),
            Err(JournalError::QueueFull { capacity: 2 })
        ));

        journal.start().unwrap();
        assert!(journal.wait_drained(DRAIN_TIMEOUT));
        journal.append(OpCode::Put, 3, &entry(3)).unwrap();
        journal.close().unwrap();
        assert_eq!(journal.stats().put, 3);
    }

    #[test]
    fn test_drop_closes_running_journal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dropped.journal");
        {
            let journal = Journal::open(Config::new(&path)).unwrap();
            journal.start().unwrap();
            for i in 0..5 {
                journal.append(OpCode::Put, i as u64, &entry(i)).unwrap();
            }
        }
        assert_eq!(JournalReader::open(&path).records().unwrap().len(), 5);
    }
}
