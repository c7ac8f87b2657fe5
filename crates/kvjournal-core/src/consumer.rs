//! Consumer: the journal's single background writer
//!
//! The consumer thread owns the `JournalWriter` from `start` until it is
//! joined, so it is the only code that ever writes the file while the journal
//! is running. It drains the pending queue in FIFO order:
//!
//! 1. Park until a record is queued or the queue is closed
//! 2. Encode the record into a frame
//! 3. Write the frame, retrying up to `write_retries` times
//! 4. Sync per policy, retrying only the sync once the frame is written
//! 5. Count the record as persisted, or dead-letter it
//! 6. Complete the record (QueueLen - 1)
//!
//! Write failures never stop the thread. A record whose write still fails
//! after its retries is counted in `Stats::failed` and dropped. A written
//! record is never written again: if its sync keeps failing it stays
//! persisted and is counted in `Stats::sync_failed`.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::entry::Record;
use crate::error::{JournalError, JournalResult};
use crate::format::encode_record;
use crate::queue::PendingQueue;
use crate::stats::JournalStats;
use crate::writer::JournalWriter;

/// Retry behaviour for a failing record write.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

/// Handle to a running consumer thread.
pub struct ConsumerHandle {
    thread: Option<thread::JoinHandle<Option<JournalWriter>>>,
}

impl ConsumerHandle {
    /// Wait for the consumer to finish and take back the writer.
    ///
    /// The queue must already be closed, otherwise this waits forever.
    pub fn join(mut self) -> JournalResult<JournalWriter> {
        let handle = self.thread.take().ok_or(JournalError::Closed)?;
        match handle.join() {
            Ok(Some(writer)) => Ok(writer),
            Ok(None) => Err(JournalError::Closed),
            Err(_) => Err(JournalError::Io {
                path: None,
                kind: std::io::ErrorKind::Other,
                message: "journal consumer thread panicked".to_string(),
            }),
        }
    }

    /// Check if the consumer thread is still running.
    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().map_or(false, |h| !h.is_finished())
    }
}

/// A consumer thread that could not be spawned.
///
/// Carries the writer back so the journal can stay Idle.
pub struct SpawnFailed {
    pub error: JournalError,
    pub writer: Option<JournalWriter>,
}

/// Spawn the consumer thread for one journal.
pub fn start_consumer(
    writer: JournalWriter,
    queue: Arc<PendingQueue>,
    stats: Arc<JournalStats>,
    retry: RetryPolicy,
) -> Result<ConsumerHandle, SpawnFailed> {
    let builder = thread::Builder::new().name("kvjournal-consumer".to_string());
    spawn_consumer(builder, writer, queue, stats, retry)
}

fn spawn_consumer(
    builder: thread::Builder,
    writer: JournalWriter,
    queue: Arc<PendingQueue>,
    stats: Arc<JournalStats>,
    retry: RetryPolicy,
) -> Result<ConsumerHandle, SpawnFailed> {
    let path = writer.path().to_path_buf();

    // The thread takes the writer out of the slot; on a failed spawn it is
    // still there.
    let slot = Arc::new(Mutex::new(Some(writer)));
    let handoff = Arc::clone(&slot);

    let spawned = builder.spawn(move || {
        let writer = handoff.lock().take();
        writer.map(|writer| consume_loop(writer, &queue, &stats, retry))
    });

    match spawned {
        Ok(thread) => Ok(ConsumerHandle { thread: Some(thread) }),
        Err(e) => {
            let writer = slot.lock().take();
            Err(SpawnFailed {
                error: JournalError::io(path, "failed to spawn journal consumer", e),
                writer,
            })
        }
    }
}

/// Main loop, runs on the consumer thread until the queue is closed and empty.
fn consume_loop(
    mut writer: JournalWriter,
    queue: &PendingQueue,
    stats: &JournalStats,
    retry: RetryPolicy,
) -> JournalWriter {
    debug!(path = %writer.path().display(), "journal consumer started");

    let drained = drain(&mut writer, queue, stats, retry);

    debug!(path = %writer.path().display(), records = drained, "journal consumer stopped");
    writer
}

/// Write queued records until the queue is closed and empty.
///
/// Also used by `Journal::close` for a journal that was never started, once
/// the queue is closed, so it returns without blocking.
pub(crate) fn drain(
    writer: &mut JournalWriter,
    queue: &PendingQueue,
    stats: &JournalStats,
    retry: RetryPolicy,
) -> u64 {
    let mut processed = 0u64;
    while let Some(record) = queue.pop() {
        write_record(writer, &record, stats, retry);
        queue.complete();
        processed += 1;
    }
    processed
}

/// Write one record, retrying on failure; never panics, never propagates.
fn write_record(
    writer: &mut JournalWriter,
    record: &Record,
    stats: &JournalStats,
    retry: RetryPolicy,
) {
    let frame = match encode_record(record) {
        Ok(frame) => frame,
        Err(e) => {
            stats.dead_lettered();
            error!(
                fingerprint = record.fingerprint,
                op = record.op.as_str(),
                error = %e,
                "journal record could not be encoded, dropped"
            );
            return;
        }
    };

    let mut attempt = 0u32;
    while let Err(e) = writer.write_frame(&frame) {
        if attempt >= retry.retries {
            stats.dead_lettered();
            error!(
                fingerprint = record.fingerprint,
                op = record.op.as_str(),
                attempts = attempt + 1,
                error = %e,
                "journal write failed, record dropped"
            );
            return;
        }
        attempt += 1;
        warn!(
            fingerprint = record.fingerprint,
            attempt,
            error = %e,
            "journal write failed, retrying"
        );
        backoff(retry);
    }

    // The frame is in the file from here on; only the sync may be retried.
    let mut attempt = 0u32;
    while let Err(e) = writer.sync_record() {
        if attempt >= retry.retries {
            stats.sync_failure();
            error!(
                fingerprint = record.fingerprint,
                op = record.op.as_str(),
                attempts = attempt + 1,
                error = %e,
                "journal sync failed, record written but not durable"
            );
            break;
        }
        attempt += 1;
        warn!(
            fingerprint = record.fingerprint,
            attempt,
            error = %e,
            "journal sync failed, retrying"
        );
        backoff(retry);
    }

    stats.persisted(record.op, frame.len() as u64);
}

fn backoff(retry: RetryPolicy) {
    if !retry.backoff.is_zero() {
        thread::sleep(retry.backoff);
    }
}
