//! Journal file writer
//!
//! Exactly one `JournalWriter` exists per journal. Before `start` it sits in
//! the journal's Idle state; after `start` it is moved into the consumer thread
//! and nothing else can reach the file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::{Config, SyncPolicy};
use crate::durability::{durable_sync, should_sync, SyncPoint};
#[cfg(test)]
use crate::entry::Record;
use crate::error::{JournalError, JournalResult};
#[cfg(test)]
use crate::format::encode_record;

pub struct JournalWriter {
    file: File,
    /// Path of the journal file (for error context)
    path: PathBuf,
    /// Current file size in bytes, tracked to avoid stat calls
    size: u64,
    sync: SyncPolicy,
}

impl JournalWriter {
    /// Open the journal file for appending, creating it if absent.
    pub fn open(config: &Config) -> JournalResult<Self> {
        let path = config.path.clone();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| JournalError::io(&path, "failed to open journal file", e))?;

        let size = file
            .metadata()
            .map_err(|e| JournalError::io(&path, "failed to stat journal file", e))?
            .len();

        Ok(Self { file, path, size, sync: config.sync })
    }

    /// Encode, write and sync (per policy) one record. Returns the number of
    /// bytes written.
    #[cfg(test)]
    pub fn append(&mut self, record: &Record) -> JournalResult<u64> {
        let frame = encode_record(record)?;
        self.write_frame(&frame)?;
        self.sync_record()?;
        Ok(frame.len() as u64)
    }

    /// Write an already encoded frame. Never syncs.
    ///
    /// A failed write may leave a partial frame behind; readers skip it by
    /// magic and checksum. `size` is re-read from the file in that case.
    pub fn write_frame(&mut self, frame: &[u8]) -> JournalResult<()> {
        if let Err(e) = self.file.write_all(frame) {
            self.refresh_size();
            return Err(JournalError::io(&self.path, "journal write failed", e));
        }
        self.size += frame.len() as u64;
        Ok(())
    }

    /// Sync after a written record if the policy asks for it.
    pub fn sync_record(&self) -> JournalResult<()> {
        if should_sync(self.sync, SyncPoint::Record) {
            self.sync()?;
        }
        Ok(())
    }

    /// Re-read the file length after a write of unknown extent.
    fn refresh_size(&mut self) {
        match self.file.metadata() {
            Ok(meta) => self.size = meta.len(),
            Err(e) => warn!(path = %self.path.display(), error = %e, "journal stat failed"),
        }
    }

    /// Force written records onto persistent media.
    pub fn sync(&self) -> JournalResult<()> {
        durable_sync(&self.file)
            .map_err(|e| JournalError::io(&self.path, "journal durable_sync failed", e))
    }

    /// Flush, sync per policy, and release the file handle.
    pub fn close(mut self) -> JournalResult<()> {
        self.file
            .flush()
            .map_err(|e| JournalError::io(&self.path, "journal flush failed", e))?;
        if should_sync(self.sync, SyncPoint::Close) {
            self.sync()?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes in the file, including anything present before open.
    pub fn size(&self) -> u64 {
        self.size
    }
}
