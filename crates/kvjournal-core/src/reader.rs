//! Journal reader used by higher layers for replay and recovery.
//!
//! Scan algorithm over the whole file:
//! 1. Decode the frame at the current offset
//! 2. Bad magic, bad checksum or bad body: scan forward to the next magic
//! 3. Incomplete frame at end of file: torn write from a crash, stop
//!
//! The journal keeps appending after a torn tail, so a torn frame may also sit
//! in the middle of the file. If another magic follows it, the scan resumes there.

use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use tracing::warn;

use crate::entry::{OpCode, Record};
use crate::error::{JournalError, JournalResult};
use crate::format::{decode_record, find_next_magic};

pub struct JournalReader {
    path: PathBuf,
}

impl JournalReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Every intact record in file order.
    pub fn records(&self) -> JournalResult<Vec<Record>> {
        let buffer = std::fs::read(&self.path)
            .map_err(|e| JournalError::io(&self.path, "failed to read journal file", e))?;

        let mut records = Vec::new();
        let mut offset = 0usize;

        while offset < buffer.len() {
            match decode_record(&buffer[offset..], offset as u64) {
                Ok((record, used)) => {
                    records.push(record);
                    offset += used;
                }
                Err(JournalError::TornWrite { needed, available, .. }) => {
                    match find_next_magic(&buffer, offset + 1) {
                        Some(next) => {
                            warn!(
                                path = %self.path.display(),
                                offset, next,
                                "partial journal frame followed by more data, resyncing"
                            );
                            offset = next;
                        }
                        None => {
                            warn!(
                                path = %self.path.display(),
                                offset, needed, available,
                                "torn write at journal tail, stopping"
                            );
                            break;
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        offset,
                        error = %e,
                        "corrupt journal frame, resyncing"
                    );
                    match find_next_magic(&buffer, offset + 1) {
                        Some(next) => offset = next,
                        None => break,
                    }
                }
            }
        }

        Ok(records)
    }

    /// Fold the journal into the latest live record per fingerprint.
    ///
    /// Put stores the record, UpdateTtl rewrites ttl and timestamp of a live
    /// record, Delete removes it. UpdateTtl for an unknown fingerprint is ignored.
    pub fn replay(&self) -> JournalResult<HashMap<u64, Record>> {
        let mut live: HashMap<u64, Record> = HashMap::new();

        for record in self.records()? {
            match record.op {
                OpCode::Put => {
                    live.insert(record.fingerprint, record);
                }
                OpCode::UpdateTtl => {
                    if let Some(current) = live.get_mut(&record.fingerprint) {
                        current.ttl = record.ttl;
                        current.timestamp = record.timestamp;
                    }
                }
                OpCode::Delete => {
                    live.remove(&record.fingerprint);
                }
            }
        }

        Ok(live)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
