//! KvJournal Core: asynchronous operation journal
//!
//! Records the mutations of an in-memory key-value store (Put, UpdateTtl,
//! Delete) in a local append-only file without putting disk latency on the
//! write path.
//!
//! # Architecture
//!
//! - **Write path**: `Journal::append` pushes a record onto an in-memory queue and returns
//! - **Consumer**: one background thread drains the queue into the file, in enqueue order
//! - **Stats**: atomic counters for backlog and per-operation progress
//! - **Reader**: scans the file back, skipping damaged frames, for replay and recovery
//!
//! The journal is not the authoritative store and does no replication. One
//! journal per shard; nothing here is process-global.

pub mod config;
pub mod consumer;
pub mod durability;
pub mod entry;
pub mod error;
pub mod format;
pub mod journal;
pub mod queue;
pub mod reader;
pub mod stats;
pub mod writer;

// Re-export key types for convenience
pub use config::{Config, SyncPolicy};
pub use entry::{Entry, OpCode, Record};
pub use error::{JournalError, JournalResult};
pub use journal::{Journal, JournalState};
pub use reader::JournalReader;
pub use stats::Stats;
