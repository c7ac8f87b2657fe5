//! Pending queue between producers and the consumer.
//!
//! One mutex orders every enqueue; the enqueue order observed under that lock
//! is the order records reach the file. The consumer parks on a condition
//! variable while the queue is empty and is woken by the next push or by close.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::entry::Record;
use crate::error::{JournalError, JournalResult};
use crate::stats::JournalStats;

struct QueueState {
    records: VecDeque<Record>,
    /// A record has been popped but not yet completed
    in_flight: bool,
    /// No further pushes accepted; the consumer exits once empty
    closed: bool,
}

impl QueueState {
    fn is_drained(&self) -> bool {
        self.records.is_empty() && !self.in_flight
    }
}

/// FIFO of records not yet written to the journal file.
pub struct PendingQueue {
    state: Mutex<QueueState>,
    /// Signalled on push and on close
    available: Condvar,
    /// Signalled when the last outstanding record completes
    drained: Condvar,
    capacity: Option<usize>,
    stats: Arc<JournalStats>,
}

impl PendingQueue {
    pub fn new(capacity: Option<usize>, stats: Arc<JournalStats>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                records: VecDeque::new(),
                in_flight: false,
                closed: false,
            }),
            available: Condvar::new(),
            drained: Condvar::new(),
            capacity,
            stats,
        }
    }

    /// Append a record at the tail. Never blocks on I/O.
    pub fn push(&self, record: Record) -> JournalResult<()> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(JournalError::Closed);
            }
            if let Some(capacity) = self.capacity {
                if state.records.len() >= capacity {
                    return Err(JournalError::QueueFull { capacity });
                }
            }
            state.records.push_back(record);
            self.stats.enqueued();
        }
        self.available.notify_one();
        Ok(())
    }

    /// Take the oldest record, blocking while the queue is open and empty.
    ///
    /// Returns `None` once the queue is closed and empty. Every `Some` must be
    /// followed by `complete`.
    pub fn pop(&self) -> Option<Record> {
        let mut state = self.state.lock();
        loop {
            if let Some(record) = state.records.pop_front() {
                state.in_flight = true;
                return Some(record);
            }
            if state.closed {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    /// Mark the record returned by the last `pop` as written or dropped.
    pub fn complete(&self) {
        let mut state = self.state.lock();
        state.in_flight = false;
        self.stats.dequeued();
        if state.records.is_empty() {
            self.drained.notify_all();
        }
    }

    /// Refuse further pushes and wake a parked consumer.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    /// Records queued or in flight.
    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.records.len() + usize::from(state.in_flight)
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().is_drained()
    }

    /// Block until every queued record has completed or `timeout` elapses.
    /// Returns whether the queue drained.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.is_drained() {
            if self.drained.wait_until(&mut state, deadline).timed_out() {
                return state.is_drained();
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::OpCode;
    use std::thread;

    fn record(fingerprint: u64) -> Record {
        Record {
            op: OpCode::Put,
            fingerprint,
            key: format!("k{}", fingerprint),
            value: vec![],
            timestamp: 0,
            ttl: 0,
        }
    }

    fn queue(capacity: Option<usize>) -> (PendingQueue, Arc<JournalStats>) {
        let stats = Arc::new(JournalStats::new());
        (PendingQueue::new(capacity, Arc::clone(&stats)), stats)
    }

    #[test]
    fn test_fifo_order() {
        let (queue, stats) = queue(None);
        for i in 0..5 {
            queue.push(record(i)).unwrap();
        }
        assert_eq!(stats.snapshot().queue_len, 5);
        queue.close();

        let mut seen = Vec::new();
        while let Some(r) = queue.pop() {
            seen.push(r.fingerprint);
            queue.complete();
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(stats.snapshot().queue_len, 0);
    }

    #[test]
    fn test_push_after_close_rejected() {
        let (queue, stats) = queue(None);
        queue.close();
        assert!(matches!(queue.push(record(1)), Err(JournalError::Closed)));
        assert_eq!(stats.snapshot().queue_len, 0);
    }

    #[test]
    fn test_capacity_rejects_with_queue_full() {
        let (queue, _stats) = queue(Some(2));
        queue.push(record(1)).unwrap();
        queue.push(record(2)).unwrap();
        assert!(matches!(
            queue.push(record(3)),
            Err(JournalError::QueueFull { capacity: 2 })
        ));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_close_wakes_blocked_consumer() {
        let (queue, _stats) = queue(None);
        let queue = Arc::new(queue);
        let q = Arc::clone(&queue);
        let consumer = thread::spawn(move || q.pop());

        thread::sleep(Duration::from_millis(50));
        queue.close();
        assert!(consumer.join().unwrap().is_none());
    }

    #[test]
    fn test_push_wakes_blocked_consumer() {
        let (queue, _stats) = queue(None);
        let queue = Arc::new(queue);
        let q = Arc::clone(&queue);
        let consumer = thread::spawn(move || q.pop().map(|r| r.fingerprint));

        thread::sleep(Duration::from_millis(50));
        queue.push(record(99)).unwrap();
        assert_eq!(consumer.join().unwrap(), Some(99));
    }

    #[test]
    fn test_in_flight_counts_until_complete() {
        let (queue, stats) = queue(None);
        queue.push(record(1)).unwrap();
        let _r = queue.pop().unwrap();
        assert_eq!(queue.len(), 1);
        assert!(!queue.is_empty());
        assert_eq!(stats.snapshot().queue_len, 1);
        assert!(!queue.wait_drained(Duration::from_millis(10)));

        queue.complete();
        assert!(queue.is_empty());
        assert!(queue.wait_drained(Duration::from_millis(10)));
    }

    #[test]
    fn test_concurrent_pushes_all_counted() {
        let (queue, stats) = queue(None);
        let queue = Arc::new(queue);
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let q = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..100 {
                        q.push(record(t * 1000 + i)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(queue.len(), 800);
        assert_eq!(stats.snapshot().queue_len, 800);
    }
}
