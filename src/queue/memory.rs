//! In-process priority queue.
//!
//! Priority biases dequeue order; entries with equal priority drain FIFO
//! by submission sequence. There is no strict global ordering guarantee
//! under concurrent submission, matching what an external broker provides.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use super::{JobQueue, QueueError, QueuedJob};

struct Entry {
    priority: i32,
    seq: u64,
    job: QueuedJob,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority first, then lower sequence (FIFO).
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct State {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
    closed: bool,
}

/// Mutex-guarded binary heap with `Notify` wakeups for waiting workers.
pub struct MemoryJobQueue {
    state: Mutex<State>,
    notify: Notify,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                heap: BinaryHeap::new(),
                next_seq: 0,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }
}

impl Default for MemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn push(&self, job: QueuedJob) -> Result<(), QueueError> {
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(QueueError::Closed);
            }
            let seq = state.next_seq;
            state.next_seq += 1;
            state.heap.push(Entry {
                priority: job.parameters.priority,
                seq,
                job,
            });
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn pull(&self) -> Option<QueuedJob> {
        loop {
            // Register for wakeups before inspecting state so a push
            // between the check and the await still wakes us.
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().await;
                if let Some(entry) = state.heap.pop() {
                    return Some(entry.job);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
    }

    async fn depth(&self) -> usize {
        self.state.lock().await.heap.len()
    }
}
