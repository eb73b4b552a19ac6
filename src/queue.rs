//! Work-queue seam and the per-sample message format.
//!
//! The dispatch publisher fans a run out as one [`SampleMessage`] per
//! dataset row and hands them to a [`WorkQueue`] in bounded batches. Delivery
//! is assumed at-least-once: the pipeline never relies on queue-side
//! deduplication, only on the store's uniqueness constraint. The
//! `message_id` is derived deterministically from `(run_id, sample_index)`
//! so repeated enqueue attempts are at most a deduplication hint, never a
//! new logical message.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::model::Span;

/// One unit of dispatched work: everything a sample worker needs to call the
/// participant endpoint and record the outcome, with no further lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMessage {
    /// Deterministic id, `"{run_id}-{sample_index}"`.
    pub message_id: String,
    pub run_id: u64,
    pub team_id: u64,
    /// Participant endpoint to POST the sample to.
    pub endpoint_url: String,
    /// 0-based index matching dataset emission order.
    pub sample_index: u32,
    /// Raw sample text.
    pub sample: String,
    /// Canonical gold spans for the sample.
    pub gold: Vec<Span>,
}

impl SampleMessage {
    pub fn new(
        run_id: u64,
        team_id: u64,
        endpoint_url: impl Into<String>,
        sample_index: u32,
        sample: impl Into<String>,
        gold: Vec<Span>,
    ) -> Self {
        Self {
            message_id: format!("{run_id}-{sample_index}"),
            run_id,
            team_id,
            endpoint_url: endpoint_url.into(),
            sample_index,
            sample: sample.into(),
            gold,
        }
    }
}

/// Queue failures surfaced to the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("batch of {got} messages exceeds the maximum batch size {max}")]
    BatchTooLarge { got: usize, max: usize },
    #[error("queue unavailable: {0}")]
    Unavailable(String),
}

/// Producer-side queue contract: batch send with a backend-imposed maximum
/// batch size.
pub trait WorkQueue: Send + Sync {
    /// Largest batch `send_batch` accepts in one call.
    fn max_batch_size(&self) -> usize;

    /// Enqueues a batch of messages. Either the whole batch is accepted or
    /// an error is returned and the run's dispatch is aborted.
    fn send_batch(&self, batch: &[SampleMessage]) -> Result<(), QueueError>;
}

/// In-memory FIFO [`WorkQueue`] for in-process pipelines and tests. The
/// consumer side (`pop_batch`) is deliberately not part of the trait: a
/// remote queue pushes deliveries at workers instead.
pub struct MemoryQueue {
    messages: Mutex<VecDeque<SampleMessage>>,
    max_batch_size: usize,
}

impl MemoryQueue {
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
            max_batch_size: max_batch_size.max(1),
        }
    }

    /// Dequeues up to `n` messages in FIFO order.
    pub fn pop_batch(&self, n: usize) -> Vec<SampleMessage> {
        let mut messages = self.messages.lock().expect("poisoned");
        let n = n.min(messages.len());
        messages.drain(..n).collect()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().expect("poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WorkQueue for MemoryQueue {
    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    fn send_batch(&self, batch: &[SampleMessage]) -> Result<(), QueueError> {
        if batch.len() > self.max_batch_size {
            return Err(QueueError::BatchTooLarge {
                got: batch.len(),
                max: self.max_batch_size,
            });
        }
        let mut messages = self.messages.lock().expect("poisoned");
        messages.extend(batch.iter().cloned());
        Ok(())
    }
}
