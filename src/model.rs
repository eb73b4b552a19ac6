//! Core data model: runs, predictions, and the canonical span representation.
//!
//! A [`Run`] is one evaluation attempt of one team's endpoint against one
//! phase's dataset. Each unit of work within a run produces exactly one
//! [`Prediction`] row, keyed by `(run_id, sample_index)`; that uniqueness is
//! what makes at-least-once message delivery safe to process effectively-once.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// A labeled annotation over a half-open `[start, end)` character range.
///
/// Span identity is exact-boundary: two spans match only when start, end and
/// label are all equal. No partial-overlap credit is given anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Start offset (inclusive).
    pub start: usize,
    /// End offset (exclusive). Always greater than `start`.
    pub end: usize,
    /// Entity label, e.g. `"PER"` or `"ORG"`.
    pub label: String,
}

impl Span {
    /// Creates a span. Callers are expected to have validated `end > start`.
    pub fn new(start: usize, end: usize, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
        }
    }
}

/// Lifecycle state of a [`Run`].
///
/// Transitions are strictly `Queued -> Running -> Done`; `Done` is terminal
/// and a finished run is never un-finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Created by the admission layer, not yet dispatched.
    Queued,
    /// Dispatch started; workers may be writing predictions.
    Running,
    /// Finalized with aggregate metrics committed.
    Done,
}

/// One evaluation attempt by one team against one phase's dataset.
#[derive(Debug, Clone)]
pub struct Run {
    pub id: u64,
    pub team_id: u64,
    pub phase_id: u64,
    pub status: RunStatus,
    pub started_at: Option<SystemTime>,
    pub finished_at: Option<SystemTime>,
    /// Expected unit count. Zero until dispatch has durably enqueued every
    /// message for this run; completion detection keys off this field.
    pub samples_total: u32,
    /// Units attempted, including failed endpoint calls. Non-decreasing.
    pub samples_processed: u32,
    /// Units whose endpoint call succeeded. Non-decreasing,
    /// `samples_success <= samples_processed`.
    pub samples_success: u32,
    pub avg_latency_ms: Option<f64>,
    pub f1: Option<f64>,
    pub created_at: SystemTime,
}

impl Run {
    /// True once every dispatched sample has been attempted.
    pub fn is_complete(&self) -> bool {
        self.samples_total > 0 && self.samples_processed >= self.samples_total
    }
}

/// One sample's outcome within a run. Immutable once inserted.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub run_id: u64,
    /// 0-based index matching dispatch emission order. Unique per run.
    pub sample_index: u32,
    /// Wall-clock call latency. `None` when the call failed.
    pub latency_ms: Option<f64>,
    /// Whether the endpoint call succeeded and produced a recognizable body.
    pub ok: bool,
    /// Canonical gold spans for the sample.
    pub gold: Vec<Span>,
    /// Canonical predicted spans. `None` when the call failed or the
    /// response shape was not recognized.
    pub predicted: Option<Vec<Span>>,
}

/// A registered participant team. Owned by the external admission layer;
/// persisted here so messages can carry the endpoint and the ranker can
/// resolve names.
#[derive(Debug, Clone)]
pub struct Team {
    pub id: u64,
    pub name: String,
    pub endpoint_url: String,
}

/// An evaluation phase, tied to one dataset file.
#[derive(Debug, Clone)]
pub struct Phase {
    pub id: u64,
    pub name: String,
    pub dataset_filename: String,
}
