//! # Span Bench
//!
//! A modular Rust crate for grading remote span-annotation endpoints against
//! gold-labeled datasets.
//!
//! It provides:
//! - Run dispatch and queue fan-out (`dispatch`, `queue`)
//! - Concurrent, idempotent sample evaluation (`worker`, `client`)
//! - Race-free, exactly-once run finalization with timeout reclamation
//!   (`finalize`)
//! - Macro-F1 scoring and leaderboard ranking (`scoring`, `leaderboard`)
//!
//! Each *run* evaluates one team's HTTP endpoint against one phase's
//! dataset: the dataset is split into per-sample work messages, every sample
//! triggers one `POST {"input": ...}` call, every outcome is recorded
//! durably and idempotently, and — exactly once — the run is finalized into
//! an F1 score and a latency figure.
//!
//! # Documentation Overview
//!
//! - For the end-to-end single-process entry point, see the [`pipeline`]
//!   module.
//! - For configuring timeouts, concurrency, batch sizes and time limits, see
//!   [`Configuration`](crate::configuration::Configuration).
//! - To plug in your own storage or queue backend, implement
//!   [`RunStore`](crate::store::RunStore) or
//!   [`WorkQueue`](crate::queue::WorkQueue).
//! - For the accepted participant response shapes, see the [`annotation`]
//!   module; for the scoring rules, see [`scoring`].
//!
//! Delivery is assumed at-least-once: duplicate sample messages are safe,
//! deduplicated by the store's `(run_id, sample_index)` uniqueness rather
//! than by the queue. Progress counters converge by finalization but are not
//! strongly consistent mid-run.
//!
//! # Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use span_bench::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Configuration::new()
//!         .with_datasets_dir("datasets")
//!         .with_read_timeout(Duration::from_secs(3))
//!         .with_run_time_limit(Duration::from_secs(1200))
//!         .with_max_rows(20);
//!
//!     let store: Arc<dyn RunStore> = Arc::new(MemoryStore::new());
//!     let team = store.register_team("team-a", "http://participant:8000/predict")?;
//!     let phase = store.register_phase("public", "public.csv")?;
//!     let run = store.create_run(team.id, phase.id)?;
//!
//!     let pipeline = EvaluationPipeline::new(Arc::clone(&store), config);
//!     let finished = pipeline.execute_run(run.id)?;
//!     println!("{:?}: f1 {:?}", finished.status, finished.f1);
//!
//!     for entry in rank(store.as_ref(), phase.id)? {
//!         println!("{}: {}", entry.team_name, entry.f1);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Participant Endpoint Contract
//!
//! An endpoint receives `POST {"input": "<sample text>"}` and must answer
//! `200` with one of:
//! - `{"spans": [{"start_index": 0, "end_index": 3, "entity": "ORG"}, ...]}`
//! - `{"annotation": "[(0,3,'ORG')]"}` (or the same as a list of triples)
//! - a bare list of either item shape
//!
//! Anything else — non-200, timeout, transport error, unrecognized shape —
//! marks that sample failed; there is exactly one attempt per sample.

pub use anyhow;

pub mod annotation;
pub mod client;
pub mod configuration;
pub mod dataset;
pub mod dispatch;
pub mod finalize;
pub mod leaderboard;
mod logger;
pub mod model;
pub mod pipeline;
pub mod queue;
pub mod scoring;
pub mod store;
pub mod worker;

/// Commonly used types and traits for quick access.
///
/// Import this prelude to get started easily:
/// ```rust
/// use span_bench::prelude::*;
/// ```
///
/// Includes:
/// - [`Configuration`](crate::configuration::Configuration)
/// - [`EvaluationPipeline`](crate::pipeline::EvaluationPipeline)
/// - the [`RunStore`](crate::store::RunStore) seam and
///   [`MemoryStore`](crate::store::MemoryStore)
/// - the [`WorkQueue`](crate::queue::WorkQueue) seam and
///   [`MemoryQueue`](crate::queue::MemoryQueue)
/// - [`rank`](crate::leaderboard::rank) and the core model types
pub mod prelude {
    pub use crate::configuration::Configuration;
    pub use crate::leaderboard::{rank, LeaderboardEntry};
    pub use crate::model::{Prediction, Run, RunStatus, Span};
    pub use crate::pipeline::EvaluationPipeline;
    pub use crate::queue::{MemoryQueue, SampleMessage, WorkQueue};
    pub use crate::store::{MemoryStore, RunStore};
}
