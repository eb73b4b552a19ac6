//! End-to-end evaluation pipeline for in-process deployments.
//!
//! This module defines the [`EvaluationPipeline`] type, which wires the
//! dispatch publisher, an in-memory work queue, the sample workers and the
//! finalizer around a shared [`RunStore`]. Its responsibilities include:
//!
//! - Fanning a queued run out as per-sample messages
//! - Draining the queue in bounded-concurrency worker batches
//! - Closing completed or expired runs via the eager + reaper paths
//!
//! # Deployment shapes
//!
//! The pipeline is the single-process rendition of the system. In a
//! distributed deployment the same components run apart: something invokes
//! [`Dispatcher`](crate::dispatch::Dispatcher) once per started run, a
//! queue-triggered function feeds delivered batches to
//! [`SampleWorker`](crate::worker::SampleWorker), and a timer invokes
//! [`Finalizer::reap`](crate::finalize::Finalizer::reap). Nothing here
//! assumes otherwise; `EvaluationPipeline` just owns one of each and turns
//! the crank itself.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use span_bench::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Configuration::new()
//!         .with_datasets_dir("datasets")
//!         .with_max_rows(20);
//!
//!     let store: Arc<dyn RunStore> = Arc::new(MemoryStore::new());
//!     let team = store.register_team("team-a", "http://participant:8000/predict")?;
//!     let phase = store.register_phase("public", "public.csv")?;
//!     let run = store.create_run(team.id, phase.id)?;
//!
//!     let pipeline = EvaluationPipeline::new(Arc::clone(&store), config);
//!     let finished = pipeline.execute_run(run.id)?;
//!     println!("f1 = {:?}, latency = {:?}", finished.f1, finished.avg_latency_ms);
//!
//!     for entry in rank(store.as_ref(), phase.id)? {
//!         println!("{}: {} ({:?} ms)", entry.team_name, entry.f1, entry.avg_latency_ms);
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, instrument};

use crate::configuration::Configuration;
use crate::dispatch::Dispatcher;
use crate::finalize::Finalizer;
use crate::logger::init_logger;
use crate::model::Run;
use crate::queue::MemoryQueue;
use crate::store::RunStore;
use crate::worker::SampleWorker;

/// The main type for running evaluations end to end in one process.
pub struct EvaluationPipeline {
    store: Arc<dyn RunStore>,
    queue: Arc<MemoryQueue>,
    dispatcher: Dispatcher,
    worker: SampleWorker,
    finalizer: Finalizer,
    batch_size: usize,
}

impl EvaluationPipeline {
    /// Creates a pipeline around a shared store.
    pub fn new(store: Arc<dyn RunStore>, config: Configuration) -> Self {
        if config.log {
            init_logger();
        }

        let queue = Arc::new(MemoryQueue::new(config.max_batch_size));
        let dispatcher = Dispatcher::new(
            Arc::clone(&store),
            Arc::clone(&queue) as Arc<dyn crate::queue::WorkQueue>,
            config.clone(),
        );
        let worker = SampleWorker::new(Arc::clone(&store), &config);
        let finalizer = Finalizer::new(Arc::clone(&store), &config);
        Self {
            store,
            queue,
            dispatcher,
            worker,
            finalizer,
            batch_size: config.max_batch_size,
        }
    }

    /// Dispatches a queued run, drains the queue, and returns the finalized
    /// run row.
    ///
    /// # Errors
    /// Returns an error when dispatch fails (the run is then back in
    /// `Queued` and may be retried) or the store misbehaves.
    #[instrument(skip(self))]
    pub fn execute_run(&self, run_id: u64) -> anyhow::Result<Run> {
        let total = self
            .dispatcher
            .dispatch(run_id)
            .context("dispatch failed")?;
        info!(run_id, total, "dispatched, draining queue");

        loop {
            let batch = self.queue.pop_batch(self.batch_size);
            if batch.is_empty() {
                break;
            }
            self.worker.process_batch(batch);
        }

        // eager finalization normally already closed the run; one sweep
        // covers a lost trigger or an expired time budget
        self.finalizer.reap().context("reaper sweep failed")?;
        Ok(self.store.run(run_id)?)
    }

    /// One reaper sweep over all running runs. Returns how many were closed.
    pub fn reap(&self) -> anyhow::Result<usize> {
        Ok(self.finalizer.reap()?)
    }

    /// The store this pipeline writes to.
    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }
}
