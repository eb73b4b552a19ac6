//! Run finalization: the one-time transition to `Done` with metrics.
//!
//! Two trigger paths feed the same logic. The *eager* path is invoked by a
//! sample worker right after it records a prediction — a best-effort
//! optimization that usually closes the run within the same invocation that
//! completed it. The *reaper* path periodically sweeps every `Running` run,
//! catching both lost eager triggers and runs that have exceeded their
//! wall-clock budget (a dead participant endpoint must not hold a run open
//! forever; it gets finalized over whatever predictions exist).
//!
//! Exclusivity comes from the store's compare-and-swap commit: concurrent
//! attempts may both compute metrics, but exactly one `complete_run`
//! succeeds. The loser observes the run is no longer `Running` and walks
//! away.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, instrument, warn};

use crate::configuration::Configuration;
use crate::model::Run;
use crate::scoring::macro_f1;
use crate::store::{RunStore, StoreError};

/// Detects completed (or expired) runs and commits their aggregate metrics.
#[derive(Clone)]
pub struct Finalizer {
    store: Arc<dyn RunStore>,
    run_time_limit: Duration,
}

impl Finalizer {
    pub fn new(store: Arc<dyn RunStore>, config: &Configuration) -> Self {
        Self {
            store,
            run_time_limit: config.run_time_limit,
        }
    }

    /// Eager finalization attempt: commits metrics iff the run is `Running`
    /// with every dispatched sample attempted. Returns `true` when this call
    /// performed the commit.
    #[instrument(skip(self))]
    pub fn try_finalize(&self, run_id: u64) -> Result<bool, StoreError> {
        let run = self.store.run(run_id)?;
        if !matches!(run.status, crate::model::RunStatus::Running) || !run.is_complete() {
            return Ok(false);
        }
        self.finalize(&run)
    }

    /// Reaper sweep: finalizes every `Running` run that is complete or has
    /// outlived the configured time limit. Returns the number of runs this
    /// sweep actually closed.
    pub fn reap(&self) -> Result<usize, StoreError> {
        let now = SystemTime::now();
        let mut finalized = 0;
        for run in self.store.running_runs()? {
            let expired = self.is_expired(&run, now);
            if run.is_complete() || expired {
                if expired && !run.is_complete() {
                    warn!(
                        run_id = run.id,
                        processed = run.samples_processed,
                        total = run.samples_total,
                        "run exceeded its time limit, finalizing with partial data"
                    );
                }
                if self.finalize(&run)? {
                    finalized += 1;
                }
            }
        }
        Ok(finalized)
    }

    fn is_expired(&self, run: &Run, now: SystemTime) -> bool {
        match run.started_at {
            Some(started_at) => now
                .duration_since(started_at)
                .map_or(false, |age| age > self.run_time_limit),
            None => false,
        }
    }

    /// Computes metrics over the run's recorded predictions and commits them
    /// through the store's compare-and-swap. Losing the race is not an
    /// error.
    fn finalize(&self, run: &Run) -> Result<bool, StoreError> {
        let predictions = self.store.predictions(run.id)?;

        let latencies: Vec<f64> = predictions.iter().filter_map(|p| p.latency_ms).collect();
        let avg_latency_ms = if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
        };

        let pairs: Vec<_> = predictions
            .iter()
            .map(|p| (p.gold.clone(), p.predicted.clone().unwrap_or_default()))
            .collect();
        let f1 = macro_f1(&pairs);

        let won = self
            .store
            .complete_run(run.id, f1, avg_latency_ms, SystemTime::now())?;
        if won {
            info!(
                run_id = run.id,
                f1,
                ?avg_latency_ms,
                samples = predictions.len(),
                "run finalized"
            );
        } else {
            debug!(run_id = run.id, "lost finalization race, nothing to do");
        }
        Ok(won)
    }
}
