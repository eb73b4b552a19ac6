//! Dispatch publisher: fans a queued run out onto the work queue.
//!
//! The publisher moves the run to `Running`, streams the phase's dataset,
//! emits one [`SampleMessage`] per row (up to the configured cap) in batches
//! bounded by the queue's maximum batch size, and only then commits
//! `samples_total`. That ordering matters: the total is the signal the
//! finalizer keys completion off, so it must not exist until every message
//! is durably enqueued — otherwise a fast worker could trip finalization
//! while rows are still in flight.
//!
//! Any failure before the total is committed reverts the run to `Queued` so
//! the caller can retry the start from scratch; no partial total is ever
//! visible.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{info, instrument, warn};

use crate::annotation::parse_annotation_literal;
use crate::configuration::Configuration;
use crate::dataset::read_dataset;
use crate::queue::{QueueError, SampleMessage, WorkQueue};
use crate::store::{RunStore, StoreError};

/// Why a dispatch attempt failed. All variants are retriable: the run has
/// been reverted to `Queued` (where possible) and no `samples_total` was
/// committed.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("dataset {path:?} unreadable")]
    DatasetUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reads a run's dataset and publishes its samples to the work queue.
pub struct Dispatcher {
    store: Arc<dyn RunStore>,
    queue: Arc<dyn WorkQueue>,
    config: Configuration,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn RunStore>,
        queue: Arc<dyn WorkQueue>,
        config: Configuration,
    ) -> Self {
        Self {
            store,
            queue,
            config,
        }
    }

    /// Dispatches one queued run. Returns the number of samples enqueued,
    /// which equals the committed `samples_total`.
    #[instrument(skip(self))]
    pub fn dispatch(&self, run_id: u64) -> Result<u32, DispatchError> {
        let run = self.store.run(run_id)?;
        let team = self.store.team(run.team_id)?;
        let phase = self.store.phase(run.phase_id)?;

        self.store.mark_running(run_id, SystemTime::now())?;

        match self.publish_samples(run_id, &team.endpoint_url, run.team_id, &phase.dataset_filename)
        {
            Ok(total) => {
                self.store.set_samples_total(run_id, total)?;
                info!(run_id, total, "run dispatched");
                Ok(total)
            }
            Err(err) => {
                // retriable: hand the run back to the admission layer
                if let Err(revert_err) = self.store.revert_to_queued(run_id) {
                    warn!(run_id, %revert_err, "could not revert run after dispatch failure");
                }
                Err(err)
            }
        }
    }

    fn publish_samples(
        &self,
        run_id: u64,
        endpoint_url: &str,
        team_id: u64,
        dataset_filename: &str,
    ) -> Result<u32, DispatchError> {
        let path = self.config.datasets_dir.join(dataset_filename);
        let records = read_dataset(&path)
            .map_err(|source| DispatchError::DatasetUnreadable { path, source })?;

        let cap = self.config.max_rows.unwrap_or(usize::MAX);
        let messages: Vec<SampleMessage> = records
            .iter()
            .take(cap)
            .enumerate()
            .map(|(index, record)| {
                let gold = parse_annotation_literal(&record.annotation);
                SampleMessage::new(
                    run_id,
                    team_id,
                    endpoint_url,
                    index as u32,
                    record.sample.clone(),
                    gold,
                )
            })
            .collect();

        for batch in messages.chunks(self.queue.max_batch_size()) {
            self.queue.send_batch(batch)?;
        }
        Ok(messages.len() as u32)
    }
}
