//! Persistent state for runs and predictions.
//!
//! The [`RunStore`] trait is the single coordination point between the
//! dispatch publisher, the concurrent sample workers, and the finalizer.
//! Workers share no in-memory state; they coordinate only through the
//! store's atomic counter increments, the `(run_id, sample_index)`
//! uniqueness guarantee, and the compare-and-swap finalization commit.
//!
//! [`MemoryStore`] is the provided implementation, suited to a single
//! process. A relational backend would implement the same trait, with
//! `record_prediction` mapping to an insert inside a transaction and
//! `complete_run` to a conditional `UPDATE ... WHERE status = 'running'`.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::SystemTime;

use crate::model::{Phase, Prediction, Run, RunStatus, Team};

/// Storage failures and contract violations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("run {0} not found")]
    RunNotFound(u64),
    #[error("team {0} not found")]
    TeamNotFound(u64),
    #[error("phase {0} not found")]
    PhaseNotFound(u64),
    #[error("run {id} is {actual:?}, expected {expected:?}")]
    InvalidTransition {
        id: u64,
        expected: RunStatus,
        actual: RunStatus,
    },
}

/// Outcome of [`RunStore::record_prediction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The row was inserted and the run's counters advanced.
    Inserted,
    /// A row for this `(run_id, sample_index)` already exists; nothing was
    /// written. Duplicate deliveries land here and are not an error.
    Duplicate,
}

/// Storage seam for the evaluation pipeline.
pub trait RunStore: Send + Sync {
    /// Registers a participant team (external-admission contract).
    fn register_team(&self, name: &str, endpoint_url: &str) -> Result<Team, StoreError>;

    /// Registers an evaluation phase with its dataset file.
    fn register_phase(&self, name: &str, dataset_filename: &str) -> Result<Phase, StoreError>;

    /// Creates a queued run for a team in a phase. The caller (admission
    /// layer) is responsible for ensuring the team has no other active run.
    fn create_run(&self, team_id: u64, phase_id: u64) -> Result<Run, StoreError>;

    fn team(&self, id: u64) -> Result<Team, StoreError>;

    fn phase(&self, id: u64) -> Result<Phase, StoreError>;

    fn run(&self, id: u64) -> Result<Run, StoreError>;

    /// Transitions a queued run to running and stamps `started_at`.
    fn mark_running(&self, id: u64, started_at: SystemTime) -> Result<(), StoreError>;

    /// Reverts a running run back to queued after a dispatch failure, so a
    /// later start attempt can retry. Clears `started_at`.
    fn revert_to_queued(&self, id: u64) -> Result<(), StoreError>;

    /// Commits the expected unit count. Must be called only once every
    /// message for the run has been durably enqueued: this write is what
    /// arms completion detection.
    fn set_samples_total(&self, id: u64, total: u32) -> Result<(), StoreError>;

    /// Inserts a prediction row and advances the run's progress counters in
    /// one atomic step: `samples_processed` always, `samples_success` only
    /// when `prediction.ok`. A duplicate `(run_id, sample_index)` leaves
    /// both the row and the counters untouched.
    fn record_prediction(&self, prediction: Prediction) -> Result<RecordOutcome, StoreError>;

    /// All predictions recorded for a run so far.
    fn predictions(&self, run_id: u64) -> Result<Vec<Prediction>, StoreError>;

    /// Compare-and-swap finalization commit: writes the metrics, stamps
    /// `finished_at`, and moves the run to `Done` — but only if it is still
    /// `Running`. Returns `false` when another finalizer already won; the
    /// caller must treat that as a benign race, not an error.
    fn complete_run(
        &self,
        id: u64,
        f1: f64,
        avg_latency_ms: Option<f64>,
        finished_at: SystemTime,
    ) -> Result<bool, StoreError>;

    /// Runs currently in `Running` state (reaper sweep input).
    fn running_runs(&self) -> Result<Vec<Run>, StoreError>;

    /// Finalized runs for a phase (ranker input).
    fn done_runs(&self, phase_id: u64) -> Result<Vec<Run>, StoreError>;
}

#[derive(Default)]
struct Tables {
    teams: HashMap<u64, Team>,
    phases: HashMap<u64, Phase>,
    runs: HashMap<u64, Run>,
    predictions: HashMap<u64, Vec<Prediction>>,
    // uniqueness constraint on (run_id, sample_index)
    seen_samples: HashSet<(u64, u32)>,
    next_id: u64,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory [`RunStore`]. All tables live behind one mutex, so every trait
/// operation is a single atomic transaction.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStore for MemoryStore {
    fn register_team(&self, name: &str, endpoint_url: &str) -> Result<Team, StoreError> {
        let mut tables = self.tables.lock().expect("poisoned");
        let id = tables.next_id();
        let team = Team {
            id,
            name: name.to_owned(),
            endpoint_url: endpoint_url.to_owned(),
        };
        tables.teams.insert(id, team.clone());
        Ok(team)
    }

    fn register_phase(&self, name: &str, dataset_filename: &str) -> Result<Phase, StoreError> {
        let mut tables = self.tables.lock().expect("poisoned");
        let id = tables.next_id();
        let phase = Phase {
            id,
            name: name.to_owned(),
            dataset_filename: dataset_filename.to_owned(),
        };
        tables.phases.insert(id, phase.clone());
        Ok(phase)
    }

    fn create_run(&self, team_id: u64, phase_id: u64) -> Result<Run, StoreError> {
        let mut tables = self.tables.lock().expect("poisoned");
        if !tables.teams.contains_key(&team_id) {
            return Err(StoreError::TeamNotFound(team_id));
        }
        if !tables.phases.contains_key(&phase_id) {
            return Err(StoreError::PhaseNotFound(phase_id));
        }
        let id = tables.next_id();
        let run = Run {
            id,
            team_id,
            phase_id,
            status: RunStatus::Queued,
            started_at: None,
            finished_at: None,
            samples_total: 0,
            samples_processed: 0,
            samples_success: 0,
            avg_latency_ms: None,
            f1: None,
            created_at: SystemTime::now(),
        };
        tables.runs.insert(id, run.clone());
        Ok(run)
    }

    fn team(&self, id: u64) -> Result<Team, StoreError> {
        let tables = self.tables.lock().expect("poisoned");
        tables.teams.get(&id).cloned().ok_or(StoreError::TeamNotFound(id))
    }

    fn phase(&self, id: u64) -> Result<Phase, StoreError> {
        let tables = self.tables.lock().expect("poisoned");
        tables
            .phases
            .get(&id)
            .cloned()
            .ok_or(StoreError::PhaseNotFound(id))
    }

    fn run(&self, id: u64) -> Result<Run, StoreError> {
        let tables = self.tables.lock().expect("poisoned");
        tables.runs.get(&id).cloned().ok_or(StoreError::RunNotFound(id))
    }

    fn mark_running(&self, id: u64, started_at: SystemTime) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().expect("poisoned");
        let run = tables.runs.get_mut(&id).ok_or(StoreError::RunNotFound(id))?;
        if run.status != RunStatus::Queued {
            return Err(StoreError::InvalidTransition {
                id,
                expected: RunStatus::Queued,
                actual: run.status,
            });
        }
        run.status = RunStatus::Running;
        run.started_at = Some(started_at);
        Ok(())
    }

    fn revert_to_queued(&self, id: u64) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().expect("poisoned");
        let run = tables.runs.get_mut(&id).ok_or(StoreError::RunNotFound(id))?;
        if run.status != RunStatus::Running {
            return Err(StoreError::InvalidTransition {
                id,
                expected: RunStatus::Running,
                actual: run.status,
            });
        }
        run.status = RunStatus::Queued;
        run.started_at = None;
        Ok(())
    }

    fn set_samples_total(&self, id: u64, total: u32) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().expect("poisoned");
        let run = tables.runs.get_mut(&id).ok_or(StoreError::RunNotFound(id))?;
        run.samples_total = total;
        Ok(())
    }

    fn record_prediction(&self, prediction: Prediction) -> Result<RecordOutcome, StoreError> {
        let mut tables = self.tables.lock().expect("poisoned");
        let key = (prediction.run_id, prediction.sample_index);
        if !tables.runs.contains_key(&prediction.run_id) {
            return Err(StoreError::RunNotFound(prediction.run_id));
        }
        if !tables.seen_samples.insert(key) {
            return Ok(RecordOutcome::Duplicate);
        }
        let ok = prediction.ok;
        tables
            .predictions
            .entry(prediction.run_id)
            .or_default()
            .push(prediction);
        // same transaction as the insert: counters never drift from rows
        let run = tables.runs.get_mut(&key.0).expect("checked above");
        run.samples_processed += 1;
        if ok {
            run.samples_success += 1;
        }
        Ok(RecordOutcome::Inserted)
    }

    fn predictions(&self, run_id: u64) -> Result<Vec<Prediction>, StoreError> {
        let tables = self.tables.lock().expect("poisoned");
        if !tables.runs.contains_key(&run_id) {
            return Err(StoreError::RunNotFound(run_id));
        }
        Ok(tables.predictions.get(&run_id).cloned().unwrap_or_default())
    }

    fn complete_run(
        &self,
        id: u64,
        f1: f64,
        avg_latency_ms: Option<f64>,
        finished_at: SystemTime,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().expect("poisoned");
        let run = tables.runs.get_mut(&id).ok_or(StoreError::RunNotFound(id))?;
        if run.status != RunStatus::Running {
            // another finalizer won the race (or the run never started)
            return Ok(false);
        }
        run.f1 = Some(f1);
        run.avg_latency_ms = avg_latency_ms;
        run.finished_at = Some(finished_at);
        run.status = RunStatus::Done;
        Ok(true)
    }

    fn running_runs(&self) -> Result<Vec<Run>, StoreError> {
        let tables = self.tables.lock().expect("poisoned");
        Ok(tables
            .runs
            .values()
            .filter(|r| r.status == RunStatus::Running)
            .cloned()
            .collect())
    }

    fn done_runs(&self, phase_id: u64) -> Result<Vec<Run>, StoreError> {
        let tables = self.tables.lock().expect("poisoned");
        Ok(tables
            .runs
            .values()
            .filter(|r| r.phase_id == phase_id && r.status == RunStatus::Done)
            .cloned()
            .collect())
    }
}
