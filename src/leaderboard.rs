//! Read-time leaderboard aggregation.
//!
//! Per team, the best finalized run of the phase represents the team;
//! representatives are then sorted into a total, deterministic order. All
//! comparisons treat a missing `f1` as 0.0 and a missing latency as a very
//! large sentinel, so a run with no measured latency can never outrank one
//! with real measurements on a latency tie-break.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::model::Run;
use crate::store::{RunStore, StoreError};

/// Latency stand-in for runs that never measured one.
const LATENCY_SENTINEL_MS: f64 = 1e9;

/// One leaderboard row: a team and its best run's metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub team_id: u64,
    pub team_name: String,
    pub f1: f64,
    pub avg_latency_ms: Option<f64>,
}

/// Ranks all teams with a finalized run in the phase.
///
/// Ordering: `f1` descending, then `avg_latency_ms` ascending, then team
/// name ascending. The name tie-break makes the order total.
pub fn rank(store: &dyn RunStore, phase_id: u64) -> Result<Vec<LeaderboardEntry>, StoreError> {
    let mut best_per_team: HashMap<u64, Run> = HashMap::new();
    for run in store.done_runs(phase_id)? {
        match best_per_team.get(&run.team_id) {
            Some(current) if metric_order(current, &run) != Ordering::Less => {}
            _ => {
                best_per_team.insert(run.team_id, run);
            }
        }
    }

    let mut entries = Vec::with_capacity(best_per_team.len());
    for run in best_per_team.into_values() {
        let team = store.team(run.team_id)?;
        entries.push(LeaderboardEntry {
            team_id: team.id,
            team_name: team.name,
            f1: run.f1.unwrap_or(0.0),
            avg_latency_ms: run.avg_latency_ms,
        });
    }

    entries.sort_by(|a, b| {
        b.f1.total_cmp(&a.f1)
            .then_with(|| latency_of(a).total_cmp(&latency_of(b)))
            .then_with(|| a.team_name.cmp(&b.team_name))
    });
    Ok(entries)
}

/// `Greater` when `a` is the better run: higher f1, then lower latency.
fn metric_order(a: &Run, b: &Run) -> Ordering {
    let f1_a = a.f1.unwrap_or(0.0);
    let f1_b = b.f1.unwrap_or(0.0);
    f1_a.total_cmp(&f1_b).then_with(|| {
        b.avg_latency_ms
            .unwrap_or(LATENCY_SENTINEL_MS)
            .total_cmp(&a.avg_latency_ms.unwrap_or(LATENCY_SENTINEL_MS))
    })
}

fn latency_of(entry: &LeaderboardEntry) -> f64 {
    entry.avg_latency_ms.unwrap_or(LATENCY_SENTINEL_MS)
}
