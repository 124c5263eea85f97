//! Budget-bounded job selection.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use fluxcast_core::{Horizon, Resolution, ValueKind};
use fluxcast_models::kind_resolution;

use crate::job::ForecastJob;
use crate::store::{JobStore, JobStoreError};

/// Claims older than this count as abandoned.
pub fn stale_claim_threshold() -> TimeDelta {
    TimeDelta::hours(1)
}

/// How job windows are converted to units of work.
pub trait WorkSizing: Send + Sync {
    fn resolution_for(&self, kind: ValueKind) -> Resolution;
}

/// Sizing backed by the model registry's per-kind parameterization.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegistrySizing;

impl WorkSizing for RegistrySizing {
    fn resolution_for(&self, kind: ValueKind) -> Resolution {
        kind_resolution(kind)
    }
}

/// Select and claim a batch of outstanding jobs worth at most `max_units`
/// of work.
///
/// Abandoned claims are released first. Candidates are walked most recent
/// window first; selection stops before the first job that would exceed
/// the budget, leaving the remainder for a future invocation. Each
/// selected job is claimed via the store's conditional update; a job lost
/// to a concurrent selector is simply skipped.
pub fn select_batch(
    store: &dyn JobStore,
    sizing: &dyn WorkSizing,
    max_units: u64,
    horizon: Option<Horizon>,
    now: DateTime<Utc>,
) -> Result<Vec<ForecastJob>, JobStoreError> {
    let reactivated = store.release_stale_claims(now, stale_claim_threshold())?;
    if reactivated > 0 {
        debug!(reactivated, "released abandoned job claims");
    }

    let mut selected = Vec::new();
    let mut used = 0u64;
    for mut job in store.unclaimed(horizon)? {
        let units = job.units_of_work(sizing.resolution_for(job.kind));
        if used + units > max_units {
            break;
        }
        if !store.claim(job.id, now)? {
            continue;
        }
        job.claimed_at = Some(now);
        used += units;
        selected.push(job);
    }

    debug!(
        jobs = selected.len(),
        units = used,
        budget = max_units,
        "selected forecasting batch"
    );
    Ok(selected)
}
