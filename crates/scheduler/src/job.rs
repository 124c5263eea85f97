//! The forecasting job type and the job-producer hook.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fluxcast_core::{supported_horizons, AssetId, Horizon, JobId, Resolution, TimeWindow, ValueKind};

use crate::store::{JobStore, JobStoreError};

/// A persisted unit of forecasting work: produce beliefs at `horizon` for
/// every event in `window` of one asset's series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastJob {
    pub id: JobId,
    /// Which series family the job targets.
    pub kind: ValueKind,
    pub asset_id: AssetId,
    /// The forecast-target interval.
    pub window: TimeWindow,
    pub horizon: Horizon,
    /// Set while a worker is processing the job. Not a hard lock: a claim
    /// older than the staleness threshold counts as abandoned.
    pub claimed_at: Option<DateTime<Utc>>,
}

impl ForecastJob {
    pub fn new(kind: ValueKind, asset_id: AssetId, window: TimeWindow, horizon: Horizon) -> Self {
        Self {
            id: JobId::new(),
            kind,
            asset_id,
            window,
            horizon,
            claimed_at: None,
        }
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed_at.is_some()
    }

    /// How much of a batch budget this job consumes: one unit per
    /// resolution step in the target window, partial steps rounded up.
    pub fn units_of_work(&self, resolution: Resolution) -> u64 {
        resolution.steps_spanning(&self.window)
    }
}

/// Enqueue one job per supported horizon when new measurements arrive.
///
/// Called by ingesting code after persisting raw data for an asset; the
/// horizon set follows from the data's resolution. Returns the ids of the
/// created jobs.
pub fn create_jobs_for_horizons(
    store: &dyn JobStore,
    kind: ValueKind,
    asset_id: AssetId,
    window: TimeWindow,
    resolution: Resolution,
) -> Result<Vec<JobId>, JobStoreError> {
    let mut ids = Vec::new();
    for horizon in supported_horizons(resolution) {
        let job = ForecastJob::new(kind, asset_id, window, horizon);
        ids.push(store.insert(job)?);
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryJobStore;
    use chrono::TimeZone;

    fn window() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2015, 1, 2, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn units_scale_with_resolution() {
        let job = ForecastJob::new(
            ValueKind::Power,
            AssetId::new(),
            window(),
            Horizon::hours(6),
        );
        assert_eq!(job.units_of_work(Resolution::minutes(15)), 96);
        assert_eq!(job.units_of_work(Resolution::hours(1)), 24);
    }

    #[test]
    fn one_job_per_supported_horizon() {
        let store = InMemoryJobStore::new();
        let ids = create_jobs_for_horizons(
            &store,
            ValueKind::Power,
            AssetId::new(),
            window(),
            Resolution::minutes(15),
        )
        .unwrap();

        // Quarter-hourly data supports the 1h/6h/24h/48h ladder.
        assert_eq!(ids.len(), 4);
        assert_eq!(store.len().unwrap(), 4);

        let daily = create_jobs_for_horizons(
            &store,
            ValueKind::Price,
            AssetId::new(),
            window(),
            Resolution::days(1),
        )
        .unwrap();
        assert_eq!(daily.len(), 2);
    }
}
