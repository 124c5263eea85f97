//! Batch orchestration: Selector → Executor over many jobs, with per-job
//! failure isolation and one aggregate outcome.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use fluxcast_core::Horizon;
use fluxcast_models::{resolve, RegressorLookup, RollingForecaster};
use fluxcast_timeseries::{BeliefStore, StoreError};

use crate::executor::{ExecuteError, ForecastExecutor};
use crate::selector::{select_batch, RegistrySizing, WorkSizing};
use crate::status::{TaskRun, TaskRunStore};
use crate::store::{JobStore, JobStoreError};

/// Aggregate outcome of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct BatchReport {
    /// Jobs selected and claimed for this invocation.
    pub selected: usize,
    /// Jobs that produced and persisted forecasts.
    pub succeeded: usize,
    /// Jobs removed for terminal data insufficiency (not retried).
    pub removed: usize,
    /// Jobs released for a future retry after a transient failure.
    pub retried: usize,
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "selected={} succeeded={} removed={} retried={}",
            self.selected, self.succeeded, self.removed, self.retried
        )
    }
}

/// Batch error.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// Zero successes out of a nonzero selection: nothing from this batch
    /// should be committed.
    #[error("all {attempted} jobs failed; first cause: {cause}")]
    AllFailed { attempted: usize, cause: String },

    /// Some but not all jobs succeeded. A signal rather than a failure:
    /// beliefs written by the successful jobs are kept.
    #[error("batch partially completed: {0}")]
    Partial(BatchReport),

    /// A data-integrity bug (e.g. a job with an unsupported horizon)
    /// aborts the whole batch.
    #[error("batch aborted: {0}")]
    Integrity(String),

    #[error(transparent)]
    Jobs(#[from] JobStoreError),

    #[error(transparent)]
    Beliefs(#[from] StoreError),
}

/// Batch runner configuration.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Model search term each job starts with.
    pub search_term: String,
    /// Task name used for status reporting.
    pub task_name: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            search_term: "linear-OLS".to_string(),
            task_name: "make-forecasts".to_string(),
        }
    }
}

/// Orchestrates one batch: select, execute each job in isolation, report.
pub struct BatchRunner {
    jobs: Arc<dyn JobStore>,
    beliefs: Arc<dyn BeliefStore>,
    executor: ForecastExecutor,
    sizing: Arc<dyn WorkSizing>,
    config: BatchConfig,
}

impl BatchRunner {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        beliefs: Arc<dyn BeliefStore>,
        forecaster: Arc<dyn RollingForecaster>,
        regressors: Arc<dyn RegressorLookup>,
        config: BatchConfig,
    ) -> Self {
        let executor = ForecastExecutor::new(
            beliefs.clone(),
            jobs.clone(),
            forecaster,
            regressors,
            config.search_term.clone(),
        );
        Self {
            jobs,
            beliefs,
            executor,
            sizing: Arc::new(RegistrySizing),
            config,
        }
    }

    pub fn with_sizing(mut self, sizing: Arc<dyn WorkSizing>) -> Self {
        self.sizing = sizing;
        self
    }

    /// Run one batch worth at most `max_units` of work.
    ///
    /// Failure of one job never rolls back its siblings: successful jobs
    /// have already persisted their beliefs and deleted their rows when a
    /// later job fails.
    pub fn run(
        &self,
        max_units: u64,
        horizon: Option<Horizon>,
    ) -> Result<BatchReport, BatchError> {
        let batch = select_batch(
            self.jobs.as_ref(),
            self.sizing.as_ref(),
            max_units,
            horizon,
            Utc::now(),
        )?;
        let mut report = BatchReport {
            selected: batch.len(),
            ..BatchReport::default()
        };
        if batch.is_empty() {
            info!("no outstanding forecasting jobs");
            return Ok(report);
        }

        let model = resolve(&self.config.search_term)
            .map_err(|e| BatchError::Integrity(e.to_string()))?;
        let source = self
            .beliefs
            .ensure_forecaster_source(&format!("forecast by {}", model.identifier()))?;

        let mut first_cause: Option<String> = None;
        for (position, job) in batch.iter().enumerate() {
            match self.executor.run(job, &source) {
                Ok(()) => report.succeeded += 1,
                Err(ExecuteError::InsufficientData(detail)) => {
                    info!(job = %job.id, detail, "removing unforecastable job");
                    self.jobs.delete(job.id)?;
                    report.removed += 1;
                }
                Err(err @ ExecuteError::InvalidHorizon { .. }) => {
                    // Hand the offending and unprocessed jobs back right
                    // away instead of waiting out the staleness threshold.
                    for abandoned in &batch[position..] {
                        if let Err(release_err) = self.jobs.release(abandoned.id) {
                            warn!(
                                job = %abandoned.id,
                                error = %release_err,
                                "failed to release claim while aborting batch"
                            );
                        }
                    }
                    return Err(BatchError::Integrity(err.to_string()));
                }
                Err(ExecuteError::Transient(err)) => {
                    warn!(job = %job.id, error = %err, "job failed, releasing claim for retry");
                    self.jobs.release(job.id)?;
                    report.retried += 1;
                    first_cause.get_or_insert_with(|| err.to_string());
                }
            }
        }

        info!(%report, "forecasting batch finished");
        if report.succeeded == 0 {
            return Err(BatchError::AllFailed {
                attempted: report.selected,
                cause: first_cause.unwrap_or_else(|| "insufficient data for every job".to_string()),
            });
        }
        if report.succeeded < report.selected {
            return Err(BatchError::Partial(report));
        }
        Ok(report)
    }

    /// Like [`BatchRunner::run`], but records the outcome with the status
    /// collaborator on every exit path. Partial completion is recorded as
    /// a successful run with detail, since its results are kept.
    pub fn run_reported(
        &self,
        status: &dyn TaskRunStore,
        max_units: u64,
        horizon: Option<Horizon>,
    ) -> Result<BatchReport, BatchError> {
        let result = self.run(max_units, horizon);
        let run = match &result {
            Ok(report) => TaskRun::success(&self.config.task_name).with_detail(report.to_string()),
            Err(BatchError::Partial(report)) => {
                TaskRun::success(&self.config.task_name).with_detail(format!("partial: {report}"))
            }
            Err(err) => TaskRun::failure(&self.config.task_name, err.to_string()),
        };
        if let Err(record_err) = status.record(run) {
            tracing::error!(error = %record_err, "failed to record batch status");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use fluxcast_core::{
        Asset, AssetId, Horizon, Resolution, TimeWindow, TimedValue, ValueKind,
    };
    use fluxcast_models::{ForecastError, ModelSpec, NaiveForecaster, NoRegressors};
    use fluxcast_timeseries::InMemoryBeliefStore;

    use crate::job::ForecastJob;
    use crate::status::InMemoryTaskRunStore;
    use crate::store::InMemoryJobStore;

    fn t(day: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 5, day, h, 0, 0).unwrap()
    }

    /// Scripted forecaster: behavior keyed by asset name.
    struct Scripted;

    impl RollingForecaster for Scripted {
        fn rolling_forecast(
            &self,
            spec: &ModelSpec,
            store: &dyn BeliefStore,
        ) -> Result<Vec<(DateTime<Utc>, f64)>, ForecastError> {
            if spec.asset_name.starts_with("sparse") {
                return Err(ForecastError::InsufficientData(
                    "not enough lagged data".to_string(),
                ));
            }
            if spec.asset_name.starts_with("flaky") {
                return Err(ForecastError::Model("connection reset".to_string()));
            }
            NaiveForecaster.rolling_forecast(spec, store)
        }
    }

    /// One hourly asset with measurements covering the lagged window.
    fn add_asset_with_history(store: &InMemoryBeliefStore, name: &str) -> AssetId {
        let asset = Asset::new(name, ValueKind::Power, Resolution::hours(1));
        let id = store.add_asset(asset).unwrap();
        let meter = store
            .ensure_forecaster_source("meter-script")
            .unwrap();
        let rows: Vec<_> = (0..48)
            .map(|i| {
                TimedValue::new(
                    t(1, 0) + Resolution::hours(1).as_delta() * i,
                    Horizon::ZERO,
                    1.0,
                    meter.id,
                )
            })
            .collect();
        store.append(id, &rows).unwrap();
        id
    }

    fn job_for(asset_id: AssetId) -> ForecastJob {
        ForecastJob::new(
            ValueKind::Power,
            asset_id,
            TimeWindow::new(t(3, 0), t(3, 6)).unwrap(),
            Horizon::hours(24),
        )
    }

    fn runner(
        beliefs: Arc<InMemoryBeliefStore>,
        jobs: Arc<InMemoryJobStore>,
    ) -> BatchRunner {
        BatchRunner::new(
            jobs,
            beliefs,
            Arc::new(Scripted),
            Arc::new(NoRegressors),
            BatchConfig {
                search_term: "naive".to_string(),
                ..BatchConfig::default()
            },
        )
    }

    #[test]
    fn full_success_returns_a_report() {
        let beliefs = InMemoryBeliefStore::arc();
        let jobs = InMemoryJobStore::arc();
        for name in ["chp-1", "chp-2"] {
            let id = add_asset_with_history(&beliefs, name);
            jobs.insert(job_for(id)).unwrap();
        }

        let report = runner(beliefs, jobs.clone()).run(1000, None).unwrap();
        assert_eq!(report.selected, 2);
        assert_eq!(report.succeeded, 2);
        assert_eq!(jobs.len().unwrap(), 0);
    }

    #[test]
    fn partial_completion_keeps_finished_work() {
        let beliefs = InMemoryBeliefStore::arc();
        let jobs = InMemoryJobStore::arc();

        // 3 succeed, 1 is data-insufficient, 1 fails transiently.
        let mut ok_assets = Vec::new();
        for name in ["chp-1", "chp-2", "chp-3"] {
            let id = add_asset_with_history(&beliefs, name);
            ok_assets.push(id);
            jobs.insert(job_for(id)).unwrap();
        }
        let sparse = add_asset_with_history(&beliefs, "sparse-1");
        jobs.insert(job_for(sparse)).unwrap();
        let flaky = add_asset_with_history(&beliefs, "flaky-1");
        let flaky_job = job_for(flaky);
        let flaky_job_id = flaky_job.id;
        jobs.insert(flaky_job).unwrap();

        let err = runner(beliefs.clone(), jobs.clone()).run(1000, None).unwrap_err();
        let BatchError::Partial(report) = err else {
            panic!("expected partial completion, got {err:?}");
        };
        assert_eq!(report.selected, 5);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.removed, 1);
        assert_eq!(report.retried, 1);

        // 5 - 3 - 1 = 1 job remains: the transient failure, claim cleared.
        assert_eq!(jobs.len().unwrap(), 1);
        let survivor = jobs.get(flaky_job_id).unwrap().unwrap();
        assert!(!survivor.is_claimed());

        // Beliefs written by the successes are retained.
        let window = TimeWindow::new(t(3, 0), t(3, 6)).unwrap();
        for id in ok_assets {
            let forecaster_rows: Vec<_> = beliefs
                .beliefs_in(id, &window, None)
                .unwrap()
                .into_iter()
                .filter(|b| b.horizon == Horizon::hours(24))
                .collect();
            assert_eq!(forecaster_rows.len(), 6);
        }
    }

    #[test]
    fn integrity_abort_releases_remaining_claims() {
        let beliefs = InMemoryBeliefStore::arc();
        let jobs = InMemoryJobStore::arc();
        let id = add_asset_with_history(&beliefs, "chp-1");

        // Walked first (most recent window), carrying a horizon the hourly
        // asset does not support.
        let bad = ForecastJob::new(
            ValueKind::Power,
            id,
            TimeWindow::new(t(4, 0), t(4, 6)).unwrap(),
            Horizon::hours(3),
        );
        jobs.insert(bad).unwrap();
        jobs.insert(job_for(id)).unwrap();

        let err = runner(beliefs, jobs.clone()).run(1000, None).unwrap_err();
        assert!(matches!(err, BatchError::Integrity(_)));

        // Nothing was deleted, and no claim survives the abort.
        assert_eq!(jobs.len().unwrap(), 2);
        assert_eq!(jobs.unclaimed(None).unwrap().len(), 2);
    }

    #[test]
    fn zero_successes_fail_the_whole_batch() {
        let beliefs = InMemoryBeliefStore::arc();
        let jobs = InMemoryJobStore::arc();
        let flaky = add_asset_with_history(&beliefs, "flaky-1");
        jobs.insert(job_for(flaky)).unwrap();

        let err = runner(beliefs, jobs.clone()).run(1000, None).unwrap_err();
        assert!(matches!(err, BatchError::AllFailed { attempted: 1, .. }));
        // The job survives with a cleared claim.
        assert_eq!(jobs.len().unwrap(), 1);
        assert_eq!(jobs.unclaimed(None).unwrap().len(), 1);
    }

    #[test]
    fn empty_selection_is_a_quiet_success() {
        let beliefs = InMemoryBeliefStore::arc();
        let jobs = InMemoryJobStore::arc();
        let report = runner(beliefs, jobs).run(1000, None).unwrap();
        assert_eq!(report, BatchReport::default());
    }

    #[test]
    fn horizon_filter_limits_the_batch() {
        let beliefs = InMemoryBeliefStore::arc();
        let jobs = InMemoryJobStore::arc();
        let id = add_asset_with_history(&beliefs, "chp-1");
        jobs.insert(job_for(id)).unwrap();
        let mut other = job_for(id);
        other.horizon = Horizon::hours(48);
        jobs.insert(other).unwrap();

        let report = runner(beliefs, jobs.clone())
            .run(1000, Some(Horizon::hours(24)))
            .unwrap();
        assert_eq!(report.selected, 1);
        assert_eq!(jobs.len().unwrap(), 1);
    }

    #[test]
    fn outcomes_are_reported_to_the_status_store() {
        let status = InMemoryTaskRunStore::new();

        // Success path.
        let beliefs = InMemoryBeliefStore::arc();
        let jobs = InMemoryJobStore::arc();
        let id = add_asset_with_history(&beliefs, "chp-1");
        jobs.insert(job_for(id)).unwrap();
        runner(beliefs, jobs).run_reported(&status, 1000, None).unwrap();
        let run = status.latest("make-forecasts").unwrap().unwrap();
        assert!(run.succeeded);

        // Total-failure path overwrites the record.
        let beliefs = InMemoryBeliefStore::arc();
        let jobs = InMemoryJobStore::arc();
        let flaky = add_asset_with_history(&beliefs, "flaky-1");
        jobs.insert(job_for(flaky)).unwrap();
        let _ = runner(beliefs, jobs).run_reported(&status, 1000, None);
        let run = status.latest("make-forecasts").unwrap().unwrap();
        assert!(!run.succeeded);
        assert!(run.detail.unwrap().contains("connection reset"));
    }
}
