//! Per-job forecast execution.

use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, info, warn};

use fluxcast_core::{supported_horizons, DataSource, Horizon, Resolution, TimedValue};
use fluxcast_models::{
    build_spec, resolve, ForecastError, ModelKind, RegressorLookup, RollingForecaster,
};
use fluxcast_timeseries::BeliefStore;

use crate::job::ForecastJob;
use crate::store::JobStore;

/// Job execution error.
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    /// Terminal: the window cannot be forecast from available history.
    /// The job is removed, not retried.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Fatal to the whole batch: a job carries a horizon the platform
    /// does not support for its asset's resolution, which indicates a
    /// data-integrity bug rather than a runtime hiccup.
    #[error("unsupported horizon {horizon} for {resolution} data")]
    InvalidHorizon {
        horizon: Horizon,
        resolution: Resolution,
    },

    /// Transient: the claim is cleared and the job retried later.
    #[error(transparent)]
    Transient(#[from] anyhow::Error),
}

/// Runs one job end to end: resolve the model, walk its fallback chain,
/// persist the produced beliefs, delete the job.
pub struct ForecastExecutor {
    beliefs: Arc<dyn BeliefStore>,
    jobs: Arc<dyn JobStore>,
    forecaster: Arc<dyn RollingForecaster>,
    regressors: Arc<dyn RegressorLookup>,
    search_term: String,
}

impl ForecastExecutor {
    pub fn new(
        beliefs: Arc<dyn BeliefStore>,
        jobs: Arc<dyn JobStore>,
        forecaster: Arc<dyn RollingForecaster>,
        regressors: Arc<dyn RegressorLookup>,
        search_term: impl Into<String>,
    ) -> Self {
        Self {
            beliefs,
            jobs,
            forecaster,
            regressors,
            search_term: search_term.into(),
        }
    }

    /// The model search term this executor starts each job with.
    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn run(&self, job: &ForecastJob, source: &DataSource) -> Result<(), ExecuteError> {
        let asset = self
            .beliefs
            .asset(job.asset_id)
            .map_err(|e| anyhow!(e))?
            .ok_or_else(|| anyhow!("job {} references unknown asset {}", job.id, job.asset_id))?;

        if !supported_horizons(asset.resolution).contains(&job.horizon) {
            return Err(ExecuteError::InvalidHorizon {
                horizon: job.horizon,
                resolution: asset.resolution,
            });
        }

        let mut kind = resolve(&self.search_term).map_err(|e| anyhow!(e))?;
        let predictions = loop {
            let (spec, identifier) = build_spec(
                kind,
                &asset,
                job.window,
                job.horizon,
                None,
                None,
                self.regressors.as_ref(),
            )
            .map_err(|e| anyhow!(e))?;

            match self.forecaster.rolling_forecast(&spec, self.beliefs.as_ref()) {
                Ok(predictions) => break predictions,
                Err(err) => match kind.fallback() {
                    // A model that cannot forecast this window escalates
                    // to its fallback before the error becomes terminal.
                    Some(term) => {
                        warn!(
                            job = %job.id,
                            model = identifier,
                            fallback = term,
                            error = %err,
                            "model failed, escalating to fallback"
                        );
                        kind = resolve(term).map_err(|e| anyhow!(e))?;
                    }
                    None => return Err(classify(err)),
                },
            }
        };

        let beliefs: Vec<TimedValue> = predictions
            .into_iter()
            .map(|(event_time, value)| TimedValue::new(event_time, job.horizon, value, source.id))
            .collect();
        self.beliefs
            .append(job.asset_id, &beliefs)
            .map_err(|e| anyhow!(e))?;
        self.jobs.delete(job.id).map_err(|e| anyhow!(e))?;

        info!(
            job = %job.id,
            asset = %asset.name,
            horizon = %job.horizon,
            beliefs = beliefs.len(),
            model = %kind.identifier(),
            "forecast job completed"
        );
        Ok(())
    }
}

fn classify(err: ForecastError) -> ExecuteError {
    match err {
        ForecastError::InsufficientData(detail) => {
            debug!(detail, "window not forecastable, job will be removed");
            ExecuteError::InsufficientData(detail)
        }
        ForecastError::Model(detail) => ExecuteError::Transient(anyhow!(detail)),
    }
}
