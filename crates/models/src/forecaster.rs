//! The black-box rolling-forecast contract.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use fluxcast_core::TimeWindow;
use fluxcast_timeseries::{BeliefQuery, BeliefStore};

use crate::spec::ModelSpec;

/// Forecast error.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The window cannot be forecast from the available history; callers
    /// should consider a different window rather than retry.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Anything else the model run tripped over (worth retrying).
    #[error("model failure: {0}")]
    Model(String),
}

/// Fit a model and produce rolling predictions over the spec's target
/// window. Implementations wrap external statistics libraries; the
/// platform only depends on this contract.
pub trait RollingForecaster: Send + Sync {
    fn rolling_forecast(
        &self,
        spec: &ModelSpec,
        store: &dyn BeliefStore,
    ) -> Result<Vec<(DateTime<Utc>, f64)>, ForecastError>;
}

/// Persistence forecaster: each event is predicted to repeat whatever was
/// known one horizon earlier. The registry's terminal fallback, and the
/// reference implementation the scheduler tests run against.
#[derive(Debug, Default, Clone, Copy)]
pub struct NaiveForecaster;

impl RollingForecaster for NaiveForecaster {
    fn rolling_forecast(
        &self,
        spec: &ModelSpec,
        store: &dyn BeliefStore,
    ) -> Result<Vec<(DateTime<Utc>, f64)>, ForecastError> {
        let shift = spec.horizon.as_delta();
        let source_window = TimeWindow::new(spec.window.start - shift, spec.window.end - shift)
            .map_err(|e| ForecastError::Model(e.to_string()))?;

        let series = BeliefQuery::new(
            [spec.asset_name.clone()],
            source_window,
            spec.resolution,
        )
        .with_horizon_at_most(fluxcast_core::Horizon::ZERO)
        .summed()
        .execute(store)
        .map_err(|e| ForecastError::Model(e.to_string()))?
        .into_series()
        .ok_or_else(|| ForecastError::Model("summed query returned per-asset output".to_string()))?;

        let predictions: Vec<(DateTime<Utc>, f64)> = series
            .points
            .iter()
            .filter(|p| !p.value.is_nan())
            .map(|p| (p.event_time + shift, p.value))
            .collect();

        if predictions.is_empty() {
            return Err(ForecastError::InsufficientData(format!(
                "no measurements for {} in {}",
                spec.asset_name, source_window
            )));
        }
        debug!(
            asset = %spec.asset_name,
            horizon = %spec.horizon,
            points = predictions.len(),
            "naive rolling forecast produced"
        );
        Ok(predictions)
    }
}
