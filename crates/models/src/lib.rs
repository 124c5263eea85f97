//! `fluxcast-models` — the model registry and spec construction.
//!
//! **Responsibility:** map a model search term to a fully parameterized
//! model specification (outcome query, regressor queries, lags, training
//! window, re-fit cadence) plus the fallback term to escalate to when the
//! model fails. The statistical fitting itself stays behind the
//! [`RollingForecaster`] black-box contract.

pub mod forecaster;
pub mod registry;
pub mod spec;

pub use forecaster::{ForecastError, NaiveForecaster, RollingForecaster};
pub use registry::{resolve, ModelKind, RegistryError};
pub use spec::{
    build_spec, create_lags, derive_training_window, kind_resolution, ModelSpec, NoRegressors,
    RegressorLookup, SpecOverrides,
};
