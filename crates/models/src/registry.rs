//! Closed model registry.
//!
//! Models are a closed set of tagged variants resolved through an explicit
//! lookup that fails loudly on unknown search terms. Each variant carries
//! its version and the search term of the model to fall back on when it
//! cannot produce a forecast.

use thiserror::Error;

/// Registry error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown model: {0}")]
    UnknownModel(String),
}

/// The models the platform can run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// Ordinary least squares over lagged outcome values and regressors.
    LinearOls,
    /// Persistence: repeat the last known value at the horizon distance.
    Naive,
}

impl ModelKind {
    /// The search term this model is registered under.
    pub fn search_term(&self) -> &'static str {
        match self {
            ModelKind::LinearOls => "linear-OLS",
            ModelKind::Naive => "naive",
        }
    }

    /// Registry version of the model parameterization.
    pub fn version(&self) -> u32 {
        match self {
            ModelKind::LinearOls => 2,
            ModelKind::Naive => 1,
        }
    }

    /// Identifier used to label forecaster output sources.
    pub fn identifier(&self) -> String {
        format!("{} model v{}", self.search_term(), self.version())
    }

    /// Search term to try when this model fails, if any.
    pub fn fallback(&self) -> Option<&'static str> {
        match self {
            ModelKind::LinearOls => Some("naive"),
            ModelKind::Naive => None,
        }
    }
}

/// Look up a model by search term.
pub fn resolve(search_term: &str) -> Result<ModelKind, RegistryError> {
    match search_term {
        "linear-OLS" => Ok(ModelKind::LinearOls),
        "naive" => Ok(ModelKind::Naive),
        other => Err(RegistryError::UnknownModel(other.to_string())),
    }
}
