//! Data source provenance records.

use serde::{Deserialize, Serialize};

use crate::id::UserId;

/// Identifier of a data source.
///
/// Sources are small, append-only provenance rows; the store allocates
/// sequential ids. A source is never deleted while beliefs reference it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataSourceId(pub u32);

impl std::fmt::Display for DataSourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "source-{}", self.0)
    }
}

/// How a source produces values.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Entered by a person (has an owning user).
    User,
    /// Produced by an ingestion script.
    Script,
    /// Produced by a forecasting run.
    Forecaster,
}

/// Provenance record for a family of beliefs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: DataSourceId,
    pub kind: SourceKind,
    /// Human-readable label, e.g. `"forecast by linear-OLS v2"`.
    pub label: String,
    pub user: Option<UserId>,
}

impl DataSource {
    pub fn script(id: DataSourceId, label: impl Into<String>) -> Self {
        Self {
            id,
            kind: SourceKind::Script,
            label: label.into(),
            user: None,
        }
    }

    pub fn forecaster(id: DataSourceId, label: impl Into<String>) -> Self {
        Self {
            id,
            kind: SourceKind::Forecaster,
            label: label.into(),
            user: None,
        }
    }

    pub fn user_entered(id: DataSourceId, label: impl Into<String>, user: UserId) -> Self {
        Self {
            id,
            kind: SourceKind::User,
            label: label.into(),
            user: Some(user),
        }
    }
}
