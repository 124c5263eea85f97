//! The shared time-series belief shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::source::DataSourceId;
use crate::time::Horizon;

/// Which family of series a belief or job targets.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Metered power (production or consumption).
    Power,
    /// Market price.
    Price,
    /// Weather observation (temperature, radiation, wind).
    Weather,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Power => write!(f, "power"),
            ValueKind::Price => write!(f, "price"),
            ValueKind::Weather => write!(f, "weather"),
        }
    }
}

/// One observed or forecast value.
///
/// This shape is shared by every concrete series kind; the owning asset is
/// carried by the store, not the row. A belief is uniquely identified by
/// `(event_time, horizon, source)` within one asset: later, better-informed
/// forecasts supersede earlier ones by writing at a smaller horizon, never
/// by mutating an existing row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedValue {
    /// What time the value is about.
    pub event_time: DateTime<Utc>,
    /// When the belief was formed, relative to `event_time`.
    pub horizon: Horizon,
    pub value: f64,
    pub source: DataSourceId,
}

impl TimedValue {
    pub fn new(
        event_time: DateTime<Utc>,
        horizon: Horizon,
        value: f64,
        source: DataSourceId,
    ) -> Self {
        Self {
            event_time,
            horizon,
            value,
            source,
        }
    }

    /// The unique key within one asset's beliefs.
    pub fn key(&self) -> (DateTime<Utc>, Horizon, DataSourceId) {
        (self.event_time, self.horizon, self.source)
    }
}
