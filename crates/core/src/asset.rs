//! Asset descriptors.

use serde::{Deserialize, Serialize};

use crate::id::AssetId;
use crate::time::Resolution;
use crate::value::ValueKind;

/// Seasonal patterns a series is expected to exhibit.
///
/// Drives lag construction: each active flag contributes one periodic lag
/// when a model spec is built.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seasonality {
    pub daily: bool,
    pub weekly: bool,
    pub yearly: bool,
}

impl Seasonality {
    pub fn daily() -> Self {
        Self {
            daily: true,
            ..Self::default()
        }
    }

    pub fn daily_and_weekly() -> Self {
        Self {
            daily: true,
            weekly: true,
            yearly: false,
        }
    }
}

/// A metered site, market, or weather station owning one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    pub kind: ValueKind,
    /// Native spacing of the asset's measurements.
    pub resolution: Resolution,
    pub latitude: f64,
    pub longitude: f64,
    pub seasonality: Seasonality,
}

impl Asset {
    pub fn new(name: impl Into<String>, kind: ValueKind, resolution: Resolution) -> Self {
        Self {
            id: AssetId::new(),
            name: name.into(),
            kind,
            resolution,
            latitude: 0.0,
            longitude: 0.0,
            seasonality: Seasonality::default(),
        }
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self
    }

    pub fn with_seasonality(mut self, seasonality: Seasonality) -> Self {
        self.seasonality = seasonality;
        self
    }
}
