//! Time primitives: horizons, resolutions, and windows.
//!
//! A *horizon* is the signed offset between the moment a belief was formed
//! and the event it is about: positive horizons are forecasts (the belief
//! predates the event), zero or negative horizons are after-the-fact
//! knowledge. Both horizons and resolutions are stored as whole seconds so
//! they stay `Copy`, hashable, and serde-transparent.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Signed offset between belief time and event time.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Horizon(i64);

impl Horizon {
    pub const ZERO: Horizon = Horizon(0);

    pub const fn seconds(secs: i64) -> Self {
        Self(secs)
    }

    pub const fn minutes(mins: i64) -> Self {
        Self(mins * 60)
    }

    pub const fn hours(hours: i64) -> Self {
        Self(hours * 3600)
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }

    pub fn as_delta(&self) -> TimeDelta {
        TimeDelta::seconds(self.0)
    }

    /// True for beliefs formed before the event (forecasts).
    pub fn is_ex_ante(&self) -> bool {
        self.0 > 0
    }
}

impl From<TimeDelta> for Horizon {
    fn from(delta: TimeDelta) -> Self {
        Self(delta.num_seconds())
    }
}

impl std::fmt::Display for Horizon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secs = self.0.abs();
        let sign = if self.0 < 0 { "-" } else { "" };
        if secs % 3600 == 0 {
            write!(f, "{sign}{}h", secs / 3600)
        } else if secs % 60 == 0 {
            write!(f, "{sign}{}m", secs / 60)
        } else {
            write!(f, "{sign}{secs}s")
        }
    }
}

/// Native or target spacing of a series, in whole seconds. Always positive.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resolution(i64);

impl Resolution {
    pub const fn minutes(mins: i64) -> Self {
        Self(mins * 60)
    }

    pub const fn hours(hours: i64) -> Self {
        Self(hours * 3600)
    }

    pub const fn days(days: i64) -> Self {
        Self(days * 86_400)
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }

    pub fn as_delta(&self) -> TimeDelta {
        TimeDelta::seconds(self.0)
    }

    /// Number of resolution-sized steps covering `window`, rounding the
    /// final partial step up.
    pub fn steps_spanning(&self, window: &TimeWindow) -> u64 {
        let span = window.duration().num_seconds();
        (span as u64).div_ceil(self.0 as u64)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 % 3600 == 0 {
            write!(f, "{}h", self.0 / 3600)
        } else {
            write!(f, "{}m", self.0 / 60)
        }
    }
}

/// Half-open event-time interval `[start, end)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Build a window, rejecting empty or inverted intervals.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<Self> {
        if end <= start {
            return Err(DomainError::validation(format!(
                "time window end must follow start ({start} .. {end})"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} .. {})", self.start, self.end)
    }
}

/// Forecast horizons the platform supports for data of a given resolution.
///
/// Sub-hourly and hourly data get the full ladder; daily data only the
/// day-scale horizons. Unknown resolutions get an empty set, which the
/// executor treats as "no valid horizon exists".
pub fn supported_horizons(resolution: Resolution) -> Vec<Horizon> {
    let secs = resolution.as_secs();
    if secs <= 3600 {
        vec![
            Horizon::hours(1),
            Horizon::hours(6),
            Horizon::hours(24),
            Horizon::hours(48),
        ]
    } else if secs == 86_400 {
        vec![Horizon::hours(24), Horizon::hours(48)]
    } else {
        Vec::new()
    }
}
