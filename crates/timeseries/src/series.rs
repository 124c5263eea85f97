//! Regularly spaced series and resampling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fluxcast_core::{Horizon, Resolution, TimeWindow};

/// One row of a resampled (or fabricated) series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub event_time: DateTime<Utc>,
    pub value: f64,
    /// Earliest (most committed) horizon among the aggregated beliefs.
    pub horizon: Option<Horizon>,
    /// Human-readable join of the contributing source labels.
    pub source: Option<String>,
}

/// A series at a fixed resolution, ordered by event time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub resolution: Resolution,
    pub points: Vec<SeriesPoint>,
}

impl Series {
    pub fn empty(resolution: Resolution) -> Self {
        Self {
            resolution,
            points: Vec::new(),
        }
    }

    /// Fabricate a NaN-valued series spanning `window`, one row per
    /// resolution step. Gives downstream consumers a stable index even
    /// when nothing was found.
    pub fn nan_filled(window: &TimeWindow, resolution: Resolution) -> Self {
        let steps = resolution.steps_spanning(window);
        let points = (0..steps)
            .map(|i| SeriesPoint {
                event_time: window.start + resolution.as_delta() * i as i32,
                value: f64::NAN,
                horizon: None,
                source: None,
            })
            .collect();
        Self { resolution, points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True when no row carries an actual value.
    pub fn is_all_nan(&self) -> bool {
        self.points.iter().all(|p| p.value.is_nan())
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.value)
    }

    /// Replace NaN values with zero, in place.
    pub fn zero_fill(&mut self) {
        for p in &mut self.points {
            if p.value.is_nan() {
                p.value = 0.0;
            }
        }
    }

    /// Element-wise sum over the aligned index.
    ///
    /// Both series must already be resampled over the same window at the
    /// same resolution; the aggregated horizon and source labels do not
    /// survive summation.
    pub fn add(&self, other: &Series) -> Series {
        debug_assert_eq!(self.len(), other.len());
        let points = self
            .points
            .iter()
            .zip(&other.points)
            .map(|(a, b)| SeriesPoint {
                event_time: a.event_time,
                value: a.value + b.value,
                horizon: None,
                source: None,
            })
            .collect();
        Series {
            resolution: self.resolution,
            points,
        }
    }
}

/// One raw belief ready for aggregation: value plus the provenance the
/// resampler folds into each output row.
#[derive(Debug, Clone)]
pub struct RawPoint {
    pub event_time: DateTime<Utc>,
    pub value: f64,
    pub horizon: Horizon,
    pub source_label: String,
}

/// Aggregate raw beliefs into one row per `target`-sized bin over `window`.
///
/// Values are averaged (NaN inputs are ignored; a bin with no usable value
/// stays NaN), the horizon is the minimum over the bin, and source labels
/// are joined uniquely in first-seen order.
pub fn resample(raw: &[RawPoint], window: &TimeWindow, target: Resolution) -> Series {
    let steps = target.steps_spanning(window);
    let step = target.as_delta();
    let mut points = Vec::with_capacity(steps as usize);

    for i in 0..steps {
        let bin_start = window.start + step * i as i32;
        let bin_end = bin_start + step;

        let mut sum = 0.0;
        let mut n = 0u32;
        let mut horizon: Option<Horizon> = None;
        let mut labels: Vec<&str> = Vec::new();

        for p in raw
            .iter()
            .filter(|p| p.event_time >= bin_start && p.event_time < bin_end)
        {
            if !p.value.is_nan() {
                sum += p.value;
                n += 1;
            }
            horizon = Some(match horizon {
                Some(h) => h.min(p.horizon),
                None => p.horizon,
            });
            if !labels.contains(&p.source_label.as_str()) {
                labels.push(&p.source_label);
            }
        }

        points.push(SeriesPoint {
            event_time: bin_start,
            value: if n > 0 { sum / n as f64 } else { f64::NAN },
            horizon,
            source: if labels.is_empty() {
                None
            } else {
                Some(labels.join(", "))
            },
        });
    }

    Series {
        resolution: target,
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fluxcast_core::DataSourceId;

    fn day() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2015, 1, 2, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn quarter_hour_day(label: &str) -> Vec<RawPoint> {
        let window = day();
        (0..96)
            .map(|i| RawPoint {
                event_time: window.start + Resolution::minutes(15).as_delta() * i,
                value: i as f64,
                horizon: Horizon::hours(6),
                source_label: label.to_string(),
            })
            .collect()
    }

    #[test]
    fn quarter_hours_resample_to_coarser_bins() {
        let raw = quarter_hour_day("meter");

        let half_hourly = resample(&raw, &day(), Resolution::minutes(30));
        assert_eq!(half_hourly.len(), 48);
        // First bin averages points 0 and 1.
        assert_eq!(half_hourly.points[0].value, 0.5);

        let coarse = resample(&raw, &day(), Resolution::minutes(45));
        assert_eq!(coarse.len(), 32);
    }

    #[test]
    fn bins_without_data_stay_nan() {
        let mut raw = quarter_hour_day("meter");
        raw.retain(|p| p.event_time.timestamp() % 3600 == 0); // hourly survivors

        let series = resample(&raw, &day(), Resolution::minutes(30));
        assert_eq!(series.len(), 48);
        assert!(!series.points[0].value.is_nan());
        assert!(series.points[1].value.is_nan());
    }

    #[test]
    fn min_horizon_and_joined_labels_win() {
        let window = day();
        let raw = vec![
            RawPoint {
                event_time: window.start,
                value: 1.0,
                horizon: Horizon::hours(6),
                source_label: "scraper".to_string(),
            },
            RawPoint {
                event_time: window.start + Resolution::minutes(15).as_delta(),
                value: 3.0,
                horizon: Horizon::hours(1),
                source_label: "meter".to_string(),
            },
        ];

        let series = resample(&raw, &day(), Resolution::minutes(30));
        assert_eq!(series.points[0].value, 2.0);
        assert_eq!(series.points[0].horizon, Some(Horizon::hours(1)));
        assert_eq!(series.points[0].source.as_deref(), Some("scraper, meter"));
    }

    #[test]
    fn nan_filled_spans_window() {
        let series = Series::nan_filled(&day(), Resolution::hours(1));
        assert_eq!(series.len(), 24);
        assert!(series.is_all_nan());

        let mut zeroed = series.clone();
        zeroed.zero_fill();
        assert!(zeroed.values().all(|v| v == 0.0));
    }

    #[test]
    fn elementwise_sum_is_aligned() {
        let a = {
            let mut s = Series::nan_filled(&day(), Resolution::hours(6));
            s.zero_fill();
            s.points[0].value = 2.0;
            s
        };
        let b = {
            let mut s = Series::nan_filled(&day(), Resolution::hours(6));
            s.zero_fill();
            s.points[0].value = 3.0;
            s
        };
        let sum = a.add(&b);
        assert_eq!(sum.points[0].value, 5.0);
        assert_eq!(sum.points[1].value, 0.0);
    }

    #[test]
    fn raw_point_key_fields_survive() {
        // Smoke-check the shape used by the query engine.
        let p = RawPoint {
            event_time: day().start,
            value: 1.0,
            horizon: Horizon::ZERO,
            source_label: DataSourceId(1).to_string(),
        };
        assert_eq!(p.source_label, "source-1");
    }
}
