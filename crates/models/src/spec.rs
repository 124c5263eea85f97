//! Model spec construction.
//!
//! Everything here is a pure function of the asset's seasonality flags,
//! the horizon, the resolution, and the requested training length, so a
//! spec built twice for the same inputs is identical. The queries inside
//! a spec are built through the time-series query engine; executing them
//! is the forecaster's business.

use chrono::{DateTime, TimeDelta, Utc};

use fluxcast_core::{Asset, DomainError, Horizon, Resolution, Seasonality, TimeWindow, ValueKind};
use fluxcast_timeseries::BeliefQuery;

use crate::registry::ModelKind;

/// Default training-and-testing period.
fn default_training_length() -> TimeDelta {
    TimeDelta::days(30)
}

/// Share of the training-and-testing window used for fitting.
const TRAIN_RATIO: f64 = 2.0 / 3.0;

/// Default number of forecast steps between re-fits.
const DEFAULT_REFIT_EVERY: u32 = 48;

/// Native resolution assumed for each series family; also the unit-of-work
/// sizing the job selector uses.
pub fn kind_resolution(kind: ValueKind) -> Resolution {
    match kind {
        ValueKind::Power | ValueKind::Weather => Resolution::minutes(15),
        ValueKind::Price => Resolution::hours(1),
    }
}

/// "Nearest sensor of a kind to a location" — an external collaborator,
/// treated as a pure query.
pub trait RegressorLookup: Send + Sync {
    fn nearest_sensor(&self, kind: ValueKind, latitude: f64, longitude: f64) -> Option<String>;
}

/// Lookup that never finds a sensor (assets without correlated series).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRegressors;

impl RegressorLookup for NoRegressors {
    fn nearest_sensor(&self, _: ValueKind, _: f64, _: f64) -> Option<String> {
        None
    }
}

/// Caller-supplied spec parameter overrides.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpecOverrides {
    pub training_length: Option<TimeDelta>,
    pub refit_every: Option<u32>,
}

/// A fully parameterized model specification.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub kind: ModelKind,
    pub asset_name: String,
    /// The forecast-target interval.
    pub window: TimeWindow,
    pub horizon: Horizon,
    pub resolution: Resolution,
    /// Query for the outcome variable over training plus target window.
    pub outcome: BeliefQuery,
    /// One query per correlated external sensor.
    pub regressors: Vec<BeliefQuery>,
    /// Lags in resolution steps, sorted and unique.
    pub lags: Vec<u32>,
    pub training_window: TimeWindow,
    pub train_ratio: f64,
    pub refit_every: u32,
}

/// Lag set for a model: the horizon-aligned lag plus one periodic lag per
/// active seasonality whose period is at least the horizon.
pub fn create_lags(seasonality: Seasonality, horizon: Horizon, resolution: Resolution) -> Vec<u32> {
    let res_secs = resolution.as_secs();
    let horizon_secs = horizon.as_secs().max(res_secs);
    // Both positive after the clamp; div_ceil is only stable for unsigned.
    let mut lags = vec![(horizon_secs as u64).div_ceil(res_secs as u64) as u32];

    let periods: [(bool, i64); 3] = [
        (seasonality.daily, 86_400),
        (seasonality.weekly, 7 * 86_400),
        (seasonality.yearly, 365 * 86_400),
    ];
    for (active, period) in periods {
        if active && period >= horizon_secs {
            lags.push((period / res_secs) as u32);
        }
    }

    lags.sort_unstable();
    lags.dedup();
    lags
}

/// Training-and-testing window for a forecast starting at `forecast_start`:
/// it ends where the data was still known when the first forecast had to be
/// made, and reaches back `training_length`.
pub fn derive_training_window(
    forecast_start: DateTime<Utc>,
    horizon: Horizon,
    training_length: TimeDelta,
) -> Result<TimeWindow, DomainError> {
    let end = forecast_start - horizon.as_delta().max(TimeDelta::zero());
    TimeWindow::new(end - training_length, end)
}

/// Build the spec and the model identifier string for one asset/window/
/// horizon combination.
///
/// `ex_post_horizon` loosens the outcome query's belief filter for jobs
/// that re-forecast after the fact; by default only after-the-event
/// knowledge (measurements) feeds the model.
pub fn build_spec(
    kind: ModelKind,
    asset: &Asset,
    window: TimeWindow,
    horizon: Horizon,
    ex_post_horizon: Option<Horizon>,
    overrides: Option<SpecOverrides>,
    regressor_lookup: &dyn RegressorLookup,
) -> Result<(ModelSpec, String), DomainError> {
    let overrides = overrides.unwrap_or_default();
    let training_length = overrides
        .training_length
        .unwrap_or_else(default_training_length);
    let refit_every = overrides.refit_every.unwrap_or(DEFAULT_REFIT_EVERY);

    let training_window = derive_training_window(window.start, horizon, training_length)?;
    let data_window = TimeWindow::new(training_window.start, window.end)?;
    let max_belief_horizon = ex_post_horizon.unwrap_or(Horizon::ZERO);

    let outcome = BeliefQuery::new([asset.name.clone()], data_window, asset.resolution)
        .with_horizon_at_most(max_belief_horizon)
        .summed();

    let regressors = regressor_kinds(asset.kind)
        .iter()
        .filter_map(|kind| regressor_lookup.nearest_sensor(*kind, asset.latitude, asset.longitude))
        .map(|sensor_name| {
            BeliefQuery::new([sensor_name], data_window, asset.resolution)
                .summed()
                .create_if_empty()
        })
        .collect();

    let spec = ModelSpec {
        kind,
        asset_name: asset.name.clone(),
        window,
        horizon,
        resolution: asset.resolution,
        outcome,
        regressors,
        lags: create_lags(asset.seasonality, horizon, asset.resolution),
        training_window,
        train_ratio: TRAIN_RATIO,
        refit_every,
    };
    Ok((spec, kind.identifier()))
}

/// Which external series families correlate with each outcome family.
fn regressor_kinds(kind: ValueKind) -> &'static [ValueKind] {
    match kind {
        ValueKind::Power => &[ValueKind::Weather],
        ValueKind::Price | ValueKind::Weather => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap()
    }

    struct OneSensor;

    impl RegressorLookup for OneSensor {
        fn nearest_sensor(&self, kind: ValueKind, _: f64, _: f64) -> Option<String> {
            (kind == ValueKind::Weather).then(|| "temperature-amsterdam".to_string())
        }
    }

    #[test]
    fn lags_include_horizon_and_active_periods() {
        let lags = create_lags(
            Seasonality::daily_and_weekly(),
            Horizon::hours(6),
            Resolution::minutes(15),
        );
        // 6h ahead = 24 steps, daily = 96, weekly = 672.
        assert_eq!(lags, vec![24, 96, 672]);

        let no_seasonality = create_lags(
            Seasonality::default(),
            Horizon::hours(6),
            Resolution::minutes(15),
        );
        assert_eq!(no_seasonality, vec![24]);
    }

    #[test]
    fn fractional_horizon_steps_round_up() {
        // 90 minutes at hourly resolution is 1.5 steps, so lag 2.
        let lags = create_lags(
            Seasonality::default(),
            Horizon::minutes(90),
            Resolution::hours(1),
        );
        assert_eq!(lags, vec![2]);

        // A horizon shorter than one step clamps to a single lag.
        let sub_step = create_lags(
            Seasonality::default(),
            Horizon::minutes(5),
            Resolution::minutes(15),
        );
        assert_eq!(sub_step, vec![1]);
    }

    #[test]
    fn periods_shorter_than_the_horizon_are_skipped() {
        let lags = create_lags(
            Seasonality::daily(),
            Horizon::hours(48),
            Resolution::hours(1),
        );
        // The daily lag (24) would reach into the future at a 48h horizon.
        assert_eq!(lags, vec![48]);
    }

    #[test]
    fn training_window_precedes_known_data_edge() {
        let window =
            derive_training_window(start(), Horizon::hours(6), TimeDelta::days(30)).unwrap();
        assert_eq!(window.end, start() - TimeDelta::hours(6));
        assert_eq!(window.duration(), TimeDelta::days(30));

        // Ex-post horizons do not push the edge into the future.
        let ex_post =
            derive_training_window(start(), Horizon::hours(-2), TimeDelta::days(30)).unwrap();
        assert_eq!(ex_post.end, start());
    }

    #[test]
    fn power_specs_get_a_weather_regressor() {
        let asset = Asset::new("solar-1", ValueKind::Power, Resolution::minutes(15))
            .with_location(52.4, 4.9)
            .with_seasonality(Seasonality::daily());
        let window = TimeWindow::new(start(), start() + TimeDelta::days(1)).unwrap();

        let (spec, identifier) = build_spec(
            ModelKind::LinearOls,
            &asset,
            window,
            Horizon::hours(6),
            None,
            None,
            &OneSensor,
        )
        .unwrap();

        assert_eq!(identifier, "linear-OLS model v2");
        assert_eq!(spec.regressors.len(), 1);
        assert_eq!(spec.lags, vec![24, 96]);
        assert!(spec.training_window.end <= window.start);
        assert_eq!(spec.refit_every, DEFAULT_REFIT_EVERY);

        let price = Asset::new("epex-da", ValueKind::Price, Resolution::hours(1));
        let (spec, _) = build_spec(
            ModelKind::Naive,
            &price,
            window,
            Horizon::hours(24),
            None,
            None,
            &OneSensor,
        )
        .unwrap();
        assert!(spec.regressors.is_empty());
    }

    #[test]
    fn overrides_replace_training_length_and_cadence() {
        let asset = Asset::new("solar-2", ValueKind::Power, Resolution::minutes(15));
        let window = TimeWindow::new(start(), start() + TimeDelta::days(1)).unwrap();
        let overrides = SpecOverrides {
            training_length: Some(TimeDelta::days(7)),
            refit_every: Some(96),
        };

        let (spec, _) = build_spec(
            ModelKind::LinearOls,
            &asset,
            window,
            Horizon::hours(1),
            None,
            Some(overrides),
            &NoRegressors,
        )
        .unwrap();
        assert_eq!(spec.training_window.duration(), TimeDelta::days(7));
        assert_eq!(spec.refit_every, 96);
    }

    proptest! {
        #[test]
        fn lag_construction_is_deterministic(
            daily in any::<bool>(),
            weekly in any::<bool>(),
            yearly in any::<bool>(),
            horizon_hours in 1i64..=48,
            res_minutes in prop::sample::select(vec![15i64, 30, 60]),
        ) {
            let seasonality = Seasonality { daily, weekly, yearly };
            let horizon = Horizon::hours(horizon_hours);
            let resolution = Resolution::minutes(res_minutes);

            let a = create_lags(seasonality, horizon, resolution);
            let b = create_lags(seasonality, horizon, resolution);
            prop_assert_eq!(&a, &b);

            // Sorted, unique, and never empty.
            prop_assert!(!a.is_empty());
            prop_assert!(a.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn training_window_is_deterministic(
            horizon_hours in -24i64..=48,
            length_days in 7i64..=60,
        ) {
            let horizon = Horizon::hours(horizon_hours);
            let length = TimeDelta::days(length_days);

            let a = derive_training_window(start(), horizon, length).unwrap();
            let b = derive_training_window(start(), horizon, length).unwrap();
            prop_assert_eq!(a, b);
            prop_assert_eq!(a.duration(), length);
        }
    }
}
