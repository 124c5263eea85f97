//! The horizon-aware query engine.
//!
//! A [`BeliefQuery`] answers "which beliefs should I trust about this
//! window, and at what resolution": it resolves the source preference
//! chain, filters by belief horizon (rolling or anchored to the end of the
//! window), resamples each asset's rows to the target resolution, and
//! optionally sums across assets or fabricates an empty index.

use std::collections::BTreeMap;

use tracing::debug;

use fluxcast_core::{Asset, DataSourceId, Horizon, Resolution, TimeWindow, TimedValue};

use crate::cache::SeriesCache;
use crate::series::{self, RawPoint, Series};
use crate::store::{BeliefStore, StoreError};

/// How horizon bounds are interpreted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum HorizonMode {
    /// Bounds are the age of the belief relative to each event.
    #[default]
    Rolling,
    /// Bounds are anchored to the end of the query window: each bound is
    /// adjusted by `window.end - (event_time + event_resolution)`, so the
    /// filter expresses "what was known as of a fixed moment" rather than
    /// "N hours before each event".
    Anchored,
}

/// Sources to fall back on when the preferred sources return nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FallbackSources {
    /// Never retry (the caller wants the preferred sources or nothing).
    #[default]
    Disabled,
    /// Retry once with these sources, minus any already tried.
    Sources(Vec<DataSourceId>),
}

/// Query error.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("unknown asset: {0}")]
    UnknownAsset(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a query: one summed series, or one series per asset name.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Summed(Series),
    PerAsset(BTreeMap<String, Series>),
}

impl QueryOutput {
    /// The single summed series, if this was a summed query.
    pub fn into_series(self) -> Option<Series> {
        match self {
            QueryOutput::Summed(s) => Some(s),
            QueryOutput::PerAsset(_) => None,
        }
    }

    pub fn into_map(self) -> Option<BTreeMap<String, Series>> {
        match self {
            QueryOutput::Summed(_) => None,
            QueryOutput::PerAsset(m) => Some(m),
        }
    }
}

/// A horizon/source-filtered series query against the belief store.
#[derive(Debug, Clone)]
pub struct BeliefQuery {
    asset_names: Vec<String>,
    window: TimeWindow,
    resolution: Resolution,
    horizon_lo: Option<Horizon>,
    horizon_hi: Option<Horizon>,
    mode: HorizonMode,
    preferred_sources: Vec<DataSourceId>,
    fallback_sources: FallbackSources,
    sum_across_assets: bool,
    create_if_empty: bool,
    zero_if_nan: bool,
}

impl BeliefQuery {
    pub fn new(
        asset_names: impl IntoIterator<Item = impl Into<String>>,
        window: TimeWindow,
        resolution: Resolution,
    ) -> Self {
        Self {
            asset_names: asset_names.into_iter().map(Into::into).collect(),
            window,
            resolution,
            horizon_lo: None,
            horizon_hi: None,
            mode: HorizonMode::Rolling,
            preferred_sources: Vec::new(),
            fallback_sources: FallbackSources::Disabled,
            sum_across_assets: false,
            create_if_empty: false,
            zero_if_nan: false,
        }
    }

    /// Filter by belief age relative to each event. Equal bounds collapse
    /// to an exact-horizon lookup.
    pub fn with_rolling_horizon(mut self, lo: Horizon, hi: Horizon) -> Self {
        self.horizon_lo = Some(lo);
        self.horizon_hi = Some(hi);
        self.mode = HorizonMode::Rolling;
        self
    }

    /// Keep only beliefs at least as committed as `hi` (an upper bound
    /// with no lower bound; `hi = 0` selects after-the-fact knowledge).
    pub fn with_horizon_at_most(mut self, hi: Horizon) -> Self {
        self.horizon_lo = None;
        self.horizon_hi = Some(hi);
        self.mode = HorizonMode::Rolling;
        self
    }

    /// Filter by what was known as of a moment anchored to the window end.
    pub fn with_anchored_horizon(mut self, lo: Horizon, hi: Horizon) -> Self {
        self.horizon_lo = Some(lo);
        self.horizon_hi = Some(hi);
        self.mode = HorizonMode::Anchored;
        self
    }

    pub fn with_preferred_sources(mut self, sources: impl Into<Vec<DataSourceId>>) -> Self {
        self.preferred_sources = sources.into();
        self
    }

    pub fn with_fallback_sources(mut self, sources: impl Into<Vec<DataSourceId>>) -> Self {
        self.fallback_sources = FallbackSources::Sources(sources.into());
        self
    }

    /// Add per-asset series element-wise after resampling.
    pub fn summed(mut self) -> Self {
        self.sum_across_assets = true;
        self
    }

    /// Fabricate a NaN series spanning the window instead of returning an
    /// empty one.
    pub fn create_if_empty(mut self) -> Self {
        self.create_if_empty = true;
        self
    }

    /// Replace NaN with zero in the final series.
    pub fn zero_if_nan(mut self) -> Self {
        self.zero_if_nan = true;
        self
    }

    pub fn window(&self) -> &TimeWindow {
        &self.window
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn asset_names(&self) -> &[String] {
        &self.asset_names
    }

    /// Stable cache key covering everything that can change the result:
    /// assets, window, resolution, horizon bounds and mode, source
    /// preference and fallback, and the NaN-handling flags.
    pub fn cache_key(&self) -> String {
        let bound = |b: Option<Horizon>| b.map_or_else(|| "*".to_string(), |h| h.to_string());
        let (lo, hi) = (bound(self.horizon_lo), bound(self.horizon_hi));
        let ids = |ids: &[DataSourceId]| {
            ids.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",")
        };
        let fallback = match &self.fallback_sources {
            FallbackSources::Disabled => "off".to_string(),
            FallbackSources::Sources(sources) => ids(sources),
        };
        format!(
            "{}|{}|{}|{lo}..{hi}|{mode:?}|p:{preferred}|f:{fallback}|{create}{zero}",
            self.asset_names.join("+"),
            self.window,
            self.resolution,
            mode = self.mode,
            preferred = ids(&self.preferred_sources),
            create = if self.create_if_empty { "c" } else { "" },
            zero = if self.zero_if_nan { "z" } else { "" },
        )
    }

    /// Execute against a store.
    pub fn execute(&self, store: &dyn BeliefStore) -> Result<QueryOutput, QueryError> {
        let mut per_asset: BTreeMap<String, Series> = BTreeMap::new();
        for name in &self.asset_names {
            let asset = store
                .asset_by_name(name)?
                .ok_or_else(|| QueryError::UnknownAsset(name.clone()))?;
            per_asset.insert(name.clone(), self.fetch_one(store, &asset)?);
        }

        if !self.sum_across_assets {
            return Ok(QueryOutput::PerAsset(per_asset));
        }

        let mut total: Option<Series> = None;
        for series in per_asset.into_values().filter(|s| !s.is_empty()) {
            total = Some(match total {
                Some(t) => t.add(&series),
                None => series,
            });
        }
        Ok(QueryOutput::Summed(total.unwrap_or_else(|| {
            self.empty_result()
        })))
    }

    /// Execute, serving summed queries from `cache` where possible.
    pub fn execute_cached(
        &self,
        store: &dyn BeliefStore,
        cache: &SeriesCache,
    ) -> Result<QueryOutput, QueryError> {
        if !self.sum_across_assets {
            return self.execute(store);
        }
        let key = self.cache_key();
        if let Some(hit) = cache.get(&key) {
            debug!(key, "series cache hit");
            return Ok(QueryOutput::Summed(hit));
        }
        let output = self.execute(store)?;
        if let QueryOutput::Summed(series) = &output {
            cache.put(key, series.clone());
        }
        Ok(output)
    }

    /// Fetch, horizon-filter, and resample one asset's rows, applying the
    /// source fallback chain.
    fn fetch_one(&self, store: &dyn BeliefStore, asset: &Asset) -> Result<Series, QueryError> {
        let preferred = if self.preferred_sources.is_empty() {
            None
        } else {
            Some(self.preferred_sources.as_slice())
        };

        let mut rows = self.fetch_filtered(store, asset, preferred)?;

        // One retry against sources not already tried. Without a stated
        // preference the first query already covered every source.
        if rows.is_empty() && preferred.is_some() {
            if let FallbackSources::Sources(fallback) = &self.fallback_sources {
                let remaining: Vec<DataSourceId> = fallback
                    .iter()
                    .copied()
                    .filter(|id| !self.preferred_sources.contains(id))
                    .collect();
                if !remaining.is_empty() {
                    debug!(asset = %asset.name, ?remaining, "preferred sources empty, retrying fallback");
                    rows = self.fetch_filtered(store, asset, Some(&remaining))?;
                }
            }
        }

        if rows.is_empty() {
            return Ok(self.empty_result());
        }

        let mut raw = Vec::with_capacity(rows.len());
        for b in &rows {
            let source_label = match store.source(b.source)? {
                Some(s) => s.label,
                None => b.source.to_string(),
            };
            raw.push(RawPoint {
                event_time: b.event_time,
                value: b.value,
                horizon: b.horizon,
                source_label,
            });
        }

        let mut series = series::resample(&raw, &self.window, self.resolution);
        if self.zero_if_nan {
            series.zero_fill();
        }
        Ok(series)
    }

    fn fetch_filtered(
        &self,
        store: &dyn BeliefStore,
        asset: &Asset,
        sources: Option<&[DataSourceId]>,
    ) -> Result<Vec<TimedValue>, QueryError> {
        let rows = store.beliefs_in(asset.id, &self.window, sources)?;
        if self.horizon_lo.is_none() && self.horizon_hi.is_none() {
            return Ok(rows);
        }
        Ok(rows
            .into_iter()
            .filter(|b| {
                let shift = match self.mode {
                    HorizonMode::Rolling => chrono::TimeDelta::zero(),
                    // Re-express the bounds relative to a fixed belief time
                    // anchored to the end of the window: a bound of 6h means
                    // "formed 6h before the window ends", so each event's
                    // bound shrinks by its distance to the window end.
                    HorizonMode::Anchored => {
                        (b.event_time + asset.resolution.as_delta()) - self.window.end
                    }
                };
                let above = self
                    .horizon_lo
                    .is_none_or(|lo| Horizon::from(lo.as_delta() + shift) <= b.horizon);
                let below = self
                    .horizon_hi
                    .is_none_or(|hi| b.horizon <= Horizon::from(hi.as_delta() + shift));
                above && below
            })
            .collect())
    }

    fn empty_result(&self) -> Series {
        if self.create_if_empty {
            let mut series = Series::nan_filled(&self.window, self.resolution);
            if self.zero_if_nan {
                series.zero_fill();
            }
            series
        } else {
            Series::empty(self.resolution)
        }
    }
}
