//! Belief storage implementations.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use fluxcast_core::{
    Asset, AssetId, DataSource, DataSourceId, Horizon, SourceKind, TimeWindow, TimedValue, UserId,
};

/// Belief store abstraction.
///
/// One asset owns one family of beliefs; rows are uniquely keyed by
/// `(event_time, horizon, source)` within the asset. Forecasts supersede
/// earlier beliefs by writing new rows at other horizons, never by update.
pub trait BeliefStore: Send + Sync {
    /// Register an asset.
    fn add_asset(&self, asset: Asset) -> Result<AssetId, StoreError>;

    /// Look up an asset by id.
    fn asset(&self, id: AssetId) -> Result<Option<Asset>, StoreError>;

    /// Look up an asset by name.
    fn asset_by_name(&self, name: &str) -> Result<Option<Asset>, StoreError>;

    /// Create a new source row.
    fn add_source(
        &self,
        kind: SourceKind,
        label: &str,
        user: Option<UserId>,
    ) -> Result<DataSource, StoreError>;

    /// Look up a source by id.
    fn source(&self, id: DataSourceId) -> Result<Option<DataSource>, StoreError>;

    /// Return the forecaster source with this label, creating it on first
    /// use (a forecasting run labels its own output lazily).
    fn ensure_forecaster_source(&self, label: &str) -> Result<DataSource, StoreError>;

    /// Append beliefs for an asset. Duplicate keys are rejected.
    fn append(&self, asset_id: AssetId, beliefs: &[TimedValue]) -> Result<(), StoreError>;

    /// All beliefs for an asset whose event time falls in `window`,
    /// optionally restricted to the given sources. Ordered by event time,
    /// then horizon, then source.
    fn beliefs_in(
        &self,
        asset_id: AssetId,
        window: &TimeWindow,
        sources: Option<&[DataSourceId]>,
    ) -> Result<Vec<TimedValue>, StoreError>;

    /// Number of beliefs stored for an asset.
    fn belief_count(&self, asset_id: AssetId) -> Result<usize, StoreError>;

    /// Delete every belief produced by `source`, across all assets.
    /// Returns how many rows were removed. Ops helper for purging a
    /// misbehaving scraper or a bad forecast run; the source row itself
    /// stays.
    fn delete_beliefs_from(&self, source: DataSourceId) -> Result<usize, StoreError>;
}

/// Belief store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("unknown asset: {0}")]
    UnknownAsset(String),
    #[error("asset name already taken: {0}")]
    DuplicateAsset(String),
    // Field kept off the name `source` so thiserror does not treat it as
    // an error cause.
    #[error("duplicate belief for {asset} at {event_time} (horizon {horizon}, {data_source})")]
    DuplicateBelief {
        asset: AssetId,
        event_time: DateTime<Utc>,
        horizon: Horizon,
        data_source: DataSourceId,
    },
    #[error("storage error: {0}")]
    Storage(String),
}

type BeliefKey = (DateTime<Utc>, Horizon, DataSourceId);

/// In-memory belief store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryBeliefStore {
    assets: RwLock<HashMap<AssetId, Asset>>,
    names: RwLock<HashMap<String, AssetId>>,
    sources: RwLock<Vec<DataSource>>,
    beliefs: RwLock<HashMap<AssetId, BTreeMap<BeliefKey, TimedValue>>>,
}

impl InMemoryBeliefStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn next_source_id(sources: &[DataSource]) -> DataSourceId {
        DataSourceId(sources.len() as u32 + 1)
    }
}

impl BeliefStore for InMemoryBeliefStore {
    fn add_asset(&self, asset: Asset) -> Result<AssetId, StoreError> {
        let mut assets = self.assets.write().unwrap();
        let mut names = self.names.write().unwrap();
        if names.contains_key(&asset.name) {
            return Err(StoreError::DuplicateAsset(asset.name));
        }
        let id = asset.id;
        names.insert(asset.name.clone(), id);
        assets.insert(id, asset);
        Ok(id)
    }

    fn asset(&self, id: AssetId) -> Result<Option<Asset>, StoreError> {
        Ok(self.assets.read().unwrap().get(&id).cloned())
    }

    fn asset_by_name(&self, name: &str) -> Result<Option<Asset>, StoreError> {
        let names = self.names.read().unwrap();
        let assets = self.assets.read().unwrap();
        Ok(names.get(name).and_then(|id| assets.get(id)).cloned())
    }

    fn add_source(
        &self,
        kind: SourceKind,
        label: &str,
        user: Option<UserId>,
    ) -> Result<DataSource, StoreError> {
        let mut sources = self.sources.write().unwrap();
        let source = DataSource {
            id: Self::next_source_id(&sources),
            kind,
            label: label.to_string(),
            user,
        };
        sources.push(source.clone());
        Ok(source)
    }

    fn source(&self, id: DataSourceId) -> Result<Option<DataSource>, StoreError> {
        let sources = self.sources.read().unwrap();
        Ok(sources.iter().find(|s| s.id == id).cloned())
    }

    fn ensure_forecaster_source(&self, label: &str) -> Result<DataSource, StoreError> {
        {
            let sources = self.sources.read().unwrap();
            if let Some(existing) = sources
                .iter()
                .find(|s| s.kind == SourceKind::Forecaster && s.label == label)
            {
                return Ok(existing.clone());
            }
        }
        self.add_source(SourceKind::Forecaster, label, None)
    }

    fn append(&self, asset_id: AssetId, beliefs: &[TimedValue]) -> Result<(), StoreError> {
        if self.asset(asset_id)?.is_none() {
            return Err(StoreError::UnknownAsset(asset_id.to_string()));
        }
        let mut all = self.beliefs.write().unwrap();
        let rows = all.entry(asset_id).or_default();
        for belief in beliefs {
            let key = belief.key();
            if rows.contains_key(&key) {
                return Err(StoreError::DuplicateBelief {
                    asset: asset_id,
                    event_time: belief.event_time,
                    horizon: belief.horizon,
                    data_source: belief.source,
                });
            }
            rows.insert(key, *belief);
        }
        Ok(())
    }

    fn beliefs_in(
        &self,
        asset_id: AssetId,
        window: &TimeWindow,
        sources: Option<&[DataSourceId]>,
    ) -> Result<Vec<TimedValue>, StoreError> {
        let all = self.beliefs.read().unwrap();
        let Some(rows) = all.get(&asset_id) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .range((window.start, Horizon::seconds(i64::MIN), DataSourceId(0))..)
            .take_while(|((t, _, _), _)| *t < window.end)
            .filter(|((_, _, s), _)| sources.is_none_or(|ids| ids.contains(s)))
            .map(|(_, v)| *v)
            .collect())
    }

    fn belief_count(&self, asset_id: AssetId) -> Result<usize, StoreError> {
        let all = self.beliefs.read().unwrap();
        Ok(all.get(&asset_id).map_or(0, |rows| rows.len()))
    }

    fn delete_beliefs_from(&self, source: DataSourceId) -> Result<usize, StoreError> {
        let mut all = self.beliefs.write().unwrap();
        let mut removed = 0;
        for rows in all.values_mut() {
            let before = rows.len();
            rows.retain(|(_, _, s), _| *s != source);
            removed += before - rows.len();
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fluxcast_core::{Resolution, ValueKind};

    fn t(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 1, 1, h, 0, 0).unwrap()
    }

    fn meter() -> Asset {
        Asset::new("solar-1", ValueKind::Power, Resolution::minutes(15))
    }

    #[test]
    fn append_and_fetch_by_window() {
        let store = InMemoryBeliefStore::new();
        let asset_id = store.add_asset(meter()).unwrap();
        let source = store.add_source(SourceKind::Script, "scraper", None).unwrap();

        let beliefs: Vec<_> = (0..4)
            .map(|h| TimedValue::new(t(h), Horizon::hours(6), h as f64, source.id))
            .collect();
        store.append(asset_id, &beliefs).unwrap();

        let window = TimeWindow::new(t(1), t(3)).unwrap();
        let rows = store.beliefs_in(asset_id, &window, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, 1.0);
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let store = InMemoryBeliefStore::new();
        let asset_id = store.add_asset(meter()).unwrap();
        let source = store.add_source(SourceKind::Script, "scraper", None).unwrap();

        let belief = TimedValue::new(t(0), Horizon::hours(6), 1.0, source.id);
        store.append(asset_id, &[belief]).unwrap();
        let err = store.append(asset_id, &[belief]).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DuplicateBelief { data_source, .. } if data_source == source.id
        ));
        // The offending row is reported, not silently swallowed.
        assert!(err.to_string().contains("source-1"));

        // Same event, different horizon: a distinct belief.
        let later = TimedValue::new(t(0), Horizon::hours(1), 2.0, source.id);
        store.append(asset_id, &[later]).unwrap();
        assert_eq!(store.belief_count(asset_id).unwrap(), 2);
    }

    #[test]
    fn source_filter_restricts_rows() {
        let store = InMemoryBeliefStore::new();
        let asset_id = store.add_asset(meter()).unwrap();
        let s1 = store.add_source(SourceKind::Script, "scraper", None).unwrap();
        let s2 = store.add_source(SourceKind::Forecaster, "model", None).unwrap();

        store
            .append(
                asset_id,
                &[
                    TimedValue::new(t(0), Horizon::ZERO, 1.0, s1.id),
                    TimedValue::new(t(0), Horizon::hours(6), 2.0, s2.id),
                ],
            )
            .unwrap();

        let window = TimeWindow::new(t(0), t(1)).unwrap();
        let only_s2 = store.beliefs_in(asset_id, &window, Some(&[s2.id])).unwrap();
        assert_eq!(only_s2.len(), 1);
        assert_eq!(only_s2[0].value, 2.0);
    }

    #[test]
    fn deleting_by_source_leaves_other_rows() {
        let store = InMemoryBeliefStore::new();
        let asset_id = store.add_asset(meter()).unwrap();
        let s1 = store.add_source(SourceKind::Script, "scraper", None).unwrap();
        let s2 = store.add_source(SourceKind::Forecaster, "model", None).unwrap();

        store
            .append(
                asset_id,
                &[
                    TimedValue::new(t(0), Horizon::ZERO, 1.0, s1.id),
                    TimedValue::new(t(1), Horizon::ZERO, 2.0, s1.id),
                    TimedValue::new(t(0), Horizon::hours(6), 3.0, s2.id),
                ],
            )
            .unwrap();

        assert_eq!(store.delete_beliefs_from(s1.id).unwrap(), 2);
        assert_eq!(store.belief_count(asset_id).unwrap(), 1);
        // The source row itself survives.
        assert!(store.source(s1.id).unwrap().is_some());
    }

    #[test]
    fn forecaster_source_is_created_once() {
        let store = InMemoryBeliefStore::new();
        let a = store.ensure_forecaster_source("forecast by naive v1").unwrap();
        let b = store.ensure_forecaster_source("forecast by naive v1").unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.kind, SourceKind::Forecaster);

        let c = store.ensure_forecaster_source("forecast by linear-OLS v2").unwrap();
        assert_ne!(a.id, c.id);
    }
}
