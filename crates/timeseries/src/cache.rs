//! Bounded series cache.
//!
//! An explicit cache component with a capacity bound and invalidation
//! hooks, used to serve repeated query shapes without touching the store.
//! Keys are produced by [`crate::BeliefQuery::cache_key`] and embed the
//! asset names, so invalidating by asset name drops every entry that
//! could be stale.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::series::Series;

#[derive(Debug)]
struct Entry {
    series: Series,
    inserted_at: Instant,
}

/// Capacity-bounded cache of resampled series.
#[derive(Debug)]
pub struct SeriesCache {
    capacity: usize,
    max_age: Option<Duration>,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    /// Insertion order, oldest first. Evicted entries fall out lazily.
    order: Vec<String>,
}

impl SeriesCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            max_age: None,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Additionally expire entries older than `max_age`.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn get(&self, key: &str) -> Option<Series> {
        let mut inner = self.inner.lock().unwrap();
        let expired = match inner.entries.get(key) {
            Some(entry) => self
                .max_age
                .is_some_and(|age| entry.inserted_at.elapsed() > age),
            None => return None,
        };
        if expired {
            inner.entries.remove(key);
            return None;
        }
        inner.entries.get(key).map(|e| e.series.clone())
    }

    pub fn put(&self, key: String, series: Series) {
        let mut inner = self.inner.lock().unwrap();
        // A refresh moves the key to the back instead of duplicating it.
        inner.order.retain(|k| k != &key);
        while inner.entries.len() >= self.capacity {
            if inner.order.is_empty() {
                break;
            }
            // Oldest insertion first; keys already invalidated fall through.
            let oldest = inner.order.remove(0);
            inner.entries.remove(&oldest);
        }
        inner.order.push(key.clone());
        inner.entries.insert(
            key,
            Entry {
                series,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every entry whose key mentions `asset_name`.
    pub fn invalidate(&self, asset_name: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.retain(|key, _| !key.contains(asset_name));
        inner.order.retain(|key| !key.contains(asset_name));
    }

    pub fn invalidate_all(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
