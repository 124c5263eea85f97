//! Job storage implementations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, TimeDelta, Utc};

use fluxcast_core::{Horizon, JobId};

use crate::job::ForecastJob;

/// Job store abstraction.
///
/// Claiming is the one operation that must be atomic: `claim` succeeds for
/// exactly one caller while the job is unclaimed. Everything else is plain
/// row access.
pub trait JobStore: Send + Sync {
    /// Persist a new job.
    fn insert(&self, job: ForecastJob) -> Result<JobId, JobStoreError>;

    /// Get a job by id.
    fn get(&self, id: JobId) -> Result<Option<ForecastJob>, JobStoreError>;

    /// Delete a job (on success or terminal data insufficiency).
    fn delete(&self, id: JobId) -> Result<(), JobStoreError>;

    /// Number of jobs currently persisted.
    fn len(&self) -> Result<usize, JobStoreError>;

    /// Clear claims older than `max_age`, making abandoned jobs selectable
    /// again. Returns how many were released.
    fn release_stale_claims(
        &self,
        now: DateTime<Utc>,
        max_age: TimeDelta,
    ) -> Result<usize, JobStoreError>;

    /// Unclaimed jobs, optionally filtered to one horizon, ordered by
    /// window start descending then id descending (most recent work first,
    /// stable tie-break).
    fn unclaimed(&self, horizon: Option<Horizon>) -> Result<Vec<ForecastJob>, JobStoreError>;

    /// Conditionally claim a job: succeeds only if it is currently
    /// unclaimed. The compare-and-set that keeps two workers from both
    /// winning the same row.
    fn claim(&self, id: JobId, now: DateTime<Utc>) -> Result<bool, JobStoreError>;

    /// Clear a claim after a transient failure so the job is retried by a
    /// future batch.
    fn release(&self, id: JobId) -> Result<(), JobStoreError>;
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// In-memory job store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, ForecastJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, job: ForecastJob) -> Result<JobId, JobStoreError> {
        let mut jobs = self.jobs.write().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        let id = job.id;
        jobs.insert(id, job);
        Ok(id)
    }

    fn get(&self, id: JobId) -> Result<Option<ForecastJob>, JobStoreError> {
        Ok(self.jobs.read().unwrap().get(&id).cloned())
    }

    fn delete(&self, id: JobId) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().unwrap();
        jobs.remove(&id).ok_or(JobStoreError::NotFound(id))?;
        Ok(())
    }

    fn len(&self) -> Result<usize, JobStoreError> {
        Ok(self.jobs.read().unwrap().len())
    }

    fn release_stale_claims(
        &self,
        now: DateTime<Utc>,
        max_age: TimeDelta,
    ) -> Result<usize, JobStoreError> {
        let mut jobs = self.jobs.write().unwrap();
        let mut released = 0;
        for job in jobs.values_mut() {
            if let Some(claimed_at) = job.claimed_at {
                if now - claimed_at > max_age {
                    job.claimed_at = None;
                    released += 1;
                }
            }
        }
        Ok(released)
    }

    fn unclaimed(&self, horizon: Option<Horizon>) -> Result<Vec<ForecastJob>, JobStoreError> {
        let jobs = self.jobs.read().unwrap();
        let mut result: Vec<_> = jobs
            .values()
            .filter(|j| !j.is_claimed() && horizon.is_none_or(|h| j.horizon == h))
            .cloned()
            .collect();
        result.sort_by(|a, b| {
            b.window
                .start
                .cmp(&a.window.start)
                .then(b.id.cmp(&a.id))
        });
        Ok(result)
    }

    fn claim(&self, id: JobId, now: DateTime<Utc>) -> Result<bool, JobStoreError> {
        let mut jobs = self.jobs.write().unwrap();
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        if job.is_claimed() {
            return Ok(false);
        }
        job.claimed_at = Some(now);
        Ok(true)
    }

    fn release(&self, id: JobId) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().unwrap();
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        job.claimed_at = None;
        Ok(())
    }
}
