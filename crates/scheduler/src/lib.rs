//! `fluxcast-scheduler` — forecasting job scheduling and batch execution.
//!
//! ## Design
//!
//! - Jobs are persisted units of work, one per (asset, window, horizon)
//! - Claiming is an atomic conditional update; claims older than one hour
//!   count as abandoned and become selectable again
//! - The selector fills a unit-of-work budget, most recent windows first
//! - The executor walks a model's fallback chain before giving up
//! - The batch runner isolates per-job failures and reports one aggregate
//!   outcome through the status-reporting collaborator
//!
//! Many independent worker processes may run batches against a shared
//! durable store; the store is the only shared mutable resource.

pub mod executor;
pub mod job;
pub mod runner;
pub mod selector;
pub mod status;
pub mod store;

pub use executor::{ExecuteError, ForecastExecutor};
pub use job::{create_jobs_for_horizons, ForecastJob};
pub use runner::{BatchConfig, BatchError, BatchReport, BatchRunner};
pub use selector::{select_batch, stale_claim_threshold, RegistrySizing, WorkSizing};
pub use status::{run_with_status_report, InMemoryTaskRunStore, TaskRun, TaskRunStore};
pub use store::{InMemoryJobStore, JobStore, JobStoreError};
