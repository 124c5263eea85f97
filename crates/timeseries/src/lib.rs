//! `fluxcast-timeseries` — belief storage and the horizon-aware query engine.
//!
//! ## Design
//!
//! - Beliefs are rows of the shared `TimedValue` shape, owned by an asset
//! - The store is a trait; the in-memory implementation backs tests and
//!   single-process deployments, a durable relational store is an
//!   embedding concern
//! - Queries resolve which sources to trust (preferred first, one retry
//!   against the remaining fallback sources), honor rolling or anchored
//!   horizon semantics, resample to the caller's resolution, and fill
//!   gaps deterministically

pub mod cache;
pub mod query;
pub mod series;
pub mod store;

pub use cache::SeriesCache;
pub use query::{BeliefQuery, FallbackSources, HorizonMode, QueryError, QueryOutput};
pub use series::{Series, SeriesPoint};
pub use store::{BeliefStore, InMemoryBeliefStore, StoreError};
