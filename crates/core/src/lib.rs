//! `fluxcast-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no storage or model
//! concerns): typed identifiers, time arithmetic, the shared belief shape,
//! and provenance records.

pub mod asset;
pub mod error;
pub mod id;
pub mod source;
pub mod time;
pub mod value;

pub use asset::{Asset, Seasonality};
pub use error::{DomainError, DomainResult};
pub use id::{AssetId, JobId, UserId};
pub use source::{DataSource, DataSourceId, SourceKind};
pub use time::{supported_horizons, Horizon, Resolution, TimeWindow};
pub use value::{TimedValue, ValueKind};
