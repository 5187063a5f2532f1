//! Cache Module
//!
//! Provides in-memory caching keyed by name and parameter signature, with TTL
//! expiration and single-flight compute-once reads.

mod entry;
mod flight;
mod params;
mod stats;
mod store;


// Re-export public types
pub(crate) use entry::{Bucket, CacheEntry, StoredValue};
pub use params::{ParamValue, Params};
pub use stats::CacheStats;
pub use store::CacheStore;
