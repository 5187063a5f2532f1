//! Param Cache - an in-process cache keyed by name and parameter signature
//!
//! Stores arbitrary values under (key, params) with optional TTL expiration,
//! and computes missing values at most once per concurrent miss.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{CacheStats, CacheStore, ParamValue, Params};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use tasks::{spawn_configured_sweep_task, spawn_sweep_task};
