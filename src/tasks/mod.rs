//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside a cache store.
//!
//! # Tasks
//! - TTL Sweep: Removes expired cache entries at configured intervals

mod sweep;

pub use sweep::{spawn_configured_sweep_task, spawn_sweep_task};
