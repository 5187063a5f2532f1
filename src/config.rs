//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Whether `contains` runs the expiration sweep before looking up
    pub sweep_on_contains: bool,
    /// Background sweep interval in seconds, 0 disables the sweeper
    pub sweep_interval: u64,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `PARAM_CACHE_SWEEP_ON_CONTAINS` - Sweep before `contains` (default: false)
    /// - `PARAM_CACHE_SWEEP_INTERVAL` - Background sweep frequency in seconds (default: 0)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sweep_on_contains: env::var("PARAM_CACHE_SWEEP_ON_CONTAINS")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.sweep_on_contains),
            sweep_interval: env::var("PARAM_CACHE_SWEEP_INTERVAL")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.sweep_interval),
        }
    }

    /// Returns true if a background sweeper should be started.
    pub fn background_sweep_enabled(&self) -> bool {
        self.sweep_interval > 0
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_on_contains: false,
            sweep_interval: 0,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
