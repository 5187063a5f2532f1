//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, expirations and
//! supplier computations.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time snapshot of cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (not found or expired)
    pub misses: u64,
    /// Number of entries dropped by the expiration sweep
    pub expired: u64,
    /// Number of supplier invocations made by compute-once reads
    pub computations: u64,
    /// Current number of keys holding at least one entry
    pub buckets: usize,
    /// Current number of entries across all buckets
    pub total_entries: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stats Counters ==
/// Lock-free counters updated by concurrent store operations.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    computations: AtomicU64,
}

impl StatsCounters {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self, count: usize) {
        self.expired.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_computation(&self) {
        self.computations.fetch_add(1, Ordering::Relaxed);
    }

    /// Builds a snapshot, filling in the size figures supplied by the store.
    pub fn snapshot(&self, buckets: usize, total_entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
            buckets,
            total_entries,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_starts_at_zero() {
        let stats = StatsCounters::default().snapshot(0, 0);
        assert_eq!(stats, CacheStats::default());
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let counters = StatsCounters::default();
        counters.record_hit();
        counters.record_hit();
        counters.record_hit();
        counters.record_miss();
        assert_eq!(counters.snapshot(0, 0).hit_rate(), 0.75);
    }

    #[test]
    fn test_record_expired_and_computations() {
        let counters = StatsCounters::default();
        counters.record_expired(3);
        counters.record_expired(2);
        counters.record_computation();

        let stats = counters.snapshot(4, 7);
        assert_eq!(stats.expired, 5);
        assert_eq!(stats.computations, 1);
        assert_eq!(stats.buckets, 4);
        assert_eq!(stats.total_entries, 7);
    }
}
