//! Cache Store Module
//!
//! Main cache engine: per-key buckets of parameterised entries, lazy TTL
//! expiration and single-flight compute-once reads.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::cache::flight::{FlightTable, Join};
use crate::cache::stats::StatsCounters;
use crate::cache::{Bucket, CacheStats, Params, StoredValue};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Cache Store ==
/// Thread-safe cache keyed by (key, parameter signature).
///
/// Every mutating or reading operation first sweeps expired entries out of
/// the whole store. Buckets live in a sharded map, so operations on unrelated
/// keys only contend when they hash to the same shard, and the sweep takes
/// each shard's write lock in turn.
///
/// Share a store between threads or tasks by wrapping it in an `Arc`.
#[derive(Debug, Default)]
pub struct CacheStore {
    /// Buckets by key; a bucket is never left empty
    buckets: DashMap<String, Bucket>,
    /// In-progress supplier computations
    flights: FlightTable,
    /// Performance counters
    stats: StatsCounters,
    config: CacheConfig,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with the given configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Set ==
    /// Stores a value that never expires.
    ///
    /// If an entry with the same key and parameter signature exists, its value
    /// is replaced and its expiry cleared.
    pub fn set<V>(&self, key: impl Into<String>, value: V, params: impl Into<Params>)
    where
        V: Any + Send + Sync,
    {
        self.insert(key.into(), params.into(), Arc::new(value), None);
    }

    /// Stores a value that expires once `ttl` has elapsed.
    ///
    /// Updating an existing entry recomputes its expiry from the new `ttl`.
    /// A zero `ttl` stores an entry that is already expired; use
    /// [`CacheStore::set`] for an entry that never expires.
    pub fn set_with_ttl<V>(
        &self,
        key: impl Into<String>,
        value: V,
        ttl: Duration,
        params: impl Into<Params>,
    ) where
        V: Any + Send + Sync,
    {
        self.insert(key.into(), params.into(), Arc::new(value), Some(ttl));
    }

    fn insert(&self, key: String, params: Params, value: StoredValue, ttl: Option<Duration>) {
        self.sweep_expired();

        let mut bucket = self.buckets.entry(key).or_default();
        let created = bucket.upsert(params, value, ttl);
        trace!(key = %bucket.key(), created, ?ttl, "cache set");
    }

    // == Try Get ==
    /// Returns the live value stored under (key, params), if any.
    ///
    /// A miss never creates anything in the store. Fails with
    /// [`CacheError::TypeMismatch`] if the entry holds a value of another type.
    pub fn try_get<T>(&self, key: &str, params: impl Into<Params>) -> Result<Option<Arc<T>>>
    where
        T: Any + Send + Sync,
    {
        self.sweep_expired();

        let params = params.into();
        let found = self.find_value::<T>(key, &params)?;
        match found {
            Some(_) => {
                self.stats.record_hit();
                trace!(key, %params, "cache hit");
            }
            None => {
                self.stats.record_miss();
                trace!(key, %params, "cache miss");
            }
        }
        Ok(found)
    }

    /// Looks up a live value without sweeping or touching statistics.
    fn find_value<T>(&self, key: &str, params: &Params) -> Result<Option<Arc<T>>>
    where
        T: Any + Send + Sync,
    {
        let now = Instant::now();
        match self.buckets.get(key) {
            Some(bucket) => bucket
                .find_live(params, now)
                .map(|entry| entry.downcast::<T>(key))
                .transpose(),
            None => Ok(None),
        }
    }

    // == Get Or Compute ==
    /// Returns the cached value, or runs `supplier` once and caches its result
    /// without expiry.
    ///
    /// Concurrent callers missing on the same (key, params) share a single
    /// supplier run; see [`CacheStore::try_get_or_compute_with_ttl`].
    pub fn get_or_compute<T, F>(
        &self,
        key: impl Into<String>,
        params: impl Into<Params>,
        supplier: F,
    ) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        self.compute_blocking(key.into(), params.into(), None, || Ok(supplier()))
    }

    /// Like [`CacheStore::get_or_compute`], caching the result for `ttl`.
    ///
    /// A zero `ttl` caches nothing usable, so every call runs the supplier.
    pub fn get_or_compute_with_ttl<T, F>(
        &self,
        key: impl Into<String>,
        ttl: Duration,
        params: impl Into<Params>,
        supplier: F,
    ) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        self.compute_blocking(key.into(), params.into(), Some(ttl), || Ok(supplier()))
    }

    /// Returns the cached value, or runs the fallible `supplier` once and
    /// caches a successful result without expiry.
    ///
    /// A supplier error is returned unchanged and nothing is cached.
    pub fn try_get_or_compute<T, E, F>(
        &self,
        key: impl Into<String>,
        params: impl Into<Params>,
        supplier: F,
    ) -> std::result::Result<Arc<T>, E>
    where
        T: Any + Send + Sync,
        E: From<CacheError>,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        self.compute_blocking(key.into(), params.into(), None, supplier)
    }

    /// Returns the cached value, or runs the fallible `supplier` once and
    /// caches a successful result for `ttl`.
    ///
    /// The first caller to miss runs the supplier. Callers that miss on the
    /// same (key, params) while it runs block until it finishes and then read
    /// its result. If the supplier fails or panics, one of them runs the
    /// supplier again. A supplier must not read the same (key, params) from
    /// this store, which would wait on itself.
    ///
    /// Called from a task on a multi-thread tokio runtime, the wait runs in
    /// `block_in_place`. On a current-thread runtime a waiting caller cannot
    /// block without stalling a possibly async leader, so it runs its own
    /// supplier instead and stores the result.
    pub fn try_get_or_compute_with_ttl<T, E, F>(
        &self,
        key: impl Into<String>,
        ttl: Duration,
        params: impl Into<Params>,
        supplier: F,
    ) -> std::result::Result<Arc<T>, E>
    where
        T: Any + Send + Sync,
        E: From<CacheError>,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        self.compute_blocking(key.into(), params.into(), Some(ttl), supplier)
    }

    fn compute_blocking<T, E, F>(
        &self,
        key: String,
        params: Params,
        ttl: Option<Duration>,
        supplier: F,
    ) -> std::result::Result<Arc<T>, E>
    where
        T: Any + Send + Sync,
        E: From<CacheError>,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        self.sweep_expired();

        loop {
            if let Some(value) = self.cached_hit::<T>(&key, &params)? {
                return Ok(value);
            }

            match self.flights.join(&key, &params) {
                Join::Leader(_guard) => {
                    // Another leader may have finished between the lookup and the join
                    if let Some(value) = self.cached_hit::<T>(&key, &params)? {
                        return Ok(value);
                    }
                    self.begin_computation(&key, &params);
                    let outcome = supplier();
                    return self.finish_computation(key, params, ttl, outcome);
                }
                Join::Follower(flight) => {
                    trace!(key = %key, %params, "waiting for in-flight computation");
                    if !flight.wait_blocking_in_context() {
                        // The leader may be a task queued behind this thread
                        debug!(
                            key = %key,
                            %params,
                            "cannot block on a current-thread runtime, computing outside the flight"
                        );
                        self.begin_computation(&key, &params);
                        let outcome = supplier();
                        return self.finish_computation(key, params, ttl, outcome);
                    }
                }
            }
        }
    }

    // == Get Or Compute Async ==
    /// Async counterpart of [`CacheStore::get_or_compute`].
    pub async fn get_or_compute_async<T, F, Fut>(
        &self,
        key: impl Into<String>,
        params: impl Into<Params>,
        supplier: F,
    ) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.compute_async(key.into(), params.into(), None, || async move {
            Ok(supplier().await)
        })
        .await
    }

    /// Async counterpart of [`CacheStore::get_or_compute_with_ttl`].
    pub async fn get_or_compute_async_with_ttl<T, F, Fut>(
        &self,
        key: impl Into<String>,
        ttl: Duration,
        params: impl Into<Params>,
        supplier: F,
    ) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.compute_async(key.into(), params.into(), Some(ttl), || async move {
            Ok(supplier().await)
        })
        .await
    }

    /// Async counterpart of [`CacheStore::try_get_or_compute`].
    pub async fn try_get_or_compute_async<T, E, F, Fut>(
        &self,
        key: impl Into<String>,
        params: impl Into<Params>,
        supplier: F,
    ) -> std::result::Result<Arc<T>, E>
    where
        T: Any + Send + Sync,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.compute_async(key.into(), params.into(), None, supplier)
            .await
    }

    /// Async counterpart of [`CacheStore::try_get_or_compute_with_ttl`].
    ///
    /// Waiting callers suspend instead of blocking. Dropping the leader's
    /// future before the supplier resolves caches nothing and lets a waiting
    /// caller take over.
    pub async fn try_get_or_compute_async_with_ttl<T, E, F, Fut>(
        &self,
        key: impl Into<String>,
        ttl: Duration,
        params: impl Into<Params>,
        supplier: F,
    ) -> std::result::Result<Arc<T>, E>
    where
        T: Any + Send + Sync,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.compute_async(key.into(), params.into(), Some(ttl), supplier)
            .await
    }

    async fn compute_async<T, E, F, Fut>(
        &self,
        key: String,
        params: Params,
        ttl: Option<Duration>,
        supplier: F,
    ) -> std::result::Result<Arc<T>, E>
    where
        T: Any + Send + Sync,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.sweep_expired();

        loop {
            if let Some(value) = self.cached_hit::<T>(&key, &params)? {
                return Ok(value);
            }

            match self.flights.join(&key, &params) {
                Join::Leader(_guard) => {
                    if let Some(value) = self.cached_hit::<T>(&key, &params)? {
                        return Ok(value);
                    }
                    self.begin_computation(&key, &params);
                    let outcome = supplier().await;
                    return self.finish_computation(key, params, ttl, outcome);
                }
                Join::Follower(flight) => {
                    trace!(key = %key, %params, "waiting for in-flight computation");
                    flight.wait().await;
                }
            }
        }
    }

    fn cached_hit<T>(&self, key: &str, params: &Params) -> Result<Option<Arc<T>>>
    where
        T: Any + Send + Sync,
    {
        let found = self.find_value::<T>(key, params)?;
        if found.is_some() {
            self.stats.record_hit();
        }
        Ok(found)
    }

    fn begin_computation(&self, key: &str, params: &Params) {
        self.stats.record_miss();
        self.stats.record_computation();
        debug!(key, %params, "cache miss, running supplier");
    }

    /// Caches a successful supplier result. Must run while the flight guard
    /// is still held so waiters observe the stored value.
    fn finish_computation<T, E>(
        &self,
        key: String,
        params: Params,
        ttl: Option<Duration>,
        outcome: std::result::Result<T, E>,
    ) -> std::result::Result<Arc<T>, E>
    where
        T: Any + Send + Sync,
    {
        match outcome {
            Ok(value) => {
                let value = Arc::new(value);
                self.insert(key, params, Arc::clone(&value) as StoredValue, ttl);
                Ok(value)
            }
            Err(err) => {
                debug!(key = %key, %params, "supplier failed, nothing cached");
                Err(err)
            }
        }
    }

    // == Remove ==
    /// Removes the live entry stored under (key, params).
    ///
    /// Returns true if an entry was removed. A bucket left empty is dropped.
    pub fn remove(&self, key: &str, params: impl Into<Params>) -> bool {
        self.sweep_expired();

        let params = params.into();
        let now = Instant::now();
        let mut removed = false;
        self.buckets.remove_if_mut(key, |_, bucket| {
            removed = bucket.remove_live(&params, now);
            bucket.is_empty()
        });

        trace!(key, %params, removed, "cache remove");
        removed
    }

    // == Contains ==
    /// Returns whether a live entry exists under (key, params).
    ///
    /// Expired entries are never reported. The store-wide sweep only runs
    /// here when [`CacheConfig::sweep_on_contains`] is set.
    pub fn contains(&self, key: &str, params: impl Into<Params>) -> bool {
        if self.config.sweep_on_contains {
            self.sweep_expired();
        }

        let params = params.into();
        let now = Instant::now();
        self.buckets
            .get(key)
            .map_or(false, |bucket| bucket.find_live(&params, now).is_some())
    }

    // == TTL Remaining ==
    /// Returns the remaining time to live of the live entry under (key, params).
    ///
    /// Returns None when no live entry exists, and `Some(None)` for an entry
    /// that never expires. Does not sweep.
    pub fn ttl_remaining(
        &self,
        key: &str,
        params: impl Into<Params>,
    ) -> Option<Option<Duration>> {
        let params = params.into();
        let now = Instant::now();
        self.buckets.get(key).and_then(|bucket| {
            bucket
                .find_live(&params, now)
                .map(|entry| entry.ttl_remaining())
        })
    }

    // == Sweep Expired ==
    /// Removes all expired entries, dropping buckets left empty.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.buckets.retain(|_, bucket| {
            removed += bucket.sweep(now);
            !bucket.is_empty()
        });

        if removed > 0 {
            self.stats.record_expired(removed);
            debug!(removed, "swept expired cache entries");
        }
        removed
    }

    // == Clear ==
    /// Removes every entry. In-flight computations are unaffected and will
    /// store their results when they finish.
    pub fn clear(&self) {
        self.buckets.clear();
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.bucket_count(), self.len())
    }

    // == Length ==
    /// Returns the number of stored entries, including expired entries the
    /// sweep has not yet reached.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.len()).sum()
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Returns the number of keys holding at least one entry.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Returns the number of supplier computations currently running.
    pub fn in_flight(&self) -> usize {
        self.flights.in_flight()
    }
}
