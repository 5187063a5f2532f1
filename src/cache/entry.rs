//! Cache Entry Module
//!
//! Defines the structure for individual cache entries and the bucket that
//! groups entries sharing one key.

use std::any::{self, Any};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::Params;
use crate::error::{CacheError, Result};

/// Type-erased, shared cache payload.
pub type StoredValue = Arc<dyn Any + Send + Sync>;

// == Cache Entry ==
/// Represents a single cache entry with its parameter signature and metadata.
#[derive(Clone)]
pub struct CacheEntry {
    /// Parameter signature distinguishing this entry within its bucket
    pub params: Params,
    /// The stored value
    pub value: StoredValue,
    /// Creation time of the entry
    pub created_at: Instant,
    /// Expiration time, None = no expiration
    pub expires_at: Option<Instant>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry with optional TTL.
    ///
    /// # Arguments
    /// * `params` - The parameter signature
    /// * `value` - The value to store
    /// * `ttl` - Optional time to live
    pub fn new(params: Params, value: StoredValue, ttl: Option<Duration>) -> Self {
        let now = Instant::now();
        Self {
            params,
            value,
            created_at: now,
            expires_at: expiry_from(now, ttl),
        }
    }

    // == Refresh ==
    /// Replaces the value and recomputes the expiry from `ttl`.
    pub fn refresh(&mut self, value: StoredValue, ttl: Option<Duration>) {
        self.value = value;
        self.expires_at = expiry_from(Instant::now(), ttl);
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// An entry is expired once `now` reaches its expiration time, so a zero
    /// TTL produces an entry that is never served.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    #[allow(dead_code)]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    // == Time To Live ==
    /// Returns the remaining TTL, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the entry has expired
    /// - `Some(remaining)` if the entry has a TTL and hasn't expired
    /// - `None` if the entry never expires
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires| expires.saturating_duration_since(Instant::now()))
    }

    // == Downcast ==
    /// Returns the stored value as `Arc<T>` without copying it.
    ///
    /// Fails with [`CacheError::TypeMismatch`] when the value was stored as a
    /// different type.
    pub fn downcast<T>(&self, key: &str) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        Arc::clone(&self.value)
            .downcast::<T>()
            .map_err(|_| CacheError::TypeMismatch {
                key: key.to_string(),
                expected: any::type_name::<T>(),
            })
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("params", &self.params)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

fn expiry_from(now: Instant, ttl: Option<Duration>) -> Option<Instant> {
    // A TTL too large to represent is treated as never expiring
    ttl.and_then(|ttl| now.checked_add(ttl))
}

// == Bucket ==
/// All entries sharing one key, at most one per parameter signature.
#[derive(Debug, Default)]
pub struct Bucket {
    entries: Vec<CacheEntry>,
}

impl Bucket {
    /// Finds the entry whose signature matches `params`, expired or not.
    pub fn find(&self, params: &Params) -> Option<&CacheEntry> {
        self.entries.iter().find(|e| e.params.signature_eq(params))
    }

    /// Finds the matching entry only if it is still live at `now`.
    pub fn find_live(&self, params: &Params, now: Instant) -> Option<&CacheEntry> {
        self.find(params).filter(|e| !e.is_expired_at(now))
    }

    // == Upsert ==
    /// Overwrites the matching entry in place or appends a new one.
    ///
    /// Returns true when a new entry was appended.
    pub fn upsert(&mut self, params: Params, value: StoredValue, ttl: Option<Duration>) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|e| e.params.signature_eq(&params))
        {
            Some(entry) => {
                entry.refresh(value, ttl);
                false
            }
            None => {
                self.entries.push(CacheEntry::new(params, value, ttl));
                true
            }
        }
    }

    /// Removes the matching live entry. Returns true if one was removed.
    pub fn remove_live(&mut self, params: &Params, now: Instant) -> bool {
        match self
            .entries
            .iter()
            .position(|e| e.params.signature_eq(params) && !e.is_expired_at(now))
        {
            Some(index) => {
                self.entries.swap_remove(index);
                true
            }
            None => false,
        }
    }

    // == Sweep ==
    /// Drops every entry expired at `now`, returning how many were dropped.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !e.is_expired_at(now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;
    use std::thread::sleep;

    fn stored<T: Any + Send + Sync>(value: T) -> StoredValue {
        Arc::new(value)
    }

    #[test]
    fn test_entry_creation_no_ttl() {
        let entry = CacheEntry::new(Params::none(), stored("test_value"), None);

        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired());
        assert!(entry.ttl_remaining().is_none());
    }

    #[test]
    fn test_entry_creation_with_ttl() {
        let entry = CacheEntry::new(Params::none(), stored(1u8), Some(Duration::from_secs(60)));

        assert!(entry.expires_at.is_some());
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new(Params::none(), stored(1u8), Some(Duration::from_millis(50)));

        assert!(!entry.is_expired());

        sleep(Duration::from_millis(80));

        assert!(entry.is_expired());
        assert_eq!(entry.ttl_remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_ttl_remaining() {
        let entry = CacheEntry::new(Params::none(), stored(1u8), Some(Duration::from_secs(10)));

        let remaining = entry.ttl_remaining().unwrap();
        assert!(remaining <= Duration::from_secs(10));
        assert!(remaining >= Duration::from_secs(9));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = Instant::now();
        let entry = CacheEntry {
            params: Params::none(),
            value: stored(1u8),
            created_at: now,
            expires_at: Some(now),
        };

        assert!(entry.is_expired_at(now), "Entry should be expired at boundary");
    }

    #[test]
    fn test_zero_ttl_is_never_live() {
        let entry = CacheEntry::new(Params::none(), stored(1u8), Some(Duration::ZERO));
        assert!(entry.is_expired());
    }

    #[test]
    fn test_downcast() {
        let entry = CacheEntry::new(Params::none(), stored(123i32), None);

        assert_eq!(*entry.downcast::<i32>("k").unwrap(), 123);
        assert_eq!(
            entry.downcast::<u32>("k").unwrap_err(),
            CacheError::TypeMismatch {
                key: "k".to_string(),
                expected: "u32",
            }
        );
    }

    #[test]
    fn test_downcast_shares_value() {
        let value: StoredValue = Arc::new(String::from("shared"));
        let entry = CacheEntry::new(Params::none(), Arc::clone(&value), None);

        let first = entry.downcast::<String>("k").unwrap();
        let second = entry.downcast::<String>("k").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_bucket_upsert_replaces() {
        let mut bucket = Bucket::default();

        assert!(bucket.upsert(params!["a", 1], stored(1), None));
        assert!(!bucket.upsert(params!["a", 1], stored(2), None));
        assert!(bucket.upsert(params!["b", 1], stored(3), None));

        assert_eq!(bucket.len(), 2);
        let entry = bucket.find(&params!["a", 1]).unwrap();
        assert_eq!(*entry.downcast::<i32>("k").unwrap(), 2);
    }

    #[test]
    fn test_bucket_refresh_replaces_expiry() {
        let mut bucket = Bucket::default();
        bucket.upsert(Params::none(), stored(1), Some(Duration::ZERO));
        assert!(bucket.find_live(&Params::none(), Instant::now()).is_none());

        bucket.upsert(Params::none(), stored(2), None);
        assert!(bucket.find_live(&Params::none(), Instant::now()).is_some());
        assert_eq!(bucket.len(), 1);
    }

    #[test]
    fn test_bucket_sweep() {
        let mut bucket = Bucket::default();
        bucket.upsert(params![1], stored(1), Some(Duration::ZERO));
        bucket.upsert(params![2], stored(2), None);

        assert_eq!(bucket.sweep(Instant::now()), 1);
        assert_eq!(bucket.len(), 1);
        assert!(bucket.find(&params![2]).is_some());
    }

    #[test]
    fn test_bucket_remove_live() {
        let mut bucket = Bucket::default();
        bucket.upsert(params![1], stored(1), None);

        assert!(!bucket.remove_live(&params![2], Instant::now()));
        assert!(bucket.remove_live(&params![1], Instant::now()));
        assert!(bucket.is_empty());
    }
}
