//! Per-bucket availability cache with TTL expiry.
//!
//! Entries live in a `DashMap`, so lookups across different buckets never
//! contend. The lookup-fetch-merge sequence for a single bucket is serialized
//! through [`AvailabilityCache::lock_bucket`]; everything else is lock-free.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::types::{CacheBucket, Slot};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Aggregated availability for one time-horizon bucket.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Slots accumulated from every fetch that fed this bucket.
    pub slots: Vec<Slot>,
    /// Subjects whose availability is reflected in `slots`. Updated in
    /// lockstep with `slots`: a merge writes both or neither.
    pub covered_subs: HashSet<String>,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    pub fn new(slots: Vec<Slot>, covered_subs: HashSet<String>, ttl: Duration) -> Self {
        Self {
            slots,
            covered_subs,
            created_at: Instant::now(),
            ttl,
        }
    }

    /// True once the entry has outlived its ttl.
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.ttl
    }
}

/// Process-wide slot cache keyed by [`CacheBucket`].
///
/// The cache owns its entries and hands out clones, so a reader can never
/// mutate cached state behind the engine's back. Expiry is lazy on read, with
/// [`AvailabilityCache::evict_expired`] available for a periodic sweep.
#[derive(Debug)]
pub struct AvailabilityCache {
    entries: DashMap<CacheBucket, CacheEntry>,
    locks: DashMap<CacheBucket, Arc<Mutex<()>>>,
    ttl: Duration,
}

impl AvailabilityCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            locks: DashMap::new(),
            ttl,
        }
    }

    /// Time-to-live applied to newly created entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Clone of the entry for `bucket`, provided it has not expired.
    pub fn get_valid(&self, bucket: CacheBucket) -> Option<CacheEntry> {
        self.entries
            .get(&bucket)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.clone())
    }

    /// Replace the entry for `bucket`.
    pub fn insert(&self, bucket: CacheBucket, entry: CacheEntry) {
        debug!(
            "cache update: bucket={} slots={} covered={}",
            bucket.as_str(),
            entry.slots.len(),
            entry.covered_subs.len()
        );
        self.entries.insert(bucket, entry);
    }

    /// Drop the entry for `bucket`, if any.
    pub fn remove(&self, bucket: CacheBucket) {
        self.entries.remove(&bucket);
    }

    /// Remove every expired entry, returning how many were dropped.
    ///
    /// The count is taken inside the `retain` closure; the map length is not a
    /// stable reference point while request handlers insert concurrently.
    pub fn evict_expired(&self) -> usize {
        let mut evicted = 0;
        self.entries.retain(|_, entry| {
            if entry.is_expired() {
                evicted += 1;
                false
            } else {
                true
            }
        });
        if evicted > 0 {
            debug!("evicted {} expired cache entries", evicted);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Acquire the serialization lock for `bucket`.
    ///
    /// Holding the returned guard is what makes a lookup-fetch-merge sequence
    /// atomic with respect to other requests for the same bucket. Entries are
    /// only ever touched while the owning request holds this guard.
    pub async fn lock_bucket(&self, bucket: CacheBucket) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(bucket)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}
