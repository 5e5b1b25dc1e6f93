//! Aggregation engine: cache-aware fan-out to the availability provider.

use std::collections::HashSet;
use std::sync::Arc;

use common::types::{AvailabilityRequest, AvailabilityResponse, CacheBucket, Slot};
use common::{Member, Result};
use cronofy_client::{batch_members, build_availability_query, AvailabilityProvider};
use futures_util::future::try_join_all;
use tracing::{debug, warn};

use crate::cache::{AvailabilityCache, CacheEntry};
use crate::reconcile::{covered_subs, entry_is_coherent, missing_members};

/// How a request was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Every requested member was already covered; no provider calls made.
    Hit,
    /// Some members were covered; only the remainder was fetched and merged.
    PartialHit,
    /// Nothing usable was cached; the full roster was fetched.
    Miss,
}

impl CacheOutcome {
    /// Stable lowercase label for logs and replies.
    pub fn as_str(self) -> &'static str {
        match self {
            CacheOutcome::Hit => "hit",
            CacheOutcome::PartialHit => "partial",
            CacheOutcome::Miss => "miss",
        }
    }
}

/// Result of one aggregation request.
#[derive(Debug, Clone)]
pub struct Aggregation {
    /// Slots for the requested bucket, cached and freshly fetched alike.
    pub slots: Vec<Slot>,
    pub outcome: CacheOutcome,
}

/// Orchestrates batching, concurrent provider fetches, and cache merges.
///
/// Generic over the provider so tests can drive it with a stub; production
/// wires in `CronofyClient`.
pub struct Aggregator<P> {
    provider: Arc<P>,
    cache: Arc<AvailabilityCache>,
    batch_size: usize,
}

impl<P: AvailabilityProvider> Aggregator<P> {
    pub fn new(provider: Arc<P>, cache: Arc<AvailabilityCache>, batch_size: usize) -> Self {
        Self {
            provider,
            cache,
            batch_size: batch_size.max(1),
        }
    }

    /// Resolve common availability for `request`.
    ///
    /// The per-bucket lock is held across the whole lookup-fetch-merge
    /// sequence, so two requests for one bucket can never interleave their
    /// reads and writes. The cache is written only after every batch has
    /// succeeded; a failed or abandoned request leaves the entry untouched.
    pub async fn resolve(&self, request: &AvailabilityRequest) -> Result<Aggregation> {
        let bucket = request.cache_bucket;
        let _guard = self.cache.lock_bucket(bucket).await;

        let entry = match self.cache.get_valid(bucket) {
            Some(entry) if !entry_is_coherent(&entry) => {
                warn!(
                    "discarding incoherent cache entry: bucket={}",
                    bucket.as_str()
                );
                None
            }
            other => other,
        };
        let missing = missing_members(entry.as_ref(), &request.members);

        match entry {
            Some(entry) if missing.is_empty() => {
                debug!(
                    "cache hit: bucket={} members={} slots={}",
                    bucket.as_str(),
                    request.members.len(),
                    entry.slots.len()
                );
                Ok(Aggregation {
                    slots: entry.slots,
                    outcome: CacheOutcome::Hit,
                })
            }
            Some(entry) => {
                debug!(
                    "partial cache hit: bucket={} covered={} missing={}",
                    bucket.as_str(),
                    entry.covered_subs.len(),
                    missing.len()
                );
                let responses = self.fetch_members(&missing, request, bucket).await?;

                let mut slots = entry.slots;
                slots.extend(collect_slots(&responses));

                let mut covered = entry.covered_subs;
                covered.extend(asked_subs(&missing));
                covered.extend(covered_subs(&responses));

                self.cache
                    .insert(bucket, CacheEntry::new(slots.clone(), covered, self.cache.ttl()));
                Ok(Aggregation {
                    slots,
                    outcome: CacheOutcome::PartialHit,
                })
            }
            None => {
                debug!(
                    "cache miss: bucket={} members={}",
                    bucket.as_str(),
                    request.members.len()
                );
                let responses = self.fetch_members(&request.members, request, bucket).await?;

                let slots = collect_slots(&responses);
                let mut covered = asked_subs(&request.members);
                covered.extend(covered_subs(&responses));

                self.cache
                    .insert(bucket, CacheEntry::new(slots.clone(), covered, self.cache.ttl()));
                Ok(Aggregation {
                    slots,
                    outcome: CacheOutcome::Miss,
                })
            }
        }
    }

    /// Fetch availability for `members`, one concurrent provider call per
    /// batch. The first failure fails the whole group and the partial
    /// results are discarded.
    async fn fetch_members(
        &self,
        members: &[Member],
        request: &AvailabilityRequest,
        bucket: CacheBucket,
    ) -> Result<Vec<AvailabilityResponse>> {
        let batches = batch_members(members, self.batch_size);
        debug!(
            "dispatching {} provider batch(es): bucket={}",
            batches.len(),
            bucket.as_str()
        );

        let fetches = batches.iter().map(|batch| {
            let query =
                build_availability_query(batch, &request.query_periods, &request.duration_buffer);
            async move { self.provider.fetch_availability(&query, batch).await }
        });

        let responses = try_join_all(fetches).await.map_err(|e| {
            warn!(
                "provider batch failed: bucket={} batch_size={} error={}",
                bucket.as_str(),
                self.batch_size,
                e
            );
            e
        })?;

        for response in &responses {
            if response.available_slots.is_none() {
                warn!(
                    "provider response carried no available_slots: bucket={}",
                    bucket.as_str()
                );
            }
        }
        Ok(responses)
    }
}

fn collect_slots(responses: &[AvailabilityResponse]) -> Vec<Slot> {
    responses
        .iter()
        .flat_map(|response| response.available_slots.iter().flatten())
        .cloned()
        .collect()
}

fn asked_subs(members: &[Member]) -> HashSet<String> {
    members.iter().map(|member| member.sub.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use common::types::{AvailabilityQuery, DurationBuffer, ParticipantRef, QueryPeriod};
    use common::Error;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// Provider stub that fabricates one slot per queried batch and records
    /// every batch it was asked for.
    struct MockProvider {
        calls: AtomicUsize,
        batches_seen: StdMutex<Vec<Vec<String>>>,
        fail: AtomicBool,
        respond_empty: bool,
        delay: Option<Duration>,
    }

    impl MockProvider {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                batches_seen: StdMutex::new(Vec::new()),
                fail: AtomicBool::new(false),
                respond_empty: false,
                delay: None,
            }
        }

        fn empty_handed() -> Self {
            Self {
                respond_empty: true,
                ..Self::new()
            }
        }

        fn with_delay(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::new()
            }
        }

        fn set_fail(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn batches(&self) -> Vec<Vec<String>> {
            self.batches_seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AvailabilityProvider for MockProvider {
        async fn fetch_availability(
            &self,
            _query: &AvailabilityQuery,
            original_members: &[Member],
        ) -> Result<AvailabilityResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.batches_seen
                .lock()
                .unwrap()
                .push(original_members.iter().map(|m| m.sub.clone()).collect());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::CronofyApi {
                    status: 500,
                    body: "upstream exploded".to_string(),
                });
            }
            if self.respond_empty {
                return Ok(AvailabilityResponse {
                    available_slots: Some(vec![]),
                });
            }

            let start = Utc::now();
            Ok(AvailabilityResponse {
                available_slots: Some(vec![Slot {
                    start,
                    end: start + ChronoDuration::minutes(30),
                    participants: original_members
                        .iter()
                        .map(|m| ParticipantRef {
                            sub: m.sub.clone(),
                            calendar_id: m.calendar_ids.first().cloned(),
                            uid: m.uid.clone(),
                        })
                        .collect(),
                }]),
            })
        }
    }

    fn make_member(sub: &str) -> Member {
        Member {
            sub: sub.to_string(),
            calendar_ids: vec![format!("cal_{sub}")],
            uid: None,
        }
    }

    fn make_request(subs: &[&str], bucket: CacheBucket) -> AvailabilityRequest {
        let start = Utc::now();
        AvailabilityRequest {
            members: subs.iter().map(|s| make_member(s)).collect(),
            query_periods: vec![QueryPeriod {
                start,
                end: start + ChronoDuration::hours(8),
            }],
            duration_buffer: DurationBuffer {
                duration_minutes: 30,
                buffer_before_minutes: 0,
                buffer_after_minutes: 0,
            },
            cache_bucket: bucket,
        }
    }

    fn make_aggregator(
        provider: MockProvider,
        ttl: Duration,
    ) -> (Arc<MockProvider>, Arc<AvailabilityCache>, Aggregator<MockProvider>) {
        let provider = Arc::new(provider);
        let cache = Arc::new(AvailabilityCache::new(ttl));
        let engine = Aggregator::new(provider.clone(), cache.clone(), 5);
        (provider, cache, engine)
    }

    fn slot_subs(slot: &Slot) -> Vec<String> {
        slot.participants.iter().map(|p| p.sub.clone()).collect()
    }

    #[tokio::test]
    async fn test_full_miss_then_full_hit() {
        let (provider, cache, engine) =
            make_aggregator(MockProvider::new(), Duration::from_secs(300));
        let request = make_request(&["a", "b"], CacheBucket::Day);

        let first = engine.resolve(&request).await.unwrap();
        assert_eq!(first.outcome, CacheOutcome::Miss);
        assert_eq!(first.slots.len(), 1);
        assert_eq!(provider.calls(), 1);

        let entry = cache.get_valid(CacheBucket::Day).unwrap();
        let expected: HashSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        assert_eq!(entry.covered_subs, expected);

        let second = engine.resolve(&request).await.unwrap();
        assert_eq!(second.outcome, CacheOutcome::Hit);
        assert_eq!(second.slots, first.slots);
        assert_eq!(provider.calls(), 1, "a full hit must not call the provider");
    }

    #[tokio::test]
    async fn test_partial_hit_fetches_only_missing_members() {
        let (provider, cache, engine) =
            make_aggregator(MockProvider::new(), Duration::from_secs(300));

        let seeded = engine
            .resolve(&make_request(&["a", "b"], CacheBucket::Day))
            .await
            .unwrap();

        let result = engine
            .resolve(&make_request(&["a", "b", "c"], CacheBucket::Day))
            .await
            .unwrap();
        assert_eq!(result.outcome, CacheOutcome::PartialHit);
        assert_eq!(provider.calls(), 2);
        assert_eq!(provider.batches()[1], vec!["c".to_string()]);

        // Cached slots stay in front, fresh slots are appended.
        assert_eq!(result.slots.len(), 2);
        assert_eq!(result.slots[0], seeded.slots[0]);
        assert_eq!(slot_subs(&result.slots[1]), vec!["c".to_string()]);

        let entry = cache.get_valid(CacheBucket::Day).unwrap();
        for sub in ["a", "b", "c"] {
            assert!(entry.covered_subs.contains(sub));
        }
    }

    #[tokio::test]
    async fn test_roster_is_split_into_concurrent_batches() {
        let (provider, _cache, engine) =
            make_aggregator(MockProvider::new(), Duration::from_secs(300));
        let subs: Vec<String> = (0..12).map(|i| format!("m{i}")).collect();
        let sub_refs: Vec<&str> = subs.iter().map(|s| s.as_str()).collect();

        let result = engine
            .resolve(&make_request(&sub_refs, CacheBucket::Week))
            .await
            .unwrap();

        assert_eq!(result.outcome, CacheOutcome::Miss);
        assert_eq!(provider.calls(), 3);
        let sizes: Vec<usize> = provider.batches().iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![5, 5, 2]);
        assert_eq!(result.slots.len(), 3, "one fabricated slot per batch");
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_cache_untouched() {
        let (provider, cache, engine) =
            make_aggregator(MockProvider::new(), Duration::from_secs(300));

        // Fresh bucket: a failed fetch must not create an entry.
        provider.set_fail(true);
        let err = engine
            .resolve(&make_request(&["a", "b"], CacheBucket::Hour))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CronofyApi { status: 500, .. }));
        assert!(cache.get_valid(CacheBucket::Hour).is_none());

        // Seeded bucket: a failed top-up must preserve the old entry as is.
        provider.set_fail(false);
        engine
            .resolve(&make_request(&["a", "b"], CacheBucket::Hour))
            .await
            .unwrap();
        provider.set_fail(true);
        engine
            .resolve(&make_request(&["a", "b", "c"], CacheBucket::Hour))
            .await
            .unwrap_err();

        let entry = cache.get_valid(CacheBucket::Hour).unwrap();
        assert_eq!(entry.slots.len(), 1);
        assert!(entry.covered_subs.contains("a"));
        assert!(!entry.covered_subs.contains("c"));
    }

    #[tokio::test]
    async fn test_expired_entry_triggers_a_fresh_fetch() {
        let (provider, _cache, engine) =
            make_aggregator(MockProvider::new(), Duration::from_millis(50));
        let request = make_request(&["a"], CacheBucket::Day);

        engine.resolve(&request).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let result = engine.resolve(&request).await.unwrap();
        assert_eq!(result.outcome, CacheOutcome::Miss);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_full_hit_leaves_the_entry_unchanged() {
        let (_provider, cache, engine) =
            make_aggregator(MockProvider::new(), Duration::from_secs(300));
        let request = make_request(&["a", "b"], CacheBucket::Week);

        engine.resolve(&request).await.unwrap();
        let before = cache.get_valid(CacheBucket::Week).unwrap();

        engine.resolve(&request).await.unwrap();
        let after = cache.get_valid(CacheBucket::Week).unwrap();

        assert_eq!(after.slots, before.slots);
        assert_eq!(after.covered_subs, before.covered_subs);
    }

    #[tokio::test]
    async fn test_concurrent_same_bucket_requests_fetch_once() {
        let (provider, _cache, engine) = make_aggregator(
            MockProvider::with_delay(Duration::from_millis(50)),
            Duration::from_secs(300),
        );
        let request = make_request(&["a", "b"], CacheBucket::Day);

        let (first, second) = tokio::join!(engine.resolve(&request), engine.resolve(&request));
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(provider.calls(), 1, "the second request must ride the first's entry");
        let outcomes = [first.outcome, second.outcome];
        assert!(outcomes.contains(&CacheOutcome::Miss));
        assert!(outcomes.contains(&CacheOutcome::Hit));
        assert_eq!(first.slots, second.slots);
    }

    #[tokio::test]
    async fn test_buckets_are_cached_independently() {
        let (provider, _cache, engine) =
            make_aggregator(MockProvider::new(), Duration::from_secs(300));

        let hour = engine
            .resolve(&make_request(&["a"], CacheBucket::Hour))
            .await
            .unwrap();
        let day = engine
            .resolve(&make_request(&["a"], CacheBucket::Day))
            .await
            .unwrap();

        assert_eq!(hour.outcome, CacheOutcome::Miss);
        assert_eq!(day.outcome, CacheOutcome::Miss);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_incoherent_entry_is_rebuilt() {
        let (provider, cache, engine) =
            make_aggregator(MockProvider::new(), Duration::from_secs(300));

        // Slots with an empty coverage set cannot be reconciled against.
        let start = Utc::now();
        cache.insert(
            CacheBucket::Day,
            CacheEntry::new(
                vec![Slot {
                    start,
                    end: start + ChronoDuration::minutes(30),
                    participants: vec![],
                }],
                HashSet::new(),
                Duration::from_secs(300),
            ),
        );

        let result = engine
            .resolve(&make_request(&["a"], CacheBucket::Day))
            .await
            .unwrap();
        assert_eq!(result.outcome, CacheOutcome::Miss);
        assert_eq!(provider.calls(), 1);

        let entry = cache.get_valid(CacheBucket::Day).unwrap();
        assert!(entry.covered_subs.contains("a"));
    }

    #[tokio::test]
    async fn test_members_with_no_slots_are_still_covered() {
        let (provider, cache, engine) =
            make_aggregator(MockProvider::empty_handed(), Duration::from_secs(300));
        let request = make_request(&["a", "b"], CacheBucket::Day);

        let first = engine.resolve(&request).await.unwrap();
        assert_eq!(first.outcome, CacheOutcome::Miss);
        assert!(first.slots.is_empty());

        let entry = cache.get_valid(CacheBucket::Day).unwrap();
        assert!(entry.covered_subs.contains("a"));
        assert!(entry.covered_subs.contains("b"));

        // A fully busy roster is an answer too; do not ask again.
        let second = engine.resolve(&request).await.unwrap();
        assert_eq!(second.outcome, CacheOutcome::Hit);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_roster_resolves_without_provider_calls() {
        let (provider, _cache, engine) =
            make_aggregator(MockProvider::new(), Duration::from_secs(300));

        let result = engine
            .resolve(&make_request(&[], CacheBucket::Hour))
            .await
            .unwrap();
        assert!(result.slots.is_empty());
        assert_eq!(provider.calls(), 0);
    }
}
