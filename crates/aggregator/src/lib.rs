//! Cache-aware availability aggregation.
//!
//! Holds the per-bucket slot cache, decides which members still need a
//! provider fetch, and fans the remainder out in concurrent batches before
//! merging everything back into the cache.

pub mod cache;
pub mod engine;
pub mod reconcile;

pub use cache::{AvailabilityCache, CacheEntry};
pub use engine::{Aggregation, Aggregator, CacheOutcome};
pub use reconcile::{covered_subs, missing_members};
