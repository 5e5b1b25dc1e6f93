//! Cronofy availability API client.
//!
//! Splits member rosters into provider-sized batches, builds availability
//! queries, and performs the authenticated calls with timeout handling,
//! outbound throttling, and uid enrichment of the results.

pub mod batch;
pub mod client;
pub mod enrich;
pub mod rate_limit;
pub mod request;

pub use batch::batch_members;
pub use client::{AvailabilityProvider, CronofyClient};
pub use enrich::enrich_response;
pub use rate_limit::RateLimiter;
pub use request::build_availability_query;
