//! Domain and wire types shared across the gateway crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Roster types ─────────────────────────────────────────────────────────

/// A participant in an availability request.
///
/// `sub` is the provider-assigned subject identifier and the only field used
/// for identity throughout the gateway. `uid` is a caller-side identifier that
/// is attached to results during enrichment; it is never part of an outbound
/// provider payload, which is why this type deliberately does not implement
/// `Serialize`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Member {
    pub sub: String,
    #[serde(default)]
    pub calendar_ids: Vec<String>,
    #[serde(default)]
    pub uid: Option<String>,
}

/// A candidate time window to search. Forwarded to the provider verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Meeting length and the padding applied around each candidate slot.
#[derive(Debug, Clone, Deserialize)]
pub struct DurationBuffer {
    pub duration_minutes: u32,
    #[serde(default)]
    pub buffer_before_minutes: u32,
    #[serde(default)]
    pub buffer_after_minutes: u32,
}

/// Coarse time-horizon classifier. Used purely as a cache partition key; the
/// gateway never derives it from the query periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheBucket {
    Hour,
    Day,
    Week,
}

impl CacheBucket {
    /// Stable lowercase label for logs and replies.
    pub fn as_str(self) -> &'static str {
        match self {
            CacheBucket::Hour => "hour",
            CacheBucket::Day => "day",
            CacheBucket::Week => "week",
        }
    }
}

/// A validated aggregation request as received from the HTTP boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityRequest {
    pub members: Vec<Member>,
    pub query_periods: Vec<QueryPeriod>,
    pub duration_buffer: DurationBuffer,
    pub cache_bucket: CacheBucket,
}

// ── Provider wire types (outbound) ───────────────────────────────────────

/// A member as serialized into the provider payload.
///
/// Kept separate from [`Member`] and built field by field so that caller-side
/// identifiers cannot ride along into an outbound request.
#[derive(Debug, Clone, Serialize)]
pub struct QueryMember {
    pub sub: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub calendar_ids: Vec<String>,
    pub managed_availability: bool,
}

/// One participant group in an availability query.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantGroup {
    pub members: Vec<QueryMember>,
    pub required: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequiredDuration {
    pub minutes: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct BufferWindow {
    pub minutes: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryBuffer {
    pub before: BufferWindow,
    pub after: BufferWindow,
}

/// POST body for the provider's availability endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityQuery {
    pub participants: Vec<ParticipantGroup>,
    pub query_periods: Vec<QueryPeriod>,
    pub required_duration: RequiredDuration,
    pub buffer: QueryBuffer,
    pub max_results: u32,
    pub response_format: String,
}

// ── Provider wire types (inbound) ────────────────────────────────────────

/// A participant reference inside a returned slot.
///
/// `uid` is always emitted, null when no mapping exists, so downstream
/// consumers see a uniform shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRef {
    pub sub: String,
    #[serde(default)]
    pub calendar_id: Option<String>,
    #[serde(default)]
    pub uid: Option<String>,
}

/// A candidate meeting time returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub participants: Vec<ParticipantRef>,
}

/// Reply from the provider's availability endpoint.
///
/// A missing `available_slots` field is a provider-level condition (an error
/// envelope or simply no availability), not a parse failure; deserialization
/// succeeds either way and callers decide what absence means.
#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityResponse {
    #[serde(default)]
    pub available_slots: Option<Vec<Slot>>,
}
