//! Availability query construction.

use common::types::{
    AvailabilityQuery, BufferWindow, DurationBuffer, ParticipantGroup, QueryBuffer, QueryMember,
    QueryPeriod, RequiredDuration,
};
use common::Member;

/// Provider cap on returned slots per query.
pub const MAX_RESULTS: u32 = 512;

/// Response format requested from the provider.
pub const RESPONSE_FORMAT: &str = "slots";

/// Build the provider payload for one member batch.
///
/// The whole batch forms a single participant group with `required: "all"`,
/// so only times every member can attend come back. Members are rebuilt
/// field by field into [`QueryMember`]; caller-side `uid`s never reach the
/// outbound request.
pub fn build_availability_query(
    batch: &[Member],
    periods: &[QueryPeriod],
    duration_buffer: &DurationBuffer,
) -> AvailabilityQuery {
    let members = batch
        .iter()
        .map(|member| QueryMember {
            sub: member.sub.clone(),
            calendar_ids: member.calendar_ids.clone(),
            managed_availability: true,
        })
        .collect();

    AvailabilityQuery {
        participants: vec![ParticipantGroup {
            members,
            required: "all".to_string(),
        }],
        query_periods: periods.to_vec(),
        required_duration: RequiredDuration {
            minutes: duration_buffer.duration_minutes,
        },
        buffer: QueryBuffer {
            before: BufferWindow {
                minutes: duration_buffer.buffer_before_minutes,
            },
            after: BufferWindow {
                minutes: duration_buffer.buffer_after_minutes,
            },
        },
        max_results: MAX_RESULTS,
        response_format: RESPONSE_FORMAT.to_string(),
    }
}
