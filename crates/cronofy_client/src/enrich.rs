//! Participant enrichment.

use std::collections::HashMap;

use common::types::{AvailabilityResponse, ParticipantRef, Slot};
use common::Member;

/// Attach caller-side `uid`s to every participant reference in a response.
///
/// The lookup table is built from the members that carry a uid; a participant
/// whose `sub` has no mapping keeps a null uid rather than being dropped.
/// Each reference is rebuilt explicitly so the output carries exactly the
/// fields the gateway owns, whatever else the provider sent along.
pub fn enrich_response(
    response: AvailabilityResponse,
    original_members: &[Member],
) -> AvailabilityResponse {
    let uid_by_sub: HashMap<&str, &str> = original_members
        .iter()
        .filter_map(|m| m.uid.as_deref().map(|uid| (m.sub.as_str(), uid)))
        .collect();

    let available_slots = response.available_slots.map(|slots| {
        slots
            .into_iter()
            .map(|slot| Slot {
                start: slot.start,
                end: slot.end,
                participants: slot
                    .participants
                    .into_iter()
                    .map(|p| ParticipantRef {
                        uid: uid_by_sub.get(p.sub.as_str()).map(|uid| uid.to_string()),
                        sub: p.sub,
                        calendar_id: p.calendar_id,
                    })
                    .collect(),
            })
            .collect()
    });

    AvailabilityResponse { available_slots }
}
