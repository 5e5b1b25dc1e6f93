//! Cache reconciliation: deciding who still needs a provider fetch.

use std::collections::HashSet;

use common::types::AvailabilityResponse;
use common::Member;

use crate::cache::CacheEntry;

/// Requested members whose `sub` is not covered by `entry`, in request order.
///
/// An absent entry leaves every requested member missing, which is exactly
/// the full-miss case.
pub fn missing_members(entry: Option<&CacheEntry>, requested: &[Member]) -> Vec<Member> {
    match entry {
        None => requested.to_vec(),
        Some(entry) => requested
            .iter()
            .filter(|member| !entry.covered_subs.contains(&member.sub))
            .cloned()
            .collect(),
    }
}

/// Subjects appearing in at least one returned slot across `responses`.
///
/// This reflects who the provider mentioned, not who was asked: a member who
/// is busy for the whole window never shows up in any slot. The engine
/// therefore unions this set with the members it actually queried.
pub fn covered_subs(responses: &[AvailabilityResponse]) -> HashSet<String> {
    responses
        .iter()
        .flat_map(|response| response.available_slots.iter().flatten())
        .flat_map(|slot| slot.participants.iter())
        .map(|participant| participant.sub.clone())
        .collect()
}

/// Whether an entry's coverage index can be trusted.
///
/// A well-formed merge always records the queried subs alongside the slots,
/// so a non-empty slot list with an empty coverage set means the entry is
/// damaged. Treating it as absent lets the next request rebuild it.
pub fn entry_is_coherent(entry: &CacheEntry) -> bool {
    entry.slots.is_empty() || !entry.covered_subs.is_empty()
}
