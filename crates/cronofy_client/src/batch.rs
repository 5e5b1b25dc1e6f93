//! Member batching.

use common::Member;

/// Split `members` into consecutive groups of at most `size`, preserving the
/// original order. The final group holds whatever remains; an empty roster
/// yields no groups. A `size` of zero is clamped to one.
pub fn batch_members(members: &[Member], size: usize) -> Vec<Vec<Member>> {
    members
        .chunks(size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}
