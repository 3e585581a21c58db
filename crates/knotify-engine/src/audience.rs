//! Audience resolution — pure evaluation of targeting rules.

use std::collections::HashSet;

use knotify_core::types::{Guest, ScheduledMessage};

/// Resolve the audience for a message against the event's guest list.
///
/// `all_guests` short-circuits to every guest. Otherwise the three
/// criteria (explicit ids, tag overlap, sub-event invitation) are OR'd: a
/// guest qualifies by matching any criterion that is non-empty, and an
/// empty criterion is skipped rather than treated as "matches nothing" or
/// "matches everything". With no criteria specified the result is empty —
/// there is deliberately no implicit "all" fallback.
///
/// `invited` is the pre-fetched set of guest ids invited to any of the
/// message's target sub-events (a collaborator read done by the caller).
/// The guest slice is unique by id, so iterating it once keeps the result
/// deduplicated and stable in input order.
pub fn resolve(msg: &ScheduledMessage, guests: &[Guest], invited: &HashSet<String>) -> Vec<Guest> {
    let target = &msg.target;
    if target.all_guests {
        return guests.to_vec();
    }
    if target.guest_ids.is_empty()
        && target.guest_tags.is_empty()
        && target.sub_event_ids.is_empty()
    {
        return Vec::new();
    }

    let id_set: HashSet<&str> = target.guest_ids.iter().map(String::as_str).collect();
    let tag_set: HashSet<&str> = target.guest_tags.iter().map(String::as_str).collect();

    guests
        .iter()
        .filter(|guest| {
            let by_id = !target.guest_ids.is_empty() && id_set.contains(guest.id.as_str());
            let by_tag = !target.guest_tags.is_empty()
                && guest.tags.iter().any(|t| tag_set.contains(t.as_str()));
            let by_sub_event =
                !target.sub_event_ids.is_empty() && invited.contains(&guest.id);
            by_id || by_tag || by_sub_event
        })
        .cloned()
        .collect()
}
