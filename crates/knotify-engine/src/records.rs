//! Delivery record construction — the per-recipient ledger.

use knotify_core::types::{DeliveryRecord, DeliveryStatus, Guest, ScheduledMessage};

/// Build one ledger row per recipient, before any send attempt, so even a
/// total provider outage leaves an accurate record of who was supposed to
/// receive what. A channel field is `pending` only when the message
/// enables that channel, the guest has the needed address, and the guest
/// has not opted out; otherwise `not_applicable`.
///
/// Output order matches the recipient order.
pub fn build_records(msg: &ScheduledMessage, recipients: &[Guest]) -> Vec<DeliveryRecord> {
    recipients
        .iter()
        .map(|guest| {
            let mut rec = DeliveryRecord::new(&msg.id, &guest.id);
            rec.phone = guest.phone.clone();
            rec.email = guest.email.clone();
            rec.sms_status =
                channel_status(msg.sms_enabled, guest.phone.as_deref(), guest.sms_opt_out);
            // Push routes by guest identity, not a stored address.
            rec.push_status = channel_status(msg.push_enabled, Some(&guest.id), guest.push_opt_out);
            rec.email_status =
                channel_status(msg.email_enabled, guest.email.as_deref(), guest.email_opt_out);
            rec
        })
        .collect()
}

fn channel_status(enabled: bool, address: Option<&str>, opted_out: bool) -> DeliveryStatus {
    match address {
        Some(addr) if enabled && !opted_out && !addr.is_empty() => DeliveryStatus::Pending,
        _ => DeliveryStatus::NotApplicable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use knotify_core::types::MessageTarget;

    fn message() -> ScheduledMessage {
        ScheduledMessage::new("ev1", "hi {name}", Utc::now(), MessageTarget::all())
    }

    fn guest_with_phone(phone: Option<&str>) -> Guest {
        let mut g = Guest::new("ev1", "A Guest");
        g.phone = phone.map(String::from);
        g
    }

    #[test]
    fn test_opt_out_and_enabled_channels_are_independent() {
        let mut msg = message();
        msg.push_enabled = true;
        let mut g = guest_with_phone(Some("+15551234567"));
        g.sms_opt_out = true;

        let recs = build_records(&msg, &[g]);
        assert_eq!(recs[0].sms_status, DeliveryStatus::NotApplicable);
        assert_eq!(recs[0].push_status, DeliveryStatus::Pending);
        assert_eq!(recs[0].email_status, DeliveryStatus::NotApplicable);
    }

    #[test]
    fn test_missing_phone_means_not_applicable() {
        let recs = build_records(&message(), &[guest_with_phone(None)]);
        assert_eq!(recs[0].sms_status, DeliveryStatus::NotApplicable);
        let recs = build_records(&message(), &[guest_with_phone(Some(""))]);
        assert_eq!(recs[0].sms_status, DeliveryStatus::NotApplicable);
    }

    #[test]
    fn test_one_record_per_recipient_in_order() {
        let mut a = guest_with_phone(Some("+15550000001"));
        a.id = "a".into();
        let mut b = guest_with_phone(None);
        b.id = "b".into();
        let msg = message();

        let recs = build_records(&msg, &[a, b]);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].guest_id, "a");
        assert_eq!(recs[1].guest_id, "b");
        assert_eq!(recs[0].sms_status, DeliveryStatus::Pending);
        assert_eq!(recs[1].sms_status, DeliveryStatus::NotApplicable);
        assert!(recs.iter().all(|r| r.message_id == msg.id));
    }
}
