//! Domain model — scheduled messages, guests, and the delivery ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a scheduled message.
///
/// `Scheduled` is the only state the batch processor will pick up; once a
/// message leaves it, reprocessing is a no-op by selection filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Scheduled,
    Sending,
    Sent,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(Self::Scheduled),
            "sending" => Some(Self::Sending),
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A delivery medium, tracked independently per recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Sms,
    Push,
    Email,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Push => "push",
            Self::Email => "email",
        }
    }
}

/// Per-channel sub-status on a delivery record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    NotApplicable,
    Pending,
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotApplicable => "not_applicable",
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_applicable" => Some(Self::NotApplicable),
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Audience targeting rules attached to a scheduled message.
///
/// `all_guests` short-circuits everything else. Otherwise the three lists
/// are OR'd: a guest qualifies by matching any criterion that is non-empty.
/// With the flag off and all lists empty the audience is empty — there is
/// deliberately no implicit "all" fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageTarget {
    #[serde(default)]
    pub all_guests: bool,
    #[serde(default)]
    pub guest_ids: Vec<String>,
    #[serde(default)]
    pub guest_tags: Vec<String>,
    #[serde(default)]
    pub sub_event_ids: Vec<String>,
}

impl MessageTarget {
    pub fn all() -> Self {
        Self { all_guests: true, ..Default::default() }
    }
}

/// A host-authored broadcast awaiting or having undergone send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledMessage {
    pub id: String,
    pub event_id: String,
    #[serde(default)]
    pub subject: Option<String>,
    /// Raw body; `{name}` and `{first_name}` tokens are substituted per guest.
    pub content: String,
    pub send_at: DateTime<Utc>,
    #[serde(default)]
    pub target: MessageTarget,
    #[serde(default = "default_true")]
    pub sms_enabled: bool,
    #[serde(default)]
    pub push_enabled: bool,
    #[serde(default)]
    pub email_enabled: bool,
    pub status: MessageStatus,
    #[serde(default)]
    pub recipient_count: i64,
    #[serde(default)]
    pub success_count: i64,
    #[serde(default)]
    pub failure_count: i64,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ScheduledMessage {
    /// Create a new message in `scheduled` state with SMS enabled.
    pub fn new(event_id: &str, content: &str, send_at: DateTime<Utc>, target: MessageTarget) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_id: event_id.to_string(),
            subject: None,
            content: content.to_string(),
            send_at,
            target,
            sms_enabled: true,
            push_enabled: false,
            email_enabled: false,
            status: MessageStatus::Scheduled,
            recipient_count: 0,
            success_count: 0,
            failure_count: 0,
            sent_at: None,
            created_at: Utc::now(),
        }
    }

    /// Whether a given channel is enabled on this message.
    pub fn channel_enabled(&self, kind: ChannelKind) -> bool {
        match kind {
            ChannelKind::Sms => self.sms_enabled,
            ChannelKind::Push => self.push_enabled,
            ChannelKind::Email => self.email_enabled,
        }
    }
}

/// Event-scoped recipient identity. Read-only for the delivery pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guest {
    pub id: String,
    pub event_id: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub sms_opt_out: bool,
    #[serde(default)]
    pub push_opt_out: bool,
    #[serde(default)]
    pub email_opt_out: bool,
    /// Authenticated user identity once the guest claims their invite.
    #[serde(default)]
    pub user_id: Option<String>,
}

impl Guest {
    pub fn new(event_id: &str, name: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_id: event_id.to_string(),
            name: name.to_string(),
            phone: None,
            email: None,
            tags: Vec::new(),
            sms_opt_out: false,
            push_opt_out: false,
            email_opt_out: false,
            user_id: None,
        }
    }

    /// Whether this guest has opted out of a channel.
    pub fn opted_out(&self, kind: ChannelKind) -> bool {
        match kind {
            ChannelKind::Sms => self.sms_opt_out,
            ChannelKind::Push => self.push_opt_out,
            ChannelKind::Email => self.email_opt_out,
        }
    }
}

/// Join row linking a guest to a sub-event ("Ceremony", "Reception", ...).
/// Used only as a filter predicate during audience resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubEventAssignment {
    pub guest_id: String,
    pub sub_event_id: String,
    pub is_invited: bool,
}

/// One ledger row per (message, guest). Channel sub-statuses are
/// independent fields on this single row, not separate rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: String,
    pub message_id: String,
    pub guest_id: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub sms_status: DeliveryStatus,
    pub push_status: DeliveryStatus,
    pub email_status: DeliveryStatus,
    #[serde(default)]
    pub sms_provider_id: Option<String>,
    #[serde(default)]
    pub push_provider_id: Option<String>,
    #[serde(default)]
    pub email_provider_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DeliveryRecord {
    pub fn new(message_id: &str, guest_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            message_id: message_id.to_string(),
            guest_id: guest_id.to_string(),
            phone: None,
            email: None,
            sms_status: DeliveryStatus::NotApplicable,
            push_status: DeliveryStatus::NotApplicable,
            email_status: DeliveryStatus::NotApplicable,
            sms_provider_id: None,
            push_provider_id: None,
            email_provider_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn status_for(&self, kind: ChannelKind) -> DeliveryStatus {
        match kind {
            ChannelKind::Sms => self.sms_status,
            ChannelKind::Push => self.push_status,
            ChannelKind::Email => self.email_status,
        }
    }

    pub fn set_status(&mut self, kind: ChannelKind, status: DeliveryStatus) {
        match kind {
            ChannelKind::Sms => self.sms_status = status,
            ChannelKind::Push => self.push_status = status,
            ChannelKind::Email => self.email_status = status,
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in [MessageStatus::Scheduled, MessageStatus::Sending, MessageStatus::Sent, MessageStatus::Failed] {
            assert_eq!(MessageStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(MessageStatus::parse("cancelled"), None);
    }

    #[test]
    fn test_delivery_status_round_trip() {
        for s in [
            DeliveryStatus::NotApplicable,
            DeliveryStatus::Pending,
            DeliveryStatus::Sent,
            DeliveryStatus::Failed,
        ] {
            assert_eq!(DeliveryStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn test_new_message_defaults() {
        let msg = ScheduledMessage::new("ev1", "hi {name}", Utc::now(), MessageTarget::all());
        assert_eq!(msg.status, MessageStatus::Scheduled);
        assert!(msg.sms_enabled);
        assert!(!msg.push_enabled);
        assert_eq!(msg.recipient_count, 0);
    }

    #[test]
    fn test_record_channel_fields_independent() {
        let mut rec = DeliveryRecord::new("m1", "g1");
        rec.set_status(ChannelKind::Sms, DeliveryStatus::Pending);
        assert_eq!(rec.status_for(ChannelKind::Sms), DeliveryStatus::Pending);
        assert_eq!(rec.status_for(ChannelKind::Push), DeliveryStatus::NotApplicable);
        assert_eq!(rec.status_for(ChannelKind::Email), DeliveryStatus::NotApplicable);
    }
}
