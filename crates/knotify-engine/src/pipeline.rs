//! Per-message pipeline: resolve → ledger → dispatch → finalize.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;

use knotify_channels::{ChannelSender, EmailSender, PushSender, SmsSender};
use knotify_core::config::ChannelConfig;
use knotify_core::error::Result;
use knotify_core::types::{ChannelKind, DeliveryStatus, MessageStatus, ScheduledMessage};
use knotify_store::Store;

use crate::dispatch::DispatchItem;
use crate::{audience, dispatch, personalize, records};

/// One sender per channel. Channels without a configured provider get an
/// interface-complete stub so dispatch stays uniform.
pub struct SenderSet {
    sms: Box<dyn ChannelSender>,
    push: Box<dyn ChannelSender>,
    email: Box<dyn ChannelSender>,
}

impl SenderSet {
    pub fn from_config(channel: &ChannelConfig) -> Self {
        let sms: Box<dyn ChannelSender> = match &channel.sms {
            Some(cfg) if cfg.enabled => Box::new(SmsSender::new(cfg.clone())),
            _ => {
                tracing::warn!("SMS provider not configured; SMS sends will be skipped");
                Box::new(knotify_channels::stub::DisabledSender::new(ChannelKind::Sms))
            }
        };
        Self { sms, push: Box::new(PushSender), email: Box::new(EmailSender) }
    }

    /// Custom senders, used by tests and embedders.
    pub fn new(
        sms: Box<dyn ChannelSender>,
        push: Box<dyn ChannelSender>,
        email: Box<dyn ChannelSender>,
    ) -> Self {
        Self { sms, push, email }
    }

    fn for_kind(&self, kind: ChannelKind) -> &dyn ChannelSender {
        match kind {
            ChannelKind::Sms => self.sms.as_ref(),
            ChannelKind::Push => self.push.as_ref(),
            ChannelKind::Email => self.email.as_ref(),
        }
    }
}

/// Drives one already-claimed message to a terminal state.
pub struct Pipeline<'a> {
    pub store: &'a Store,
    pub senders: &'a SenderSet,
    pub send_delay: Duration,
}

impl Pipeline<'_> {
    /// Process a claimed message. Returns the terminal status it reached.
    /// Store read errors propagate; the batch loop converts them into a
    /// failed transition for this message only.
    pub async fn process(&self, msg: &ScheduledMessage) -> Result<MessageStatus> {
        let guests = self.store.guests_for_event(&msg.event_id)?;
        let invited = if !msg.target.all_guests && !msg.target.sub_event_ids.is_empty() {
            self.store.invited_guest_ids(&msg.target.sub_event_ids)?
        } else {
            HashSet::new()
        };

        let recipients = audience::resolve(msg, &guests, &invited);
        if recipients.is_empty() {
            // Explicit failure so hosts see "nobody was eligible" rather
            // than a false "sent".
            tracing::warn!("Message {} resolved to an empty audience", msg.id);
            self.store
                .finalize_message(&msg.id, MessageStatus::Failed, 0, 0, 0, None)?;
            return Ok(MessageStatus::Failed);
        }

        let ledger = records::build_records(msg, &recipients);
        match self.store.insert_delivery_records(&ledger) {
            Ok(n) if n < ledger.len() => tracing::warn!(
                "Ledger incomplete for message {}: {n}/{} rows written",
                msg.id,
                ledger.len()
            ),
            Ok(_) => {}
            // Bookkeeping is not blocking; dispatch proceeds from the
            // in-memory recipient list.
            Err(e) => tracing::warn!("Ledger write failed for message {}: {e}", msg.id),
        }

        let mut success = 0i64;
        let mut failure = 0i64;
        for kind in [ChannelKind::Sms, ChannelKind::Push, ChannelKind::Email] {
            if !msg.channel_enabled(kind) {
                continue;
            }
            let items: Vec<DispatchItem> = recipients
                .iter()
                .zip(&ledger)
                .filter(|(_, rec)| rec.status_for(kind) == DeliveryStatus::Pending)
                .map(|(guest, rec)| DispatchItem {
                    guest_id: guest.id.clone(),
                    destination: destination_for(kind, rec, guest),
                    body: personalize::render(&msg.content, &guest.name),
                })
                .collect();

            let report = dispatch::dispatch_channel(
                self.store,
                &msg.id,
                self.senders.for_kind(kind),
                &items,
                self.send_delay,
            )
            .await;
            success += report.sent;
            failure += report.failed;
        }

        // Partial per-item failure still finalizes as sent: "sent" means
        // the batch was processed, not that every recipient succeeded.
        self.store.finalize_message(
            &msg.id,
            MessageStatus::Sent,
            recipients.len() as i64,
            success,
            failure,
            Some(Utc::now()),
        )?;
        tracing::info!(
            "Message {} sent: {} recipients, {} delivered, {} failed",
            msg.id,
            recipients.len(),
            success,
            failure
        );
        Ok(MessageStatus::Sent)
    }
}

fn destination_for(
    kind: ChannelKind,
    rec: &knotify_core::types::DeliveryRecord,
    guest: &knotify_core::types::Guest,
) -> String {
    match kind {
        ChannelKind::Sms => rec.phone.clone().unwrap_or_default(),
        ChannelKind::Email => rec.email.clone().unwrap_or_default(),
        // Push routes by guest identity; the provider maps it to devices.
        ChannelKind::Push => guest.id.clone(),
    }
}
