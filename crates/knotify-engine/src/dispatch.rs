//! Bulk dispatch loop — sequential sends with per-item ledger updates.

use std::time::Duration;

use knotify_channels::{ChannelSender, SendOutcome};
use knotify_core::types::DeliveryStatus;
use knotify_store::Store;

/// One personalized payload bound for one recipient.
#[derive(Debug, Clone)]
pub struct DispatchItem {
    pub guest_id: String,
    pub destination: String,
    pub body: String,
}

/// Aggregate counters for one channel's pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelReport {
    pub sent: i64,
    pub failed: i64,
}

/// Iterate items strictly sequentially, pausing `delay` between sends to
/// respect provider rate limits, and update each delivery record's
/// channel sub-status immediately after its attempt. A failed item never
/// aborts the loop — every recipient gets exactly one attempt.
pub async fn dispatch_channel(
    store: &Store,
    message_id: &str,
    sender: &dyn ChannelSender,
    items: &[DispatchItem],
    delay: Duration,
) -> ChannelReport {
    let kind = sender.kind();
    let mut report = ChannelReport::default();

    for (i, item) in items.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let (status, provider_id) = match sender.send(&item.destination, &item.body).await {
            SendOutcome::Delivered { provider_id } => {
                report.sent += 1;
                (DeliveryStatus::Sent, Some(provider_id))
            }
            SendOutcome::Failed { error } => {
                report.failed += 1;
                tracing::warn!(
                    "{} send failed for guest {} on message {message_id}: {error}",
                    kind.as_str(),
                    item.guest_id
                );
                (DeliveryStatus::Failed, None)
            }
            SendOutcome::NotApplicable => (DeliveryStatus::NotApplicable, None),
        };

        // Ledger bookkeeping is not blocking: a write failure is logged
        // and the loop moves on.
        if let Err(e) = store.update_channel_status(
            message_id,
            &item.guest_id,
            kind,
            status,
            provider_id.as_deref(),
        ) {
            tracing::warn!(
                "Ledger update failed for guest {} on message {message_id}: {e}",
                item.guest_id
            );
        }
    }

    tracing::info!(
        "Dispatched {} via {}: {} sent, {} failed",
        items.len(),
        kind.as_str(),
        report.sent,
        report.failed
    );
    report
}
