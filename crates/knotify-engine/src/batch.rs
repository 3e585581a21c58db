//! Batch entry point — the externally-triggered processing pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use knotify_core::config::KnotifyConfig;
use knotify_core::error::Result;
use knotify_core::types::MessageStatus;
use knotify_store::Store;

use crate::pipeline::{Pipeline, SenderSet};

/// Aggregate result of one processing pass, returned to the trigger.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BatchSummary {
    pub processed: u32,
    pub sent: u32,
    pub failed: u32,
}

/// The delivery engine. Holds the datastore handle and one sender per
/// channel; safe to share behind an `Arc` across trigger invocations.
pub struct Engine {
    store: Arc<Store>,
    senders: SenderSet,
    batch_size: u32,
    send_delay: Duration,
}

impl Engine {
    /// Build from config: live SMS sender when configured, stubs otherwise.
    pub fn new(store: Arc<Store>, config: &KnotifyConfig) -> Self {
        let senders = SenderSet::from_config(&config.channel);
        Self {
            store,
            senders,
            batch_size: config.scheduler.batch_size,
            send_delay: Duration::from_millis(config.scheduler.send_delay_ms),
        }
    }

    /// Custom senders and timings, used by tests and embedders.
    pub fn with_senders(
        store: Arc<Store>,
        senders: SenderSet,
        batch_size: u32,
        send_delay: Duration,
    ) -> Self {
        Self { store, senders, batch_size, send_delay }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Select due messages (status=scheduled, send_at ≤ now, bounded batch)
    /// and drive each fully through the pipeline, sequentially. One
    /// message's error is converted into its own failed transition; the
    /// batch always continues. Only a top-level selection failure
    /// propagates to the caller.
    pub async fn process_due_messages(&self) -> Result<BatchSummary> {
        let due = self.store.due_messages(Utc::now(), self.batch_size)?;
        let mut summary = BatchSummary::default();
        if due.is_empty() {
            tracing::debug!("No due messages");
            return Ok(summary);
        }
        tracing::info!("Processing {} due message(s)", due.len());

        for msg in due {
            // Conditional claim: an overlapping run that got here first
            // wins, and this run skips the message.
            match self.store.claim_sending(&msg.id) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::info!("Message {} already claimed; skipping", msg.id);
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Claim failed for message {}: {e}", msg.id);
                    continue;
                }
            }
            summary.processed += 1;

            let pipeline = Pipeline {
                store: &self.store,
                senders: &self.senders,
                send_delay: self.send_delay,
            };
            match pipeline.process(&msg).await {
                Ok(MessageStatus::Sent) => summary.sent += 1,
                Ok(_) => summary.failed += 1,
                Err(e) => {
                    tracing::error!("Pipeline error for message {}: {e}", msg.id);
                    if let Err(e2) = self.store.finalize_message(
                        &msg.id,
                        MessageStatus::Failed,
                        0,
                        0,
                        1,
                        None,
                    ) {
                        tracing::warn!("Failed transition not recorded for {}: {e2}", msg.id);
                    }
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            "Batch done: {} processed, {} sent, {} failed",
            summary.processed,
            summary.sent,
            summary.failed
        );
        Ok(summary)
    }
}
