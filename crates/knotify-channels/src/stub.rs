//! Push and email senders — interface-complete stubs.
//!
//! They share the `ChannelSender` trait so the dispatch loop is
//! channel-agnostic; actual provider integration is implemented when
//! credentials are provided.

use async_trait::async_trait;

use knotify_core::types::ChannelKind;

use crate::sender::{ChannelSender, SendOutcome};

/// Sender for a channel whose provider is not configured. Every send is
/// skipped and reported as not applicable.
pub struct DisabledSender {
    kind: ChannelKind,
}

impl DisabledSender {
    pub fn new(kind: ChannelKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl ChannelSender for DisabledSender {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn send(&self, destination: &str, _body: &str) -> SendOutcome {
        tracing::debug!(
            "{} send skipped for {destination}: channel disabled",
            self.kind.as_str()
        );
        SendOutcome::NotApplicable
    }
}

/// Push notification sender. No live provider yet.
pub struct PushSender;

#[async_trait]
impl ChannelSender for PushSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Push
    }

    async fn send(&self, destination: &str, _body: &str) -> SendOutcome {
        tracing::debug!("Push send skipped for {destination}: no provider configured");
        SendOutcome::NotApplicable
    }
}

/// Email sender. No live provider yet.
pub struct EmailSender;

#[async_trait]
impl ChannelSender for EmailSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(&self, destination: &str, _body: &str) -> SendOutcome {
        tracing::debug!("Email send skipped for {destination}: no provider configured");
        SendOutcome::NotApplicable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stubs_report_not_applicable() {
        assert_eq!(PushSender.send("token", "hi").await, SendOutcome::NotApplicable);
        assert_eq!(EmailSender.send("a@b.c", "hi").await, SendOutcome::NotApplicable);
        assert_eq!(PushSender.kind(), ChannelKind::Push);
        assert_eq!(EmailSender.kind(), ChannelKind::Email);
    }
}
