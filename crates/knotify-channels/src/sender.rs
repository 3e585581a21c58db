//! The channel sender contract shared by all delivery media.

use async_trait::async_trait;
use knotify_core::types::ChannelKind;

/// Result of one send attempt. Failures are data, not errors — the
/// dispatch loop records them and keeps going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Provider accepted the message and assigned a reference id.
    Delivered { provider_id: String },
    /// Provider rejected the message, or the destination was unusable.
    Failed { error: String },
    /// The channel has no live provider; nothing was attempted.
    NotApplicable,
}

impl SendOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed { error: error.into() }
    }
}

/// One delivery medium. `send` makes exactly one attempt — retry policy,
/// if any, belongs to a later processing pass.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    fn kind(&self) -> ChannelKind;
    async fn send(&self, destination: &str, body: &str) -> SendOutcome;
}
