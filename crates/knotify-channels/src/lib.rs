//! # Knotify Channels
//! Delivery channel implementations.
//!
//! Each channel follows the same `ChannelSender` trait so the dispatch
//! loop stays channel-agnostic. SMS is live; push and email are stubs
//! until provider integrations land.

pub mod phone;
pub mod sender;
pub mod sms;
pub mod stub;

pub use sender::{ChannelSender, SendOutcome};
pub use sms::SmsSender;
pub use stub::{DisabledSender, EmailSender, PushSender};
