//! # Knotify Engine
//!
//! The scheduled-message delivery engine: audience targeting, delivery
//! ledger, channel dispatch, and the batch trigger.
//!
//! ## Pipeline
//! ```text
//! trigger → batch: select due (status=scheduled, send_at ≤ now, LIMIT n)
//!   for each message:
//!     claim scheduled → sending (conditional update; skip if lost)
//!     → audience: resolve targeting rules against the guest list
//!     → records: write one ledger row per recipient, before any send
//!     → dispatch: per enabled channel, sequential sends with a fixed
//!       inter-send delay, ledger updated after every item
//!     → finalize: sent | failed with aggregate counts
//! ```
//!
//! Failures are isolated at every level: a bad item never stops a channel
//! loop, a bad channel never touches another channel's sub-status, and a
//! bad message never aborts the rest of the batch.

pub mod audience;
pub mod batch;
pub mod dispatch;
pub mod personalize;
pub mod pipeline;
pub mod records;

pub use batch::{BatchSummary, Engine};
pub use pipeline::SenderSet;
