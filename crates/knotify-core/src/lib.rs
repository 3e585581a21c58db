//! # Knotify Core
//! Shared domain types, configuration, and error handling.

pub mod config;
pub mod error;
pub mod types;

pub use config::KnotifyConfig;
pub use error::{KnotifyError, Result};
