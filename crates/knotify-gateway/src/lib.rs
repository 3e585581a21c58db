//! # Knotify Gateway
//! HTTP trigger surface for the delivery engine.

pub mod routes;
pub mod server;

pub use server::{AppState, start};
