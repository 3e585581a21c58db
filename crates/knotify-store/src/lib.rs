//! # Knotify Store
//!
//! SQLite persistence for scheduled messages, guests, sub-event
//! assignments, and delivery records. Table-like operations only —
//! filtered select, conditional update, bulk insert. The delivery engine
//! receives a `Store` handle explicitly so tests can run against an
//! isolated in-memory database.

mod store;

pub use store::Store;
