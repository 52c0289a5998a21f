//! Course-section seat tracker.
//!
//! A timer polls the seat feed, reconciles it into SQLite and reports the
//! sections whose seat counts moved. Changes are pushed to WebSocket
//! viewers and mailed to the users tracking those sections.

pub mod broadcast;
pub mod config;
pub mod feed;
pub mod jobs;
pub mod notify;
pub mod schedule;
pub mod server;
pub mod stats;
pub mod store;
pub mod sync;
pub mod tracking;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
