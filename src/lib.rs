//! Local, offline-capable replica of the biweekly Thai government lottery results.
//!
//! Three sources feed one [`store::DrawStore`]: a bundled snapshot, a persisted
//! SQLite cache and the live upstream feed. The [`scheduler`] polls on a cadence
//! set by the publication calendar and the [`backfill`] coordinator fills history
//! in bounded batches. Consumers read through [`engine::SyncEngine`] and listen on
//! its event stream.

pub mod api;
pub mod backfill;
pub mod bundle;
pub mod cache;
pub mod config;
pub mod connection;
pub mod context;
pub mod database;
pub mod engine;
pub mod error;
pub mod events;
pub mod parser;
pub mod schedule;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod types;
pub mod utils;

pub use engine::SyncEngine;
pub use events::{EventKind, SyncEvent};
pub use types::{Draw, DrawIndexEntry, Source};
