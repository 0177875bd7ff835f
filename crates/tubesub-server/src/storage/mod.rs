//! `SQLite` storage for the tubesub subscriber.
//!
//! Provides persistence for subscriptions (keyed by canonical topic), the
//! channels they belong to, and the videos merged from hub notifications.
//! Atomic upserts are the only concurrency primitive: no in-process locks.

mod db;
mod models;
mod queries_channels;
mod queries_subscriptions;
mod queries_videos;


pub use db::{Database, DatabaseError};
pub use models::*;
pub use queries_subscriptions::Activation;
pub use queries_videos::{MAX_TITLE_CHARS, MergeSummary};
