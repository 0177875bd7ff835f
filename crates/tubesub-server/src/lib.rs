//! tubesub server library.
//!
//! WebSub subscriber that mirrors YouTube channel uploads: subscribes channel
//! feeds at the hub, answers the hub's verification callbacks, authenticates
//! and merges pushed notifications, and keeps leases renewed.

pub mod feed;
pub mod hub;
pub mod renewal;
pub mod resolver;
pub mod server;
pub mod signature;
pub mod storage;
pub mod subscriber;

#[cfg(test)]
mod testing;
