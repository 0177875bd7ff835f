//! `tubesub` Core Library
//!
//! Shared functionality for `tubesub` components:
//! - WebSub configuration loaded once at startup
//! - `SQLite` pool helpers and the `define_database!` macro
//! - Topic URL canonicalization
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod topic;
pub mod tracing_init;

pub use config::WebSubConfig;
pub use error::{Error, Result};
