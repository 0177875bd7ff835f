//! Database connection and initialization.

pub use tubesub_core::db::DatabaseError;

tubesub_core::define_database!(Database, "Database migrations complete");
