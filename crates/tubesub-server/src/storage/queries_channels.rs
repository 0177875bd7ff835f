//! Channel queries.
//!
//! The catalog importer owns channel rows; the subscriber looks them up to
//! resolve notification owners and registers bare rows for `tubesub subscribe`.

use tubesub_core::db::unix_timestamp;

use super::db::{Database, DatabaseError};
use super::models::Channel;

impl Database {
    /// Insert a channel or refresh its title, returning the internal id.
    ///
    /// A `None` title never clears a stored one.
    pub async fn upsert_channel(
        &self,
        channel_id: &str,
        title: Option<&str>,
    ) -> Result<i64, DatabaseError> {
        let channel_id = channel_id.trim();
        if channel_id.is_empty() {
            return Err(DatabaseError::Query("channel_id must not be empty".into()));
        }

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO channels (channel_id, title, created_at) VALUES (?, ?, ?) \
             ON CONFLICT(channel_id) DO UPDATE SET title = COALESCE(excluded.title, channels.title) \
             RETURNING id",
        )
        .bind(channel_id)
        .bind(title)
        .bind(unix_timestamp())
        .fetch_one(self.pool())
        .await?;

        Ok(id)
    }

    /// Get a channel by internal id.
    pub async fn get_channel(&self, id: i64) -> Result<Channel, DatabaseError> {
        sqlx::query_as::<_, Channel>("SELECT * FROM channels WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Channel {id}")))
    }

    /// Look up a channel by its external id.
    pub async fn get_channel_by_external_id(
        &self,
        channel_id: &str,
    ) -> Result<Option<Channel>, DatabaseError> {
        let channel = sqlx::query_as::<_, Channel>("SELECT * FROM channels WHERE channel_id = ?")
            .bind(channel_id)
            .fetch_optional(self.pool())
            .await?;

        Ok(channel)
    }
}
