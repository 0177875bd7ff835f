//! Subscription queries.
//!
//! Rows are keyed by canonical topic. Every write is a single atomic
//! statement so a renewal sweep and a live verification callback for the same
//! topic can interleave without losing the `active` state.

use tubesub_core::topic::canonicalize;

use super::db::{Database, DatabaseError};
use super::models::Subscription;

/// Inputs for [`Database::activate_subscription`].
#[derive(Debug, Clone)]
pub struct Activation<'a> {
    pub topic: &'a str,
    /// Resolved owner; `None` keeps whatever is stored.
    pub channel_int: Option<i64>,
    /// `None` when the hub did not grant a lease duration.
    pub lease_expires_at: Option<i64>,
    pub verified_at: i64,
    /// Oldest `bound_request_at` that still binds this verification.
    pub requested_since: i64,
}

impl Database {
    /// Get the subscription stored for a canonical topic.
    pub async fn get_subscription(
        &self,
        topic: &str,
    ) -> Result<Option<Subscription>, DatabaseError> {
        let sub = sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE topic = ?")
            .bind(topic)
            .fetch_optional(self.pool())
            .await?;

        Ok(sub)
    }

    /// Subscriptions ordered by soonest lease expiry, unknown expiry first.
    pub async fn list_subscriptions_for_renewal(
        &self,
        limit: i64,
    ) -> Result<Vec<Subscription>, DatabaseError> {
        let subs = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions \
             ORDER BY COALESCE(lease_expires_at, 0) ASC, topic ASC \
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(subs)
    }

    /// Record a subscribe (or renew) attempt.
    ///
    /// Called with `last_error: None` right before the request goes out, so
    /// a hub that verifies before answering already finds the attempt bound.
    /// An attempt recorded with an error never reached the hub and leaves
    /// the bound request untouched.
    ///
    /// New rows start `pending`. An `active` row stays `active`: a redundant
    /// renewal, or one the hub refused, must not throw away a live lease.
    /// The owner is only overwritten with a known value.
    pub async fn record_subscribe_request(
        &self,
        topic: &str,
        channel_int: Option<i64>,
        requested_at: i64,
        last_error: Option<&str>,
    ) -> Result<Subscription, DatabaseError> {
        let sub = sqlx::query_as::<_, Subscription>(
            "INSERT INTO subscriptions \
               (topic, channel_int, status, last_requested_at, bound_request_at, last_error) \
             VALUES (?, ?, 'pending', ?, ?, ?) \
             ON CONFLICT(topic) DO UPDATE SET \
               channel_int       = COALESCE(excluded.channel_int, subscriptions.channel_int), \
               status            = CASE WHEN subscriptions.status = 'active' \
                                        THEN 'active' ELSE 'pending' END, \
               last_requested_at = excluded.last_requested_at, \
               bound_request_at  = COALESCE(excluded.bound_request_at, \
                                            subscriptions.bound_request_at), \
               last_error        = excluded.last_error \
             RETURNING *",
        )
        .bind(topic)
        .bind(channel_int)
        .bind(requested_at)
        .bind(last_error.is_none().then_some(requested_at))
        .bind(last_error)
        .fetch_one(self.pool())
        .await?;

        Ok(sub)
    }

    /// Record the hub's refusal of (or a transport failure for) the attempt
    /// made at `requested_at`.
    ///
    /// Only `last_error` is written, and the attempt stops binding
    /// verifications unless a newer request has replaced it. A verification
    /// that already landed keeps the row `active`.
    pub async fn record_hub_failure(
        &self,
        topic: &str,
        requested_at: i64,
        last_error: &str,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE subscriptions SET \
               last_error       = ?, \
               bound_request_at = CASE WHEN bound_request_at = ? \
                                       THEN NULL ELSE bound_request_at END \
             WHERE topic = ?",
        )
        .bind(last_error)
        .bind(requested_at)
        .bind(topic)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Mark a subscription verified by the hub.
    ///
    /// The update only applies when a subscribe request the hub did not
    /// refuse was sent at or after `requested_since`; the bound check and the write
    /// are one statement. Returns `false` when no such request exists, which
    /// callers must treat as a forged or stale verification.
    pub async fn activate_subscription(
        &self,
        activation: &Activation<'_>,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE subscriptions SET \
               channel_int      = COALESCE(?, channel_int), \
               status           = 'active', \
               lease_expires_at = ?, \
               last_verified_at = ?, \
               last_error       = NULL \
             WHERE topic = ? AND bound_request_at >= ?",
        )
        .bind(activation.channel_int)
        .bind(activation.lease_expires_at)
        .bind(activation.verified_at)
        .bind(activation.topic)
        .bind(activation.requested_since)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Rewrite stored topics into canonical form.
    ///
    /// When both spellings of a topic exist they are folded into the
    /// canonical row, keeping the most advanced state of the two.
    /// Returns the number of legacy rows rewritten or folded.
    pub async fn normalize_topics(&self) -> Result<usize, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        let rows = sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions")
            .fetch_all(&mut *tx)
            .await?;

        let mut changed = 0;
        for legacy in rows {
            let canonical = canonicalize(&legacy.topic);
            if canonical == legacy.topic {
                continue;
            }

            let existing =
                sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE topic = ?")
                    .bind(&canonical)
                    .fetch_optional(&mut *tx)
                    .await?;

            match existing {
                None => {
                    sqlx::query("UPDATE subscriptions SET topic = ? WHERE topic = ?")
                        .bind(&canonical)
                        .bind(&legacy.topic)
                        .execute(&mut *tx)
                        .await?;
                }
                Some(current) => {
                    let merged = fold(current, &legacy);
                    sqlx::query(
                        "UPDATE subscriptions SET channel_int = ?, status = ?, \
                         lease_expires_at = ?, last_requested_at = ?, bound_request_at = ?, \
                         last_verified_at = ?, last_error = ? WHERE topic = ?",
                    )
                    .bind(merged.channel_int)
                    .bind(&merged.status)
                    .bind(merged.lease_expires_at)
                    .bind(merged.last_requested_at)
                    .bind(merged.bound_request_at)
                    .bind(merged.last_verified_at)
                    .bind(&merged.last_error)
                    .bind(&canonical)
                    .execute(&mut *tx)
                    .await?;

                    sqlx::query("DELETE FROM subscriptions WHERE topic = ?")
                        .bind(&legacy.topic)
                        .execute(&mut *tx)
                        .await?;
                }
            }
            changed += 1;
        }

        tx.commit().await?;
        Ok(changed)
    }
}

/// Combine two rows for the same logical topic.
fn fold(current: Subscription, legacy: &Subscription) -> Subscription {
    let status = if current.is_active() || legacy.is_active() {
        "active".to_string()
    } else {
        current.status.clone()
    };
    let last_error = if legacy.last_requested_at > current.last_requested_at {
        legacy.last_error.clone()
    } else {
        current.last_error.clone()
    };

    Subscription {
        channel_int: current.channel_int.or(legacy.channel_int),
        status,
        lease_expires_at: current.lease_expires_at.max(legacy.lease_expires_at),
        last_requested_at: current.last_requested_at.max(legacy.last_requested_at),
        bound_request_at: current.bound_request_at.max(legacy.bound_request_at),
        last_verified_at: current.last_verified_at.max(legacy.last_verified_at),
        last_error,
        topic: current.topic,
    }
}
