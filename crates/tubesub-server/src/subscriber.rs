//! Subscription requester.
//!
//! Sends subscribe/renew requests to the hub and records each attempt on the
//! subscription row. The hub answers asynchronously through the verification
//! callback, which may arrive before the POST returns. The attempt is
//! therefore recorded first, opening the window in which that callback is
//! accepted; a refusal or transport failure closes it again. This side only
//! ever moves a row to `pending` (or keeps it `active`).

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use tubesub_core::WebSubConfig;
use tubesub_core::db::unix_timestamp;
use tubesub_core::topic::{canonicalize, topic_for_channel};
use tubesub_core::tracing_init::truncate_for_log;

use crate::hub::{HubClient, SubscribeForm};
use crate::storage::{Database, DatabaseError};

/// Recorded as `last_error` when the verify token is not configured.
pub const MISSING_VERIFY_TOKEN: &str = "missing WEBSUB_VERIFY_TOKEN";

#[derive(Debug, Error)]
pub enum SubscribeError {
    /// No verify token configured; the hub could never be answered.
    #[error("missing WEBSUB_VERIFY_TOKEN")]
    MissingVerifyToken,

    #[error("topic is empty")]
    EmptyTopic,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Result of one subscribe attempt.
///
/// A hub refusal or transport failure is reported here (`ok = false`), not
/// as an error: it is already recorded on the row and the next renewal sweep
/// retries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribeOutcome {
    pub ok: bool,
    pub skipped: bool,
    pub topic: String,
    pub hub_status: Option<u16>,
    pub last_error: Option<String>,
}

/// Issues subscribe requests to the hub.
#[derive(Clone)]
pub struct Subscriber {
    db: Database,
    hub: Arc<dyn HubClient>,
    config: Arc<WebSubConfig>,
}

impl Subscriber {
    pub fn new(db: Database, hub: Arc<dyn HubClient>, config: Arc<WebSubConfig>) -> Self {
        Self { db, hub, config }
    }

    pub const fn config(&self) -> &Arc<WebSubConfig> {
        &self.config
    }

    /// Subscribe to the feed of an external channel.
    pub async fn subscribe_channel(
        &self,
        owner: Option<i64>,
        channel_id: &str,
        force: bool,
    ) -> Result<SubscribeOutcome, SubscribeError> {
        if channel_id.trim().is_empty() {
            return Err(SubscribeError::EmptyTopic);
        }
        self.subscribe_topic(&topic_for_channel(channel_id), owner, force)
            .await
    }

    /// Subscribe (or renew) a topic.
    ///
    /// Unless `force` is set, a topic whose lease is active and outlives the
    /// minimum-remaining threshold is skipped without contacting the hub.
    pub async fn subscribe_topic(
        &self,
        topic: &str,
        owner: Option<i64>,
        force: bool,
    ) -> Result<SubscribeOutcome, SubscribeError> {
        let topic = canonicalize(topic);
        if topic.is_empty() {
            return Err(SubscribeError::EmptyTopic);
        }
        let now = unix_timestamp();
        let log_topic = truncate_for_log(&topic, 140);

        if !force
            && let Some(existing) = self.db.get_subscription(&topic).await?
            && existing.lease_outlives(now, self.config.min_remaining_lease_secs)
        {
            debug!(topic = log_topic, lease_expires_at = ?existing.lease_expires_at, "Lease still active, skipping subscribe");
            return Ok(SubscribeOutcome {
                ok: true,
                skipped: true,
                topic,
                hub_status: None,
                last_error: None,
            });
        }

        let Some(verify_token) = self.config.verify_token.clone() else {
            error!(topic = log_topic, "Cannot subscribe: {MISSING_VERIFY_TOKEN}");
            self.db
                .record_subscribe_request(&topic, owner, now, Some(MISSING_VERIFY_TOKEN))
                .await?;
            return Err(SubscribeError::MissingVerifyToken);
        };

        let form = SubscribeForm {
            topic: topic.clone(),
            callback: self.config.callback_url.clone(),
            verify_token,
            secret: self.config.secret.clone(),
            lease_seconds: self.config.lease_seconds,
        };

        self.db
            .record_subscribe_request(&topic, owner, now, None)
            .await?;

        let (hub_status, last_error) = match self.hub.subscribe(&form).await {
            Ok(response) if response.is_success() => (Some(response.status), None),
            Ok(response) => (
                Some(response.status),
                Some(format!("hub {}: {}", response.status, response.body)),
            ),
            Err(e) => (None, Some(format!("hub request failed: {e}"))),
        };

        match &last_error {
            None => info!(topic = log_topic, status = ?hub_status, "Subscribe request accepted by hub"),
            Some(err) => {
                warn!(topic = log_topic, status = ?hub_status, error = %err, "Subscribe request failed");
                self.db.record_hub_failure(&topic, now, err).await?;
            }
        }

        Ok(SubscribeOutcome {
            ok: last_error.is_none(),
            skipped: false,
            topic,
            hub_status,
            last_error,
        })
    }
}
