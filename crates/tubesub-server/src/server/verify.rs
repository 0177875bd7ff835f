//! Hub verification of intent (`GET` on the callback).
//!
//! The hub calls back with a challenge after every subscribe request. The
//! challenge is echoed only when the shared token matches and a subscribe
//! request for the topic was sent within the verification window; anything
//! else could be a third party subscribing us to feeds we never asked for.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use tubesub_core::db::unix_timestamp;
use tubesub_core::topic::canonicalize;
use tubesub_core::tracing_init::truncate_for_log;

use super::{AppState, WebSubError};
use crate::resolver::resolve_owner;
use crate::storage::Activation;

/// Verification query. Hubs send the `hub.`-prefixed names; bare names are
/// accepted too.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode", alias = "mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.topic", alias = "topic")]
    pub topic: Option<String>,
    #[serde(rename = "hub.challenge", alias = "challenge")]
    pub challenge: Option<String>,
    #[serde(rename = "hub.verify_token", alias = "verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.lease_seconds", alias = "lease_seconds")]
    pub lease_seconds: Option<String>,
}

impl VerifyParams {
    /// Granted lease in seconds; absent, unparsable or zero means none.
    fn lease_seconds(&self) -> Option<i64> {
        self.lease_seconds
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|&s| s > 0)
    }
}

fn tokens_match(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

pub(super) async fn verify(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Result<Response, WebSubError> {
    let Some(expected) = state.config.verify_token.as_deref() else {
        return Err(WebSubError::MissingVerifyToken);
    };
    if !tokens_match(expected, params.verify_token.as_deref().unwrap_or_default()) {
        return Err(WebSubError::TokenMismatch);
    }

    let Some(challenge) = params.challenge.as_deref().filter(|c| !c.is_empty()) else {
        return Err(WebSubError::MissingChallenge);
    };

    match params.mode.as_deref().map(str::trim).unwrap_or_default() {
        "subscribe" => {}
        "unsubscribe" => return Err(WebSubError::UnrequestedUnsubscribe),
        other => return Err(WebSubError::UnsupportedMode(other.to_string())),
    }

    let topic = canonicalize(params.topic.as_deref().unwrap_or_default());
    let log_topic = truncate_for_log(&topic, 140);
    let now = unix_timestamp();

    let channel_int = match resolve_owner(&state.db, &topic, None).await {
        Ok(owner) => owner.map(|o| o.channel_int),
        Err(e) => {
            warn!(topic = log_topic, error = %e, "Owner lookup failed during verification");
            None
        }
    };

    let lease_seconds = params.lease_seconds();
    let activated = state
        .db
        .activate_subscription(&Activation {
            topic: &topic,
            channel_int,
            lease_expires_at: lease_seconds.map(|s| now.saturating_add(s)),
            verified_at: now,
            requested_since: now - state.config.verification_window_secs,
        })
        .await?;

    if !activated {
        return Err(WebSubError::UnboundVerification);
    }

    info!(
        topic = log_topic,
        channel_int = ?channel_int,
        lease_seconds = ?lease_seconds,
        "Subscription verified"
    );

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8"),
            (CACHE_CONTROL, "no-store"),
        ],
        challenge.to_string(),
    )
        .into_response())
}
