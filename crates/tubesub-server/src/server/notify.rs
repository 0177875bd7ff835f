//! Content distribution (`POST` on the callback).

use std::sync::LazyLock;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::LINK};
use regex::Regex;
use tracing::{debug, info, warn};

use tubesub_core::db::unix_timestamp;
use tubesub_core::tracing_init::truncate_for_log;

use super::{AppState, WebSubError};
use crate::feed::parse_feed;
use crate::resolver::resolve_owner;
use crate::signature::{SIGNATURE_HEADER, verify_signature};

const TOPIC_HEADER: &str = "x-hub-topic";

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([^>]*)>([^<]*)").expect("static regex is valid")
});
static REL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\brel\s*=\s*(?:"([^"]*)"|([^\s;,]+))"#).expect("static regex is valid")
});

/// Topic of a notification: `X-Hub-Topic` if present, otherwise the target
/// of a `Link: <...>; rel="self"` header.
pub fn topic_from_headers(headers: &HeaderMap) -> Option<String> {
    let explicit = headers
        .get(TOPIC_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(topic) = explicit {
        return Some(topic.to_string());
    }

    headers
        .get_all(LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| LINK_RE.captures_iter(v))
        .find_map(|caps| {
            let params = caps.get(2)?.as_str();
            let rel = REL_RE.captures(params)?;
            let rels = rel.get(1).or_else(|| rel.get(2))?.as_str();
            rels.split_whitespace()
                .any(|r| r.eq_ignore_ascii_case("self"))
                .then(|| caps.get(1).map(|m| m.as_str().trim().to_string()))
                .flatten()
        })
        .filter(|t| !t.is_empty())
}

/// Authenticate, parse and merge one notification.
///
/// Every outcome that is not an authentication or configuration failure
/// answers 204, so the hub does not retry payloads the mirror cannot use.
/// Storage failures answer 500 so it does.
pub(super) async fn notify(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebSubError> {
    let Some(secret) = state.config.secret.as_deref() else {
        return Err(WebSubError::MissingSecret);
    };
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebSubError::BadSignature)?;
    if !verify_signature(&body, signature, secret.as_bytes()) {
        return Err(WebSubError::BadSignature);
    }

    let feed = parse_feed(&String::from_utf8_lossy(&body));
    let topic = topic_from_headers(&headers).unwrap_or_default();
    let log_topic = truncate_for_log(&topic, 140);

    if !feed.deleted.is_empty() {
        info!(topic = log_topic, deleted = ?feed.deleted, "Hub reported deleted entries");
    }

    if feed.entries.is_empty() {
        debug!(topic = log_topic, bytes = body.len(), "Notification carried no entries");
        return Ok(StatusCode::NO_CONTENT);
    }

    let Some(owner) = resolve_owner(&state.db, &topic, feed.channel_hint()).await? else {
        warn!(
            topic = log_topic,
            hint = ?feed.channel_hint(),
            entries = feed.entries.len(),
            "Notification for unknown channel, dropping"
        );
        return Ok(StatusCode::NO_CONTENT);
    };

    let summary = state
        .db
        .merge_videos(&feed.entries, owner.channel_int, unix_timestamp())
        .await?;

    info!(
        topic = log_topic,
        channel_int = owner.channel_int,
        entries = feed.entries.len(),
        written = summary.written,
        unchanged = summary.unchanged,
        "Notification stored"
    );

    Ok(StatusCode::NO_CONTENT)
}
