//! Maps a topic (plus an optional payload hint) to the owning channel row.

use tracing::debug;

use tubesub_core::topic::{canonicalize, channel_id_from_topic};

use crate::storage::{Database, DatabaseError};

/// Which lookup produced the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerSource {
    Subscription,
    TopicChannelId,
    PayloadHint,
}

/// A resolved owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub channel_int: i64,
    pub source: OwnerSource,
}

/// Resolve the channel that owns `topic`.
///
/// Tried in order, first hit wins:
/// 1. the owner recorded on the subscription row for the canonical topic;
/// 2. the `channel_id` query parameter of the topic, looked up in `channels`;
/// 3. `hint` (the `<yt:channelId>` of a notification), looked up in `channels`.
///
/// Never creates rows. `Ok(None)` means the topic is unknown to the mirror.
pub async fn resolve_owner(
    db: &Database,
    topic: &str,
    hint: Option<&str>,
) -> Result<Option<Owner>, DatabaseError> {
    let topic = canonicalize(topic);

    if !topic.is_empty()
        && let Some(channel_int) = db
            .get_subscription(&topic)
            .await?
            .and_then(|sub| sub.channel_int)
    {
        return Ok(Some(Owner {
            channel_int,
            source: OwnerSource::Subscription,
        }));
    }

    let from_topic = channel_id_from_topic(&topic);
    if let Some(channel_id) = from_topic.as_deref()
        && let Some(channel) = db.get_channel_by_external_id(channel_id).await?
    {
        return Ok(Some(Owner {
            channel_int: channel.id,
            source: OwnerSource::TopicChannelId,
        }));
    }

    let hint = hint.map(str::trim).filter(|h| !h.is_empty());
    if let Some(channel_id) = hint
        && from_topic.as_deref() != Some(channel_id)
        && let Some(channel) = db.get_channel_by_external_id(channel_id).await?
    {
        return Ok(Some(Owner {
            channel_int: channel.id,
            source: OwnerSource::PayloadHint,
        }));
    }

    debug!(topic = %topic, hint = ?hint, "No owner for topic");
    Ok(None)
}
