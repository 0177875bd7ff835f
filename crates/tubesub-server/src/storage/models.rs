//! Data models for tubesub storage.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle of a hub subscription.
///
/// `Pending` right after a subscribe request; `Active` only once the hub's
/// verification callback has been accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Pending,
    Active,
}

impl SubscriptionStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            other => Err(format!("unknown subscription status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Channel {
    pub id: i64,
    pub channel_id: String,
    pub title: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub topic: String,
    pub channel_int: Option<i64>,
    pub status: String,
    pub lease_expires_at: Option<i64>,
    pub last_requested_at: i64,
    /// Newest request the hub did not refuse; `None` until one is sent.
    pub bound_request_at: Option<i64>,
    pub last_verified_at: Option<i64>,
    pub last_error: Option<String>,
}

impl Subscription {
    /// Parsed status; the column is constrained by a CHECK so unknown values
    /// only appear if the schema was edited by hand.
    pub fn status(&self) -> Option<SubscriptionStatus> {
        self.status.parse().ok()
    }

    pub fn is_active(&self) -> bool {
        self.status() == Some(SubscriptionStatus::Active)
    }

    /// True when the lease is active and outlives `now + min_remaining`.
    pub fn lease_outlives(&self, now: i64, min_remaining: i64) -> bool {
        self.is_active()
            && self
                .lease_expires_at
                .is_some_and(|exp| exp > now.saturating_add(min_remaining))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Video {
    pub video_id: String,
    pub channel_int: i64,
    pub title: String,
    pub published_at: i64,
    pub updated_at: i64,
}

/// One parsed feed entry, ready to merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoEntry {
    pub video_id: String,
    /// `<yt:channelId>` from the payload, used as a last-resort owner hint.
    pub channel_id: Option<String>,
    pub title: String,
    /// Unix seconds; `0` when the feed carried no parseable timestamp.
    pub published_at: i64,
}
