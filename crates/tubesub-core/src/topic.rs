//! Topic URL canonicalization.
//!
//! The hub echoes topics back in whichever spelling it has on file, and two
//! feed path prefixes have been used for the same channel feed over time.
//! Subscriptions are keyed on the canonical spelling, which is the one the
//! feed itself advertises in `<link rel="self">`.

/// Canonical feed prefix; the channel id follows as `?channel_id=`.
pub const CANONICAL_FEED_PREFIX: &str = "https://www.youtube.com/xml/feeds/videos.xml";

/// Historical spellings folded into [`CANONICAL_FEED_PREFIX`].
const LEGACY_FEED_PREFIXES: &[&str] = &[
    "https://www.youtube.com/feeds/videos.xml",
    "http://www.youtube.com/feeds/videos.xml",
    "http://www.youtube.com/xml/feeds/videos.xml",
];

/// Normalize a raw topic URL to its canonical form.
///
/// Total: unknown URLs are returned trimmed but otherwise untouched, and an
/// empty input yields an empty string.
pub fn canonicalize(raw: &str) -> String {
    let topic = raw.trim();
    for legacy in LEGACY_FEED_PREFIXES {
        if let Some(rest) = topic.strip_prefix(legacy) {
            return format!("{CANONICAL_FEED_PREFIX}{rest}");
        }
    }
    topic.to_string()
}

/// Canonical topic URL for an external channel id.
pub fn topic_for_channel(channel_id: &str) -> String {
    format!(
        "{CANONICAL_FEED_PREFIX}?channel_id={}",
        urlencoding::encode(channel_id.trim())
    )
}

/// Extract the `channel_id` query parameter from a topic URL.
pub fn channel_id_from_topic(topic: &str) -> Option<String> {
    let (_, query) = topic.trim().split_once('?')?;
    let query = query.split('#').next().unwrap_or_default();
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "channel_id")
        .map(|(_, value)| decode_query_value(value))
        .filter(|id| !id.is_empty())
}

/// Percent-decode a query value. Malformed escapes are kept literally and
/// invalid UTF-8 is replaced.
fn decode_query_value(value: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(value.as_bytes())).into_owned()
}
