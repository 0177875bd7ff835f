//! Atom notification payload parser.
//!
//! Hub notifications for a channel feed are small Atom documents with one
//! `<entry>` per new or updated video. This is a narrow extractor for that
//! known shape, not a general XML parser: each entry is matched on its own and
//! an entry that lacks a video id is skipped without affecting the others.

use std::sync::LazyLock;

use chrono::DateTime;
use regex::Regex;

use crate::storage::VideoEntry;

static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<entry\b[^>]*>(.*?)</entry>").expect("static regex is valid")
});
static VIDEO_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<yt:videoId>\s*([^<]+?)\s*</yt:videoId>").expect("static regex is valid")
});
static CHANNEL_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<yt:channelId>\s*([^<]+?)\s*</yt:channelId>").expect("static regex is valid")
});
static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<title(?:\s[^>]*)?>(.*?)</title>").expect("static regex is valid")
});
static PUBLISHED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<published>\s*([^<]+?)\s*</published>").expect("static regex is valid")
});
static DELETED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<at:deleted-entry\b[^>]*\bref="([^"]+)""#).expect("static regex is valid")
});

/// Everything extracted from one notification body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    pub entries: Vec<VideoEntry>,
    /// Video ids announced as deleted. Reported only; the mirror keeps rows.
    pub deleted: Vec<String>,
}

impl ParsedFeed {
    /// First `<yt:channelId>` carried by any entry.
    pub fn channel_hint(&self) -> Option<&str> {
        self.entries.iter().find_map(|e| e.channel_id.as_deref())
    }
}

/// Parse a notification body. Never fails: unrecognised input yields an
/// empty [`ParsedFeed`].
pub fn parse_feed(xml: &str) -> ParsedFeed {
    let entries = ENTRY_RE
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1).and_then(|m| parse_entry(m.as_str())))
        .collect();

    let deleted = DELETED_RE
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|m| {
            let reference = decode_xml(m.as_str());
            reference
                .strip_prefix("yt:video:")
                .map_or_else(|| reference.clone(), str::to_string)
        })
        .filter(|id| !id.is_empty())
        .collect();

    ParsedFeed { entries, deleted }
}

fn parse_entry(body: &str) -> Option<VideoEntry> {
    let video_id = capture_text(&VIDEO_ID_RE, body).filter(|id| !id.is_empty())?;
    let channel_id = capture_text(&CHANNEL_ID_RE, body).filter(|id| !id.is_empty());
    let title = capture_text(&TITLE_RE, body).unwrap_or_default();
    let published_at = capture_text(&PUBLISHED_RE, body)
        .as_deref()
        .map_or(0, parse_timestamp);

    Some(VideoEntry {
        video_id,
        channel_id,
        title,
        published_at,
    })
}

fn capture_text(re: &Regex, haystack: &str) -> Option<String> {
    let raw = re.captures(haystack)?.get(1)?.as_str().trim();
    let text = raw
        .strip_prefix("<![CDATA[")
        .and_then(|r| r.strip_suffix("]]>"))
        .map_or_else(|| decode_xml(raw), str::to_string);
    Some(text.trim().to_string())
}

/// RFC 3339 timestamp to Unix seconds; anything unparseable maps to 0.
fn parse_timestamp(value: &str) -> i64 {
    DateTime::parse_from_rfc3339(value.trim()).map_or(0, |dt| dt.timestamp().max(0))
}

/// Decode the predefined XML entities and numeric character references.
/// Unknown or malformed references are kept verbatim.
fn decode_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&tail[1..semi]).map(|c| (c, semi)));

        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const NOTIFICATION: &str = r#"<?xml version='1.0' encoding='UTF-8'?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns="http://www.w3.org/2005/Atom">
  <link rel="hub" href="https://pubsubhubbub.appspot.com"/>
  <link rel="self" href="https://www.youtube.com/xml/feeds/videos.xml?channel_id=UCchan"/>
  <title>YouTube video feed</title>
  <updated>2024-05-01T12:00:05.123456+00:00</updated>
  <entry>
    <id>yt:video:vid1</id>
    <yt:videoId>vid1</yt:videoId>
    <yt:channelId>UCchan</yt:channelId>
    <title>Tom &amp; Jerry &lt;live&gt; &#39;24 &#x263A;</title>
    <link rel="alternate" href="https://www.youtube.com/watch?v=vid1"/>
    <author>
     <name>Channel</name>
     <uri>https://www.youtube.com/channel/UCchan</uri>
    </author>
    <published>2024-05-01T12:00:00+00:00</published>
    <updated>2024-05-01T12:00:05.123456+00:00</updated>
  </entry>
</feed>"#;

    #[test]
    fn parses_single_entry_notification() {
        let feed = parse_feed(NOTIFICATION);
        assert_eq!(feed.entries.len(), 1);
        let entry = &feed.entries[0];
        assert_eq!(entry.video_id, "vid1");
        assert_eq!(entry.channel_id.as_deref(), Some("UCchan"));
        assert_eq!(entry.title, "Tom & Jerry <live> '24 \u{263A}");
        assert_eq!(entry.published_at, 1_714_564_800);
        assert_eq!(feed.channel_hint(), Some("UCchan"));
        assert!(feed.deleted.is_empty());
    }

    #[test]
    fn feed_level_title_is_not_taken_for_entries() {
        let xml = "<feed><title>Feed</title><entry><yt:videoId>v</yt:videoId></entry></feed>";
        let feed = parse_feed(xml);
        assert_eq!(feed.entries[0].title, "");
        assert_eq!(feed.entries[0].published_at, 0);
    }

    #[test]
    fn entries_without_video_id_are_skipped() {
        let xml = "<feed>\
            <entry><title>no id</title></entry>\
            <entry><yt:videoId>  </yt:videoId><title>blank id</title></entry>\
            <entry><yt:videoId>ok</yt:videoId><title>kept</title></entry>\
            </feed>";
        let feed = parse_feed(xml);
        assert_eq!(feed.entries.len(), 1);
        assert_eq!(feed.entries[0].video_id, "ok");
        assert_eq!(feed.entries[0].title, "kept");
    }

    #[test]
    fn unparseable_published_maps_to_zero() {
        let xml = "<entry><yt:videoId>v</yt:videoId><published>yesterday</published></entry>";
        assert_eq!(parse_feed(xml).entries[0].published_at, 0);
    }

    #[test]
    fn cdata_title_is_taken_verbatim() {
        let xml = "<entry><yt:videoId>v</yt:videoId><title><![CDATA[A &amp; B]]></title></entry>";
        assert_eq!(parse_feed(xml).entries[0].title, "A &amp; B");
    }

    #[test]
    fn deleted_entries_are_reported() {
        let xml = r#"<feed xmlns:at="http://purl.org/atompub/tombstones/1.0">
            <at:deleted-entry ref="yt:video:gone1" when="2024-05-01T00:00:00+00:00"/>
            </feed>"#;
        let feed = parse_feed(xml);
        assert!(feed.entries.is_empty());
        assert_eq!(feed.deleted, vec!["gone1"]);
    }

    #[test]
    fn garbage_yields_empty_feed() {
        assert_eq!(parse_feed(""), ParsedFeed::default());
        assert_eq!(parse_feed("not xml at all <entry"), ParsedFeed::default());
    }

    #[test]
    fn multiple_entries_keep_document_order() {
        let xml = "<entry><yt:videoId>a</yt:videoId></entry>\
                   <entry><yt:videoId>b</yt:videoId><yt:channelId>UCb</yt:channelId></entry>";
        let feed = parse_feed(xml);
        let ids: Vec<&str> = feed.entries.iter().map(|e| e.video_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(feed.channel_hint(), Some("UCb"));
    }

    #[test]
    fn decode_keeps_unknown_references() {
        assert_eq!(decode_xml("a &nbsp; b & c"), "a &nbsp; b & c");
        assert_eq!(decode_xml("&#65;&#x42;&amp;amp;"), "AB&amp;");
    }
}
