//! Video merge queries.
//!
//! Hub delivery is at-least-once and unordered, so the merge is an upsert
//! whose update branch only fires when something actually changed. A
//! redelivered entry reports `written = false` and touches no row.

use sqlx::{Executor, Sqlite};

use super::db::{Database, DatabaseError};
use super::models::{Video, VideoEntry};

/// Titles are stored truncated to this many characters.
pub const MAX_TITLE_CHARS: usize = 200;

// `published_at` is never replaced by 0 (unknown); `updated_at` moves only
// when the row is written.
const MERGE_VIDEO_SQL: &str = "\
    INSERT INTO videos (video_id, channel_int, title, published_at, updated_at) \
    VALUES (?, ?, ?, ?, ?) \
    ON CONFLICT(video_id) DO UPDATE SET \
      channel_int  = excluded.channel_int, \
      title        = excluded.title, \
      published_at = CASE WHEN excluded.published_at > 0 \
                          THEN excluded.published_at ELSE videos.published_at END, \
      updated_at   = excluded.updated_at \
    WHERE videos.channel_int IS NOT excluded.channel_int \
       OR videos.title IS NOT excluded.title \
       OR (excluded.published_at > 0 AND videos.published_at != excluded.published_at)";

/// Outcome of merging one notification batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub written: usize,
    pub unchanged: usize,
}

impl Database {
    /// Merge a single entry. Returns `true` if a row was inserted or changed.
    pub async fn merge_video(
        &self,
        entry: &VideoEntry,
        channel_int: i64,
        now: i64,
    ) -> Result<bool, DatabaseError> {
        merge_one(self.pool(), entry, channel_int, now).await
    }

    /// Merge a whole batch in one transaction: either every entry is applied
    /// or none is.
    pub async fn merge_videos(
        &self,
        entries: &[VideoEntry],
        channel_int: i64,
        now: i64,
    ) -> Result<MergeSummary, DatabaseError> {
        let mut tx = self.pool().begin().await?;
        let mut summary = MergeSummary::default();

        for entry in entries {
            if merge_one(&mut *tx, entry, channel_int, now).await? {
                summary.written += 1;
            } else {
                summary.unchanged += 1;
            }
        }

        tx.commit().await?;
        Ok(summary)
    }

    /// Get a video by its external id.
    pub async fn get_video(&self, video_id: &str) -> Result<Option<Video>, DatabaseError> {
        let video = sqlx::query_as::<_, Video>("SELECT * FROM videos WHERE video_id = ?")
            .bind(video_id)
            .fetch_optional(self.pool())
            .await?;

        Ok(video)
    }

    /// Number of stored videos owned by a channel.
    pub async fn count_videos_for_channel(&self, channel_int: i64) -> Result<i64, DatabaseError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM videos WHERE channel_int = ?")
            .bind(channel_int)
            .fetch_one(self.pool())
            .await?;

        Ok(count)
    }
}

async fn merge_one<'e, E>(
    executor: E,
    entry: &VideoEntry,
    channel_int: i64,
    now: i64,
) -> Result<bool, DatabaseError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(MERGE_VIDEO_SQL)
        .bind(&entry.video_id)
        .bind(channel_int)
        .bind(truncate_title(&entry.title))
        .bind(entry.published_at.max(0))
        .bind(now)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn truncate_title(title: &str) -> &str {
    match title.char_indices().nth(MAX_TITLE_CHARS) {
        Some((idx, _)) => &title[..idx],
        None => title,
    }
}
