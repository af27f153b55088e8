use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use linkvote_types::VoteType;

use crate::models::{PostRow, VoteRow};
use crate::repository::{PostRepository, SqliteRepo, VoteRepository};
use crate::{Database, DbError, Result};

/// Attempts before a vote that keeps hitting SQLITE_BUSY is reported as a conflict.
pub const MAX_VOTE_ATTEMPTS: u32 = 3;

/// Apply `intent` from `user_id` to `post_id` and return the updated post.
///
/// - first vote: record it, points move by the vote's value
/// - opposite vote: flip it, points move by twice the new value
/// - repeated vote: nothing changes
///
/// Callers must run this inside one transaction so that the post's point
/// tally always equals the sum of its votes.
pub fn apply_vote<R>(
    repo: &R,
    post_id: i64,
    user_id: i64,
    intent: VoteType,
    now: DateTime<Utc>,
) -> Result<PostRow>
where
    R: PostRepository + VoteRepository + ?Sized,
{
    let mut post = repo.find_post(post_id)?.ok_or(DbError::PostNotFound(post_id))?;

    let delta = match repo.find_vote(user_id, post_id)? {
        None => intent.value(),
        Some(existing) if existing.value != intent => 2 * intent.value(),
        Some(_) => {
            debug!(post_id, user_id, "repeated vote ignored");
            return Ok(post);
        }
    };

    repo.upsert_vote(&VoteRow {
        user_id,
        post_id,
        value: intent,
    })?;

    post.points += delta;
    post.updated_at = now;
    repo.save_post(&post)?;

    Ok(post)
}

impl Database {
    /// Cast a vote in its own write transaction, retrying when another
    /// connection holds the database lock.
    pub fn cast_vote(&self, post_id: i64, user_id: i64, intent: VoteType) -> Result<PostRow> {
        for attempt in 1..=MAX_VOTE_ATTEMPTS {
            let outcome = self.with_transaction(|tx| {
                apply_vote(&SqliteRepo::new(tx), post_id, user_id, intent, Utc::now())
            });

            match outcome {
                Err(e) if e.is_busy() => {
                    warn!(post_id, user_id, attempt, "vote transaction busy, retrying");
                }
                other => return other,
            }
        }

        Err(DbError::Conflict(MAX_VOTE_ATTEMPTS))
    }

    /// The given user's votes on any of `post_ids`.
    pub fn get_votes_for_posts(&self, user_id: i64, post_ids: &[i64]) -> Result<Vec<VoteRow>> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (2..=post_ids.len() + 1).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT user_id, post_id, value FROM votes WHERE user_id = ?1 AND post_id IN ({})",
                placeholders.join(", ")
            );

            let mut params: Vec<&dyn rusqlite::types::ToSql> = Vec::with_capacity(post_ids.len() + 1);
            params.push(&user_id);
            params.extend(post_ids.iter().map(|id| id as &dyn rusqlite::types::ToSql));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), crate::models::vote_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}
