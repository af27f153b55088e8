//! Storage seams for the vote engine and the feed paginator.
//!
//! Both are written against these traits rather than against SQLite, and run
//! inside whatever connection or transaction the caller hands them.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::Result;
use crate::models::{POST_COLUMNS, PostRow, VoteRow, format_ts, post_from_row, vote_from_row};

pub trait PostRepository {
    fn find_post(&self, id: i64) -> Result<Option<PostRow>>;

    /// Persist title, text, points and updated_at of an existing post.
    fn save_post(&self, post: &PostRow) -> Result<()>;

    /// Returns false when no such post existed.
    fn delete_post(&self, id: i64) -> Result<bool>;

    fn count_posts(&self) -> Result<i64>;

    /// Number of posts strictly older than `cursor`, or all posts when `None`.
    fn count_posts_before(&self, cursor: Option<DateTime<Utc>>) -> Result<i64>;

    /// Newest-first posts strictly older than `cursor`.
    fn posts_before(&self, cursor: Option<DateTime<Utc>>, limit: u32) -> Result<Vec<PostRow>>;
}

pub trait VoteRepository {
    fn find_vote(&self, user_id: i64, post_id: i64) -> Result<Option<VoteRow>>;

    /// Insert the vote, or overwrite the value of the existing (user, post) vote.
    fn upsert_vote(&self, vote: &VoteRow) -> Result<()>;
}

/// Repository over a borrowed SQLite connection. Pass a `Transaction` to
/// make a sequence of calls atomic.
pub struct SqliteRepo<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl PostRepository for SqliteRepo<'_> {
    fn find_post(&self, id: i64) -> Result<Option<PostRow>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1");
        let row = self
            .conn
            .prepare_cached(&sql)?
            .query_row([id], post_from_row)
            .optional()?;
        Ok(row)
    }

    fn save_post(&self, post: &PostRow) -> Result<()> {
        self.conn.execute(
            "UPDATE posts SET title = ?1, text = ?2, points = ?3, updated_at = ?4 WHERE id = ?5",
            rusqlite::params![
                post.title,
                post.text,
                post.points,
                format_ts(post.updated_at),
                post.id
            ],
        )?;
        Ok(())
    }

    fn delete_post(&self, id: i64) -> Result<bool> {
        let removed = self.conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
        Ok(removed > 0)
    }

    fn count_posts(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM posts", [], |r| r.get(0))?;
        Ok(count)
    }

    fn count_posts_before(&self, cursor: Option<DateTime<Utc>>) -> Result<i64> {
        let Some(cursor) = cursor else {
            return self.count_posts();
        };
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE created_at < ?1",
            [format_ts(cursor)],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    fn posts_before(&self, cursor: Option<DateTime<Utc>>, limit: u32) -> Result<Vec<PostRow>> {
        let rows = match cursor {
            Some(cursor) => {
                let sql = format!(
                    "SELECT {POST_COLUMNS} FROM posts
                     WHERE created_at < ?1
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?2"
                );
                self.conn
                    .prepare_cached(&sql)?
                    .query_map(rusqlite::params![format_ts(cursor), limit], post_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let sql = format!(
                    "SELECT {POST_COLUMNS} FROM posts
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?1"
                );
                self.conn
                    .prepare_cached(&sql)?
                    .query_map([limit], post_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        Ok(rows)
    }
}

impl VoteRepository for SqliteRepo<'_> {
    fn find_vote(&self, user_id: i64, post_id: i64) -> Result<Option<VoteRow>> {
        let row = self
            .conn
            .prepare_cached("SELECT user_id, post_id, value FROM votes WHERE user_id = ?1 AND post_id = ?2")?
            .query_row([user_id, post_id], vote_from_row)
            .optional()?;
        Ok(row)
    }

    fn upsert_vote(&self, vote: &VoteRow) -> Result<()> {
        self.conn.execute(
            "INSERT INTO votes (user_id, post_id, value) VALUES (?1, ?2, ?3)
             ON CONFLICT (user_id, post_id) DO UPDATE SET value = excluded.value",
            [vote.user_id, vote.post_id, vote.value.value()],
        )?;
        Ok(())
    }
}
