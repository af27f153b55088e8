use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::models::{PostRow, ResetTokenRow, USER_COLUMNS, UserRow, format_ts, get_ts, user_from_row};
use crate::repository::{PostRepository, SqliteRepo};
use crate::{Database, DbError, Result};

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            let ts = format_ts(now);
            conn.execute(
                "INSERT INTO users (username, email, password, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                (username, email, password_hash, &ts),
            )?;
            let id = conn.last_insert_rowid();
            query_user(conn, "id = ?1", id)?.ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", username))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    /// First user holding either the username or the email, if any.
    pub fn find_user_by_username_or_email(&self, username: &str, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1 OR email = ?2 LIMIT 1");
            let row = conn
                .prepare(&sql)?
                .query_row([username, email], user_from_row)
                .optional()?;
            Ok(row)
        })
    }

    /// Batch-fetch users for a set of ids.
    pub fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<UserRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(ids), user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Posts --

    pub fn create_post(&self, user_id: i64, title: &str, text: &str, now: DateTime<Utc>) -> Result<PostRow> {
        self.with_conn_mut(|conn| {
            let ts = format_ts(now);
            conn.execute(
                "INSERT INTO posts (title, text, points, user_id, created_at, updated_at)
                 VALUES (?1, ?2, 0, ?3, ?4, ?4)",
                rusqlite::params![title, text, user_id, ts],
            )?;
            let id = conn.last_insert_rowid();
            SqliteRepo::new(conn)
                .find_post(id)?
                .ok_or(DbError::PostNotFound(id))
        })
    }

    pub fn get_post(&self, id: i64) -> Result<Option<PostRow>> {
        self.with_conn(|conn| SqliteRepo::new(conn).find_post(id))
    }

    /// Update title and text. Fails with `PostNotFound` or `NotAuthor`.
    pub fn update_post(
        &self,
        id: i64,
        user_id: i64,
        title: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<PostRow> {
        self.with_transaction(|tx| {
            let repo = SqliteRepo::new(tx);
            let mut post = owned_post(&repo, id, user_id)?;
            post.title = title.to_string();
            post.text = text.to_string();
            post.updated_at = now;
            repo.save_post(&post)?;
            Ok(post)
        })
    }

    /// Delete a post and its votes. Fails with `PostNotFound` or `NotAuthor`.
    pub fn delete_post(&self, id: i64, user_id: i64) -> Result<()> {
        self.with_transaction(|tx| {
            let repo = SqliteRepo::new(tx);
            owned_post(&repo, id, user_id)?;
            repo.delete_post(id)?;
            Ok(())
        })
    }

    // -- Sessions --

    /// Store a session and sweep out any that have expired.
    pub fn create_session(
        &self,
        token_hash: &str,
        user_id: i64,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [format_ts(now)])?;
            conn.execute(
                "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![token_hash, user_id, format_ts(now), format_ts(expires_at)],
            )?;
            Ok(())
        })
    }

    /// User bound to an unexpired session.
    pub fn get_session_user(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let user_id = conn
                .query_row(
                    "SELECT user_id FROM sessions WHERE token_hash = ?1 AND expires_at > ?2",
                    rusqlite::params![token_hash, format_ts(now)],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(user_id)
        })
    }

    pub fn delete_session(&self, token_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute("DELETE FROM sessions WHERE token_hash = ?1", [token_hash])?;
            Ok(removed > 0)
        })
    }

    // -- Password reset --

    /// Replace any outstanding reset token for the user.
    pub fn replace_reset_token(&self, user_id: i64, token_hash: &str, expires_at: DateTime<Utc>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO password_reset_tokens (user_id, token_hash, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (user_id) DO UPDATE SET token_hash = excluded.token_hash, expires_at = excluded.expires_at",
                rusqlite::params![user_id, token_hash, format_ts(expires_at)],
            )?;
            Ok(())
        })
    }

    pub fn get_reset_token(&self, user_id: i64) -> Result<Option<ResetTokenRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT user_id, token_hash, expires_at FROM password_reset_tokens WHERE user_id = ?1",
                    [user_id],
                    |row| {
                        Ok(ResetTokenRow {
                            user_id: row.get(0)?,
                            token_hash: row.get(1)?,
                            expires_at: get_ts(row, 2)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Consume the reset token `token_hash`, set a new password hash and end
    /// every existing session of the user, atomically. Fails with
    /// [`DbError::ResetTokenSpent`] when the token is no longer outstanding.
    pub fn reset_password(
        &self,
        user_id: i64,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_transaction(|tx| {
            let consumed = tx.execute(
                "DELETE FROM password_reset_tokens WHERE user_id = ?1 AND token_hash = ?2",
                rusqlite::params![user_id, token_hash],
            )?;
            if consumed == 0 {
                return Err(DbError::ResetTokenSpent(user_id));
            }
            tx.execute(
                "UPDATE users SET password = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![password_hash, format_ts(now), user_id],
            )?;
            tx.execute("DELETE FROM sessions WHERE user_id = ?1", [user_id])?;
            Ok(())
        })
    }
}

fn owned_post<R: PostRepository>(repo: &R, id: i64, user_id: i64) -> Result<PostRow> {
    let post = repo.find_post(id)?.ok_or(DbError::PostNotFound(id))?;
    if post.user_id != user_id {
        return Err(DbError::NotAuthor { post_id: id, user_id });
    }
    Ok(post)
}

fn query_user<P: rusqlite::ToSql>(conn: &Connection, filter: &str, value: P) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {filter}");
    let row = conn
        .prepare_cached(&sql)?
        .query_row([value], user_from_row)
        .optional()?;
    Ok(row)
}
