//! Database row types. Distinct from the linkvote-types wire models to keep
//! the DB layer independent of the HTTP contract.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

use linkvote_types::VoteType;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostRow {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub points: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteRow {
    pub user_id: i64,
    pub post_id: i64,
    pub value: VoteType,
}

#[derive(Debug, Clone)]
pub struct ResetTokenRow {
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Fixed-width RFC 3339 with microseconds, so that lexical order on the
/// TEXT column matches chronological order.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Drop sub-microsecond precision so a value survives a round trip through
/// the database unchanged.
pub fn truncate_ts(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&format_ts(ts))
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(ts)
}

pub(crate) fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) const USER_COLUMNS: &str = "id, username, email, password, created_at, updated_at";

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        created_at: get_ts(row, 4)?,
        updated_at: get_ts(row, 5)?,
    })
}

pub(crate) const POST_COLUMNS: &str = "id, title, text, points, user_id, created_at, updated_at";

pub(crate) fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        text: row.get(2)?,
        points: row.get(3)?,
        user_id: row.get(4)?,
        created_at: get_ts(row, 5)?,
        updated_at: get_ts(row, 6)?,
    })
}

pub(crate) fn vote_from_row(row: &Row<'_>) -> rusqlite::Result<VoteRow> {
    let raw: i64 = row.get(2)?;
    let value = VoteType::try_from(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Integer, Box::new(e)))?;
    Ok(VoteRow {
        user_id: row.get(0)?,
        post_id: row.get(1)?,
        value,
    })
}
