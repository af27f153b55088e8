use rusqlite::ErrorCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("post {0} not found")]
    PostNotFound(i64),

    #[error("user {user_id} is not the author of post {post_id}")]
    NotAuthor { post_id: i64, user_id: i64 },

    #[error("no outstanding password reset token for user {0}")]
    ResetTokenSpent(i64),

    #[error("write conflict persisted after {0} attempts")]
    Conflict(u32),

    #[error("{0} connection lock poisoned")]
    LockPoisoned(&'static str),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl DbError {
    /// True when SQLite refused the write because another connection holds
    /// the lock. These are safe to retry.
    pub fn is_busy(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => {
                matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            }
            _ => false,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => {
                e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(code: std::ffi::c_int) -> DbError {
        DbError::Sqlite(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(code),
            None,
        ))
    }

    #[test]
    fn busy_and_locked_are_retryable() {
        assert!(failure(rusqlite::ffi::SQLITE_BUSY).is_busy());
        assert!(failure(rusqlite::ffi::SQLITE_LOCKED).is_busy());
        assert!(!failure(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE).is_busy());
        assert!(!DbError::PostNotFound(1).is_busy());
    }

    #[test]
    fn unique_violation_is_detected_from_extended_code() {
        assert!(failure(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE).is_unique_violation());
        assert!(!failure(rusqlite::ffi::SQLITE_BUSY).is_unique_violation());
    }
}
