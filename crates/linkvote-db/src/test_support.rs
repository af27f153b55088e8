use chrono::{DateTime, Duration, TimeZone, Utc};

use tempfile::TempDir;

use crate::Database;

/// File-backed database with the reader pool, removed when the dir drops.
pub fn on_disk() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("linkvote.db")).unwrap();
    (dir, db)
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn seed_user(db: &Database, username: &str) -> i64 {
    db.create_user(username, &format!("{username}@example.com"), "not-a-hash", t0())
        .unwrap()
        .id
}

/// A post created `offset_secs` after `t0`, so larger offsets are newer.
pub fn seed_post(db: &Database, author: i64, offset_secs: i64) -> i64 {
    let at = t0() + Duration::seconds(offset_secs);
    db.create_post(author, &format!("post {offset_secs}"), "body", at)
        .unwrap()
        .id
}
