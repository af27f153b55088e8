use chrono::{DateTime, Utc};

use crate::models::PostRow;
use crate::repository::{PostRepository, SqliteRepo};
use crate::{Database, Result};

pub const DEFAULT_PAGE_SIZE: u32 = 5;
pub const MAX_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone)]
pub struct FeedPage {
    pub posts: Vec<PostRow>,
    pub total_count: i64,
    /// created_at of the last post on this page; pass it back to continue.
    pub cursor: Option<DateTime<Utc>>,
    pub has_more: bool,
}

/// Requested page sizes are clamped into `1..=MAX_PAGE_SIZE`, never rejected.
pub fn clamp_limit(requested: Option<u32>) -> u32 {
    requested.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

/// One newest-first page of posts strictly older than `cursor`.
///
/// `has_more` compares the page length with the number of posts older than
/// the incoming `cursor`. The returned cursor is the last post's created_at,
/// so posts sharing that exact microsecond but cut off by `limit` count
/// towards `has_more` yet are skipped by the next page.
pub fn list_posts<R>(repo: &R, limit: Option<u32>, cursor: Option<DateTime<Utc>>) -> Result<FeedPage>
where
    R: PostRepository + ?Sized,
{
    let limit = clamp_limit(limit);

    let posts = repo.posts_before(cursor, limit)?;
    let total_count = repo.count_posts()?;
    let remaining = repo.count_posts_before(cursor)?;

    let has_more = remaining > posts.len() as i64;
    let cursor = posts.last().map(|p| p.created_at);

    Ok(FeedPage {
        posts,
        total_count,
        cursor,
        has_more,
    })
}

impl Database {
    pub fn list_posts(&self, limit: Option<u32>, cursor: Option<DateTime<Utc>>) -> Result<FeedPage> {
        self.with_conn(|conn| {
            // One read snapshot for the page and both counts
            let tx = conn.unchecked_transaction()?;
            let page = list_posts(&SqliteRepo::new(&tx), limit, cursor)?;
            tx.commit()?;
            Ok(page)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{on_disk, seed_post, seed_user};

    fn seeded(n: i64) -> (Database, Vec<i64>) {
        let db = Database::open_in_memory().unwrap();
        let author = seed_user(&db, "author");
        let ids = (0..n).map(|i| seed_post(&db, author, i)).collect();
        (db, ids)
    }

    #[test]
    fn first_page_is_newest_first() {
        let (db, ids) = seeded(10);

        let page = db.list_posts(Some(3), None).unwrap();
        let got: Vec<i64> = page.posts.iter().map(|p| p.id).collect();
        assert_eq!(got, vec![ids[9], ids[8], ids[7]]);
        assert_eq!(page.total_count, 10);
        assert!(page.has_more);
        assert_eq!(page.cursor, Some(page.posts[2].created_at));
    }

    #[test]
    fn cursor_continues_with_strictly_older_posts() {
        let (db, ids) = seeded(10);

        let first = db.list_posts(Some(3), None).unwrap();
        let second = db.list_posts(Some(3), first.cursor).unwrap();
        let got: Vec<i64> = second.posts.iter().map(|p| p.id).collect();
        assert_eq!(got, vec![ids[6], ids[5], ids[4]]);
        assert!(second.has_more);

        let fourth_newest = db.get_post(ids[6]).unwrap().unwrap();
        let from_fourth = db.list_posts(Some(3), Some(fourth_newest.created_at)).unwrap();
        assert_eq!(from_fourth.posts[0].id, ids[5]);
    }

    #[test]
    fn last_page_reports_no_more() {
        let (db, _) = seeded(7);

        let first = db.list_posts(Some(5), None).unwrap();
        assert!(first.has_more);
        let last = db.list_posts(Some(5), first.cursor).unwrap();
        assert_eq!(last.posts.len(), 2);
        assert!(!last.has_more);
    }

    #[test]
    fn exact_fit_page_reports_no_more() {
        let (db, _) = seeded(5);
        let page = db.list_posts(None, None).unwrap();
        assert_eq!(page.posts.len(), 5);
        assert!(!page.has_more);
    }

    #[test]
    fn oversized_limit_is_clamped() {
        let (db, _) = seeded(15);
        let page = db.list_posts(Some(20), None).unwrap();
        assert_eq!(page.posts.len(), MAX_PAGE_SIZE as usize);
        assert!(page.has_more);

        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(None), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn empty_feed_is_not_an_error() {
        let db = Database::open_in_memory().unwrap();
        let page = db.list_posts(None, None).unwrap();
        assert!(page.posts.is_empty());
        assert!(!page.has_more);
        assert_eq!(page.cursor, None);
        assert_eq!(page.total_count, 0);
    }

    #[test]
    fn pages_read_through_the_reader_pool() {
        let (_dir, db) = on_disk();
        let author = seed_user(&db, "author");
        let ids: Vec<i64> = (0..4).map(|i| seed_post(&db, author, i)).collect();

        let first = db.list_posts(Some(3), None).unwrap();
        let got: Vec<i64> = first.posts.iter().map(|p| p.id).collect();
        assert_eq!(got, vec![ids[3], ids[2], ids[1]]);
        assert!(first.has_more);
        assert_eq!(first.total_count, 4);

        let last = db.list_posts(Some(3), first.cursor).unwrap();
        assert_eq!(last.posts.len(), 1);
        assert_eq!(last.posts[0].id, ids[0]);
        assert!(!last.has_more);
    }

    #[test]
    fn posts_tied_with_the_cursor_are_skipped_by_the_next_page() {
        let db = Database::open_in_memory().unwrap();
        let author = seed_user(&db, "author");
        let older = seed_post(&db, author, 0);
        let tied: Vec<i64> = (0..3).map(|_| seed_post(&db, author, 5)).collect();

        let first = db.list_posts(Some(2), None).unwrap();
        let got: Vec<i64> = first.posts.iter().map(|p| p.id).collect();
        assert_eq!(got, vec![tied[2], tied[1]]);
        assert!(first.has_more);

        let next = db.list_posts(Some(2), first.cursor).unwrap();
        let got: Vec<i64> = next.posts.iter().map(|p| p.id).collect();
        assert_eq!(got, vec![older]);
        assert!(!next.has_more);
    }

    #[test]
    fn cursor_older_than_everything_yields_empty_page() {
        let (db, ids) = seeded(3);
        let oldest = db.get_post(ids[0]).unwrap().unwrap();

        let page = db.list_posts(Some(3), Some(oldest.created_at)).unwrap();
        assert!(page.posts.is_empty());
        assert!(!page.has_more);
        assert_eq!(page.total_count, 3);
    }
}
