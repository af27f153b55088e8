//! Request-scoped batch loading for post responses.
//!
//! A page of posts needs every author and the viewer's vote on each post.
//! Loaders collect the ids, fetch each distinct id once with a single
//! `IN (...)` query, and cache the answer for the rest of the request only.

use std::collections::{HashMap, HashSet};

use linkvote_db::models::{PostRow, UserRow};
use linkvote_db::{Database, Result};
use linkvote_types::VoteType;
use linkvote_types::api::{AuthorResponse, PostResponse};

const SNIPPET_CHARS: usize = 50;

pub struct RequestLoaders {
    viewer: Option<i64>,
    users: HashMap<i64, Option<UserRow>>,
    votes: HashMap<i64, Option<VoteType>>,
    batches: usize,
}

impl RequestLoaders {
    pub fn new(viewer: Option<i64>) -> Self {
        Self {
            viewer,
            users: HashMap::new(),
            votes: HashMap::new(),
            batches: 0,
        }
    }

    /// Fetch every not-yet-cached user in `ids` in one query.
    pub fn load_users(&mut self, db: &Database, ids: impl IntoIterator<Item = i64>) -> Result<()> {
        let missing: Vec<i64> = ids
            .into_iter()
            .filter(|id| !self.users.contains_key(id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let found = db.get_users_by_ids(&missing)?;
        self.batches += 1;

        for id in missing {
            self.users.insert(id, None);
        }
        for user in found {
            self.users.insert(user.id, Some(user));
        }
        Ok(())
    }

    /// Fetch the viewer's votes on every not-yet-cached post in one query.
    /// Anonymous viewers have no votes and cause no query.
    pub fn load_votes(&mut self, db: &Database, post_ids: impl IntoIterator<Item = i64>) -> Result<()> {
        let Some(viewer) = self.viewer else {
            return Ok(());
        };

        let missing: Vec<i64> = post_ids
            .into_iter()
            .filter(|id| !self.votes.contains_key(id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let found = db.get_votes_for_posts(viewer, &missing)?;
        self.batches += 1;

        for id in missing {
            self.votes.insert(id, None);
        }
        for vote in found {
            self.votes.insert(vote.post_id, Some(vote.value));
        }
        Ok(())
    }

    /// Load authors and viewer votes for `posts`, then build their responses.
    pub fn posts(&mut self, db: &Database, posts: Vec<PostRow>) -> Result<Vec<PostResponse>> {
        self.load_users(db, posts.iter().map(|p| p.user_id))?;
        self.load_votes(db, posts.iter().map(|p| p.id))?;
        Ok(posts.into_iter().map(|p| self.post_response(p)).collect())
    }

    pub fn post(&mut self, db: &Database, post: PostRow) -> Result<PostResponse> {
        self.load_users(db, [post.user_id])?;
        self.load_votes(db, [post.id])?;
        Ok(self.post_response(post))
    }

    /// Record a vote the request itself just cast, so no lookup is needed.
    pub fn prime_vote(&mut self, post_id: i64, vote: VoteType) {
        self.votes.insert(post_id, Some(vote));
    }

    fn post_response(&self, row: PostRow) -> PostResponse {
        let author = self
            .users
            .get(&row.user_id)
            .and_then(Option::as_ref)
            .map(|u| AuthorResponse {
                id: u.id,
                username: u.username.clone(),
            });
        let vote_type = self
            .votes
            .get(&row.id)
            .copied()
            .flatten()
            .map_or(0, VoteType::value);

        PostResponse {
            id: row.id,
            text_snippet: row.text.chars().take(SNIPPET_CHARS).collect(),
            title: row.title,
            text: row.text,
            points: row.points,
            user_id: row.user_id,
            author,
            vote_type,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
