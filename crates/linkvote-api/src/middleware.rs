use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use tracing::debug;

use crate::AppState;
use crate::error::ApiError;
use crate::session::{hash_token, session_token};

/// Who is making the request. Inserted by [`load_session`] for every route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: Option<i64>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    pub fn require_user(&self) -> Result<i64, ApiError> {
        self.user_id.ok_or(ApiError::Unauthenticated)
    }
}

/// Resolve the session cookie into a [`RequestContext`].
/// Unknown or expired sessions yield an anonymous context, not an error.
pub async fn load_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = match session_token(&jar) {
        Some(token) => {
            let token_hash = hash_token(token);
            let user_id =
                crate::with_db(&state, move |db| db.get_session_user(&token_hash, Utc::now())).await?;
            if user_id.is_none() {
                debug!("Ignoring unknown or expired session cookie");
            }
            RequestContext { user_id }
        }
        None => RequestContext::anonymous(),
    };

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}
