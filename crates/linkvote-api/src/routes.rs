use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::middleware::load_session;
use crate::{AppState, auth, posts, votes};

/// Every API route, with the session resolved before each handler runs.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/change-password", post(auth::change_password))
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route(
            "/posts/{post_id}",
            get(posts::get_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/posts/{post_id}/vote", post(votes::vote))
        .layer(middleware::from_fn_with_state(state.clone(), load_session))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use crate::test_support::{TestApp, json_request};
    use axum::http::{Method, StatusCode};

    #[tokio::test]
    async fn health_is_ok() {
        let app = TestApp::new();
        let (status, _, _) = app.send(json_request(Method::GET, "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_session_cookie_is_anonymous() {
        let app = TestApp::new();
        let (status, me, _) = app
            .send(json_request(Method::GET, "/auth/me", None, Some("linkvote_sid=forged")))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(me.is_null());
    }
}
