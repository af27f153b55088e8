use axum::{Extension, extract::State};
use tracing::debug;

use linkvote_types::VoteType;
use linkvote_types::api::{MutationResponse, PostResponse, VoteRequest};

use crate::error::ApiError;
use crate::extract::{Json, Path};
use crate::loaders::RequestLoaders;
use crate::middleware::RequestContext;
use crate::{AppState, with_db};

pub async fn vote(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(post_id): Path<i64>,
    Json(req): Json<VoteRequest>,
) -> Result<Json<MutationResponse<PostResponse>>, ApiError> {
    let user_id = ctx.require_user()?;
    let intent = VoteType::try_from(req.vote_type)
        .map_err(|_| ApiError::field("voteType", "Vote must be 1 or -1"))?;

    let post = with_db(&state, move |db| {
        let row = db.cast_vote(post_id, user_id, intent)?;
        let mut loaders = RequestLoaders::new(Some(user_id));
        loaders.prime_vote(post_id, intent);
        loaders.post(db, row)
    })
    .await?;

    debug!(post_id, user_id, points = post.points, "Vote applied");
    Ok(Json(MutationResponse::ok("Vote recorded", post)))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{TestApp, json_request};
    use axum::http::{Method, StatusCode};
    use serde_json::{Value, json};

    async fn cast(app: &TestApp, post_id: i64, value: i64, cookie: Option<&str>) -> (StatusCode, Value) {
        let (status, body, _) = app
            .send(json_request(
                Method::POST,
                &format!("/posts/{post_id}/vote"),
                Some(json!({ "voteType": value })),
                cookie,
            ))
            .await;
        (status, body)
    }

    #[tokio::test]
    async fn repeated_vote_counts_once_and_flip_moves_two() {
        let app = TestApp::new();
        let (_, _, alice) = app.register("alice").await;
        let (_, _, bob) = app.register("bob").await;
        let post_id = app.create_post(alice.as_deref(), "vote on me").await;

        let (status, body) = cast(&app, post_id, 1, bob.as_deref()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["points"], 1);
        assert_eq!(body["data"]["voteType"], 1);

        let (_, body) = cast(&app, post_id, 1, bob.as_deref()).await;
        assert_eq!(body["data"]["points"], 1);

        let (_, body) = cast(&app, post_id, -1, bob.as_deref()).await;
        assert_eq!(body["data"]["points"], -1);
        assert_eq!(body["data"]["voteType"], -1);

        let (_, body) = cast(&app, post_id, 1, alice.as_deref()).await;
        assert_eq!(body["data"]["points"], 0);

        // Each viewer sees their own vote
        let path = format!("/posts/{post_id}");
        let (_, seen_by_bob, _) = app.send(json_request(Method::GET, &path, None, bob.as_deref())).await;
        assert_eq!(seen_by_bob["voteType"], -1);
        let (_, seen_anonymously, _) = app.send(json_request(Method::GET, &path, None, None)).await;
        assert_eq!(seen_anonymously["voteType"], 0);
    }

    #[tokio::test]
    async fn voting_requires_a_session() {
        let app = TestApp::new();
        let (_, _, alice) = app.register("alice").await;
        let post_id = app.create_post(alice.as_deref(), "post").await;

        let (status, body) = cast(&app, post_id, 1, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthenticated");
    }

    #[tokio::test]
    async fn vote_value_must_be_plus_or_minus_one() {
        let app = TestApp::new();
        let (_, _, alice) = app.register("alice").await;
        let post_id = app.create_post(alice.as_deref(), "post").await;

        for bad in [0, 2, -5] {
            let (status, body) = cast(&app, post_id, bad, alice.as_deref()).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "value {bad}");
            assert_eq!(body["errors"][0]["field"], "voteType");
        }
    }

    #[tokio::test]
    async fn missing_vote_type_is_a_validation_error() {
        let app = TestApp::new();
        let (_, _, alice) = app.register("alice").await;
        let post_id = app.create_post(alice.as_deref(), "post").await;

        let (status, body, _) = app
            .send(json_request(
                Method::POST,
                &format!("/posts/{post_id}/vote"),
                Some(json!({})),
                alice.as_deref(),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");
        assert_eq!(body["errors"][0]["field"], "body");
    }

    #[tokio::test]
    async fn vote_on_missing_post_is_not_found() {
        let app = TestApp::new();
        let (_, _, alice) = app.register("alice").await;
        let (status, body) = cast(&app, 999, 1, alice.as_deref()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }
}
