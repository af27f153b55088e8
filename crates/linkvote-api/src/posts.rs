use axum::{Extension, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use linkvote_types::api::{
    CreatePostRequest, MutationResponse, PaginatedPosts, PostResponse, UpdatePostRequest,
};

use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::loaders::RequestLoaders;
use crate::middleware::RequestContext;
use crate::validation::validate_post;
use crate::{AppState, with_db};

#[derive(Debug, Deserialize)]
pub struct PostsQuery {
    /// Page size; defaults to 5 and is clamped to 10.
    pub limit: Option<u32>,
    /// `cursor` from the previous page: fetch posts created before it.
    pub cursor: Option<DateTime<Utc>>,
}

type PostEnvelope = Json<MutationResponse<PostResponse>>;

pub async fn list_posts(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<PostsQuery>,
) -> Result<Json<PaginatedPosts>, ApiError> {
    let page = with_db(&state, move |db| {
        let page = db.list_posts(query.limit, query.cursor)?;
        let posts = RequestLoaders::new(ctx.user_id).posts(db, page.posts)?;

        Ok(PaginatedPosts {
            total_count: page.total_count,
            cursor: page.cursor,
            has_more: page.has_more,
            posts,
        })
    })
    .await?;

    Ok(Json(page))
}

pub async fn get_post(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(post_id): Path<i64>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = with_db(&state, move |db| {
        db.get_post(post_id)?
            .map(|row| RequestLoaders::new(ctx.user_id).post(db, row))
            .transpose()
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("Post not found".into()))?;

    Ok(Json(post))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(req): Json<CreatePostRequest>,
) -> Result<(StatusCode, PostEnvelope), ApiError> {
    let user_id = ctx.require_user()?;
    validate_post(&req.title, &req.text)?;

    let post = with_db(&state, move |db| {
        let row = db.create_post(user_id, &req.title, &req.text, Utc::now())?;
        RequestLoaders::new(Some(user_id)).post(db, row)
    })
    .await?;

    info!(post_id = post.id, user_id, "Post created");
    Ok((
        StatusCode::CREATED,
        Json(MutationResponse::created("Post created successfully", post)),
    ))
}

pub async fn update_post(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(post_id): Path<i64>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<PostEnvelope, ApiError> {
    let user_id = ctx.require_user()?;
    validate_post(&req.title, &req.text)?;

    let post = with_db(&state, move |db| {
        let row = db.update_post(post_id, user_id, &req.title, &req.text, Utc::now())?;
        RequestLoaders::new(Some(user_id)).post(db, row)
    })
    .await?;

    Ok(Json(MutationResponse::ok("Post updated successfully", post)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(post_id): Path<i64>,
) -> Result<Json<MutationResponse<()>>, ApiError> {
    let user_id = ctx.require_user()?;

    with_db(&state, move |db| db.delete_post(post_id, user_id)).await?;

    info!(post_id, user_id, "Post deleted");
    Ok(Json(MutationResponse::done("Post deleted successfully")))
}
