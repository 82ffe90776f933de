use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::content::{NewComment, Pagination};
use crate::db::models::{Comment, Page};
use crate::error::AppResult;
use crate::extractors::{AppJson, AppQuery, CurrentAuthor};
use crate::routes::parse_id;
use crate::state::AppState;

#[derive(Deserialize)]
struct LikeCommentRequest {
    #[serde(default)]
    username: String,
}

pub fn router() -> Router<AppState> {
    // GET lists by post id, DELETE removes by comment id; both share the
    // `{id}` segment.
    Router::new()
        .route("/comments", post(create_comment))
        .route("/comments/{id}", get(list_comments).delete(delete_comment))
        .route("/comments/{id}/like", post(like_comment))
}

async fn create_comment(
    State(state): State<AppState>,
    AppJson(mut req): AppJson<NewComment>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    req.post_id = parse_id(req.post_id.trim())?;
    let comment = state.engagement.create_comment(req).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    AppQuery(page): AppQuery<Pagination>,
) -> AppResult<Json<Page<Comment>>> {
    let post_id = parse_id(&post_id)?;
    Ok(Json(state.engagement.list_comments(&post_id, page).await?))
}

async fn like_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<LikeCommentRequest>,
) -> AppResult<Json<Comment>> {
    let id = parse_id(&id)?;
    Ok(Json(state.engagement.like_comment(&id, &req.username).await?))
}

async fn delete_comment(
    State(state): State<AppState>,
    _author: CurrentAuthor,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = parse_id(&id)?;
    state.engagement.delete_comment(&id).await?;
    Ok(Json(json!({ "message": "Comment deleted" })))
}
