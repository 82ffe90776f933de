use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::content::{NewPost, Pagination, PostUpdate};
use crate::db::models::{Page, Post, PostWithAuthor};
use crate::error::AppResult;
use crate::extractors::{AppJson, AppQuery, CurrentAuthor};
use crate::routes::parse_id;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/{id}",
            get(view_post).put(update_post).delete(delete_post),
        )
        .route("/posts/{id}/like", patch(like_post))
        .route("/posts/{id}/unlike", patch(unlike_post))
        .route("/posts/author/{id}", get(list_by_author))
}

async fn list_posts(
    State(state): State<AppState>,
    AppQuery(page): AppQuery<Pagination>,
) -> AppResult<Json<Page<PostWithAuthor>>> {
    Ok(Json(state.engagement.list_posts(page).await?))
}

async fn create_post(
    State(state): State<AppState>,
    author: CurrentAuthor,
    AppJson(req): AppJson<NewPost>,
) -> AppResult<(StatusCode, Json<Post>)> {
    let post = state.engagement.create_post(author.id(), req).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn view_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<PostWithAuthor>> {
    let id = parse_id(&id)?;
    Ok(Json(state.engagement.view_post(&id).await?))
}

// Any authenticated author may edit or delete any post.
async fn update_post(
    State(state): State<AppState>,
    _author: CurrentAuthor,
    Path(id): Path<String>,
    AppJson(update): AppJson<PostUpdate>,
) -> AppResult<Json<Post>> {
    let id = parse_id(&id)?;
    Ok(Json(state.engagement.update_post(&id, update).await?))
}

async fn delete_post(
    State(state): State<AppState>,
    _author: CurrentAuthor,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = parse_id(&id)?;
    state.engagement.delete_post(&id).await?;
    Ok(Json(json!({ "message": "Post deleted" })))
}

async fn like_post(
    State(state): State<AppState>,
    author: CurrentAuthor,
    Path(id): Path<String>,
) -> AppResult<Json<Post>> {
    let id = parse_id(&id)?;
    Ok(Json(state.engagement.like_post(&id, author.id()).await?))
}

async fn unlike_post(
    State(state): State<AppState>,
    author: CurrentAuthor,
    Path(id): Path<String>,
) -> AppResult<Json<Post>> {
    let id = parse_id(&id)?;
    Ok(Json(state.engagement.unlike_post(&id, author.id()).await?))
}

async fn list_by_author(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<PostWithAuthor>>> {
    let id = parse_id(&id)?;
    Ok(Json(state.engagement.list_by_author(&id).await?))
}
