use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::content::NewShare;
use crate::db::models::Share;
use crate::error::AppResult;
use crate::extractors::AppJson;
use crate::routes::parse_id;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/shares", post(create_share))
        .route("/shares/{id}", get(list_shares))
}

async fn create_share(
    State(state): State<AppState>,
    AppJson(mut req): AppJson<NewShare>,
) -> AppResult<(StatusCode, Json<Share>)> {
    req.post_id = parse_id(req.post_id.trim())?;
    let share = state.engagement.create_share(req).await?;
    Ok((StatusCode::CREATED, Json(share)))
}

async fn list_shares(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Json<Vec<Share>>> {
    let post_id = parse_id(&post_id)?;
    Ok(Json(state.engagement.list_shares(&post_id).await?))
}
