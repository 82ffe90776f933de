use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::accounts::{AuthorUpdate, Credentials, LoginResponse, Registration};
use crate::auth::require_bearer;
use crate::db::models::PrivateAuthor;
use crate::error::AppResult;
use crate::extractors::{AppJson, CurrentAuthor};
use crate::routes::parse_id;
use crate::state::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route(
            "/authors/{id}",
            get(get_author).put(update_author).delete(delete_author),
        )
        .route_layer(middleware::from_fn_with_state(state, require_bearer));

    Router::new()
        .route("/authors/register", post(register))
        .route("/authors/login", post(login))
        .merge(protected)
}

async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<Registration>,
) -> AppResult<(StatusCode, Json<PrivateAuthor>)> {
    let author = state.accounts.register(req).await?;
    Ok((StatusCode::CREATED, Json(author.private_view())))
}

async fn login(
    State(state): State<AppState>,
    AppJson(creds): AppJson<Credentials>,
) -> AppResult<Json<LoginResponse>> {
    Ok(Json(state.accounts.login(creds).await?))
}

/// The owner sees email and phone; everyone else gets the public view.
async fn get_author(
    State(state): State<AppState>,
    current: CurrentAuthor,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = parse_id(&id)?;
    let author = state.accounts.get(&id).await?;

    if current.id() == author.id {
        Ok(Json(author.private_view()).into_response())
    } else {
        Ok(Json(author.public_view()).into_response())
    }
}

async fn update_author(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(update): AppJson<AuthorUpdate>,
) -> AppResult<Json<PrivateAuthor>> {
    let id = parse_id(&id)?;
    let author = state.accounts.update(&id, update).await?;
    Ok(Json(author.private_view()))
}

async fn delete_author(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = parse_id(&id)?;
    state.accounts.delete(&id).await?;
    Ok(Json(json!({ "message": "Author deleted" })).into_response())
}
