use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::header;
use axum::http::request::Parts;
use axum::Json;

use crate::auth::{authenticate, AuthenticatedAuthor};
use crate::error::AppError;
use crate::state::AppState;

/// The author a request's bearer token names.
/// Returns 401 if the token is missing or invalid.
#[derive(Debug, Clone)]
pub struct CurrentAuthor(pub AuthenticatedAuthor);

impl CurrentAuthor {
    pub fn id(&self) -> &str {
        &self.0.id
    }
}

impl FromRequestParts<AppState> for CurrentAuthor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Already resolved by `require_bearer`
        if let Some(author) = parts.extensions.get::<AuthenticatedAuthor>() {
            return Ok(CurrentAuthor(author.clone()));
        }

        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());
        let author = authenticate(header, &state.tokens)?;

        parts.extensions.insert(author.clone());
        Ok(CurrentAuthor(author))
    }
}

/// `Json` whose rejection is an `AppError::Validation`, so a bad body gets
/// the same `{"error": ..}` response as every other failure.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(AppError::Validation(rejection.body_text())),
        }
    }
}

/// `Query` with the same rejection mapping as [`AppJson`].
pub struct AppQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(AppQuery(value)),
            Err(rejection) => Err(AppError::Validation(rejection.body_text())),
        }
    }
}
