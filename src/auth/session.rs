use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::auth::token::TokenIssuer;
use crate::error::AppError;
use crate::state::AppState;

/// Identity attached to a request once its bearer token has validated.
/// Nothing here checks that the author still exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedAuthor {
    pub id: String,
}

/// Pull the token out of an `Authorization` value of the exact form
/// `Bearer <token>`.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let token = header?.strip_prefix("Bearer ")?;
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }
    Some(token)
}

/// Resolve an `Authorization` header to an author. A header that is not a
/// well-formed bearer credential never reaches the token validator.
pub fn authenticate(
    header: Option<&str>,
    tokens: &TokenIssuer,
) -> Result<AuthenticatedAuthor, AppError> {
    let token = bearer_token(header).ok_or(AppError::Unauthenticated)?;
    let id = tokens
        .validate(token)
        .map_err(|_| AppError::Unauthenticated)?;
    Ok(AuthenticatedAuthor { id })
}

/// Middleware for routers where every route needs a bearer token.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let author = authenticate(header, &state.tokens)?;
    tracing::debug!(author_id = %author.id, "Bearer token accepted");

    req.extensions_mut().insert(author);
    Ok(next.run(req).await)
}
