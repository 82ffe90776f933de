//! Author accounts: registration, login and self-service profile changes.

pub mod repository;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::password::{PasswordError, PasswordHasher, MIN_PASSWORD_LEN};
use crate::auth::token::TokenIssuer;
use crate::db::{self, models::Author};
use crate::error::{AppError, AppResult};

pub use repository::{AuthorChanges, AuthorRepository, DynAuthorRepository, SqliteAuthorRepository};

#[derive(Debug, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub author_id: String,
}

/// The fields an author may change about themselves. Anything else in the
/// request body is rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

#[derive(Clone)]
pub struct CredentialStore {
    repo: DynAuthorRepository,
    hasher: PasswordHasher,
    tokens: Arc<TokenIssuer>,
}

impl CredentialStore {
    pub fn new(repo: DynAuthorRepository, hasher: PasswordHasher, tokens: Arc<TokenIssuer>) -> Self {
        Self {
            repo,
            hasher,
            tokens,
        }
    }

    pub async fn register(&self, req: Registration) -> AppResult<Author> {
        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("name is required".into()));
        }
        let email = normalize_email(&req.email)?;
        check_password(&req.password)?;

        // Friendly early answer; the unique index still decides races.
        if self.repo.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("email already registered".into()));
        }

        let now = db::now();
        let author = Author {
            id: db::new_id(),
            name,
            email,
            password_hash: self.hasher.hash_blocking(&req.password).await?,
            phone: req.phone.filter(|p| !p.trim().is_empty()),
            avatar_url: None,
            bio: String::new(),
            created_at: now,
            updated_at: now,
        };

        self.repo.insert(&author).await?;
        tracing::info!(author_id = %author.id, "Registered author");
        Ok(author)
    }

    /// Unknown email, wrong password and an unreadable stored hash all give
    /// the same `Unauthenticated`, so callers cannot tell which accounts exist.
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<String> {
        let email = email.trim().to_lowercase();
        let Some(author) = self.repo.find_by_email(&email).await? else {
            return Err(AppError::Unauthenticated);
        };

        match self.hasher.verify_blocking(password, &author.password_hash).await {
            Ok(true) => Ok(author.id),
            Ok(false) => Err(AppError::Unauthenticated),
            Err(PasswordError::MalformedDigest) => {
                tracing::error!(author_id = %author.id, "Stored password digest is malformed");
                Err(AppError::Unauthenticated)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn login(&self, creds: Credentials) -> AppResult<LoginResponse> {
        let author_id = self.authenticate(&creds.email, &creds.password).await?;
        let token = self.tokens.issue(&author_id)?;
        Ok(LoginResponse { token, author_id })
    }

    pub async fn get(&self, id: &str) -> AppResult<Author> {
        self.repo.find_by_id(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn update(&self, id: &str, update: AuthorUpdate) -> AppResult<Author> {
        let name = match update.name {
            Some(n) if n.trim().is_empty() => {
                return Err(AppError::Validation("name cannot be empty".into()))
            }
            other => other.map(|n| n.trim().to_string()),
        };
        let email = update.email.as_deref().map(normalize_email).transpose()?;
        let password_hash = match update.password.as_deref() {
            Some(pw) => {
                check_password(pw)?;
                Some(self.hasher.hash_blocking(pw).await?)
            }
            None => None,
        };

        let changes = AuthorChanges {
            name,
            email,
            phone: update.phone,
            password_hash,
            avatar_url: update.avatar_url,
            bio: update.bio,
        };

        self.repo
            .update(id, &changes, db::now())
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn delete(&self, id: &str) -> AppResult<()> {
        if self.repo.delete(id).await? {
            tracing::info!(author_id = %id, "Deleted author");
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }
}

fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid || email.contains(char::is_whitespace) {
        return Err(AppError::Validation("a valid email is required".into()));
    }
    Ok(email)
}

fn check_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}
