// Repository pattern - isolates all author table side effects
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;

use crate::db::models::Author;
use crate::db::{format_timestamp, is_unique_violation, parse_timestamp};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

/// Field-level changes to an author, already validated and with any new
/// password already hashed. `None` leaves the column untouched.
#[derive(Debug, Default, Clone)]
pub struct AuthorChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

#[async_trait]
pub trait AuthorRepository: Send + Sync {
    /// Insert a new author. A taken email is `AppError::Conflict`.
    async fn insert(&self, author: &Author) -> AppResult<()>;

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Author>>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Author>>;

    /// Apply `changes` in one statement and return the new row, or `None`
    /// when no author has that id.
    async fn update(
        &self,
        id: &str,
        changes: &AuthorChanges,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Author>>;

    /// Returns whether a row was deleted.
    async fn delete(&self, id: &str) -> AppResult<bool>;
}

pub struct SqliteAuthorRepository {
    pool: DbPool,
}

impl SqliteAuthorRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const AUTHOR_COLUMNS: &str =
    "id, name, email, password_hash, phone, avatar_url, bio, created_at, updated_at";

fn author_from_row(row: &Row<'_>) -> rusqlite::Result<Author> {
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;
    Ok(Author {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        phone: row.get(4)?,
        avatar_url: row.get(5)?,
        bio: row.get(6)?,
        created_at: parse_timestamp(7, &created_at)?,
        updated_at: parse_timestamp(8, &updated_at)?,
    })
}

fn email_taken(err: rusqlite::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict("email already registered".into())
    } else {
        err.into()
    }
}

#[async_trait]
impl AuthorRepository for SqliteAuthorRepository {
    async fn insert(&self, author: &Author) -> AppResult<()> {
        let conn = self.pool.get()?;

        conn.execute(
            "INSERT INTO authors (id, name, email, password_hash, phone, avatar_url, bio, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                author.id,
                author.name,
                author.email,
                author.password_hash,
                author.phone,
                author.avatar_url,
                author.bio,
                format_timestamp(&author.created_at),
                format_timestamp(&author.updated_at),
            ],
        )
        .map_err(email_taken)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Author>> {
        let conn = self.pool.get()?;
        let author = conn
            .query_row(
                &format!("SELECT {AUTHOR_COLUMNS} FROM authors WHERE id = ?1"),
                params![id],
                author_from_row,
            )
            .optional()?;
        Ok(author)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Author>> {
        let conn = self.pool.get()?;
        let author = conn
            .query_row(
                &format!("SELECT {AUTHOR_COLUMNS} FROM authors WHERE email = ?1"),
                params![email],
                author_from_row,
            )
            .optional()?;
        Ok(author)
    }

    async fn update(
        &self,
        id: &str,
        changes: &AuthorChanges,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Author>> {
        let conn = self.pool.get()?;

        let rows = conn
            .execute(
                "UPDATE authors SET
                   name = COALESCE(?2, name),
                   email = COALESCE(?3, email),
                   phone = COALESCE(?4, phone),
                   password_hash = COALESCE(?5, password_hash),
                   avatar_url = COALESCE(?6, avatar_url),
                   bio = COALESCE(?7, bio),
                   updated_at = ?8
                 WHERE id = ?1",
                params![
                    id,
                    changes.name,
                    changes.email,
                    changes.phone,
                    changes.password_hash,
                    changes.avatar_url,
                    changes.bio,
                    format_timestamp(&now),
                ],
            )
            .map_err(email_taken)?;

        if rows == 0 {
            return Ok(None);
        }

        let author = conn
            .query_row(
                &format!("SELECT {AUTHOR_COLUMNS} FROM authors WHERE id = ?1"),
                params![id],
                author_from_row,
            )
            .optional()?;
        Ok(author)
    }

    async fn delete(&self, id: &str) -> AppResult<bool> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM authors WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynAuthorRepository = Arc<dyn AuthorRepository>;
