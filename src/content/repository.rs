// Repository pattern - isolates all post/comment/share table side effects
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::sync::Arc;

use crate::db::models::{Comment, Post, Share};
use crate::db::{format_timestamp, parse_timestamp};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

/// Field-level changes to a post. `None` leaves the column untouched.
#[derive(Debug, Default, Clone)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    /// `Some(None)` removes the image.
    pub image_url: Option<Option<String>>,
    pub category: Option<String>,
}

#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn insert_post(&self, post: &Post) -> AppResult<()>;

    async fn find_post(&self, id: &str) -> AppResult<Option<Post>>;

    /// Apply `changes` in one statement and return the new row, or `None`
    /// when no post has that id.
    async fn update_post(
        &self,
        id: &str,
        changes: &PostChanges,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Post>>;

    async fn delete_post(&self, id: &str) -> AppResult<bool>;

    /// Newest first.
    async fn list_posts(&self, limit: u32, offset: u32) -> AppResult<Vec<Post>>;

    /// Newest first, unbounded.
    async fn list_posts_by_author(&self, author_id: &str) -> AppResult<Vec<Post>>;

    /// Atomic `readers + 1`. Missing posts are silently skipped.
    async fn increment_readers(&self, id: &str) -> AppResult<()>;

    /// Set-insert `author_id` into the post's likes. `NotFound` if the post
    /// does not exist.
    async fn add_post_like(&self, post_id: &str, author_id: &str, now: DateTime<Utc>)
        -> AppResult<()>;

    /// Set-remove `author_id` from the post's likes. `NotFound` if the post
    /// does not exist.
    async fn remove_post_like(&self, post_id: &str, author_id: &str) -> AppResult<()>;

    async fn insert_comment(&self, comment: &Comment) -> AppResult<()>;

    /// Newest first.
    async fn list_comments(&self, post_id: &str, limit: u32, offset: u32)
        -> AppResult<Vec<Comment>>;

    /// Record one like by `username`. `AlreadyLiked` if that name is
    /// already in the list, `NotFound` if the comment does not exist.
    async fn like_comment(
        &self,
        comment_id: &str,
        username: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Comment>;

    async fn delete_comment(&self, id: &str) -> AppResult<bool>;

    async fn insert_share(&self, share: &Share) -> AppResult<()>;

    /// Oldest first.
    async fn list_shares(&self, post_id: &str) -> AppResult<Vec<Share>>;
}

pub struct SqliteContentRepository {
    pool: DbPool,
}

impl SqliteContentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const POST_COLUMNS: &str =
    "id, author_id, title, content, image_url, category, readers, created_at, updated_at";

const COMMENT_COLUMNS: &str = "id, post_id, username, content, likes, created_at";

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;
    Ok(Post {
        id: row.get(0)?,
        author_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        image_url: row.get(4)?,
        category: row.get(5)?,
        readers: row.get(6)?,
        likes: Vec::new(),
        created_at: parse_timestamp(7, &created_at)?,
        updated_at: parse_timestamp(8, &updated_at)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    let created_at: String = row.get(5)?;
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        username: row.get(2)?,
        content: row.get(3)?,
        likes: row.get(4)?,
        liked_by: Vec::new(),
        created_at: parse_timestamp(5, &created_at)?,
    })
}

fn share_from_row(row: &Row<'_>) -> rusqlite::Result<Share> {
    let created_at: String = row.get(3)?;
    Ok(Share {
        id: row.get(0)?,
        post_id: row.get(1)?,
        platform: row.get(2)?,
        created_at: parse_timestamp(3, &created_at)?,
    })
}

fn load_post_likes(conn: &Connection, post_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt =
        conn.prepare_cached("SELECT author_id FROM post_likes WHERE post_id = ?1 ORDER BY rowid")?;
    let likes = stmt
        .query_map(params![post_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(likes)
}

fn load_comment_likes(conn: &Connection, comment_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT username FROM comment_likes WHERE comment_id = ?1 ORDER BY rowid",
    )?;
    let names = stmt
        .query_map(params![comment_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}

fn fetch_post(conn: &Connection, id: &str) -> rusqlite::Result<Option<Post>> {
    let post = conn
        .query_row(
            &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
            params![id],
            post_from_row,
        )
        .optional()?;

    match post {
        Some(mut post) => {
            post.likes = load_post_likes(conn, &post.id)?;
            Ok(Some(post))
        }
        None => Ok(None),
    }
}

fn fetch_comment(conn: &Connection, id: &str) -> rusqlite::Result<Option<Comment>> {
    let comment = conn
        .query_row(
            &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1"),
            params![id],
            comment_from_row,
        )
        .optional()?;

    match comment {
        Some(mut comment) => {
            comment.liked_by = load_comment_likes(conn, &comment.id)?;
            Ok(Some(comment))
        }
        None => Ok(None),
    }
}

fn post_exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
}

fn with_likes(conn: &Connection, mut posts: Vec<Post>) -> rusqlite::Result<Vec<Post>> {
    for post in &mut posts {
        post.likes = load_post_likes(conn, &post.id)?;
    }
    Ok(posts)
}

#[async_trait]
impl ContentRepository for SqliteContentRepository {
    async fn insert_post(&self, post: &Post) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO posts (id, author_id, title, content, image_url, category, readers, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                post.id,
                post.author_id,
                post.title,
                post.content,
                post.image_url,
                post.category,
                post.readers,
                format_timestamp(&post.created_at),
                format_timestamp(&post.updated_at),
            ],
        )?;
        Ok(())
    }

    async fn find_post(&self, id: &str) -> AppResult<Option<Post>> {
        let conn = self.pool.get()?;
        Ok(fetch_post(&conn, id)?)
    }

    async fn update_post(
        &self,
        id: &str,
        changes: &PostChanges,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Post>> {
        let conn = self.pool.get()?;

        let rows = conn.execute(
            "UPDATE posts SET
               title = COALESCE(?2, title),
               content = COALESCE(?3, content),
               image_url = CASE WHEN ?4 THEN ?5 ELSE image_url END,
               category = COALESCE(?6, category),
               updated_at = ?7
             WHERE id = ?1",
            params![
                id,
                changes.title,
                changes.content,
                changes.image_url.is_some(),
                changes.image_url.clone().flatten(),
                changes.category,
                format_timestamp(&now),
            ],
        )?;

        if rows == 0 {
            return Ok(None);
        }
        Ok(fetch_post(&conn, id)?)
    }

    async fn delete_post(&self, id: &str) -> AppResult<bool> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    async fn list_posts(&self, limit: u32, offset: u32) -> AppResult<Vec<Post>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts
             ORDER BY created_at DESC, id DESC
             LIMIT ?1 OFFSET ?2"
        ))?;
        let posts = stmt
            .query_map(params![limit, offset], post_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(with_likes(&conn, posts)?)
    }

    async fn list_posts_by_author(&self, author_id: &str) -> AppResult<Vec<Post>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts
             WHERE author_id = ?1
             ORDER BY created_at DESC, id DESC"
        ))?;
        let posts = stmt
            .query_map(params![author_id], post_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(with_likes(&conn, posts)?)
    }

    async fn increment_readers(&self, id: &str) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE posts SET readers = readers + 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    async fn add_post_like(
        &self,
        post_id: &str,
        author_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let conn = self.pool.get()?;

        // The primary key on (post_id, author_id) makes this a set insert.
        let rows = conn.execute(
            "INSERT OR IGNORE INTO post_likes (post_id, author_id, created_at)
             SELECT id, ?2, ?3 FROM posts WHERE id = ?1",
            params![post_id, author_id, format_timestamp(&now)],
        )?;

        if rows == 0 && !post_exists(&conn, post_id)? {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn remove_post_like(&self, post_id: &str, author_id: &str) -> AppResult<()> {
        let conn = self.pool.get()?;

        let rows = conn.execute(
            "DELETE FROM post_likes WHERE post_id = ?1 AND author_id = ?2",
            params![post_id, author_id],
        )?;

        if rows == 0 && !post_exists(&conn, post_id)? {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn insert_comment(&self, comment: &Comment) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO comments (id, post_id, username, content, likes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                comment.id,
                comment.post_id,
                comment.username,
                comment.content,
                comment.likes,
                format_timestamp(&comment.created_at),
            ],
        )?;
        Ok(())
    }

    async fn list_comments(
        &self,
        post_id: &str,
        limit: u32,
        offset: u32,
    ) -> AppResult<Vec<Comment>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments
             WHERE post_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2 OFFSET ?3"
        ))?;
        let mut comments = stmt
            .query_map(params![post_id, limit, offset], comment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        for comment in &mut comments {
            comment.liked_by = load_comment_likes(&conn, &comment.id)?;
        }
        Ok(comments)
    }

    async fn like_comment(
        &self,
        comment_id: &str,
        username: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Comment> {
        let mut conn = self.pool.get()?;

        // Existence check, dedup and counter bump commit together, so two
        // concurrent likes with the same name cannot both land.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM comments WHERE id = ?1",
            params![comment_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(AppError::NotFound);
        }

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO comment_likes (comment_id, username, created_at)
             VALUES (?1, ?2, ?3)",
            params![comment_id, username, format_timestamp(&now)],
        )?;
        if inserted == 0 {
            return Err(AppError::AlreadyLiked);
        }

        tx.execute(
            "UPDATE comments SET likes = likes + 1 WHERE id = ?1",
            params![comment_id],
        )?;
        tx.commit()?;

        fetch_comment(&conn, comment_id)?.ok_or(AppError::NotFound)
    }

    async fn delete_comment(&self, id: &str) -> AppResult<bool> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    async fn insert_share(&self, share: &Share) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO shares (id, post_id, platform, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                share.id,
                share.post_id,
                share.platform,
                format_timestamp(&share.created_at),
            ],
        )?;
        Ok(())
    }

    async fn list_shares(&self, post_id: &str) -> AppResult<Vec<Share>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, post_id, platform, created_at FROM shares
             WHERE post_id = ?1
             ORDER BY created_at, id",
        )?;
        let shares = stmt
            .query_map(params![post_id], share_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(shares)
    }
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynContentRepository = Arc<dyn ContentRepository>;
