//! Posts, comments and shares, and the engagement protocols over them:
//! view counting, post likes and at-most-once comment likes.

pub mod repository;

use serde::Deserialize;
use std::collections::HashMap;

use crate::accounts::DynAuthorRepository;
use crate::db::{
    self,
    models::{Comment, Page, Post, PostWithAuthor, Share},
};
use crate::error::{AppError, AppResult};

pub use repository::{ContentRepository, DynContentRepository, PostChanges, SqliteContentRepository};

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// `limit` / `offset` query parameters. `skip` is accepted for `offset`.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct Pagination {
    pub limit: Option<u32>,
    #[serde(alias = "skip")]
    pub offset: Option<u32>,
}

impl Pagination {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }

    /// Effective `(limit, offset)` after defaults and the limit cap.
    pub fn resolve(&self) -> (u32, u32) {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT);
        (limit, self.offset.unwrap_or(0))
    }
}

#[derive(Debug, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: String,
}

/// The post fields an update may touch.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewComment {
    pub post_id: String,
    pub username: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct NewShare {
    pub post_id: String,
    pub platform: String,
}

#[derive(Clone)]
pub struct EngagementEngine {
    content: DynContentRepository,
    authors: DynAuthorRepository,
}

impl EngagementEngine {
    pub fn new(content: DynContentRepository, authors: DynAuthorRepository) -> Self {
        Self { content, authors }
    }

    pub async fn create_post(&self, author_id: &str, req: NewPost) -> AppResult<Post> {
        let title = required("title", &req.title)?;
        let content = required("content", &req.content)?;

        let now = db::now();
        let post = Post {
            id: db::new_id(),
            author_id: author_id.to_string(),
            title,
            content,
            image_url: req.image_url.filter(|u| !u.trim().is_empty()),
            category: req.category.trim().to_string(),
            readers: 0,
            likes: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        self.content.insert_post(&post).await?;
        tracing::info!(post_id = %post.id, author_id = %author_id, "Created post");
        Ok(post)
    }

    /// Count a read and return the post. The counter bump is best effort:
    /// if it fails the read still succeeds.
    pub async fn view_post(&self, id: &str) -> AppResult<PostWithAuthor> {
        if let Err(e) = self.content.increment_readers(id).await {
            tracing::warn!(post_id = %id, error = %e, "Failed to count post view");
        }

        let post = self.content.find_post(id).await?.ok_or(AppError::NotFound)?;
        let author_name = self.author_name(&post.author_id).await?;
        Ok(PostWithAuthor { post, author_name })
    }

    pub async fn update_post(&self, id: &str, update: PostUpdate) -> AppResult<Post> {
        let changes = PostChanges {
            title: update.title.as_deref().map(|t| required("title", t)).transpose()?,
            content: update
                .content
                .as_deref()
                .map(|c| required("content", c))
                .transpose()?,
            // An empty image_url removes the image, as on create
            image_url: update
                .image_url
                .map(|u| Some(u.trim().to_string()).filter(|u| !u.is_empty())),
            category: update.category.map(|c| c.trim().to_string()),
        };

        self.content
            .update_post(id, &changes, db::now())
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn delete_post(&self, id: &str) -> AppResult<()> {
        if self.content.delete_post(id).await? {
            tracing::info!(post_id = %id, "Deleted post");
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }

    pub async fn list_posts(&self, page: Pagination) -> AppResult<Page<PostWithAuthor>> {
        let (limit, offset) = page.resolve();
        let posts = if limit == 0 {
            Vec::new()
        } else {
            self.content.list_posts(limit, offset).await?
        };

        Ok(Page {
            items: self.attach_authors(posts).await?,
            limit,
            offset,
        })
    }

    pub async fn list_by_author(&self, author_id: &str) -> AppResult<Vec<PostWithAuthor>> {
        let posts = self.content.list_posts_by_author(author_id).await?;
        self.attach_authors(posts).await
    }

    pub async fn like_post(&self, post_id: &str, author_id: &str) -> AppResult<Post> {
        self.content
            .add_post_like(post_id, author_id, db::now())
            .await?;
        self.content.find_post(post_id).await?.ok_or(AppError::NotFound)
    }

    pub async fn unlike_post(&self, post_id: &str, author_id: &str) -> AppResult<Post> {
        self.content.remove_post_like(post_id, author_id).await?;
        self.content.find_post(post_id).await?.ok_or(AppError::NotFound)
    }

    pub async fn create_comment(&self, req: NewComment) -> AppResult<Comment> {
        let comment = Comment {
            id: db::new_id(),
            post_id: required("post_id", &req.post_id)?,
            username: required("username", &req.username)?,
            content: required("content", &req.content)?,
            likes: 0,
            liked_by: Vec::new(),
            created_at: db::now(),
        };

        self.content.insert_comment(&comment).await?;
        Ok(comment)
    }

    pub async fn list_comments(&self, post_id: &str, page: Pagination) -> AppResult<Page<Comment>> {
        let (limit, offset) = page.resolve();
        let items = if limit == 0 {
            Vec::new()
        } else {
            self.content.list_comments(post_id, limit, offset).await?
        };
        Ok(Page {
            items,
            limit,
            offset,
        })
    }

    pub async fn like_comment(&self, comment_id: &str, username: &str) -> AppResult<Comment> {
        let username = required("username", username)?;
        self.content
            .like_comment(comment_id, &username, db::now())
            .await
    }

    pub async fn delete_comment(&self, comment_id: &str) -> AppResult<()> {
        if self.content.delete_comment(comment_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }

    pub async fn create_share(&self, req: NewShare) -> AppResult<Share> {
        let share = Share {
            id: db::new_id(),
            post_id: required("post_id", &req.post_id)?,
            platform: required("platform", &req.platform)?,
            created_at: db::now(),
        };

        self.content.insert_share(&share).await?;
        Ok(share)
    }

    pub async fn list_shares(&self, post_id: &str) -> AppResult<Vec<Share>> {
        self.content.list_shares(post_id).await
    }

    async fn author_name(&self, author_id: &str) -> AppResult<String> {
        Ok(self
            .authors
            .find_by_id(author_id)
            .await?
            .map(|a| a.name)
            .unwrap_or_default())
    }

    async fn attach_authors(&self, posts: Vec<Post>) -> AppResult<Vec<PostWithAuthor>> {
        let mut names: HashMap<String, String> = HashMap::new();
        let mut out = Vec::with_capacity(posts.len());

        for post in posts {
            let author_name = match names.get(&post.author_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self.author_name(&post.author_id).await?;
                    names.insert(post.author_id.clone(), name.clone());
                    name
                }
            };
            out.push(PostWithAuthor { post, author_name });
        }

        Ok(out)
    }
}

fn required(field: &str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::SqliteAuthorRepository;
    use crate::db::models::Author;
    use std::sync::Arc;

    async fn engine_with_author() -> (EngagementEngine, String) {
        let pool = db::test_pool();
        let authors = Arc::new(SqliteAuthorRepository::new(pool.clone()));
        let now = db::now();
        let author = Author {
            id: db::new_id(),
            name: "Ann".into(),
            email: "ann@x.com".into(),
            password_hash: "$2b$04$hash".into(),
            phone: None,
            avatar_url: None,
            bio: String::new(),
            created_at: now,
            updated_at: now,
        };
        crate::accounts::AuthorRepository::insert(authors.as_ref(), &author)
            .await
            .unwrap();

        let engine = EngagementEngine::new(Arc::new(SqliteContentRepository::new(pool)), authors);
        (engine, author.id)
    }

    fn new_post(title: &str) -> NewPost {
        NewPost {
            title: title.into(),
            content: "hello".into(),
            image_url: None,
            category: "general".into(),
        }
    }

    #[test]
    fn pagination_defaults_and_cap() {
        assert_eq!(Pagination::default().resolve(), (10, 0));
        assert_eq!(Pagination::new(500, 3).resolve(), (100, 3));
        assert_eq!(Pagination::new(0, 0).resolve(), (0, 0));
    }

    #[test]
    fn pagination_accepts_skip_alias() {
        let page: Pagination = serde_json::from_str(r#"{"limit":5,"skip":20}"#).unwrap();
        assert_eq!(page.resolve(), (5, 20));
    }

    #[tokio::test]
    async fn create_post_starts_unread_and_unliked() {
        let (engine, author_id) = engine_with_author().await;
        let post = engine.create_post(&author_id, new_post("First")).await.unwrap();
        assert_eq!(post.author_id, author_id);
        assert_eq!(post.readers, 0);
        assert!(post.likes.is_empty());
    }

    #[tokio::test]
    async fn create_post_requires_title_and_content() {
        let (engine, author_id) = engine_with_author().await;
        assert!(matches!(
            engine.create_post(&author_id, new_post("  ")).await,
            Err(AppError::Validation(_))
        ));

        let mut empty_body = new_post("t");
        empty_body.content = String::new();
        assert!(matches!(
            engine.create_post(&author_id, empty_body).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn view_counts_each_read() {
        let (engine, author_id) = engine_with_author().await;
        let post = engine.create_post(&author_id, new_post("t")).await.unwrap();

        let first = engine.view_post(&post.id).await.unwrap();
        let second = engine.view_post(&post.id).await.unwrap();
        assert_eq!(first.post.readers, 1);
        assert_eq!(second.post.readers, 2);
        assert_eq!(second.author_name, "Ann");
    }

    #[tokio::test]
    async fn view_missing_post_is_not_found() {
        let (engine, _) = engine_with_author().await;
        assert!(matches!(
            engine.view_post("missing").await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn orphaned_post_has_empty_author_name() {
        let (engine, _) = engine_with_author().await;
        let post = engine.create_post("gone", new_post("t")).await.unwrap();
        let viewed = engine.view_post(&post.id).await.unwrap();
        assert_eq!(viewed.author_name, "");
    }

    #[tokio::test]
    async fn like_and_unlike_are_idempotent() {
        let (engine, author_id) = engine_with_author().await;
        let post = engine.create_post(&author_id, new_post("t")).await.unwrap();

        engine.like_post(&post.id, "u1").await.unwrap();
        let liked = engine.like_post(&post.id, "u1").await.unwrap();
        assert_eq!(liked.likes, vec!["u1".to_string()]);

        engine.unlike_post(&post.id, "u1").await.unwrap();
        let unliked = engine.unlike_post(&post.id, "u1").await.unwrap();
        assert!(unliked.likes.is_empty());

        // Unliking something never liked is a no-op
        let untouched = engine.unlike_post(&post.id, "u2").await.unwrap();
        assert!(untouched.likes.is_empty());
    }

    #[tokio::test]
    async fn update_post_rejects_blank_title_and_missing_post() {
        let (engine, author_id) = engine_with_author().await;
        let post = engine.create_post(&author_id, new_post("t")).await.unwrap();

        let blank = PostUpdate {
            title: Some(" ".into()),
            ..Default::default()
        };
        assert!(matches!(
            engine.update_post(&post.id, blank).await,
            Err(AppError::Validation(_))
        ));

        let category = PostUpdate {
            category: Some("rust".into()),
            ..Default::default()
        };
        let updated = engine.update_post(&post.id, category).await.unwrap();
        assert_eq!(updated.category, "rust");
        assert_eq!(updated.title, "t");

        assert!(matches!(
            engine.update_post("missing", PostUpdate::default()).await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn list_posts_attaches_author_names() {
        let (engine, author_id) = engine_with_author().await;
        for i in 0..3 {
            engine
                .create_post(&author_id, new_post(&format!("post {i}")))
                .await
                .unwrap();
        }

        let page = engine.list_posts(Pagination::new(2, 0)).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.items.iter().all(|p| p.author_name == "Ann"));

        let empty = engine.list_posts(Pagination::new(0, 0)).await.unwrap();
        assert!(empty.items.is_empty());

        let mine = engine.list_by_author(&author_id).await.unwrap();
        assert_eq!(mine.len(), 3);
    }

    #[tokio::test]
    async fn comment_like_is_at_most_once_per_name() {
        let (engine, _) = engine_with_author().await;
        let comment = engine
            .create_comment(NewComment {
                post_id: "p1".into(),
                username: "bob".into(),
                content: "nice".into(),
            })
            .await
            .unwrap();

        let liked = engine.like_comment(&comment.id, "carol").await.unwrap();
        assert_eq!(liked.likes, 1);
        assert!(matches!(
            engine.like_comment(&comment.id, "carol").await,
            Err(AppError::AlreadyLiked)
        ));

        let page = engine
            .list_comments("p1", Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.items[0].likes, page.items[0].liked_by.len() as i64);
    }

    #[tokio::test]
    async fn comment_fields_are_required() {
        let (engine, _) = engine_with_author().await;
        let result = engine
            .create_comment(NewComment {
                post_id: "p1".into(),
                username: "".into(),
                content: "nice".into(),
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        assert!(matches!(
            engine.like_comment("c1", "  ").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn shares_list_in_append_order() {
        let (engine, _) = engine_with_author().await;
        for platform in ["twitter", "facebook", "twitter"] {
            engine
                .create_share(NewShare {
                    post_id: "p1".into(),
                    platform: platform.into(),
                })
                .await
                .unwrap();
        }

        let shares = engine.list_shares("p1").await.unwrap();
        assert_eq!(shares.len(), 3);
        assert_eq!(shares[1].platform, "facebook");

        assert!(matches!(
            engine
                .create_share(NewShare {
                    post_id: "p1".into(),
                    platform: "".into(),
                })
                .await,
            Err(AppError::Validation(_))
        ));
    }

    /// Delegates to SQLite but can never bump the reader counter.
    struct StuckCounter(SqliteContentRepository);

    #[async_trait::async_trait]
    impl ContentRepository for StuckCounter {
        async fn insert_post(&self, post: &Post) -> AppResult<()> {
            self.0.insert_post(post).await
        }
        async fn find_post(&self, id: &str) -> AppResult<Option<Post>> {
            self.0.find_post(id).await
        }
        async fn update_post(
            &self,
            id: &str,
            changes: &PostChanges,
            now: chrono::DateTime<chrono::Utc>,
        ) -> AppResult<Option<Post>> {
            self.0.update_post(id, changes, now).await
        }
        async fn delete_post(&self, id: &str) -> AppResult<bool> {
            self.0.delete_post(id).await
        }
        async fn list_posts(&self, limit: u32, offset: u32) -> AppResult<Vec<Post>> {
            self.0.list_posts(limit, offset).await
        }
        async fn list_posts_by_author(&self, author_id: &str) -> AppResult<Vec<Post>> {
            self.0.list_posts_by_author(author_id).await
        }
        async fn increment_readers(&self, _id: &str) -> AppResult<()> {
            Err(AppError::Internal("counter unavailable".into()))
        }
        async fn add_post_like(
            &self,
            post_id: &str,
            author_id: &str,
            now: chrono::DateTime<chrono::Utc>,
        ) -> AppResult<()> {
            self.0.add_post_like(post_id, author_id, now).await
        }
        async fn remove_post_like(&self, post_id: &str, author_id: &str) -> AppResult<()> {
            self.0.remove_post_like(post_id, author_id).await
        }
        async fn insert_comment(&self, comment: &Comment) -> AppResult<()> {
            self.0.insert_comment(comment).await
        }
        async fn list_comments(
            &self,
            post_id: &str,
            limit: u32,
            offset: u32,
        ) -> AppResult<Vec<Comment>> {
            self.0.list_comments(post_id, limit, offset).await
        }
        async fn like_comment(
            &self,
            comment_id: &str,
            username: &str,
            now: chrono::DateTime<chrono::Utc>,
        ) -> AppResult<Comment> {
            self.0.like_comment(comment_id, username, now).await
        }
        async fn delete_comment(&self, id: &str) -> AppResult<bool> {
            self.0.delete_comment(id).await
        }
        async fn insert_share(&self, share: &Share) -> AppResult<()> {
            self.0.insert_share(share).await
        }
        async fn list_shares(&self, post_id: &str) -> AppResult<Vec<Share>> {
            self.0.list_shares(post_id).await
        }
    }

    #[tokio::test]
    async fn view_succeeds_when_counter_fails() {
        let pool = db::test_pool();
        let engine = EngagementEngine::new(
            Arc::new(StuckCounter(SqliteContentRepository::new(pool.clone()))),
            Arc::new(SqliteAuthorRepository::new(pool)),
        );
        let post = engine.create_post("a1", new_post("t")).await.unwrap();

        let viewed = engine.view_post(&post.id).await.unwrap();
        assert_eq!(viewed.post.id, post.id);
        assert_eq!(viewed.post.readers, 0);

        // Still a 404 for a post that does not exist
        assert!(matches!(
            engine.view_post("missing").await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn update_with_blank_image_removes_it() {
        let (engine, author_id) = engine_with_author().await;
        let mut req = new_post("t");
        req.image_url = Some("https://img/a.png".into());
        let post = engine.create_post(&author_id, req).await.unwrap();

        let blank = PostUpdate {
            image_url: Some("  ".into()),
            ..Default::default()
        };
        let updated = engine.update_post(&post.id, blank).await.unwrap();
        assert_eq!(updated.image_url, None);

        let set = PostUpdate {
            image_url: Some("https://img/b.png".into()),
            ..Default::default()
        };
        let updated = engine.update_post(&post.id, set).await.unwrap();
        assert_eq!(updated.image_url.as_deref(), Some("https://img/b.png"));
    }
}
