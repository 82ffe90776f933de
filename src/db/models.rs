use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Stored author record. Deliberately not `Serialize`: responses go through
/// [`PublicAuthor`] or [`PrivateAuthor`] so the hash can never leak.
#[derive(Clone)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Author")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// What any caller may see about an author.
#[derive(Debug, Clone, Serialize)]
pub struct PublicAuthor {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub bio: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What the token-holding owner sees about themselves.
#[derive(Debug, Clone, Serialize)]
pub struct PrivateAuthor {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Author {
    pub fn public_view(&self) -> PublicAuthor {
        PublicAuthor {
            id: self.id.clone(),
            name: self.name.clone(),
            avatar_url: self.avatar_url.clone(),
            bio: self.bio.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn private_view(&self) -> PrivateAuthor {
        PrivateAuthor {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            avatar_url: self.avatar_url.clone(),
            bio: self.bio.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub category: String,
    pub readers: i64,
    /// Ids of authors who liked the post, in the order they liked it.
    pub likes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A post together with its author's display name. The name is empty when
/// the author record no longer exists.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostWithAuthor {
    pub post: Post,
    pub author_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub username: String,
    pub content: String,
    pub likes: i64,
    pub liked_by: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Share {
    pub id: String,
    pub post_id: String,
    pub platform: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub limit: u32,
    pub offset: u32,
}
