//! Service-level scenarios over an on-disk database.
//!
//! Tests cover:
//! - The register, login, post, view, like, comment, like-comment flow
//! - Concurrent view counting, post liking and comment liking across pooled
//!   connections
//! - Pagination determinism

use chrono::Duration;
use tempfile::TempDir;

use folio::accounts::{Credentials, Registration};
use folio::auth::TokenIssuer;
use folio::config::Config;
use folio::content::{NewComment, NewPost, Pagination, PostUpdate};
use folio::db;
use folio::error::AppError;
use folio::state::AppState;

fn create_test_state() -> (TempDir, AppState) {
    let temp_dir = TempDir::new().unwrap();
    let pool = db::create_pool(&temp_dir.path().join("test.db"))
        .expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");

    let mut config = Config::default();
    config.auth.bcrypt_cost = 4 /* bcrypt minimum cost */;
    let tokens = TokenIssuer::new(b"engagement-test", Duration::hours(72));

    (temp_dir, AppState::new(pool, config, tokens))
}

async fn register(state: &AppState, email: &str) -> String {
    state
        .accounts
        .register(Registration {
            name: "Ann".into(),
            email: email.into(),
            phone: None,
            password: "secret1".into(),
        })
        .await
        .unwrap()
        .id
}

fn new_post(title: &str) -> NewPost {
    NewPost {
        title: title.into(),
        content: "Body".into(),
        image_url: None,
        category: "general".into(),
    }
}

#[tokio::test]
async fn test_full_engagement_scenario() {
    let (_tmp, state) = create_test_state();

    let author_id = register(&state, "ann@x.com").await;
    let login = state
        .accounts
        .login(Credentials {
            email: "ann@x.com".into(),
            password: "secret1".into(),
        })
        .await
        .unwrap();
    assert_eq!(login.author_id, author_id);

    // The token names the author
    let subject = state.tokens.validate(&login.token).unwrap();
    assert_eq!(subject, author_id);

    let post = state
        .engagement
        .create_post(&subject, new_post("Hello"))
        .await
        .unwrap();

    let viewed = state.engagement.view_post(&post.id).await.unwrap();
    assert_eq!(viewed.post.readers, 1);
    assert_eq!(viewed.author_name, "Ann");

    let liked = state.engagement.like_post(&post.id, &subject).await.unwrap();
    assert_eq!(liked.likes, vec![author_id.clone()]);

    let comment = state
        .engagement
        .create_comment(NewComment {
            post_id: post.id.clone(),
            username: "bob".into(),
            content: "Nice".into(),
        })
        .await
        .unwrap();

    let first = state.engagement.like_comment(&comment.id, "carol").await.unwrap();
    assert_eq!(first.likes, 1);
    assert_eq!(first.liked_by, vec!["carol".to_string()]);

    let second = state.engagement.like_comment(&comment.id, "carol").await;
    assert!(matches!(second, Err(AppError::AlreadyLiked)));

    let comments = state
        .engagement
        .list_comments(&post.id, Pagination::default())
        .await
        .unwrap();
    assert_eq!(comments.items.len(), 1);
    assert_eq!(comments.items[0].likes, 1);
}

#[tokio::test]
async fn test_token_for_deleted_author_still_validates() {
    let (_tmp, state) = create_test_state();
    let author_id = register(&state, "ann@x.com").await;
    let token = state.tokens.issue(&author_id).unwrap();

    state.accounts.delete(&author_id).await.unwrap();

    assert_eq!(state.tokens.validate(&token).unwrap(), author_id);
    assert!(matches!(
        state.accounts.get(&author_id).await,
        Err(AppError::NotFound)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_views_are_all_counted() {
    let (_tmp, state) = create_test_state();
    let author_id = register(&state, "ann@x.com").await;
    let post = state
        .engagement
        .create_post(&author_id, new_post("Popular"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let engine = state.engagement.clone();
        let id = post.id.clone();
        handles.push(tokio::spawn(async move { engine.view_post(&id).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let after = state.engagement.view_post(&post.id).await.unwrap();
    assert_eq!(after.post.readers, 21);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_post_likes_keep_a_clean_set() {
    let (_tmp, state) = create_test_state();
    let author_id = register(&state, "ann@x.com").await;
    let post = state
        .engagement
        .create_post(&author_id, new_post("Likeable"))
        .await
        .unwrap();
    let likers: Vec<String> = (0..5).map(|i| format!("reader-{i}")).collect();

    // Every identity likes from several tasks at once, twice each
    let mut handles = Vec::new();
    for liker in &likers {
        for _ in 0..4 {
            let engine = state.engagement.clone();
            let (post_id, liker) = (post.id.clone(), liker.clone());
            handles.push(tokio::spawn(async move {
                engine.like_post(&post_id, &liker).await?;
                engine.like_post(&post_id, &liker).await
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut likes = state.engagement.view_post(&post.id).await.unwrap().post.likes;
    likes.sort();
    assert_eq!(likes, likers);

    // The first two withdraw while the rest like again, all interleaved
    let mut handles = Vec::new();
    for (i, liker) in likers.iter().enumerate() {
        for _ in 0..4 {
            let engine = state.engagement.clone();
            let (post_id, liker) = (post.id.clone(), liker.clone());
            handles.push(tokio::spawn(async move {
                if i < 2 {
                    engine.unlike_post(&post_id, &liker).await?;
                    engine.unlike_post(&post_id, &liker).await
                } else {
                    engine.like_post(&post_id, &liker).await
                }
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut likes = state.engagement.view_post(&post.id).await.unwrap().post.likes;
    likes.sort();
    assert_eq!(likes, likers[2..].to_vec());

    let conn = state.db.get().unwrap();
    let rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM post_likes WHERE post_id = ?1",
            rusqlite::params![post.id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(rows, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_name_comment_likes_land_once() {
    let (_tmp, state) = create_test_state();
    let comment = state
        .engagement
        .create_comment(NewComment {
            post_id: db::new_id(),
            username: "bob".into(),
            content: "Nice".into(),
        })
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = state.engagement.clone();
        let id = comment.id.clone();
        handles.push(tokio::spawn(
            async move { engine.like_comment(&id, "carol").await },
        ));
    }

    let mut accepted = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(AppError::AlreadyLiked) => duplicates += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(duplicates, 7);

    let page = state
        .engagement
        .list_comments(&comment.post_id, Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.items[0].likes, 1);
    assert_eq!(page.items[0].liked_by, vec!["carol".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_with_same_email() {
    let (_tmp, state) = create_test_state();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let accounts = state.accounts.clone();
        handles.push(tokio::spawn(async move {
            accounts
                .register(Registration {
                    name: "Ann".into(),
                    email: "race@x.com".into(),
                    phone: None,
                    password: "secret1".into(),
                })
                .await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(AppError::Conflict(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(created, 1);
}

#[tokio::test]
async fn test_pagination_is_deterministic() {
    let (_tmp, state) = create_test_state();
    let author_id = register(&state, "ann@x.com").await;

    // Five posts with strictly increasing creation times
    let base = db::now() - Duration::minutes(10);
    let mut ids = Vec::new();
    for i in 0..5 {
        let post = state
            .engagement
            .create_post(&author_id, new_post(&format!("Post {i}")))
            .await
            .unwrap();
        let conn = state.db.get().unwrap();
        conn.execute(
            "UPDATE posts SET created_at = ?1 WHERE id = ?2",
            rusqlite::params![db::format_timestamp(&(base + Duration::seconds(i))), post.id],
        )
        .unwrap();
        ids.push(post.id);
    }

    let page = |offset| state.engagement.list_posts(Pagination::new(2, offset));
    let first: Vec<String> = page(0).await.unwrap().items.into_iter().map(|p| p.post.id).collect();
    let second: Vec<String> = page(2).await.unwrap().items.into_iter().map(|p| p.post.id).collect();

    assert_eq!(first, vec![ids[4].clone(), ids[3].clone()]);
    assert_eq!(second, vec![ids[2].clone(), ids[1].clone()]);

    // Same query, same answer
    let again: Vec<String> = page(0).await.unwrap().items.into_iter().map(|p| p.post.id).collect();
    assert_eq!(first, again);
}

#[tokio::test]
async fn test_post_update_keeps_engagement() {
    let (_tmp, state) = create_test_state();
    let author_id = register(&state, "ann@x.com").await;
    let post = state
        .engagement
        .create_post(&author_id, new_post("Draft"))
        .await
        .unwrap();
    state.engagement.view_post(&post.id).await.unwrap();
    state.engagement.like_post(&post.id, "u1").await.unwrap();

    let updated = state
        .engagement
        .update_post(
            &post.id,
            PostUpdate {
                title: Some("Final".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.title, "Final");
    assert_eq!(updated.readers, 1);
    assert_eq!(updated.likes, vec!["u1".to_string()]);
}
