use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::accounts::{CredentialStore, SqliteAuthorRepository};
use crate::auth::{PasswordHasher, TokenIssuer};
use crate::config::Config;
use crate::content::{EngagementEngine, SqliteContentRepository};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub tokens: Arc<TokenIssuer>,
    pub accounts: CredentialStore,
    pub engagement: EngagementEngine,
}

impl AppState {
    /// Wire the stores and services over one pool. Migrations must already
    /// have run.
    pub fn new(db: DbPool, config: Config, tokens: TokenIssuer) -> Self {
        let tokens = Arc::new(tokens);
        let authors = Arc::new(SqliteAuthorRepository::new(db.clone()));
        let content = Arc::new(SqliteContentRepository::new(db.clone()));

        let accounts = CredentialStore::new(
            authors.clone(),
            PasswordHasher::new(config.auth.bcrypt_cost),
            tokens.clone(),
        );
        let engagement = EngagementEngine::new(content, authors);

        Self {
            db,
            config,
            tokens,
            accounts,
            engagement,
        }
    }
}
