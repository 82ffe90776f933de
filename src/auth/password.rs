/// Shortest password accepted at registration or update.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hashing(#[source] bcrypt::BcryptError),

    #[error("stored password digest is malformed")]
    MalformedDigest,

    #[error("password task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// One-way adaptive hashing of author passwords (bcrypt).
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Each call salts independently, so two hashes of the same password
    /// differ but both verify.
    pub fn hash(&self, secret: &str) -> Result<String, PasswordError> {
        bcrypt::hash(secret, self.cost).map_err(PasswordError::Hashing)
    }

    /// `Ok(false)` on a wrong password; `Err` only when `digest` is not a
    /// bcrypt hash at all. The comparison inside bcrypt is constant time.
    pub fn verify(&self, secret: &str, digest: &str) -> Result<bool, PasswordError> {
        bcrypt::verify(secret, digest).map_err(|_| PasswordError::MalformedDigest)
    }

    /// [`hash`](Self::hash) on the blocking pool, keeping bcrypt's work
    /// off the async workers.
    pub async fn hash_blocking(self, secret: &str) -> Result<String, PasswordError> {
        let secret = secret.to_owned();
        tokio::task::spawn_blocking(move || self.hash(&secret)).await?
    }

    pub async fn verify_blocking(self, secret: &str, digest: &str) -> Result<bool, PasswordError> {
        let (secret, digest) = (secret.to_owned(), digest.to_owned());
        tokio::task::spawn_blocking(move || self.verify(&secret, &digest)).await?
    }
}
