use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_TOKEN_HOURS: u64 = 72;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// The only failure a caller ever sees from [`TokenIssuer::validate`].
/// Expired, tampered and wrongly-signed tokens are indistinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("token rejected")]
pub struct TokenRejected;

/// Issues and validates HS256 bearer tokens with a secret fixed at
/// construction.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    default_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], default_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn issue(&self, subject: &str) -> Result<String, AppError> {
        self.issue_with_ttl(subject, self.default_ttl)
    }

    pub fn issue_with_ttl(&self, subject: &str, ttl: Duration) -> Result<String, AppError> {
        self.issue_at(subject, Utc::now(), ttl)
    }

    pub fn issue_at(
        &self,
        subject: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, AppError> {
        let expires = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AppError::Internal(format!("token ttl out of range: {ttl}")))?;
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("failed to sign token: {e}")))
    }

    /// Returns the subject bound in `token`.
    pub fn validate(&self, token: &str) -> Result<String, TokenRejected> {
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Ok(data.claims.sub),
            Err(e) => {
                tracing::debug!("Token rejected: {:?}", e.kind());
                Err(TokenRejected)
            }
        }
    }
}
