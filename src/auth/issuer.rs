/// Token Issuance
///
/// Mints signed access and refresh tokens. Each class is signed with its own
/// HMAC-SHA256 secret. Refresh tokens additionally carry a random `jti`
/// and are returned with the SHA-256 digest that gets persisted in their place.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::TokenError;

/// A freshly signed refresh token plus the metadata needed to persist it
#[derive(Clone)]
pub struct IssuedRefreshToken {
    /// Signed token handed to the client; never stored or logged
    pub token: String,
    pub token_id: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for IssuedRefreshToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedRefreshToken")
            .field("token", &"[redacted]")
            .field("token_id", &self.token_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// SHA-256 hex digest of a raw token
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Stateless token minting service
#[derive(Clone)]
pub struct TokenIssuer {
    issuer: String,
    access_key: EncodingKey,
    refresh_key: EncodingKey,
    /// `None` when the configured lifetime does not fit a `Duration`
    access_lifetime: Option<Duration>,
    refresh_lifetime: Option<Duration>,
}

impl TokenIssuer {
    pub fn new(config: &JwtSettings) -> Self {
        Self {
            issuer: config.issuer.clone(),
            access_key: EncodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_key: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            access_lifetime: Duration::try_minutes(config.access_token_minutes),
            refresh_lifetime: Duration::try_days(config.refresh_token_days),
        }
    }

    /// Access token lifetime in seconds, as reported to clients
    pub fn access_token_ttl(&self) -> i64 {
        self.access_lifetime.map_or(0, |lifetime| lifetime.num_seconds())
    }

    /// Generate a new access token for a user
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if encoding fails or the lifetime overflows
    pub fn issue_access_token(&self, user_id: Uuid) -> Result<String, TokenError> {
        let now = Utc::now();
        let expires_at = expiry(now, self.access_lifetime)?;
        let claims = Claims::access(
            &self.issuer,
            user_id,
            now.timestamp(),
            expires_at.timestamp(),
        );
        sign(&claims, &self.access_key)
    }

    /// Generate a new refresh token with a fresh `jti`
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if encoding fails or the lifetime overflows
    pub fn issue_refresh_token(&self, user_id: Uuid) -> Result<IssuedRefreshToken, TokenError> {
        let now = Utc::now();
        let expires_at = expiry(now, self.refresh_lifetime)?;
        let token_id = Uuid::new_v4().to_string();

        let claims = Claims::refresh(
            &self.issuer,
            user_id,
            token_id.clone(),
            now.timestamp(),
            expires_at.timestamp(),
        );
        let token = sign(&claims, &self.refresh_key)?;
        let token_hash = token_digest(&token);

        Ok(IssuedRefreshToken {
            token,
            token_id,
            token_hash,
            expires_at,
        })
    }
}

fn expiry(now: DateTime<Utc>, lifetime: Option<Duration>) -> Result<DateTime<Utc>, TokenError> {
    lifetime
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| TokenError::Signing("token lifetime out of range".to_string()))
}

fn sign(claims: &Claims, key: &EncodingKey) -> Result<String, TokenError> {
    encode(&Header::new(Algorithm::HS256), claims, key)
        .map_err(|e| TokenError::Signing(e.to_string()))
}
