/// JWT Claims structure
///
/// The payload carried by both token classes. Decoding is strongly typed:
/// a token with a missing or mistyped field fails to decode instead of
/// failing on a later field lookup.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declared class of a token, carried in the `typ` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
        }
    }
}

/// Claims shared by access and refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Claims {
    /// Issuer
    pub iss: String,
    /// Subject (user ID)
    pub sub: Uuid,
    /// Token identifier, present on refresh tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// Token class
    pub typ: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn access(issuer: &str, user_id: Uuid, issued_at: i64, expires_at: i64) -> Self {
        Self {
            iss: issuer.to_string(),
            sub: user_id,
            jti: None,
            typ: TokenType::Access,
            iat: issued_at,
            exp: expires_at,
        }
    }

    pub fn refresh(
        issuer: &str,
        user_id: Uuid,
        token_id: String,
        issued_at: i64,
        expires_at: i64,
    ) -> Self {
        Self {
            iss: issuer.to_string(),
            sub: user_id,
            jti: Some(token_id),
            typ: TokenType::Refresh,
            iat: issued_at,
            exp: expires_at,
        }
    }

    /// Check if token has expired
    pub fn is_expired(&self) -> bool {
        self.exp <= chrono::Utc::now().timestamp()
    }
}
