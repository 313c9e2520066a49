/// Refresh Token Records
///
/// Refresh tokens are tracked server-side so each session can be revoked on
/// its own. A record holds:
/// - the token identifier (`jti`), unique across all records
/// - the SHA-256 digest of the signed token (the token itself is never stored)
/// - the expiry and an optional revocation timestamp
///
/// Records are never deleted. Expired ones are filtered out at query time,
/// and `revoked_at` is set at most once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::issuer::IssuedRefreshToken;
use crate::error::StoreError;

/// A persisted refresh token record
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_id: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    /// Build the record for a freshly issued refresh token
    pub fn for_issued(user_id: Uuid, issued: &IssuedRefreshToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_id: issued.token_id.clone(),
            token_hash: issued.token_hash.clone(),
            expires_at: issued.expires_at,
            revoked_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Valid iff unrevoked, unexpired and the presented digest matches
    pub fn is_valid_for(&self, token_hash: &str, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired_at(now) && self.token_hash == token_hash
    }
}

/// Persistence contract for refresh token records
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Persist a new record.
    ///
    /// Returns `StoreError::UniqueViolation` if the token identifier exists.
    async fn save(&self, record: &RefreshTokenRecord) -> Result<(), StoreError>;

    /// Return the record matching all of `user_id`, `token_id` and
    /// `token_hash` if it is unrevoked and unexpired, `None` otherwise.
    async fn find_valid(
        &self,
        user_id: Uuid,
        token_id: &str,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Return the record with this identifier in whatever state it is in
    async fn find_by_token_id(
        &self,
        token_id: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Set `revoked_at` if unset. Revoking an already revoked record is a
    /// no-op success; an unknown id is `StoreError::NotFound`.
    async fn revoke(&self, record_id: Uuid) -> Result<(), StoreError>;

    /// Revoke every unrevoked record of a user, returning how many changed
    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(expires_in: Duration) -> RefreshTokenRecord {
        let now = Utc::now();
        RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_id: Uuid::new_v4().to_string(),
            token_hash: "a".repeat(64),
            expires_at: now + expires_in,
            revoked_at: None,
            created_at: now,
        }
    }

    #[test]
    fn test_valid_record() {
        let r = record(Duration::days(1));
        assert!(r.is_valid_for(&"a".repeat(64), Utc::now()));
    }

    #[test]
    fn test_digest_mismatch_is_invalid() {
        let r = record(Duration::days(1));
        assert!(!r.is_valid_for(&"b".repeat(64), Utc::now()));
    }

    #[test]
    fn test_expired_record_is_invalid() {
        let r = record(Duration::seconds(-1));
        assert!(r.is_expired_at(Utc::now()));
        assert!(!r.is_valid_for(&"a".repeat(64), Utc::now()));
    }

    #[test]
    fn test_revoked_record_is_invalid() {
        let mut r = record(Duration::days(1));
        r.revoked_at = Some(Utc::now());
        assert!(!r.is_valid_for(&"a".repeat(64), Utc::now()));
    }
}
