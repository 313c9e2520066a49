/// User accounts
///
/// The account model and the storage contract the authentication flows
/// depend on. Implementations live in `crate::store`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::StoreError;

/// A stored account
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            created_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            email: self.email.clone(),
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

/// Public view of an account; never includes the password hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub created_at: String,
}

/// Persistence contract for accounts
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up an account by its (normalized) email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Look up an account by id
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Persist a new account.
    ///
    /// Returns `StoreError::UniqueViolation` if the email is already taken.
    async fn create(&self, user: &User) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_hides_password_hash() {
        let user = User::new("alice@example.com".to_string(), "$2b$04$hash".to_string());
        let value = serde_json::to_value(user.summary()).unwrap();

        assert_eq!(value["email"], "alice@example.com");
        assert_eq!(value["id"], user.id.to_string());
        assert!(value.get("password_hash").is_none());
    }
}
