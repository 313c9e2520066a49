use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{RefreshTokenRecord, RevocationStore};
use crate::error::StoreError;
use crate::users::{User, UserStore};

/// In-memory account store
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn create(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation("users_email_key".to_string()));
        }
        if users.contains_key(&user.id) {
            return Err(StoreError::UniqueViolation("users_pkey".to_string()));
        }

        users.insert(user.id, user.clone());
        Ok(())
    }
}

/// In-memory refresh token record store
#[derive(Default)]
pub struct InMemoryRevocationStore {
    records: RwLock<HashMap<Uuid, RefreshTokenRecord>>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored record, in no particular order
    pub async fn snapshot(&self) -> Vec<RefreshTokenRecord> {
        self.records.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn save(&self, record: &RefreshTokenRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;

        if records.values().any(|r| r.token_id == record.token_id) {
            return Err(StoreError::UniqueViolation(
                "refresh_tokens_token_id_key".to_string(),
            ));
        }
        if records.contains_key(&record.id) {
            return Err(StoreError::UniqueViolation("refresh_tokens_pkey".to_string()));
        }

        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_valid(
        &self,
        user_id: Uuid,
        token_id: &str,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let now = Utc::now();
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| {
                r.user_id == user_id && r.token_id == token_id && r.is_valid_for(token_hash, now)
            })
            .cloned())
    }

    async fn find_by_token_id(
        &self,
        token_id: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.values().find(|r| r.token_id == token_id).cloned())
    }

    async fn revoke(&self, record_id: Uuid) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&record_id).ok_or(StoreError::NotFound)?;

        if record.revoked_at.is_none() {
            record.revoked_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let mut count = 0;

        for record in records.values_mut() {
            if record.user_id == user_id && record.revoked_at.is_none() {
                record.revoked_at = Some(now);
                count += 1;
            }
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(user_id: Uuid, expires_in: Duration) -> RefreshTokenRecord {
        let now = Utc::now();
        RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id,
            token_id: Uuid::new_v4().to_string(),
            token_hash: "f".repeat(64),
            expires_at: now + expires_in,
            revoked_at: None,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = InMemoryUserStore::new();
        let first = User::new("alice@example.com".into(), "hash".into());
        let second = User::new("alice@example.com".into(), "hash".into());

        store.create(&first).await.unwrap();
        let result = store.create(&second).await;

        assert!(matches!(result, Err(StoreError::UniqueViolation(_))));
        assert_eq!(
            store.find_by_email("alice@example.com").await.unwrap().unwrap().id,
            first.id
        );
    }

    #[tokio::test]
    async fn test_find_user_by_id() {
        let store = InMemoryUserStore::new();
        let user = User::new("bob@example.com".into(), "hash".into());
        store.create(&user).await.unwrap();

        assert!(store.find_by_id(user.id).await.unwrap().is_some());
        assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_token_id_rejected() {
        let store = InMemoryRevocationStore::new();
        let first = record(Uuid::new_v4(), Duration::days(1));
        let mut second = record(Uuid::new_v4(), Duration::days(1));
        second.token_id = first.token_id.clone();

        store.save(&first).await.unwrap();
        let result = store.save(&second).await;

        assert!(matches!(result, Err(StoreError::UniqueViolation(_))));
    }

    #[tokio::test]
    async fn test_find_valid_requires_every_key() {
        let store = InMemoryRevocationStore::new();
        let user_id = Uuid::new_v4();
        let r = record(user_id, Duration::days(1));
        store.save(&r).await.unwrap();

        let found = store.find_valid(user_id, &r.token_id, &r.token_hash).await.unwrap();
        assert_eq!(found, Some(r.clone()));

        let wrong_user = store.find_valid(Uuid::new_v4(), &r.token_id, &r.token_hash).await;
        assert!(wrong_user.unwrap().is_none());

        let wrong_jti = store.find_valid(user_id, "other", &r.token_hash).await;
        assert!(wrong_jti.unwrap().is_none());

        let wrong_hash = store.find_valid(user_id, &r.token_id, &"0".repeat(64)).await;
        assert!(wrong_hash.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_valid_skips_expired() {
        let store = InMemoryRevocationStore::new();
        let user_id = Uuid::new_v4();
        let r = record(user_id, Duration::seconds(-5));
        store.save(&r).await.unwrap();

        let found = store.find_valid(user_id, &r.token_id, &r.token_hash).await.unwrap();
        assert!(found.is_none());
        // Expired records are filtered, never deleted
        assert_eq!(store.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent_and_keeps_first_timestamp() {
        let store = InMemoryRevocationStore::new();
        let user_id = Uuid::new_v4();
        let r = record(user_id, Duration::days(1));
        store.save(&r).await.unwrap();

        store.revoke(r.id).await.unwrap();
        let first = store.find_by_token_id(&r.token_id).await.unwrap().unwrap().revoked_at;
        assert!(first.is_some());

        store.revoke(r.id).await.unwrap();
        let second = store.find_by_token_id(&r.token_id).await.unwrap().unwrap().revoked_at;
        assert_eq!(first, second);

        let found = store.find_valid(user_id, &r.token_id, &r.token_hash).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_revoke_unknown_record() {
        let store = InMemoryRevocationStore::new();
        let result = store.revoke(Uuid::new_v4()).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_revoke_all_for_user() {
        let store = InMemoryRevocationStore::new();
        let user_id = Uuid::new_v4();
        let other_user = Uuid::new_v4();

        let a = record(user_id, Duration::days(1));
        let b = record(user_id, Duration::days(1));
        let c = record(other_user, Duration::days(1));
        for r in [&a, &b, &c] {
            store.save(r).await.unwrap();
        }
        store.revoke(a.id).await.unwrap();

        assert_eq!(store.revoke_all_for_user(user_id).await.unwrap(), 1);
        assert!(store
            .find_valid(other_user, &c.token_id, &c.token_hash)
            .await
            .unwrap()
            .is_some());
    }
}
