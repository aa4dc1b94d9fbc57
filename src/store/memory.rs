//! In-process repository used by tests and embedded setups.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{RefreshTokenRecord, RefreshTokenRepository, StoreError, User, UserRepository};

/// Users and refresh tokens kept in memory behind mutexes.
///
/// Each operation holds its lock for the whole read-modify-write, which gives
/// rotation the same all-or-nothing behaviour as the SQLite transaction.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, User>>,
    tokens: Mutex<HashMap<String, RefreshTokenRecord>>,
    unavailable: AtomicBool,
    stalled: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the backend were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make every call hang until the caller gives up.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Number of stored refresh tokens, revoked ones included.
    pub fn refresh_token_count(&self) -> usize {
        self.tokens.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    async fn check(&self) -> Result<(), StoreError> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        self.check().await?;
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        if users.contains_key(&user.email) {
            return Err(StoreError::Conflict(format!("email {} exists", user.email)));
        }
        users.insert(user.email.clone(), user.clone());
        Ok(())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.check().await?;
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        Ok(users.get(email).cloned())
    }
}

#[async_trait]
impl RefreshTokenRepository for MemoryStore {
    async fn create_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), StoreError> {
        self.check().await?;
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        if tokens.contains_key(&record.token) {
            return Err(StoreError::Conflict("duplicate refresh token".into()));
        }
        tokens.insert(record.token.clone(), record.clone());
        Ok(())
    }

    async fn refresh_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        self.check().await?;
        let tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tokens.get(token).cloned())
    }

    async fn rotate_refresh_token(
        &self,
        presented: &str,
        replacement: &RefreshTokenRecord,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.check().await?;
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());

        if tokens.contains_key(&replacement.token) {
            return Err(StoreError::Conflict("duplicate refresh token".into()));
        }

        match tokens.get_mut(presented) {
            Some(record) if record.is_active(now) => record.revoked = true,
            _ => return Ok(false),
        }

        tokens.insert(replacement.token.clone(), replacement.clone());
        Ok(true)
    }

    async fn revoke_refresh_token(&self, token: &str) -> Result<bool, StoreError> {
        self.check().await?;
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        match tokens.get_mut(token) {
            Some(record) => {
                record.revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::UserRole;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn user(email: &str) -> User {
        User {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            full_name: None,
            role: UserRole::User,
            created_at: now(),
        }
    }

    fn token(value: &str) -> RefreshTokenRecord {
        RefreshTokenRecord {
            token: value.to_string(),
            email: "a@x.com".to_string(),
            created_at: now(),
            expires_at: now() + Duration::days(7),
            revoked: false,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        let first = user("a@x.com");
        store.create_user(&first).await.unwrap();

        let result = store.create_user(&user("a@x.com")).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        let stored = store.user_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(stored.id, first.id);
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_sensitive() {
        let store = MemoryStore::new();
        store.create_user(&user("a@x.com")).await.unwrap();
        assert!(store.user_by_email("A@X.COM").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rotate_revokes_and_inserts() {
        let store = MemoryStore::new();
        store.create_refresh_token(&token("old")).await.unwrap();

        assert!(
            store
                .rotate_refresh_token("old", &token("new"), now())
                .await
                .unwrap()
        );

        assert!(store.refresh_token("old").await.unwrap().unwrap().revoked);
        assert!(!store.refresh_token("new").await.unwrap().unwrap().revoked);
        assert_eq!(store.refresh_token_count(), 2);
    }

    #[tokio::test]
    async fn test_rotate_twice_fails_without_writing() {
        let store = MemoryStore::new();
        store.create_refresh_token(&token("old")).await.unwrap();
        store
            .rotate_refresh_token("old", &token("new1"), now())
            .await
            .unwrap();

        let second = store
            .rotate_refresh_token("old", &token("new2"), now())
            .await
            .unwrap();
        assert!(!second);
        assert!(store.refresh_token("new2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rotate_expired_fails() {
        let store = MemoryStore::new();
        store.create_refresh_token(&token("old")).await.unwrap();

        let later = now() + Duration::days(8);
        assert!(
            !store
                .rotate_refresh_token("old", &token("new"), later)
                .await
                .unwrap()
        );
        assert!(!store.refresh_token("old").await.unwrap().unwrap().revoked);
    }

    #[tokio::test]
    async fn test_revoke_unknown_token() {
        let store = MemoryStore::new();
        assert!(!store.revoke_refresh_token("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.user_by_email("a@x.com").await,
            Err(StoreError::Unavailable(_))
        ));

        store.set_unavailable(false);
        assert!(store.user_by_email("a@x.com").await.is_ok());
    }
}
