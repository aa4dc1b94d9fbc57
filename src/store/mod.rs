//! Storage seam for users and refresh tokens.
//!
//! The token service only talks to these traits. `crate::db` provides the
//! SQLite implementation and `memory` an in-process one for tests.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use memory::MemoryStore;

/// User role for authorization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "admin" => UserRole::Admin,
            _ => UserRole::User,
        }
    }
}

/// A registered user, including the password hash.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// A stored refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub token: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl RefreshTokenRecord {
    /// A record is usable only while unrevoked and strictly before its expiry.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now < self.expires_at
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user. Fails with `StoreError::Conflict` if the email is taken.
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn create_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), StoreError>;

    async fn refresh_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Revoke `presented` and insert `replacement` as one atomic unit.
    ///
    /// The revocation is conditional on `presented` still being active at
    /// `now`. Returns `false`, with nothing written, if that condition fails.
    async fn rotate_refresh_token(
        &self,
        presented: &str,
        replacement: &RefreshTokenRecord,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Mark a token revoked. Returns `false` if no record has that value.
    async fn revoke_refresh_token(&self, token: &str) -> Result<bool, StoreError>;
}

/// Errors surfaced by repository implementations.
#[derive(Debug)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    Conflict(String),
    /// The backend could not be reached in time
    Unavailable(String),
    /// Any other backend failure
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Conflict(msg) => write!(f, "conflict: {msg}"),
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
            StoreError::Backend(msg) => write!(f, "store error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}
