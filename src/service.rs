//! Token lifecycle: registration, login, refresh-token rotation, logout and
//! access token validation.
//!
//! Refresh tokens move through a single transition, `active -> revoked`,
//! either by logout or by being superseded during rotation. Expiry is derived
//! at read time. Nothing ever makes a token active again.

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::db::Database;
use crate::jwt::{JwtConfig, JwtError};
use crate::password::{MIN_PASSWORD_CHARS, PasswordHasher};
use crate::refresh::generate_refresh_token;
use crate::store::{
    RefreshTokenRecord, RefreshTokenRepository, StoreError, User, UserRepository, UserRole,
    UserSummary,
};

/// Refresh token duration: 7 days
pub const DEFAULT_REFRESH_TOKEN_DAYS: i64 = 7;

/// Upper bound for a single store call.
pub const DEFAULT_STORE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Longest accepted email address.
const MAX_EMAIL_LEN: usize = 254;

/// Tunables for the token service.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub refresh_ttl: Duration,
    pub store_timeout: std::time::Duration,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            refresh_ttl: Duration::days(DEFAULT_REFRESH_TOKEN_DAYS),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

/// Tokens handed out by a successful login.
#[derive(Debug, Clone)]
pub struct LoginTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub role: UserRole,
}

/// Tokens handed out by a successful rotation.
#[derive(Debug, Clone)]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues, rotates, revokes and validates credentials.
pub struct TokenService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn RefreshTokenRepository>,
    jwt: Arc<JwtConfig>,
    hasher: PasswordHasher,
    clock: Arc<dyn Clock>,
    settings: TokenSettings,
}

impl TokenService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<dyn RefreshTokenRepository>,
        jwt: Arc<JwtConfig>,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            users,
            tokens,
            jwt,
            hasher,
            clock: Arc::new(SystemClock),
            settings: TokenSettings::default(),
        }
    }

    /// Build a service backed by the SQLite stores of `db`.
    pub fn from_database(db: &Database, jwt: Arc<JwtConfig>, hasher: PasswordHasher) -> Self {
        Self::new(Arc::new(db.users()), Arc::new(db.tokens()), jwt, hasher)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_settings(mut self, settings: TokenSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Create a new user account.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<UserSummary, AuthError> {
        validate_email(email)?;
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_CHARS
            )));
        }

        if self.store("user_by_email", self.users.user_by_email(email)).await?.is_some() {
            return Err(AuthError::AlreadyExists);
        }

        let password_hash = self.hasher.hash(password).await.map_err(|e| {
            error!(error = %e, "Failed to hash password");
            AuthError::Internal("Failed to hash password".into())
        })?;

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            password_hash,
            full_name: full_name
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            role: UserRole::User,
            created_at: self.now(),
        };

        // A concurrent registration may have won between the lookup and here
        match self
            .with_timeout("create_user", self.users.create_user(&user))
            .await?
        {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => return Err(AuthError::AlreadyExists),
            Err(e) => return Err(store_failure("create_user", e)),
        }

        info!(user_id = %user.id, email = %user.email, "User registered");
        Ok(UserSummary::from(&user))
    }

    /// Authenticate with email and password and open a new session.
    /// Existing sessions of the same user are left untouched.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginTokens, AuthError> {
        let Some(user) = self.store("user_by_email", self.users.user_by_email(email)).await?
        else {
            self.hasher.verify_dummy(password).await;
            warn!(email = %email, "Login failed");
            return Err(AuthError::InvalidCredentials);
        };

        let matches = self
            .hasher
            .verify(password, &user.password_hash)
            .await
            .map_err(|e| {
                error!(email = %email, error = %e, "Failed to verify password");
                AuthError::Internal("Failed to verify password".into())
            })?;

        if !matches {
            warn!(email = %email, "Login failed");
            return Err(AuthError::InvalidCredentials);
        }

        let now = self.now();
        let access_token = self.issue_access_token(&user, now)?;
        let record = self.new_refresh_record(&user.email, now);

        self.store(
            "create_refresh_token",
            self.tokens.create_refresh_token(&record),
        )
        .await?;

        info!(email = %user.email, "User logged in");
        Ok(LoginTokens {
            access_token,
            refresh_token: record.token,
            role: user.role,
        })
    }

    /// Exchange a refresh token for a new access token and a new refresh
    /// token. The presented token is revoked whether or not the new one is
    /// ever used.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, AuthError> {
        let now = self.now();

        let record = self
            .store("refresh_token", self.tokens.refresh_token(refresh_token))
            .await?
            .filter(|record| !record.revoked)
            .ok_or(AuthError::InvalidToken)?;

        if now >= record.expires_at {
            return Err(AuthError::Expired);
        }

        let user = self
            .store("user_by_email", self.users.user_by_email(&record.email))
            .await?
            .ok_or_else(|| {
                warn!(email = %record.email, "Refresh token owner no longer exists");
                AuthError::InvalidToken
            })?;

        let access_token = self.issue_access_token(&user, now)?;
        let replacement = self.new_refresh_record(&user.email, now);

        let rotated = self
            .store(
                "rotate_refresh_token",
                self.tokens
                    .rotate_refresh_token(refresh_token, &replacement, now),
            )
            .await?;

        if !rotated {
            // Another caller revoked or rotated the token after our read
            warn!(email = %user.email, "Refresh token already consumed");
            return Err(AuthError::InvalidToken);
        }

        info!(email = %user.email, "Refresh token rotated");
        Ok(RefreshedTokens {
            access_token,
            refresh_token: replacement.token,
        })
    }

    /// Revoke a refresh token. Any holder of the token string may do this.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let found = self
            .store(
                "revoke_refresh_token",
                self.tokens.revoke_refresh_token(refresh_token),
            )
            .await?;

        if !found {
            return Err(AuthError::NotFound);
        }

        info!("Refresh token revoked");
        Ok(())
    }

    /// Check an access token and return the current state of its user.
    /// Never reads or writes the refresh token store.
    pub async fn validate(&self, access_token: &str) -> Result<UserSummary, AuthError> {
        let claims = self
            .jwt
            .validate_access_token(access_token, self.now())
            .map_err(|e| match e {
                JwtError::Expired => AuthError::Expired,
                e => {
                    debug!(error = %e, "Rejected access token");
                    AuthError::InvalidToken
                }
            })?;

        let user = self
            .store("user_by_email", self.users.user_by_email(&claims.sub))
            .await?
            .ok_or(AuthError::InvalidToken)?;

        Ok(UserSummary::from(&user))
    }

    /// Current time, truncated to whole seconds to match stored precision.
    fn now(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now)
    }

    fn issue_access_token(&self, user: &User, now: DateTime<Utc>) -> Result<String, AuthError> {
        self.jwt
            .generate_access_token(&user.email, user.role, now)
            .map(|result| result.token)
            .map_err(|e| {
                error!(error = %e, "Failed to generate access token");
                AuthError::Internal("Failed to generate token".into())
            })
    }

    fn new_refresh_record(&self, email: &str, now: DateTime<Utc>) -> RefreshTokenRecord {
        RefreshTokenRecord {
            token: generate_refresh_token(),
            email: email.to_string(),
            created_at: now,
            expires_at: now + self.settings.refresh_ttl,
            revoked: false,
        }
    }

    /// Run a store call under the configured timeout.
    async fn with_timeout<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<Result<T, StoreError>, AuthError> {
        tokio::time::timeout(self.settings.store_timeout, call)
            .await
            .map_err(|_| {
                error!(
                    operation,
                    timeout_ms = self.settings.store_timeout.as_millis() as u64,
                    "Store call timed out"
                );
                AuthError::Unavailable
            })
    }

    /// Run a store call under the timeout, reporting every failure as unavailable.
    async fn store<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, AuthError> {
        self.with_timeout(operation, call)
            .await?
            .map_err(|e| store_failure(operation, e))
    }
}

fn store_failure(operation: &'static str, e: StoreError) -> AuthError {
    error!(operation, error = %e, "Store call failed");
    AuthError::Unavailable
}

/// Syntactic email check: one `@`, a non-empty local part and a dotted domain.
pub fn validate_email(email: &str) -> Result<(), AuthError> {
    let invalid = || AuthError::Validation("Invalid email address".into());

    if email.is_empty() || email.len() > MAX_EMAIL_LEN {
        return Err(invalid());
    }
    if email.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    if !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || domain.contains("..")
    {
        return Err(invalid());
    }

    Ok(())
}

/// Failures of token service operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Email already registered
    AlreadyExists,
    /// Unknown email or wrong password (indistinguishable on purpose)
    InvalidCredentials,
    /// Token unknown, revoked, malformed, or badly signed
    InvalidToken,
    /// Token past its expiry
    Expired,
    /// No refresh token with that value
    NotFound,
    /// Malformed input
    Validation(String),
    /// Store unreachable or timed out
    Unavailable,
    /// Signing or hashing failed
    Internal(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::AlreadyExists => write!(f, "User already exists"),
            AuthError::InvalidCredentials => write!(f, "Invalid email or password"),
            AuthError::InvalidToken => write!(f, "Invalid token"),
            AuthError::Expired => write!(f, "Token has expired"),
            AuthError::NotFound => write!(f, "Refresh token not found"),
            AuthError::Validation(msg) => write!(f, "{msg}"),
            AuthError::Unavailable => write!(f, "Service temporarily unavailable"),
            AuthError::Internal(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for AuthError {}
