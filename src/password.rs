//! Password hashing via bcrypt.
//!
//! Hashing is deliberately slow, so both hashing and verification run on the
//! blocking thread pool instead of the async workers.

use std::fmt;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_CHARS: usize = 6;

/// Passwords are cut to this many characters before hashing.
pub const MAX_PASSWORD_CHARS: usize = 256;

/// Default bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Hashes and verifies passwords at a fixed bcrypt cost.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
    /// Hash verified against when the user does not exist, so unknown
    /// emails take as long as wrong passwords.
    dummy_hash: String,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self, PasswordError> {
        let dummy_hash = bcrypt::hash("mesa-auth-dummy-password", cost)?;
        Ok(Self { cost, dummy_hash })
    }

    /// Hash a password (truncated to `MAX_PASSWORD_CHARS`).
    pub async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let password = truncate(password).to_string();
        let cost = self.cost;
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
        Ok(hash)
    }

    /// Verify a password against a stored hash.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let password = truncate(password).to_string();
        let hash = hash.to_string();
        let matches =
            tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
        Ok(matches)
    }

    /// Spend the same work as a real verification and discard the result.
    pub async fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash).await;
    }
}

fn truncate(password: &str) -> &str {
    match password.char_indices().nth(MAX_PASSWORD_CHARS) {
        Some((idx, _)) => &password[..idx],
        None => password,
    }
}

/// Errors from the hashing backend.
#[derive(Debug)]
pub enum PasswordError {
    Bcrypt(bcrypt::BcryptError),
    Task(tokio::task::JoinError),
}

impl fmt::Display for PasswordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordError::Bcrypt(e) => write!(f, "bcrypt error: {e}"),
            PasswordError::Task(e) => write!(f, "hashing task failed: {e}"),
        }
    }
}

impl std::error::Error for PasswordError {}

impl From<bcrypt::BcryptError> for PasswordError {
    fn from(e: bcrypt::BcryptError) -> Self {
        PasswordError::Bcrypt(e)
    }
}

impl From<tokio::task::JoinError> for PasswordError {
    fn from(e: tokio::task::JoinError) -> Self {
        PasswordError::Task(e)
    }
}
