//! JWT access token generation and validation.
//!
//! Access tokens are stateless: they are verified by signature and expiry
//! alone. Expiry is checked against the caller-supplied time so the service
//! clock stays the single source of truth.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::store::UserRole;

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user email)
    pub sub: String,
    /// User role at issuance. Informational only, validation re-reads the user.
    #[serde(default)]
    pub role: UserRole,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Access token duration: 60 minutes
pub const DEFAULT_ACCESS_TOKEN_MINUTES: i64 = 60;

/// Configuration for JWT operations.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
}

/// Result of generating an access token.
#[derive(Debug, Clone)]
pub struct AccessTokenResult {
    /// The JWT token string
    pub token: String,
    /// Expiration time
    pub expires_at: DateTime<Utc>,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl: Duration::minutes(DEFAULT_ACCESS_TOKEN_MINUTES),
        }
    }

    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    /// Generate an access token for a user.
    pub fn generate_access_token(
        &self,
        email: &str,
        role: UserRole,
        now: DateTime<Utc>,
    ) -> Result<AccessTokenResult, JwtError> {
        let expires_at = now + self.access_ttl;

        let claims = AccessClaims {
            sub: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)?;

        Ok(AccessTokenResult { token, expires_at })
    }

    /// Validate and decode an access token.
    pub fn validate_access_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let token_data =
            jsonwebtoken::decode::<AccessClaims>(token, &self.decoding_key, &validation)
                .map_err(JwtError::Decoding)?;

        let claims = token_data.claims;
        if claims.sub.is_empty() {
            return Err(JwtError::MissingSubject);
        }
        if claims.exp <= now.timestamp() {
            return Err(JwtError::Expired);
        }

        Ok(claims)
    }
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Bad signature, wrong algorithm, or malformed token
    Decoding(jsonwebtoken::errors::Error),
    /// Subject claim is empty
    MissingSubject,
    /// Expiration time has passed
    Expired,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            JwtError::MissingSubject => write!(f, "Token has no subject"),
            JwtError::Expired => write!(f, "Token has expired"),
        }
    }
}

impl std::error::Error for JwtError {}
