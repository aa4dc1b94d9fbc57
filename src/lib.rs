pub mod api;
pub mod auth;
pub mod cli;
pub mod clock;
pub mod db;
pub mod jwt;
pub mod password;
pub mod refresh;
pub mod service;
pub mod store;

use api::create_api_router;
use axum::Router;
use db::Database;
use jwt::JwtConfig;
use password::{DEFAULT_BCRYPT_COST, PasswordError, PasswordHasher};
use service::{TokenService, TokenSettings};
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Access token lifetime
    pub access_ttl: chrono::Duration,
    /// Refresh token lifetime
    pub refresh_ttl: chrono::Duration,
    /// Upper bound for a single database call
    pub store_timeout: std::time::Duration,
    /// bcrypt work factor
    pub bcrypt_cost: u32,
}

impl ServerConfig {
    /// Config with default lifetimes and cost.
    pub fn new(db: Database, jwt_secret: impl Into<Vec<u8>>) -> Self {
        let settings = TokenSettings::default();
        Self {
            db,
            jwt_secret: jwt_secret.into(),
            access_ttl: chrono::Duration::minutes(jwt::DEFAULT_ACCESS_TOKEN_MINUTES),
            refresh_ttl: settings.refresh_ttl,
            store_timeout: settings.store_timeout,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

/// Build the token service described by the configuration.
pub fn create_service(config: &ServerConfig) -> Result<TokenService, PasswordError> {
    let jwt = Arc::new(JwtConfig::new(&config.jwt_secret).with_access_ttl(config.access_ttl));
    let hasher = PasswordHasher::new(config.bcrypt_cost)?;

    Ok(
        TokenService::from_database(&config.db, jwt, hasher).with_settings(TokenSettings {
            refresh_ttl: config.refresh_ttl,
            store_timeout: config.store_timeout,
        }),
    )
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Result<Router, PasswordError> {
    let service = Arc::new(create_service(config)?);
    Ok(create_api_router(service))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config).map_err(std::io::Error::other)?;
    axum::serve(listener, app).await
}
