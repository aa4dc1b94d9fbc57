mod auth;
mod error;
mod health;

use axum::Router;
use std::sync::Arc;

use crate::service::TokenService;

pub use auth::AuthState;
pub use error::ApiError;

/// Create the API router.
pub fn create_api_router(service: Arc<TokenService>) -> Router {
    Router::new()
        .merge(auth::router(AuthState { service }))
        .merge(health::router())
}
