//! Token lifecycle endpoints.
//!
//! - POST `/register` - Create an account (JSON)
//! - POST `/login` - Exchange email and password for tokens (form-encoded)
//! - POST `/refresh` - Rotate a refresh token
//! - POST `/logout` - Revoke a refresh token
//! - GET `/me` - Identity behind a bearer access token

use axum::{
    Form, Json, Router,
    extract::{
        State,
        rejection::{FormRejection, JsonRejection},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use crate::auth::Bearer;
use crate::impl_has_token_service;
use crate::service::TokenService;
use crate::store::{UserRole, UserSummary};

/// Token type reported alongside issued access tokens.
const TOKEN_TYPE: &str = "bearer";

#[derive(Clone)]
pub struct AuthState {
    pub service: Arc<TokenService>,
}

impl_has_token_service!(AuthState);

pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .with_state(state)
}

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
    #[serde(default)]
    full_name: Option<String>,
}

async fn register(
    State(state): State<AuthState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;

    let summary = state
        .service
        .register(
            &request.email,
            &request.password,
            request.full_name.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(summary)))
}

/// OAuth2 password-flow form: the email travels as `username`.
#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
    token_type: &'static str,
    role: UserRole,
}

async fn login(
    State(state): State<AuthState>,
    payload: Result<Form<LoginForm>, FormRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Form(form) = payload?;

    let tokens = state.service.login(&form.username, &form.password).await?;

    Ok(Json(LoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: TOKEN_TYPE,
        role: tokens.role,
    }))
}

#[derive(Deserialize)]
struct RefreshTokenRequest {
    refresh_token: String,
}

#[derive(Serialize)]
struct TokenPairResponse {
    access_token: String,
    refresh_token: String,
    token_type: &'static str,
}

async fn refresh(
    State(state): State<AuthState>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let Json(request) = payload?;

    let tokens = state.service.refresh(&request.refresh_token).await?;

    Ok(Json(TokenPairResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: TOKEN_TYPE,
    }))
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

async fn logout(
    State(state): State<AuthState>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload?;

    state.service.logout(&request.refresh_token).await?;

    Ok(Json(MessageResponse {
        message: "Successfully logged out",
    }))
}

async fn me(Bearer(user): Bearer) -> Json<UserSummary> {
    Json(user)
}
