#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use mesa_auth::{ServerConfig, create_app, db::Database};
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"test-jwt-secret-at-least-32-chars!";

/// Lowest bcrypt cost, keeps the suite fast.
pub const TEST_BCRYPT_COST: u32 = 4;

pub async fn create_test_app() -> (Router, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let mut config = ServerConfig::new(db.clone(), TEST_SECRET);
    config.bcrypt_cost = TEST_BCRYPT_COST;
    let app = create_app(&config).expect("Failed to build app");
    (app, db)
}

/// SQLite file under the temp dir, removed together with its WAL files on drop.
pub struct TempDbPath(pub std::path::PathBuf);

impl Drop for TempDbPath {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut path = self.0.clone().into_os_string();
            path.push(suffix);
            let _ = std::fs::remove_file(path);
        }
    }
}

/// App backed by a file database, so the pool hands out several connections.
pub async fn create_file_test_app() -> (Router, Database, TempDbPath) {
    let path = TempDbPath(
        std::env::temp_dir().join(format!("mesa-auth-test-{}.db", uuid::Uuid::new_v4())),
    );
    let db = Database::open(path.0.to_str().unwrap())
        .await
        .expect("Failed to open test database");
    let mut config = ServerConfig::new(db.clone(), TEST_SECRET);
    config.bcrypt_cost = TEST_BCRYPT_COST;
    let app = create_app(&config).expect("Failed to build app");
    (app, db, path)
}

pub fn jwt() -> mesa_auth::jwt::JwtConfig {
    mesa_auth::jwt::JwtConfig::new(TEST_SECRET)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn post_form(app: &Router, uri: &str, body: &str) -> Response<Body> {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn get_me(app: &Router, access_token: Option<&str>) -> Response<Body> {
    let mut request = Request::builder().method("GET").uri("/me");
    if let Some(token) = access_token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    send(app, request.body(Body::empty()).unwrap()).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub async fn register(app: &Router, email: &str, password: &str) -> Response<Body> {
    post_json(
        app,
        "/register",
        serde_json::json!({ "email": email, "password": password }),
    )
    .await
}

pub async fn login(app: &Router, email: &str, password: &str) -> Response<Body> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("username", email)
        .append_pair("password", password)
        .finish();
    post_form(app, "/login", &body).await
}

/// Register and log in, returning the login response body.
pub async fn register_and_login(app: &Router, email: &str, password: &str) -> serde_json::Value {
    assert_eq!(
        register(app, email, password).await.status(),
        StatusCode::CREATED
    );
    let response = login(app, email, password).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

pub async fn refresh(app: &Router, refresh_token: &str) -> Response<Body> {
    post_json(
        app,
        "/refresh",
        serde_json::json!({ "refresh_token": refresh_token }),
    )
    .await
}

pub async fn logout(app: &Router, refresh_token: &str) -> Response<Body> {
    post_json(
        app,
        "/logout",
        serde_json::json!({ "refresh_token": refresh_token }),
    )
    .await
}
