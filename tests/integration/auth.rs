use super::*;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, Set};
use talktodata::auth::{api_key_prefix, generate_api_key, hash_api_key};
use talktodata::models::internal::NewApiKey;
use talktodata::storage::entities::users;
use talktodata::storage::{ApiKeyStore, UserStore};

/// Stores an API key for `email` directly, bypassing the endpoint's limits.
async fn issue_key(app: &TestApp, email: &str, expires_at: Option<chrono::DateTime<Utc>>) -> String {
    let user = app.repo.find_user_by_email(email).await.unwrap().unwrap();
    let key = generate_api_key();
    app.repo
        .create_api_key(NewApiKey {
            user_id: user.id,
            name: "direct".to_string(),
            key_hash: hash_api_key(&key),
            key_prefix: api_key_prefix(&key),
            scopes: vec![],
            rate_limit_per_minute: 60,
            rate_limit_per_day: 1000,
            expires_at,
        })
        .await
        .unwrap();
    key
}

async fn deactivate(app: &TestApp, email: &str) {
    let user = app.repo.find_user_by_email(email).await.unwrap().unwrap();
    let mut active: users::ActiveModel = user.into();
    active.is_active = Set(false);
    active.update(app.repo.get_db()).await.unwrap();
}

#[tokio::test]
async fn test_register_login_and_me() {
    let app = create_test_app().await;

    let (status, user) = app
        .send(
            "POST",
            "/api/v1/auth/register",
            &[],
            Some(json!({"email": "Ana@Example.com", "password": TEST_PASSWORD})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["email"], "ana@example.com");
    assert_eq!(user["is_superuser"], false);
    assert!(user.get("hashed_password").is_none());

    let (status, tokens) = app.login("ana@example.com", TEST_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tokens["token_type"], "bearer");
    let access = tokens["access_token"].as_str().unwrap();

    let (status, me) = app.get("/api/v1/auth/me", access).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], user["id"]);
}

#[tokio::test]
async fn test_duplicate_registration_rejected() {
    let app = create_test_app().await;
    app.register_and_login("dup@example.com").await;

    let (status, body) = app
        .send(
            "POST",
            "/api/v1/auth/register",
            &[],
            Some(json!({"email": "DUP@example.com", "password": TEST_PASSWORD})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Email already registered");
}

#[tokio::test]
async fn test_register_validation() {
    let app = create_test_app().await;

    let (status, body) = app
        .send(
            "POST",
            "/api/v1/auth/register",
            &[],
            Some(json!({"email": "short@example.com", "password": "123"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].is_string());

    let (status, _) = app
        .send(
            "POST",
            "/api/v1/auth/register",
            &[],
            Some(json!({"email": "not-an-email", "password": TEST_PASSWORD})),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_login_wrong_password() {
    let app = create_test_app().await;
    app.register_and_login("wrong@example.com").await;

    let (status, body) = app.login("wrong@example.com", "not-the-password").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Incorrect email or password");

    let (status, _) = app.login("nobody@example.com", TEST_PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_or_bad_token() {
    let app = create_test_app().await;

    let (status, body) = app.send("GET", "/api/v1/auth/me", &[], None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Could not validate credentials");

    let (status, _) = app.get("/api/v1/auth/me", "not.a.jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_token_flow() {
    let app = create_test_app().await;
    app.register_and_login("refresh@example.com").await;
    let (_, tokens) = app.login("refresh@example.com", TEST_PASSWORD).await;

    let (status, refreshed) = app
        .send(
            "POST",
            "/api/v1/auth/refresh",
            &[],
            Some(json!({"refresh_token": tokens["refresh_token"]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let access = refreshed["access_token"].as_str().unwrap();
    let (status, _) = app.get("/api/v1/auth/me", access).await;
    assert_eq!(status, StatusCode::OK);

    // An access token is not accepted as a refresh token, and vice versa
    let (status, _) = app
        .send(
            "POST",
            "/api/v1/auth/refresh",
            &[],
            Some(json!({"refresh_token": tokens["access_token"]})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .get("/api/v1/auth/me", tokens["refresh_token"].as_str().unwrap())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_me() {
    let app = create_test_app().await;
    let token = app.register_and_login("update@example.com").await;
    app.register_and_login("taken@example.com").await;

    let (status, user) = app
        .put(
            "/api/v1/auth/me",
            &token,
            json!({"full_name": "Renamed", "preferences": {"theme": "dark"}}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["full_name"], "Renamed");
    assert_eq!(user["preferences"]["theme"], "dark");

    let (status, body) = app
        .put("/api/v1/auth/me", &token, json!({"email": "taken@example.com"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Email already registered");

    let (status, _) = app
        .put("/api/v1/auth/me", &token, json!({"password": "a-brand-new-password"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.login("update@example.com", "a-brand-new-password").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_api_key_lifecycle() {
    let app = create_test_app().await;
    let token = app.register_and_login("keys@example.com").await;

    let (status, created) = app
        .post(
            "/api/v1/auth/api-keys",
            &token,
            json!({"name": "ci", "scopes": ["queries"], "expires_in_days": 30}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let key = created["key"].as_str().unwrap().to_string();
    assert!(key.starts_with("ttd_"));
    assert_eq!(created["key_prefix"].as_str().unwrap(), &key[..10]);
    assert!(created["expires_at"].is_string());

    // The key authenticates on its own
    let (status, me) = app
        .send("GET", "/api/v1/auth/me", &[("X-API-Key", key.as_str())], None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "keys@example.com");

    let (status, keys) = app.get("/api/v1/auth/api-keys", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(keys.as_array().unwrap().len(), 1);
    assert!(keys[0].get("key").is_none());
    assert!(keys[0]["last_used_at"].is_string());

    let key_id = created["id"].as_str().unwrap();
    let (status, _) = app
        .delete(&format!("/api/v1/auth/api-keys/{}", key_id), &token)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .send("GET", "/api/v1/auth/me", &[("X-API-Key", key.as_str())], None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "API key is inactive");

    let (status, _) = app
        .delete(&format!("/api/v1/auth/api-keys/{}", Uuid::new_v4()), &token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_api_key_falls_back_to_bearer() {
    let app = create_test_app().await;
    let token = app.register_and_login("fallback@example.com").await;
    let auth = format!("Bearer {}", token);

    let (status, _) = app
        .send(
            "GET",
            "/api/v1/auth/me",
            &[("X-API-Key", "ttd_0000000000unknown"), ("Authorization", auth.as_str())],
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send("GET", "/api/v1/auth/me", &[("X-API-Key", "ttd_0000000000unknown")], None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_service_endpoints() {
    let app = create_test_app().await;

    let (status, health) = app.send("GET", "/health", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["app_name"], "TalkToData");

    let (status, root) = app.send("GET", "/", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(root["message"], "Welcome to TalkToData API");
    assert_eq!(root["docs"], "/api/docs");

    let (status, doc) = app.send("GET", "/api/openapi.json", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/v1/queries/ask"].is_object());
}

#[tokio::test]
async fn test_expired_api_key_rejected() {
    let app = create_test_app().await;
    app.register_and_login("expired@example.com").await;

    let stale = issue_key(&app, "expired@example.com", Some(Utc::now() - Duration::hours(1))).await;
    let (status, body) = app
        .send("GET", "/api/v1/auth/me", &[("X-API-Key", stale.as_str())], None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "API key has expired");

    let fresh = issue_key(&app, "expired@example.com", Some(Utc::now() + Duration::days(1))).await;
    let (status, me) = app
        .send("GET", "/api/v1/auth/me", &[("X-API-Key", fresh.as_str())], None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "expired@example.com");
}

#[tokio::test]
async fn test_inactive_user_is_forbidden() {
    let app = create_test_app().await;
    let token = app.register_and_login("dormant@example.com").await;
    let key = issue_key(&app, "dormant@example.com", None).await;

    deactivate(&app, "dormant@example.com").await;

    let (status, body) = app.get("/api/v1/auth/me", &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Inactive user");

    let (status, body) = app
        .send("GET", "/api/v1/auth/me", &[("X-API-Key", key.as_str())], None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Inactive user");

    let (status, body) = app.login("dormant@example.com", TEST_PASSWORD).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Inactive user");
}
