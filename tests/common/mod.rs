// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request, Response};
use skill_swap::config::Config;
use skill_swap::providers::{BackendKind, MemoryBackend};
use skill_swap::routes::create_router;
use skill_swap::services::{RegistrationForm, SessionContext};
use skill_swap::AppState;
use std::sync::Arc;
use tower::ServiceExt;

/// Create a test app over a fresh in-memory backend.
/// Returns the router, the shared state and the backend handle.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, MemoryBackend) {
    let config = Config::test_default();
    let memory = MemoryBackend::new(&config.storage_bucket);
    let state = Arc::new(AppState::new(config, BackendKind::Memory(memory.clone())));

    (create_router(state.clone()), state, memory)
}

/// Registration form that passes validation.
#[allow(dead_code)]
pub fn registration(email: &str) -> RegistrationForm {
    RegistrationForm {
        email: email.to_string(),
        password: "secret1".to_string(),
        confirm_password: "secret1".to_string(),
        first_name: "Jo".to_string(),
        last_name: "Do".to_string(),
    }
}

/// Fresh session context over `memory`.
#[allow(dead_code)]
pub async fn start_context(memory: &MemoryBackend) -> Arc<SessionContext> {
    SessionContext::start(BackendKind::Memory(memory.clone()).connect()).await
}

/// Send a JSON request, optionally with a bearer token.
#[allow(dead_code)]
pub async fn send_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
    token: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    app.clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap()
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Register through the API and return the session token.
#[allow(dead_code)]
pub async fn register_user(app: &axum::Router, email: &str) -> (String, serde_json::Value) {
    let response = send_json(
        app,
        "POST",
        "/auth/register",
        Some(serde_json::json!({
            "email": email,
            "password": "secret1",
            "confirm_password": "secret1",
            "first_name": "Jo",
            "last_name": "Do",
        })),
        None,
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);

    let body = body_json(response).await;
    let token = body["token"].as_str().unwrap().to_string();
    (token, body)
}
