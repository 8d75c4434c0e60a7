// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Upload, profile and gallery endpoints.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;

mod common;

async fn upload(
    app: &axum::Router,
    token: &str,
    content_type: &str,
    bytes: &'static [u8],
) -> axum::http::Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/uploads?filename=lesson.webm")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(bytes))
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_upload_rejects_non_video() {
    let (app, _, memory) = common::create_test_app();
    let (token, _) = common::register_user(&app, "a@x.com").await;

    let response = upload(&app, &token, "text/plain", b"hello").await;

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body = common::body_json(response).await;
    assert_eq!(body["title"], "Upload Error");
    assert_eq!(body["description"], "Please upload a video file");
    assert_eq!(memory.upload_calls(), 0);

    let response = common::send_json(&app, "GET", "/api/uploads", None, Some(&token)).await;
    assert_eq!(
        common::body_json(response).await,
        serde_json::json!({ "status": "idle" })
    );
}

#[tokio::test]
async fn test_upload_save_and_list() {
    let (app, _, _) = common::create_test_app();
    let (token, registered) = common::register_user(&app, "a@x.com").await;
    let user_id = registered["user"]["id"].as_str().unwrap().to_string();

    let response = upload(&app, &token, "video/webm", b"\x1a\x45\xdf\xa3webm").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["notice"]["title"], "Upload Complete");
    assert_eq!(body["state"]["status"], "uploaded");
    let path = body["state"]["path"].as_str().unwrap();
    assert!(path.starts_with(&format!("{}/", user_id)));
    assert!(path.ends_with(".webm"));

    let response = common::send_json(
        &app,
        "POST",
        "/api/uploads/details",
        Some(serde_json::json!({
            "title": "Sourdough starter",
            "description": "Feeding schedule and hydration",
        })),
        Some(&token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["video"]["title"], "Sourdough starter");
    assert!(body["video"]["created_at"].as_str().unwrap().ends_with('Z'));

    let response = common::send_json(
        &app,
        "GET",
        &format!("/videos?user_id={}", user_id),
        None,
        None,
    )
    .await;
    let videos = common::body_json(response).await;
    assert_eq!(videos.as_array().unwrap().len(), 1);
    assert_eq!(videos[0]["user_id"], user_id.as_str());

    let response = common::send_json(&app, "GET", "/videos?user_id=someone-else", None, None).await;
    assert_eq!(common::body_json(response).await, serde_json::json!([]));
}

#[tokio::test]
async fn test_details_before_upload_rejected() {
    let (app, _, memory) = common::create_test_app();
    let (token, _) = common::register_user(&app, "a@x.com").await;

    let response = common::send_json(
        &app,
        "POST",
        "/api/uploads/details",
        Some(serde_json::json!({ "title": "T", "description": "D" })),
        Some(&token),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(memory
        .rows(skill_swap::providers::tables::SKILL_VIDEOS)
        .is_empty());
}

#[tokio::test]
async fn test_reset_upload() {
    let (app, _, memory) = common::create_test_app();
    let (token, _) = common::register_user(&app, "a@x.com").await;
    upload(&app, &token, "video/mp4", b"mp4").await;

    let response = common::send_json(&app, "DELETE", "/api/uploads", None, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        common::body_json(response).await,
        serde_json::json!({ "status": "idle" })
    );
    assert_eq!(memory.object_count(), 1);
}

#[tokio::test]
async fn test_profile_update_replaces_lists() {
    let (app, _, _) = common::create_test_app();
    let (token, _) = common::register_user(&app, "a@x.com").await;

    let update = |offered: serde_json::Value| {
        serde_json::json!({
            "first_name": "Jo",
            "last_name": "Do",
            "skills_offered": offered,
            "skills_wanted": ["Knitting"],
        })
    };

    let response = common::send_json(
        &app,
        "PUT",
        "/api/profile",
        Some(update(serde_json::json!(["A", "B", "A"]))),
        Some(&token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["notice"]["title"], "Profile updated");
    assert_eq!(body["profile"]["skills_offered"], serde_json::json!(["A", "B"]));

    let response = common::send_json(
        &app,
        "PUT",
        "/api/profile",
        Some(update(serde_json::json!(["C"]))),
        Some(&token),
    )
    .await;
    let body = common::body_json(response).await;
    assert_eq!(body["profile"]["skills_offered"], serde_json::json!(["C"]));

    let response = common::send_json(&app, "GET", "/api/me", None, Some(&token)).await;
    let me = common::body_json(response).await;
    assert_eq!(me["profile"]["skills_offered"], serde_json::json!(["C"]));
    assert_eq!(me["profile"]["skills_wanted"], serde_json::json!(["Knitting"]));
    assert_eq!(me["profile"]["points"], 0);
}

#[tokio::test]
async fn test_upload_body_limit() {
    let (app, state, _) = common::create_test_app();
    let (token, _) = common::register_user(&app, "a@x.com").await;

    let oversized = vec![0u8; state.config.max_upload_bytes + 1];
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/uploads?filename=big.mp4")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "video/mp4")
                .body(Body::from(oversized))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
