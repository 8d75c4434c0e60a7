// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::Result;
use crate::middleware::auth::CurrentSession;
use crate::models::{Profile, ProfileDraft};
use crate::routes::videos::VideoResponse;
use crate::routes::Notice;
use crate::services::{SessionSnapshot, UploadState, VideoFile};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query},
    http::{header, HeaderMap},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/profile", put(update_profile))
        .route(
            "/api/uploads",
            get(get_upload)
                .post(upload_video)
                .delete(reset_upload)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/api/uploads/details", post(save_details))
}

// ─── Session & Profile ───────────────────────────────────────

/// Current session: identity, paired profile and store flags.
async fn get_me(Extension(session): Extension<CurrentSession>) -> Json<SessionSnapshot> {
    Json(session.context.snapshot())
}

/// Profile edit as submitted by the editor. Lists replace the stored ones.
#[derive(Deserialize)]
pub struct ProfileRequest {
    first_name: String,
    last_name: String,
    #[serde(default)]
    skills_offered: Vec<String>,
    #[serde(default)]
    skills_wanted: Vec<String>,
}

impl From<ProfileRequest> for ProfileDraft {
    fn from(req: ProfileRequest) -> Self {
        ProfileDraft {
            first_name: req.first_name,
            last_name: req.last_name,
            skills_offered: req.skills_offered.iter().collect(),
            skills_wanted: req.skills_wanted.iter().collect(),
        }
    }
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub notice: Notice,
    pub profile: Profile,
}

async fn update_profile(
    Extension(session): Extension<CurrentSession>,
    Json(req): Json<ProfileRequest>,
) -> Result<Json<ProfileResponse>> {
    let profile = session.context.update_profile(req.into()).await?;

    Ok(Json(ProfileResponse {
        notice: Notice::new("Profile updated", "Your profile has been successfully updated."),
        profile,
    }))
}

// ─── Uploads ─────────────────────────────────────────────────

async fn get_upload(Extension(session): Extension<CurrentSession>) -> Json<UploadState> {
    Json(session.context.upload_state())
}

#[derive(Deserialize)]
pub struct UploadParams {
    #[serde(default)]
    filename: Option<String>,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub notice: Option<Notice>,
    pub state: UploadState,
}

/// Upload a video. The body is the raw file; `Content-Type` is its
/// declared media type.
async fn upload_video(
    Extension(session): Extension<CurrentSession>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadResponse>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let file = VideoFile {
        name: params.filename.unwrap_or_default(),
        content_type,
        bytes: body,
    };

    let state = session.context.upload_video(&file).await?;
    let notice = matches!(state, UploadState::Uploaded { .. }).then(|| {
        Notice::new("Upload Complete", "Your video has been uploaded successfully!")
    });

    Ok(Json(UploadResponse { notice, state }))
}

#[derive(Deserialize)]
pub struct DetailsRequest {
    title: String,
    description: String,
}

#[derive(Serialize)]
pub struct DetailsResponse {
    pub notice: Notice,
    pub video: VideoResponse,
}

async fn save_details(
    Extension(session): Extension<CurrentSession>,
    Json(req): Json<DetailsRequest>,
) -> Result<Json<DetailsResponse>> {
    let video = session
        .context
        .save_video_details(&req.title, &req.description)
        .await?;

    Ok(Json(DetailsResponse {
        notice: Notice::new("Video saved", "Your skill video is now in the gallery."),
        video: video.into(),
    }))
}

/// Abandon the current upload. The stored object, if any, is kept.
async fn reset_upload(Extension(session): Extension<CurrentSession>) -> Json<UploadState> {
    session.context.reset_upload();
    Json(session.context.upload_state())
}
