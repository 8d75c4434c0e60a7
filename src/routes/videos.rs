// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public video gallery.

use crate::error::Result;
use crate::models::VideoRecord;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/videos", get(list_videos))
}

/// Video record as returned to the front-end.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct VideoResponse {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub video_url: String,
    pub thumbnail_url: Option<String>,
    /// RFC 3339, UTC
    pub created_at: String,
}

impl From<VideoRecord> for VideoResponse {
    fn from(video: VideoRecord) -> Self {
        Self {
            id: video.id,
            user_id: video.user_id,
            title: video.title,
            description: video.description,
            video_url: video.video_url,
            thumbnail_url: video.thumbnail_url,
            created_at: video.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

#[derive(Deserialize)]
pub struct GalleryParams {
    #[serde(default)]
    user_id: Option<String>,
}

/// List videos, newest first, optionally for one owner.
async fn list_videos(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GalleryParams>,
) -> Result<Json<Vec<VideoResponse>>> {
    let owner = params.user_id.as_deref().filter(|id| !id.is_empty());
    let videos = state.gallery.list(owner).await?;

    Ok(Json(videos.into_iter().map(VideoResponse::from).collect()))
}
