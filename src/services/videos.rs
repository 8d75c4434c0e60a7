// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Video metadata repository over the `skill_videos` table.

use crate::error::{AppError, Result};
use crate::models::{NewVideoRecord, VideoRecord};
use crate::providers::{tables, RowQuery, RowStore, SortDirection};
use crate::services::profile::repository_error;
use std::sync::Arc;

#[derive(Clone)]
pub struct VideoRepository {
    rows: Arc<dyn RowStore>,
}

impl VideoRepository {
    pub fn new(rows: Arc<dyn RowStore>) -> Self {
        Self { rows }
    }

    /// Insert a record for an already uploaded video.
    pub async fn insert(&self, video: &NewVideoRecord) -> Result<VideoRecord> {
        let row = serde_json::to_value(video)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Video record encoding: {}", e)))?;

        let stored = self
            .rows
            .insert(tables::SKILL_VIDEOS, row)
            .await
            .map_err(repository_error)?;

        let record: VideoRecord = serde_json::from_value(stored)
            .map_err(|e| AppError::Repository(format!("Malformed video row: {}", e)))?;

        tracing::info!(
            video_id = %record.id,
            user_id = %record.user_id,
            "Video record saved"
        );
        Ok(record)
    }

    /// Gallery listing, newest first, optionally for one owner.
    pub async fn list(&self, owner: Option<&str>) -> Result<Vec<VideoRecord>> {
        let mut query = RowQuery::new().order_by("created_at", SortDirection::Descending);
        if let Some(user_id) = owner {
            query = query.eq("user_id", user_id);
        }

        let rows = self
            .rows
            .select(tables::SKILL_VIDEOS, &query)
            .await
            .map_err(repository_error)?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| AppError::Repository(format!("Malformed video row: {}", e)))
            })
            .collect()
    }
}
