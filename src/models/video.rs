//! Skill video metadata model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata row in `skill_videos` referencing an uploaded video object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: String,
    /// Owner (identity ID)
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub video_url: String,
    pub thumbnail_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload; `id` and `created_at` are assigned by the row store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewVideoRecord {
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub video_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}
