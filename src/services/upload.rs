// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Media upload pipeline.
//!
//! One upload attempt moves through
//! `Idle -> Validating -> Uploading -> Uploaded -> Saved`, or to `Failed`
//! after validation. Every attempt gets a generation number; a transition
//! made on behalf of an attempt that has since been reset or replaced is
//! dropped, so a late completion cannot overwrite newer state.

use crate::error::{AppError, Result};
use crate::models::{Identity, NewVideoRecord, VideoRecord};
use crate::providers::{ObjectStore, ProgressFn, ProviderError};
use crate::services::VideoRepository;
use bytes::Bytes;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Stored progress stays below this until the store acknowledges the object.
const MAX_STORE_PROGRESS: u8 = 99;

/// Pipeline state as observed by the front-end.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadState {
    Idle,
    Validating,
    Uploading {
        progress: u8,
    },
    Uploaded {
        video_url: String,
        /// Object path in the bucket
        path: String,
    },
    Saved {
        video: VideoRecord,
    },
    Failed {
        reason: String,
    },
}

/// A file handed to the pipeline with its declared media type.
#[derive(Debug, Clone)]
pub struct VideoFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl VideoFile {
    pub fn is_video(&self) -> bool {
        self.content_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("video/")
    }
}

/// File extension for a stored object: from the file name if it has one,
/// else from the media subtype.
pub fn extension(file_name: &str, content_type: &str) -> String {
    if let Some((stem, ext)) = file_name.rsplit_once('.') {
        if !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return ext.to_ascii_lowercase();
        }
    }

    let subtype = content_type
        .split(';')
        .next()
        .and_then(|essence| essence.trim().split_once('/'))
        .map(|(_, subtype)| subtype.to_ascii_lowercase())
        .unwrap_or_default();

    match subtype.as_str() {
        "quicktime" => "mov".to_string(),
        "x-matroska" => "mkv".to_string(),
        "x-msvideo" => "avi".to_string(),
        "x-ms-wmv" => "wmv".to_string(),
        s if !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric()) => s.to_string(),
        _ => "bin".to_string(),
    }
}

/// Storage key: `{user_id}/{timestamp_ms}.{ext}`.
///
/// Two uploads by one user in the same millisecond collide; the pipeline
/// retries once with a later timestamp.
pub fn object_key(user_id: &str, timestamp_ms: i64, ext: &str) -> String {
    format!("{}/{}.{}", user_id, timestamp_ms, ext)
}

struct PipelineState {
    state: watch::Sender<UploadState>,
    /// Current attempt generation; only changed while holding the watch lock.
    attempt: AtomicU64,
}

impl PipelineState {
    /// Start a new attempt in `Validating`, superseding any older one.
    /// Returns the attempt and the state it replaced.
    fn begin(&self) -> (u64, UploadState) {
        let mut attempt = 0;
        let mut previous = UploadState::Idle;
        self.state.send_modify(|state| {
            attempt = self.attempt.fetch_add(1, Ordering::SeqCst) + 1;
            previous = std::mem::replace(state, UploadState::Validating);
        });
        (attempt, previous)
    }

    /// Return to `Idle`, superseding any attempt. Returns the replaced state.
    fn abandon(&self) -> UploadState {
        let mut previous = UploadState::Idle;
        self.state.send_modify(|state| {
            self.attempt.fetch_add(1, Ordering::SeqCst);
            previous = std::mem::replace(state, UploadState::Idle);
        });
        previous
    }

    /// Apply `f` if `attempt` is still current. Returns whether it was.
    fn transition<F>(&self, attempt: u64, f: F) -> bool
    where
        F: FnOnce(&mut UploadState) -> bool,
    {
        let mut current = false;
        self.state.send_if_modified(|state| {
            if self.attempt.load(Ordering::SeqCst) != attempt {
                return false;
            }
            current = true;
            f(state)
        });
        current
    }

    fn set(&self, attempt: u64, next: UploadState) -> bool {
        self.transition(attempt, |state| {
            *state = next;
            true
        })
    }

    /// Raise upload progress; never lowers it.
    fn advance(&self, attempt: u64, progress: u8) {
        self.transition(attempt, |state| match state {
            UploadState::Validating => {
                *state = UploadState::Uploading { progress };
                true
            }
            UploadState::Uploading { progress: current } if progress > *current => {
                *current = progress;
                true
            }
            _ => false,
        });
    }
}

/// Upload pipeline for one session.
#[derive(Clone)]
pub struct UploadPipeline {
    inner: Arc<PipelineState>,
    objects: Arc<dyn ObjectStore>,
    videos: VideoRepository,
}

impl UploadPipeline {
    pub fn new(objects: Arc<dyn ObjectStore>, videos: VideoRepository) -> Self {
        let (state, _) = watch::channel(UploadState::Idle);
        Self {
            inner: Arc::new(PipelineState {
                state,
                attempt: AtomicU64::new(0),
            }),
            objects,
            videos,
        }
    }

    pub fn state(&self) -> UploadState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadState> {
        self.inner.state.subscribe()
    }

    /// Validate and store a video, then resolve its public URL.
    ///
    /// A non-video media type is rejected before any state change or
    /// storage call. If the attempt is reset while the upload is in flight,
    /// the stored object is left orphaned and the current state is returned.
    pub async fn upload_video(&self, owner: &Identity, file: &VideoFile) -> Result<UploadState> {
        if !file.is_video() {
            tracing::info!(content_type = %file.content_type, "Rejected non-video upload");
            return Err(AppError::InvalidFileType(file.content_type.clone()));
        }

        let (attempt, previous) = self.inner.begin();
        warn_if_orphaned(&previous, "New upload started before details were saved");

        if file.bytes.is_empty() {
            let err = AppError::Validation("The selected file is empty".to_string());
            self.inner.set(
                attempt,
                UploadState::Failed {
                    reason: err.description(),
                },
            );
            return Err(err);
        }

        let ext = extension(&file.name, &file.content_type);
        let mut timestamp = chrono::Utc::now().timestamp_millis();
        let mut retried = false;
        self.inner.advance(attempt, 0);

        let path = loop {
            let key = object_key(&owner.id, timestamp, &ext);
            tracing::info!(
                user_id = %owner.id,
                key = %key,
                size = file.bytes.len(),
                "Uploading video"
            );

            let progress: ProgressFn = {
                let inner = Arc::clone(&self.inner);
                Arc::new(move |pct| inner.advance(attempt, pct.min(MAX_STORE_PROGRESS)))
            };

            match self
                .objects
                .upload(&key, &file.content_type, file.bytes.clone(), progress)
                .await
            {
                Ok(path) => break path,
                // Same user, same millisecond: one retry under a later key.
                Err(err) if err.is_conflict() && !retried => {
                    tracing::debug!(key = %key, "Object key taken; retrying");
                    retried = true;
                    timestamp = chrono::Utc::now().timestamp_millis().max(timestamp + 1);
                }
                Err(err) => {
                    let err = upload_error(err);
                    tracing::warn!(key = %key, error = %err, "Video upload failed");
                    self.inner.set(
                        attempt,
                        UploadState::Failed {
                            reason: err.description(),
                        },
                    );
                    return Err(err);
                }
            }
        };

        self.inner.advance(attempt, 100);
        let video_url = self.objects.public_url(&path);
        let current = self.inner.set(
            attempt,
            UploadState::Uploaded {
                video_url,
                path: path.clone(),
            },
        );

        if !current {
            tracing::warn!(path = %path, "Upload finished after reset; stored object is orphaned");
        } else {
            tracing::info!(path = %path, "Video uploaded");
        }
        Ok(self.state())
    }

    /// Write the metadata record for the uploaded video.
    ///
    /// Only valid in `Uploaded`. On failure the pipeline stays in
    /// `Uploaded` so the write can be retried.
    pub async fn save_video_details(
        &self,
        owner: &Identity,
        title: &str,
        description: &str,
    ) -> Result<VideoRecord> {
        let title = title.trim();
        let description = description.trim();
        if title.is_empty() || description.is_empty() {
            return Err(AppError::Validation(
                "Please provide a title and description for your video".to_string(),
            ));
        }

        let (attempt, video_url) = {
            let state = self.inner.state.borrow();
            match &*state {
                UploadState::Uploaded { video_url, .. } => (
                    self.inner.attempt.load(Ordering::SeqCst),
                    video_url.clone(),
                ),
                _ => {
                    return Err(AppError::Validation(
                        "Upload a video before saving its details".to_string(),
                    ))
                }
            }
        };

        let record = self
            .videos
            .insert(&NewVideoRecord {
                user_id: owner.id.clone(),
                title: title.to_string(),
                description: description.to_string(),
                video_url,
                thumbnail_url: None,
            })
            .await?;

        self.inner.set(
            attempt,
            UploadState::Saved {
                video: record.clone(),
            },
        );
        Ok(record)
    }

    /// Return to `Idle`, abandoning local tracking of any attempt. Remote
    /// objects are not deleted.
    pub fn reset(&self) {
        let previous = self.inner.abandon();
        warn_if_orphaned(&previous, "Upload reset before details were saved");
    }
}

/// Path of a stored object that no metadata record will point to.
fn orphaned_path(previous: &UploadState) -> Option<&str> {
    match previous {
        UploadState::Uploaded { path, .. } => Some(path),
        _ => None,
    }
}

fn warn_if_orphaned(previous: &UploadState, reason: &str) {
    if let Some(path) = orphaned_path(previous) {
        tracing::warn!(path = %path, "{}; stored object is orphaned", reason);
    }
}

fn upload_error(err: ProviderError) -> AppError {
    if err.is_transport() {
        AppError::Network(err.to_string())
    } else {
        AppError::UploadFailed(err.to_string())
    }
}
