// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-session context and the registry that owns them.
//!
//! A [`SessionContext`] wires the session store, auth gateway, repositories
//! and upload pipeline for one browser session over its own backend client.
//! Contexts are created on login/registration, dropped on logout, and shut
//! down together when the server stops.

use crate::error::{AppError, Result};
use crate::models::{Identity, Profile, ProfileDraft, VideoRecord};
use crate::providers::Backend;
use crate::services::{
    AuthGateway, ProfileRepository, Registration, RegistrationForm, SessionSnapshot,
    SessionStore, UploadPipeline, UploadState, VideoFile, VideoRepository,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::task::AbortHandle;
use uuid::Uuid;
use validator::Validate;

/// Lifetime of a session context, matching the session cookie.
pub const SESSION_TTL_DAYS: i64 = 30;

pub struct SessionContext {
    id: Uuid,
    store: Arc<SessionStore>,
    auth: AuthGateway,
    profiles: ProfileRepository,
    videos: VideoRepository,
    uploads: UploadPipeline,
    listener: AbortHandle,
}

impl SessionContext {
    /// Build a context over `backend`, load any existing provider session,
    /// and start following the provider's auth-state stream.
    pub async fn start(backend: Backend) -> Arc<Self> {
        let profiles = ProfileRepository::new(backend.rows.clone());
        let videos = VideoRepository::new(backend.rows.clone());
        let store = Arc::new(SessionStore::new(profiles.clone()));

        store.initialize(backend.identity.as_ref()).await;
        let listener = store
            .spawn_listener(backend.identity.clone())
            .abort_handle();

        let auth = AuthGateway::new(backend.identity.clone(), store.clone(), profiles.clone());
        let uploads = UploadPipeline::new(backend.objects.clone(), videos.clone());

        Arc::new(Self {
            id: Uuid::new_v4(),
            store,
            auth,
            profiles,
            videos,
            uploads,
            listener,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn current(&self) -> Option<Identity> {
        self.store.current()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.store.snapshot()
    }

    pub fn require_identity(&self) -> Result<Identity> {
        self.store.current().ok_or(AppError::Unauthorized)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Identity> {
        self.auth.login(email, password).await
    }

    pub async fn register(&self, form: &RegistrationForm) -> Result<Registration> {
        self.auth.register(form).await
    }

    pub async fn logout(&self) -> Result<()> {
        self.uploads.reset();
        self.auth.logout().await
    }

    /// Validate and save an edited profile, then refresh the paired profile.
    pub async fn update_profile(&self, draft: ProfileDraft) -> Result<Profile> {
        let identity = self.require_identity()?;
        draft.validate()?;

        self.profiles
            .update(&identity.id, &draft.into_update())
            .await?;

        let profile = self
            .profiles
            .fetch(&identity.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

        self.store
            .set_profile_for(&identity.id, Some(profile.clone()));
        Ok(profile)
    }

    pub async fn upload_video(&self, file: &VideoFile) -> Result<UploadState> {
        let identity = self.require_identity()?;
        self.uploads.upload_video(&identity, file).await
    }

    pub async fn save_video_details(&self, title: &str, description: &str) -> Result<VideoRecord> {
        let identity = self.require_identity()?;
        self.uploads
            .save_video_details(&identity, title, description)
            .await
    }

    pub fn reset_upload(&self) {
        self.uploads.reset();
    }

    pub fn upload_state(&self) -> UploadState {
        self.uploads.state()
    }

    pub fn uploads(&self) -> &UploadPipeline {
        &self.uploads
    }

    pub async fn list_videos(&self, owner: Option<&str>) -> Result<Vec<VideoRecord>> {
        self.videos.list(owner).await
    }

    /// Stop following provider events.
    pub fn shutdown(&self) {
        self.listener.abort();
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

struct RegistryEntry {
    context: Arc<SessionContext>,
    expires_at: DateTime<Utc>,
}

/// Live session contexts keyed by session ID.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<Uuid, RegistryEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a context; expired contexts are pruned first.
    pub fn insert(&self, context: Arc<SessionContext>) -> Uuid {
        let now = Utc::now();
        self.prune(now);

        let id = context.id();
        self.sessions.insert(
            id,
            RegistryEntry {
                context,
                expires_at: now + Duration::days(SESSION_TTL_DAYS),
            },
        );
        tracing::debug!(session_id = %id, live = self.sessions.len(), "Session registered");
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<SessionContext>> {
        let context = {
            let entry = self.sessions.get(id)?;
            if entry.expires_at > Utc::now() {
                return Some(entry.context.clone());
            }
            entry.context.clone()
        };

        tracing::debug!(session_id = %id, "Session expired");
        self.sessions.remove(id);
        context.shutdown();
        None
    }

    pub fn remove(&self, id: &Uuid) -> Option<Arc<SessionContext>> {
        let (_, entry) = self.sessions.remove(id)?;
        entry.context.shutdown();
        Some(entry.context)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn prune(&self, now: DateTime<Utc>) {
        self.sessions.retain(|id, entry| {
            let live = entry.expires_at > now;
            if !live {
                tracing::debug!(session_id = %id, "Pruning expired session");
                entry.context.shutdown();
            }
            live
        });
    }

    /// Shut down and drop every context.
    pub fn shutdown_all(&self) {
        let count = self.sessions.len();
        for entry in self.sessions.iter() {
            entry.context.shutdown();
        }
        self.sessions.clear();
        tracing::info!(count, "Session contexts shut down");
    }
}
