// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process backend used for local development and tests.
//!
//! Mirrors the hosted backend closely enough for the core to be exercised
//! end to end: sign-up creates an empty profile row, profile updates only
//! touch the caller's own row, and video rows must belong to the caller.
//! Fault injection ([`FailPoint`]) and an upload gate let tests drive the
//! failure paths deterministically.

use super::{
    AuthEvent, AuthEventKind, IdentityProvider, ObjectStore, ProgressFn, ProviderError,
    ProviderResult, RowQuery, RowStore, SignUpMetadata, SignUpOutcome, SortDirection,
    AUTH_EVENT_CAPACITY,
};
use crate::models::{AuthSession, Identity};
use crate::providers::tables;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};

const MIN_PASSWORD_LEN: usize = 6;
const PUBLIC_URL_BASE: &str = "memory://";

/// Provider call that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// Sign-in and sign-up fail at the transport level.
    Auth,
    /// Remote sign-out fails at the transport level.
    SignOut,
    /// Row selects are rejected.
    Select,
    /// Row updates are rejected.
    Update,
    /// Row inserts are rejected.
    Insert,
    /// Object uploads are rejected.
    Upload,
}

#[derive(Clone)]
struct MemoryUser {
    identity: Identity,
    password: String,
    confirmed: bool,
}

#[derive(Clone)]
struct StoredObject {
    content_type: String,
    bytes: Bytes,
}

struct MemoryState {
    bucket: String,
    /// Keyed by lowercased email
    users: DashMap<String, MemoryUser>,
    tables: DashMap<String, Vec<serde_json::Value>>,
    objects: DashMap<String, StoredObject>,
    failures: DashSet<FailPoint>,
    require_confirmation: AtomicBool,
    upload_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
    uploads_paused: watch::Sender<bool>,
}

/// Shared in-memory data; [`MemoryBackend::client`] hands out per-session clients.
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<MemoryState>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new("videos")
    }
}

impl MemoryBackend {
    pub fn new(bucket: &str) -> Self {
        let (uploads_paused, _) = watch::channel(false);
        Self {
            state: Arc::new(MemoryState {
                bucket: bucket.to_string(),
                users: DashMap::new(),
                tables: DashMap::new(),
                objects: DashMap::new(),
                failures: DashSet::new(),
                require_confirmation: AtomicBool::new(false),
                upload_calls: AtomicUsize::new(0),
                sign_out_calls: AtomicUsize::new(0),
                uploads_paused,
            }),
        }
    }

    /// New client with an empty session.
    pub fn client(&self) -> MemoryClient {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        MemoryClient {
            backend: self.clone(),
            session: RwLock::new(None),
            events,
        }
    }

    // ─── Test controls ───────────────────────────────────────

    pub fn fail(&self, point: FailPoint) {
        self.state.failures.insert(point);
    }

    pub fn recover(&self, point: FailPoint) {
        self.state.failures.remove(&point);
    }

    /// New accounts must confirm their email before signing in.
    pub fn require_email_confirmation(&self, required: bool) {
        self.state
            .require_confirmation
            .store(required, AtomicOrdering::SeqCst);
    }

    pub fn confirm_email(&self, email: &str) -> bool {
        match self.state.users.get_mut(&email.to_lowercase()) {
            Some(mut user) => {
                user.confirmed = true;
                true
            }
            None => false,
        }
    }

    /// Hold uploads before they store anything until [`resume_uploads`](Self::resume_uploads).
    pub fn pause_uploads(&self) {
        self.state.uploads_paused.send_replace(true);
    }

    pub fn resume_uploads(&self) {
        self.state.uploads_paused.send_replace(false);
    }

    /// Number of upload calls that reached the object store.
    pub fn upload_calls(&self) -> usize {
        self.state.upload_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.state.sign_out_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn object(&self, path: &str) -> Option<(String, Bytes)> {
        self.state
            .objects
            .get(path)
            .map(|o| (o.content_type.clone(), o.bytes.clone()))
    }

    pub fn object_count(&self) -> usize {
        self.state.objects.len()
    }

    pub fn rows(&self, table: &str) -> Vec<serde_json::Value> {
        self.state
            .tables
            .get(table)
            .map(|rows| rows.value().clone())
            .unwrap_or_default()
    }

    fn check(&self, point: FailPoint) -> ProviderResult<()> {
        if !self.state.failures.contains(&point) {
            return Ok(());
        }
        Err(match point {
            FailPoint::Auth | FailPoint::SignOut => {
                ProviderError::Transport("simulated connection reset".to_string())
            }
            FailPoint::Upload => {
                ProviderError::api(500, Some("InternalError"), "simulated storage failure")
            }
            FailPoint::Select | FailPoint::Update | FailPoint::Insert => {
                ProviderError::api(403, Some("42501"), "simulated permission denied")
            }
        })
    }

    fn new_session(identity: Identity) -> AuthSession {
        AuthSession {
            identity,
            access_token: uuid::Uuid::new_v4().to_string(),
            refresh_token: Some(uuid::Uuid::new_v4().to_string()),
            expires_at: Some(chrono::Utc::now() + chrono::Duration::hours(1)),
        }
    }
}

/// Per-session client over a [`MemoryBackend`].
pub struct MemoryClient {
    backend: MemoryBackend,
    session: RwLock<Option<AuthSession>>,
    events: broadcast::Sender<AuthEvent>,
}

impl MemoryClient {
    async fn current_user_id(&self) -> Option<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.identity.id.clone())
    }

    async fn store_session(&self, session: AuthSession) {
        *self.session.write().await = Some(session.clone());
        let _ = self.events.send(AuthEvent {
            kind: AuthEventKind::SignedIn,
            session: Some(session),
        });
    }
}

#[async_trait]
impl IdentityProvider for MemoryClient {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> ProviderResult<AuthSession> {
        self.backend.check(FailPoint::Auth)?;

        let user = self
            .backend
            .state
            .users
            .get(&email.to_lowercase())
            .map(|u| u.value().clone())
            .filter(|u| u.password == password)
            .ok_or_else(|| {
                ProviderError::api(400, Some("invalid_credentials"), "Invalid login credentials")
            })?;

        if !user.confirmed {
            return Err(ProviderError::api(
                400,
                Some("email_not_confirmed"),
                "Email not confirmed",
            ));
        }

        let session = MemoryBackend::new_session(user.identity);
        self.store_session(session.clone()).await;
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _metadata: &SignUpMetadata,
    ) -> ProviderResult<SignUpOutcome> {
        self.backend.check(FailPoint::Auth)?;

        if password.len() < MIN_PASSWORD_LEN {
            return Err(ProviderError::api(
                422,
                Some("weak_password"),
                "Password should be at least 6 characters.",
            ));
        }

        let key = email.to_lowercase();
        let confirmed = !self
            .backend
            .state
            .require_confirmation
            .load(AtomicOrdering::SeqCst);
        let identity = Identity {
            id: uuid::Uuid::new_v4().to_string(),
            email: key.clone(),
        };

        match self.backend.state.users.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(ProviderError::api(
                    422,
                    Some("user_already_exists"),
                    "User already registered",
                ));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(MemoryUser {
                    identity: identity.clone(),
                    password: password.to_string(),
                    confirmed,
                });
            }
        }

        // Stand-in for the sign-up trigger that creates the profile row.
        self.backend
            .state
            .tables
            .entry(tables::PROFILES.to_string())
            .or_default()
            .push(serde_json::json!({
                "id": identity.id,
                "first_name": null,
                "last_name": null,
                "skills_offered": [],
                "skills_wanted": [],
                "points": 0,
            }));

        let session = if confirmed {
            let session = MemoryBackend::new_session(identity.clone());
            self.store_session(session.clone()).await;
            Some(session)
        } else {
            None
        };

        Ok(SignUpOutcome { identity, session })
    }

    async fn sign_out(&self) -> ProviderResult<()> {
        self.backend
            .state
            .sign_out_calls
            .fetch_add(1, AtomicOrdering::SeqCst);

        if self.session.write().await.take().is_some() {
            let _ = self.events.send(AuthEvent {
                kind: AuthEventKind::SignedOut,
                session: None,
            });
        }
        self.backend.check(FailPoint::SignOut)
    }

    async fn get_session(&self) -> ProviderResult<Option<AuthSession>> {
        Ok(self.session.read().await.clone())
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

fn column_matches(row: &serde_json::Value, column: &str, value: &str) -> bool {
    match row.get(column) {
        Some(serde_json::Value::String(s)) => s == value,
        Some(serde_json::Value::Null) | None => false,
        Some(other) => other.to_string() == value,
    }
}

fn compare_column(a: &serde_json::Value, b: &serde_json::Value, column: &str) -> Ordering {
    match (a.get(column), b.get(column)) {
        (Some(serde_json::Value::String(x)), Some(serde_json::Value::String(y))) => x.cmp(y),
        (Some(serde_json::Value::Number(x)), Some(serde_json::Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl RowStore for MemoryClient {
    async fn select(
        &self,
        table: &str,
        query: &RowQuery,
    ) -> ProviderResult<Vec<serde_json::Value>> {
        self.backend.check(FailPoint::Select)?;

        let mut rows: Vec<serde_json::Value> = self
            .backend
            .rows(table)
            .into_iter()
            .filter(|row| match &query.eq {
                Some((column, value)) => column_matches(row, column, value),
                None => true,
            })
            .collect();

        if let Some((column, direction)) = &query.order_by {
            match direction {
                SortDirection::Ascending => rows.sort_by(|a, b| compare_column(a, b, column)),
                SortDirection::Descending => {
                    // Newest insert first among equal keys.
                    rows.reverse();
                    rows.sort_by(|a, b| compare_column(b, a, column));
                }
            }
        }

        Ok(rows)
    }

    async fn update(
        &self,
        table: &str,
        column: &str,
        value: &str,
        fields: serde_json::Value,
    ) -> ProviderResult<Vec<serde_json::Value>> {
        self.backend.check(FailPoint::Update)?;

        let serde_json::Value::Object(fields) = fields else {
            return Err(ProviderError::api(400, Some("PGRST102"), "update body must be an object"));
        };

        // Row-level security: profiles are only writable by their owner.
        let caller = self.current_user_id().await;
        let visible = |row: &serde_json::Value| {
            table != tables::PROFILES
                || caller
                    .as_deref()
                    .is_some_and(|id| column_matches(row, "id", id))
        };

        let mut updated = Vec::new();
        if let Some(mut rows) = self.backend.state.tables.get_mut(table) {
            for row in rows.iter_mut() {
                if !column_matches(row, column, value) || !visible(row) {
                    continue;
                }
                if let serde_json::Value::Object(map) = row {
                    for (k, v) in &fields {
                        map.insert(k.clone(), v.clone());
                    }
                }
                updated.push(row.clone());
            }
        }

        Ok(updated)
    }

    async fn insert(
        &self,
        table: &str,
        row: serde_json::Value,
    ) -> ProviderResult<serde_json::Value> {
        self.backend.check(FailPoint::Insert)?;

        let serde_json::Value::Object(mut map) = row else {
            return Err(ProviderError::api(400, Some("PGRST102"), "insert body must be an object"));
        };

        if table == tables::SKILL_VIDEOS {
            let caller = self.current_user_id().await;
            let owner = map.get("user_id").and_then(|v| v.as_str());
            if caller.is_none() || caller.as_deref() != owner {
                return Err(ProviderError::api(
                    403,
                    Some("42501"),
                    "new row violates row-level security policy for table \"skill_videos\"",
                ));
            }
        }

        map.entry("id")
            .or_insert_with(|| serde_json::Value::String(uuid::Uuid::new_v4().to_string()));
        map.entry("created_at").or_insert_with(|| {
            serde_json::Value::String(
                chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            )
        });

        let row = serde_json::Value::Object(map);
        self.backend
            .state
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }
}

#[async_trait]
impl ObjectStore for MemoryClient {
    async fn upload(
        &self,
        key: &str,
        content_type: &str,
        bytes: Bytes,
        progress: ProgressFn,
    ) -> ProviderResult<String> {
        self.backend
            .state
            .upload_calls
            .fetch_add(1, AtomicOrdering::SeqCst);
        self.backend.check(FailPoint::Upload)?;

        progress(25);
        let mut paused = self.backend.state.uploads_paused.subscribe();
        // Sender lives in the shared state, so the channel cannot close here.
        let _ = paused.wait_for(|paused| !*paused).await;
        progress(50);

        if self.backend.state.objects.contains_key(key) {
            return Err(ProviderError::api(409, Some("Duplicate"), "The resource already exists"));
        }
        progress(75);

        self.backend.state.objects.insert(
            key.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                bytes,
            },
        );
        Ok(key.to_string())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}{}/{}", PUBLIC_URL_BASE, self.backend.state.bucket, path)
    }
}
