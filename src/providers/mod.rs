// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Backend provider seams.
//!
//! The application delegates identity, row storage and object storage to a
//! backend-as-a-service. These traits describe only what the core needs:
//! - [`IdentityProvider`]: password sign-in/sign-up, sign-out, session state
//! - [`RowStore`]: keyed selects, single-row updates and inserts
//! - [`ObjectStore`]: uploads under caller-chosen keys and public URLs
//!
//! Errors come back as [`ProviderError`] and are converted into
//! [`crate::error::AppError`] by the gateway and repositories.

pub mod memory;
pub mod supabase;

use crate::models::{AuthSession, Identity};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

pub use memory::{FailPoint, MemoryBackend};
pub use supabase::{SupabaseClient, SupabaseProject};

/// Table names as constants.
pub mod tables {
    pub const PROFILES: &str = "profiles";
    pub const SKILL_VIDEOS: &str = "skill_videos";
}

/// Raw provider failure, before conversion into an application error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// Request never produced a response (DNS, connect, TLS, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// Provider answered with an error status.
    #[error("provider error (HTTP {status}, code {code:?}): {message}")]
    Api {
        status: u16,
        /// Structured error code, e.g. `email_not_confirmed`
        code: Option<String>,
        message: String,
    },

    /// Provider answered successfully but the body was not understood.
    #[error("unexpected provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn api(status: u16, code: Option<&str>, message: impl Into<String>) -> Self {
        ProviderError::Api {
            status,
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// Structured error code, if the provider sent one.
    pub fn code(&self) -> Option<&str> {
        match self {
            ProviderError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Provider-supplied message, or the error text for non-API failures.
    pub fn message(&self) -> String {
        match self {
            ProviderError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Object or row already exists (storage reports `Duplicate`).
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409) || self.code() == Some("Duplicate")
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ProviderError::Transport(_))
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

// ─── Identity ────────────────────────────────────────────────

/// User metadata attached at sign-up.
#[derive(Debug, Clone, Serialize)]
pub struct SignUpMetadata {
    pub first_name: String,
    pub last_name: String,
}

/// Result of a sign-up. `session` is `None` when the provider requires the
/// email address to be confirmed before the first sign-in.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub identity: Identity,
    pub session: Option<AuthSession>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Session change published by an identity provider.
#[derive(Debug, Clone)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<AuthSession>,
}

impl AuthEvent {
    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(|s| &s.identity)
    }
}

/// Capacity of per-client auth event channels.
pub(crate) const AUTH_EVENT_CAPACITY: usize = 16;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> ProviderResult<AuthSession>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> ProviderResult<SignUpOutcome>;

    /// End the current session. Local session state is dropped even when the
    /// remote call fails.
    async fn sign_out(&self) -> ProviderResult<()>;

    /// Current session, refreshing it first if it has expired.
    async fn get_session(&self) -> ProviderResult<Option<AuthSession>>;

    /// Stream of session changes for this client.
    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent>;
}

// ─── Rows ────────────────────────────────────────────────────

/// Select parameters: optional equality filter and ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowQuery {
    pub eq: Option<(String, String)>,
    pub order_by: Option<(String, SortDirection)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl RowQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.eq = Some((column.to_string(), value.to_string()));
        self
    }

    pub fn order_by(mut self, column: &str, direction: SortDirection) -> Self {
        self.order_by = Some((column.to_string(), direction));
        self
    }
}

#[async_trait]
pub trait RowStore: Send + Sync {
    async fn select(&self, table: &str, query: &RowQuery) -> ProviderResult<Vec<serde_json::Value>>;

    /// Update rows where `column = value`; returns the updated rows.
    async fn update(
        &self,
        table: &str,
        column: &str,
        value: &str,
        fields: serde_json::Value,
    ) -> ProviderResult<Vec<serde_json::Value>>;

    /// Insert one row; returns it as stored (with generated columns).
    async fn insert(&self, table: &str, row: serde_json::Value) -> ProviderResult<serde_json::Value>;
}

// ─── Objects ─────────────────────────────────────────────────

/// Upload progress callback, called with a percentage in `0..=100`.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`; returns the stored object path.
    async fn upload(
        &self,
        key: &str,
        content_type: &str,
        bytes: Bytes,
        progress: ProgressFn,
    ) -> ProviderResult<String>;

    /// Publicly readable URL for a stored object path.
    fn public_url(&self, path: &str) -> String;
}

// ─── Backend bundle ──────────────────────────────────────────

/// Provider handles for one client session.
#[derive(Clone)]
pub struct Backend {
    pub identity: Arc<dyn IdentityProvider>,
    pub rows: Arc<dyn RowStore>,
    pub objects: Arc<dyn ObjectStore>,
}

impl Backend {
    /// Bundle a client implementing all three seams.
    pub fn from_client<C>(client: C) -> Self
    where
        C: IdentityProvider + RowStore + ObjectStore + 'static,
    {
        let client = Arc::new(client);
        Self {
            identity: client.clone(),
            rows: client.clone(),
            objects: client,
        }
    }
}

/// Source of per-session backend clients.
#[derive(Clone)]
pub enum BackendKind {
    Supabase(SupabaseProject),
    Memory(MemoryBackend),
}

impl BackendKind {
    /// Client with its own session slot; sessions never share auth state.
    pub fn connect(&self) -> Backend {
        match self {
            BackendKind::Supabase(project) => Backend::from_client(project.client()),
            BackendKind::Memory(memory) => Backend::from_client(memory.client()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Supabase(_) => "supabase",
            BackendKind::Memory(_) => "memory",
        }
    }
}
