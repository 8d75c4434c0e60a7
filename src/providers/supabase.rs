// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Supabase client for the identity, row and object seams.
//!
//! Talks to the project's REST surfaces:
//! - `/auth/v1` (GoTrue) for password sign-in, sign-up, refresh and logout
//! - `/rest/v1` (PostgREST) for `profiles` and `skill_videos` rows
//! - `/storage/v1` for video objects
//!
//! Each [`SupabaseClient`] holds one user's session, so row-level security
//! sees the right caller. The HTTP connection pool is shared per project.

use super::{
    AuthEvent, AuthEventKind, IdentityProvider, ObjectStore, ProgressFn, ProviderError,
    ProviderResult, RowQuery, RowStore, SignUpMetadata, SignUpOutcome, SortDirection,
    AUTH_EVENT_CAPACITY,
};
use crate::models::{AuthSession, Identity};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Upload body chunk size; progress is reported once per chunk.
const UPLOAD_CHUNK_SIZE: usize = 256 * 1024;

/// Connection settings shared by every client of one project.
#[derive(Clone)]
pub struct SupabaseProject {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    bucket: String,
}

impl SupabaseProject {
    pub fn new(base_url: &str, anon_key: &str, bucket: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            bucket: bucket.to_string(),
        }
    }

    /// New client with an empty session.
    pub fn client(&self) -> SupabaseClient {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        SupabaseClient {
            project: Arc::new(self.clone()),
            session: RwLock::new(None),
            events,
        }
    }
}

/// Per-session Supabase client.
pub struct SupabaseClient {
    project: Arc<SupabaseProject>,
    session: RwLock<Option<AuthSession>>,
    events: broadcast::Sender<AuthEvent>,
}

impl SupabaseClient {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.project.base_url, path)
    }

    /// Bearer token: the user's access token, or the anon key when signed out.
    async fn bearer(&self) -> String {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.project.anon_key.clone())
    }

    fn request(&self, method: reqwest::Method, url: &str, bearer: &str) -> reqwest::RequestBuilder {
        self.project
            .http
            .request(method, url)
            .header("apikey", &self.project.anon_key)
            .bearer_auth(bearer)
    }

    async fn store_session(&self, session: AuthSession, kind: AuthEventKind) {
        *self.session.write().await = Some(session.clone());
        // No receivers is fine; nobody may be listening yet.
        let _ = self.events.send(AuthEvent {
            kind,
            session: Some(session),
        });
    }

    async fn refresh_session(&self, refresh_token: &str) -> ProviderResult<AuthSession> {
        let response = self
            .request(
                reqwest::Method::POST,
                &self.url("/auth/v1/token?grant_type=refresh_token"),
                &self.project.anon_key,
            )
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(transport)?;

        let token: TokenResponse = check_response_json(response).await?;
        token.into_session()
    }
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> ProviderResult<AuthSession> {
        let response = self
            .request(
                reqwest::Method::POST,
                &self.url("/auth/v1/token?grant_type=password"),
                &self.project.anon_key,
            )
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(transport)?;

        let token: TokenResponse = check_response_json(response).await?;
        let session = token.into_session()?;
        tracing::debug!(user_id = %session.identity.id, "Password sign-in accepted");
        self.store_session(session.clone(), AuthEventKind::SignedIn).await;
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> ProviderResult<SignUpOutcome> {
        let response = self
            .request(
                reqwest::Method::POST,
                &self.url("/auth/v1/signup"),
                &self.project.anon_key,
            )
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": metadata,
            }))
            .send()
            .await
            .map_err(transport)?;

        match check_response_json::<SignUpResponse>(response).await? {
            SignUpResponse::Session(token) => {
                let session = token.into_session()?;
                self.store_session(session.clone(), AuthEventKind::SignedIn)
                    .await;
                Ok(SignUpOutcome {
                    identity: session.identity.clone(),
                    session: Some(session),
                })
            }
            SignUpResponse::User(user) => Ok(SignUpOutcome {
                identity: user.into_identity(),
                session: None,
            }),
        }
    }

    async fn sign_out(&self) -> ProviderResult<()> {
        let Some(session) = self.session.write().await.take() else {
            return Ok(());
        };
        let _ = self.events.send(AuthEvent {
            kind: AuthEventKind::SignedOut,
            session: None,
        });

        let response = self
            .request(
                reqwest::Method::POST,
                &self.url("/auth/v1/logout"),
                &session.access_token,
            )
            .send()
            .await
            .map_err(transport)?;

        check_response(response).await
    }

    async fn get_session(&self) -> ProviderResult<Option<AuthSession>> {
        let current = self.session.read().await.clone();
        let Some(session) = current else {
            return Ok(None);
        };

        if !session.is_expired(chrono::Utc::now()) {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.as_deref() else {
            tracing::debug!(user_id = %session.identity.id, "Session expired without refresh token");
            *self.session.write().await = None;
            let _ = self.events.send(AuthEvent {
                kind: AuthEventKind::SignedOut,
                session: None,
            });
            return Ok(None);
        };

        let refreshed = self.refresh_session(refresh_token).await?;
        tracing::debug!(user_id = %refreshed.identity.id, "Session refreshed");
        self.store_session(refreshed.clone(), AuthEventKind::TokenRefreshed)
            .await;
        Ok(Some(refreshed))
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl RowStore for SupabaseClient {
    async fn select(
        &self,
        table: &str,
        query: &RowQuery,
    ) -> ProviderResult<Vec<serde_json::Value>> {
        let url = format!(
            "{}{}",
            self.url(&format!("/rest/v1/{}?select=*", table)),
            query_string(query)
        );
        let bearer = self.bearer().await;

        let response = self
            .request(reqwest::Method::GET, &url, &bearer)
            .send()
            .await
            .map_err(transport)?;

        check_response_json(response).await
    }

    async fn update(
        &self,
        table: &str,
        column: &str,
        value: &str,
        fields: serde_json::Value,
    ) -> ProviderResult<Vec<serde_json::Value>> {
        let url = self.url(&format!(
            "/rest/v1/{}?{}=eq.{}",
            table,
            column,
            urlencoding::encode(value)
        ));
        let bearer = self.bearer().await;

        let response = self
            .request(reqwest::Method::PATCH, &url, &bearer)
            .header("Prefer", "return=representation")
            .json(&fields)
            .send()
            .await
            .map_err(transport)?;

        check_response_json(response).await
    }

    async fn insert(
        &self,
        table: &str,
        row: serde_json::Value,
    ) -> ProviderResult<serde_json::Value> {
        let url = self.url(&format!("/rest/v1/{}", table));
        let bearer = self.bearer().await;

        let response = self
            .request(reqwest::Method::POST, &url, &bearer)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await
            .map_err(transport)?;

        let mut rows: Vec<serde_json::Value> = check_response_json(response).await?;
        if rows.is_empty() {
            return Err(ProviderError::Decode(format!(
                "insert into {} returned no rows",
                table
            )));
        }
        Ok(rows.swap_remove(0))
    }
}

#[async_trait]
impl ObjectStore for SupabaseClient {
    async fn upload(
        &self,
        key: &str,
        content_type: &str,
        bytes: Bytes,
        progress: ProgressFn,
    ) -> ProviderResult<String> {
        let url = self.url(&format!(
            "/storage/v1/object/{}/{}",
            self.project.bucket, key
        ));
        let bearer = self.bearer().await;
        let total = bytes.len();

        let chunks = (0..total)
            .step_by(UPLOAD_CHUNK_SIZE)
            .map(move |start| bytes.slice(start..(start + UPLOAD_CHUNK_SIZE).min(total)));
        let mut sent = 0usize;
        let body = stream::iter(chunks).map(move |chunk| {
            sent += chunk.len();
            // 100 is reserved for the acknowledged upload.
            progress(percent(sent, total).min(99));
            Ok::<_, std::io::Error>(chunk)
        });

        let response = self
            .request(reqwest::Method::POST, &url, &bearer)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::CONTENT_LENGTH, total)
            .header("x-upsert", "false")
            .body(reqwest::Body::wrap_stream(body))
            .send()
            .await
            .map_err(transport)?;

        let stored: UploadResponse = check_response_json(response).await?;
        Ok(object_path(&self.project.bucket, &stored.key))
    }

    fn public_url(&self, path: &str) -> String {
        self.url(&format!(
            "/storage/v1/object/public/{}/{}",
            self.project.bucket, path
        ))
    }
}

// ─── Wire types ──────────────────────────────────────────────

#[derive(Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl UserResponse {
    fn into_identity(self) -> Identity {
        Identity {
            id: self.id,
            email: self.email.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Unix timestamp (seconds)
    #[serde(default)]
    expires_at: Option<i64>,
    /// Lifetime in seconds, used when `expires_at` is absent
    #[serde(default)]
    expires_in: Option<i64>,
    user: Option<UserResponse>,
}

impl TokenResponse {
    fn into_session(self) -> ProviderResult<AuthSession> {
        let user = self
            .user
            .ok_or_else(|| ProviderError::Decode("token response without user".to_string()))?;
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => chrono::DateTime::from_timestamp(at, 0),
            (None, Some(secs)) => Some(chrono::Utc::now() + chrono::Duration::seconds(secs)),
            (None, None) => None,
        };

        Ok(AuthSession {
            identity: user.into_identity(),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        })
    }
}

/// Sign-up answers with a session when email confirmation is disabled and
/// with the bare user otherwise.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(UserResponse),
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(rename = "Key")]
    key: String,
}

/// Error body shapes across auth, rest and storage.
#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    /// Numeric on auth, string (e.g. `PGRST116`) on rest.
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

fn transport(err: reqwest::Error) -> ProviderError {
    ProviderError::Transport(err.to_string())
}

fn percent(sent: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (sent.saturating_mul(100) / total).min(100) as u8
}

/// Storage echoes `bucket/key`; callers want the key within the bucket.
fn object_path(bucket: &str, stored_key: &str) -> String {
    stored_key
        .strip_prefix(bucket)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(stored_key)
        .to_string()
}

fn query_string(query: &RowQuery) -> String {
    let mut out = String::new();
    if let Some((column, value)) = &query.eq {
        out.push_str(&format!("&{}=eq.{}", column, urlencoding::encode(value)));
    }
    if let Some((column, direction)) = &query.order_by {
        let dir = match direction {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        };
        out.push_str(&format!("&order={}.{}", column, dir));
    }
    out
}

/// Turn a provider error status + body into a [`ProviderError::Api`].
fn parse_error(status: u16, body: &str) -> ProviderError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    let code = parsed
        .error_code
        .or_else(|| match parsed.code {
            Some(serde_json::Value::String(code)) => Some(code),
            _ => None,
        })
        .or_else(|| parsed.error.clone());

    let message = parsed
        .msg
        .or(parsed.message)
        .or(parsed.error_description)
        .or(parsed.error)
        .unwrap_or_else(|| body.to_string());

    ProviderError::Api {
        status,
        code,
        message,
    }
}

async fn check_response(response: reqwest::Response) -> ProviderResult<()> {
    if response.status().is_success() {
        return Ok(());
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(parse_error(status, &body))
}

async fn check_response_json<T: DeserializeOwned>(response: reqwest::Response) -> ProviderResult<T> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(parse_error(status, &body));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::Decode(e.to_string()))
}
