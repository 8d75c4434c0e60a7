// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Email/password authentication routes.
//!
//! Login and registration start a fresh [`SessionContext`], register it, and
//! hand the browser a session token naming it. Logout tears the context down.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, decode_jwt, extract_token, SESSION_COOKIE};
use crate::models::{Identity, Profile};
use crate::routes::Notice;
use crate::services::{RegistrationForm, SessionContext};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

/// Response for a login or registration.
#[derive(Serialize)]
pub struct SessionResponse {
    pub notice: Notice,
    pub user: Identity,
    pub profile: Option<Profile>,
    /// Session token, also set as a cookie. Absent when the account still
    /// needs its email confirmed.
    pub token: Option<String>,
}

/// Register `context` and issue a session token for it.
fn issue_session(
    state: &AppState,
    jar: CookieJar,
    context: Arc<SessionContext>,
    user: &Identity,
) -> Result<(CookieJar, String)> {
    let session_id = state.sessions.insert(context);
    let jwt = create_jwt(&user.id, session_id, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    let cookie = Cookie::build((SESSION_COOKIE, jwt.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.frontend_url.starts_with("https://"))
        .build();

    Ok((jar.add(cookie), jwt))
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let context = SessionContext::start(state.backend.connect()).await;
    let user = context.login(&req.email, &req.password).await?;
    let profile = context.store().profile();

    let (jar, token) = issue_session(&state, jar, context, &user)?;

    Ok((
        jar,
        Json(SessionResponse {
            notice: Notice::new("Login successful", "Welcome back to Skill Swap!"),
            user,
            profile,
            token: Some(token),
        }),
    ))
}

async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(form): Json<RegistrationForm>,
) -> Result<(StatusCode, CookieJar, Json<SessionResponse>)> {
    let context = SessionContext::start(state.backend.connect()).await;
    let registration = context.register(&form).await?;
    let user = registration.identity;

    if registration.confirmation_required {
        context.shutdown();
        return Ok((
            StatusCode::CREATED,
            jar,
            Json(SessionResponse {
                notice: Notice::new(
                    "Account created",
                    "Please check your email to confirm your account",
                ),
                user,
                profile: None,
                token: None,
            }),
        ));
    }

    let profile = context.store().profile();
    let (jar, token) = issue_session(&state, jar, context, &user)?;

    Ok((
        StatusCode::CREATED,
        jar,
        Json(SessionResponse {
            notice: Notice::new("Registration successful", "Welcome to Skill Swap!"),
            user,
            profile,
            token: Some(token),
        }),
    ))
}

/// Response for logout.
#[derive(Serialize)]
pub struct LogoutResponse {
    pub notice: Notice,
    /// False when the provider sign-out failed; the local session is gone
    /// either way.
    pub remote_signed_out: bool,
}

/// Logout. Always clears the cookie and the server-side session; a
/// provider failure only changes the notice.
async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
) -> (CookieJar, Json<LogoutResponse>) {
    let context = extract_token(&jar, &request)
        .and_then(|token| decode_jwt(&token, &state.config.jwt_signing_key).ok())
        .and_then(|claims| state.sessions.remove(&claims.sid));

    let remote_signed_out = match context {
        Some(context) => match context.logout().await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "Logout completed locally only");
                false
            }
        },
        None => true,
    };

    let notice = if remote_signed_out {
        Notice::new("Logged out", "You have been successfully logged out.")
    } else {
        Notice::new("Logout failed", "There was an issue logging you out.")
    };

    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/"));
    (
        jar,
        Json(LogoutResponse {
            notice,
            remote_signed_out,
        }),
    )
}
