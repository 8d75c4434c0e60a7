// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.
//!
//! Every failure the front-end sees is one of these kinds. Provider errors are
//! converted at the gateway/repository boundary; nothing past that layer
//! carries a raw provider error.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Email not confirmed")]
    EmailUnconfirmed,

    #[error("Email address already registered")]
    EmailInUse,

    #[error("Password too weak: {0}")]
    WeakPassword(String),

    #[error("Not a video file: {0}")]
    InvalidFileType(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code used in the JSON body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::EmailUnconfirmed => "email_unconfirmed",
            AppError::EmailInUse => "email_in_use",
            AppError::WeakPassword(_) => "weak_password",
            AppError::InvalidFileType(_) => "invalid_file_type",
            AppError::UploadFailed(_) => "upload_failed",
            AppError::Repository(_) => "repository_error",
            AppError::Network(_) => "network_error",
            AppError::Unauthorized => "unauthorized",
            AppError::InvalidToken => "invalid_token",
            AppError::NotFound(_) => "not_found",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Short notification title shown by the front-end.
    pub fn title(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "Invalid input",
            AppError::InvalidCredentials => "Login failed",
            AppError::EmailUnconfirmed => "Email not confirmed",
            AppError::EmailInUse | AppError::WeakPassword(_) => "Registration failed",
            AppError::InvalidFileType(_) => "Upload Error",
            AppError::UploadFailed(_) => "Upload Failed",
            AppError::Repository(_) => "Request failed",
            AppError::Network(_) => "Connection problem",
            AppError::Unauthorized | AppError::InvalidToken => "Sign in required",
            AppError::NotFound(_) => "Not found",
            AppError::Internal(_) => "Something went wrong",
        }
    }

    /// Human-readable notification body.
    ///
    /// Backend and internal details stay in the logs.
    pub fn description(&self) -> String {
        match self {
            AppError::Validation(msg) | AppError::WeakPassword(msg) => msg.clone(),
            AppError::InvalidCredentials => {
                "Please check your credentials and try again.".to_string()
            }
            AppError::EmailUnconfirmed => {
                "Please check your inbox and confirm your email before logging in.".to_string()
            }
            AppError::EmailInUse => {
                "An account with this email already exists. Try signing in instead.".to_string()
            }
            AppError::InvalidFileType(_) => "Please upload a video file".to_string(),
            AppError::UploadFailed(_) => {
                "There was an error uploading your video. Please try again.".to_string()
            }
            AppError::Repository(_) => "The request could not be completed. Please try again.".to_string(),
            AppError::Network(_) => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            AppError::Unauthorized | AppError::InvalidToken => {
                "You need to be logged in to do that.".to_string()
            }
            AppError::NotFound(msg) => msg.clone(),
            AppError::Internal(_) => "An unexpected error occurred.".to_string(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::WeakPassword(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Unauthorized | AppError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            AppError::EmailUnconfirmed => StatusCode::FORBIDDEN,
            AppError::EmailInUse => StatusCode::CONFLICT,
            AppError::InvalidFileType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UploadFailed(_) | AppError::Repository(_) => StatusCode::BAD_GATEWAY,
            AppError::Network(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    title: &'static str,
    description: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Repository(msg) | AppError::UploadFailed(msg) => {
                tracing::error!(error = %msg, kind = self.code(), "Backend error");
            }
            AppError::Network(msg) => {
                tracing::warn!(error = %msg, "Backend unreachable");
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
            }
            _ => {}
        }

        let body = ErrorResponse {
            error: self.code(),
            title: self.title(),
            description: self.description(),
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    /// Collapse field errors into one message, in field-name order.
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.errors().iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));

        let mut messages = Vec::new();
        for (field, kind) in fields {
            if let validator::ValidationErrorsKind::Field(errors) = kind {
                for error in errors {
                    messages.push(match &error.message {
                        Some(message) => message.to_string(),
                        None => format!("Invalid {}", field),
                    });
                }
            }
        }

        AppError::Validation(messages.join("; "))
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
