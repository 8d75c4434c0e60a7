//! Authenticated identity issued by the identity provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authenticated user reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque provider-issued user ID (also the profile row key)
    pub id: String,
    pub email: String,
}

/// Provider session backing an [`Identity`].
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub identity: Identity,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// When the access token expires, if the provider said
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    /// Whether the access token has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

// Tokens stay out of logs.
impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("identity", &self.identity)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
