// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile repository over the `profiles` table.

use crate::error::{AppError, Result};
use crate::models::{Profile, ProfileUpdate};
use crate::providers::{tables, ProviderError, RowQuery, RowStore};
use std::sync::Arc;

/// Reads and writes profile rows keyed by identity ID.
#[derive(Clone)]
pub struct ProfileRepository {
    rows: Arc<dyn RowStore>,
}

impl ProfileRepository {
    pub fn new(rows: Arc<dyn RowStore>) -> Self {
        Self { rows }
    }

    /// Fetch a profile. A missing row is `None`, not an error.
    pub async fn fetch(&self, user_id: &str) -> Result<Option<Profile>> {
        tracing::debug!(user_id, "Fetching profile");

        let rows = self
            .rows
            .select(tables::PROFILES, &RowQuery::new().eq("id", user_id))
            .await
            .map_err(repository_error)?;

        let Some(row) = rows.into_iter().next() else {
            tracing::debug!(user_id, "No profile row yet");
            return Ok(None);
        };

        serde_json::from_value(row)
            .map(Some)
            .map_err(|e| AppError::Repository(format!("Malformed profile row: {}", e)))
    }

    /// Replace the given columns of a profile row in one update.
    ///
    /// Fails if no row was updated (missing, or not writable by the caller);
    /// the stored row is then unchanged.
    pub async fn update(&self, user_id: &str, update: &ProfileUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        let fields = serde_json::to_value(update)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Profile update encoding: {}", e)))?;

        let updated = self
            .rows
            .update(tables::PROFILES, "id", user_id, fields)
            .await
            .map_err(repository_error)?;

        if updated.is_empty() {
            return Err(AppError::Repository(format!(
                "No profile row updated for user {}",
                user_id
            )));
        }

        tracing::info!(
            user_id,
            offered = update.skills_offered.as_ref().map(Vec::len),
            wanted = update.skills_wanted.as_ref().map(Vec::len),
            "Profile updated"
        );
        Ok(())
    }
}

/// Row and storage failures surface as repository errors.
pub(crate) fn repository_error(err: ProviderError) -> AppError {
    AppError::Repository(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{FailPoint, IdentityProvider, MemoryBackend, SignUpMetadata};

    async fn signed_up(backend: &MemoryBackend) -> (Arc<crate::providers::memory::MemoryClient>, String) {
        let client = Arc::new(backend.client());
        let outcome = client
            .sign_up(
                "a@x.com",
                "secret1",
                &SignUpMetadata {
                    first_name: "Jo".to_string(),
                    last_name: "Do".to_string(),
                },
            )
            .await
            .unwrap();
        (client, outcome.identity.id)
    }

    #[tokio::test]
    async fn test_fetch_missing_row_is_none() {
        let backend = MemoryBackend::default();
        let repo = ProfileRepository::new(Arc::new(backend.client()));
        assert_eq!(repo.fetch("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_replaces_lists() {
        let backend = MemoryBackend::default();
        let (client, user_id) = signed_up(&backend).await;
        let repo = ProfileRepository::new(client);

        let first = ProfileUpdate {
            skills_offered: Some(vec!["A".to_string(), "B".to_string()]),
            ..Default::default()
        };
        repo.update(&user_id, &first).await.unwrap();

        let second = ProfileUpdate {
            skills_offered: Some(vec!["C".to_string()]),
            ..Default::default()
        };
        repo.update(&user_id, &second).await.unwrap();

        let profile = repo.fetch(&user_id).await.unwrap().unwrap();
        assert_eq!(profile.skills_offered, vec!["C"]);
    }

    #[tokio::test]
    async fn test_failed_update_leaves_row_unchanged() {
        let backend = MemoryBackend::default();
        let (client, user_id) = signed_up(&backend).await;
        let repo = ProfileRepository::new(client);

        backend.fail(FailPoint::Update);
        let update = ProfileUpdate {
            first_name: Some("Changed".to_string()),
            ..Default::default()
        };
        let err = repo.update(&user_id, &update).await.unwrap_err();
        assert!(matches!(err, AppError::Repository(_)));

        backend.recover(FailPoint::Update);
        let profile = repo.fetch(&user_id).await.unwrap().unwrap();
        assert_eq!(profile.first_name, "");
    }

    #[tokio::test]
    async fn test_fetch_failure_is_repository_error() {
        let backend = MemoryBackend::default();
        let repo = ProfileRepository::new(Arc::new(backend.client()));
        backend.fail(FailPoint::Select);
        assert!(matches!(
            repo.fetch("u1").await,
            Err(AppError::Repository(_))
        ));
    }
}
