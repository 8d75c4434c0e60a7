// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Skill Swap: exchange skills through profiles and short videos
//!
//! This crate provides the backend-for-frontend API. Identity, rows and
//! video objects live in a hosted backend; each browser session gets its
//! own session context holding that session's provider state.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod providers;
pub mod routes;
pub mod services;

use config::Config;
use providers::{BackendKind, MemoryBackend, SupabaseProject};
use services::{SessionRegistry, VideoRepository};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub backend: BackendKind,
    pub sessions: SessionRegistry,
    /// Anonymous repository for the public gallery
    pub gallery: VideoRepository,
}

impl AppState {
    pub fn new(config: Config, backend: BackendKind) -> Self {
        let gallery = VideoRepository::new(backend.connect().rows);
        Self {
            config,
            backend,
            sessions: SessionRegistry::new(),
            gallery,
        }
    }
}

/// Pick the backend from configuration: the hosted project when one is
/// configured, otherwise the in-memory backend.
pub fn backend_from_config(config: &Config) -> BackendKind {
    match (&config.supabase_url, &config.supabase_anon_key) {
        (Some(url), Some(anon_key)) => BackendKind::Supabase(SupabaseProject::new(
            url,
            anon_key,
            &config.storage_bucket,
        )),
        _ => BackendKind::Memory(MemoryBackend::new(&config.storage_bucket)),
    }
}
