// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod auth;
pub mod context;
pub mod profile;
pub mod session;
pub mod upload;
pub mod videos;

pub use auth::{AuthGateway, Registration, RegistrationForm};
pub use context::{SessionContext, SessionRegistry};
pub use profile::ProfileRepository;
pub use session::{SessionSnapshot, SessionStore};
pub use upload::{UploadPipeline, UploadState, VideoFile};
pub use videos::VideoRepository;
