// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod identity;
pub mod profile;
pub mod video;

pub use identity::{AuthSession, Identity};
pub use profile::{Profile, ProfileDraft, ProfileUpdate, SkillList};
pub use video::{NewVideoRecord, VideoRecord};
