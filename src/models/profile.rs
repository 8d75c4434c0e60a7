// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile model: the application-level user record paired with an identity.

use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Profile row stored in the `profiles` table (keyed by identity ID).
///
/// Null columns read as empty values, matching rows created by the
/// sign-up trigger before the user has filled anything in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Profile {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub first_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skills_offered: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skills_wanted: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub points: u32,
}

impl Profile {
    /// Fresh profile as created at registration.
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            first_name: String::new(),
            last_name: String::new(),
            skills_offered: Vec::new(),
            skills_wanted: Vec::new(),
            points: 0,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Column update for a profile row.
///
/// Present fields replace the stored value wholesale (lists are replaced,
/// never appended); absent fields are left alone. Points are not writable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills_offered: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills_wanted: Option<Vec<String>>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.skills_offered.is_none()
            && self.skills_wanted.is_none()
    }

    /// Apply this update to an in-memory profile.
    pub fn apply_to(&self, profile: &mut Profile) {
        if let Some(first_name) = &self.first_name {
            profile.first_name = first_name.clone();
        }
        if let Some(last_name) = &self.last_name {
            profile.last_name = last_name.clone();
        }
        if let Some(offered) = &self.skills_offered {
            profile.skills_offered = offered.clone();
        }
        if let Some(wanted) = &self.skills_wanted {
            profile.skills_wanted = wanted.clone();
        }
    }
}

/// Ordered list of free-text skill tags without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillList(Vec<String>);

impl SkillList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a skill. Surrounding whitespace is trimmed; blank or already
    /// present skills leave the list unchanged. Returns whether it was added.
    pub fn add(&mut self, skill: &str) -> bool {
        let skill = skill.trim();
        if skill.is_empty() || self.contains(skill) {
            return false;
        }
        self.0.push(skill.to_string());
        true
    }

    /// Remove a skill. Returns whether it was present.
    pub fn remove(&mut self, skill: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|s| s != skill);
        self.0.len() != before
    }

    pub fn contains(&self, skill: &str) -> bool {
        self.0.iter().any(|s| s == skill)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl<S: AsRef<str>> FromIterator<S> for SkillList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = SkillList::new();
        for skill in iter {
            list.add(skill.as_ref());
        }
        list
    }
}

/// Editable copy of a profile, as held by the profile editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Validate)]
pub struct ProfileDraft {
    #[validate(length(min = 2, message = "First name must be at least 2 characters"))]
    pub first_name: String,
    #[validate(length(min = 2, message = "Last name must be at least 2 characters"))]
    pub last_name: String,
    pub skills_offered: SkillList,
    pub skills_wanted: SkillList,
}

impl ProfileDraft {
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            skills_offered: profile.skills_offered.iter().collect(),
            skills_wanted: profile.skills_wanted.iter().collect(),
        }
    }

    pub fn add_offered(&mut self, skill: &str) -> bool {
        self.skills_offered.add(skill)
    }

    pub fn add_wanted(&mut self, skill: &str) -> bool {
        self.skills_wanted.add(skill)
    }

    pub fn remove_offered(&mut self, skill: &str) -> bool {
        self.skills_offered.remove(skill)
    }

    pub fn remove_wanted(&mut self, skill: &str) -> bool {
        self.skills_wanted.remove(skill)
    }

    /// Full-replace update of every editable column.
    pub fn into_update(self) -> ProfileUpdate {
        ProfileUpdate {
            first_name: Some(self.first_name.trim().to_string()),
            last_name: Some(self.last_name.trim().to_string()),
            skills_offered: Some(self.skills_offered.into_vec()),
            skills_wanted: Some(self.skills_wanted.into_vec()),
        }
    }
}
