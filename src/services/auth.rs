// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Auth gateway: login, registration and logout against the identity
//! provider, with provider failures normalized into [`AppError`] kinds.

use crate::error::{AppError, Result};
use crate::models::{Identity, ProfileUpdate};
use crate::providers::{IdentityProvider, ProviderError, SignUpMetadata};
use crate::services::{ProfileRepository, SessionStore};
use regex::Regex;
use serde::Deserialize;
use std::borrow::Cow;
use std::sync::{Arc, LazyLock};
use validator::{Validate, ValidationError};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,6}$")
        .expect("static regex is valid")
});

/// Throwaway-mail domains, matched as substrings of the address's domain.
const DISPOSABLE_DOMAINS: &[&str] = &[
    "temp-mail.org",
    "tempmail.com",
    "fakeinbox.com",
    "mailinator.com",
    "yopmail.com",
    "guerrillamail.com",
];

/// Registration form, validated before anything is sent to the provider.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "passwords_match", skip_on_field_errors = false))]
pub struct RegistrationForm {
    #[validate(
        email(message = "Invalid email address"),
        regex(path = *EMAIL_PATTERN, message = "Please enter a valid email address"),
        custom(function = "validate_email_domain")
    )]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub confirm_password: String,
    #[validate(length(min = 2, message = "First name must be at least 2 characters"))]
    pub first_name: String,
    #[validate(length(min = 2, message = "Last name must be at least 2 characters"))]
    pub last_name: String,
}

fn validate_email_domain(email: &str) -> std::result::Result<(), ValidationError> {
    let domain = email
        .rsplit_once('@')
        .map(|(_, domain)| domain.to_ascii_lowercase())
        .unwrap_or_default();

    if DISPOSABLE_DOMAINS.iter().any(|d| domain.contains(d)) {
        return Err(ValidationError::new("disposable_email").with_message(Cow::Borrowed(
            "Please use a valid non-disposable email address",
        )));
    }
    Ok(())
}

fn passwords_match(form: &RegistrationForm) -> std::result::Result<(), ValidationError> {
    if form.password != form.confirm_password {
        return Err(ValidationError::new("passwords_mismatch")
            .with_message(Cow::Borrowed("Passwords don't match")));
    }
    Ok(())
}

/// Outcome of a successful registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub identity: Identity,
    /// The provider wants the email confirmed before the first login; no
    /// session was started.
    pub confirmation_required: bool,
}

/// Map a sign-in failure. Matches on the provider's error code, never on
/// message text.
pub fn login_error(err: ProviderError) -> AppError {
    match err.code() {
        Some("email_not_confirmed") => AppError::EmailUnconfirmed,
        Some("invalid_credentials") | Some("invalid_grant") => AppError::InvalidCredentials,
        _ if err.is_transport() => AppError::Network(err.to_string()),
        _ if err.status() == Some(400) => AppError::InvalidCredentials,
        _ => AppError::Repository(err.to_string()),
    }
}

/// Map a sign-up failure.
pub fn sign_up_error(err: ProviderError) -> AppError {
    match err.code() {
        Some("user_already_exists") | Some("email_exists") => AppError::EmailInUse,
        Some("weak_password") => AppError::WeakPassword(err.message()),
        Some("validation_failed") | Some("email_address_invalid") => {
            AppError::Validation(err.message())
        }
        _ if err.is_transport() => AppError::Network(err.to_string()),
        _ => AppError::Repository(err.to_string()),
    }
}

fn logout_error(err: ProviderError) -> AppError {
    if err.is_transport() {
        AppError::Network(err.to_string())
    } else {
        AppError::Repository(err.to_string())
    }
}

#[derive(Clone)]
pub struct AuthGateway {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<SessionStore>,
    profiles: ProfileRepository,
}

impl AuthGateway {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<SessionStore>,
        profiles: ProfileRepository,
    ) -> Self {
        Self {
            provider,
            store,
            profiles,
        }
    }

    /// Sign in and make the identity current.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        self.store.set_loading(true);
        self.store.set_error(None);

        let result = self
            .provider
            .sign_in_with_password(email, password)
            .await
            .map_err(login_error);

        let identity = match result {
            Ok(session) => session.identity,
            Err(err) => {
                tracing::info!(error = %err, "Login rejected");
                self.store.set_error(Some(err.description()));
                self.store.set_loading(false);
                return Err(err);
            }
        };

        tracing::info!(user_id = %identity.id, "User logged in");
        self.store.set_identity(Some(identity.clone())).await;
        self.store.set_loading(false);
        Ok(identity)
    }

    /// Create an account, then write the names onto its profile row.
    ///
    /// The name write is best-effort: a failure is logged and the account
    /// stays registered.
    pub async fn register(&self, form: &RegistrationForm) -> Result<Registration> {
        form.validate()?;

        self.store.set_loading(true);
        self.store.set_error(None);

        let metadata = SignUpMetadata {
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
        };

        let outcome = match self
            .provider
            .sign_up(form.email.trim(), &form.password, &metadata)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                let err = sign_up_error(err);
                tracing::info!(error = %err, "Registration rejected");
                self.store.set_error(Some(err.description()));
                self.store.set_loading(false);
                return Err(err);
            }
        };

        let identity = outcome.identity;
        let names = ProfileUpdate {
            first_name: Some(metadata.first_name),
            last_name: Some(metadata.last_name),
            ..Default::default()
        };
        if let Err(err) = self.profiles.update(&identity.id, &names).await {
            tracing::warn!(
                user_id = %identity.id,
                error = %err,
                "Registered but could not store profile names"
            );
        }

        let confirmation_required = outcome.session.is_none();
        if confirmation_required {
            tracing::info!(user_id = %identity.id, "User registered, awaiting email confirmation");
        } else {
            tracing::info!(user_id = %identity.id, "User registered");
            self.store.set_identity(Some(identity.clone())).await;
        }

        self.store.set_loading(false);
        Ok(Registration {
            identity,
            confirmation_required,
        })
    }

    /// End the session. Local state is cleared even when the provider call
    /// fails; that failure is returned for reporting only.
    pub async fn logout(&self) -> Result<()> {
        let result = self.provider.sign_out().await;
        self.store.clear();

        match result {
            Ok(()) => {
                tracing::info!("User logged out");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "Remote sign-out failed; local session cleared");
                Err(logout_error(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(email: &str) -> RegistrationForm {
        RegistrationForm {
            email: email.to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret1".to_string(),
            first_name: "Jo".to_string(),
            last_name: "Do".to_string(),
        }
    }

    #[test]
    fn test_valid_form() {
        assert!(form("a@x.com").validate().is_ok());
    }

    #[test]
    fn test_disposable_domain_rejected() {
        let err = AppError::from(form("a@mailinator.com").validate().unwrap_err());
        assert!(err
            .description()
            .contains("Please use a valid non-disposable email address"));

        // Substring match on the domain
        assert!(form("a@eu.yopmail.com").validate().is_err());
    }

    #[test]
    fn test_tld_length() {
        assert!(form("a@x.c").validate().is_err());
        assert!(form("a@x.abcdefg").validate().is_err());
        assert!(form("a@x.museum").validate().is_ok());
    }

    #[test]
    fn test_password_mismatch() {
        let mut form = form("a@x.com");
        form.confirm_password = "secret2".to_string();
        let err = AppError::from(form.validate().unwrap_err());
        assert_eq!(err.description(), "Passwords don't match");
    }

    #[test]
    fn test_short_names() {
        let mut form = form("a@x.com");
        form.first_name = "J".to_string();
        form.last_name = "D".to_string();
        let err = AppError::from(form.validate().unwrap_err());
        assert_eq!(
            err.description(),
            "First name must be at least 2 characters; Last name must be at least 2 characters"
        );
    }

    #[test]
    fn test_login_error_mapping() {
        let unconfirmed = ProviderError::api(400, Some("email_not_confirmed"), "Email not confirmed");
        assert!(matches!(login_error(unconfirmed), AppError::EmailUnconfirmed));

        let bad = ProviderError::api(400, Some("invalid_credentials"), "Invalid login credentials");
        assert!(matches!(login_error(bad), AppError::InvalidCredentials));

        // Older servers send only the status and an OAuth error name
        let legacy = ProviderError::api(400, None, "Invalid login credentials");
        assert!(matches!(login_error(legacy), AppError::InvalidCredentials));

        let down = ProviderError::Transport("connection refused".to_string());
        assert!(matches!(login_error(down), AppError::Network(_)));

        let server = ProviderError::api(500, None, "unexpected_failure");
        assert!(matches!(login_error(server), AppError::Repository(_)));
    }

    #[test]
    fn test_unconfirmed_detection_ignores_message_text() {
        let err = ProviderError::api(400, Some("invalid_credentials"), "Email not confirmed");
        assert!(matches!(login_error(err), AppError::InvalidCredentials));
    }

    #[test]
    fn test_sign_up_error_mapping() {
        let exists = ProviderError::api(422, Some("user_already_exists"), "User already registered");
        assert!(matches!(sign_up_error(exists), AppError::EmailInUse));

        let weak = ProviderError::api(422, Some("weak_password"), "Password should be at least 6 characters.");
        match sign_up_error(weak) {
            AppError::WeakPassword(msg) => assert!(msg.contains("at least 6")),
            other => panic!("unexpected {other:?}"),
        }

        let invalid = ProviderError::api(400, Some("email_address_invalid"), "Email address is invalid");
        assert!(matches!(sign_up_error(invalid), AppError::Validation(_)));
    }
}
