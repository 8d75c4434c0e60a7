// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Login, registration and logout through a session context.

use skill_swap::error::AppError;
use skill_swap::models::Profile;
use skill_swap::providers::{tables, FailPoint, MemoryBackend};
use skill_swap::services::ProfileRepository;
use std::sync::Arc;

mod common;

#[tokio::test]
async fn test_register_then_fetch_profile() {
    let memory = MemoryBackend::default();
    let context = common::start_context(&memory).await;

    let registration = context
        .register(&common::registration("a@x.com"))
        .await
        .expect("registration should succeed");
    assert!(!registration.confirmation_required);

    let repo = ProfileRepository::new(Arc::new(memory.client()));
    let profile = repo
        .fetch(&registration.identity.id)
        .await
        .unwrap()
        .expect("profile row created at registration");

    assert_eq!(
        profile,
        Profile {
            id: registration.identity.id.clone(),
            first_name: "Jo".to_string(),
            last_name: "Do".to_string(),
            skills_offered: vec![],
            skills_wanted: vec![],
            points: 0,
        }
    );

    // The session store is populated and paired with the profile.
    assert_eq!(context.current(), Some(registration.identity));
    assert_eq!(context.store().profile(), Some(profile));
}

#[tokio::test]
async fn test_login_wrong_password() {
    let memory = MemoryBackend::default();
    let setup = common::start_context(&memory).await;
    setup.register(&common::registration("a@x.com")).await.unwrap();

    let context = common::start_context(&memory).await;
    let err = context.login("a@x.com", "wrong-password").await.unwrap_err();

    assert!(matches!(err, AppError::InvalidCredentials));
    assert_eq!(context.current(), None);
    assert!(!context.snapshot().loading);
}

#[tokio::test]
async fn test_login_unconfirmed_email() {
    let memory = MemoryBackend::default();
    memory.require_email_confirmation(true);

    let setup = common::start_context(&memory).await;
    let registration = setup
        .register(&common::registration("a@x.com"))
        .await
        .unwrap();
    assert!(registration.confirmation_required);
    assert_eq!(setup.current(), None);

    let context = common::start_context(&memory).await;
    let err = context.login("a@x.com", "secret1").await.unwrap_err();
    assert!(matches!(err, AppError::EmailUnconfirmed));

    assert!(memory.confirm_email("a@x.com"));
    let identity = context.login("a@x.com", "secret1").await.unwrap();
    assert_eq!(identity.email, "a@x.com");
    assert_eq!(context.current(), Some(identity));
}

#[tokio::test]
async fn test_login_transport_failure_is_network_error() {
    let memory = MemoryBackend::default();
    let context = common::start_context(&memory).await;

    memory.fail(FailPoint::Auth);
    let err = context.login("a@x.com", "secret1").await.unwrap_err();
    assert!(matches!(err, AppError::Network(_)));
}

#[tokio::test]
async fn test_login_requires_email_and_password() {
    let memory = MemoryBackend::default();
    let context = common::start_context(&memory).await;

    let err = context.login("  ", "secret1").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_logout_clears_store_when_remote_fails() {
    let memory = MemoryBackend::default();
    let context = common::start_context(&memory).await;
    context
        .register(&common::registration("a@x.com"))
        .await
        .unwrap();
    assert!(context.current().is_some());

    memory.fail(FailPoint::SignOut);
    let err = context.logout().await.unwrap_err();

    assert!(matches!(err, AppError::Network(_)));
    assert_eq!(memory.sign_out_calls(), 1);
    let snapshot = context.snapshot();
    assert!(snapshot.identity.is_none());
    assert!(snapshot.profile.is_none());
}

#[tokio::test]
async fn test_disposable_email_rejected_before_provider() {
    let memory = MemoryBackend::default();
    let context = common::start_context(&memory).await;

    let err = context
        .register(&common::registration("a@mailinator.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert!(memory.rows(tables::PROFILES).is_empty());
}

#[tokio::test]
async fn test_password_mismatch_rejected_before_provider() {
    let memory = MemoryBackend::default();
    let context = common::start_context(&memory).await;

    let mut form = common::registration("a@x.com");
    form.confirm_password = "secret2".to_string();
    let err = context.register(&form).await.unwrap_err();

    assert_eq!(err.description(), "Passwords don't match");
    assert!(memory.rows(tables::PROFILES).is_empty());
}

#[tokio::test]
async fn test_duplicate_registration_is_email_in_use() {
    let memory = MemoryBackend::default();
    let first = common::start_context(&memory).await;
    first.register(&common::registration("a@x.com")).await.unwrap();

    let second = common::start_context(&memory).await;
    let err = second
        .register(&common::registration("A@x.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::EmailInUse));
    assert_eq!(second.current(), None);
}

#[tokio::test]
async fn test_registration_survives_failed_name_write() {
    let memory = MemoryBackend::default();
    let context = common::start_context(&memory).await;

    memory.fail(FailPoint::Update);
    let registration = context
        .register(&common::registration("a@x.com"))
        .await
        .expect("name write failure does not undo registration");

    let profile = context.store().profile().expect("profile row exists");
    assert_eq!(profile.id, registration.identity.id);
    assert_eq!(profile.first_name, "");
    assert_eq!(profile.last_name, "");
}

#[tokio::test]
async fn test_session_change_handler_sees_login_and_logout() {
    let memory = MemoryBackend::default();
    let setup = common::start_context(&memory).await;
    setup.register(&common::registration("a@x.com")).await.unwrap();

    let context = common::start_context(&memory).await;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = context.store().on_session_change(move |identity| {
        let _ = tx.send(identity.map(|i| i.email));
    });

    context.login("a@x.com", "secret1").await.unwrap();
    assert_eq!(rx.recv().await.unwrap(), Some("a@x.com".to_string()));

    context.logout().await.unwrap();
    assert_eq!(rx.recv().await.unwrap(), None);

    handle.abort();
}
