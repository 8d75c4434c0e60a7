// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Media upload pipeline behavior.

use bytes::Bytes;
use skill_swap::error::AppError;
use skill_swap::providers::{tables, FailPoint, MemoryBackend};
use skill_swap::services::{SessionContext, UploadState, VideoFile};
use std::sync::Arc;

mod common;

fn video(name: &str) -> VideoFile {
    VideoFile {
        name: name.to_string(),
        content_type: "video/mp4".to_string(),
        bytes: Bytes::from_static(b"\x00\x00\x00\x18ftypmp42"),
    }
}

async fn signed_in(memory: &MemoryBackend) -> Arc<SessionContext> {
    let context = common::start_context(memory).await;
    context
        .register(&common::registration("a@x.com"))
        .await
        .unwrap();
    context
}

#[tokio::test]
async fn test_non_video_never_reaches_store() {
    let memory = MemoryBackend::default();
    let context = signed_in(&memory).await;

    let file = VideoFile {
        name: "cat.png".to_string(),
        content_type: "image/png".to_string(),
        bytes: Bytes::from_static(b"\x89PNG"),
    };
    let err = context.upload_video(&file).await.unwrap_err();

    assert!(matches!(err, AppError::InvalidFileType(_)));
    assert_eq!(context.upload_state(), UploadState::Idle);
    assert_eq!(memory.upload_calls(), 0);
}

#[tokio::test]
async fn test_save_details_before_upload_writes_nothing() {
    let memory = MemoryBackend::default();
    let context = signed_in(&memory).await;

    let err = context
        .save_video_details("Guitar basics", "Chords for beginners")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert!(memory.rows(tables::SKILL_VIDEOS).is_empty());
    assert_eq!(context.upload_state(), UploadState::Idle);
}

#[tokio::test]
async fn test_upload_then_save_details() {
    let memory = MemoryBackend::default();
    let context = signed_in(&memory).await;
    let user_id = context.current().unwrap().id;

    let state = context.upload_video(&video("lesson.mp4")).await.unwrap();
    let UploadState::Uploaded { video_url, path } = state else {
        panic!("expected Uploaded, got {state:?}");
    };

    assert!(path.starts_with(&format!("{}/", user_id)));
    assert!(path.ends_with(".mp4"));
    assert_eq!(video_url, format!("memory://videos/{}", path));
    let (content_type, _) = memory.object(&path).expect("object stored");
    assert_eq!(content_type, "video/mp4");

    let record = context
        .save_video_details("  Guitar basics ", "Chords for beginners")
        .await
        .unwrap();
    assert_eq!(record.title, "Guitar basics");
    assert_eq!(record.user_id, user_id);
    assert_eq!(record.video_url, video_url);
    assert_eq!(
        context.upload_state(),
        UploadState::Saved {
            video: record.clone()
        }
    );

    let gallery = context.list_videos(None).await.unwrap();
    assert_eq!(gallery, vec![record]);
}

#[tokio::test]
async fn test_progress_visible_while_upload_held() {
    let memory = MemoryBackend::default();
    let context = signed_in(&memory).await;
    let identity = context.current().unwrap();

    memory.pause_uploads();
    let pipeline = context.uploads().clone();
    let mut rx = pipeline.subscribe();
    let upload = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.upload_video(&identity, &video("lesson.mp4")).await }
    });

    let held = rx
        .wait_for(|s| matches!(s, UploadState::Uploading { .. }))
        .await
        .unwrap()
        .clone();
    assert_eq!(held, UploadState::Uploading { progress: 25 });
    assert_eq!(memory.object_count(), 0);

    memory.resume_uploads();
    let finished = upload.await.unwrap().unwrap();

    assert!(matches!(finished, UploadState::Uploaded { .. }));
    assert_eq!(context.upload_state(), finished);
    assert_eq!(memory.object_count(), 1);
}

#[tokio::test]
async fn test_reset_during_upload_is_not_overwritten() {
    let memory = MemoryBackend::default();
    let context = signed_in(&memory).await;
    let identity = context.current().unwrap();

    memory.pause_uploads();
    let pipeline = context.uploads().clone();
    let mut rx = pipeline.subscribe();
    let upload = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.upload_video(&identity, &video("lesson.mp4")).await }
    });

    rx.wait_for(|s| matches!(s, UploadState::Uploading { .. }))
        .await
        .unwrap();
    context.reset_upload();
    memory.resume_uploads();

    let result = upload.await.unwrap().unwrap();
    assert_eq!(result, UploadState::Idle);
    assert_eq!(context.upload_state(), UploadState::Idle);

    // The remote object still completed and is left behind.
    assert_eq!(memory.object_count(), 1);
}

#[tokio::test]
async fn test_failed_save_stays_uploaded_and_can_retry() {
    let memory = MemoryBackend::default();
    let context = signed_in(&memory).await;

    let uploaded = context.upload_video(&video("lesson.mp4")).await.unwrap();

    memory.fail(FailPoint::Insert);
    let err = context
        .save_video_details("Guitar basics", "Chords for beginners")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Repository(_)));
    assert_eq!(context.upload_state(), uploaded);

    memory.recover(FailPoint::Insert);
    context
        .save_video_details("Guitar basics", "Chords for beginners")
        .await
        .unwrap();
    assert!(matches!(context.upload_state(), UploadState::Saved { .. }));
    assert_eq!(memory.rows(tables::SKILL_VIDEOS).len(), 1);
}

#[tokio::test]
async fn test_storage_failure_moves_to_failed() {
    let memory = MemoryBackend::default();
    let context = signed_in(&memory).await;

    memory.fail(FailPoint::Upload);
    let err = context.upload_video(&video("lesson.mp4")).await.unwrap_err();

    assert!(matches!(err, AppError::UploadFailed(_)));
    assert!(matches!(context.upload_state(), UploadState::Failed { .. }));
    assert_eq!(memory.object_count(), 0);
}

#[tokio::test]
async fn test_empty_details_rejected() {
    let memory = MemoryBackend::default();
    let context = signed_in(&memory).await;
    context.upload_video(&video("lesson.mp4")).await.unwrap();

    let err = context
        .save_video_details("   ", "Chords for beginners")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(matches!(context.upload_state(), UploadState::Uploaded { .. }));
}

#[tokio::test]
async fn test_reset_returns_to_idle() {
    let memory = MemoryBackend::default();
    let context = signed_in(&memory).await;
    context.upload_video(&video("lesson.mp4")).await.unwrap();

    context.reset_upload();
    assert_eq!(context.upload_state(), UploadState::Idle);
    assert_eq!(memory.object_count(), 1);
}
