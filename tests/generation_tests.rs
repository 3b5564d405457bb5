mod common;

use common::*;
use serde_json::json;
use std::time::{Duration, Instant};
use tailorview_client::{
    errors::{AppError, ErrorKind},
    models::{ImageUpload, ReferenceImages, Role},
    services::{EmailOutcome, FailureReason, GenerationStatus},
};
use wiremock::matchers::{any, body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_missing_model_image_fails_without_network() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let (client, _) = signed_in(config_for(&server), user(Role::User, 0, 5)).await;
    let err = client
        .generation
        .submit(outfit(), ReferenceImages::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(
        client.generation.state().status,
        GenerationStatus::Failed(FailureReason::MissingRequiredInput)
    );
    assert!(client.results.is_empty());
}

#[tokio::test]
async fn test_exhausted_quota_fails_without_network() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let (client, _) = signed_in(config_for(&server), user(Role::User, 5, 5)).await;
    let err = client
        .generation
        .submit(outfit(), model_photo())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::QuotaExceeded(_)));
    assert_eq!(
        client.generation.state().status,
        GenerationStatus::Failed(FailureReason::QuotaExceeded)
    );
}

#[tokio::test]
async fn test_last_credit_then_quota_exceeded() {
    let server = MockServer::start().await;
    let (request_id, body) = generate_body(5, 5);

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .and(body_string_contains("name=\"model_image\""))
        .and(body_string_contains("name=\"lapel_type\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = signed_in(config_for(&server), user(Role::User, 4, 5)).await;

    let outcome = client.generation.submit(outfit(), model_photo()).await.unwrap();
    assert_eq!(outcome.artifact.request_id, request_id);
    assert_eq!(outcome.email, EmailOutcome::NotRequested);
    assert_eq!(client.generation.state().status, GenerationStatus::Succeeded);
    assert_eq!(client.generation.state().progress, 100);
    assert!(client.results.contains(request_id));

    let current = client.session.current_user().unwrap();
    assert_eq!(current.images_used_total, 5);
    assert_eq!(store.snapshot().unwrap().user_data.images_used_total, 5);

    let err = client
        .generation
        .submit(outfit(), model_photo())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::QuotaExceeded(_)));
    assert_eq!(client.results.len(), 1);
}

#[tokio::test]
async fn test_progress_is_capped_until_response() {
    let server = MockServer::start().await;
    let (_, body) = generate_body(1, 5);

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(body)
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&server)
        .await;

    let (client, _) = signed_in(config_for(&server), user(Role::User, 0, 5)).await;
    let mut updates = client.generation.watch();
    let collector = tokio::spawn(async move {
        let mut seen = Vec::new();
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            let done = state.status.is_terminal();
            seen.push((state.status, state.progress));
            if done {
                break;
            }
        }
        seen
    });

    client.generation.submit(outfit(), model_photo()).await.unwrap();
    let seen = collector.await.unwrap();

    let (last_status, last_progress) = *seen.last().unwrap();
    assert_eq!(last_status, GenerationStatus::Succeeded);
    assert_eq!(last_progress, 100);

    let in_progress: Vec<u8> = seen
        .iter()
        .filter(|(status, _)| *status == GenerationStatus::InProgress)
        .map(|(_, progress)| *progress)
        .collect();
    assert!(in_progress.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(in_progress.iter().all(|progress| *progress <= 90));
    assert!(in_progress.iter().any(|progress| *progress > 0));
}

#[tokio::test]
async fn test_revalidation_rejection_during_generation() {
    let server = MockServer::start().await;
    let (_, body) = generate_body(1, 5);

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(body)
                .set_delay(Duration::from_secs(6)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "detail": "Not authenticated" })))
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.revalidation_interval_secs = 1;
    let (client, store) = signed_in(config, user(Role::User, 0, 5)).await;

    let started = Instant::now();
    let err = client
        .generation
        .submit(outfit(), model_photo())
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(matches!(err, AppError::SessionExpired));
    assert_eq!(
        client.generation.state().status,
        GenerationStatus::Failed(FailureReason::SessionExpired)
    );
    assert!(!client.session.is_authenticated());
    assert!(store.snapshot().is_none());
    assert!(client.results.is_empty());
}

#[tokio::test]
async fn test_server_quota_rejection_keeps_session_and_resyncs() {
    let server = MockServer::start().await;
    let account = user(Role::User, 2, 5);
    let mut server_view = account.clone();
    server_view.images_used_total = 5;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({ "detail": "Image limit reached" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json(&server_view)))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = signed_in(config_for(&server), account).await;
    let err = client
        .generation
        .submit(outfit(), model_photo())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::QuotaExceeded(_)));
    assert!(client.session.is_authenticated());
    assert_eq!(client.session.current_user().unwrap().images_used_total, 5);
}

#[tokio::test]
async fn test_server_error_is_terminal_and_resets() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({ "detail": "Image generation failed: upstream timeout" })),
        )
        .mount(&server)
        .await;

    let (client, _) = signed_in(config_for(&server), user(Role::User, 0, 5)).await;
    let err = client
        .generation
        .submit(outfit(), model_photo())
        .await
        .unwrap_err();

    match &err {
        AppError::ServerRejected { status, message } => {
            assert_eq!(*status, 500);
            assert!(message.contains("upstream timeout"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let state = client.generation.state();
    assert_eq!(state.status, GenerationStatus::Failed(FailureReason::ServerRejected));
    assert!(state.error.unwrap().contains("upstream timeout"));
    assert!(client.session.is_authenticated());

    tokio::time::sleep(Duration::from_millis(400)).await;
    let state = client.generation.state();
    assert_eq!(state.status, GenerationStatus::Idle);
    assert_eq!(state.progress, 0);
}

#[tokio::test]
async fn test_email_outcome_is_reported_separately() {
    let server = MockServer::start().await;
    let (request_id, mut body) = generate_body(1, 5);
    body["email_sent"] = json!(false);

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_string_contains("client@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let (client, _) = signed_in(config_for(&server), user(Role::User, 0, 5)).await;
    let mut inputs = outfit();
    inputs.email = Some("client@example.com".to_string());

    let outcome = client.generation.submit(inputs, model_photo()).await.unwrap();
    assert_eq!(
        outcome.email,
        EmailOutcome::Failed { recipient: "client@example.com".to_string() }
    );
    assert!(client.results.contains(request_id));
    assert_eq!(client.generation.state().status, GenerationStatus::Succeeded);
}

#[tokio::test]
async fn test_optional_references_are_attached() {
    let server = MockServer::start().await;
    let (_, body) = generate_body(1, 5);

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_string_contains("name=\"fabric_image\""))
        .and(body_string_contains("name=\"fabric_description\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = signed_in(config_for(&server), user(Role::User, 0, 5)).await;
    let mut images = model_photo();
    images.fabric = Some(ImageUpload::new("wool.png", "image/png", vec![1, 2, 3]));
    let mut inputs = outfit();
    inputs.fabric_description = Some("Navy herringbone wool".to_string());

    let outcome = client.generation.submit(inputs, images).await.unwrap();
    assert_eq!(outcome.artifact.inputs.references.len(), 2);
}

#[tokio::test]
async fn test_modify_derives_from_existing_artifact() {
    let server = MockServer::start().await;
    let (parent_id, first) = generate_body(1, 5);
    let (child_id, second) = generate_body(2, 5);

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(first))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/modify-image"))
        .and(body_partial_json(json!({
            "request_id": parent_id,
            "modification_description": "Burgundy tie",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(second))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = signed_in(config_for(&server), user(Role::User, 0, 5)).await;
    client.generation.submit(outfit(), model_photo()).await.unwrap();

    let outcome = client.generation.modify(parent_id, "  Burgundy tie ").await.unwrap();
    assert_eq!(outcome.artifact.request_id, child_id);
    assert_eq!(outcome.artifact.inputs.parent, Some(parent_id));
    assert_eq!(outcome.artifact.inputs.modification.as_deref(), Some("Burgundy tie"));
    assert_eq!(client.results.len(), 2);
    assert_eq!(client.session.current_user().unwrap().images_used_total, 2);
}

#[tokio::test]
async fn test_modify_unknown_artifact_fails_without_network() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let (client, _) = signed_in(config_for(&server), user(Role::User, 0, 5)).await;
    let err = client
        .generation
        .modify(uuid::Uuid::new_v4(), "Add a pocket square")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
}

#[tokio::test]
async fn test_download_saves_artifact() {
    let server = MockServer::start().await;
    let (request_id, body) = generate_body(1, 5);
    let filename = format!("generated_{}.png", request_id);

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/api/download/{}", filename).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x89PNG fake".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = signed_in(config_for(&server), user(Role::User, 0, 5)).await;
    let outcome = client.generation.submit(outfit(), model_photo()).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let saved = client.api.download(&outcome.artifact, dir.path()).await.unwrap();

    assert_eq!(saved, dir.path().join(&filename));
    assert_eq!(tokio::fs::read(&saved).await.unwrap(), b"\x89PNG fake".to_vec());
}
