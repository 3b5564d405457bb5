mod common;

use common::*;
use serde_json::json;
use tailorview_client::{
    errors::{AppError, ErrorKind},
    models::{EmailTemplate, Role},
};
use uuid::Uuid;
use wiremock::matchers::{any, body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn generate_two(server: &MockServer) -> (Uuid, Uuid) {
    let (first_id, first) = generate_body(1, 10);
    let (second_id, second) = generate_body(2, 10);

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(first))
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(second))
        .mount(server)
        .await;

    (first_id, second_id)
}

fn template() -> EmailTemplate {
    EmailTemplate {
        subject: "Your outfits".to_string(),
        body: "Attached.".to_string(),
    }
}

#[tokio::test]
async fn test_empty_selection_never_calls_delivery() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let (client, _) = signed_in(config_for(&server), user(Role::User, 0, 5)).await;

    let err = client
        .dispatch
        .send_selected("client@example.com", &template())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);

    let err = client
        .dispatch
        .send_batch(&[Uuid::new_v4()], "   ", &template())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
}

#[tokio::test]
async fn test_successful_batch_clears_selection() {
    let server = MockServer::start().await;
    let (first_id, second_id) = generate_two(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/send-multiple"))
        .and(body_json(json!({
            "email": "client@example.com",
            "imageIds": [first_id, second_id],
            "subject": "Your outfits",
            "body": "Attached.",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Email sent successfully with 2 images",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = signed_in(config_for(&server), user(Role::User, 0, 10)).await;
    client.generation.submit(outfit(), model_photo()).await.unwrap();
    client.generation.submit(outfit(), model_photo()).await.unwrap();

    assert!(client.results.select(second_id));
    assert!(client.results.select(first_id));

    let receipt = client
        .dispatch
        .send_selected("client@example.com", &template())
        .await
        .unwrap();

    assert_eq!(receipt.image_ids, vec![first_id, second_id]);
    assert!(client.results.selected().is_empty());
    assert_eq!(client.results.len(), 2);
}

#[tokio::test]
async fn test_failed_batch_keeps_selection() {
    let server = MockServer::start().await;
    let (first_id, _) = generate_two(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/send-multiple"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "detail": "SMTP connection refused" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = signed_in(config_for(&server), user(Role::User, 0, 10)).await;
    client.generation.submit(outfit(), model_photo()).await.unwrap();
    client.results.select(first_id);

    let err = client
        .dispatch
        .send_selected("client@example.com", &template())
        .await
        .unwrap_err();

    match err {
        AppError::DeliveryFailed(message) => assert!(message.contains("SMTP")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(client.results.selected(), vec![first_id]);
    assert!(client.results.contains(first_id));
}

#[tokio::test]
async fn test_send_single_deduplicates_and_reports() {
    let server = MockServer::start().await;
    let image_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/api/send-multiple"))
        .and(body_json(json!({
            "email": "client@example.com",
            "imageIds": [image_id],
            "subject": "Your outfits",
            "body": "Attached.",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(2)
        .mount(&server)
        .await;

    let (client, _) = signed_in(config_for(&server), user(Role::User, 0, 10)).await;

    client
        .dispatch
        .send_single(image_id, "client@example.com", &template())
        .await
        .unwrap();
    client
        .dispatch
        .send_batch(&[image_id, image_id], "client@example.com", &template())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delivery_reporting_failure_in_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/send-multiple"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "Mailbox unavailable",
        })))
        .mount(&server)
        .await;

    let (client, _) = signed_in(config_for(&server), user(Role::User, 0, 10)).await;
    let err = client
        .dispatch
        .send_single(Uuid::new_v4(), "client@example.com", &template())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DeliveryFailed);
    assert!(client.session.is_authenticated());
}

#[tokio::test]
async fn test_unauthorized_delivery_expires_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/send-multiple"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (client, _) = signed_in(config_for(&server), user(Role::User, 0, 10)).await;
    let err = client
        .dispatch
        .send_single(Uuid::new_v4(), "client@example.com", &template())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::SessionExpired));
    assert!(!client.session.is_authenticated());
}
