#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;
use tailorview_client::{
    config::Config,
    models::{ImageUpload, OutfitInputs, ReferenceImages, Role, User},
    storage::{MemoryCredentialStore, StoredCredentials},
    StudioClient,
};
use uuid::Uuid;
use wiremock::MockServer;

pub const TOKEN: &str = "test-access-token";

pub fn config_for(server: &MockServer) -> Config {
    Config {
        api_base_url: server.uri(),
        request_timeout_secs: 15,
        progress_tick_ms: 20,
        generation_reset_ms: 200,
        ..Config::default()
    }
}

pub fn user(role: Role, used: u32, limit: u32) -> User {
    User {
        id: Uuid::new_v4(),
        display_name: "Test Groom".to_string(),
        email: "groom@example.com".to_string(),
        role,
        images_used_total: used,
        images_limit_total: limit,
        images_used_today: None,
        is_active: Some(true),
    }
}

pub fn user_json(user: &User) -> Value {
    serde_json::to_value(user).unwrap()
}

/// A client whose store already holds a session for `user`, restored without network.
pub async fn signed_in(config: Config, user: User) -> (StudioClient, Arc<MemoryCredentialStore>) {
    let store = Arc::new(MemoryCredentialStore::with_credentials(StoredCredentials::new(
        TOKEN, user,
    )));
    let client = StudioClient::new(config, store.clone()).unwrap();
    assert!(client.session.restore().await.unwrap());
    (client, store)
}

pub async fn signed_out(config: Config) -> (StudioClient, Arc<MemoryCredentialStore>) {
    let store = Arc::new(MemoryCredentialStore::new());
    let client = StudioClient::new(config, store.clone()).unwrap();
    (client, store)
}

pub fn outfit() -> OutfitInputs {
    OutfitInputs {
        atmosphere: "rustic".to_string(),
        suit_type: "3-piece suit".to_string(),
        lapel_type: "Wide peak lapel".to_string(),
        pocket_type: "Straight with flaps".to_string(),
        shoe_type: "Brown loafers".to_string(),
        accessory_type: "Bow tie".to_string(),
        ..Default::default()
    }
}

pub fn model_photo() -> ReferenceImages {
    ReferenceImages::with_model(ImageUpload::new(
        "model.jpg",
        "image/jpeg",
        // Kept UTF-8 so body matchers can read the multipart payload.
        b"fake jpeg bytes".to_vec(),
    ))
}

pub fn generate_body(used: u32, limit: u32) -> (Uuid, Value) {
    let request_id = Uuid::new_v4();
    let filename = format!("generated_{}.png", request_id);
    let body = json!({
        "success": true,
        "request_id": request_id,
        "image_filename": filename,
        "download_url": format!("/api/download/{}", filename),
        "email_sent": false,
        "user_credits": { "used": used, "limit": limit, "remaining": limit.saturating_sub(used) },
        "message": "Outfit generated successfully"
    });
    (request_id, body)
}
