use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{
    config::Config,
    errors::{AppError, Result},
    models::{AuthResponse, GeneratedArtifact, LoginRequest, OutfitOptions, RegisterRequest},
    utils::{download_path, save_stream},
};

/// Thin wrapper over `reqwest` that knows the backend layout and error format.
///
/// Endpoints here are the unauthenticated ones. Anything needing a bearer
/// token goes through `SessionManager::authorized_call`.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("tailorview-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `path` is relative to the `/api` prefix.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Resolves a server-provided reference, which may be absolute or rooted.
    pub fn resolve(&self, reference: &str) -> String {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            reference.to_string()
        } else {
            format!("{}/{}", self.base_url, reference.trim_start_matches('/'))
        }
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.endpoint(path))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.endpoint(path))
    }

    pub fn put(&self, path: &str) -> RequestBuilder {
        self.client.put(self.endpoint(path))
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(self.endpoint(path))
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse> {
        let response = self.post("auth/login").json(request).send().await?;

        match response.status() {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let detail = error_detail(response).await;
                Err(AppError::InvalidCredentials(detail))
            }
            _ => read_json(response).await,
        }
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse> {
        let response = self.post("auth/register").json(request).send().await?;
        read_json(response).await
    }

    pub async fn options(&self) -> Result<OutfitOptions> {
        let response = self.get("options").send().await?;
        read_json(response).await
    }

    /// Saves an artifact's image under `dir`, named after the artifact.
    pub async fn download(&self, artifact: &GeneratedArtifact, dir: &Path) -> Result<PathBuf> {
        let target = download_path(dir, &artifact.filename)?;

        let response = self
            .client
            .get(self.resolve(&artifact.download_ref))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let written = save_stream(&target, response.bytes_stream()).await?;
        info!(
            request_id = %artifact.request_id,
            path = %target.display(),
            bytes = written,
            "Artifact downloaded"
        );

        Ok(target)
    }
}

/// Decodes a successful JSON body, or turns an error status into `ServerRejected`.
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    if !response.status().is_success() {
        return Err(rejection(response).await);
    }

    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

pub async fn rejection(response: Response) -> AppError {
    let status = response.status();
    let message = error_detail(response).await;
    debug!(status = status.as_u16(), %message, "Server rejected request");

    AppError::ServerRejected {
        status: status.as_u16(),
        message,
    }
}

/// Extracts the human-readable cause from an error body.
pub async fn error_detail(response: Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(body) => detail_from_body(&body)
            .unwrap_or_else(|| fallback_detail(status, &body)),
        Err(_) => fallback_detail(status, ""),
    }
}

fn fallback_detail(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if !body.is_empty() && body.len() <= 200 {
        return body.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("Unexpected response")
        .to_string()
}

pub(crate) fn detail_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    for key in ["detail", "error", "message"] {
        match value.get(key) {
            Some(serde_json::Value::String(text)) => return Some(text.clone()),
            // Field validation errors arrive as a list of `{ "msg": ... }`.
            Some(serde_json::Value::Array(items)) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(|msg| msg.as_str()))
                    .collect();
                if !messages.is_empty() {
                    return Some(messages.join("; "));
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(url: &str) -> ApiClient {
        let config = Config {
            api_base_url: url.to_string(),
            ..Config::default()
        };
        ApiClient::new(&config).unwrap()
    }

    #[test]
    fn test_endpoint_layout() {
        let api = client_for("http://localhost:8001/");
        assert_eq!(api.endpoint("auth/login"), "http://localhost:8001/api/auth/login");
        assert_eq!(api.endpoint("/options"), "http://localhost:8001/api/options");
        assert_eq!(
            api.resolve("/api/download/generated_1.png"),
            "http://localhost:8001/api/download/generated_1.png"
        );
        assert_eq!(
            api.resolve("https://cdn.example.com/a.png"),
            "https://cdn.example.com/a.png"
        );
    }

    #[test]
    fn test_detail_extraction() {
        assert_eq!(
            detail_from_body(r#"{"detail":"Model file must be an image"}"#).as_deref(),
            Some("Model file must be an image")
        );
        assert_eq!(
            detail_from_body(r#"{"detail":[{"msg":"field required"},{"msg":"value is not a valid email"}]}"#)
                .as_deref(),
            Some("field required; value is not a valid email")
        );
        assert_eq!(
            detail_from_body(r#"{"error":"boom"}"#).as_deref(),
            Some("boom")
        );
        assert!(detail_from_body("<html>").is_none());
    }
}
