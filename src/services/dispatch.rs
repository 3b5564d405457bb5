use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::SessionManager,
    errors::{AppError, Result},
    models::{EmailTemplate, SendMultipleRequest, SendMultipleResponse},
    services::{api_client, metrics::MetricsService, results::ResultCollection},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReceipt {
    pub recipient: String,
    pub image_ids: Vec<Uuid>,
    pub message: Option<String>,
}

/// Emails a set of generated artifacts through the delivery endpoint.
pub struct BatchDispatch {
    session: Arc<SessionManager>,
    results: Arc<ResultCollection>,
    metrics: MetricsService,
}

impl BatchDispatch {
    pub fn new(
        session: Arc<SessionManager>,
        results: Arc<ResultCollection>,
        metrics: MetricsService,
    ) -> Self {
        Self {
            session,
            results,
            metrics,
        }
    }

    pub async fn send_single(
        &self,
        request_id: Uuid,
        email: &str,
        template: &EmailTemplate,
    ) -> Result<DispatchReceipt> {
        self.send_batch(&[request_id], email, template).await
    }

    pub async fn send_selected(
        &self,
        email: &str,
        template: &EmailTemplate,
    ) -> Result<DispatchReceipt> {
        let selected = self.results.selected();
        self.send_batch(&selected, email, template).await
    }

    /// Sends `ids` to `email`. The selection is cleared only on success.
    pub async fn send_batch(
        &self,
        ids: &[Uuid],
        email: &str,
        template: &EmailTemplate,
    ) -> Result<DispatchReceipt> {
        let mut image_ids: Vec<Uuid> = Vec::with_capacity(ids.len());
        for id in ids {
            if !image_ids.contains(id) {
                image_ids.push(*id);
            }
        }

        if image_ids.is_empty() {
            return Err(AppError::Validation("Select at least one image".to_string()));
        }
        let email = email.trim();
        if email.is_empty() {
            return Err(AppError::Validation("Recipient email is required".to_string()));
        }

        let request = SendMultipleRequest {
            email: email.to_string(),
            image_ids: image_ids.clone(),
            subject: template.subject.clone(),
            body: template.body.clone(),
        };

        match self.deliver(&request).await {
            Ok(response) => {
                self.results.clear_selection();
                self.metrics.record_dispatch("sent");
                info!(recipient = %email, images = image_ids.len(), "Batch email sent");

                Ok(DispatchReceipt {
                    recipient: request.email,
                    image_ids,
                    message: response.message,
                })
            }
            Err(e) => {
                self.metrics.record_dispatch("failed");
                warn!(recipient = %email, error = %e, "Batch email failed");
                Err(e)
            }
        }
    }

    async fn deliver(&self, request: &SendMultipleRequest) -> Result<SendMultipleResponse> {
        let builder = self.session.api().post("send-multiple").json(request);

        let response = match self.session.authorized_call(builder).await {
            Ok(response) => response,
            Err(AppError::SessionExpired) => return Err(AppError::SessionExpired),
            Err(e) => return Err(AppError::DeliveryFailed(e.to_string())),
        };

        let response: SendMultipleResponse = match api_client::read_json(response).await {
            Ok(response) => response,
            Err(AppError::ServerRejected { message, .. }) => {
                return Err(AppError::DeliveryFailed(message))
            }
            Err(e) => return Err(AppError::DeliveryFailed(e.to_string())),
        };

        if !response.success {
            return Err(AppError::DeliveryFailed(
                response
                    .message
                    .unwrap_or_else(|| "Delivery service reported a failure".to_string()),
            ));
        }

        Ok(response)
    }
}
