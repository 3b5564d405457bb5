use reqwest::multipart::{Form, Part};
use reqwest::RequestBuilder;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    auth::{SessionManager, SessionPhase},
    errors::{AppError, ErrorKind, Result},
    models::{
        CreditSnapshot, GenerateResponse, GeneratedArtifact, InputsSnapshot, ModifyImageRequest,
        OutfitInputs, ReferenceImages,
    },
    services::{
        api_client,
        metrics::MetricsService,
        progress::{ProgressSchedule, ProgressTicker},
        quota_guard::QuotaGuard,
        results::ResultCollection,
    },
    utils::short_digest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    MissingRequiredInput,
    QuotaExceeded,
    SessionExpired,
    TransportFailed,
    ServerRejected,
}

impl FailureReason {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FailureReason::MissingRequiredInput => ErrorKind::ValidationFailed,
            FailureReason::QuotaExceeded => ErrorKind::QuotaExceeded,
            FailureReason::SessionExpired => ErrorKind::SessionExpired,
            FailureReason::TransportFailed => ErrorKind::TransportFailed,
            FailureReason::ServerRejected => ErrorKind::ServerRejected,
        }
    }
}

impl From<&AppError> for FailureReason {
    fn from(err: &AppError) -> Self {
        match err.kind() {
            ErrorKind::ValidationFailed => FailureReason::MissingRequiredInput,
            ErrorKind::QuotaExceeded => FailureReason::QuotaExceeded,
            ErrorKind::SessionExpired => FailureReason::SessionExpired,
            ErrorKind::TransportFailed => FailureReason::TransportFailed,
            ErrorKind::ServerRejected
            | ErrorKind::InvalidCredentials
            | ErrorKind::DeliveryFailed => FailureReason::ServerRejected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum GenerationStatus {
    Idle,
    Validating,
    Submitting,
    InProgress,
    Succeeded,
    Failed(FailureReason),
}

impl GenerationStatus {
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            GenerationStatus::Validating | GenerationStatus::Submitting | GenerationStatus::InProgress
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationStatus::Succeeded | GenerationStatus::Failed(_))
    }
}

/// Delivery of the generated image to the optional recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EmailOutcome {
    NotRequested,
    Sent { recipient: String },
    Failed { recipient: String },
}

impl EmailOutcome {
    fn from_response(recipient: Option<&str>, email_sent: Option<bool>) -> Self {
        match recipient {
            None => EmailOutcome::NotRequested,
            Some(recipient) if email_sent.unwrap_or(false) => EmailOutcome::Sent {
                recipient: recipient.to_string(),
            },
            Some(recipient) => EmailOutcome::Failed {
                recipient: recipient.to_string(),
            },
        }
    }
}

/// Observable state of the orchestrator. Each submission gets a fresh `attempt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationState {
    pub attempt: Option<Uuid>,
    #[serde(flatten)]
    pub status: GenerationStatus,
    pub progress: u8,
    pub email: Option<EmailOutcome>,
    pub error: Option<String>,
}

impl GenerationState {
    pub fn idle() -> Self {
        Self {
            attempt: None,
            status: GenerationStatus::Idle,
            progress: 0,
            email: None,
            error: None,
        }
    }
}

impl Default for GenerationState {
    fn default() -> Self {
        Self::idle()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub artifact: GeneratedArtifact,
    pub email: EmailOutcome,
    pub credits: Option<CreditSnapshot>,
}

/// Drives one generation (or modification) at a time through
/// `Validating → Submitting → InProgress → Succeeded | Failed → Idle`.
pub struct GenerationOrchestrator {
    session: Arc<SessionManager>,
    results: Arc<ResultCollection>,
    metrics: MetricsService,
    schedule: ProgressSchedule,
    reset_delay: Duration,
    state: Arc<watch::Sender<GenerationState>>,
}

impl GenerationOrchestrator {
    pub fn new(
        session: Arc<SessionManager>,
        results: Arc<ResultCollection>,
        schedule: ProgressSchedule,
        reset_delay: Duration,
        metrics: MetricsService,
    ) -> Self {
        let (state, _) = watch::channel(GenerationState::idle());
        Self {
            session,
            results,
            metrics,
            schedule,
            reset_delay,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> GenerationState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<GenerationState> {
        self.state.subscribe()
    }

    pub async fn submit(
        &self,
        inputs: OutfitInputs,
        images: ReferenceImages,
    ) -> Result<GenerationOutcome> {
        let attempt = self.begin()?;
        let result = self.generate(attempt, inputs, images).await;
        self.finish(attempt, result)
    }

    /// Requests a variation of an artifact already in the result collection.
    pub async fn modify(
        &self,
        request_id: Uuid,
        description: &str,
    ) -> Result<GenerationOutcome> {
        let attempt = self.begin()?;
        let result = self.regenerate(attempt, request_id, description).await;
        self.finish(attempt, result)
    }

    async fn generate(
        &self,
        attempt: Uuid,
        inputs: OutfitInputs,
        images: ReferenceImages,
    ) -> Result<GenerationOutcome> {
        validate_request(&inputs, &images)?;
        let (user, epoch) = self.session.snapshot().ok_or(AppError::SessionExpired)?;
        QuotaGuard::check(&user)?;

        self.set_status(attempt, GenerationStatus::Submitting);
        let snapshot = InputsSnapshot::capture(&inputs, &images);
        let form = build_form(&inputs, &images)?;
        info!(
            %attempt,
            user_id = %user.id,
            references = snapshot.references.len(),
            "Submitting generation"
        );

        let request = self.session.api().post("generate").multipart(form);
        let response = self.dispatch(attempt, epoch, request).await;
        let response = self.resync_on_quota(response).await?;

        Ok(self.ingest(epoch, response, snapshot, inputs.recipient()).await)
    }

    async fn regenerate(
        &self,
        attempt: Uuid,
        request_id: Uuid,
        description: &str,
    ) -> Result<GenerationOutcome> {
        let description = description.trim();
        if description.is_empty() {
            return Err(AppError::Validation(
                "Modification description is required".to_string(),
            ));
        }
        let parent = self.results.get(request_id).ok_or_else(|| {
            AppError::Validation(format!("Unknown artifact: {}", request_id))
        })?;
        let (user, epoch) = self.session.snapshot().ok_or(AppError::SessionExpired)?;
        QuotaGuard::check(&user)?;

        self.set_status(attempt, GenerationStatus::Submitting);
        info!(%attempt, parent = %request_id, "Submitting modification");

        let request = self
            .session
            .api()
            .post("modify-image")
            .json(&ModifyImageRequest {
                request_id,
                modification_description: description.to_string(),
            });
        let response = self.dispatch(attempt, epoch, request).await;
        let response = self.resync_on_quota(response).await?;

        let snapshot = InputsSnapshot::derived(&parent, description);
        Ok(self.ingest(epoch, response, snapshot, None).await)
    }

    /// Sends the request while simulated progress runs. A logout observed
    /// before the response arrives fails the attempt immediately.
    async fn dispatch(
        &self,
        attempt: Uuid,
        epoch: u64,
        request: RequestBuilder,
    ) -> Result<GenerateResponse> {
        let mut phase = self.session.watch_phase();

        self.set_status(attempt, GenerationStatus::InProgress);
        let ticker = self.start_ticker(attempt);

        let outcome = tokio::select! {
            response = self.session.credit_call(request) => response,
            _ = phase.wait_for(|phase| *phase == SessionPhase::Unauthenticated) => {
                Err(AppError::SessionExpired)
            }
        };
        ticker.stop();

        let response: GenerateResponse = api_client::read_json(outcome?).await?;
        if !response.success {
            return Err(AppError::ServerRejected {
                status: 200,
                message: response
                    .message
                    .unwrap_or_else(|| "Generation failed".to_string()),
            });
        }
        if self.session.current_epoch() != Some(epoch) {
            return Err(AppError::SessionExpired);
        }

        Ok(response)
    }

    async fn resync_on_quota(&self, response: Result<GenerateResponse>) -> Result<GenerateResponse> {
        if let Err(AppError::QuotaExceeded(detail)) = &response {
            info!(%detail, "Server refused on quota, refreshing profile");
            if let Err(e) = self.session.who_am_i().await {
                warn!(error = %e, "Could not refresh profile after quota rejection");
            }
        }
        response
    }

    async fn ingest(
        &self,
        epoch: u64,
        response: GenerateResponse,
        snapshot: InputsSnapshot,
        recipient: Option<&str>,
    ) -> GenerationOutcome {
        match response.user_credits {
            Some(credits) => {
                self.session.apply_credits(epoch, &credits).await;
            }
            None => debug!(request_id = %response.request_id, "Response carried no credit snapshot"),
        }

        let artifact = GeneratedArtifact::from_response(&response, snapshot);
        self.results.add(artifact.clone());

        GenerationOutcome {
            artifact,
            email: EmailOutcome::from_response(recipient, response.email_sent),
            credits: response.user_credits,
        }
    }

    fn begin(&self) -> Result<Uuid> {
        let attempt = Uuid::new_v4();
        let mut busy = false;

        self.state.send_if_modified(|state| {
            if state.status.is_busy() {
                busy = true;
                return false;
            }
            *state = GenerationState {
                attempt: Some(attempt),
                status: GenerationStatus::Validating,
                ..GenerationState::idle()
            };
            true
        });

        if busy {
            return Err(AppError::Validation(
                "A generation is already in progress".to_string(),
            ));
        }
        Ok(attempt)
    }

    fn set_status(&self, attempt: Uuid, status: GenerationStatus) {
        self.state.send_if_modified(|state| {
            if state.attempt != Some(attempt) {
                return false;
            }
            state.status = status;
            true
        });
    }

    fn start_ticker(&self, attempt: Uuid) -> ProgressTicker {
        let state = self.state.clone();

        ProgressTicker::start(self.schedule, move |schedule| {
            let mut wanted = true;
            state.send_if_modified(|state| {
                if state.attempt != Some(attempt) || state.status != GenerationStatus::InProgress {
                    wanted = false;
                    return false;
                }
                let next = schedule.next(state.progress);
                if next == state.progress {
                    return false;
                }
                state.progress = next;
                true
            });
            wanted
        })
    }

    fn finish(
        &self,
        attempt: Uuid,
        result: Result<GenerationOutcome>,
    ) -> Result<GenerationOutcome> {
        match &result {
            Ok(outcome) => {
                self.state.send_if_modified(|state| {
                    if state.attempt != Some(attempt) {
                        return false;
                    }
                    state.status = GenerationStatus::Succeeded;
                    state.progress = 100;
                    state.email = Some(outcome.email.clone());
                    state.error = None;
                    true
                });
                self.metrics.record_generation("succeeded");
                info!(
                    %attempt,
                    request_id = %outcome.artifact.request_id,
                    "Generation succeeded"
                );
            }
            Err(e) => {
                let reason = FailureReason::from(e);
                self.state.send_if_modified(|state| {
                    if state.attempt != Some(attempt) {
                        return false;
                    }
                    state.status = GenerationStatus::Failed(reason);
                    state.error = Some(e.to_string());
                    true
                });
                self.metrics.record_generation_failure(reason.kind());
                warn!(%attempt, kind = reason.kind().as_str(), error = %e, "Generation failed");
            }
        }

        self.schedule_reset(attempt);
        result
    }

    fn schedule_reset(&self, attempt: Uuid) {
        let state = self.state.clone();
        let delay = self.reset_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            state.send_if_modified(|state| {
                if state.attempt != Some(attempt) || !state.status.is_terminal() {
                    return false;
                }
                *state = GenerationState::idle();
                true
            });
        });
    }
}

fn validate_request(inputs: &OutfitInputs, images: &ReferenceImages) -> Result<()> {
    if images.model.is_none() {
        return Err(AppError::Validation("Model image is required".to_string()));
    }

    let missing = inputs.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    for (slot, upload) in images.iter() {
        if !upload.is_image() {
            return Err(AppError::Validation(format!(
                "{} must be an image (got {})",
                slot, upload.content_type
            )));
        }
        if upload.data.is_empty() {
            return Err(AppError::Validation(format!("{} is empty", slot)));
        }
    }

    Ok(())
}

fn build_form(inputs: &OutfitInputs, images: &ReferenceImages) -> Result<Form> {
    let mut form = Form::new();

    for (slot, upload) in images.iter() {
        debug!(
            field = slot.field_name(),
            filename = %upload.filename,
            digest = %short_digest(&upload.data),
            "Attaching reference image"
        );
        let part = Part::bytes(upload.data.clone())
            .file_name(upload.filename.clone())
            .mime_str(&upload.content_type)?;
        form = form.part(slot.field_name(), part);
    }

    for (name, value) in inputs.form_fields() {
        form = form.text(name, value);
    }

    Ok(form)
}
