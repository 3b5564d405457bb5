use parking_lot::{Mutex, RwLock};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    auth::{revalidation, validation},
    errors::{AppError, Result},
    models::{CreditSnapshot, LoginRequest, RegisterRequest, User},
    services::{
        api_client::{self, ApiClient},
        metrics::MetricsService,
    },
    storage::{CredentialStore, StoredCredentials},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Unauthenticated,
    Authenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    UserRequested,
    /// An authorized call came back 401 or 403.
    Rejected,
    RevalidationFailed,
}

impl LogoutReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogoutReason::UserRequested => "user_requested",
            LogoutReason::Rejected => "rejected",
            LogoutReason::RevalidationFailed => "revalidation_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { user_id: Uuid },
    Restored { user_id: Uuid },
    ProfileUpdated { used: u32, limit: u32 },
    LoggedOut { reason: LogoutReason },
}

/// The live session. `epoch` changes on every login so late responses from a
/// previous session can be told apart.
#[derive(Clone)]
pub struct Session {
    pub token: String,
    pub user: User,
    pub epoch: u64,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .field("epoch", &self.epoch)
            .finish()
    }
}

/// Owns authentication state and every transition between the two phases.
pub struct SessionManager {
    api: Arc<ApiClient>,
    store: Arc<dyn CredentialStore>,
    metrics: MetricsService,
    revalidation_interval: Duration,
    session: RwLock<Option<Session>>,
    phase: watch::Sender<SessionPhase>,
    events: broadcast::Sender<SessionEvent>,
    // Serializes login, restore and logout so observers see each change once.
    transitions: tokio::sync::Mutex<()>,
    epoch: AtomicU64,
    revalidation: Mutex<Option<CancellationToken>>,
    this: Weak<SessionManager>,
}

impl SessionManager {
    pub fn new(
        api: Arc<ApiClient>,
        store: Arc<dyn CredentialStore>,
        revalidation_interval: Duration,
        metrics: MetricsService,
    ) -> Arc<Self> {
        let (phase, _) = watch::channel(SessionPhase::Unauthenticated);
        let (events, _) = broadcast::channel(64);

        Arc::new_cyclic(|this| Self {
            api,
            store,
            metrics,
            revalidation_interval,
            session: RwLock::new(None),
            phase,
            events,
            transitions: tokio::sync::Mutex::new(()),
            epoch: AtomicU64::new(0),
            revalidation: Mutex::new(None),
            this: this.clone(),
        })
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.read().is_some()
    }

    pub fn current_user(&self) -> Option<User> {
        self.session.read().as_ref().map(|session| session.user.clone())
    }

    pub fn current_epoch(&self) -> Option<u64> {
        self.session.read().as_ref().map(|session| session.epoch)
    }

    /// Profile and epoch read together, for callers that check back later.
    pub fn snapshot(&self) -> Option<(User, u64)> {
        self.session
            .read()
            .as_ref()
            .map(|session| (session.user.clone(), session.epoch))
    }

    fn bearer(&self) -> Option<(String, u64)> {
        self.session
            .read()
            .as_ref()
            .map(|session| (session.token.clone(), session.epoch))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn watch_phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    /// Adopts stored credentials without contacting the server.
    pub async fn restore(&self) -> Result<bool> {
        let _guard = self.transitions.lock().await;
        if let Some(user) = self.current_user() {
            debug!(user_id = %user.id, "Session already active, nothing to restore");
            return Ok(true);
        }

        match self.store.load().await {
            Ok(Some(credentials)) => {
                let user_id = credentials.user_data.id;
                self.install(credentials.access_token, credentials.user_data);
                info!(%user_id, "Session restored from credential store");
                self.notify(SessionEvent::Restored { user_id });
                Ok(true)
            }
            Ok(None) => {
                self.clear_store().await;
                Ok(false)
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable credentials");
                self.clear_store().await;
                Ok(false)
            }
        }
    }

    pub async fn login(&self, request: LoginRequest) -> Result<User> {
        validation::validate_login(&request)?;

        let response = self.api.login(&request).await?;
        self.establish(response.access_token, response.user).await
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<User> {
        validation::validate_registration(&request)?;

        let response = self.api.register(&request).await?;
        self.establish(response.access_token, response.user).await
    }

    async fn establish(&self, token: String, user: User) -> Result<User> {
        let _guard = self.transitions.lock().await;

        let credentials = StoredCredentials::new(token, user);
        self.store.save(&credentials).await?;

        let user_id = credentials.user_data.id;
        self.install(credentials.access_token, credentials.user_data.clone());
        info!(%user_id, role = %credentials.user_data.role, "Signed in");
        self.notify(SessionEvent::LoggedIn { user_id });

        Ok(credentials.user_data)
    }

    fn install(&self, token: String, user: User) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        *self.session.write() = Some(Session { token, user, epoch });
        self.phase.send_replace(SessionPhase::Authenticated);
        self.start_revalidation(epoch);
    }

    fn start_revalidation(&self, epoch: u64) {
        let cancel = CancellationToken::new();
        if let Some(previous) = self.revalidation.lock().replace(cancel.clone()) {
            previous.cancel();
        }

        tokio::spawn(revalidation::run(
            self.this.clone(),
            epoch,
            self.revalidation_interval,
            cancel,
        ));
    }

    /// Ends the current session. Returns `false` when there was none.
    pub async fn logout(&self) -> bool {
        let _guard = self.transitions.lock().await;
        self.end_session(LogoutReason::UserRequested).await
    }

    /// Ends the session only if it is still the one identified by `epoch`.
    pub async fn force_logout(&self, epoch: u64, reason: LogoutReason) -> bool {
        let _guard = self.transitions.lock().await;
        if self.current_epoch() != Some(epoch) {
            debug!(epoch, "Ignoring logout for a session that already ended");
            return false;
        }
        self.end_session(reason).await
    }

    // Detached so a caller dropped mid-flight cannot leave a half-finished logout.
    async fn expire(&self, epoch: u64, reason: LogoutReason) {
        let Some(this) = self.this.upgrade() else {
            return;
        };
        let handle = tokio::spawn(async move { this.force_logout(epoch, reason).await });
        if let Err(e) = handle.await {
            warn!(error = %e, "Forced logout task failed");
        }
    }

    async fn end_session(&self, reason: LogoutReason) -> bool {
        let taken = self.session.write().take();
        let Some(session) = taken else {
            return false;
        };

        if let Some(cancel) = self.revalidation.lock().take() {
            cancel.cancel();
        }
        self.phase.send_replace(SessionPhase::Unauthenticated);
        self.clear_store().await;

        self.metrics.record_logout(reason.as_str());
        info!(user_id = %session.user.id, reason = reason.as_str(), "Signed out");
        self.notify(SessionEvent::LoggedOut { reason });
        true
    }

    async fn clear_store(&self) {
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Failed to clear credential store");
        }
    }

    fn notify(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Sends `request` with the current bearer token.
    ///
    /// 401 and 403 end the session and surface `SessionExpired`. Other
    /// statuses are returned to the caller untouched.
    pub async fn authorized_call(&self, request: RequestBuilder) -> Result<Response> {
        self.send_authorized(request, LogoutReason::Rejected, false).await
    }

    /// Like [`authorized_call`](Self::authorized_call), for calls that spend
    /// image credits: a 403 naming the quota surfaces `QuotaExceeded` and
    /// keeps the session.
    pub async fn credit_call(&self, request: RequestBuilder) -> Result<Response> {
        self.send_authorized(request, LogoutReason::Rejected, true).await
    }

    pub(crate) async fn send_authorized(
        &self,
        request: RequestBuilder,
        reason: LogoutReason,
        spends_credits: bool,
    ) -> Result<Response> {
        let (token, epoch) = self.bearer().ok_or(AppError::SessionExpired)?;

        let request = request.bearer_auth(token).build()?;
        let _timer = self.metrics.start_timer(request.url().path().to_string());
        let response = self.api.http().execute(request).await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                self.expire(epoch, reason).await;
                Err(AppError::SessionExpired)
            }
            StatusCode::FORBIDDEN => {
                let detail = api_client::error_detail(response).await;
                if spends_credits && is_quota_rejection(&detail) {
                    return Err(AppError::QuotaExceeded(detail));
                }
                debug!(%detail, "Forbidden response ends the session");
                self.expire(epoch, reason).await;
                Err(AppError::SessionExpired)
            }
            _ => Ok(response),
        }
    }

    /// Fetches the profile from the server and refreshes the local snapshot.
    pub async fn who_am_i(&self) -> Result<User> {
        self.fetch_profile(LogoutReason::Rejected).await
    }

    pub(crate) async fn fetch_profile(&self, reason: LogoutReason) -> Result<User> {
        let epoch = self.current_epoch().ok_or(AppError::SessionExpired)?;
        let response = self
            .send_authorized(self.api.get("auth/me"), reason, false)
            .await?;
        let user: User = api_client::read_json(response).await?;

        self.update_user(epoch, |current| *current = user.clone()).await;
        Ok(user)
    }

    /// Replaces the credit counters with server-reported values.
    pub async fn apply_credits(&self, epoch: u64, credits: &CreditSnapshot) -> bool {
        self.update_user(epoch, |user| user.apply_credits(credits)).await
    }

    async fn update_user<F>(&self, epoch: u64, update: F) -> bool
    where
        F: FnOnce(&mut User),
    {
        let _guard = self.transitions.lock().await;

        let credentials = {
            let mut session = self.session.write();
            match session.as_mut() {
                Some(session) if session.epoch == epoch => {
                    update(&mut session.user);
                    StoredCredentials::new(session.token.clone(), session.user.clone())
                }
                _ => return false,
            }
        };

        if let Err(e) = self.store.save(&credentials).await {
            warn!(error = %e, "Failed to persist refreshed profile");
        }

        let user = &credentials.user_data;
        debug!(
            user_id = %user.id,
            used = user.images_used_total,
            limit = user.images_limit_total,
            "Profile snapshot updated"
        );
        self.notify(SessionEvent::ProfileUpdated {
            used: user.images_used_total,
            limit: user.images_limit_total,
        });
        true
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(cancel) = self.revalidation.lock().take() {
            cancel.cancel();
        }
    }
}

/// A 403 that talks about the image allowance rather than the credential.
fn is_quota_rejection(detail: &str) -> bool {
    let detail = detail.to_lowercase();
    ["quota", "limit", "limite", "credit"]
        .iter()
        .any(|keyword| detail.contains(keyword))
}
