use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::SessionManager,
    errors::{AppError, Result},
    models::{
        AdminStats, EmailQueueItem, EmailQueueResponse, EmailTemplate, OutfitRequestRecord, User,
        UserUpdate,
    },
    services::api_client,
};

/// Administrative reads and the few account edits the back office exposes.
///
/// Every call is refused locally unless the signed-in user is an admin, so a
/// plain account never reaches these endpoints.
pub struct AdminFacade {
    session: Arc<SessionManager>,
}

impl AdminFacade {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    fn ensure_admin(&self) -> Result<()> {
        match self.session.current_user() {
            None => Err(AppError::SessionExpired),
            Some(user) if user.is_admin() => Ok(()),
            Some(user) => Err(AppError::Forbidden(format!(
                "Admin access required (current role: {})",
                user.role
            ))),
        }
    }

    pub async fn list_requests(&self) -> Result<Vec<OutfitRequestRecord>> {
        self.ensure_admin()?;
        let response = self
            .session
            .authorized_call(self.session.api().get("admin/requests"))
            .await?;
        api_client::read_json(response).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.ensure_admin()?;
        let response = self
            .session
            .authorized_call(self.session.api().get("admin/users"))
            .await?;
        api_client::read_json(response).await
    }

    pub async fn stats(&self) -> Result<AdminStats> {
        self.ensure_admin()?;
        let response = self
            .session
            .authorized_call(self.session.api().get("admin/stats"))
            .await?;
        api_client::read_json(response).await
    }

    pub async fn update_user(&self, user_id: Uuid, update: &UserUpdate) -> Result<()> {
        self.ensure_admin()?;
        if update.is_empty() {
            return Err(AppError::Validation("Nothing to update".to_string()));
        }

        let builder = self
            .session
            .api()
            .put(&format!("admin/users/{}", user_id))
            .json(update);
        let response = self.session.authorized_call(builder).await?;
        if !response.status().is_success() {
            return Err(api_client::rejection(response).await);
        }

        info!(%user_id, "User updated");
        Ok(())
    }

    pub async fn delete_user(&self, user_id: Uuid) -> Result<()> {
        self.ensure_admin()?;
        if self.session.current_user().map(|u| u.id) == Some(user_id) {
            return Err(AppError::Validation(
                "Refusing to delete the signed-in account".to_string(),
            ));
        }

        let builder = self.session.api().delete(&format!("admin/users/{}", user_id));
        let response = self.session.authorized_call(builder).await?;
        if !response.status().is_success() {
            return Err(api_client::rejection(response).await);
        }

        info!(%user_id, "User deleted");
        Ok(())
    }

    pub async fn email_queue(&self) -> Result<Vec<EmailQueueItem>> {
        self.ensure_admin()?;
        let response = self
            .session
            .authorized_call(self.session.api().get("admin/email-queue"))
            .await?;
        let queue: EmailQueueResponse = api_client::read_json(response).await?;
        Ok(queue.queue)
    }

    pub async fn email_template(&self) -> Result<EmailTemplate> {
        self.ensure_admin()?;
        let response = self
            .session
            .authorized_call(self.session.api().get("admin/email-template"))
            .await?;
        api_client::read_json(response).await
    }

    pub async fn update_email_template(&self, template: &EmailTemplate) -> Result<()> {
        self.ensure_admin()?;
        if template.subject.trim().is_empty() {
            return Err(AppError::Validation("Template subject is required".to_string()));
        }

        let builder = self
            .session
            .api()
            .put("admin/email-template")
            .json(template);
        let response = self.session.authorized_call(builder).await?;
        if !response.status().is_success() {
            return Err(api_client::rejection(response).await);
        }

        info!("Email template updated");
        Ok(())
    }
}
