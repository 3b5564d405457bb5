use crate::{
    errors::{AppError, Result},
    models::User,
};

/// Local, advisory quota policy. The server's 403 stays authoritative.
pub struct QuotaGuard;

impl QuotaGuard {
    pub fn can_submit(user: &User) -> bool {
        user.images_used_total < user.images_limit_total
    }

    pub fn check(user: &User) -> Result<()> {
        if Self::can_submit(user) {
            return Ok(());
        }
        Err(AppError::QuotaExceeded(format!(
            "Image limit of {} reached (used: {})",
            user.images_limit_total, user.images_used_total
        )))
    }
}
