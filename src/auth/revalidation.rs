//! Periodic "who am I" check for the authenticated lifetime of a session.
//!
//! One task per session epoch. It stops when its token is cancelled (logout or
//! a newer login), when the manager is dropped, or once the server refuses
//! the session.

use std::sync::Weak;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::auth::session::{LogoutReason, SessionManager};
use crate::errors::AppError;

pub(crate) async fn run(
    manager: Weak<SessionManager>,
    epoch: u64,
    period: Duration,
    cancel: CancellationToken,
) {
    tracing::debug!(epoch, interval_secs = period.as_secs(), "Session revalidation started");

    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(epoch, "Session revalidation stopping");
                break;
            }
            _ = interval.tick() => {
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                if manager.current_epoch() != Some(epoch) {
                    break;
                }

                match manager.fetch_profile(LogoutReason::RevalidationFailed).await {
                    Ok(user) => {
                        tracing::debug!(user_id = %user.id, "Session still valid");
                    }
                    Err(AppError::SessionExpired) => {
                        tracing::info!(epoch, "Session rejected during revalidation");
                        break;
                    }
                    // No retry schedule beyond the next tick.
                    Err(e) => {
                        tracing::warn!(error = %e, "Session revalidation failed");
                    }
                }
            }
        }
    }
}
