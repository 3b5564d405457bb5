use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Optimistic progress curve: `step` every `tick`, never above `cap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSchedule {
    pub tick: Duration,
    pub step: u8,
    pub cap: u8,
}

impl Default for ProgressSchedule {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(800),
            step: 10,
            cap: 90,
        }
    }
}

impl ProgressSchedule {
    /// Next value after `current`. Never decreases, never crosses `cap`
    /// unless `current` already did.
    pub fn next(&self, current: u8) -> u8 {
        if current >= self.cap {
            return current;
        }
        current.saturating_add(self.step).min(self.cap)
    }
}

/// Timer task feeding simulated progress to a callback until stopped.
///
/// The callback returns `false` once the progress it reports is no longer
/// wanted, which ends the task on its own.
pub struct ProgressTicker {
    cancel: CancellationToken,
}

impl ProgressTicker {
    pub fn start<F>(schedule: ProgressSchedule, mut on_tick: F) -> Self
    where
        F: FnMut(&ProgressSchedule) -> bool + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(
                tokio::time::Instant::now() + schedule.tick,
                schedule.tick,
            );

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        if !on_tick(&schedule) {
                            debug!("Progress ticker no longer needed");
                            break;
                        }
                    }
                }
            }
        });

        Self { cancel }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
