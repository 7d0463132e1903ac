//! Upload admission control
//!
//! Two fixed windows are tracked independently: an hourly window and a
//! minute window. A call to [`RateLimiter::admit`] waits until both windows
//! have capacity, then records one attempt in each.

use crate::config::RateLimitConfig;
use crate::RehostError;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// A counter over one admission window
#[derive(Debug, Clone)]
pub struct QuotaWindow {
    /// Maximum admissions per window
    pub capacity: u32,

    /// Window length
    pub length: Duration,

    /// Admissions recorded in the current window
    pub count: u32,

    /// When the current window started
    pub started_at: Instant,
}

impl QuotaWindow {
    /// Creates a window that starts now
    pub fn new(capacity: u32, length: Duration, now: Instant) -> Self {
        Self {
            capacity,
            length,
            count: 0,
            started_at: now,
        }
    }

    /// Resets the window if it has elapsed
    ///
    /// Returns the time left in the window if it is full, or `None` when an
    /// admission can be recorded now.
    fn check(&mut self, now: Instant) -> Option<Duration> {
        let elapsed = now.saturating_duration_since(self.started_at);
        if elapsed >= self.length {
            self.restart(now);
            return None;
        }

        if self.count >= self.capacity {
            return Some(self.length - elapsed);
        }

        None
    }

    fn restart(&mut self, now: Instant) {
        self.count = 0;
        self.started_at = now;
    }

    /// Admissions left before the window is full
    pub fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.count)
    }
}

#[derive(Debug)]
struct QuotaState {
    hour: QuotaWindow,
    minute: QuotaWindow,
}

/// Two-tier upload rate limiter
///
/// The limiter is a plain value: share it between tasks with an `Arc`. The
/// quota state sits behind an async mutex that is held for the whole
/// admission, including any wait, so admissions are granted one at a time.
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<QuotaState>,
}

impl RateLimiter {
    /// Creates a limiter with the given per-minute and per-hour capacities
    pub fn new(per_minute: u32, per_hour: u32) -> Self {
        let now = Instant::now();
        Self {
            state: Mutex::new(QuotaState {
                hour: QuotaWindow::new(per_hour, HOUR, now),
                minute: QuotaWindow::new(per_minute, MINUTE, now),
            }),
        }
    }

    /// Creates a limiter from configuration
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.per_minute, config.per_hour)
    }

    /// Waits until an upload is permitted under both quotas, then records it
    ///
    /// The hourly window is checked first. If it is full the caller waits out
    /// the rest of the hour and the window restarts. The minute window is then
    /// checked against a fresh clock reading, so a long hourly wait also
    /// refreshes it.
    ///
    /// # Errors
    ///
    /// Returns [`RehostError::Cancelled`] if `cancel` has fired or fires while
    /// waiting. No attempt is recorded in that case.
    pub async fn admit(&self, cancel: &CancellationToken) -> Result<(), RehostError> {
        let mut state = tokio::select! {
            state = self.state.lock() => state,
            _ = cancel.cancelled() => return Err(RehostError::Cancelled),
        };
        if cancel.is_cancelled() {
            return Err(RehostError::Cancelled);
        }

        if let Some(wait) = state.hour.check(Instant::now()) {
            tracing::info!(
                "Hourly upload quota of {} reached, waiting {:?}",
                state.hour.capacity,
                wait
            );
            suspend(wait, cancel).await?;
            state.hour.restart(Instant::now());
        }

        if let Some(wait) = state.minute.check(Instant::now()) {
            tracing::info!(
                "Per-minute upload quota of {} reached, waiting {:?}",
                state.minute.capacity,
                wait
            );
            suspend(wait, cancel).await?;
            state.minute.restart(Instant::now());
        }

        state.hour.count += 1;
        state.minute.count += 1;

        tracing::trace!(
            "Upload admitted ({} left this minute, {} left this hour)",
            state.minute.remaining(),
            state.hour.remaining()
        );

        Ok(())
    }

    /// Returns `(minute, hour)` admissions recorded in the current windows
    pub async fn counts(&self) -> (u32, u32) {
        let state = self.state.lock().await;
        (state.minute.count, state.hour.count)
    }
}

/// Sleeps for `wait` unless `cancel` fires first
async fn suspend(wait: Duration, cancel: &CancellationToken) -> Result<(), RehostError> {
    tokio::select! {
        _ = tokio::time::sleep(wait) => Ok(()),
        _ = cancel.cancelled() => Err(RehostError::Cancelled),
    }
}
