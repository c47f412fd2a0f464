//! Deadline-aware retry loop for boolean checks.
//!
//! The first sleep is 5 seconds and grows by 5 seconds per attempt, capped
//! at 1/6 of the total retry time. As the stop deadline approaches the sleep
//! is cut short so that one more attempt still fits before it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, info_span, warn, Instrument};

use crate::domain::models::{CheckTask, ServiceKey};
use crate::domain::ports::Clock;

/// Seconds added to the sleep for every failed attempt.
const SLEEP_STEP_SECS: i64 = 5;

/// Sleep length, in whole seconds, before attempt `attempt + 1`.
///
/// `time_left` is the number of seconds until the stop deadline. The result
/// is at least 1; when `time_left >= 2` it is also at most `time_left - 1`.
pub fn sleep_seconds(attempt: u32, time_left: i64, timeout_secs: u64) -> i64 {
    let secs = if time_left <= 1 {
        1
    } else {
        let max_sleep = i64::try_from(timeout_secs / 6).unwrap_or(i64::MAX);
        let mut secs = i64::from(attempt)
            .saturating_mul(SLEEP_STEP_SECS)
            .min(max_sleep);
        if secs >= time_left {
            secs = time_left - 1;
        } else if secs.saturating_mul(2) > time_left {
            secs = time_left / 2 + 1;
        }
        secs
    };
    // Timeouts under 6 seconds give a zero cap.
    secs.max(1)
}

/// Runs a check repeatedly until it passes or the deadline rules say stop.
pub struct RetryScheduler {
    clock: Arc<dyn Clock>,
    grace_secs: i64,
}

impl RetryScheduler {
    pub fn new(clock: Arc<dyn Clock>, grace_secs: u64) -> Self {
        Self {
            clock,
            grace_secs: i64::try_from(grace_secs).unwrap_or(i64::MAX),
        }
    }

    /// How long to wait after a failed attempt.
    pub fn compute_sleep(
        &self,
        attempt: u32,
        stop_deadline: DateTime<Utc>,
        timeout_secs: u64,
    ) -> Duration {
        let time_left = stop_deadline.timestamp() - self.clock.now().timestamp();
        let secs = sleep_seconds(attempt, time_left, timeout_secs);
        Duration::from_secs(u64::try_from(secs).unwrap_or(1))
    }

    /// Call `check` until it returns true, the final attempt fails, or the
    /// stop deadline has been overrun by the grace period.
    pub async fn run_with_retry<F, Fut>(
        &self,
        service: ServiceKey,
        timeout_secs: u64,
        mut check: F,
    ) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut task = CheckTask::new(service, timeout_secs, self.clock.now());
        info!(%service, timeout_secs, "Test retry timeout is {} seconds", timeout_secs);

        loop {
            let final_attempt = task.seconds_left(self.clock.now()) <= 1;
            if final_attempt {
                info!(%service, attempt = task.attempt, "Final attempt");
            } else {
                info!(%service, attempt = task.attempt, "Attempt #{}", task.attempt);
            }

            let span = info_span!("attempt", %service, n = task.attempt);
            if check().instrument(span).await {
                info!(%service, attempt = task.attempt, "Check passed");
                return true;
            }

            if final_attempt {
                warn!(%service, attempt = task.attempt, "Final attempt failed");
                return false;
            }

            if -task.seconds_left(self.clock.now()) >= self.grace_secs {
                warn!(
                    %service,
                    grace_secs = self.grace_secs,
                    "Not retrying because stop time has already been exceeded by at least {} seconds",
                    self.grace_secs
                );
                return false;
            }

            let sleep = self.compute_sleep(task.attempt, task.stop_deadline, timeout_secs);
            info!(%service, attempt = task.attempt, ?sleep, "Attempt failed; waiting {:?} before retrying", sleep);
            self.clock.sleep(sleep).await;
            task.attempt += 1;
        }
    }
}
