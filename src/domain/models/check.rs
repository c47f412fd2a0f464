use chrono::{DateTime, Duration, Utc};

use super::service::ServiceKey;

/// State of one retry loop for one service.
///
/// Created when the loop starts and dropped when it returns.
#[derive(Debug, Clone)]
pub struct CheckTask {
    pub service: ServiceKey,
    pub timeout_secs: u64,
    /// No new attempt may begin after this instant
    pub stop_deadline: DateTime<Utc>,
    /// 1-based attempt counter
    pub attempt: u32,
}

impl CheckTask {
    pub fn new(service: ServiceKey, timeout_secs: u64, started_at: DateTime<Utc>) -> Self {
        let timeout = i64::try_from(timeout_secs).unwrap_or(i64::MAX);
        Self {
            service,
            timeout_secs,
            stop_deadline: started_at + Duration::seconds(timeout),
            attempt: 1,
        }
    }

    /// Whole seconds from `now` until the stop deadline (negative once past it).
    pub fn seconds_left(&self, now: DateTime<Utc>) -> i64 {
        self.stop_deadline.timestamp() - now.timestamp()
    }
}
