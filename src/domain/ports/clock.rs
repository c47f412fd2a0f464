use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of wall-clock time and of the sleeps between retry attempts.
///
/// The retry scheduler never touches the system clock directly, so its
/// timing decisions can be driven by a manual clock in tests.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}
