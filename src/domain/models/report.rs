use chrono::{DateTime, Utc};
use serde::Serialize;

use super::service::ServiceKey;

/// Result of checking one service, retries included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceOutcome {
    pub service: ServiceKey,
    pub passed: bool,
    pub timeout_secs: u64,
    pub elapsed_secs: f64,
}

/// Results of one invocation, in the order the services were requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<ServiceOutcome>,
}

impl RunReport {
    pub fn new(run_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at,
            outcomes: Vec::new(),
        }
    }

    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    pub fn passed(&self) -> Vec<ServiceKey> {
        self.outcomes.iter().filter(|o| o.passed).map(|o| o.service).collect()
    }

    pub fn failed(&self) -> Vec<ServiceKey> {
        self.outcomes.iter().filter(|o| !o.passed).map(|o| o.service).collect()
    }
}
