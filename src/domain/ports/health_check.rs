use async_trait::async_trait;

/// One pass/fail check of a service.
///
/// Implementations log every problem they find and fold it into the
/// returned boolean. A single call is a single attempt; retrying is the
/// caller's job.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// `include_cli` also exercises the service's command-line surface,
    /// where it has one.
    async fn run(&self, include_cli: bool) -> bool;
}
