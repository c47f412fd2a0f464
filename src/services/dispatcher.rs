//! Maps service keys to their checks and drives each through the retry
//! scheduler.

use std::sync::Arc;

use tracing::{error, info, info_span, Instrument};

use crate::domain::errors::{ConfigurationError, DispatchError};
use crate::domain::models::{
    Config, RunReport, ServiceCheck, ServiceKey, ServiceOutcome, TimeoutConfig, TransferMode,
};
use crate::domain::ports::{
    ApiClient, ClusterInspector, Clock, CommandExecutor, HealthCheck, ServiceResolver,
    TransferConnector,
};
use crate::services::api_checks::ApiSurface;
use crate::services::digest_probe::ArtifactDigestProbe;
use crate::services::endpoint_resolver::EndpointResolver;
use crate::services::ipxe_tftp::IpxeTftpCheck;
use crate::services::pod_checks::PodChecker;
use crate::services::retry_scheduler::RetryScheduler;
use crate::services::service_checks::{
    CfsCheck, CliSurface, ConmanCheck, EtcdBackedCheck, ImsCheck, VcsCheck,
};
use crate::services::transfer_verifier::TransferConsistencyVerifier;

/// Adapters the checks talk to the cluster through.
#[derive(Clone)]
pub struct ClusterPorts {
    pub executor: Arc<dyn CommandExecutor>,
    pub inspector: Arc<dyn ClusterInspector>,
    pub resolver: Arc<dyn ServiceResolver>,
    pub connector: Arc<dyn TransferConnector>,
    pub api: Arc<dyn ApiClient>,
}

/// One check per distinct `ServiceCheck`.
pub struct CheckSet {
    pub bos: Arc<dyn HealthCheck>,
    pub cfs: Arc<dyn HealthCheck>,
    pub conman: Arc<dyn HealthCheck>,
    pub crus: Arc<dyn HealthCheck>,
    pub ims: Arc<dyn HealthCheck>,
    pub ipxe_tftp: Arc<dyn HealthCheck>,
    pub vcs: Arc<dyn HealthCheck>,
}

impl CheckSet {
    /// Build the real checks from configuration and adapters.
    pub fn build(config: &Config, ports: &ClusterPorts) -> Result<Self, ConfigurationError> {
        let mode: TransferMode = config
            .transfer
            .mode
            .parse()
            .map_err(|_| ConfigurationError::InvalidTransferMode(config.transfer.mode.clone()))?;

        let pods = PodChecker::new(Arc::clone(&ports.inspector), &config.namespace);
        let cli = CliSurface::new(Arc::clone(&ports.executor), &config.tools.cray);
        let api = ApiSurface::new(Arc::clone(&ports.api));
        let probe = ArtifactDigestProbe::new(Arc::clone(&ports.executor), &config.tools.md5sum);
        let verifier = TransferConsistencyVerifier::new(
            EndpointResolver::new(Arc::clone(&ports.resolver), &config.namespace),
            Arc::clone(&ports.connector),
            probe.clone(),
            config.transfer.temp_dir.clone(),
            config.transfer.max_consistency_redos,
            mode,
        );
        let ipxe_tftp = IpxeTftpCheck::new(
            pods.clone(),
            Arc::clone(&ports.inspector),
            Arc::clone(&ports.executor),
            probe,
            verifier,
            config.transfer.clone(),
        );

        Ok(Self {
            bos: Arc::new(EtcdBackedCheck::bos(pods.clone(), api.clone())),
            cfs: Arc::new(CfsCheck::new(pods.clone(), cli.clone(), api.clone())),
            conman: Arc::new(ConmanCheck::new(
                pods.clone(),
                config.conman.expected_waiting(),
            )),
            crus: Arc::new(EtcdBackedCheck::crus(pods.clone())),
            ims: Arc::new(ImsCheck::new(
                pods.clone(),
                cli,
                api,
                config.ims.expected_recipe(),
            )),
            ipxe_tftp: Arc::new(ipxe_tftp),
            vcs: Arc::new(VcsCheck::new(pods)),
        })
    }

    pub fn get(&self, check: ServiceCheck) -> &dyn HealthCheck {
        let check = match check {
            ServiceCheck::Bos => &self.bos,
            ServiceCheck::Cfs => &self.cfs,
            ServiceCheck::Conman => &self.conman,
            ServiceCheck::Crus => &self.crus,
            ServiceCheck::Ims => &self.ims,
            ServiceCheck::IpxeTftp => &self.ipxe_tftp,
            ServiceCheck::Vcs => &self.vcs,
        };
        check.as_ref()
    }
}

/// Per-invocation switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub include_cli: bool,
    /// Run every check exactly once
    pub no_retry: bool,
    /// Replaces every per-service timeout
    pub timeout_override: Option<u64>,
}

/// Runs the checks for requested services, one at a time.
pub struct TestDispatcher {
    checks: CheckSet,
    scheduler: RetryScheduler,
    clock: Arc<dyn Clock>,
    timeouts: TimeoutConfig,
}

impl TestDispatcher {
    pub fn new(checks: CheckSet, clock: Arc<dyn Clock>, timeouts: TimeoutConfig) -> Self {
        Self {
            scheduler: RetryScheduler::new(Arc::clone(&clock), timeouts.grace_secs),
            checks,
            clock,
            timeouts,
        }
    }

    pub fn timeout_for(&self, key: ServiceKey, options: RunOptions) -> u64 {
        options
            .timeout_override
            .unwrap_or_else(|| self.timeouts.for_service(key))
    }

    /// A single attempt of the check behind `key`.
    pub async fn run_check(&self, key: ServiceKey, include_cli: bool) -> bool {
        self.checks.get(key.check()).run(include_cli).await
    }

    /// Check one service, retrying unless `no_retry` is set.
    pub async fn test_service(&self, key: ServiceKey, options: RunOptions) -> ServiceOutcome {
        let timeout_secs = self.timeout_for(key, options);
        let started = self.clock.now();
        info!(service = %key, "Starting {} test", key);

        let passed = if options.no_retry {
            self.run_check(key, options.include_cli).await
        } else {
            self.scheduler
                .run_with_retry(key, timeout_secs, || self.run_check(key, options.include_cli))
                .await
        };

        let elapsed = self.clock.now() - started;
        #[allow(clippy::cast_precision_loss)]
        let elapsed_secs = elapsed.num_milliseconds() as f64 / 1000.0;
        if passed {
            info!(service = %key, elapsed_secs, "SUCCESS: {} service test passed", key);
        } else {
            error!(service = %key, elapsed_secs, "FAILURE: {} service test failed", key);
        }

        ServiceOutcome {
            service: key,
            passed,
            timeout_secs,
            elapsed_secs,
        }
    }

    /// Check a service named by an unvalidated key.
    pub async fn dispatch(
        &self,
        key: &str,
        options: RunOptions,
    ) -> Result<ServiceOutcome, DispatchError> {
        let key: ServiceKey = key
            .parse()
            .inspect_err(|e| error!(error = %e, "Invalid dispatch"))?;
        Ok(self.test_service(key, options).await)
    }

    /// Check every requested service in order.
    ///
    /// Keys that share a check with an earlier key (ipxe and tftp, vcs and
    /// gitea) or repeat one are tested once, under the first key given.
    pub async fn run(&self, run_id: &str, keys: &[ServiceKey], options: RunOptions) -> RunReport {
        let mut report = RunReport::new(run_id, self.clock.now());
        let mut seen: Vec<ServiceCheck> = Vec::with_capacity(keys.len());
        for key in keys {
            if seen.contains(&key.check()) {
                info!(service = %key, "Skipping {}: its check already ran in this run", key);
                continue;
            }
            seen.push(key.check());
            let span = info_span!("service", run = run_id, service = %key);
            let outcome = self.test_service(*key, options).instrument(span).await;
            report.outcomes.push(outcome);
        }
        report
    }
}
