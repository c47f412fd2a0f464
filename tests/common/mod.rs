//! Common test utilities for integration tests
//!
//! In-memory stand-ins for every port, so the checks can run without a
//! cluster, a TFTP server or any external binary.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use cmsdev::domain::errors::{ApiError, ExecError, LookupError, TransferError};
use cmsdev::domain::models::{PodPhase, PodSummary, ServiceEndpoint, TransferMode};
use cmsdev::domain::ports::{
    ApiClient, ByteStream, Clock, ClusterInspector, CommandExecutor, ExecTarget, ServiceResolver,
    TransferConnector, TransferSession,
};
use serde_json::Value;

pub const NAMESPACE: &str = "services";

/// A syntactically valid digest that differs for every `n`.
pub fn digest(n: u32) -> String {
    format!("{n:032x}")
}

/// Clock that only moves when told to.
///
/// `sleep` returns immediately after advancing the clock by the requested
/// duration, and records it so tests can assert on the schedule.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Move time forward without recording a sleep, e.g. to model a slow check.
    pub fn advance(&self, duration: Duration) {
        *self.now.lock().unwrap() += chrono::Duration::from_std(duration).unwrap();
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    ))
}

pub fn pod(name: &str, phase: PodPhase) -> PodSummary {
    PodSummary::new(name, phase)
}

pub fn endpoint(cluster: Option<&str>, external: Option<&str>, port: i32) -> ServiceEndpoint {
    ServiceEndpoint {
        cluster_ip: cluster.map(str::to_string),
        external_ip: external.map(str::to_string),
        port,
        extra_ports: Vec::new(),
    }
}

/// Pops the front of a queue but keeps returning the last element once
/// only one is left.
fn next_sticky<T: Clone>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    let mut queue = queue.lock().unwrap();
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

/// Command executor answering from a script.
///
/// - `md5sum` in a container returns the next scripted remote digest
/// - `md5sum` locally reads the file and looks its content up
/// - `hostname` returns the scripted host name
/// - `cray <svc> <res> ...` returns the scripted CLI output, `[]` by default
/// - anything else succeeds with empty output unless marked as failing
pub struct ScriptedExecutor {
    remote_digests: Mutex<VecDeque<String>>,
    local_digests: HashMap<Vec<u8>, String>,
    cli_outputs: HashMap<String, String>,
    failing: Vec<String>,
    hostname: String,
    calls: Mutex<Vec<(ExecTarget, String, Vec<String>)>>,
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self {
            remote_digests: Mutex::new(VecDeque::new()),
            local_digests: HashMap::new(),
            cli_outputs: HashMap::new(),
            failing: Vec::new(),
            hostname: "ncn-w001".to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_remote_digests(self, digests: &[String]) -> Self {
        *self.remote_digests.lock().unwrap() = digests.iter().cloned().collect();
        self
    }

    pub fn with_local_digest(mut self, content: &[u8], digest: String) -> Self {
        self.local_digests.insert(content.to_vec(), digest);
        self
    }

    pub fn with_cli_output(mut self, service: &str, resource: &str, output: &str) -> Self {
        self.cli_outputs
            .insert(format!("{service} {resource}"), output.to_string());
        self
    }

    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.hostname = hostname.to_string();
        self
    }

    pub fn failing(mut self, command: &str) -> Self {
        self.failing.push(command.to_string());
        self
    }

    pub fn calls_of(&self, command: &str) -> Vec<(ExecTarget, Vec<String>)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, cmd, _)| cmd == command)
            .map(|(target, _, args)| (target.clone(), args.clone()))
            .collect()
    }

    fn fail(command: &str, stderr: &str) -> ExecError {
        ExecError::Failed {
            command: command.to_string(),
            status: "exit status: 1".to_string(),
            stderr: stderr.to_string(),
        }
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn run(
        &self,
        target: &ExecTarget,
        command: &str,
        args: &[&str],
    ) -> Result<String, ExecError> {
        self.calls.lock().unwrap().push((
            target.clone(),
            command.to_string(),
            args.iter().map(ToString::to_string).collect(),
        ));

        if self.failing.iter().any(|c| c == command) {
            return Err(Self::fail(command, "scripted failure"));
        }

        match command {
            "md5sum" => {
                let path = args.first().copied().unwrap_or_default();
                let digest = match target {
                    ExecTarget::Local => {
                        let content = std::fs::read(path)
                            .map_err(|e| Self::fail(command, &e.to_string()))?;
                        self.local_digests.get(&content).cloned()
                    }
                    ExecTarget::Container { .. } => next_sticky(&self.remote_digests),
                };
                digest
                    .map(|d| format!("{d}  {path}\n"))
                    .ok_or_else(|| Self::fail(command, "no scripted digest"))
            }
            "hostname" => Ok(format!("{}\n", self.hostname)),
            "cray" => {
                let key = args.iter().take(2).copied().collect::<Vec<_>>().join(" ");
                Ok(self
                    .cli_outputs
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| "[]".to_string()))
            }
            _ => Ok(String::new()),
        }
    }
}

/// TFTP server stand-in; every session it opens serves from the same queue.
pub struct FakeConnector {
    server: Arc<FakeServer>,
    connects: Mutex<Vec<String>>,
}

struct FakeServer {
    payloads: Mutex<VecDeque<Vec<u8>>>,
    receives: AtomicUsize,
}

impl FakeConnector {
    /// Serves `payloads` in order, then keeps serving the last one.
    pub fn serving(payloads: &[&[u8]]) -> Arc<Self> {
        Arc::new(Self {
            server: Arc::new(FakeServer {
                payloads: Mutex::new(payloads.iter().map(|p| p.to_vec()).collect()),
                receives: AtomicUsize::new(0),
            }),
            connects: Mutex::new(Vec::new()),
        })
    }

    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().unwrap().clone()
    }

    pub fn receives(&self) -> usize {
        self.server.receives.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransferConnector for FakeConnector {
    async fn connect(&self, remote: &str) -> Result<Box<dyn TransferSession>, TransferError> {
        self.connects.lock().unwrap().push(remote.to_string());
        Ok(Box::new(FakeSession {
            server: Arc::clone(&self.server),
        }))
    }
}

struct FakeSession {
    server: Arc<FakeServer>,
}

#[async_trait]
impl TransferSession for FakeSession {
    async fn receive(&self, artifact: &str, _mode: TransferMode) -> Result<ByteStream, TransferError> {
        self.server.receives.fetch_add(1, Ordering::SeqCst);
        let payload = next_sticky(&self.server.payloads).ok_or_else(|| TransferError::Receive {
            remote: "fake".to_string(),
            artifact: artifact.to_string(),
            reason: "nothing to serve".to_string(),
        })?;
        Ok(Box::new(Cursor::new(payload)))
    }
}

/// Service lookups answered from a fixed table.
#[derive(Default)]
pub struct FakeResolver {
    services: HashMap<String, ServiceEndpoint>,
}

impl FakeResolver {
    pub fn with(mut self, service: &str, endpoint: ServiceEndpoint) -> Self {
        self.services.insert(service.to_string(), endpoint);
        self
    }
}

#[async_trait]
impl ServiceResolver for FakeResolver {
    async fn resolve(&self, namespace: &str, service: &str) -> Result<ServiceEndpoint, LookupError> {
        self.services
            .get(service)
            .cloned()
            .ok_or_else(|| LookupError::ServiceNotFound {
                namespace: namespace.to_string(),
                service: service.to_string(),
                reason: "not in fake cluster".to_string(),
            })
    }
}

/// Pods, PVCs and config maps held in memory.
#[derive(Default)]
pub struct FakeCluster {
    pods: Vec<PodSummary>,
    pvcs: HashMap<String, String>,
    config_maps: HashMap<(String, String), String>,
}

impl FakeCluster {
    pub fn with_pod(self, name: &str, phase: PodPhase) -> Self {
        self.with_pod_summary(pod(name, phase))
    }

    /// A pod with waiting containers or spec containers filled in.
    pub fn with_pod_summary(mut self, pod: PodSummary) -> Self {
        self.pods.push(pod);
        self
    }

    pub fn with_pods(self, names: &[&str], phase: &PodPhase) -> Self {
        names
            .iter()
            .fold(self, |cluster, name| cluster.with_pod(name, phase.clone()))
    }

    pub fn with_bound_pvc(self, name: &str) -> Self {
        self.with_pvc(name, "Bound")
    }

    pub fn with_pvc(mut self, name: &str, phase: &str) -> Self {
        self.pvcs.insert(name.to_string(), phase.to_string());
        self
    }

    pub fn with_config_map_field(mut self, map: &str, field: &str, value: &str) -> Self {
        self.config_maps
            .insert((map.to_string(), field.to_string()), value.to_string());
        self
    }
}

#[async_trait]
impl ClusterInspector for FakeCluster {
    async fn list_pods(&self, _namespace: &str, prefix: &str) -> Result<Vec<PodSummary>, LookupError> {
        let mut pods: Vec<PodSummary> = self
            .pods
            .iter()
            .filter(|p| p.name.starts_with(prefix))
            .cloned()
            .collect();
        pods.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(pods)
    }

    async fn pvc_phase(&self, _namespace: &str, name: &str) -> Result<String, LookupError> {
        self.pvcs
            .get(name)
            .cloned()
            .ok_or_else(|| LookupError::QueryFailed(format!("pvc {name} not found")))
    }

    async fn config_map_field(
        &self,
        _namespace: &str,
        name: &str,
        field: &str,
    ) -> Result<Option<String>, LookupError> {
        if !self.config_maps.keys().any(|(map, _)| map == name) {
            return Err(LookupError::QueryFailed(format!("config map {name} not found")));
        }
        Ok(self
            .config_maps
            .get(&(name.to_string(), field.to_string()))
            .cloned())
    }
}

/// API gateway answering from a path table; unknown paths are a 404.
#[derive(Default)]
pub struct FakeApi {
    responses: HashMap<String, Value>,
    calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn with(mut self, path: &str, body: Value) -> Self {
        self.responses.insert(path.to_string(), body);
        self
    }

    pub fn without(mut self, path: &str) -> Self {
        self.responses.remove(path);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApiClient for FakeApi {
    async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        self.calls.lock().unwrap().push(path.to_string());
        self.responses
            .get(path)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                path: path.to_string(),
                status: 404,
            })
    }
}
