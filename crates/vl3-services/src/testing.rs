//! In-memory collaborators for tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use dashmap::DashMap;

use vl3_core::{
    Connection, FindNetworkServiceRequest, FindNetworkServiceResponse, NetworkServiceEndpoint,
    NetworkServiceRequest,
};

use crate::collaborators::{
    DataplaneApplier, DataplaneRequest, DiscoveryClient, NetworkServiceServer, PeerConnectRequest,
    PeerConnector,
};
use crate::endpoint::Vl3Endpoint;

/// A discovery response listing `names`, each owned by manager `nsm-<name>`.
pub fn endpoints(service: &str, names: &[&str]) -> FindNetworkServiceResponse {
    FindNetworkServiceResponse {
        network_service_endpoints: names
            .iter()
            .map(|n| NetworkServiceEndpoint {
                name: n.to_string(),
                network_service_manager_name: format!("nsm-{n}"),
                network_service_name: service.to_string(),
            })
            .collect(),
    }
}

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Answers queries from a fixed table keyed on the full (scoped) service name.
/// Unknown names get an empty response.
#[derive(Default)]
pub struct MockDiscovery {
    services: HashMap<String, FindNetworkServiceResponse>,
    failures: HashSet<String>,
    delays: HashMap<String, Duration>,
    queries: Mutex<Vec<String>>,
}

impl MockDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(mut self, name: &str, response: FindNetworkServiceResponse) -> Self {
        self.services.insert(name.to_string(), response);
        self
    }

    pub fn with_failure(mut self, name: &str) -> Self {
        self.failures.insert(name.to_string());
        self
    }

    pub fn with_delay(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiscoveryClient for MockDiscovery {
    async fn find_network_service(
        &self,
        request: &FindNetworkServiceRequest,
    ) -> Result<FindNetworkServiceResponse> {
        let name = &request.network_service_name;
        self.queries.lock().unwrap().push(name.clone());
        if let Some(delay) = self.delays.get(name) {
            tokio::time::sleep(*delay).await;
        }
        if self.failures.contains(name) {
            bail!("registry unreachable for {name}");
        }
        Ok(self.services.get(name).cloned().unwrap_or_default())
    }
}

// ── Connector ─────────────────────────────────────────────────────────────────

/// Records every connect call and answers with a plausible connection.
#[derive(Default)]
pub struct MockConnector {
    failing: HashSet<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<PeerConnectRequest>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects to any of `names` fail.
    pub fn failing(names: &[&str]) -> Self {
        Self {
            failing: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<PeerConnectRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, endpoint_name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.endpoint_name == endpoint_name)
            .count()
    }
}

#[async_trait]
impl PeerConnector for MockConnector {
    async fn connect_to_endpoint(&self, request: PeerConnectRequest) -> Result<Connection> {
        self.calls.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(&request.endpoint_name) {
            bail!("connection to {} refused", request.endpoint_name);
        }
        let mut conn = request.to_network_service_request().connection;
        conn.context.ip_context.src_ip_addr = "169.254.0.1/30".to_string();
        conn.context.ip_context.dst_ip_addr = "169.254.0.2/30".to_string();
        Ok(conn)
    }
}

// ── Dataplane ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockDataplane {
    failing: HashSet<String>,
    programmed: Mutex<Vec<String>>,
}

impl MockDataplane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Programming any of the interfaces in `names` fails.
    pub fn failing(names: &[&str]) -> Self {
        Self {
            failing: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Interfaces successfully programmed, in order.
    pub fn interfaces(&self) -> Vec<String> {
        self.programmed.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataplaneApplier for MockDataplane {
    async fn process_client_dataplane(&self, request: DataplaneRequest) -> Result<()> {
        if self.failing.contains(&request.interface_name) {
            bail!("memif {} could not be created", request.interface_name);
        }
        self.programmed.lock().unwrap().push(request.interface_name);
        Ok(())
    }
}

// ── Next stage ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNext {
    requests: Mutex<Vec<NetworkServiceRequest>>,
    closes: Mutex<usize>,
}

impl RecordingNext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<NetworkServiceRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        *self.closes.lock().unwrap()
    }
}

#[async_trait]
impl NetworkServiceServer for RecordingNext {
    async fn request(&self, request: NetworkServiceRequest) -> Result<Connection> {
        let conn = request.connection.clone();
        self.requests.lock().unwrap().push(request);
        Ok(conn)
    }

    async fn close(&self, _connection: Connection) -> Result<()> {
        *self.closes.lock().unwrap() += 1;
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

// ── Loopback mesh ─────────────────────────────────────────────────────────────

/// Delivers peer connect requests straight into another endpoint's
/// dispatcher, keyed by manager name. Endpoints register after they are
/// built, which is why lookups happen at call time.
#[derive(Default)]
pub struct LoopbackConnector {
    managers: DashMap<String, Arc<Vl3Endpoint>>,
    timeout: Option<Duration>,
    calls: Mutex<Vec<PeerConnectRequest>>,
}

impl LoopbackConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail a delivery that takes longer than `timeout`, like the daemon's
    /// HTTP connector does.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }

    pub fn register(&self, manager_name: &str, endpoint: Arc<Vl3Endpoint>) {
        self.managers.insert(manager_name.to_string(), endpoint);
    }

    /// Break the endpoint ↔ connector reference cycle.
    pub fn clear(&self) {
        self.managers.clear();
    }

    pub fn calls(&self) -> Vec<PeerConnectRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PeerConnector for LoopbackConnector {
    async fn connect_to_endpoint(&self, request: PeerConnectRequest) -> Result<Connection> {
        self.calls.lock().unwrap().push(request.clone());
        let target = self
            .managers
            .get(&request.manager_name)
            .map(|e| e.value().clone())
            .ok_or_else(|| anyhow!("no manager {}", request.manager_name))?;
        let delivery = target.request(request.to_network_service_request());
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, delivery)
                .await
                .map_err(|_| anyhow!("request to {} timed out", request.manager_name))?,
            None => delivery.await,
        }
    }
}
