//! vl3mesh integration test harness.
//!
//! Every test runs an in-process mesh: real `Vl3Endpoint`s sharing one
//! in-memory registry table, with a loopback connector that hands each
//! peer connect request straight to the target endpoint's dispatcher.
//!
//! Most tests issue client requests one endpoint at a time and drain in
//! between. Meshes that let endpoints dial each other at the same moment
//! are built with `Mesh::with_timeout`, which bounds each delivery the way
//! the daemon's HTTP client does.

mod failures;
mod mesh;
mod sites;

use std::sync::Arc;
use std::time::Duration;

use vl3_core::config::Vl3Config;
use vl3_core::ipam::ConfiguredSubnet;
use vl3_core::{Connection, NetworkServiceRequest};
use vl3_services::testing::{LoopbackConnector, MockDataplane, MockDiscovery};
use vl3_services::{
    DiscoveryClient, DrainSummary, NetworkServiceServer, PeerSnapshot, PeerState, Vl3Endpoint,
};

// ── Harness ───────────────────────────────────────────────────────────────────

pub const SERVICE: &str = "vl3-service";

/// Manager name the `endpoints()` helper assigns to `name`.
pub fn manager_of(name: &str) -> String {
    format!("nsm-{name}")
}

pub struct Node {
    pub name: String,
    pub endpoint: Arc<Vl3Endpoint>,
    pub dataplane: Arc<MockDataplane>,
}

impl Node {
    /// Send a client request for the vL3 service and wait for the
    /// formation it triggers.
    pub async fn client_request(&self) -> DrainSummary {
        let conn = Connection {
            id: format!("client-of-{}", self.name),
            network_service: SERVICE.to_string(),
            network_service_endpoint_name: self.name.clone(),
            ..Connection::default()
        };
        self.endpoint
            .request(NetworkServiceRequest::new(conn))
            .await
            .expect("client request failed");
        self.endpoint.drain().await
    }

    pub async fn peer_state(&self, peer: &str) -> Option<PeerState> {
        match self.endpoint.registry().peer(peer) {
            Some(record) => Some(record.state().await),
            None => None,
        }
    }

    pub async fn peers(&self) -> Vec<PeerSnapshot> {
        self.endpoint.registry().snapshot().await
    }
}

/// A set of endpoints wired through one registry table and one connector.
pub struct Mesh {
    pub connector: Arc<LoopbackConnector>,
    discovery: Arc<MockDiscovery>,
}

impl Mesh {
    pub fn new(discovery: MockDiscovery) -> Self {
        Self::with_connector(discovery, LoopbackConnector::new())
    }

    /// A mesh whose deliveries fail after `timeout`.
    pub fn with_timeout(discovery: MockDiscovery, timeout: Duration) -> Self {
        Self::with_connector(discovery, LoopbackConnector::with_timeout(timeout))
    }

    fn with_connector(discovery: MockDiscovery, connector: LoopbackConnector) -> Self {
        Self {
            connector: Arc::new(connector),
            discovery: Arc::new(discovery),
        }
    }

    /// Build endpoint `name` owning `subnet`, reachable as `nsm-<name>`.
    pub fn node(&self, name: &str, subnet: &str, remote_sites: &[&str]) -> Node {
        let mut config = Vl3Config::default();
        config.identity.endpoint_name = name.to_string();
        config.ipam.subnet = subnet.to_string();
        config.network.remote_sites = remote_sites.iter().map(|s| s.to_string()).collect();

        let dataplane = Arc::new(MockDataplane::new());
        let endpoint = Vl3Endpoint::new(
            &config,
            &ConfiguredSubnet,
            &manager_of(name),
            Some(self.discovery.clone() as Arc<dyn DiscoveryClient>),
            self.connector.clone(),
            dataplane.clone(),
        )
        .expect("endpoint setup failed");
        let endpoint = Arc::new(endpoint);
        self.connector.register(&manager_of(name), endpoint.clone());

        Node {
            name: name.to_string(),
            endpoint,
            dataplane,
        }
    }

    pub fn discovery(&self) -> &MockDiscovery {
        &self.discovery
    }

    /// Number of connect calls aimed at `to` that came from `from`.
    pub fn dials(&self, from: &str, to: &str) -> usize {
        self.connector
            .calls()
            .iter()
            .filter(|c| c.endpoint_name == to && c.source_manager_name == manager_of(from))
            .count()
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        self.connector.clear();
    }
}

/// True once a peer record exists and has a working link in either direction.
pub fn linked(state: Option<PeerState>) -> bool {
    matches!(
        state,
        Some(PeerState::Connected) | Some(PeerState::ConnectedViaIncoming)
    )
}
